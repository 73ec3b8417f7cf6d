use half::f16;

use super::{Number, PartitionAdapter};

/// IEEE float slot widths. `F24` keeps the upper three bytes of a binary32.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatWidth {
    F16,
    F24,
    F32,
    F64,
}

impl FloatWidth {
    pub fn size(self) -> usize {
        match self {
            FloatWidth::F16 => 2,
            FloatWidth::F24 => 3,
            FloatWidth::F32 => 4,
            FloatWidth::F64 => 8,
        }
    }
}

/// Float codec; NaN is the null sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FloatCodec {
    width: FloatWidth,
}

impl FloatCodec {
    pub fn new(width: FloatWidth) -> Self {
        Self { width }
    }

    pub fn width(&self) -> FloatWidth {
        self.width
    }

    fn read(&self, buf: &[u8], offset: usize) -> f64 {
        let slot = &buf[offset..offset + self.width.size()];
        match self.width {
            FloatWidth::F16 => f16::from_be_bytes([slot[0], slot[1]]).to_f64(),
            FloatWidth::F24 => {
                let bits = u32::from_be_bytes([slot[0], slot[1], slot[2], 0]);
                f32::from_bits(bits) as f64
            }
            FloatWidth::F32 => f32::from_be_bytes([slot[0], slot[1], slot[2], slot[3]]) as f64,
            FloatWidth::F64 => {
                let mut bytes = [0u8; 8];
                bytes.copy_from_slice(slot);
                f64::from_be_bytes(bytes)
            }
        }
    }

    fn write(&self, buf: &mut [u8], offset: usize, value: f64) {
        let slot = &mut buf[offset..offset + self.width.size()];
        match self.width {
            FloatWidth::F16 => slot.copy_from_slice(&f16::from_f64(value).to_be_bytes()),
            FloatWidth::F24 => slot.copy_from_slice(&f24_bytes(value as f32)),
            FloatWidth::F32 => slot.copy_from_slice(&(value as f32).to_be_bytes()),
            FloatWidth::F64 => slot.copy_from_slice(&value.to_be_bytes()),
        }
    }
}

/// Drops the low mantissa byte of a binary32, rounding half to even.
fn f24_bytes(value: f32) -> [u8; 3] {
    let bits = if value.is_nan() {
        f32::NAN.to_bits()
    } else {
        // A carry out of the mantissa bumps the exponent, which is the correct rounding.
        let bits = value.to_bits();
        bits.wrapping_add(0x7F + ((bits >> 8) & 1))
    };
    let [a, b, c, _] = bits.to_be_bytes();
    [a, b, c]
}

impl PartitionAdapter for FloatCodec {
    fn type_size(&self) -> usize {
        self.width.size()
    }

    #[inline]
    fn get(&self, buf: &[u8], offset: usize) -> Option<Number> {
        let value = self.read(buf, offset);
        (!value.is_nan()).then_some(Number::Float(value))
    }

    #[inline]
    fn put(&self, buf: &mut [u8], offset: usize, value: Option<Number>) {
        let value = Number::present(value).map_or(f64::NAN, Number::as_f64);
        self.write(buf, offset, value);
    }
}

use super::{Number, PartitionAdapter};

/// Signed integer slot widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntWidth {
    I8,
    I16,
    I32,
    I64,
}

impl IntWidth {
    pub fn size(self) -> usize {
        match self {
            IntWidth::I8 => 1,
            IntWidth::I16 => 2,
            IntWidth::I32 => 4,
            IntWidth::I64 => 8,
        }
    }

    /// Smallest representable value, reserved as the null sentinel.
    pub fn sentinel(self) -> i64 {
        match self {
            IntWidth::I8 => i8::MIN as i64,
            IntWidth::I16 => i16::MIN as i64,
            IntWidth::I32 => i32::MIN as i64,
            IntWidth::I64 => i64::MIN,
        }
    }

    /// Smallest value that carries data.
    pub fn min_value(self) -> i64 {
        self.sentinel() + 1
    }

    pub fn max_value(self) -> i64 {
        match self {
            IntWidth::I8 => i8::MAX as i64,
            IntWidth::I16 => i16::MAX as i64,
            IntWidth::I32 => i32::MAX as i64,
            IntWidth::I64 => i64::MAX,
        }
    }

    #[inline]
    pub(crate) fn read(self, buf: &[u8], offset: usize) -> i64 {
        let slot = &buf[offset..offset + self.size()];
        match self {
            IntWidth::I8 => slot[0] as i8 as i64,
            IntWidth::I16 => i16::from_be_bytes([slot[0], slot[1]]) as i64,
            IntWidth::I32 => i32::from_be_bytes([slot[0], slot[1], slot[2], slot[3]]) as i64,
            IntWidth::I64 => {
                let mut bytes = [0u8; 8];
                bytes.copy_from_slice(slot);
                i64::from_be_bytes(bytes)
            }
        }
    }

    /// Writes `value`, which must already be within this width's range.
    #[inline]
    pub(crate) fn write(self, buf: &mut [u8], offset: usize, value: i64) {
        let slot = &mut buf[offset..offset + self.size()];
        match self {
            IntWidth::I8 => slot[0] = (value as i8) as u8,
            IntWidth::I16 => slot.copy_from_slice(&(value as i16).to_be_bytes()),
            IntWidth::I32 => slot.copy_from_slice(&(value as i32).to_be_bytes()),
            IntWidth::I64 => slot.copy_from_slice(&value.to_be_bytes()),
        }
    }
}

/// Plain signed integer codec.
///
/// Values are clamped into `[MIN + 1, MAX]` so data never aliases the sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntCodec {
    width: IntWidth,
}

impl IntCodec {
    pub fn new(width: IntWidth) -> Self {
        Self { width }
    }

    pub fn width(&self) -> IntWidth {
        self.width
    }

    /// Reads the raw code, including the sentinel.
    #[inline]
    pub fn get_raw(&self, buf: &[u8], offset: usize) -> Option<i64> {
        let raw = self.width.read(buf, offset);
        (raw != self.width.sentinel()).then_some(raw)
    }

    #[inline]
    pub fn put_raw(&self, buf: &mut [u8], offset: usize, value: Option<i64>) {
        let code = match value {
            Some(v) => v.clamp(self.width.min_value(), self.width.max_value()),
            None => self.width.sentinel(),
        };
        self.width.write(buf, offset, code);
    }
}

impl PartitionAdapter for IntCodec {
    fn type_size(&self) -> usize {
        self.width.size()
    }

    #[inline]
    fn get(&self, buf: &[u8], offset: usize) -> Option<Number> {
        self.get_raw(buf, offset).map(Number::Int)
    }

    #[inline]
    fn put(&self, buf: &mut [u8], offset: usize, value: Option<Number>) {
        self.put_raw(buf, offset, Number::present(value).map(Number::as_i64));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int16_sentinel_is_min() {
        let codec = IntCodec::new(IntWidth::I16);
        let mut buf = [0u8; 2];
        codec.put(&mut buf, 0, None);
        assert_eq!(i16::from_be_bytes(buf), -32768);
        assert_eq!(codec.get(&buf, 0), None);
    }

    #[test]
    fn clamps_away_from_sentinel() {
        let codec = IntCodec::new(IntWidth::I8);
        let mut buf = [0u8; 1];
        codec.put(&mut buf, 0, Some(Number::Int(-1000)));
        assert_eq!(codec.get(&buf, 0), Some(Number::Int(-127)));
        codec.put(&mut buf, 0, Some(Number::Int(1000)));
        assert_eq!(codec.get(&buf, 0), Some(Number::Int(127)));
    }

    #[test]
    fn extremes_round_trip() {
        for width in [IntWidth::I8, IntWidth::I16, IntWidth::I32, IntWidth::I64] {
            let codec = IntCodec::new(width);
            let mut buf = vec![0u8; width.size() * 2];
            for v in [width.min_value(), -1, 0, 1, width.max_value()] {
                codec.put(&mut buf, width.size(), Some(Number::Int(v)));
                assert_eq!(codec.get(&buf, width.size()), Some(Number::Int(v)), "{width:?} {v}");
            }
        }
    }

    #[test]
    fn floats_round_half_to_even() {
        let codec = IntCodec::new(IntWidth::I32);
        let mut buf = [0u8; 4];
        codec.put(&mut buf, 0, Some(Number::Float(2.5)));
        assert_eq!(codec.get(&buf, 0), Some(Number::Int(2)));
        codec.put(&mut buf, 0, Some(Number::Float(-7.6)));
        assert_eq!(codec.get(&buf, 0), Some(Number::Int(-8)));
    }

    #[test]
    fn layout_is_big_endian() {
        let codec = IntCodec::new(IntWidth::I32);
        let mut buf = [0u8; 4];
        codec.put(&mut buf, 0, Some(Number::Int(0x0102_0304)));
        assert_eq!(buf, [1, 2, 3, 4]);
    }
}

//! Fixed-width slot codecs.
//!
//! Every partition file is a flat array of equally sized slots. A codec knows
//! the slot width of one [`NumberType`] and how to read or write a single
//! optional [`Number`] at a byte offset. Absence is never tagged: integer kinds
//! reserve their minimum value and float kinds use NaN.
//!
//! All slots are big-endian.

mod float;
mod integer;
mod mapped;

pub use float::{FloatCodec, FloatWidth};
pub use integer::{IntCodec, IntWidth};
pub use mapped::{curve, decurve, CurvedCodec, LinearCodec, CURVE_LIMIT};

use serde::{Deserialize, Serialize};
use std::fmt;

/// A stored sample value.
///
/// Series resolve their storage kind once; callers hand over either variant
/// and the codec converts at the slot boundary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int(v) => v as f64,
            Number::Float(v) => v,
        }
    }

    /// Integer view, rounding floats half-to-even and saturating at the i64 range.
    pub fn as_i64(self) -> i64 {
        match self {
            Number::Int(v) => v,
            Number::Float(v) => v.round_ties_even() as i64,
        }
    }

    /// NaN floats carry no value and are stored as absent.
    pub fn is_nan(self) -> bool {
        matches!(self, Number::Float(v) if v.is_nan())
    }

    /// Drops NaN so that it never reaches an integer slot as a real value.
    pub fn present(value: Option<Number>) -> Option<Number> {
        value.filter(|v| !v.is_nan())
    }
}

impl From<i64> for Number {
    fn from(value: i64) -> Self {
        Number::Int(value)
    }
}

impl From<i32> for Number {
    fn from(value: i32) -> Self {
        Number::Int(value as i64)
    }
}

impl From<f64> for Number {
    fn from(value: f64) -> Self {
        Number::Float(value)
    }
}

impl From<f32> for Number {
    fn from(value: f32) -> Self {
        Number::Float(value as f64)
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(v) => write!(f, "{v}"),
            Number::Float(v) => write!(f, "{v}"),
        }
    }
}

/// Storage kind of a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NumberType {
    Int1,
    Int2,
    Int4,
    Int8,
    Float2,
    Float3,
    Float4,
    Float8,
    Mapped1,
    Mapped2,
    Mapped4,
    Curved1,
    Curved2,
    Curved4,
}

impl NumberType {
    pub const ALL: [NumberType; 14] = [
        NumberType::Int1,
        NumberType::Int2,
        NumberType::Int4,
        NumberType::Int8,
        NumberType::Float2,
        NumberType::Float3,
        NumberType::Float4,
        NumberType::Float8,
        NumberType::Mapped1,
        NumberType::Mapped2,
        NumberType::Mapped4,
        NumberType::Curved1,
        NumberType::Curved2,
        NumberType::Curved4,
    ];

    /// Slot width in bytes.
    pub fn type_size(self) -> usize {
        match self {
            NumberType::Int1 | NumberType::Mapped1 | NumberType::Curved1 => 1,
            NumberType::Int2 | NumberType::Float2 | NumberType::Mapped2 | NumberType::Curved2 => 2,
            NumberType::Float3 => 3,
            NumberType::Int4 | NumberType::Float4 | NumberType::Mapped4 | NumberType::Curved4 => 4,
            NumberType::Int8 | NumberType::Float8 => 8,
        }
    }

    /// Mapped and curved kinds need a `[min, max]` domain.
    pub fn is_bounded(self) -> bool {
        matches!(
            self,
            NumberType::Mapped1
                | NumberType::Mapped2
                | NumberType::Mapped4
                | NumberType::Curved1
                | NumberType::Curved2
                | NumberType::Curved4
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            NumberType::Int1 => "INT1",
            NumberType::Int2 => "INT2",
            NumberType::Int4 => "INT4",
            NumberType::Int8 => "INT8",
            NumberType::Float2 => "FLOAT2",
            NumberType::Float3 => "FLOAT3",
            NumberType::Float4 => "FLOAT4",
            NumberType::Float8 => "FLOAT8",
            NumberType::Mapped1 => "MAPPED1",
            NumberType::Mapped2 => "MAPPED2",
            NumberType::Mapped4 => "MAPPED4",
            NumberType::Curved1 => "CURVED1",
            NumberType::Curved2 => "CURVED2",
            NumberType::Curved4 => "CURVED4",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        let upper = name.to_ascii_uppercase();
        Self::ALL.into_iter().find(|ty| ty.name() == upper)
    }
}

impl fmt::Display for NumberType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Real-valued domain of a mapped or curved series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    pub fn new(min: f64, max: f64) -> Option<Self> {
        (min.is_finite() && max.is_finite() && min < max).then_some(Self { min, max })
    }
}

/// Encode/decode strategy for one storage kind.
pub trait PartitionAdapter {
    /// Slot width in bytes.
    fn type_size(&self) -> usize;

    /// Reads the slot at `offset`; the null sentinel reads as `None`.
    fn get(&self, buf: &[u8], offset: usize) -> Option<Number>;

    /// Writes the slot at `offset`; `None` writes the exact sentinel bits.
    fn put(&self, buf: &mut [u8], offset: usize, value: Option<Number>);

    /// Fills every slot of `buf` with the null sentinel.
    fn fill_absent(&self, buf: &mut [u8]) {
        let size = self.type_size();
        let slots = buf.len() / size;
        for slot in 0..slots {
            self.put(buf, slot * size, None);
        }
    }
}

/// Codec resolved once per series.
///
/// The enum keeps the hot read/write loop on a `match` instead of a vtable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Codec {
    Int(IntCodec),
    Float(FloatCodec),
    Linear(LinearCodec),
    Curved(CurvedCodec),
}

impl Codec {
    /// Builds the codec for `ty`. Bounded kinds return `None` without bounds.
    pub fn new(ty: NumberType, bounds: Option<Bounds>) -> Option<Self> {
        let codec = match ty {
            NumberType::Int1 => Codec::Int(IntCodec::new(IntWidth::I8)),
            NumberType::Int2 => Codec::Int(IntCodec::new(IntWidth::I16)),
            NumberType::Int4 => Codec::Int(IntCodec::new(IntWidth::I32)),
            NumberType::Int8 => Codec::Int(IntCodec::new(IntWidth::I64)),
            NumberType::Float2 => Codec::Float(FloatCodec::new(FloatWidth::F16)),
            NumberType::Float3 => Codec::Float(FloatCodec::new(FloatWidth::F24)),
            NumberType::Float4 => Codec::Float(FloatCodec::new(FloatWidth::F32)),
            NumberType::Float8 => Codec::Float(FloatCodec::new(FloatWidth::F64)),
            NumberType::Mapped1 => Codec::Linear(LinearCodec::new(IntWidth::I8, bounds?)),
            NumberType::Mapped2 => Codec::Linear(LinearCodec::new(IntWidth::I16, bounds?)),
            NumberType::Mapped4 => Codec::Linear(LinearCodec::new(IntWidth::I32, bounds?)),
            NumberType::Curved1 => Codec::Curved(CurvedCodec::new(IntWidth::I8, bounds?)),
            NumberType::Curved2 => Codec::Curved(CurvedCodec::new(IntWidth::I16, bounds?)),
            NumberType::Curved4 => Codec::Curved(CurvedCodec::new(IntWidth::I32, bounds?)),
        };
        Some(codec)
    }
}

impl PartitionAdapter for Codec {
    fn type_size(&self) -> usize {
        match self {
            Codec::Int(c) => c.type_size(),
            Codec::Float(c) => c.type_size(),
            Codec::Linear(c) => c.type_size(),
            Codec::Curved(c) => c.type_size(),
        }
    }

    #[inline]
    fn get(&self, buf: &[u8], offset: usize) -> Option<Number> {
        match self {
            Codec::Int(c) => c.get(buf, offset),
            Codec::Float(c) => c.get(buf, offset),
            Codec::Linear(c) => c.get(buf, offset),
            Codec::Curved(c) => c.get(buf, offset),
        }
    }

    #[inline]
    fn put(&self, buf: &mut [u8], offset: usize, value: Option<Number>) {
        match self {
            Codec::Int(c) => c.put(buf, offset, value),
            Codec::Float(c) => c.put(buf, offset, value),
            Codec::Linear(c) => c.put(buf, offset, value),
            Codec::Curved(c) => c.put(buf, offset, value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds() -> Option<Bounds> {
        Bounds::new(-50.0, 150.0)
    }

    /// Largest distance between neighbouring decoded values around `v`.
    fn step_near(codec: &Codec, v: f64) -> f64 {
        let (a, b) = match codec {
            Codec::Linear(c) => {
                let code = c.encode(v);
                (c.decode(code - 1), c.decode(code + 1))
            }
            Codec::Curved(c) => {
                let code = c.encode(v);
                (c.decode(code - 1), c.decode(code + 1))
            }
            _ => return 0.0,
        };
        (b - a).abs()
    }

    #[test]
    fn type_sizes_match_codecs() {
        for ty in NumberType::ALL {
            let codec = Codec::new(ty, bounds()).unwrap();
            assert_eq!(codec.type_size(), ty.type_size(), "{ty}");
        }
    }

    #[test]
    fn bounded_kinds_require_bounds() {
        for ty in NumberType::ALL {
            assert_eq!(Codec::new(ty, None).is_some(), !ty.is_bounded(), "{ty}");
        }
        assert!(Bounds::new(1.0, 1.0).is_none());
        assert!(Bounds::new(2.0, 1.0).is_none());
        assert!(Bounds::new(f64::NAN, 1.0).is_none());
    }

    #[test]
    fn absent_round_trips_for_every_kind() {
        for ty in NumberType::ALL {
            let codec = Codec::new(ty, bounds()).unwrap();
            let mut buf = vec![0u8; codec.type_size() * 3];
            codec.put(&mut buf, codec.type_size(), None);
            assert_eq!(codec.get(&buf, codec.type_size()), None, "{ty}");
        }
    }

    #[test]
    fn values_round_trip_within_one_step() {
        let samples = [-12.5, 0.0, 3.25, 42.0, 99.75];
        for ty in NumberType::ALL {
            let codec = Codec::new(ty, bounds()).unwrap();
            let size = codec.type_size();
            let mut buf = vec![0u8; size];
            for v in samples {
                codec.put(&mut buf, 0, Some(Number::Float(v)));
                let back = codec.get(&buf, 0).unwrap().as_f64();
                let tolerance = match ty {
                    NumberType::Int1 | NumberType::Int2 | NumberType::Int4 | NumberType::Int8 => 0.5,
                    NumberType::Float2 => v.abs() / 1024.0 + 1e-3,
                    NumberType::Float3 => v.abs() / 32768.0 + 1e-6,
                    NumberType::Float4 => v.abs() * 1e-7,
                    NumberType::Float8 => 0.0,
                    _ => step_near(&codec, v),
                };
                assert!(
                    (back - v).abs() <= tolerance,
                    "{ty}: wrote {v}, read {back}, tolerance {tolerance}"
                );
            }
        }
    }

    #[test]
    fn nan_is_stored_as_absent() {
        for ty in NumberType::ALL {
            let codec = Codec::new(ty, bounds()).unwrap();
            let mut buf = vec![0u8; codec.type_size()];
            codec.put(&mut buf, 0, Some(Number::Float(f64::NAN)));
            assert_eq!(codec.get(&buf, 0), None, "{ty}");
        }
    }

    #[test]
    fn number_type_names_round_trip() {
        for ty in NumberType::ALL {
            assert_eq!(NumberType::parse(ty.name()), Some(ty));
            let json = serde_json::to_string(&ty).unwrap();
            assert_eq!(json, format!("\"{}\"", ty.name()));
        }
        assert_eq!(NumberType::parse("float8"), Some(NumberType::Float8));
        assert_eq!(NumberType::parse("FLOAT16"), None);
    }

    #[test]
    fn number_conversions() {
        assert_eq!(Number::Float(2.5).as_i64(), 2);
        assert_eq!(Number::Float(3.5).as_i64(), 4);
        assert_eq!(Number::Int(7).as_f64(), 7.0);
        assert_eq!(Number::present(Some(Number::Float(f64::NAN))), None);
        let parsed: Number = serde_json::from_str("4").unwrap();
        assert_eq!(parsed, Number::Int(4));
        let parsed: Number = serde_json::from_str("4.2").unwrap();
        assert_eq!(parsed, Number::Float(4.2));
    }
}

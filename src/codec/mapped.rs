use super::{Bounds, IntCodec, IntWidth, Number, PartitionAdapter};

/// `|x|` limit applied before the curve; the curve is flat beyond it.
pub const CURVE_LIMIT: f64 = 3.0;

/// Saturating curve, `2 / (1 + e^-2x) - 1`.
#[inline]
pub fn curve(x: f64) -> f64 {
    2.0 / (1.0 + (-2.0 * x).exp()) - 1.0
}

/// Inverse of [`curve`], `0.5 * ln((1 + y) / (1 - y))`.
#[inline]
pub fn decurve(y: f64) -> f64 {
    0.5 * ((1.0 + y) / (1.0 - y)).ln()
}

/// Linear packing of `[min, max]` onto `[inner MIN + 1, inner MAX]`.
///
/// Inputs outside the domain are clamped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearCodec {
    inner: IntCodec,
    bounds: Bounds,
}

impl LinearCodec {
    pub fn new(width: IntWidth, bounds: Bounds) -> Self {
        Self {
            inner: IntCodec::new(width),
            bounds,
        }
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    fn usable_range(&self) -> f64 {
        let width = self.inner.width();
        width.max_value() as f64 - width.min_value() as f64
    }

    pub fn encode(&self, value: f64) -> i64 {
        let Bounds { min, max } = self.bounds;
        let ratio = (value.clamp(min, max) - min) / (max - min);
        (ratio * self.usable_range() + self.inner.width().min_value() as f64).round_ties_even() as i64
    }

    pub fn decode(&self, code: i64) -> f64 {
        let Bounds { min, max } = self.bounds;
        let ratio = (code as f64 - self.inner.width().min_value() as f64) / self.usable_range();
        ratio * (max - min) + min
    }
}

impl PartitionAdapter for LinearCodec {
    fn type_size(&self) -> usize {
        self.inner.width().size()
    }

    #[inline]
    fn get(&self, buf: &[u8], offset: usize) -> Option<Number> {
        self.inner
            .get_raw(buf, offset)
            .map(|code| Number::Float(self.decode(code)))
    }

    #[inline]
    fn put(&self, buf: &mut [u8], offset: usize, value: Option<Number>) {
        let code = Number::present(value).map(|v| self.encode(v.as_f64()));
        self.inner.put_raw(buf, offset, code);
    }
}

/// Nonlinear packing that spends more codes near the domain midpoint.
///
/// The value is expressed as a ratio of the half-domain around the midpoint,
/// limited to `±CURVE_LIMIT`, passed through [`curve`] and scaled onto the
/// symmetric code range `[-MAX, MAX]` of the inner width.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurvedCodec {
    inner: IntCodec,
    bounds: Bounds,
}

impl CurvedCodec {
    pub fn new(width: IntWidth, bounds: Bounds) -> Self {
        Self {
            inner: IntCodec::new(width),
            bounds,
        }
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    fn mid(&self) -> f64 {
        (self.bounds.min + self.bounds.max) / 2.0
    }

    fn half(&self) -> f64 {
        (self.bounds.max - self.bounds.min) / 2.0
    }

    fn scale(&self) -> f64 {
        self.inner.width().max_value() as f64
    }

    pub fn encode(&self, value: f64) -> i64 {
        let x = ((value - self.mid()) / self.half()).clamp(-CURVE_LIMIT, CURVE_LIMIT);
        (curve(x) * self.scale()).round_ties_even() as i64
    }

    pub fn decode(&self, code: i64) -> f64 {
        let y = code as f64 / self.scale();
        let x = decurve(y).clamp(-CURVE_LIMIT, CURVE_LIMIT);
        x * self.half() + self.mid()
    }
}

impl PartitionAdapter for CurvedCodec {
    fn type_size(&self) -> usize {
        self.inner.width().size()
    }

    #[inline]
    fn get(&self, buf: &[u8], offset: usize) -> Option<Number> {
        self.inner
            .get_raw(buf, offset)
            .map(|code| Number::Float(self.decode(code)))
    }

    #[inline]
    fn put(&self, buf: &mut [u8], offset: usize, value: Option<Number>) {
        let code = Number::present(value).map(|v| self.encode(v.as_f64()));
        self.inner.put_raw(buf, offset, code);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn curved16() -> CurvedCodec {
        CurvedCodec::new(IntWidth::I16, Bounds::new(-32767.0, 32767.0).unwrap())
    }

    fn stored_code(codec: &impl PartitionAdapter, value: Option<Number>) -> i16 {
        let mut buf = [0u8; 2];
        codec.put(&mut buf, 0, value);
        i16::from_be_bytes(buf)
    }

    #[test]
    fn curved_fixture_codes() {
        let codec = curved16();
        assert_eq!(stored_code(&codec, Some(Number::Float(1.234))), 1);
        assert_eq!(stored_code(&codec, None), -32768);
        assert_eq!(stored_code(&codec, Some(Number::Float(50000.0))), 29809);
        assert_eq!(stored_code(&codec, Some(Number::Float(-50000.0))), -29809);
    }

    #[test]
    fn curved_saturates_far_outside_domain() {
        let codec = curved16();
        let limit = codec.encode(1e12);
        assert_eq!(limit, codec.encode(3.0 * 32767.0));
        assert_eq!(codec.encode(-1e12), -limit);
    }

    #[test]
    fn curved_has_finer_steps_near_midpoint() {
        let codec = CurvedCodec::new(IntWidth::I8, Bounds::new(0.0, 100.0).unwrap());
        let near_mid = codec.decode(1) - codec.decode(0);
        let near_edge = codec.decode(97) - codec.decode(96);
        assert!(near_mid < near_edge, "{near_mid} vs {near_edge}");
    }

    #[test]
    fn curve_and_decurve_are_inverse() {
        for x in [-2.5, -1.0, -0.1, 0.0, 0.3, 1.7, 2.9] {
            assert!((decurve(curve(x)) - x).abs() < 1e-9, "{x}");
        }
        assert!((curve(1.0) - 1f64.tanh()).abs() < 1e-12);
    }

    #[test]
    fn linear_clamps_and_spans_usable_range() {
        let codec = LinearCodec::new(IntWidth::I8, Bounds::new(0.0, 10.0).unwrap());
        assert_eq!(codec.encode(0.0), -127);
        assert_eq!(codec.encode(10.0), 127);
        assert_eq!(codec.encode(-5.0), -127);
        assert_eq!(codec.encode(25.0), 127);
        assert_eq!(codec.decode(-127), 0.0);
        assert_eq!(codec.decode(127), 10.0);
    }

    #[test]
    fn linear_round_trip_within_step() {
        let bounds = Bounds::new(-40.0, 85.0).unwrap();
        let codec = LinearCodec::new(IntWidth::I16, bounds);
        let step = (bounds.max - bounds.min) / 65534.0;
        let mut buf = [0u8; 2];
        for v in [-40.0, -3.3, 0.0, 21.7, 85.0] {
            codec.put(&mut buf, 0, Some(Number::Float(v)));
            let back = codec.get(&buf, 0).unwrap().as_f64();
            assert!((back - v).abs() <= step, "{v} -> {back}");
        }
        codec.put(&mut buf, 0, None);
        assert_eq!(codec.get(&buf, 0), None);
    }
}

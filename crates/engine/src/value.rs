//! Numeric value abstraction for stat pipelines.
//!
//! Every stat value type provides the two combination primitives the
//! modifier vocabulary needs (`add`, `mul`) plus a stable byte encoding
//! that feeds the modifier content hash. Integer implementations use
//! saturating arithmetic so a pathological modifier stack degrades to a
//! clamped value instead of a panic.

/// A value that can flow through a stat's modifier pipeline.
///
/// The encoding contract: two equal values encode to identical bytes, and
/// values of different implementing types never encode to the same bytes
/// (each implementation prefixes a distinct kind byte). The encoding is
/// what makes modifier hashes stable across process runs.
pub trait StatValue: Copy + PartialEq + core::fmt::Debug + 'static {
    /// Combine by addition.
    fn add(self, rhs: Self) -> Self;

    /// Combine by multiplication.
    fn mul(self, rhs: Self) -> Self;

    /// Append a stable byte encoding of this value to `out`.
    fn encode(&self, out: &mut Vec<u8>);
}

impl StatValue for i32 {
    fn add(self, rhs: Self) -> Self {
        self.saturating_add(rhs)
    }

    fn mul(self, rhs: Self) -> Self {
        self.saturating_mul(rhs)
    }

    fn encode(&self, out: &mut Vec<u8>) {
        out.push(0x01);
        out.extend_from_slice(&self.to_le_bytes());
    }
}

impl StatValue for i64 {
    fn add(self, rhs: Self) -> Self {
        self.saturating_add(rhs)
    }

    fn mul(self, rhs: Self) -> Self {
        self.saturating_mul(rhs)
    }

    fn encode(&self, out: &mut Vec<u8>) {
        out.push(0x02);
        out.extend_from_slice(&self.to_le_bytes());
    }
}

impl StatValue for f32 {
    fn add(self, rhs: Self) -> Self {
        self + rhs
    }

    fn mul(self, rhs: Self) -> Self {
        self * rhs
    }

    fn encode(&self, out: &mut Vec<u8>) {
        out.push(0x03);
        out.extend_from_slice(&self.to_bits().to_le_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_arithmetic_saturates() {
        assert_eq!(StatValue::add(i32::MAX, 1), i32::MAX);
        assert_eq!(StatValue::mul(i32::MIN, 2), i32::MIN);
        assert_eq!(StatValue::add(10, 5), 15);
        assert_eq!(StatValue::mul(10, 2), 20);
    }

    #[test]
    fn encodings_are_type_disjoint() {
        let mut a = Vec::new();
        let mut b = Vec::new();
        5i32.encode(&mut a);
        5i64.encode(&mut b);
        assert_ne!(a, b);
    }

    #[test]
    fn equal_values_encode_identically() {
        let mut a = Vec::new();
        let mut b = Vec::new();
        2.5f32.encode(&mut a);
        2.5f32.encode(&mut b);
        assert_eq!(a, b);
    }
}

use nalgebra::{Point3, Vector3};
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

/// A location in real space
pub type Point = Point3<f64>;

/// A direction (or difference between two [Point]s) in real space
pub type Vector = Vector3<f64>;

/// Coordinates of a point in the reference space of an element.
///
/// One dimensional elements only use the first entry.
pub type RefPoint = [f64; 2];

/// Default accuracy used when comparing [FloatRep]s
pub const FLOAT_UNIQUENESS_ACCURACY: f64 = 1e-12;

/// z-component of the cross product between two vectors lying in the xy-plane
#[inline]
pub fn cross_z(a: &Vector, b: &Vector) -> f64 {
    a.x * b.y - a.y * b.x
}

/// In-plane vector perpendicular to `t` (rotated by -90°)
#[inline]
pub fn perp_2d(t: &Vector) -> Vector {
    Vector::new(t.y, -t.x, 0.0)
}

/// Rounded representation of a floating point value used for exact comparisons and ordering
///
/// Two values which are within the designated accuracy of one another (and do not straddle a rounding boundary) produce equal `FloatRep`s.
#[derive(Clone, Copy, Debug)]
pub struct FloatRep {
    sign: bool,
    bits: u64,
}

impl FloatRep {
    pub fn from(value: f64) -> Self {
        Self::with_accuracy(value, FLOAT_UNIQUENESS_ACCURACY)
    }

    pub fn with_accuracy(value: f64, accuracy: f64) -> Self {
        let integer_part = value.abs().trunc();
        let fractional_rounded = (value.abs().fract() / accuracy).round() * accuracy;
        let total_rounded = integer_part + fractional_rounded;

        Self {
            // a value that rounds to zero has no meaningful sign
            sign: value.is_sign_positive() || total_rounded == 0.0,
            bits: total_rounded.to_bits(),
        }
    }

    /// The rounded value
    pub fn value(&self) -> f64 {
        let magnitude = f64::from_bits(self.bits);
        if self.sign {
            magnitude
        } else {
            -magnitude
        }
    }
}

impl PartialEq for FloatRep {
    fn eq(&self, other: &Self) -> bool {
        self.sign == other.sign && self.bits == other.bits
    }
}

impl Eq for FloatRep {}

impl Hash for FloatRep {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.sign.hash(state);
        self.bits.hash(state);
    }
}

impl Ord for FloatRep {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value().total_cmp(&other.value())
    }
}

impl PartialOrd for FloatRep {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_rep_equality() {
        assert_eq!(FloatRep::from(0.5), FloatRep::from(0.5 + 1e-14));
        assert_ne!(FloatRep::from(0.5), FloatRep::from(0.5 + 1e-9));
        assert_eq!(FloatRep::from(0.0), FloatRep::from(-1e-15));

        assert_eq!(
            FloatRep::with_accuracy(0.25, 1e-6),
            FloatRep::with_accuracy(0.2500000004, 1e-6)
        );
        assert_ne!(FloatRep::from(-0.25), FloatRep::from(0.25));
    }

    #[test]
    fn float_rep_ordering() {
        let mut values: Vec<FloatRep> = [0.75, -0.5, 0.25, -1.0]
            .iter()
            .map(|v| FloatRep::from(*v))
            .collect();
        values.sort();

        let sorted: Vec<f64> = values.iter().map(|fr| fr.value()).collect();
        assert_eq!(sorted, vec![-1.0, -0.5, 0.25, 0.75]);
    }

    #[test]
    fn in_plane_helpers() {
        let t = Vector::new(1.0, 0.0, 0.0);
        let n = perp_2d(&t);
        assert!((n - Vector::new(0.0, -1.0, 0.0)).norm() < 1e-14);
        assert!((cross_z(&t, &Vector::new(0.0, 2.0, 0.0)) - 2.0).abs() < 1e-14);
    }
}

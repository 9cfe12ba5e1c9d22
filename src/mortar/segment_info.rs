#[cfg(feature = "json_export")]
use json::{object, JsonValue};
use std::fmt;

// tolerance used when checking that reference coordinates lie within [-1, 1]
const REF_TOLERANCE: f64 = 1e-6;

/// Describes where a single mortar segment lies on the secondary and (optional) primary lower-dimensional elements
///
/// For 1D segments:
/// ```text
///   secondary:   -1 ----[xi1_a ===== xi1_b]---- +1
///                          |           |
///   primary:     +1 ----[xi2_a ===== xi2_b]---- -1
/// ```
///
/// Segments of a 3D mortar mesh do not use the interval fields; they instead record which linear sub-element of the secondary element they were clipped from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MortarSegmentInfo {
    pub xi1_a: f64,
    pub xi1_b: f64,
    pub xi2_a: f64,
    pub xi2_b: f64,
    pub secondary_elem: usize,
    pub primary_elem: Option<usize>,
    pub sub_elem: usize,
}

impl MortarSegmentInfo {
    /// Sentinel for an interval endpoint which has not been (or cannot be) determined
    pub const INVALID_XI: f64 = 99999.0;

    pub fn new(secondary_elem: usize) -> Self {
        Self {
            xi1_a: Self::INVALID_XI,
            xi1_b: Self::INVALID_XI,
            xi2_a: Self::INVALID_XI,
            xi2_b: Self::INVALID_XI,
            secondary_elem,
            primary_elem: None,
            sub_elem: 0,
        }
    }

    pub fn has_primary(&self) -> bool {
        self.primary_elem.is_some()
    }

    /// True for segments of a 3D mortar mesh
    pub fn is_surface_segment(&self) -> bool {
        self.xi1_a == Self::INVALID_XI && self.xi1_b == Self::INVALID_XI
    }

    /// Check the geometric consistency of the segment
    pub fn is_valid(&self) -> bool {
        if self.is_surface_segment() {
            return true;
        }

        let in_range = |xi: f64| xi.abs() < 1.0 + REF_TOLERANCE;

        let secondary_ok = in_range(self.xi1_a)
            && in_range(self.xi1_b)
            && (self.xi1_a - self.xi1_b).abs() > REF_TOLERANCE;

        let primary_ok = match self.primary_elem {
            Some(_) => in_range(self.xi2_a) && in_range(self.xi2_b),
            None => true,
        };

        secondary_ok && primary_ok
    }

    /// Length of the segment in the secondary element's reference space
    pub fn xi1_length(&self) -> f64 {
        (self.xi1_b - self.xi1_a).abs()
    }

    #[cfg(feature = "json_export")]
    pub fn to_json(&self) -> JsonValue {
        let mut info_obj = object! {
            "secondary_elem": self.secondary_elem,
            "sub_elem": self.sub_elem,
        };
        if !self.is_surface_segment() {
            info_obj["xi1"] = JsonValue::from(vec![self.xi1_a, self.xi1_b]);
            info_obj["xi2"] = JsonValue::from(vec![self.xi2_a, self.xi2_b]);
        }
        if let Some(primary) = self.primary_elem {
            info_obj["primary_elem"] = JsonValue::from(primary);
        }
        info_obj
    }
}

impl fmt::Display for MortarSegmentInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "secondary Elem {}", self.secondary_elem)?;
        if self.is_surface_segment() {
            write!(f, " (sub-elem {})", self.sub_elem)?;
        } else {
            write!(f, " xi1: [{}, {}]", self.xi1_a, self.xi1_b)?;
        }
        match self.primary_elem {
            Some(primary) if !self.is_surface_segment() => write!(
                f,
                "; primary Elem {} xi2: [{}, {}]",
                primary, self.xi2_a, self.xi2_b
            ),
            Some(primary) => write!(f, "; primary Elem {}", primary),
            None => write!(f, "; no primary"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validity() {
        let mut info = MortarSegmentInfo::new(3);
        assert!(info.is_surface_segment());
        assert!(!info.has_primary());

        info.xi1_a = -1.0;
        info.xi1_b = 0.25;
        assert!(info.is_valid());
        assert!((info.xi1_length() - 1.25).abs() < 1e-14);

        // a primary element requires a valid primary interval
        info.primary_elem = Some(7);
        assert!(!info.is_valid());
        info.xi2_a = 1.0;
        info.xi2_b = -0.5;
        assert!(info.is_valid());

        info.xi1_b = info.xi1_a;
        assert!(!info.is_valid());
    }

    #[test]
    fn display() {
        let info = MortarSegmentInfo {
            xi1_a: -1.0,
            xi1_b: 1.0,
            xi2_a: 1.0,
            xi2_b: -1.0,
            secondary_elem: 2,
            primary_elem: Some(3),
            sub_elem: 0,
        };
        assert_eq!(
            info.to_string(),
            "secondary Elem 2 xi1: [-1, 1]; primary Elem 3 xi2: [1, -1]"
        );
    }
}

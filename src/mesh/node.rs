use super::space::Point;
#[cfg(feature = "json_export")]
use json::{array, object, JsonValue};

/// A point in real space.
/// Groups of Nodes describe [Elem](super::elem::Elem)s of every dimension
#[derive(Debug, Clone)]
pub struct Node {
    pub id: usize,
    pub coords: Point,
}

impl Node {
    pub fn new(id: usize, coords: Point) -> Self {
        Self { id, coords }
    }

    /// Produce a Json Object that describes this Node
    #[cfg(feature = "json_export")]
    pub fn to_json(&self) -> JsonValue {
        object! {
            "id": self.id,
            "coords": array![self.coords.x, self.coords.y, self.coords.z],
        }
    }
}

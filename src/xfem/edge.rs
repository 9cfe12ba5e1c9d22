use super::node::NodeKey;
use crate::mesh::space::FloatRep;
use smallvec::{smallvec, SmallVec};

// accuracy with which intersection positions are compared
const INTERSECTION_ACCURACY: f64 = 1e-6;

/// The point at which a cut crosses an edge
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intersection {
    /// Position along the edge measured from its first node, in `(0, 1)`
    pub position: f64,
    pub node: NodeKey,
}

/// An edge between two nodes which may be intersected by a cut
///
/// ```text
///   nodes[0] o-------x--------------o nodes[1]
///            |<----->|
///            position  (embedded node at x)
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct CutEdge {
    pub nodes: [NodeKey; 2],
    intersection: Option<Intersection>,
}

impl CutEdge {
    pub fn new(node_0: NodeKey, node_1: NodeKey) -> Self {
        Self {
            nodes: [node_0, node_1],
            intersection: None,
        }
    }

    pub fn has_intersection(&self) -> bool {
        self.intersection.is_some()
    }

    /// The embedded node at the intersection (if any)
    pub fn embedded_node(&self) -> Option<NodeKey> {
        self.intersection.map(|inter| inter.node)
    }

    /// Either of the end nodes or the embedded node
    pub fn contains_node(&self, node: NodeKey) -> bool {
        self.nodes.contains(&node) || self.embedded_node() == Some(node)
    }

    /// Both nodes of `other` lie on this edge (including on its intersection)
    pub fn contains_edge(&self, other: &CutEdge) -> bool {
        self.contains_node(other.nodes[0]) && self.contains_node(other.nodes[1])
    }

    /// The two edges connect the same pair of nodes
    pub fn is_overlapping(&self, other: &CutEdge) -> bool {
        (self.nodes[0] == other.nodes[0] && self.nodes[1] == other.nodes[1])
            || (self.nodes[0] == other.nodes[1] && self.nodes[1] == other.nodes[0])
    }

    pub fn equivalent(&self, other: &CutEdge) -> bool {
        self.is_overlapping(other)
    }

    /// Both nodes are embedded nodes (i.e. the edge crosses the interior of an element)
    pub fn is_interior_edge(&self) -> bool {
        self.nodes[0].is_embedded() && self.nodes[1].is_embedded()
    }

    /// Add an intersection at `position`, measured from `from_node`
    ///
    /// Returns false if `from_node` is not one of the edge's end nodes.
    pub fn add_intersection(&mut self, position: f64, node: NodeKey, from_node: NodeKey) -> bool {
        let position = if from_node == self.nodes[0] {
            position
        } else if from_node == self.nodes[1] {
            1.0 - position
        } else {
            return false;
        };

        self.intersection = Some(Intersection { position, node });
        true
    }

    /// The position of the intersection measured from `from_node`
    pub fn intersection(&self, from_node: NodeKey) -> Option<f64> {
        let inter = self.intersection?;
        if from_node == self.nodes[0] {
            Some(inter.position)
        } else if from_node == self.nodes[1] {
            Some(1.0 - inter.position)
        } else {
            None
        }
    }

    pub fn has_intersection_at_position(&self, position: f64, from_node: NodeKey) -> bool {
        match self.intersection(from_node) {
            Some(existing) => {
                FloatRep::with_accuracy(existing, INTERSECTION_ACCURACY)
                    == FloatRep::with_accuracy(position, INTERSECTION_ACCURACY)
            }
            None => false,
        }
    }

    /// Remove the intersection from this edge
    pub fn remove_embedded_node(&mut self) -> Option<NodeKey> {
        self.intersection.take().map(|inter| inter.node)
    }

    /// Replace `old_node` with `new_node` among the end nodes and the embedded node
    pub fn switch_node(&mut self, new_node: NodeKey, old_node: NodeKey) {
        for node in self.nodes.iter_mut() {
            if *node == old_node {
                *node = new_node;
            }
        }
        if let Some(inter) = self.intersection.as_mut() {
            if inter.node == old_node {
                inter.node = new_node;
            }
        }
    }

    pub fn reverse_nodes(&mut self) {
        self.nodes.swap(0, 1);
        if let Some(inter) = self.intersection.as_mut() {
            inter.position = 1.0 - inter.position;
        }
    }

    /// The nodes (and weights) whose interpolation gives the location of `node`
    pub fn node_masters(&self, node: NodeKey) -> Option<SmallVec<[(NodeKey, f64); 4]>> {
        if node == self.nodes[0] {
            Some(smallvec![(self.nodes[0], 1.0)])
        } else if node == self.nodes[1] {
            Some(smallvec![(self.nodes[1], 1.0)])
        } else {
            match self.intersection {
                Some(inter) if inter.node == node => Some(smallvec![
                    (self.nodes[0], 1.0 - inter.position),
                    (self.nodes[1], inter.position)
                ]),
                _ => None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge() -> CutEdge {
        CutEdge::new(NodeKey::permanent(0), NodeKey::permanent(1))
    }

    #[test]
    fn intersections() {
        let mut e = edge();
        assert!(!e.has_intersection());
        assert!(!e.add_intersection(0.5, NodeKey::embedded(0), NodeKey::permanent(5)));

        assert!(e.add_intersection(0.25, NodeKey::embedded(0), NodeKey::permanent(1)));
        assert_eq!(e.intersection(NodeKey::permanent(0)), Some(0.75));
        assert_eq!(e.intersection(NodeKey::permanent(1)), Some(0.25));
        assert!(e.has_intersection_at_position(0.75 + 1e-9, NodeKey::permanent(0)));
        assert!(!e.has_intersection_at_position(0.25, NodeKey::permanent(0)));

        assert!(e.contains_node(NodeKey::embedded(0)));
        assert!(e.contains_edge(&CutEdge::new(NodeKey::embedded(0), NodeKey::permanent(1))));
        assert!(!e.contains_edge(&CutEdge::new(NodeKey::embedded(0), NodeKey::permanent(2))));

        e.reverse_nodes();
        assert_eq!(e.nodes[0], NodeKey::permanent(1));
        assert_eq!(e.intersection(NodeKey::permanent(0)), Some(0.75));

        assert_eq!(e.remove_embedded_node(), Some(NodeKey::embedded(0)));
        assert!(!e.has_intersection());
    }

    #[test]
    fn overlap_and_switch() {
        let mut e = edge();
        let reversed = CutEdge::new(NodeKey::permanent(1), NodeKey::permanent(0));
        assert!(e.is_overlapping(&reversed));
        assert!(e.equivalent(&reversed));
        assert!(!e.is_interior_edge());

        e.add_intersection(0.5, NodeKey::embedded(3), NodeKey::permanent(0));
        e.switch_node(NodeKey::embedded(4), NodeKey::embedded(3));
        e.switch_node(NodeKey::permanent(9), NodeKey::permanent(1));
        assert_eq!(e.embedded_node(), Some(NodeKey::embedded(4)));
        assert_eq!(e.nodes, [NodeKey::permanent(0), NodeKey::permanent(9)]);
        assert!(!e.is_overlapping(&reversed));
    }

    #[test]
    fn masters() {
        let mut e = edge();
        e.add_intersection(0.2, NodeKey::embedded(0), NodeKey::permanent(0));

        let masters = e.node_masters(NodeKey::embedded(0)).unwrap();
        assert_eq!(masters[0].0, NodeKey::permanent(0));
        assert!((masters[0].1 - 0.8).abs() < 1e-14);
        assert!((masters[1].1 - 0.2).abs() < 1e-14);

        assert_eq!(e.node_masters(NodeKey::permanent(1)).unwrap().len(), 1);
        assert!(e.node_masters(NodeKey::embedded(1)).is_none());
    }
}

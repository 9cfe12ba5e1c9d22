use super::{MeshError, SubdomainId};
#[cfg(feature = "json_export")]
use json::{object, JsonValue};
use smallvec::SmallVec;
use std::fmt;

/// The Lagrange element types understood by the [Mesh](super::Mesh)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ElemType {
    Edge2,
    Edge3,
    Tri3,
    Tri6,
    Quad4,
    Quad9,
    Tet4,
    Hex8,
}

// node indices on each side of each element type; sides are ordered counter-clockwise (2D)
// or with outward facing right-hand normals (3D)
static EDGE_SIDES: [&[usize]; 2] = [&[0], &[1]];
static TRI3_SIDES: [&[usize]; 3] = [&[0, 1], &[1, 2], &[2, 0]];
static TRI6_SIDES: [&[usize]; 3] = [&[0, 1, 3], &[1, 2, 4], &[2, 0, 5]];
static QUAD4_SIDES: [&[usize]; 4] = [&[0, 1], &[1, 2], &[2, 3], &[3, 0]];
static QUAD9_SIDES: [&[usize]; 4] = [&[0, 1, 4], &[1, 2, 5], &[2, 3, 6], &[3, 0, 7]];
static TET4_SIDES: [&[usize]; 4] = [&[0, 2, 1], &[0, 1, 3], &[1, 2, 3], &[2, 0, 3]];
static HEX8_SIDES: [&[usize]; 6] = [
    &[0, 3, 2, 1],
    &[0, 1, 5, 4],
    &[1, 2, 6, 5],
    &[2, 3, 7, 6],
    &[3, 0, 4, 7],
    &[4, 5, 6, 7],
];

impl ElemType {
    /// Parse an element type from its name in a mesh file
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "EDGE2" => Some(Self::Edge2),
            "EDGE3" => Some(Self::Edge3),
            "TRI3" => Some(Self::Tri3),
            "TRI6" => Some(Self::Tri6),
            "QUAD4" => Some(Self::Quad4),
            "QUAD9" => Some(Self::Quad9),
            "TET4" => Some(Self::Tet4),
            "HEX8" => Some(Self::Hex8),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Edge2 => "EDGE2",
            Self::Edge3 => "EDGE3",
            Self::Tri3 => "TRI3",
            Self::Tri6 => "TRI6",
            Self::Quad4 => "QUAD4",
            Self::Quad9 => "QUAD9",
            Self::Tet4 => "TET4",
            Self::Hex8 => "HEX8",
        }
    }

    pub fn dim(&self) -> usize {
        match self {
            Self::Edge2 | Self::Edge3 => 1,
            Self::Tri3 | Self::Tri6 | Self::Quad4 | Self::Quad9 => 2,
            Self::Tet4 | Self::Hex8 => 3,
        }
    }

    pub fn n_nodes(&self) -> usize {
        match self {
            Self::Edge2 => 2,
            Self::Edge3 => 3,
            Self::Tri3 => 3,
            Self::Tri6 => 6,
            Self::Quad4 => 4,
            Self::Quad9 => 9,
            Self::Tet4 => 4,
            Self::Hex8 => 8,
        }
    }

    /// Number of nodes at the corners of the element
    pub fn n_vertices(&self) -> usize {
        match self {
            Self::Edge2 | Self::Edge3 => 2,
            Self::Tri3 | Self::Tri6 => 3,
            Self::Quad4 | Self::Quad9 | Self::Tet4 => 4,
            Self::Hex8 => 8,
        }
    }

    pub fn is_second_order(&self) -> bool {
        matches!(self, Self::Edge3 | Self::Tri6 | Self::Quad9)
    }

    fn sides(&self) -> &'static [&'static [usize]] {
        match self {
            Self::Edge2 | Self::Edge3 => &EDGE_SIDES,
            Self::Tri3 => &TRI3_SIDES,
            Self::Tri6 => &TRI6_SIDES,
            Self::Quad4 => &QUAD4_SIDES,
            Self::Quad9 => &QUAD9_SIDES,
            Self::Tet4 => &TET4_SIDES,
            Self::Hex8 => &HEX8_SIDES,
        }
    }

    pub fn n_sides(&self) -> usize {
        self.sides().len()
    }

    /// Local node indices on a side of this element type
    pub fn side_nodes(&self, side: usize) -> Option<&'static [usize]> {
        self.sides().get(side).copied()
    }

    /// The element type of the sides of this element type (`None` for 1D elements)
    pub fn side_type(&self) -> Option<ElemType> {
        match self {
            Self::Edge2 | Self::Edge3 => None,
            Self::Tri3 | Self::Quad4 => Some(Self::Edge2),
            Self::Tri6 | Self::Quad9 => Some(Self::Edge3),
            Self::Tet4 => Some(Self::Tri3),
            Self::Hex8 => Some(Self::Quad4),
        }
    }

    /// Location of a node in the reference space of a 1D or 2D element
    pub fn reference_node(&self, local_node: usize) -> Option<[f64; 2]> {
        const EDGE: [[f64; 2]; 3] = [[-1.0, 0.0], [1.0, 0.0], [0.0, 0.0]];
        const TRI: [[f64; 2]; 6] = [
            [0.0, 0.0],
            [1.0, 0.0],
            [0.0, 1.0],
            [0.5, 0.0],
            [0.5, 0.5],
            [0.0, 0.5],
        ];
        const QUAD: [[f64; 2]; 9] = [
            [-1.0, -1.0],
            [1.0, -1.0],
            [1.0, 1.0],
            [-1.0, 1.0],
            [0.0, -1.0],
            [1.0, 0.0],
            [0.0, 1.0],
            [-1.0, 0.0],
            [0.0, 0.0],
        ];

        if local_node >= self.n_nodes() {
            return None;
        }
        match self {
            Self::Edge2 | Self::Edge3 => Some(EDGE[local_node]),
            Self::Tri3 | Self::Tri6 => Some(TRI[local_node]),
            Self::Quad4 | Self::Quad9 => Some(QUAD[local_node]),
            Self::Tet4 | Self::Hex8 => None,
        }
    }

    /// Center of the reference element
    pub fn reference_center(&self) -> [f64; 2] {
        match self {
            Self::Tri3 | Self::Tri6 => [1.0 / 3.0, 1.0 / 3.0],
            _ => [0.0, 0.0],
        }
    }
}

impl fmt::Display for ElemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A Lagrange element of any dimension.
///
/// Lower-dimensional elements built from the side of a higher dimensional element remember that element (and side) as their interior parent.
///
/// ```text
///     3 ---- 2            2
///     |      |            | \
///     |      |            |   \
///     0 ---- 1            0 -- 1
/// ```
#[derive(Debug, Clone)]
pub struct Elem {
    pub id: usize,
    pub elem_type: ElemType,
    pub nodes: SmallVec<[usize; 9]>,
    pub subdomain_id: SubdomainId,
    interior_parent: Option<(usize, usize)>,
}

impl Elem {
    pub fn new(
        id: usize,
        elem_type: ElemType,
        nodes: &[usize],
        subdomain_id: SubdomainId,
    ) -> Result<Self, MeshError> {
        if nodes.len() != elem_type.n_nodes() {
            return Err(MeshError::NodeCount {
                elem: id,
                elem_type,
                found: nodes.len(),
            });
        }

        Ok(Self {
            id,
            elem_type,
            nodes: SmallVec::from_slice(nodes),
            subdomain_id,
            interior_parent: None,
        })
    }

    pub(crate) fn with_interior_parent(mut self, parent_id: usize, side: usize) -> Self {
        self.interior_parent = Some((parent_id, side));
        self
    }

    /// Id of the higher-dimensional element this element is a side of
    pub fn interior_parent(&self) -> Option<usize> {
        self.interior_parent.map(|(parent_id, _)| parent_id)
    }

    /// Side of the interior parent that this element was built from
    pub fn interior_parent_side(&self) -> Option<usize> {
        self.interior_parent.map(|(_, side)| side)
    }

    pub fn dim(&self) -> usize {
        self.elem_type.dim()
    }

    pub fn n_vertices(&self) -> usize {
        self.elem_type.n_vertices()
    }

    /// Ids of the nodes at the corners of this element
    pub fn vertices(&self) -> &[usize] {
        &self.nodes[..self.n_vertices()]
    }

    /// Global node ids on one side of this element
    pub fn side_node_ids(&self, side: usize) -> Option<SmallVec<[usize; 4]>> {
        self.elem_type
            .side_nodes(side)
            .map(|local_nodes| local_nodes.iter().map(|ln| self.nodes[*ln]).collect())
    }

    /// Local index of a node in this element (if it belongs to it)
    pub fn node_index(&self, node_id: usize) -> Option<usize> {
        self.nodes.iter().position(|n| *n == node_id)
    }

    pub fn has_node(&self, node_id: usize) -> bool {
        self.node_index(node_id).is_some()
    }

    /// Produce a Json Object that describes this Elem
    #[cfg(feature = "json_export")]
    pub fn to_json(&self) -> JsonValue {
        let mut elem_obj = object! {
            "id": self.id,
            "type": self.elem_type.name(),
            "nodes": JsonValue::from(self.nodes.to_vec()),
            "subdomain": self.subdomain_id,
        };
        if let Some((parent_id, side)) = self.interior_parent {
            elem_obj["interior_parent"] = JsonValue::from(parent_id);
            elem_obj["interior_parent_side"] = JsonValue::from(side);
        }
        elem_obj
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn side_tables() {
        assert_eq!(ElemType::Quad4.side_nodes(2), Some(&[2, 3][..]));
        assert_eq!(ElemType::Quad9.side_nodes(3), Some(&[3, 0, 7][..]));
        assert_eq!(ElemType::Hex8.side_nodes(5), Some(&[4, 5, 6, 7][..]));
        assert_eq!(ElemType::Tri3.side_nodes(3), None);

        assert_eq!(ElemType::Quad9.side_type(), Some(ElemType::Edge3));
        assert_eq!(ElemType::Hex8.side_type(), Some(ElemType::Quad4));
        assert_eq!(ElemType::Edge2.side_type(), None);

        for elem_type in [ElemType::Tri6, ElemType::Quad9, ElemType::Tet4, ElemType::Hex8] {
            let side_type = elem_type.side_type().unwrap();
            for side in 0..elem_type.n_sides() {
                assert_eq!(
                    elem_type.side_nodes(side).unwrap().len(),
                    side_type.n_nodes()
                );
            }
        }
    }

    #[test]
    fn element_construction() {
        let quad = Elem::new(3, ElemType::Quad4, &[4, 5, 6, 7], 1).unwrap();
        assert_eq!(quad.vertices(), &[4, 5, 6, 7]);
        assert_eq!(quad.side_node_ids(3).unwrap().as_slice(), &[7, 4]);
        assert_eq!(quad.node_index(6), Some(2));
        assert!(quad.interior_parent().is_none());

        let side = Elem::new(4, ElemType::Edge2, &[7, 4], 10)
            .unwrap()
            .with_interior_parent(3, 3);
        assert_eq!(side.interior_parent(), Some(3));
        assert_eq!(side.interior_parent_side(), Some(3));

        assert!(Elem::new(5, ElemType::Tri3, &[0, 1], 1).is_err());
    }

    #[test]
    fn reference_nodes() {
        assert_eq!(ElemType::Quad9.reference_node(8), Some([0.0, 0.0]));
        assert_eq!(ElemType::Tri6.reference_node(4), Some([0.5, 0.5]));
        assert_eq!(ElemType::Edge3.reference_node(2), Some([0.0, 0.0]));
        assert_eq!(ElemType::Edge2.reference_node(2), None);
        assert_eq!(ElemType::Hex8.reference_node(0), None);
        assert_eq!(ElemType::from_name("QUAD9"), Some(ElemType::Quad9));
    }
}

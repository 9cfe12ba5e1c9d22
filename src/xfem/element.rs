use super::edge::CutEdge;
use super::fragment::Fragment;
use super::node::NodeKey;
use super::CutMeshError;
use smallvec::SmallVec;
use std::collections::BTreeSet;

/// Number of nodes (and edges) of a cut element; only quadrilaterals are supported
pub const NUM_NODES: usize = 4;

// reference coordinates of the corner nodes
static NODE_XI: [[f64; 2]; NUM_NODES] = [[-1.0, -1.0], [1.0, -1.0], [1.0, 1.0], [-1.0, 1.0]];

/// An embedded node on the interior of an element, with its reference coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceNode {
    pub node: NodeKey,
    pub xi: [f64; 2],
}

impl FaceNode {
    pub fn new(node: NodeKey, xi: [f64; 2]) -> Self {
        Self { node, xi }
    }

    pub fn switch_node(&mut self, new_node: NodeKey, old_node: NodeKey) {
        if self.node == old_node {
            self.node = new_node;
        }
    }
}

/// A quadrilateral element which can be cut into fragments
///
/// Edge `i` connects `nodes[i]` and `nodes[(i + 1) % 4]`:
/// ```text
///     3 <---- 2 ---- 2
///     |              ^
///     3              1
///     v              |
///     0 ---- 0 ----> 1
/// ```
#[derive(Debug, Clone)]
pub struct CutElement {
    pub id: usize,
    pub nodes: [NodeKey; NUM_NODES],
    pub edges: [CutEdge; NUM_NODES],
    /// Number of times this element's ancestors have been split
    pub generation: usize,
    pub parent: Option<usize>,
    /// The elements that replace this one after a topology update (itself if it was not split)
    pub children: SmallVec<[usize; 2]>,
    /// Neighboring elements across each edge (at most 2; 2 only across a crack tip)
    pub edge_neighbors: [SmallVec<[usize; 2]>; NUM_NODES],
    pub fragments: SmallVec<[Fragment; 2]>,
    pub interior_nodes: Vec<FaceNode>,
    /// The element lies on one side of a crack tip which ends on one of its edges
    pub crack_tip_split_element: bool,
    /// Edges shared with the crack tip element(s)
    pub crack_tip_neighbors: SmallVec<[usize; 2]>,
}

impl CutElement {
    pub fn new(id: usize, nodes: [NodeKey; NUM_NODES]) -> Self {
        Self {
            id,
            nodes,
            edges: std::array::from_fn(|i| CutEdge::new(nodes[i], nodes[(i + 1) % NUM_NODES])),
            generation: 0,
            parent: None,
            children: SmallVec::new(),
            edge_neighbors: Default::default(),
            fragments: SmallVec::new(),
            interior_nodes: Vec::new(),
            crack_tip_split_element: false,
            crack_tip_neighbors: SmallVec::new(),
        }
    }

    // ----------------------------------------------------------------------------------------------------
    // Topological Queries
    // ----------------------------------------------------------------------------------------------------

    pub fn node_index(&self, node: NodeKey) -> Option<usize> {
        self.nodes.iter().position(|n| *n == node)
    }

    pub fn edge_nodes(&self, edge_idx: usize) -> [NodeKey; 2] {
        self.edges[edge_idx].nodes
    }

    pub fn num_cuts(&self) -> usize {
        self.edges.iter().filter(|e| e.has_intersection()).count()
    }

    /// Some of the element's nodes are not part of any fragment
    pub fn is_partial(&self) -> bool {
        !self.fragments.is_empty()
            && self
                .nodes
                .iter()
                .any(|n| !self.fragments.iter().any(|f| f.contains_node(*n)))
    }

    /// Nodes which are not contained in any fragment
    pub fn non_physical_nodes(&self) -> BTreeSet<NodeKey> {
        self.nodes
            .iter()
            .copied()
            .filter(|n| !self.fragments.iter().any(|f| f.contains_node(*n)))
            .collect()
    }

    /// Nodes of an edge which are not contained in any fragment (empty for an element without fragments)
    pub fn phantom_nodes_on_edge(&self, edge_idx: usize) -> BTreeSet<NodeKey> {
        if self.fragments.is_empty() {
            return BTreeSet::new();
        }
        self.edges[edge_idx]
            .nodes
            .iter()
            .copied()
            .filter(|n| !self.fragments.iter().any(|f| f.contains_node(*n)))
            .collect()
    }

    /// Neither node of the edge is part of the element's fragment
    pub fn is_edge_phantom(&self, edge_idx: usize) -> Result<bool, CutMeshError> {
        match self.fragments.as_slice() {
            [] => Ok(false),
            [frag] => {
                let [n0, n1] = self.edges[edge_idx].nodes;
                Ok(!frag.contains_node(n0) && !frag.contains_node(n1))
            }
            frags => Err(CutMeshError::FragmentCount {
                elem: self.id,
                count: frags.len(),
            }),
        }
    }

    /// Is the node sequence `first -> second` ascending around this element?
    fn ascending(&self, first: NodeKey, second: NodeKey) -> Result<bool, CutMeshError> {
        let missing = || CutMeshError::SanityCheck {
            elem: self.id,
            reason: format!("element does not have an edge containing nodes {} and {}", first, second),
        };
        let i_first = self.node_index(first).ok_or_else(missing)?;
        let i_second = self.node_index(second).ok_or_else(missing)?;

        if i_second == (i_first + 1) % NUM_NODES {
            Ok(true)
        } else if i_first == (i_second + 1) % NUM_NODES {
            Ok(false)
        } else {
            Err(missing())
        }
    }

    /// The two elements lie on the same side of their common edge (or share more than one edge)
    pub fn overlays_elem(&self, other: &CutElement) -> Result<bool, CutMeshError> {
        let own: BTreeSet<NodeKey> = self.nodes.iter().copied().collect();
        let common: SmallVec<[NodeKey; 4]> = other
            .nodes
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .intersection(&own)
            .copied()
            .collect();

        match common.len() {
            2 => Ok(self.ascending(common[0], common[1])? == other.ascending(common[0], common[1])?),
            n => Ok(n > 2),
        }
    }

    /// This element traverses the edge `node_0 -> node_1` in the same direction
    pub fn overlays_edge(&self, node_0: NodeKey, node_1: NodeKey) -> Result<bool, CutMeshError> {
        self.ascending(node_0, node_1)
    }

    /// The edge across which `neighbor` is adjacent to this element
    pub fn neighbor_index(&self, neighbor: usize) -> Option<usize> {
        self.edge_neighbors
            .iter()
            .position(|neighbors| neighbors.contains(&neighbor))
    }

    pub fn num_edge_neighbors(&self, edge_idx: usize) -> usize {
        self.edge_neighbors[edge_idx].len()
    }

    /// The fragment and fragment edge overlapping an element edge
    pub fn fragment_edge_id(&self, edge_idx: usize) -> Option<(usize, usize)> {
        let edge = &self.edges[edge_idx];
        self.fragments.iter().enumerate().find_map(|(frag_idx, frag)| {
            frag.edges
                .iter()
                .position(|fe| edge.is_overlapping(fe))
                .map(|fe_idx| (frag_idx, fe_idx))
        })
    }

    // the first cut edge which contains exactly two edges of the (only) fragment
    fn fragment_tip_edge(&self) -> Option<usize> {
        let frag = self.fragments.first()?;
        (0..NUM_NODES).find(|i| {
            let edge = &self.edges[*i];
            edge.has_intersection() && frag.edges.iter().filter(|fe| edge.contains_edge(fe)).count() == 2
        })
    }

    /// The fragment has been split at an edge intersection which does not extend across the element
    pub fn frag_has_tip_edges(&self) -> bool {
        self.fragments.len() == 1 && self.fragment_tip_edge().is_some()
    }

    /// The edge on which the crack tip of this element lies
    pub fn tip_edge_id(&self) -> Option<usize> {
        if !self.fragments.is_empty() {
            self.fragment_tip_edge()
        } else if self.num_cuts() == 1 {
            self.edges.iter().position(|e| e.has_intersection())
        } else {
            None
        }
    }

    /// Reference coordinates of an embedded node lying on one of the element's edges
    pub fn embedded_node_para_coor(&self, node: NodeKey) -> Option<[f64; 2]> {
        let (edge_idx, edge) = self
            .edges
            .iter()
            .enumerate()
            .find(|(_, e)| e.embedded_node() == Some(node))?;
        let xi_1d = 2.0 * edge.intersection(edge.nodes[0])? - 1.0;

        Some(match edge_idx {
            0 => [xi_1d, -1.0],
            1 => [1.0, xi_1d],
            2 => [-xi_1d, 1.0],
            _ => [-1.0, -xi_1d],
        })
    }

    /// The element nodes (and weights) whose interpolation gives the location of `node`
    ///
    /// Nodes on the element's edges are interpolated from the edge end nodes. Interior embedded nodes use bilinear weights.
    pub fn get_master_info(&self, node: NodeKey) -> Result<SmallVec<[(NodeKey, f64); 4]>, CutMeshError> {
        if let Some(edge) = self.edges.iter().find(|e| e.contains_node(node)) {
            return edge.node_masters(node).ok_or(CutMeshError::NodeNotFound(node));
        }

        let face_node = self
            .interior_nodes
            .iter()
            .find(|fnode| fnode.node == node)
            .ok_or(CutMeshError::NodeNotFound(node))?;
        let [xi, eta] = face_node.xi;

        Ok(self
            .nodes
            .iter()
            .zip(NODE_XI.iter())
            .map(|(n, [n_xi, n_eta])| (*n, 0.25 * (1.0 + n_xi * xi) * (1.0 + n_eta * eta)))
            .collect())
    }

    // ----------------------------------------------------------------------------------------------------
    // Modification
    // ----------------------------------------------------------------------------------------------------

    /// Record a neighbor as one of this element's crack tip neighbors
    pub fn add_crack_tip_neighbor(&mut self, neighbor: usize) -> Result<(), CutMeshError> {
        let edge_idx = self
            .neighbor_index(neighbor)
            .ok_or(CutMeshError::NeighborMismatch {
                elem: self.id,
                neighbor,
            })?;

        if self.crack_tip_neighbors.contains(&edge_idx) {
            return Err(CutMeshError::SanityCheck {
                elem: self.id,
                reason: format!("a crack tip neighbor is already set on edge {}", edge_idx),
            });
        }
        self.crack_tip_neighbors.push(edge_idx);

        if self.crack_tip_neighbors.len() > 2 {
            return Err(CutMeshError::SanityCheck {
                elem: self.id,
                reason: "an element cannot have more than 2 crack tip neighbors".to_string(),
            });
        }
        Ok(())
    }

    /// Replace a node in this element's node list, edges and fragments
    pub fn switch_node(&mut self, new_node: NodeKey, old_node: NodeKey) {
        for node in self.nodes.iter_mut() {
            if *node == old_node {
                *node = new_node;
            }
        }
        for frag in self.fragments.iter_mut() {
            frag.switch_node(new_node, old_node);
        }
        for edge in self.edges.iter_mut() {
            edge.switch_node(new_node, old_node);
        }
    }

    /// Replace an embedded node in this element's edges, interior nodes and fragments
    pub fn switch_embedded_node(&mut self, new_node: NodeKey, old_node: NodeKey) {
        for edge in self.edges.iter_mut() {
            edge.switch_node(new_node, old_node);
        }
        for fnode in self.interior_nodes.iter_mut() {
            fnode.switch_node(new_node, old_node);
        }
        for frag in self.fragments.iter_mut() {
            frag.switch_node(new_node, old_node);
        }
    }

    /// A copy of this element's cut state expressed in terms of local node indices
    ///
    /// The copy keeps the edges, fragments and interior nodes, but none of the element's connectivity.
    pub fn localized(&self) -> Result<CutElement, CutMeshError> {
        if let Some(node) = self.nodes.iter().find(|n| !n.is_global()) {
            return Err(CutMeshError::SanityCheck {
                elem: self.id,
                reason: format!("only elements with global nodes can be localized; found {}", node),
            });
        }

        let mut local = CutElement {
            edges: self.edges.clone(),
            fragments: self.fragments.clone(),
            interior_nodes: self.interior_nodes.clone(),
            crack_tip_split_element: self.crack_tip_split_element,
            ..CutElement::new(self.id, self.nodes)
        };
        for (i, node) in self.nodes.iter().enumerate() {
            local.switch_node(NodeKey::local(i), *node);
        }
        Ok(local)
    }

    /// Edge neighbors flattened into `(edge index, neighbor)` pairs
    pub fn neighbors(&self) -> SmallVec<[(usize, usize); 8]> {
        self.edge_neighbors
            .iter()
            .enumerate()
            .flat_map(|(edge_idx, neighbors)| neighbors.iter().map(move |n| (edge_idx, *n)))
            .collect()
    }

    pub(crate) fn sole_neighbor(&self, edge_idx: usize) -> Option<usize> {
        match self.edge_neighbors[edge_idx].as_slice() {
            [neighbor] => Some(*neighbor),
            _ => None,
        }
    }

    /// Cut an edge (and the fragment edge overlapping it) at `position`, measured from `from_node`
    pub(crate) fn cut_edge(
        &mut self,
        edge_idx: usize,
        position: f64,
        node: NodeKey,
        from_node: NodeKey,
    ) -> Result<(), CutMeshError> {
        if !self.edges[edge_idx].add_intersection(position, node, from_node) {
            return Err(CutMeshError::SanityCheck {
                elem: self.id,
                reason: format!("node {} is not on edge {}", from_node, edge_idx),
            });
        }
        if let Some((frag_idx, fe_idx)) = self.fragment_edge_id(edge_idx) {
            let frag_edge = &mut self.fragments[frag_idx].edges[fe_idx];
            if !frag_edge.has_intersection() {
                frag_edge.add_intersection(position, node, from_node);
            }
        }
        Ok(())
    }

    pub(crate) fn first_fragment(&self) -> Result<&Fragment, CutMeshError> {
        self.fragments.first().ok_or(CutMeshError::FragmentCount {
            elem: self.id,
            count: 0,
        })
    }

    pub(crate) fn whole_fragment(&self) -> Fragment {
        Fragment::whole(&self.edges)
    }
}

pub(crate) fn quad_keys(quad: &[usize; NUM_NODES]) -> [NodeKey; NUM_NODES] {
    quad.map(NodeKey::permanent)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(id: usize) -> NodeKey {
        NodeKey::permanent(id)
    }

    fn e(id: usize) -> NodeKey {
        NodeKey::embedded(id)
    }

    fn elem(id: usize, quad: [usize; 4]) -> CutElement {
        CutElement::new(id, quad_keys(&quad))
    }

    // cut edges 0 and 2 at their midpoints and split into two fragments
    fn split_elem() -> CutElement {
        let mut el = elem(0, [0, 1, 4, 3]);
        el.edges[0].add_intersection(0.5, e(0), p(0));
        el.edges[2].add_intersection(0.5, e(1), p(4));
        el.fragments = el.whole_fragment().split().unwrap();
        el
    }

    #[test]
    fn edges_follow_nodes() {
        let el = elem(0, [0, 1, 4, 3]);
        assert_eq!(el.edge_nodes(1), [p(1), p(4)]);
        assert_eq!(el.edge_nodes(3), [p(3), p(0)]);
        assert!(!el.is_partial());
        assert_eq!(el.non_physical_nodes().len(), 4);
        assert!(el.phantom_nodes_on_edge(0).is_empty());
    }

    #[test]
    fn overlays() {
        let a = elem(0, [0, 1, 4, 3]);
        let right = elem(1, [1, 2, 5, 4]);
        let above = elem(2, [3, 4, 7, 6]);
        let same = elem(3, [0, 1, 4, 3]);
        let mut child = elem(4, [0, 1, 4, 3]);
        child.switch_node(NodeKey::temp(0), p(0));
        child.switch_node(NodeKey::temp(1), p(3));

        assert!(!a.overlays_elem(&right).unwrap());
        assert!(!a.overlays_elem(&above).unwrap());
        assert!(a.overlays_elem(&same).unwrap());
        assert!(a.overlays_elem(&child).unwrap());

        assert!(a.overlays_edge(p(1), p(4)).unwrap());
        assert!(!right.overlays_edge(p(1), p(4)).unwrap());
        assert!(a.overlays_edge(p(0), p(4)).is_err());
    }

    #[test]
    fn fragments_of_a_split_element() {
        let el = split_elem();
        assert_eq!(el.num_cuts(), 2);
        assert_eq!(el.fragments.len(), 2);
        assert!(!el.is_partial());
        assert!(el.is_edge_phantom(1).is_err());
        assert_eq!(el.fragment_edge_id(1), Some((0, 1)));
        assert_eq!(el.fragment_edge_id(3), Some((1, 1)));
        assert_eq!(el.fragment_edge_id(0), None);

        let mut child = el.clone();
        child.fragments.remove(1);
        assert!(child.is_partial());
        assert_eq!(child.non_physical_nodes(), BTreeSet::from([p(0), p(3)]));
        assert!(child.is_edge_phantom(3).unwrap());
        assert!(!child.is_edge_phantom(0).unwrap());
        assert_eq!(child.phantom_nodes_on_edge(0), BTreeSet::from([p(0)]));
        assert!(!child.frag_has_tip_edges());
    }

    #[test]
    fn tip_edges() {
        let mut el = elem(0, [0, 1, 4, 3]);
        el.edges[1].add_intersection(0.5, e(0), p(1));
        assert_eq!(el.tip_edge_id(), Some(1));

        el.fragments = el.whole_fragment().split().unwrap();
        assert!(el.frag_has_tip_edges());
        assert_eq!(el.tip_edge_id(), Some(1));
    }

    #[test]
    fn para_coords() {
        let mut el = elem(0, [0, 1, 2, 3]);
        el.edges[1].add_intersection(0.25, e(0), p(1));
        el.edges[2].add_intersection(0.25, e(1), p(2));

        assert_eq!(el.embedded_node_para_coor(e(0)), Some([1.0, -0.5]));
        assert_eq!(el.embedded_node_para_coor(e(1)), Some([0.5, 1.0]));
        assert_eq!(el.embedded_node_para_coor(e(2)), None);
    }

    #[test]
    fn master_info() {
        let mut el = elem(0, [0, 1, 2, 3]);
        el.edges[0].add_intersection(0.25, e(0), p(0));
        el.interior_nodes.push(FaceNode::new(e(5), [0.5, 0.0]));

        let edge_masters = el.get_master_info(e(0)).unwrap();
        assert_eq!(edge_masters.len(), 2);
        assert!((edge_masters[0].1 - 0.75).abs() < 1e-14);
        assert!((edge_masters[1].1 - 0.25).abs() < 1e-14);

        let interior_masters = el.get_master_info(e(5)).unwrap();
        let weights: Vec<f64> = interior_masters.iter().map(|(_, w)| *w).collect();
        for (w, expected) in weights.iter().zip([0.125, 0.375, 0.375, 0.125]) {
            assert!((w - expected).abs() < 1e-14);
        }

        assert!(matches!(el.get_master_info(e(9)), Err(CutMeshError::NodeNotFound(_))));
    }

    #[test]
    fn crack_tip_neighbors() {
        let mut el = elem(0, [0, 1, 4, 3]);
        el.edge_neighbors[1].push(1);
        el.edge_neighbors[2].push(2);

        el.add_crack_tip_neighbor(1).unwrap();
        assert_eq!(el.crack_tip_neighbors.as_slice(), &[1]);
        assert!(el.add_crack_tip_neighbor(1).is_err());
        assert!(matches!(
            el.add_crack_tip_neighbor(7),
            Err(CutMeshError::NeighborMismatch { elem: 0, neighbor: 7 })
        ));
        assert_eq!(el.neighbors().as_slice(), &[(1, 1), (2, 2)]);
    }

    #[test]
    fn localize() {
        let el = split_elem();
        let local = el.localized().unwrap();

        assert_eq!(local.nodes[2], NodeKey::local(2));
        assert_eq!(local.edges[0].embedded_node(), Some(e(0)));
        assert!(local.fragments[0].contains_node(NodeKey::local(1)));
        assert!(!local.fragments[0].contains_node(p(1)));
        assert!(local.edge_neighbors.iter().all(|n| n.is_empty()));

        let mut embedded = el.clone();
        embedded.nodes[0] = e(3);
        assert!(embedded.localized().is_err());
    }
}

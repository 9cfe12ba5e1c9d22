use super::element::{quad_keys, CutElement, FaceNode, NUM_NODES};
use super::fragment::Fragment;
use super::node::{CutNode, NodeCategory, NodeKey};
use super::CutMeshError;
use log::debug;
use smallvec::SmallVec;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

// intersections this close to an embedded end node of a fragment edge are ignored
const FRAG_EDGE_TOLERANCE: f64 = 1e-4;

/// A mesh of quadrilaterals which tracks how a crack cuts through its elements
///
/// Elements are split into one child per physical fragment. Children on either side of an opened crack are connected to
/// their neighbors through shared (merged) nodes, while the nodes on the far side of the crack are duplicated.
#[derive(Debug, Clone, Default)]
pub struct CutElemMesh {
    permanent_nodes: BTreeMap<usize, CutNode>,
    temp_nodes: BTreeMap<usize, CutNode>,
    embedded_nodes: BTreeMap<usize, CutNode>,
    elements: BTreeMap<usize, CutElement>,
    inverse_connectivity: BTreeMap<NodeKey, BTreeSet<usize>>,
    crack_tip_elements: BTreeSet<usize>,
    child_elements: Vec<usize>,
    parent_elements: Vec<usize>,
    new_nodes: Vec<NodeKey>,
    merged_edge_map: BTreeMap<[NodeKey; 2], BTreeSet<usize>>,
}

fn new_id<T>(map: &BTreeMap<usize, T>) -> usize {
    map.keys().next_back().map_or(0, |last| last + 1)
}

impl CutElemMesh {
    pub fn new() -> Self {
        Self::default()
    }

    // ----------------------------------------------------------------------------------------------------
    // Accessors
    // ----------------------------------------------------------------------------------------------------

    pub fn get_elem_by_id(&self, id: usize) -> Result<&CutElement, CutMeshError> {
        self.elements.get(&id).ok_or(CutMeshError::ElemNotFound(id))
    }

    fn elem_mut(&mut self, id: usize) -> Result<&mut CutElement, CutMeshError> {
        self.elements.get_mut(&id).ok_or(CutMeshError::ElemNotFound(id))
    }

    /// The id of the element whose nodes have exactly these ids (in order)
    pub fn get_elem_id_by_nodes(&self, node_ids: &[usize; NUM_NODES]) -> Option<usize> {
        self.elements
            .values()
            .find(|elem| elem.nodes.iter().zip(node_ids.iter()).all(|(n, id)| n.id == *id))
            .map(|elem| elem.id)
    }

    pub fn elements(&self) -> impl Iterator<Item = &CutElement> + '_ {
        self.elements.values()
    }

    pub fn num_elements(&self) -> usize {
        self.elements.len()
    }

    pub fn permanent_nodes(&self) -> impl Iterator<Item = &CutNode> + '_ {
        self.permanent_nodes.values()
    }

    pub fn embedded_nodes(&self) -> impl Iterator<Item = &CutNode> + '_ {
        self.embedded_nodes.values()
    }

    pub fn num_temp_nodes(&self) -> usize {
        self.temp_nodes.len()
    }

    pub fn node(&self, key: NodeKey) -> Option<&CutNode> {
        match key.category {
            NodeCategory::Permanent => self.permanent_nodes.get(&key.id),
            NodeCategory::Temp => self.temp_nodes.get(&key.id),
            NodeCategory::Embedded => self.embedded_nodes.get(&key.id),
            NodeCategory::LocalIndex => None,
        }
    }

    fn node_parent(&self, key: NodeKey) -> Option<NodeKey> {
        self.node(key).and_then(|n| n.parent)
    }

    pub fn crack_tip_elements(&self) -> &BTreeSet<usize> {
        &self.crack_tip_elements
    }

    /// Children created by the last topology update
    pub fn child_elements(&self) -> &[usize] {
        &self.child_elements
    }

    /// Elements split by the last topology update
    pub fn parent_elements(&self) -> &[usize] {
        &self.parent_elements
    }

    /// Permanent nodes created by the last topology update
    pub fn new_nodes(&self) -> &[NodeKey] {
        &self.new_nodes
    }

    /// Elements sharing each edge that was merged during the last topology update
    pub fn merged_edge_map(&self) -> &BTreeMap<[NodeKey; 2], BTreeSet<usize>> {
        &self.merged_edge_map
    }

    // ----------------------------------------------------------------------------------------------------
    // Construction
    // ----------------------------------------------------------------------------------------------------

    /// Add a set of quadrilaterals (given by permanent node ids), returning the id of the first new element
    pub fn add_elements(&mut self, quads: &[[usize; NUM_NODES]]) -> Result<usize, CutMeshError> {
        if quads.is_empty() {
            return Err(CutMeshError::EmptyElementList);
        }

        let first_id = new_id(&self.elements);
        for quad in quads {
            let id = new_id(&self.elements);
            self.insert_element(id, quad);
        }
        Ok(first_id)
    }

    pub fn add_element(&mut self, quad: &[usize; NUM_NODES], id: usize) -> Result<&CutElement, CutMeshError> {
        if self.elements.contains_key(&id) {
            return Err(CutMeshError::DuplicateElem(id));
        }
        self.insert_element(id, quad);
        self.get_elem_by_id(id)
    }

    fn insert_element(&mut self, id: usize, quad: &[usize; NUM_NODES]) {
        let nodes = quad_keys(quad);
        for node in nodes.iter() {
            self.permanent_nodes
                .entry(node.id)
                .or_insert_with(|| CutNode::new(*node));
            self.inverse_connectivity.entry(*node).or_default().insert(id);
        }
        self.elements.insert(id, CutElement::new(id, nodes));
    }

    fn new_embedded_node(&mut self) -> NodeKey {
        let key = NodeKey::embedded(new_id(&self.embedded_nodes));
        self.embedded_nodes.insert(key.id, CutNode::new(key));
        key
    }

    fn new_permanent_node(&mut self, parent: Option<NodeKey>) -> NodeKey {
        let key = NodeKey::permanent(new_id(&self.permanent_nodes));
        self.permanent_nodes.insert(key.id, CutNode { key, parent });
        key
    }

    fn remove_node(&mut self, key: NodeKey) -> Result<CutNode, CutMeshError> {
        let removed = match key.category {
            NodeCategory::Permanent => self.permanent_nodes.remove(&key.id),
            NodeCategory::Temp => self.temp_nodes.remove(&key.id),
            NodeCategory::Embedded => self.embedded_nodes.remove(&key.id),
            NodeCategory::LocalIndex => None,
        };
        removed.ok_or(CutMeshError::NodeNotFound(key))
    }

    // ----------------------------------------------------------------------------------------------------
    // Connectivity
    // ----------------------------------------------------------------------------------------------------

    /// Rebuild the edge neighbors of every element
    ///
    /// Two elements are neighbors across an edge if they both contain its nodes, lie on opposite sides of it, and (if both have
    /// a fragment) their fragments are connected.
    pub fn update_edge_neighbors(&mut self) -> Result<(), CutMeshError> {
        let mut all_neighbors: BTreeMap<usize, [SmallVec<[usize; 2]>; NUM_NODES]> = BTreeMap::new();

        for (id, elem) in self.elements.iter() {
            let candidates: BTreeSet<usize> = elem
                .nodes
                .iter()
                .filter_map(|n| self.inverse_connectivity.get(n))
                .flatten()
                .copied()
                .filter(|other| other != id)
                .collect();

            let mut neighbors: [SmallVec<[usize; 2]>; NUM_NODES] = Default::default();
            for other_id in candidates {
                let other = self.get_elem_by_id(other_id)?;
                for (edge_idx, edge_neighbors) in neighbors.iter_mut().enumerate() {
                    let [node_0, node_1] = elem.edge_nodes(edge_idx);
                    if !other.nodes.contains(&node_0) || !other.nodes.contains(&node_1) {
                        continue;
                    }
                    if other.overlays_edge(node_0, node_1)? {
                        continue;
                    }

                    let is_neighbor = match (elem.fragments.as_slice(), other.fragments.as_slice()) {
                        (frags, _) if frags.len() > 1 => {
                            return Err(CutMeshError::FragmentCount {
                                elem: *id,
                                count: frags.len(),
                            })
                        }
                        (_, frags) if frags.len() > 1 => {
                            return Err(CutMeshError::FragmentCount {
                                elem: other_id,
                                count: frags.len(),
                            })
                        }
                        ([frag], [other_frag]) => frag.is_connected(other_frag),
                        _ => true,
                    };

                    if is_neighbor {
                        if edge_neighbors.len() >= 2 {
                            return Err(CutMeshError::SanityCheck {
                                elem: *id,
                                reason: format!("edge {} already has 2 neighbors", edge_idx),
                            });
                        }
                        edge_neighbors.push(other_id);
                    }
                }
            }
            all_neighbors.insert(*id, neighbors);
        }

        for (id, neighbors) in all_neighbors {
            self.elem_mut(id)?.edge_neighbors = neighbors;
        }

        // neighbor relationships must be symmetric
        for elem in self.elements.values() {
            for (_, neighbor_id) in elem.neighbors() {
                if self.get_elem_by_id(neighbor_id)?.neighbor_index(elem.id).is_none() {
                    return Err(CutMeshError::NeighborMismatch {
                        elem: neighbor_id,
                        neighbor: elem.id,
                    });
                }
            }
        }

        Ok(())
    }

    /// Identify elements with a crack tip on one of their cut edges, and flag the two elements across that edge
    pub fn init_crack_tip_topology(&mut self) -> Result<(), CutMeshError> {
        self.crack_tip_elements.clear();

        let ids: Vec<usize> = self.elements.keys().copied().collect();
        for id in ids {
            for edge_idx in 0..NUM_NODES {
                let elem = self.get_elem_by_id(id)?;
                let neighbors = elem.edge_neighbors[edge_idx].clone();
                if neighbors.len() != 2 || !elem.edges[edge_idx].has_intersection() {
                    continue;
                }

                let [node_0, node_1] = elem.edge_nodes(edge_idx);
                for neighbor_id in neighbors.iter() {
                    if self.get_elem_by_id(*neighbor_id)?.overlays_edge(node_0, node_1)? {
                        return Err(CutMeshError::SanityCheck {
                            elem: id,
                            reason: format!("neighbor {} overlays the element", neighbor_id),
                        });
                    }
                }
                if elem.crack_tip_split_element {
                    return Err(CutMeshError::SanityCheck {
                        elem: id,
                        reason: "a crack tip element cannot also be a crack tip split element".to_string(),
                    });
                }

                self.crack_tip_elements.insert(id);
                for neighbor_id in neighbors {
                    let neighbor = self.elem_mut(neighbor_id)?;
                    neighbor.crack_tip_split_element = true;
                    neighbor.add_crack_tip_neighbor(id)?;
                }
            }
        }

        Ok(())
    }

    // ----------------------------------------------------------------------------------------------------
    // Cutting
    // ----------------------------------------------------------------------------------------------------

    /// Cut an element's edge at `position` (measured from the edge's first node), returning the embedded node
    ///
    /// The intersection is propagated to the neighbors across the edge.
    pub fn add_edge_intersection(&mut self, elem_id: usize, edge_idx: usize, position: f64) -> Result<NodeKey, CutMeshError> {
        self.add_edge_intersection_with(elem_id, edge_idx, position, None)
    }

    /// Cut an element's edge, reusing the given embedded node instead of creating a new one
    pub fn add_edge_intersection_with(
        &mut self,
        elem_id: usize,
        edge_idx: usize,
        position: f64,
        embedded: Option<NodeKey>,
    ) -> Result<NodeKey, CutMeshError> {
        let elem = self.get_elem_by_id(elem_id)?;
        let edge = elem.edges.get(edge_idx).ok_or(CutMeshError::InvalidEdge {
            elem: elem_id,
            edge: edge_idx,
        })?;
        let from_node = elem.nodes[edge_idx];
        let incompatible = CutMeshError::IncompatibleIntersection {
            elem: elem_id,
            edge: edge_idx,
            position,
        };

        let node = match edge.embedded_node() {
            Some(existing) => {
                if !edge.has_intersection_at_position(position, from_node)
                    || embedded.map_or(false, |e| e != existing)
                {
                    return Err(incompatible);
                }
                existing
            }
            None => {
                let node = match embedded {
                    Some(e) => {
                        self.embedded_nodes.entry(e.id).or_insert_with(|| CutNode::new(e));
                        e
                    }
                    None => self.new_embedded_node(),
                };
                self.elem_mut(elem_id)?
                    .cut_edge(edge_idx, position, node, from_node)?;
                node
            }
        };

        let elem = self.get_elem_by_id(elem_id)?;
        let cut_edge = elem.edges[edge_idx].clone();
        let neighbors = elem.edge_neighbors[edge_idx].clone();
        for neighbor_id in neighbors {
            let neighbor = self.elem_mut(neighbor_id)?;
            let neighbor_edge = neighbor
                .neighbor_index(elem_id)
                .ok_or(CutMeshError::NeighborMismatch {
                    elem: neighbor_id,
                    neighbor: elem_id,
                })?;

            let edge = &neighbor.edges[neighbor_edge];
            if edge.has_intersection() {
                if !edge.equivalent(&cut_edge)
                    || edge.embedded_node() != Some(node)
                    || !edge.has_intersection_at_position(position, from_node)
                {
                    return Err(CutMeshError::IncompatibleIntersection {
                        elem: neighbor_id,
                        edge: neighbor_edge,
                        position,
                    });
                }
            } else {
                neighbor.cut_edge(neighbor_edge, position, node, from_node)?;
            }
        }

        Ok(node)
    }

    /// Cut an interior edge of an element's fragment, creating an embedded node on the element's interior
    ///
    /// Returns `None` if the intersection coincides with an embedded end node of the fragment edge.
    pub fn add_frag_edge_intersection(
        &mut self,
        elem_id: usize,
        frag_edge_idx: usize,
        position: f64,
    ) -> Result<Option<NodeKey>, CutMeshError> {
        let elem = self.get_elem_by_id(elem_id)?;
        let frag = match elem.fragments.as_slice() {
            [frag] => frag,
            frags => {
                return Err(CutMeshError::FragmentCount {
                    elem: elem_id,
                    count: frags.len(),
                })
            }
        };
        let edge = frag.edges.get(frag_edge_idx).ok_or(CutMeshError::InvalidEdge {
            elem: elem_id,
            edge: frag_edge_idx,
        })?;
        let [node_0, node_1] = edge.nodes;

        if (position.abs() < FRAG_EDGE_TOLERANCE && node_0.is_embedded())
            || ((1.0 - position).abs() < FRAG_EDGE_TOLERANCE && node_1.is_embedded())
        {
            return Ok(None);
        }

        if let Some(existing) = edge.embedded_node() {
            if !edge.has_intersection_at_position(position, node_0) {
                return Err(CutMeshError::IncompatibleIntersection {
                    elem: elem_id,
                    edge: frag_edge_idx,
                    position,
                });
            }
            return Ok(Some(existing));
        }

        if !edge.is_interior_edge() {
            return Err(CutMeshError::SanityCheck {
                elem: elem_id,
                reason: format!("fragment edge {} is not an interior edge", frag_edge_idx),
            });
        }
        let (xi_0, xi_1) = match (
            elem.embedded_node_para_coor(node_0),
            elem.embedded_node_para_coor(node_1),
        ) {
            (Some(xi_0), Some(xi_1)) => (xi_0, xi_1),
            _ => {
                return Err(CutMeshError::SanityCheck {
                    elem: elem_id,
                    reason: "unable to find the reference coordinates of the fragment edge's end nodes".to_string(),
                })
            }
        };
        let xi = [
            (1.0 - position) * xi_0[0] + position * xi_1[0],
            (1.0 - position) * xi_0[1] + position * xi_1[1],
        ];

        let node = self.new_embedded_node();
        let elem = self.elem_mut(elem_id)?;
        elem.fragments[0].edges[frag_edge_idx].add_intersection(position, node, node_0);
        elem.interior_nodes.push(FaceNode::new(node, xi));

        Ok(Some(node))
    }

    /// Split every element's fragment at its intersections
    pub fn update_physical_links_and_fragments(&mut self) -> Result<(), CutMeshError> {
        let ids: Vec<usize> = self.elements.keys().copied().collect();

        for id in ids {
            let is_crack_tip = self.crack_tip_elements.contains(&id);
            let elem = self.elements.get_mut(&id).ok_or(CutMeshError::ElemNotFound(id))?;

            if is_crack_tip && elem.fragments.len() == 1 {
                let host_edges = elem.edges.clone();
                elem.fragments[0].combine_tip_edges(&host_edges);
            }

            if elem.fragments.len() == 1 {
                if let Some(removed) = elem.fragments[0].remove_invalid_embedded_node() {
                    if elem.interior_nodes.len() != 1 {
                        return Err(CutMeshError::SanityCheck {
                            elem: id,
                            reason: format!("expected 1 interior node; found {}", elem.interior_nodes.len()),
                        });
                    }
                    elem.interior_nodes.clear();
                    self.embedded_nodes.remove(&removed.id);
                }
            }

            if elem.fragments.is_empty() {
                let whole = elem.whole_fragment();
                elem.fragments.push(whole);
            }
            if elem.fragments.len() != 1 {
                return Err(CutMeshError::FragmentCount {
                    elem: id,
                    count: elem.fragments.len(),
                });
            }

            match elem.fragments[0].num_cuts() {
                0 => {
                    if !elem.is_partial() {
                        elem.fragments.clear();
                    }
                }
                1 | 2 => {
                    elem.fragments = elem.fragments[0].split()?;
                    physical_link_sanity_check(elem)?;
                }
                _ => return Err(CutMeshError::Unsupported("more than 2 cut fragment edges")),
            }
        }

        Ok(())
    }

    // ----------------------------------------------------------------------------------------------------
    // Topology update
    // ----------------------------------------------------------------------------------------------------

    /// Replace split elements with children and connect the children to their neighbors
    ///
    /// With `merge_uncut_virtual_edges`, non-physical nodes of neighboring children which were copied from the same node are merged.
    pub fn update_topology(&mut self, merge_uncut_virtual_edges: bool) -> Result<(), CutMeshError> {
        self.new_nodes.clear();
        self.child_elements.clear();
        self.parent_elements.clear();
        self.merged_edge_map.clear();

        let first_new_node_id = new_id(&self.permanent_nodes);

        self.create_child_elements()?;
        self.connect_fragments(merge_uncut_virtual_edges)?;
        if !self.temp_nodes.is_empty() {
            return Err(CutMeshError::TempNodesRemain(self.temp_nodes.len()));
        }
        self.find_crack_tip_elements()?;

        self.new_nodes = self
            .permanent_nodes
            .range(first_new_node_id..)
            .map(|(_, node)| node.key)
            .collect();

        debug!(
            "Cut mesh topology updated: {} parent elements, {} child elements, {} new nodes, {} crack tip elements",
            self.parent_elements.len(),
            self.child_elements.len(),
            self.new_nodes.len(),
            self.crack_tip_elements.len()
        );

        Ok(())
    }

    fn create_child_elements(&mut self) -> Result<(), CutMeshError> {
        let ids: Vec<usize> = self.elements.keys().copied().collect();

        let mut to_split = BTreeSet::new();
        for id in ids.iter() {
            let elem = self.get_elem_by_id(*id)?;
            if !elem.children.is_empty() {
                return Err(CutMeshError::SanityCheck {
                    elem: *id,
                    reason: "element already has children; the ancestry must be cleared first".to_string(),
                });
            }
            if elem.fragments.len() > 1 || self.should_duplicate_for_crack_tip(*id)? {
                if elem.fragments.len() > 2 {
                    return Err(CutMeshError::Unsupported("more than 2 fragments"));
                }
                to_split.insert(*id);
            }
        }

        for id in ids {
            if !to_split.contains(&id) {
                self.elem_mut(id)?.children.push(id);
                continue;
            }

            self.parent_elements.push(id);
            let parent = self.get_elem_by_id(id)?.clone();

            for frag in parent.fragments.iter() {
                let child_id = new_id(&self.elements);

                let mut nodes = parent.nodes;
                for node in nodes.iter_mut() {
                    if !frag.contains_node(*node) {
                        let temp = NodeKey::temp(new_id(&self.temp_nodes));
                        self.temp_nodes.insert(temp.id, CutNode::with_parent(temp, *node));
                        *node = temp;
                    }
                }

                let mut child = CutElement::new(child_id, nodes);
                child.parent = Some(id);
                child.generation = parent.generation + 1;
                child.fragments.push(frag.clone());
                for (j, parent_edge) in parent.edges.iter().enumerate() {
                    if let (Some(node), Some(position)) = (
                        parent_edge.embedded_node(),
                        parent_edge.intersection(parent.nodes[j]),
                    ) {
                        let from_node = child.nodes[j];
                        child.edges[j].add_intersection(position, node, from_node);
                    }
                }
                for j in 0..NUM_NODES {
                    if child.edges[j].has_intersection() && child.is_edge_phantom(j)? {
                        child.edges[j].remove_embedded_node();
                    }
                }
                child.interior_nodes = parent.interior_nodes.clone();

                self.elements.insert(child_id, child);
                self.child_elements.push(child_id);
                self.elem_mut(id)?.children.push(child_id);
            }
        }

        Ok(())
    }

    fn should_duplicate_for_crack_tip(&self, id: usize) -> Result<bool, CutMeshError> {
        let elem = self.get_elem_by_id(id)?;
        if !self.crack_tip_elements.contains(&id) && elem.frag_has_tip_edges() && elem.is_partial() {
            return Ok(true);
        }
        if self.should_duplicate_crack_tip_split_elem(elem)? {
            return Ok(true);
        }
        self.should_duplicate_for_phantom_corner(elem)
    }

    /// Will the crack extend from the crack tip into this (crack tip split) element?
    pub fn will_crack_tip_extend(&self, id: usize) -> Result<bool, CutMeshError> {
        Ok(!self.crack_tip_extension_edges(id)?.is_empty())
    }

    /// The crack tip edges of an element whose crack tip neighbor is about to be split
    pub fn crack_tip_extension_edges(&self, id: usize) -> Result<SmallVec<[usize; 2]>, CutMeshError> {
        let elem = self.get_elem_by_id(id)?;
        let mut edges = SmallVec::new();
        if elem.fragments.len() != 1 || !elem.crack_tip_split_element {
            return Ok(edges);
        }

        for edge_idx in elem.crack_tip_neighbors.iter().copied() {
            let neighbor_id = elem
                .sole_neighbor(edge_idx)
                .ok_or_else(|| CutMeshError::SanityCheck {
                    elem: id,
                    reason: format!(
                        "expected 1 neighbor on crack tip edge {}; found {}",
                        edge_idx,
                        elem.num_edge_neighbors(edge_idx)
                    ),
                })?;

            match self.get_elem_by_id(neighbor_id)?.fragments.len() {
                2 => edges.push(edge_idx),
                count if count > 2 => {
                    return Err(CutMeshError::FragmentCount {
                        elem: neighbor_id,
                        count,
                    })
                }
                _ => {}
            }
        }

        Ok(edges)
    }

    // A crack tip split element is duplicated if the crack extends into it, or if one of its non-physical nodes lies on a
    // crack tip edge of a neighbor into which the crack extends
    fn should_duplicate_crack_tip_split_elem(&self, elem: &CutElement) -> Result<bool, CutMeshError> {
        if elem.fragments.len() != 1 {
            return Ok(false);
        }
        if self.will_crack_tip_extend(elem.id)? {
            return Ok(true);
        }

        let mut crack_tip_face_nodes = BTreeSet::new();
        for (_, neighbor_id) in elem.neighbors() {
            let neighbor = self.get_elem_by_id(neighbor_id)?;
            for edge_idx in self.crack_tip_extension_edges(neighbor_id)? {
                crack_tip_face_nodes.extend(neighbor.edge_nodes(edge_idx));
            }
        }

        Ok(!crack_tip_face_nodes.is_disjoint(&elem.non_physical_nodes()))
    }

    // A partial element is duplicated if it shares a phantom node with a neighbor that is about to be split for the second time
    fn should_duplicate_for_phantom_corner(&self, elem: &CutElement) -> Result<bool, CutMeshError> {
        if elem.fragments.len() != 1 || elem.crack_tip_split_element {
            return Ok(false);
        }

        for edge_idx in 0..NUM_NODES {
            let phantom_nodes = elem.phantom_nodes_on_edge(edge_idx);
            if phantom_nodes.is_empty() {
                continue;
            }
            let neighbor = match elem.sole_neighbor(edge_idx) {
                Some(neighbor_id) => self.get_elem_by_id(neighbor_id)?,
                None => continue,
            };
            if neighbor.fragments.len() <= 1 {
                continue;
            }

            let shares_phantom_node = (0..NUM_NODES).any(|j| {
                !neighbor.edges[j].is_overlapping(&elem.edges[edge_idx])
                    && neighbor.num_edge_neighbors(j) > 0
                    && !phantom_nodes.is_disjoint(&neighbor.phantom_nodes_on_edge(j))
            });
            if shares_phantom_node {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn connect_fragments(&mut self, merge_uncut_virtual_edges: bool) -> Result<(), CutMeshError> {
        let children = self.child_elements.clone();

        for child_id in children {
            let parent_id = self
                .get_elem_by_id(child_id)?
                .parent
                .ok_or_else(|| CutMeshError::SanityCheck {
                    elem: child_id,
                    reason: "child element has no parent".to_string(),
                })?;

            // the parent's neighbors and their edges facing the parent
            let mut neighbor_edges: [SmallVec<[(usize, usize); 2]>; NUM_NODES] = Default::default();
            let parent = self.get_elem_by_id(parent_id)?;
            for (edge_idx, neighbor_id) in parent.neighbors() {
                let neighbor_edge = self
                    .get_elem_by_id(neighbor_id)?
                    .neighbor_index(parent_id)
                    .ok_or(CutMeshError::NeighborMismatch {
                        elem: neighbor_id,
                        neighbor: parent_id,
                    })?;
                neighbor_edges[edge_idx].push((neighbor_id, neighbor_edge));
            }

            for (j, neighbors) in neighbor_edges.iter().enumerate() {
                for (neighbor_id, m) in neighbors.iter().copied() {
                    let neighbor_children = self.get_elem_by_id(neighbor_id)?.children.clone();
                    if self.get_elem_by_id(child_id)?.edges[j].has_intersection() {
                        for neighbor_child_id in neighbor_children {
                            self.connect_cut_edge(child_id, j, neighbor_child_id, m)?;
                        }
                    } else if merge_uncut_virtual_edges {
                        for neighbor_child_id in neighbor_children {
                            self.connect_uncut_edge(child_id, j, neighbor_child_id, m)?;
                        }
                    }
                }
            }

            for (j, neighbors) in neighbor_edges.iter().enumerate() {
                let node = self.get_elem_by_id(child_id)?.nodes[j];
                if node.is_temp() {
                    let permanent = self.new_permanent_node(self.node_parent(node));
                    self.switch_node(child_id, permanent, node, true)?;
                    self.remove_node(node)?;
                }
                if neighbors.is_empty() && self.get_elem_by_id(child_id)?.edges[j].has_intersection() {
                    self.duplicate_free_edge_embedded_node(child_id, j)?;
                }
            }

            if !self.get_elem_by_id(child_id)?.interior_nodes.is_empty() {
                self.duplicate_interior_embedded_node(child_id)?;
            }
        }

        Ok(())
    }

    // merge the nodes of a child's cut edge with a connected child of the neighbor across it
    fn connect_cut_edge(
        &mut self,
        child_id: usize,
        edge_idx: usize,
        neighbor_child_id: usize,
        neighbor_edge_idx: usize,
    ) -> Result<(), CutMeshError> {
        let child = self.get_elem_by_id(child_id)?;
        let neighbor_child = self.get_elem_by_id(neighbor_child_id)?;
        let child_nodes = child.edge_nodes(edge_idx);
        let neighbor_nodes = neighbor_child.edge_nodes(neighbor_edge_idx);

        if child_nodes[0] == neighbor_nodes[1] && child_nodes[1] == neighbor_nodes[0] {
            self.add_to_merged_edge_map(child_nodes, child_id, neighbor_child_id);
            return Ok(());
        }

        let child_frag = child.first_fragment()?;
        let connected = match neighbor_child.fragments.first() {
            Some(neighbor_frag) => child_frag.is_connected(neighbor_frag),
            None => child_frag.is_connected(&neighbor_child.whole_fragment()),
        };
        if !connected {
            return Ok(());
        }

        let merged = [
            self.merge_nodes(child_nodes[0], neighbor_nodes[1], child_id, neighbor_child_id)?,
            self.merge_nodes(child_nodes[1], neighbor_nodes[0], child_id, neighbor_child_id)?,
        ];
        self.add_to_merged_edge_map(merged, child_id, neighbor_child_id);
        self.duplicate_embedded_node(child_id, neighbor_child_id, edge_idx, neighbor_edge_idx)
    }

    // merge non-physical nodes copied from the same node across an uncut edge
    fn connect_uncut_edge(
        &mut self,
        child_id: usize,
        edge_idx: usize,
        neighbor_child_id: usize,
        neighbor_edge_idx: usize,
    ) -> Result<(), CutMeshError> {
        let neighbor_edge = &self.get_elem_by_id(neighbor_child_id)?.edges[neighbor_edge_idx];
        if neighbor_edge.has_intersection() {
            return Ok(());
        }
        let neighbor_nodes = neighbor_edge.nodes;
        let child_nodes = self.get_elem_by_id(child_id)?.edge_nodes(edge_idx);
        if child_nodes[0] == neighbor_nodes[1] && child_nodes[1] == neighbor_nodes[0] {
            return Ok(());
        }

        for i in 0..2 {
            let (child_node, neighbor_node) = (child_nodes[i], neighbor_nodes[1 - i]);
            let parent = self.node_parent(child_node);
            if parent.is_some() && parent == self.node_parent(neighbor_node) {
                self.merge_nodes(child_node, neighbor_node, child_id, neighbor_child_id)?;
            }
        }
        Ok(())
    }

    // replace a node in an element (and optionally in its parent and the parent's neighbors' children)
    fn switch_node(
        &mut self,
        elem_id: usize,
        new_node: NodeKey,
        old_node: NodeKey,
        descend_to_parent: bool,
    ) -> Result<(), CutMeshError> {
        let elem = self.elem_mut(elem_id)?;
        elem.switch_node(new_node, old_node);

        let parent_id = match elem.parent {
            Some(parent_id) if descend_to_parent => parent_id,
            _ => return Ok(()),
        };
        let parent = self.elem_mut(parent_id)?;
        parent.switch_node(new_node, old_node);

        for (_, neighbor_id) in parent.neighbors() {
            let neighbor_children = self.get_elem_by_id(neighbor_id)?.children.clone();
            for neighbor_child_id in neighbor_children {
                self.elem_mut(neighbor_child_id)?.switch_node(new_node, old_node);
            }
        }
        Ok(())
    }

    /// Merge two nodes of neighboring children which represent the same physical node, returning the surviving node
    fn merge_nodes(
        &mut self,
        child_node: NodeKey,
        neighbor_node: NodeKey,
        child_id: usize,
        neighbor_child_id: usize,
    ) -> Result<NodeKey, CutMeshError> {
        if child_node == neighbor_node {
            return Ok(child_node);
        }

        let child_parent = self.node_parent(child_node);
        let neighbor_parent = self.node_parent(neighbor_node);
        let failure = |reason| CutMeshError::MergeFailure {
            first: child_node,
            second: neighbor_node,
            reason,
        };

        match (child_node.is_permanent(), neighbor_node.is_permanent()) {
            (true, true) => {
                if neighbor_parent == Some(child_node) {
                    self.switch_node(neighbor_child_id, child_node, neighbor_node, true)?;
                    self.remove_node(neighbor_node)?;
                    Ok(child_node)
                } else if child_parent == Some(neighbor_node) {
                    self.switch_node(child_id, neighbor_node, child_node, true)?;
                    self.remove_node(child_node)?;
                    Ok(neighbor_node)
                } else if child_parent.is_some() && child_parent == neighbor_parent {
                    self.switch_node(neighbor_child_id, child_node, neighbor_node, true)?;
                    self.remove_node(neighbor_node)?;
                    Ok(child_node)
                } else {
                    Err(failure("both nodes are permanent"))
                }
            }
            (true, false) => {
                if neighbor_parent != Some(child_node) && neighbor_parent != child_parent {
                    return Err(failure("the temporary node was not copied from the permanent node or its parent"));
                }
                self.switch_node(neighbor_child_id, child_node, neighbor_node, true)?;
                self.remove_node(neighbor_node)?;
                Ok(child_node)
            }
            (false, true) => {
                if child_parent != Some(neighbor_node) && child_parent != neighbor_parent {
                    return Err(failure("the temporary node was not copied from the permanent node or its parent"));
                }
                self.switch_node(child_id, neighbor_node, child_node, true)?;
                self.remove_node(child_node)?;
                Ok(neighbor_node)
            }
            (false, false) => {
                if child_parent != neighbor_parent {
                    return Err(failure("the temporary nodes do not share a common parent"));
                }
                let merged = self.new_permanent_node(child_parent);
                self.switch_node(neighbor_child_id, merged, neighbor_node, true)?;
                self.switch_node(child_id, merged, child_node, true)?;
                self.remove_node(neighbor_node)?;
                self.remove_node(child_node)?;
                Ok(merged)
            }
        }
    }

    fn add_to_merged_edge_map(&mut self, nodes: [NodeKey; 2], elem_0: usize, elem_1: usize) {
        let mut key = nodes;
        key.sort();
        let elems = self.merged_edge_map.entry(key).or_default();
        elems.insert(elem_0);
        elems.insert(elem_1);
    }

    // does another child of this element's parent carry `node` on the same edge?
    fn sibling_has_embedded_node(&self, elem: &CutElement, edge_idx: usize, node: NodeKey) -> Result<bool, CutMeshError> {
        let parent = match elem.parent {
            Some(parent_id) => self.get_elem_by_id(parent_id)?,
            None => return Ok(false),
        };
        for sibling_id in parent.children.iter().filter(|c| **c != elem.id) {
            if self.get_elem_by_id(*sibling_id)?.edges[edge_idx].embedded_node() == Some(node) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    // (split on this edge, crack tip on this edge)
    fn split_state(&self, elem: &CutElement, edge_idx: usize, node: NodeKey) -> Result<(bool, bool), CutMeshError> {
        let parent = match elem.parent {
            Some(parent_id) => self.get_elem_by_id(parent_id)?,
            None => return Ok((false, false)),
        };
        if parent.children.len() > 1 {
            Ok((self.sibling_has_embedded_node(elem, edge_idx, node)?, false))
        } else if parent.crack_tip_split_element {
            Ok((false, parent.crack_tip_neighbors.contains(&edge_idx)))
        } else {
            Ok((false, false))
        }
    }

    // give each side of an opened crack face its own embedded node on a merged edge
    fn duplicate_embedded_node(
        &mut self,
        elem_id: usize,
        neighbor_id: usize,
        edge_idx: usize,
        neighbor_edge_idx: usize,
    ) -> Result<(), CutMeshError> {
        let elem = self.get_elem_by_id(elem_id)?;
        let neighbor = self.get_elem_by_id(neighbor_id)?;
        let embedded = elem.edges[edge_idx].embedded_node();
        if embedded != neighbor.edges[neighbor_edge_idx].embedded_node() {
            return Err(CutMeshError::SanityCheck {
                elem: elem_id,
                reason: format!("embedded nodes on the edge merged with Elem {} do not match", neighbor_id),
            });
        }
        let embedded = match embedded {
            Some(node) => node,
            None => return Ok(()),
        };

        let (current_split, current_tip) = self.split_state(elem, edge_idx, embedded)?;
        let (neighbor_split, neighbor_tip) = self.split_state(neighbor, neighbor_edge_idx, embedded)?;
        let can_duplicate =
            (current_split && (neighbor_split || neighbor_tip)) || (neighbor_split && current_tip);
        if !can_duplicate {
            return Ok(());
        }

        let host_edge = &elem.edges[edge_idx];
        let elem_frag = elem.first_fragment()?;
        let neighbor_frag = neighbor.first_fragment()?;
        if elem_frag.contains_node(embedded)
            && neighbor_frag.contains_node(embedded)
            && elem_frag.common_nodes_with_edge(host_edge).len() == 1
            && neighbor_frag.common_nodes_with_edge(host_edge).len() == 1
        {
            let duplicate = self.new_embedded_node();
            self.elem_mut(elem_id)?.switch_embedded_node(duplicate, embedded);
            self.elem_mut(neighbor_id)?.switch_embedded_node(duplicate, embedded);
        }
        Ok(())
    }

    // give a child its own embedded node on a cut edge on the mesh boundary
    fn duplicate_free_edge_embedded_node(&mut self, elem_id: usize, edge_idx: usize) -> Result<(), CutMeshError> {
        let elem = self.get_elem_by_id(elem_id)?;
        let embedded = match elem.edges[edge_idx].embedded_node() {
            Some(node) => node,
            None => return Ok(()),
        };
        if !self.sibling_has_embedded_node(elem, edge_idx, embedded)? {
            return Ok(());
        }

        let frag = elem.first_fragment()?;
        if frag.common_nodes_with_edge(&elem.edges[edge_idx]).len() == 1 && frag.contains_node(embedded) {
            let duplicate = self.new_embedded_node();
            self.elem_mut(elem_id)?.switch_embedded_node(duplicate, embedded);
        }
        Ok(())
    }

    fn duplicate_interior_embedded_node(&mut self, elem_id: usize) -> Result<(), CutMeshError> {
        let elem = self.get_elem_by_id(elem_id)?;
        let embedded = match elem.interior_nodes.as_slice() {
            [face_node] => face_node.node,
            nodes => {
                return Err(CutMeshError::SanityCheck {
                    elem: elem_id,
                    reason: format!("expected 1 interior node; found {}", nodes.len()),
                })
            }
        };
        let parent = match elem.parent {
            Some(parent_id) => self.get_elem_by_id(parent_id)?,
            None => return Ok(()),
        };

        let mut sibling_has_node = false;
        for sibling_id in parent.children.iter().filter(|c| **c != elem_id) {
            match self.get_elem_by_id(*sibling_id)?.interior_nodes.as_slice() {
                [face_node] => sibling_has_node |= face_node.node == embedded,
                nodes => {
                    return Err(CutMeshError::SanityCheck {
                        elem: *sibling_id,
                        reason: format!("expected 1 interior node; found {}", nodes.len()),
                    })
                }
            }
        }

        if sibling_has_node {
            let duplicate = self.new_embedded_node();
            self.elem_mut(elem_id)?.switch_embedded_node(duplicate, embedded);
        }
        Ok(())
    }

    /// Identify the elements at the tip of the crack after a topology update
    ///
    /// An edge merged between three elements, two of which overlay one another, ends at the crack tip; the third element
    /// is a crack tip element.
    fn find_crack_tip_elements(&mut self) -> Result<(), CutMeshError> {
        for parent_id in self.parent_elements.iter() {
            self.crack_tip_elements.remove(parent_id);
        }

        let mut tips = Vec::new();
        for (nodes, elems) in self.merged_edge_map.iter() {
            match elems.len() {
                0 | 1 => {
                    return Err(CutMeshError::MergedEdgeCount {
                        node_0: nodes[0],
                        node_1: nodes[1],
                        count: elems.len(),
                    })
                }
                3 => {
                    let tip_elems: SmallVec<[&CutElement; 3]> = elems
                        .iter()
                        .map(|id| self.get_elem_by_id(*id))
                        .collect::<Result<_, _>>()?;
                    let overlays = [
                        tip_elems[0].overlays_elem(tip_elems[1])?,
                        tip_elems[1].overlays_elem(tip_elems[2])?,
                        tip_elems[2].overlays_elem(tip_elems[0])?,
                    ];
                    match overlays {
                        [true, false, false] => tips.push(tip_elems[2].id),
                        [false, true, false] => tips.push(tip_elems[0].id),
                        [false, false, true] => tips.push(tip_elems[1].id),
                        [false, false, false] => {}
                        _ => {
                            return Err(CutMeshError::SanityCheck {
                                elem: tip_elems[0].id,
                                reason: "only 2 of the elements on a crack tip edge can overlay".to_string(),
                            })
                        }
                    }
                }
                _ => {}
            }
        }

        self.crack_tip_elements.extend(tips);
        Ok(())
    }

    // ----------------------------------------------------------------------------------------------------
    // Ancestry and restoration
    // ----------------------------------------------------------------------------------------------------

    /// Remove split parent elements and forget the parent/child relationships of the last topology update
    pub fn clear_ancestry(&mut self) -> Result<(), CutMeshError> {
        self.inverse_connectivity.clear();

        for parent_id in std::mem::take(&mut self.parent_elements) {
            self.elements
                .remove(&parent_id)
                .ok_or(CutMeshError::ElemNotFound(parent_id))?;
        }

        for elem in self.elements.values_mut() {
            elem.parent = None;
            elem.children.clear();
            for node in elem.nodes.iter() {
                self.inverse_connectivity
                    .entry(*node)
                    .or_default()
                    .insert(elem.id);
            }
        }

        for node in self.permanent_nodes.values_mut() {
            node.parent = None;
        }
        self.temp_nodes.clear();
        self.new_nodes.clear();
        self.child_elements.clear();

        Ok(())
    }

    /// Remove all elements and non-embedded nodes
    ///
    /// Embedded nodes are kept so that saved cut states can be restored with the same node ids.
    pub fn reset(&mut self) {
        self.new_nodes.clear();
        self.child_elements.clear();
        self.parent_elements.clear();
        self.merged_edge_map.clear();
        self.crack_tip_elements.clear();
        self.inverse_connectivity.clear();
        self.permanent_nodes.clear();
        self.temp_nodes.clear();
        self.elements.clear();
    }

    /// Copy the fragments and interior nodes of a saved (localized) element onto an element without fragments
    pub fn restore_fragment_info(&mut self, elem_id: usize, saved: &CutElement) -> Result<(), CutMeshError> {
        let elem = self.elem_mut(elem_id)?;
        if !elem.fragments.is_empty() || !elem.interior_nodes.is_empty() {
            return Err(CutMeshError::SanityCheck {
                elem: elem_id,
                reason: "cannot restore fragments onto an element with existing fragments or interior nodes".to_string(),
            });
        }
        if saved.nodes.iter().any(|n| n.category != NodeCategory::LocalIndex) {
            return Err(CutMeshError::SanityCheck {
                elem: elem_id,
                reason: "the saved element must be expressed in terms of local nodes".to_string(),
            });
        }

        elem.fragments = saved.fragments.clone();
        elem.interior_nodes = saved.interior_nodes.clone();
        for (local, global) in saved.nodes.iter().zip(elem.nodes) {
            elem.switch_node(global, *local);
        }
        Ok(())
    }

    /// Re-apply the edge intersections of a saved (localized) element, reusing its embedded nodes
    pub fn restore_edge_intersections(&mut self, elem_id: usize, saved: &CutElement) -> Result<(), CutMeshError> {
        for (edge_idx, edge) in saved.edges.iter().enumerate() {
            if let (Some(node), Some(position)) = (edge.embedded_node(), edge.intersection(saved.nodes[edge_idx])) {
                self.add_edge_intersection_with(elem_id, edge_idx, position, Some(node))?;
            }
        }
        Ok(())
    }
}

// the number of edges and embedded/permanent nodes of each fragment must match the number of cut edges
fn physical_link_sanity_check(elem: &CutElement) -> Result<(), CutMeshError> {
    let fail = |reason: &str| {
        Err(CutMeshError::SanityCheck {
            elem: elem.id,
            reason: reason.to_string(),
        })
    };

    let mut counts: SmallVec<[(usize, usize, usize); 2]> = SmallVec::new();
    for frag in elem.fragments.iter() {
        let mut permanent = BTreeSet::new();
        let mut embedded = BTreeSet::new();
        for node in frag.edges.iter().flat_map(|e| e.nodes) {
            match node.category {
                NodeCategory::Permanent => {
                    permanent.insert(node);
                }
                NodeCategory::Embedded => {
                    embedded.insert(node);
                }
                _ => return fail("fragments may only contain permanent and embedded nodes"),
            }
        }
        counts.push((frag.num_edges(), embedded.len(), permanent.len()));
    }

    if elem.interior_nodes.len() > 1 {
        return fail("an element may have at most 1 interior node");
    }

    let n = NUM_NODES;
    match (elem.num_cuts(), counts.as_slice()) {
        (0, [(edges, emb, perm)]) if *edges == n && *emb == 0 && *perm == n => Ok(()),
        (1, [(edges, emb, perm)]) if *edges == n + 1 && *emb == 1 && *perm == n => Ok(()),
        (2, [(edges_0, emb_0, perm_0), (edges_1, emb_1, perm_1)])
            if edges_0 + edges_1 == n + 4 && *emb_0 == 2 && *emb_1 == 2 && perm_0 + perm_1 == n =>
        {
            Ok(())
        }
        (3, [(_, 3, _)]) | (3, [(_, 3, _), (_, 3, _)]) => Ok(()),
        (cuts, _) if cuts > 3 => fail("more than 3 cut edges"),
        (cuts, _) => Err(CutMeshError::SanityCheck {
            elem: elem.id,
            reason: format!("incorrect fragment edges or node categories for an element with {} cuts", cuts),
        }),
    }
}

impl fmt::Display for CutElemMesh {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(100);
        writeln!(f, "{}", rule)?;
        writeln!(f, "{:^100}", "CutElemMesh")?;
        writeln!(f, "{}", rule)?;

        let list = |nodes: &BTreeMap<usize, CutNode>| {
            nodes
                .keys()
                .map(|id| id.to_string())
                .collect::<Vec<_>>()
                .join(" ")
        };
        writeln!(f, "Permanent Nodes: {}", list(&self.permanent_nodes))?;
        writeln!(f, "Temp Nodes: {}", list(&self.temp_nodes))?;
        writeln!(f, "Embedded Nodes: {}", list(&self.embedded_nodes))?;
        writeln!(f, "Parent Elements: {:?}", self.parent_elements)?;
        writeln!(f, "Child Elements: {:?}", self.child_elements)?;

        writeln!(
            f,
            "{:>4} | {:<24} | {:<24} | {:<24} | fragments",
            "id", "nodes", "embedded nodes", "edge neighbors"
        )?;
        writeln!(f, "{}", "-".repeat(100))?;

        for elem in self.elements.values() {
            let nodes: Vec<String> = elem.nodes.iter().map(|n| format!("{:>5}", n.to_string())).collect();
            let embedded: Vec<String> = elem
                .edges
                .iter()
                .map(|e| match e.embedded_node() {
                    Some(node) => format!("{:>5}", node.to_string()),
                    None => format!("{:>5}", "--"),
                })
                .collect();
            let neighbors: Vec<String> = elem
                .edge_neighbors
                .iter()
                .map(|n| match n.as_slice() {
                    [] => format!("{:>5}", "--"),
                    [single] => format!("{:>5}", single),
                    many => format!("{:?}", many),
                })
                .collect();
            let fragments: Vec<String> = elem
                .fragments
                .iter()
                .enumerate()
                .map(|(i, frag): (usize, &Fragment)| {
                    let frag_nodes: Vec<String> = frag.nodes().iter().map(|n| n.to_string()).collect();
                    format!("{}: {}", i, frag_nodes.join(" "))
                })
                .collect();

            writeln!(
                f,
                "{:>4} | {:<24} | {:<24} | {:<24} | {}",
                elem.id,
                nodes.concat(),
                embedded.concat(),
                neighbors.concat(),
                fragments.join(" | ")
            )?;
        }
        Ok(())
    }
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

    /// Two unit squares side by side
    /// ```text
    ///   3 ----- 4 ----- 5
    ///   |   0   |   1   |
    ///   0 ----- 1 ----- 2
    /// ```
    fn two_by_one() -> CutElemMesh {
        let mut mesh = CutElemMesh::new();
        mesh.add_elements(&[[0, 1, 4, 3], [1, 2, 5, 4]]).unwrap();
        mesh.update_edge_neighbors().unwrap();
        mesh
    }

    fn embedded_count(frag: &Fragment) -> usize {
        frag.nodes().iter().filter(|n| n.is_embedded()).count()
    }

    fn assert_symmetric_neighbors(mesh: &CutElemMesh) {
        for elem in mesh.elements() {
            for (_, neighbor) in elem.neighbors() {
                assert!(mesh.get_elem_by_id(neighbor).unwrap().neighbor_index(elem.id).is_some());
            }
        }
    }

    #[test]
    fn add_elements() {
        let mut mesh = CutElemMesh::new();
        assert!(matches!(mesh.add_elements(&[]), Err(CutMeshError::EmptyElementList)));

        assert_eq!(mesh.add_elements(&[[0, 1, 4, 3], [1, 2, 5, 4]]).unwrap(), 0);
        assert_eq!(mesh.add_elements(&[[3, 4, 7, 6]]).unwrap(), 2);
        assert_eq!(mesh.permanent_nodes().count(), 8);
        assert_eq!(mesh.num_elements(), 3);

        assert!(matches!(
            mesh.add_element(&[4, 5, 8, 7], 1),
            Err(CutMeshError::DuplicateElem(1))
        ));
        assert_eq!(mesh.add_element(&[4, 5, 8, 7], 10).unwrap().id, 10);

        assert_eq!(mesh.get_elem_id_by_nodes(&[1, 2, 5, 4]), Some(1));
        assert_eq!(mesh.get_elem_id_by_nodes(&[9, 9, 9, 9]), None);
        assert!(matches!(mesh.get_elem_by_id(4), Err(CutMeshError::ElemNotFound(4))));
    }

    #[test]
    fn neighbors() {
        let mesh = two_by_one();
        let elem_0 = mesh.get_elem_by_id(0).unwrap();
        let elem_1 = mesh.get_elem_by_id(1).unwrap();
        assert_eq!(elem_0.edge_neighbors[1].as_slice(), &[1]);
        assert_eq!(elem_1.edge_neighbors[3].as_slice(), &[0]);
        assert_eq!(elem_0.neighbors().len(), 1);
        assert_eq!(elem_1.neighbors().len(), 1);

        let mut grid = CutElemMesh::new();
        grid.add_elements(&[[0, 1, 4, 3], [1, 2, 5, 4], [3, 4, 7, 6], [4, 5, 8, 7]])
            .unwrap();
        grid.update_edge_neighbors().unwrap();
        assert_symmetric_neighbors(&grid);
        assert_eq!(grid.get_elem_by_id(3).unwrap().neighbors().as_slice(), &[(0, 1), (3, 2)]);
    }

    #[test]
    fn intersections_propagate() {
        let mut mesh = two_by_one();
        let node = mesh.add_edge_intersection(0, 1, 0.3).unwrap();
        assert_eq!(node, e(0));

        let shared_edge = &mesh.get_elem_by_id(1).unwrap().edges[3];
        assert_eq!(shared_edge.embedded_node(), Some(node));
        assert!((shared_edge.intersection(p(4)).unwrap() - 0.7).abs() < 1e-12);

        // the same cut seen from the neighbor reuses the node
        assert_eq!(mesh.add_edge_intersection(1, 3, 0.7).unwrap(), node);
        assert!(matches!(
            mesh.add_edge_intersection(1, 3, 0.5),
            Err(CutMeshError::IncompatibleIntersection { elem: 1, edge: 3, .. })
        ));
        assert!(matches!(
            mesh.add_edge_intersection(0, 4, 0.5),
            Err(CutMeshError::InvalidEdge { elem: 0, edge: 4 })
        ));
        assert_eq!(mesh.embedded_nodes().count(), 1);
    }

    #[test]
    fn single_edge_cut() {
        let mut mesh = two_by_one();
        mesh.add_edge_intersection(0, 1, 0.5).unwrap();
        mesh.update_physical_links_and_fragments().unwrap();

        for id in [0, 1] {
            let elem = mesh.get_elem_by_id(id).unwrap();
            assert_eq!(elem.fragments.len(), 1);
            let frag = &elem.fragments[0];
            assert_eq!(frag.num_edges(), NUM_NODES + 1);
            assert_eq!(embedded_count(frag), 1);
            assert_eq!(frag.nodes().iter().filter(|n| n.is_permanent()).count(), NUM_NODES);
        }
    }

    #[test]
    fn two_edge_cut() {
        let mut mesh = two_by_one();
        mesh.add_edge_intersection(0, 0, 0.5).unwrap();
        mesh.add_edge_intersection(0, 2, 0.5).unwrap();
        mesh.update_physical_links_and_fragments().unwrap();

        let elem = mesh.get_elem_by_id(0).unwrap();
        assert_eq!(elem.fragments.len(), 2);
        assert_eq!(elem.fragments[0].num_edges() + elem.fragments[1].num_edges(), NUM_NODES + 4);
        assert!(elem.fragments.iter().all(|f| embedded_count(f) == 2));

        // uncut elements lose their temporary fragment
        assert!(mesh.get_elem_by_id(1).unwrap().fragments.is_empty());
    }

    #[test]
    fn too_many_cuts() {
        let mut mesh = two_by_one();
        for edge in 0..3 {
            mesh.add_edge_intersection(0, edge, 0.5).unwrap();
        }
        assert!(matches!(
            mesh.update_physical_links_and_fragments(),
            Err(CutMeshError::Unsupported(_))
        ));
    }

    // cut straight through elem 0 from the bottom to the top
    fn fully_cut() -> CutElemMesh {
        let mut mesh = two_by_one();
        mesh.add_edge_intersection(0, 0, 0.5).unwrap();
        mesh.add_edge_intersection(0, 2, 0.5).unwrap();
        mesh.update_physical_links_and_fragments().unwrap();
        mesh.update_topology(true).unwrap();
        mesh
    }

    #[test]
    fn full_cut_topology() {
        let mesh = fully_cut();
        assert_eq!(mesh.parent_elements(), &[0]);
        assert_eq!(mesh.child_elements(), &[2, 3]);
        assert_eq!(mesh.num_temp_nodes(), 0);
        assert!(mesh.crack_tip_elements().is_empty());
        assert!(mesh.merged_edge_map().is_empty());
        assert_eq!(mesh.new_nodes(), &[p(6), p(7), p(8), p(9)]);
        assert_eq!(mesh.get_elem_by_id(0).unwrap().children.as_slice(), &[2, 3]);
        assert_eq!(mesh.get_elem_by_id(1).unwrap().children.as_slice(), &[1]);

        let right = mesh.get_elem_by_id(2).unwrap();
        let left = mesh.get_elem_by_id(3).unwrap();
        assert_eq!(right.nodes, [p(6), p(1), p(4), p(7)]);
        assert_eq!(left.nodes, [p(0), p(8), p(9), p(3)]);
        assert_eq!(right.parent, Some(0));
        assert_eq!(right.generation, 1);

        // the crack faces are opened with independent embedded nodes
        assert_eq!(right.edges[0].embedded_node(), Some(e(2)));
        assert_eq!(right.edges[2].embedded_node(), Some(e(3)));
        assert_eq!(left.edges[0].embedded_node(), Some(e(0)));
        assert_eq!(left.edges[2].embedded_node(), Some(e(1)));
        assert!(right.fragments[0].contains_node(e(2)));
        assert!(!right.fragments[0].contains_node(e(0)));

        // new nodes remember the nodes they were copied from
        assert_eq!(mesh.node(p(6)).unwrap().parent, Some(p(0)));
        assert_eq!(mesh.node(p(9)).unwrap().parent, Some(p(4)));
    }

    #[test]
    fn neighbors_after_clearing_ancestry() {
        let mut mesh = fully_cut();
        mesh.clear_ancestry().unwrap();
        mesh.update_edge_neighbors().unwrap();

        assert!(mesh.get_elem_by_id(0).is_err());
        assert_eq!(mesh.num_elements(), 3);
        assert!(mesh.node(p(6)).unwrap().parent.is_none());
        assert!(mesh.new_nodes().is_empty());

        assert_eq!(mesh.get_elem_by_id(1).unwrap().edge_neighbors[3].as_slice(), &[2]);
        assert_eq!(mesh.get_elem_by_id(2).unwrap().edge_neighbors[1].as_slice(), &[1]);
        assert_eq!(mesh.get_elem_by_id(3).unwrap().neighbors().len(), 0);
        assert_symmetric_neighbors(&mesh);
    }

    #[test]
    fn fragment_edge_intersection() {
        let mut mesh = fully_cut();
        mesh.clear_ancestry().unwrap();

        // the crack face of the right child runs between its two embedded nodes
        let crack_face = &mesh.get_elem_by_id(2).unwrap().fragments[0].edges[3];
        assert_eq!(crack_face.nodes, [e(3), e(2)]);
        assert_eq!(mesh.add_frag_edge_intersection(2, 3, 1e-5).unwrap(), None);
        assert!(mesh.add_frag_edge_intersection(2, 1, 0.5).is_err());

        let node = mesh.add_frag_edge_intersection(2, 3, 0.5).unwrap().unwrap();
        assert_eq!(node, e(4));
        let elem = mesh.get_elem_by_id(2).unwrap();
        assert_eq!(elem.interior_nodes.len(), 1);
        let xi = elem.interior_nodes[0].xi;
        assert!(xi[0].abs() < 1e-14 && xi[1].abs() < 1e-14);

        let masters = elem.get_master_info(node).unwrap();
        assert_eq!(masters.len(), 4);
        assert!(masters.iter().all(|(_, w)| (w - 0.25).abs() < 1e-14));

        // an interior node without a second cut does not survive the fragment update
        mesh.update_physical_links_and_fragments().unwrap();
        let elem = mesh.get_elem_by_id(2).unwrap();
        assert!(elem.interior_nodes.is_empty());
        assert_eq!(elem.fragments.len(), 1);
        assert_eq!(elem.fragments[0].num_cuts(), 0);
        assert!(mesh.node(e(4)).is_none());
    }

    #[test]
    fn crack_tip() {
        let mut mesh = two_by_one();
        mesh.add_edge_intersection(0, 1, 0.5).unwrap();
        mesh.add_edge_intersection(0, 3, 0.5).unwrap();
        mesh.update_physical_links_and_fragments().unwrap();
        mesh.update_topology(true).unwrap();

        // the upper child shares node 1 and the lower child node 4 with the uncut neighbor
        assert_eq!(mesh.get_elem_by_id(2).unwrap().nodes, [p(6), p(1), p(4), p(3)]);
        assert_eq!(mesh.get_elem_by_id(3).unwrap().nodes, [p(0), p(1), p(4), p(7)]);
        assert_eq!(mesh.new_nodes(), &[p(6), p(7)]);

        // the face at the crack tip stays intact and keeps a single embedded node
        for child in [2, 3] {
            assert_eq!(mesh.get_elem_by_id(child).unwrap().edges[1].embedded_node(), Some(e(0)));
        }
        assert_eq!(mesh.get_elem_by_id(1).unwrap().edges[3].embedded_node(), Some(e(0)));

        let tip_edge = mesh.merged_edge_map().get(&[p(1), p(4)]).unwrap();
        assert_eq!(tip_edge, &BTreeSet::from([1, 2, 3]));
        assert_eq!(mesh.crack_tip_elements(), &BTreeSet::from([1]));

        mesh.clear_ancestry().unwrap();
        mesh.update_edge_neighbors().unwrap();
        mesh.init_crack_tip_topology().unwrap();
        assert_symmetric_neighbors(&mesh);

        assert_eq!(mesh.crack_tip_elements(), &BTreeSet::from([1]));
        let tip = mesh.get_elem_by_id(1).unwrap();
        assert_eq!(tip.edge_neighbors[3].as_slice(), &[2, 3]);
        assert_eq!(tip.tip_edge_id(), Some(3));
        for child in [2, 3] {
            let elem = mesh.get_elem_by_id(child).unwrap();
            assert!(elem.crack_tip_split_element);
            assert_eq!(elem.crack_tip_neighbors.as_slice(), &[1]);
            assert!(!mesh.will_crack_tip_extend(child).unwrap());
        }
    }

    #[test]
    fn reset_and_restore() {
        let mut mesh = two_by_one();
        mesh.add_edge_intersection(0, 0, 0.5).unwrap();
        mesh.add_edge_intersection(0, 2, 0.5).unwrap();
        mesh.update_physical_links_and_fragments().unwrap();

        let cut = mesh.get_elem_by_id(0).unwrap().clone();
        let saved = cut.localized().unwrap();

        mesh.reset();
        assert_eq!(mesh.num_elements(), 0);
        assert_eq!(mesh.embedded_nodes().count(), 2);

        mesh.add_elements(&[[0, 1, 4, 3], [1, 2, 5, 4]]).unwrap();
        mesh.restore_edge_intersections(0, &saved).unwrap();
        mesh.restore_fragment_info(0, &saved).unwrap();

        let restored = mesh.get_elem_by_id(0).unwrap();
        assert_eq!(restored.edges, cut.edges);
        assert_eq!(restored.fragments, cut.fragments);
        assert!(mesh.restore_fragment_info(0, &saved).is_err());
        assert!(mesh.restore_fragment_info(1, &cut).is_err());
    }

    #[test]
    fn display() {
        let mesh = fully_cut();
        let printed = mesh.to_string();
        assert!(printed.contains("Permanent Nodes: 0 1 2 3 4 5 6 7 8 9"));
        assert!(printed.contains("Child Elements: [2, 3]"));
        assert!(printed.contains("e2"));
    }
}

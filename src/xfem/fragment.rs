use super::edge::CutEdge;
use super::node::NodeKey;
use super::CutMeshError;
use smallvec::SmallVec;

/// The physical part of an element, described by the closed, ordered cycle of its boundary edges
///
/// Consecutive edges share a node: `edges[k].nodes[1] == edges[k + 1].nodes[0]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub edges: Vec<CutEdge>,
}

impl Fragment {
    /// A fragment covering a whole element
    pub fn whole(elem_edges: &[CutEdge]) -> Self {
        Self {
            edges: elem_edges.to_vec(),
        }
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    /// Number of boundary edges which are intersected
    pub fn num_cuts(&self) -> usize {
        self.edges.iter().filter(|e| e.has_intersection()).count()
    }

    /// The node is a vertex of the fragment's boundary
    pub fn contains_node(&self, node: NodeKey) -> bool {
        self.edges.iter().any(|e| e.nodes.contains(&node))
    }

    /// All vertices of the fragment's boundary, in order
    pub fn nodes(&self) -> SmallVec<[NodeKey; 8]> {
        self.edges.iter().map(|e| e.nodes[0]).collect()
    }

    /// The fragments share a boundary edge
    pub fn is_connected(&self, other: &Fragment) -> bool {
        self.edges
            .iter()
            .any(|e| other.edges.iter().any(|oe| e.equivalent(oe)))
    }

    /// The end nodes of `edge` which are also vertices of this fragment
    pub fn common_nodes_with_edge(&self, edge: &CutEdge) -> SmallVec<[NodeKey; 2]> {
        edge.nodes
            .iter()
            .copied()
            .filter(|n| self.contains_node(*n))
            .collect()
    }

    pub fn is_edge_interior(&self, edge_idx: usize) -> bool {
        self.edges
            .get(edge_idx)
            .map_or(false, |e| e.is_interior_edge())
    }

    pub fn switch_node(&mut self, new_node: NodeKey, old_node: NodeKey) {
        for edge in self.edges.iter_mut() {
            edge.switch_node(new_node, old_node);
        }
    }

    /// Split the fragment at its intersected edges
    ///
    /// One cut replaces the cut edge with its two halves. Two cuts (on edges `i < j`) produce two fragments joined by a new interior edge:
    /// ```text
    ///    a_j  <----x e_j <---- b_j
    ///    |         :            ^
    ///    |    B    :     A      |
    ///    v         :            |
    ///    b_i  ---->x e_i ----> a_i ... (edges cycle counter-clockwise)
    /// ```
    /// `A` runs from `e_i` through the edges between the cuts to `e_j` and closes with `(e_j, e_i)`; `B` runs from `e_j` around the remaining edges and closes with `(e_i, e_j)`.
    pub fn split(&self) -> Result<SmallVec<[Fragment; 2]>, CutMeshError> {
        let cuts: SmallVec<[(usize, NodeKey); 2]> = self
            .edges
            .iter()
            .enumerate()
            .filter_map(|(k, e)| e.embedded_node().map(|node| (k, node)))
            .take(3)
            .collect();

        let half_edges = |k: usize, emb: NodeKey| {
            let [a, b] = self.edges[k].nodes;
            (CutEdge::new(a, emb), CutEdge::new(emb, b))
        };

        let mut fragments = SmallVec::new();
        match cuts.as_slice() {
            [] => fragments.push(self.clone()),
            [(k, emb)] => {
                let (first, second) = half_edges(*k, *emb);
                let mut edges = self.edges.clone();
                edges[*k] = first;
                edges.insert(k + 1, second);
                fragments.push(Fragment { edges });
            }
            [(i, e_i), (j, e_j)] => {
                let n = self.edges.len();
                let (a_i_half, i_b_half) = half_edges(*i, *e_i);
                let (a_j_half, j_b_half) = half_edges(*j, *e_j);

                let mut a_edges = vec![i_b_half];
                a_edges.extend(self.edges[i + 1..*j].iter().cloned());
                a_edges.push(a_j_half);
                a_edges.push(CutEdge::new(*e_j, *e_i));

                let mut b_edges = vec![j_b_half];
                b_edges.extend((j + 1..n + i).map(|k| self.edges[k % n].clone()));
                b_edges.push(a_i_half);
                b_edges.push(CutEdge::new(*e_i, *e_j));

                fragments.push(Fragment { edges: a_edges });
                fragments.push(Fragment { edges: b_edges });
            }
            _ => return Err(CutMeshError::Unsupported("splitting a fragment with more than 2 cuts")),
        }

        Ok(fragments)
    }

    /// Merge pairs of consecutive edges which both lie on the same intersected host edge back into a single intersected edge
    pub fn combine_tip_edges(&mut self, host_edges: &[CutEdge]) {
        for host in host_edges.iter().filter(|e| e.has_intersection()) {
            let halves: SmallVec<[usize; 2]> = (0..self.edges.len())
                .filter(|k| host.contains_edge(&self.edges[*k]) && !host.is_overlapping(&self.edges[*k]))
                .take(3)
                .collect();
            if halves.len() != 2 {
                continue;
            }

            // the halves are consecutive in the cycle, possibly wrapping around
            let (first, second) = if halves[1] == halves[0] + 1 {
                (halves[0], halves[1])
            } else {
                (halves[1], halves[0])
            };

            let mut combined = host.clone();
            if combined.nodes[0] != self.edges[first].nodes[0] {
                combined.reverse_nodes();
            }
            self.edges[first] = combined;
            self.edges.remove(second);
        }
    }

    /// If the only intersection is on an interior edge, remove it and return the removed embedded node
    pub fn remove_invalid_embedded_node(&mut self) -> Option<NodeKey> {
        if self.num_cuts() != 1 {
            return None;
        }
        self.edges
            .iter_mut()
            .find(|e| e.is_interior_edge() && e.has_intersection())
            .and_then(|e| e.remove_embedded_node())
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

    fn quad() -> Fragment {
        Fragment::whole(&[
            CutEdge::new(p(0), p(1)),
            CutEdge::new(p(1), p(2)),
            CutEdge::new(p(2), p(3)),
            CutEdge::new(p(3), p(0)),
        ])
    }

    fn is_closed(frag: &Fragment) -> bool {
        let n = frag.edges.len();
        (0..n).all(|k| frag.edges[k].nodes[1] == frag.edges[(k + 1) % n].nodes[0])
    }

    #[test]
    fn single_cut() {
        let mut frag = quad();
        frag.edges[2].add_intersection(0.5, e(0), p(2));

        let split = frag.split().unwrap();
        assert_eq!(split.len(), 1);
        assert_eq!(split[0].num_edges(), 5);
        assert_eq!(split[0].num_cuts(), 0);
        assert!(split[0].contains_node(e(0)));
        assert!(is_closed(&split[0]));
        assert_eq!(split[0].nodes().as_slice(), &[p(0), p(1), p(2), e(0), p(3)]);
    }

    #[test]
    fn two_cuts() {
        let mut frag = quad();
        frag.edges[0].add_intersection(0.5, e(0), p(0));
        frag.edges[2].add_intersection(0.5, e(1), p(2));

        let split = frag.split().unwrap();
        assert_eq!(split.len(), 2);
        assert_eq!(split[0].num_edges() + split[1].num_edges(), 8);
        assert!(split.iter().all(is_closed));

        assert_eq!(split[0].nodes().as_slice(), &[e(0), p(1), p(2), e(1)]);
        assert_eq!(split[1].nodes().as_slice(), &[e(1), p(3), p(0), e(0)]);
        assert!(split[0].is_edge_interior(3));
        assert!(split[0].is_connected(&split[1]));
        assert_eq!(split[0].common_nodes_with_edge(&frag.edges[1]).len(), 2);
        assert_eq!(split[1].common_nodes_with_edge(&frag.edges[0]).as_slice(), &[p(0)]);
    }

    #[test]
    fn adjacent_cuts() {
        let mut frag = quad();
        frag.edges[0].add_intersection(0.5, e(0), p(0));
        frag.edges[1].add_intersection(0.5, e(1), p(1));

        let split = frag.split().unwrap();
        // the corner at p1 is cut off
        assert_eq!(split[0].nodes().as_slice(), &[e(0), p(1), e(1)]);
        assert_eq!(split[1].nodes().as_slice(), &[e(1), p(2), p(3), p(0), e(0)]);
        assert!(split.iter().all(is_closed));
    }

    #[test]
    fn too_many_cuts() {
        let mut frag = quad();
        for k in 0..3 {
            frag.edges[k].add_intersection(0.5, e(k), p(k));
        }
        assert!(matches!(frag.split(), Err(CutMeshError::Unsupported(_))));
    }

    #[test]
    fn combine_halves() {
        let mut host = quad();
        host.edges[3].add_intersection(0.5, e(0), p(3));
        let mut frag = host.split().unwrap().remove(0);
        assert_eq!(frag.num_edges(), 5);

        frag.combine_tip_edges(&host.edges);
        assert_eq!(frag.num_edges(), 4);
        assert_eq!(frag.edges[3], host.edges[3]);
        assert!(is_closed(&frag));
    }

    #[test]
    fn interior_embedded_node() {
        let mut frag = Fragment {
            edges: vec![
                CutEdge::new(e(0), p(1)),
                CutEdge::new(p(1), p(2)),
                CutEdge::new(p(2), e(1)),
                CutEdge::new(e(1), e(0)),
            ],
        };
        assert_eq!(frag.remove_invalid_embedded_node(), None);

        frag.edges[3].add_intersection(0.5, e(2), e(1));
        assert_eq!(frag.remove_invalid_embedded_node(), Some(e(2)));
        assert_eq!(frag.num_cuts(), 0);
    }
}

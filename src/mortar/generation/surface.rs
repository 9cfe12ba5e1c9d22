use super::{vertex_nodes, AutomaticMortarGeneration};
use crate::mesh::elem::ElemType;
use crate::mesh::shape::shape_functions;
use crate::mesh::space::{Point, RefPoint, Vector};
use crate::mesh::{Mesh, MeshError};
use crate::mortar::projection::{
    closest_point_2d, householder_tangents, in_reference_domain, project_along_normal_2d,
};
use crate::mortar::{MortarError, MortarSegmentInfo};

use log::debug;
use rayon::prelude::*;
use smallvec::SmallVec;
use std::collections::BTreeSet;

type Polygon = Vec<[f64; 2]>;
type SurfaceProjectionEntries = Vec<((usize, usize), (RefPoint, usize))>;

static SINGLE_TRI: [&[usize]; 1] = [&[0, 1, 2]];
static SINGLE_QUAD: [&[usize]; 1] = [&[0, 1, 2, 3]];
static TRI6_SUB_ELEMS: [&[usize]; 4] = [&[0, 3, 5], &[3, 1, 4], &[5, 4, 2], &[3, 4, 5]];
static QUAD9_SUB_ELEMS: [&[usize]; 4] = [&[0, 4, 8, 7], &[4, 1, 5, 8], &[8, 5, 2, 6], &[7, 8, 6, 3]];

/// The first-order sub-elements a surface element is split into before clipping
///
/// ```text
///   Quad9:                 Tri6:
///     3 --- 6 --- 2          2
///     |  3  |  2  |          | \
///     7 --- 8 --- 5          5 - 4
///     |  0  |  1  |          | \ 3 \
///     0 --- 4 --- 1          0 - 3 - 1
/// ```
/// First-order elements are their own (single) sub-element.
pub fn sub_elements(elem_type: ElemType) -> Option<(ElemType, &'static [&'static [usize]])> {
    match elem_type {
        ElemType::Tri3 => Some((ElemType::Tri3, &SINGLE_TRI)),
        ElemType::Quad4 => Some((ElemType::Quad4, &SINGLE_QUAD)),
        ElemType::Tri6 => Some((ElemType::Tri3, &TRI6_SUB_ELEMS)),
        ElemType::Quad9 => Some((ElemType::Quad4, &QUAD9_SUB_ELEMS)),
        _ => None,
    }
}

/// Map a point in the reference space of a sub-element into the reference space of its parent element
pub fn sub_elem_to_parent(elem_type: ElemType, sub_elem: usize, sub_xi: RefPoint) -> Option<RefPoint> {
    let (sub_type, table) = sub_elements(elem_type)?;
    let local_nodes = table.get(sub_elem)?;
    let shape = shape_functions(sub_type, sub_xi)?;

    let mut xi = [0.0; 2];
    for (phi, local_node) in shape.phi.iter().zip(local_nodes.iter()) {
        let node_xi = elem_type.reference_node(*local_node)?;
        xi[0] += phi * node_xi[0];
        xi[1] += phi * node_xi[1];
    }
    Some(xi)
}

/// The type and global node ids of a sub-element
pub fn sub_elem_nodes(
    mesh: &Mesh,
    elem_id: usize,
    sub_elem: usize,
) -> Result<(ElemType, SmallVec<[usize; 4]>), MortarError> {
    let elem = mesh.elem(elem_id)?;
    let (sub_type, table) = sub_elements(elem.elem_type)
        .ok_or(MortarError::UnsupportedDimension(elem.elem_type.dim() + 1))?;
    let local_nodes = table.get(sub_elem).ok_or(MeshError::DegenerateElem(elem_id))?;

    Ok((
        sub_type,
        local_nodes.iter().map(|local| elem.nodes[*local]).collect(),
    ))
}

/// The plane onto which a secondary sub-element and the nearby primary elements are projected for clipping
#[derive(Debug, Clone, Copy)]
pub struct SubElemFrame {
    pub center: Point,
    pub normal: Vector,
    pub tangents: [Vector; 2],
}

impl SubElemFrame {
    pub fn project(&self, point: &Point) -> [f64; 2] {
        let d = point - self.center;
        [d.dot(&self.tangents[0]), d.dot(&self.tangents[1])]
    }

    pub fn lift(&self, xy: [f64; 2]) -> Point {
        self.center + self.tangents[0] * xy[0] + self.tangents[1] * xy[1]
    }
}

// a primary element prepared for clipping
struct PrimaryPatch {
    elem: usize,
    center: Point,
    radius: f64,
    normal: Vector,
    sub_polygons: SmallVec<[SmallVec<[Point; 4]>; 4]>,
}

impl PrimaryPatch {
    fn new(mesh: &Mesh, elem_id: usize) -> Result<Self, MortarError> {
        let elem = mesh.elem(elem_id)?;
        let points = mesh.elem_points(elem_id)?;
        let (_, table) = sub_elements(elem.elem_type)
            .ok_or(MortarError::UnsupportedDimension(elem.elem_type.dim() + 1))?;

        let center = Point::from(
            points.iter().fold(Vector::zeros(), |acc, p| acc + p.coords) / points.len() as f64,
        );
        let radius = points
            .iter()
            .map(|p| (p - center).norm())
            .fold(0.0, f64::max);

        Ok(Self {
            elem: elem_id,
            center,
            radius,
            normal: mesh.lower_d_normal(elem_id, elem.elem_type.reference_center())?,
            sub_polygons: table
                .iter()
                .map(|local_nodes| local_nodes.iter().map(|local| points[*local]).collect())
                .collect(),
        })
    }

    // the outward normals of both sides must oppose each other (the frame normal is already flipped for periodic interfaces)
    fn faces(&self, frame: &SubElemFrame) -> bool {
        self.normal.dot(&frame.normal) < 0.0
    }

    fn is_near(&self, frame: &SubElemFrame, radius: f64) -> bool {
        let d = self.center - frame.center;
        let normal_dist = d.dot(&frame.normal);
        let in_plane = d - frame.normal * normal_dist;
        let reach = self.radius + radius;
        in_plane.norm() <= reach && normal_dist.abs() <= reach
    }
}

impl AutomaticMortarGeneration {
    /// The center, averaged nodal normal, and Householder tangents of one of a secondary element's sub-elements
    pub fn sub_elem_frame(
        &self,
        mesh: &Mesh,
        secondary_elem: usize,
        sub_elem: usize,
    ) -> Result<SubElemFrame, MortarError> {
        let (_, nodes) = sub_elem_nodes(mesh, secondary_elem, sub_elem)?;

        let mut center = Vector::zeros();
        let mut normal_sum = Vector::zeros();
        for node_id in nodes.iter() {
            center += mesh.point(*node_id)?.coords;
            normal_sum += self
                .secondary_node_to_nodal_normal
                .get(node_id)
                .ok_or(MortarError::MissingNodalNormal(*node_id))?;
        }

        let normal = normal_sum
            .try_normalize(0.0)
            .ok_or(MeshError::DegenerateElem(secondary_elem))?;

        Ok(SubElemFrame {
            center: Point::from(center / nodes.len() as f64),
            normal,
            tangents: householder_tangents(&normal),
        })
    }

    // ----------------------------------------------------------------------------------------------------
    // Surface node projections
    // ----------------------------------------------------------------------------------------------------

    pub(super) fn project_secondary_nodes_3d(&mut self, mesh: &Mesh) -> Result<(), MortarError> {
        let vertices = vertex_nodes(mesh, &self.secondary_elems)?;
        let results = vertices
            .par_iter()
            .map(|node_id| self.project_secondary_node_3d(mesh, *node_id))
            .collect::<Result<Vec<SurfaceProjectionEntries>, MortarError>>()?;

        for (key, value) in results.into_iter().flatten() {
            self.secondary_node_and_elem_to_surface_xi2
                .entry(key)
                .or_insert(value);
        }
        Ok(())
    }

    pub(super) fn project_primary_nodes_3d(&mut self, mesh: &Mesh) -> Result<(), MortarError> {
        let vertices = vertex_nodes(mesh, &self.primary_elems)?;
        let results = vertices
            .par_iter()
            .map(|node_id| self.project_primary_node_3d(mesh, *node_id))
            .collect::<Result<Vec<SurfaceProjectionEntries>, MortarError>>()?;

        for (key, value) in results.into_iter().flatten() {
            self.primary_node_and_elem_to_surface_xi1
                .entry(key)
                .or_insert(value);
        }
        Ok(())
    }

    fn project_secondary_node_3d(
        &self,
        mesh: &Mesh,
        node_id: usize,
    ) -> Result<SurfaceProjectionEntries, MortarError> {
        let normal = self
            .secondary_node_to_nodal_normal
            .get(&node_id)
            .ok_or(MortarError::MissingNodalNormal(node_id))?;
        let point = mesh.point(node_id)?;

        let mut tried = BTreeSet::new();
        for candidate in self.nearest_nodes(mesh, point, &self.nodes_to_primary_elem_map)? {
            for primary_elem_id in self.nodes_to_primary_elem_map[&candidate].iter() {
                if !tried.insert(*primary_elem_id) {
                    continue;
                }

                let primary_type = mesh.elem(*primary_elem_id)?.elem_type;
                match project_along_normal_2d(
                    primary_type,
                    &mesh.elem_points(*primary_elem_id)?,
                    point,
                    normal,
                    &self.config,
                ) {
                    Some((xi, _)) if in_reference_domain(primary_type, xi, self.config.xi_tolerance) => {
                        return Ok(self
                            .nodes_to_secondary_elem_map
                            .get(&node_id)
                            .into_iter()
                            .flatten()
                            .map(|secondary_elem_id| ((node_id, *secondary_elem_id), (xi, *primary_elem_id)))
                            .collect());
                    }
                    _ => continue,
                }
            }
        }

        debug!(
            "Failed to find a primary elem into which secondary Node {} could be projected",
            node_id
        );
        Ok(Vec::new())
    }

    fn project_primary_node_3d(
        &self,
        mesh: &Mesh,
        node_id: usize,
    ) -> Result<SurfaceProjectionEntries, MortarError> {
        let first_neighbor = match self
            .nodes_to_primary_elem_map
            .get(&node_id)
            .and_then(|neighbors| neighbors.first())
        {
            Some(first_neighbor) => *first_neighbor,
            None => return Ok(Vec::new()),
        };
        let point = mesh.point(node_id)?;

        let mut tried = BTreeSet::new();
        for candidate in self.nearest_nodes(mesh, point, &self.nodes_to_secondary_elem_map)? {
            for secondary_elem_id in self.nodes_to_secondary_elem_map[&candidate].iter() {
                if !tried.insert(*secondary_elem_id) {
                    continue;
                }

                let secondary_type = mesh.elem(*secondary_elem_id)?.elem_type;
                match closest_point_2d(
                    secondary_type,
                    &mesh.elem_points(*secondary_elem_id)?,
                    point,
                    &self.config,
                ) {
                    Some(xi) if in_reference_domain(secondary_type, xi, self.config.xi_tolerance) => {
                        return Ok(vec![((node_id, first_neighbor), (xi, *secondary_elem_id))]);
                    }
                    _ => continue,
                }
            }
        }

        Ok(Vec::new())
    }

    // ----------------------------------------------------------------------------------------------------
    // Surface Segment Mesh
    // ----------------------------------------------------------------------------------------------------

    /// Build the segment mesh of a 3D problem.
    ///
    /// Each first-order sub-element of a secondary element is projected onto its own plane along with the nearby, facing, primary elements.
    /// The overlap of each pair of projected polygons is triangulated into segments:
    /// ```text
    ///     secondary         primary          segments
    ///    +--------+                        +--------+
    ///    |        |      +--------+        |  \  /  |
    ///    |        |  ∩   |        |   =>   |---*----|
    ///    +--------+      |        |
    ///                    +--------+
    /// ```
    /// Only covered regions produce segments; the covered fraction of each secondary element is retained for edge dropping.
    pub fn build_mortar_segment_mesh_3d(&mut self, mesh: &Mesh) -> Result<(), MortarError> {
        self.mortar_segment_mesh.clear(2);
        self.msm_elem_to_info.clear();
        self.secondary_elems_to_mortar_segments.clear();
        self.secondary_elem_coverage.clear();

        let patches = self
            .primary_elems
            .iter()
            .map(|elem_id| PrimaryPatch::new(mesh, *elem_id))
            .collect::<Result<Vec<PrimaryPatch>, MortarError>>()?;

        let secondary_elems: Vec<usize> = self.secondary_elems.iter().copied().collect();
        for secondary_elem_id in secondary_elems {
            self.secondary_elems_to_mortar_segments
                .entry(secondary_elem_id)
                .or_default();

            let elem_type = mesh.elem(secondary_elem_id)?.elem_type;
            let n_sub_elems = sub_elements(elem_type)
                .map(|(_, table)| table.len())
                .ok_or(MortarError::UnsupportedDimension(elem_type.dim() + 1))?;

            let mut total_area = 0.0;
            let mut covered_area = 0.0;

            for sub_elem in 0..n_sub_elems {
                let frame = self.sub_elem_frame(mesh, secondary_elem_id, sub_elem)?;
                let (_, nodes) = sub_elem_nodes(mesh, secondary_elem_id, sub_elem)?;
                let sub_points = nodes
                    .iter()
                    .map(|node_id| mesh.point(*node_id).copied())
                    .collect::<Result<SmallVec<[Point; 4]>, MeshError>>()?;

                let secondary_poly =
                    counter_clockwise(sub_points.iter().map(|p| frame.project(p)).collect());
                let secondary_area = polygon_area(&secondary_poly);
                if secondary_area <= 0.0 {
                    continue;
                }
                total_area += secondary_area;

                let radius = sub_points
                    .iter()
                    .map(|p| (p - frame.center).norm())
                    .fold(0.0, f64::max);

                for patch in patches
                    .iter()
                    .filter(|patch| patch.faces(&frame) && patch.is_near(&frame, radius))
                {
                    for primary_points in patch.sub_polygons.iter() {
                        let primary_poly =
                            counter_clockwise(primary_points.iter().map(|p| frame.project(p)).collect());
                        let overlap = clip_polygon(&secondary_poly, &primary_poly);
                        if overlap.len() < 3 {
                            continue;
                        }
                        let overlap_area = polygon_area(&overlap);
                        if overlap_area <= self.config.xi_tolerance * secondary_area {
                            continue;
                        }
                        covered_area += overlap_area;

                        for tri in fan_triangulate(&overlap) {
                            if polygon_area(&tri) <= f64::EPSILON * secondary_area {
                                continue;
                            }
                            let node_ids: SmallVec<[usize; 3]> = tri
                                .iter()
                                .map(|xy| self.mortar_segment_mesh.add_point(frame.lift(*xy)))
                                .collect();
                            let segment = self.mortar_segment_mesh.add_elem(&node_ids);

                            self.msm_elem_to_info.insert(
                                segment,
                                MortarSegmentInfo {
                                    primary_elem: Some(patch.elem),
                                    sub_elem,
                                    ..MortarSegmentInfo::new(secondary_elem_id)
                                },
                            );
                            self.secondary_elems_to_mortar_segments
                                .entry(secondary_elem_id)
                                .or_default()
                                .insert(segment);
                        }
                    }
                }
            }

            let coverage = if total_area > 0.0 {
                covered_area / total_area
            } else {
                0.0
            };
            self.secondary_elem_coverage.insert(secondary_elem_id, coverage);
        }

        self.build_mortar_interface_coupling(mesh)
    }

    /// Fraction of a secondary element's area covered by the primary surface (3D only)
    pub fn secondary_elem_coverage(&self, secondary_elem: usize) -> Option<f64> {
        self.secondary_elem_coverage.get(&secondary_elem).copied()
    }
}

// ----------------------------------------------------------------------------------------------------
// Planar polygon utilities
// ----------------------------------------------------------------------------------------------------

// twice the signed area of triangle (a, b, p); positive if p is left of a -> b
fn orient(a: [f64; 2], b: [f64; 2], p: [f64; 2]) -> f64 {
    (b[0] - a[0]) * (p[1] - a[1]) - (b[1] - a[1]) * (p[0] - a[0])
}

fn signed_area(poly: &[[f64; 2]]) -> f64 {
    let n = poly.len();
    0.5 * (0..n)
        .map(|i| {
            let (p, q) = (poly[i], poly[(i + 1) % n]);
            p[0] * q[1] - q[0] * p[1]
        })
        .sum::<f64>()
}

fn polygon_area(poly: &[[f64; 2]]) -> f64 {
    signed_area(poly).abs()
}

fn counter_clockwise(mut poly: Polygon) -> Polygon {
    if signed_area(&poly) < 0.0 {
        poly.reverse();
    }
    poly
}

/// Sutherland-Hodgman clipping of `subject` against a convex, counter-clockwise `clip` polygon
fn clip_polygon(subject: &[[f64; 2]], clip: &[[f64; 2]]) -> Polygon {
    let mut output: Polygon = subject.to_vec();

    for i in 0..clip.len() {
        if output.is_empty() {
            break;
        }
        let (a, b) = (clip[i], clip[(i + 1) % clip.len()]);
        let input = std::mem::take(&mut output);

        for j in 0..input.len() {
            let current = input[j];
            let previous = input[(j + input.len() - 1) % input.len()];
            let o_current = orient(a, b, current);
            let o_previous = orient(a, b, previous);

            let crossing = || {
                let t = o_previous / (o_previous - o_current);
                [
                    previous[0] + t * (current[0] - previous[0]),
                    previous[1] + t * (current[1] - previous[1]),
                ]
            };

            if o_current >= 0.0 {
                if o_previous < 0.0 {
                    output.push(crossing());
                }
                output.push(current);
            } else if o_previous >= 0.0 {
                output.push(crossing());
            }
        }
    }

    dedup_polygon(output)
}

// remove (cyclically) consecutive vertices which coincide
fn dedup_polygon(poly: Polygon) -> Polygon {
    let scale = poly
        .iter()
        .map(|p| p[0].abs().max(p[1].abs()))
        .fold(0.0, f64::max);
    let tol = 1e-12 * scale.max(1.0);
    let same = |p: &[f64; 2], q: &[f64; 2]| (p[0] - q[0]).abs() <= tol && (p[1] - q[1]).abs() <= tol;

    let mut deduped: Polygon = Vec::with_capacity(poly.len());
    for p in poly {
        if deduped.last().map_or(true, |last| !same(last, &p)) {
            deduped.push(p);
        }
    }
    while deduped.len() > 1 && same(&deduped[0], &deduped[deduped.len() - 1]) {
        deduped.pop();
    }
    deduped
}

// triangles of a convex polygon; polygons with more than 3 vertices are fanned from their vertex centroid
fn fan_triangulate(poly: &[[f64; 2]]) -> Vec<[[f64; 2]; 3]> {
    if poly.len() == 3 {
        return vec![[poly[0], poly[1], poly[2]]];
    }

    let n = poly.len() as f64;
    let centroid = [
        poly.iter().map(|p| p[0]).sum::<f64>() / n,
        poly.iter().map(|p| p[1]).sum::<f64>() / n,
    ];
    (0..poly.len())
        .map(|i| [centroid, poly[i], poly[(i + 1) % poly.len()]])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mortar::test_meshes::{self, stacked_cubes};
    use crate::mortar::MortarConfig;

    fn generate(mesh: &Mesh) -> AutomaticMortarGeneration {
        generate_with_edge_dropping(mesh, true)
    }

    fn generate_with_edge_dropping(mesh: &Mesh, correct_edge_dropping: bool) -> AutomaticMortarGeneration {
        test_meshes::generate(
            mesh,
            MortarConfig {
                correct_edge_dropping,
                ..Default::default()
            },
        )
    }

    fn total_segment_area(amg: &AutomaticMortarGeneration) -> f64 {
        amg.mortar_segment_mesh()
            .elems()
            .map(|segment| amg.mortar_segment_mesh().measure(segment.id).unwrap())
            .sum()
    }

    #[test]
    fn matching_faces() {
        let mesh = stacked_cubes(&[0.0, 1.0], [0.0, 0.0]);
        let amg = generate(&mesh);

        assert_eq!(amg.dim(), 3);
        assert_eq!(amg.mortar_segment_mesh().segment_dim(), 2);
        assert!(amg.mortar_segment_mesh().n_elems() >= 2);
        assert!((total_segment_area(&amg) - 1.0).abs() < 1e-12);

        let secondary = *amg.secondary_elems().iter().next().unwrap();
        let primary = *amg.primary_elems().iter().next().unwrap();
        assert!(amg
            .msm_elem_to_info()
            .values()
            .all(|info| info.primary_elem == Some(primary) && info.is_surface_segment() && info.sub_elem == 0));
        assert!((amg.secondary_elem_coverage(secondary).unwrap() - 1.0).abs() < 1e-12);
        assert!(amg.inactive_local_lm_nodes().is_empty());

        // every secondary node lands on the primary face
        for node_id in mesh.elem(secondary).unwrap().nodes.iter() {
            let projection = amg.secondary_node_surface_projection(*node_id, secondary);
            assert_eq!(projection.elem(), Some(primary));
            let xi = projection.xi().unwrap();
            assert!(xi[0].abs() > 1.0 - 1e-8 && xi[1].abs() > 1.0 - 1e-8);
        }

        // and every primary node lands on the secondary face
        for node_id in mesh.elem(primary).unwrap().nodes.iter() {
            let projection = amg.primary_node_surface_projection(*node_id, primary);
            assert_eq!(projection.elem(), Some(secondary));
            let xi = projection.xi().unwrap();
            assert!(xi[0].abs() > 1.0 - 1e-8 && xi[1].abs() > 1.0 - 1e-8);
        }
    }

    #[test]
    fn split_primary_surface() {
        let mesh = stacked_cubes(&[0.0, 0.3, 1.0], [0.0, 0.0]);
        let amg = generate(&mesh);

        assert!((total_segment_area(&amg) - 1.0).abs() < 1e-12);
        for primary in amg.primary_elems().iter() {
            let area: f64 = amg
                .msm_elem_to_info()
                .iter()
                .filter(|(_, info)| info.primary_elem == Some(*primary))
                .map(|(segment, _)| amg.mortar_segment_mesh().measure(*segment).unwrap())
                .sum();
            let width = if area < 0.5 { 0.3 } else { 0.7 };
            assert!((area - width).abs() < 1e-12);
        }
    }

    #[test]
    fn partial_overlap() {
        let mesh = stacked_cubes(&[0.0, 1.0], [0.5, 0.25]);
        let amg = generate(&mesh);

        assert!((total_segment_area(&amg) - 0.5 * 0.75).abs() < 1e-12);
        let secondary = *amg.secondary_elems().iter().next().unwrap();
        assert!((amg.secondary_elem_coverage(secondary).unwrap() - 0.375).abs() < 1e-12);

        // covered segments keep every node of the secondary face active
        assert!(amg.inactive_local_lm_nodes().is_empty());
        assert!(amg.inactive_local_lm_elems().is_empty());
    }

    #[test]
    fn edge_dropping_modes() {
        let mesh = stacked_cubes(&[0.0, 1.0], [0.5, 0.25]);
        let correct = generate_with_edge_dropping(&mesh, true);
        assert!(correct.inactive_local_lm_nodes().is_empty());
        assert!(correct.inactive_local_lm_elems().is_empty());

        let secondary = *correct.secondary_elems().iter().next().unwrap();
        let face_nodes: BTreeSet<usize> = mesh.elem(secondary).unwrap().nodes.iter().copied().collect();
        assert_eq!(face_nodes.len(), 4);

        // a partially covered face drops every one of its nodes
        let amg = generate_with_edge_dropping(&mesh, false);
        assert!((amg.secondary_elem_coverage(secondary).unwrap() - 0.375).abs() < 1e-12);
        assert_eq!(amg.inactive_local_lm_nodes(), &face_nodes);
        assert_eq!(amg.inactive_local_lm_elems(), &BTreeSet::from([secondary]));

        // a fully covered face keeps them
        let mesh = stacked_cubes(&[0.0, 1.0], [0.0, 0.0]);
        let amg = generate_with_edge_dropping(&mesh, false);
        assert!(amg.inactive_local_lm_nodes().is_empty());
        assert!(amg.inactive_local_lm_elems().is_empty());
    }

    #[test]
    fn quad9_sub_elements_map_to_parent() {
        // center of sub-element 2 is the center of the upper right quadrant
        let xi = sub_elem_to_parent(ElemType::Quad9, 2, [0.0, 0.0]).unwrap();
        assert!((xi[0] - 0.5).abs() < 1e-14 && (xi[1] - 0.5).abs() < 1e-14);

        // the corner of sub-element 0 is the corner of the parent
        let xi = sub_elem_to_parent(ElemType::Quad9, 0, [-1.0, -1.0]).unwrap();
        assert!((xi[0] + 1.0).abs() < 1e-14 && (xi[1] + 1.0).abs() < 1e-14);

        // the interior sub-element of a Tri6 is inverted relative to the others
        let xi = sub_elem_to_parent(ElemType::Tri6, 3, [0.0, 0.0]).unwrap();
        assert!((xi[0] - 0.5).abs() < 1e-14 && xi[1].abs() < 1e-14);

        assert!(sub_elem_to_parent(ElemType::Quad4, 1, [0.0, 0.0]).is_none());
        assert!(sub_elements(ElemType::Edge2).is_none());
    }

    #[test]
    fn clipping() {
        let square = |x0: f64, y0: f64, size: f64| {
            vec![[x0, y0], [x0 + size, y0], [x0 + size, y0 + size], [x0, y0 + size]]
        };

        let overlap = clip_polygon(&square(0.0, 0.0, 1.0), &square(0.5, 0.5, 1.0));
        assert_eq!(overlap.len(), 4);
        assert!((polygon_area(&overlap) - 0.25).abs() < 1e-14);

        // identical squares share all of their edges
        let overlap = clip_polygon(&square(0.0, 0.0, 1.0), &square(0.0, 0.0, 1.0));
        assert_eq!(overlap.len(), 4);
        assert!((polygon_area(&overlap) - 1.0).abs() < 1e-14);

        assert!(clip_polygon(&square(0.0, 0.0, 1.0), &square(2.0, 0.0, 1.0)).len() < 3);

        let triangles = fan_triangulate(&square(0.0, 0.0, 2.0));
        assert_eq!(triangles.len(), 4);
        assert!((triangles.iter().map(|tri| polygon_area(tri)).sum::<f64>() - 4.0).abs() < 1e-14);

        let clockwise = vec![[0.0, 0.0], [0.0, 1.0], [1.0, 0.0]];
        assert!(signed_area(&counter_clockwise(clockwise)) > 0.0);
    }
}

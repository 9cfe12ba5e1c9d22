use super::generation::surface::{sub_elem_nodes, sub_elem_to_parent};
use super::materials::{MaterialId, MortarMaterials};
use super::projection::project_along_normal_2d;
use super::{AutomaticMortarGeneration, MortarError, MortarSegmentInfo};
use crate::mesh::elem::ElemType;
use crate::mesh::shape::map_to_physical;
use crate::mesh::space::{Point, RefPoint};
use crate::mesh::{BoundaryId, Mesh, MeshError, SubdomainId};
use crate::quadrature::{gauss_points_for_order, triangle_quadrature_points};

use log::warn;
use smallvec::SmallVec;
use std::collections::BTreeSet;

/// The reinitialization entry points invoked by [loop_over_mortar_segments]
///
/// Reference points passed to the face methods are in the reference space of the lower-dimensional element built on that face
/// (equivalently, of the face itself, since lower-dimensional elements copy the side's node order).
pub trait MortarAssembly {
    /// Segment quadrature: physical points and JxW weights
    fn reinit_mortar_segment(&mut self, segment: usize, points: &[Point], jxw: &[f64]);

    /// The secondary interior parent and its face
    fn reinit_elem_face_ref(&mut self, elem: usize, side: usize, points: &[RefPoint]) -> Result<(), MortarError>;

    /// The primary interior parent and its face
    fn reinit_neighbor_face_ref(&mut self, elem: usize, side: usize, points: &[RefPoint]) -> Result<(), MortarError>;

    fn reinit_materials_neighbor(&mut self, subdomain: SubdomainId, materials: &[MaterialId], execute_stateful: bool);

    fn reinit_lower_d_elem(&mut self, elem: usize, points: &[RefPoint]) -> Result<(), MortarError>;

    /// Only the identity of the primary lower-dimensional element is recorded
    fn reinit_primary_lower_d_elem(&mut self, elem: Option<usize>);

    fn reinit_materials_face(&mut self, subdomain: SubdomainId, materials: &[MaterialId]);

    fn reinit_materials_boundary(&mut self, boundary: BoundaryId, materials: &[MaterialId]);

    fn reinit_mortar_user_objects(&mut self, _primary_boundary: BoundaryId, _secondary_boundary: BoundaryId, _displaced: bool) {}
}

/// Quadrature points of a single segment in physical space and in the reference spaces of both lower-dimensional elements
#[derive(Debug, Clone, Default)]
pub struct SegmentQuadrature {
    pub points: Vec<Point>,
    pub jxw: Vec<f64>,
    pub secondary_xi: Vec<RefPoint>,
    pub primary_xi: Vec<RefPoint>,
}

/// Loop over the mortar segments of each `(secondary elem, segments)` entry, reinitializing the assembly and then calling `act`
///
/// For each segment with a primary element, the reinitialization is done in the following order:
/// 1. segment quadrature (`reinit_mortar_segment`)
/// 2. secondary interior parent face (`reinit_elem_face_ref`)
/// 3. primary interior parent face (`reinit_neighbor_face_ref`)
/// 4. primary (neighbor) materials, without stateful execution
/// 5. secondary lower-dimensional element
/// 6. primary lower-dimensional element
/// 7. secondary face, then secondary boundary materials
/// 8. mortar user objects (when `reinit_mortar_user_objects` is set)
///
/// Segments which are not covered by the primary surface are skipped.
pub fn loop_over_mortar_segments<'a, A, I, F>(
    secondary_elems_to_segments: I,
    assembly: &mut A,
    amg: &AutomaticMortarGeneration,
    mesh: &Mesh,
    materials: &MortarMaterials,
    reinit_mortar_user_objects: bool,
    mut act: F,
) -> Result<(), MortarError>
where
    A: MortarAssembly + ?Sized,
    I: IntoIterator<Item = (&'a usize, &'a BTreeSet<usize>)>,
    F: FnMut(&mut A) -> Result<(), MortarError>,
{
    let (primary_boundary, secondary_boundary) = amg.primary_secondary_boundary_id_pair();

    for (secondary_elem_id, segments) in secondary_elems_to_segments {
        if segments.is_empty() {
            warn!("Secondary Elem {} has no mortar segments", secondary_elem_id);
            continue;
        }

        let secondary = mesh.elem(*secondary_elem_id)?;
        let (secondary_ip, secondary_side) = interior_parent_of(mesh, *secondary_elem_id)?;
        let secondary_ip_sub = mesh.elem(secondary_ip)?.subdomain_id;
        let secondary_mats = materials.secondary(secondary_ip_sub)?;

        for segment in segments.iter() {
            let info = amg.segment_info(*segment)?;
            let primary_elem_id = match info.primary_elem {
                Some(primary_elem_id) => primary_elem_id,
                None => continue,
            };

            let (primary_ip, primary_side) = interior_parent_of(mesh, primary_elem_id)?;
            let primary_ip_sub = mesh.elem(primary_ip)?.subdomain_id;
            let primary_mats = materials.primary(primary_ip_sub)?;

            let quadrature = if info.is_surface_segment() {
                surface_segment_quadrature(amg, mesh, *segment, info, secondary.elem_type, primary_elem_id)?
            } else {
                curve_segment_quadrature(amg, *segment, info)?
            };

            assembly.reinit_mortar_segment(*segment, &quadrature.points, &quadrature.jxw);
            assembly.reinit_elem_face_ref(secondary_ip, secondary_side, &quadrature.secondary_xi)?;
            assembly.reinit_neighbor_face_ref(primary_ip, primary_side, &quadrature.primary_xi)?;
            assembly.reinit_materials_neighbor(primary_ip_sub, primary_mats, false);
            assembly.reinit_lower_d_elem(*secondary_elem_id, &quadrature.secondary_xi)?;
            assembly.reinit_primary_lower_d_elem(Some(primary_elem_id));
            assembly.reinit_materials_face(secondary_ip_sub, secondary_mats);
            assembly.reinit_materials_boundary(secondary_boundary, &materials.secondary_boundary_mats);
            if reinit_mortar_user_objects {
                assembly.reinit_mortar_user_objects(
                    primary_boundary,
                    secondary_boundary,
                    amg.config().on_displaced,
                );
            }

            act(assembly)?;
        }
    }

    Ok(())
}

fn interior_parent_of(mesh: &Mesh, lower_elem_id: usize) -> Result<(usize, usize), MortarError> {
    let elem = mesh.elem(lower_elem_id)?;
    elem.interior_parent()
        .zip(elem.interior_parent_side())
        .ok_or(MortarError::MissingInteriorParent(lower_elem_id))
}

/// Gauss points on a 1D segment; the reference coordinates are interpolated linearly between the interval endpoints
pub fn curve_segment_quadrature(
    amg: &AutomaticMortarGeneration,
    segment: usize,
    info: &MortarSegmentInfo,
) -> Result<SegmentQuadrature, MortarError> {
    let msm = amg.mortar_segment_mesh();
    let points = msm.elem_points(segment).ok_or(MortarError::MissingInfo(segment))?;
    let segment_type = if points.len() == 3 {
        ElemType::Edge3
    } else {
        ElemType::Edge2
    };

    let (etas, weights) = gauss_points_for_order(amg.config().quadrature_order);
    let mut quadrature = SegmentQuadrature::default();

    for (qp, (eta, w)) in etas.iter().zip(weights.iter()).enumerate() {
        let sp = map_to_physical(segment_type, &points, [*eta, 0.0]).ok_or(
            MortarError::QuadratureMapping {
                segment,
                qp,
                elem: info.secondary_elem,
            },
        )?;

        let left = 0.5 * (1.0 - eta);
        let right = 0.5 * (1.0 + eta);

        quadrature.points.push(sp.x);
        quadrature.jxw.push(sp.dx_dxi.norm() * w);
        quadrature
            .secondary_xi
            .push([left * info.xi1_a + right * info.xi1_b, 0.0]);
        quadrature
            .primary_xi
            .push([left * info.xi2_a + right * info.xi2_b, 0.0]);
    }

    Ok(quadrature)
}

/// Triangle quadrature on a surface segment; the points are mapped back onto the secondary sub-element and the primary element along the sub-element's normal
pub fn surface_segment_quadrature(
    amg: &AutomaticMortarGeneration,
    mesh: &Mesh,
    segment: usize,
    info: &MortarSegmentInfo,
    secondary_type: ElemType,
    primary_elem_id: usize,
) -> Result<SegmentQuadrature, MortarError> {
    let config = amg.config();
    let tri = amg
        .mortar_segment_mesh()
        .elem_points(segment)
        .ok_or(MortarError::MissingInfo(segment))?;
    let (e1, e2) = (tri[1] - tri[0], tri[2] - tri[0]);
    let double_area = e1.cross(&e2).norm();

    let frame = amg.sub_elem_frame(mesh, info.secondary_elem, info.sub_elem)?;
    let (sub_type, sub_nodes) = sub_elem_nodes(mesh, info.secondary_elem, info.sub_elem)?;
    let sub_points = sub_nodes
        .iter()
        .map(|node_id| mesh.point(*node_id).copied())
        .collect::<Result<SmallVec<[Point; 4]>, MeshError>>()?;

    let primary_type = mesh.elem(primary_elem_id)?.elem_type;
    let primary_points = mesh.elem_points(primary_elem_id)?;

    let (ref_points, weights) = triangle_quadrature_points(config.quadrature_order);
    let mut quadrature = SegmentQuadrature::default();

    for (qp, (xi, w)) in ref_points.iter().zip(weights.iter()).enumerate() {
        let x = tri[0] + e1 * xi[0] + e2 * xi[1];
        let mapping_error = |elem| MortarError::QuadratureMapping { segment, qp, elem };

        let secondary_xi = project_along_normal_2d(sub_type, &sub_points, &x, &frame.normal, config)
            .and_then(|(sub_xi, _)| sub_elem_to_parent(secondary_type, info.sub_elem, sub_xi))
            .ok_or_else(|| mapping_error(info.secondary_elem))?;
        let (primary_xi, _) = project_along_normal_2d(primary_type, &primary_points, &x, &frame.normal, config)
            .ok_or_else(|| mapping_error(primary_elem_id))?;

        quadrature.points.push(x);
        quadrature.jxw.push(w * double_area);
        quadrature.secondary_xi.push(secondary_xi);
        quadrature.primary_xi.push(primary_xi);
    }

    Ok(quadrature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mortar::consumer::{GeometricAssembly, ReinitStep};
    use crate::mortar::materials::{Material, MaterialWarehouse};
    use crate::mortar::test_meshes::{generate, interface_mesh, stacked_cubes};
    use crate::mortar::MortarConfig;

    fn no_materials(amg: &AutomaticMortarGeneration, mesh: &Mesh) -> MortarMaterials {
        crate::mortar::materials::setup_mortar_materials(&[], &MaterialWarehouse::new(), amg, mesh).unwrap()
    }

    #[test]
    fn reinit_order() {
        let mesh = interface_mesh(&[0.0, 1.0, 2.0], &[0.0, 0.6, 2.0], 0.0);
        let amg = generate(&mesh, MortarConfig::default());
        let materials = no_materials(&amg, &mesh);

        let mut assembly = GeometricAssembly::new(&mesh);
        let mut n_segments = 0;
        loop_over_mortar_segments(
            amg.secondary_elems_to_mortar_segments(),
            &mut assembly,
            &amg,
            &mesh,
            &materials,
            true,
            |assembly| {
                n_segments += 1;
                assert_eq!(
                    assembly.reinit_log(),
                    &[
                        ReinitStep::MortarSegment,
                        ReinitStep::ElemFace,
                        ReinitStep::NeighborFace,
                        ReinitStep::NeighborMaterials,
                        ReinitStep::LowerDElem,
                        ReinitStep::PrimaryLowerDElem,
                        ReinitStep::FaceMaterials,
                        ReinitStep::BoundaryMaterials,
                        ReinitStep::MortarUserObjects,
                    ]
                );
                Ok(())
            },
        )
        .unwrap();

        assert_eq!(n_segments, amg.mortar_segment_mesh().n_elems());
    }

    #[test]
    fn quadrature_points_coincide() {
        let mesh = interface_mesh(&[0.0, 0.7, 2.0], &[0.0, 1.1, 1.5, 2.0], 0.0);
        let amg = generate(
            &mesh,
            MortarConfig {
                quadrature_order: 3,
                ..Default::default()
            },
        );
        let materials = no_materials(&amg, &mesh);

        let mut assembly = GeometricAssembly::new(&mesh);
        let mut total_jxw = 0.0;
        loop_over_mortar_segments(
            amg.secondary_elems_to_mortar_segments(),
            &mut assembly,
            &amg,
            &mesh,
            &materials,
            false,
            |assembly| {
                for (qp, x) in assembly.segment_points().iter().enumerate() {
                    assert!((assembly.secondary_points()[qp] - x).norm() < 1e-10);
                    assert!((assembly.primary_points()[qp] - x).norm() < 1e-10);
                }
                total_jxw += assembly.jxw().iter().sum::<f64>();
                assert_eq!(assembly.reinit_log().last(), Some(&ReinitStep::BoundaryMaterials));
                Ok(())
            },
        )
        .unwrap();

        assert!((total_jxw - 2.0).abs() < 1e-12);
    }

    #[test]
    fn surface_quadrature_points_coincide() {
        let mesh = stacked_cubes(&[0.0, 1.0], [0.0, 0.0]);
        let amg = generate(
            &mesh,
            MortarConfig {
                quadrature_order: 2,
                ..Default::default()
            },
        );
        let materials = no_materials(&amg, &mesh);

        let mut assembly = GeometricAssembly::new(&mesh);
        let mut total_jxw = 0.0;
        loop_over_mortar_segments(
            amg.secondary_elems_to_mortar_segments(),
            &mut assembly,
            &amg,
            &mesh,
            &materials,
            false,
            |assembly| {
                assert!(!assembly.jxw().is_empty());
                for (qp, x) in assembly.segment_points().iter().enumerate() {
                    assert!((x.z - 1.0).abs() < 1e-12);
                    assert!((assembly.secondary_points()[qp] - x).norm() < 1e-10);
                    assert!((assembly.primary_points()[qp] - x).norm() < 1e-10);
                }
                total_jxw += assembly.jxw().iter().sum::<f64>();
                Ok(())
            },
        )
        .unwrap();
        assert!((total_jxw - 1.0).abs() < 1e-10);

        // the same rule, computed segment by segment
        let mut direct_jxw = 0.0;
        for (segment, info) in amg.msm_elem_to_info().iter() {
            let secondary_type = mesh.elem(info.secondary_elem).unwrap().elem_type;
            let quadrature = surface_segment_quadrature(
                &amg,
                &mesh,
                *segment,
                info,
                secondary_type,
                info.primary_elem.unwrap(),
            )
            .unwrap();
            assert_eq!(quadrature.points.len(), quadrature.jxw.len());
            for xi in quadrature.secondary_xi.iter().chain(quadrature.primary_xi.iter()) {
                assert!(xi[0].abs() <= 1.0 + 1e-10 && xi[1].abs() <= 1.0 + 1e-10);
            }
            direct_jxw += quadrature.jxw.iter().sum::<f64>();
        }
        assert!((direct_jxw - 1.0).abs() < 1e-10);
    }

    #[test]
    fn uncovered_segments_are_skipped() {
        let mesh = interface_mesh(&[0.0, 1.0, 2.0, 3.0], &[0.0, 1.5], 0.0);
        let amg = generate(&mesh, MortarConfig::default());
        let materials = no_materials(&amg, &mesh);

        let covered = amg
            .msm_elem_to_info()
            .values()
            .filter(|info| info.has_primary())
            .count();
        assert!(covered < amg.mortar_segment_mesh().n_elems());

        let mut assembly = GeometricAssembly::new(&mesh);
        let mut visited = 0;
        let mut covered_length = 0.0;
        loop_over_mortar_segments(
            amg.secondary_elems_to_mortar_segments(),
            &mut assembly,
            &amg,
            &mesh,
            &materials,
            false,
            |assembly| {
                visited += 1;
                covered_length += assembly.jxw().iter().sum::<f64>();
                Ok(())
            },
        )
        .unwrap();

        assert_eq!(visited, covered);
        assert!((covered_length - 1.5).abs() < 1e-12);
    }

    #[test]
    fn materials_are_required() {
        let mesh = interface_mesh(&[0.0, 1.0], &[0.0, 1.0], 0.0);
        let amg = generate(&mesh, MortarConfig::default());

        let mut assembly = GeometricAssembly::new(&mesh);
        let result = loop_over_mortar_segments(
            amg.secondary_elems_to_mortar_segments(),
            &mut assembly,
            &amg,
            &mesh,
            &MortarMaterials::default(),
            false,
            |_| Ok(()),
        );
        assert!(matches!(
            result,
            Err(MortarError::MissingMaterials { side: "secondary", subdomain: 1 })
        ));

        // resolved materials are passed through to the assembly
        let mut warehouse = MaterialWarehouse::new();
        let friction = warehouse.add(Material::block("friction", &[2]).supplies(&["mu"]));
        let consumer = crate::mortar::consumer::WeightedGapUserObject::new("gap").with_dependencies(&["mu"]);
        let materials =
            crate::mortar::materials::setup_mortar_materials(&[&consumer], &warehouse, &amg, &mesh).unwrap();
        loop_over_mortar_segments(
            amg.secondary_elems_to_mortar_segments(),
            &mut assembly,
            &amg,
            &mesh,
            &materials,
            false,
            |assembly| {
                assert_eq!(assembly.neighbor_materials(), &[friction]);
                assert!(assembly.face_materials().is_empty());
                Ok(())
            },
        )
        .unwrap();
    }

    #[test]
    fn action_errors_propagate() {
        let mesh = interface_mesh(&[0.0, 1.0], &[0.0, 1.0], 0.0);
        let amg = generate(&mesh, MortarConfig::default());
        let materials = no_materials(&amg, &mesh);

        let mut assembly = GeometricAssembly::new(&mesh);
        let result = loop_over_mortar_segments(
            amg.secondary_elems_to_mortar_segments(),
            &mut assembly,
            &amg,
            &mesh,
            &materials,
            false,
            |_| Err(MortarError::MissingInfo(42)),
        );
        assert!(matches!(result, Err(MortarError::MissingInfo(42))));
    }
}

use crate::mesh::space::Point;
use crate::mesh::IdTracker;
#[cfg(feature = "json_export")]
use json::{array, object, JsonValue};
use smallvec::SmallVec;
use std::collections::BTreeMap;
#[cfg(feature = "json_export")]
use std::fs::File;
#[cfg(feature = "json_export")]
use std::io::BufWriter;

/// A segment of the mortar mesh: an `Edge2`/`Edge3` in 1D, or a `Tri3` on a surface
#[derive(Debug, Clone)]
pub struct SegmentElem {
    pub id: usize,
    pub nodes: SmallVec<[usize; 3]>,
}

/// The mortar segment mesh. Segments are created and deleted while the mesh is built, so ids are not contiguous.
#[derive(Debug, Clone)]
pub struct MortarSegmentMesh {
    pub points: Vec<Point>,
    elems: BTreeMap<usize, SegmentElem>,
    id_tracker: IdTracker,
    segment_dim: usize,
}

impl Default for MortarSegmentMesh {
    fn default() -> Self {
        Self::blank(1)
    }
}

impl MortarSegmentMesh {
    /// An empty mesh of 1D (curve) or 2D (surface) segments
    pub fn blank(segment_dim: usize) -> Self {
        Self {
            points: Vec::new(),
            elems: BTreeMap::new(),
            id_tracker: IdTracker::new(0),
            segment_dim,
        }
    }

    pub fn segment_dim(&self) -> usize {
        self.segment_dim
    }

    pub fn add_point(&mut self, point: Point) -> usize {
        self.points.push(point);
        self.points.len() - 1
    }

    pub fn add_elem(&mut self, nodes: &[usize]) -> usize {
        let id = self.id_tracker.next_id();
        self.elems.insert(
            id,
            SegmentElem {
                id,
                nodes: SmallVec::from_slice(nodes),
            },
        );
        id
    }

    pub fn delete_elem(&mut self, id: usize) -> Option<SegmentElem> {
        self.elems.remove(&id)
    }

    pub fn elem(&self, id: usize) -> Option<&SegmentElem> {
        self.elems.get(&id)
    }

    pub fn elems(&self) -> impl Iterator<Item = &SegmentElem> + '_ {
        self.elems.values()
    }

    pub fn n_elems(&self) -> usize {
        self.elems.len()
    }

    /// The physical locations of a segment's nodes
    pub fn elem_points(&self, id: usize) -> Option<SmallVec<[Point; 3]>> {
        self.elems
            .get(&id)
            .map(|elem| elem.nodes.iter().map(|n| self.points[*n]).collect())
    }

    /// Chord length (1D) or area (surface) of a segment
    pub fn measure(&self, id: usize) -> Option<f64> {
        let points = self.elem_points(id)?;
        Some(if self.segment_dim == 1 {
            (points[1] - points[0]).norm()
        } else {
            0.5 * (points[1] - points[0]).cross(&(points[2] - points[0])).norm()
        })
    }

    pub fn clear(&mut self, segment_dim: usize) {
        self.points.clear();
        self.elems.clear();
        self.id_tracker = IdTracker::new(0);
        self.segment_dim = segment_dim;
    }

    /// Print the segment mesh to a JSON file specified by path.
    #[cfg(feature = "json_export")]
    pub fn export_to_json(&self, path: impl AsRef<str>) -> std::io::Result<()> {
        let f = File::create(path.as_ref())?;
        let mut w = BufWriter::new(&f);

        let msm_object = object! {
            "Nodes": JsonValue::from(self.points.iter().map(|p| array![p.x, p.y, p.z]).collect::<Vec<_>>()),
            "Elements": JsonValue::from(self.elems.values().map(|elem| object!{
                "id": elem.id,
                "nodes": JsonValue::from(elem.nodes.to_vec()),
            }).collect::<Vec<_>>()),
        };

        msm_object.write_pretty(&mut w, 4)?;

        Ok(())
    }
}

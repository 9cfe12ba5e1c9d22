use super::consumer::MortarConsumer;
use super::{AutomaticMortarGeneration, MortarError};
use crate::mesh::{BoundaryId, Mesh, SubdomainId};
use log::debug;
use std::collections::{BTreeMap, BTreeSet};

/// Index of a [Material] in a [MaterialWarehouse]
pub type MaterialId = usize;

/// Where a material is defined
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MaterialDomain {
    Block(BTreeSet<SubdomainId>),
    Boundary(BTreeSet<BoundaryId>),
}

/// A named provider of material properties
///
/// A material supplies a set of properties, and may itself depend on properties supplied by other materials on the same domain.
#[derive(Debug, Clone)]
pub struct Material {
    pub name: String,
    pub domain: MaterialDomain,
    pub supplied: BTreeSet<String>,
    pub depends_on: BTreeSet<String>,
    /// Stores old values of its properties between time steps
    pub stateful: bool,
}

impl Material {
    pub fn block(name: impl Into<String>, subdomains: &[SubdomainId]) -> Self {
        Self::new(name, MaterialDomain::Block(subdomains.iter().copied().collect()))
    }

    pub fn boundary(name: impl Into<String>, boundaries: &[BoundaryId]) -> Self {
        Self::new(name, MaterialDomain::Boundary(boundaries.iter().copied().collect()))
    }

    fn new(name: impl Into<String>, domain: MaterialDomain) -> Self {
        Self {
            name: name.into(),
            domain,
            supplied: BTreeSet::new(),
            depends_on: BTreeSet::new(),
            stateful: false,
        }
    }

    pub fn supplies(mut self, properties: &[&str]) -> Self {
        self.supplied.extend(properties.iter().map(|p| p.to_string()));
        self
    }

    pub fn depends_on(mut self, properties: &[&str]) -> Self {
        self.depends_on.extend(properties.iter().map(|p| p.to_string()));
        self
    }

    pub fn stateful(mut self) -> Self {
        self.stateful = true;
        self
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum VisitState {
    Visiting,
    Done,
}

/// Storage for all materials in a problem
#[derive(Debug, Clone, Default)]
pub struct MaterialWarehouse {
    materials: Vec<Material>,
}

impl MaterialWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, material: Material) -> MaterialId {
        self.materials.push(material);
        self.materials.len() - 1
    }

    pub fn get(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(id)
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    /// Ids of the materials defined on a subdomain
    pub fn block_materials(&self, subdomain: SubdomainId) -> Vec<MaterialId> {
        self.ids_where(|domain| matches!(domain, MaterialDomain::Block(subs) if subs.contains(&subdomain)))
    }

    /// Ids of the materials defined on a boundary
    pub fn boundary_materials(&self, boundary: BoundaryId) -> Vec<MaterialId> {
        self.ids_where(|domain| matches!(domain, MaterialDomain::Boundary(bids) if bids.contains(&boundary)))
    }

    fn ids_where(&self, pred: impl Fn(&MaterialDomain) -> bool) -> Vec<MaterialId> {
        self.materials
            .iter()
            .enumerate()
            .filter(|(_, material)| pred(&material.domain))
            .map(|(id, _)| id)
            .collect()
    }

    /// Find the minimal, dependency ordered, list of materials (from `candidates`) needed to supply `properties`
    ///
    /// Requested properties which no candidate supplies are ignored; a property required by a selected material which no candidate supplies is an error.
    /// Materials are returned such that each appears after every material it depends on.
    pub fn resolve(
        &self,
        candidates: &[MaterialId],
        properties: &BTreeSet<String>,
        location: &str,
    ) -> Result<Vec<MaterialId>, MortarError> {
        // the lowest id candidate supplying each property
        let mut suppliers: BTreeMap<&str, MaterialId> = BTreeMap::new();
        for id in candidates.iter() {
            if let Some(material) = self.materials.get(*id) {
                for property in material.supplied.iter() {
                    suppliers.entry(property.as_str()).or_insert(*id);
                }
            }
        }

        let roots: BTreeSet<MaterialId> = properties
            .iter()
            .filter_map(|property| suppliers.get(property.as_str()).copied())
            .collect();

        let mut states: BTreeMap<MaterialId, VisitState> = BTreeMap::new();
        let mut ordered = Vec::new();
        for root in roots {
            self.visit(root, &suppliers, &mut states, &mut ordered, location)?;
        }

        if let Some(stateful) = ordered.iter().find_map(|id| {
            self.materials
                .get(*id)
                .filter(|material| material.stateful)
                .map(|material| material.name.clone())
        }) {
            return Err(MortarError::StatefulMaterial(stateful));
        }

        Ok(ordered)
    }

    fn visit(
        &self,
        id: MaterialId,
        suppliers: &BTreeMap<&str, MaterialId>,
        states: &mut BTreeMap<MaterialId, VisitState>,
        ordered: &mut Vec<MaterialId>,
        location: &str,
    ) -> Result<(), MortarError> {
        let material = &self.materials[id];
        match states.get(&id) {
            Some(VisitState::Done) => return Ok(()),
            Some(VisitState::Visiting) => {
                return Err(MortarError::CyclicMaterialDependency(material.name.clone()))
            }
            None => {}
        }
        states.insert(id, VisitState::Visiting);

        for property in material.depends_on.iter() {
            let supplier = suppliers.get(property.as_str()).copied().ok_or_else(|| {
                MortarError::UnsuppliedProperty {
                    property: property.clone(),
                    material: material.name.clone(),
                    location: location.to_string(),
                }
            })?;
            self.visit(supplier, suppliers, states, ordered, location)?;
        }

        states.insert(id, VisitState::Done);
        ordered.push(id);
        Ok(())
    }
}

/// The materials to reinitialize on each side of a mortar interface
#[derive(Debug, Clone, Default)]
pub struct MortarMaterials {
    pub secondary_ip_sub_to_mats: BTreeMap<SubdomainId, Vec<MaterialId>>,
    pub primary_ip_sub_to_mats: BTreeMap<SubdomainId, Vec<MaterialId>>,
    pub secondary_boundary_mats: Vec<MaterialId>,
}

impl MortarMaterials {
    pub fn secondary(&self, subdomain: SubdomainId) -> Result<&[MaterialId], MortarError> {
        self.secondary_ip_sub_to_mats
            .get(&subdomain)
            .map(|mats| mats.as_slice())
            .ok_or(MortarError::MissingMaterials {
                side: "secondary",
                subdomain,
            })
    }

    pub fn primary(&self, subdomain: SubdomainId) -> Result<&[MaterialId], MortarError> {
        self.primary_ip_sub_to_mats
            .get(&subdomain)
            .map(|mats| mats.as_slice())
            .ok_or(MortarError::MissingMaterials {
                side: "primary",
                subdomain,
            })
    }
}

/// Resolve the materials needed by a set of mortar consumers on the interior subdomains adjacent to the interface and on the secondary boundary
pub fn setup_mortar_materials(
    consumers: &[&dyn MortarConsumer],
    warehouse: &MaterialWarehouse,
    amg: &AutomaticMortarGeneration,
    mesh: &Mesh,
) -> Result<MortarMaterials, MortarError> {
    let properties: BTreeSet<String> = consumers
        .iter()
        .flat_map(|consumer| consumer.material_property_dependencies().iter().cloned())
        .collect();

    let mut mortar_materials = MortarMaterials::default();

    for subdomain in interior_parent_subdomains(mesh, amg.secondary_elems())? {
        let mats = warehouse.resolve(
            &warehouse.block_materials(subdomain),
            &properties,
            &format!("secondary subdomain {}", subdomain),
        )?;
        mortar_materials.secondary_ip_sub_to_mats.insert(subdomain, mats);
    }
    for subdomain in interior_parent_subdomains(mesh, amg.primary_elems())? {
        let mats = warehouse.resolve(
            &warehouse.block_materials(subdomain),
            &properties,
            &format!("primary subdomain {}", subdomain),
        )?;
        mortar_materials.primary_ip_sub_to_mats.insert(subdomain, mats);
    }

    let (_, secondary_boundary) = amg.primary_secondary_boundary_id_pair();
    mortar_materials.secondary_boundary_mats = warehouse.resolve(
        &warehouse.boundary_materials(secondary_boundary),
        &properties,
        &format!("secondary boundary {}", secondary_boundary),
    )?;

    debug!(
        "Resolved mortar materials for {} consumer properties",
        properties.len()
    );

    Ok(mortar_materials)
}

fn interior_parent_subdomains(
    mesh: &Mesh,
    lower_d_elems: &BTreeSet<usize>,
) -> Result<BTreeSet<SubdomainId>, MortarError> {
    let mut subdomains = BTreeSet::new();
    for elem_id in lower_d_elems.iter() {
        let parent = mesh
            .elem(*elem_id)?
            .interior_parent()
            .ok_or(MortarError::MissingInteriorParent(*elem_id))?;
        subdomains.insert(mesh.elem(parent)?.subdomain_id);
    }
    Ok(subdomains)
}

use std::collections::HashMap;
use std::rc::Rc;

use glam::{Vec2, Vec3, Vec4};

use crate::error::ComposeError;
use crate::mesh::{MaterialKey, Mesh};

/// One batched draw call: `count` vertices starting at vertex `offset`, all
/// drawn with `material`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawRange {
    pub material: MaterialKey,
    pub offset: usize,
    pub count: usize,
}

impl DrawRange {
    pub fn end(&self) -> usize {
        self.offset + self.count
    }
}

/// Vertex data for a set of meshes, flattened into one buffer per attribute
/// and ordered by material, so that every material is a single contiguous
/// [`DrawRange`]. Vertex `i` is described by entry `i` of every buffer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Composition {
    vertices: Vec<f32>,
    normals: Vec<f32>,
    uvs: Vec<f32>,
    tangents: Vec<f32>,
    colors: Vec<f32>,
    lightmap_coordinates: Vec<f32>,
    indices: Vec<u32>,
    draw_ranges: Vec<DrawRange>,
}

impl Composition {
    /// Groups `meshes` by material and concatenates each group in the order
    /// the meshes are given. Groups are laid out in the order their material
    /// is first seen. Meshes whose attributes do not line up with their
    /// positions abort the whole composition.
    pub fn compose<'a>(
        meshes: impl IntoIterator<Item = &'a Mesh>,
    ) -> Result<Composition, ComposeError> {
        let mut groups: Vec<(MaterialKey, Vec<&Mesh>)> = Vec::new();
        let mut group_indices: HashMap<MaterialKey, usize> = HashMap::new();
        let mut has_lightmaps = false;

        for (index, mesh) in meshes.into_iter().enumerate() {
            let material = mesh.material_key();
            if let Some((attribute, found)) = mesh.mismatched_attribute() {
                return Err(ComposeError::AttributeMismatch {
                    index,
                    material,
                    attribute,
                    expected: mesh.vertex_count(),
                    found,
                });
            }
            has_lightmaps |= !mesh.lightmap_coordinates().is_empty();
            let group = *group_indices.entry(material.clone()).or_insert_with(|| {
                groups.push((material, Vec::new()));
                groups.len() - 1
            });
            groups[group].1.push(mesh);
        }

        let total: usize = groups
            .iter()
            .flat_map(|(_, meshes)| meshes.iter().map(|mesh| mesh.vertex_count()))
            .sum();
        let mut composition = Composition::with_capacity(total, has_lightmaps);

        for (material, meshes) in groups {
            let offset = composition.vertex_count();
            for mesh in meshes {
                composition.push_mesh(mesh, has_lightmaps);
            }
            let count = composition.vertex_count() - offset;
            if count > 0 {
                composition.draw_ranges.push(DrawRange {
                    material,
                    offset,
                    count,
                });
            }
        }

        composition.indices = (0..composition.vertex_count() as u32).collect();
        Ok(composition)
    }

    fn with_capacity(vertex_count: usize, has_lightmaps: bool) -> Composition {
        Composition {
            vertices: Vec::with_capacity(vertex_count * 3),
            normals: Vec::with_capacity(vertex_count * 3),
            uvs: Vec::with_capacity(vertex_count * 2),
            tangents: Vec::with_capacity(vertex_count * 4),
            colors: Vec::with_capacity(vertex_count * 4),
            lightmap_coordinates: Vec::with_capacity(if has_lightmaps { vertex_count * 2 } else { 0 }),
            indices: Vec::with_capacity(vertex_count),
            draw_ranges: Vec::new(),
        }
    }

    fn push_mesh(&mut self, mesh: &Mesh, has_lightmaps: bool) {
        self.vertices
            .extend(mesh.vertices().iter().flat_map(Vec3::to_array));
        self.normals
            .extend(mesh.normals().iter().flat_map(Vec3::to_array));
        self.uvs.extend(mesh.uvs().iter().flat_map(Vec2::to_array));
        self.tangents
            .extend(mesh.tangents().iter().flat_map(Vec4::to_array));
        self.colors
            .extend(mesh.colors().iter().flat_map(Vec4::to_array));
        if !has_lightmaps {
            return;
        }
        if mesh.lightmap_coordinates().is_empty() {
            self.lightmap_coordinates
                .resize(self.lightmap_coordinates.len() + mesh.vertex_count() * 2, 0.0);
        } else {
            self.lightmap_coordinates
                .extend(mesh.lightmap_coordinates().iter().flat_map(Vec2::to_array));
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Positions, three floats per vertex.
    pub fn vertices(&self) -> &[f32] {
        &self.vertices
    }

    pub fn normals(&self) -> &[f32] {
        &self.normals
    }

    pub fn uvs(&self) -> &[f32] {
        &self.uvs
    }

    pub fn tangents(&self) -> &[f32] {
        &self.tangents
    }

    pub fn colors(&self) -> &[f32] {
        &self.colors
    }

    /// Empty unless at least one composed mesh had lightmap coordinates.
    pub fn lightmap_coordinates(&self) -> &[f32] {
        &self.lightmap_coordinates
    }

    /// Identity indices: vertices are never shared between triangles.
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn draw_ranges(&self) -> &[DrawRange] {
        &self.draw_ranges
    }

    /// The named materials referenced by this composition, in draw order.
    pub fn materials(&self) -> impl Iterator<Item = &str> {
        self.draw_ranges
            .iter()
            .filter_map(|range| range.material.name())
    }
}

/// Collects meshes to be drawn together and composes them into a single
/// [`Composition`] whenever they change.
#[derive(Debug, Default)]
pub struct Compositor {
    meshes: Vec<Rc<Mesh>>,
    outdated: bool,
}

impl Compositor {
    pub fn new() -> Compositor {
        Compositor::default()
    }

    pub fn add_mesh(&mut self, mesh: Rc<Mesh>) {
        self.meshes.push(mesh);
        self.outdated = true;
    }

    /// Removes `mesh` (compared by identity, not content). Returns whether it
    /// was present.
    pub fn remove_mesh(&mut self, mesh: &Rc<Mesh>) -> bool {
        let Some(index) = self.meshes.iter().position(|m| Rc::ptr_eq(m, mesh)) else {
            return false;
        };
        self.meshes.remove(index);
        self.outdated = true;
        true
    }

    pub fn contains(&self, mesh: &Rc<Mesh>) -> bool {
        self.meshes.iter().any(|m| Rc::ptr_eq(m, mesh))
    }

    pub fn meshes(&self) -> &[Rc<Mesh>] {
        &self.meshes
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    pub fn is_outdated(&self) -> bool {
        self.outdated
    }

    /// Composes every added mesh. The outdated flag is only cleared when the
    /// composition succeeds.
    pub fn compose_scene(&mut self) -> Result<Composition, ComposeError> {
        let composition = Composition::compose(self.meshes.iter().map(Rc::as_ref))?;
        self.outdated = false;
        Ok(composition)
    }
}

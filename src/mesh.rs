//! CPU-side mesh records, as produced by geometry conversion and consumed by
//! the compositor.

use std::collections::HashMap;
use std::fmt::Display;
use std::rc::Rc;

use glam::{Vec2, Vec3, Vec4};

/// UV-space triangle area below which a triangle contributes no tangent.
const DEGENERATE_UV_EPSILON: f32 = 1e-8;

/// Key used to group meshes into draw ranges.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MaterialKey {
    Named(String),
    /// Meshes without a material. Drawn, but never binds a texture.
    Untextured,
}

impl MaterialKey {
    pub fn name(&self) -> Option<&str> {
        match self {
            MaterialKey::Named(name) => Some(name),
            MaterialKey::Untextured => None,
        }
    }
}

impl Display for MaterialKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MaterialKey::Named(name) => write!(f, "{name}"),
            MaterialKey::Untextured => write!(f, "<no material>"),
        }
    }
}

/// The per-vertex attributes that must line up with the position buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribute {
    Normal,
    Uv,
    Tangent,
    Color,
    LightmapCoordinate,
}

impl Display for Attribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Attribute::Normal => "normal",
            Attribute::Uv => "uv",
            Attribute::Tangent => "tangent",
            Attribute::Color => "color",
            Attribute::LightmapCoordinate => "lightmap coordinate",
        };
        f.write_str(name)
    }
}

/// A single object's raw vertex data, one entry per vertex in each attribute
/// buffer once finalized. Every three vertices form a triangle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    vertices: Vec<Vec3>,
    normals: Vec<Vec3>,
    uvs: Vec<Vec2>,
    tangents: Vec<Vec4>,
    colors: Vec<Vec4>,
    lightmap_coordinates: Vec<Vec2>,
    material: Option<String>,
    meta: HashMap<String, i64>,
}

impl Mesh {
    pub fn new() -> Mesh {
        Mesh::default()
    }

    pub fn add_vertex(&mut self, vertices: impl IntoIterator<Item = Vec3>) {
        self.vertices.extend(vertices);
    }

    pub fn add_normal(&mut self, normals: impl IntoIterator<Item = Vec3>) {
        self.normals.extend(normals);
    }

    pub fn add_uv(&mut self, uvs: impl IntoIterator<Item = Vec2>) {
        self.uvs.extend(uvs);
    }

    pub fn add_tangent(&mut self, tangents: impl IntoIterator<Item = Vec4>) {
        self.tangents.extend(tangents);
    }

    pub fn add_color(&mut self, colors: impl IntoIterator<Item = Vec4>) {
        self.colors.extend(colors);
    }

    pub fn add_lightmap_coordinate(&mut self, coordinates: impl IntoIterator<Item = Vec2>) {
        self.lightmap_coordinates.extend(coordinates);
    }

    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    pub fn normals(&self) -> &[Vec3] {
        &self.normals
    }

    pub fn uvs(&self) -> &[Vec2] {
        &self.uvs
    }

    pub fn tangents(&self) -> &[Vec4] {
        &self.tangents
    }

    pub fn colors(&self) -> &[Vec4] {
        &self.colors
    }

    pub fn lightmap_coordinates(&self) -> &[Vec2] {
        &self.lightmap_coordinates
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn set_material(&mut self, material: impl Into<String>) {
        self.material = Some(material.into());
    }

    pub fn clear_material(&mut self) {
        self.material = None;
    }

    pub fn material(&self) -> Option<&str> {
        self.material.as_deref()
    }

    /// The grouping key for this mesh. Material names are case-insensitive,
    /// so the key is lower case.
    pub fn material_key(&self) -> MaterialKey {
        match &self.material {
            Some(name) => MaterialKey::Named(name.to_lowercase()),
            None => MaterialKey::Untextured,
        }
    }

    pub fn set_meta(&mut self, tag: impl Into<String>, value: i64) {
        self.meta.insert(tag.into(), value);
    }

    pub fn meta(&self, tag: &str) -> Option<i64> {
        self.meta.get(tag).copied()
    }

    /// Appends the vertex data of `other` to this mesh. Material and
    /// metadata of `other` are not carried over, and tangents are
    /// regenerated for the whole mesh.
    pub fn append(&mut self, other: &Mesh) {
        self.vertices.extend_from_slice(&other.vertices);
        self.normals.extend_from_slice(&other.normals);
        self.uvs.extend_from_slice(&other.uvs);
        self.colors.extend_from_slice(&other.colors);
        self.lightmap_coordinates
            .extend_from_slice(&other.lightmap_coordinates);
        self.generate_tangents();
    }

    /// Returns the first attribute whose length does not match the vertex
    /// count, as `(attribute, found)`. Lightmap coordinates may be empty.
    pub fn mismatched_attribute(&self) -> Option<(Attribute, usize)> {
        let expected = self.vertices.len();
        let lengths = [
            (Attribute::Normal, self.normals.len()),
            (Attribute::Uv, self.uvs.len()),
            (Attribute::Tangent, self.tangents.len()),
            (Attribute::Color, self.colors.len()),
        ];
        if let Some(mismatch) = lengths.into_iter().find(|(_, len)| *len != expected) {
            return Some(mismatch);
        }
        let lightmaps = self.lightmap_coordinates.len();
        (lightmaps != 0 && lightmaps != expected)
            .then_some((Attribute::LightmapCoordinate, lightmaps))
    }

    /// Replaces the tangent buffer with one tangent per vertex, accumulated
    /// per triangle from positions and UVs and orthogonalized against the
    /// vertex normal. The bitangent sign is stored in `w`.
    ///
    /// Vertices that only touch triangles with zero area in UV space (or
    /// that are not part of a whole triangle) get a zero tangent.
    pub fn generate_tangents(&mut self) {
        let count = self.vertices.len();
        let mut tan1 = vec![Vec3::ZERO; count];
        let mut tan2 = vec![Vec3::ZERO; count];

        for triangle in 0..count / 3 {
            let [i0, i1, i2] = [triangle * 3, triangle * 3 + 1, triangle * 3 + 2];
            let (Some(&uv0), Some(&uv1), Some(&uv2)) =
                (self.uvs.get(i0), self.uvs.get(i1), self.uvs.get(i2))
            else {
                continue;
            };
            let p0 = self.vertices[i0];
            let edge1 = self.vertices[i1] - p0;
            let edge2 = self.vertices[i2] - p0;
            let duv1 = uv1 - uv0;
            let duv2 = uv2 - uv0;

            let det = duv1.x * duv2.y - duv2.x * duv1.y;
            if det.abs() < DEGENERATE_UV_EPSILON {
                continue;
            }
            let r = 1.0 / det;
            let sdir = (edge1 * duv2.y - edge2 * duv1.y) * r;
            let tdir = (edge2 * duv1.x - edge1 * duv2.x) * r;
            for i in [i0, i1, i2] {
                tan1[i] += sdir;
                tan2[i] += tdir;
            }
        }

        self.tangents = (0..count)
            .map(|i| {
                let normal = self.normals.get(i).copied().unwrap_or(Vec3::ZERO);
                let tangent = tan1[i];
                let orthogonal = (tangent - normal * normal.dot(tangent)).normalize_or_zero();
                if orthogonal == Vec3::ZERO {
                    return Vec4::ZERO;
                }
                let handedness = if normal.cross(tangent).dot(tan2[i]) < 0.0 {
                    -1.0
                } else {
                    1.0
                };
                orthogonal.extend(handedness)
            })
            .collect();
    }
}

/// The meshes derived from one document object.
#[derive(Debug, Clone, Default)]
pub struct Model {
    name: String,
    meshes: Vec<Rc<Mesh>>,
}

impl Model {
    pub fn new(name: impl Into<String>, meshes: Vec<Mesh>) -> Model {
        Model {
            name: name.into(),
            meshes: meshes.into_iter().map(Rc::new).collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn meshes(&self) -> &[Rc<Mesh>] {
        &self.meshes
    }
}

//! Turns document brushes into meshes.

use glam::{Vec2, Vec4};

use crate::mesh::{Mesh, Model};
use crate::world::{Side, Solid};

/// Texture size assumed for materials whose texture is not loaded yet.
pub const DEFAULT_TEXTURE_SIZE: (u32, u32) = (128, 128);

pub const META_SOLID: &str = "solid";
pub const META_SIDE: &str = "side";

/// Builds one mesh per side of `solid`. `texture_size` resolves a material
/// key to its texture's width and height, for scaling UVs.
pub fn solid_to_model(solid: &Solid, texture_size: impl Fn(&str) -> Option<(u32, u32)>) -> Model {
    let color = solid_color(solid.id);
    let meshes = solid
        .sides
        .iter()
        .map(|side| {
            let size = texture_size(&side.material).unwrap_or(DEFAULT_TEXTURE_SIZE);
            let mut mesh = side_to_mesh(side, size, color);
            mesh.set_meta(META_SOLID, solid.id as i64);
            mesh
        })
        .collect();
    Model::new(format!("solid_{}", solid.id), meshes)
}

/// Two triangles spanning the side's plane points and the corner that
/// completes them.
pub fn side_to_mesh(side: &Side, (width, height): (u32, u32), color: Vec4) -> Mesh {
    let mut mesh = Mesh::new();
    if !side.material.is_empty() {
        mesh.set_material(side.material.as_str());
    }
    mesh.set_meta(META_SIDE, side.id as i64);

    let [p0, p1, p2] = side.plane.0;
    let vertices = [p0, p1, p2, p0, p2, side.plane.fourth_corner()];
    let normal = side.plane.normal().normalize_or_zero();
    let (width, height) = (width.max(1) as f32, height.max(1) as f32);

    mesh.add_vertex(vertices);
    mesh.add_normal([normal; 6]);
    mesh.add_uv(vertices.map(|vertex| {
        Vec2::new(
            side.u_axis.project(vertex) / width,
            side.v_axis.project(vertex) / height,
        )
    }));
    mesh.add_color([color; 6]);
    mesh.generate_tangents();
    mesh
}

/// A stable bluish tint per solid, so neighbouring brushes are told apart in
/// flat shading.
pub fn solid_color(id: i32) -> Vec4 {
    let mut x = (id as u32 as u64).wrapping_add(0x9E37_79B9_7F4A_7C15);
    x = (x ^ (x >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^= x >> 31;
    let channel = |shift: u32| ((x >> shift) & 0xFFFF) as f32 / 65536.0;
    Vec4::new(
        channel(0) / 4.0 + 0.1,
        channel(16) / 2.0 + 0.5,
        channel(32) / 4.0 + 0.75,
        1.0,
    )
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;
    use crate::mesh::MaterialKey;

    #[test]
    fn each_side_becomes_a_complete_quad() {
        let solid = Solid::block(3, Vec3::ZERO, Vec3::splat(64.0), "brick");
        let model = solid_to_model(&solid, |_| None);
        assert_eq!(model.name(), "solid_3");
        assert_eq!(model.meshes().len(), 6);
        for (mesh, side) in model.meshes().iter().zip(&solid.sides) {
            assert_eq!(mesh.vertex_count(), 6);
            assert_eq!(mesh.mismatched_attribute(), None);
            assert_eq!(mesh.material_key(), MaterialKey::Named("brick".into()));
            assert_eq!(mesh.meta(META_SOLID), Some(3));
            assert_eq!(mesh.meta(META_SIDE), Some(side.id as i64));
            let normal = side.plane.normal().normalize();
            assert!(mesh.normals().iter().all(|n| (*n - normal).length() < 1e-6));
        }
    }

    #[test]
    fn uvs_scale_with_texture_size() {
        let solid = Solid::block(1, Vec3::ZERO, Vec3::splat(64.0), "brick");
        let default = solid_to_model(&solid, |_| None);
        let wide = solid_to_model(&solid, |key| (key == "brick").then_some((256, 128)));
        // Top face: u follows x at 0.25 units per texel, so 64 units span 256 texels.
        let top_default = default.meshes()[0].uvs();
        let top_wide = wide.meshes()[0].uvs();
        assert_eq!(top_default[1].x - top_default[0].x, 2.0);
        assert_eq!(top_wide[1].x - top_wide[0].x, 1.0);
        assert_eq!(top_wide[2].y - top_wide[1].y, -2.0);
    }

    #[test]
    fn empty_material_means_no_material() {
        let mut solid = Solid::block(1, Vec3::ZERO, Vec3::ONE, "brick");
        solid.sides[0].material.clear();
        let model = solid_to_model(&solid, |_| None);
        assert_eq!(model.meshes()[0].material_key(), MaterialKey::Untextured);
    }

    #[test]
    fn colors_are_stable_per_solid() {
        assert_eq!(solid_color(5), solid_color(5));
        assert_ne!(solid_color(5), solid_color(6));
        let color = solid_color(42);
        assert!((0.1..0.35).contains(&color.x));
        assert!((0.5..1.0).contains(&color.y));
        assert!((0.75..1.0).contains(&color.z));
    }
}

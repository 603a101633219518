use glam::{Mat4, Vec4};

use crate::error::GpuError;
use crate::renderer::compositor::Composition;
use crate::renderer::program::{
    ATTR_LOC_COLOR, ATTR_LOC_LIGHTMAP, ATTR_LOC_NORMAL, ATTR_LOC_TANGENT, ATTR_LOC_UV,
};

/// The most vertex buffers a [`MeshBuffer`] can own: positions plus one per
/// attached attribute.
pub const MAX_MESH_BUFFERS: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramId(pub u32);

/// A vertex array and the buffers feeding it, as created by
/// [`GpuAdapter::create_mesh`]. Must be released with
/// [`GpuAdapter::delete_mesh`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshBuffer {
    pub vao: u32,
    pub buffers: [u32; MAX_MESH_BUFFERS],
    pub buffer_count: usize,
    pub vertex_count: usize,
}

impl MeshBuffer {
    pub fn buffers(&self) -> &[u32] {
        &self.buffers[..self.buffer_count]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    DepthTest,
    CullFace,
    Blend,
}

/// The GPU operations the scene and renderer need. All calls happen on the
/// thread that owns the graphics context.
pub trait GpuAdapter {
    /// Creates a vertex array with `positions` (3 floats per vertex) as its
    /// first attribute. The vertex array stays bound until
    /// [`GpuAdapter::finish_mesh`].
    fn create_mesh(&self, positions: &[f32]) -> Result<MeshBuffer, GpuError>;
    /// Adds a buffer of `components` floats per vertex at `location`.
    fn attach_attribute(
        &self,
        mesh: &mut MeshBuffer,
        location: u32,
        data: &[f32],
        components: i32,
    ) -> Result<(), GpuError>;
    fn finish_mesh(&self);
    fn delete_mesh(&self, mesh: MeshBuffer);
    fn bind_mesh(&self, mesh: &MeshBuffer);

    /// Creates a texture from tightly packed RGBA8 pixels.
    fn create_texture_2d(&self, width: u32, height: u32, rgba: &[u8])
        -> Result<TextureId, GpuError>;
    fn delete_texture(&self, texture: TextureId);
    fn bind_texture_2d(&self, slot: u32, texture: TextureId);

    fn create_program(&self, vertex_source: &str, fragment_source: &str)
        -> Result<ProgramId, GpuError>;
    fn delete_program(&self, program: ProgramId);
    fn use_program(&self, program: ProgramId);
    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<i32>;
    fn set_uniform_mat4(&self, location: i32, value: &Mat4);
    fn set_uniform_vec4(&self, location: i32, value: Vec4);
    fn set_uniform_f32(&self, location: i32, value: f32);
    fn set_uniform_i32(&self, location: i32, value: i32);

    fn set_capability(&self, capability: Capability, enabled: bool);
    fn viewport(&self, x: i32, y: i32, width: i32, height: i32);
    fn clear(&self, color: Vec4);
    fn draw_triangle_array(&self, offset: i32, count: i32);
}

/// Uploads every attribute buffer of `composition` into a new mesh buffer.
pub fn upload_composition(
    adapter: &dyn GpuAdapter,
    composition: &Composition,
) -> Result<MeshBuffer, GpuError> {
    let mut mesh = adapter.create_mesh(composition.vertices())?;
    let attributes = [
        (ATTR_LOC_NORMAL, composition.normals(), 3),
        (ATTR_LOC_UV, composition.uvs(), 2),
        (ATTR_LOC_TANGENT, composition.tangents(), 4),
        (ATTR_LOC_COLOR, composition.colors(), 4),
        (ATTR_LOC_LIGHTMAP, composition.lightmap_coordinates(), 2),
    ];
    for (location, data, components) in attributes {
        if data.is_empty() {
            continue;
        }
        if let Err(err) = adapter.attach_attribute(&mut mesh, location, data, components) {
            adapter.finish_mesh();
            adapter.delete_mesh(mesh);
            return Err(err);
        }
    }
    adapter.finish_mesh();
    Ok(mesh)
}

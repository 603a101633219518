//! An adapter that records calls instead of talking to a GPU.

use std::cell::{Cell, RefCell};

use glam::{Mat4, Vec4};

use crate::error::GpuError;
use crate::renderer::adapter::{
    Capability, GpuAdapter, MeshBuffer, ProgramId, TextureId, MAX_MESH_BUFFERS,
};

#[derive(Debug, Clone, PartialEq)]
pub enum GpuCall {
    CreateMesh { vao: u32, vertex_count: usize },
    AttachAttribute { vao: u32, location: u32, components: i32, len: usize },
    FinishMesh,
    DeleteMesh { vao: u32 },
    BindMesh { vao: u32 },
    CreateTexture { id: u32, width: u32, height: u32 },
    DeleteTexture { id: u32 },
    BindTexture { slot: u32, id: u32 },
    CreateProgram { id: u32 },
    DeleteProgram { id: u32 },
    UseProgram { id: u32 },
    Uniform { location: i32 },
    SetCapability(Capability, bool),
    Viewport,
    Clear,
    Draw { offset: i32, count: i32 },
}

#[derive(Debug, Default)]
pub struct FakeAdapter {
    calls: RefCell<Vec<GpuCall>>,
    next_name: Cell<u32>,
    /// When set, the next `create_mesh` fails as if the GPU ran out of memory.
    pub fail_next_mesh: Cell<bool>,
    /// When set, the next `create_texture_2d` fails the same way.
    pub fail_next_texture: Cell<bool>,
}

impl FakeAdapter {
    pub fn new() -> FakeAdapter {
        FakeAdapter::default()
    }

    pub fn calls(&self) -> Vec<GpuCall> {
        self.calls.borrow().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }

    pub fn clear_calls(&self) {
        self.calls.borrow_mut().clear();
    }

    pub fn draws(&self) -> Vec<(i32, i32)> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|call| match call {
                GpuCall::Draw { offset, count } => Some((*offset, *count)),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, predicate: impl Fn(&GpuCall) -> bool) -> usize {
        self.calls.borrow().iter().filter(|c| predicate(c)).count()
    }

    fn record(&self, call: GpuCall) {
        self.calls.borrow_mut().push(call);
    }

    fn name(&self) -> u32 {
        let name = self.next_name.get() + 1;
        self.next_name.set(name);
        name
    }
}

impl GpuAdapter for FakeAdapter {
    fn create_mesh(&self, positions: &[f32]) -> Result<MeshBuffer, GpuError> {
        if self.fail_next_mesh.replace(false) {
            return Err(GpuError::OutOfMemory("vertex buffer"));
        }
        let vao = self.name();
        let mut buffers = [0; MAX_MESH_BUFFERS];
        buffers[0] = self.name();
        let vertex_count = positions.len() / 3;
        self.record(GpuCall::CreateMesh { vao, vertex_count });
        Ok(MeshBuffer {
            vao,
            buffers,
            buffer_count: 1,
            vertex_count,
        })
    }

    fn attach_attribute(
        &self,
        mesh: &mut MeshBuffer,
        location: u32,
        data: &[f32],
        components: i32,
    ) -> Result<(), GpuError> {
        if mesh.buffer_count == MAX_MESH_BUFFERS {
            return Err(GpuError::ResourceCreation("vertex attribute buffer"));
        }
        mesh.buffers[mesh.buffer_count] = self.name();
        mesh.buffer_count += 1;
        self.record(GpuCall::AttachAttribute {
            vao: mesh.vao,
            location,
            components,
            len: data.len(),
        });
        Ok(())
    }

    fn finish_mesh(&self) {
        self.record(GpuCall::FinishMesh);
    }

    fn delete_mesh(&self, mesh: MeshBuffer) {
        self.record(GpuCall::DeleteMesh { vao: mesh.vao });
    }

    fn bind_mesh(&self, mesh: &MeshBuffer) {
        self.record(GpuCall::BindMesh { vao: mesh.vao });
    }

    fn create_texture_2d(
        &self,
        width: u32,
        height: u32,
        _rgba: &[u8],
    ) -> Result<TextureId, GpuError> {
        if self.fail_next_texture.replace(false) {
            return Err(GpuError::OutOfMemory("texture"));
        }
        let id = self.name();
        self.record(GpuCall::CreateTexture { id, width, height });
        Ok(TextureId(id))
    }

    fn delete_texture(&self, texture: TextureId) {
        self.record(GpuCall::DeleteTexture { id: texture.0 });
    }

    fn bind_texture_2d(&self, slot: u32, texture: TextureId) {
        self.record(GpuCall::BindTexture {
            slot,
            id: texture.0,
        });
    }

    fn create_program(&self, _vertex: &str, _fragment: &str) -> Result<ProgramId, GpuError> {
        let id = self.name();
        self.record(GpuCall::CreateProgram { id });
        Ok(ProgramId(id))
    }

    fn delete_program(&self, program: ProgramId) {
        self.record(GpuCall::DeleteProgram { id: program.0 });
    }

    fn use_program(&self, program: ProgramId) {
        self.record(GpuCall::UseProgram { id: program.0 });
    }

    fn uniform_location(&self, _program: ProgramId, name: &str) -> Option<i32> {
        Some(name.len() as i32)
    }

    fn set_uniform_mat4(&self, location: i32, _value: &Mat4) {
        self.record(GpuCall::Uniform { location });
    }

    fn set_uniform_vec4(&self, location: i32, _value: Vec4) {
        self.record(GpuCall::Uniform { location });
    }

    fn set_uniform_f32(&self, location: i32, _value: f32) {
        self.record(GpuCall::Uniform { location });
    }

    fn set_uniform_i32(&self, location: i32, _value: i32) {
        self.record(GpuCall::Uniform { location });
    }

    fn set_capability(&self, capability: Capability, enabled: bool) {
        self.record(GpuCall::SetCapability(capability, enabled));
    }

    fn viewport(&self, _x: i32, _y: i32, _width: i32, _height: i32) {
        self.record(GpuCall::Viewport);
    }

    fn clear(&self, _color: Vec4) {
        self.record(GpuCall::Clear);
    }

    fn draw_triangle_array(&self, offset: i32, count: i32) {
        self.record(GpuCall::Draw { offset, count });
    }
}

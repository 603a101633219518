use std::fmt::Display;
use std::rc::Rc;
use std::str::FromStr;

use glam::{Vec3, Vec4};

use crate::camera::Camera;
use crate::convert;
use crate::error::{GpuError, SceneError};
use crate::mesh::MaterialKey;
use crate::textures::TextureCache;
use crate::world::Solid;

pub mod adapter;
pub mod compositor;
#[cfg(test)]
pub mod fake;
pub mod gl;
pub mod mesh_helper;
pub mod opengl;
pub mod program;

use adapter::{Capability, GpuAdapter, MeshBuffer};
use compositor::Composition;
use mesh_helper::MeshHelper;
use program::ShaderProgram;

const CLEAR_COLOR: Vec4 = Vec4::new(0.05, 0.05, 0.06, 1.0);
const WIREFRAME_COLOR: Vec4 = Vec4::new(1.0, 1.0, 1.0, 1.0);
const WIREFRAME_LINE_WIDTH: f32 = 1.0;
const WIREFRAME_BLEND_FACTOR: f32 = 0.8;
const AXIS_LENGTH: f32 = 64.0;
const AXIS_THICKNESS: f32 = 1.0;

/// How scene geometry is shaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderMode {
    Wireframe,
    Flat,
    Textured,
}

impl RenderMode {
    pub const ALL: [RenderMode; 3] = [RenderMode::Wireframe, RenderMode::Flat, RenderMode::Textured];

    pub fn name(self) -> &'static str {
        match self {
            RenderMode::Wireframe => "Wireframe",
            RenderMode::Flat => "Flat",
            RenderMode::Textured => "Textured",
        }
    }

    /// The mode after this one, wrapping around.
    pub fn next(self) -> RenderMode {
        let index = self as usize;
        RenderMode::ALL[(index + 1) % RenderMode::ALL.len()]
    }
}

impl Display for RenderMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RenderMode {
    type Err = String;

    fn from_str(s: &str) -> Result<RenderMode, String> {
        RenderMode::ALL
            .into_iter()
            .find(|mode| mode.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown render mode \"{s}\""))
    }
}

/// Draws compositions with one shader program per [`RenderMode`].
pub struct Renderer {
    adapter: Rc<dyn GpuAdapter>,
    programs: Vec<ShaderProgram>,
    axis: MeshHelper,
    /// Passed when drawing the gizmo, which never binds textures.
    no_textures: TextureCache,
}

impl Renderer {
    pub fn new(adapter: Rc<dyn GpuAdapter>) -> Result<Renderer, GpuError> {
        let mut programs = Vec::with_capacity(RenderMode::ALL.len());
        for mode in RenderMode::ALL {
            match program::create_program(adapter.as_ref(), mode) {
                Ok(program) => programs.push(program),
                Err(err) => {
                    for program in programs {
                        adapter.delete_program(program.program);
                    }
                    return Err(err);
                }
            }
        }

        let mut axis = MeshHelper::new(Rc::clone(&adapter));
        let axes = [
            (Vec3::X, Vec4::new(1.0, 0.0, 0.0, 1.0)),
            (Vec3::Y, Vec4::new(0.0, 1.0, 0.0, 1.0)),
            (Vec3::Z, Vec4::new(0.0, 0.0, 1.0, 1.0)),
        ];
        for (direction, color) in axes {
            let max = direction * AXIS_LENGTH + (Vec3::ONE - direction) * AXIS_THICKNESS;
            let min = -(Vec3::ONE - direction) * AXIS_THICKNESS;
            let bar = Solid::block(0, min, max, "");
            let sides = bar
                .sides
                .iter()
                .map(|side| convert::side_to_mesh(side, convert::DEFAULT_TEXTURE_SIZE, color))
                .collect::<Vec<_>>();
            axis.add_mesh(&sides);
        }

        Ok(Renderer {
            adapter,
            programs,
            axis,
            no_textures: TextureCache::new(),
        })
    }

    fn program(&self, mode: RenderMode) -> &ShaderProgram {
        &self.programs[mode as usize]
    }

    pub fn resize(&self, width: i32, height: i32) {
        self.adapter.viewport(0, 0, width, height);
    }

    pub fn clear(&self) {
        self.adapter.clear(CLEAR_COLOR);
    }

    /// Uploads the camera's matrices to every program.
    pub fn bind_camera(&self, camera: &Camera) {
        let projection = camera.projection_matrix();
        let view = camera.view_matrix();
        let model = camera.model_matrix();
        for program in &self.programs {
            self.adapter.use_program(program.program);
            let uniforms = &program.uniforms;
            if let Some(location) = uniforms.projection {
                self.adapter.set_uniform_mat4(location, &projection);
            }
            if let Some(location) = uniforms.view {
                self.adapter.set_uniform_mat4(location, &view);
            }
            if let Some(location) = uniforms.model {
                self.adapter.set_uniform_mat4(location, &model);
            }
        }
    }

    /// Selects the program for `mode` and sets up the GPU state it draws with.
    pub fn begin_render(&self, mode: RenderMode) {
        let program = self.program(mode);
        self.adapter.use_program(program.program);
        match mode {
            RenderMode::Wireframe => {
                self.adapter.set_capability(Capability::DepthTest, false);
                self.adapter.set_capability(Capability::CullFace, false);
                self.adapter.set_capability(Capability::Blend, true);
                let uniforms = &program.uniforms;
                if let Some(location) = uniforms.color {
                    self.adapter.set_uniform_vec4(location, WIREFRAME_COLOR);
                }
                if let Some(location) = uniforms.line_width {
                    self.adapter.set_uniform_f32(location, WIREFRAME_LINE_WIDTH);
                }
                if let Some(location) = uniforms.blend_factor {
                    self.adapter.set_uniform_f32(location, WIREFRAME_BLEND_FACTOR);
                }
            }
            RenderMode::Flat | RenderMode::Textured => {
                self.adapter.set_capability(Capability::DepthTest, true);
                self.adapter.set_capability(Capability::CullFace, true);
                self.adapter.set_capability(Capability::Blend, false);
            }
        }
    }

    /// Issues one draw call per non-empty draw range. In textured mode each
    /// range binds its material's texture first, if the cache has one.
    pub fn draw_composition(
        &self,
        composition: &Composition,
        mesh: &MeshBuffer,
        mode: RenderMode,
        textures: &TextureCache,
    ) {
        self.begin_render(mode);
        self.adapter.bind_mesh(mesh);
        for range in composition.draw_ranges() {
            if range.count == 0 {
                continue;
            }
            if mode == RenderMode::Textured {
                if let MaterialKey::Named(name) = &range.material {
                    if let Some(texture) = textures.lookup(name) {
                        self.adapter.bind_texture_2d(0, texture);
                    }
                }
            }
            self.adapter
                .draw_triangle_array(range.offset as i32, range.count as i32);
        }
    }

    /// Draws the axis gizmo at the origin, uploading it on first use.
    pub fn draw_axis(&mut self) -> Result<(), SceneError> {
        if let Some((composition, mesh)) = self.axis.rebuild()? {
            self.draw_composition(&composition, &mesh, RenderMode::Flat, &self.no_textures);
        }
        Ok(())
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        for program in &self.programs {
            self.adapter.delete_program(program.program);
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;
    use crate::mesh::Mesh;
    use crate::renderer::adapter::upload_composition;
    use crate::renderer::fake::{FakeAdapter, GpuCall};
    use crate::textures::testing::MemoryMaterials;

    fn renderer() -> (Rc<FakeAdapter>, Renderer) {
        let adapter = Rc::new(FakeAdapter::new());
        let renderer = Renderer::new(adapter.clone()).unwrap();
        adapter.clear_calls();
        (adapter, renderer)
    }

    fn quad(material: Option<&str>) -> Mesh {
        let mut mesh = Mesh::new();
        if let Some(material) = material {
            mesh.set_material(material);
        }
        let vertices = [Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::ZERO, Vec3::Y, Vec3::NEG_X];
        mesh.add_vertex(vertices);
        mesh.add_normal([Vec3::Z; 6]);
        mesh.add_uv(vertices.map(|v| v.truncate()));
        mesh.add_color([Vec4::ONE; 6]);
        mesh.generate_tangents();
        mesh
    }

    #[test]
    fn render_modes_parse_and_cycle() {
        assert_eq!("wireframe".parse(), Ok(RenderMode::Wireframe));
        assert_eq!("Textured".parse(), Ok(RenderMode::Textured));
        assert!("shaded".parse::<RenderMode>().is_err());
        assert_eq!(RenderMode::Textured.next(), RenderMode::Wireframe);
        assert_eq!(RenderMode::Flat.to_string(), "Flat");
    }

    #[test]
    fn one_program_per_mode() {
        let adapter = Rc::new(FakeAdapter::new());
        let renderer = Renderer::new(adapter.clone()).unwrap();
        assert_eq!(adapter.count(|c| matches!(c, GpuCall::CreateProgram { .. })), 3);
        // The gizmo is only uploaded once it is drawn.
        assert_eq!(adapter.count(|c| matches!(c, GpuCall::CreateMesh { .. })), 0);
        drop(renderer);
        assert_eq!(adapter.count(|c| matches!(c, GpuCall::DeleteProgram { .. })), 3);
    }

    #[test]
    fn draws_one_call_per_range_and_binds_textures() {
        let (adapter, renderer) = renderer();
        let textures = TextureCache::new();
        let source = MemoryMaterials::with(&[("brick", 4, 4)]);
        let brick = textures
            .ensure_bound("brick", adapter.as_ref(), &source)
            .unwrap()
            .unwrap();
        let meshes = [quad(Some("brick")), quad(None), quad(Some("stone"))];
        let composition = Composition::compose(&meshes).unwrap();
        let mesh = upload_composition(adapter.as_ref(), &composition).unwrap();
        adapter.clear_calls();

        renderer.draw_composition(&composition, &mesh, RenderMode::Textured, &textures);
        assert_eq!(adapter.draws(), [(0, 6), (6, 6), (12, 6)]);
        // Only "brick" is bound; the untextured and unloaded ranges bind nothing.
        assert_eq!(
            adapter.count(|c| matches!(c, GpuCall::BindTexture { .. })),
            1
        );
        assert!(adapter.calls().contains(&GpuCall::BindTexture { slot: 0, id: brick.0 }));
        assert!(adapter.calls().contains(&GpuCall::BindMesh { vao: mesh.vao }));
    }

    #[test]
    fn flat_and_wireframe_bind_no_textures() {
        let (adapter, renderer) = renderer();
        let textures = TextureCache::new();
        textures
            .ensure_bound("brick", adapter.as_ref(), &MemoryMaterials::with(&[("brick", 1, 1)]))
            .unwrap();
        let composition = Composition::compose(&[quad(Some("brick"))]).unwrap();
        let mesh = upload_composition(adapter.as_ref(), &composition).unwrap();
        adapter.clear_calls();

        renderer.draw_composition(&composition, &mesh, RenderMode::Flat, &textures);
        renderer.draw_composition(&composition, &mesh, RenderMode::Wireframe, &textures);
        assert_eq!(adapter.draws(), [(0, 6), (0, 6)]);
        assert_eq!(adapter.count(|c| matches!(c, GpuCall::BindTexture { .. })), 0);
    }

    #[test]
    fn modes_toggle_depth_and_culling() {
        let (adapter, renderer) = renderer();
        renderer.begin_render(RenderMode::Wireframe);
        let calls = adapter.calls();
        assert!(calls.contains(&GpuCall::SetCapability(Capability::DepthTest, false)));
        assert!(calls.contains(&GpuCall::SetCapability(Capability::CullFace, false)));
        assert!(calls.contains(&GpuCall::SetCapability(Capability::Blend, true)));

        adapter.clear_calls();
        renderer.begin_render(RenderMode::Textured);
        let calls = adapter.calls();
        assert!(calls.contains(&GpuCall::SetCapability(Capability::DepthTest, true)));
        assert!(calls.contains(&GpuCall::SetCapability(Capability::CullFace, true)));
    }

    #[test]
    fn bind_camera_updates_every_program() {
        let (adapter, renderer) = renderer();
        renderer.bind_camera(&Camera::new(70.0, 1.0));
        assert_eq!(adapter.count(|c| matches!(c, GpuCall::UseProgram { .. })), 3);
        assert_eq!(adapter.count(|c| matches!(c, GpuCall::Uniform { .. })), 9);
    }

    #[test]
    fn axis_is_uploaded_once() {
        let (adapter, mut renderer) = renderer();
        renderer.draw_axis().unwrap();
        renderer.draw_axis().unwrap();
        assert_eq!(adapter.count(|c| matches!(c, GpuCall::CreateMesh { .. })), 1);
        // Three bars of six sides, all in the untextured range.
        assert_eq!(adapter.draws(), [(0, 108), (0, 108)]);
        assert_eq!(adapter.count(|c| matches!(c, GpuCall::BindTexture { .. })), 0);
        assert!(renderer.no_textures.materials().is_empty());
    }
}

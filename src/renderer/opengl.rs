use std::ffi::c_void;
use std::ptr;

use glam::{Mat4, Vec4};
use sdl2::VideoSubsystem;

use crate::error::GpuError;
use crate::renderer::adapter::{
    Capability, GpuAdapter, MeshBuffer, ProgramId, TextureId, MAX_MESH_BUFFERS,
};
use crate::renderer::gl;
use crate::renderer::program::ATTR_LOC_POSITION;

/// [`GpuAdapter`] on top of an OpenGL ES 3.0 context.
pub struct OpenGlAdapter {
    _private: (),
}

impl OpenGlAdapter {
    /// Loads the GL function pointers from the current context of `video`.
    pub fn new(video: &VideoSubsystem) -> OpenGlAdapter {
        gl::load_with(|s| video.gl_get_proc_address(s) as *const c_void);
        OpenGlAdapter { _private: () }
    }

    fn gen_buffer(&self) -> Result<gl::types::GLuint, GpuError> {
        let mut buffer = 0;
        gl::call!(gl::GenBuffers(1, &mut buffer));
        if buffer == 0 {
            return Err(GpuError::ResourceCreation("vertex buffer"));
        }
        Ok(buffer)
    }

    fn upload_attribute(
        &self,
        buffer: gl::types::GLuint,
        location: u32,
        data: &[f32],
        components: i32,
    ) -> Result<(), GpuError> {
        gl::call!(gl::BindBuffer(gl::ARRAY_BUFFER, buffer));
        gl::buffer_data_f32(gl::ARRAY_BUFFER, data, gl::STATIC_DRAW)?;
        gl::call!(gl::EnableVertexAttribArray(location));
        gl::call!(gl::VertexAttribPointer(
            location,
            components,
            gl::FLOAT,
            gl::FALSE,
            0,
            ptr::null(),
        ));
        Ok(())
    }
}

impl GpuAdapter for OpenGlAdapter {
    fn create_mesh(&self, positions: &[f32]) -> Result<MeshBuffer, GpuError> {
        let mut vao = 0;
        gl::call!(gl::GenVertexArrays(1, &mut vao));
        if vao == 0 {
            return Err(GpuError::ResourceCreation("vertex array"));
        }
        let mut mesh = MeshBuffer {
            vao,
            buffers: [0; MAX_MESH_BUFFERS],
            buffer_count: 0,
            vertex_count: positions.len() / 3,
        };
        gl::call!(gl::BindVertexArray(vao));
        let buffer = match self.gen_buffer() {
            Ok(buffer) => buffer,
            Err(err) => {
                self.finish_mesh();
                self.delete_mesh(mesh);
                return Err(err);
            }
        };
        mesh.buffers[0] = buffer;
        mesh.buffer_count = 1;
        if let Err(err) = self.upload_attribute(buffer, ATTR_LOC_POSITION, positions, 3) {
            self.finish_mesh();
            self.delete_mesh(mesh);
            return Err(err);
        }
        Ok(mesh)
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
        let buffer = self.gen_buffer()?;
        mesh.buffers[mesh.buffer_count] = buffer;
        mesh.buffer_count += 1;
        self.upload_attribute(buffer, location, data, components)
    }

    fn finish_mesh(&self) {
        gl::call!(gl::BindVertexArray(0));
        gl::call!(gl::BindBuffer(gl::ARRAY_BUFFER, 0));
    }

    fn delete_mesh(&self, mesh: MeshBuffer) {
        gl::call!(gl::DeleteVertexArrays(1, &mesh.vao));
        gl::call!(gl::DeleteBuffers(
            mesh.buffer_count as i32,
            mesh.buffers.as_ptr()
        ));
    }

    fn bind_mesh(&self, mesh: &MeshBuffer) {
        gl::call!(gl::BindVertexArray(mesh.vao));
    }

    fn create_texture_2d(
        &self,
        width: u32,
        height: u32,
        rgba: &[u8],
    ) -> Result<TextureId, GpuError> {
        let mut texture = 0;
        gl::call!(gl::GenTextures(1, &mut texture));
        if texture == 0 {
            return Err(GpuError::ResourceCreation("texture"));
        }
        gl::call!(gl::BindTexture(gl::TEXTURE_2D, texture));
        let pixels = if rgba.is_empty() {
            ptr::null()
        } else {
            rgba.as_ptr() as *const c_void
        };
        let upload = gl::try_call!(
            "texture",
            gl::TexImage2D(
                gl::TEXTURE_2D,
                0,
                gl::RGBA8 as i32,
                width as i32,
                height as i32,
                0,
                gl::RGBA,
                gl::UNSIGNED_BYTE,
                pixels,
            )
        );
        if let Err(err) = upload {
            gl::call!(gl::DeleteTextures(1, &texture));
            return Err(err);
        }
        gl::call!(gl::GenerateMipmap(gl::TEXTURE_2D));
        gl::call!(gl::TexParameteri(
            gl::TEXTURE_2D,
            gl::TEXTURE_MIN_FILTER,
            gl::LINEAR_MIPMAP_LINEAR as i32
        ));
        gl::call!(gl::TexParameteri(
            gl::TEXTURE_2D,
            gl::TEXTURE_MAG_FILTER,
            gl::LINEAR as i32
        ));
        gl::call!(gl::BindTexture(gl::TEXTURE_2D, 0));
        Ok(TextureId(texture))
    }

    fn delete_texture(&self, texture: TextureId) {
        gl::call!(gl::DeleteTextures(1, &texture.0));
    }

    fn bind_texture_2d(&self, slot: u32, texture: TextureId) {
        gl::call!(gl::ActiveTexture(gl::TEXTURE0 + slot));
        gl::call!(gl::BindTexture(gl::TEXTURE_2D, texture.0));
    }

    fn create_program(
        &self,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<ProgramId, GpuError> {
        let vertex_shader = gl::create_shader(gl::VERTEX_SHADER, vertex_source)?;
        let fragment_shader = match gl::create_shader(gl::FRAGMENT_SHADER, fragment_source) {
            Ok(shader) => shader,
            Err(err) => {
                gl::call!(gl::DeleteShader(vertex_shader));
                return Err(err);
            }
        };
        let program = gl::create_program(&[vertex_shader, fragment_shader]);
        gl::call!(gl::DeleteShader(vertex_shader));
        gl::call!(gl::DeleteShader(fragment_shader));
        Ok(ProgramId(program?))
    }

    fn delete_program(&self, program: ProgramId) {
        gl::call!(gl::DeleteProgram(program.0));
    }

    fn use_program(&self, program: ProgramId) {
        gl::call!(gl::UseProgram(program.0));
    }

    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<i32> {
        gl::get_uniform_location(program.0, name)
    }

    fn set_uniform_mat4(&self, location: i32, value: &Mat4) {
        gl::call!(gl::UniformMatrix4fv(
            location,
            1,
            gl::FALSE,
            value.as_ref().as_ptr()
        ));
    }

    fn set_uniform_vec4(&self, location: i32, value: Vec4) {
        gl::call!(gl::Uniform4f(location, value.x, value.y, value.z, value.w));
    }

    fn set_uniform_f32(&self, location: i32, value: f32) {
        gl::call!(gl::Uniform1f(location, value));
    }

    fn set_uniform_i32(&self, location: i32, value: i32) {
        gl::call!(gl::Uniform1i(location, value));
    }

    fn set_capability(&self, capability: Capability, enabled: bool) {
        let capability = match capability {
            Capability::DepthTest => gl::DEPTH_TEST,
            Capability::CullFace => gl::CULL_FACE,
            Capability::Blend => gl::BLEND,
        };
        if enabled {
            gl::call!(gl::Enable(capability));
        } else {
            gl::call!(gl::Disable(capability));
        }
        if capability == gl::BLEND && enabled {
            gl::call!(gl::BlendFunc(gl::SRC_ALPHA, gl::ONE_MINUS_SRC_ALPHA));
        }
    }

    fn viewport(&self, x: i32, y: i32, width: i32, height: i32) {
        gl::call!(gl::Viewport(x, y, width, height));
    }

    fn clear(&self, color: Vec4) {
        gl::call!(gl::ClearColor(color.x, color.y, color.z, color.w));
        gl::call!(gl::Clear(gl::COLOR_BUFFER_BIT | gl::DEPTH_BUFFER_BIT));
    }

    fn draw_triangle_array(&self, offset: i32, count: i32) {
        gl::call!(gl::DrawArrays(gl::TRIANGLES, offset, count));
    }
}

//! OpenGL ES 3.0 bindings generated by `build.rs`, plus the small helpers
//! the adapter is written in terms of.

use std::ffi::{c_void, CString};

use crate::error::GpuError;

#[allow(clippy::all, non_upper_case_globals, non_snake_case, unused)]
mod bindings {
    include!(concat!(env!("OUT_DIR"), "/bindings.rs"));
}

pub use bindings::*;

/// Calls the given OpenGL function, and in debug builds, panics with the
/// name of the error if it caused one.
macro_rules! call {
    ($expr:expr) => {{
        let result = unsafe { $expr };
        if cfg!(debug_assertions) {
            let error = unsafe { $crate::renderer::gl::GetError() };
            if error != $crate::renderer::gl::NO_ERROR {
                panic!(
                    "OpenGL error {} at {}:{}:{}",
                    $crate::renderer::gl::error_name(error),
                    file!(),
                    line!(),
                    column!(),
                );
            }
        }
        result
    }};
}

/// Calls the given OpenGL function and turns any error it caused into a
/// [`GpuError`], for calls that allocate GPU memory.
macro_rules! try_call {
    ($what:expr, $expr:expr) => {{
        let result = unsafe { $expr };
        match unsafe { $crate::renderer::gl::GetError() } {
            $crate::renderer::gl::NO_ERROR => Ok(result),
            $crate::renderer::gl::OUT_OF_MEMORY => {
                Err($crate::error::GpuError::OutOfMemory($what))
            }
            error => Err($crate::error::GpuError::Driver {
                what: $what,
                name: $crate::renderer::gl::error_name(error),
                code: error,
            }),
        }
    }};
}

pub(crate) use call;
pub(crate) use try_call;

pub fn error_name(error: types::GLenum) -> &'static str {
    match error {
        INVALID_ENUM => "INVALID_ENUM",
        INVALID_VALUE => "INVALID_VALUE",
        INVALID_OPERATION => "INVALID_OPERATION",
        OUT_OF_MEMORY => "OUT_OF_MEMORY",
        INVALID_FRAMEBUFFER_OPERATION => "INVALID_FRAMEBUFFER_OPERATION",
        _ => "UNKNOWN",
    }
}

pub fn buffer_data_f32(
    target: types::GLenum,
    data: &[f32],
    usage: types::GLenum,
) -> Result<(), GpuError> {
    let data: &[u8] = bytemuck::cast_slice(data);
    try_call!(
        "vertex buffer",
        BufferData(
            target,
            data.len() as isize,
            data.as_ptr() as *const c_void,
            usage,
        )
    )
}

pub fn create_shader(type_: types::GLenum, source: &str) -> Result<types::GLuint, GpuError> {
    let shader = call!(CreateShader(type_));
    if shader == 0 {
        return Err(GpuError::ResourceCreation("shader"));
    }
    let sources = [source.as_bytes().as_ptr() as *const types::GLchar];
    let source_lens = [source.len() as types::GLint];
    call!(ShaderSource(
        shader,
        1,
        sources.as_ptr(),
        source_lens.as_ptr(),
    ));
    call!(CompileShader(shader));
    let mut compile_status = 0;
    call!(GetShaderiv(shader, COMPILE_STATUS, &mut compile_status));
    if compile_status == FALSE as i32 {
        let mut info_log = [0u8; 4096];
        let mut length = 0;
        call!(GetShaderInfoLog(
            shader,
            info_log.len() as i32,
            &mut length,
            info_log.as_mut_ptr() as *mut types::GLchar,
        ));
        call!(DeleteShader(shader));
        let stage = if type_ == VERTEX_SHADER {
            "vertex"
        } else {
            "fragment"
        };
        return Err(GpuError::ShaderCompile {
            stage,
            log: String::from_utf8_lossy(&info_log[..length as usize]).into_owned(),
        });
    }
    Ok(shader)
}

pub fn create_program(shaders: &[types::GLuint]) -> Result<types::GLuint, GpuError> {
    let program = call!(CreateProgram());
    if program == 0 {
        return Err(GpuError::ResourceCreation("shader program"));
    }
    for &shader in shaders {
        call!(AttachShader(program, shader));
    }
    call!(LinkProgram(program));
    let mut link_status = 0;
    call!(GetProgramiv(program, LINK_STATUS, &mut link_status));
    if link_status == FALSE as i32 {
        let mut info_log = [0u8; 4096];
        let mut length = 0;
        call!(GetProgramInfoLog(
            program,
            info_log.len() as i32,
            &mut length,
            info_log.as_mut_ptr() as *mut types::GLchar,
        ));
        call!(DeleteProgram(program));
        return Err(GpuError::ProgramLink(
            String::from_utf8_lossy(&info_log[..length as usize]).into_owned(),
        ));
    }
    Ok(program)
}

pub fn get_uniform_location(program: types::GLuint, name: &str) -> Option<types::GLint> {
    let name = CString::new(name).ok()?;
    let location = call!(GetUniformLocation(program, name.as_ptr()));
    (location != -1).then_some(location)
}

use crate::error::GpuError;
use crate::renderer::adapter::{GpuAdapter, ProgramId};
use crate::renderer::RenderMode;

/// The vertex attribute location of vertex positions.
pub const ATTR_LOC_POSITION: u32 = 0;
/// The vertex attribute location of vertex normals.
pub const ATTR_LOC_NORMAL: u32 = 1;
/// The vertex attribute location of texture coordinates.
pub const ATTR_LOC_UV: u32 = 2;
/// The vertex attribute location of the tangent (bitangent sign in w).
pub const ATTR_LOC_TANGENT: u32 = 3;
/// The vertex attribute location of vertex colors.
pub const ATTR_LOC_COLOR: u32 = 4;
/// The vertex attribute location of lightmap coordinates.
pub const ATTR_LOC_LIGHTMAP: u32 = 5;

const VERTEX_SHADER: &str = r#"#version 300 es
layout(location = 0) in vec3 POSITION;
layout(location = 1) in vec3 NORMAL;
layout(location = 2) in vec2 UV;
layout(location = 4) in vec4 COLOR;
uniform mat4 projection;
uniform mat4 view;
uniform mat4 model;
out vec3 vertex_normal;
out vec2 vertex_uv;
out vec4 vertex_color;
out vec3 barycentric;
void main() {
    // Vertices are never shared between triangles, so the vertex id alone
    // tells which corner of its triangle this is.
    int corner = gl_VertexID % 3;
    barycentric = vec3(corner == 0, corner == 1, corner == 2);
    vertex_normal = mat3(model) * NORMAL;
    vertex_uv = UV;
    vertex_color = COLOR;
    gl_Position = projection * view * model * vec4(POSITION, 1.0);
}
"#;

const WIREFRAME_FRAGMENT_SHADER: &str = r#"#version 300 es
precision mediump float;
uniform vec4 color;
uniform float lineWidth;
uniform float blendFactor;
in vec3 barycentric;
out vec4 FRAG_COLOR;
void main() {
    vec3 width = fwidth(barycentric) * lineWidth;
    vec3 edge = smoothstep(vec3(0.0), width, barycentric);
    float coverage = 1.0 - min(min(edge.x, edge.y), edge.z);
    if (coverage <= 0.0) {
        discard;
    }
    FRAG_COLOR = vec4(color.rgb, color.a * coverage * blendFactor);
}
"#;

const FLAT_FRAGMENT_SHADER: &str = r#"#version 300 es
precision mediump float;
in vec3 vertex_normal;
in vec4 vertex_color;
out vec4 FRAG_COLOR;
void main() {
    vec3 light = normalize(vec3(0.3, 0.5, 0.8));
    float lambert = 0.6 + 0.4 * abs(dot(normalize(vertex_normal), light));
    vec3 linear_color = vertex_color.rgb * lambert;
    // The framebuffer is not SRGB, so we transform the linear color to close-enough-to-srgb.
    FRAG_COLOR = vec4(pow(linear_color, vec3(1.0 / 2.2)), vertex_color.a);
}
"#;

const TEXTURED_FRAGMENT_SHADER: &str = r#"#version 300 es
precision mediump float;
uniform sampler2D albedo;
in vec3 vertex_normal;
in vec2 vertex_uv;
out vec4 FRAG_COLOR;
void main() {
    vec3 light = normalize(vec3(0.3, 0.5, 0.8));
    float lambert = 0.6 + 0.4 * abs(dot(normalize(vertex_normal), light));
    vec4 texel = texture(albedo, vertex_uv);
    FRAG_COLOR = vec4(texel.rgb * lambert, texel.a);
}
"#;

/// Uniform locations of one program. Uniforms the driver optimized away are
/// `None`.
#[derive(Debug, Clone, Copy)]
pub struct Uniforms {
    pub projection: Option<i32>,
    pub view: Option<i32>,
    pub model: Option<i32>,
    pub color: Option<i32>,
    pub line_width: Option<i32>,
    pub blend_factor: Option<i32>,
    pub albedo: Option<i32>,
}

#[derive(Debug, Clone, Copy)]
pub struct ShaderProgram {
    pub program: ProgramId,
    pub uniforms: Uniforms,
}

/// Compiles and returns the shader program used to draw in `mode`.
pub fn create_program(
    adapter: &dyn GpuAdapter,
    mode: RenderMode,
) -> Result<ShaderProgram, GpuError> {
    let fragment_shader = match mode {
        RenderMode::Wireframe => WIREFRAME_FRAGMENT_SHADER,
        RenderMode::Flat => FLAT_FRAGMENT_SHADER,
        RenderMode::Textured => TEXTURED_FRAGMENT_SHADER,
    };
    let program = adapter.create_program(VERTEX_SHADER, fragment_shader)?;
    adapter.use_program(program);
    let location = |name| adapter.uniform_location(program, name);
    let uniforms = Uniforms {
        projection: location("projection"),
        view: location("view"),
        model: location("model"),
        color: location("color"),
        line_width: location("lineWidth"),
        blend_factor: location("blendFactor"),
        albedo: location("albedo"),
    };
    if let Some(albedo) = uniforms.albedo {
        adapter.set_uniform_i32(albedo, 0);
    }
    Ok(ShaderProgram { program, uniforms })
}

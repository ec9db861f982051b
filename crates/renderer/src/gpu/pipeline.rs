//! GLSL compilation helpers.
//!
//! Every shader in the workspace is authored as Vulkan-style GLSL and goes
//! through wgpu's naga frontend. Compilation runs inside a validation error
//! scope so a broken shader comes back as a labelled error instead of a
//! deferred device error. The shaders ship with the repo, so a compile
//! failure is a bug we want pinpointed, not swallowed.

use std::borrow::Cow;

use anyhow::{anyhow, Result};
use wgpu::naga::ShaderStage;

/// Minimal full-screen triangle vertex shader shared by the screen-space
/// effects.
pub const FULLSCREEN_VERTEX_GLSL: &str = r"#version 450
layout(location = 0) out vec2 v_uv;

const vec2 positions[3] = vec2[3](
    vec2(-1.0, -3.0),
    vec2(3.0, 1.0),
    vec2(-1.0, 1.0)
);

void main() {
    uint vertex_index = uint(gl_VertexIndex);
    vec2 pos = positions[vertex_index];
    v_uv = pos * 0.5 + vec2(0.5, 0.5);
    gl_Position = vec4(pos, 0.0, 1.0);
}
";

/// Compiles the shared full-screen triangle vertex shader.
pub fn fullscreen_vertex_module(device: &wgpu::Device) -> Result<wgpu::ShaderModule> {
    compile_vertex(device, "fullscreen triangle vertex", FULLSCREEN_VERTEX_GLSL)
}

/// Compiles a GLSL vertex shader, surfacing compile errors.
pub fn compile_vertex(
    device: &wgpu::Device,
    label: &str,
    source: &str,
) -> Result<wgpu::ShaderModule> {
    compile_glsl(device, label, source, ShaderStage::Vertex)
}

/// Compiles a GLSL fragment shader, surfacing compile errors.
pub fn compile_fragment(
    device: &wgpu::Device,
    label: &str,
    source: &str,
) -> Result<wgpu::ShaderModule> {
    compile_glsl(device, label, source, ShaderStage::Fragment)
}

fn compile_glsl(
    device: &wgpu::Device,
    label: &str,
    source: &str,
    stage: ShaderStage,
) -> Result<wgpu::ShaderModule> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Owned(source.to_owned()),
            stage,
            defines: &[],
        },
    });
    if let Some(error) = pollster::block_on(device.pop_error_scope()) {
        return Err(anyhow!("shader '{label}' failed to compile: {error}"));
    }
    Ok(module)
}

//! Light-beam field effect.
//!
//! N parallel strips from [`crate::geometry`] are displaced along Z by value
//! noise in the vertex stage, with normals recomputed by finite differences
//! of the displaced surface, then lit by one directional and one ambient
//! term and roughened with a dither-stage grain subtraction. The CPU touches
//! nothing per frame beyond the uniform block; all motion is shader-side.
//!
//! The shaders are assembled through [`crate::compose`]: a base lit-surface
//! template with `vertex_functions` / `vertex_transform` /
//! `fragment_functions` / `fragment_shade` anchors, filled with the noise
//! snippet and the beam-specific displacement and grain fragments.

use anyhow::Result;
use glam::{Mat4, Vec3};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use renderer::{
    compile_fragment, compile_vertex, EffectRenderer, FrameContext, GpuContext, UniformBlock,
    UniformBuffer, UniformValue,
};

use crate::color::parse_rgba_or;
use crate::compose::{FragmentSet, ShaderTemplate};
use crate::geometry::{build_strip_mesh, StripMeshSpec};
use crate::noise::NOISE_GLSL;

const WHITE: [f32; 4] = [1.0, 1.0, 1.0, 1.0];

/// Fixed perspective camera: 30° vertical fov, eye on +Z at distance 20.
const CAMERA_FOV_DEGREES: f32 = 30.0;
const CAMERA_DISTANCE: f32 = 20.0;

/// Directional light position before normalization.
const LIGHT_POSITION: Vec3 = Vec3::new(0.0, 3.0, 10.0);
const AMBIENT_STRENGTH: f32 = 0.15;

const UNIFORM_BLOCK_GLSL: &str = r"layout(std140, set = 0, binding = 0) uniform Params {
    mat4 view_proj;
    mat4 model;
    vec4 light_color;
    vec4 light_dir;
    vec4 base_color;
    vec4 motion;
} params;
";

const VERTEX_TEMPLATE_BODY: &str = r"#version 450

layout(location = 0) in vec3 position;
layout(location = 1) in vec2 uv;

layout(location = 0) out vec3 v_normal;
layout(location = 1) out vec2 v_uv;

//@anchor(vertex_uniforms)

//@anchor(vertex_functions)

void main() {
    vec3 displaced = position;
    vec3 normal = vec3(0.0, 0.0, 1.0);
//@anchor(vertex_transform)
    v_normal = normalize((params.model * vec4(normal, 0.0)).xyz);
    v_uv = uv;
    gl_Position = params.view_proj * params.model * vec4(displaced, 1.0);
}
";

const FRAGMENT_TEMPLATE_BODY: &str = r"#version 450

layout(location = 0) in vec3 v_normal;
layout(location = 1) in vec2 v_uv;

layout(location = 0) out vec4 out_color;

//@anchor(fragment_uniforms)

//@anchor(fragment_functions)

void main() {
    vec3 normal = normalize(v_normal);
    float incidence = max(dot(normal, normalize(params.light_dir.xyz)), 0.0);
    vec3 shaded = params.base_color.rgb
        + params.light_color.rgb * incidence
        + params.light_color.rgb * params.light_dir.w;
    vec4 color = vec4(shaded, 1.0);
//@anchor(fragment_shade)
    out_color = color;
}
";

/// Noise-driven Z displacement of the strip surface, with normals derived
/// from the displaced neighbourhood. `motion` packs (time, speed, scale,
/// intensity); the 0.1 time gain keeps the drift slow.
const DISPLACEMENT_GLSL: &str = r"float surface_offset(vec3 at, vec2 uv) {
    vec2 sample_at = vec2(
        (at.y - uv.y) * params.motion.z,
        (at.z + params.motion.x * 0.1 * params.motion.y * 3.0) * params.motion.z
    );
    return vnoise(sample_at) * 2.0 - 1.0;
}

vec3 displaced_point(vec3 at, vec2 uv) {
    return vec3(at.x, at.y, at.z + surface_offset(at, uv));
}

vec3 displaced_normal(vec3 at, vec2 uv) {
    vec3 current = displaced_point(at, uv);
    vec3 tangent_x = normalize(displaced_point(at + vec3(0.01, 0.0, 0.0), uv) - current);
    vec3 tangent_y = normalize(displaced_point(at + vec3(0.0, -0.01, 0.0), uv) - current);
    return normalize(cross(tangent_y, tangent_x));
}
";

const VERTEX_TRANSFORM_GLSL: &str = r"    displaced = displaced_point(position, uv);
    normal = displaced_normal(position, uv);
";

const DITHER_GLSL: &str = r"    float grain = vnoise(gl_FragCoord.xy);
    color.rgb -= grain / 15.0 * params.motion.w;
";

/// Configuration for the beam field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BeamsConfig {
    pub beam_width: f32,
    pub beam_height: f32,
    pub beam_count: u32,
    pub light_color: String,
    pub speed: f32,
    pub noise_intensity: f32,
    pub scale: f32,
    /// Z rotation of the whole beam group, in degrees.
    pub rotation: f32,
    /// Seed for the per-strip UV offsets; random when absent.
    pub seed: Option<u64>,
}

impl Default for BeamsConfig {
    fn default() -> Self {
        Self {
            beam_width: 2.0,
            beam_height: 15.0,
            beam_count: 12,
            light_color: "#ffffff".to_owned(),
            speed: 2.0,
            noise_intensity: 1.75,
            scale: 0.2,
            rotation: 0.0,
            seed: None,
        }
    }
}

/// Partial overlay for presets and live updates.
///
/// `beam_width`/`beam_height`/`beam_count` are structural (they rebuild
/// geometry); live updates ignore them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BeamsPatch {
    pub beam_width: Option<f32>,
    pub beam_height: Option<f32>,
    pub beam_count: Option<u32>,
    pub light_color: Option<String>,
    pub speed: Option<f32>,
    pub noise_intensity: Option<f32>,
    pub scale: Option<f32>,
    pub rotation: Option<f32>,
    pub seed: Option<u64>,
}

impl BeamsPatch {
    pub fn apply_to(&self, config: &mut BeamsConfig) {
        if let Some(value) = self.beam_width {
            config.beam_width = value;
        }
        if let Some(value) = self.beam_height {
            config.beam_height = value;
        }
        if let Some(value) = self.beam_count {
            config.beam_count = value;
        }
        if let Some(value) = &self.light_color {
            config.light_color = value.clone();
        }
        if let Some(value) = self.speed {
            config.speed = value;
        }
        if let Some(value) = self.noise_intensity {
            config.noise_intensity = value;
        }
        if let Some(value) = self.scale {
            config.scale = value;
        }
        if let Some(value) = self.rotation {
            config.rotation = value;
        }
        if let Some(value) = self.seed {
            config.seed = Some(value);
        }
    }
}

/// Mounted beam field.
pub struct Beams {
    pipeline: wgpu::RenderPipeline,
    uniforms: UniformBuffer,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
    speed: f32,
    noise_intensity: f32,
    scale: f32,
}

impl Beams {
    pub fn new(gpu: &GpuContext, config: &BeamsConfig) -> Result<Self> {
        use wgpu::util::DeviceExt;

        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mesh = build_strip_mesh(
            &StripMeshSpec {
                count: config.beam_count,
                width: config.beam_width,
                height: config.beam_height,
                ..StripMeshSpec::default()
            },
            &mut rng,
        );

        let mut vertex_data = Vec::with_capacity(mesh.positions.len() * 5);
        for (position, uv) in mesh.positions.iter().zip(&mesh.uvs) {
            vertex_data.extend_from_slice(position);
            vertex_data.extend_from_slice(uv);
        }

        let vertex_buffer = gpu
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("beams vertices"),
                contents: bytemuck::cast_slice(&vertex_data),
                usage: wgpu::BufferUsages::VERTEX,
            });
        let index_buffer = gpu
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("beams indices"),
                contents: bytemuck::cast_slice(&mesh.indices),
                usage: wgpu::BufferUsages::INDEX,
            });

        let size = gpu.size();
        let block = UniformBlock::build(vec![
            (
                "view_proj",
                UniformValue::Mat4(view_proj(size.width, size.height).to_cols_array_2d()),
            ),
            (
                "model",
                UniformValue::Mat4(
                    Mat4::from_rotation_z(config.rotation.to_radians()).to_cols_array_2d(),
                ),
            ),
            (
                "light_color",
                UniformValue::Vec4(parse_rgba_or(&config.light_color, WHITE)),
            ),
            ("light_dir", UniformValue::Vec4(light_dir_value())),
            (
                "base_color",
                UniformValue::Vec4([0.02, 0.02, 0.02, 1.0]),
            ),
            (
                "motion",
                UniformValue::Vec4([0.0, config.speed, config.scale, config.noise_intensity]),
            ),
        ])?;
        let uniforms = UniformBuffer::new(&gpu.device, "beams uniforms", block);

        let vertex_source = compose_stage(
            "beams vertex",
            VERTEX_TEMPLATE_BODY,
            "vertex_uniforms",
            &[
                ("vertex_functions", NOISE_GLSL),
                ("vertex_functions", DISPLACEMENT_GLSL),
                ("vertex_transform", VERTEX_TRANSFORM_GLSL),
            ],
        )?;
        let fragment_source = compose_stage(
            "beams fragment",
            FRAGMENT_TEMPLATE_BODY,
            "fragment_uniforms",
            &[
                ("fragment_functions", NOISE_GLSL),
                ("fragment_shade", DITHER_GLSL),
            ],
        )?;

        let vertex = compile_vertex(&gpu.device, "beams vertex", &vertex_source)?;
        let fragment = compile_fragment(&gpu.device, "beams fragment", &fragment_source)?;

        let layout = gpu
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("beams pipeline layout"),
                bind_group_layouts: &[uniforms.layout()],
                push_constant_ranges: &[],
            });
        let pipeline = gpu
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("beams pipeline"),
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module: &vertex,
                    entry_point: Some("main"),
                    buffers: &[wgpu::VertexBufferLayout {
                        array_stride: 5 * 4,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &[
                            wgpu::VertexAttribute {
                                format: wgpu::VertexFormat::Float32x3,
                                offset: 0,
                                shader_location: 0,
                            },
                            wgpu::VertexAttribute {
                                format: wgpu::VertexFormat::Float32x2,
                                offset: 3 * 4,
                                shader_location: 1,
                            },
                        ],
                    }],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    // The displaced surface can fold past edge-on; shade both faces.
                    cull_mode: None,
                    unclipped_depth: false,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    conservative: false,
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState {
                    count: gpu.sample_count,
                    ..wgpu::MultisampleState::default()
                },
                fragment: Some(wgpu::FragmentState {
                    module: &fragment,
                    entry_point: Some("main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: gpu.surface_format,
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                multiview: None,
                cache: None,
            });

        Ok(Self {
            pipeline,
            uniforms,
            vertex_buffer,
            index_buffer,
            index_count: mesh.index_count() as u32,
            speed: config.speed,
            noise_intensity: config.noise_intensity,
            scale: config.scale,
        })
    }

    /// Applies a live update. Structural fields (beam dimensions and count)
    /// are ignored here; remount to change them.
    pub fn apply(&mut self, patch: &BeamsPatch) -> Result<()> {
        if patch.beam_width.is_some() || patch.beam_height.is_some() || patch.beam_count.is_some() {
            tracing::debug!("ignoring structural beam parameters in live update");
        }
        if let Some(color) = &patch.light_color {
            self.uniforms
                .set("light_color", UniformValue::Vec4(parse_rgba_or(color, WHITE)))?;
        }
        if let Some(rotation) = patch.rotation {
            self.uniforms.set(
                "model",
                UniformValue::Mat4(Mat4::from_rotation_z(rotation.to_radians()).to_cols_array_2d()),
            )?;
        }
        if let Some(speed) = patch.speed {
            self.speed = speed;
        }
        if let Some(intensity) = patch.noise_intensity {
            self.noise_intensity = intensity;
        }
        if let Some(scale) = patch.scale {
            self.scale = scale;
        }
        Ok(())
    }
}

fn compose_stage(
    label: &str,
    body: &str,
    uniforms_anchor: &str,
    fragments: &[(&str, &str)],
) -> Result<String> {
    let template = ShaderTemplate::parse(label, body)?;
    let mut set = FragmentSet::new();
    set.insert(uniforms_anchor, UNIFORM_BLOCK_GLSL);
    for (anchor, code) in fragments {
        set.insert(anchor, code);
    }
    Ok(template.compose(&set)?)
}

fn view_proj(width: u32, height: u32) -> Mat4 {
    let aspect = width.max(1) as f32 / height.max(1) as f32;
    let projection = Mat4::perspective_rh(CAMERA_FOV_DEGREES.to_radians(), aspect, 0.1, 100.0);
    let view = Mat4::look_at_rh(
        Vec3::new(0.0, 0.0, CAMERA_DISTANCE),
        Vec3::ZERO,
        Vec3::Y,
    );
    projection * view
}

fn light_dir_value() -> [f32; 4] {
    let direction = LIGHT_POSITION.normalize();
    [direction.x, direction.y, direction.z, AMBIENT_STRENGTH]
}

impl EffectRenderer for Beams {
    fn label(&self) -> &'static str {
        "beams"
    }

    fn resize(&mut self, gpu: &GpuContext) {
        let size = gpu.size();
        if let Err(err) = self.uniforms.set(
            "view_proj",
            UniformValue::Mat4(view_proj(size.width, size.height).to_cols_array_2d()),
        ) {
            tracing::error!(error = %err, "failed to update beams camera");
        }
    }

    fn render(
        &mut self,
        gpu: &GpuContext,
        frame: &FrameContext,
        encoder: &mut wgpu::CommandEncoder,
        view: &wgpu::TextureView,
    ) -> Result<()> {
        self.uniforms.set(
            "motion",
            UniformValue::Vec4([
                frame.time.seconds,
                self.speed,
                self.scale,
                self.noise_intensity,
            ]),
        )?;
        self.uniforms.upload(&gpu.queue);

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("beams pass"),
            color_attachments: &[Some(gpu.color_attachment(view))],
            depth_stencil_attachment: None,
            occlusion_query_set: None,
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, self.uniforms.bind_group(), &[]);
        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        pass.draw_indexed(0..self.index_count, 0, 0..1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = BeamsConfig::default();
        assert_eq!(config.beam_count, 12);
        assert_eq!(config.beam_width, 2.0);
        assert_eq!(config.beam_height, 15.0);
        assert_eq!(config.noise_intensity, 1.75);
        assert_eq!(config.scale, 0.2);
    }

    #[test]
    fn composed_vertex_stage_contains_noise_and_displacement() {
        let source = compose_stage(
            "test vertex",
            VERTEX_TEMPLATE_BODY,
            "vertex_uniforms",
            &[
                ("vertex_functions", NOISE_GLSL),
                ("vertex_functions", DISPLACEMENT_GLSL),
                ("vertex_transform", VERTEX_TRANSFORM_GLSL),
            ],
        )
        .unwrap();
        // Noise must precede the displacement helpers that call it.
        let noise_at = source.find("float vnoise(").unwrap();
        let displace_at = source.find("float surface_offset(").unwrap();
        assert!(noise_at < displace_at);
        assert!(source.contains("displaced = displaced_point(position, uv);"));
        assert!(!source.contains("//@anchor"));
    }

    #[test]
    fn composed_fragment_stage_contains_dither() {
        let source = compose_stage(
            "test fragment",
            FRAGMENT_TEMPLATE_BODY,
            "fragment_uniforms",
            &[
                ("fragment_functions", NOISE_GLSL),
                ("fragment_shade", DITHER_GLSL),
            ],
        )
        .unwrap();
        assert!(source.contains("float grain = vnoise(gl_FragCoord.xy);"));
        assert!(source.contains("uniform Params"));
    }

    #[test]
    fn camera_matrix_is_finite_for_odd_aspects() {
        for (width, height) in [(1, 1), (800, 600), (3840, 1080)] {
            let matrix = view_proj(width, height);
            assert!(matrix.to_cols_array().iter().all(|v| v.is_finite()));
        }
    }

    #[test]
    fn structural_patch_fields_do_not_touch_config_dimensions_unset() {
        let mut config = BeamsConfig::default();
        let patch = BeamsPatch {
            speed: Some(4.0),
            ..BeamsPatch::default()
        };
        patch.apply_to(&mut config);
        assert_eq!(config.speed, 4.0);
        assert_eq!(config.beam_count, 12);
    }
}

//! Spin-gradient field effect.
//!
//! A single full-screen fragment shader computes a polar-warped, iteratively
//! distorted field and blends three configurable colors through thresholded
//! paint bands. The distortion loop constants are the visual contract; they
//! were tuned by eye, not derived from a model.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use renderer::{
    compile_fragment, fullscreen_vertex_module, EffectRenderer, FrameContext, GpuContext,
    UniformBlock, UniformBuffer, UniformValue,
};

use crate::color::parse_rgba_or;

const FALLBACK_COLOR: [f32; 4] = [1.0, 1.0, 1.0, 1.0];

const FRAGMENT_GLSL: &str = r"#version 450

layout(location = 0) in vec2 v_uv;
layout(location = 0) out vec4 out_color;

layout(std140, set = 0, binding = 0) uniform Params {
    vec4 resolution;
    vec4 color1;
    vec4 color2;
    vec4 color3;
    vec2 offset;
    vec2 pointer;
    float time;
    float spin_rotation;
    float spin_speed;
    float contrast;
    float lighting;
    float spin_amount;
    float pixel_filter;
    float spin_ease;
    int rotate_field;
} params;

vec4 field_color(vec2 screen_size, vec2 screen_coords) {
    float pixel_size = length(screen_size) / params.pixel_filter;
    vec2 uv = (floor(screen_coords * (1.0 / pixel_size)) * pixel_size - 0.5 * screen_size)
        / length(screen_size) - params.offset;
    float uv_len = length(uv);

    float speed = params.spin_rotation * params.spin_ease * 0.2;
    if (params.rotate_field != 0) {
        speed = params.time * speed;
    }
    speed += 302.2;

    float pointer_influence = params.pointer.x * 2.0 - 1.0;
    speed += pointer_influence * 0.1;

    float new_pixel_angle = atan(uv.y, uv.x) + speed
        - params.spin_ease * 20.0 * (params.spin_amount * uv_len + (1.0 - params.spin_amount));
    vec2 mid = (screen_size / length(screen_size)) / 2.0;
    uv = vec2(uv_len * cos(new_pixel_angle) + mid.x, uv_len * sin(new_pixel_angle) + mid.y) - mid;

    uv *= 30.0;
    speed = params.time * params.spin_speed + pointer_influence * 2.0;

    vec2 uv2 = vec2(uv.x + uv.y);

    for (int i = 0; i < 5; i++) {
        uv2 += sin(max(uv.x, uv.y)) + uv;
        uv += 0.5 * vec2(
            cos(5.1123314 + 0.353 * uv2.y + speed * 0.131121),
            sin(uv2.x - 0.113 * speed)
        );
        uv -= cos(uv.x + uv.y) - sin(uv.x * 0.711 - uv.y);
    }

    float contrast_mod = 0.25 * params.contrast + 0.5 * params.spin_amount + 1.2;
    float paint_res = min(2.0, max(0.0, length(uv) * 0.035 * contrast_mod));
    float c1p = max(0.0, 1.0 - contrast_mod * abs(1.0 - paint_res));
    float c2p = max(0.0, 1.0 - contrast_mod * abs(paint_res));
    float c3p = 1.0 - min(1.0, c1p + c2p);
    float light = (params.lighting - 0.2) * max(c1p * 5.0 - 4.0, 0.0)
        + params.lighting * max(c2p * 5.0 - 4.0, 0.0);

    return (0.3 / params.contrast) * params.color1
        + (1.0 - 0.3 / params.contrast)
            * (params.color1 * c1p + params.color2 * c2p
                + vec4(c3p * params.color3.rgb, c3p * params.color1.a))
        + light;
}

void main() {
    vec2 screen_size = params.resolution.xy;
    out_color = field_color(screen_size, v_uv * screen_size);
}
";

/// Configuration for the spin-gradient field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VortexConfig {
    pub spin_rotation: f32,
    pub spin_speed: f32,
    pub offset: [f32; 2],
    pub color1: String,
    pub color2: String,
    pub color3: String,
    pub contrast: f32,
    pub lighting: f32,
    pub spin_amount: f32,
    pub pixel_filter: f32,
    pub spin_ease: f32,
    /// Continuous rotation over time.
    pub rotate: bool,
    /// Let pointer X modulate the spin speed.
    pub pointer_spin: bool,
}

impl Default for VortexConfig {
    fn default() -> Self {
        Self {
            spin_rotation: -2.0,
            spin_speed: 7.0,
            offset: [0.0, 0.0],
            color1: "#DE443B".to_owned(),
            color2: "#006BB4".to_owned(),
            color3: "#162325".to_owned(),
            contrast: 3.5,
            lighting: 0.4,
            spin_amount: 0.25,
            pixel_filter: 745.0,
            spin_ease: 1.0,
            rotate: false,
            pointer_spin: true,
        }
    }
}

/// Partial overlay for presets and live updates. Every field is
/// non-structural, so all of them apply without resource reallocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VortexPatch {
    pub spin_rotation: Option<f32>,
    pub spin_speed: Option<f32>,
    pub offset: Option<[f32; 2]>,
    pub color1: Option<String>,
    pub color2: Option<String>,
    pub color3: Option<String>,
    pub contrast: Option<f32>,
    pub lighting: Option<f32>,
    pub spin_amount: Option<f32>,
    pub pixel_filter: Option<f32>,
    pub spin_ease: Option<f32>,
    pub rotate: Option<bool>,
    pub pointer_spin: Option<bool>,
}

impl VortexPatch {
    pub fn apply_to(&self, config: &mut VortexConfig) {
        macro_rules! overlay {
            ($($field:ident),+ $(,)?) => {
                $(if let Some(value) = &self.$field {
                    config.$field = value.clone();
                })+
            };
        }
        overlay!(
            spin_rotation,
            spin_speed,
            offset,
            color1,
            color2,
            color3,
            contrast,
            lighting,
            spin_amount,
            pixel_filter,
            spin_ease,
            rotate,
            pointer_spin,
        );
    }
}

/// Mounted spin-gradient effect.
pub struct Vortex {
    pipeline: wgpu::RenderPipeline,
    uniforms: UniformBuffer,
    pointer_spin: bool,
}

impl Vortex {
    pub fn new(gpu: &GpuContext, config: &VortexConfig) -> Result<Self> {
        let size = gpu.size();
        let block = UniformBlock::build(vec![
            (
                "resolution",
                UniformValue::Vec4(resolution_value(size.width, size.height)),
            ),
            (
                "color1",
                UniformValue::Vec4(parse_rgba_or(&config.color1, FALLBACK_COLOR)),
            ),
            (
                "color2",
                UniformValue::Vec4(parse_rgba_or(&config.color2, FALLBACK_COLOR)),
            ),
            (
                "color3",
                UniformValue::Vec4(parse_rgba_or(&config.color3, FALLBACK_COLOR)),
            ),
            ("offset", UniformValue::Vec2(config.offset)),
            ("pointer", UniformValue::Vec2(renderer::POINTER_CENTER)),
            ("time", UniformValue::Float(0.0)),
            ("spin_rotation", UniformValue::Float(config.spin_rotation)),
            ("spin_speed", UniformValue::Float(config.spin_speed)),
            ("contrast", UniformValue::Float(config.contrast)),
            ("lighting", UniformValue::Float(config.lighting)),
            ("spin_amount", UniformValue::Float(config.spin_amount)),
            ("pixel_filter", UniformValue::Float(config.pixel_filter)),
            ("spin_ease", UniformValue::Float(config.spin_ease)),
            ("rotate_field", UniformValue::Int(i32::from(config.rotate))),
        ])?;
        let uniforms = UniformBuffer::new(&gpu.device, "vortex uniforms", block);

        let vertex = fullscreen_vertex_module(&gpu.device)?;
        let fragment = compile_fragment(&gpu.device, "vortex fragment", FRAGMENT_GLSL)?;

        let layout = gpu
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("vortex pipeline layout"),
                bind_group_layouts: &[uniforms.layout()],
                push_constant_ranges: &[],
            });
        let pipeline = gpu
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("vortex pipeline"),
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module: &vertex,
                    entry_point: Some("main"),
                    buffers: &[],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: Some(wgpu::Face::Back),
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
            pointer_spin: config.pointer_spin,
        })
    }

    /// Applies a live update; every vortex parameter maps to a uniform
    /// write, so nothing is reallocated.
    pub fn apply(&mut self, patch: &VortexPatch) -> Result<()> {
        macro_rules! scalar {
            ($field:ident, $name:literal) => {
                if let Some(value) = patch.$field {
                    self.uniforms.set($name, UniformValue::Float(value))?;
                }
            };
        }
        macro_rules! color {
            ($field:ident, $name:literal) => {
                if let Some(value) = &patch.$field {
                    self.uniforms
                        .set($name, UniformValue::Vec4(parse_rgba_or(value, FALLBACK_COLOR)))?;
                }
            };
        }

        scalar!(spin_rotation, "spin_rotation");
        scalar!(spin_speed, "spin_speed");
        scalar!(contrast, "contrast");
        scalar!(lighting, "lighting");
        scalar!(spin_amount, "spin_amount");
        scalar!(pixel_filter, "pixel_filter");
        scalar!(spin_ease, "spin_ease");
        color!(color1, "color1");
        color!(color2, "color2");
        color!(color3, "color3");
        if let Some(offset) = patch.offset {
            self.uniforms.set("offset", UniformValue::Vec2(offset))?;
        }
        if let Some(rotate) = patch.rotate {
            self.uniforms
                .set("rotate_field", UniformValue::Int(i32::from(rotate)))?;
        }
        if let Some(pointer_spin) = patch.pointer_spin {
            self.pointer_spin = pointer_spin;
        }
        Ok(())
    }
}

fn resolution_value(width: u32, height: u32) -> [f32; 4] {
    let w = width.max(1) as f32;
    let h = height.max(1) as f32;
    [w, h, w / h, 0.0]
}

impl EffectRenderer for Vortex {
    fn label(&self) -> &'static str {
        "vortex"
    }

    fn resize(&mut self, gpu: &GpuContext) {
        let size = gpu.size();
        if let Err(err) = self.uniforms.set(
            "resolution",
            UniformValue::Vec4(resolution_value(size.width, size.height)),
        ) {
            tracing::error!(error = %err, "failed to update vortex resolution");
        }
    }

    fn render(
        &mut self,
        gpu: &GpuContext,
        frame: &FrameContext,
        encoder: &mut wgpu::CommandEncoder,
        view: &wgpu::TextureView,
    ) -> Result<()> {
        self.uniforms
            .set("time", UniformValue::Float(frame.time.seconds))?;
        if self.pointer_spin {
            self.uniforms
                .set("pointer", UniformValue::Vec2(frame.pointer.position))?;
        }
        self.uniforms.upload(&gpu.queue);

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("vortex pass"),
            color_attachments: &[Some(gpu.color_attachment(view))],
            depth_stencil_attachment: None,
            occlusion_query_set: None,
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, self.uniforms.bind_group(), &[]);
        pass.draw(0..3, 0..1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = VortexConfig::default();
        assert_eq!(config.spin_rotation, -2.0);
        assert_eq!(config.spin_speed, 7.0);
        assert_eq!(config.color1, "#DE443B");
        assert_eq!(config.pixel_filter, 745.0);
        assert!(!config.rotate);
        assert!(config.pointer_spin);
    }

    #[test]
    fn patch_overlays_only_present_fields() {
        let mut config = VortexConfig::default();
        let patch = VortexPatch {
            spin_speed: Some(2.0),
            color2: Some("#112233".to_owned()),
            rotate: Some(true),
            ..VortexPatch::default()
        };
        patch.apply_to(&mut config);
        assert_eq!(config.spin_speed, 2.0);
        assert_eq!(config.color2, "#112233");
        assert!(config.rotate);
        // Untouched fields keep their defaults.
        assert_eq!(config.spin_rotation, -2.0);
        assert_eq!(config.color1, "#DE443B");
    }

    #[test]
    fn resolution_value_tracks_aspect() {
        let value = resolution_value(800, 600);
        assert_eq!(value[0], 800.0);
        assert_eq!(value[1], 600.0);
        assert!((value[2] - 800.0 / 600.0).abs() < 1e-6);
    }
}

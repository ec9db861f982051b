//! Pointer-interactive fluid field effect.
//!
//! Pointer motion stirs a coarse CPU velocity field ([`sim`]); the field is
//! uploaded as an `Rg32Float` texture every frame and shaded to a three-stop
//! palette by magnitude. When the pointer goes quiet, the autonomous driver
//! ([`idle`]) takes over with a wandering virtual pointer, crossfading in and
//! out instead of cutting.

pub mod idle;
pub mod sim;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use winit::dpi::PhysicalSize;

use renderer::{
    compile_fragment, fullscreen_vertex_module, EffectRenderer, FrameContext, GpuContext,
    UniformBlock, UniformBuffer, UniformValue,
};

use crate::color::parse_rgba_or;
use idle::{IdleConfig, IdleDriver};
use sim::{FluidField, FluidParams};

/// Largest simulation grid dimension; the solver runs on the UI thread.
const MAX_GRID_DIMENSION: u32 = 256;
const MIN_GRID_DIMENSION: u32 = 16;

/// Maps field speed (cells per second) to display intensity.
const DISPLAY_GAIN: f32 = 0.02;

/// Simulation steps are clamped to this delta so a long frame gap cannot
/// destabilise the solver.
const MAX_STEP_SECONDS: f32 = 1.0 / 30.0;

/// Longest autonomous history replayed when evaluating a still frame.
const PRIME_LIMIT_SECONDS: f32 = 3.0;

const FALLBACK_PALETTE: [[f32; 4]; 3] = [
    [0.32, 0.15, 1.0, 1.0],
    [1.0, 0.62, 0.99, 1.0],
    [0.69, 0.62, 0.94, 1.0],
];

const FRAGMENT_GLSL: &str = r"#version 450

layout(location = 0) in vec2 v_uv;
layout(location = 0) out vec4 out_color;

layout(std140, set = 0, binding = 0) uniform Params {
    vec4 resolution;
    vec4 color1;
    vec4 color2;
    vec4 color3;
    vec4 display;
} params;

layout(set = 1, binding = 0) uniform texture2D velocity_texture;
layout(set = 1, binding = 1) uniform sampler velocity_sampler;

vec2 field_sample(ivec2 cell) {
    ivec2 top = ivec2(params.resolution.zw) - ivec2(1);
    ivec2 clamped = clamp(cell, ivec2(0), top);
    return texelFetch(sampler2D(velocity_texture, velocity_sampler), clamped, 0).xy;
}

void main() {
    // Manual bilinear filtering; float32 textures are not filterable on
    // every adapter.
    vec2 grid = params.resolution.zw;
    vec2 pos = vec2(v_uv.x, 1.0 - v_uv.y) * grid - 0.5;
    vec2 base = floor(pos);
    vec2 part = pos - base;
    ivec2 cell = ivec2(base);
    vec2 s00 = field_sample(cell);
    vec2 s10 = field_sample(cell + ivec2(1, 0));
    vec2 s01 = field_sample(cell + ivec2(0, 1));
    vec2 s11 = field_sample(cell + ivec2(1, 1));
    vec2 velocity = mix(mix(s00, s10, part.x), mix(s01, s11, part.x), part.y);

    float strength = clamp(length(velocity) * params.display.x, 0.0, 1.0);
    vec3 shade = mix(params.color1.rgb, params.color2.rgb, clamp(strength * 2.0, 0.0, 1.0));
    shade = mix(shade, params.color3.rgb, clamp(strength * 2.0 - 1.0, 0.0, 1.0));
    out_color = vec4(shade * strength, 1.0);
}
";

/// Configuration for the fluid field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EtherConfig {
    /// Three-stop palette, low to high field intensity.
    pub colors: [String; 3],
    /// Force gain for pointer motion.
    pub mouse_force: f32,
    /// Influence radius around the pointer, in surface pixels.
    pub cursor_size: f32,
    pub is_viscous: bool,
    pub viscous: f32,
    pub iterations_viscous: u32,
    pub iterations_poisson: u32,
    /// Simulation grid scale relative to the surface resolution.
    pub resolution: f32,
    /// Reflect the field at the surface edges instead of damping it.
    pub is_bounce: bool,
    /// Enable autonomous idle motion.
    pub auto_demo: bool,
    pub auto_speed: f32,
    pub auto_intensity: f32,
    /// Seconds for idle motion to fade out when real input resumes.
    pub takeover_duration: f32,
    /// Milliseconds of pointer silence before idle motion fades in.
    pub auto_resume_delay: f32,
    /// Seconds for idle motion to fade in.
    pub auto_ramp_duration: f32,
}

impl Default for EtherConfig {
    fn default() -> Self {
        Self {
            colors: [
                "#5227FF".to_owned(),
                "#FF9FFC".to_owned(),
                "#B19EEF".to_owned(),
            ],
            mouse_force: 20.0,
            cursor_size: 100.0,
            is_viscous: false,
            viscous: 30.0,
            iterations_viscous: 32,
            iterations_poisson: 32,
            resolution: 0.5,
            is_bounce: false,
            auto_demo: true,
            auto_speed: 0.5,
            auto_intensity: 2.2,
            takeover_duration: 0.25,
            auto_resume_delay: 2500.0,
            auto_ramp_duration: 0.6,
        }
    }
}

impl EtherConfig {
    fn idle_config(&self) -> IdleConfig {
        IdleConfig {
            resume_delay: self.auto_resume_delay / 1000.0,
            ramp_duration: self.auto_ramp_duration,
            takeover_duration: self.takeover_duration,
            speed: self.auto_speed,
            intensity: self.auto_intensity,
        }
    }
}

/// Partial overlay for presets and live updates.
///
/// `resolution` is structural (it sizes the simulation grid); live updates
/// ignore it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EtherPatch {
    pub colors: Option<[String; 3]>,
    pub mouse_force: Option<f32>,
    pub cursor_size: Option<f32>,
    pub is_viscous: Option<bool>,
    pub viscous: Option<f32>,
    pub iterations_viscous: Option<u32>,
    pub iterations_poisson: Option<u32>,
    pub resolution: Option<f32>,
    pub is_bounce: Option<bool>,
    pub auto_demo: Option<bool>,
    pub auto_speed: Option<f32>,
    pub auto_intensity: Option<f32>,
    pub takeover_duration: Option<f32>,
    pub auto_resume_delay: Option<f32>,
    pub auto_ramp_duration: Option<f32>,
}

impl EtherPatch {
    pub fn apply_to(&self, config: &mut EtherConfig) {
        macro_rules! overlay {
            ($($field:ident),+ $(,)?) => {
                $(if let Some(value) = &self.$field {
                    config.$field = value.clone();
                })+
            };
        }
        overlay!(
            colors,
            mouse_force,
            cursor_size,
            is_viscous,
            viscous,
            iterations_viscous,
            iterations_poisson,
            resolution,
            is_bounce,
            auto_demo,
            auto_speed,
            auto_intensity,
            takeover_duration,
            auto_resume_delay,
            auto_ramp_duration,
        );
    }
}

struct FieldTexture {
    texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
}

/// Mounted fluid field.
pub struct Ether {
    pipeline: wgpu::RenderPipeline,
    uniforms: UniformBuffer,
    texture_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    field_texture: FieldTexture,
    field: FluidField,
    params: FluidParams,
    idle: Option<IdleDriver>,
    idle_config: IdleConfig,
    last_idle_pos: Option<[f32; 2]>,
    mouse_force: f32,
    cursor_size: f32,
    grid_scale: f32,
    surface_size: PhysicalSize<u32>,
    primed: bool,
}

impl Ether {
    pub fn new(gpu: &GpuContext, config: &EtherConfig) -> Result<Self> {
        let surface_size = gpu.size();
        let grid_scale = config.resolution.clamp(0.05, 1.0);
        let (grid_w, grid_h) = grid_dimensions(surface_size, grid_scale);
        let field = FluidField::new(grid_w as usize, grid_h as usize);

        let block = UniformBlock::build(vec![
            (
                "resolution",
                UniformValue::Vec4([
                    surface_size.width.max(1) as f32,
                    surface_size.height.max(1) as f32,
                    grid_w as f32,
                    grid_h as f32,
                ]),
            ),
            (
                "color1",
                UniformValue::Vec4(parse_rgba_or(&config.colors[0], FALLBACK_PALETTE[0])),
            ),
            (
                "color2",
                UniformValue::Vec4(parse_rgba_or(&config.colors[1], FALLBACK_PALETTE[1])),
            ),
            (
                "color3",
                UniformValue::Vec4(parse_rgba_or(&config.colors[2], FALLBACK_PALETTE[2])),
            ),
            (
                "display",
                UniformValue::Vec4([DISPLAY_GAIN, 0.0, 0.0, 0.0]),
            ),
        ])?;
        let uniforms = UniformBuffer::new(&gpu.device, "ether uniforms", block);

        let texture_layout =
            gpu.device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("ether field layout"),
                    entries: &[
                        wgpu::BindGroupLayoutEntry {
                            binding: 0,
                            visibility: wgpu::ShaderStages::FRAGMENT,
                            ty: wgpu::BindingType::Texture {
                                sample_type: wgpu::TextureSampleType::Float { filterable: false },
                                view_dimension: wgpu::TextureViewDimension::D2,
                                multisampled: false,
                            },
                            count: None,
                        },
                        wgpu::BindGroupLayoutEntry {
                            binding: 1,
                            visibility: wgpu::ShaderStages::FRAGMENT,
                            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::NonFiltering),
                            count: None,
                        },
                    ],
                });
        let sampler = gpu.device.create_sampler(&wgpu::SamplerDescriptor {
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        let field_texture =
            create_field_texture(&gpu.device, &texture_layout, &sampler, grid_w, grid_h);

        let vertex = fullscreen_vertex_module(&gpu.device)?;
        let fragment = compile_fragment(&gpu.device, "ether fragment", FRAGMENT_GLSL)?;
        let layout = gpu
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("ether pipeline layout"),
                bind_group_layouts: &[uniforms.layout(), &texture_layout],
                push_constant_ranges: &[],
            });
        let pipeline = gpu
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("ether pipeline"),
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

        let idle_config = config.idle_config();
        Ok(Self {
            pipeline,
            uniforms,
            texture_layout,
            sampler,
            field_texture,
            field,
            params: FluidParams {
                is_viscous: config.is_viscous,
                viscous: config.viscous,
                iterations_viscous: config.iterations_viscous,
                iterations_poisson: config.iterations_poisson,
                is_bounce: config.is_bounce,
                ..FluidParams::default()
            },
            idle: config.auto_demo.then(|| IdleDriver::new(idle_config)),
            idle_config,
            last_idle_pos: None,
            mouse_force: config.mouse_force,
            cursor_size: config.cursor_size,
            grid_scale,
            surface_size,
            primed: false,
        })
    }

    /// Applies a live update. `resolution` is structural and ignored here.
    pub fn apply(&mut self, patch: &EtherPatch) -> Result<()> {
        if patch.resolution.is_some() {
            tracing::debug!("ignoring structural simulation resolution in live update");
        }
        if let Some(colors) = &patch.colors {
            for (index, (color, name)) in colors
                .iter()
                .zip(["color1", "color2", "color3"])
                .enumerate()
            {
                self.uniforms.set(
                    name,
                    UniformValue::Vec4(parse_rgba_or(color, FALLBACK_PALETTE[index])),
                )?;
            }
        }
        if let Some(force) = patch.mouse_force {
            self.mouse_force = force;
        }
        if let Some(size) = patch.cursor_size {
            self.cursor_size = size;
        }
        if let Some(viscous) = patch.is_viscous {
            self.params.is_viscous = viscous;
        }
        if let Some(viscous) = patch.viscous {
            self.params.viscous = viscous;
        }
        if let Some(iterations) = patch.iterations_viscous {
            self.params.iterations_viscous = iterations;
        }
        if let Some(iterations) = patch.iterations_poisson {
            self.params.iterations_poisson = iterations;
        }
        if let Some(bounce) = patch.is_bounce {
            self.params.is_bounce = bounce;
        }

        let mut idle_config = self.idle_config;
        if let Some(delay) = patch.auto_resume_delay {
            idle_config.resume_delay = delay / 1000.0;
        }
        if let Some(ramp) = patch.auto_ramp_duration {
            idle_config.ramp_duration = ramp;
        }
        if let Some(takeover) = patch.takeover_duration {
            idle_config.takeover_duration = takeover;
        }
        if let Some(speed) = patch.auto_speed {
            idle_config.speed = speed;
        }
        if let Some(intensity) = patch.auto_intensity {
            idle_config.intensity = intensity;
        }
        self.idle_config = idle_config;
        match (patch.auto_demo, self.idle.as_mut()) {
            (Some(false), _) => self.idle = None,
            (Some(true), None) => self.idle = Some(IdleDriver::new(idle_config)),
            (_, Some(driver)) => driver.set_config(idle_config),
            _ => {}
        }
        Ok(())
    }

    /// Cells per surface pixel on the current grid.
    fn cells_per_pixel(&self) -> f32 {
        self.field.width() as f32 / self.surface_size.width.max(1) as f32
    }

    fn stir(&mut self, now: f32, pointer: renderer::PointerSample) {
        let grid = [self.field.width() as f32, self.field.height() as f32];
        let radius_cells = (self.cursor_size * self.cells_per_pixel()).max(1.0);

        if pointer.interacted {
            if let Some(idle) = self.idle.as_mut() {
                idle.note_input(now);
            }
            let impulse = [
                pointer.delta[0] * grid[0] * self.mouse_force,
                pointer.delta[1] * grid[1] * self.mouse_force,
            ];
            if impulse[0] != 0.0 || impulse[1] != 0.0 {
                self.field.splat(pointer.position, impulse, radius_cells);
            }
        }

        if let Some(idle) = self.idle.as_mut() {
            let strength = idle.update(now);
            let intensity = idle.config().intensity;
            let position = idle.wander(now);
            if strength > 0.0 {
                if let Some(last) = self.last_idle_pos {
                    let impulse = [
                        (position[0] - last[0]) * grid[0] * self.mouse_force * intensity * strength,
                        (position[1] - last[1]) * grid[1] * self.mouse_force * intensity * strength,
                    ];
                    self.field.splat(position, impulse, radius_cells);
                }
            }
            self.last_idle_pos = Some(position);
        }
    }

    /// Replays autonomous motion up to `seconds` so still evaluation shows a
    /// developed field instead of an empty one.
    fn prime(&mut self, seconds: f32) {
        let step = 1.0 / 30.0;
        let span = seconds.clamp(0.0, PRIME_LIMIT_SECONDS);
        let start = (seconds - span).max(0.0);
        let mut now = start;
        let params = self.params;
        while now < seconds {
            now += step;
            self.stir(now, idle_only_pointer());
            self.field.step(step, &params);
        }
    }
}

fn idle_only_pointer() -> renderer::PointerSample {
    renderer::PointerSample {
        position: renderer::POINTER_CENTER,
        delta: [0.0, 0.0],
        interacted: false,
    }
}

fn grid_dimensions(surface: PhysicalSize<u32>, scale: f32) -> (u32, u32) {
    let clamp = |value: f32| {
        (value.round() as u32).clamp(MIN_GRID_DIMENSION, MAX_GRID_DIMENSION)
    };
    (
        clamp(surface.width.max(1) as f32 * scale),
        clamp(surface.height.max(1) as f32 * scale),
    )
}

fn create_field_texture(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    sampler: &wgpu::Sampler,
    width: u32,
    height: u32,
) -> FieldTexture {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("ether velocity field"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rg32Float,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("ether field bind group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    });
    FieldTexture {
        texture,
        bind_group,
    }
}

impl EffectRenderer for Ether {
    fn label(&self) -> &'static str {
        "ether"
    }

    fn resize(&mut self, gpu: &GpuContext) {
        self.surface_size = gpu.size();
        let (grid_w, grid_h) = grid_dimensions(self.surface_size, self.grid_scale);
        if grid_w as usize != self.field.width() || grid_h as usize != self.field.height() {
            self.field.resize(grid_w as usize, grid_h as usize);
            self.field_texture = create_field_texture(
                &gpu.device,
                &self.texture_layout,
                &self.sampler,
                grid_w,
                grid_h,
            );
            self.last_idle_pos = None;
        }
        if let Err(err) = self.uniforms.set(
            "resolution",
            UniformValue::Vec4([
                self.surface_size.width.max(1) as f32,
                self.surface_size.height.max(1) as f32,
                grid_w as f32,
                grid_h as f32,
            ]),
        ) {
            tracing::error!(error = %err, "failed to update ether resolution");
        }
    }

    fn render(
        &mut self,
        gpu: &GpuContext,
        frame: &FrameContext,
        encoder: &mut wgpu::CommandEncoder,
        view: &wgpu::TextureView,
    ) -> Result<()> {
        let now = frame.time.seconds;
        if frame.time.delta <= 0.0 && frame.time.frame_index == 0 {
            // Fixed-timestamp evaluation (still frames, exports).
            if !self.primed {
                self.prime(now);
                self.primed = true;
            }
        } else {
            let dt = frame.time.delta.clamp(0.0, MAX_STEP_SECONDS);
            self.stir(now, frame.pointer);
            let params = self.params;
            self.field.step(dt, &params);
        }

        let texels = self.field.texels();
        gpu.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.field_texture.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(&texels),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(self.field.width() as u32 * 8),
                rows_per_image: Some(self.field.height() as u32),
            },
            wgpu::Extent3d {
                width: self.field.width() as u32,
                height: self.field.height() as u32,
                depth_or_array_layers: 1,
            },
        );
        self.uniforms.upload(&gpu.queue);

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("ether pass"),
            color_attachments: &[Some(gpu.color_attachment(view))],
            depth_stencil_attachment: None,
            occlusion_query_set: None,
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, self.uniforms.bind_group(), &[]);
        pass.set_bind_group(1, &self.field_texture.bind_group, &[]);
        pass.draw(0..3, 0..1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = EtherConfig::default();
        assert_eq!(config.mouse_force, 20.0);
        assert_eq!(config.cursor_size, 100.0);
        assert_eq!(config.iterations_poisson, 32);
        assert_eq!(config.auto_resume_delay, 2500.0);
        assert_eq!(config.auto_ramp_duration, 0.6);
        assert!(config.auto_demo);
        assert_eq!(config.colors[0], "#5227FF");
    }

    #[test]
    fn idle_config_converts_delay_to_seconds() {
        let idle = EtherConfig::default().idle_config();
        assert!((idle.resume_delay - 2.5).abs() < 1e-6);
        assert_eq!(idle.takeover_duration, 0.25);
    }

    #[test]
    fn grid_dimensions_scale_and_clamp() {
        let (w, h) = grid_dimensions(PhysicalSize::new(800, 600), 0.25);
        assert_eq!((w, h), (200, 150));

        let (w, h) = grid_dimensions(PhysicalSize::new(4000, 4000), 1.0);
        assert_eq!((w, h), (MAX_GRID_DIMENSION, MAX_GRID_DIMENSION));

        let (w, h) = grid_dimensions(PhysicalSize::new(10, 10), 0.1);
        assert_eq!((w, h), (MIN_GRID_DIMENSION, MIN_GRID_DIMENSION));
    }

    #[test]
    fn patch_overlays_only_present_fields() {
        let mut config = EtherConfig::default();
        let patch = EtherPatch {
            mouse_force: Some(5.0),
            auto_demo: Some(false),
            ..EtherPatch::default()
        };
        patch.apply_to(&mut config);
        assert_eq!(config.mouse_force, 5.0);
        assert!(!config.auto_demo);
        assert_eq!(config.cursor_size, 100.0);
    }
}

//! Effect instance driver: one mounted effect on one surface.
//!
//! The instance ties the lifecycle state machine, the GPU context, the frame
//! clock, and the pointer feed together. Hosts forward platform events into
//! it and call [`EffectInstance::render_frame`] once per refresh tick; the
//! instance yields between frames, so scheduling stays cooperative and
//! single-threaded.

use std::path::Path;

use anyhow::{anyhow, Result};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use winit::dpi::PhysicalSize;

use crate::events::{EventHub, EventKind};
use crate::gpu::context::{Antialiasing, GpuContext, GpuSupport};
use crate::gpu::export;
use crate::lifecycle::{Lifecycle, Phase};
use crate::pointer::{PointerFeed, PointerSample};
use crate::runtime::{time_source_for_policy, BoxedTimeSource, RenderPolicy, TimeSample};

/// Per-frame inputs handed to the effect.
#[derive(Debug, Clone, Copy)]
pub struct FrameContext {
    pub time: TimeSample,
    pub pointer: PointerSample,
}

/// What a `render_frame` call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    Rendered,
    /// Nothing was drawn: the instance is inert, torn down, or the surface
    /// asked us to retry next frame.
    Skipped,
}

/// One visual effect: owns its pipelines and buffers, records one render
/// pass per frame.
pub trait EffectRenderer {
    fn label(&self) -> &'static str;

    /// Called after the swapchain was reconfigured. Resolution-dependent
    /// uniforms update here; static geometry does not.
    fn resize(&mut self, gpu: &GpuContext);

    /// Records this frame's work into `encoder`, targeting `view`.
    fn render(
        &mut self,
        gpu: &GpuContext,
        frame: &FrameContext,
        encoder: &mut wgpu::CommandEncoder,
        view: &wgpu::TextureView,
    ) -> Result<()>;
}

/// Knobs shared by every effect mount.
pub struct MountOptions {
    pub antialiasing: Antialiasing,
    /// Flip pointer Y for effects with a bottom-up shader convention.
    pub invert_pointer_y: bool,
    pub policy: RenderPolicy,
}

impl Default for MountOptions {
    fn default() -> Self {
        Self {
            antialiasing: Antialiasing::default(),
            invert_pointer_y: false,
            policy: RenderPolicy::default(),
        }
    }
}

/// A mounted effect bound to one host surface.
pub struct EffectInstance<E: EffectRenderer> {
    lifecycle: Lifecycle<GpuContext>,
    effect: Option<E>,
    pointer: PointerFeed,
    time: BoxedTimeSource,
}

impl<E: EffectRenderer> EffectInstance<E> {
    /// Mounts an effect onto the surface behind `target`.
    ///
    /// A host without usable graphics support gets an inert instance back
    /// (`Ok`, never renders): the documented graceful degradation. Errors
    /// from the effect builder (shader compilation, above all) propagate,
    /// since those are repo bugs rather than host conditions.
    pub fn mount<T, F>(
        target: &T,
        size: PhysicalSize<u32>,
        hub: &EventHub,
        options: MountOptions,
        build: F,
    ) -> Result<Self>
    where
        T: HasDisplayHandle + HasWindowHandle,
        F: FnOnce(&GpuContext) -> Result<E>,
    {
        let mut lifecycle = Lifecycle::new();
        lifecycle.begin_mount();

        let pointer = PointerFeed::new(options.invert_pointer_y);
        let time = time_source_for_policy(&options.policy);

        let gpu = match GpuContext::create(target, size, options.antialiasing)? {
            GpuSupport::Available(gpu) => gpu,
            GpuSupport::Unavailable { reason } => {
                tracing::warn!(%reason, "graphics support unavailable; effect will not render");
                lifecycle.abandon_mount();
                return Ok(Self {
                    lifecycle,
                    effect: None,
                    pointer,
                    time,
                });
            }
        };

        let effect = build(&gpu)?;
        tracing::debug!(effect = effect.label(), "mounted effect");

        let listeners = vec![
            hub.attach(EventKind::Resize),
            hub.attach(EventKind::PointerMove),
        ];
        lifecycle.activate(gpu, listeners);

        Ok(Self {
            lifecycle,
            effect: Some(effect),
            pointer,
            time,
        })
    }

    pub fn phase(&self) -> Phase {
        self.lifecycle.phase()
    }

    /// False for inert (unsupported-environment) and unmounted instances.
    pub fn is_active(&self) -> bool {
        self.lifecycle.is_active()
    }

    pub fn gpu(&self) -> Option<&GpuContext> {
        self.lifecycle.resource()
    }

    /// Typed access to the mounted effect for live parameter updates.
    pub fn effect_mut(&mut self) -> Option<&mut E> {
        self.effect.as_mut()
    }

    /// Host resize notification.
    pub fn handle_resize(&mut self, new_size: PhysicalSize<u32>) {
        if !self.lifecycle.listener_attached(EventKind::Resize) {
            return;
        }
        if let Some(gpu) = self.lifecycle.resource_mut() {
            gpu.resize(new_size);
            if let Some(effect) = self.effect.as_mut() {
                effect.resize(gpu);
            }
        }
    }

    /// Host pointer-move notification, in surface pixels.
    pub fn handle_pointer(&mut self, x: f64, y: f64) {
        if !self.lifecycle.listener_attached(EventKind::PointerMove) {
            return;
        }
        if let Some(gpu) = self.lifecycle.resource() {
            self.pointer.record(x, y, gpu.size());
        }
    }

    /// Renders one frame. Recoverable surface hiccups skip the frame; the
    /// next refresh tick tries again.
    pub fn render_frame(&mut self) -> Result<FrameStatus> {
        if !self.lifecycle.frame_allowed() {
            return Ok(FrameStatus::Skipped);
        }
        let Some(effect) = self.effect.as_mut() else {
            return Ok(FrameStatus::Skipped);
        };
        let Some(gpu) = self.lifecycle.resource_mut() else {
            return Ok(FrameStatus::Skipped);
        };

        let surface_texture = match gpu.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                let size = gpu.size();
                gpu.resize(size);
                return Ok(FrameStatus::Skipped);
            }
            Err(wgpu::SurfaceError::Timeout) => {
                tracing::debug!("surface timeout; retrying next frame");
                return Ok(FrameStatus::Skipped);
            }
            Err(err) => return Err(anyhow!("surface error: {err:?}")),
        };

        let frame = FrameContext {
            time: self.time.sample(),
            pointer: self.pointer.sample(),
        };

        let gpu = &*gpu;
        let view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("driftfield frame encoder"),
            });
        effect.render(gpu, &frame, &mut encoder, &view)?;
        gpu.queue.submit(std::iter::once(encoder.finish()));
        surface_texture.present();
        Ok(FrameStatus::Rendered)
    }

    /// Evaluates the effect at a fixed timestamp into an offscreen target
    /// and writes the result as PNG. Returns `false` for inert instances.
    pub fn render_export(&mut self, time: f32, path: &Path) -> Result<bool> {
        if !self.lifecycle.frame_allowed() {
            return Ok(false);
        }
        let Some(effect) = self.effect.as_mut() else {
            return Ok(false);
        };
        let Some(gpu) = self.lifecycle.resource() else {
            return Ok(false);
        };

        let size = gpu.size();
        let target = export::create_export_target(&gpu.device, gpu.surface_format, size);
        let view = target.create_view(&wgpu::TextureViewDescriptor::default());
        let frame = FrameContext {
            time: TimeSample::new(time, 0.0, 0),
            pointer: self.pointer.sample(),
        };

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("driftfield export encoder"),
            });
        effect.render(gpu, &frame, &mut encoder, &view)?;
        gpu.queue.submit(std::iter::once(encoder.finish()));

        export::write_png(&gpu.device, &gpu.queue, &target, size, path)?;
        Ok(true)
    }

    /// Releases everything the mount acquired, synchronously and in order:
    /// frame gate, listeners, then the GPU context. Idempotent.
    pub fn unmount(&mut self) {
        let effect = self.effect.take();
        self.lifecycle.unmount(move |gpu| {
            // Effect resources (pipelines, buffers) go before the context
            // that created them.
            drop(effect);
            drop(gpu);
            tracing::debug!("released graphics context");
        });
    }
}

impl<E: EffectRenderer> Drop for EffectInstance<E> {
    fn drop(&mut self) {
        self.unmount();
    }
}

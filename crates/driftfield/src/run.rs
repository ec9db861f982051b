use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use tracing_subscriber::EnvFilter;
use winit::dpi::PhysicalSize;
use winit::event::{Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::window::WindowBuilder;

use effects::{Beams, BeamsPatch, Ether, EtherPatch, Vortex, VortexPatch};
use presets::{patch_from_assignments, PresetFile};
use renderer::{
    EffectInstance, EffectRenderer, EventHub, GpuContext, MountOptions, RenderPolicy,
};

use crate::cli::{Cli, Command, EffectArgs};

pub fn run(cli: Cli) -> Result<()> {
    init_tracing();

    match cli.command {
        Command::ListPresets { presets } => list_presets(presets.as_deref()),
        Command::Vortex(args) => {
            let file = load_presets(&args)?;
            let overrides: VortexPatch = patch_from_assignments(&args.set)?;
            let config = file.resolve_vortex(args.preset.as_deref(), &overrides)?;
            // The spin-gradient shader works in a bottom-up coordinate frame.
            preview(args, true, move |gpu| Vortex::new(gpu, &config))
        }
        Command::Beams(args) => {
            let file = load_presets(&args)?;
            let overrides: BeamsPatch = patch_from_assignments(&args.set)?;
            let config = file.resolve_beams(args.preset.as_deref(), &overrides)?;
            preview(args, false, move |gpu| Beams::new(gpu, &config))
        }
        Command::Ether(args) => {
            let file = load_presets(&args)?;
            let overrides: EtherPatch = patch_from_assignments(&args.set)?;
            let config = file.resolve_ether(args.preset.as_deref(), &overrides)?;
            preview(args, false, move |gpu| Ether::new(gpu, &config))
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn load_presets(args: &EffectArgs) -> Result<PresetFile> {
    match &args.presets {
        Some(path) => Ok(PresetFile::load(path)?),
        None => Ok(PresetFile::builtin()?),
    }
}

fn list_presets(path: Option<&Path>) -> Result<()> {
    let file = match path {
        Some(path) => PresetFile::load(path)?,
        None => PresetFile::builtin()?,
    };
    for (effect, name) in file.names() {
        println!("{effect:>7}  {name}");
    }
    Ok(())
}

fn render_policy(args: &EffectArgs) -> RenderPolicy {
    if let Some(path) = &args.export {
        return RenderPolicy::Export {
            time: args.still,
            path: path.clone(),
        };
    }
    if let Some(time) = args.still {
        return RenderPolicy::Still { time: Some(time) };
    }
    RenderPolicy::Animate {
        target_fps: args.fps.filter(|fps| *fps > 0.0),
    }
}

/// Opens the preview window, mounts the effect, and drives the event loop.
///
/// Events are delivered one by one; a redraw is requested whenever winit is
/// about to wait, so the display's refresh cadence paces the frames.
fn preview<E, F>(args: EffectArgs, invert_pointer_y: bool, build: F) -> Result<()>
where
    E: EffectRenderer + 'static,
    F: FnOnce(&GpuContext) -> Result<E>,
{
    let policy = render_policy(&args);
    let size = PhysicalSize::new(args.size.0, args.size.1);

    let event_loop = EventLoop::new().context("failed to initialize event loop")?;
    let window = WindowBuilder::new()
        .with_title("driftfield")
        .with_inner_size(size)
        .build(&event_loop)
        .context("failed to create preview window")?;

    let hub = EventHub::new();
    let options = MountOptions {
        antialiasing: args.antialias,
        invert_pointer_y,
        policy: policy.clone(),
    };
    let mut instance = EffectInstance::mount(&window, size, &hub, options, build)?;

    if !instance.is_active() {
        tracing::warn!("effect could not be mounted on this system; nothing to show");
        return Ok(());
    }

    if let RenderPolicy::Export { time, path } = &policy {
        let written = instance.render_export(time.unwrap_or(0.0), path)?;
        instance.unmount();
        if !written {
            return Err(anyhow!("export skipped: effect was not active"));
        }
        return Ok(());
    }

    let mut pacer = FramePacer::new(match &policy {
        RenderPolicy::Animate { target_fps } => *target_fps,
        _ => None,
    });

    window.request_redraw();
    event_loop
        .run(move |event, elwt| {
            // Drive redraws via vblank by waiting between events.
            elwt.set_control_flow(ControlFlow::Wait);

            match event {
                Event::WindowEvent { event, .. } => match event {
                    WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                        instance.unmount();
                        elwt.exit();
                    }
                    WindowEvent::CursorMoved { position, .. } => {
                        instance.handle_pointer(position.x, position.y);
                    }
                    WindowEvent::Resized(new_size) => {
                        instance.handle_resize(new_size);
                    }
                    WindowEvent::RedrawRequested => {
                        if pacer.should_render() {
                            if let Err(err) = instance.render_frame() {
                                tracing::error!(error = %err, "render failed; exiting");
                                instance.unmount();
                                elwt.exit();
                            }
                        }
                    }
                    _ => {}
                },
                Event::AboutToWait => {
                    // Schedule the next frame once winit is about to wait.
                    window.request_redraw();
                }
                _ => {}
            }
        })
        .map_err(|err| anyhow!("event loop error: {err}"))
}

/// Optional FPS cap using a saturating accumulator, so a long gap never
/// bursts into a run of catch-up frames.
struct FramePacer {
    interval: Option<Duration>,
    accumulator: Duration,
    last_tick: Option<Instant>,
}

impl FramePacer {
    fn new(target_fps: Option<f32>) -> Self {
        Self {
            interval: target_fps.map(|fps| Duration::from_secs_f32(1.0 / fps)),
            accumulator: Duration::ZERO,
            last_tick: None,
        }
    }

    fn should_render(&mut self) -> bool {
        let Some(interval) = self.interval else {
            return true;
        };
        let now = Instant::now();
        let delta = self
            .last_tick
            .map(|last| now.saturating_duration_since(last))
            .unwrap_or(interval);
        self.last_tick = Some(now);
        self.accumulator = self.accumulator.saturating_add(delta);
        if self.accumulator + Duration::from_micros(250) < interval {
            false
        } else {
            // Subtract only one interval to avoid bursts after long gaps.
            self.accumulator = self.accumulator.saturating_sub(interval);
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uncapped_pacer_always_renders() {
        let mut pacer = FramePacer::new(None);
        assert!(pacer.should_render());
        assert!(pacer.should_render());
    }

    #[test]
    fn export_flag_selects_export_policy() {
        let args = EffectArgs {
            preset: None,
            set: Vec::new(),
            presets: None,
            size: (640, 480),
            fps: None,
            antialias: renderer::Antialiasing::Auto,
            still: Some(2.5),
            export: Some("out.png".into()),
        };
        match render_policy(&args) {
            RenderPolicy::Export { time, path } => {
                assert_eq!(time, Some(2.5));
                assert_eq!(path, Path::new("out.png"));
            }
            other => panic!("unexpected policy: {other:?}"),
        }
    }

    #[test]
    fn zero_fps_means_uncapped() {
        let args = EffectArgs {
            preset: None,
            set: Vec::new(),
            presets: None,
            size: (640, 480),
            fps: Some(0.0),
            antialias: renderer::Antialiasing::Auto,
            still: None,
            export: None,
        };
        assert_eq!(
            render_policy(&args),
            RenderPolicy::Animate { target_fps: None }
        );
    }
}

//! Renderer crate for driftfield.
//!
//! The module owns everything an effect needs to get pixels on screen: the
//! GPU context bound to a host surface, per-frame timing, pointer sampling,
//! and the mount/unmount lifecycle that guarantees resources are released in
//! a fixed order. The overall flow is:
//!
//! ```text
//!   host (CLI / embedding app)
//!          │ MountOptions + effect builder
//!          ▼
//!   EffectInstance::mount ──▶ GpuContext ──▶ per-frame render_frame()
//!          │                        │
//!          │                        └─▶ UniformBuffer ─▶ GPU UBO
//!          └─▶ EventHub subscriptions (resize, pointer)
//! ```
//!
//! `EffectInstance` owns the lifecycle state machine; the effect itself is a
//! value implementing [`EffectRenderer`] that records one render pass per
//! frame. Hosts that lack a usable GPU adapter still get a mounted instance
//! that simply never renders, so a missing adapter degrades a decoration
//! instead of failing the application.

pub mod events;
pub mod fade;
pub mod gpu;
pub mod instance;
pub mod lifecycle;
pub mod pointer;
pub mod runtime;

pub use events::{EventHub, EventKind, Subscription};
pub use fade::{FadeCurve, FadeEnvelope};
pub use gpu::context::{parse_antialias, Antialiasing, GpuContext, GpuSupport};
pub use gpu::pipeline::{compile_fragment, compile_vertex, fullscreen_vertex_module};
pub use gpu::uniforms::{UniformBlock, UniformBuffer, UniformError, UniformValue};
pub use instance::{EffectInstance, EffectRenderer, FrameContext, FrameStatus, MountOptions};
pub use lifecycle::Phase;
pub use pointer::{PointerFeed, PointerSample, POINTER_CENTER};
pub use runtime::{
    time_source_for_policy, BoxedTimeSource, FixedTimeSource, RenderPolicy, SystemTimeSource,
    TimeSample, TimeSource,
};

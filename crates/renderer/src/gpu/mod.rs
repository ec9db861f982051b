//! GPU plumbing for effect surfaces.
//!
//! - `context` owns wgpu instance/device/surface wiring, probes adapter
//!   support at mount time, and rebuilds swapchain state on resize.
//! - `uniforms` packs named uniform sets to std140 and writes changes
//!   straight through the queue each frame.
//! - `pipeline` compiles in-repo GLSL with compile errors surfaced instead
//!   of swallowed.
//! - `export` reads a rendered frame back and writes it as a PNG.

pub mod context;
pub mod export;
pub mod pipeline;
pub mod uniforms;

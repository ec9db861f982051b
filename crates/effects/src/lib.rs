//! Effect library for driftfield.
//!
//! Three decorative background effects built on the `renderer` crate:
//!
//! - [`vortex`]: a full-screen spin-gradient field with three-color paint
//!   bands and pointer-driven spin offset.
//! - [`beams`]: parallel light-beam strips displaced by value noise and lit
//!   by one directional plus one ambient light.
//! - [`ether`]: a pointer-driven fluid field with autonomous idle motion.
//!
//! The shared building blocks live alongside them: hex color parsing
//! ([`color`]), deterministic 2D value noise mirrored between CPU and GLSL
//! ([`noise`]), anchor-based shader composition ([`compose`]), and the beam
//! strip mesh builder ([`geometry`]).

pub mod beams;
pub mod color;
pub mod compose;
pub mod ether;
pub mod geometry;
pub mod noise;
pub mod vortex;

pub use beams::{Beams, BeamsConfig, BeamsPatch};
pub use ether::{Ether, EtherConfig, EtherPatch};
pub use vortex::{Vortex, VortexConfig, VortexPatch};

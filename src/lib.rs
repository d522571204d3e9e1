//! Liquid - GPU stable-fluids ambient effect for Bevy.
//!
//! Exposes the solver, its CPU reference executor and the plugins for testing
//! and reuse.

pub mod config;
pub mod error;
pub mod palette;
pub mod quality;
pub mod render;
pub mod resources;
pub mod simulation;

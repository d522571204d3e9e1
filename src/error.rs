//! Error taxonomy for effect initialization.
//!
//! Every variant is fatal for the effect: nothing retries, the effect simply
//! stays absent for the lifetime of the app while the rest of it keeps running.

use crate::simulation::TextureSlot;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LiquidError {
    #[error("viewport {width}x{height} produces an empty simulation grid")]
    EmptyGrid { width: f32, height: f32 },

    #[error("field {slot:?} needs {width}x{height} texels but the device limit is {max}")]
    FieldTooLarge {
        slot: TextureSlot,
        width: u32,
        height: u32,
        max: u32,
    },

    #[error("program `{program}` failed to build: {diagnostic}")]
    ProgramBuild {
        program: &'static str,
        diagnostic: String,
    },

    /// A pass names a texture the store has not created
    #[error("pass reads or writes {slot:?}, which is not allocated")]
    FieldMissing { slot: TextureSlot },

    #[error("GPU context unavailable: {0}")]
    GpuUnavailable(String),
}

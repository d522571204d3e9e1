//! Field Store: owns every grid texture of the simulation.
//!
//! The store decides *what* exists (slots, sizes, clear values) and tracks
//! which half of each pair is authoritative; a [`FieldBackend`] decides *where*
//! the texels live (Bevy `Image` assets on the GPU, or in-memory fields).

use bevy::math::{Vec3, Vec4};
use bevy::prelude::Resource;

use super::field::{DoubleBuffer, FieldGrid, GridSize, TextureSlot};
use crate::error::LiquidError;
use crate::quality::QualityTier;

/// Host surface the fields are derived from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    /// Logical width in pixels
    pub width: f32,
    /// Logical height in pixels
    pub height: f32,
    pub device_pixel_ratio: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32, device_pixel_ratio: f32) -> Self {
        Self {
            width,
            height,
            device_pixel_ratio,
        }
    }
}

// ==================== Layout ====================

/// Grid sizes for one allocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldLayout {
    pub simulation: GridSize,
    /// Half resolution, present only when the tier enables bloom
    pub bloom: Option<GridSize>,
    /// Presentation image at DPR-scaled viewport resolution
    pub display: GridSize,
}

impl FieldLayout {
    pub fn for_viewport(viewport: Viewport, tier: &QualityTier) -> Result<Self, LiquidError> {
        let empty = || LiquidError::EmptyGrid {
            width: viewport.width,
            height: viewport.height,
        };
        if !(viewport.width.is_finite() && viewport.height.is_finite())
            || viewport.width < 1.0
            || viewport.height < 1.0
        {
            return Err(empty());
        }

        let dpr = if viewport.device_pixel_ratio.is_finite() && viewport.device_pixel_ratio > 0.0 {
            viewport.device_pixel_ratio.min(tier.device_pixel_ratio_cap)
        } else {
            1.0
        };

        let px_w = (viewport.width * dpr).floor();
        let px_h = (viewport.height * dpr).floor();
        let simulation = GridSize::new(
            ((px_w * tier.resolution_scale).floor() as u32).max(2),
            ((px_h * tier.resolution_scale).floor() as u32).max(2),
        );
        let display = GridSize::new((px_w as u32).max(1), (px_h as u32).max(1));

        Ok(Self {
            simulation,
            bloom: tier.bloom_enabled.then(|| simulation.halved()),
            display,
        })
    }

    /// Size of `slot`, or `None` if this layout does not allocate it.
    pub fn size_of(&self, slot: TextureSlot) -> Option<GridSize> {
        match slot.grid() {
            FieldGrid::Simulation => Some(self.simulation),
            FieldGrid::Bloom => self.bloom,
            FieldGrid::Display => Some(self.display),
        }
    }

    /// Every allocated slot with its size.
    pub fn slots(&self) -> impl Iterator<Item = (TextureSlot, GridSize)> + '_ {
        TextureSlot::ALL
            .into_iter()
            .filter_map(|slot| self.size_of(slot).map(|size| (slot, size)))
    }
}

// ==================== Simulation State ====================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BloomFields {
    pub pair: DoubleBuffer<TextureSlot>,
    /// Intermediate target of the horizontal blur
    pub temp: TextureSlot,
}

/// Logical simulation state: which physical slot plays which role right now.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SimulationFields {
    pub velocity: DoubleBuffer<TextureSlot>,
    pub dye: DoubleBuffer<TextureSlot>,
    pub pressure: DoubleBuffer<TextureSlot>,
    pub divergence: TextureSlot,
    pub curl: TextureSlot,
    pub bloom: Option<BloomFields>,
    pub display: TextureSlot,
}

impl SimulationFields {
    fn fresh(bloom_enabled: bool) -> Self {
        Self {
            velocity: DoubleBuffer::new(TextureSlot::VelocityA, TextureSlot::VelocityB),
            dye: DoubleBuffer::new(TextureSlot::DyeA, TextureSlot::DyeB),
            pressure: DoubleBuffer::new(TextureSlot::PressureA, TextureSlot::PressureB),
            divergence: TextureSlot::Divergence,
            curl: TextureSlot::Curl,
            bloom: bloom_enabled.then_some(BloomFields {
                pair: DoubleBuffer::new(TextureSlot::BloomA, TextureSlot::BloomB),
                temp: TextureSlot::BloomTemp,
            }),
            display: TextureSlot::Display,
        }
    }
}

/// Initial contents of a slot: dye starts at the base colour with zero alpha,
/// everything else at zero.
pub fn clear_value(slot: TextureSlot, base: Vec3) -> Vec4 {
    if slot.is_dye() {
        base.extend(0.0)
    } else {
        Vec4::ZERO
    }
}

// ==================== Backend ====================

/// Storage the store allocates into.
pub trait FieldBackend {
    /// Largest texture edge the backend can create.
    fn max_dimension(&self) -> u32;

    /// Drop every texture this backend holds.
    fn release_all(&mut self);

    /// Create `slot` at `size`, filled with `clear`.
    fn create(&mut self, slot: TextureSlot, size: GridSize, clear: Vec4) -> Result<(), LiquidError>;
}

// ==================== Store ====================

#[derive(Resource, Debug, Default)]
pub struct FieldStore {
    layout: Option<FieldLayout>,
    fields: Option<SimulationFields>,
    generation: u64,
}

impl FieldStore {
    /// (Re)allocate every field for `viewport`.
    ///
    /// Previous resources are released first. Dye is seeded with `base`. On
    /// failure the backend is left empty and the store holds nothing.
    pub fn allocate(
        &mut self,
        backend: &mut impl FieldBackend,
        viewport: Viewport,
        tier: &QualityTier,
        base: Vec3,
    ) -> Result<&SimulationFields, LiquidError> {
        self.release(backend);

        let layout = FieldLayout::for_viewport(viewport, tier)?;
        let max = backend.max_dimension();
        for (slot, size) in layout.slots() {
            let result = if size.width > max || size.height > max {
                Err(LiquidError::FieldTooLarge {
                    slot,
                    width: size.width,
                    height: size.height,
                    max,
                })
            } else {
                backend.create(slot, size, clear_value(slot, base))
            };
            if let Err(err) = result {
                backend.release_all();
                return Err(err);
            }
        }

        self.generation += 1;
        self.layout = Some(layout);
        Ok(&*self.fields.insert(SimulationFields::fresh(layout.bloom.is_some())))
    }

    /// Release everything. Safe to call when nothing is allocated.
    pub fn release(&mut self, backend: &mut impl FieldBackend) {
        backend.release_all();
        self.layout = None;
        self.fields = None;
    }

    pub fn fields(&self) -> Option<&SimulationFields> {
        self.fields.as_ref()
    }

    pub fn fields_mut(&mut self) -> Option<&mut SimulationFields> {
        self.fields.as_mut()
    }

    pub fn layout(&self) -> Option<&FieldLayout> {
        self.layout.as_ref()
    }

    /// Number of successful allocations so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

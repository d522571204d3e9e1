//! Grid fields, their physical texture slots and the read/write double buffer.

use bevy::math::{IVec2, Vec2, Vec4};

// ==================== Grid Size ====================

/// Texel dimensions of one field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GridSize {
    pub width: u32,
    pub height: u32,
}

impl GridSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Size of one texel in uv units.
    pub fn texel(&self) -> [f32; 2] {
        [1.0 / self.width as f32, 1.0 / self.height as f32]
    }

    /// Width over height, used to keep splats round on non-square grids.
    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    /// Half resolution (never below one texel), used by the bloom fields.
    pub fn halved(&self) -> Self {
        Self::new((self.width / 2).max(1), (self.height / 2).max(1))
    }

    pub fn texel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Number of 8x8 workgroups needed to cover the grid.
    pub fn workgroups(&self, workgroup_size: u32) -> (u32, u32) {
        (
            self.width.div_ceil(workgroup_size),
            self.height.div_ceil(workgroup_size),
        )
    }
}

// ==================== Texture Slots ====================

/// Physical texture a field lives in.
///
/// Double-buffered quantities own two slots; which one is "read" is tracked by
/// [`DoubleBuffer`], never by the slot itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureSlot {
    VelocityA,
    VelocityB,
    DyeA,
    DyeB,
    PressureA,
    PressureB,
    Divergence,
    Curl,
    BloomA,
    BloomB,
    BloomTemp,
    Display,
}

/// Which grid a slot is sized against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldGrid {
    Simulation,
    Bloom,
    Display,
}

impl TextureSlot {
    pub const COUNT: usize = 12;

    pub const ALL: [TextureSlot; Self::COUNT] = [
        TextureSlot::VelocityA,
        TextureSlot::VelocityB,
        TextureSlot::DyeA,
        TextureSlot::DyeB,
        TextureSlot::PressureA,
        TextureSlot::PressureB,
        TextureSlot::Divergence,
        TextureSlot::Curl,
        TextureSlot::BloomA,
        TextureSlot::BloomB,
        TextureSlot::BloomTemp,
        TextureSlot::Display,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn grid(self) -> FieldGrid {
        match self {
            TextureSlot::BloomA | TextureSlot::BloomB | TextureSlot::BloomTemp => FieldGrid::Bloom,
            TextureSlot::Display => FieldGrid::Display,
            _ => FieldGrid::Simulation,
        }
    }

    pub fn is_dye(self) -> bool {
        matches!(self, TextureSlot::DyeA | TextureSlot::DyeB)
    }

    pub fn label(self) -> &'static str {
        match self {
            TextureSlot::VelocityA => "liquid_velocity_a",
            TextureSlot::VelocityB => "liquid_velocity_b",
            TextureSlot::DyeA => "liquid_dye_a",
            TextureSlot::DyeB => "liquid_dye_b",
            TextureSlot::PressureA => "liquid_pressure_a",
            TextureSlot::PressureB => "liquid_pressure_b",
            TextureSlot::Divergence => "liquid_divergence",
            TextureSlot::Curl => "liquid_curl",
            TextureSlot::BloomA => "liquid_bloom_a",
            TextureSlot::BloomB => "liquid_bloom_b",
            TextureSlot::BloomTemp => "liquid_bloom_temp",
            TextureSlot::Display => "liquid_display",
        }
    }
}

// ==================== Double Buffer ====================

/// An ordered {read, write} pair with an O(1) swap.
///
/// Identities are only reachable through accessors, and [`DoubleBuffer::render`]
/// swaps as soon as the write has been recorded, so a caller cannot keep using
/// a pre-swap identity by accident.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DoubleBuffer<T: Copy> {
    read: T,
    write: T,
}

impl<T: Copy> DoubleBuffer<T> {
    pub fn new(read: T, write: T) -> Self {
        Self { read, write }
    }

    /// The authoritative current state.
    pub fn read(&self) -> T {
        self.read
    }

    /// The scratch target of the next pass.
    pub fn write(&self) -> T {
        self.write
    }

    pub fn swap(&mut self) {
        std::mem::swap(&mut self.read, &mut self.write);
    }

    /// Hands `(read, write)` to `f`, then swaps.
    pub fn render<R>(&mut self, f: impl FnOnce(T, T) -> R) -> R {
        let out = f(self.read, self.write);
        self.swap();
        out
    }
}

// ==================== Field ====================

/// In-memory texel grid with the same addressing rules as the GPU textures:
/// clamp-to-edge, row 0 at the bottom, texel centres at integer coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    size: GridSize,
    data: Vec<Vec4>,
}

impl Field {
    pub fn new(size: GridSize, clear: Vec4) -> Self {
        Self {
            size,
            data: vec![clear; size.texel_count()],
        }
    }

    pub fn size(&self) -> GridSize {
        self.size
    }

    pub fn texels(&self) -> &[Vec4] {
        &self.data
    }

    pub fn fill(&mut self, value: Vec4) {
        self.data.fill(value);
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        y as usize * self.size.width as usize + x as usize
    }

    pub fn get(&self, x: u32, y: u32) -> Vec4 {
        self.data[self.offset(x, y)]
    }

    pub fn set(&mut self, x: u32, y: u32, value: Vec4) {
        let i = self.offset(x, y);
        self.data[i] = value;
    }

    /// Texel fetch with clamp-to-edge addressing.
    pub fn load(&self, p: IVec2) -> Vec4 {
        let x = p.x.clamp(0, self.size.width as i32 - 1) as u32;
        let y = p.y.clamp(0, self.size.height as i32 - 1) as u32;
        self.get(x, y)
    }

    /// Bilinear lookup at a position in texel space (texel centres are integers).
    pub fn sample_linear(&self, st: Vec2) -> Vec4 {
        let base = st.floor();
        let f = st - base;
        let p = base.as_ivec2();
        let a = self.load(p);
        let b = self.load(p + IVec2::new(1, 0));
        let c = self.load(p + IVec2::new(0, 1));
        let d = self.load(p + IVec2::new(1, 1));
        mix4(mix4(a, b, f.x), mix4(c, d, f.x), f.y)
    }

    /// Bilinear lookup at a uv coordinate, for reads across resolutions.
    pub fn sample_linear_uv(&self, uv: Vec2) -> Vec4 {
        let dims = Vec2::new(self.size.width as f32, self.size.height as f32);
        self.sample_linear(uv * dims - Vec2::splat(0.5))
    }

    /// Sum of one channel over the whole grid.
    pub fn channel_sum(&self, channel: usize) -> f64 {
        self.data.iter().map(|t| t[channel] as f64).sum()
    }
}

/// `x·(1−a) + y·a`, exact at both endpoints like WGSL `mix`.
pub fn mix4(x: Vec4, y: Vec4, a: f32) -> Vec4 {
    x * (1.0 - a) + y * a
}

pub fn mix(x: f32, y: f32, a: f32) -> f32 {
    x * (1.0 - a) + y * a
}

pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_buffer_render_swaps() {
        let mut pair = DoubleBuffer::new(TextureSlot::DyeA, TextureSlot::DyeB);
        let written = pair.render(|read, write| {
            assert_eq!(read, TextureSlot::DyeA);
            write
        });
        assert_eq!(written, TextureSlot::DyeB);
        assert_eq!(pair.read(), TextureSlot::DyeB);
        assert_eq!(pair.write(), TextureSlot::DyeA);
    }

    #[test]
    fn load_clamps_to_edge() {
        let mut field = Field::new(GridSize::new(3, 2), Vec4::ZERO);
        field.set(0, 0, Vec4::splat(1.0));
        field.set(2, 1, Vec4::splat(2.0));
        assert_eq!(field.load(IVec2::new(-5, -5)), Vec4::splat(1.0));
        assert_eq!(field.load(IVec2::new(9, 9)), Vec4::splat(2.0));
    }

    #[test]
    fn linear_sample_at_texel_centre_is_exact() {
        let mut field = Field::new(GridSize::new(4, 4), Vec4::ZERO);
        field.set(1, 2, Vec4::new(0.3, 0.7, 0.1, 0.9));
        field.set(2, 2, Vec4::splat(5.0));
        assert_eq!(field.sample_linear(Vec2::new(1.0, 2.0)), Vec4::new(0.3, 0.7, 0.1, 0.9));
        let halfway = field.sample_linear(Vec2::new(1.5, 2.0));
        assert!((halfway.w - 2.95).abs() < 1e-6);
    }

    #[test]
    fn halved_never_reaches_zero() {
        assert_eq!(GridSize::new(3, 1).halved(), GridSize::new(1, 1));
        assert_eq!(GridSize::new(64, 36).halved(), GridSize::new(32, 18));
    }

    #[test]
    fn slot_indices_match_table() {
        for (i, slot) in TextureSlot::ALL.iter().enumerate() {
            assert_eq!(slot.index(), i);
        }
    }
}

/// Straight-alpha RGBA color with `f32` channels in `[0, 1]`.
///
/// Skeleton, slot and attachment tints arrive in this form from the animation core.
/// Premultiplication happens when vertex colors are written (see
/// [`premultiplied`](Self::premultiplied)), never on the stored value.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const WHITE: Color = Color::new(1.0, 1.0, 1.0, 1.0);
    pub const BLACK: Color = Color::new(0.0, 0.0, 0.0, 1.0);
    pub const RED: Color = Color::new(1.0, 0.0, 0.0, 1.0);
    pub const GREEN: Color = Color::new(0.0, 1.0, 0.0, 1.0);
    pub const BLUE: Color = Color::new(0.0, 0.0, 1.0, 1.0);
    pub const MAGENTA: Color = Color::new(1.0, 0.0, 1.0, 1.0);
    pub const TRANSPARENT: Color = Color::new(0.0, 0.0, 0.0, 0.0);

    #[inline]
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Creates a color from straight RGBA bytes (`0`–`255`).
    #[inline]
    pub fn from_rgba8(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self::new(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0, a as f32 / 255.0)
    }

    /// Component-wise product, used to combine skeleton/slot/attachment tints.
    #[inline]
    pub fn mul(self, other: Color) -> Self {
        Self::new(self.r * other.r, self.g * other.g, self.b * other.b, self.a * other.a)
    }

    #[inline]
    pub fn with_alpha(self, a: f32) -> Self {
        Self { a, ..self }
    }

    /// Returns the color with RGB multiplied by alpha.
    #[inline]
    pub fn premultiplied(self) -> Self {
        Self::new(self.r * self.a, self.g * self.a, self.b * self.a, self.a)
    }

    /// Clamps all channels to `[0, 1]`.
    #[inline]
    pub fn clamped(self) -> Self {
        Self::new(
            self.r.clamp(0.0, 1.0),
            self.g.clamp(0.0, 1.0),
            self.b.clamp(0.0, 1.0),
            self.a.clamp(0.0, 1.0),
        )
    }

    #[inline]
    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn premultiplied_scales_rgb_only() {
        let c = Color::new(1.0, 0.5, 0.25, 0.5).premultiplied();
        assert_eq!(c, Color::new(0.5, 0.25, 0.125, 0.5));
    }

    #[test]
    fn mul_is_component_wise() {
        let c = Color::new(0.5, 1.0, 0.0, 1.0).mul(Color::new(0.5, 0.5, 1.0, 0.5));
        assert_eq!(c, Color::new(0.25, 0.5, 0.0, 0.5));
    }

    #[test]
    fn from_rgba8_maps_full_range() {
        assert_eq!(Color::from_rgba8(255, 0, 255, 255), Color::MAGENTA);
    }

    #[test]
    fn clamped_limits_channels() {
        assert_eq!(Color::new(2.0, -1.0, 0.5, 1.5).clamped(), Color::new(1.0, 0.0, 0.5, 1.0));
    }
}

use crate::device::{BlendFactor, BlendFactors};

/// Slot blend modes of the animation format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendMode {
    #[default]
    Normal,
    Additive,
    Multiply,
    Screen,
}

impl BlendMode {
    /// Blend function for this mode. `premultiplied_alpha` selects the source
    /// color factor used for premultiplied textures.
    pub fn factors(self, premultiplied_alpha: bool) -> BlendFactors {
        use BlendFactor::*;

        let (src_color, src_color_pma, dst) = match self {
            BlendMode::Normal => (SrcAlpha, One, OneMinusSrcAlpha),
            BlendMode::Additive => (SrcAlpha, One, One),
            BlendMode::Multiply => (DstColor, DstColor, OneMinusSrcAlpha),
            BlendMode::Screen => (One, One, OneMinusSrcColor),
        };

        BlendFactors {
            src_color: if premultiplied_alpha { src_color_pma } else { src_color },
            src_alpha: One,
            dst,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normal_straight_alpha_is_the_default_state() {
        assert_eq!(BlendMode::Normal.factors(false), BlendFactors::DEFAULT);
    }

    #[test]
    fn premultiplied_alpha_only_changes_source_color() {
        let pma = BlendMode::Additive.factors(true);
        assert_eq!(pma.src_color, BlendFactor::One);
        assert_eq!(pma.src_alpha, BlendFactor::One);
        assert_eq!(pma.dst, BlendFactor::One);
        assert_eq!(BlendMode::Multiply.factors(true), BlendMode::Multiply.factors(false));
        assert_eq!(BlendMode::Screen.factors(false).dst, BlendFactor::OneMinusSrcColor);
    }
}

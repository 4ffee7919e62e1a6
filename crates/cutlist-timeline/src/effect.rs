//! Per-clip effects.
//!
//! The set of effects is closed: renderers match on [`EffectKind`]
//! exhaustively, so adding a kind is a compile-checked change.

use cutlist_core::RationalTime;
use serde::{Deserialize, Serialize};

/// What an effect does, with only the parameters needed to render it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EffectKind {
    /// Additive brightness, -1.0..=1.0.
    Brightness { value: f64 },
    /// Contrast multiplier, 1.0 is neutral.
    Contrast { value: f64 },
    /// Saturation multiplier, 1.0 is neutral.
    Saturation { value: f64 },
    /// Gaussian blur radius in pixels.
    Blur { radius: f64 },
    /// Unsharp-mask amount.
    Sharpen { amount: f64 },
    /// Loudness normalization (audio).
    Normalize,
    FadeIn { duration: RationalTime },
    FadeOut { duration: RationalTime },
}

impl EffectKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Brightness { .. } => "brightness",
            Self::Contrast { .. } => "contrast",
            Self::Saturation { .. } => "saturation",
            Self::Blur { .. } => "blur",
            Self::Sharpen { .. } => "sharpen",
            Self::Normalize => "normalize",
            Self::FadeIn { .. } => "fade_in",
            Self::FadeOut { .. } => "fade_out",
        }
    }

    /// Parameters must be finite; radii non-negative; fades non-empty.
    pub fn is_valid(&self) -> bool {
        match *self {
            Self::Brightness { value } | Self::Contrast { value } | Self::Saturation { value } => {
                value.is_finite()
            }
            Self::Blur { radius } => radius.is_finite() && radius >= 0.0,
            Self::Sharpen { amount } => amount.is_finite(),
            Self::Normalize => true,
            Self::FadeIn { duration } | Self::FadeOut { duration } => duration.is_positive(),
        }
    }
}

/// An effect instance attached to a clip.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Effect {
    pub kind: EffectKind,
    pub enabled: bool,
}

impl Effect {
    pub fn new(kind: EffectKind) -> Self {
        Self {
            kind,
            enabled: true,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn brightness(value: f64) -> Self {
        Self::new(EffectKind::Brightness { value })
    }

    pub fn blur(radius: f64) -> Self {
        Self::new(EffectKind::Blur { radius })
    }

    pub fn fade_in(duration: RationalTime) -> Self {
        Self::new(EffectKind::FadeIn { duration })
    }

    pub fn fade_out(duration: RationalTime) -> Self {
        Self::new(EffectKind::FadeOut { duration })
    }
}

//! Time representation for frame-accurate editing
//!
//! Uses rational numbers to avoid floating-point accumulation errors.
//! Clip spans, trims and speeds are all exact, so derived durations
//! (`(trim_end - trim_start) / speed`) never drift after splits or trims.

use num_rational::{Ratio, Rational64};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

/// Intermediate width for checked arithmetic; products of two `i64` fit.
type Wide = Ratio<i128>;

fn widen(value: Rational64) -> Wide {
    Wide::new(i128::from(*value.numer()), i128::from(*value.denom()))
}

fn narrow(value: Wide) -> Option<Rational64> {
    Some(Rational64::new_raw(
        i64::try_from(*value.numer()).ok()?,
        i64::try_from(*value.denom()).ok()?,
    ))
}

/// Reduced, positive-denominator form of `numer / denom`, or `None` when the
/// denominator is zero or the reduced value does not fit.
fn normalized(numer: i64, denom: i64) -> Option<Rational64> {
    if denom == 0 {
        return None;
    }
    narrow(Wide::new(i128::from(numer), i128::from(denom)))
}

fn deserialize_ratio<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Rational64, D::Error> {
    let (numer, denom) = <(i64, i64)>::deserialize(deserializer)?;
    normalized(numer, denom)
        .ok_or_else(|| D::Error::custom(format!("invalid rational [{numer}, {denom}]")))
}

/// A rational time value in seconds.
///
/// Deserialized values are reduced and rejected when the denominator is zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct RationalTime {
    value: Rational64,
}

impl<'de> Deserialize<'de> for RationalTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserialize_ratio(deserializer).map(|value| Self { value })
    }
}

impl RationalTime {
    /// Create a new RationalTime of `numerator / denominator` seconds.
    ///
    /// Panics if `denominator` is zero, like [`Rational64::new`].
    #[inline]
    pub fn new(numerator: i64, denominator: i64) -> Self {
        Self {
            value: Rational64::new(numerator, denominator),
        }
    }

    /// Whole seconds.
    #[inline]
    pub fn from_secs(seconds: i64) -> Self {
        Self {
            value: Rational64::from_integer(seconds),
        }
    }

    /// Convert to seconds as f64.
    #[inline]
    pub fn to_seconds_f64(self) -> f64 {
        *self.value.numer() as f64 / *self.value.denom() as f64
    }

    /// Zero time constant.
    pub const ZERO: Self = Self {
        value: Rational64::new_raw(0, 1),
    };

    #[inline]
    pub fn is_negative(self) -> bool {
        self < Self::ZERO
    }

    #[inline]
    pub fn is_positive(self) -> bool {
        self > Self::ZERO
    }

    /// Source time consumed when this much timeline time plays at `speed`.
    #[inline]
    pub fn scaled_by(self, speed: PlaybackSpeed) -> Self {
        Self {
            value: self.value * speed.0,
        }
    }

    /// Timeline time needed to play this much source time at `speed`.
    #[inline]
    pub fn slowed_by(self, speed: PlaybackSpeed) -> Self {
        Self {
            value: self.value / speed.0,
        }
    }

    /// `self + rhs`, or `None` if the exact result does not fit.
    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        narrow(widen(self.value) + widen(rhs.value)).map(|value| Self { value })
    }

    /// `self - rhs`, or `None` if the exact result does not fit.
    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        narrow(widen(self.value) - widen(rhs.value)).map(|value| Self { value })
    }

    /// [`RationalTime::slowed_by`] for untrusted values.
    pub fn checked_slowed_by(self, speed: PlaybackSpeed) -> Option<Self> {
        if !speed.is_valid() {
            return None;
        }
        narrow(widen(self.value) / widen(speed.0)).map(|value| Self { value })
    }
}

impl Default for RationalTime {
    fn default() -> Self {
        Self::ZERO
    }
}

impl Add for RationalTime {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self {
            value: self.value + rhs.value,
        }
    }
}

impl Sub for RationalTime {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self {
            value: self.value - rhs.value,
        }
    }
}

impl fmt::Display for RationalTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}s", self.to_seconds_f64())
    }
}

/// Playback speed multiplier, always strictly positive.
///
/// `2` plays the source twice as fast (half the timeline duration).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct PlaybackSpeed(Rational64);

impl<'de> Deserialize<'de> for PlaybackSpeed {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserialize_ratio(deserializer).map(Self)
    }
}

impl PlaybackSpeed {
    /// Normal (1x) speed.
    pub const NORMAL: Self = Self(Rational64::new_raw(1, 1));

    /// Exact speed `numerator / denominator`; `None` unless strictly positive.
    pub fn new(numerator: i64, denominator: i64) -> Option<Self> {
        if denominator == 0 {
            return None;
        }
        let value = Rational64::new(numerator, denominator);
        (value > Rational64::from_integer(0)).then_some(Self(value))
    }

    /// Speed from a float, rounded to a thousandth.
    pub fn from_f64(speed: f64) -> Option<Self> {
        if !speed.is_finite() {
            return None;
        }
        Self::new((speed * 1000.0).round() as i64, 1000)
    }

    #[inline]
    pub fn to_f64(self) -> f64 {
        *self.0.numer() as f64 / *self.0.denom() as f64
    }

    #[inline]
    pub fn is_normal(self) -> bool {
        self.0 == Rational64::from_integer(1)
    }

    /// Deserialized values bypass [`PlaybackSpeed::new`], so documents re-check this.
    #[inline]
    pub fn is_valid(self) -> bool {
        self.0 > Rational64::from_integer(0)
    }
}

impl Default for PlaybackSpeed {
    fn default() -> Self {
        Self::NORMAL
    }
}

impl fmt::Display for PlaybackSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x", self.to_f64())
    }
}

/// Frame rate as a rational number (e.g., 30000/1001 for 29.97 fps).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameRate {
    /// Numerator (e.g., 30000)
    pub numerator: u32,
    /// Denominator (e.g., 1001)
    pub denominator: u32,
}

impl FrameRate {
    #[inline]
    pub const fn new(numerator: u32, denominator: u32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// Convert to frames per second as f64.
    #[inline]
    pub fn to_fps_f64(self) -> f64 {
        self.numerator as f64 / self.denominator as f64
    }

    /// A usable rate has a non-zero numerator and denominator.
    #[inline]
    pub fn is_positive(self) -> bool {
        self.numerator > 0 && self.denominator > 0
    }

    pub const FPS_24: Self = Self::new(24, 1);
    pub const FPS_29_97: Self = Self::new(30000, 1001);
    pub const FPS_30: Self = Self::new(30, 1);
}

impl Default for FrameRate {
    fn default() -> Self {
        Self::FPS_30
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fps = self.to_fps_f64();
        if (fps - fps.round()).abs() < 0.001 {
            write!(f, "{} fps", fps.round() as u32)
        } else {
            write!(f, "{:.3} fps", fps)
        }
    }
}

/// A time range with inclusive start and exclusive end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    /// Start time (inclusive)
    pub start: RationalTime,
    /// Duration of the range
    pub duration: RationalTime,
}

impl TimeRange {
    #[inline]
    pub fn new(start: RationalTime, duration: RationalTime) -> Self {
        Self { start, duration }
    }

    /// End time (exclusive).
    #[inline]
    pub fn end(self) -> RationalTime {
        self.start + self.duration
    }

    /// Check if a time is within this range.
    #[inline]
    pub fn contains(self, time: RationalTime) -> bool {
        time >= self.start && time < self.end()
    }

    /// Check if a time is strictly between start and end.
    #[inline]
    pub fn contains_interior(self, time: RationalTime) -> bool {
        time > self.start && time < self.end()
    }
}

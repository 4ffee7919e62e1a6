pub mod edit;
pub mod export;
pub mod info;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use cutlist_core::{CutlistError, FrameRate, InMemoryCatalog, MediaCatalog, PlaybackSpeed, RationalTime};
use cutlist_timeline::{EditSession, Timeline, TrackId};
use num_rational::Rational64;

/// Parse a time given as decimal seconds (`2.5`, `2.5s`) or an exact
/// fraction of seconds (`1001/30000`).
pub fn parse_time(s: &str) -> Result<RationalTime, String> {
    let value = parse_rational(s.trim().trim_end_matches('s'))?;
    Ok(RationalTime::new(*value.numer(), *value.denom()))
}

/// Parse a speed multiplier such as `2`, `0.5` or `3/2`.
pub fn parse_speed(s: &str) -> Result<PlaybackSpeed, String> {
    let value = parse_rational(s.trim().trim_end_matches('x'))?;
    PlaybackSpeed::new(*value.numer(), *value.denom())
        .ok_or_else(|| format!("speed must be positive, got {s}"))
}

/// Parse a frame rate such as `30`, `29.97` or `30000/1001`.
pub fn parse_frame_rate(s: &str) -> Result<FrameRate, String> {
    let value = parse_rational(s.trim())?;
    let numerator = u32::try_from(*value.numer()).map_err(|_| format!("invalid frame rate {s}"))?;
    let denominator = u32::try_from(*value.denom()).map_err(|_| format!("invalid frame rate {s}"))?;
    let rate = FrameRate::new(numerator, denominator);
    if !rate.is_positive() {
        return Err(format!("frame rate must be positive, got {s}"));
    }
    Ok(rate)
}

fn parse_rational(s: &str) -> Result<Rational64, String> {
    let invalid = || format!("invalid number {s:?}");
    if let Some((numer, denom)) = s.split_once('/') {
        let numer: i64 = numer.trim().parse().map_err(|_| invalid())?;
        let denom: i64 = denom.trim().parse().map_err(|_| invalid())?;
        if denom == 0 {
            return Err(format!("zero denominator in {s:?}"));
        }
        return Ok(Rational64::new(numer, denom));
    }

    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let (whole, frac) = digits.split_once('.').unwrap_or((digits, ""));
    if whole.is_empty() && frac.is_empty() {
        return Err(invalid());
    }
    if !whole.chars().chain(frac.chars()).all(|c| c.is_ascii_digit()) || frac.len() > 9 {
        return Err(invalid());
    }
    let scale = 10_i64.pow(frac.len() as u32);
    let whole: i64 = if whole.is_empty() { 0 } else { whole.parse().map_err(|_| invalid())? };
    let frac: i64 = if frac.is_empty() { 0 } else { frac.parse().map_err(|_| invalid())? };
    let numer = whole
        .checked_mul(scale)
        .and_then(|w| w.checked_add(frac))
        .ok_or_else(invalid)?;
    Ok(Rational64::new(if negative { -numer } else { numer }, scale))
}

/// Catalog from `--catalog`, or an empty one when none was given.
pub fn load_catalog(path: Option<&Path>) -> Result<Arc<dyn MediaCatalog>, CutlistError> {
    let catalog = match path {
        Some(path) => {
            let catalog = InMemoryCatalog::load_from_file(path)?;
            tracing::debug!(path = %path.display(), entries = catalog.len(), "Loaded media catalog");
            catalog
        }
        None => InMemoryCatalog::new(),
    };
    Ok(Arc::new(catalog))
}

pub fn open_session(edl: PathBuf, catalog: Option<&Path>) -> Result<EditSession, CutlistError> {
    let catalog = load_catalog(catalog)?;
    Ok(EditSession::open(edl, catalog)?)
}

/// Find a track by id or, failing that, by name.
pub fn resolve_track(timeline: &Timeline, key: &str) -> Result<TrackId, CutlistError> {
    if let Ok(id) = key.parse::<TrackId>() {
        if timeline.track(id).is_some() {
            return Ok(id);
        }
    }
    let mut matches = timeline.tracks().iter().filter(|t| t.name == key);
    match (matches.next(), matches.next()) {
        (Some(track), None) => Ok(track.id),
        (Some(_), Some(_)) => Err(CutlistError::AmbiguousTrack(key.to_string())),
        (None, _) => Err(CutlistError::UnknownTrack(key.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cutlist_core::{ErrorCategory, Resolution};
    use cutlist_timeline::TrackKind;

    #[test]
    fn test_parse_time_is_exact() {
        assert_eq!(parse_time("2.5").unwrap(), RationalTime::new(5, 2));
        assert_eq!(parse_time("2.5s").unwrap(), RationalTime::new(5, 2));
        assert_eq!(parse_time("1001/30000").unwrap(), RationalTime::new(1001, 30000));
        assert_eq!(parse_time("0.1").unwrap(), RationalTime::new(1, 10));
        assert_eq!(parse_time(".5").unwrap(), RationalTime::new(1, 2));
        assert_eq!(parse_time("-1").unwrap(), RationalTime::from_secs(-1));
    }

    #[test]
    fn test_parse_time_rejects_garbage() {
        assert!(parse_time("").is_err());
        assert!(parse_time("abc").is_err());
        assert!(parse_time("1/0").is_err());
        assert!(parse_time("1.2.3").is_err());
    }

    #[test]
    fn test_parse_speed() {
        assert_eq!(parse_speed("2x").unwrap(), PlaybackSpeed::new(2, 1).unwrap());
        assert_eq!(parse_speed("3/2").unwrap(), PlaybackSpeed::new(3, 2).unwrap());
        assert!(parse_speed("0").is_err());
        assert!(parse_speed("-1").is_err());
    }

    #[test]
    fn test_parse_frame_rate() {
        assert_eq!(parse_frame_rate("30").unwrap(), FrameRate::FPS_30);
        assert_eq!(parse_frame_rate("30000/1001").unwrap(), FrameRate::FPS_29_97);
        assert_eq!(parse_frame_rate("29.97").unwrap(), FrameRate::new(2997, 100));
        assert!(parse_frame_rate("0").is_err());
    }

    #[test]
    fn test_resolve_track_by_name_or_id() {
        let timeline =
            Timeline::with_default_tracks("t", Resolution::HD_1080, FrameRate::FPS_30).unwrap();
        let v1 = timeline.tracks()[0].id;
        assert_eq!(resolve_track(&timeline, "V1").unwrap(), v1);
        assert_eq!(resolve_track(&timeline, &v1.to_string()).unwrap(), v1);

        let err = resolve_track(&timeline, "V9").unwrap_err();
        assert!(matches!(err, CutlistError::UnknownTrack(ref key) if key == "V9"));
        assert_eq!(err.category(), ErrorCategory::NotFound);
    }

    #[test]
    fn test_resolve_track_rejects_ambiguous_name() {
        let mut timeline =
            Timeline::with_default_tracks("t", Resolution::HD_1080, FrameRate::FPS_30).unwrap();
        timeline.add_track(TrackKind::Video, "V1");
        let err = resolve_track(&timeline, "V1").unwrap_err();
        assert!(matches!(err, CutlistError::AmbiguousTrack(_)));
        assert_eq!(err.category(), ErrorCategory::Validation);
    }
}

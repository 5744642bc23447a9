use std::fmt;

use serde::{Serialize, Serializer};
use thiserror::Error;

/// Validation errors carry the exact text shown back to the requester, so the
/// messages stay free of trailing punctuation (the caller appends its own).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DurationError {
    #[error("the {0} parameter is mandatory")]
    MissingParameter(&'static str),
    #[error("duration should be a number or a duration string like \"01:02:03.123\"")]
    NotADuration,
    #[error("start time should be in the \"hh:mm:ss.sss\" format, e.g. \"00:12:30.456\"")]
    MalformedStart,
    #[error("span should be a numeric value")]
    NotNumeric,
    #[error("span should be greater than 0")]
    ZeroOrNegativeSpan,
    #[error("please give a start time within the duration of the video")]
    StartBeyondVideo,
}

pub type DurationResult<T> = Result<T, DurationError>;

/// A non-negative time offset with millisecond precision. The canonical text
/// form is `HH:MM:SS.mmm`, zero-padded; equivalent inputs (`"8"`, `"08"`,
/// `"0:08"`) normalize to the same value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClipDuration(u64);

impl ClipDuration {
    pub const ZERO: ClipDuration = ClipDuration(0);

    pub fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    pub fn from_secs_f64(seconds: f64) -> Self {
        Self((seconds * 1000.0).round() as u64)
    }

    pub fn as_millis(&self) -> u64 {
        self.0
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.0 as f64 / 1000.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn saturating_add(&self, other: ClipDuration) -> ClipDuration {
        ClipDuration(self.0.saturating_add(other.0))
    }

    /// Parses either plain decimal seconds (`"8"`, `"12.5"`) or a
    /// colon-delimited `[[HH:]MM:]SS[.mmm]` string. Any other shape, and any
    /// negative or non-finite number, is rejected. Formatting is a fixed
    /// point: `parse(x.to_string()) == x`.
    pub fn parse(raw: &str) -> DurationResult<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(DurationError::NotADuration);
        }

        if let Ok(seconds) = trimmed.parse::<f64>() {
            if !seconds.is_finite() || seconds < 0.0 {
                return Err(DurationError::NotADuration);
            }
            return Ok(Self::from_secs_f64(seconds));
        }

        if !trimmed.contains(':') {
            return Err(DurationError::NotADuration);
        }

        let (clock, fraction) = match trimmed.split_once('.') {
            Some((clock, fraction)) => (clock, Some(fraction)),
            None => (trimmed, None),
        };

        let millis = match fraction {
            None => 0,
            Some(digits) if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) => {
                return Err(DurationError::NotADuration);
            }
            Some(digits) => {
                // Pad or cut to exactly three fractional digits.
                let mut padded: String = digits.chars().take(3).collect();
                while padded.len() < 3 {
                    padded.push('0');
                }
                padded.parse::<u64>().map_err(|_| DurationError::NotADuration)?
            }
        };

        let mut components = clock.split(':').rev();
        let mut seconds = 0u64;
        for (index, factor) in [1u64, 60, 3600].iter().enumerate() {
            match components.next() {
                Some(part) => {
                    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                        return Err(DurationError::NotADuration);
                    }
                    let value = part.parse::<u64>().map_err(|_| DurationError::NotADuration)?;
                    seconds += value * factor;
                }
                None if index == 0 => return Err(DurationError::NotADuration),
                None => break,
            }
        }
        if components.next().is_some() {
            return Err(DurationError::NotADuration);
        }

        Ok(Self(seconds * 1000 + millis))
    }
}

impl fmt::Display for ClipDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let millis = self.0 % 1000;
        let total_seconds = self.0 / 1000;
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;
        write!(f, "{hours:02}:{minutes:02}:{seconds:02}.{millis:03}")
    }
}

impl Serialize for ClipDuration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

/// Checks that a canonical start value is present and exactly the 12-char
/// `HH:MM:SS.mmm` shape. Runs after `parse`, so it also rejects offsets the
/// canonical form cannot carry (hours above 99).
pub fn validate_start(value: Option<&str>) -> DurationResult<()> {
    let value = value.ok_or(DurationError::MissingParameter("start"))?;
    let bytes = value.as_bytes();
    let well_formed = bytes.len() == 12
        && bytes[2] == b':'
        && bytes[5] == b':'
        && bytes[8] == b'.'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| matches!(i, 2 | 5 | 8) || b.is_ascii_digit());
    if well_formed {
        Ok(())
    } else {
        Err(DurationError::MalformedStart)
    }
}

/// Checks that a raw span value is present, numeric, and positive. The span
/// is always a relative length in seconds, never an absolute end time.
pub fn validate_span(value: Option<&str>) -> DurationResult<()> {
    let value = value.ok_or(DurationError::MissingParameter("span"))?;
    let seconds: f64 = value
        .trim()
        .parse()
        .map_err(|_| DurationError::NotNumeric)?;
    if !seconds.is_finite() {
        return Err(DurationError::NotNumeric);
    }
    if seconds <= 0.0 {
        return Err(DurationError::ZeroOrNegativeSpan);
    }
    Ok(())
}

/// A clip window checked against the source video's total duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NormalizedRange {
    pub start: ClipDuration,
    pub span: ClipDuration,
    pub total: ClipDuration,
}

impl NormalizedRange {
    /// End of the clip window, clamped to the video length when it is known.
    pub fn end(&self) -> ClipDuration {
        let end = self.start.saturating_add(self.span);
        if !self.total.is_zero() && end > self.total {
            self.total
        } else {
            end
        }
    }
}

/// Validates the window against the real video length and clamps the span to
/// the configured ceiling. A total of zero means the platform did not report
/// a duration, which disables the beyond-video check entirely. An over-long
/// span is clamped, never rejected.
pub fn normalize(
    total: ClipDuration,
    start: ClipDuration,
    span: ClipDuration,
    max_span: ClipDuration,
) -> DurationResult<NormalizedRange> {
    if !total.is_zero() && start >= total {
        return Err(DurationError::StartBeyondVideo);
    }
    let span = span.min(max_span);
    Ok(NormalizedRange { start, span, total })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX_SPAN: ClipDuration = ClipDuration(30_000);

    #[test]
    fn equivalent_inputs_share_one_canonical_form() {
        for raw in ["8", "08", "0:08", "00:00:08", "00:00:08.000"] {
            assert_eq!(ClipDuration::parse(raw).unwrap().to_string(), "00:00:08.000");
        }
        assert_eq!(
            ClipDuration::parse("1:14:08.123").unwrap().to_string(),
            "01:14:08.123"
        );
        assert_eq!(ClipDuration::parse("4:38").unwrap().to_string(), "00:04:38.000");
        assert_eq!(ClipDuration::parse("12.5").unwrap().as_millis(), 12_500);
    }

    #[test]
    fn formatting_is_a_fixed_point() {
        for raw in ["8", "0:08", "99:00:00", "1:2:3.5", "00:00:59.999"] {
            let once = ClipDuration::parse(raw).unwrap();
            let twice = ClipDuration::parse(&once.to_string()).unwrap();
            assert_eq!(once, twice, "parse({raw}) drifted on reparse");
        }
    }

    #[test]
    fn fractional_component_is_padded_to_three_digits() {
        assert_eq!(ClipDuration::parse("0:08.5").unwrap().as_millis(), 8_500);
        assert_eq!(ClipDuration::parse("0:08.050").unwrap().as_millis(), 8_050);
    }

    #[test]
    fn rejects_non_durations() {
        for raw in ["", "abc", "-5", "1:xx:00", "1:2:3:4", "00:00:08.", "inf"] {
            assert_eq!(ClipDuration::parse(raw), Err(DurationError::NotADuration), "{raw}");
        }
    }

    #[test]
    fn start_shape_is_enforced() {
        assert_eq!(
            validate_start(None),
            Err(DurationError::MissingParameter("start"))
        );
        assert_eq!(validate_start(Some("00:00:08.000")), Ok(()));
        for bad in ["8", "00:00:08", "00-00-08.000", "100:00:08.000"] {
            assert_eq!(validate_start(Some(bad)), Err(DurationError::MalformedStart), "{bad}");
        }
    }

    #[test]
    fn span_must_be_a_positive_number() {
        assert_eq!(
            validate_span(None),
            Err(DurationError::MissingParameter("span"))
        );
        assert_eq!(validate_span(Some("five")), Err(DurationError::NotNumeric));
        assert_eq!(validate_span(Some("0")), Err(DurationError::ZeroOrNegativeSpan));
        assert_eq!(validate_span(Some("-3")), Err(DurationError::ZeroOrNegativeSpan));
        assert_eq!(validate_span(Some("5")), Ok(()));
    }

    #[test]
    fn overlong_span_is_clamped_never_rejected() {
        let range = normalize(
            ClipDuration::parse("00:10:00").unwrap(),
            ClipDuration::parse("00:00:08").unwrap(),
            ClipDuration::parse("120").unwrap(),
            MAX_SPAN,
        )
        .unwrap();
        assert_eq!(range.span, MAX_SPAN);
    }

    #[test]
    fn start_beyond_known_total_is_rejected() {
        let err = normalize(
            ClipDuration::parse("00:01:00").unwrap(),
            ClipDuration::parse("00:02:00").unwrap(),
            ClipDuration::parse("5").unwrap(),
            MAX_SPAN,
        )
        .unwrap_err();
        assert_eq!(err, DurationError::StartBeyondVideo);
    }

    #[test]
    fn unknown_total_disables_the_bounds_check() {
        let range = normalize(
            ClipDuration::ZERO,
            ClipDuration::parse("99:00:00").unwrap(),
            ClipDuration::parse("5").unwrap(),
            MAX_SPAN,
        )
        .unwrap();
        assert_eq!(range.start.to_string(), "99:00:00.000");
    }

    #[test]
    fn end_is_clamped_to_the_video_length() {
        let range = normalize(
            ClipDuration::parse("00:00:12").unwrap(),
            ClipDuration::parse("00:00:10").unwrap(),
            ClipDuration::parse("5").unwrap(),
            MAX_SPAN,
        )
        .unwrap();
        assert_eq!(range.end().to_string(), "00:00:12.000");

        let open_ended = NormalizedRange {
            start: ClipDuration::parse("8").unwrap(),
            span: ClipDuration::parse("5").unwrap(),
            total: ClipDuration::ZERO,
        };
        assert_eq!(open_ended.end().to_string(), "00:00:13.000");
    }
}

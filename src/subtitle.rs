use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::Path;
use tokio::fs;
use tracing::{debug, info};

use crate::error::{Result, SubburnError};

/// A time-bounded span of speech with its text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedSegment {
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds
    pub end: f64,
    pub text: String,
}

impl TimedSegment {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self { start, end, text: text.into() }
    }
}

/// Serialize segments into SRT text.
///
/// Each segment becomes a numbered block (1-based, input order) with a timing
/// line and its trimmed text, followed by a blank line. Ordering and
/// positivity of the boundaries are not checked here.
pub fn encode_srt(segments: &[TimedSegment]) -> String {
    let mut srt = String::new();

    for (index, segment) in segments.iter().enumerate() {
        // Writing into a String cannot fail.
        let _ = write!(
            srt,
            "{}\n{} --> {}\n{}\n\n",
            index + 1,
            format_srt_time(segment.start),
            format_srt_time(segment.end),
            segment.text.trim()
        );
    }

    srt
}

/// Format seconds as `HH:MM:SS,mmm`.
///
/// Milliseconds are truncated from the fractional part, so 59.999 never rolls
/// over to 60. Hours are not wrapped. Negative or non-finite input is clamped
/// to zero.
pub fn format_srt_time(seconds: f64) -> String {
    let seconds = if seconds.is_finite() && seconds > 0.0 { seconds } else { 0.0 };

    let whole = seconds.floor();
    let millis = ((seconds - whole) * 1000.0).floor() as u64;
    let whole = whole as u64;

    let hours = whole / 3600;
    let minutes = (whole % 3600) / 60;
    let secs = whole % 60;

    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, secs, millis)
}

/// Encode segments and write them to `output_path`, replacing any prior file.
pub async fn write_srt<P: AsRef<Path>>(segments: &[TimedSegment], output_path: P) -> Result<()> {
    let output_path = output_path.as_ref();
    info!("Writing {} subtitle blocks to {}", segments.len(), output_path.display());

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await.map_err(|e| {
                SubburnError::Encoding(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }
    }

    fs::write(output_path, encode_srt(segments))
        .await
        .map_err(|e| SubburnError::Encoding(format!("Failed to write {}: {}", output_path.display(), e)))?;

    Ok(())
}

/// Parse SRT text back into segments.
pub fn parse_srt(content: &str) -> Result<Vec<TimedSegment>> {
    // Many editors prefix SRT files with a byte order mark
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let normalized = content.replace("\r\n", "\n");
    let mut segments = Vec::new();

    for block in normalized.split("\n\n") {
        let mut lines = block.lines().skip_while(|line| line.trim().is_empty());

        let Some(index_line) = lines.next() else {
            continue;
        };
        index_line
            .trim()
            .parse::<u64>()
            .map_err(|_| SubburnError::Encoding(format!("Invalid cue index '{}'", index_line.trim())))?;

        let timing = lines
            .next()
            .ok_or_else(|| SubburnError::Encoding(format!("Cue {} has no timing line", index_line.trim())))?;
        let (start, end) = timing
            .split_once("-->")
            .ok_or_else(|| SubburnError::Encoding(format!("Invalid timing line '{}'", timing)))?;

        let text = lines.collect::<Vec<_>>().join("\n");
        segments.push(TimedSegment {
            start: parse_srt_time(start.trim())?,
            end: parse_srt_time(end.trim())?,
            text,
        });
    }

    debug!("Parsed {} subtitle cues", segments.len());
    Ok(segments)
}

/// Parse `HH:MM:SS,mmm` into seconds.
pub fn parse_srt_time(value: &str) -> Result<f64> {
    let invalid = || SubburnError::Encoding(format!("Invalid SRT timestamp '{}'", value));

    let (clock, millis_text) = value.split_once(',').ok_or_else(invalid)?;
    if millis_text.len() != 3 {
        return Err(invalid());
    }
    let mut parts = clock.split(':');
    let (Some(h), Some(m), Some(s), None) = (parts.next(), parts.next(), parts.next(), parts.next()) else {
        return Err(invalid());
    };

    let hours: u64 = h.parse().map_err(|_| invalid())?;
    let minutes: u64 = m.parse().map_err(|_| invalid())?;
    let secs: u64 = s.parse().map_err(|_| invalid())?;
    let millis: u64 = millis_text.parse().map_err(|_| invalid())?;
    if minutes >= 60 || secs >= 60 {
        return Err(invalid());
    }

    let whole = hours
        .checked_mul(3600)
        .and_then(|h| h.checked_add(minutes * 60 + secs))
        .ok_or_else(invalid)?;
    Ok(whole as f64 + millis as f64 / 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_time_rejects_overflowing_hours() {
        let err = parse_srt_time("9999999999999999999:00:00,000").unwrap_err();
        assert!(matches!(err, SubburnError::Encoding(_)));
        assert_eq!(parse_srt_time("100:00:00,000").unwrap(), 360000.0);
    }

    #[test]
    fn test_parse_srt_skips_byte_order_mark() {
        let cues = parse_srt("\u{feff}1\n00:00:01,000 --> 00:00:02,000\nhi\n\n").unwrap();
        assert_eq!(cues, vec![TimedSegment::new(1.0, 2.0, "hi")]);
    }

    #[tokio::test]
    async fn test_write_srt_directory_failure_is_encoding_error() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where a parent directory is needed
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();

        let err = write_srt(&[TimedSegment::new(0.0, 1.0, "a")], blocker.join("sub/out.srt"))
            .await
            .unwrap_err();
        assert!(matches!(err, SubburnError::Encoding(_)));
        assert_eq!(err.stage(), Some(crate::error::Stage::Encoding));
    }

    #[test]
    fn test_format_srt_time() {
        assert_eq!(format_srt_time(0.0), "00:00:00,000");
        assert_eq!(format_srt_time(65.123), "00:01:05,123");
        assert_eq!(format_srt_time(3661.5), "01:01:01,500");
    }

    #[test]
    fn test_format_truncates_milliseconds() {
        assert_eq!(format_srt_time(59.999), "00:00:59,999");
        assert_eq!(format_srt_time(4.9999), "00:00:04,999");
    }

    #[test]
    fn test_format_does_not_wrap_hours() {
        assert_eq!(format_srt_time(100.0 * 3600.0 + 1.25), "100:00:01,250");
    }

    #[test]
    fn test_format_clamps_invalid_input() {
        assert_eq!(format_srt_time(-3.0), "00:00:00,000");
        assert_eq!(format_srt_time(f64::NAN), "00:00:00,000");
    }

    #[test]
    fn test_encode_empty() {
        assert_eq!(encode_srt(&[]), "");
    }

    #[test]
    fn test_encode_blocks() {
        let segments = vec![
            TimedSegment::new(0.0, 2.0, "Hi"),
            TimedSegment::new(2.0, 4.5, "there"),
        ];

        assert_eq!(
            encode_srt(&segments),
            "1\n00:00:00,000 --> 00:00:02,000\nHi\n\n2\n00:00:02,000 --> 00:00:04,500\nthere\n\n"
        );
    }

    #[test]
    fn test_encode_strips_whitespace() {
        let srt = encode_srt(&[TimedSegment::new(1.0, 2.0, "  hello world  \n")]);
        assert_eq!(srt.lines().nth(2), Some("hello world"));
    }

    #[test]
    fn test_encode_sequential_indices() {
        let segments: Vec<_> = (0..12)
            .map(|i| TimedSegment::new(i as f64, i as f64 + 0.5, "same"))
            .collect();
        let srt = encode_srt(&segments);

        let indices: Vec<u64> = srt
            .split("\n\n")
            .filter(|block| !block.is_empty())
            .map(|block| block.lines().next().unwrap().parse().unwrap())
            .collect();
        assert_eq!(indices, (1..=12).collect::<Vec<_>>());
    }

    #[test]
    fn test_encode_allows_zero_duration() {
        let srt = encode_srt(&[TimedSegment::new(3.0, 3.0, "blink")]);
        assert!(srt.contains("00:00:03,000 --> 00:00:03,000"));
    }

    #[test]
    fn test_encode_is_deterministic() {
        let segments = vec![
            TimedSegment::new(0.25, 1.75, "one"),
            TimedSegment::new(1.75, 9.0, " two "),
        ];
        assert_eq!(encode_srt(&segments), encode_srt(&segments));
    }

    #[test]
    fn test_segment_requires_text_field() {
        let err = serde_json::from_str::<TimedSegment>(r#"{"start": 0.0, "end": 1.0}"#).unwrap_err();
        assert!(err.to_string().contains("missing field `text`"));
    }

    #[test]
    fn test_parse_srt() {
        let content = "1\r\n00:00:01,000 --> 00:00:02,500\r\nfirst line\r\nsecond line\r\n\r\n2\r\n01:00:00,250 --> 01:00:01,000\r\nlast\r\n";
        let segments = parse_srt(content).unwrap();

        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "first line\nsecond line");
        assert_eq!(segments[0].end, 2.5);
        assert_eq!(segments[1].start, 3600.25);
    }

    #[test]
    fn test_parse_rejects_bad_timing() {
        assert!(parse_srt("1\n00:00:01.000 --> 00:00:02,000\nx\n").is_err());
        assert!(parse_srt("1\nnot a timing line\nx\n").is_err());
        assert!(parse_srt("one\n00:00:01,000 --> 00:00:02,000\nx\n").is_err());
    }

    #[tokio::test]
    async fn test_write_srt_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.srt");

        write_srt(&[TimedSegment::new(0.0, 1.0, "old")], &path).await.unwrap();
        write_srt(&[TimedSegment::new(0.0, 1.0, "new")], &path).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "1\n00:00:00,000 --> 00:00:01,000\nnew\n\n");
    }
}

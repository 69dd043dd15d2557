//! Conversion between SRT timestamps and seconds.

use crate::error::{Error, Result};
use regex::Regex;
use std::sync::OnceLock;

fn timestamp_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\d{1,2}):(\d{2}):(\d{2})[,.](\d{3})$").expect("timestamp pattern is valid")
    })
}

/// Parse `H[H]:MM:SS,mmm` (or with a dot before the milliseconds) into seconds.
pub fn parse(text: &str) -> Result<f64> {
    let text = text.trim();
    let caps = timestamp_re()
        .captures(text)
        .ok_or_else(|| Error::Format(text.to_string()))?;
    let field = |i: usize| -> Result<u64> {
        caps[i]
            .parse::<u64>()
            .map_err(|_| Error::Format(text.to_string()))
    };
    let (h, m, s, ms) = (field(1)?, field(2)?, field(3)?, field(4)?);
    if m >= 60 || s >= 60 {
        return Err(Error::Format(text.to_string()));
    }
    let total_ms = ((h * 60 + m) * 60 + s) * 1000 + ms;
    Ok(total_ms as f64 / 1000.0)
}

/// Format seconds as `HH:MM:SS,mmm`, rounded to the nearest millisecond.
pub fn format(seconds: f64) -> String {
    let total_ms = if seconds.is_finite() && seconds > 0.0 {
        (seconds * 1000.0).round() as u64
    } else {
        0
    };
    let h = total_ms / 3_600_000;
    let m = (total_ms % 3_600_000) / 60_000;
    let s = (total_ms % 60_000) / 1000;
    let ms = total_ms % 1000;
    format!("{h:02}:{m:02}:{s:02},{ms:03}")
}

/// Split a boundary line like `00:00:01,000 --> 00:00:02,000` into seconds.
pub(crate) fn parse_range(line: &str) -> Result<(f64, f64)> {
    let (start, end) = line
        .split_once("-->")
        .ok_or_else(|| Error::Format(line.trim().to_string()))?;
    // Some encoders append positioning hints after the end stamp.
    let end = end.split_whitespace().next().unwrap_or("");
    Ok((parse(start)?, parse(end)?))
}

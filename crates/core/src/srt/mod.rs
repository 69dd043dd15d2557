//! This module is responsible for SRT parsing and serialization.
//! It turns loosely formatted subtitle text into segments and writes the
//! canonical form back out.

pub mod timecode;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Key used to refer to a segment. Not guaranteed unique by the parser.
pub type SegmentId = u32;

/// One subtitle entry: a time interval plus its text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub id: SegmentId,
    pub start_time: f64,
    pub end_time: f64,
    pub text: String,
    #[serde(default)]
    pub starred: bool,
}

impl Segment {
    pub fn new(id: SegmentId, start_time: f64, end_time: f64, text: impl Into<String>) -> Self {
        Self {
            id,
            start_time,
            end_time,
            text: text.into(),
            starred: false,
        }
    }

    /// Length of the segment in seconds; negative spans count as zero.
    pub fn duration(&self) -> f64 {
        (self.end_time - self.start_time).max(0.0)
    }
}

const ARROW: &str = "-->";

/// Parse a subtitle document into segments.
/// Malformed blocks are skipped; only a document with no usable block fails.
pub fn decode(document: &str) -> Result<Vec<Segment>> {
    trace!("decode(len={})", document.len());
    let normalized = document.replace("\r\n", "\n").replace('\r', "\n");
    let mut segments = Vec::new();
    let mut position: u32 = 0;
    for block in blocks(&normalized) {
        position += 1;
        match decode_block(&block, position) {
            Some(segment) => segments.push(segment),
            None => debug!("dropping malformed block {position}"),
        }
    }
    if segments.is_empty() {
        return Err(Error::Parse);
    }
    debug!("decoded {} segments from {position} blocks", segments.len());
    Ok(segments)
}

/// Group consecutive non-blank lines.
fn blocks(text: &str) -> Vec<Vec<&str>> {
    let mut out = Vec::new();
    let mut current = Vec::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

fn decode_block(lines: &[&str], position: u32) -> Option<Segment> {
    if lines.len() < 2 {
        return None;
    }
    let boundary = lines.iter().position(|l| l.contains(ARROW))?;
    let (start_time, end_time) = timecode::parse_range(lines[boundary]).ok()?;
    let id = boundary
        .checked_sub(1)
        .and_then(|i| lines[i].trim().parse::<SegmentId>().ok())
        .unwrap_or(position);
    let text = lines[boundary + 1..]
        .iter()
        .map(|l| l.trim())
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string();
    if text.is_empty() {
        return None;
    }
    Some(Segment::new(id, start_time, end_time, text))
}

/// Format segments back to SRT text, numbering them from 1.
pub fn encode(segments: &[Segment]) -> String {
    let mut out = String::new();
    for (i, segment) in segments.iter().enumerate() {
        out.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            i + 1,
            timecode::format(segment.start_time),
            timecode::format(segment.end_time),
            segment.text
        ));
    }
    out
}

/// Plain-text export: one segment per line.
pub fn export_text(segments: &[Segment]) -> String {
    segments
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

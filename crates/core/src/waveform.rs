//! Waveform envelope windowed around the current segment.
//! Audio decoding runs on a background task; the renderer only consumes the
//! result and throws away anything that belongs to a replaced resource.

use crate::srt::{Segment, SegmentId};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// Time span `[start, end)` covered by the drawing surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderWindow {
    pub start: f64,
    pub end: f64,
}

impl RenderWindow {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }

    /// Absolute time at `fraction` of the window, with `fraction` held to 0..1.
    pub fn time_at(&self, fraction: f64) -> f64 {
        let fraction = if fraction.is_finite() { fraction.clamp(0.0, 1.0) } else { 0.0 };
        self.start + fraction * self.duration()
    }

    /// Where `time` falls in the window as a 0..1 fraction, if inside.
    pub fn fraction_of(&self, time: f64) -> Option<f64> {
        let span = self.duration();
        if span <= 0.0 || time < self.start || time > self.end {
            return None;
        }
        Some((time - self.start) / span)
    }

    /// Pixel column for `time`, pinned to the surface edges.
    fn pinned_x(&self, time: f64, width: usize) -> f64 {
        let span = self.duration();
        if span <= 0.0 {
            return 0.0;
        }
        ((time - self.start) / span).clamp(0.0, 1.0) * width as f64
    }
}

/// Window spanning `min(count, total)` consecutive segments centered on
/// `current`, shifted inward at either end of the document.
pub fn render_window(segments: &[Segment], current: usize, count: usize) -> Option<RenderWindow> {
    if segments.is_empty() || count == 0 {
        return None;
    }
    let current = current.min(segments.len() - 1);
    let count = count.min(segments.len());
    let first = current.saturating_sub(count / 2).min(segments.len() - count);
    let last = first + count - 1;
    Some(RenderWindow::new(
        segments[first].start_time.max(0.0),
        segments[last].end_time,
    ))
}

/// Decoded mono audio.
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    pub sample_rate: u32,
    pub samples: Arc<[f32]>,
}

impl SampleBuffer {
    pub fn new(sample_rate: u32, samples: Vec<f32>) -> Self {
        Self {
            sample_rate,
            samples: samples.into(),
        }
    }

    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    fn sample_index(&self, time: f64) -> usize {
        let idx = (time.max(0.0) * self.sample_rate as f64).round();
        (idx as usize).min(self.samples.len())
    }
}

/// Per-column `(min, max)` of the samples inside `window`.
///
/// The window's sample range is split into `width` buckets of near-equal
/// size. Keeping both extremes stops short transients from vanishing when
/// many samples collapse into one pixel. Empty buckets yield `(0, 0)`.
pub fn envelope(buffer: &SampleBuffer, window: RenderWindow, width: usize) -> Vec<(f32, f32)> {
    let from = buffer.sample_index(window.start);
    let to = buffer.sample_index(window.end).max(from);
    let span = to - from;
    (0..width)
        .map(|col| {
            let lo = from + col * span / width;
            let hi = from + (col + 1) * span / width;
            let bucket = &buffer.samples[lo..hi];
            if bucket.is_empty() {
                return (0.0, 0.0);
            }
            bucket
                .iter()
                .fold((f32::INFINITY, f32::NEG_INFINITY), |(min, max), &s| {
                    (min.min(s), max.max(s))
                })
        })
        .collect()
}

/// Drawing target whose pixel width may change between frames.
pub trait Surface {
    /// Current width in pixels, measured at call time.
    fn width(&self) -> usize;
}

/// What the waveform should show besides the envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub window: RenderWindow,
    /// Every `(start, end)` pair of the canonical list.
    pub boundaries: Vec<(f64, f64)>,
    pub current: Option<SegmentId>,
    pub current_bounds: Option<(f64, f64)>,
    /// Provisional bounds while timing is being edited.
    pub provisional: Option<(f64, f64)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerStyle {
    /// Segment boundary.
    Dashed,
    /// Edge of the current segment.
    Solid,
    /// Draggable edge of a segment being edited.
    Handle,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Marker {
    pub x: f64,
    pub style: MarkerStyle,
}

/// Highlighted span in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Band {
    pub start_x: f64,
    pub end_x: f64,
    pub editable: bool,
}

/// One rendered waveform picture.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub window: RenderWindow,
    pub width: usize,
    pub columns: Vec<(f32, f32)>,
    pub markers: Vec<Marker>,
    pub band: Option<Band>,
}

impl Frame {
    fn x_of(&self, time: f64) -> Option<f64> {
        self.window
            .fraction_of(time)
            .map(|f| f * self.width as f64)
    }

    /// Pixel position of the playback cursor, hidden while editing timing.
    pub fn cursor_x(&self, time: f64) -> Option<f64> {
        if self.band.is_some_and(|b| b.editable) {
            return None;
        }
        self.x_of(time)
    }

    /// Text rendering for terminals.
    pub fn to_ascii(&self, height: usize, cursor: Option<f64>) -> String {
        if self.width == 0 {
            return String::new();
        }
        let height = height.max(2);
        let col_of = |x: f64| (x.floor() as usize).min(self.width.saturating_sub(1));
        let mut grid = vec![vec![' '; self.width]; height];
        if let Some(band) = self.band {
            for col in col_of(band.start_x)..=col_of(band.end_x) {
                for row in grid.iter_mut() {
                    row[col] = '.';
                }
            }
        }
        let step = 2.0 / height as f32;
        for (col, &(min, max)) in self.columns.iter().enumerate().take(self.width) {
            for (r, row) in grid.iter_mut().enumerate() {
                let hi = 1.0 - r as f32 * step;
                let lo = hi - step;
                if max >= lo && min <= hi {
                    row[col] = '#';
                }
            }
        }
        for marker in &self.markers {
            let ch = match marker.style {
                MarkerStyle::Dashed => ':',
                MarkerStyle::Solid => '|',
                MarkerStyle::Handle => 'H',
            };
            let col = col_of(marker.x);
            for (r, row) in grid.iter_mut().enumerate() {
                if marker.style != MarkerStyle::Dashed || r % 2 == 0 {
                    row[col] = ch;
                }
            }
        }
        if let Some(x) = cursor {
            let col = col_of(x);
            for row in grid.iter_mut() {
                row[col] = '!';
            }
        }
        grid.into_iter()
            .map(|row| row.into_iter().collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Identity of a loaded audio resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceId(pub u64);

/// Raw audio bytes as handed over by the host.
#[derive(Debug, Clone)]
pub struct AudioResource {
    pub id: ResourceId,
    pub bytes: Arc<[u8]>,
}

/// Converts a raw audio resource into mono samples.
#[async_trait]
pub trait AudioDecoder: Send + Sync {
    async fn decode(&self, bytes: &[u8]) -> Result<SampleBuffer>;
}

pub type DecodeResult = (ResourceId, Result<SampleBuffer>);

/// Decode `resource` on its own task and report back through `tx`.
pub fn spawn_decode<D: AudioDecoder + 'static>(
    decoder: Arc<D>,
    resource: AudioResource,
    tx: mpsc::Sender<DecodeResult>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        trace!("decoding resource {:?} ({} bytes)", resource.id, resource.bytes.len());
        let res = decoder.decode(&resource.bytes).await;
        let _ = tx.send((resource.id, res)).await;
    })
}

/// Cache of decoded samples and the last frame's inputs.
#[derive(Debug, Default)]
pub struct WaveformRenderer {
    resource: Option<ResourceId>,
    buffer: Option<SampleBuffer>,
    columns: Option<(RenderWindow, usize, Vec<(f32, f32)>)>,
    last_scene: Option<Scene>,
    stale: bool,
}

impl WaveformRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expect samples for `resource`; anything decoded earlier is dropped.
    pub fn begin(&mut self, resource: ResourceId) {
        debug!("waiting for samples of {resource:?}");
        self.resource = Some(resource);
        self.buffer = None;
        self.columns = None;
        self.last_scene = None;
    }

    pub fn has_samples(&self) -> bool {
        self.buffer.is_some()
    }

    /// Take a finished decode. Returns false when it was discarded.
    pub fn accept(&mut self, resource: ResourceId, result: Result<SampleBuffer>) -> bool {
        if self.resource != Some(resource) {
            warn!("discarding samples for superseded resource {resource:?}");
            return false;
        }
        match result {
            Ok(buffer) => {
                info!(
                    "waveform ready: {:.1}s at {} Hz",
                    buffer.duration(),
                    buffer.sample_rate
                );
                self.buffer = Some(buffer);
                self.columns = None;
                self.stale = true;
                true
            }
            Err(err) => {
                warn!("error decoding audio data: {err:#}");
                false
            }
        }
    }

    /// Force the next `redraw` to produce a frame.
    pub fn invalidate(&mut self) {
        self.stale = true;
    }

    /// Produce a frame if anything it depends on changed since the last one.
    ///
    /// The surface width is measured on every call. The envelope is only
    /// recomputed when the samples, the window or the width changed.
    pub fn redraw(&mut self, surface: &dyn Surface, scene: &Scene) -> Option<Frame> {
        let width = surface.width();
        let buffer = self.buffer.as_ref()?;
        if width == 0 {
            return None;
        }
        let envelope_fresh = matches!(
            &self.columns,
            Some((window, w, _)) if *window == scene.window && *w == width
        );
        if envelope_fresh && !self.stale && self.last_scene.as_ref() == Some(scene) {
            return None;
        }
        if !envelope_fresh {
            trace!("recomputing envelope for {:?} at {width}px", scene.window);
            self.columns = Some((scene.window, width, envelope(buffer, scene.window, width)));
        }
        let columns = self
            .columns
            .as_ref()
            .map(|(_, _, c)| c.clone())
            .unwrap_or_default();
        self.stale = false;
        self.last_scene = Some(scene.clone());
        Some(build_frame(scene, width, columns))
    }
}

fn build_frame(scene: &Scene, width: usize, columns: Vec<(f32, f32)>) -> Frame {
    let mut frame = Frame {
        window: scene.window,
        width,
        columns,
        markers: Vec::new(),
        band: None,
    };
    let mut edges: Vec<f64> = scene
        .boundaries
        .iter()
        .flat_map(|&(a, b)| [a, b])
        .filter_map(|t| frame.x_of(t))
        .collect();
    edges.sort_by(f64::total_cmp);
    edges.dedup();
    frame.markers = edges
        .into_iter()
        .map(|x| Marker {
            x,
            style: MarkerStyle::Dashed,
        })
        .collect();
    let (bounds, editable) = match (scene.provisional, scene.current_bounds) {
        (Some(p), _) => (Some(p), true),
        (None, Some(c)) => (Some(c), false),
        (None, None) => (None, false),
    };
    if let Some((start, end)) = bounds {
        let px = |t: f64| frame.window.pinned_x(t, width);
        let band = Band {
            start_x: px(start),
            end_x: px(end),
            editable,
        };
        let style = if editable { MarkerStyle::Handle } else { MarkerStyle::Solid };
        frame.markers.push(Marker { x: band.start_x, style });
        frame.markers.push(Marker { x: band.end_x, style });
        frame.band = Some(band);
    }
    frame
}

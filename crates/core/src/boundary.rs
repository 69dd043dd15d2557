//! Interactive start/end adjustment for a single segment.
//!
//! The editor keeps provisional bounds of its own. Nothing reaches the
//! store until `commit` hands back a `BoundaryCommit`.

use crate::error::{Error, Result};
use crate::srt::SegmentId;
use crate::store::SegmentStore;
use crate::waveform::RenderWindow;
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handle {
    Start,
    End,
}

/// Bounds accepted by the user, ready to be written to the store.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundaryCommit {
    pub id: SegmentId,
    pub start_time: f64,
    pub end_time: f64,
}

#[derive(Debug, Clone)]
pub struct BoundaryEditor {
    id: SegmentId,
    start: f64,
    end: f64,
    lower: f64,
    upper: f64,
    window: RenderWindow,
    min_duration: f64,
}

impl BoundaryEditor {
    /// Start editing `id` with `window` as the drag surface.
    ///
    /// The start handle may not cross the previous segment's end and the end
    /// handle may not cross the next segment's start, or `media_end` for the
    /// last segment.
    pub fn enter(
        store: &SegmentStore,
        id: SegmentId,
        window: RenderWindow,
        media_end: f64,
        min_duration: f64,
    ) -> Result<Self> {
        trace!("enter(id={id}, media_end={media_end})");
        let idx = store.canonical_position(id).ok_or(Error::UnknownSegment(id))?;
        let segments = store.segments();
        let segment = &segments[idx];
        let lower = idx
            .checked_sub(1)
            .map(|i| segments[i].end_time)
            .unwrap_or(0.0);
        let upper = segments
            .get(idx + 1)
            .map(|s| s.start_time)
            .unwrap_or(media_end);
        Ok(Self {
            id,
            start: segment.start_time,
            end: segment.end_time,
            lower,
            upper,
            window,
            min_duration,
        })
    }

    pub fn segment_id(&self) -> SegmentId {
        self.id
    }

    /// Provisional `(start, end)`.
    pub fn bounds(&self) -> (f64, f64) {
        (self.start, self.end)
    }

    pub fn window(&self) -> RenderWindow {
        self.window
    }

    /// Move `handle` to `fraction` (0..1) of the render window.
    /// Returns the handle's time after clamping.
    pub fn drag(&mut self, handle: Handle, fraction: f64) -> f64 {
        let time = self.window.time_at(fraction);
        self.move_handle(handle, time)
    }

    /// Move `handle` by `delta` seconds, with the same limits as `drag`.
    pub fn nudge(&mut self, handle: Handle, delta: f64) -> f64 {
        let time = match handle {
            Handle::Start => self.start,
            Handle::End => self.end,
        } + delta;
        self.move_handle(handle, time)
    }

    fn move_handle(&mut self, handle: Handle, time: f64) -> f64 {
        let (lo, hi, slot) = match handle {
            Handle::Start => (self.lower, self.end - self.min_duration, &mut self.start),
            Handle::End => (self.start + self.min_duration, self.upper, &mut self.end),
        };
        // A segment already squeezed below the minimum cannot move this handle.
        if lo <= hi && time.is_finite() {
            *slot = time.clamp(lo, hi);
        }
        debug!("{handle:?} handle of segment {} at {:.3}", self.id, *slot);
        *slot
    }

    pub fn commit(self) -> BoundaryCommit {
        BoundaryCommit {
            id: self.id,
            start_time: self.start,
            end_time: self.end,
        }
    }

    pub fn cancel(self) {
        debug!("discarding timing edit of segment {}", self.id);
    }
}

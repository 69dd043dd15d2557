//! Wall-clock player used by the terminal front end.
//! It has no audio output; it only moves a playhead while "playing".

use anyhow::Result;
use async_trait::async_trait;
use lingua_core::Player;
use std::time::Instant;

/// How often the playhead is advanced and reported, about 60 times a second.
pub const TICK: std::time::Duration = std::time::Duration::from_millis(16);

/// One playhead update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    pub time: f64,
    /// The clock ran into the end of the media and stopped itself.
    pub ended: bool,
}

#[derive(Debug, Default)]
pub struct ClockPlayer {
    time: f64,
    playing: bool,
    duration: Option<f64>,
    last: Option<Instant>,
}

impl ClockPlayer {
    pub fn new(duration: Option<f64>) -> Self {
        Self {
            duration,
            ..Self::default()
        }
    }

    pub fn set_duration(&mut self, duration: f64) {
        self.duration = Some(duration);
    }

    /// Advance the playhead to `now`. Returns a tick while playing.
    pub fn tick(&mut self, now: Instant) -> Option<Tick> {
        if !self.playing {
            return None;
        }
        if let Some(last) = self.last {
            self.time += now.saturating_duration_since(last).as_secs_f64();
        }
        self.last = Some(now);
        let mut ended = false;
        if let Some(end) = self.duration {
            if self.time >= end {
                self.time = end;
                self.playing = false;
                self.last = None;
                ended = true;
            }
        }
        Some(Tick {
            time: self.time,
            ended,
        })
    }
}

#[async_trait]
impl Player for ClockPlayer {
    fn current_time(&self) -> f64 {
        self.time
    }

    fn seek(&mut self, seconds: f64) {
        let upper = self.duration.unwrap_or(f64::MAX);
        self.time = seconds.clamp(0.0, upper);
    }

    fn duration(&self) -> Option<f64> {
        self.duration
    }

    fn is_paused(&self) -> bool {
        !self.playing
    }

    async fn play(&mut self) -> Result<()> {
        self.playing = true;
        self.last = Some(Instant::now());
        Ok(())
    }

    fn pause(&mut self) {
        self.playing = false;
        self.last = None;
    }
}

//! Media playback primitive consumed by the navigator.

use anyhow::Result;
use async_trait::async_trait;

/// Transport surface of an external audio player.
///
/// `pause` always succeeds synchronously. `play` may be rejected by the
/// platform; callers swallow that rejection.
#[async_trait]
pub trait Player: Send {
    /// Current playback position in seconds.
    fn current_time(&self) -> f64;

    /// Seek to `seconds`.
    fn seek(&mut self, seconds: f64);

    /// Total length of the media, if known.
    fn duration(&self) -> Option<f64>;

    fn is_paused(&self) -> bool;

    async fn play(&mut self) -> Result<()>;

    fn pause(&mut self);
}

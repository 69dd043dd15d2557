//! Playback and selection state machine.
//!
//! The navigator owns the playback primitive and works on a `SegmentStore`
//! handed in by the caller, so the selection it moves is always the store's.

use crate::config::DEFAULT_REPLAY_THRESHOLD;
use crate::error::Result;
use crate::player::Player;
use crate::srt::SegmentId;
use crate::store::SegmentStore;
use serde::Serialize;
use tracing::{debug, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PlaybackState {
    /// No document loaded.
    Idle,
    /// A segment is selected and nothing has played since the load.
    Ready,
    Playing,
    Paused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Previous,
    Next,
}

/// Transport keys understood by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// Toggle play/pause.
    Space,
    /// Play the previous segment.
    Left,
    /// Play the next segment.
    Right,
    /// Move the selection up without playing.
    Up,
    /// Move the selection down without playing.
    Down,
    /// Replay the current segment.
    Enter,
}

pub struct Navigator<P: Player> {
    player: P,
    state: PlaybackState,
    progress: f64,
    replay_threshold: f64,
}

impl<P: Player> Navigator<P> {
    pub fn new(player: P) -> Self {
        Self::with_replay_threshold(player, DEFAULT_REPLAY_THRESHOLD)
    }

    pub fn with_replay_threshold(player: P, replay_threshold: f64) -> Self {
        Self {
            player,
            state: PlaybackState::Idle,
            progress: 0.0,
            replay_threshold,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Progress through the current segment, 0 to 100.
    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn player(&self) -> &P {
        &self.player
    }

    pub fn player_mut(&mut self) -> &mut P {
        &mut self.player
    }

    /// Stop playback and wait on the freshly loaded document.
    pub fn reset_for_load(&mut self) {
        trace!("reset_for_load");
        self.player.pause();
        self.state = PlaybackState::Ready;
        self.progress = 0.0;
    }

    /// Pause without changing the selection.
    pub fn pause(&mut self) {
        self.player.pause();
        if self.state == PlaybackState::Playing {
            self.state = PlaybackState::Paused;
        }
    }

    /// Select `id`, seek to its start and make sure the player is running.
    /// A player that is already playing is only re-seeked.
    pub async fn select_and_play(&mut self, store: &mut SegmentStore, id: SegmentId) -> Result<()> {
        trace!("select_and_play(id={id})");
        store.select(id)?;
        if let Some(segment) = store.current() {
            self.player.seek(segment.start_time);
        }
        self.progress = 0.0;
        if self.player.is_paused() {
            self.resume().await;
        }
        Ok(())
    }

    pub async fn toggle_play_pause(&mut self, store: &mut SegmentStore) -> Result<()> {
        trace!("toggle_play_pause(state={:?})", self.state);
        if self.state == PlaybackState::Idle {
            return Ok(());
        }
        let Some(current) = store.current().cloned() else {
            let first = store.active_view().get(0).map(|s| s.id);
            if let Some(id) = first {
                self.select_and_play(store, id).await?;
            }
            return Ok(());
        };
        if self.player.is_paused() {
            if self.player.current_time() >= current.end_time - self.replay_threshold {
                debug!("at end of segment {}, replaying", current.id);
                self.select_and_play(store, current.id).await?;
            } else {
                self.resume().await;
            }
        } else {
            self.pause();
        }
        Ok(())
    }

    /// Play the neighbor of the current segment in the active view.
    /// Does nothing at either end of the view.
    pub async fn advance(&mut self, store: &mut SegmentStore, direction: Direction) -> Result<()> {
        trace!("advance(direction={direction:?})");
        match neighbor(store, direction) {
            Some(id) => self.select_and_play(store, id).await,
            None => Ok(()),
        }
    }

    /// Move the selection like `advance` without touching playback.
    pub fn step(&mut self, store: &mut SegmentStore, direction: Direction) -> Result<()> {
        trace!("step(direction={direction:?})");
        match neighbor(store, direction) {
            Some(id) => store.select(id),
            None => Ok(()),
        }
    }

    /// Feed a time-update notification from the player.
    /// Pauses playback once the current segment's end is reached.
    pub fn on_time_update(&mut self, store: &SegmentStore, time: f64) -> f64 {
        let Some(segment) = store.current() else {
            return self.progress;
        };
        let span = segment.end_time - segment.start_time;
        self.progress = if span > 0.0 {
            ((time - segment.start_time) / span * 100.0).clamp(0.0, 100.0)
        } else {
            0.0
        };
        if self.state == PlaybackState::Playing && time >= segment.end_time {
            debug!("reached end of segment {} at {time:.3}", segment.id);
            self.pause();
        }
        self.progress
    }

    pub fn on_play(&mut self) {
        if self.state != PlaybackState::Idle {
            self.state = PlaybackState::Playing;
        }
    }

    pub fn on_pause(&mut self) {
        if self.state == PlaybackState::Playing {
            self.state = PlaybackState::Paused;
        }
    }

    async fn resume(&mut self) {
        match self.player.play().await {
            Ok(()) => self.state = PlaybackState::Playing,
            Err(err) => warn!("audio play failed: {err:#}"),
        }
    }
}

/// Id of the segment next to the current one in the active view.
///
/// When the current segment is not part of the view (it was unstarred while
/// filtered), the nearest visible segment in that direction is used.
fn neighbor(store: &SegmentStore, direction: Direction) -> Option<SegmentId> {
    let current = store.selected()?;
    let view = store.active_view();
    let pos = match view.position(current) {
        Some(pos) => match direction {
            Direction::Next => pos.checked_add(1).filter(|&p| p < view.len()),
            Direction::Previous => pos.checked_sub(1),
        },
        None => {
            let canonical = store.canonical_position(current)?;
            let mut visible = 0..view.len();
            match direction {
                Direction::Next => {
                    visible.find(|&p| view.canonical_index(p).is_some_and(|i| i > canonical))
                }
                Direction::Previous => {
                    visible.rfind(|&p| view.canonical_index(p).is_some_and(|i| i < canonical))
                }
            }
        }
    }?;
    view.get(pos).map(|s| s.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use async_trait::async_trait;

    #[derive(Default)]
    struct MockPlayer {
        time: f64,
        playing: bool,
        plays: u32,
        reject: bool,
    }

    #[async_trait]
    impl Player for MockPlayer {
        fn current_time(&self) -> f64 {
            self.time
        }

        fn seek(&mut self, seconds: f64) {
            self.time = seconds;
        }

        fn duration(&self) -> Option<f64> {
            Some(60.0)
        }

        fn is_paused(&self) -> bool {
            !self.playing
        }

        async fn play(&mut self) -> anyhow::Result<()> {
            self.plays += 1;
            if self.reject {
                return Err(anyhow!("NotAllowedError"));
            }
            self.playing = true;
            Ok(())
        }

        fn pause(&mut self) {
            self.playing = false;
        }
    }

    const DOC: &str = "1\n00:00:00,000 --> 00:00:03,000\nA\n\n\
                       2\n00:00:03,000 --> 00:00:06,000\nB\n\n\
                       3\n00:00:06,000 --> 00:00:09,000\nC\n\n";

    fn setup() -> (SegmentStore, Navigator<MockPlayer>) {
        let mut store = SegmentStore::new();
        store.load(DOC).unwrap();
        let mut nav = Navigator::new(MockPlayer::default());
        nav.reset_for_load();
        (store, nav)
    }

    #[tokio::test]
    async fn select_and_play_seeks_and_starts() {
        let (mut store, mut nav) = setup();
        nav.select_and_play(&mut store, 2).await.unwrap();
        assert_eq!(store.selected(), Some(2));
        assert_eq!(nav.player().time, 3.0);
        assert_eq!(nav.state(), PlaybackState::Playing);
        assert_eq!(nav.player().plays, 1);

        nav.select_and_play(&mut store, 3).await.unwrap();
        assert_eq!(nav.player().time, 6.0);
        assert_eq!(nav.player().plays, 1, "playing player is only re-seeked");
    }

    #[tokio::test]
    async fn toggle_near_end_replays_from_start() {
        let (mut store, mut nav) = setup();
        store.select(2).unwrap();
        nav.player_mut().time = 5.95;
        nav.toggle_play_pause(&mut store).await.unwrap();
        assert_eq!(nav.player().time, 3.0);
        assert_eq!(nav.state(), PlaybackState::Playing);
    }

    #[tokio::test]
    async fn toggle_mid_segment_resumes_then_pauses() {
        let (mut store, mut nav) = setup();
        store.select(2).unwrap();
        nav.player_mut().time = 4.0;
        nav.toggle_play_pause(&mut store).await.unwrap();
        assert_eq!(nav.player().time, 4.0);
        assert_eq!(nav.state(), PlaybackState::Playing);
        nav.toggle_play_pause(&mut store).await.unwrap();
        assert_eq!(nav.state(), PlaybackState::Paused);
        assert!(nav.player().is_paused());
    }

    #[tokio::test]
    async fn toggle_is_ignored_without_document() {
        let mut store = SegmentStore::new();
        let mut nav = Navigator::new(MockPlayer::default());
        nav.toggle_play_pause(&mut store).await.unwrap();
        assert_eq!(nav.state(), PlaybackState::Idle);
        assert_eq!(nav.player().plays, 0);
    }

    #[tokio::test]
    async fn advance_stops_at_the_ends() {
        let (mut store, mut nav) = setup();
        nav.advance(&mut store, Direction::Previous).await.unwrap();
        assert_eq!(store.selected(), Some(1));
        assert_eq!(nav.state(), PlaybackState::Ready);

        store.select(3).unwrap();
        nav.advance(&mut store, Direction::Next).await.unwrap();
        assert_eq!(store.selected(), Some(3));
        assert_eq!(nav.state(), PlaybackState::Ready);
        assert_eq!(nav.player().plays, 0);

        nav.advance(&mut store, Direction::Previous).await.unwrap();
        assert_eq!(store.selected(), Some(2));
        assert_eq!(nav.state(), PlaybackState::Playing);
    }

    #[tokio::test]
    async fn advance_walks_the_filtered_view() {
        let (mut store, mut nav) = setup();
        store.set_starred(1, true).unwrap();
        store.set_starred(3, true).unwrap();
        store.set_filter(true);
        nav.advance(&mut store, Direction::Next).await.unwrap();
        assert_eq!(store.selected(), Some(3));
    }

    #[tokio::test]
    async fn advance_from_hidden_segment_uses_nearest_visible() {
        let (mut store, mut nav) = setup();
        store.set_starred(1, true).unwrap();
        store.set_starred(2, true).unwrap();
        store.set_starred(3, true).unwrap();
        store.set_filter(true);
        store.select(2).unwrap();
        store.set_starred(2, false).unwrap();
        nav.step(&mut store, Direction::Previous).unwrap();
        assert_eq!(store.selected(), Some(1));
        store.select(2).unwrap();
        nav.advance(&mut store, Direction::Next).await.unwrap();
        assert_eq!(store.selected(), Some(3));
    }

    #[tokio::test]
    async fn time_update_pauses_at_segment_end() {
        let (mut store, mut nav) = setup();
        nav.select_and_play(&mut store, 1).await.unwrap();
        assert_eq!(nav.on_time_update(&store, 1.5), 50.0);
        assert_eq!(nav.state(), PlaybackState::Playing);
        assert_eq!(nav.on_time_update(&store, 3.0), 100.0);
        assert_eq!(nav.state(), PlaybackState::Paused);
        assert!(nav.player().is_paused());
        assert_eq!(nav.on_time_update(&store, -1.0), 0.0);
    }

    #[tokio::test]
    async fn zero_length_segment_has_no_progress() {
        let mut store = SegmentStore::new();
        store.load("00:00:01,000 --> 00:00:01,000\nflat\n").unwrap();
        let mut nav = Navigator::new(MockPlayer::default());
        nav.reset_for_load();
        assert_eq!(nav.on_time_update(&store, 1.0), 0.0);
    }

    #[test]
    fn player_notifications_follow_the_player() {
        let mut idle = Navigator::new(MockPlayer::default());
        idle.on_play();
        assert_eq!(idle.state(), PlaybackState::Idle);

        let (_store, mut nav) = setup();
        nav.on_pause();
        assert_eq!(nav.state(), PlaybackState::Ready);
        nav.on_play();
        assert_eq!(nav.state(), PlaybackState::Playing);
        nav.on_pause();
        assert_eq!(nav.state(), PlaybackState::Paused);
        nav.on_play();
        assert_eq!(nav.state(), PlaybackState::Playing);
    }

    #[tokio::test]
    async fn rejected_play_is_swallowed() {
        let (mut store, mut nav) = setup();
        nav.player_mut().reject = true;
        nav.select_and_play(&mut store, 2).await.unwrap();
        assert_eq!(store.selected(), Some(2));
        assert_eq!(nav.state(), PlaybackState::Ready);
        assert_eq!(nav.player().plays, 1);
    }
}

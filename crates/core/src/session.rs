//! A practice session: one document, one player and the edit modes on top.
//!
//! All state is held here explicitly and handed to the store and navigator
//! on each call, which keeps the filter snapshot and the selection in one
//! place.

use crate::boundary::{BoundaryCommit, BoundaryEditor, Handle};
use crate::config::PracticeConfig;
use crate::error::{Error, Result};
use crate::navigation::{Direction, Key, Navigator, PlaybackState};
use crate::player::Player;
use crate::srt::{self, Segment, SegmentId};
use crate::store::SegmentStore;
use crate::waveform::{render_window, RenderWindow, Scene};
use tracing::{info, trace, warn};

/// Called with the full segment list after a text or timing edit is saved.
pub type SaveCallback = Box<dyn FnMut(&[Segment]) + Send>;

struct TextDraft {
    id: SegmentId,
    text: String,
}

pub struct Session<P: Player> {
    config: PracticeConfig,
    store: SegmentStore,
    nav: Navigator<P>,
    boundary: Option<BoundaryEditor>,
    draft: Option<TextDraft>,
    on_save: Option<SaveCallback>,
}

impl<P: Player> Session<P> {
    pub fn new(player: P, config: PracticeConfig) -> Self {
        let nav = Navigator::with_replay_threshold(player, config.replay_threshold);
        Self {
            config,
            store: SegmentStore::new(),
            nav,
            boundary: None,
            draft: None,
            on_save: None,
        }
    }

    /// Register the save callback.
    pub fn on_save(&mut self, callback: impl FnMut(&[Segment]) + Send + 'static) {
        self.on_save = Some(Box::new(callback));
    }

    pub fn config(&self) -> &PracticeConfig {
        &self.config
    }

    pub fn store(&self) -> &SegmentStore {
        &self.store
    }

    pub fn navigator(&self) -> &Navigator<P> {
        &self.nav
    }

    pub fn navigator_mut(&mut self) -> &mut Navigator<P> {
        &mut self.nav
    }

    pub fn state(&self) -> PlaybackState {
        self.nav.state()
    }

    pub fn progress(&self) -> f64 {
        self.nav.progress()
    }

    pub fn selected(&self) -> Option<SegmentId> {
        self.store.selected()
    }

    /// Load a new document, dropping any edit in progress.
    /// A document that fails to parse leaves the session as it was.
    pub fn load(&mut self, document: &str) -> Result<()> {
        if let Err(err) = self.store.load(document) {
            warn!("subtitle parsing failed: {err}");
            return Err(err);
        }
        self.boundary = None;
        self.draft = None;
        self.nav.reset_for_load();
        Ok(())
    }

    pub fn is_editing_text(&self) -> bool {
        self.draft.is_some()
    }

    pub fn is_editing_timing(&self) -> bool {
        self.boundary.is_some()
    }

    /// Dispatch a transport key. Ignored while editing or with no document.
    pub async fn handle_key(&mut self, key: Key) -> Result<()> {
        trace!("handle_key(key={key:?})");
        if !self.store.is_loaded() || self.is_editing_text() || self.is_editing_timing() {
            return Ok(());
        }
        match key {
            Key::Space => self.toggle_play_pause().await,
            Key::Left => self.advance(Direction::Previous).await,
            Key::Right => self.advance(Direction::Next).await,
            Key::Up => self.step(Direction::Previous),
            Key::Down => self.step(Direction::Next),
            Key::Enter => match self.store.selected() {
                Some(id) => self.select_and_play(id).await,
                None => Ok(()),
            },
        }
    }

    pub async fn select_and_play(&mut self, id: SegmentId) -> Result<()> {
        self.nav.select_and_play(&mut self.store, id).await
    }

    pub async fn toggle_play_pause(&mut self) -> Result<()> {
        self.nav.toggle_play_pause(&mut self.store).await
    }

    pub async fn advance(&mut self, direction: Direction) -> Result<()> {
        self.nav.advance(&mut self.store, direction).await
    }

    pub fn step(&mut self, direction: Direction) -> Result<()> {
        self.nav.step(&mut self.store, direction)
    }

    pub fn on_time_update(&mut self, time: f64) -> f64 {
        self.nav.on_time_update(&self.store, time)
    }

    /// The player started on its own.
    pub fn on_play(&mut self) {
        self.nav.on_play();
    }

    /// The player stopped on its own, e.g. at the end of the media.
    pub fn on_pause(&mut self) {
        self.nav.on_pause();
    }

    pub fn toggle_star(&mut self, id: SegmentId) -> Result<bool> {
        self.store.toggle_star(id)
    }

    pub fn set_filter(&mut self, on: bool) {
        self.store.set_filter(on);
    }

    /// Start editing the text of `id`, abandoning any timing edit.
    pub fn begin_text_edit(&mut self, id: SegmentId) -> Result<()> {
        let text = self
            .store
            .segment(id)
            .ok_or(Error::UnknownSegment(id))?
            .text
            .clone();
        if let Some(editor) = self.boundary.take() {
            editor.cancel();
        }
        self.draft = Some(TextDraft { id, text });
        Ok(())
    }

    pub fn text_draft(&self) -> Option<&str> {
        self.draft.as_ref().map(|d| d.text.as_str())
    }

    pub fn update_text_draft(&mut self, text: impl Into<String>) {
        if let Some(draft) = self.draft.as_mut() {
            draft.text = text.into();
        }
    }

    /// Save the draft. An empty draft is rejected and stays open.
    pub fn commit_text_edit(&mut self) -> Result<()> {
        let Some(draft) = self.draft.as_ref() else {
            return Ok(());
        };
        self.store.set_text(draft.id, &draft.text)?;
        info!("sentence {} saved", draft.id);
        self.draft = None;
        self.notify_save();
        Ok(())
    }

    pub fn cancel_text_edit(&mut self) {
        self.draft = None;
    }

    /// Start adjusting the timing of the current segment.
    /// Playback is paused for the duration of the edit.
    pub fn begin_boundary_edit(&mut self) -> Result<()> {
        let id = self.store.selected().ok_or(Error::NoDocument)?;
        let window = self.render_window().ok_or(Error::NoDocument)?;
        let media_end = self
            .nav
            .player()
            .duration()
            .filter(|d| d.is_finite() && *d > 0.0)
            .or_else(|| self.store.segments().last().map(|s| s.end_time))
            .unwrap_or(window.end);
        let editor =
            BoundaryEditor::enter(&self.store, id, window, media_end, self.config.min_duration)?;
        self.nav.pause();
        self.draft = None;
        self.boundary = Some(editor);
        Ok(())
    }

    pub fn boundary_editor(&self) -> Option<&BoundaryEditor> {
        self.boundary.as_ref()
    }

    pub fn drag_boundary(&mut self, handle: Handle, fraction: f64) -> Option<f64> {
        self.boundary.as_mut().map(|ed| ed.drag(handle, fraction))
    }

    pub fn nudge_boundary(&mut self, handle: Handle, delta: f64) -> Option<f64> {
        self.boundary.as_mut().map(|ed| ed.nudge(handle, delta))
    }

    /// Write the provisional bounds to the store and leave edit mode.
    pub fn commit_boundary_edit(&mut self) -> Result<Option<BoundaryCommit>> {
        let Some(editor) = self.boundary.take() else {
            return Ok(None);
        };
        let commit = editor.commit();
        self.store
            .set_bounds(commit.id, commit.start_time, commit.end_time)?;
        info!(
            "timestamps saved for sentence {}: {:.3}-{:.3}",
            commit.id, commit.start_time, commit.end_time
        );
        self.notify_save();
        Ok(Some(commit))
    }

    pub fn cancel_boundary_edit(&mut self) {
        if let Some(editor) = self.boundary.take() {
            editor.cancel();
        }
    }

    /// Window the waveform should show. Held fixed while timing is edited so
    /// drag fractions keep mapping to the same times.
    pub fn render_window(&self) -> Option<RenderWindow> {
        if let Some(editor) = &self.boundary {
            return Some(editor.window());
        }
        let id = self.store.selected()?;
        let pos = self.store.canonical_position(id)?;
        render_window(&self.store.segments(), pos, self.config.window_segments)
    }

    /// Everything the waveform needs besides samples.
    pub fn scene(&self) -> Option<Scene> {
        let window = self.render_window()?;
        let segments = self.store.segments();
        Some(Scene {
            window,
            boundaries: segments
                .iter()
                .map(|s| (s.start_time, s.end_time))
                .collect(),
            current: self.store.selected(),
            current_bounds: self.store.current().map(|s| (s.start_time, s.end_time)),
            provisional: self.boundary.as_ref().map(|ed| ed.bounds()),
        })
    }

    /// SRT text of the active view.
    pub fn export_srt(&self) -> String {
        srt::encode(&self.store.active_view().to_vec())
    }

    /// Plain text of the active view, one sentence per line.
    pub fn export_text(&self) -> String {
        srt::export_text(&self.store.active_view().to_vec())
    }

    /// "Sentence N of M" for the current selection.
    pub fn status(&self) -> Option<String> {
        let id = self.store.selected()?;
        let pos = self.store.canonical_position(id)?;
        Some(format!(
            "Sentence {} of {}",
            pos + 1,
            self.store.segments().len()
        ))
    }

    fn notify_save(&mut self) {
        if let Some(callback) = self.on_save.as_mut() {
            callback(&self.store.segments());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct MockPlayer {
        time: f64,
        playing: bool,
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
            Some(20.0)
        }

        fn is_paused(&self) -> bool {
            !self.playing
        }

        async fn play(&mut self) -> anyhow::Result<()> {
            self.playing = true;
            Ok(())
        }

        fn pause(&mut self) {
            self.playing = false;
        }
    }

    const DOC: &str = "1\n00:00:00,000 --> 00:00:03,000\nA\n\n\
                       2\n00:00:04,000 --> 00:00:07,000\nB\n\n\
                       3\n00:00:08,000 --> 00:00:11,000\nC\n\n";

    fn session() -> Session<MockPlayer> {
        let mut s = Session::new(MockPlayer::default(), PracticeConfig::default());
        s.load(DOC).unwrap();
        s
    }

    #[tokio::test]
    async fn keys_drive_navigation() {
        let mut s = session();
        assert_eq!(s.state(), PlaybackState::Ready);
        s.handle_key(Key::Down).await.unwrap();
        assert_eq!(s.selected(), Some(2));
        assert_eq!(s.state(), PlaybackState::Ready);
        s.handle_key(Key::Right).await.unwrap();
        assert_eq!(s.selected(), Some(3));
        assert_eq!(s.state(), PlaybackState::Playing);
        s.handle_key(Key::Right).await.unwrap();
        assert_eq!(s.selected(), Some(3));
        s.handle_key(Key::Space).await.unwrap();
        assert_eq!(s.state(), PlaybackState::Paused);
        s.handle_key(Key::Enter).await.unwrap();
        assert_eq!(s.navigator().player().time, 8.0);
        assert_eq!(s.state(), PlaybackState::Playing);
    }

    #[tokio::test]
    async fn keys_are_ignored_while_editing_or_empty() {
        let mut empty = Session::new(MockPlayer::default(), PracticeConfig::default());
        empty.handle_key(Key::Space).await.unwrap();
        assert_eq!(empty.state(), PlaybackState::Idle);

        let mut s = session();
        s.begin_text_edit(1).unwrap();
        s.handle_key(Key::Down).await.unwrap();
        assert_eq!(s.selected(), Some(1));
        s.cancel_text_edit();

        s.begin_boundary_edit().unwrap();
        s.handle_key(Key::Down).await.unwrap();
        assert_eq!(s.selected(), Some(1));
    }

    #[tokio::test]
    async fn starred_filter_round_trip() {
        let mut s = session();
        s.toggle_star(1).unwrap();
        s.toggle_star(3).unwrap();
        s.handle_key(Key::Down).await.unwrap();
        assert_eq!(s.selected(), Some(2));
        s.set_filter(true);
        assert_eq!(s.selected(), Some(1));
        assert_eq!(s.export_text(), "A\nC");
        s.set_filter(false);
        assert_eq!(s.selected(), Some(2));
        assert_eq!(s.export_text(), "A\nB\nC");
    }

    #[test]
    fn text_edit_saves_and_notifies() {
        let saved: Arc<Mutex<Vec<Vec<Segment>>>> = Arc::default();
        let mut s = session();
        let sink = saved.clone();
        s.on_save(move |segments| sink.lock().unwrap().push(segments.to_vec()));

        s.begin_text_edit(2).unwrap();
        assert_eq!(s.text_draft(), Some("B"));
        s.update_text_draft("   ");
        assert_eq!(s.commit_text_edit(), Err(Error::EmptyText(2)));
        assert!(s.is_editing_text());
        s.update_text_draft("Bee");
        s.commit_text_edit().unwrap();
        assert!(!s.is_editing_text());
        assert!(s.export_srt().contains("Bee"));

        let saved = saved.lock().unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0][1].text, "Bee");
    }

    #[tokio::test]
    async fn boundary_edit_stays_provisional_until_commit() {
        let saved = Arc::new(Mutex::new(0));
        let mut s = session();
        let count = saved.clone();
        s.on_save(move |_| *count.lock().unwrap() += 1);

        s.select_and_play(2).await.unwrap();
        s.begin_boundary_edit().unwrap();
        assert!(s.navigator().player().is_paused());
        assert_eq!(s.render_window(), Some(RenderWindow::new(0.0, 11.0)));

        assert_eq!(s.drag_boundary(Handle::End, 1.0), Some(8.0));
        assert_eq!(s.store().segment(2).unwrap().end_time, 7.0);
        assert_eq!(s.on_time_update(7.0), 100.0);
        assert_eq!(s.scene().unwrap().provisional, Some((4.0, 8.0)));

        let commit = s.commit_boundary_edit().unwrap().unwrap();
        assert_eq!((commit.start_time, commit.end_time), (4.0, 8.0));
        assert_eq!(s.store().segment(2).unwrap().end_time, 8.0);
        assert!(s.store().document().contains("00:00:04,000 --> 00:00:08,000"));
        assert_eq!(*saved.lock().unwrap(), 1);
    }

    #[test]
    fn cancelled_boundary_edit_changes_nothing() {
        let mut s = session();
        s.begin_boundary_edit().unwrap();
        s.nudge_boundary(Handle::End, 0.5);
        s.cancel_boundary_edit();
        assert_eq!(s.store().segment(1).unwrap().end_time, 3.0);
        assert_eq!(s.commit_boundary_edit().unwrap(), None);
    }

    #[tokio::test]
    async fn reload_resets_playback_and_drops_edits() {
        let mut s = session();
        s.select_and_play(3).await.unwrap();
        s.begin_boundary_edit().unwrap();
        s.nudge_boundary(Handle::Start, -0.5);
        s.navigator_mut().player_mut().playing = true;
        s.on_play();
        assert_eq!(s.state(), PlaybackState::Playing);

        s.load("1\n00:00:00,000 --> 00:00:02,000\nNew\n\n").unwrap();
        assert!(!s.is_editing_timing());
        assert_eq!(s.state(), PlaybackState::Ready);
        assert!(s.navigator().player().is_paused());
        assert_eq!(s.selected(), Some(1));
        assert_eq!(s.status().as_deref(), Some("Sentence 1 of 1"));
        assert_eq!(s.commit_boundary_edit().unwrap(), None);

        s.begin_text_edit(1).unwrap();
        s.load(DOC).unwrap();
        assert!(!s.is_editing_text());
        assert_eq!(s.store().segment(3).unwrap().start_time, 8.0);
    }

    #[test]
    fn failed_load_keeps_session() {
        let mut s = session();
        assert_eq!(s.load("no arrows"), Err(Error::Parse));
        assert_eq!(s.store().segments().len(), 3);
        assert_eq!(s.status().as_deref(), Some("Sentence 1 of 3"));
    }
}

//! Canonical segment list, starred filter and current selection.
//!
//! The list lives behind an `Arc<[Segment]>` and is only ever swapped out as a
//! whole, so a reader holding a snapshot never sees a half-applied edit.
//! Selection is stored as a segment id and resolved into whichever view is
//! active when needed.

use crate::error::{Error, Result};
use crate::srt::{self, Segment, SegmentId};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, trace};

/// Ordered subset of the canonical list that navigation walks over.
#[derive(Debug, Clone)]
pub struct ActiveView {
    segments: Arc<[Segment]>,
    indices: Vec<usize>,
    positions: HashMap<SegmentId, usize>,
}

impl ActiveView {
    fn build(segments: Arc<[Segment]>, starred_only: bool) -> Self {
        let indices: Vec<usize> = segments
            .iter()
            .enumerate()
            .filter(|(_, s)| !starred_only || s.starred)
            .map(|(i, _)| i)
            .collect();
        let mut positions = HashMap::with_capacity(indices.len());
        for (pos, &i) in indices.iter().enumerate() {
            // First occurrence wins for duplicate ids.
            positions.entry(segments[i].id).or_insert(pos);
        }
        Self {
            segments,
            indices,
            positions,
        }
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn get(&self, pos: usize) -> Option<&Segment> {
        self.indices.get(pos).map(|&i| &self.segments[i])
    }

    /// Position of `id` inside this view.
    pub fn position(&self, id: SegmentId) -> Option<usize> {
        self.positions.get(&id).copied()
    }

    /// Index into the canonical list of the segment at `pos`.
    pub fn canonical_index(&self, pos: usize) -> Option<usize> {
        self.indices.get(pos).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Segment> + '_ {
        self.indices.iter().map(move |&i| &self.segments[i])
    }

    pub fn to_vec(&self) -> Vec<Segment> {
        self.iter().cloned().collect()
    }
}

/// Owner of the loaded document.
#[derive(Debug, Clone)]
pub struct SegmentStore {
    segments: Arc<[Segment]>,
    ids: HashMap<SegmentId, usize>,
    view: ActiveView,
    filter_on: bool,
    selected: Option<SegmentId>,
    unfiltered_selection: Option<SegmentId>,
    document: String,
}

impl Default for SegmentStore {
    fn default() -> Self {
        let segments: Arc<[Segment]> = Arc::from(Vec::new());
        Self {
            view: ActiveView::build(segments.clone(), false),
            segments,
            ids: HashMap::new(),
            filter_on: false,
            selected: None,
            unfiltered_selection: None,
            document: String::new(),
        }
    }
}

impl SegmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `document` and make it the current one.
    /// On error the previously loaded document stays as it was.
    pub fn load(&mut self, document: &str) -> Result<()> {
        trace!("load(len={})", document.len());
        let segments = srt::decode(document)?;
        info!("loaded {} segments", segments.len());
        self.filter_on = false;
        self.unfiltered_selection = None;
        self.selected = segments.first().map(|s| s.id);
        self.document = document.to_string();
        self.replace(segments.into());
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        !self.segments.is_empty()
    }

    /// Snapshot of the canonical list.
    pub fn segments(&self) -> Arc<[Segment]> {
        self.segments.clone()
    }

    /// Current document text; regenerated after every committed edit.
    pub fn document(&self) -> &str {
        &self.document
    }

    pub fn segment(&self, id: SegmentId) -> Option<&Segment> {
        self.canonical_position(id).map(|i| &self.segments[i])
    }

    /// Index of the first segment carrying `id` in the canonical list.
    pub fn canonical_position(&self, id: SegmentId) -> Option<usize> {
        self.ids.get(&id).copied()
    }

    pub fn selected(&self) -> Option<SegmentId> {
        self.selected
    }

    pub fn current(&self) -> Option<&Segment> {
        self.selected.and_then(|id| self.segment(id))
    }

    pub fn select(&mut self, id: SegmentId) -> Result<()> {
        if self.segment(id).is_none() {
            return Err(Error::UnknownSegment(id));
        }
        debug!("selected segment {id}");
        self.selected = Some(id);
        Ok(())
    }

    pub fn has_starred(&self) -> bool {
        self.segments.iter().any(|s| s.starred)
    }

    pub fn filter_on(&self) -> bool {
        self.filter_on
    }

    /// View navigation currently operates over.
    pub fn active_view(&self) -> &ActiveView {
        &self.view
    }

    /// Build a view for an explicit filter setting.
    /// With no starred segments the filtered view falls back to the full list.
    pub fn view(&self, filter_on: bool) -> ActiveView {
        ActiveView::build(self.segments.clone(), filter_on && self.has_starred())
    }

    /// Switch the starred-only filter.
    ///
    /// Turning it on remembers the current selection once and jumps to the
    /// first starred segment. Turning it off restores that remembered
    /// selection, regardless of what was selected while filtered.
    pub fn set_filter(&mut self, on: bool) {
        trace!("set_filter(on={on})");
        if on == self.filter_on {
            return;
        }
        if on {
            self.unfiltered_selection = self.selected;
            if let Some(first) = self.segments.iter().find(|s| s.starred) {
                self.selected = Some(first.id);
            }
        } else {
            self.selected = self.unfiltered_selection.take().or(self.selected);
        }
        self.filter_on = on;
        self.view = self.view(on);
        debug!("filter {} with {} visible", if on { "on" } else { "off" }, self.view.len());
    }

    pub fn set_starred(&mut self, id: SegmentId, value: bool) -> Result<()> {
        trace!("set_starred(id={id}, value={value})");
        let idx = self.canonical_position(id).ok_or(Error::UnknownSegment(id))?;
        let mut next = self.segments.to_vec();
        next[idx].starred = value;
        self.replace(next.into());
        if self.filter_on && !self.has_starred() {
            debug!("last starred segment removed, clearing filter");
            self.filter_on = false;
            self.unfiltered_selection = None;
            self.view = self.view(false);
        }
        Ok(())
    }

    /// Flip the star on `id` and return the new value.
    pub fn toggle_star(&mut self, id: SegmentId) -> Result<bool> {
        let value = !self.segment(id).ok_or(Error::UnknownSegment(id))?.starred;
        self.set_starred(id, value)?;
        Ok(value)
    }

    /// Replace the text of `id`, re-encoding the document.
    /// Line breaks and runs of whitespace collapse to single spaces, so the
    /// text always fits on the one line a record holds.
    pub fn set_text(&mut self, id: SegmentId, text: &str) -> Result<()> {
        trace!("set_text(id={id})");
        let idx = self.canonical_position(id).ok_or(Error::UnknownSegment(id))?;
        let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if text.is_empty() {
            return Err(Error::EmptyText(id));
        }
        let mut next = self.segments.to_vec();
        next[idx].text = text;
        self.replace(next.into());
        self.document = srt::encode(&self.segments);
        Ok(())
    }

    /// Replace the bounds of `id`, re-encoding the document.
    pub fn set_bounds(&mut self, id: SegmentId, start_time: f64, end_time: f64) -> Result<()> {
        trace!("set_bounds(id={id}, start={start_time}, end={end_time})");
        let idx = self.canonical_position(id).ok_or(Error::UnknownSegment(id))?;
        let mut next = self.segments.to_vec();
        next[idx].start_time = start_time;
        next[idx].end_time = end_time;
        self.replace(next.into());
        self.document = srt::encode(&self.segments);
        info!("updated timing of segment {id}");
        Ok(())
    }

    fn replace(&mut self, segments: Arc<[Segment]>) {
        let mut ids = HashMap::with_capacity(segments.len());
        for (i, s) in segments.iter().enumerate() {
            ids.entry(s.id).or_insert(i);
        }
        self.ids = ids;
        self.segments = segments;
        self.view = self.view(self.filter_on);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "1\n00:00:00,000 --> 00:00:03,000\nA\n\n\
                       2\n00:00:03,000 --> 00:00:06,000\nB\n\n\
                       3\n00:00:06,000 --> 00:00:09,000\nC\n\n";

    fn loaded() -> SegmentStore {
        let mut store = SegmentStore::new();
        store.load(DOC).unwrap();
        store
    }

    #[test]
    fn load_selects_first_segment() {
        let store = loaded();
        assert_eq!(store.selected(), Some(1));
        assert_eq!(store.active_view().len(), 3);
        assert!(!store.filter_on());
    }

    #[test]
    fn failed_load_keeps_previous_document() {
        let mut store = loaded();
        store.select(2).unwrap();
        assert_eq!(store.load("nothing here"), Err(Error::Parse));
        assert_eq!(store.segments().len(), 3);
        assert_eq!(store.selected(), Some(2));
        assert_eq!(store.document(), DOC);
    }

    #[test]
    fn filter_round_trip_restores_snapshot() {
        let mut store = loaded();
        store.set_starred(1, true).unwrap();
        store.set_starred(3, true).unwrap();
        store.select(2).unwrap();

        store.set_filter(true);
        assert_eq!(store.selected(), Some(1));
        assert_eq!(store.active_view().len(), 2);

        store.select(3).unwrap();
        store.set_filter(false);
        assert_eq!(store.selected(), Some(2));
    }

    #[test]
    fn filter_without_stars_keeps_selection() {
        let mut store = loaded();
        store.select(3).unwrap();
        store.set_filter(true);
        assert_eq!(store.selected(), Some(3));
        assert_eq!(store.active_view().len(), 3);
    }

    #[test]
    fn unstarring_last_clears_filter() {
        let mut store = loaded();
        store.set_starred(2, true).unwrap();
        store.set_filter(true);
        assert!(store.filter_on());
        assert!(!store.toggle_star(2).unwrap());
        assert!(!store.filter_on());
        assert_eq!(store.active_view().len(), 3);
    }

    #[test]
    fn edits_replace_the_list() {
        let mut store = loaded();
        let before = store.segments();
        store.set_text(2, "  changed  ").unwrap();
        assert_eq!(before[1].text, "B");
        assert_eq!(store.segment(2).unwrap().text, "changed");
        assert!(store.document().contains("changed"));
        assert_eq!(store.set_text(2, "   "), Err(Error::EmptyText(2)));
        assert_eq!(store.set_text(9, "x"), Err(Error::UnknownSegment(9)));
    }

    #[test]
    fn multiline_text_is_flattened_before_encoding() {
        let mut store = loaded();
        store.set_text(1, "first part\n\nsecond\r\n  part").unwrap();
        assert_eq!(store.segment(1).unwrap().text, "first part second part");
        let reread = srt::decode(store.document()).unwrap();
        assert_eq!(reread.len(), 3);
        assert_eq!(reread[0].text, "first part second part");
        assert_eq!(reread[1].text, "B");
    }

    #[test]
    fn set_bounds_reencodes() {
        let mut store = loaded();
        store.set_bounds(2, 3.5, 5.75).unwrap();
        assert!(store.document().contains("00:00:03,500 --> 00:00:05,750"));
    }

    #[test]
    fn duplicate_ids_resolve_to_first() {
        let mut store = SegmentStore::new();
        store
            .load("4\n00:00:01,000 --> 00:00:02,000\nfirst\n\n4\n00:00:03,000 --> 00:00:04,000\nsecond\n")
            .unwrap();
        assert_eq!(store.segment(4).unwrap().text, "first");
        assert_eq!(store.active_view().position(4), Some(0));
    }
}

//! Selection of the caption on display and the context around it.
//!
//! [`select_window`] is a pure function of a track and a playback instant.
//! [`Panel`] wraps it with the two pieces of state a display needs: a cursor
//! used as a lookup hint, and the index currently shown, which is kept when
//! playback falls into a gap between captions.

use std::time::Duration;

use crate::srt::{SubtitleEntry, SubtitleTrack};

/// How many captions to show on each side of the active one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSpan {
    pub before: usize,
    pub after: usize,
}

impl Default for WindowSpan {
    fn default() -> Self {
        Self {
            before: 3,
            after: 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window<'a> {
    /// Document index of the active caption.
    pub index: usize,
    pub before: &'a [SubtitleEntry],
    pub current: &'a SubtitleEntry,
    pub after: &'a [SubtitleEntry],
}

impl<'a> Window<'a> {
    fn around(track: &'a SubtitleTrack, index: usize, span: WindowSpan) -> Self {
        let entries = track.entries();
        let first = index.saturating_sub(span.before);
        let last = index
            .saturating_add(1)
            .saturating_add(span.after)
            .min(entries.len());
        Window {
            index,
            before: &entries[first..index],
            current: &entries[index],
            after: &entries[index + 1..last],
        }
    }
}

/// Finds the first caption in document order covering `t`, with its context.
///
/// Overlapping captions are tolerated; the earliest in the file wins.
pub fn select_window(track: &SubtitleTrack, t: Duration, span: WindowSpan) -> Option<Window<'_>> {
    active_index(track, t).map(|index| Window::around(track, index, span))
}

/// First caption in document order that starts strictly after `t`.
pub fn next_entry(track: &SubtitleTrack, t: Duration) -> Option<&SubtitleEntry> {
    track.entries().iter().find(|e| e.start > t)
}

fn active_index(track: &SubtitleTrack, t: Duration) -> Option<usize> {
    let entries = track.entries();
    if track.is_disjoint() {
        let i = entries.partition_point(|e| e.end < t);
        entries.get(i).filter(|e| e.start <= t).map(|_| i)
    } else {
        entries.iter().position(|e| e.covers(t))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn label(self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelUpdate {
    /// The active caption moved to a different index.
    Changed(usize),
    /// Same caption as before, or a gap; the display keeps what it has.
    Unchanged,
}

#[derive(Debug, Default)]
pub struct Panel {
    track: SubtitleTrack,
    span: WindowSpan,
    cursor: usize,
    shown: Option<usize>,
}

impl Panel {
    pub fn new(span: WindowSpan) -> Self {
        Self {
            span,
            ..Default::default()
        }
    }

    pub fn track(&self) -> &SubtitleTrack {
        &self.track
    }

    /// Replaces the track wholesale and clears the display.
    pub fn set_track(&mut self, track: SubtitleTrack) {
        self.track = track;
        self.cursor = 0;
        self.shown = None;
    }

    pub fn clear(&mut self) {
        self.set_track(SubtitleTrack::default());
    }

    pub fn shown_index(&self) -> Option<usize> {
        self.shown
    }

    /// Recomputes the active caption for `t`.
    ///
    /// Returns [`PanelUpdate::Unchanged`] when nothing covers `t`; the
    /// previously shown caption stays on display.
    pub fn refresh(&mut self, t: Duration) -> PanelUpdate {
        let found = self.lookup(t);
        match found {
            Some(index) => {
                self.cursor = index;
                if self.shown == Some(index) {
                    PanelUpdate::Unchanged
                } else {
                    self.shown = Some(index);
                    PanelUpdate::Changed(index)
                }
            }
            None => PanelUpdate::Unchanged,
        }
    }

    fn lookup(&self, t: Duration) -> Option<usize> {
        // Only a disjoint track guarantees the cached caption is the first match.
        if self.track.is_disjoint() {
            if let Some(e) = self.track.get(self.cursor) {
                if e.covers(t) {
                    return Some(self.cursor);
                }
            }
        }
        active_index(&self.track, t)
    }

    /// The window currently on display, if any caption has been shown.
    pub fn window(&self) -> Option<Window<'_>> {
        self.shown
            .filter(|&i| i < self.track.len())
            .map(|i| Window::around(&self.track, i, self.span))
    }

    /// Text for the panel: context captions separated by blank lines, the
    /// active one prefixed with `> `.
    pub fn render(&self) -> String {
        let window = match self.window() {
            Some(w) => w,
            None => return String::new(),
        };
        let mut out = String::new();
        for e in window.before {
            out.push_str(&e.text);
            out.push_str("\n\n");
        }
        if window.current.text.is_empty() {
            out.push_str(">\n");
        }
        for line in window.current.text.lines() {
            out.push_str("> ");
            out.push_str(line);
            out.push('\n');
        }
        out.push('\n');
        for e in window.after {
            out.push_str(&e.text);
            out.push_str("\n\n");
        }
        out
    }
}

use std::time::Duration;

/// One timed caption, shown while playback time falls within `[start, end]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleEntry {
    pub sequence_hint: u64,
    pub start: Duration,
    pub end: Duration,
    pub text: String,
}

impl SubtitleEntry {
    pub fn start_secs(&self) -> f64 {
        self.start.as_secs_f64()
    }

    pub fn end_secs(&self) -> f64 {
        self.end.as_secs_f64()
    }

    pub fn covers(&self, t: Duration) -> bool {
        self.start <= t && t <= self.end
    }
}

/// The captions of one subtitle file, in the order they appear in the file.
///
/// Entries are never re-sorted. `is_disjoint` records whether every entry is
/// well-formed and ends strictly before its successor starts, in which case at
/// most one entry can cover any instant and lookups may use a binary search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubtitleTrack {
    entries: Vec<SubtitleEntry>,
    disjoint: bool,
}

impl SubtitleTrack {
    pub fn new(entries: Vec<SubtitleEntry>) -> Self {
        let disjoint = entries.iter().all(|e| e.start <= e.end)
            && entries.windows(2).all(|w| w[0].end < w[1].start);
        Self { entries, disjoint }
    }

    pub fn entries(&self) -> &[SubtitleEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&SubtitleEntry> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_disjoint(&self) -> bool {
        self.disjoint
    }

    /// End of the last caption to finish, used as a stand-in media length.
    pub fn last_end(&self) -> Option<Duration> {
        self.entries.iter().map(|e| e.end).max()
    }
}

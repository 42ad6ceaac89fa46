/// A single caption cue. Times are in seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct Cue {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

impl Cue {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }

    /// Inclusive on both bounds.
    pub fn contains(&self, time: f64) -> bool {
        self.start <= time && time <= self.end
    }

    pub fn line_count(&self) -> usize {
        self.text.lines().count()
    }
}

/// Cues in the order they appear in the source text.
///
/// The list is never re-sorted, so overlapping or out-of-order cues keep
/// their source position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CueList {
    cues: Vec<Cue>,
}

impl CueList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.cues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Cue> {
        self.cues.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Cue> {
        self.cues.get(index)
    }

    /// Text of the first cue containing `time`, or `""` when none does.
    pub fn active_text(&self, time: f64) -> &str {
        active_text(self, time)
    }

    /// Number of lines in the tallest cue.
    pub fn max_lines(&self) -> usize {
        self.cues.iter().map(Cue::line_count).max().unwrap_or(0)
    }
}

impl From<Vec<Cue>> for CueList {
    fn from(cues: Vec<Cue>) -> Self {
        Self { cues }
    }
}

impl FromIterator<Cue> for CueList {
    fn from_iter<I: IntoIterator<Item = Cue>>(iter: I) -> Self {
        Self {
            cues: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a CueList {
    type Item = &'a Cue;
    type IntoIter = std::slice::Iter<'a, Cue>;

    fn into_iter(self) -> Self::IntoIter {
        self.cues.iter()
    }
}

/// Linear scan, first match wins. Overlapping cues resolve to whichever
/// comes first in the list, not the tightest one.
pub fn active_text(cues: &CueList, time: f64) -> &str {
    cues.iter()
        .find(|cue| cue.contains(time))
        .map_or("", |cue| cue.text.as_str())
}

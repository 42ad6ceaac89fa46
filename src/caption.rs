use crate::cache::{TrackCache, TrackSource};
use crate::cue::CueList;

use std::sync::Arc;

use tracing::{debug, warn};

/// Player notifications the caption surface reacts to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlaybackEvent {
    TimeUpdate(f64),
    Seeked(f64),
}

impl PlaybackEvent {
    pub fn time(self) -> f64 {
        match self {
            PlaybackEvent::TimeUpdate(t) | PlaybackEvent::Seeked(t) => t,
        }
    }
}

/// The visible caption band of one player.
///
/// Keeps the text it last displayed and only reports a new text when the
/// active cue actually changes.
#[derive(Debug, Clone)]
pub struct CaptionSurface {
    cues: Arc<CueList>,
    shown: String,
    hidden: bool,
}

impl CaptionSurface {
    pub fn new(cues: impl Into<Arc<CueList>>) -> Self {
        let cues = cues.into();
        let hidden = cues.is_empty();
        Self {
            cues,
            shown: String::new(),
            hidden,
        }
    }

    pub fn hidden() -> Self {
        Self::new(CueList::new())
    }

    /// Build the surface for the track at `url`.
    ///
    /// A missing URL, a track that does not exist, a failed fetch and a
    /// track without cues all give a hidden surface.
    pub fn load<S: TrackSource>(cache: &mut TrackCache<S>, url: Option<&str>) -> Self {
        let url = match url {
            Some(url) if cache.exists(url) => url,
            Some(url) => {
                debug!(url, "caption track does not exist, hiding captions");
                return Self::hidden();
            }
            None => return Self::hidden(),
        };
        match cache.load(url) {
            Ok(cues) => Self::new(cues),
            Err(err) => {
                warn!(url, error = %err, "caption track could not be loaded");
                Self::hidden()
            }
        }
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn cues(&self) -> &CueList {
        &self.cues
    }

    /// Text currently on the surface.
    pub fn text(&self) -> &str {
        &self.shown
    }

    /// Lines to reserve so the band does not jump in height between cues.
    pub fn min_lines(&self) -> usize {
        self.cues.max_lines()
    }

    /// Resolve the caption for `time`. Returns the new text only when it
    /// differs from what is already shown.
    pub fn update(&mut self, time: f64) -> Option<&str> {
        if self.hidden {
            return None;
        }
        let active = self.cues.active_text(time);
        if active == self.shown {
            return None;
        }
        self.shown = active.to_string();
        Some(&self.shown)
    }

    pub fn handle(&mut self, event: PlaybackEvent) -> Option<&str> {
        self.update(event.time())
    }
}

/// Caption text as markup, one `<br>` per line break.
pub fn render_html(text: &str) -> String {
    text.replace('\n', "<br>")
}

//! WebVTT caption tracks for web media players.
//!
//! [`parser::parse`] turns a caption track into a [`CueList`], and
//! [`CueList::active_text`] tells which caption is showing at a playback
//! time. The remaining modules hold the player-side pieces around that:
//! a caption surface that only redraws on change, deep-link jumps, a
//! "player ready" bus and a track cache.

pub mod cache;
pub mod caption;
pub mod cue;
pub mod deeplink;
pub mod error;
pub mod events;
pub mod parser;
pub mod serialiser;

pub use crate::caption::{CaptionSurface, PlaybackEvent};
pub use crate::cue::{active_text, Cue, CueList};
pub use crate::error::TrackError;
pub use crate::parser::{parse, ParseOutcome, Parser};

//! Caption track loading and caching
//!
//! Tracks are addressed by the URL a page would use for them. A
//! [`TrackSource`] turns that URL into text and a [`TrackCache`] keeps
//! the parsed cues around until it is explicitly reset.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::cue::CueList;
use crate::error::TrackError;
use crate::parser::Parser;

/// Somewhere caption tracks can be fetched from.
pub trait TrackSource {
    /// Cheap existence probe, checked before a full fetch.
    fn exists(&self, url: &str) -> bool;

    fn fetch(&self, url: &str) -> Result<String, TrackError>;
}

/// Resolves track URLs as paths below a root directory.
#[derive(Debug, Clone)]
pub struct FileSource {
    root: PathBuf,
}

impl FileSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, url: &str) -> PathBuf {
        let path = url.split(|c: char| c == '?' || c == '#').next().unwrap_or(url);
        self.root.join(path.trim_start_matches('/'))
    }
}

impl TrackSource for FileSource {
    fn exists(&self, url: &str) -> bool {
        self.resolve(url).is_file()
    }

    fn fetch(&self, url: &str) -> Result<String, TrackError> {
        let path = self.resolve(url);
        std::fs::read_to_string(&path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => TrackError::NotFound(url.to_string()),
            _ => TrackError::Read {
                url: url.to_string(),
                source,
            },
        })
    }
}

/// Parsed tracks keyed by URL.
///
/// Entries live until [`TrackCache::reset`]. Failed fetches are not
/// remembered, so a later call retries the source.
pub struct TrackCache<S> {
    source: S,
    parser: Parser,
    entries: HashMap<String, Arc<CueList>>,
}

impl<S: TrackSource> TrackCache<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            parser: Parser::new(),
            entries: HashMap::new(),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn exists(&self, url: &str) -> bool {
        self.entries.contains_key(url) || self.source.exists(url)
    }

    /// Fetch and parse `url`, or return the cues parsed earlier.
    pub fn load(&mut self, url: &str) -> Result<Arc<CueList>, TrackError> {
        if let Some(cues) = self.entries.get(url) {
            return Ok(Arc::clone(cues));
        }
        let text = self.source.fetch(url)?;
        let cues = Arc::new(self.parser.parse(&text));
        debug!(url, cues = cues.len(), "caption track loaded");
        self.entries.insert(url.to_string(), Arc::clone(&cues));
        Ok(cues)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn reset(&mut self) {
        self.entries.clear();
    }
}

impl TrackCache<FileSource> {
    pub fn from_dir(root: impl AsRef<Path>) -> Self {
        Self::new(FileSource::new(root.as_ref()))
    }
}

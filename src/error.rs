use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackError {
    #[error("caption track not found: '{0}'")]
    NotFound(String),

    #[error("failed to read caption track '{url}'")]
    Read {
        url: String,
        #[source]
        source: io::Error,
    },
}

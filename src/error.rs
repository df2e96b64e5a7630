//src/error.rs

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GuildError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not access {}: {source}", .path.display())]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not parse reference database: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Could not fetch reference database: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Column 'taxonomy' not found. Please check your OTU table {}", .path.display())]
    MissingTaxonomyColumn { path: PathBuf },

    #[error("OTU '{otu_id}' has a non-numeric abundance '{value}' in column '{column}'")]
    NonNumericAbundance {
        otu_id: String,
        column: String,
        value: String,
    },

    #[error("Line {line} has {columns} columns but the taxonomy column needs at least {needed}")]
    MalformedRow {
        line: usize,
        columns: usize,
        needed: usize,
    },

    #[error("OTU table {} has no header line", .path.display())]
    EmptyTable { path: PathBuf },

    #[error("Invalid reference database payload: {0}")]
    InvalidPayload(String),
}

pub type Result<T> = std::result::Result<T, GuildError>;

impl GuildError {
    /// Attach `path` to a bare IO error; other errors pass through.
    pub fn with_path<P: Into<PathBuf>>(self, path: P) -> Self {
        match self {
            GuildError::Io(source) => GuildError::File {
                path: path.into(),
                source,
            },
            other => other,
        }
    }
}

//! Saving proxied responses as mock files.
//!
//! The saved file goes through the same watcher path as a hand-written
//! fixture, so collecting never touches the registry directly.

use axum::body::Bytes;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::AsyncWriteExt;

use crate::http::plugins::MimeTable;
use crate::mocks::filename::{make_filename, with_comment};

/// Attempts before giving up on finding a free `(collected-N)` name.
const MAX_COLLISIONS: u32 = 1000;

#[derive(Debug, Error)]
pub enum CollectError {
    #[error("refusing to collect `{0}`: path escapes the mocks directory")]
    UnsafePath(String),

    #[error("no free filename for `{0}`")]
    Exhausted(String),

    #[error("failed to write `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Writes proxied responses into the mocks directory.
#[derive(Debug, Clone)]
pub struct Collector {
    mocks_dir: PathBuf,
    format_json: bool,
}

impl Collector {
    pub fn new(mocks_dir: &Path, format_json: bool) -> Self {
        Self {
            mocks_dir: mocks_dir.to_path_buf(),
            format_json,
        }
    }

    pub fn mocks_dir(&self) -> &Path {
        &self.mocks_dir
    }

    /// Save `body` as `<url>.<METHOD>.<STATUS>.<EXT>`. Returns the relative name written.
    ///
    /// An existing file is never overwritten; the first free
    /// `(collected-N)` variant, N starting at 2, is used instead.
    pub async fn collect(
        &self,
        path_and_query: &str,
        method: &str,
        status: u16,
        content_type: Option<&str>,
        body: &Bytes,
        mimes: &MimeTable,
    ) -> Result<String, CollectError> {
        let ext = mimes.ext_for(content_type);
        let base = make_filename(path_and_query, method, status, &ext);
        if !is_safe_relative(&base) {
            return Err(CollectError::UnsafePath(base));
        }

        let contents = if ext == "json" && self.format_json {
            pretty_json(body).unwrap_or_else(|| body.to_vec())
        } else {
            body.to_vec()
        };

        let mut candidate = base.clone();
        for n in 2..MAX_COLLISIONS + 2 {
            let path = self.mocks_dir.join(&candidate);
            match write_new(&path, &contents).await {
                Ok(()) => {
                    tracing::info!(file = %candidate, "Collected proxied response");
                    return Ok(candidate);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    candidate = with_comment(&base, &format!("(collected-{n})"));
                }
                Err(source) => return Err(CollectError::Io { path, source }),
            }
        }
        Err(CollectError::Exhausted(base))
    }
}

async fn write_new(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;
    file.write_all(contents).await?;
    file.flush().await
}

fn pretty_json(body: &[u8]) -> Option<Vec<u8>> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    serde_json::to_vec_pretty(&value).ok()
}

fn is_safe_relative(file: &str) -> bool {
    !file.starts_with('/') && !file.split('/').any(|segment| segment == ".." || segment == ".")
}

//! Per-route mock state machine.
//!
//! One broker exists per unique `(method, url mask)`. It owns the candidate
//! fixture files for that route and decides which one is served.
//!
//! ```text
//!            select_file / set_by_matching_comment
//!        ┌──────────────────────────────────────────┐
//!        ▼                                          │
//!   File(name) ──toggle_synthetic_error──▶ SyntheticError
//!        │  ▲                                       │
//!        │  └──────────set_proxied(false)           │
//!        ▼                    │                     │
//!   Proxied { file } ─────────┘  ◀──set_proxied(true)┘
//! ```
//!
//! `delayed` is an orthogonal flag that combines with every state.

use serde::Serialize;
use thiserror::Error;

use crate::mocks::filename::{extract_comments, is_default, parse_filename, FilenameError};
use crate::routing::UrlMaskMatcher;

/// Status served while a broker is in the synthetic error state.
pub const SYNTHETIC_ERROR_STATUS: u16 = 500;

/// What a broker currently serves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Serve this candidate file.
    File(String),
    /// Respond 500 with an empty body, reading nothing from disk.
    SyntheticError,
    /// Relay to the proxy fallback. `file` is served again once proxying stops.
    Proxied { file: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrokerError {
    #[error("mock `{0}` is not registered")]
    UnknownMock(String),

    #[error("invalid mock filename `{file}`: {source}")]
    InvalidFilename {
        file: String,
        #[source]
        source: FilenameError,
    },

    #[error("invalid url mask `{0}`")]
    InvalidUrlMask(String),
}

/// Serializable view of a broker for the control API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BrokerSnapshot {
    pub file: Option<String>,
    pub mocks: Vec<String>,
    pub delayed: bool,
    pub proxied: bool,
    pub auto500: bool,
}

#[derive(Debug)]
pub struct MockBroker {
    method: String,
    url_mask: String,
    matcher: UrlMaskMatcher,
    candidates: Vec<String>,
    selection: Selection,
    /// Selection to restore when the synthetic error is toggled off.
    before_error: Option<String>,
    delayed: bool,
}

impl MockBroker {
    /// Create a broker whose route is derived from `file`.
    pub fn new(file: &str) -> Result<Self, BrokerError> {
        let descriptor = parse_filename(file).map_err(|source| BrokerError::InvalidFilename {
            file: file.to_string(),
            source,
        })?;
        let matcher = UrlMaskMatcher::new(&descriptor.url_mask)
            .map_err(|_| BrokerError::InvalidUrlMask(descriptor.url_mask.clone()))?;

        Ok(Self {
            method: descriptor.method,
            url_mask: descriptor.url_mask,
            matcher,
            candidates: vec![file.to_string()],
            selection: Selection::File(file.to_string()),
            before_error: None,
            delayed: false,
        })
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn url_mask(&self) -> &str {
        &self.url_mask
    }

    pub fn matcher(&self) -> &UrlMaskMatcher {
        &self.matcher
    }

    pub fn matches(&self, request_path: &str) -> bool {
        self.matcher.matches(request_path)
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn has_mock(&self, file: &str) -> bool {
        self.candidates.iter().any(|c| c == file)
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// The file served when not in the synthetic error state.
    pub fn selected_file(&self) -> Option<&str> {
        match &self.selection {
            Selection::File(file) | Selection::Proxied { file } => Some(file),
            Selection::SyntheticError => None,
        }
    }

    pub fn is_delayed(&self) -> bool {
        self.delayed
    }

    pub fn is_proxied(&self) -> bool {
        matches!(self.selection, Selection::Proxied { .. })
    }

    pub fn is_synthetic_error(&self) -> bool {
        matches!(self.selection, Selection::SyntheticError)
    }

    /// Status encoded in the selected file, or 500 for the synthetic error.
    pub fn status(&self) -> u16 {
        match self.selected_file() {
            Some(file) => status_of(file).unwrap_or(SYNTHETIC_ERROR_STATUS),
            None => SYNTHETIC_ERROR_STATUS,
        }
    }

    /// Add a candidate. Returns false if it was already registered.
    pub fn register(&mut self, file: &str) -> bool {
        if self.has_mock(file) {
            return false;
        }
        self.candidates.push(file.to_string());
        self.sort_candidates();

        // A 500 on disk always wins over the synthetic one.
        if self.is_synthetic_error() && status_of(file) == Some(SYNTHETIC_ERROR_STATUS) {
            self.selection = Selection::File(file.to_string());
        }
        true
    }

    /// Remove a candidate. Returns false if it was not registered.
    ///
    /// When the removed file was selected, the first remaining candidate
    /// takes over. The caller destroys the broker once it is empty.
    pub fn unregister(&mut self, file: &str) -> bool {
        let Some(index) = self.candidates.iter().position(|c| c == file) else {
            return false;
        };
        self.candidates.remove(index);
        if self.before_error.as_deref() == Some(file) {
            self.before_error = None;
        }

        if self.selected_file() == Some(file) {
            if let Some(first) = self.candidates.first().cloned() {
                self.selection = match self.selection {
                    Selection::Proxied { .. } => Selection::Proxied { file: first },
                    _ => Selection::File(first),
                };
            }
        }
        true
    }

    /// Select the `(default)` file, or the first candidate.
    pub fn select_default(&mut self) {
        if let Some(first) = self.candidates.first().cloned() {
            self.selection = Selection::File(first);
            self.before_error = None;
        }
    }

    /// Serve `file`, leaving any proxy or synthetic error state.
    pub fn select_file(&mut self, file: &str) -> Result<(), BrokerError> {
        if !self.has_mock(file) {
            return Err(BrokerError::UnknownMock(file.to_string()));
        }
        self.selection = Selection::File(file.to_string());
        self.before_error = None;
        Ok(())
    }

    /// Flip between the route's regular response and a 500.
    ///
    /// A 500 fixture on disk is preferred; without one the broker enters
    /// [`Selection::SyntheticError`]. Proxying is always turned off.
    pub fn toggle_synthetic_error(&mut self) {
        if self.is_synthetic_error() || self.status() == SYNTHETIC_ERROR_STATUS {
            let restore = self
                .before_error
                .take()
                .filter(|f| self.has_mock(f))
                .or_else(|| self.candidates.first().cloned());
            if let Some(file) = restore {
                self.selection = Selection::File(file);
            }
            return;
        }

        self.before_error = self.selected_file().map(str::to_string);
        let on_disk = self
            .candidates
            .iter()
            .find(|f| status_of(f) == Some(SYNTHETIC_ERROR_STATUS))
            .cloned();
        self.selection = match on_disk {
            Some(file) => Selection::File(file),
            None => Selection::SyntheticError,
        };
    }

    pub fn set_delayed(&mut self, delayed: bool) {
        self.delayed = delayed;
    }

    pub fn set_proxied(&mut self, proxied: bool) {
        if proxied {
            let file = self
                .selected_file()
                .map(str::to_string)
                .or_else(|| self.candidates.first().cloned());
            if let Some(file) = file {
                self.selection = Selection::Proxied { file };
                self.before_error = None;
            }
        } else if let Selection::Proxied { file } = &self.selection {
            self.selection = Selection::File(file.clone());
        }
    }

    /// Select the first candidate carrying a comment that contains `comment`.
    /// Returns false, changing nothing, if none does.
    pub fn set_by_matching_comment(&mut self, comment: &str) -> bool {
        let found = self
            .candidates
            .iter()
            .find(|file| extract_comments(file).iter().any(|c| c.contains(comment)))
            .cloned();
        match found {
            Some(file) => {
                self.selection = Selection::File(file);
                self.before_error = None;
                true
            }
            None => false,
        }
    }

    /// Comments of every candidate, in candidate order.
    pub fn comments(&self) -> Vec<String> {
        self.candidates.iter().flat_map(|f| extract_comments(f)).collect()
    }

    pub fn snapshot(&self) -> BrokerSnapshot {
        BrokerSnapshot {
            file: self.selected_file().map(str::to_string),
            mocks: self.candidates.clone(),
            delayed: self.delayed,
            proxied: self.is_proxied(),
            auto500: self.is_synthetic_error(),
        }
    }

    fn sort_candidates(&mut self) {
        self.candidates
            .sort_by(|a, b| is_default(b).cmp(&is_default(a)).then_with(|| a.cmp(b)));
    }
}

fn status_of(file: &str) -> Option<u16> {
    parse_filename(file).ok().map(|d| d.status)
}

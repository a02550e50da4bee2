//! Fixture transform chain.
//!
//! # Responsibilities
//! - Pick the transform for a fixture path (first matching regex wins)
//! - Turn the fixture into `{mime, body}`
//! - Contain plugin panics so one bad fixture never drops the connection
//!
//! # Design Decisions
//! - Ordered `(pattern, plugin)` list with the raw-file reader as the implicit last entry
//! - Plugins are trait objects so library users can add their own
//! - Built-in transforms are addressable by name from the config file

use async_trait::async_trait;
use axum::body::Bytes;
use handlebars::Handlebars;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use crate::config::MockConfig;

/// Transform names accepted in `[[plugins]] transform = ...`.
pub const BUILTIN_TRANSFORMS: &[&str] = &["raw", "template"];

/// Extensions that mean "no content type".
const NO_MIME_EXTS: &[&str] = &["empty", "unknown"];

/// Conventional extension for common content types. `mime_guess` lists
/// extensions alphabetically, which gives `asm` for `text/plain`.
const PREFERRED_EXTS: &[(&str, &str)] = &[
    ("application/javascript", "js"),
    ("application/json", "json"),
    ("application/octet-stream", "bin"),
    ("application/pdf", "pdf"),
    ("application/xml", "xml"),
    ("application/zip", "zip"),
    ("audio/mpeg", "mp3"),
    ("image/gif", "gif"),
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/svg+xml", "svg"),
    ("image/webp", "webp"),
    ("text/css", "css"),
    ("text/csv", "csv"),
    ("text/html", "html"),
    ("text/javascript", "js"),
    ("text/plain", "txt"),
    ("text/xml", "xml"),
    ("video/mp4", "mp4"),
];

/// Request data made available to transforms.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FixtureRequest {
    pub method: String,
    pub path: String,
    pub query: BTreeMap<String, String>,
    /// Values bound to the url mask's `[variable]` segments.
    pub params: HashMap<String, String>,
}

/// Output of a transform.
#[derive(Debug, Clone)]
pub struct Transformed {
    pub mime: Option<String>,
    pub body: Bytes,
}

#[derive(Debug, Error)]
pub enum PluginError {
    /// The fixture disappeared after the route was resolved.
    #[error("fixture `{0}` no longer exists")]
    NotFound(PathBuf),

    #[error("failed to read fixture `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("template error in `{path}`: {message}")]
    Template { path: PathBuf, message: String },

    #[error("plugin panicked: {0}")]
    Panicked(String),
}

/// Extension → MIME lookup with config overrides.
#[derive(Debug, Clone, Default)]
pub struct MimeTable {
    extra: BTreeMap<String, String>,
}

impl MimeTable {
    pub fn new(extra: BTreeMap<String, String>) -> Self {
        Self { extra }
    }

    pub fn mime_for(&self, ext: &str) -> Option<String> {
        if let Some(mime) = self.extra.get(ext) {
            return Some(mime.clone());
        }
        if NO_MIME_EXTS.contains(&ext) {
            return None;
        }
        mime_guess::from_ext(ext).first().map(|m| m.to_string())
    }

    /// Extension for a `Content-Type` value; `empty` when absent, `unknown` when unmapped.
    pub fn ext_for(&self, content_type: Option<&str>) -> String {
        let Some(content_type) = content_type else {
            return "empty".to_string();
        };
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        if let Some((ext, _)) = self.extra.iter().find(|(_, mime)| **mime == essence) {
            return ext.clone();
        }
        if let Some((_, ext)) = PREFERRED_EXTS.iter().find(|(mime, _)| *mime == essence) {
            return ext.to_string();
        }
        mime_guess::get_mime_extensions_str(&essence)
            .and_then(|exts| exts.first())
            .map(|ext| ext.to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }

    pub fn mime_for_path(&self, path: &Path) -> Option<String> {
        self.mime_for(path.extension()?.to_str()?)
    }
}

/// A fixture transform.
#[async_trait]
pub trait FixturePlugin: Send + Sync {
    async fn transform(
        &self,
        file: &Path,
        request: &FixtureRequest,
        mimes: &MimeTable,
    ) -> Result<Transformed, PluginError>;
}

/// Reads the file as-is.
#[derive(Debug, Default)]
pub struct RawFilePlugin;

#[async_trait]
impl FixturePlugin for RawFilePlugin {
    async fn transform(
        &self,
        file: &Path,
        _request: &FixtureRequest,
        mimes: &MimeTable,
    ) -> Result<Transformed, PluginError> {
        let body = read_fixture(file).await?;
        Ok(Transformed {
            mime: mimes.mime_for_path(file),
            body: Bytes::from(body),
        })
    }
}

/// Renders the file as a Handlebars template.
///
/// Context: `method`, `path`, `query.<name>` and `params.<name>`.
pub struct TemplatePlugin {
    handlebars: Handlebars<'static>,
}

impl TemplatePlugin {
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        // fixtures are JSON more often than HTML
        handlebars.register_escape_fn(handlebars::no_escape);
        Self { handlebars }
    }
}

impl Default for TemplatePlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FixturePlugin for TemplatePlugin {
    async fn transform(
        &self,
        file: &Path,
        request: &FixtureRequest,
        mimes: &MimeTable,
    ) -> Result<Transformed, PluginError> {
        let raw = read_fixture(file).await?;
        let source = String::from_utf8_lossy(&raw);
        let rendered = self
            .handlebars
            .render_template(&source, request)
            .map_err(|e| PluginError::Template {
                path: file.to_path_buf(),
                message: e.to_string(),
            })?;
        Ok(Transformed {
            mime: mimes.mime_for_path(file),
            body: Bytes::from(rendered),
        })
    }
}

async fn read_fixture(file: &Path) -> Result<Vec<u8>, PluginError> {
    tokio::fs::read(file).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => PluginError::NotFound(file.to_path_buf()),
        _ => PluginError::Io {
            path: file.to_path_buf(),
            source: e,
        },
    })
}

fn builtin(name: &str) -> Option<Arc<dyn FixturePlugin>> {
    match name {
        "raw" => Some(Arc::new(RawFilePlugin)),
        "template" => Some(Arc::new(TemplatePlugin::new())),
        _ => None,
    }
}

/// Ordered plugin list with the raw reader as fallback.
#[derive(Clone)]
pub struct PluginChain {
    plugins: Vec<(Regex, Arc<dyn FixturePlugin>)>,
    fallback: Arc<dyn FixturePlugin>,
    mimes: Arc<MimeTable>,
}

impl PluginChain {
    pub fn new(mimes: MimeTable) -> Self {
        Self {
            plugins: Vec::new(),
            fallback: Arc::new(RawFilePlugin),
            mimes: Arc::new(mimes),
        }
    }

    /// Build from `[[plugins]]` and `extra_mimes`. Unknown transform names are skipped.
    pub fn from_config(config: &MockConfig) -> Result<Self, regex::Error> {
        let mut chain = Self::new(MimeTable::new(config.extra_mimes.clone()));
        for plugin in &config.plugins {
            let pattern = Regex::new(&plugin.pattern)?;
            match builtin(&plugin.transform) {
                Some(p) => chain = chain.with_plugin(pattern, p),
                None => tracing::warn!(transform = %plugin.transform, "Unknown plugin transform"),
            }
        }
        Ok(chain)
    }

    /// Append a plugin; earlier plugins take precedence.
    pub fn with_plugin(mut self, pattern: Regex, plugin: Arc<dyn FixturePlugin>) -> Self {
        self.plugins.push((pattern, plugin));
        self
    }

    pub fn mimes(&self) -> &MimeTable {
        &self.mimes
    }

    /// Transform the fixture `file` (relative name, used for pattern matching)
    /// located at `path`.
    pub async fn apply(
        &self,
        file: &str,
        path: PathBuf,
        request: FixtureRequest,
    ) -> Result<Transformed, PluginError> {
        let plugin = self
            .plugins
            .iter()
            .find(|(pattern, _)| pattern.is_match(file))
            .map(|(_, p)| p.clone())
            .unwrap_or_else(|| self.fallback.clone());
        let mimes = self.mimes.clone();

        let task = tokio::spawn(async move { plugin.transform(&path, &request, &mimes).await });
        match task.await {
            Ok(result) => result,
            Err(e) => Err(PluginError::Panicked(e.to_string())),
        }
    }
}

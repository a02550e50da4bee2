//! Static route registry.

use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::mocks::registry::{list_files, relative_name};
use crate::routing::matcher::strip_query_and_fragment;

const INDEX_FILE: &str = "index.html";

/// One static file and its modifiers.
#[derive(Debug, Clone)]
pub struct StaticBroker {
    /// Path relative to the static directory.
    pub file: String,
    pub delayed: bool,
    pub not_found: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticSnapshot {
    pub file: String,
    pub delayed: bool,
    pub not_found: bool,
}

#[derive(Debug)]
pub struct StaticRegistry {
    static_dir: Option<PathBuf>,
    ignore: Option<Regex>,
    /// Keyed by route (`/` + relative path).
    brokers: BTreeMap<String, StaticBroker>,
}

impl StaticRegistry {
    pub fn new(static_dir: Option<PathBuf>, ignore: Option<Regex>) -> Self {
        Self {
            static_dir,
            ignore,
            brokers: BTreeMap::new(),
        }
    }

    pub fn static_dir(&self) -> Option<&Path> {
        self.static_dir.as_deref()
    }

    pub fn init(&mut self) -> usize {
        self.brokers.clear();
        let Some(dir) = self.static_dir.clone() else {
            return 0;
        };
        for file in list_files(&dir, self.ignore.as_ref()) {
            self.register(&file);
        }
        tracing::info!(static_dir = %dir.display(), routes = self.brokers.len(), "Static registry built");
        self.brokers.len()
    }

    /// Returns true when the registry changed.
    pub fn register(&mut self, file: &str) -> bool {
        if self.ignore.as_ref().is_some_and(|re| re.is_match(file)) {
            return false;
        }
        let route = format!("/{file}");
        if self.brokers.contains_key(&route) {
            return false;
        }
        self.brokers.insert(
            route,
            StaticBroker {
                file: file.to_string(),
                delayed: false,
                not_found: false,
            },
        );
        true
    }

    pub fn unregister(&mut self, file: &str) -> bool {
        self.brokers.remove(&format!("/{file}")).is_some()
    }

    /// Static broker serving `path`, including directory index routes.
    pub fn resolve(&self, path: &str) -> Option<&StaticBroker> {
        let decoded = percent_encoding::percent_decode_str(path).decode_utf8_lossy();
        let path = strip_query_and_fragment(&decoded);
        if let Some(b) = self.brokers.get(path) {
            return Some(b);
        }
        let index = if path.ends_with('/') {
            format!("{path}{INDEX_FILE}")
        } else {
            format!("{path}/{INDEX_FILE}")
        };
        self.brokers.get(&index)
    }

    pub fn by_route_mut(&mut self, route: &str) -> Option<&mut StaticBroker> {
        self.brokers.get_mut(route)
    }

    /// Absolute path of a registered file.
    pub fn absolute_path(&self, file: &str) -> Option<PathBuf> {
        self.static_dir.as_ref().map(|dir| dir.join(file))
    }

    pub fn relative_name(&self, path: &Path) -> Option<String> {
        relative_name(self.static_dir.as_deref()?, path)
    }

    pub fn snapshot(&self) -> BTreeMap<String, StaticSnapshot> {
        self.brokers
            .iter()
            .map(|(route, b)| {
                (
                    route.clone(),
                    StaticSnapshot {
                        file: b.file.clone(),
                        delayed: b.delayed,
                        not_found: b.not_found,
                    },
                )
            })
            .collect()
    }
}

//! Selectable cookie jar.
//!
//! An ordered label → cookie list with one current label. The current
//! cookie is sent as `Set-Cookie` on every mock response.

use serde::Serialize;
use thiserror::Error;

use crate::config::CookieConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cookie label `{0}` is not configured")]
pub struct UnknownCookie(pub String);

/// One entry of the control API's cookie list.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CookieEntry {
    pub label: String,
    pub selected: bool,
}

#[derive(Debug, Clone, Default)]
pub struct CookieJar {
    cookies: Vec<CookieConfig>,
    current: Option<usize>,
}

impl CookieJar {
    /// The first configured cookie starts selected.
    pub fn new(cookies: Vec<CookieConfig>) -> Self {
        let current = if cookies.is_empty() { None } else { Some(0) };
        Self { cookies, current }
    }

    pub fn select(&mut self, label: &str) -> Result<(), UnknownCookie> {
        let index = self
            .cookies
            .iter()
            .position(|c| c.label == label)
            .ok_or_else(|| UnknownCookie(label.to_string()))?;
        self.current = Some(index);
        Ok(())
    }

    /// Back to the first cookie.
    pub fn reset(&mut self) {
        self.current = if self.cookies.is_empty() { None } else { Some(0) };
    }

    /// Value of the current cookie, if any.
    pub fn current_value(&self) -> Option<&str> {
        self.current
            .and_then(|i| self.cookies.get(i))
            .map(|c| c.value.as_str())
    }

    pub fn list(&self) -> Vec<CookieEntry> {
        self.cookies
            .iter()
            .enumerate()
            .map(|(i, c)| CookieEntry {
                label: c.label.clone(),
                selected: self.current == Some(i),
            })
            .collect()
    }
}

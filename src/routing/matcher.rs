//! Url mask matching logic.
//!
//! # Responsibilities
//! - Compile a url mask into an anchored regex
//! - Match percent-decoded request paths against it
//! - Extract the values bound to `[variable]` segments
//!
//! # Design Decisions
//! - Query string and fragment are ignored on both sides
//! - `[name]` matches one or more non-slash characters
//! - A trailing `/` is appended to the request path and the pattern accepts
//!   any number of trailing slashes, so `/user/[id]` never matches
//!   `/user/42/suffix`
//! - Compiled once per broker; immutable afterwards

use percent_encoding::percent_decode_str;
use regex::Regex;
use std::collections::HashMap;

/// Compiled matcher for one url mask.
#[derive(Debug, Clone)]
pub struct UrlMaskMatcher {
    regex: Regex,
    variables: Vec<String>,
}

impl UrlMaskMatcher {
    /// Compile `url_mask`.
    pub fn new(url_mask: &str) -> Result<Self, regex::Error> {
        let mask = strip_query_and_fragment(url_mask);
        let mut pattern = String::with_capacity(mask.len() + 8);
        let mut variables = Vec::new();

        pattern.push('^');
        let mut rest = mask;
        while let Some(open) = rest.find('[') {
            let Some(close) = rest[open..].find(']').map(|i| open + i) else {
                break;
            };
            pattern.push_str(&regex::escape(&rest[..open]));
            pattern.push_str("([^/]+)");
            variables.push(rest[open + 1..close].to_string());
            rest = &rest[close + 1..];
        }
        pattern.push_str(&regex::escape(rest));
        pattern.push_str("/*$");

        Ok(Self {
            regex: Regex::new(&pattern)?,
            variables,
        })
    }

    /// Returns true if the request path (query and fragment allowed) matches.
    pub fn matches(&self, request_path: &str) -> bool {
        self.regex.is_match(&prepare(request_path))
    }

    /// Values bound to each `[variable]` segment, keyed by variable name.
    pub fn params(&self, request_path: &str) -> Option<HashMap<String, String>> {
        let subject = prepare(request_path);
        let captures = self.regex.captures(&subject)?;
        Some(
            self.variables
                .iter()
                .enumerate()
                .filter_map(|(i, name)| {
                    captures
                        .get(i + 1)
                        .map(|m| (name.clone(), m.as_str().to_string()))
                })
                .collect(),
        )
    }
}

/// Drop everything from the first `?` or `#`.
pub fn strip_query_and_fragment(url: &str) -> &str {
    match url.find(|c: char| c == '?' || c == '#') {
        Some(i) => &url[..i],
        None => url,
    }
}

fn prepare(request_path: &str) -> String {
    let decoded = percent_decode_str(request_path).decode_utf8_lossy();
    let mut subject = strip_query_and_fragment(&decoded).to_string();
    subject.push('/');
    subject
}

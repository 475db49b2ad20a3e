//! # Authority allow-list
//!
//! Authors on the allow-list (central banks, wire services, key founders...)
//! get a flat score bonus. Matching is a case-insensitive substring test on
//! normalized handles, so `@FederalReserve`, `federal_reserve` and
//! `Federal Reserve Board` all hit an entry `federal reserve`.

#[derive(Debug, Clone, Default)]
pub struct AuthorityList {
    entries: Vec<String>,
}

impl AuthorityList {
    pub fn new(entries: &[String]) -> Self {
        Self {
            entries: entries
                .iter()
                .map(|e| normalize(e))
                .filter(|e| !e.is_empty())
                .collect(),
        }
    }

    pub fn matches(&self, author: &str) -> bool {
        let a = normalize(author);
        if a.is_empty() {
            return false;
        }
        let squashed = a.replace(' ', "");
        self.entries
            .iter()
            .any(|e| a.contains(e.as_str()) || squashed.contains(&e.replace(' ', "")))
    }
}

/// Lowercase, drop handle sigils, turn separators into spaces, collapse.
fn normalize(s: &str) -> String {
    let mut out = s.trim().to_lowercase();

    for ch in ['—', '–', '-', '_', '/', '\\', '.', ','] {
        out = out.replace(ch, " ");
    }
    out = out.replace(['@', '#', '\''], "");

    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

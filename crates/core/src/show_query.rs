//! Canonical single-resource query: eager relations, relation counts,
//! computed attributes, and soft-delete visibility.

use serde::Serialize;

use crate::list_query::parse_bool;

/// Immutable, normalized show request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ShowQuery {
    with: Vec<String>,
    with_count: Vec<String>,
    append: Vec<String>,
    with_trashed: bool,
}

impl ShowQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize decoded query-string pairs.
    ///
    /// Each list accepts comma-separated values (`with=role,permissions`) and
    /// repeated bracket keys (`with[]=role&with[]=permissions`). Duplicates
    /// are dropped, first occurrence wins.
    pub fn from_pairs(pairs: &[(String, String)]) -> Self {
        let mut query = Self::default();
        for (key, value) in pairs {
            let key = key.strip_suffix("[]").unwrap_or(key.as_str());
            match key {
                "with" => extend_names(&mut query.with, value),
                "with_count" | "withCount" => extend_names(&mut query.with_count, value),
                "append" => extend_names(&mut query.append, value),
                "with_trashed" | "withTrashed" => {
                    query.with_trashed = parse_bool(value).unwrap_or(false);
                }
                _ => {}
            }
        }
        query
    }

    pub fn with_relations<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for name in names {
            extend_names(&mut self.with, name.as_ref());
        }
        self
    }

    pub fn with_counts<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for name in names {
            extend_names(&mut self.with_count, name.as_ref());
        }
        self
    }

    pub fn with_appends<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for name in names {
            extend_names(&mut self.append, name.as_ref());
        }
        self
    }

    pub fn including_trashed(mut self, with_trashed: bool) -> Self {
        self.with_trashed = with_trashed;
        self
    }

    pub fn relations(&self) -> &[String] {
        &self.with
    }

    pub fn counts(&self) -> &[String] {
        &self.with_count
    }

    pub fn appends(&self) -> &[String] {
        &self.append
    }

    pub fn with_trashed(&self) -> bool {
        self.with_trashed
    }

    pub fn has_relations(&self) -> bool {
        !self.with.is_empty()
    }

    pub fn has_counts(&self) -> bool {
        !self.with_count.is_empty()
    }

    pub fn has_appends(&self) -> bool {
        !self.append.is_empty()
    }
}

fn extend_names(target: &mut Vec<String>, raw: &str) {
    for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if !target.iter().any(|existing| existing == name) {
            target.push(name.to_string());
        }
    }
}

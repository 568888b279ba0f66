//! Canonical list query: free-text search, pagination, sort, and filters.
//!
//! Raw request parameters arrive as ordered `(key, value)` pairs (the decoded
//! query string). [`ListQuery::from_pairs`] normalizes them once so every
//! repository sees the same shape:
//!
//! ```text
//! search=foo | q=foo                 free text
//! page=2                             1-based page
//! per_page=25 | perPage=25           clamped to the configured maximum
//! sort=name&dir=asc                  sort column + direction (default desc)
//! filters[is_active]=1               scalar filter
//! filters[id][]=1&filters[id][]=2    IN-list filter
//! filters[created_at][from]=...      range filter (from / to)
//! ```

use std::collections::BTreeMap;

use serde::Serialize;

/// Default page size when the request does not specify one.
pub const DEFAULT_PER_PAGE: u32 = 15;

/// Hard upper bound on page size.
pub const MAX_PER_PAGE: u32 = 100;

/// Pagination bounds applied during normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListQueryConfig {
    pub default_per_page: u32,
    pub max_per_page: u32,
}

impl Default for ListQueryConfig {
    fn default() -> Self {
        Self {
            default_per_page: DEFAULT_PER_PAGE,
            max_per_page: MAX_PER_PAGE,
        }
    }
}

/// Sort direction. Anything that is not `asc` normalizes to `desc`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDir {
    Asc,
    #[default]
    Desc,
}

impl SortDir {
    pub fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("asc") {
            SortDir::Asc
        } else {
            SortDir::Desc
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            SortDir::Asc => "ASC",
            SortDir::Desc => "DESC",
        }
    }
}

/// A single normalized filter value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FilterValue {
    Scalar(String),
    /// IN-list.
    List(Vec<String>),
    /// Inclusive range; at least one end is present after normalization.
    Range {
        from: Option<String>,
        to: Option<String>,
    },
}

impl FilterValue {
    pub fn scalar(value: impl Into<String>) -> Self {
        FilterValue::Scalar(value.into())
    }

    pub fn list<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FilterValue::List(values.into_iter().map(Into::into).collect())
    }

    pub fn range(from: Option<&str>, to: Option<&str>) -> Self {
        FilterValue::Range {
            from: from.map(str::to_string),
            to: to.map(str::to_string),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FilterValue::Scalar(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Boolean flag parsed from `"true"/"false"/"1"/"0"`.
    pub fn as_bool(&self) -> Option<bool> {
        self.as_str().and_then(parse_bool)
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_str().and_then(|s| s.trim().parse().ok())
    }

    /// Values of an IN-list. A scalar is treated as a one-element list.
    pub fn as_list(&self) -> Vec<&str> {
        match self {
            FilterValue::Scalar(s) => vec![s.as_str()],
            FilterValue::List(items) => items.iter().map(String::as_str).collect(),
            FilterValue::Range { .. } => Vec::new(),
        }
    }

    /// Integer members of an IN-list; unparsable members are skipped.
    pub fn as_i64_list(&self) -> Vec<i64> {
        self.as_list()
            .into_iter()
            .filter_map(|s| s.trim().parse().ok())
            .collect()
    }

    pub fn as_range(&self) -> Option<(Option<&str>, Option<&str>)> {
        match self {
            FilterValue::Range { from, to } => Some((from.as_deref(), to.as_deref())),
            _ => None,
        }
    }

    fn normalized(self) -> Option<Self> {
        match self {
            FilterValue::Scalar(s) => {
                let trimmed = s.trim();
                (!trimmed.is_empty()).then(|| FilterValue::Scalar(trimmed.to_string()))
            }
            FilterValue::List(items) => {
                let items: Vec<String> = items
                    .into_iter()
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
                (!items.is_empty()).then_some(FilterValue::List(items))
            }
            FilterValue::Range { from, to } => {
                let from = non_empty(from);
                let to = non_empty(to);
                (from.is_some() || to.is_some()).then_some(FilterValue::Range { from, to })
            }
        }
    }
}

/// Filter name → value. Unknown names are kept; repositories ignore them.
pub type Filters = BTreeMap<String, FilterValue>;

/// Parse the string forms of a boolean flag.
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Immutable, normalized list request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListQuery {
    search: Option<String>,
    page: u32,
    per_page: u32,
    sort: Option<String>,
    dir: SortDir,
    filters: Filters,
    #[serde(skip)]
    max_per_page: u32,
}

impl ListQuery {
    /// Empty query: first page, default page size, no search or filters.
    pub fn new(config: &ListQueryConfig) -> Self {
        let max_per_page = config.max_per_page.max(1);
        Self {
            search: None,
            page: 1,
            per_page: config.default_per_page.clamp(1, max_per_page),
            sort: None,
            dir: SortDir::Desc,
            filters: Filters::new(),
            max_per_page,
        }
    }

    /// Normalize decoded query-string pairs.
    pub fn from_pairs(pairs: &[(String, String)], config: &ListQueryConfig) -> Self {
        let mut query = Self::new(config);
        let mut pending: BTreeMap<String, PendingFilter> = BTreeMap::new();

        for (key, value) in pairs {
            match key.as_str() {
                "search" | "q" => query = query.with_search(value),
                "page" => query = query.with_page(value.trim().parse().unwrap_or(1)),
                "per_page" | "perPage" => {
                    if let Ok(n) = value.trim().parse() {
                        query = query.with_per_page(n);
                    }
                }
                "sort" => {
                    let sort = value.trim();
                    query.sort = (!sort.is_empty()).then(|| sort.to_string());
                }
                "dir" | "direction" => query.dir = SortDir::parse(value),
                other => {
                    if let Some((name, slot)) = parse_filter_key(other) {
                        pending.entry(name).or_default().push(slot, value);
                    }
                }
            }
        }

        for (name, filter) in pending {
            if let Some(value) = filter.finish() {
                query.filters.insert(name, value);
            }
        }
        query
    }

    pub fn with_search(mut self, search: impl AsRef<str>) -> Self {
        let trimmed = search.as_ref().trim();
        self.search = (!trimmed.is_empty()).then(|| trimmed.to_string());
        self
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page.max(1);
        self
    }

    pub fn with_per_page(mut self, per_page: u32) -> Self {
        self.per_page = per_page.clamp(1, self.max_per_page);
        self
    }

    pub fn with_sort(mut self, column: impl Into<String>, dir: SortDir) -> Self {
        self.sort = Some(column.into());
        self.dir = dir;
        self
    }

    /// Add a filter. Empty values are dropped, matching request normalization.
    pub fn with_filter(mut self, name: impl Into<String>, value: FilterValue) -> Self {
        let name = name.into();
        match value.normalized() {
            Some(value) => {
                self.filters.insert(name, value);
            }
            None => {
                self.filters.remove(&name);
            }
        }
        self
    }

    pub fn search(&self) -> Option<&str> {
        self.search.as_deref()
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    pub fn sort(&self) -> Option<&str> {
        self.sort.as_deref()
    }

    pub fn dir(&self) -> SortDir {
        self.dir
    }

    pub fn filters(&self) -> &Filters {
        &self.filters
    }

    pub fn filter(&self, name: &str) -> Option<&FilterValue> {
        self.filters.get(name)
    }

    /// Row offset of the first item on the requested page.
    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.per_page)
    }
}

/// Which part of a filter a query-string key addresses.
#[derive(Debug, PartialEq, Eq)]
enum FilterSlot {
    Scalar,
    Item,
    From,
    To,
}

/// Split `filters[name]`, `filters[name][]`, `filters[name][from]` into name + slot.
fn parse_filter_key(key: &str) -> Option<(String, FilterSlot)> {
    let rest = key
        .strip_prefix("filters[")
        .or_else(|| key.strip_prefix("filter["))?;
    let close = rest.find(']')?;
    let name = rest[..close].trim();
    if name.is_empty() {
        return None;
    }
    let slot = match &rest[close + 1..] {
        "" => FilterSlot::Scalar,
        "[from]" => FilterSlot::From,
        "[to]" => FilterSlot::To,
        // `[]` and explicit indices (`[0]`) both append to the list.
        tail if tail.starts_with('[') && tail.ends_with(']') => FilterSlot::Item,
        _ => return None,
    };
    Some((name.to_string(), slot))
}

#[derive(Debug, Default)]
struct PendingFilter {
    scalar: Option<String>,
    items: Vec<String>,
    from: Option<String>,
    to: Option<String>,
}

impl PendingFilter {
    fn push(&mut self, slot: FilterSlot, value: &str) {
        let value = value.to_string();
        match slot {
            FilterSlot::Scalar => self.scalar = Some(value),
            FilterSlot::Item => self.items.push(value),
            FilterSlot::From => self.from = Some(value),
            FilterSlot::To => self.to = Some(value),
        }
    }

    fn finish(self) -> Option<FilterValue> {
        if !self.items.is_empty() {
            return FilterValue::List(self.items).normalized();
        }
        if self.from.is_some() || self.to.is_some() {
            return FilterValue::Range {
                from: self.from,
                to: self.to,
            }
            .normalized();
        }
        self.scalar.map(FilterValue::Scalar)?.normalized()
    }
}

//! Substring search over page titles.
//!
//! A query is split into lower-cased tokens, compound creature names are
//! broken at well-known suffixes (`starfish` also matches "Star Fish"), and
//! every entry containing all tokens is returned. Exact matches come first,
//! then shorter names. Results are paged by a character budget rather than a
//! fixed count so a page fits on one line of the search widget.

use serde::Serialize;

use crate::pages::{PageScope, page_url, title_case};

pub const DEFAULT_SUFFIXES: [&str; 6] = ["fish", "coral", "ray", "chiton", "snail", "worm"];
pub const DEFAULT_CHAR_BUDGET: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchConfig {
    /// Compound suffixes in priority order.
    pub suffixes: Vec<String>,
    /// Characters of result names allowed on one page.
    pub char_budget: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            suffixes: DEFAULT_SUFFIXES.iter().map(|s| (*s).to_string()).collect(),
            char_budget: DEFAULT_CHAR_BUDGET,
        }
    }
}

impl SearchConfig {
    pub fn with_budget(mut self, char_budget: usize) -> Self {
        self.char_budget = char_budget;
        self
    }
}

/// Splits `query` into lower-cased tokens.
///
/// Only the first suffix (in list order) found in a token is used, at its
/// first occurrence, so `fishfish` stays whole.
pub fn tokenize<S: AsRef<str>>(query: &str, suffixes: &[S]) -> Vec<String> {
    let mut tokens = Vec::new();
    for word in query.split(' ').filter(|word| !word.is_empty()) {
        let word = word.to_lowercase();
        let split = suffixes
            .iter()
            .map(AsRef::as_ref)
            .filter(|suffix| !suffix.is_empty())
            .find_map(|suffix| word.find(suffix));
        match split {
            Some(at) if at > 0 => {
                tokens.push(word[..at].to_string());
                tokens.push(word[at..].to_string());
            }
            _ => tokens.push(word),
        }
    }
    tokens
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchResult {
    pub display_name: String,
    pub url: String,
    pub exact: bool,
}

/// One page of ranked results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchPage {
    pub results: Vec<SearchResult>,
    /// More matches exist past this page.
    pub truncated: bool,
    /// Ranked matches skipped before this page.
    pub skip: usize,
    /// Total ranked matches for the query.
    pub matches: usize,
}

/// Page titles of one scope, in site order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchIndex {
    scope: PageScope,
    entries: Vec<String>,
    folded: Vec<String>,
}

impl SearchIndex {
    pub fn new(scope: PageScope, entries: Vec<String>) -> Self {
        let folded = entries.iter().map(|entry| entry.to_lowercase()).collect();
        Self {
            scope,
            entries,
            folded,
        }
    }

    pub fn scope(&self) -> PageScope {
        self.scope
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Indices of every entry matching `query`, best first.
    pub fn ranked<S: AsRef<str>>(&self, query: &str, suffixes: &[S]) -> Vec<(usize, bool)> {
        let tokens = tokenize(query, suffixes);
        if tokens.is_empty() {
            return Vec::new();
        }
        let mut hits: Vec<(usize, bool)> = self
            .folded
            .iter()
            .enumerate()
            .filter(|(_, folded)| tokens.iter().all(|token| folded.contains(token.as_str())))
            .map(|(index, _)| (index, self.entries[index] == query))
            .collect();
        hits.sort_by_key(|&(index, exact)| (!exact, self.entries[index].chars().count()));
        hits
    }

    /// Runs `query` and returns the page starting after `skip` matches.
    pub fn search(&self, query: &str, skip: usize, config: &SearchConfig) -> SearchPage {
        let ranked = self.ranked(query, &config.suffixes);
        let mut page = SearchPage {
            skip,
            matches: ranked.len(),
            ..SearchPage::default()
        };
        let mut used = 0usize;
        for &(index, exact) in ranked.iter().skip(skip) {
            let entry = &self.entries[index];
            let cost = entry.chars().count();
            if used + cost > config.char_budget {
                page.truncated = true;
                break;
            }
            used += cost;
            page.results.push(self.result(entry, exact));
        }
        page
    }

    fn result(&self, entry: &str, exact: bool) -> SearchResult {
        let display_name = match self.scope {
            PageScope::Gallery => title_case(entry),
            PageScope::Taxonomy | PageScope::Sites => entry.to_string(),
        };
        SearchResult {
            display_name,
            url: page_url(self.scope, entry),
            exact,
        }
    }
}

/// Query and "More..." navigation state of one searcher.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchSession {
    scope: PageScope,
    query: String,
    skip: usize,
    history: Vec<usize>,
}

impl SearchSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    /// Page list the current query runs against.
    pub fn scope(&self) -> PageScope {
        self.scope
    }

    pub fn skip(&self) -> usize {
        self.skip
    }

    pub fn can_go_back(&self) -> bool {
        !self.history.is_empty()
    }

    /// Starts a new query against `scope` from the first page.
    pub fn submit(&mut self, scope: PageScope, query: impl Into<String>) {
        self.scope = scope;
        self.query = query.into();
        self.skip = 0;
        self.history.clear();
    }

    /// Moves past the `shown` results of the current page. An empty page
    /// leaves the offset and history untouched.
    pub fn forward(&mut self, shown: usize) -> usize {
        if shown == 0 {
            return self.skip;
        }
        self.history.push(self.skip);
        self.skip += shown;
        self.skip
    }

    /// Returns to the previous page, if any.
    pub fn back(&mut self) -> Option<usize> {
        let previous = self.history.pop()?;
        self.skip = previous;
        Some(previous)
    }

    pub fn page(&self, index: &SearchIndex, config: &SearchConfig) -> SearchPage {
        index.search(&self.query, self.skip, config)
    }
}

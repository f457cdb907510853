use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use std::str::FromStr;

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::search::SearchIndex;

/// Page files that never show up in search.
const SKIPPED_PREFIXES: [&str; 3] = ["index", "various", "juvenile"];

const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Which section of the site a page list covers.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum PageScope {
    #[default]
    Gallery,
    Taxonomy,
    Sites,
}

impl PageScope {
    pub const ALL: [PageScope; 3] = [PageScope::Gallery, PageScope::Taxonomy, PageScope::Sites];

    pub fn as_str(&self) -> &'static str {
        match self {
            PageScope::Gallery => "gallery",
            PageScope::Taxonomy => "taxonomy",
            PageScope::Sites => "sites",
        }
    }

    pub fn path_prefix(&self) -> &'static str {
        match self {
            PageScope::Gallery => "/gallery",
            PageScope::Taxonomy => "/taxonomy",
            PageScope::Sites => "/sites",
        }
    }
}

impl fmt::Display for PageScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PageScope {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        PageScope::ALL
            .into_iter()
            .find(|scope| scope.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| {
                format!("unknown scope {value:?} (expected gallery, taxonomy or sites)")
            })
    }
}

/// Turns a page file name into its searchable title.
///
/// `Blue-Tang.html` becomes `Blue Tang`; dates keep their hyphens, so
/// `Breakwater-2021-09-12.html` becomes `Breakwater 2021-09-12`. Index and
/// aggregate pages yield `None`.
pub fn page_title(file_name: &str) -> Option<String> {
    if !file_name.ends_with(".html") {
        return None;
    }
    if SKIPPED_PREFIXES
        .iter()
        .any(|prefix| file_name.starts_with(prefix))
    {
        return None;
    }
    let title = file_name.replace(".html", "").replace('-', " ");
    Some(restore_dates(&title))
}

/// Rewrites every `YYYY MM DD` run as `YYYY-MM-DD`, left to right.
fn restore_dates(title: &str) -> String {
    const SHAPE: &[u8; 10] = b"dddd dd dd";
    let mut chars: Vec<char> = title.chars().collect();
    let mut at = 0;
    while at + SHAPE.len() <= chars.len() {
        let is_date = SHAPE
            .iter()
            .zip(&chars[at..at + SHAPE.len()])
            .all(|(shape, c)| match shape {
                b'd' => c.is_ascii_digit(),
                _ => *c == ' ',
            });
        if is_date {
            chars[at + 4] = '-';
            chars[at + 7] = '-';
            at += SHAPE.len();
        } else {
            at += 1;
        }
    }
    chars.into_iter().collect()
}

/// Site path for a page title: `/gallery/Blue-Tang`.
pub fn page_url(scope: PageScope, title: &str) -> String {
    let slug = title.replace(' ', "-");
    format!(
        "{}/{}",
        scope.path_prefix(),
        utf8_percent_encode(&slug, PATH_SEGMENT)
    )
}

/// Capitalizes the first letter of every space-separated word and lowers
/// the rest.
pub fn title_case(text: &str) -> String {
    text.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Searchable titles of every page in `dir`, sorted by file name.
pub fn page_titles(dir: &Path) -> io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_string());
        }
    }
    names.sort();
    let titles: Vec<String> = names.iter().filter_map(|name| page_title(name)).collect();
    debug!(dir = %dir.display(), files = names.len(), titles = titles.len(), "read page titles");
    Ok(titles)
}

impl SearchIndex {
    /// Builds the index for `scope` from a generated site rooted at `root`.
    pub fn from_site_dir(root: &Path, scope: PageScope) -> io::Result<Self> {
        let titles = page_titles(&root.join(scope.as_str()))?;
        Ok(SearchIndex::new(scope, titles))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::SearchConfig;
    use std::path::PathBuf;

    struct TempSite {
        root: PathBuf,
    }

    impl TempSite {
        fn new(label: &str) -> Self {
            let root = std::env::temp_dir().join(format!(
                "detective-pages-{label}-{}",
                std::process::id()
            ));
            let _ = fs::remove_dir_all(&root);
            fs::create_dir_all(&root).expect("create temp site");
            Self { root }
        }

        fn touch(&self, scope: &str, file: &str) {
            let dir = self.root.join(scope);
            fs::create_dir_all(&dir).expect("create scope dir");
            fs::write(dir.join(file), "<html></html>").expect("write page");
        }
    }

    impl Drop for TempSite {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.root);
        }
    }

    #[test]
    fn titles_drop_extension_and_hyphens() {
        assert_eq!(page_title("Blue-Tang.html").as_deref(), Some("Blue Tang"));
        assert_eq!(page_title("Octopus.html").as_deref(), Some("Octopus"));
        assert_eq!(page_title("notes.txt"), None);
        assert_eq!(page_title("index.html"), None);
        assert_eq!(page_title("various-nudibranchs.html"), None);
        assert_eq!(page_title("juvenile-Garibaldi.html"), None);
    }

    #[test]
    fn dates_keep_their_hyphens() {
        assert_eq!(
            page_title("Monterey-Breakwater-2021-09-12.html").as_deref(),
            Some("Monterey Breakwater 2021-09-12")
        );
        assert_eq!(
            page_title("Bonaire-2019-03-01-2019-03-08.html").as_deref(),
            Some("Bonaire 2019-03-01 2019-03-08")
        );
        assert_eq!(page_title("Site-20-09-12.html").as_deref(), Some("Site 20 09 12"));
    }

    #[test]
    fn urls_hyphenate_and_escape() {
        assert_eq!(page_url(PageScope::Gallery, "Blue Tang"), "/gallery/Blue-Tang");
        assert_eq!(
            page_url(PageScope::Gallery, "Yellow Goat Fish"),
            "/gallery/Yellow-Goat-Fish"
        );
        assert_eq!(page_url(PageScope::Gallery, "Octopus"), "/gallery/Octopus");
        assert_eq!(
            page_url(PageScope::Taxonomy, "Scorpaenidae?"),
            "/taxonomy/Scorpaenidae%3F"
        );
    }

    #[test]
    fn title_case_normalizes_each_word() {
        assert_eq!(title_case("yellow goatfish"), "Yellow Goatfish");
        assert_eq!(title_case("Blue Tang"), "Blue Tang");
        assert_eq!(title_case("LIONFISH"), "Lionfish");
        assert_eq!(title_case("rEd LiOnFiSh"), "Red Lionfish");
        assert_eq!(title_case("octopus"), "Octopus");
    }

    #[test]
    fn scopes_parse_case_insensitively() {
        assert_eq!("Sites".parse::<PageScope>(), Ok(PageScope::Sites));
        assert_eq!(PageScope::Taxonomy.path_prefix(), "/taxonomy");
        assert!("blog".parse::<PageScope>().is_err());
    }

    #[test]
    fn site_directory_builds_a_sorted_index() {
        let site = TempSite::new("index");
        site.touch("gallery", "Red-Lionfish.html");
        site.touch("gallery", "Blue-Tang.html");
        site.touch("gallery", "index.html");
        site.touch("gallery", "style.css");

        let index = SearchIndex::from_site_dir(&site.root, PageScope::Gallery).expect("index");
        assert_eq!(index.entries(), ["Blue Tang", "Red Lionfish"]);
        let page = index.search("tang", 0, &SearchConfig::default());
        assert_eq!(page.results[0].url, "/gallery/Blue-Tang");

        assert!(SearchIndex::from_site_dir(&site.root, PageScope::Sites).is_err());
    }
}

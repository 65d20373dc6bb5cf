//! Spider definitions: which listing pages to harvest and how to read them.
//!
//! Spider files live in one directory (see [`crate::cli::Cli::config_dir`]).
//! Each `.json`, `.yaml` or `.yml` file describes a group of sources that share
//! the same page layout:
//!
//! ```json
//! {
//!   "urls": {
//!     "campus-news": "https://news.example.edu/xwzx/list.htm",
//!     "notices": "https://news.example.edu/tzgg/list.htm"
//!   },
//!   "titleSelector": [".arti_title", ".bt"],
//!   "timeSelector": ".arti_update",
//!   "textSelector": ".read"
//! }
//! ```
//!
//! Every selector may be a single CSS selector or an ordered list of
//! candidates. Missing or empty selectors fall back to the defaults below.
//! Selectors are compiled once here, so a typo surfaces at load time instead
//! of on every article.

use scraper::{ElementRef, Selector};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, error, info, instrument};
use url::Url;

pub const DEFAULT_LIST_SELECTOR: &str = ".wp_article_list .Article_Title a";
pub const DEFAULT_TITLE_SELECTOR: &str = ".bt";
pub const DEFAULT_TIME_SELECTOR: &str = ".arti_update";
pub const DEFAULT_TEXT_SELECTOR: &str = ".read";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid YAML in {}: {source}", path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("{field} {selector:?} is not a valid CSS selector: {reason}")]
    InvalidSelector {
        field: &'static str,
        selector: String,
        reason: String,
    },
    #[error("listing URL {url:?} of source {sub} is invalid: {source}")]
    InvalidListingUrl {
        sub: String,
        url: String,
        #[source]
        source: url::ParseError,
    },
}

/// A selector as written in a spider file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum SelectorSpec {
    Single(String),
    Candidates(Vec<String>),
}

impl SelectorSpec {
    fn into_candidates(self) -> Vec<String> {
        let raw = match self {
            SelectorSpec::Single(selector) => vec![selector],
            SelectorSpec::Candidates(selectors) => selectors,
        };
        raw.into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

impl From<&str> for SelectorSpec {
    fn from(selector: &str) -> Self {
        SelectorSpec::Single(selector.to_string())
    }
}

impl From<Vec<&str>> for SelectorSpec {
    fn from(selectors: Vec<&str>) -> Self {
        SelectorSpec::Candidates(selectors.into_iter().map(str::to_string).collect())
    }
}

/// The four selector fields of a spider file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectorSpecs {
    #[serde(default)]
    pub list_selector: Option<SelectorSpec>,
    #[serde(default)]
    pub title_selector: Option<SelectorSpec>,
    #[serde(default)]
    pub time_selector: Option<SelectorSpec>,
    #[serde(default)]
    pub text_selector: Option<SelectorSpec>,
}

/// An ordered, never-empty list of compiled candidate selectors.
#[derive(Debug, Clone)]
pub struct SelectorList {
    candidates: Vec<(String, Selector)>,
}

impl SelectorList {
    /// Compile `spec`, substituting `default` when it is absent or empty.
    pub fn compile(
        field: &'static str,
        spec: Option<SelectorSpec>,
        default: &str,
    ) -> Result<Self, ConfigError> {
        let mut raw = spec.map(SelectorSpec::into_candidates).unwrap_or_default();
        if raw.is_empty() {
            raw.push(default.to_string());
        }

        let candidates = raw
            .into_iter()
            .map(|source| {
                let parsed = Selector::parse(&source).map_err(|e| e.to_string());
                match parsed {
                    Ok(selector) => Ok((source, selector)),
                    Err(reason) => Err(ConfigError::InvalidSelector {
                        field,
                        selector: source,
                        reason,
                    }),
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { candidates })
    }

    /// The selector strings, in priority order.
    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.candidates.iter().map(|(source, _)| source.as_str())
    }

    /// First element matched by the first candidate that matches anything.
    pub fn first_match<'a>(&self, root: ElementRef<'a>) -> Option<ElementRef<'a>> {
        self.candidates
            .iter()
            .find_map(|(_, selector)| root.select(selector).next())
    }

    /// Every element matched by the first candidate that matches anything.
    pub fn all_matches<'a>(&self, root: ElementRef<'a>) -> Vec<ElementRef<'a>> {
        self.candidates
            .iter()
            .map(|(_, selector)| root.select(selector).collect::<Vec<_>>())
            .find(|matches| !matches.is_empty())
            .unwrap_or_default()
    }
}

/// Everything needed to harvest one source.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Source key stored with every record.
    pub sub: String,
    pub listing_url: String,
    pub list_selector: SelectorList,
    pub title_selector: SelectorList,
    pub time_selector: SelectorList,
    pub text_selector: SelectorList,
}

impl CrawlConfig {
    pub fn new(
        sub: impl Into<String>,
        listing_url: impl Into<String>,
        specs: SelectorSpecs,
    ) -> Result<Self, ConfigError> {
        let sub = sub.into();
        let listing_url = listing_url.into();
        if let Err(source) = Url::parse(&listing_url) {
            return Err(ConfigError::InvalidListingUrl {
                sub,
                url: listing_url,
                source,
            });
        }

        Ok(Self {
            list_selector: SelectorList::compile(
                "listSelector",
                specs.list_selector,
                DEFAULT_LIST_SELECTOR,
            )?,
            title_selector: SelectorList::compile(
                "titleSelector",
                specs.title_selector,
                DEFAULT_TITLE_SELECTOR,
            )?,
            time_selector: SelectorList::compile(
                "timeSelector",
                specs.time_selector,
                DEFAULT_TIME_SELECTOR,
            )?,
            text_selector: SelectorList::compile(
                "textSelector",
                specs.text_selector,
                DEFAULT_TEXT_SELECTOR,
            )?,
            sub,
            listing_url,
        })
    }
}

/// On-disk layout of a spider file.
#[derive(Debug, Deserialize)]
struct SpiderFile {
    urls: BTreeMap<String, String>,
    #[serde(flatten)]
    selectors: SelectorSpecs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Yaml,
}

impl Format {
    fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "json" => Some(Format::Json),
            "yaml" | "yml" => Some(Format::Yaml),
            _ => None,
        }
    }
}

fn parse_spider(path: &Path, text: &str, format: Format) -> Result<Vec<CrawlConfig>, ConfigError> {
    let spider: SpiderFile = match format {
        Format::Json => serde_json::from_str(text).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?,
        Format::Yaml => serde_yaml::from_str(text).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })?,
    };

    spider
        .urls
        .into_iter()
        .map(|(sub, url)| CrawlConfig::new(sub, url, spider.selectors.clone()))
        .collect()
}

/// Load the sources defined in one spider file.
#[instrument(level = "debug", skip_all, fields(path = %path.display()))]
pub async fn load_spider_file(path: &Path) -> Result<Vec<CrawlConfig>, ConfigError> {
    let format = Format::from_path(path).unwrap_or(Format::Json);
    let text = fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    let configs = parse_spider(path, &text, format)?;
    for config in &configs {
        debug!(
            sub = %config.sub,
            listing_url = %config.listing_url,
            title = ?config.title_selector.sources().collect::<Vec<_>>(),
            "Parsed source"
        );
    }
    Ok(configs)
}

/// Load every spider file in `dir`, in file name order.
///
/// Files that fail to load are logged and skipped so one broken definition
/// does not stop the remaining sources. Only an unreadable directory is an
/// error.
#[instrument(level = "info", skip_all, fields(dir = %dir.display()))]
pub async fn load_spider_dir(dir: &Path) -> Result<Vec<CrawlConfig>, ConfigError> {
    let io_err = |source| ConfigError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut entries = fs::read_dir(dir).await.map_err(io_err)?;
    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
        let path = entry.path();
        if Format::from_path(&path).is_some() {
            paths.push(path);
        }
    }
    paths.sort();

    let mut configs = Vec::new();
    for path in paths {
        match load_spider_file(&path).await {
            Ok(mut loaded) => configs.append(&mut loaded),
            Err(e) => error!(path = %path.display(), error = %e, "Skipping spider file"),
        }
    }

    info!(count = configs.len(), "Loaded source configurations");
    Ok(configs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    fn sources(list: &SelectorList) -> Vec<&str> {
        list.sources().collect()
    }

    #[test]
    fn test_defaults_apply_when_absent() {
        let config =
            CrawlConfig::new("news", "https://a.com/list.htm", SelectorSpecs::default()).unwrap();

        assert_eq!(sources(&config.list_selector), vec![DEFAULT_LIST_SELECTOR]);
        assert_eq!(sources(&config.title_selector), vec![DEFAULT_TITLE_SELECTOR]);
        assert_eq!(sources(&config.time_selector), vec![DEFAULT_TIME_SELECTOR]);
        assert_eq!(sources(&config.text_selector), vec![DEFAULT_TEXT_SELECTOR]);
    }

    #[test]
    fn test_empty_specs_fall_back_to_default() {
        let specs = SelectorSpecs {
            title_selector: Some(SelectorSpec::Candidates(vec![])),
            text_selector: Some("  ".into()),
            ..Default::default()
        };
        let config = CrawlConfig::new("news", "https://a.com/list.htm", specs).unwrap();

        assert_eq!(sources(&config.title_selector), vec![DEFAULT_TITLE_SELECTOR]);
        assert_eq!(sources(&config.text_selector), vec![DEFAULT_TEXT_SELECTOR]);
    }

    #[test]
    fn test_invalid_selector_is_rejected() {
        let specs = SelectorSpecs {
            time_selector: Some("div[[".into()),
            ..Default::default()
        };
        let err = CrawlConfig::new("news", "https://a.com/list.htm", specs).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidSelector { field: "timeSelector", .. }
        ));
    }

    #[test]
    fn test_invalid_listing_url_is_rejected() {
        let err = CrawlConfig::new("news", "list.htm", SelectorSpecs::default()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidListingUrl { .. }));
    }

    #[test]
    fn test_first_match_walks_candidates() {
        let list = SelectorList::compile(
            "titleSelector",
            Some(vec![".missing", ".bt"].into()),
            DEFAULT_TITLE_SELECTOR,
        )
        .unwrap();
        let doc = Html::parse_document(r#"<div class="bt">Found</div><div class="bt">Second</div>"#);

        let found = list.first_match(doc.root_element()).unwrap();
        assert_eq!(found.text().collect::<String>(), "Found");
    }

    #[test]
    fn test_all_matches_uses_first_matching_candidate() {
        let list = SelectorList::compile(
            "listSelector",
            Some(vec![".none a", ".list a", "a"].into()),
            DEFAULT_LIST_SELECTOR,
        )
        .unwrap();
        let doc = Html::parse_document(
            r#"<ul class="list"><li><a href="1.htm">1</a></li><li><a href="2.htm">2</a></li></ul>
               <a href="other.htm">other</a>"#,
        );

        let matches = list.all_matches(doc.root_element());
        assert_eq!(matches.len(), 2);
    }

    #[test]
    fn test_parse_json_spider() {
        let text = r#"{
            "urls": { "b-news": "https://b.com/list.htm", "a-news": "https://a.com/list.htm" },
            "titleSelector": [".arti_title", ".bt"],
            "textSelector": ".content"
        }"#;
        let configs = parse_spider(Path::new("spider.json"), text, Format::Json).unwrap();

        assert_eq!(configs.len(), 2);
        assert_eq!(configs[0].sub, "a-news");
        assert_eq!(configs[0].listing_url, "https://a.com/list.htm");
        assert_eq!(sources(&configs[0].title_selector), vec![".arti_title", ".bt"]);
        assert_eq!(sources(&configs[1].text_selector), vec![".content"]);
        assert_eq!(sources(&configs[1].time_selector), vec![DEFAULT_TIME_SELECTOR]);
    }

    #[test]
    fn test_parse_yaml_spider() {
        let text = "urls:\n  news: https://a.com/list.htm\nlistSelector:\n  - .list a\n  - a\n";
        let configs = parse_spider(Path::new("spider.yaml"), text, Format::Yaml).unwrap();

        assert_eq!(configs.len(), 1);
        assert_eq!(sources(&configs[0].list_selector), vec![".list a", "a"]);
    }

    #[tokio::test]
    async fn test_load_spider_dir_skips_broken_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("a.json"),
            r#"{ "urls": { "good": "https://a.com/list.htm" } }"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("b.json"), "{ not json").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        std::fs::write(
            dir.path().join("c.yml"),
            "urls:\n  yaml-source: https://c.com/list.htm\n",
        )
        .unwrap();

        let configs = load_spider_dir(dir.path()).await.unwrap();
        let subs: Vec<&str> = configs.iter().map(|c| c.sub.as_str()).collect();
        assert_eq!(subs, vec!["good", "yaml-source"]);
    }

    #[tokio::test]
    async fn test_load_spider_dir_missing_dir_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(
            load_spider_dir(&missing).await,
            Err(ConfigError::Io { .. })
        ));
    }
}

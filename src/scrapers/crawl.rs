//! One harvesting pass over a configured source.
//!
//! A pass runs these steps in order:
//!
//! 1. fetch the listing page (failure aborts the pass)
//! 2. collect `.htm` article links matched by the list selector
//! 3. drop links already stored for this source
//! 4. order the rest oldest first
//! 5. fetch, extract and store each article in turn
//!
//! An article whose fetch fails is skipped for this pass and retried on the
//! next one, since it was never stored. A storage failure aborts the pass.

use chrono::{DateTime, Utc};
use scraper::Html;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, error, info, instrument};
use url::Url;

use super::dates::HighWaterMark;
use super::dedup::{distinct, filter_unseen};
use super::extract::extract;
use super::fetch::{FetchError, PageFetcher};
use super::resolve::resolve;
use super::schedule::order;
use crate::config::{CrawlConfig, SelectorList};
use crate::models::{DateOrigin, NewsRecord};
use crate::store::{PersistenceError, RecordStore};
use crate::utils::truncate_for_log;

/// Only links to pages with this extension are treated as articles.
pub const ARTICLE_EXTENSION: &str = "htm";

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("listing page of {sub} could not be fetched: {source}")]
    Listing {
        sub: String,
        #[source]
        source: FetchError,
    },
    #[error("looking up stored articles of {sub} failed: {source}")]
    Lookup {
        sub: String,
        #[source]
        source: PersistenceError,
    },
    #[error(
        "storing {href} for {sub} failed after {} new record(s): {source}",
        .partial.stored()
    )]
    Persistence {
        sub: String,
        href: String,
        /// Outcomes of the articles processed before the failure.
        partial: CrawlSummary,
        #[source]
        source: PersistenceError,
    },
}

/// What happened to one scheduled article.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArticleOutcome {
    Stored {
        href: String,
        published_at: DateTime<Utc>,
        date_origin: DateOrigin,
    },
    FetchFailed {
        href: String,
        reason: String,
    },
}

/// Result of a completed pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlSummary {
    pub sub: String,
    /// Distinct article links on the listing page.
    pub discovered: usize,
    /// Links skipped because they were already stored.
    pub already_stored: usize,
    /// One entry per scheduled article, in processing order.
    pub outcomes: Vec<ArticleOutcome>,
}

impl CrawlSummary {
    pub fn stored(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, ArticleOutcome::Stored { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.stored()
    }
}

/// State of a single pass. Nothing here outlives the pass.
#[derive(Debug)]
pub struct CrawlSession<'a> {
    config: &'a CrawlConfig,
    /// Every distinct article link found on the listing page.
    discovered: Vec<String>,
    /// Links not yet stored, oldest first.
    pending: Vec<String>,
    clock: HighWaterMark,
}

impl<'a> CrawlSession<'a> {
    pub fn new(config: &'a CrawlConfig) -> Self {
        Self {
            config,
            discovered: Vec::new(),
            pending: Vec::new(),
            clock: HighWaterMark::new(),
        }
    }

    pub fn listing_url(&self) -> &str {
        &self.config.listing_url
    }

    pub fn discovered(&self) -> &[String] {
        &self.discovered
    }

    pub fn pending(&self) -> &[String] {
        &self.pending
    }

    pub fn high_water_mark(&self) -> Option<DateTime<Utc>> {
        self.clock.latest()
    }
}

/// Article links on a listing page, resolved against `listing_url`.
///
/// Elements without an `href`, links that do not resolve and links whose path
/// does not end in `.htm` are dropped. Repeats are kept.
pub fn discover_links(html: &str, list_selector: &SelectorList, listing_url: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    list_selector
        .all_matches(document.root_element())
        .into_iter()
        .filter_map(|el| el.value().attr("href"))
        .filter_map(|href| resolve(listing_url, href))
        .filter(|url| is_article_link(url))
        .collect()
}

fn is_article_link(url: &str) -> bool {
    Url::parse(url).is_ok_and(|parsed| {
        Path::new(parsed.path())
            .extension()
            .is_some_and(|ext| ext == ARTICLE_EXTENSION)
    })
}

fn build_record(
    config: &CrawlConfig,
    clock: &mut HighWaterMark,
    href: &str,
    html: &str,
) -> NewsRecord {
    let article = extract(html, config, href);
    let (published_at, date_origin) = clock.normalize(article.date);

    NewsRecord {
        sub: config.sub.clone(),
        title: article.title,
        body: article.body_html,
        published_at,
        date_origin,
        href: href.to_string(),
        attachments: article.attachments,
        harvested_at: Utc::now(),
    }
}

/// Run one pass over the source described by `config`.
///
/// Articles are fetched one at a time, never concurrently.
///
/// # Arguments
///
/// * `config` - The source: listing URL and selectors
/// * `fetcher` - Fetches the listing page and every scheduled article
/// * `store` - Queried for already stored hrefs and written to per article
///
/// # Returns
///
/// A [`CrawlSummary`] with one outcome per scheduled article. Fails with
/// [`CrawlError::Listing`] or [`CrawlError::Lookup`] before any article is
/// fetched, or with [`CrawlError::Persistence`] carrying the outcomes
/// gathered up to the failed write.
#[instrument(level = "info", skip_all, fields(sub = %config.sub))]
pub async fn run<F, S>(
    config: &CrawlConfig,
    fetcher: &F,
    store: &S,
) -> Result<CrawlSummary, CrawlError>
where
    F: PageFetcher,
    S: RecordStore,
{
    let mut session = CrawlSession::new(config);

    let listing = fetcher
        .fetch(session.listing_url())
        .await
        .map_err(|source| CrawlError::Listing {
            sub: config.sub.clone(),
            source,
        })?;

    session.discovered = distinct(discover_links(
        &listing,
        &config.list_selector,
        &config.listing_url,
    ));
    info!(count = session.discovered().len(), "Discovered article links");

    let unseen = filter_unseen(session.discovered(), &config.sub, store)
        .await
        .map_err(|source| CrawlError::Lookup {
            sub: config.sub.clone(),
            source,
        })?;
    session.pending = order(unseen);
    info!(count = session.pending().len(), "Articles to harvest");
    debug!(urls = ?session.pending(), "Harvest queue");

    let mut summary = CrawlSummary {
        sub: config.sub.clone(),
        discovered: session.discovered.len(),
        already_stored: session.discovered.len() - session.pending.len(),
        outcomes: Vec::with_capacity(session.pending.len()),
    };

    for href in &session.pending {
        let html = match fetcher.fetch(href).await {
            Ok(html) => html,
            Err(e) => {
                error!(%href, error = %e, "Article fetch failed; skipping");
                summary.outcomes.push(ArticleOutcome::FetchFailed {
                    href: href.clone(),
                    reason: e.to_string(),
                });
                continue;
            }
        };

        let record = build_record(config, &mut session.clock, href, &html);
        if let Err(source) = store.create(&record).await {
            return Err(CrawlError::Persistence {
                sub: config.sub.clone(),
                href: href.clone(),
                partial: summary,
                source,
            });
        }

        info!(
            %href,
            title = %truncate_for_log(&record.title, 60),
            published_at = %record.published_at,
            date_origin = ?record.date_origin,
            attachments = record.attachments.len(),
            "Stored article"
        );
        summary.outcomes.push(ArticleOutcome::Stored {
            href: record.href,
            published_at: record.published_at,
            date_origin: record.date_origin,
        });
    }

    info!(
        discovered = summary.discovered,
        already_stored = summary.already_stored,
        stored = summary.stored(),
        failed = summary.failed(),
        high_water_mark = ?session.high_water_mark(),
        "Finished source"
    );
    Ok(summary)
}

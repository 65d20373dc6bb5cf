//! Data models for harvested articles.
//!
//! - [`NewsRecord`]: one persisted article, written once and never updated
//! - [`DateOrigin`]: whether a record's timestamp was read from the page
//!
//! Records serialize with camelCase field names, one JSON object per line in
//! the record store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a record's `published_at` came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateOrigin {
    /// Parsed from the article's date element.
    Parsed,
    /// The session's high-water mark, because the page had no usable date.
    Fallback,
}

/// A harvested article.
///
/// `(sub, href)` identifies a record; the same article URL may exist under
/// several sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsRecord {
    /// Source key of the spider that found the article.
    pub sub: String,
    /// Headline with every whitespace character removed.
    pub title: String,
    /// Inner HTML of the article body element, empty if none matched.
    pub body: String,
    /// Publication time. Only a real date when `date_origin` is `Parsed`.
    pub published_at: DateTime<Utc>,
    pub date_origin: DateOrigin,
    /// Absolute article URL.
    pub href: String,
    /// Absolute URLs of images in the body, in document order.
    #[serde(default)]
    pub attachments: Vec<String>,
    /// When this record was created.
    pub harvested_at: DateTime<Utc>,
}

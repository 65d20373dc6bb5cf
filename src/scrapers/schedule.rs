//! Oldest-first ordering of the articles a session is about to fetch.
//!
//! The date is guessed from the URL alone, before anything is fetched. Older
//! articles go first so the session's high-water mark only moves forward.

use chrono::NaiveDate;
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// URL date patterns in priority order.
static URL_DATE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(\d{4})(\d{2})(\d{2})",
        r"(\d{4})-(\d{2})-(\d{2})",
        r"(\d{4})/(\d{2})/(\d{2})",
        r"(\d{4})_(\d{2})_(\d{2})",
        r"(\d{4})年(\d{1,2})月(\d{1,2})日",
    ]
    .into_iter()
    .map(|pattern| Regex::new(pattern).unwrap())
    .collect()
});

/// Best-effort calendar date embedded in `url`.
///
/// Patterns are tried in priority order; within a pattern the first match
/// that is a real calendar date wins, so an eight-digit article id such as
/// `12345678` is not mistaken for a date. Matches may overlap: in
/// `120230505` the invalid `12023050` is rejected and `20230505` is found.
pub fn infer_url_date(url: &str) -> Option<NaiveDate> {
    URL_DATE_PATTERNS
        .iter()
        .find_map(|re| first_valid_date(re, url))
}

/// Try a match at every start offset, left to right.
fn first_valid_date(re: &Regex, url: &str) -> Option<NaiveDate> {
    let mut start = 0;
    while let Some(caps) = re.captures_at(url, start) {
        if let Some(date) = calendar_date(&caps) {
            return Some(date);
        }
        let whole = caps.get(0)?;
        start = whole.start() + url[whole.start()..].chars().next()?.len_utf8();
    }
    None
}

fn calendar_date(caps: &Captures) -> Option<NaiveDate> {
    let year = caps[1].parse().ok()?;
    let month = caps[2].parse().ok()?;
    let day = caps[3].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Sort `urls` oldest first.
///
/// URLs without a recognizable date sort before every dated one. The sort is
/// stable, so ties keep their discovery order.
pub fn order(urls: Vec<String>) -> Vec<String> {
    urls.into_iter()
        .sorted_by_cached_key(|url| infer_url_date(url))
        .collect()
}

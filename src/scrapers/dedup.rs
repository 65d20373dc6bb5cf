//! Filtering discovered article URLs down to the ones not yet stored.

use itertools::Itertools;
use tracing::{debug, instrument};

use crate::store::{PersistenceError, RecordStore};

/// Drop repeated URLs, keeping the first occurrence.
pub fn distinct(urls: Vec<String>) -> Vec<String> {
    urls.into_iter().unique().collect()
}

/// `discovered` minus the hrefs `store` already holds for `sub`.
///
/// Discovery order is preserved; ordering for fetching happens later.
///
/// # Arguments
///
/// * `discovered` - Distinct article URLs from the listing page
/// * `sub` - Source whose stored records are checked; other sources never match
/// * `store` - Record store queried once for the whole batch
///
/// # Returns
///
/// The URLs with no stored record for `sub`, or the store's lookup error.
#[instrument(level = "debug", skip_all, fields(%sub, discovered = discovered.len()))]
pub async fn filter_unseen<S: RecordStore>(
    discovered: &[String],
    sub: &str,
    store: &S,
) -> Result<Vec<String>, PersistenceError> {
    if discovered.is_empty() {
        return Ok(Vec::new());
    }

    let existing = store.find_existing_hrefs(sub, discovered).await?;
    let unseen: Vec<String> = discovered
        .iter()
        .filter(|href| !existing.contains(*href))
        .cloned()
        .collect();

    debug!(existing = existing.len(), unseen = unseen.len(), "Filtered stored articles");
    Ok(unseen)
}

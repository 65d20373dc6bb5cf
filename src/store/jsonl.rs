//! Append-only JSON-lines record store.
//!
//! Each record is one line of camelCase JSON. The file is only ever appended
//! to; records are never rewritten.
//!
//! ```text
//! {"sub":"campus","title":"...","body":"<p>...</p>","publishedAt":"2023-05-05T00:00:00Z",...}
//! {"sub":"campus","title":"...","body":"","publishedAt":"2023-05-05T00:00:00Z",...}
//! ```
//!
//! On open the `(sub, href)` pairs of the existing file are loaded into an
//! in-memory index, so duplicate lookups never rescan the file.
//!
//! A write interrupted mid-line leaves an unparsable last line. Open drops
//! that line from the file with a warning. Any other unparsable line is
//! reported as [`PersistenceError::Corrupt`]. Appends first terminate a last
//! line that is missing its newline.

use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use super::{PersistenceError, RecordStore};
use crate::models::NewsRecord;

/// Just the identifying fields of a stored line.
#[derive(Debug, Deserialize)]
struct StoredKey {
    sub: String,
    href: String,
}

/// `sub` → hrefs already stored for it.
type HrefIndex = HashMap<String, HashSet<String>>;

#[derive(Debug)]
pub struct JsonlStore {
    path: PathBuf,
    index: Mutex<HrefIndex>,
}

impl JsonlStore {
    /// Open the store at `path`, loading its index. A missing file is an empty
    /// store; it is created on the first write.
    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let path = path.as_ref().to_path_buf();
        let mut index = HrefIndex::new();

        match fs::read_to_string(&path).await {
            Ok(contents) => {
                let mut offset = 0;
                for (idx, raw) in contents.split_inclusive('\n').enumerate() {
                    let start = offset;
                    offset += raw.len();
                    let line = raw.trim_end_matches(['\n', '\r']);
                    if line.trim().is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<StoredKey>(line) {
                        Ok(key) => {
                            index.entry(key.sub).or_default().insert(key.href);
                        }
                        Err(source) if contents[offset..].trim().is_empty() => {
                            warn!(
                                line = idx + 1,
                                error = %source,
                                "Dropping unparsable last line of store file"
                            );
                            OpenOptions::new()
                                .write(true)
                                .open(&path)
                                .await?
                                .set_len(start as u64)
                                .await?;
                            break;
                        }
                        Err(source) => {
                            return Err(PersistenceError::Corrupt {
                                path: path.display().to_string(),
                                line: idx + 1,
                                source,
                            });
                        }
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Store file does not exist yet");
            }
            Err(e) => return Err(e.into()),
        }

        let total: usize = index.values().map(HashSet::len).sum();
        info!(records = total, sources = index.len(), "Opened record store");
        Ok(Self {
            path,
            index: Mutex::new(index),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordStore for JsonlStore {
    async fn find_existing_hrefs(
        &self,
        sub: &str,
        candidates: &[String],
    ) -> Result<HashSet<String>, PersistenceError> {
        let index = self.index.lock().await;
        let Some(stored) = index.get(sub) else {
            return Ok(HashSet::new());
        };
        Ok(candidates
            .iter()
            .filter(|href| stored.contains(*href))
            .cloned()
            .collect())
    }

    async fn create(&self, record: &NewsRecord) -> Result<(), PersistenceError> {
        // Held across the write so the file and the index never disagree.
        let mut index = self.index.lock().await;
        if index
            .get(&record.sub)
            .is_some_and(|hrefs| hrefs.contains(&record.href))
        {
            return Err(PersistenceError::Duplicate {
                sub: record.sub.clone(),
                href: record.href.clone(),
            });
        }

        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)
            .await?;
        if !ends_with_newline(&mut file).await? {
            warn!(path = %self.path.display(), "Store file lacks a final newline; adding one");
            line.insert(0, '\n');
        }
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        index
            .entry(record.sub.clone())
            .or_default()
            .insert(record.href.clone());
        debug!(sub = %record.sub, href = %record.href, "Stored record");
        Ok(())
    }
}

/// Whether the file is empty or its last byte is `\n`.
async fn ends_with_newline(file: &mut File) -> io::Result<bool> {
    if file.metadata().await?.len() == 0 {
        return Ok(true);
    }
    file.seek(SeekFrom::End(-1)).await?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last).await?;
    Ok(last[0] == b'\n')
}

// SPDX-FileCopyrightText: 2025 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! Page-level persistence of a database image in a key/value store.
//!
//! Layout under the prefix `kvvfs-<store>-`:
//!
//! - `sz`: database size in bytes, as decimal text
//! - `<n>`: page `n` (1-based), raw bytes
//!
//! The size key is written after the pages it covers, so a reader that sees a
//! size always finds every page it needs.

use std::sync::Arc;

use kvlite_kv::KvStore;
use tracing::{debug, trace};

use crate::error::{Error, Result};

/// Prefix shared by every key the engine writes.
pub(crate) const KEY_PREFIX: &str = "kvvfs-";

/// SQLite header offset of the big-endian page size.
const PAGE_SIZE_OFFSET: usize = 16;
const HEADER_LEN: usize = 100;

pub(crate) struct PageStore {
    kv: Arc<dyn KvStore>,
    store: String,
    prefix: String,
    /// Image as last written to or read from the store
    image: Vec<u8>,
    page_size: usize,
}

impl PageStore {
    pub(crate) fn new(kv: Arc<dyn KvStore>, store: &str) -> Self {
        Self {
            kv,
            store: store.to_owned(),
            prefix: format!("{KEY_PREFIX}{store}-"),
            image: Vec::new(),
            page_size: 0,
        }
    }

    fn size_key(&self) -> String {
        format!("{}sz", self.prefix)
    }

    fn page_key(&self, page: usize) -> String {
        format!("{}{page}", self.prefix)
    }

    fn corrupt(&self, reason: impl Into<String>) -> Error {
        Error::CorruptStore {
            store: self.store.clone(),
            reason: reason.into(),
        }
    }

    /// Reassemble the persisted image, or `None` if the store was never created.
    pub(crate) fn load(&mut self) -> Result<Option<Vec<u8>>> {
        let Some(raw) = self.kv.get(&self.size_key())? else {
            return Ok(None);
        };
        let size: usize = std::str::from_utf8(&raw)
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .ok_or_else(|| self.corrupt("size entry is not a number"))?;

        // Grown page by page; the size entry is untrusted until every page is found.
        let mut image = Vec::new();
        let mut page = 1;
        while image.len() < size {
            let data = self
                .kv
                .get(&self.page_key(page))?
                .ok_or_else(|| self.corrupt(format!("page {page} is missing")))?;
            if data.is_empty() {
                return Err(self.corrupt(format!("page {page} is empty")));
            }
            image.extend_from_slice(&data);
            page += 1;
        }
        image.truncate(size);

        self.page_size = if image.is_empty() {
            0
        } else {
            page_size_of(&image).map_err(|reason| self.corrupt(reason))?
        };
        self.image = image.clone();
        debug!(
            "Loaded {} bytes ({} pages) from store {}",
            size,
            page - 1,
            self.store
        );
        Ok(Some(image))
    }

    /// Persist `image`, rewriting only the pages that changed.
    ///
    /// Returns the number of pages written.
    pub(crate) fn store(&mut self, image: &[u8]) -> Result<usize> {
        let page_size = if image.is_empty() {
            0
        } else {
            page_size_of(image).map_err(|reason| self.corrupt(reason))?
        };
        // A changed page size (VACUUM) shifts every page boundary, and a
        // cleared store has lost every page.
        let cleared = self.kv.get(&self.size_key())?.is_none();
        let rewrite_all = page_size != self.page_size || cleared;

        let mut written = 0;
        if page_size > 0 {
            for (index, chunk) in image.chunks(page_size).enumerate() {
                let start = index * page_size;
                let unchanged = !rewrite_all
                    && self.image.get(start..start + chunk.len()) == Some(chunk);
                if unchanged {
                    continue;
                }
                self.kv.set(&self.page_key(index + 1), chunk)?;
                written += 1;
            }
        }
        let sized_unchanged = image.len() == self.image.len() && !rewrite_all;
        if written > 0 || !sized_unchanged {
            self.kv
                .set(&self.size_key(), image.len().to_string().as_bytes())?;
        }

        let old_pages = page_count(self.image.len(), self.page_size);
        let new_pages = page_count(image.len(), page_size);
        for page in new_pages + 1..=old_pages {
            self.kv.remove(&self.page_key(page))?;
        }

        if written > 0 {
            trace!(
                "Wrote {written} of {new_pages} pages to store {}",
                self.store
            );
        }
        self.image = image.to_vec();
        self.page_size = page_size;
        Ok(written)
    }

    /// Bytes used by this store's keys and values.
    #[cfg(test)]
    pub(crate) fn size(&self) -> Result<u64> {
        Ok(self.kv.size_of_prefix(&self.prefix)?)
    }
}

fn page_count(len: usize, page_size: usize) -> usize {
    if page_size == 0 {
        0
    } else {
        len.div_ceil(page_size)
    }
}

fn page_size_of(image: &[u8]) -> std::result::Result<usize, String> {
    if image.len() < HEADER_LEN {
        return Err(format!("image of {} bytes has no header", image.len()));
    }
    let raw = u16::from_be_bytes([image[PAGE_SIZE_OFFSET], image[PAGE_SIZE_OFFSET + 1]]);
    let size = if raw == 1 { 65536 } else { usize::from(raw) };
    if size < 512 || !size.is_power_of_two() {
        return Err(format!("invalid page size {size}"));
    }
    Ok(size)
}

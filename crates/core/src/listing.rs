//! Directory emulation over prefix listings
//!
//! A "directory" is a key prefix ending in `/`. Listing one issues delimited
//! prefix listings, page by page, and turns returned keys into file entries
//! and returned common prefixes into directory entries.

use std::time::Duration;

use jiff::Timestamp;
use jiff::civil::DateTime;
use jiff::tz::TimeZone;
use serde::{Deserialize, Serialize};

use crate::classify::StoreResult;
use crate::error::{Error, Result};
use crate::resolver::DELIMITER;
use crate::store::{
    BucketAddress, ListPage, ListRequest, ObjectRecord, ServiceListing, StoreClient, timed,
};

/// Name of the synthetic parent-directory entry
pub const PARENT_DIRECTORY: &str = "..";

/// How many entries a listing asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListLimit {
    /// Walk every page
    #[default]
    Unbounded,
    /// Stop paging once this many items have been seen
    AtMost(u32),
    /// A single one-key request; only the existence answer matters
    ExistenceProbe,
}

impl ListLimit {
    /// Per-request key limit
    pub const fn max_keys(self) -> Option<u32> {
        match self {
            ListLimit::Unbounded => None,
            ListLimit::AtMost(n) => Some(n),
            ListLimit::ExistenceProbe => Some(1),
        }
    }
}

/// Kind of a directory entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
    /// Synthetic `..` marker
    Parent,
}

/// One entry of a directory listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    /// Last path segment, never empty and never containing `/`
    pub name: String,

    pub kind: EntryKind,

    /// Size in bytes (None for directories)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,

    /// Human-readable size
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_human: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<Timestamp>,

    /// Owner display name, else owner id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

impl DirEntry {
    pub fn file(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::File,
            size_bytes: Some(size),
            size_human: Some(humansize::format_size(size, humansize::BINARY)),
            last_modified: None,
            owner: None,
        }
    }

    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::Directory,
            size_bytes: None,
            size_human: None,
            last_modified: None,
            owner: None,
        }
    }

    pub fn parent() -> Self {
        Self {
            kind: EntryKind::Parent,
            ..Self::directory(PARENT_DIRECTORY)
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self.kind, EntryKind::Directory | EntryKind::Parent)
    }

    pub fn is_parent(&self) -> bool {
        self.kind == EntryKind::Parent
    }
}

/// Owner token: display name if the store gave one, else the id
pub fn owner_token(id: Option<&str>, display_name: Option<&str>) -> Option<String> {
    display_name
        .filter(|n| !n.is_empty())
        .or(id.filter(|i| !i.is_empty()))
        .map(str::to_string)
}

/// Parse a listing timestamp
///
/// Only the leading `YYYY-MM-DDTHH:MM:SS` is read and taken as UTC; fractional
/// seconds and zone designators are ignored.
pub fn parse_listing_time(value: &str) -> Option<Timestamp> {
    let civil: DateTime = value.get(..19)?.parse().ok()?;
    civil.to_zoned(TimeZone::UTC).ok().map(|z| z.timestamp())
}

/// Last segment of a slash-separated name
fn last_segment(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// File entry for a listed key; `None` when the key has no name of its own
pub fn entry_from_record(record: &ObjectRecord) -> Option<DirEntry> {
    let name = last_segment(&record.key);
    if name.is_empty() {
        return None;
    }
    let mut entry = DirEntry::file(name, record.size);
    entry.last_modified = parse_listing_time(&record.last_modified);
    entry.owner = owner_token(
        record.owner_id.as_deref(),
        record.owner_display_name.as_deref(),
    );
    Some(entry)
}

/// Directory entry for a common prefix; `None` for degenerate prefixes
pub fn entry_from_prefix(prefix: &str) -> Option<DirEntry> {
    let trimmed = prefix.strip_suffix('/').unwrap_or(prefix);
    let name = last_segment(trimmed);
    (!name.is_empty()).then(|| DirEntry::directory(name))
}

/// Bucket entries from a service listing, optionally only the named one
pub fn entries_from_service(listing: &ServiceListing, name_filter: Option<&str>) -> Vec<DirEntry> {
    let owner = owner_token(
        listing.owner_id.as_deref(),
        listing.owner_display_name.as_deref(),
    );
    listing
        .buckets
        .iter()
        .filter(|b| !b.name.is_empty())
        .filter(|b| name_filter.is_none_or(|name| b.name == name))
        .map(|b| {
            let mut entry = DirEntry::directory(&b.name);
            entry.owner = owner.clone();
            entry
        })
        .collect()
}

/// Paging state of one prefix listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListCursor {
    pub prefix: String,
    pub delimiter: String,
    pub continuation: Option<String>,
    pub truncated: bool,
    /// Items (keys and prefixes) seen so far, named or not
    pub matched: usize,
    /// Keys seen so far; common prefixes do not count toward a limit
    pub keys: usize,
    pub pages: usize,
}

impl ListCursor {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            delimiter: DELIMITER.to_string(),
            continuation: None,
            truncated: false,
            matched: 0,
            keys: 0,
            pages: 0,
        }
    }

    /// Whether the store returned anything at all under the prefix
    pub fn any(&self) -> bool {
        self.matched > 0
    }

    fn request(&self, limit: ListLimit) -> ListRequest {
        ListRequest {
            prefix: self.prefix.clone(),
            delimiter: self.delimiter.clone(),
            continuation: self.continuation.clone(),
            max_keys: limit.max_keys(),
        }
    }

    /// Fold one page into the cursor, returning its materialized entries
    fn absorb(&mut self, page: ListPage) -> Vec<DirEntry> {
        self.pages += 1;
        self.matched += page.item_count();
        self.keys += page.contents.len();
        self.truncated = page.truncated;
        self.continuation = page.next_continuation;

        let files = page.contents.iter().filter_map(entry_from_record);
        let dirs = page
            .common_prefixes
            .iter()
            .filter_map(|p| entry_from_prefix(p));
        files.chain(dirs).collect()
    }

    /// Whether another page should be requested under `limit`
    fn wants_more(&self, limit: ListLimit) -> bool {
        if !self.truncated {
            return false;
        }
        match limit {
            ListLimit::Unbounded => true,
            ListLimit::AtMost(n) => self.keys < n as usize,
            ListLimit::ExistenceProbe => false,
        }
    }
}

/// Host hook consulted once per additional page
pub trait ListProgress: Send {
    /// Return `false` to stop the walk after `entries` entries
    fn next_page(&mut self, entries: usize) -> bool;
}

/// Progress hook that never cancels
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ListProgress for NoProgress {
    fn next_page(&mut self, _entries: usize) -> bool {
        true
    }
}

/// Walk a delimited prefix listing page by page
pub async fn walk(
    store: &dyn StoreClient,
    addr: &BucketAddress,
    cursor: &mut ListCursor,
    limit: ListLimit,
    timeout: Duration,
    progress: &mut dyn ListProgress,
) -> StoreResult<Vec<DirEntry>> {
    let mut entries = Vec::new();
    loop {
        let request = cursor.request(limit);
        let page = timed(timeout, store.list_bucket(addr, &request)).await?;
        let previous_token = cursor.continuation.clone();
        let page_items = page.item_count();
        entries.extend(cursor.absorb(page));

        tracing::debug!(
            bucket = %addr.bucket,
            prefix = %cursor.prefix,
            page = cursor.pages,
            items = page_items,
            truncated = cursor.truncated,
            "Listed page"
        );

        if !cursor.wants_more(limit) {
            break;
        }
        if page_items == 0 || cursor.continuation.is_none() || cursor.continuation == previous_token
        {
            tracing::warn!(
                bucket = %addr.bucket,
                prefix = %cursor.prefix,
                "Store reported a truncated listing without progress, stopping"
            );
            break;
        }
        if !progress.next_page(entries.len()) {
            tracing::debug!(prefix = %cursor.prefix, "Listing cancelled");
            break;
        }
    }
    Ok(entries)
}

/// Result of listing a directory
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Listing {
    pub entries: Vec<DirEntry>,
    pub exists: bool,
}

impl Listing {
    pub fn find(&self, name: &str) -> Option<&DirEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Entries without the parent marker
    pub fn children(&self) -> impl Iterator<Item = &DirEntry> {
        self.entries.iter().filter(|e| !e.is_parent())
    }
}

/// Decide existence for a finished walk and add the parent marker
///
/// `prefix` is the full prefix that was listed. With a `name_filter` a miss
/// is reported through [`Listing::exists`]; without one it is an error.
pub fn finish(
    path: &str,
    prefix: &str,
    cursor: &ListCursor,
    mut entries: Vec<DirEntry>,
    name_filter: Option<&str>,
) -> Result<Listing> {
    let exists = prefix.is_empty() || cursor.any();
    if !exists && name_filter.is_none() {
        return Err(Error::NotFound(format!("'{path}' does not exist")));
    }
    if exists && name_filter.is_none() {
        entries.push(DirEntry::parent());
    }
    Ok(Listing { entries, exists })
}

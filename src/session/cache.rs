use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;

use crate::id::PageId;
use crate::model::{Page, StateId};

/// Bounded collection of the pages rendered for one user.
///
/// Pages are ordered by publication. When publishing a new page exceeds the
/// bound, the page published longest ago is evicted. Publishing a page
/// whose id is already cached (a refreshed or continued page) replaces it
/// in place and counts as a new publication.
///
/// Readers receive `Arc<Page>` snapshots, so evicting a page never affects
/// a request that is still validating against it.
#[derive(Debug)]
pub struct StateCache {
    pages: LruCache<PageId, Arc<Page>>,
}

impl StateCache {
    /// Creates a cache holding at most `max_pages` pages (minimum one).
    pub fn new(max_pages: usize) -> Self {
        let capacity = NonZeroUsize::new(max_pages).unwrap_or(NonZeroUsize::MIN);
        Self {
            pages: LruCache::new(capacity),
        }
    }

    /// Publishes `page`, returning the id of the page evicted to make room.
    pub fn add_page(&mut self, page: Arc<Page>) -> Option<PageId> {
        let id = page.id();
        match self.pages.push(id, page) {
            Some((evicted, _)) if evicted != id => {
                tracing::debug!(page_id = %evicted, "evicted page");
                Some(evicted)
            }
            _ => None,
        }
    }

    /// Publishes a continuation of a cached page, merging its states into
    /// the cached page after dropping the states allocated before
    /// `keep_from`. A continuation of an evicted page is published as is.
    pub fn merge_page(&mut self, continuation: Page, keep_from: StateId) -> Arc<Page> {
        let merged = match self.pages.peek(&continuation.id()) {
            Some(cached) => {
                let mut merged = Page::clone(cached);
                merged.merge(continuation, keep_from);
                merged
            }
            None => continuation,
        };
        let merged = Arc::new(merged);
        self.add_page(Arc::clone(&merged));
        merged
    }

    /// Returns the page with `id`.
    pub fn page(&self, id: PageId) -> Option<Arc<Page>> {
        self.pages.peek(&id).cloned()
    }

    /// Returns the cached page created by the request carrying `parent_state_id`.
    pub fn find_by_parent(&self, parent_state_id: &str) -> Option<Arc<Page>> {
        self.pages
            .iter()
            .find(|(_, page)| page.parent_state_id() == Some(parent_state_id))
            .map(|(_, page)| Arc::clone(page))
    }

    /// Removes the page with `id`, returning `true` if it was cached.
    pub fn remove_page(&mut self, id: PageId) -> bool {
        self.pages.pop(&id).is_some()
    }

    /// Returns the cached page ids, most recently published first.
    pub fn page_ids(&self) -> Vec<PageId> {
        self.pages.iter().map(|(id, _)| *id).collect()
    }

    /// Returns the number of cached pages.
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// Returns `true` if no page is cached.
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Returns the maximum number of pages.
    pub fn capacity(&self) -> usize {
        self.pages.cap().get()
    }
}

use std::sync::Arc;

use parking_lot::Mutex;

use super::{SessionStore, SessionStoreExt, StateCache};
use crate::error::Error;
use crate::id::{PageId, PageIdGenerator, SequentialPageIdGenerator};
use crate::model::{Page, State, StateId};

const PAGES_ATTRIBUTE: &str = "state_guard.pages";
const GENERATOR_ATTRIBUTE: &str = "state_guard.page_id_generator";

enum IdSource {
    PerSession,
    Shared(Arc<dyn PageIdGenerator>),
}

/// Page-level operations over the page cache kept in each user session.
///
/// The cache is stored as a session attribute behind a mutex; every
/// mutation and its eviction happen under that lock. Readers get `Arc`
/// snapshots and never observe a page that is still being composed.
pub struct PageStore {
    max_pages: usize,
    ids: IdSource,
}

impl PageStore {
    /// Creates a store keeping at most `max_pages` pages per session.
    ///
    /// Page ids come from a [`SequentialPageIdGenerator`] kept in each
    /// session.
    pub fn new(max_pages: usize) -> Self {
        Self {
            max_pages,
            ids: IdSource::PerSession,
        }
    }

    /// Uses one generator shared by every session instead.
    pub fn with_generator(mut self, generator: Arc<dyn PageIdGenerator>) -> Self {
        self.ids = IdSource::Shared(generator);
        self
    }

    /// Returns the maximum number of pages per session.
    pub fn max_pages(&self) -> usize {
        self.max_pages
    }

    /// Allocates a fresh page id for `session`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AttributeType`] if the session holds a foreign value
    /// under the generator attribute.
    pub fn next_page_id(&self, session: &dyn SessionStore) -> Result<PageId, Error> {
        match &self.ids {
            IdSource::Shared(generator) => Ok(generator.next_page_id()),
            IdSource::PerSession => {
                let generator =
                    session.get_or_create(GENERATOR_ATTRIBUTE, SequentialPageIdGenerator::new)?;
                Ok(generator.next_page_id())
            }
        }
    }

    fn cache(&self, session: &dyn SessionStore) -> Result<Arc<Mutex<StateCache>>, Error> {
        session.get_or_create(PAGES_ATTRIBUTE, || Mutex::new(StateCache::new(self.max_pages)))
    }

    /// Publishes a completed page, evicting the oldest page if the session
    /// is full.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AttributeType`] if the session attribute is foreign.
    pub fn add_page(&self, session: &dyn SessionStore, page: Page) -> Result<Arc<Page>, Error> {
        let page = Arc::new(page);
        let cache = self.cache(session)?;
        cache.lock().add_page(Arc::clone(&page));
        Ok(page)
    }

    /// Publishes a continuation of a cached page under the session lock.
    ///
    /// Its states are added to the page as currently cached, so concurrent
    /// continuations never lose each other's states; states allocated
    /// before `keep_from` are dropped first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AttributeType`] if the session attribute is foreign.
    pub fn merge_page(
        &self,
        session: &dyn SessionStore,
        continuation: Page,
        keep_from: StateId,
    ) -> Result<Arc<Page>, Error> {
        let cache = self.cache(session)?;
        let merged = cache.lock().merge_page(continuation, keep_from);
        Ok(merged)
    }

    /// Returns the cached page with `id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AttributeType`] if the session attribute is foreign.
    pub fn get_page(&self, session: &dyn SessionStore, id: PageId) -> Result<Option<Arc<Page>>, Error> {
        let cache = self.cache(session)?;
        let page = cache.lock().page(id);
        Ok(page)
    }

    /// Returns state `state_id` of page `page_id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AttributeType`] if the session attribute is foreign.
    pub fn get_state(
        &self,
        session: &dyn SessionStore,
        page_id: PageId,
        state_id: StateId,
    ) -> Result<Option<Arc<State>>, Error> {
        Ok(self
            .get_page(session, page_id)?
            .and_then(|page| page.state(state_id).cloned()))
    }

    /// Returns the cached page produced by the request carrying
    /// `parent_state_id`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AttributeType`] if the session attribute is foreign.
    pub fn find_by_parent(
        &self,
        session: &dyn SessionStore,
        parent_state_id: &str,
    ) -> Result<Option<Arc<Page>>, Error> {
        let cache = self.cache(session)?;
        let page = cache.lock().find_by_parent(parent_state_id);
        Ok(page)
    }

    /// Removes the page with `id`, returning `true` if it was cached.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AttributeType`] if the session attribute is foreign.
    pub fn remove_page(&self, session: &dyn SessionStore, id: PageId) -> Result<bool, Error> {
        let cache = self.cache(session)?;
        let removed = cache.lock().remove_page(id);
        Ok(removed)
    }

    /// Returns the number of pages cached for `session`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AttributeType`] if the session attribute is foreign.
    pub fn page_count(&self, session: &dyn SessionStore) -> Result<usize, Error> {
        let cache = self.cache(session)?;
        let len = cache.lock().len();
        Ok(len)
    }
}

impl std::fmt::Debug for PageStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ids = match self.ids {
            IdSource::PerSession => "per-session",
            IdSource::Shared(_) => "shared",
        };
        f.debug_struct("PageStore")
            .field("max_pages", &self.max_pages)
            .field("ids", &ids)
            .finish()
    }
}

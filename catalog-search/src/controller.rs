//! State container for one catalog page.
//!
//! The controller owns facet state, the live search box and its debouncer,
//! the last fetched page and the fetch status. It never performs I/O on its
//! own: hosts call [`CatalogController::begin_fetch`], run the request however
//! they like and hand the result back through
//! [`CatalogController::complete_fetch`]. Every ticket carries a sequence
//! number and only the most recently issued one is applied, so a slow older
//! response can never overwrite a newer one.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::{
    debounce::{Debouncer, SEARCH_DEBOUNCE},
    error::{SourceError, StoreError},
    facets::{Facet, FilterState, PriceBucket, SortKey},
    model::{Category, Course, CoursePage},
    pagination::{PageToken, PageWindow, page_range, page_window, total_pages},
    prefs::{MAX_PAGE_SIZE, PreferenceStore, Preferences},
    query::{ComposedQuery, DEFAULT_PAGE_SIZE, compose},
    refine::refine,
    source::CourseSource,
    summary::{ActiveFilter, active_filters},
};

/// What a mutation means for the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Change {
    /// Server parameters changed; issue a new fetch.
    Refetch,
    /// Only client-side refinements changed; visible items were recomputed.
    Refine,
    Unchanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchOutcome {
    Applied,
    Failed,
    /// A newer request has been issued since; the result was dropped.
    Stale,
}

/// A request the host should run against the course-list endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchTicket {
    pub seq: u64,
    pub query: ComposedQuery,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Status {
    Idle,
    Loading,
    Ready,
    Failed(String),
}

/// Everything the rendering layer needs, in one serializable snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogView {
    pub items: Vec<Course>,
    pub total: u64,
    pub loading: bool,
    pub error: Option<String>,
    pub can_retry: bool,
    pub filters: FilterState,
    pub search_input: String,
    pub active_filters: Vec<ActiveFilter>,
    pub pagination: Vec<PageToken>,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
    pub window: PageWindow,
    pub categories: Vec<Category>,
}

#[derive(Debug, Clone)]
pub struct CatalogController {
    filters: FilterState,
    search_input: String,
    debouncer: Debouncer<String>,
    page_size: u32,
    categories: Vec<Category>,
    fetched: CoursePage,
    visible: Vec<Course>,
    status: Status,
    issued: u64,
    last_query: Option<ComposedQuery>,
}

impl Default for CatalogController {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl CatalogController {
    pub fn new(page_size: u32) -> Self {
        Self::with_search_window(page_size, SEARCH_DEBOUNCE)
    }

    pub fn with_search_window(page_size: u32, window: Duration) -> Self {
        Self {
            filters: FilterState::default(),
            search_input: String::new(),
            debouncer: Debouncer::new(window),
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
            categories: Vec::new(),
            fetched: CoursePage::default(),
            visible: Vec::new(),
            status: Status::Idle,
            issued: 0,
            last_query: None,
        }
    }

    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    pub fn search_input(&self) -> &str {
        &self.search_input
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn visible_items(&self) -> &[Course] {
        &self.visible
    }

    /// The page exactly as the source returned it.
    pub fn fetched_page(&self) -> &CoursePage {
        &self.fetched
    }

    pub fn is_loading(&self) -> bool {
        self.status == Status::Loading
    }

    pub fn error(&self) -> Option<&str> {
        match &self.status {
            Status::Failed(message) => Some(message),
            _ => None,
        }
    }

    /// Records a keystroke. The committed search only changes once input has
    /// been quiet for the debounce window; see [`Self::poll_search`].
    pub fn input_search(&mut self, text: impl Into<String>, now: Duration) {
        self.search_input = text.into();
        self.debouncer.arm(self.search_input.clone(), now);
    }

    /// Commits pending search input whose window has elapsed.
    pub fn poll_search(&mut self, now: Duration) -> Change {
        match self.debouncer.poll(now) {
            Some(text) => {
                debug!(search = %text, "committing search input");
                self.track(|c| c.filters.set_search_text(text))
            }
            None => Change::Unchanged,
        }
    }

    /// When the host should next call [`Self::poll_search`], if at all.
    pub fn next_search_deadline(&self) -> Option<Duration> {
        self.debouncer.deadline()
    }

    /// Tears the page down: any pending search commit is dropped.
    pub fn unmount(&mut self) {
        if self.debouncer.cancel().is_some() {
            debug!("dropped pending search commit on unmount");
        }
    }

    pub fn set_category(&mut self, category: Option<String>) -> Change {
        self.track(|c| c.filters.set_category(category))
    }

    pub fn set_grade_level(&mut self, grade_level: Option<String>) -> Change {
        self.track(|c| c.filters.set_grade_level(grade_level))
    }

    pub fn set_learning_area(&mut self, learning_area: Option<String>) -> Change {
        self.track(|c| c.filters.set_learning_area(learning_area))
    }

    pub fn set_price_bucket(&mut self, bucket: PriceBucket) -> Change {
        self.track(|c| c.filters.set_price_bucket(bucket))
    }

    pub fn set_sort_key(&mut self, key: SortKey) -> Change {
        self.track(|c| c.filters.set_sort_key(key))
    }

    pub fn set_featured_only(&mut self, featured_only: bool) -> Change {
        self.track(|c| c.filters.set_featured_only(featured_only))
    }

    pub fn set_page(&mut self, page: u32) -> Change {
        self.track(|c| c.filters.set_page(page))
    }

    pub fn set_page_size(&mut self, page_size: u32) -> Change {
        self.track(|c| {
            c.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
            c.filters.set_page(1);
        })
    }

    /// Replaces the whole facet state, e.g. from a URL. The search box
    /// mirrors the committed search.
    pub fn replace_filters(&mut self, filters: FilterState) -> Change {
        self.debouncer.cancel();
        self.search_input = filters.search_text().to_string();
        self.track(|c| c.filters = filters)
    }

    /// Removes one pill. Clearing search also empties the search box and
    /// drops any pending commit.
    pub fn clear_filter(&mut self, facet: Facet) -> Change {
        if facet == Facet::Search {
            self.search_input.clear();
            self.debouncer.cancel();
        }
        self.track(|c| c.filters.clear(facet))
    }

    pub fn clear_all(&mut self) -> Change {
        self.search_input.clear();
        self.debouncer.cancel();
        self.track(|c| c.filters.clear_all())
    }

    pub fn set_categories(&mut self, categories: Vec<Category>) {
        self.categories = categories;
    }

    fn track(&mut self, mutate: impl FnOnce(&mut Self)) -> Change {
        let before = compose(&self.filters, self.page_size);
        mutate(self);
        let after = compose(&self.filters, self.page_size);

        if before.server != after.server {
            Change::Refetch
        } else if before.client != after.client {
            self.visible = refine(&self.fetched.items, &after.client);
            Change::Refine
        } else {
            Change::Unchanged
        }
    }

    /// Issues a ticket for the current facet state and marks the page as
    /// loading.
    pub fn begin_fetch(&mut self) -> FetchTicket {
        let query = compose(&self.filters, self.page_size);
        self.issue(query)
    }

    /// Re-issues the last query under a fresh sequence number.
    pub fn retry(&mut self) -> Option<FetchTicket> {
        self.last_query.clone().map(|query| self.issue(query))
    }

    fn issue(&mut self, query: ComposedQuery) -> FetchTicket {
        self.issued += 1;
        self.status = Status::Loading;
        self.last_query = Some(query.clone());
        FetchTicket {
            seq: self.issued,
            query,
        }
    }

    /// Applies a fetch result if it belongs to the latest ticket.
    ///
    /// On success the fetched page is replaced wholesale. On failure the list
    /// is emptied and the error is kept for display until the next fetch.
    pub fn complete_fetch(
        &mut self,
        seq: u64,
        result: Result<CoursePage, SourceError>,
    ) -> FetchOutcome {
        if seq != self.issued {
            debug!(seq, latest = self.issued, "discarding stale course page");
            return FetchOutcome::Stale;
        }

        match result {
            Ok(page) => {
                let client = compose(&self.filters, self.page_size).client;
                self.visible = refine(&page.items, &client);
                self.fetched = page;
                self.status = Status::Ready;
                FetchOutcome::Applied
            }
            Err(err) => {
                warn!(seq, error = %err, "course fetch failed");
                self.fetched = CoursePage::default();
                self.visible.clear();
                self.status = Status::Failed(err.user_message());
                FetchOutcome::Failed
            }
        }
    }

    /// Runs `ticket` against `source` and applies the result.
    pub async fn fetch<S: CourseSource>(
        &mut self,
        ticket: FetchTicket,
        source: &S,
    ) -> FetchOutcome {
        let result = source.fetch_courses(&ticket.query.server).await;
        self.complete_fetch(ticket.seq, result)
    }

    /// Fetches the page for the current facet state.
    pub async fn refresh<S: CourseSource>(&mut self, source: &S) -> FetchOutcome {
        let ticket = self.begin_fetch();
        self.fetch(ticket, source).await
    }

    /// Loads category labels. A failure keeps whatever labels were there.
    pub async fn load_categories<S: CourseSource>(&mut self, source: &S) {
        match source.fetch_categories().await {
            Ok(categories) => self.categories = categories,
            Err(err) => warn!(error = %err, "category fetch failed"),
        }
    }

    pub fn preferences(&self) -> Preferences {
        Preferences {
            sort_key: self.filters.sort_key(),
            page_size: self.page_size,
        }
    }

    /// Applies stored preferences, if any. Call once when the page mounts.
    pub fn load_preferences<P: PreferenceStore>(&mut self, store: &P) -> Result<(), StoreError> {
        if let Some(prefs) = store.load()? {
            self.apply_preferences(prefs);
        }
        Ok(())
    }

    pub fn apply_preferences(&mut self, prefs: Preferences) {
        let prefs = prefs.sanitized();
        self.page_size = prefs.page_size;
        self.filters.set_sort_key(prefs.sort_key);
    }

    pub fn save_preferences<P: PreferenceStore>(&self, store: &P) -> Result<(), StoreError> {
        store.save(&self.preferences())
    }

    pub fn active_filters(&self) -> Vec<ActiveFilter> {
        active_filters(&self.filters, &self.categories)
    }

    pub fn view(&self) -> CatalogView {
        let total = self.fetched.total;
        let pages = total_pages(total, self.page_size);
        let page = self.filters.page();

        CatalogView {
            items: self.visible.clone(),
            total,
            loading: self.is_loading(),
            error: self.error().map(str::to_string),
            can_retry: matches!(self.status, Status::Failed(_)) && self.last_query.is_some(),
            filters: self.filters.clone(),
            search_input: self.search_input.clone(),
            active_filters: self.active_filters(),
            pagination: page_range(page, pages),
            page,
            page_size: self.page_size,
            total_pages: pages,
            window: page_window(page, self.page_size, total),
            categories: self.categories.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        prefs::MemoryPreferences,
        source::{DemoSource, tests::FailingSource},
    };

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    fn course(id: &str, price: f64, rating: f64) -> Course {
        Course {
            id: id.to_string(),
            price: Some(price),
            average_rating: Some(rating),
            ..Default::default()
        }
    }

    fn page(ids: &[&str], total: u64) -> CoursePage {
        CoursePage {
            items: ids.iter().map(|id| course(id, 10.0, 4.0)).collect(),
            total,
        }
    }

    fn visible_ids(controller: &CatalogController) -> Vec<&str> {
        controller
            .visible_items()
            .iter()
            .map(|c| c.id.as_str())
            .collect()
    }

    fn demo() -> DemoSource {
        DemoSource::embedded().expect("embedded demo catalog decodes")
    }

    #[test]
    fn typing_burst_commits_once() {
        let mut controller = CatalogController::default();
        controller.set_page(4);

        let mut commits = Vec::new();
        let keystrokes = [(0, "a"), (100, "al"), (150, "alg")];
        for t in (0..=1_000).step_by(10) {
            if let Some((_, text)) = keystrokes.iter().find(|(at, _)| *at == t) {
                controller.input_search(*text, ms(t));
            }
            if controller.poll_search(ms(t)) != Change::Unchanged {
                commits.push((t, controller.filters().search_text().to_string()));
            }
        }

        assert_eq!(commits, vec![(450, "alg".to_string())]);
        assert_eq!(controller.filters().page(), 1);
        assert_eq!(controller.search_input(), "alg");
    }

    #[test]
    fn live_input_does_not_touch_committed_search() {
        let mut controller = CatalogController::default();
        controller.input_search("rob", ms(0));
        assert_eq!(controller.search_input(), "rob");
        assert_eq!(controller.filters().search_text(), "");
        assert_eq!(controller.next_search_deadline(), Some(ms(300)));
    }

    #[test]
    fn unmount_drops_pending_commit() {
        let mut controller = CatalogController::default();
        controller.input_search("robotics", ms(0));
        controller.unmount();

        assert_eq!(controller.poll_search(ms(5_000)), Change::Unchanged);
        assert_eq!(controller.filters().search_text(), "");
    }

    #[test]
    fn latest_request_wins_under_out_of_order_completion() {
        let mut controller = CatalogController::default();
        let older = controller.begin_fetch();
        assert_eq!(controller.set_featured_only(true), Change::Refetch);
        let newer = controller.begin_fetch();

        assert_eq!(
            controller.complete_fetch(newer.seq, Ok(page(&["new-1", "new-2"], 2))),
            FetchOutcome::Applied
        );
        assert_eq!(
            controller.complete_fetch(older.seq, Ok(page(&["old-1"], 1))),
            FetchOutcome::Stale
        );

        assert_eq!(visible_ids(&controller), vec!["new-1", "new-2"]);
        assert_eq!(controller.fetched_page().total, 2);
        assert!(!controller.is_loading());
    }

    #[test]
    fn stale_failure_does_not_clobber_newer_results() {
        let mut controller = CatalogController::default();
        let older = controller.begin_fetch();
        let newer = controller.begin_fetch();

        controller.complete_fetch(newer.seq, Ok(page(&["fresh"], 1)));
        let outcome = controller.complete_fetch(older.seq, Err(SourceError::Status(500)));

        assert_eq!(outcome, FetchOutcome::Stale);
        assert_eq!(controller.error(), None);
        assert_eq!(visible_ids(&controller), vec!["fresh"]);
    }

    #[test]
    fn failure_clears_the_list_and_retry_reissues_the_same_query() {
        let mut controller = CatalogController::default();
        controller.set_learning_area(Some("science".into()));

        let first = controller.begin_fetch();
        controller.complete_fetch(first.seq, Ok(page(&["a", "b"], 2)));

        let second = controller.begin_fetch();
        let outcome =
            controller.complete_fetch(second.seq, Err(SourceError::Network("reset".into())));

        assert_eq!(outcome, FetchOutcome::Failed);
        assert!(controller.visible_items().is_empty());
        assert!(controller.error().is_some());

        let view = controller.view();
        assert!(view.can_retry);
        assert_eq!(view.total, 0);

        let retry = controller.retry().expect("a query was issued before");
        assert_eq!(retry.query, second.query);
        assert!(retry.seq > second.seq);
        assert!(controller.is_loading());
        assert_eq!(controller.error(), None);
    }

    #[test]
    fn retry_without_history_is_none() {
        assert_eq!(CatalogController::default().retry(), None);
    }

    #[test]
    fn client_side_changes_refine_in_place() {
        let mut controller = CatalogController::default();
        let ticket = controller.begin_fetch();
        controller.complete_fetch(
            ticket.seq,
            Ok(CoursePage {
                items: vec![
                    course("mid", 20.0, 4.0),
                    course("free", 0.0, 4.9),
                    course("top", 90.0, 3.0),
                ],
                total: 3,
            }),
        );

        assert_eq!(controller.set_sort_key(SortKey::PriceDesc), Change::Refine);
        assert_eq!(visible_ids(&controller), vec!["top", "mid", "free"]);

        assert_eq!(controller.set_price_bucket(PriceBucket::Paid), Change::Refine);
        assert_eq!(visible_ids(&controller), vec!["top", "mid"]);

        let fetched: Vec<&str> = controller
            .fetched_page()
            .items
            .iter()
            .map(|c| c.id.as_str())
            .collect();
        assert_eq!(fetched, vec!["mid", "free", "top"]);
    }

    #[test]
    fn client_side_change_off_page_one_refetches() {
        let mut controller = CatalogController::default();
        controller.set_page(3);
        assert_eq!(controller.set_sort_key(SortKey::Newest), Change::Refetch);
        assert_eq!(controller.filters().page(), 1);
    }

    #[test]
    fn category_alone_does_not_change_the_request() {
        let mut controller = CatalogController::default();
        assert_eq!(controller.set_category(Some("stem".into())), Change::Unchanged);
        assert_eq!(controller.active_filters().len(), 1);
    }

    #[test]
    fn clearing_search_pill_clears_input_and_pending_commit() {
        let mut controller = CatalogController::default();
        controller.input_search("python", ms(0));
        controller.poll_search(ms(300));
        controller.set_price_bucket(PriceBucket::Free);
        controller.input_search("python ad", ms(400));

        assert_eq!(controller.clear_filter(Facet::Search), Change::Refetch);
        assert_eq!(controller.search_input(), "");
        assert_eq!(controller.filters().search_text(), "");
        assert_eq!(controller.filters().price_bucket(), PriceBucket::Free);
        assert_eq!(controller.poll_search(ms(2_000)), Change::Unchanged);
    }

    #[test]
    fn clear_all_resets_every_facet() {
        let mut controller = CatalogController::default();
        controller.set_grade_level(Some("adult".into()));
        controller.set_featured_only(true);
        controller.set_page(2);
        controller.input_search("spanish", ms(0));

        assert_eq!(controller.clear_all(), Change::Refetch);
        assert_eq!(controller.filters(), &FilterState::default());
        assert_eq!(controller.search_input(), "");
        assert!(controller.active_filters().is_empty());
    }

    #[test]
    fn decoded_filters_with_page_zero_start_at_the_first_page() {
        let filters: FilterState =
            serde_json::from_str(r#"{"search_text":"poetry","page":0}"#).unwrap();
        let mut controller = CatalogController::new(12);

        assert_eq!(controller.replace_filters(filters), Change::Refetch);
        let ticket = controller.begin_fetch();
        assert_eq!(ticket.query.server.skip, 0);
        assert_eq!(controller.view().page, 1);
    }

    #[test]
    fn replace_filters_mirrors_search_box() {
        let mut controller = CatalogController::default();
        let mut filters = FilterState::new();
        filters.set_search_text("chemistry");
        filters.set_page(2);

        assert_eq!(controller.replace_filters(filters), Change::Refetch);
        assert_eq!(controller.search_input(), "chemistry");
        assert_eq!(controller.filters().page(), 2);
    }

    #[tokio::test]
    async fn refresh_against_demo_source_applies_refinements() {
        let source = demo();
        let mut controller = CatalogController::new(12);
        controller.load_categories(&source).await;
        controller.set_price_bucket(PriceBucket::Free);
        controller.set_sort_key(SortKey::Popular);

        assert_eq!(controller.refresh(&source).await, FetchOutcome::Applied);

        let view = controller.view();
        let ids: Vec<&str> = view.items.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["course-001", "course-007", "course-004"]);
        assert_eq!(view.total, 14);
        assert_eq!(view.total_pages, 2);
        assert_eq!(view.pagination, vec![PageToken::Page(1), PageToken::Page(2)]);
        assert_eq!(view.categories.len(), 4);
        assert_eq!(view.active_filters.len(), 2);
    }

    #[tokio::test]
    async fn second_page_of_demo_source() {
        let source = demo();
        let mut controller = CatalogController::new(12);
        assert_eq!(controller.set_page(2), Change::Refetch);
        controller.refresh(&source).await;

        let view = controller.view();
        assert_eq!(view.items.len(), 2);
        assert_eq!(view.window.first_item, 13);
        assert_eq!(view.window.last_item, 14);
    }

    #[tokio::test]
    async fn failing_source_surfaces_error_and_keeps_labels() {
        let mut controller = CatalogController::default();
        controller.set_categories(vec![Category {
            id: "cat-1".into(),
            name: "STEM".into(),
            slug: "stem".into(),
            course_count: None,
        }]);

        let source = FailingSource(SourceError::Status(502));
        controller.load_categories(&source).await;
        assert_eq!(controller.refresh(&source).await, FetchOutcome::Failed);

        let view = controller.view();
        assert_eq!(view.categories.len(), 1);
        assert!(view.items.is_empty());
        assert!(view.pagination.is_empty());
        assert_eq!(
            view.error.as_deref(),
            Some("The course catalog is temporarily unavailable. Please try again.")
        );
    }

    #[test]
    fn preferences_load_and_save_through_the_store() {
        let store = MemoryPreferences::with(Preferences {
            sort_key: SortKey::RatingDesc,
            page_size: 24,
        });

        let mut controller = CatalogController::default();
        controller.load_preferences(&store).unwrap();
        assert_eq!(controller.page_size(), 24);
        assert_eq!(controller.filters().sort_key(), SortKey::RatingDesc);

        controller.set_sort_key(SortKey::Newest);
        controller.set_page_size(48);
        controller.save_preferences(&store).unwrap();
        assert_eq!(
            store.load().unwrap(),
            Some(Preferences {
                sort_key: SortKey::Newest,
                page_size: 48,
            })
        );
    }

    #[test]
    fn empty_store_leaves_defaults() {
        let mut controller = CatalogController::default();
        controller.load_preferences(&MemoryPreferences::new()).unwrap();
        assert_eq!(controller.preferences(), Preferences::default());
    }
}

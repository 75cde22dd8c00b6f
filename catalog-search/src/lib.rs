pub mod controller;
pub mod debounce;
pub mod error;
pub mod facets;
pub mod model;
pub mod pagination;
pub mod prefs;
pub mod query;
pub mod refine;
pub mod source;
pub mod summary;

pub use crate::controller::{CatalogController, CatalogView, Change, FetchOutcome, FetchTicket};
pub use crate::error::{SourceError, StoreError};
pub use crate::facets::{Facet, FilterState, PriceBucket, SortKey};
pub use crate::model::{Catalog, Category, CategoryList, Course, CoursePage};
pub use crate::prefs::{MemoryPreferences, PreferenceStore, Preferences};
pub use crate::query::{ClientRefinements, ComposedQuery, DEFAULT_PAGE_SIZE, ServerParams, compose};
pub use crate::source::{CourseSource, DemoSource, Fallback, WithFallback};

use bincode::Options;
use serde::Serialize;
use serde_wasm_bindgen::Serializer;
use std::time::Duration;
use wasm_bindgen::prelude::*;

const DEMO_CATALOG_BYTES: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/demo_catalog.bin"));

/// Decodes the demo catalog compiled into this crate.
pub fn demo_catalog() -> Result<Catalog, bincode::Error> {
    decode_catalog(DEMO_CATALOG_BYTES)
}

pub fn decode_catalog(bytes: &[u8]) -> Result<Catalog, bincode::Error> {
    bincode::options().with_fixint_encoding().deserialize(bytes)
}

pub fn encode_catalog(catalog: &Catalog) -> Result<Vec<u8>, bincode::Error> {
    bincode::options().with_fixint_encoding().serialize(catalog)
}

pub fn prepare_catalog(catalog: &mut Catalog) {
    catalog.prepare();
}

/// Browser-facing wrapper around [`CatalogController`]. The JS host owns the
/// clock, the timers and `fetch`; this side owns every decision.
#[wasm_bindgen]
pub struct CatalogSearch {
    controller: CatalogController,
}

#[wasm_bindgen]
impl CatalogSearch {
    /// `preferences` is the JSON previously returned by `preferencesJson`.
    #[wasm_bindgen(constructor)]
    pub fn new(
        page_size: Option<u32>,
        preferences: Option<String>,
    ) -> Result<CatalogSearch, JsValue> {
        let mut controller = CatalogController::new(page_size.unwrap_or(DEFAULT_PAGE_SIZE));
        if let Some(raw) = preferences {
            controller.apply_preferences(Preferences::from_json(&raw).map_err(to_js_error)?);
        }
        Ok(Self { controller })
    }

    #[wasm_bindgen(js_name = "inputSearch")]
    pub fn input_search(&mut self, text: &str, now_ms: f64) {
        self.controller.input_search(text, millis(now_ms));
    }

    #[wasm_bindgen(js_name = "pollSearch")]
    pub fn poll_search(&mut self, now_ms: f64) -> String {
        change_name(self.controller.poll_search(millis(now_ms)))
    }

    /// Milliseconds timestamp at which `pollSearch` should next run.
    #[wasm_bindgen(js_name = "nextSearchDeadline")]
    pub fn next_search_deadline(&self) -> Option<f64> {
        self.controller
            .next_search_deadline()
            .map(|deadline| deadline.as_secs_f64() * 1_000.0)
    }

    #[wasm_bindgen(js_name = "setCategory")]
    pub fn set_category(&mut self, category: Option<String>) -> String {
        change_name(self.controller.set_category(category))
    }

    #[wasm_bindgen(js_name = "setGradeLevel")]
    pub fn set_grade_level(&mut self, grade_level: Option<String>) -> String {
        change_name(self.controller.set_grade_level(grade_level))
    }

    #[wasm_bindgen(js_name = "setLearningArea")]
    pub fn set_learning_area(&mut self, learning_area: Option<String>) -> String {
        change_name(self.controller.set_learning_area(learning_area))
    }

    #[wasm_bindgen(js_name = "setPriceBucket")]
    pub fn set_price_bucket(&mut self, bucket: &str) -> Result<String, JsValue> {
        let bucket: PriceBucket = bucket.parse().map_err(to_js_error)?;
        Ok(change_name(self.controller.set_price_bucket(bucket)))
    }

    #[wasm_bindgen(js_name = "setSortKey")]
    pub fn set_sort_key(&mut self, key: &str) -> Result<String, JsValue> {
        let key: SortKey = key.parse().map_err(to_js_error)?;
        Ok(change_name(self.controller.set_sort_key(key)))
    }

    #[wasm_bindgen(js_name = "setFeaturedOnly")]
    pub fn set_featured_only(&mut self, featured_only: bool) -> String {
        change_name(self.controller.set_featured_only(featured_only))
    }

    #[wasm_bindgen(js_name = "setPage")]
    pub fn set_page(&mut self, page: u32) -> String {
        change_name(self.controller.set_page(page))
    }

    #[wasm_bindgen(js_name = "clearFilter")]
    pub fn clear_filter(&mut self, facet: &str) -> Result<String, JsValue> {
        let facet: Facet = facet.parse().map_err(to_js_error)?;
        Ok(change_name(self.controller.clear_filter(facet)))
    }

    #[wasm_bindgen(js_name = "clearAll")]
    pub fn clear_all(&mut self) -> String {
        change_name(self.controller.clear_all())
    }

    /// Accepts the categories endpoint body, `{ categories: [...] }`.
    #[wasm_bindgen(js_name = "setCategories")]
    pub fn set_categories(&mut self, body: JsValue) -> Result<(), JsValue> {
        let list: CategoryList = serde_wasm_bindgen::from_value(body)?;
        self.controller.set_categories(list.categories);
        Ok(())
    }

    /// Returns `{ seq, query: { server, client } }`.
    #[wasm_bindgen(js_name = "beginFetch")]
    pub fn begin_fetch(&mut self) -> Result<JsValue, JsValue> {
        to_js_value(&self.controller.begin_fetch())
    }

    #[wasm_bindgen]
    pub fn retry(&mut self) -> Result<JsValue, JsValue> {
        to_js_value(&self.controller.retry())
    }

    /// Hands back the course-list body, `{ items, total }`, for ticket `seq`.
    #[wasm_bindgen(js_name = "completeFetch")]
    pub fn complete_fetch(&mut self, seq: f64, body: JsValue) -> Result<String, JsValue> {
        let result = serde_wasm_bindgen::from_value::<CoursePage>(body)
            .map_err(|err| SourceError::Decode(err.to_string()));
        Ok(outcome_name(self.controller.complete_fetch(seq as u64, result)))
    }

    #[wasm_bindgen(js_name = "failFetch")]
    pub fn fail_fetch(&mut self, seq: f64, status: Option<u16>, message: &str) -> String {
        let err = match status {
            Some(code) => SourceError::Status(code),
            None => SourceError::Network(message.to_string()),
        };
        outcome_name(self.controller.complete_fetch(seq as u64, Err(err)))
    }

    #[wasm_bindgen]
    pub fn view(&self) -> Result<JsValue, JsValue> {
        to_js_value(&self.controller.view())
    }

    #[wasm_bindgen(js_name = "preferencesJson")]
    pub fn preferences_json(&self) -> Result<String, JsValue> {
        self.controller.preferences().to_json().map_err(to_js_error)
    }

    #[wasm_bindgen]
    pub fn unmount(&mut self) {
        self.controller.unmount();
    }

    /// Answers a server query from the embedded demo catalog.
    #[wasm_bindgen(js_name = "demoPage")]
    pub fn demo_page(params: JsValue) -> Result<JsValue, JsValue> {
        let params: ServerParams = serde_wasm_bindgen::from_value(params)?;
        let source = DemoSource::embedded().map_err(to_js_error)?;
        to_js_value(&source.query(&params))
    }
}

fn millis(value: f64) -> Duration {
    Duration::try_from_secs_f64(value.max(0.0) / 1_000.0).unwrap_or_default()
}

fn change_name(change: Change) -> String {
    match change {
        Change::Refetch => "refetch",
        Change::Refine => "refine",
        Change::Unchanged => "unchanged",
    }
    .to_string()
}

fn outcome_name(outcome: FetchOutcome) -> String {
    match outcome {
        FetchOutcome::Applied => "applied",
        FetchOutcome::Failed => "failed",
        FetchOutcome::Stale => "stale",
    }
    .to_string()
}

fn to_js_value<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    value
        .serialize(&Serializer::json_compatible())
        .map_err(|err| JsValue::from_str(&err.to_string()))
}

fn to_js_error<E: std::fmt::Display>(err: E) -> JsValue {
    JsValue::from_str(&err.to_string())
}

#[cfg(all(test, not(target_arch = "wasm32")))]
fn decode_catalog_for_tests() -> Catalog {
    let options = bincode::options().with_fixint_encoding();
    let mut de = bincode::de::Deserializer::from_slice(DEMO_CATALOG_BYTES, options);
    serde_path_to_error::deserialize(&mut de)
        .unwrap_or_else(|err| panic!("bincode decode failed at {}: {}", err.path(), err))
}

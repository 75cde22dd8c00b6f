use serde::{Deserialize, Serialize};

use crate::facets::{FilterState, PriceBucket, SortKey};

/// Courses per page when neither the host nor stored preferences say otherwise.
pub const DEFAULT_PAGE_SIZE: u32 = 12;

/// Query parameters understood by the course-list endpoint. Unset facets are
/// omitted from the serialized query rather than sent empty or `false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerParams {
    pub skip: u64,
    pub limit: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learning_area: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_featured: Option<bool>,
}

/// Refinements the backend cannot apply; run locally over each fetched page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClientRefinements {
    pub price_bucket: PriceBucket,
    pub sort_key: SortKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposedQuery {
    pub server: ServerParams,
    pub client: ClientRefinements,
}

/// Splits facet state into server parameters and client-side refinements.
///
/// The category facet is deliberately not forwarded: the course-list
/// endpoint has no category parameter.
pub fn compose(state: &FilterState, page_size: u32) -> ComposedQuery {
    let search = Some(state.search_text().trim())
        .filter(|text| !text.is_empty())
        .map(str::to_string);

    ComposedQuery {
        server: ServerParams {
            skip: u64::from(state.page().saturating_sub(1)) * u64::from(page_size),
            limit: page_size,
            search,
            grade_level: state.grade_level().map(str::to_string),
            learning_area: state.learning_area().map(str::to_string),
            is_featured: state.featured_only().then_some(true),
        },
        client: ClientRefinements {
            price_bucket: state.price_bucket(),
            sort_key: state.sort_key(),
        },
    }
}

impl ServerParams {
    /// The parameters as `(name, value)` pairs in a stable order, omitting
    /// unset ones.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("skip", self.skip.to_string()),
            ("limit", self.limit.to_string()),
        ];
        if let Some(search) = &self.search {
            pairs.push(("search", search.clone()));
        }
        if let Some(grade_level) = &self.grade_level {
            pairs.push(("grade_level", grade_level.clone()));
        }
        if let Some(learning_area) = &self.learning_area {
            pairs.push(("learning_area", learning_area.clone()));
        }
        if let Some(is_featured) = self.is_featured {
            pairs.push(("is_featured", is_featured.to_string()));
        }
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_facets_send_only_paging() {
        for page in [1, 2, 9] {
            let mut state = FilterState::new();
            state.set_page(page);
            let query = compose(&state, 12);

            assert_eq!(query.server.skip, u64::from(page - 1) * 12);
            assert_eq!(query.server.limit, 12);
            assert_eq!(query.server.search, None);
            assert_eq!(query.server.grade_level, None);
            assert_eq!(query.server.learning_area, None);
            assert_eq!(query.server.is_featured, None);

            let json = serde_json::to_value(&query.server).unwrap();
            let mut keys: Vec<&str> = json
                .as_object()
                .unwrap()
                .keys()
                .map(String::as_str)
                .collect();
            keys.sort_unstable();
            assert_eq!(keys, vec!["limit", "skip"]);
        }
    }

    #[test]
    fn set_facets_are_forwarded() {
        let mut state = FilterState::new();
        state.set_search_text("  python ");
        state.set_grade_level(Some("high_school".into()));
        state.set_learning_area(Some("technology".into()));
        state.set_featured_only(true);
        state.set_page(3);

        let query = compose(&state, 10);
        assert_eq!(
            query.server,
            ServerParams {
                skip: 20,
                limit: 10,
                search: Some("python".into()),
                grade_level: Some("high_school".into()),
                learning_area: Some("technology".into()),
                is_featured: Some(true),
            }
        );
    }

    #[test]
    fn whitespace_search_is_omitted() {
        let mut state = FilterState::new();
        state.set_search_text("   ");
        assert_eq!(compose(&state, 12).server.search, None);
    }

    #[test]
    fn category_is_not_forwarded_to_the_server() {
        let mut with_category = FilterState::new();
        with_category.set_category(Some("stem".into()));

        assert_eq!(
            compose(&with_category, 12).server,
            compose(&FilterState::new(), 12).server
        );
    }

    #[test]
    fn price_and_sort_stay_client_side() {
        let mut state = FilterState::new();
        state.set_price_bucket(PriceBucket::Free);
        state.set_sort_key(SortKey::PriceDesc);

        let query = compose(&state, 12);
        assert_eq!(query.server, compose(&FilterState::new(), 12).server);
        assert_eq!(
            query.client,
            ClientRefinements {
                price_bucket: PriceBucket::Free,
                sort_key: SortKey::PriceDesc,
            }
        );
    }

    #[test]
    fn query_pairs_skip_unset_parameters() {
        let mut state = FilterState::new();
        state.set_featured_only(true);
        let pairs = compose(&state, 12).server.query_pairs();
        assert_eq!(
            pairs,
            vec![
                ("skip", "0".to_string()),
                ("limit", "12".to_string()),
                ("is_featured", "true".to_string()),
            ]
        );
    }
}

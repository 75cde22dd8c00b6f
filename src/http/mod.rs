use crate::app::AppState;
use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{Html, Redirect},
    routing::get,
};
use catalog_search::{
    CatalogController, CatalogView, Facet, FilterState, PriceBucket, SortKey,
    facets::{GRADE_LEVELS, LEARNING_AREAS},
    pagination::PageToken,
};
use minijinja::{ErrorKind as TemplateErrorKind, context};
use serde::{Deserialize, Serialize};
use url::form_urlencoded;

const CATALOG_PATH: &str = "/courses";
const CATALOG_TEMPLATE: &str = "courses.html";

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/", get(|| async { Redirect::to(CATALOG_PATH) }))
        .route(CATALOG_PATH, get(render_catalog))
        .route("/courses.json", get(catalog_json))
        .with_state(state)
}

/// Facet state as it appears in the page URL. Unknown or malformed values
/// are ignored rather than rejected.
#[derive(Debug, Default, Deserialize)]
struct CatalogQuery {
    #[serde(default)]
    search: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    grade_level: Option<String>,
    #[serde(default)]
    learning_area: Option<String>,
    #[serde(default)]
    price: Option<String>,
    #[serde(default)]
    sort: Option<String>,
    #[serde(default)]
    featured: Option<String>,
    #[serde(default)]
    page: Option<String>,
}

impl CatalogQuery {
    fn to_filters(&self) -> FilterState {
        let mut filters = FilterState::new();
        filters.set_search_text(self.search.clone().unwrap_or_default());
        filters.set_category(self.category.clone());
        filters.set_grade_level(self.grade_level.clone());
        filters.set_learning_area(self.learning_area.clone());
        if let Some(bucket) = self.price.as_deref().and_then(|raw| raw.parse().ok()) {
            filters.set_price_bucket(bucket);
        }
        if let Some(key) = self.sort.as_deref().and_then(|raw| raw.parse().ok()) {
            filters.set_sort_key(key);
        }
        filters.set_featured_only(matches!(
            self.featured.as_deref(),
            Some("true" | "1" | "on")
        ));
        filters.set_page(
            self.page
                .as_deref()
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(1),
        );
        filters
    }
}

/// The URL that reproduces `filters`. Defaults are left out.
fn href(filters: &FilterState) -> String {
    let mut query = form_urlencoded::Serializer::new(String::new());
    let search = filters.search_text().trim();
    if !search.is_empty() {
        query.append_pair("search", search);
    }
    if let Some(category) = filters.category() {
        query.append_pair("category", category);
    }
    if let Some(grade_level) = filters.grade_level() {
        query.append_pair("grade_level", grade_level);
    }
    if let Some(learning_area) = filters.learning_area() {
        query.append_pair("learning_area", learning_area);
    }
    if filters.price_bucket() != PriceBucket::All {
        query.append_pair("price", filters.price_bucket().as_str());
    }
    if filters.sort_key() != SortKey::default() {
        query.append_pair("sort", filters.sort_key().as_str());
    }
    if filters.featured_only() {
        query.append_pair("featured", "true");
    }
    if filters.page() > 1 {
        query.append_pair("page", &filters.page().to_string());
    }

    let query = query.finish();
    if query.is_empty() {
        CATALOG_PATH.to_string()
    } else {
        format!("{CATALOG_PATH}?{query}")
    }
}

#[derive(Debug, Serialize)]
struct PillLink {
    facet: Facet,
    label: String,
    href: String,
}

#[derive(Debug, Serialize)]
struct PageLink {
    page: Option<u32>,
    current: bool,
    href: Option<String>,
}

/// Links the page template needs alongside the [`CatalogView`].
#[derive(Debug, Serialize)]
struct Links {
    current: String,
    clear_all: String,
    pills: Vec<PillLink>,
    pages: Vec<PageLink>,
    prev: Option<String>,
    next: Option<String>,
}

impl Links {
    fn for_view(view: &CatalogView) -> Self {
        let at_page = |page: u32| {
            let mut filters = view.filters.clone();
            filters.set_page(page);
            href(&filters)
        };

        let pills = view
            .active_filters
            .iter()
            .map(|pill| {
                let mut filters = view.filters.clone();
                filters.clear(pill.facet);
                PillLink {
                    facet: pill.facet,
                    label: pill.label.clone(),
                    href: href(&filters),
                }
            })
            .collect();

        let pages = view
            .pagination
            .iter()
            .map(|token| match *token {
                PageToken::Page(page) => PageLink {
                    page: Some(page),
                    current: page == view.page,
                    href: Some(at_page(page)),
                },
                PageToken::Ellipsis => PageLink {
                    page: None,
                    current: false,
                    href: None,
                },
            })
            .collect();

        Self {
            current: href(&view.filters),
            clear_all: CATALOG_PATH.to_string(),
            pills,
            pages,
            prev: (view.page > 1).then(|| at_page(view.page - 1)),
            next: (view.page < view.total_pages).then(|| at_page(view.page + 1)),
        }
    }
}

#[derive(Debug, Serialize)]
struct Choice {
    value: &'static str,
    label: &'static str,
}

fn choices(pairs: impl IntoIterator<Item = (&'static str, &'static str)>) -> Vec<Choice> {
    pairs
        .into_iter()
        .map(|(value, label)| Choice { value, label })
        .collect()
}

/// Runs one catalog page load: categories, then the course page for the
/// requested facets.
async fn load(state: &AppState, query: &CatalogQuery) -> CatalogView {
    let mut controller = CatalogController::new(state.settings.page_size);
    controller.replace_filters(query.to_filters());
    controller.load_categories(state.source.as_ref()).await;
    controller.refresh(state.source.as_ref()).await;
    controller.view()
}

async fn render_catalog(
    Query(query): Query<CatalogQuery>,
    State(state): State<AppState>,
) -> Result<Html<String>, (StatusCode, String)> {
    let view = load(&state, &query).await;
    let links = Links::for_view(&view);

    let env = state
        .tmpl
        .env_for(&state.settings.theme)
        .await
        .map_err(internal)?;
    let tpl = env
        .get_template(CATALOG_TEMPLATE)
        .map_err(|err| match err.kind() {
            TemplateErrorKind::TemplateNotFound => (StatusCode::NOT_FOUND, err.to_string()),
            _ => internal(err),
        })?;

    let html = tpl
        .render(context! {
            view,
            links,
            grade_levels => choices(GRADE_LEVELS.iter().copied()),
            learning_areas => choices(LEARNING_AREAS.iter().copied()),
            price_buckets => choices(PriceBucket::ALL.map(|bucket| (bucket.as_str(), bucket.label()))),
            sort_keys => choices(SortKey::ALL.map(|key| (key.as_str(), key.label()))),
        })
        .map_err(internal)?;
    Ok(Html(html))
}

async fn catalog_json(
    Query(query): Query<CatalogQuery>,
    State(state): State<AppState>,
) -> Json<CatalogView> {
    Json(load(&state, &query).await)
}

fn internal<E: std::fmt::Display>(e: E) -> (StatusCode, String) {
    tracing::error!(error = %e, "catalog page failed");
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        settings::Settings,
        templates::TemplateService,
        upstream::{ApiClient, Backend},
    };
    use axum::{
        body::{Body, to_bytes},
        http::Request,
    };
    use catalog_search::{DemoSource, Fallback, WithFallback};
    use std::{sync::Arc, time::Duration};
    use tower::ServiceExt;

    fn settings() -> Settings {
        Settings {
            listen_addr: "127.0.0.1:0".parse().unwrap(),
            upstream_url: None,
            demo_fallback: false,
            page_size: 12,
            template_dir: "templates".into(),
            theme: "default".into(),
            category_cache_secs: 300,
            request_timeout_secs: 2,
        }
    }

    fn router(source: Backend) -> Router {
        let settings = settings();
        build_router(AppState {
            tmpl: TemplateService::new(settings.template_dir.clone()),
            source: Arc::new(source),
            settings: Arc::new(settings),
        })
    }

    fn demo_router() -> Router {
        router(Backend::Demo(DemoSource::embedded().unwrap()))
    }

    async fn get_body(app: Router, uri: &str) -> (StatusCode, String) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[test]
    fn href_omits_defaults_and_encodes_values() {
        let mut filters = FilterState::new();
        assert_eq!(href(&filters), "/courses");

        filters.set_search_text("art & design");
        filters.set_sort_key(SortKey::PriceAsc);
        filters.set_page(3);
        assert_eq!(
            href(&filters),
            "/courses?search=art+%26+design&sort=price_asc&page=3"
        );
    }

    #[test]
    fn malformed_query_values_fall_back_to_defaults() {
        let query = CatalogQuery {
            price: Some("cheap".into()),
            sort: Some("newest".into()),
            page: Some("-4".into()),
            featured: Some("yes".into()),
            ..Default::default()
        };
        let filters = query.to_filters();
        assert_eq!(filters.price_bucket(), PriceBucket::All);
        assert_eq!(filters.sort_key(), SortKey::Newest);
        assert_eq!(filters.page(), 1);
        assert!(!filters.featured_only());
    }

    #[tokio::test]
    async fn health_is_ok() {
        let (status, body) = get_body(demo_router(), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn json_view_applies_client_refinements() {
        let (status, body) =
            get_body(demo_router(), "/courses.json?price=free&sort=popular").await;
        assert_eq!(status, StatusCode::OK);

        let view: CatalogView = serde_json::from_str(&body).unwrap();
        let ids: Vec<&str> = view.items.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["course-001", "course-007", "course-004"]);
        assert_eq!(view.total, 14);
        assert_eq!(view.total_pages, 2);
        assert_eq!(view.categories.len(), 4);
    }

    #[tokio::test]
    async fn pill_links_drop_their_facet_and_the_page() {
        let (_, body) = get_body(
            demo_router(),
            "/courses.json?grade_level=high_school&featured=true&page=1",
        )
        .await;
        let view: CatalogView = serde_json::from_str(&body).unwrap();
        let links = Links::for_view(&view);

        let hrefs: Vec<&str> = links.pills.iter().map(|pill| pill.href.as_str()).collect();
        assert_eq!(
            hrefs,
            vec!["/courses?featured=true", "/courses?grade_level=high_school"]
        );
        assert_eq!(links.current, "/courses?grade_level=high_school&featured=true");
    }

    #[tokio::test]
    async fn page_two_links_back_to_page_one() {
        let (_, body) = get_body(demo_router(), "/courses.json?page=2").await;
        let view: CatalogView = serde_json::from_str(&body).unwrap();
        assert_eq!(view.items.len(), 2);

        let links = Links::for_view(&view);
        assert_eq!(links.prev.as_deref(), Some("/courses"));
        assert_eq!(links.next, None);
        let current: Vec<Option<u32>> = links
            .pages
            .iter()
            .filter(|link| link.current)
            .map(|link| link.page)
            .collect();
        assert_eq!(current, vec![Some(2)]);
    }

    #[tokio::test]
    async fn html_page_lists_courses_and_pills() {
        let (status, body) = get_body(demo_router(), "/courses?price=paid").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Paid"));
        assert!(body.contains("href=\"/courses\""));
        assert!(body.contains("course-card"));
    }

    #[tokio::test]
    async fn upstream_failure_renders_message_and_retry() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let base = url::Url::parse(&format!("http://{addr}/")).unwrap();
        let client =
            ApiClient::new(base, Duration::from_secs(2), Duration::from_secs(60)).unwrap();
        let source = Backend::Api(WithFallback::new(client, Fallback::Disabled).unwrap());

        let (status, body) = get_body(router(source), "/courses?search=poetry").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("couldn&#x27;t reach the course catalog"));
        assert!(body.contains("href=\"/courses?search=poetry\""));
    }
}

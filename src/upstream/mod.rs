use catalog_search::{
    CategoryList, CourseSource, DemoSource, SourceError, WithFallback,
    model::{Category, CoursePage},
    query::ServerParams,
};
use moka::future::Cache;
use serde::de::DeserializeOwned;
use std::{sync::Arc, time::Duration};
use tracing::debug;
use url::Url;

/// HTTP client for the course API's `courses` and `categories` endpoints.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: Url,
    categories: Cache<(), Arc<Vec<Category>>>,
}

impl ApiClient {
    /// `base` must end in `/`; endpoints are joined beneath it.
    pub fn new(base: Url, timeout: Duration, category_ttl: Duration) -> reqwest::Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base,
            categories: Cache::builder()
                .max_capacity(1)
                .time_to_live(category_ttl)
                .build(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, SourceError> {
        self.base
            .join(path)
            .map_err(|err| SourceError::Network(err.to_string()))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, SourceError> {
        debug!(%url, "upstream request");
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|err| SourceError::Network(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|err| SourceError::Network(err.to_string()))?;
        serde_json::from_slice(&body).map_err(|err| SourceError::Decode(err.to_string()))
    }
}

impl CourseSource for ApiClient {
    async fn fetch_courses(&self, params: &ServerParams) -> Result<CoursePage, SourceError> {
        let mut url = self.endpoint("courses")?;
        url.query_pairs_mut().extend_pairs(params.query_pairs());
        self.get_json(url).await
    }

    async fn fetch_categories(&self) -> Result<Vec<Category>, SourceError> {
        let url = self.endpoint("categories")?;
        let cached = self
            .categories
            .try_get_with((), async move {
                let list: CategoryList = self.get_json(url).await?;
                Ok::<_, SourceError>(Arc::new(list.categories))
            })
            .await
            .map_err(|err| SourceError::clone(&err))?;
        Ok(cached.as_ref().clone())
    }
}

/// The source the server was configured with.
pub enum Backend {
    Demo(DemoSource),
    Api(WithFallback<ApiClient>),
}

impl CourseSource for Backend {
    async fn fetch_courses(&self, params: &ServerParams) -> Result<CoursePage, SourceError> {
        match self {
            Backend::Demo(source) => source.fetch_courses(params).await,
            Backend::Api(source) => source.fetch_courses(params).await,
        }
    }

    async fn fetch_categories(&self) -> Result<Vec<Category>, SourceError> {
        match self {
            Backend::Demo(source) => source.fetch_categories().await,
            Backend::Api(source) => source.fetch_categories().await,
        }
    }
}

use std::future::Future;
use tracing::warn;

use crate::{
    error::SourceError,
    model::{Catalog, Category, Course, CoursePage},
    query::ServerParams,
};

/// The two inbound endpoints the catalog page consumes.
pub trait CourseSource {
    /// One page of courses for the given server-side filters.
    fn fetch_courses(
        &self,
        params: &ServerParams,
    ) -> impl Future<Output = Result<CoursePage, SourceError>> + Send;

    /// Category list used for facet labels and counts.
    fn fetch_categories(&self) -> impl Future<Output = Result<Vec<Category>, SourceError>> + Send;
}

/// Serves an in-memory [`Catalog`] with the course-list endpoint's semantics.
#[derive(Debug, Clone)]
pub struct DemoSource {
    catalog: Catalog,
}

impl DemoSource {
    pub fn new(mut catalog: Catalog) -> Self {
        catalog.prepare();
        Self { catalog }
    }

    /// The demo catalog compiled into this library.
    pub fn embedded() -> Result<Self, bincode::Error> {
        crate::demo_catalog().map(Self::new)
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Filters, counts and slices the catalog the way the backend does.
    pub fn query(&self, params: &ServerParams) -> CoursePage {
        let tokens: Vec<String> = params
            .search
            .as_deref()
            .unwrap_or_default()
            .to_lowercase()
            .split_whitespace()
            .map(str::to_string)
            .collect();

        let matching: Vec<&Course> = self
            .catalog
            .courses
            .iter()
            .filter(|course| {
                tokens
                    .iter()
                    .all(|token| course.searchable_text.contains(token.as_str()))
            })
            .filter(|course| matches_exact(&course.grade_level, &params.grade_level))
            .filter(|course| matches_exact(&course.learning_area, &params.learning_area))
            .filter(|course| {
                params
                    .is_featured
                    .is_none_or(|featured| course.featured() == featured)
            })
            .collect();

        let total = matching.len() as u64;
        let skip = usize::try_from(params.skip).unwrap_or(usize::MAX);
        let items = matching
            .into_iter()
            .skip(skip)
            .take(params.limit as usize)
            .cloned()
            .collect();

        CoursePage { items, total }
    }
}

fn matches_exact(value: &Option<String>, wanted: &Option<String>) -> bool {
    match wanted {
        Some(wanted) => value.as_deref() == Some(wanted.as_str()),
        None => true,
    }
}

impl CourseSource for DemoSource {
    async fn fetch_courses(&self, params: &ServerParams) -> Result<CoursePage, SourceError> {
        Ok(self.query(params))
    }

    async fn fetch_categories(&self) -> Result<Vec<Category>, SourceError> {
        Ok(self.catalog.categories.clone())
    }
}

/// Whether a failing source is papered over with demo data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Fallback {
    #[default]
    Disabled,
    DemoCatalog,
}

/// Wraps a source so that failures can be answered from the demo catalog.
/// With [`Fallback::Disabled`] every error reaches the caller unchanged.
#[derive(Debug, Clone)]
pub struct WithFallback<S> {
    primary: S,
    demo: Option<DemoSource>,
}

impl<S> WithFallback<S> {
    pub fn new(primary: S, fallback: Fallback) -> Result<Self, bincode::Error> {
        let demo = match fallback {
            Fallback::Disabled => None,
            Fallback::DemoCatalog => Some(DemoSource::embedded()?),
        };
        Ok(Self { primary, demo })
    }

    pub fn with_demo(primary: S, demo: DemoSource) -> Self {
        Self {
            primary,
            demo: Some(demo),
        }
    }

    pub fn primary(&self) -> &S {
        &self.primary
    }
}

impl<S> CourseSource for WithFallback<S>
where
    S: CourseSource + Sync,
{
    async fn fetch_courses(&self, params: &ServerParams) -> Result<CoursePage, SourceError> {
        match self.primary.fetch_courses(params).await {
            Ok(page) => Ok(page),
            Err(err) => match &self.demo {
                Some(demo) => {
                    warn!(error = %err, "course fetch failed, serving demo catalog");
                    Ok(demo.query(params))
                }
                None => Err(err),
            },
        }
    }

    async fn fetch_categories(&self) -> Result<Vec<Category>, SourceError> {
        match self.primary.fetch_categories().await {
            Ok(categories) => Ok(categories),
            Err(err) => match &self.demo {
                Some(demo) => {
                    warn!(error = %err, "category fetch failed, serving demo categories");
                    Ok(demo.catalog.categories.clone())
                }
                None => Err(err),
            },
        }
    }
}

use anyhow::{Context, Result};
use axum::{Router, serve};
use catalog_search::{DemoSource, Fallback, WithFallback};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use crate::{
    http::build_router,
    settings::Settings,
    templates::TemplateService,
    upstream::{ApiClient, Backend},
};

#[derive(Clone)]
pub struct AppState {
    pub tmpl: TemplateService,
    pub source: Arc<Backend>,
    pub settings: Arc<Settings>,
}

pub async fn run() -> Result<()> {
    let settings = Settings::load()?;
    let source = backend_for(&settings)?;

    let state = AppState {
        tmpl: TemplateService::new(settings.template_dir.clone()),
        source: Arc::new(source),
        settings: Arc::new(settings.clone()),
    };

    let app: Router = build_router(state);

    let listener = TcpListener::bind(settings.listen_addr)
        .await
        .with_context(|| format!("binding {}", settings.listen_addr))?;
    info!("listening on http://{}", settings.listen_addr);

    serve(listener, app).await?;
    Ok(())
}

fn backend_for(settings: &Settings) -> Result<Backend> {
    let Some(base) = settings.upstream()? else {
        info!("no upstream configured, serving the embedded demo catalog");
        return Ok(Backend::Demo(DemoSource::embedded()?));
    };

    let fallback = if settings.demo_fallback {
        Fallback::DemoCatalog
    } else {
        Fallback::Disabled
    };
    info!(upstream = %base, ?fallback, "serving courses from upstream");

    let client = ApiClient::new(base, settings.request_timeout(), settings.category_ttl())
        .context("building upstream client")?;
    Ok(Backend::Api(WithFallback::new(client, fallback)?))
}

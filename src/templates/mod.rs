use anyhow::{Context, Result};
use catalog_search::facets::{grade_level_label, learning_area_label};
use chrono::Utc;
use minijinja::{AutoEscape, Environment, Error, ErrorKind, value::Value};
use moka::future::Cache;
use std::{
    collections::HashMap,
    fs,
    hash::{DefaultHasher, Hash, Hasher},
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, UNIX_EPOCH},
};
use tokio::task;

const SHARED_DIR: &str = "_shared";

/// Loads `_shared` templates overlaid with a theme's own, and rebuilds the
/// environment whenever either directory changes on disk.
#[derive(Clone)]
pub struct TemplateService {
    template_dir: PathBuf,
    env_cache: Cache<String, Arc<CachedEnvironment>>,
}

struct CachedEnvironment {
    env: Arc<Environment<'static>>,
    fingerprint: u64,
}

impl TemplateService {
    pub fn new(template_dir: impl Into<PathBuf>) -> Self {
        Self {
            template_dir: template_dir.into(),
            env_cache: Cache::builder().max_capacity(16).build(),
        }
    }

    pub async fn env_for(&self, theme: &str) -> Result<Arc<Environment<'static>>> {
        let roots = self.roots(theme);

        let fingerprint = {
            let roots = roots.clone();
            task::spawn_blocking(move || {
                let mut hasher = DefaultHasher::new();
                for root in &roots {
                    hasher.write_u64(fingerprint_for(root)?);
                }
                Ok::<_, anyhow::Error>(hasher.finish())
            })
            .await
            .context("fingerprint task failed")??
        };

        if let Some(cached) = self.env_cache.get(theme).await {
            if cached.fingerprint == fingerprint {
                return Ok(cached.env.clone());
            }
        }

        let templates = task::spawn_blocking(move || {
            let mut map = HashMap::new();
            for root in &roots {
                map.extend(load_templates(root)?);
            }
            Ok::<_, anyhow::Error>(map)
        })
        .await
        .context("template load task failed")??;

        tracing::debug!(theme, count = templates.len(), "template environment rebuilt");
        let env = Arc::new(build_environment(templates));
        self.env_cache
            .insert(
                theme.to_string(),
                Arc::new(CachedEnvironment {
                    env: env.clone(),
                    fingerprint,
                }),
            )
            .await;

        Ok(env)
    }

    /// Lookup order: later roots override earlier ones.
    fn roots(&self, theme: &str) -> Vec<PathBuf> {
        [SHARED_DIR, theme]
            .iter()
            .map(|dir| canonicalize_or(self.template_dir.join(dir)))
            .collect()
    }
}

fn build_environment(templates: HashMap<String, String>) -> Environment<'static> {
    let mut env = Environment::new();

    env.set_auto_escape_callback(|name| {
        if name.ends_with(".html") {
            AutoEscape::Html
        } else {
            AutoEscape::None
        }
    });
    env.set_fuel(None);

    let loader_map = Arc::new(templates);
    env.set_loader(move |name| {
        loader_map.get(name).cloned().map(Some).ok_or_else(|| {
            Error::new(
                ErrorKind::TemplateNotFound,
                format!("template '{name}' not found"),
            )
        })
    });

    env.add_function("now", |_args: &[Value]| {
        Ok(Value::from_serialize(Utc::now()))
    });
    env.add_filter("price", format_price);
    env.add_filter("grade_label", |value: String| {
        grade_level_label(&value).map_or(value.clone(), str::to_string)
    });
    env.add_filter("area_label", |value: String| {
        learning_area_label(&value).map_or(value.clone(), str::to_string)
    });

    env
}

/// Zero reads "Free"; a missing price renders as nothing.
fn format_price(value: Option<f64>) -> String {
    match value {
        Some(price) if price <= 0.0 => "Free".to_string(),
        Some(price) if price.is_finite() => format!("${price:.2}"),
        _ => String::new(),
    }
}

/// Visits every template file beneath `root`, depth first.
fn walk(root: &Path, mut visit: impl FnMut(&Path, &fs::DirEntry) -> Result<()>) -> Result<()> {
    if !root.exists() {
        return Ok(());
    }

    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in fs::read_dir(&dir).with_context(|| format!("reading {dir:?}"))? {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type()?.is_dir() {
                stack.push(path);
            } else if should_include(&path) {
                visit(&path, &entry)?;
            }
        }
    }
    Ok(())
}

fn fingerprint_for(root: &Path) -> Result<u64> {
    let mut hasher = DefaultHasher::new();
    walk(root, |path, entry| {
        path.strip_prefix(root).unwrap_or(path).hash(&mut hasher);

        let metadata = entry.metadata()?;
        hasher.write_u64(metadata.len());
        if let Ok(modified) = metadata.modified() {
            let nanos = modified
                .duration_since(UNIX_EPOCH)
                .unwrap_or(Duration::ZERO)
                .as_nanos();
            hasher.write_u64(nanos as u64);
        }
        Ok(())
    })?;
    Ok(hasher.finish())
}

fn load_templates(root: &Path) -> Result<HashMap<String, String>> {
    let mut map = HashMap::new();
    walk(root, |path, _| {
        let name = path
            .strip_prefix(root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/");
        let content = fs::read_to_string(path)
            .with_context(|| format!("loading template {}", path.display()))?;
        map.insert(name, content);
        Ok(())
    })?;
    Ok(map)
}

fn should_include(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| !name.starts_with('.'))
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_none_or(|ext| matches!(ext, "html" | "jinja" | "j2" | "txt" | "jinja2"))
}

fn canonicalize_or(path: PathBuf) -> PathBuf {
    path.canonicalize().unwrap_or(path)
}

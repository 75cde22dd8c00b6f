use std::{env, fs, path::PathBuf};

#[allow(dead_code)]
#[path = "src/model.rs"]
mod model;

use anyhow::{Context, Result};
use bincode::Options;
use model::{Catalog, Category, RawCourse};

fn main() -> Result<()> {
    println!("cargo:rerun-if-changed=../catalog-data/courses.json");
    println!("cargo:rerun-if-changed=../catalog-data/categories.json");
    println!("cargo:rerun-if-changed=src/model.rs");

    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR")?);
    let courses_path = manifest_dir.join("../catalog-data/courses.json");
    let categories_path = manifest_dir.join("../catalog-data/categories.json");

    let courses_raw = fs::read_to_string(&courses_path)
        .with_context(|| format!("reading {}", courses_path.display()))?;
    let categories_raw = fs::read_to_string(&categories_path)
        .with_context(|| format!("reading {}", categories_path.display()))?;

    let raw_courses: Vec<RawCourse> =
        serde_json::from_str(&courses_raw).context("parsing courses json")?;
    let categories: Vec<Category> =
        serde_json::from_str(&categories_raw).context("parsing categories json")?;

    let mut catalog = Catalog {
        courses: raw_courses.into_iter().map(RawCourse::into_course).collect(),
        categories,
    };
    catalog.prepare();

    let out_dir = PathBuf::from(env::var("OUT_DIR")?);
    let bin_path = out_dir.join("demo_catalog.bin");

    let encoded = bincode::options()
        .with_fixint_encoding()
        .serialize(&catalog)
        .context("encoding demo catalog with bincode")?;

    fs::write(&bin_path, encoded).with_context(|| format!("writing {}", bin_path.display()))?;

    Ok(())
}

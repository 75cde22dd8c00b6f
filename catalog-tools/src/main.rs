use anyhow::{Context, Result};
use catalog_search::{
    CatalogController, DEFAULT_PAGE_SIZE, DemoSource, FilterState, PreferenceStore, Preferences,
    PriceBucket, SortKey, StoreError, decode_catalog, encode_catalog,
    facets::{GRADE_LEVELS, LEARNING_AREAS},
    model::{Catalog, Category, Course, RawCourse, slugify},
    prepare_catalog,
};
use clap::{Args, Parser, Subcommand};
use rand::{Rng, SeedableRng, rngs::StdRng, seq::SliceRandom};
use std::{
    collections::HashMap,
    fs,
    io::{BufWriter, ErrorKind},
    path::{Path, PathBuf},
};
use uuid::Uuid;

#[derive(Parser)]
#[command(
    name = "catalog-tools",
    about = "Utilities for building and querying course catalog datasets"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a synthetic catalog with mock courses
    Mock(MockArgs),
    /// Convert JSON course/category exports into a catalog binary
    #[command(name = "from-json")]
    FromJson(FromJsonArgs),
    /// Run a filtered catalog query offline and print the page view as JSON
    Query(QueryArgs),
}

#[derive(Args)]
struct MockArgs {
    /// Number of courses to generate
    #[arg(long, default_value_t = 500)]
    count: usize,
    /// Output path for the catalog bincode blob
    #[arg(long)]
    catalog_out: PathBuf,
    /// Optional path to write the generated catalog as JSON (for inspection)
    #[arg(long)]
    json_out: Option<PathBuf>,
    /// Optional RNG seed to make generation deterministic
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Args)]
struct FromJsonArgs {
    /// Course JSON export (array of courses)
    #[arg(long)]
    courses: PathBuf,
    /// Category JSON export (array of categories)
    #[arg(long)]
    categories: PathBuf,
    /// Output path for the catalog bincode blob
    #[arg(long)]
    catalog_out: PathBuf,
    /// Optional path to write the derived catalog as JSON (for inspection)
    #[arg(long)]
    json_out: Option<PathBuf>,
}

#[derive(Args)]
struct QueryArgs {
    /// Catalog to query: a `.json` catalog or a bincode blob
    #[arg(long)]
    catalog: PathBuf,
    #[arg(long)]
    search: Option<String>,
    /// Category slug
    #[arg(long)]
    category: Option<String>,
    #[arg(long)]
    grade_level: Option<String>,
    #[arg(long)]
    learning_area: Option<String>,
    /// all, free or paid
    #[arg(long, default_value = "all")]
    price: PriceBucket,
    /// featured, newest, rating_desc, price_asc, price_desc or popular
    #[arg(long)]
    sort: Option<SortKey>,
    #[arg(long)]
    featured: bool,
    #[arg(long, default_value_t = 1)]
    page: u32,
    #[arg(long)]
    page_size: Option<u32>,
    /// JSON file holding sort and page-size preferences; read first, written back after
    #[arg(long)]
    prefs: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Mock(args) => run_mock(args),
        Command::FromJson(args) => run_from_json(args),
        Command::Query(args) => run_query(args),
    }
}

const CATEGORIES: &[(&str, &str)] = &[
    ("stem", "STEM"),
    ("languages-literature", "Languages & Literature"),
    ("creative-arts", "Creative Arts"),
    ("humanities", "Humanities"),
    ("test-prep", "Test Preparation"),
];

fn category_for(learning_area: &str) -> &'static str {
    match learning_area {
        "mathematics" | "science" | "technology" => "stem",
        "languages" => "languages-literature",
        "arts" => "creative-arts",
        _ => "humanities",
    }
}

fn run_mock(args: MockArgs) -> Result<()> {
    let mut rng = if let Some(seed) = args.seed {
        StdRng::seed_from_u64(seed)
    } else {
        StdRng::from_entropy()
    };

    let catalog = mock_catalog(&mut rng, args.count);
    write_outputs(&catalog, &args.catalog_out, args.json_out.as_deref())?;

    println!(
        "Generated mock catalog with {} courses -> {}",
        catalog.courses.len(),
        args.catalog_out.display()
    );
    Ok(())
}

fn mock_catalog(rng: &mut StdRng, count: usize) -> Catalog {
    let levels = ["Introduction to", "Foundations of", "Applied", "Advanced", "Exploring"];
    let topics: HashMap<&str, &[&str]> = HashMap::from([
        ("mathematics", &["Algebra", "Geometry", "Statistics", "Calculus"][..]),
        ("science", &["Biology", "Chemistry", "Physics", "Earth Science"][..]),
        ("languages", &["Spanish", "French", "Creative Writing", "Grammar"][..]),
        ("technology", &["Python", "Web Design", "Robotics", "Data Literacy"][..]),
        ("arts", &["Drawing", "Music Theory", "Photography", "Drama"][..]),
        ("social_studies", &["World History", "Civics", "Economics", "Geography"][..]),
    ]);
    let instructors = [
        "Amara Okafor",
        "Daniel Reyes",
        "Mei Lin",
        "Priya Natarajan",
        "Lucía Fernández",
        "Tomás Weller",
        "Noor Haddad",
        "Grace Mwangi",
    ];

    let mut courses = Vec::with_capacity(count);
    let mut per_category: HashMap<&str, u64> = HashMap::new();

    for _ in 0..count {
        let (area, _) = LEARNING_AREAS[rng.gen_range(0..LEARNING_AREAS.len())];
        let (grade, grade_label) = GRADE_LEVELS[rng.gen_range(0..GRADE_LEVELS.len())];
        let level = levels.choose(rng).copied().unwrap_or("Exploring");
        let topic = topics[area].choose(rng).copied().unwrap_or("Learning");
        let title = format!("{level} {topic}");

        let test_prep = grade == "high_school" && rng.gen_bool(0.25);
        let category = if test_prep { "test-prep" } else { category_for(area) };
        *per_category.entry(category).or_default() += 1;

        let price = if rng.gen_bool(0.3) {
            0.0
        } else {
            f64::from(rng.gen_range(2..40u32) * 5) - 0.01
        };

        courses.push(Course {
            id: Uuid::new_v4().to_string(),
            slug: Some(slugify(&title)),
            short_description: Some(format!(
                "{topic} for {} learners, taught through weekly projects.",
                grade_label.to_lowercase()
            )),
            title: Some(title),
            category: Some(category.to_string()),
            grade_level: Some(grade.to_string()),
            learning_area: Some(area.to_string()),
            instructor_name: instructors.choose(rng).map(|name| name.to_string()),
            price: Some(price),
            is_featured: Some(rng.gen_bool(0.15)),
            created_at: Some(format!(
                "{}-{:02}-{:02}T{:02}:00:00Z",
                rng.gen_range(2022..=2024),
                rng.gen_range(1..=12),
                rng.gen_range(1..=28),
                rng.gen_range(0..24)
            )),
            average_rating: rng
                .gen_bool(0.9)
                .then(|| f64::from(rng.gen_range(30..=50u32)) / 10.0),
            enrollment_count: Some(rng.gen_range(0..5_000)),
            searchable_text: String::new(),
        });
    }

    let categories = CATEGORIES
        .iter()
        .enumerate()
        .map(|(idx, (slug, name))| Category {
            id: format!("cat-{}", idx + 1),
            name: name.to_string(),
            slug: slug.to_string(),
            course_count: Some(per_category.get(slug).copied().unwrap_or(0)),
        })
        .collect();

    let mut catalog = Catalog {
        courses,
        categories,
    };
    prepare_catalog(&mut catalog);
    catalog
}

fn run_from_json(args: FromJsonArgs) -> Result<()> {
    let courses_raw = fs::read_to_string(&args.courses)
        .with_context(|| format!("reading {}", args.courses.display()))?;
    let categories_raw = fs::read_to_string(&args.categories)
        .with_context(|| format!("reading {}", args.categories.display()))?;

    let raw_courses: Vec<RawCourse> =
        serde_json::from_str(&courses_raw).context("parsing courses json")?;
    let categories: Vec<Category> =
        serde_json::from_str(&categories_raw).context("parsing categories json")?;

    let mut catalog = Catalog {
        courses: raw_courses.into_iter().map(RawCourse::into_course).collect(),
        categories,
    };
    prepare_catalog(&mut catalog);
    write_outputs(&catalog, &args.catalog_out, args.json_out.as_deref())?;

    println!(
        "Built catalog from JSON ({} courses, {} categories) -> {}",
        catalog.courses.len(),
        catalog.categories.len(),
        args.catalog_out.display()
    );
    Ok(())
}

fn run_query(args: QueryArgs) -> Result<()> {
    let catalog = load_catalog(&args.catalog)?;
    let source = DemoSource::new(catalog);
    let store = args.prefs.clone().map(JsonFilePreferences::new);

    let mut controller = CatalogController::new(DEFAULT_PAGE_SIZE);
    if let Some(store) = &store {
        controller
            .load_preferences(store)
            .context("loading preferences")?;
    }
    if let Some(page_size) = args.page_size {
        controller.set_page_size(page_size);
    }

    let mut filters = FilterState::new();
    filters.set_search_text(args.search.unwrap_or_default());
    filters.set_category(args.category);
    filters.set_grade_level(args.grade_level);
    filters.set_learning_area(args.learning_area);
    filters.set_price_bucket(args.price);
    filters.set_sort_key(args.sort.unwrap_or(controller.filters().sort_key()));
    filters.set_featured_only(args.featured);
    filters.set_page(args.page);

    controller.replace_filters(filters);
    controller.set_categories(source.catalog().categories.clone());

    let ticket = controller.begin_fetch();
    let page = source.query(&ticket.query.server);
    controller.complete_fetch(ticket.seq, Ok(page));

    if let Some(store) = &store {
        controller
            .save_preferences(store)
            .context("saving preferences")?;
    }
    controller.unmount();

    println!("{}", serde_json::to_string_pretty(&controller.view())?);
    Ok(())
}

fn load_catalog(path: &Path) -> Result<Catalog> {
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    if is_json {
        let raw =
            fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
    } else {
        let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        decode_catalog(&bytes).with_context(|| format!("decoding {}", path.display()))
    }
}

fn write_outputs(catalog: &Catalog, catalog_path: &Path, json_path: Option<&Path>) -> Result<()> {
    let bytes = encode_catalog(catalog).context("encoding catalog to bincode")?;
    fs::write(catalog_path, bytes)
        .with_context(|| format!("writing {}", catalog_path.display()))?;

    if let Some(json_path) = json_path {
        let file = fs::File::create(json_path)
            .with_context(|| format!("creating {}", json_path.display()))?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, catalog)
            .with_context(|| format!("writing {}", json_path.display()))?;
    }

    Ok(())
}

/// Preferences kept in a JSON file between runs.
struct JsonFilePreferences {
    path: PathBuf,
}

impl JsonFilePreferences {
    fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl PreferenceStore for JsonFilePreferences {
    fn load(&self) -> Result<Option<Preferences>, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => Preferences::from_json(&raw).map(Some),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StoreError::Io(err.to_string())),
        }
    }

    fn save(&self, prefs: &Preferences) -> Result<(), StoreError> {
        let json = prefs.to_json()?;
        fs::write(&self.path, json).map_err(|err| StoreError::Io(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_mock_is_deterministic_apart_from_ids() {
        let first = mock_catalog(&mut StdRng::seed_from_u64(7), 40);
        let second = mock_catalog(&mut StdRng::seed_from_u64(7), 40);

        let titles = |catalog: &Catalog| -> Vec<Option<String>> {
            catalog.courses.iter().map(|c| c.title.clone()).collect()
        };
        assert_eq!(titles(&first), titles(&second));

        let counted: u64 = first
            .categories
            .iter()
            .filter_map(|category| category.course_count)
            .sum();
        assert_eq!(counted, 40);
        assert!(first.courses.iter().all(|c| !c.searchable_text.is_empty()));
    }

    #[test]
    fn file_preferences_round_trip_and_tolerate_absence() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFilePreferences::new(dir.path().join("prefs.json"));
        assert_eq!(store.load().unwrap(), None);

        let prefs = Preferences {
            sort_key: SortKey::Popular,
            page_size: 30,
        };
        store.save(&prefs).unwrap();
        assert_eq!(store.load().unwrap(), Some(prefs));
    }

    #[test]
    fn json_catalog_loads_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        let catalog = mock_catalog(&mut StdRng::seed_from_u64(1), 3);
        fs::write(&path, serde_json::to_string(&catalog).unwrap()).unwrap();

        let loaded = load_catalog(&path).unwrap();
        assert_eq!(loaded.courses.len(), 3);

        let bin = dir.path().join("catalog.bin");
        write_outputs(&catalog, &bin, None).unwrap();
        assert_eq!(load_catalog(&bin).unwrap().courses.len(), 3);
    }
}

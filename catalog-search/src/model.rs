use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Demo dataset embedded into the library and served by `DemoSource`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Catalog {
    #[serde(default)]
    pub courses: Vec<Course>,
    #[serde(default)]
    pub categories: Vec<Category>,
}

/// A course as returned by the course-list endpoint. Only `id` is required;
/// everything else may be missing, and sortable fields of the wrong type
/// decode as missing, so the engine ranks them last instead of rejecting the
/// page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Course {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub short_description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub grade_level: Option<String>,
    #[serde(default)]
    pub learning_area: Option<String>,
    #[serde(default)]
    pub instructor_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub price: Option<f64>,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub is_featured: Option<bool>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub created_at: Option<String>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub average_rating: Option<f64>,
    #[serde(default, deserialize_with = "lenient::count")]
    pub enrollment_count: Option<u64>,
    #[serde(default)]
    pub searchable_text: String,
}

/// One page of the course-list endpoint: `{ items, total }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CoursePage {
    #[serde(default)]
    pub items: Vec<Course>,
    #[serde(default)]
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Category {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub course_count: Option<u64>,
}

/// Body of the categories endpoint: `{ categories }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CategoryList {
    #[serde(default)]
    pub categories: Vec<Category>,
}

impl Course {
    pub fn featured(&self) -> bool {
        self.is_featured.unwrap_or(false)
    }
}

impl Catalog {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Fills in lowercase `searchable_text` for every course that lacks it.
    pub fn prepare(&mut self) {
        for course in &mut self.courses {
            if !course.searchable_text.is_empty() {
                continue;
            }

            let parts: Vec<String> = [
                course.title.as_ref(),
                course.slug.as_ref(),
                course.short_description.as_ref(),
                course.instructor_name.as_ref(),
                course.learning_area.as_ref(),
            ]
            .into_iter()
            .flatten()
            .map(|text| text.to_lowercase())
            .collect();

            course.searchable_text = parts.join(" ");
        }
    }
}

/// Course as exported by the admin API. `description` is either a plain
/// string or a rich-text tree; only its text is kept.
#[derive(Debug, Deserialize)]
pub struct RawCourse {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: Option<Value>,
    #[serde(default)]
    pub short_description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub grade_level: Option<String>,
    #[serde(default)]
    pub learning_area: Option<String>,
    #[serde(default)]
    pub instructor_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub price: Option<f64>,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub is_featured: Option<bool>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub created_at: Option<String>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub average_rating: Option<f64>,
    #[serde(default, deserialize_with = "lenient::count")]
    pub enrollment_count: Option<u64>,
}

impl RawCourse {
    /// Flattens the description and derives a slug from the title when the
    /// export has none.
    pub fn into_course(self) -> Course {
        let short_description = self
            .short_description
            .or_else(|| self.description.and_then(flatten_description));
        let slug = match self.slug {
            Some(slug) if !slug.is_empty() => Some(slug),
            _ => self.title.as_deref().map(slugify),
        };

        Course {
            id: self.id,
            title: self.title,
            slug,
            short_description,
            category: self.category,
            grade_level: self.grade_level,
            learning_area: self.learning_area,
            instructor_name: self.instructor_name,
            price: self.price,
            is_featured: self.is_featured,
            created_at: self.created_at,
            average_rating: self.average_rating,
            enrollment_count: self.enrollment_count,
            searchable_text: String::new(),
        }
    }
}

fn flatten_description(value: Value) -> Option<String> {
    let mut parts = Vec::new();
    collect_text(&value, &mut parts);
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

fn collect_text(value: &Value, acc: &mut Vec<String>) {
    match value {
        Value::String(text) => {
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                acc.push(trimmed.to_string());
            }
        }
        Value::Array(items) => items.iter().for_each(|item| collect_text(item, acc)),
        Value::Object(map) => map.values().for_each(|item| collect_text(item, acc)),
        _ => {}
    }
}

pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_matches('-').to_string()
}

/// Field decoders for API payloads. Wrong types and unparseable strings
/// become `None`; numeric strings and integral floats are accepted.
///
/// Only self-describing formats are read this way. The bincode blob is
/// written by this crate and decoded strictly.
mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
        if !deserializer.is_human_readable() {
            return Option::<f64>::deserialize(deserializer);
        }
        let parsed = match Value::deserialize(deserializer)? {
            Value::Number(number) => number.as_f64(),
            Value::String(text) => text.trim().parse::<f64>().ok(),
            _ => None,
        };
        Ok(parsed.filter(|value| value.is_finite()))
    }

    pub fn count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
        if !deserializer.is_human_readable() {
            return Option::<u64>::deserialize(deserializer);
        }
        Ok(match Value::deserialize(deserializer)? {
            Value::Number(number) => number
                .as_u64()
                .or_else(|| number.as_f64().and_then(whole)),
            Value::String(text) => {
                let text = text.trim();
                text.parse::<u64>()
                    .ok()
                    .or_else(|| text.parse::<f64>().ok().and_then(whole))
            }
            _ => None,
        })
    }

    pub fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<bool>, D::Error> {
        if !deserializer.is_human_readable() {
            return Option::<bool>::deserialize(deserializer);
        }
        Ok(match Value::deserialize(deserializer)? {
            Value::Bool(flag) => Some(flag),
            Value::String(text) => text.trim().parse::<bool>().ok(),
            Value::Number(number) => match number.as_u64() {
                Some(0) => Some(false),
                Some(1) => Some(true),
                _ => None,
            },
            _ => None,
        })
    }

    pub fn text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
        if !deserializer.is_human_readable() {
            return Option::<String>::deserialize(deserializer);
        }
        Ok(match Value::deserialize(deserializer)? {
            Value::String(text) => Some(text),
            _ => None,
        })
    }

    fn whole(value: f64) -> Option<u64> {
        (value.is_finite() && value >= 0.0 && value.fract() == 0.0 && value <= u64::MAX as f64)
            .then_some(value as u64)
    }
}

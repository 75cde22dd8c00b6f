use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Grade levels offered by the platform, as `(value, label)`.
pub const GRADE_LEVELS: &[(&str, &str)] = &[
    ("elementary", "Elementary"),
    ("middle_school", "Middle School"),
    ("high_school", "High School"),
    ("university", "University"),
    ("adult", "Adult Learning"),
];

/// Learning areas offered by the platform, as `(value, label)`.
pub const LEARNING_AREAS: &[(&str, &str)] = &[
    ("mathematics", "Mathematics"),
    ("science", "Science"),
    ("languages", "Languages"),
    ("technology", "Technology"),
    ("arts", "Arts"),
    ("social_studies", "Social Studies"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceBucket {
    #[default]
    All,
    Free,
    Paid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    Featured,
    Newest,
    RatingDesc,
    PriceAsc,
    PriceDesc,
    Popular,
}

/// One independent filter dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Facet {
    Search,
    Category,
    GradeLevel,
    LearningArea,
    Price,
    Featured,
    Sort,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} `{value}`")]
pub struct ParseFacetError {
    kind: &'static str,
    value: String,
}

impl PriceBucket {
    pub const ALL: [PriceBucket; 3] = [PriceBucket::All, PriceBucket::Free, PriceBucket::Paid];

    pub fn as_str(self) -> &'static str {
        match self {
            PriceBucket::All => "all",
            PriceBucket::Free => "free",
            PriceBucket::Paid => "paid",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PriceBucket::All => "All prices",
            PriceBucket::Free => "Free",
            PriceBucket::Paid => "Paid",
        }
    }
}

impl SortKey {
    pub const ALL: [SortKey; 6] = [
        SortKey::Featured,
        SortKey::Newest,
        SortKey::RatingDesc,
        SortKey::PriceAsc,
        SortKey::PriceDesc,
        SortKey::Popular,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SortKey::Featured => "featured",
            SortKey::Newest => "newest",
            SortKey::RatingDesc => "rating_desc",
            SortKey::PriceAsc => "price_asc",
            SortKey::PriceDesc => "price_desc",
            SortKey::Popular => "popular",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SortKey::Featured => "Featured",
            SortKey::Newest => "Newest",
            SortKey::RatingDesc => "Highest rated",
            SortKey::PriceAsc => "Price: low to high",
            SortKey::PriceDesc => "Price: high to low",
            SortKey::Popular => "Most popular",
        }
    }
}

impl Facet {
    pub fn as_str(self) -> &'static str {
        match self {
            Facet::Search => "search",
            Facet::Category => "category",
            Facet::GradeLevel => "grade_level",
            Facet::LearningArea => "learning_area",
            Facet::Price => "price",
            Facet::Featured => "featured",
            Facet::Sort => "sort",
        }
    }
}

impl FromStr for PriceBucket {
    type Err = ParseFacetError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|bucket| bucket.as_str() == value)
            .ok_or_else(|| ParseFacetError {
                kind: "price bucket",
                value: value.to_string(),
            })
    }
}

impl FromStr for SortKey {
    type Err = ParseFacetError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|key| key.as_str() == value)
            .ok_or_else(|| ParseFacetError {
                kind: "sort key",
                value: value.to_string(),
            })
    }
}

impl FromStr for Facet {
    type Err = ParseFacetError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        [
            Facet::Search,
            Facet::Category,
            Facet::GradeLevel,
            Facet::LearningArea,
            Facet::Price,
            Facet::Featured,
            Facet::Sort,
        ]
        .into_iter()
        .find(|facet| facet.as_str() == value)
        .ok_or_else(|| ParseFacetError {
            kind: "facet",
            value: value.to_string(),
        })
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for PriceBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current value of every facet plus the current page.
///
/// Every setter except [`FilterState::set_page`] resets the page to 1, and the
/// page can never drop below 1. Empty or whitespace-only strings count as
/// "unset" for the optional facets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoredFilters")]
pub struct FilterState {
    search_text: String,
    category: Option<String>,
    grade_level: Option<String>,
    learning_area: Option<String>,
    price_bucket: PriceBucket,
    sort_key: SortKey,
    featured_only: bool,
    page: u32,
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            search_text: String::new(),
            category: None,
            grade_level: None,
            learning_area: None,
            price_bucket: PriceBucket::All,
            sort_key: SortKey::Featured,
            featured_only: false,
            page: 1,
        }
    }
}

/// Wire form of [`FilterState`]. Decoding goes through the setters so that
/// serialized state obeys the same invariants as live state.
#[derive(Deserialize)]
#[serde(default)]
struct StoredFilters {
    search_text: String,
    category: Option<String>,
    grade_level: Option<String>,
    learning_area: Option<String>,
    price_bucket: PriceBucket,
    sort_key: SortKey,
    featured_only: bool,
    page: u32,
}

impl Default for StoredFilters {
    fn default() -> Self {
        Self {
            search_text: String::new(),
            category: None,
            grade_level: None,
            learning_area: None,
            price_bucket: PriceBucket::All,
            sort_key: SortKey::Featured,
            featured_only: false,
            page: 1,
        }
    }
}

impl From<StoredFilters> for FilterState {
    fn from(stored: StoredFilters) -> Self {
        let mut state = FilterState::new();
        state.set_search_text(stored.search_text);
        state.set_category(stored.category);
        state.set_grade_level(stored.grade_level);
        state.set_learning_area(stored.learning_area);
        state.set_price_bucket(stored.price_bucket);
        state.set_sort_key(stored.sort_key);
        state.set_featured_only(stored.featured_only);
        state.set_page(stored.page);
        state
    }
}

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn search_text(&self) -> &str {
        &self.search_text
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn grade_level(&self) -> Option<&str> {
        self.grade_level.as_deref()
    }

    pub fn learning_area(&self) -> Option<&str> {
        self.learning_area.as_deref()
    }

    pub fn price_bucket(&self) -> PriceBucket {
        self.price_bucket
    }

    pub fn sort_key(&self) -> SortKey {
        self.sort_key
    }

    pub fn featured_only(&self) -> bool {
        self.featured_only
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    /// Commits a search value. Live keystrokes go through the debouncer
    /// first; this is what the debouncer calls once input settles.
    pub fn set_search_text(&mut self, text: impl Into<String>) {
        self.search_text = text.into();
        self.page = 1;
    }

    pub fn set_category(&mut self, category: Option<String>) {
        self.category = normalize(category);
        self.page = 1;
    }

    pub fn set_grade_level(&mut self, grade_level: Option<String>) {
        self.grade_level = normalize(grade_level);
        self.page = 1;
    }

    pub fn set_learning_area(&mut self, learning_area: Option<String>) {
        self.learning_area = normalize(learning_area);
        self.page = 1;
    }

    pub fn set_price_bucket(&mut self, bucket: PriceBucket) {
        self.price_bucket = bucket;
        self.page = 1;
    }

    pub fn set_sort_key(&mut self, key: SortKey) {
        self.sort_key = key;
        self.page = 1;
    }

    pub fn set_featured_only(&mut self, featured_only: bool) {
        self.featured_only = featured_only;
        self.page = 1;
    }

    pub fn set_page(&mut self, page: u32) {
        self.page = page.max(1);
    }

    /// Resets exactly one facet to its default and returns to page 1.
    pub fn clear(&mut self, facet: Facet) {
        match facet {
            Facet::Search => self.search_text.clear(),
            Facet::Category => self.category = None,
            Facet::GradeLevel => self.grade_level = None,
            Facet::LearningArea => self.learning_area = None,
            Facet::Price => self.price_bucket = PriceBucket::All,
            Facet::Featured => self.featured_only = false,
            Facet::Sort => self.sort_key = SortKey::Featured,
        }
        self.page = 1;
    }

    pub fn clear_all(&mut self) {
        *self = Self::default();
    }

    /// Whether `facet` differs from its default value.
    pub fn is_active(&self, facet: Facet) -> bool {
        match facet {
            Facet::Search => !self.search_text.trim().is_empty(),
            Facet::Category => self.category.is_some(),
            Facet::GradeLevel => self.grade_level.is_some(),
            Facet::LearningArea => self.learning_area.is_some(),
            Facet::Price => self.price_bucket != PriceBucket::All,
            Facet::Featured => self.featured_only,
            Facet::Sort => self.sort_key != SortKey::Featured,
        }
    }
}

fn normalize(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn grade_level_label(value: &str) -> Option<&'static str> {
    lookup(GRADE_LEVELS, value)
}

pub fn learning_area_label(value: &str) -> Option<&'static str> {
    lookup(LEARNING_AREAS, value)
}

fn lookup(table: &[(&str, &'static str)], value: &str) -> Option<&'static str> {
    table
        .iter()
        .find(|(key, _)| *key == value)
        .map(|(_, label)| *label)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn busy_state() -> FilterState {
        let mut state = FilterState::new();
        state.set_search_text("algebra");
        state.set_category(Some("stem".into()));
        state.set_grade_level(Some("high_school".into()));
        state.set_learning_area(Some("mathematics".into()));
        state.set_price_bucket(PriceBucket::Paid);
        state.set_sort_key(SortKey::Newest);
        state.set_featured_only(true);
        state.set_page(4);
        state
    }

    #[test]
    fn every_facet_setter_resets_page() {
        let setters: Vec<Box<dyn Fn(&mut FilterState)>> = vec![
            Box::new(|s| s.set_search_text("x")),
            Box::new(|s| s.set_category(Some("stem".into()))),
            Box::new(|s| s.set_grade_level(Some("adult".into()))),
            Box::new(|s| s.set_learning_area(Some("arts".into()))),
            Box::new(|s| s.set_price_bucket(PriceBucket::Free)),
            Box::new(|s| s.set_sort_key(SortKey::Popular)),
            Box::new(|s| s.set_featured_only(true)),
        ];

        for setter in setters {
            let mut state = FilterState::new();
            state.set_page(7);
            setter(&mut state);
            assert_eq!(state.page(), 1);
        }
    }

    #[test]
    fn page_never_drops_below_one() {
        let mut state = FilterState::new();
        state.set_page(0);
        assert_eq!(state.page(), 1);
    }

    #[test]
    fn blank_strings_count_as_unset() {
        let mut state = FilterState::new();
        state.set_category(Some("   ".into()));
        state.set_grade_level(Some(String::new()));
        assert_eq!(state.category(), None);
        assert_eq!(state.grade_level(), None);
        assert!(!state.is_active(Facet::Category));
    }

    #[test]
    fn clearing_one_facet_leaves_the_others() {
        let mut state = busy_state();
        state.clear(Facet::GradeLevel);

        assert_eq!(state.grade_level(), None);
        assert_eq!(state.page(), 1);
        assert_eq!(state.search_text(), "algebra");
        assert_eq!(state.category(), Some("stem"));
        assert_eq!(state.learning_area(), Some("mathematics"));
        assert_eq!(state.price_bucket(), PriceBucket::Paid);
        assert_eq!(state.sort_key(), SortKey::Newest);
        assert!(state.featured_only());
    }

    #[test]
    fn clear_all_restores_defaults() {
        let mut state = busy_state();
        state.clear_all();
        assert_eq!(state, FilterState::default());
    }

    #[test]
    fn decoding_restores_invariants() {
        let state: FilterState = serde_json::from_str(
            r#"{"search_text":"","category":"  ","grade_level":null,"learning_area":null,
                "price_bucket":"paid","sort_key":"newest","featured_only":false,"page":0}"#,
        )
        .unwrap();
        assert_eq!(state.page(), 1);
        assert_eq!(state.category(), None);
        assert_eq!(state.price_bucket(), PriceBucket::Paid);
        assert_eq!(state.sort_key(), SortKey::Newest);

        let mut busy = busy_state();
        busy.set_page(4);
        let json = serde_json::to_string(&busy).unwrap();
        assert_eq!(serde_json::from_str::<FilterState>(&json).unwrap(), busy);
    }

    #[test]
    fn parses_wire_names() {
        assert_eq!("rating_desc".parse::<SortKey>(), Ok(SortKey::RatingDesc));
        assert_eq!("free".parse::<PriceBucket>(), Ok(PriceBucket::Free));
        assert_eq!("learning_area".parse::<Facet>(), Ok(Facet::LearningArea));
        assert!("cheapest".parse::<SortKey>().is_err());
    }

    #[test]
    fn labels_resolve_from_option_tables() {
        assert_eq!(grade_level_label("middle_school"), Some("Middle School"));
        assert_eq!(learning_area_label("social_studies"), Some("Social Studies"));
        assert_eq!(learning_area_label("alchemy"), None);
    }
}

use serde::{Deserialize, Serialize};

use crate::{
    facets::{Facet, FilterState, PriceBucket, grade_level_label, learning_area_label},
    model::Category,
};

/// A removable token for one active facet. Removing it means calling
/// `CatalogController::clear_filter(facet)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveFilter {
    pub facet: Facet,
    pub label: String,
}

/// One pill per facet that differs from its default, in display order.
pub fn active_filters(state: &FilterState, categories: &[Category]) -> Vec<ActiveFilter> {
    let mut pills = Vec::new();
    let mut push = |facet: Facet, label: String| pills.push(ActiveFilter { facet, label });

    let search = state.search_text().trim();
    if !search.is_empty() {
        push(Facet::Search, format!("Search: \"{search}\""));
    }

    if let Some(slug) = state.category() {
        let name = categories
            .iter()
            .find(|category| category.slug == slug)
            .map(|category| category.name.as_str())
            .unwrap_or(slug);
        push(Facet::Category, format!("Category: {name}"));
    }

    if let Some(grade) = state.grade_level() {
        let label = grade_level_label(grade).unwrap_or(grade);
        push(Facet::GradeLevel, format!("Grade: {label}"));
    }

    if let Some(area) = state.learning_area() {
        let label = learning_area_label(area).unwrap_or(area);
        push(Facet::LearningArea, format!("Area: {label}"));
    }

    if state.price_bucket() != PriceBucket::All {
        push(Facet::Price, state.price_bucket().label().to_string());
    }

    if state.featured_only() {
        push(Facet::Featured, "Featured only".to_string());
    }

    if state.is_active(Facet::Sort) {
        push(Facet::Sort, format!("Sort: {}", state.sort_key().label()));
    }

    pills
}

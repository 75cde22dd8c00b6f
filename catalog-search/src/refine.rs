use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::cmp::Ordering;

use crate::{
    facets::{PriceBucket, SortKey},
    model::Course,
    query::ClientRefinements,
};

/// Applies the price bucket and sort key to a fetched page.
///
/// Works on a copy; the fetched page stays as the backend returned it. The
/// sort is stable, and missing or unparseable values rank last whatever the
/// direction.
pub fn refine(items: &[Course], refinements: &ClientRefinements) -> Vec<Course> {
    let mut refined: Vec<Course> = items
        .iter()
        .filter(|course| matches_price(course, refinements.price_bucket))
        .cloned()
        .collect();

    match refinements.sort_key {
        SortKey::Featured => refined.sort_by_key(|course| !course.featured()),
        SortKey::Newest => refined.sort_by(|a, b| {
            descending_present_first(
                created_millis(a).map(|v| v as f64),
                created_millis(b).map(|v| v as f64),
            )
        }),
        SortKey::RatingDesc => refined.sort_by(|a, b| {
            descending_present_first(finite(a.average_rating), finite(b.average_rating))
        }),
        SortKey::PriceAsc => {
            refined.sort_by(|a, b| ascending_present_first(finite(a.price), finite(b.price)))
        }
        SortKey::PriceDesc => {
            refined.sort_by(|a, b| descending_present_first(finite(a.price), finite(b.price)))
        }
        SortKey::Popular => refined.sort_by(|a, b| {
            descending_present_first(
                a.enrollment_count.map(|v| v as f64),
                b.enrollment_count.map(|v| v as f64),
            )
        }),
    }

    refined
}

fn matches_price(course: &Course, bucket: PriceBucket) -> bool {
    match bucket {
        PriceBucket::All => true,
        PriceBucket::Free => finite(course.price) == Some(0.0),
        PriceBucket::Paid => finite(course.price).is_some_and(|price| price > 0.0),
    }
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

fn ascending_present_first(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn descending_present_first(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// `created_at` as epoch milliseconds. Accepts RFC 3339, naive ISO date-times
/// (read as UTC) and bare dates.
fn created_millis(course: &Course) -> Option<i64> {
    let raw = course.created_at.as_deref()?.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.timestamp_millis());
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(parsed.and_utc().timestamp_millis());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc().timestamp_millis())
}

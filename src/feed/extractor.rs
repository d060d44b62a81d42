//! Availability extraction from the calendar table.
//!
//! The upstream page has no versioned schema. Rows with the expected eight
//! columns are read positionally; any other non-empty row falls back to a
//! coarse reading where the first cell is the test type and the last cell
//! carries the seats or status text. Both layouts use the same match rules.

use std::sync::LazyLock;

use log::debug;
use log::info;
use log::warn;
use regex::Regex;
use scraper::ElementRef;
use scraper::Html;
use scraper::Selector;

use crate::config::DEFAULT_TARGET_MARKERS;
use crate::entity::AvailabilityVerdict;
use crate::entity::SpotRecord;

/// Column count of the full calendar layout.
pub const FULL_ROW_COLUMNS: usize = 8;

static NEGATIVE_SEATS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(not\s+available|unavailable|non\s+disponibil\w*|esaurit\w*|sold\s*out|full|complet\w*|chius\w*|closed)\b",
    )
    .expect("negative seats pattern is valid")
});

static POSITIVE_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(available|disponibil\w*|posti\s+liberi)\b")
        .expect("positive token pattern is valid")
});

static INTEGER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d+\b").expect("integer pattern is valid"));

/// Dates and times would otherwise read as seat counts in the coarse layout.
static DATE_OR_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b\d{1,4}[/.\-]\d{1,2}(?:[/.\-]\d{1,4})?\b|\b\d{1,2}:\d{2}\b")
        .expect("date pattern is valid")
});

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

pub struct AvailabilityExtractor {
    markers: Vec<String>,
}

impl AvailabilityExtractor {
    /// Creates an extractor matching any of `markers` in the test type column.
    pub fn new<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let markers = markers
            .into_iter()
            .map(|m| normalize_marker(m.as_ref()))
            .filter(|m| !m.is_empty())
            .collect();
        Self { markers }
    }

    /// Classifies the page. Markup that cannot be read yields "unavailable".
    pub fn extract(&self, raw_body: &str) -> AvailabilityVerdict {
        let (Ok(row_selector), Ok(cell_selector)) =
            (Selector::parse("table tr"), Selector::parse("td"))
        else {
            return AvailabilityVerdict::unavailable();
        };

        let document = Html::parse_document(raw_body);
        let rows: Vec<ElementRef> = document.select(&row_selector).skip(1).collect();
        info!("CISIA scrape: Found {} table rows", rows.len());

        let mut spots = Vec::new();
        for row in rows {
            let cells: Vec<String> = row.select(&cell_selector).map(cell_text).collect();
            let spot = match cells.len() {
                0 => continue,
                FULL_ROW_COLUMNS => self.match_full_row(&cells),
                n => {
                    warn!("Found row with {n} columns (expected {FULL_ROW_COLUMNS})");
                    self.match_coarse_row(&cells)
                }
            };
            if let Some(spot) = spot {
                info!(
                    "SPOT FOUND: {} at {} - {} seats",
                    spot.test_type, spot.venue, spot.seats_text
                );
                spots.push(spot);
            }
        }

        if spots.is_empty() {
            info!("No target spots available");
        } else {
            info!("Total spots found: {}", spots.len());
        }
        AvailabilityVerdict::from_spots(spots)
    }

    fn match_full_row(&self, cells: &[String]) -> Option<SpotRecord> {
        let [test_type, venue, region, city, deadline, seats, status, test_date] = cells else {
            return None;
        };
        debug!("Row data - testType: {test_type:?} | seatsText: {seats:?} | city: {city:?}");

        if !self.is_target(test_type) || !has_open_seats(seats) {
            return None;
        }
        Some(SpotRecord {
            test_type: test_type.clone(),
            venue: venue.clone(),
            region: region.clone(),
            city: city.clone(),
            deadline: deadline.clone(),
            seats_text: seats.clone(),
            status: status.clone(),
            test_date: test_date.clone(),
        })
    }

    fn match_coarse_row(&self, cells: &[String]) -> Option<SpotRecord> {
        let (first, last) = (cells.first()?, cells.last()?);
        debug!("Coarse row - testType: {first:?} | seatsText: {last:?}");

        if !self.is_target(first) || !has_open_seats_coarse(last) {
            return None;
        }
        Some(SpotRecord {
            test_type: first.clone(),
            seats_text: last.clone(),
            ..SpotRecord::default()
        })
    }

    fn is_target(&self, test_type: &str) -> bool {
        let normalized = normalize_marker(test_type);
        self.markers.iter().any(|m| normalized.contains(m.as_str()))
    }
}

impl Default for AvailabilityExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_TARGET_MARKERS)
    }
}

/// Lowercases and folds the spellings of `@` seen on the page, dropping
/// whitespace so "CENT @ CASA" and "cent@casa" compare equal.
fn normalize_marker(text: &str) -> String {
    let lowered = text
        .to_lowercase()
        .replace(['\u{ff20}', '\u{fe6b}'], "@")
        .replace("(at)", "@")
        .replace("[at]", "@")
        .replace("&#64;", "@")
        .replace("&#x40;", "@");
    lowered.chars().filter(|c| !c.is_whitespace()).collect()
}

/// True when the seats/status text announces at least one free seat.
pub fn has_open_seats(text: &str) -> bool {
    if NEGATIVE_SEATS.is_match(text) {
        return false;
    }

    let counts: Vec<u64> = INTEGER
        .find_iter(text)
        .filter_map(|m| m.as_str().parse().ok())
        .collect();
    if !counts.is_empty() {
        return counts.iter().any(|&n| n > 0);
    }
    POSITIVE_TOKEN.is_match(text)
}

/// Like [`has_open_seats`] for a cell of unknown meaning, which may hold a
/// test date or time instead of a seat count.
pub fn has_open_seats_coarse(text: &str) -> bool {
    has_open_seats(&DATE_OR_TIME.replace_all(text, " "))
}

fn cell_text(cell: ElementRef) -> String {
    let text: String = cell.text().collect();
    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

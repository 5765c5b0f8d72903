//! Click-to-sort over the rows a table currently displays.

use chrono::NaiveDate;
use std::cmp::Ordering;

use crate::table::RenderedRow;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    fn flipped(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }

    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    }
}

/// Rows of one rendered table plus its sort direction.
///
/// The direction is shared by every column: each accepted header click
/// flips it, whichever column was clicked. A freshly attached table always
/// starts ascending.
#[derive(Clone, Debug, PartialEq)]
pub struct SortableTable {
    rows: Vec<RenderedRow>,
    direction: SortDirection,
    excluded: Option<usize>,
}

impl SortableTable {
    pub fn attach(rows: Vec<RenderedRow>, excluded: Option<usize>) -> Self {
        SortableTable {
            rows,
            direction: SortDirection::Ascending,
            excluded,
        }
    }

    pub fn rows(&self) -> &[RenderedRow] {
        &self.rows
    }

    pub fn direction(&self) -> SortDirection {
        self.direction
    }

    pub fn is_sortable(&self, column: usize) -> bool {
        self.excluded != Some(column)
    }

    /// Reorders the displayed rows by the text of `column`. Returns false
    /// without touching anything for the excluded column.
    pub fn sort_by_column(&mut self, column: usize) -> bool {
        if !self.is_sortable(column) {
            return false;
        }
        let direction = self.direction;
        self.rows
            .sort_by(|a, b| direction.apply(compare_cells(a.text(column), b.text(column))));
        self.direction = direction.flipped();
        true
    }
}

#[derive(Debug, PartialEq)]
enum SortKey<'a> {
    Number(f64),
    Date(NaiveDate),
    Text(&'a str),
}

fn sort_key(text: &str) -> SortKey<'_> {
    if let Ok(n) = text.parse::<f64>() {
        if !n.is_nan() {
            return SortKey::Number(n);
        }
    }
    for format in ["%d/%m/%Y", "%Y-%m-%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return SortKey::Date(date);
        }
    }
    SortKey::Text(text)
}

/// Numbers compare numerically, dates chronologically, anything else (and
/// any mix of kinds) as plain text.
pub fn compare_cells(a: &str, b: &str) -> Ordering {
    match (sort_key(a), sort_key(b)) {
        (SortKey::Number(x), SortKey::Number(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        (SortKey::Date(x), SortKey::Date(y)) => x.cmp(&y),
        _ => a.cmp(b),
    }
}

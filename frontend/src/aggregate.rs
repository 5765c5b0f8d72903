//! Monthly grouping of postings for the balance table and the chart.

use std::collections::{BTreeMap, HashMap};

use crate::entry::{MonthKey, Posting};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Aggregation {
    /// Every observed month, ascending, without duplicates.
    pub months: Vec<MonthKey>,
    /// Distinct categories in the order they first appear in the input.
    pub categories: Vec<String>,
    pub totals: BTreeMap<MonthKey, HashMap<String, f64>>,
}

impl Aggregation {
    /// Total of one category for one month, 0 when nothing was recorded.
    pub fn total(&self, month: &MonthKey, category: &str) -> f64 {
        self.totals
            .get(month)
            .and_then(|by_category| by_category.get(category))
            .copied()
            .unwrap_or(0.0)
    }
}

pub type Balance = BTreeMap<MonthKey, f64>;

pub fn group_by_month_and_category<P: Posting>(postings: &[P]) -> Aggregation {
    let mut totals: BTreeMap<MonthKey, HashMap<String, f64>> = BTreeMap::new();
    let mut categories: Vec<String> = Vec::new();

    for posting in postings {
        let category = posting.category();
        if !categories.iter().any(|c| c == category) {
            categories.push(category.to_string());
        }
        *totals
            .entry(posting.month())
            .or_default()
            .entry(category.to_string())
            .or_insert(0.0) += posting.amount();
    }

    Aggregation {
        months: totals.keys().copied().collect(),
        categories,
        totals,
    }
}

pub fn group_by_month_balance<P: Posting>(postings: &[P]) -> Balance {
    let mut balance = Balance::new();
    for posting in postings {
        *balance.entry(posting.month()).or_insert(0.0) += posting.amount();
    }
    balance
}

//! Projection of entries and monthly balances into displayable rows.

use chrono::{Datelike, NaiveDate};

use crate::aggregate::Balance;
use crate::categories;
use crate::entry::{Entry, EntryId, MonthKey};

/// Column holding the row actions in entry tables. Never sortable.
pub const ACTIONS_COLUMN: usize = 4;

pub static ENTRY_HEADERS: [&str; 5] = ["Date", "Montant", "Description", "Catégorie", "Actions"];
pub static BALANCE_HEADERS: [&str; 2] = ["Mois", "Solde"];

const MONTHS_LONG: [&str; 12] = [
    "janvier",
    "février",
    "mars",
    "avril",
    "mai",
    "juin",
    "juillet",
    "août",
    "septembre",
    "octobre",
    "novembre",
    "décembre",
];

#[derive(Clone, Debug, PartialEq)]
pub struct Cell {
    pub text: String,
    pub class: Option<String>,
    pub style: Option<String>,
}

impl Cell {
    fn plain(text: String) -> Self {
        Cell {
            text,
            class: None,
            style: None,
        }
    }
}

/// One displayed row. Entry rows keep the entry they were built from so
/// the edit form can be seeded with raw values.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderedRow {
    pub entry: Option<Entry>,
    pub cells: Vec<Cell>,
}

impl RenderedRow {
    pub fn id(&self) -> Option<EntryId> {
        self.entry.as_ref().map(|e| e.id)
    }

    pub fn text(&self, column: usize) -> &str {
        self.cells.get(column).map(|c| c.text.trim()).unwrap_or("")
    }
}

/// Calendar date as `dd/mm/yyyy`.
pub fn format_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

/// Long month and year, e.g. `mai 2024`.
pub fn format_month_long(month: &MonthKey) -> String {
    let name = MONTHS_LONG
        .get(month.month().saturating_sub(1) as usize)
        .copied()
        .unwrap_or("?");
    format!("{} {}", name, month.year())
}

pub fn format_amount(amount: f64) -> String {
    amount.to_string()
}

fn category_cell(key: &str) -> Cell {
    Cell {
        text: categories::label(key).to_string(),
        class: Some(categories::category_class(key)),
        style: Some(categories::category_style(key)),
    }
}

/// Rows for an entry table, newest first. Entries sharing a date keep their
/// server order.
pub fn render_entry_rows(entries: &[Entry]) -> Vec<RenderedRow> {
    let mut sorted: Vec<&Entry> = entries.iter().collect();
    sorted.sort_by(|a, b| b.date.cmp(&a.date));

    sorted
        .into_iter()
        .map(|entry| RenderedRow {
            entry: Some(entry.clone()),
            cells: vec![
                Cell::plain(format_date(entry.date)),
                Cell::plain(format_amount(entry.amount)),
                Cell::plain(entry.description.clone()),
                category_cell(&entry.category),
            ],
        })
        .collect()
}

/// Rows for the monthly balance table, latest month first, totals rounded
/// to two decimals for display only.
pub fn render_balance_rows(balance: &Balance) -> Vec<RenderedRow> {
    balance
        .iter()
        .rev()
        .map(|(month, total)| RenderedRow {
            entry: None,
            cells: vec![
                Cell::plain(format_month_long(month)),
                Cell::plain(format!("{:.2}", total)),
            ],
        })
        .collect()
}

/// Entries dated in the same calendar month as `today`.
pub fn current_period(entries: &[Entry], today: NaiveDate) -> Vec<Entry> {
    entries
        .iter()
        .filter(|e| e.date.year() == today.year() && e.date.month() == today.month())
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::group_by_month_balance;

    fn entry(id: i64, date: &str, amount: f64, description: &str, category: &str) -> Entry {
        Entry {
            id: EntryId(id),
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            amount,
            description: description.to_string(),
            category: category.to_string(),
        }
    }

    fn ledger() -> Vec<Entry> {
        vec![
            entry(1, "2024-05-01", 10.0, "x", "jeux"),
            entry(2, "2024-05-15", -5.0, "y", "jeux"),
            entry(3, "2024-04-30", 3.5, "z", "virement"),
            entry(4, "2024-05-15", 2.0, "w", "divers"),
        ]
    }

    #[test]
    fn entry_rows_are_newest_first_and_stable() {
        let rows = render_entry_rows(&ledger());
        let ids: Vec<i64> = rows.iter().map(|r| r.id().unwrap().0).collect();
        assert_eq!(ids, vec![2, 4, 1, 3]);
    }

    #[test]
    fn entry_cells_are_formatted() {
        let rows = render_entry_rows(&[entry(7, "2024-05-01", -5.0, "café", "nourriture_perso")]);
        let row = &rows[0];
        assert_eq!(row.text(0), "01/05/2024");
        assert_eq!(row.text(1), "-5");
        assert_eq!(row.text(2), "café");
        assert_eq!(row.text(3), "nourriture (gâterie)");
        assert_eq!(row.cells[3].class.as_deref(), Some("cat-nourriture_perso"));
        assert_eq!(row.text(ACTIONS_COLUMN), "");
    }

    #[test]
    fn unknown_category_renders_its_key() {
        let rows = render_entry_rows(&[entry(1, "2024-05-01", 1.0, "?", "foo")]);
        let cell = &rows[0].cells[3];
        assert_eq!(cell.text, "foo");
        assert!(cell.style.as_deref().unwrap().contains(categories::FALLBACK_COLOR));
    }

    #[test]
    fn rendering_twice_gives_equal_rows() {
        let data = ledger();
        assert_eq!(render_entry_rows(&data), render_entry_rows(&data));
    }

    #[test]
    fn balance_rows_round_at_display() {
        let rows = render_balance_rows(&group_by_month_balance(&ledger()));
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].text(0), "mai 2024");
        assert_eq!(rows[0].text(1), "7.00");
        assert_eq!(rows[1].text(0), "avril 2024");
        assert_eq!(rows[1].text(1), "3.50");
        assert!(rows.iter().all(|r| r.id().is_none()));
    }

    #[test]
    fn current_period_keeps_only_this_month() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 20).unwrap();
        let current = current_period(&ledger(), today);
        assert_eq!(current.len(), 3);
        assert!(current.iter().all(|e| e.date.month() == 5));

        let next_year = NaiveDate::from_ymd_opt(2025, 5, 20).unwrap();
        assert!(current_period(&ledger(), next_year).is_empty());
    }
}

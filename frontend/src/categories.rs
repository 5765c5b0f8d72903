/// Display settings for one category key.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CategoryConfig {
    pub key: &'static str,
    pub label: &'static str,
    pub color: &'static str,
}

pub const FALLBACK_COLOR: &str = "#bbb";

/// Every known category, in selector order.
pub static CATEGORIES: [CategoryConfig; 8] = [
    CategoryConfig {
        key: "deplacement",
        label: "déplacement",
        color: "#A3E4D7",
    },
    CategoryConfig {
        key: "virement",
        label: "virement",
        color: "#F9E79F",
    },
    CategoryConfig {
        key: "nourriture_colloc",
        label: "nourriture (colloc)",
        color: "#AED6F1",
    },
    CategoryConfig {
        key: "nourriture_perso",
        label: "nourriture (gâterie)",
        color: "#FAD7A0",
    },
    CategoryConfig {
        key: "divers",
        label: "divers",
        color: "#D7DBDD",
    },
    CategoryConfig {
        key: "jeux",
        label: "jeux",
        color: "#F5B7B1",
    },
    CategoryConfig {
        key: "abonnement",
        label: "abonnement",
        color: "#D2B4DE",
    },
    CategoryConfig {
        key: "cadeaux",
        label: "cadeaux",
        color: "#F5CBA7",
    },
];

pub fn lookup(key: &str) -> Option<&'static CategoryConfig> {
    CATEGORIES.iter().find(|c| c.key == key)
}

/// Configured label, or the raw key for unknown categories.
pub fn label(key: &str) -> &str {
    match lookup(key) {
        Some(config) => config.label,
        None => key,
    }
}

pub fn color(key: &str) -> &'static str {
    lookup(key).map(|c| c.color).unwrap_or(FALLBACK_COLOR)
}

/// Class tagging a category cell: `cat-` followed by the key with whitespace
/// runs collapsed to `-`, lowercased.
pub fn category_class(key: &str) -> String {
    let slug = key
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .to_lowercase();
    format!("cat-{}", slug)
}

/// Inline style attributes for a category cell.
pub fn category_style(key: &str) -> String {
    format!(
        "background-color: {}; color: #333; font-weight: bold; text-align: center;",
        color(key)
    )
}

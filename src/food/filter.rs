use std::{fmt, str::FromStr};

use time::{Duration, OffsetDateTime};

use crate::{error::ValidationError, food::dto::FoodItem};

/// Trailing window of the `Recent` tab, inclusive.
pub const RECENT_WINDOW: Duration = Duration::days(7);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Tab {
    #[default]
    All,
    Recent,
    Consumed,
    WithCalories,
}

impl Tab {
    pub const ALL: [Tab; 4] = [Tab::All, Tab::Recent, Tab::Consumed, Tab::WithCalories];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tab::All => "all",
            Tab::Recent => "recent",
            Tab::Consumed => "consumed",
            Tab::WithCalories => "with-calories",
        }
    }

    /// Tab caption with its global count; `Recent` carries none.
    pub fn label(&self, counts: &TabCounts) -> String {
        match self {
            Tab::All => format!("All ({})", counts.all),
            Tab::Recent => "Recent".to_string(),
            Tab::Consumed => format!("Consumed ({})", counts.consumed),
            Tab::WithCalories => format!("With Calories ({})", counts.with_calories),
        }
    }

    fn keeps(&self, item: &FoodItem, now: OffsetDateTime) -> bool {
        match self {
            Tab::All => true,
            Tab::Recent => now - item.created_at <= RECENT_WINDOW,
            Tab::Consumed => item.consumed_date.is_some(),
            Tab::WithCalories => item.calorie.is_some_and(|c| c > 0),
        }
    }
}

impl fmt::Display for Tab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tab {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tab::ALL
            .into_iter()
            .find(|tab| tab.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                ValidationError::new(format!(
                    "unknown tab `{s}`; expected one of: all, recent, consumed, with-calories"
                ))
            })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState {
    pub search_term: String,
    pub active_tab: Tab,
}

/// Per-tab counts over the whole collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TabCounts {
    pub all: usize,
    pub recent: usize,
    pub consumed: usize,
    pub with_calories: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilteredView {
    pub items: Vec<FoodItem>,
    /// Sum over `items`; a missing calorie counts as zero.
    pub total_calories: i64,
    pub counts: TabCounts,
    pub filter: FilterState,
}

impl FilteredView {
    /// List heading, e.g. `Food Items (filtered: 2) - With calories`.
    pub fn heading(&self) -> String {
        let mut heading = String::from("Food Items");
        if !self.filter.search_term.is_empty() {
            heading.push_str(&format!(" (filtered: {})", self.items.len()));
        }
        let suffix = match self.filter.active_tab {
            Tab::All => None,
            Tab::Recent => Some("Recent"),
            Tab::Consumed => Some("Consumed"),
            Tab::WithCalories => Some("With calories"),
        };
        if let Some(suffix) = suffix {
            heading.push_str(" - ");
            heading.push_str(suffix);
        }
        heading
    }
}

fn matches_search(item: &FoodItem, needle: &str) -> bool {
    item.name.to_lowercase().contains(needle)
        || item
            .description
            .as_deref()
            .is_some_and(|d| d.to_lowercase().contains(needle))
}

/// Recomputes the view from scratch: search, then tab, then totals.
pub fn apply(items: &[FoodItem], filter: &FilterState, now: OffsetDateTime) -> FilteredView {
    let needle = filter.search_term.to_lowercase();
    let filtered: Vec<FoodItem> = items
        .iter()
        .filter(|item| needle.is_empty() || matches_search(item, &needle))
        .filter(|item| filter.active_tab.keeps(item, now))
        .cloned()
        .collect();

    let total_calories = filtered
        .iter()
        .map(|item| i64::from(item.calorie.unwrap_or(0)))
        .sum();

    let count = |tab: Tab| items.iter().filter(|item| tab.keeps(item, now)).count();
    let counts = TabCounts {
        all: items.len(),
        recent: count(Tab::Recent),
        consumed: count(Tab::Consumed),
        with_calories: count(Tab::WithCalories),
    };

    FilteredView {
        items: filtered,
        total_calories,
        counts,
        filter: filter.clone(),
    }
}

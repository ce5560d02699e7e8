//! Lane routing: heavy stories go to the deep lane, the rest to the fast lane.
//! Pure function over the kept items; no state, no I/O.

use serde::{Deserialize, Serialize};

use crate::types::{Category, ClassifiedItem, Lane};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelRules {
    /// Categories that always go deep.
    #[serde(default = "default_deep_categories")]
    pub deep_categories: Vec<Category>,
    /// Any category at or above this importance goes deep.
    #[serde(default = "default_deep_min_importance")]
    pub deep_min_importance: u8,
    /// Tech goes deep from this importance.
    #[serde(default = "default_tech_deep_min_importance")]
    pub tech_deep_min_importance: u8,
}

fn default_deep_categories() -> Vec<Category> {
    vec![Category::Politics, Category::Foreign, Category::Economy]
}
fn default_deep_min_importance() -> u8 {
    14
}
fn default_tech_deep_min_importance() -> u8 {
    12
}

impl Default for ChannelRules {
    fn default() -> Self {
        Self {
            deep_categories: default_deep_categories(),
            deep_min_importance: default_deep_min_importance(),
            tech_deep_min_importance: default_tech_deep_min_importance(),
        }
    }
}

impl ChannelRules {
    pub fn lane_for(&self, category: Category, importance: u8) -> Lane {
        let deep = self.deep_categories.contains(&category)
            || importance >= self.deep_min_importance
            || (category == Category::Tech && importance >= self.tech_deep_min_importance);
        if deep {
            Lane::Deep
        } else {
            Lane::Fast
        }
    }
}

/// Partition of the kept items; input order is preserved within each lane.
#[derive(Debug, Clone, Default)]
pub struct LaneSplit {
    pub fast: Vec<ClassifiedItem>,
    pub deep: Vec<ClassifiedItem>,
}

pub fn route(rules: &ChannelRules, kept: Vec<ClassifiedItem>) -> LaneSplit {
    let mut split = LaneSplit::default();
    for item in kept {
        match rules.lane_for(item.category(), item.importance()) {
            Lane::Fast => split.fast.push(item),
            Lane::Deep => split.deep.push(item),
        }
    }
    split
}

//! Model Registry
//!
//! Metadata for every attribution model Touchline can run, so callers can
//! list, look up and group models by name.

use std::collections::HashMap;

/// Families of attribution models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelCategory {
    /// Rule-based models over a single path
    Direct,
    /// Transition-graph models (Markov removal effect)
    Probabilistic,
    /// Coalition-game models (Shapley values)
    GameTheoretic,
    /// Presence lift between converting and non-converting journeys
    Lift,
}

impl ModelCategory {
    /// Display name of the category.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Probabilistic => "probabilistic",
            Self::GameTheoretic => "game-theoretic",
            Self::Lift => "lift",
        }
    }
}

/// Model metadata
#[derive(Debug, Clone)]
pub struct ModelInfo {
    /// Model name (unique identifier)
    pub name: &'static str,
    /// Model family
    pub category: ModelCategory,
    /// What the model credits and why
    pub description: &'static str,
    /// Whether the model also learns from non-converting journeys
    pub needs_non_conversions: bool,
}

/// Get all available model info
pub fn available_models() -> Vec<ModelInfo> {
    vec![
        ModelInfo {
            name: "first_touch",
            category: ModelCategory::Direct,
            description: "All credit to the first touchpoint in the window",
            needs_non_conversions: false,
        },
        ModelInfo {
            name: "last_touch",
            category: ModelCategory::Direct,
            description: "All credit to the last touchpoint before conversion",
            needs_non_conversions: false,
        },
        ModelInfo {
            name: "linear",
            category: ModelCategory::Direct,
            description: "Equal credit for every touchpoint",
            needs_non_conversions: false,
        },
        ModelInfo {
            name: "time_decay",
            category: ModelCategory::Direct,
            description: "Credit halves for every half-life further from conversion",
            needs_non_conversions: false,
        },
        ModelInfo {
            name: "position_based",
            category: ModelCategory::Direct,
            description: "Fixed shares for first and last touch, remainder split in the middle",
            needs_non_conversions: false,
        },
        ModelInfo {
            name: "data_driven",
            category: ModelCategory::Lift,
            description: "Channel presence lift of converting over non-converting journeys",
            needs_non_conversions: true,
        },
        ModelInfo {
            name: "markov",
            category: ModelCategory::Probabilistic,
            description: "Removal effect on conversion probability in a channel transition graph",
            needs_non_conversions: true,
        },
        ModelInfo {
            name: "shapley",
            category: ModelCategory::GameTheoretic,
            description: "Average marginal contribution of a channel to the conversion rate",
            needs_non_conversions: true,
        },
    ]
}

/// Get models by category
pub fn models_by_category(category: ModelCategory) -> Vec<ModelInfo> {
    available_models()
        .into_iter()
        .filter(|m| m.category == category)
        .collect()
}

/// Get model info by name
pub fn get_model_info(name: &str) -> Option<ModelInfo> {
    available_models().into_iter().find(|m| m.name == name)
}

/// List all model names
pub fn list_model_names() -> Vec<&'static str> {
    available_models().into_iter().map(|m| m.name).collect()
}

/// Count models by category
pub fn count_by_category() -> HashMap<ModelCategory, usize> {
    let mut counts = HashMap::new();
    for model in available_models() {
        *counts.entry(model.category).or_insert(0) += 1;
    }
    counts
}

//! Attribution engine
//!
//! Models form a closed set dispatched by [`AttributionModel`]. Direct models
//! credit a path from its own touchpoints. Graph-based models (`markov`,
//! `shapley`, `data_driven`) first learn one credit per channel from the whole
//! population and then apply it to each path; a path attributed without those
//! credits falls back to `linear`.

use crate::config::EngineConfig;
use crate::error::EngineError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use touchline_algorithmic::{
    ChannelCredits, LiftAttributionResult, MarkovAnalysis, MarkovConfig, MarkovModel,
    ShapleyAnalysis, ShapleyConfig, ShapleyModel, apply_channel_credits, data_driven_lift,
    lift_credits,
};
use touchline_data::{ChannelGrouping, IdentityMap, RawEvent};
use touchline_models::{
    AggregatedAttribution, AttributedTouchpoint, AttributionResult, ConversionPath, ModelInfo,
    PathBuilder, PathBuilderConfig, PathSet, PositionWeights, TimeDecayConfig, aggregate, first_touch,
    get_model_info, last_touch, linear, position_based, time_decay,
};
use tracing::{debug, info, warn};

/// Attribution model tag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributionModel {
    /// All credit to the earliest touchpoint
    FirstTouch,
    /// All credit to the latest touchpoint
    LastTouch,
    /// Equal credit per touchpoint
    #[default]
    Linear,
    /// Exponential decay towards the conversion
    TimeDecay,
    /// U-shaped first/middle/last weights
    PositionBased,
    /// Presence lift of channels
    DataDriven,
    /// Markov removal effects
    Markov,
    /// Shapley values
    Shapley,
}

impl AttributionModel {
    /// Every model, direct models first.
    pub const fn all() -> [Self; 8] {
        [
            Self::FirstTouch,
            Self::LastTouch,
            Self::Linear,
            Self::TimeDecay,
            Self::PositionBased,
            Self::DataDriven,
            Self::Markov,
            Self::Shapley,
        ]
    }

    /// The five direct models.
    pub const fn direct() -> [Self; 5] {
        [
            Self::FirstTouch,
            Self::LastTouch,
            Self::Linear,
            Self::TimeDecay,
            Self::PositionBased,
        ]
    }

    /// Snake-case model name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::FirstTouch => "first_touch",
            Self::LastTouch => "last_touch",
            Self::Linear => "linear",
            Self::TimeDecay => "time_decay",
            Self::PositionBased => "position_based",
            Self::DataDriven => "data_driven",
            Self::Markov => "markov",
            Self::Shapley => "shapley",
        }
    }

    /// Whether the model learns channel credits from the whole population.
    pub const fn is_graph_based(&self) -> bool {
        matches!(self, Self::DataDriven | Self::Markov | Self::Shapley)
    }

    /// Registry entry for the model.
    pub fn info(&self) -> Option<ModelInfo> {
        get_model_info(self.name())
    }
}

impl fmt::Display for AttributionModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AttributionModel {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::all()
            .into_iter()
            .find(|m| m.name() == normalized)
            .ok_or_else(|| EngineError::UnknownModel(s.to_string()))
    }
}

/// Everything [`attribute_path`] needs to credit one path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model to apply
    pub model: AttributionModel,
    /// Look-back window for [`attribute_events`] path building (default: 30)
    pub attribution_window_days: i64,
    /// Half-life for `time_decay` (default: 7)
    pub time_decay_half_life_days: f64,
    /// Weights for `position_based`; 40/20/40 when unset
    pub position_based_weights: Option<PositionWeights>,
    /// Precomputed Markov credits per channel
    pub markov_credits: Option<ChannelCredits>,
    /// Precomputed Shapley credits per channel
    pub shapley_credits: Option<ChannelCredits>,
    /// Precomputed lift credits per channel
    pub data_driven_credits: Option<ChannelCredits>,
    /// How touchpoints map to credited channels
    pub grouping: ChannelGrouping,
}

impl ModelConfig {
    /// Configuration with default parameters and no precomputed credits.
    pub fn new(model: AttributionModel) -> Self {
        Self {
            model,
            attribution_window_days: 30,
            time_decay_half_life_days: 7.0,
            position_based_weights: None,
            markov_credits: None,
            shapley_credits: None,
            data_driven_credits: None,
            grouping: ChannelGrouping::Source,
        }
    }

    /// Check the window, half-life and position weights.
    pub fn validate(&self) -> Result<(), EngineError> {
        TimeDecayConfig::new(self.time_decay_half_life_days)?;
        if let Some(weights) = &self.position_based_weights {
            weights.validate()?;
        }
        self.path_builder_config().validate()?;
        Ok(())
    }

    /// Path builder settings carrying this configuration's window.
    pub const fn path_builder_config(&self) -> PathBuilderConfig {
        PathBuilderConfig {
            attribution_window_days: self.attribution_window_days,
        }
    }

    /// Precomputed credits for the configured model, if it uses any.
    pub const fn credits(&self) -> Option<&ChannelCredits> {
        match self.model {
            AttributionModel::Markov => self.markov_credits.as_ref(),
            AttributionModel::Shapley => self.shapley_credits.as_ref(),
            AttributionModel::DataDriven => self.data_driven_credits.as_ref(),
            _ => None,
        }
    }

    /// Store credits for the configured model.
    pub fn with_credits(mut self, credits: ChannelCredits) -> Self {
        match self.model {
            AttributionModel::Markov => self.markov_credits = Some(credits),
            AttributionModel::Shapley => self.shapley_credits = Some(credits),
            AttributionModel::DataDriven => self.data_driven_credits = Some(credits),
            _ => {}
        }
        self
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::new(AttributionModel::default())
    }
}

/// Credit one conversion path under `config`.
///
/// Empty paths produce an empty list. Graph-based models without precomputed
/// credits are attributed linearly.
pub fn attribute_path(path: &ConversionPath, config: &ModelConfig) -> Vec<AttributedTouchpoint> {
    let touchpoints = &path.touchpoints;
    let value = path.conversion_value;

    match config.model {
        AttributionModel::FirstTouch => first_touch(touchpoints, value),
        AttributionModel::LastTouch => last_touch(touchpoints, value),
        AttributionModel::Linear => linear(touchpoints, value),
        AttributionModel::TimeDecay => {
            let decay = TimeDecayConfig {
                half_life_days: config.time_decay_half_life_days,
            };
            time_decay(touchpoints, value, path.converted_at, &decay)
        }
        AttributionModel::PositionBased => position_based(
            touchpoints,
            value,
            &config.position_based_weights.unwrap_or_default(),
        ),
        AttributionModel::DataDriven | AttributionModel::Markov | AttributionModel::Shapley => {
            if let Some(credits) = config.credits() {
                apply_channel_credits(path, credits, config.grouping)
            } else {
                warn!(
                    model = %config.model,
                    path_id = %path.conversion_id,
                    "No precomputed channel credits; falling back to linear"
                );
                linear(touchpoints, value)
            }
        }
    }
}

/// Build paths from raw events with the configured window and credit every
/// conversion path under `config`.
///
/// Non-converting journeys are built but not returned; graph-based models need
/// their credits precomputed in `config`.
pub fn attribute_events(
    events: &[RawEvent],
    identities: &IdentityMap,
    now: DateTime<Utc>,
    config: &ModelConfig,
) -> Result<Vec<AttributionResult>, EngineError> {
    config.validate()?;
    let paths = PathBuilder::new(config.path_builder_config())?.build_at(events, identities, now);

    Ok(paths
        .conversion_paths
        .iter()
        .map(|path| AttributionResult::new(path, config.model.name(), attribute_path(path, config)))
        .collect())
}

/// Population-level output of a graph-based model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum GlobalCredits {
    /// Presence lift per channel
    DataDriven {
        /// Lift results in channel order
        results: Vec<LiftAttributionResult>,
    },
    /// Markov removal effects
    Markov(MarkovAnalysis),
    /// Shapley values
    Shapley(ShapleyAnalysis),
}

impl GlobalCredits {
    /// Normalized credit per channel.
    pub fn channel_credits(&self) -> ChannelCredits {
        match self {
            Self::DataDriven { results } => lift_credits(results),
            Self::Markov(analysis) => analysis.channel_credits(),
            Self::Shapley(analysis) => analysis.channel_credits(),
        }
    }
}

/// Output of one engine run.
#[derive(Debug, Clone)]
pub struct EngineRun {
    /// Model that was applied
    pub model: AttributionModel,
    /// Paths built from the input events
    pub paths: PathSet,
    /// Population-level credits for graph-based models
    pub global: Option<GlobalCredits>,
    /// One result per conversion path
    pub results: Vec<AttributionResult>,
    /// Per-channel rollup, highest revenue first
    pub channels: Vec<AggregatedAttribution>,
}

impl EngineRun {
    /// Total value handed out across all paths.
    pub fn total_credit(&self) -> f64 {
        self.results.iter().map(AttributionResult::total_credit).sum()
    }
}

/// End-to-end attribution: paths, global credits, per-path credit, rollup.
#[derive(Debug, Clone)]
pub struct AttributionEngine {
    config: EngineConfig,
    path_builder: PathBuilder,
}

impl AttributionEngine {
    /// Create an engine with a validated configuration.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let path_builder = PathBuilder::new(config.path_builder.clone())?;
        Ok(Self {
            config,
            path_builder,
        })
    }

    /// Create an engine with default settings.
    pub fn try_default() -> Result<Self, EngineError> {
        Self::new(EngineConfig::default())
    }

    /// Active configuration.
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Build paths and attribute them, stamping non-converting journeys with now.
    pub fn run(
        &self,
        model: AttributionModel,
        events: &[RawEvent],
        identities: &IdentityMap,
    ) -> Result<EngineRun, EngineError> {
        self.run_at(model, events, identities, Utc::now())
    }

    /// Build paths with an explicit "now" and attribute them.
    pub fn run_at(
        &self,
        model: AttributionModel,
        events: &[RawEvent],
        identities: &IdentityMap,
        now: DateTime<Utc>,
    ) -> Result<EngineRun, EngineError> {
        let paths = self.build_paths(events, identities, now);
        self.run_paths(model, paths)
    }

    /// Build conversion and non-conversion paths without attributing them.
    pub fn build_paths(
        &self,
        events: &[RawEvent],
        identities: &IdentityMap,
        now: DateTime<Utc>,
    ) -> PathSet {
        self.path_builder.build_at(events, identities, now)
    }

    /// Attribute already built paths.
    pub fn run_paths(&self, model: AttributionModel, paths: PathSet) -> Result<EngineRun, EngineError> {
        let global = self.global_credits(model, &paths)?;

        let mut model_config = self.config.model_config(model);
        if let Some(global) = &global {
            model_config = model_config.with_credits(global.channel_credits());
        }

        let results: Vec<AttributionResult> = paths
            .conversion_paths
            .iter()
            .map(|path| AttributionResult::new(path, model.name(), attribute_path(path, &model_config)))
            .collect();
        let channels = aggregate(&results);

        info!(
            model = %model,
            conversion_paths = paths.conversion_paths.len(),
            non_conversion_paths = paths.non_conversion_paths.len(),
            channels = channels.len(),
            "Attribution run complete"
        );

        Ok(EngineRun {
            model,
            paths,
            global,
            results,
            channels,
        })
    }

    /// Population-level credits for a graph-based model; `None` for direct models.
    pub fn global_credits(
        &self,
        model: AttributionModel,
        paths: &PathSet,
    ) -> Result<Option<GlobalCredits>, EngineError> {
        let conversions = &paths.conversion_paths;
        let non_conversions = &paths.non_conversion_paths;
        let grouping = self.config.grouping;

        let global = match model {
            AttributionModel::DataDriven => Some(GlobalCredits::DataDriven {
                results: data_driven_lift(conversions, non_conversions, grouping),
            }),
            AttributionModel::Markov => {
                let markov = MarkovModel::new(MarkovConfig {
                    grouping,
                    ..self.config.markov.clone()
                })?;
                Some(GlobalCredits::Markov(markov.analyze(conversions, non_conversions)))
            }
            AttributionModel::Shapley => {
                let shapley = ShapleyModel::new(ShapleyConfig {
                    grouping,
                    ..self.config.shapley.clone()
                })?;
                Some(GlobalCredits::Shapley(shapley.analyze(conversions, non_conversions)))
            }
            _ => None,
        };

        if global.is_some() {
            debug!(model = %model, "Computed global channel credits");
        }
        Ok(global)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use chrono::{Duration, TimeZone};
    use rstest::rstest;
    use touchline_data::{Channel, EventType};
    use touchline_models::Touchpoint;

    fn scenario_path() -> ConversionPath {
        let at = Utc.with_ymd_and_hms(2024, 5, 20, 9, 30, 0).unwrap();
        let touch = |id: &str, days: i64, source: &str| {
            Touchpoint::new(id, at - Duration::days(days), Channel::new(source, None, None))
        };
        ConversionPath::new(
            "c1",
            vec![touch("g", 10, "google"), touch("f", 5, "facebook"), touch("e", 1, "email")],
            at,
            10_000.0,
        )
    }

    fn credits(model: AttributionModel) -> Vec<f64> {
        attribute_path(&scenario_path(), &ModelConfig::new(model))
            .iter()
            .map(|t| t.credit)
            .collect()
    }

    #[rstest]
    #[case("first_touch", AttributionModel::FirstTouch)]
    #[case("time-decay", AttributionModel::TimeDecay)]
    #[case(" Position_Based ", AttributionModel::PositionBased)]
    #[case("shapley", AttributionModel::Shapley)]
    fn test_parse_model(#[case] input: &str, #[case] expected: AttributionModel) {
        assert_eq!(input.parse::<AttributionModel>().unwrap(), expected);
    }

    #[test]
    fn test_model_names_round_trip() {
        for model in AttributionModel::all() {
            assert_eq!(model.to_string().parse::<AttributionModel>().unwrap(), model);
            assert!(model.info().is_some());
        }
        assert!(matches!(
            "last_click".parse::<AttributionModel>(),
            Err(EngineError::UnknownModel(_))
        ));
        assert_eq!(
            serde_json::to_string(&AttributionModel::DataDriven).unwrap(),
            "\"data_driven\""
        );
    }

    #[test]
    fn test_scenario_dispatch() {
        assert_eq!(credits(AttributionModel::FirstTouch), [10_000.0, 0.0, 0.0]);
        assert_eq!(credits(AttributionModel::LastTouch), [0.0, 0.0, 10_000.0]);
        let position = credits(AttributionModel::PositionBased);
        assert_abs_diff_eq!(position[0], 4000.0, epsilon = 1e-6);
        assert_abs_diff_eq!(position[1], 2000.0, epsilon = 1e-6);
        assert_abs_diff_eq!(position[2], 4000.0, epsilon = 1e-6);

        let decay = credits(AttributionModel::TimeDecay);
        assert!(decay[2] > decay[1] && decay[1] > decay[0]);
    }

    #[rstest]
    #[case(AttributionModel::Markov)]
    #[case(AttributionModel::Shapley)]
    #[case(AttributionModel::DataDriven)]
    fn test_graph_models_without_credits_fall_back_to_linear(#[case] model: AttributionModel) {
        for credit in credits(model) {
            assert_abs_diff_eq!(credit, 10_000.0 / 3.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_graph_model_with_credits() {
        let global: ChannelCredits = [("google".to_string(), 0.5), ("email".to_string(), 0.5)]
            .into_iter()
            .collect();
        let config = ModelConfig::new(AttributionModel::Markov).with_credits(global);
        let out = attribute_path(&scenario_path(), &config);
        assert_abs_diff_eq!(out[0].credit, 5_000.0, epsilon = 1e-9);
        assert_abs_diff_eq!(out[1].credit, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(out[2].credit, 5_000.0, epsilon = 1e-9);
        assert!(config.shapley_credits.is_none());
    }

    #[test]
    fn test_model_config_validation() {
        let mut config = ModelConfig::new(AttributionModel::TimeDecay);
        assert!(config.validate().is_ok());
        config.time_decay_half_life_days = 0.0;
        assert!(config.validate().is_err());

        let mut config = ModelConfig::new(AttributionModel::Linear);
        config.attribution_window_days = -1;
        assert!(config.validate().is_err());
    }

    #[rstest]
    #[case(30, 3)]
    #[case(7, 2)]
    #[case(2, 1)]
    fn test_attribute_events_uses_configured_window(#[case] window: i64, #[case] touches: usize) {
        let at = Utc.with_ymd_and_hms(2024, 5, 20, 9, 30, 0).unwrap();
        let touch = |id: &str, days: i64, source: &str| {
            RawEvent::new(id, at - Duration::days(days), EventType::PageView)
                .with_user("u1")
                .with_utm(source, None, None)
        };
        let events = vec![
            touch("g", 10, "google"),
            touch("f", 5, "facebook"),
            touch("e", 1, "email"),
            RawEvent::new("p1", at, EventType::Purchase).with_user("u1").with_value(900.0),
        ];
        let config = ModelConfig {
            attribution_window_days: window,
            ..ModelConfig::new(AttributionModel::Linear)
        };

        let results = attribute_events(&events, &IdentityMap::new(), at, &config).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].path_length, touches);
        assert_eq!(results[0].model, "linear");
        let total: f64 = results[0].touchpoints.iter().map(|t| t.credit).sum();
        assert_abs_diff_eq!(total, 900.0, epsilon = 1e-9);
    }

    #[test]
    fn test_attribute_events_rejects_bad_window() {
        let config = ModelConfig {
            attribution_window_days: 0,
            ..ModelConfig::default()
        };
        let err = attribute_events(&[], &IdentityMap::new(), Utc::now(), &config).unwrap_err();
        assert!(matches!(err, EngineError::Model(_)));
    }
}

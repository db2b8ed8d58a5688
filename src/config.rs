//! Configuration loading from TOML.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! The `[pricing]` table tunes the engine; `[[assets]]` and `[[periods]]`
//! describe an optional replay scenario for the binary. Every pricing
//! field has a default, so an empty file yields the refined model.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;

use crate::types::{PricingError, Side};

// ---------------------------------------------------------------------------
// Pricing policy
// ---------------------------------------------------------------------------

/// Which per-period transition the engine runs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PricingModel {
    /// Refined model: log volume impact against literal circulation,
    /// `circulation += bought - sold`. With `feedback`, the supply change
    /// also scales the new price.
    Logarithmic {
        #[serde(default)]
        feedback: bool,
    },
    /// Simple model: `price *= 1 + sensitivity * tanh(demand / c)`, where
    /// demand is this period's spending relative to a rolling baseline.
    /// Circulation is not tracked.
    Tanh {
        /// Largest fractional move per period.
        #[serde(default = "default_tanh_sensitivity")]
        sensitivity: f64,
        /// Saturation scale of the demand factor.
        #[serde(default = "default_tanh_c")]
        c: f64,
        /// Weight of the latest period in the rolling baseline.
        #[serde(default = "default_tanh_beta")]
        beta: f64,
    },
}

fn default_tanh_sensitivity() -> f64 {
    0.1
}

fn default_tanh_c() -> f64 {
    0.2
}

fn default_tanh_beta() -> f64 {
    0.3
}

impl Default for PricingModel {
    fn default() -> Self {
        PricingModel::Logarithmic { feedback: false }
    }
}

impl PricingModel {
    /// The simple model with its usual constants.
    pub fn tanh() -> Self {
        PricingModel::Tanh {
            sensitivity: default_tanh_sensitivity(),
            c: default_tanh_c(),
            beta: default_tanh_beta(),
        }
    }
}

/// What the logarithmic model's dampener is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dampener {
    /// `1 / (1 + ln(1 + price / reference_price))`.
    #[default]
    Price,
    /// `1 / (1 + ln(1 + circulation / reference_price))`, or 1 with nothing
    /// in circulation.
    Circulation,
}

/// Pricing engine constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    /// Multiplier on `ln(1 + volume_ratio)`.
    pub sensitivity: f64,
    /// Per-period swing bound at price zero, in percent.
    pub max_change_base: f64,
    /// Pivot at which the swing bound starts shrinking.
    pub max_change_reference: f64,
    /// Dampening pivot.
    pub reference_price: f64,
    /// Quantity the dampener is measured against.
    pub dampener: Dampener,
    /// Lower bound on circulation as a volume normaliser (division guard).
    pub circulation_floor: f64,
    /// Absolute minimum price.
    pub floor_price: f64,
    /// Amplify sell-dominated periods and loosen the drop bound.
    pub asymmetric_drop: bool,
    /// Drop bound as a multiple of the rise bound (asymmetric policy only).
    pub drop_bound_multiplier: f64,
    /// Scale the rise bound by `volume_ratio` when it exceeds 1.
    pub volume_boosted_rise_cap: bool,
    /// Transition selection: logarithmic (optionally with circulation
    /// feedback) or tanh against a rolling baseline. The swing-bound and
    /// dampener fields above apply to the logarithmic model only.
    pub model: PricingModel,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            sensitivity: 2.0,
            max_change_base: 300.0,
            max_change_reference: 50.0,
            reference_price: 100.0,
            dampener: Dampener::Price,
            circulation_floor: 1e-6,
            floor_price: 0.01,
            asymmetric_drop: false,
            drop_bound_multiplier: 1.2,
            volume_boosted_rise_cap: false,
            model: PricingModel::default(),
        }
    }
}

impl PricingConfig {
    /// The policy the chapter market backend ran in production:
    /// asymmetric drops, volume-boosted rise cap, floor of 10.
    pub fn chapter_market() -> Self {
        Self {
            circulation_floor: 1.0,
            floor_price: 10.0,
            asymmetric_drop: true,
            volume_boosted_rise_cap: true,
            ..Self::default()
        }
    }

    /// Circulation feedback with circulation-based dampening.
    pub fn circulation_feedback() -> Self {
        Self {
            dampener: Dampener::Circulation,
            model: PricingModel::Logarithmic { feedback: true },
            ..Self::default()
        }
    }

    /// The simple model: tanh demand against a rolling baseline.
    pub fn rolling_baseline() -> Self {
        Self {
            model: PricingModel::tanh(),
            ..Self::default()
        }
    }

/// Check every constant is in range. Called once at engine construction.
    pub fn validate(&self) -> Result<(), PricingError> {
        positive("sensitivity", self.sensitivity)?;
        positive("max_change_base", self.max_change_base)?;
        positive("max_change_reference", self.max_change_reference)?;
        positive("reference_price", self.reference_price)?;
        positive("circulation_floor", self.circulation_floor)?;
        positive("floor_price", self.floor_price)?;

        if !self.drop_bound_multiplier.is_finite() || self.drop_bound_multiplier < 1.0 {
            return Err(PricingError::InvalidConfig {
                field: "drop_bound_multiplier",
                value: self.drop_bound_multiplier,
                reason: "must be >= 1",
            });
        }

        if let PricingModel::Tanh { sensitivity, c, beta } = self.model {
            unit_interval("model.sensitivity", sensitivity)?;
            positive("model.c", c)?;
            unit_interval("model.beta", beta)?;
        }

        Ok(())
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), PricingError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(PricingError::InvalidConfig {
            field,
            value,
            reason: "must be a finite number > 0",
        })
    }
}

fn unit_interval(field: &'static str, value: f64) -> Result<(), PricingError> {
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(PricingError::InvalidConfig {
            field,
            value,
            reason: "must be in (0, 1]",
        })
    }
}

// ---------------------------------------------------------------------------
// Replay scenario
// ---------------------------------------------------------------------------

/// An asset to list before the first period.
#[derive(Debug, Deserialize, Clone)]
pub struct AssetSeed {
    pub name: String,
    pub price: f64,
    #[serde(default)]
    pub circulation: f64,
}

/// A single scripted trade.
#[derive(Debug, Deserialize, Clone)]
pub struct TradeSeed {
    pub asset: String,
    pub side: Side,
    pub quantity: f64,
}

/// Trades submitted during one chapter.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct PeriodSeed {
    #[serde(default)]
    pub trades: Vec<TradeSeed>,
}

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub pricing: PricingConfig,
    #[serde(default)]
    pub assets: Vec<AssetSeed>,
    #[serde(default)]
    pub periods: Vec<PeriodSeed>,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::parse(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    /// Parse configuration from TOML text.
    pub fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_config() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config.toml");
        let cfg = AppConfig::load(path).unwrap();
        assert!(cfg.pricing.validate().is_ok());
        assert!(!cfg.assets.is_empty());
        assert!(!cfg.periods.is_empty());
    }

    #[test]
    fn test_load_missing_file() {
        let err = AppConfig::load("/nonexistent/stockpiece.toml").unwrap_err();
        assert!(format!("{err}").contains("Failed to read config file"));
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let cfg = AppConfig::parse("").unwrap();
        assert_eq!(cfg.pricing, PricingConfig::default());
        assert!(cfg.assets.is_empty());
    }

    #[test]
    fn test_partial_pricing_table() {
        let cfg = AppConfig::parse(
            r#"
            [pricing]
            floor_price = 10.0
            asymmetric_drop = true

            [pricing.model]
            kind = "tanh"
            beta = 0.5
            "#,
        )
        .unwrap();
        assert_eq!(cfg.pricing.floor_price, 10.0);
        assert!(cfg.pricing.asymmetric_drop);
        assert_eq!(cfg.pricing.reference_price, 100.0);
        assert_eq!(
            cfg.pricing.model,
            PricingModel::Tanh { sensitivity: 0.1, c: 0.2, beta: 0.5 }
        );
    }

    #[test]
    fn test_circulation_feedback_parses() {
        let cfg = AppConfig::parse(
            r#"
            [pricing]
            dampener = "circulation"

            [pricing.model]
            kind = "logarithmic"
            feedback = true
            "#,
        )
        .unwrap();
        assert_eq!(cfg.pricing, PricingConfig::circulation_feedback());
    }

    #[test]
    fn test_scenario_parses() {
        let cfg = AppConfig::parse(
            r#"
            [[assets]]
            name = "Luffy"
            price = 1000.0

            [[periods]]
            trades = [
                { asset = "Luffy", side = "buy", quantity = 100 },
                { asset = "Luffy", side = "sell", quantity = 20 },
            ]

            [[periods]]
            "#,
        )
        .unwrap();
        assert_eq!(cfg.assets[0].circulation, 0.0);
        assert_eq!(cfg.periods.len(), 2);
        assert_eq!(cfg.periods[0].trades[1].side, Side::Sell);
        assert!(cfg.periods[1].trades.is_empty());
    }

    #[test]
    fn test_presets_validate() {
        assert!(PricingConfig::default().validate().is_ok());
        assert!(PricingConfig::chapter_market().validate().is_ok());
        assert!(PricingConfig::circulation_feedback().validate().is_ok());
        assert!(PricingConfig::rolling_baseline().validate().is_ok());
    }

    #[test]
    fn test_negative_floor_rejected() {
        let cfg = PricingConfig { floor_price: -1.0, ..Default::default() };
        assert!(matches!(
            cfg.validate(),
            Err(PricingError::InvalidConfig { field: "floor_price", .. })
        ));
    }

    #[test]
    fn test_zero_circulation_floor_rejected() {
        let cfg = PricingConfig { circulation_floor: 0.0, ..Default::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_nan_constant_rejected() {
        let cfg = PricingConfig { reference_price: f64::NAN, ..Default::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_drop_bound_multiplier_below_one_rejected() {
        let cfg = PricingConfig { drop_bound_multiplier: 0.5, ..Default::default() };
        assert!(matches!(
            cfg.validate(),
            Err(PricingError::InvalidConfig { field: "drop_bound_multiplier", .. })
        ));
    }

    #[test]
    fn test_tanh_constants_out_of_range_rejected() {
        let tanh = |sensitivity, c, beta| PricingConfig {
            model: PricingModel::Tanh { sensitivity, c, beta },
            ..Default::default()
        };
        assert!(tanh(0.1, 0.2, 0.0).validate().is_err());
        assert!(tanh(0.1, 0.2, 1.5).validate().is_err());
        assert!(tanh(0.1, 0.2, 1.0).validate().is_ok());
        assert!(matches!(
            tanh(0.1, 0.0, 0.3).validate(),
            Err(PricingError::InvalidConfig { field: "model.c", .. })
        ));
        assert!(matches!(
            tanh(1.5, 0.2, 0.3).validate(),
            Err(PricingError::InvalidConfig { field: "model.sensitivity", .. })
        ));
        assert!(tanh(f64::NAN, 0.2, 0.3).validate().is_err());
    }
}

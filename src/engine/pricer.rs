//! Per-period price update.
//!
//! Turns one period's buy/sell counts into a new price and supply for a
//! single asset. The logarithmic model measures volume relative to supply
//! and damps it so expensive assets move less and have a tighter swing
//! bound. The tanh model compares spending against a rolling baseline and
//! saturates at a fixed fraction per period.

use tracing::{debug, warn};

use crate::config::{Dampener, PricingConfig, PricingModel};
use crate::types::{Asset, PriceUpdate, PricingError};

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Applies one policy to any number of independent assets.
#[derive(Debug, Clone)]
pub struct PricingEngine {
    config: PricingConfig,
}

impl PricingEngine {
    /// Build an engine, rejecting out-of-range constants up front.
    pub fn new(config: PricingConfig) -> Result<Self, PricingError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Access the pricing configuration.
    pub fn config(&self) -> &PricingConfig {
        &self.config
    }

    /// Largest symmetric swing the logarithmic model allows in one period
    /// at `price`, in percent.
    pub fn max_change_percent(&self, price: f64) -> f64 {
        self.config.max_change_base / (1.0 + (1.0 + price / self.config.max_change_reference).ln())
    }

    /// Rise and drop bounds at `price`, in percent, before any volume boost.
    pub fn swing_bounds(&self, price: f64) -> (f64, f64) {
        match self.config.model {
            PricingModel::Tanh { sensitivity, .. } => (sensitivity * 100.0, sensitivity * 100.0),
            PricingModel::Logarithmic { .. } => {
                let bound = self.max_change_percent(price);
                if self.config.asymmetric_drop {
                    (bound, bound * self.config.drop_bound_multiplier)
                } else {
                    (bound, bound)
                }
            }
        }
    }

    /// Settle an asset using its own accumulated period counters.
    pub fn settle(&self, asset: &mut Asset) -> Result<PriceUpdate, PricingError> {
        let (bought, sold) = (asset.bought_this_period, asset.sold_this_period);
        self.advance_period(asset, bought, sold)
    }

    /// Advance `asset` by one period given the shares bought and sold.
    ///
    /// On error the asset is left untouched. On success price, supply,
    /// baseline and `previous_price` are updated and the period counters
    /// are cleared.
    pub fn advance_period(
        &self,
        asset: &mut Asset,
        bought: f64,
        sold: f64,
    ) -> Result<PriceUpdate, PricingError> {
        let update = self.quote(asset, bought, sold)?;
        self.apply(asset, &update);
        Ok(update)
    }

    /// Compute the outcome of one period without touching `asset`.
    pub fn quote(&self, asset: &Asset, bought: f64, sold: f64) -> Result<PriceUpdate, PricingError> {
        check_quantity(&asset.name, "bought", bought)?;
        check_quantity(&asset.name, "sold", sold)?;
        if !asset.price.is_finite() || asset.price <= 0.0 {
            return Err(PricingError::InvalidInput(format!(
                "{} has non-positive price {}",
                asset.name, asset.price
            )));
        }
        if asset.price < self.config.floor_price {
            return Err(PricingError::InvalidInput(format!(
                "{} is priced at {}, below the floor price {}",
                asset.name, asset.price, self.config.floor_price
            )));
        }

        let total_volume = bought + sold;
        if !total_volume.is_finite() {
            return Err(PricingError::InvalidInput(format!(
                "trade volume for {} overflows: bought={bought} sold={sold}",
                asset.name
            )));
        }

        if total_volume == 0.0 {
            let (max_rise_percent, max_drop_percent) = self.swing_bounds(asset.price);
            return Ok(PriceUpdate::unchanged(asset, max_rise_percent, max_drop_percent));
        }

        let update = match self.config.model {
            PricingModel::Logarithmic { feedback } => {
                self.quote_logarithmic(asset, bought, sold, total_volume, feedback)
            }
            PricingModel::Tanh { sensitivity, c, beta } => {
                quote_tanh(&self.config, asset, bought, sold, sensitivity, c, beta)?
            }
        };

        let finite = update.new_price.is_finite()
            && update.percent_change.is_finite()
            && update.baseline.is_finite();
        if !finite {
            return Err(PricingError::InvalidInput(format!(
                "price update for {} overflows: bought={bought} sold={sold}",
                asset.name
            )));
        }
        Ok(update)
    }

    /// Commit an update quoted for `asset` and clear its period counters.
    pub(crate) fn apply(&self, asset: &mut Asset, update: &PriceUpdate) {
        if update.floor_engaged {
            warn!(
                asset = %asset.name,
                raw = format!("{:.2}%", update.raw_percent_change),
                floor = update.new_price,
                "Price hit floor"
            );
        }

        asset.price = update.new_price;
        asset.previous_price = update.old_price;
        asset.circulation = update.circulation;
        asset.baseline = update.baseline;
        asset.bought_this_period = 0.0;
        asset.sold_this_period = 0.0;

        debug!(
            asset = %asset.name,
            buy_pressure = format!("{:.3}", update.buy_pressure),
            volume_ratio = format!("{:.3}", update.volume_ratio),
            raw = format!("{:.2}%", update.raw_percent_change),
            change = format!("{:+.2}%", update.percent_change),
            price = format!("{:.2}", update.new_price),
            "Period advanced"
        );
    }

    fn quote_logarithmic(
        &self,
        asset: &Asset,
        bought: f64,
        sold: f64,
        total_volume: f64,
        feedback: bool,
    ) -> PriceUpdate {
        let cfg = &self.config;
        let old_price = asset.price;
        let (mut max_rise_percent, max_drop_percent) = self.swing_bounds(old_price);

        let effective_circulation = asset.circulation.max(cfg.circulation_floor);
        let buy_pressure = (bought - sold) / total_volume;
        // Saturated: a finite volume on a floored float can still overflow.
        let volume_ratio = (total_volume / effective_circulation).min(f64::MAX);

        if buy_pressure == 0.0 {
            return PriceUpdate {
                volume_ratio,
                ..PriceUpdate::unchanged(asset, max_rise_percent, max_drop_percent)
            };
        }

        let volume_impact = (1.0 + volume_ratio).ln() * cfg.sensitivity;
        let dampener = match cfg.dampener {
            Dampener::Price => 1.0 / (1.0 + (1.0 + old_price / cfg.reference_price).ln()),
            Dampener::Circulation if asset.circulation > 0.0 => {
                1.0 / (1.0 + (1.0 + asset.circulation / cfg.reference_price).ln())
            }
            Dampener::Circulation => 1.0,
        };

        let mut raw_percent_change = buy_pressure * volume_impact * dampener * 100.0;

        if cfg.volume_boosted_rise_cap && volume_ratio > 1.0 {
            max_rise_percent *= volume_ratio;
        }
        if cfg.asymmetric_drop {
            let sell_ratio = sold / total_volume;
            if sell_ratio > 0.5 {
                raw_percent_change *= 1.0 + (sell_ratio - 0.5);
            }
        }

        let clamped = raw_percent_change.clamp(-max_drop_percent, max_rise_percent);
        let mut new_price = old_price * (1.0 + clamped / 100.0);

        let new_circulation = (asset.circulation + bought - sold).max(0.0);
        if feedback {
            // Both sides floored, so a sub-floor float scales by 1.
            let factor = new_circulation.max(cfg.circulation_floor) / effective_circulation;
            let lower = old_price * (1.0 - max_drop_percent / 100.0);
            let upper = old_price * (1.0 + max_rise_percent / 100.0);
            new_price = (new_price * factor).clamp(lower, upper);
        }

        let floor_engaged = new_price < cfg.floor_price;
        if floor_engaged {
            new_price = cfg.floor_price;
        }

        PriceUpdate {
            old_price,
            new_price,
            percent_change: (new_price - old_price) / old_price * 100.0,
            buy_pressure,
            volume_ratio,
            raw_percent_change,
            max_rise_percent,
            max_drop_percent,
            circulation: new_circulation,
            baseline: asset.baseline,
            floor_engaged,
        }
    }
}

fn quote_tanh(
    cfg: &PricingConfig,
    asset: &Asset,
    bought: f64,
    sold: f64,
    sensitivity: f64,
    c: f64,
    beta: f64,
) -> Result<PriceUpdate, PricingError> {
    if !asset.baseline.is_finite() || asset.baseline < 0.0 {
        return Err(PricingError::InvalidInput(format!(
            "{} has invalid baseline {}",
            asset.name, asset.baseline
        )));
    }

    let old_price = asset.price;
    let bound = sensitivity * 100.0;
    let spending = bought * old_price;

    // No baseline yet: nothing to measure demand against.
    let (volume_ratio, adjustment) = if asset.baseline > 0.0 {
        let demand_factor = (spending - asset.baseline) / asset.baseline;
        (
            (spending / asset.baseline).min(f64::MAX),
            sensitivity * (demand_factor / c).tanh(),
        )
    } else {
        (0.0, 0.0)
    };

    let mut new_price = old_price + old_price * adjustment;
    let floor_engaged = new_price < cfg.floor_price;
    if floor_engaged {
        new_price = cfg.floor_price;
    }

    Ok(PriceUpdate {
        old_price,
        new_price,
        percent_change: (new_price - old_price) / old_price * 100.0,
        buy_pressure: (bought - sold) / (bought + sold),
        volume_ratio,
        raw_percent_change: adjustment * 100.0,
        max_rise_percent: bound,
        max_drop_percent: bound,
        circulation: asset.circulation,
        baseline: beta * (bought * new_price) + (1.0 - beta) * asset.baseline,
        floor_engaged,
    })
}

fn check_quantity(asset: &str, field: &str, value: f64) -> Result<(), PricingError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(PricingError::InvalidInput(format!(
            "{field} for {asset} must be a non-negative number, got {value}"
        )))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

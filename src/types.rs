//! Shared types for the StockPiece pricing engine.
//!
//! Assets, trade sides, per-period results and the error taxonomy.
//! The engine and market modules both depend on these.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Trade direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

// ---------------------------------------------------------------------------
// Asset
// ---------------------------------------------------------------------------

/// Closing price of an asset for one chapter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub chapter: u64,
    pub price: f64,
}

/// A tradable character stock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    pub name: String,
    /// Current price in currency units. Always > 0.
    pub price: f64,
    /// Price before the most recent update.
    pub previous_price: f64,
    /// Outstanding shares.
    pub circulation: f64,
    /// Rolling traded-value reference (tanh model only).
    pub baseline: f64,
    pub bought_this_period: f64,
    pub sold_this_period: f64,
    /// One entry per closed chapter.
    pub history: Vec<PricePoint>,
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} @ {:.2} ({:+.2}%) | circulation={:.0} | pending buy={:.0} sell={:.0}",
            self.name,
            self.price,
            self.last_change_percent(),
            self.circulation,
            self.bought_this_period,
            self.sold_this_period,
        )
    }
}

impl Asset {
    /// List a new asset at the given price and circulation.
    pub fn new(name: impl Into<String>, price: f64, circulation: f64) -> Self {
        Self {
            name: name.into(),
            price,
            previous_price: price,
            circulation,
            baseline: price * circulation,
            bought_this_period: 0.0,
            sold_this_period: 0.0,
            history: Vec::new(),
        }
    }

    /// Accumulate a trade into this period's counters.
    pub fn record_trade(&mut self, side: Side, quantity: f64) -> Result<(), PricingError> {
        if !quantity.is_finite() || quantity < 0.0 {
            return Err(PricingError::InvalidInput(format!(
                "{side} quantity for {} must be a non-negative number, got {quantity}",
                self.name
            )));
        }
        if !(self.pending_volume() + quantity).is_finite() {
            return Err(PricingError::InvalidInput(format!(
                "{side} of {quantity} on {} overflows this period's volume",
                self.name
            )));
        }
        match side {
            Side::Buy => self.bought_this_period += quantity,
            Side::Sell => self.sold_this_period += quantity,
        }
        Ok(())
    }

    /// Total shares traded so far this period.
    pub fn pending_volume(&self) -> f64 {
        self.bought_this_period + self.sold_this_period
    }

    /// Percent move of the most recent update.
    pub fn last_change_percent(&self) -> f64 {
        if self.previous_price <= 0.0 {
            0.0
        } else {
            (self.price - self.previous_price) / self.previous_price * 100.0
        }
    }
}

// ---------------------------------------------------------------------------
// Update results
// ---------------------------------------------------------------------------

/// Outcome of advancing one asset by one period.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceUpdate {
    pub old_price: f64,
    pub new_price: f64,
    /// Realised move, `(new - old) / old * 100`.
    pub percent_change: f64,
    /// Net directional signal in [-1, 1].
    pub buy_pressure: f64,
    pub volume_ratio: f64,
    /// Move before clamping.
    pub raw_percent_change: f64,
    pub max_rise_percent: f64,
    pub max_drop_percent: f64,
    /// Circulation after the update.
    pub circulation: f64,
    /// Rolling baseline after the update.
    pub baseline: f64,
    /// Whether the floor price lifted the result.
    pub floor_engaged: bool,
}

impl PriceUpdate {
    /// Result that leaves `asset` where it is, reporting the swing bounds
    /// that applied at its price.
    pub fn unchanged(asset: &Asset, max_rise_percent: f64, max_drop_percent: f64) -> Self {
        Self {
            old_price: asset.price,
            new_price: asset.price,
            percent_change: 0.0,
            buy_pressure: 0.0,
            volume_ratio: 0.0,
            raw_percent_change: 0.0,
            max_rise_percent,
            max_drop_percent,
            circulation: asset.circulation,
            baseline: asset.baseline,
            floor_engaged: false,
        }
    }
}

impl fmt::Display for PriceUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.2} -> {:.2} ({:+.2}%)",
            self.old_price, self.new_price, self.percent_change
        )
    }
}

/// A named asset's update within a period report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetUpdate {
    pub name: String,
    pub update: PriceUpdate,
}

/// Summary of one closed chapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodReport {
    pub chapter: u64,
    pub timestamp: DateTime<Utc>,
    /// Sorted by asset name.
    pub updates: Vec<AssetUpdate>,
}

impl PeriodReport {
    /// Update for a named asset, if it was part of this period.
    pub fn update_for(&self, name: &str) -> Option<&PriceUpdate> {
        self.updates.iter().find(|u| u.name == name).map(|u| &u.update)
    }

    /// Number of assets whose price moved.
    pub fn movers(&self) -> usize {
        self.updates
            .iter()
            .filter(|u| u.update.new_price != u.update.old_price)
            .count()
    }

    /// Largest absolute mover, if any asset moved.
    pub fn biggest_mover(&self) -> Option<&AssetUpdate> {
        self.updates
            .iter()
            .filter(|u| u.update.percent_change != 0.0)
            .max_by(|a, b| {
                a.update
                    .percent_change
                    .abs()
                    .partial_cmp(&b.update.percent_change.abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
    }
}

impl fmt::Display for PeriodReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Chapter #{}: assets={} movers={}",
            self.chapter,
            self.updates.len(),
            self.movers(),
        )?;
        if let Some(top) = self.biggest_mover() {
            write!(f, " top={} {}", top.name, top.update)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Error taxonomy for the pricing engine and market.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PricingError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid configuration: {field} = {value} ({reason})")]
    InvalidConfig {
        field: &'static str,
        value: f64,
        reason: &'static str,
    },

    #[error("Unknown asset: {0}")]
    UnknownAsset(String),

    #[error("Asset already listed: {0}")]
    DuplicateAsset(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

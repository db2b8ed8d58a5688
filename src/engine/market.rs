//! Market: the set of listed assets and the chapter close.
//!
//! Collects trades into each asset's period counters, then closes the
//! chapter: every asset is quoted through the pricing engine, and only if
//! all quotes succeed are they committed, closing prices appended to each
//! history and a report returned.

use chrono::Utc;
use std::collections::BTreeMap;
use tracing::{debug, info};

use super::pricer::PricingEngine;
use crate::types::{Asset, AssetUpdate, PeriodReport, PricePoint, PricingError, Side};

pub struct Market {
    engine: PricingEngine,
    assets: BTreeMap<String, Asset>,
    chapter: u64,
}

impl Market {
    pub fn new(engine: PricingEngine) -> Self {
        Self {
            engine,
            assets: BTreeMap::new(),
            chapter: 0,
        }
    }

    pub fn engine(&self) -> &PricingEngine {
        &self.engine
    }

    /// Number of the last closed chapter (0 before the first close).
    pub fn chapter(&self) -> u64 {
        self.chapter
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Asset> {
        self.assets.get(name)
    }

    /// Listed assets in name order.
    pub fn assets(&self) -> impl Iterator<Item = &Asset> {
        self.assets.values()
    }

    /// List a new asset.
    pub fn list(&mut self, name: &str, price: f64, circulation: f64) -> Result<&Asset, PricingError> {
        if self.assets.contains_key(name) {
            return Err(PricingError::DuplicateAsset(name.to_string()));
        }
        if !price.is_finite() || price <= 0.0 {
            return Err(PricingError::InvalidInput(format!(
                "listing price for {name} must be > 0, got {price}"
            )));
        }
        let floor = self.engine.config().floor_price;
        if price < floor {
            return Err(PricingError::InvalidInput(format!(
                "listing price for {name} is below the floor price {floor}"
            )));
        }
        if !circulation.is_finite() || circulation < 0.0 {
            return Err(PricingError::InvalidInput(format!(
                "circulation for {name} must be >= 0, got {circulation}"
            )));
        }

        info!(asset = name, price, circulation, "Asset listed");
        let asset = self
            .assets
            .entry(name.to_string())
            .or_insert_with(|| Asset::new(name, price, circulation));
        Ok(&*asset)
    }

    /// Accumulate a trade against a listed asset for the current chapter.
    pub fn record_trade(&mut self, name: &str, side: Side, quantity: f64) -> Result<(), PricingError> {
        let asset = self
            .assets
            .get_mut(name)
            .ok_or_else(|| PricingError::UnknownAsset(name.to_string()))?;
        asset.record_trade(side, quantity)?;
        debug!(asset = name, %side, quantity, "Trade recorded");
        Ok(())
    }

    /// Close the current chapter and reprice every asset.
    ///
    /// All or nothing: if any asset fails to settle, no asset is changed
    /// and the chapter is not advanced.
    pub fn close_period(&mut self) -> Result<PeriodReport, PricingError> {
        let chapter = self.chapter + 1;

        let quotes = self
            .assets
            .values()
            .map(|asset| {
                self.engine
                    .quote(asset, asset.bought_this_period, asset.sold_this_period)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut updates = Vec::with_capacity(quotes.len());
        for ((name, asset), update) in self.assets.iter_mut().zip(quotes) {
            self.engine.apply(asset, &update);
            asset.history.push(PricePoint {
                chapter,
                price: update.new_price,
            });
            updates.push(AssetUpdate {
                name: name.clone(),
                update,
            });
        }

        self.chapter = chapter;
        let report = PeriodReport {
            chapter,
            timestamp: Utc::now(),
            updates,
        };

        info!(
            chapter,
            assets = report.updates.len(),
            movers = report.movers(),
            "Chapter closed"
        );

        Ok(report)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

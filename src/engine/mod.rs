//! Core engine: per-asset price updates and the chapter close.

pub mod pricer;
pub mod market;

pub use market::Market;
pub use pricer::PricingEngine;

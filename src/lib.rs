//! StockPiece: chapter-based character stock pricing engine
//!
//! Library crate exposing all modules for use by integration tests
//! and the replay binary.

pub mod config;
pub mod types;
pub mod engine;

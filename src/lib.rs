//! PriceBot Library
//!
//! Price lookup and one-shot alert core for a chat price bot

pub mod alerts;
pub mod bot;
pub mod config;
pub mod error;
pub mod quotes;
pub mod sources;
pub mod symbols;
pub mod types;

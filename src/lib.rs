//! qsb - blended search suggestions
//!
//! Fans a query out to a set of corpora, each backed by one or more sources,
//! collects the per-corpus answers into a [`suggestions::Suggestions`]
//! aggregate as they arrive, and blends them into a bounded promoted list.
//! Clicks are remembered and come back as shortcuts for later queries.

pub mod cli;
pub mod config;
pub mod corpus;
pub mod error;
pub mod promotion;
pub mod provider;
pub mod shortcuts;
pub mod strategy;
pub mod suggestion;
pub mod suggestions;

pub use error::{QsbError, Result};

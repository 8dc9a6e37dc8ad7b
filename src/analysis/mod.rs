//! Price analysis modules.
//!
//! The aggregator turns comparable sales into an estimate; the
//! narrative module explains it in plain text.

pub mod aggregator;
pub mod narrative;

pub use aggregator::*;
pub use narrative::{format_currency, format_number};

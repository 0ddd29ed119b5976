//! Multi-currency handling and exchange rates.

pub mod exchange;
pub mod service;

#[cfg(test)]
mod props;

pub use exchange::{RateError, RateSource, ResolvedRate, StaticRateTable};
pub use service::CurrencyService;

//! Exchange rate types and an in-memory rate table.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ports::ExchangeRateResolver;

/// How a rate was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateSource {
    /// Stored for the requested pair.
    Direct,
    /// Inverted from the opposite pair.
    Inverse,
    /// Derived through a pivot currency.
    Triangulated,
}

/// Rate returned by a resolver: 1 `from` = `rate` `to`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedRate {
    /// Conversion rate.
    pub rate: Decimal,
    /// Effective date of the stored rate used.
    pub as_of: NaiveDate,
    /// Lookup path.
    pub source: RateSource,
}

impl ResolvedRate {
    /// Returns the inverse rate, or `None` when the rate is zero.
    #[must_use]
    pub fn inverse(&self) -> Option<Self> {
        (!self.rate.is_zero()).then(|| Self {
            rate: Decimal::ONE / self.rate,
            as_of: self.as_of,
            source: RateSource::Inverse,
        })
    }
}

/// Rate lookup failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RateError {
    /// No rate on or before the date.
    #[error("No exchange rate found for {from} to {to} on {date}")]
    NotFound {
        /// Source currency.
        from: String,
        /// Target currency.
        to: String,
        /// Requested date.
        date: NaiveDate,
    },

    /// Rate source failed.
    #[error("Exchange rate lookup failed: {0}")]
    Backend(String),
}

/// In-memory rate table: latest rate on or before the date, direct then inverse.
#[derive(Debug, Clone, Default)]
pub struct StaticRateTable {
    rates: HashMap<(String, String), Vec<(NaiveDate, Decimal)>>,
}

impl StaticRateTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a rate effective from `effective_date`.
    #[must_use]
    pub fn with_rate(mut self, from: &str, to: &str, effective_date: NaiveDate, rate: Decimal) -> Self {
        let entry = self
            .rates
            .entry((from.to_string(), to.to_string()))
            .or_default();
        entry.push((effective_date, rate));
        entry.sort_by_key(|(date, _)| *date);
        self
    }

    fn lookup(&self, from: &str, to: &str, date: NaiveDate) -> Option<ResolvedRate> {
        self.rates
            .get(&(from.to_string(), to.to_string()))?
            .iter()
            .rev()
            .find(|(effective, _)| *effective <= date)
            .map(|(effective, rate)| ResolvedRate {
                rate: *rate,
                as_of: *effective,
                source: RateSource::Direct,
            })
    }
}

#[async_trait]
impl ExchangeRateResolver for StaticRateTable {
    async fn resolve(
        &self,
        from: &str,
        to: &str,
        date: NaiveDate,
    ) -> Result<ResolvedRate, RateError> {
        if from == to {
            return Ok(ResolvedRate {
                rate: Decimal::ONE,
                as_of: date,
                source: RateSource::Direct,
            });
        }
        if let Some(rate) = self.lookup(from, to, date) {
            return Ok(rate);
        }
        self.lookup(to, from, date)
            .and_then(|rate| rate.inverse())
            .ok_or_else(|| RateError::NotFound {
                from: from.to_string(),
                to: to.to_string(),
                date,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, d).unwrap()
    }

    #[tokio::test]
    async fn test_latest_rate_on_or_before_date() {
        let table = StaticRateTable::new()
            .with_rate("EUR", "USD", date(1), dec!(1.10))
            .with_rate("EUR", "USD", date(10), dec!(1.12));

        let rate = table.resolve("EUR", "USD", date(5)).await.unwrap();
        assert_eq!(rate.rate, dec!(1.10));
        assert_eq!(rate.as_of, date(1));

        let rate = table.resolve("EUR", "USD", date(15)).await.unwrap();
        assert_eq!(rate.rate, dec!(1.12));
    }

    #[tokio::test]
    async fn test_inverse_lookup() {
        let table = StaticRateTable::new().with_rate("USD", "IDR", date(1), dec!(16000));
        let rate = table.resolve("IDR", "USD", date(2)).await.unwrap();
        assert_eq!(rate.source, RateSource::Inverse);
        assert_eq!(rate.rate, Decimal::ONE / dec!(16000));
    }

    #[tokio::test]
    async fn test_missing_rate() {
        let table = StaticRateTable::new().with_rate("EUR", "USD", date(10), dec!(1.10));
        let err = table.resolve("EUR", "USD", date(5)).await.unwrap_err();
        assert!(matches!(err, RateError::NotFound { .. }));
    }
}

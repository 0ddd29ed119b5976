//! Currency service for functional-amount conversion.
//!
//! Conversions round to the functional scale with Banker's Rounding
//! (`MidpointNearestEven`).

use chrono::NaiveDate;
use corebook_shared::types::round_functional;
use rust_decimal::Decimal;
use rust_decimal::prelude::*;

use crate::ledger::{JournalLine, ValidationError};
use crate::ports::ExchangeRateResolver;

/// Currency service for conversion operations.
pub struct CurrencyService;

impl CurrencyService {
    /// Convert amount using exchange rate with Banker's Rounding.
    ///
    /// # Example
    ///
    /// ```
    /// use rust_decimal_macros::dec;
    /// use corebook_core::currency::CurrencyService;
    ///
    /// let result = CurrencyService::convert(dec!(100), dec!(1.5));
    /// assert_eq!(result, dec!(150.0000));
    /// ```
    #[must_use]
    pub fn convert(amount: Decimal, rate: Decimal) -> Decimal {
        round_functional(amount * rate)
    }

    /// Round a decimal value using Banker's Rounding.
    #[must_use]
    pub fn round(value: Decimal, decimal_places: u32) -> Decimal {
        value.round_dp_with_strategy(decimal_places, RoundingStrategy::MidpointNearestEven)
    }

    /// Determines the entry-to-base rate for a journal.
    ///
    /// Base-currency journals use 1. An explicit rate must be positive. Otherwise the
    /// resolver is asked for the journal date.
    ///
    /// # Errors
    ///
    /// `InvalidExchangeRate` for a non-positive rate, `ExchangeRateUnavailable` when the
    /// resolver fails.
    pub async fn journal_rate(
        resolver: &dyn ExchangeRateResolver,
        currency: &str,
        base_currency: &str,
        explicit_rate: Option<Decimal>,
        date: NaiveDate,
    ) -> Result<Decimal, ValidationError> {
        if currency == base_currency {
            return Ok(Decimal::ONE);
        }

        let rate = match explicit_rate {
            Some(rate) => rate,
            None => {
                resolver
                    .resolve(currency, base_currency, date)
                    .await
                    .map_err(|e| ValidationError::ExchangeRateUnavailable {
                        from: currency.to_string(),
                        to: base_currency.to_string(),
                        date,
                        reason: e.to_string(),
                    })?
                    .rate
            }
        };

        if rate <= Decimal::ZERO {
            return Err(ValidationError::InvalidExchangeRate { rate });
        }
        Ok(rate)
    }

    /// Mirrors currency and rate onto each line and fills its functional amounts.
    pub fn apply_rate(lines: &mut [JournalLine], currency: &str, rate: Decimal) {
        for line in lines {
            line.currency = currency.to_string();
            line.exchange_rate = rate;
            line.functional_debit = Self::convert(line.debit, rate);
            line.functional_credit = Self::convert(line.credit, rate);
        }
    }
}

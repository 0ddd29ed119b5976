//! Exchange-rate resolver reading the `exchange_rates` table.
//!
//! Lookup priority:
//! 1. Direct rate (from -> to)
//! 2. Inverse rate (to -> from, then invert)
//! 3. Triangulation through the pivot currency (USD unless configured)
//!
//! Each leg takes the latest rate effective on or before the requested date.

use async_trait::async_trait;
use chrono::NaiveDate;
use corebook_core::currency::{RateError, RateSource, ResolvedRate};
use corebook_core::ports::ExchangeRateResolver;
use corebook_shared::types::OrganizationId;
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder};

use crate::entities::exchange_rates;

/// Default pivot for triangulated rates.
pub const DEFAULT_PIVOT_CURRENCY: &str = "USD";

/// Database-backed [`ExchangeRateResolver`] scoped to one organization.
#[derive(Debug, Clone)]
pub struct DbExchangeRateResolver {
    db: DatabaseConnection,
    organization_id: OrganizationId,
    pivot: String,
}

impl DbExchangeRateResolver {
    /// Creates a resolver pivoting through USD.
    #[must_use]
    pub fn new(db: DatabaseConnection, organization_id: OrganizationId) -> Self {
        Self {
            db,
            organization_id,
            pivot: DEFAULT_PIVOT_CURRENCY.to_string(),
        }
    }

    /// Uses `pivot` for triangulation instead of USD.
    #[must_use]
    pub fn with_pivot(mut self, pivot: impl Into<String>) -> Self {
        self.pivot = pivot.into();
        self
    }

    async fn stored(
        &self,
        from: &str,
        to: &str,
        date: NaiveDate,
    ) -> Result<Option<ResolvedRate>, DbErr> {
        let row = exchange_rates::Entity::find()
            .filter(exchange_rates::Column::OrganizationId.eq(self.organization_id.into_inner()))
            .filter(exchange_rates::Column::FromCurrency.eq(from))
            .filter(exchange_rates::Column::ToCurrency.eq(to))
            .filter(exchange_rates::Column::EffectiveDate.lte(date))
            .order_by_desc(exchange_rates::Column::EffectiveDate)
            .one(&self.db)
            .await?;

        Ok(row.map(|rate| ResolvedRate {
            rate: rate.rate,
            as_of: rate.effective_date,
            source: RateSource::Direct,
        }))
    }

    /// Direct rate, falling back to the inverted opposite pair.
    async fn direct_or_inverse(
        &self,
        from: &str,
        to: &str,
        date: NaiveDate,
    ) -> Result<Option<ResolvedRate>, DbErr> {
        if let Some(direct) = self.stored(from, to, date).await? {
            return Ok(Some(direct));
        }
        Ok(self
            .stored(to, from, date)
            .await?
            .and_then(|opposite| opposite.inverse()))
    }
}

/// Chains `from -> pivot` and `pivot -> to` into one rate dated at the older leg.
#[must_use]
pub fn triangulate(first_leg: &ResolvedRate, second_leg: &ResolvedRate) -> ResolvedRate {
    ResolvedRate {
        rate: first_leg.rate * second_leg.rate,
        as_of: first_leg.as_of.min(second_leg.as_of),
        source: RateSource::Triangulated,
    }
}

#[async_trait]
impl ExchangeRateResolver for DbExchangeRateResolver {
    #[tracing::instrument(skip(self), fields(organization_id = %self.organization_id))]
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

        let backend = |err: DbErr| {
            tracing::error!(error = %err, "exchange rate lookup failed");
            RateError::Backend(err.to_string())
        };

        if let Some(rate) = self.direct_or_inverse(from, to, date).await.map_err(backend)? {
            return Ok(rate);
        }

        if from != self.pivot && to != self.pivot {
            let first = self
                .direct_or_inverse(from, &self.pivot, date)
                .await
                .map_err(backend)?;
            let second = self
                .direct_or_inverse(&self.pivot, to, date)
                .await
                .map_err(backend)?;
            if let (Some(first), Some(second)) = (first, second) {
                tracing::debug!(pivot = %self.pivot, "exchange rate triangulated");
                return Ok(triangulate(&first, &second));
            }
        }

        Err(RateError::NotFound {
            from: from.to_string(),
            to: to.to_string(),
            date,
        })
    }
}

//! Fiscal year and accounting period types.

use chrono::{DateTime, NaiveDate, Utc};
use corebook_shared::types::{FiscalYearId, JournalId, OrganizationId, PeriodId, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Status of a fiscal year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FiscalYearStatus {
    /// Accepting activity.
    Open,
    /// Closed by the year-end process.
    Closed,
}

/// Fiscal year definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiscalYear {
    /// Unique identifier.
    pub id: FiscalYearId,
    /// Organization this fiscal year belongs to.
    pub organization_id: OrganizationId,
    /// Year name (e.g., "FY2026").
    pub name: String,
    /// Start date of the fiscal year.
    pub start_date: NaiveDate,
    /// End date of the fiscal year.
    pub end_date: NaiveDate,
    /// Current status.
    pub status: FiscalYearStatus,
    /// Whether this is the organization's current fiscal year.
    pub is_current: bool,
    /// When the year was closed.
    pub closed_at: Option<DateTime<Utc>>,
    /// Who closed the year.
    pub closed_by: Option<UserId>,
    /// Closing journal generated for this year.
    pub closing_journal_id: Option<JournalId>,
    /// Opening journal generated into the next year.
    pub opening_journal_id: Option<JournalId>,
    /// Net result recorded at close (debit-positive, negative = profit).
    pub net_result: Option<Decimal>,
}

impl FiscalYear {
    /// Returns true if the year has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.status == FiscalYearStatus::Closed
    }

    /// Returns true if the given date falls within this year.
    #[must_use]
    pub fn contains_date(&self, date: NaiveDate) -> bool {
        date >= self.start_date && date <= self.end_date
    }

    /// Clears everything recorded by a close.
    pub fn clear_closing_metadata(&mut self) {
        self.closed_at = None;
        self.closed_by = None;
        self.closing_journal_id = None;
        self.opening_journal_id = None;
        self.net_result = None;
    }
}

/// Status of an accounting period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodStatus {
    /// Period is open for transactions.
    Open,
    /// Period is closed, no new transactions allowed.
    Closed,
    /// Reserved year-end period; only closing journals post here.
    Adjustment,
}

/// An accounting period within a fiscal year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountingPeriod {
    /// Unique identifier.
    pub id: PeriodId,
    /// Organization.
    pub organization_id: OrganizationId,
    /// Fiscal year this period belongs to.
    pub fiscal_year_id: FiscalYearId,
    /// Period name (e.g., "January 2026").
    pub name: String,
    /// Period number within the year (13 is customary for adjustment).
    pub period_number: u32,
    /// Start date of the period.
    pub start_date: NaiveDate,
    /// End date of the period.
    pub end_date: NaiveDate,
    /// Current status.
    pub status: PeriodStatus,
    /// When the period was closed.
    pub closed_at: Option<DateTime<Utc>>,
    /// Who closed the period.
    pub closed_by: Option<UserId>,
}

impl AccountingPeriod {
    /// Returns true if regular journals can be posted to this period.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.status == PeriodStatus::Open
    }

    /// Returns true if the given date falls within this period.
    #[must_use]
    pub fn contains_date(&self, date: NaiveDate) -> bool {
        date >= self.start_date && date <= self.end_date
    }

    /// Checks whether a journal dated `date` may post here.
    ///
    /// `year_end` allows the adjustment period in addition to open ones.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason when the period rejects the journal.
    pub fn accepts(&self, date: NaiveDate, year_end: bool) -> Result<(), String> {
        match self.status {
            PeriodStatus::Open => {}
            PeriodStatus::Adjustment if year_end => {}
            PeriodStatus::Adjustment => {
                return Err(format!("period '{}' is reserved for year-end closing", self.name));
            }
            PeriodStatus::Closed => return Err(format!("period '{}' is closed", self.name)),
        }
        if !self.contains_date(date) {
            return Err(format!(
                "journal date {date} is outside period '{}' ({} to {})",
                self.name, self.start_date, self.end_date
            ));
        }
        Ok(())
    }
}

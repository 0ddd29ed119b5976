//! Numbering authority: sequence scopes and journal number formatting.
//!
//! The counter itself lives in the store (`LedgerTx::next_sequence_value`) and is only
//! advanced inside the posting transaction, so a rolled-back post never burns a number.

use uuid::Uuid;

use crate::fiscal::AccountingPeriod;
use crate::ledger::{JournalType, NumberingScope};

/// Scope key of the sequence a journal posted into `period` draws from.
#[must_use]
pub fn sequence_scope(journal_type: &JournalType, period: &AccountingPeriod) -> Uuid {
    match journal_type.numbering_scope {
        NumberingScope::Period => period.id.into_inner(),
        NumberingScope::FiscalYear => period.fiscal_year_id.into_inner(),
    }
}

/// Formats `{code}-{sequence}` with the sequence zero-padded to the type's width.
#[must_use]
pub fn format_journal_number(journal_type: &JournalType, sequence: i64) -> String {
    let width = usize::try_from(journal_type.padding).unwrap_or(0);
    format!("{}-{:0>width$}", journal_type.code, sequence, width = width)
}

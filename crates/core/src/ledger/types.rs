//! Ledger domain types: journals, lines, accounts and general-ledger rows.
//!
//! Money is always `rust_decimal::Decimal`. Account balances follow the debit-positive
//! convention: a debit raises `current_balance`, a credit lowers it, regardless of nature.

use chrono::{DateTime, NaiveDate, Utc};
use corebook_shared::types::{
    AccountId, FiscalYearId, JournalId, JournalLineId, JournalTypeId, LedgerEntryId,
    OrganizationId, PeriodId, UserId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Well-known keys of the journal metadata map.
pub mod metadata {
    /// Tag marking closing (`year_end`) and opening (`year_opening`) journals.
    pub const CLOSING_TYPE: &str = "closing_type";
    /// Fiscal year a closing/opening journal was generated for.
    pub const FISCAL_YEAR_ID: &str = "fiscal_year_id";
    /// Fiscal year an opening journal carries balances into.
    pub const TARGET_FISCAL_YEAR_ID: &str = "target_fiscal_year_id";
    /// Net result transferred to retained earnings (debit-positive).
    pub const NET_RESULT: &str = "net_result";
    /// `profit`, `loss` or `break_even`.
    pub const RESULT_NATURE: &str = "result_nature";
    /// Journal reversed by this one.
    pub const REVERSES_JOURNAL_ID: &str = "reverses_journal_id";
    /// Free-text reason recorded on reversal.
    pub const REVERSAL_REASON: &str = "reversal_reason";
}

/// Journal lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JournalStatus {
    /// Being drafted; lines may change.
    Draft,
    /// Submitted for approval.
    AwaitingApproval,
    /// Approved and ready for posting.
    Approved,
    /// Posted to the general ledger (immutable).
    Posted,
    /// Rejected during approval.
    Rejected,
    /// Posted and later reversed by another journal.
    Reversed,
}

impl JournalStatus {
    /// Returns true if the journal has reached the ledger.
    #[must_use]
    pub fn is_posted(self) -> bool {
        matches!(self, Self::Posted | Self::Reversed)
    }

    /// Returns true if the posting engine accepts this status.
    ///
    /// `draft` is only accepted on the legacy path.
    #[must_use]
    pub fn can_post(self, allow_draft: bool) -> bool {
        match self {
            Self::Approved => true,
            Self::Draft => allow_draft,
            _ => false,
        }
    }

    /// Returns the status as its storage string.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::AwaitingApproval => "awaiting_approval",
            Self::Approved => "approved",
            Self::Posted => "posted",
            Self::Rejected => "rejected",
            Self::Reversed => "reversed",
        }
    }
}

impl std::fmt::Display for JournalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Account nature in the chart of accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountNature {
    /// Asset (balance sheet).
    Asset,
    /// Liability (balance sheet).
    Liability,
    /// Equity (balance sheet).
    Equity,
    /// Income (profit and loss).
    Income,
    /// Expense (profit and loss).
    Expense,
}

impl AccountNature {
    /// Natures zeroed into retained earnings at year end.
    pub const PROFIT_AND_LOSS: [Self; 2] = [Self::Income, Self::Expense];

    /// Natures carried forward into the next fiscal year.
    pub const BALANCE_SHEET: [Self; 3] = [Self::Asset, Self::Liability, Self::Equity];

    /// Returns true for income and expense accounts.
    #[must_use]
    pub fn is_profit_and_loss(self) -> bool {
        matches!(self, Self::Income | Self::Expense)
    }
}

/// Tag distinguishing system-generated year-end journals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClosingType {
    /// Zeroes income/expense into retained earnings.
    YearEnd,
    /// Carries balance-sheet balances into the next fiscal year.
    YearOpening,
}

impl ClosingType {
    /// Returns the tag value stored in journal metadata.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::YearEnd => "year_end",
            Self::YearOpening => "year_opening",
        }
    }

    /// Parses a metadata tag value.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "year_end" => Some(Self::YearEnd),
            "year_opening" => Some(Self::YearOpening),
            _ => None,
        }
    }
}

/// Analytic dimensions copied from a line onto its ledger row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Department code.
    pub department: Option<String>,
    /// Project code.
    pub project: Option<String>,
    /// Cost center code.
    pub cost_center: Option<String>,
    /// Tax code.
    pub tax_code: Option<String>,
}

/// One line of a journal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalLine {
    /// Unique identifier.
    pub id: JournalLineId,
    /// Owning journal.
    pub journal_id: JournalId,
    /// 1-based position, dense and unique within the journal.
    pub line_number: u32,
    /// Account the line posts to.
    pub account_id: AccountId,
    /// Optional line description.
    pub description: Option<String>,
    /// Debit amount in entry currency (zero on credit lines).
    pub debit: Decimal,
    /// Credit amount in entry currency (zero on debit lines).
    pub credit: Decimal,
    /// Entry currency, mirrored from the header at post.
    pub currency: String,
    /// Exchange rate, mirrored from the header at post.
    pub exchange_rate: Decimal,
    /// Debit in base currency at functional scale.
    pub functional_debit: Decimal,
    /// Credit in base currency at functional scale.
    pub functional_credit: Decimal,
    /// Analytic dimensions.
    pub dimensions: Dimensions,
}

impl JournalLine {
    /// Creates a debit line. Functional amounts are filled in at post.
    #[must_use]
    pub fn debit(
        journal_id: JournalId,
        line_number: u32,
        account_id: AccountId,
        amount: Decimal,
        currency: &str,
    ) -> Self {
        Self::with_sides(journal_id, line_number, account_id, amount, Decimal::ZERO, currency)
    }

    /// Creates a credit line. Functional amounts are filled in at post.
    #[must_use]
    pub fn credit(
        journal_id: JournalId,
        line_number: u32,
        account_id: AccountId,
        amount: Decimal,
        currency: &str,
    ) -> Self {
        Self::with_sides(journal_id, line_number, account_id, Decimal::ZERO, amount, currency)
    }

    fn with_sides(
        journal_id: JournalId,
        line_number: u32,
        account_id: AccountId,
        debit: Decimal,
        credit: Decimal,
        currency: &str,
    ) -> Self {
        Self {
            id: JournalLineId::new(),
            journal_id,
            line_number,
            account_id,
            description: None,
            debit,
            credit,
            currency: currency.to_string(),
            exchange_rate: Decimal::ONE,
            functional_debit: Decimal::ZERO,
            functional_credit: Decimal::ZERO,
            dimensions: Dimensions::default(),
        }
    }

    /// Sets the line description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A journal header with its lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Journal {
    /// Unique identifier.
    pub id: JournalId,
    /// Owning organization.
    pub organization_id: OrganizationId,
    /// Journal type (numbering owner).
    pub journal_type_id: JournalTypeId,
    /// Accounting period the journal posts into.
    pub period_id: PeriodId,
    /// Accounting date.
    pub journal_date: NaiveDate,
    /// External reference.
    pub reference: Option<String>,
    /// Description.
    pub description: String,
    /// Entry currency (ISO 4217).
    pub currency: String,
    /// Entry-to-base rate. `None` means resolve at post time.
    pub exchange_rate: Option<Decimal>,
    /// Lifecycle status.
    pub status: JournalStatus,
    /// Set once posted.
    pub is_locked: bool,
    /// Sequential number, assigned at post.
    pub journal_number: Option<String>,
    /// Idempotency key recorded at post.
    pub idempotency_key: Option<String>,
    /// Creator.
    pub created_by: UserId,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last editor.
    pub updated_by: UserId,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
    /// Poster.
    pub posted_by: Option<UserId>,
    /// Post timestamp.
    pub posted_at: Option<DateTime<Utc>>,
    /// Journal reversed by this one.
    pub reverses_journal_id: Option<JournalId>,
    /// Schemaless key/value tags.
    pub metadata: serde_json::Map<String, serde_json::Value>,
    /// Lines, in line-number order.
    pub lines: Vec<JournalLine>,
}

impl Journal {
    /// Creates an empty draft journal in entry currency `currency`.
    #[must_use]
    pub fn draft(
        organization_id: OrganizationId,
        journal_type_id: JournalTypeId,
        period_id: PeriodId,
        journal_date: NaiveDate,
        description: impl Into<String>,
        currency: &str,
        created_by: UserId,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: JournalId::new(),
            organization_id,
            journal_type_id,
            period_id,
            journal_date,
            reference: None,
            description: description.into(),
            currency: currency.to_string(),
            exchange_rate: None,
            status: JournalStatus::Draft,
            is_locked: false,
            journal_number: None,
            idempotency_key: None,
            created_by,
            created_at: now,
            updated_by: created_by,
            updated_at: now,
            posted_by: None,
            posted_at: None,
            reverses_journal_id: None,
            metadata: serde_json::Map::new(),
            lines: Vec::new(),
        }
    }

    /// Appends a debit line numbered after the existing ones.
    pub fn push_debit(&mut self, account_id: AccountId, amount: Decimal) -> &mut JournalLine {
        let line = JournalLine::debit(self.id, self.next_line_number(), account_id, amount, &self.currency);
        self.lines.push(line);
        let last = self.lines.len() - 1;
        &mut self.lines[last]
    }

    /// Appends a credit line numbered after the existing ones.
    pub fn push_credit(&mut self, account_id: AccountId, amount: Decimal) -> &mut JournalLine {
        let line = JournalLine::credit(self.id, self.next_line_number(), account_id, amount, &self.currency);
        self.lines.push(line);
        let last = self.lines.len() - 1;
        &mut self.lines[last]
    }

    fn next_line_number(&self) -> u32 {
        self.lines.iter().map(|l| l.line_number).max().unwrap_or(0) + 1
    }

    /// Closing tag from metadata, if any.
    #[must_use]
    pub fn closing_type(&self) -> Option<ClosingType> {
        self.metadata
            .get(metadata::CLOSING_TYPE)
            .and_then(serde_json::Value::as_str)
            .and_then(ClosingType::parse)
    }

    /// Sets a metadata tag.
    pub fn tag(&mut self, key: &str, value: impl Into<serde_json::Value>) {
        self.metadata.insert(key.to_string(), value.into());
    }

    /// Returns true if this journal was generated for `fiscal_year_id` with `closing_type`.
    #[must_use]
    pub fn is_tagged(&self, closing_type: ClosingType, fiscal_year_id: FiscalYearId) -> bool {
        self.closing_type() == Some(closing_type)
            && self
                .metadata
                .get(metadata::FISCAL_YEAR_ID)
                .and_then(serde_json::Value::as_str)
                == Some(fiscal_year_id.to_string().as_str())
    }

    /// Sum of entry-currency debits.
    #[must_use]
    pub fn total_debit(&self) -> Decimal {
        self.lines.iter().map(|l| l.debit).sum()
    }

    /// Sum of entry-currency credits.
    #[must_use]
    pub fn total_credit(&self) -> Decimal {
        self.lines.iter().map(|l| l.credit).sum()
    }
}

/// Chart of accounts entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Unique identifier.
    pub id: AccountId,
    /// Owning organization.
    pub organization_id: OrganizationId,
    /// Account code (e.g. "1100").
    pub code: String,
    /// Account name.
    pub name: String,
    /// Nature.
    pub nature: AccountNature,
    /// Running balance in base currency, debit-positive.
    pub current_balance: Decimal,
    /// Inactive accounts reject postings.
    pub is_active: bool,
}

/// Immutable record of one posted line's effect on an account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralLedgerEntry {
    /// Unique identifier.
    pub id: LedgerEntryId,
    /// Owning organization.
    pub organization_id: OrganizationId,
    /// Account affected.
    pub account_id: AccountId,
    /// Source journal.
    pub journal_id: JournalId,
    /// Source line.
    pub journal_line_id: JournalLineId,
    /// Period the journal posted into.
    pub period_id: PeriodId,
    /// Journal date.
    pub transaction_date: NaiveDate,
    /// Entry-currency debit.
    pub debit: Decimal,
    /// Entry-currency credit.
    pub credit: Decimal,
    /// Base-currency debit.
    pub functional_debit: Decimal,
    /// Base-currency credit.
    pub functional_credit: Decimal,
    /// Account balance right after this row was applied.
    pub balance_after: Decimal,
    /// Entry currency.
    pub currency: String,
    /// Rate applied.
    pub exchange_rate: Decimal,
    /// Dimensions copied from the line.
    pub dimensions: Dimensions,
    /// Closing tag copied from the journal.
    pub closing_type: Option<ClosingType>,
    /// Insert timestamp.
    pub created_at: DateTime<Utc>,
    /// Store-wide monotonic insert order, assigned by the store.
    pub sequence: i64,
}

/// Scope of a journal type's number sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumberingScope {
    /// Numbers restart every accounting period.
    Period,
    /// Numbers restart every fiscal year.
    FiscalYear,
}

/// Journal type: owns a number prefix and its sequences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalType {
    /// Unique identifier.
    pub id: JournalTypeId,
    /// Owning organization.
    pub organization_id: OrganizationId,
    /// Number prefix, e.g. `JN`.
    pub code: String,
    /// Display name.
    pub name: String,
    /// Sequence scope.
    pub numbering_scope: NumberingScope,
    /// Zero-padding width of the sequence part.
    pub padding: u32,
}

/// Per-organization settings used by posting and closing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationSettings {
    /// Organization.
    pub organization_id: OrganizationId,
    /// Base (functional) currency.
    pub base_currency: String,
    /// Account receiving the year's net result.
    pub retained_earnings_account_id: Option<AccountId>,
    /// Account absorbing opening-balance rounding residue.
    pub rollover_adjustment_account_id: Option<AccountId>,
    /// Journal type used for closing and opening journals.
    pub closing_journal_type_id: Option<JournalTypeId>,
    /// Generate next-year opening balances on close.
    pub auto_rollover_closing: bool,
}

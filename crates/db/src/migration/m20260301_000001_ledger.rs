//! Ledger schema: settings, chart of accounts, journals, numbering, fiscal calendar,
//! general ledger and exchange rates.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        db.execute_unprepared(ENUMS_SQL).await?;

        // ============================================================
        // CALENDAR & CHART OF ACCOUNTS
        // ============================================================
        db.execute_unprepared(FISCAL_YEARS_SQL).await?;
        db.execute_unprepared(ACCOUNTING_PERIODS_SQL).await?;
        db.execute_unprepared(ACCOUNTS_SQL).await?;

        // ============================================================
        // JOURNALS & NUMBERING
        // ============================================================
        db.execute_unprepared(JOURNAL_TYPES_SQL).await?;
        db.execute_unprepared(JOURNAL_SEQUENCES_SQL).await?;
        db.execute_unprepared(ORGANIZATION_SETTINGS_SQL).await?;
        db.execute_unprepared(JOURNALS_SQL).await?;
        db.execute_unprepared(JOURNAL_LINES_SQL).await?;

        // ============================================================
        // GENERAL LEDGER & RATES
        // ============================================================
        db.execute_unprepared(GENERAL_LEDGER_SQL).await?;
        db.execute_unprepared(EXCHANGE_RATES_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_ALL_SQL).await?;
        Ok(())
    }
}

// ============================================================
// SQL CONSTANTS
// ============================================================

const ENUMS_SQL: &str = r"
CREATE TYPE journal_status AS ENUM (
    'draft',
    'awaiting_approval',
    'approved',
    'posted',
    'rejected',
    'reversed'
);

CREATE TYPE account_nature AS ENUM ('asset', 'liability', 'equity', 'income', 'expense');

CREATE TYPE fiscal_year_status AS ENUM ('open', 'closed');

CREATE TYPE period_status AS ENUM ('open', 'closed', 'adjustment');

CREATE TYPE numbering_scope AS ENUM ('period', 'fiscal_year');

CREATE TYPE closing_type AS ENUM ('year_end', 'year_opening');
";

const FISCAL_YEARS_SQL: &str = r"
CREATE TABLE fiscal_years (
    id                  UUID PRIMARY KEY,
    organization_id     UUID NOT NULL,
    name                VARCHAR(100) NOT NULL,
    start_date          DATE NOT NULL,
    end_date            DATE NOT NULL,
    status              fiscal_year_status NOT NULL DEFAULT 'open',
    is_current          BOOLEAN NOT NULL DEFAULT FALSE,
    closed_at           TIMESTAMPTZ,
    closed_by           UUID,
    closing_journal_id  UUID,
    opening_journal_id  UUID,
    net_result          NUMERIC(19, 4),
    CONSTRAINT chk_fiscal_year_dates CHECK (end_date > start_date)
);

CREATE INDEX idx_fiscal_years_org_start ON fiscal_years(organization_id, start_date);
";

const ACCOUNTING_PERIODS_SQL: &str = r"
CREATE TABLE accounting_periods (
    id                  UUID PRIMARY KEY,
    organization_id     UUID NOT NULL,
    fiscal_year_id      UUID NOT NULL REFERENCES fiscal_years(id) ON DELETE CASCADE,
    name                VARCHAR(100) NOT NULL,
    period_number       INTEGER NOT NULL,
    start_date          DATE NOT NULL,
    end_date            DATE NOT NULL,
    status              period_status NOT NULL DEFAULT 'open',
    closed_at           TIMESTAMPTZ,
    closed_by           UUID,
    CONSTRAINT uq_period_number UNIQUE (fiscal_year_id, period_number),
    CONSTRAINT chk_period_dates CHECK (end_date >= start_date)
);

CREATE INDEX idx_accounting_periods_year ON accounting_periods(fiscal_year_id, start_date);
";

const ACCOUNTS_SQL: &str = r"
CREATE TABLE accounts (
    id                  UUID PRIMARY KEY,
    organization_id     UUID NOT NULL,
    code                VARCHAR(20) NOT NULL,
    name                VARCHAR(255) NOT NULL,
    nature              account_nature NOT NULL,
    current_balance     NUMERIC(19, 4) NOT NULL DEFAULT 0,
    is_active           BOOLEAN NOT NULL DEFAULT TRUE,
    CONSTRAINT uq_account_code UNIQUE (organization_id, code)
);
";

const JOURNAL_TYPES_SQL: &str = r"
CREATE TABLE journal_types (
    id                  UUID PRIMARY KEY,
    organization_id     UUID NOT NULL,
    code                VARCHAR(10) NOT NULL,
    name                VARCHAR(100) NOT NULL,
    numbering_scope     numbering_scope NOT NULL DEFAULT 'period',
    padding             INTEGER NOT NULL DEFAULT 4,
    CONSTRAINT uq_journal_type_code UNIQUE (organization_id, code),
    CONSTRAINT chk_padding CHECK (padding >= 0)
);
";

const JOURNAL_SEQUENCES_SQL: &str = r"
CREATE TABLE journal_sequences (
    journal_type_id     UUID NOT NULL REFERENCES journal_types(id) ON DELETE CASCADE,
    scope_id            UUID NOT NULL,
    sequence_next       BIGINT NOT NULL DEFAULT 1,
    PRIMARY KEY (journal_type_id, scope_id),
    CONSTRAINT chk_sequence_positive CHECK (sequence_next >= 1)
);
";

const ORGANIZATION_SETTINGS_SQL: &str = r"
CREATE TABLE organization_settings (
    organization_id                 UUID PRIMARY KEY,
    base_currency                   CHAR(3) NOT NULL,
    retained_earnings_account_id    UUID REFERENCES accounts(id),
    rollover_adjustment_account_id  UUID REFERENCES accounts(id),
    closing_journal_type_id         UUID REFERENCES journal_types(id),
    auto_rollover_closing           BOOLEAN NOT NULL DEFAULT FALSE
);
";

const JOURNALS_SQL: &str = r"
CREATE TABLE journals (
    id                  UUID PRIMARY KEY,
    organization_id     UUID NOT NULL,
    journal_type_id     UUID NOT NULL REFERENCES journal_types(id),
    period_id           UUID NOT NULL REFERENCES accounting_periods(id),
    journal_date        DATE NOT NULL,
    reference           VARCHAR(100),
    description         TEXT NOT NULL,
    currency            CHAR(3) NOT NULL,
    exchange_rate       NUMERIC(19, 10),
    status              journal_status NOT NULL DEFAULT 'draft',
    is_locked           BOOLEAN NOT NULL DEFAULT FALSE,
    journal_number      VARCHAR(50),
    idempotency_key     VARCHAR(255),
    created_by          UUID NOT NULL,
    created_at          TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_by          UUID NOT NULL,
    updated_at          TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    posted_by           UUID,
    posted_at           TIMESTAMPTZ,
    reverses_journal_id UUID REFERENCES journals(id),
    metadata            JSONB NOT NULL DEFAULT '{}',
    CONSTRAINT chk_exchange_rate_positive CHECK (exchange_rate IS NULL OR exchange_rate > 0)
);

CREATE UNIQUE INDEX uq_journal_number
    ON journals(journal_type_id, period_id, journal_number)
    WHERE journal_number IS NOT NULL;

CREATE INDEX idx_journals_batch_scan
    ON journals(organization_id, journal_date, id)
    WHERE status = 'approved' AND is_locked = FALSE;

CREATE INDEX idx_journals_closing_tag
    ON journals(organization_id, (metadata ->> 'closing_type'), (metadata ->> 'fiscal_year_id'))
    WHERE metadata ? 'closing_type';
";

const JOURNAL_LINES_SQL: &str = r"
CREATE TABLE journal_lines (
    id                  UUID PRIMARY KEY,
    journal_id          UUID NOT NULL REFERENCES journals(id) ON DELETE CASCADE,
    line_number         INTEGER NOT NULL,
    account_id          UUID NOT NULL REFERENCES accounts(id),
    description         TEXT,
    debit               NUMERIC(19, 4) NOT NULL DEFAULT 0,
    credit              NUMERIC(19, 4) NOT NULL DEFAULT 0,
    currency            CHAR(3) NOT NULL,
    exchange_rate       NUMERIC(19, 10) NOT NULL DEFAULT 1,
    functional_debit    NUMERIC(19, 4) NOT NULL DEFAULT 0,
    functional_credit   NUMERIC(19, 4) NOT NULL DEFAULT 0,
    department          VARCHAR(50),
    project             VARCHAR(50),
    cost_center         VARCHAR(50),
    tax_code            VARCHAR(50),
    CONSTRAINT uq_journal_line_number UNIQUE (journal_id, line_number),
    CONSTRAINT chk_line_amounts CHECK (debit >= 0 AND credit >= 0)
);
";

const GENERAL_LEDGER_SQL: &str = r"
CREATE TABLE general_ledger_entries (
    id                  UUID PRIMARY KEY,
    sequence            BIGSERIAL NOT NULL,
    organization_id     UUID NOT NULL,
    account_id          UUID NOT NULL REFERENCES accounts(id),
    journal_id          UUID NOT NULL REFERENCES journals(id),
    journal_line_id     UUID NOT NULL REFERENCES journal_lines(id),
    period_id           UUID NOT NULL REFERENCES accounting_periods(id),
    transaction_date    DATE NOT NULL,
    debit               NUMERIC(19, 4) NOT NULL,
    credit              NUMERIC(19, 4) NOT NULL,
    functional_debit    NUMERIC(19, 4) NOT NULL,
    functional_credit   NUMERIC(19, 4) NOT NULL,
    balance_after       NUMERIC(19, 4) NOT NULL,
    currency            CHAR(3) NOT NULL,
    exchange_rate       NUMERIC(19, 10) NOT NULL,
    department          VARCHAR(50),
    project             VARCHAR(50),
    cost_center         VARCHAR(50),
    tax_code            VARCHAR(50),
    closing_type        closing_type,
    created_at          TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE UNIQUE INDEX uq_gl_journal_line ON general_ledger_entries(journal_line_id);
CREATE INDEX idx_gl_account_period ON general_ledger_entries(account_id, period_id);
CREATE INDEX idx_gl_journal ON general_ledger_entries(journal_id);
CREATE INDEX idx_gl_org_date ON general_ledger_entries(organization_id, transaction_date);

-- Ledger rows are append-only
CREATE OR REPLACE FUNCTION prevent_ledger_mutation()
RETURNS TRIGGER AS $$
BEGIN
    RAISE EXCEPTION 'general ledger rows are append-only';
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_gl_append_only
    BEFORE UPDATE OR DELETE ON general_ledger_entries
    FOR EACH ROW EXECUTE FUNCTION prevent_ledger_mutation();
";

const EXCHANGE_RATES_SQL: &str = r"
CREATE TABLE exchange_rates (
    id                  UUID PRIMARY KEY,
    organization_id     UUID NOT NULL,
    from_currency       CHAR(3) NOT NULL,
    to_currency         CHAR(3) NOT NULL,
    rate                NUMERIC(19, 10) NOT NULL,
    effective_date      DATE NOT NULL,
    created_at          TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    CONSTRAINT uq_exchange_rate UNIQUE (organization_id, from_currency, to_currency, effective_date),
    CONSTRAINT chk_rate_positive CHECK (rate > 0),
    CONSTRAINT chk_rate_pair CHECK (from_currency <> to_currency)
);

CREATE INDEX idx_exchange_rates_lookup
    ON exchange_rates(organization_id, from_currency, to_currency, effective_date DESC);
";

const DROP_ALL_SQL: &str = r"
DROP TABLE IF EXISTS exchange_rates CASCADE;
DROP TABLE IF EXISTS general_ledger_entries CASCADE;
DROP FUNCTION IF EXISTS prevent_ledger_mutation() CASCADE;
DROP TABLE IF EXISTS journal_lines CASCADE;
DROP TABLE IF EXISTS journals CASCADE;
DROP TABLE IF EXISTS organization_settings CASCADE;
DROP TABLE IF EXISTS journal_sequences CASCADE;
DROP TABLE IF EXISTS journal_types CASCADE;
DROP TABLE IF EXISTS accounts CASCADE;
DROP TABLE IF EXISTS accounting_periods CASCADE;
DROP TABLE IF EXISTS fiscal_years CASCADE;

DROP TYPE IF EXISTS closing_type;
DROP TYPE IF EXISTS numbering_scope;
DROP TYPE IF EXISTS period_status;
DROP TYPE IF EXISTS fiscal_year_status;
DROP TYPE IF EXISTS account_nature;
DROP TYPE IF EXISTS journal_status;
";

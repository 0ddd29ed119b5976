//! Core posting and period-close logic for Corebook.
//!
//! This crate contains the business logic with ZERO web or database dependencies.
//! Persistence is reached through the [`store::LedgerStore`] trait; permission checks,
//! exchange rates, audit and events through the traits in [`ports`].
//!
//! # Modules
//!
//! - `ledger` - Journals, accounts, ledger rows and line validation
//! - `currency` - Exchange-rate resolution and functional conversion
//! - `numbering` - Journal number formatting and sequence scopes
//! - `posting` - Posting engine, reversal and batch posting
//! - `fiscal` - Fiscal years, periods and the year-end close
//! - `legacy` - Two-error adapter for older posting callers
//! - `store` - Unit-of-work trait and the in-memory store
//! - `ports` - Collaborator traits

pub mod currency;
pub mod fiscal;
pub mod ledger;
pub mod legacy;
pub mod numbering;
pub mod ports;
pub mod posting;
pub mod store;

#[cfg(test)]
mod test_support;

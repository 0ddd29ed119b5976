//! Collaborators consumed by the engines.
//!
//! Permission checks and rate lookups are awaited inside the unit of work. Audit and
//! event sinks are fire-and-forget: they are only called after commit and cannot fail
//! the operation.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use corebook_shared::types::{OrganizationId, UserId};
use serde::Serialize;
use uuid::Uuid;

use crate::currency::{RateError, ResolvedRate};

/// A module/entity/action capability triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Capability {
    /// Module, e.g. `accounting`.
    pub module: &'static str,
    /// Entity, e.g. `journal`.
    pub entity: &'static str,
    /// Action, e.g. `post`.
    pub action: &'static str,
}

impl Capability {
    /// Post a journal.
    pub const POST_JOURNAL: Self = Self::new("accounting", "journal", "post");
    /// Reverse a posted journal.
    pub const REVERSE_JOURNAL: Self = Self::new("accounting", "journal", "reverse");
    /// Close a fiscal year.
    pub const CLOSE_FISCAL_YEAR: Self = Self::new("accounting", "fiscalyear", "close_fiscalyear");
    /// Reopen a closed fiscal year.
    pub const REOPEN_FISCAL_YEAR: Self =
        Self::new("accounting", "fiscalyear", "reopen_fiscalyear");
    /// Close a single accounting period.
    pub const CLOSE_PERIOD: Self = Self::new("accounting", "period", "close");

    const fn new(module: &'static str, entity: &'static str, action: &'static str) -> Self {
        Self {
            module,
            entity,
            action,
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.module, self.entity, self.action)
    }
}

/// Question asked of the permission checker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionRequest {
    /// Acting user.
    pub actor: UserId,
    /// Organization the subject belongs to.
    pub organization_id: OrganizationId,
    /// Capability required.
    pub capability: Capability,
}

/// Capability check. A `false` answer is always fatal to the operation.
#[async_trait]
pub trait PermissionChecker: Send + Sync {
    /// Returns true if the actor holds the capability in the organization.
    async fn has_permission(&self, request: &PermissionRequest) -> bool;
}

#[async_trait]
impl<F> PermissionChecker for F
where
    F: Fn(&PermissionRequest) -> bool + Send + Sync,
{
    async fn has_permission(&self, request: &PermissionRequest) -> bool {
        self(request)
    }
}

/// Resolves the rate converting one unit of `from` into `to` on `date`.
#[async_trait]
pub trait ExchangeRateResolver: Send + Sync {
    /// Looks up the rate.
    async fn resolve(
        &self,
        from: &str,
        to: &str,
        date: NaiveDate,
    ) -> Result<ResolvedRate, RateError>;
}

/// One audit-trail record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEntry {
    /// Acting user.
    pub actor: UserId,
    /// Organization.
    pub organization_id: OrganizationId,
    /// Subject kind, e.g. `journal` or `fiscal_year`.
    pub subject_type: &'static str,
    /// Subject identifier.
    pub subject_id: Uuid,
    /// Action performed, e.g. `posted`.
    pub action: &'static str,
    /// Free-form details.
    pub details: serde_json::Value,
    /// When the action was committed.
    pub recorded_at: DateTime<Utc>,
}

/// Audit-trail sink.
pub trait AuditLogger: Send + Sync {
    /// Records an entry. Must not block or panic.
    fn record(&self, entry: AuditEntry);
}

/// Audit logger writing entries to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditLogger;

impl AuditLogger for TracingAuditLogger {
    fn record(&self, entry: AuditEntry) {
        tracing::info!(
            target: "corebook::audit",
            actor = %entry.actor,
            organization_id = %entry.organization_id,
            subject_type = entry.subject_type,
            subject_id = %entry.subject_id,
            action = entry.action,
            details = %entry.details,
            "audit"
        );
    }
}

/// Audit logger that drops every entry.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAuditLogger;

impl AuditLogger for NoopAuditLogger {
    fn record(&self, _entry: AuditEntry) {}
}

/// Domain event published after commit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DomainEvent {
    /// Event name, e.g. `journal_posted`.
    pub name: &'static str,
    /// Organization.
    pub organization_id: OrganizationId,
    /// Subject identifier.
    pub subject_id: Uuid,
    /// Event payload.
    pub payload: serde_json::Value,
}

/// Best-effort event sink.
pub trait EventEmitter: Send + Sync {
    /// Emits an event. Must not block or panic.
    fn emit(&self, event: DomainEvent);
}

/// Event emitter writing events to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventEmitter;

impl EventEmitter for TracingEventEmitter {
    fn emit(&self, event: DomainEvent) {
        tracing::debug!(
            target: "corebook::events",
            event = event.name,
            organization_id = %event.organization_id,
            subject_id = %event.subject_id,
            payload = %event.payload,
            "domain event"
        );
    }
}

/// Event emitter that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEventEmitter;

impl EventEmitter for NoopEventEmitter {
    fn emit(&self, _event: DomainEvent) {}
}

/// Audit entries and events collected during a unit of work, flushed after commit.
#[derive(Debug, Default)]
pub(crate) struct Outbox {
    audit: Vec<AuditEntry>,
    events: Vec<DomainEvent>,
}

impl Outbox {
    pub(crate) fn audit(&mut self, entry: AuditEntry) {
        self.audit.push(entry);
    }

    pub(crate) fn event(&mut self, event: DomainEvent) {
        self.events.push(event);
    }

    pub(crate) fn flush(self, audit: &dyn AuditLogger, events: &dyn EventEmitter) {
        for entry in self.audit {
            audit.record(entry);
        }
        for event in self.events {
            events.emit(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_closure_permission_checker() {
        let checker = |request: &PermissionRequest| request.capability == Capability::POST_JOURNAL;
        let request = PermissionRequest {
            actor: UserId::new(),
            organization_id: OrganizationId::new(),
            capability: Capability::POST_JOURNAL,
        };
        assert!(checker.has_permission(&request).await);

        let request = PermissionRequest {
            capability: Capability::CLOSE_FISCAL_YEAR,
            ..request
        };
        assert!(!checker.has_permission(&request).await);
    }

    #[test]
    fn test_outbox_flushes_to_noop_sinks() {
        let mut outbox = Outbox::default();
        outbox.event(DomainEvent {
            name: "journal_posted",
            organization_id: OrganizationId::new(),
            subject_id: Uuid::new_v4(),
            payload: serde_json::Value::Null,
        });
        outbox.flush(&NoopAuditLogger, &NoopEventEmitter);
    }

    #[test]
    fn test_capability_display() {
        assert_eq!(
            Capability::CLOSE_FISCAL_YEAR.to_string(),
            "accounting/fiscalyear/close_fiscalyear"
        );
    }
}

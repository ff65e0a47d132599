//! Structured audit records.
//!
//! Every change the agent makes to a switch (session and mastership changes,
//! program pushes, rule writes and withdrawals) is recorded as an
//! [`AuditRecord`] and emitted through [`audit_log!`](crate::audit_log) on the
//! `audit` target. The record is carried as a JSON payload so the trail can be
//! filtered out of the regular log and ingested as-is.
//!
//! Records are emitted as `tracing` events. Without a tracing subscriber
//! installed they are forwarded to the `log` facade, so the binary's
//! `env_logger` prints them alongside everything else.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What kind of change an audit record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditCategory {
    /// Session establishment and release
    SessionLifecycle,
    /// Mastership arbitration
    Mastership,
    /// Data-plane program push
    ProgramInstall,
    /// Table entry writes
    RuleInstall,
    /// Table entry deletes
    RuleWithdraw,
    /// Counter polling
    Telemetry,
    /// Configuration and schema loading
    ConfigurationChange,
    /// Failures that end a run
    ErrorCondition,
}

impl fmt::Display for AuditCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditCategory::SessionLifecycle => write!(f, "SESSION_LIFECYCLE"),
            AuditCategory::Mastership => write!(f, "MASTERSHIP"),
            AuditCategory::ProgramInstall => write!(f, "PROGRAM_INSTALL"),
            AuditCategory::RuleInstall => write!(f, "RULE_INSTALL"),
            AuditCategory::RuleWithdraw => write!(f, "RULE_WITHDRAW"),
            AuditCategory::Telemetry => write!(f, "TELEMETRY"),
            AuditCategory::ConfigurationChange => write!(f, "CONFIGURATION_CHANGE"),
            AuditCategory::ErrorCondition => write!(f, "ERROR_CONDITION"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditOutcome {
    Success,
    /// Some but not all of the work succeeded
    Partial,
    Failure,
    InProgress,
}

impl fmt::Display for AuditOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditOutcome::Success => write!(f, "success"),
            AuditOutcome::Partial => write!(f, "partial"),
            AuditOutcome::Failure => write!(f, "failure"),
            AuditOutcome::InProgress => write!(f, "in_progress"),
        }
    }
}

/// One audited event.
///
/// Built with the `with_*` methods and handed to
/// [`audit_log!`](crate::audit_log).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    /// UTC time the record was created
    pub timestamp: DateTime<Utc>,

    pub category: AuditCategory,

    /// Component that produced the record (e.g., `InstallationEngine`)
    pub source: String,

    pub action: String,

    pub outcome: AuditOutcome,

    /// Switch the event concerns, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub switch: Option<String>,

    /// Object acted upon (a table, a program, a counter)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AuditRecord {
    /// Creates a record stamped with the current time. The outcome starts as
    /// `InProgress`.
    pub fn new(
        category: AuditCategory,
        source: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            category,
            source: source.into(),
            action: action.into(),
            outcome: AuditOutcome::InProgress,
            switch: None,
            object: None,
            details: None,
            error: None,
        }
    }

    pub fn with_outcome(mut self, outcome: AuditOutcome) -> Self {
        self.outcome = outcome;
        self
    }

    pub fn with_switch(mut self, switch: impl Into<String>) -> Self {
        self.switch = Some(switch.into());
        self
    }

    pub fn with_object(mut self, object: impl Into<String>) -> Self {
        self.object = Some(object.into());
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Sets the error message and marks the outcome as `Failure`.
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self.outcome = AuditOutcome::Failure;
        self
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|e| format!(r#"{{"error":"serialization_failed","message":"{}"}}"#, e))
    }
}

/// Emits an [`AuditRecord`] on the `audit` target.
///
/// Successes log at info, in-progress records at debug, partial and failed
/// outcomes at warn.
///
/// # Usage
/// ```ignore
/// let record = AuditRecord::new(AuditCategory::RuleInstall, "InstallationEngine", "apply")
///     .with_switch("s1")
///     .with_outcome(AuditOutcome::Success);
/// audit_log!(record);
/// ```
#[macro_export]
macro_rules! audit_log {
    ($record:expr) => {
        let record = $record;
        match record.outcome {
            $crate::audit::AuditOutcome::Success => {
                tracing::info!(
                    target: "audit",
                    category = %record.category,
                    source = %record.source,
                    action = %record.action,
                    outcome = %record.outcome,
                    audit_json = %record.to_json(),
                    "AUDIT: {} - {} - {} {}",
                    record.category,
                    record.action,
                    record.outcome,
                    record.to_json()
                );
            }
            $crate::audit::AuditOutcome::InProgress => {
                tracing::debug!(
                    target: "audit",
                    category = %record.category,
                    source = %record.source,
                    action = %record.action,
                    outcome = %record.outcome,
                    audit_json = %record.to_json(),
                    "AUDIT: {} - {} - {} {}",
                    record.category,
                    record.action,
                    record.outcome,
                    record.to_json()
                );
            }
            $crate::audit::AuditOutcome::Partial | $crate::audit::AuditOutcome::Failure => {
                tracing::warn!(
                    target: "audit",
                    category = %record.category,
                    source = %record.source,
                    action = %record.action,
                    outcome = %record.outcome,
                    error = record.error.as_deref().unwrap_or(""),
                    audit_json = %record.to_json(),
                    "AUDIT: {} - {} - {} {}",
                    record.category,
                    record.action,
                    record.outcome,
                    record.to_json()
                );
            }
        }
    };
}

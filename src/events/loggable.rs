use serde::{Deserialize, Serialize};

/// Severity levels for audit entries.
/// Controls retention policies and log filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Critical events: long-term retention, never auto-delete
    Critical,
    /// Important events: medium-term retention (default)
    #[default]
    Important,
    /// Noise events: aggressively trimmed
    Noise,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Important => "important",
            Severity::Noise => "noise",
        }
    }
}

/// Trait for entities that can be recorded in the audit log.
pub trait Loggable: Serialize + Send + Sync {
    /// The entity type name (e.g., "role_permissions", "admin")
    /// This becomes the prefix in event names like "admin.role_changed"
    fn entity_type() -> &'static str;

    /// The subject identifier (role name, admin id)
    fn subject_id(&self) -> String;

    /// Severity level for logs (defaults to Important)
    fn severity(&self) -> Severity {
        Severity::Important
    }
}

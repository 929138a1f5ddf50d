/// Audit trail for authentication events
///
/// Entries are emitted through `tracing` as structured fields. They never carry
/// passwords or tokens.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Login,
    FirstLoginReset,
    TokenReset,
    PasswordChange,
    PasswordResetRequest,
    TokenRefresh,
    Logout,
    Deactivate,
    RequirePasswordReset,
    BootstrapAdmin,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Login => "LOGIN",
            AuditAction::FirstLoginReset => "FIRST_LOGIN_RESET",
            AuditAction::TokenReset => "TOKEN_RESET",
            AuditAction::PasswordChange => "PASSWORD_CHANGE",
            AuditAction::PasswordResetRequest => "PASSWORD_RESET_REQUEST",
            AuditAction::TokenRefresh => "TOKEN_REFRESH",
            AuditAction::Logout => "LOGOUT",
            AuditAction::Deactivate => "DEACTIVATE",
            AuditAction::RequirePasswordReset => "REQUIRE_PASSWORD_RESET",
            AuditAction::BootstrapAdmin => "BOOTSTRAP_ADMIN",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditStatus {
    Success,
    Failure,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditLog {
    pub log_id: String,
    pub timestamp: DateTime<Utc>,
    pub action: AuditAction,
    /// Account the action was applied to
    pub user_id: Option<Uuid>,
    /// Account that performed the action, when different (admin actions)
    pub actor_id: Option<Uuid>,
    pub status: AuditStatus,
    pub message: String,
    pub previous_state: Option<String>,
    pub new_state: Option<String>,
}

impl AuditLog {
    pub fn new(action: AuditAction, status: AuditStatus, message: impl Into<String>) -> Self {
        Self {
            log_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            action,
            user_id: None,
            actor_id: None,
            status,
            message: message.into(),
            previous_state: None,
            new_state: None,
        }
    }

    pub fn success(action: AuditAction, message: impl Into<String>) -> Self {
        Self::new(action, AuditStatus::Success, message)
    }

    pub fn failure(action: AuditAction, message: impl Into<String>) -> Self {
        Self::new(action, AuditStatus::Failure, message)
    }

    pub fn with_user_id(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_actor_id(mut self, actor_id: Uuid) -> Self {
        self.actor_id = Some(actor_id);
        self
    }

    pub fn with_state_change(mut self, previous: impl Into<String>, new: impl Into<String>) -> Self {
        self.previous_state = Some(previous.into());
        self.new_state = Some(new.into());
        self
    }

    pub fn emit(&self) {
        log_audit(self);
    }
}

pub fn log_audit(audit_log: &AuditLog) {
    match audit_log.status {
        AuditStatus::Failure => tracing::warn!(
            log_id = %audit_log.log_id,
            action = audit_log.action.as_str(),
            user_id = ?audit_log.user_id,
            actor_id = ?audit_log.actor_id,
            previous_state = ?audit_log.previous_state,
            new_state = ?audit_log.new_state,
            message = %audit_log.message,
            "Audit log entry"
        ),
        AuditStatus::Success => tracing::info!(
            log_id = %audit_log.log_id,
            action = audit_log.action.as_str(),
            user_id = ?audit_log.user_id,
            actor_id = ?audit_log.actor_id,
            previous_state = ?audit_log.previous_state,
            new_state = ?audit_log.new_state,
            message = %audit_log.message,
            "Audit log entry"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_sets_fields() {
        let user_id = Uuid::new_v4();
        let admin_id = Uuid::new_v4();
        let entry = AuditLog::success(AuditAction::Deactivate, "Account deactivated")
            .with_user_id(user_id)
            .with_actor_id(admin_id)
            .with_state_change("active", "inactive");

        assert_eq!(entry.user_id, Some(user_id));
        assert_eq!(entry.actor_id, Some(admin_id));
        assert_eq!(entry.status, AuditStatus::Success);
        assert_eq!(entry.new_state.as_deref(), Some("inactive"));
    }

    #[test]
    fn test_serializes_action_in_upper_case() {
        let entry = AuditLog::failure(AuditAction::PasswordResetRequest, "Unknown email");
        let json = serde_json::to_value(&entry).unwrap();

        assert_eq!(json["action"], "PASSWORD_RESET_REQUEST");
        assert_eq!(json["status"], "FAILURE");
    }
}

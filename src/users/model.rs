/// User records and roles

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{AppError, DatabaseError};

/// The five portal roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Coordinator,
    DepartmentalSupervisor,
    IndustrialSupervisor,
    Student,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Coordinator => "coordinator",
            Role::DepartmentalSupervisor => "departmental_supervisor",
            Role::IndustrialSupervisor => "industrial_supervisor",
            Role::Student => "student",
        }
    }

    /// Dashboard the frontend lands a freshly signed-in user on
    pub fn dashboard_route(&self) -> &'static str {
        match self {
            Role::Admin => "/admin/dashboard",
            Role::Coordinator => "/coordinator/dashboard",
            Role::DepartmentalSupervisor => "/departmental-supervisor/dashboard",
            Role::IndustrialSupervisor => "/industrial-supervisor/dashboard",
            Role::Student => "/student/dashboard",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "coordinator" => Ok(Role::Coordinator),
            "departmental_supervisor" => Ok(Role::DepartmentalSupervisor),
            "industrial_supervisor" => Ok(Role::IndustrialSupervisor),
            "student" => Ok(Role::Student),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// Where a user stands in the password-reset lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetState {
    Active,
    PendingFirstLoginReset,
    PendingTokenReset,
}

/// Stored credential record
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub role: Role,
    pub is_active: bool,
    pub is_first_login: bool,
    pub password_reset_required: bool,
    pub reset_token_hash: Option<String>,
    pub reset_token_expires_at: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// A user with either flag set must reset before getting a session
    pub fn requires_password_reset(&self) -> bool {
        self.is_first_login || self.password_reset_required
    }

    pub fn has_live_reset_token(&self, now: DateTime<Utc>) -> bool {
        match (&self.reset_token_hash, self.reset_token_expires_at) {
            (Some(_), Some(expires_at)) => expires_at > now,
            _ => false,
        }
    }

    /// An expired reset token counts as `Active`: it simply stops working.
    pub fn reset_state(&self, now: DateTime<Utc>) -> ResetState {
        if self.requires_password_reset() {
            ResetState::PendingFirstLoginReset
        } else if self.has_live_reset_token(now) {
            ResetState::PendingTokenReset
        } else {
            ResetState::Active
        }
    }
}

/// Row shape as stored in Postgres; `role` is TEXT.
#[derive(Debug, sqlx::FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub role: String,
    pub is_active: bool,
    pub is_first_login: bool,
    pub password_reset_required: bool,
    pub reset_token_hash: Option<String>,
    pub reset_token_expires_at: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = AppError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = row
            .role
            .parse::<Role>()
            .map_err(|e| AppError::Database(DatabaseError::CorruptRecord(e)))?;

        Ok(User {
            id: row.id,
            email: row.email,
            name: row.name,
            password_hash: row.password_hash,
            role,
            is_active: row.is_active,
            is_first_login: row.is_first_login,
            password_reset_required: row.password_reset_required,
            reset_token_hash: row.reset_token_hash,
            reset_token_expires_at: row.reset_token_expires_at,
            last_login_at: row.last_login_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Input for creating an account
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub role: Role,
    pub is_first_login: bool,
}

/// Public view of a user, safe to return to clients
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub is_active: bool,
    pub is_first_login: bool,
    pub dashboard_route: String,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
            is_active: user.is_active,
            is_first_login: user.is_first_login,
            dashboard_route: user.role.dashboard_route().to_string(),
        }
    }
}

/// Stored refresh token (hash only)
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RefreshTokenRecord {
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub is_revoked: bool,
}

impl RefreshTokenRecord {
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        !self.is_revoked && self.expires_at > now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn user() -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            email: "student@example.com".to_string(),
            name: "Student".to_string(),
            password_hash: "$2b$04$hash".to_string(),
            role: Role::Student,
            is_active: true,
            is_first_login: false,
            password_reset_required: false,
            reset_token_hash: None,
            reset_token_expires_at: None,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_role_round_trips_through_text() {
        for role in [
            Role::Admin,
            Role::Coordinator,
            Role::DepartmentalSupervisor,
            Role::IndustrialSupervisor,
            Role::Student,
        ] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("superuser".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_serializes_snake_case() {
        let json = serde_json::to_string(&Role::IndustrialSupervisor).unwrap();
        assert_eq!(json, "\"industrial_supervisor\"");
    }

    #[test]
    fn test_reset_state_transitions() {
        let now = Utc::now();
        let mut u = user();
        assert_eq!(u.reset_state(now), ResetState::Active);

        u.reset_token_hash = Some("abc".to_string());
        u.reset_token_expires_at = Some(now + Duration::minutes(30));
        assert_eq!(u.reset_state(now), ResetState::PendingTokenReset);

        // expiry silently reverts to Active
        u.reset_token_expires_at = Some(now - Duration::seconds(1));
        assert_eq!(u.reset_state(now), ResetState::Active);

        u.password_reset_required = true;
        assert_eq!(u.reset_state(now), ResetState::PendingFirstLoginReset);
    }

    #[test]
    fn test_profile_hides_hash_and_carries_route() {
        let u = user();
        let profile = UserProfile::from(&u);
        let json = serde_json::to_value(&profile).unwrap();

        assert!(json.get("passwordHash").is_none());
        assert_eq!(json["dashboardRoute"], "/student/dashboard");
        assert_eq!(json["isFirstLogin"], false);
    }

    #[test]
    fn test_row_with_unknown_role_is_rejected() {
        let now = Utc::now();
        let row = UserRow {
            id: Uuid::new_v4(),
            email: "x@example.com".to_string(),
            name: "X".to_string(),
            password_hash: "h".to_string(),
            role: "janitor".to_string(),
            is_active: true,
            is_first_login: false,
            password_reset_required: false,
            reset_token_hash: None,
            reset_token_expires_at: None,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };
        assert!(User::try_from(row).is_err());
    }
}

//! # Domain Events
//!
//! Significant state changes in the authorization kernel, recorded for
//! structured audit logging (`tracing::info!` with an event as its payload).
//! No message broker is wired up in this service; handlers are in-process
//! `tracing` emission for now, leaving room for async dispatch to other
//! services later.
//!
//! | Event                 | Trigger                                   |
//! |------------------------|-------------------------------------------|
//! | `UserRegistered`       | New user completes registration            |
//! | `UserLoggedIn`         | Password login succeeds                    |
//! | `UserLoggedOut`        | Logout (single session or all)             |
//! | `LoginFailed`          | Password login fails                        |
//! | `AuthorizationCodeIssued` | `/oauth2/authorize` issues a code        |
//! | `TokenIssued`          | `/oauth2/token` mints an access/refresh pair|
//! | `TokenRevoked`         | `/oauth2/revoke` flips a token's `revoked`  |
//! | `RoleAssigned`         | A `RoleAssignment` row is created           |
//! | `InviteAccepted`       | An invite is redeemed into a membership     |
//! | `ApiKeyCreated`        | A new API key is minted for a user          |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Common interface for all domain events.
pub trait DomainEvent: Serialize + Send + Sync {
    /// Event type name for routing/filtering (dotted, e.g. `"user.registered"`).
    fn event_type(&self) -> &'static str;
    fn occurred_at(&self) -> DateTime<Utc>;
    /// Aggregate this event relates to (usually a user id).
    fn aggregate_id(&self) -> Uuid;
}

// =============================================================================
// USER LIFECYCLE
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRegistered {
    pub user_id: Uuid,
    pub username: String,
    pub occurred_at: DateTime<Utc>,
}

impl DomainEvent for UserRegistered {
    fn event_type(&self) -> &'static str {
        "user.registered"
    }
    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
    fn aggregate_id(&self) -> Uuid {
        self.user_id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserLoggedIn {
    pub user_id: Uuid,
    pub occurred_at: DateTime<Utc>,
}

impl DomainEvent for UserLoggedIn {
    fn event_type(&self) -> &'static str {
        "user.logged_in"
    }
    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
    fn aggregate_id(&self) -> Uuid {
        self.user_id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserLoggedOut {
    pub user_id: Uuid,
    pub all_sessions: bool,
    pub occurred_at: DateTime<Utc>,
}

impl DomainEvent for UserLoggedOut {
    fn event_type(&self) -> &'static str {
        "user.logged_out"
    }
    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
    fn aggregate_id(&self) -> Uuid {
        self.user_id
    }
}

/// Emitted on a failed password login. `attempted_identifier` is logged
/// (not the password) so repeated-failure monitoring doesn't need to touch
/// credentials at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginFailed {
    pub attempted_identifier: String,
    pub reason: LoginFailureReason,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginFailureReason {
    UnknownIdentifier,
    WrongPassword,
    AccountDisabled,
}

impl DomainEvent for LoginFailed {
    fn event_type(&self) -> &'static str {
        "user.login_failed"
    }
    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
    fn aggregate_id(&self) -> Uuid {
        Uuid::nil()
    }
}

// =============================================================================
// OAUTH2 / OIDC
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationCodeIssued {
    pub user_id: Uuid,
    pub client_id: String,
    pub scope: String,
    pub occurred_at: DateTime<Utc>,
}

impl DomainEvent for AuthorizationCodeIssued {
    fn event_type(&self) -> &'static str {
        "oauth2.code_issued"
    }
    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
    fn aggregate_id(&self) -> Uuid {
        self.user_id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenIssued {
    pub user_id: Uuid,
    pub client_id: String,
    pub grant_type: String,
    pub scope: String,
    pub occurred_at: DateTime<Utc>,
}

impl DomainEvent for TokenIssued {
    fn event_type(&self) -> &'static str {
        "oauth2.token_issued"
    }
    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
    fn aggregate_id(&self) -> Uuid {
        self.user_id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRevoked {
    pub token_id: Uuid,
    pub user_id: Uuid,
    pub occurred_at: DateTime<Utc>,
}

impl DomainEvent for TokenRevoked {
    fn event_type(&self) -> &'static str {
        "oauth2.token_revoked"
    }
    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
    fn aggregate_id(&self) -> Uuid {
        self.user_id
    }
}

// =============================================================================
// RBAC / TENANCY
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleAssigned {
    pub target_id: Uuid,
    pub role_id: Uuid,
    pub resource_id: Uuid,
    pub assigned_by: Uuid,
    pub occurred_at: DateTime<Utc>,
}

impl DomainEvent for RoleAssigned {
    fn event_type(&self) -> &'static str {
        "iam.role_assigned"
    }
    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
    fn aggregate_id(&self) -> Uuid {
        self.target_id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InviteAccepted {
    pub invite_id: Uuid,
    pub user_id: Uuid,
    pub resource_id: Uuid,
    pub occurred_at: DateTime<Utc>,
}

impl DomainEvent for InviteAccepted {
    fn event_type(&self) -> &'static str {
        "invite.accepted"
    }
    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
    fn aggregate_id(&self) -> Uuid {
        self.user_id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeyCreated {
    pub key_id: Uuid,
    pub user_id: Uuid,
    pub resource_id: Uuid,
    pub occurred_at: DateTime<Utc>,
}

impl DomainEvent for ApiKeyCreated {
    fn event_type(&self) -> &'static str {
        "api_key.created"
    }
    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
    fn aggregate_id(&self) -> Uuid {
        self.user_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_and_aggregate_id() {
        let event = UserRegistered {
            user_id: Uuid::new_v4(),
            username: "grace".to_string(),
            occurred_at: Utc::now(),
        };
        assert_eq!(event.event_type(), "user.registered");
        assert_eq!(event.aggregate_id(), event.user_id);
    }

    #[test]
    fn test_login_failed_has_no_aggregate() {
        let event = LoginFailed {
            attempted_identifier: "nobody@example.com".to_string(),
            reason: LoginFailureReason::UnknownIdentifier,
            occurred_at: Utc::now(),
        };
        assert_eq!(event.aggregate_id(), Uuid::nil());
    }
}

//! Single capability-resolution point.
//!
//! Every handler asks `can(user, action, resource)` instead of comparing
//! role strings inline, so the full authorization surface is readable (and
//! testable) in one table.

use uuid::Uuid;

use super::AuthUser;
use crate::{errors::ServiceError, models::Role};

/// Things a caller may attempt through the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ReadItems,
    ManageItems,
    AnalyzeImage,
    CreateRequest,
    ReadRequest,
    ListAllRequests,
    ReviewRequest,
    ReturnRequest,
    EditRequest,
    DeleteRequest,
    ManageUsers,
    ReadGuests,
    ReadDashboard,
}

/// What the action targets. `System` covers collection-level operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    System,
    /// A request owned by the referenced user (guests go through public
    /// token-verified routes, not capabilities).
    Request { owner: Option<Uuid> },
}

/// Capability table. Admin review/management stays admin-only; reading is
/// open to any authenticated role; owners can see their own requests.
pub fn can(user: &AuthUser, action: Action, resource: &Resource) -> bool {
    match action {
        Action::ReadItems | Action::CreateRequest => true,
        Action::ReadDashboard => user.role >= Role::Staff,
        Action::ManageItems | Action::AnalyzeImage => user.role >= Role::Staff,
        Action::ReadRequest => match resource {
            Resource::Request { owner } => {
                user.is_admin() || owner.is_some_and(|id| id == user.user_id)
            }
            Resource::System => user.is_admin(),
        },
        Action::ListAllRequests
        | Action::ReviewRequest
        | Action::ReturnRequest
        | Action::EditRequest
        | Action::DeleteRequest
        | Action::ManageUsers
        | Action::ReadGuests => user.is_admin(),
    }
}

/// Lifts a capability check into a `Result` for use with `?` in handlers.
pub fn authorize(allowed: bool) -> Result<(), ServiceError> {
    if allowed {
        Ok(())
    } else {
        Err(ServiceError::Forbidden(
            "Insufficient permissions for this operation".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_with(role: Role) -> AuthUser {
        AuthUser {
            user_id: Uuid::new_v4(),
            email: None,
            name: None,
            role,
        }
    }

    #[test]
    fn review_is_admin_only() {
        for role in [Role::Guest, Role::Intern, Role::Staff] {
            assert!(!can(&user_with(role), Action::ReviewRequest, &Resource::System));
        }
        assert!(can(&user_with(Role::Admin), Action::ReviewRequest, &Resource::System));
    }

    #[test]
    fn owners_read_their_own_requests() {
        let user = user_with(Role::Intern);
        let own = Resource::Request {
            owner: Some(user.user_id),
        };
        let other = Resource::Request {
            owner: Some(Uuid::new_v4()),
        };
        assert!(can(&user, Action::ReadRequest, &own));
        assert!(!can(&user, Action::ReadRequest, &other));
        assert!(can(&user_with(Role::Admin), Action::ReadRequest, &other));
    }

    #[test]
    fn item_management_requires_staff() {
        assert!(!can(&user_with(Role::Intern), Action::ManageItems, &Resource::System));
        assert!(can(&user_with(Role::Staff), Action::ManageItems, &Resource::System));
        assert!(can(&user_with(Role::Staff), Action::AnalyzeImage, &Resource::System));
    }

    #[test]
    fn authorize_maps_to_forbidden() {
        let err = authorize(can(&user_with(Role::Guest), Action::ManageUsers, &Resource::System))
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }
}

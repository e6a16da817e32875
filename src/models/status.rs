use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;

/// Lifecycle status of a checkout request.
///
/// `Unconfirmed` is a guest-only pre-state pending email verification;
/// confirmation promotes it to `Pending`. `Overdue` is assigned externally
/// when a due date lapses and behaves like `Approved` for return purposes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
    Returned,
    Unconfirmed,
    Overdue,
}

impl RequestStatus {
    /// Whether an admin review decision (approve/reject) may be applied.
    pub fn reviewable(self) -> bool {
        self == RequestStatus::Pending
    }

    /// Whether the request's items can be marked returned.
    pub fn returnable(self) -> bool {
        matches!(self, RequestStatus::Approved | RequestStatus::Overdue)
    }

    /// Guarded transition table for status changes.
    pub fn can_transition_to(self, next: RequestStatus) -> bool {
        match next {
            RequestStatus::Approved | RequestStatus::Rejected => self.reviewable(),
            RequestStatus::Returned => self.returnable(),
            RequestStatus::Pending => self == RequestStatus::Unconfirmed,
            RequestStatus::Unconfirmed | RequestStatus::Overdue => false,
        }
    }
}

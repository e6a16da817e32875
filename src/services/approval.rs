//! Auto-approval decision for checkout requests.
//!
//! A request is approved at creation time when the requester's role rank
//! meets or exceeds the access level of every requested item. The decision
//! is a pure function over roles so it can be tested without a database;
//! the workflow service resolves raw strings to [`Role`] before calling in.

use crate::models::{RequestStatus, Role};

/// Outcome of the auto-approval check for a newly created request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalDecision {
    Approved,
    Pending,
}

impl ApprovalDecision {
    pub fn initial_status(self) -> RequestStatus {
        match self {
            ApprovalDecision::Approved => RequestStatus::Approved,
            ApprovalDecision::Pending => RequestStatus::Pending,
        }
    }

    pub fn is_approved(self) -> bool {
        matches!(self, ApprovalDecision::Approved)
    }
}

/// Decide whether `requester` clears the access level of every item.
///
/// Item levels arrive already resolved: unknown or missing levels are
/// mapped to [`Role::Admin`] upstream, so a mislabelled item can only make
/// a request harder to approve, never easier. An empty item list approves
/// trivially; whether such a request is allowed to exist at all is decided
/// by the workflow service's empty-list policy before it calls in.
pub fn decide(requester: Role, item_levels: &[Role]) -> ApprovalDecision {
    if item_levels.iter().all(|level| requester >= *level) {
        ApprovalDecision::Approved
    } else {
        ApprovalDecision::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn staff_clears_intern_and_guest_items() {
        let decision = decide(Role::Staff, &[Role::Intern, Role::Guest]);
        assert_eq!(decision, ApprovalDecision::Approved);
    }

    #[test]
    fn one_item_above_rank_forces_pending() {
        let decision = decide(Role::Staff, &[Role::Guest, Role::Admin]);
        assert_eq!(decision, ApprovalDecision::Pending);
    }

    #[test]
    fn equal_rank_is_sufficient() {
        let decision = decide(Role::Intern, &[Role::Intern]);
        assert_eq!(decision, ApprovalDecision::Approved);
    }

    #[test]
    fn guest_clears_only_guest_items() {
        assert!(decide(Role::Guest, &[Role::Guest]).is_approved());
        assert!(!decide(Role::Guest, &[Role::Intern]).is_approved());
    }

    #[test]
    fn empty_list_is_vacuously_approved() {
        assert_eq!(decide(Role::Guest, &[]), ApprovalDecision::Approved);
    }

    fn role_strategy() -> impl Strategy<Value = Role> {
        prop_oneof![
            Just(Role::Guest),
            Just(Role::Intern),
            Just(Role::Staff),
            Just(Role::Admin),
        ]
    }

    proptest! {
        /// Approval holds iff the requester's rank is >= the maximum item level.
        #[test]
        fn approval_matches_max_level(
            requester in role_strategy(),
            levels in prop::collection::vec(role_strategy(), 1..8),
        ) {
            let decision = decide(requester, &levels);
            let max_level = levels.iter().copied().max().unwrap();
            prop_assert_eq!(decision.is_approved(), requester >= max_level);
        }

        /// Admins clear any combination of item levels.
        #[test]
        fn admin_always_approved(levels in prop::collection::vec(role_strategy(), 1..8)) {
            prop_assert!(decide(Role::Admin, &levels).is_approved());
        }
    }
}

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use utoipa::ToSchema;

/// Access level used both as a user's permission level and as an item's
/// minimum-access gate. The ordering `guest < intern < staff < admin` is a
/// strict total order over the rank table.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    Guest,
    Intern,
    Staff,
    Admin,
}

impl Role {
    /// Integer rank: admin=4, staff=3, intern=2, guest=1.
    pub fn rank(self) -> u8 {
        match self {
            Role::Guest => 1,
            Role::Intern => 2,
            Role::Staff => 3,
            Role::Admin => 4,
        }
    }

    /// Parse a requester role column, defaulting to `Guest` when the stored
    /// value is missing or unknown.
    pub fn requester_or_default(raw: Option<&str>) -> Role {
        raw.and_then(|s| s.parse().ok()).unwrap_or(Role::Guest)
    }

    /// Parse an item level column, failing closed: missing or unknown
    /// levels gate at `Admin`.
    pub fn item_level_or_closed(raw: Option<&str>) -> Role {
        raw.and_then(|s| s.parse().ok()).unwrap_or(Role::Admin)
    }

    pub fn is_admin(self) -> bool {
        self == Role::Admin
    }
}

impl PartialOrd for Role {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Role {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.rank().cmp(&other.rank())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn ranks_form_a_strict_total_order() {
        assert!(Role::Guest < Role::Intern);
        assert!(Role::Intern < Role::Staff);
        assert!(Role::Staff < Role::Admin);

        let ranks: Vec<u8> = Role::iter().map(Role::rank).collect();
        assert_eq!(ranks, vec![1, 2, 3, 4]);
    }

    #[test]
    fn parses_lowercase_names() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("guest".parse::<Role>().unwrap(), Role::Guest);
        assert!("superuser".parse::<Role>().is_err());
    }

    #[test]
    fn requester_defaults_open_item_level_defaults_closed() {
        assert_eq!(Role::requester_or_default(None), Role::Guest);
        assert_eq!(Role::requester_or_default(Some("bogus")), Role::Guest);
        assert_eq!(Role::item_level_or_closed(None), Role::Admin);
        assert_eq!(Role::item_level_or_closed(Some("bogus")), Role::Admin);
        assert_eq!(Role::item_level_or_closed(Some("staff")), Role::Staff);
    }
}

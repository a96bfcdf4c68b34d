//! Owning identity of a storage partition.

use serde::{Deserialize, Serialize};

use super::UserId;

/// The identity that owns a storage partition.
///
/// Every persisted snapshot is tagged with its owner; a read that finds a
/// different owner than the one requested is treated as a miss. The string
/// form (`guest` or the user UUID) doubles as the partition key suffix, so
/// the serde representation must stay stable across releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum OwnerId {
    /// Anonymous browser, not signed in.
    Guest,
    /// Authenticated storefront user.
    User(UserId),
}

impl OwnerId {
    /// Partition key suffix for this owner.
    #[must_use]
    pub fn partition_suffix(&self) -> String {
        match self {
            Self::Guest => "guest".to_string(),
            Self::User(id) => id.to_string(),
        }
    }

    /// Whether this owner is the anonymous guest.
    #[must_use]
    pub const fn is_guest(&self) -> bool {
        matches!(self, Self::Guest)
    }
}

impl std::fmt::Display for OwnerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.partition_suffix())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_partition_suffix() {
        assert_eq!(OwnerId::Guest.partition_suffix(), "guest");

        let id = Uuid::new_v4();
        let owner = OwnerId::User(UserId::new(id));
        assert_eq!(owner.partition_suffix(), id.to_string());
    }

    #[test]
    fn test_serde_round_trip() {
        let owner = OwnerId::User(UserId::new(Uuid::new_v4()));
        let json = serde_json::to_string(&owner).unwrap();
        let back: OwnerId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, owner);

        let guest: OwnerId = serde_json::from_str(r#"{"kind":"guest"}"#).unwrap();
        assert_eq!(guest, OwnerId::Guest);
    }
}

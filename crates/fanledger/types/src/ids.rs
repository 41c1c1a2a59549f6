use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! serial_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            pub fn new(raw: i64) -> Self {
                Self(raw)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

serial_id!(
    /// Store-assigned account identifier.
    AccountId
);
serial_id!(
    /// Store-assigned participant identifier. Ordering doubles as insertion order.
    ParticipantId
);
serial_id!(
    /// Store-assigned donation objective identifier.
    ObjectiveId
);
serial_id!(VideoId);
serial_id!(ChallengeId);

/// Identifier of an immutable vote log row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VoteId(pub Uuid);

impl VoteId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for VoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vote-{}", self.0)
    }
}

/// Identifier of an alliance row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AllianceId(pub Uuid);

impl AllianceId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for AllianceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "alliance-{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serial_ids_serialize_as_bare_numbers() {
        let id = ParticipantId::new(7);
        assert_eq!(serde_json::to_string(&id).unwrap(), "7");
        assert_eq!(id.to_string(), "7");
    }

    #[test]
    fn participant_ids_order_by_insertion() {
        let mut ids = vec![ParticipantId(3), ParticipantId(1), ParticipantId(2)];
        ids.sort();
        assert_eq!(
            ids,
            vec![ParticipantId(1), ParticipantId(2), ParticipantId(3)]
        );
    }

    #[test]
    fn log_ids_are_prefixed_in_display() {
        assert!(VoteId::generate().to_string().starts_with("vote-"));
        assert!(AllianceId::generate().to_string().starts_with("alliance-"));
    }
}

use serde::{Deserialize, Serialize};

/// Authenticated end user with a consumable credit balance.
///
/// Identity lives with the identity provider; this crate only reads the
/// balance and decrements it through [`crate::PrincipalStore::try_debit`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    pub name: String,
    pub credits: u64,
}

impl Principal {
    pub fn new(id: impl Into<String>, name: impl Into<String>, credits: u64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            credits,
        }
    }

    pub fn can_afford(&self, cost: u64) -> bool {
        self.credits >= cost
    }
}

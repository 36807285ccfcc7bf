use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    Traveler,
    Admin,
}

/// Verification tiers, ordered from weakest to strongest.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "snake_case")]
pub enum VerificationLevel {
    #[default]
    Unverified,
    Basic,
    Verified,
}

/// Identity handed to the engine by the authorization layer. It is trusted as
/// is; ownership is checked against it, never re-authenticated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Caller {
    pub user_id: Uuid,
    pub role: Role,
    pub rating: Option<f64>,
    pub verification: VerificationLevel,
}

impl Caller {
    pub fn customer(user_id: Uuid) -> Self {
        Self {
            user_id,
            role: Role::Customer,
            rating: None,
            verification: VerificationLevel::Unverified,
        }
    }

    pub fn traveler(user_id: Uuid, rating: f64, verification: VerificationLevel) -> Self {
        Self {
            user_id,
            role: Role::Traveler,
            rating: Some(rating),
            verification,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

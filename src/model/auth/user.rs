use serde_repr::{Deserialize_repr, Serialize_repr};

/// Privilege level carried inside a token. Stored as a single digit to keep tokens short.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum Rights {
    Voter = 0,
    Admin = 1,
}

impl Rights {
    pub fn from_admin_flag(is_admin: bool) -> Self {
        if is_admin {
            Self::Admin
        } else {
            Self::Voter
        }
    }
}

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Courier,
    Customer,
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "courier" => Ok(Role::Courier),
            "customer" => Ok(Role::Customer),
            other => Err(format!(
                "unknown role: {other}, expected admin/courier/customer"
            )),
        }
    }
}

/// An already-authenticated caller. Every engine operation takes one
/// explicitly; nothing in the core looks up a session on its own.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub name: String,
    pub role: Role,
}

impl Actor {
    pub fn new(id: Uuid, name: impl Into<String>, role: Role) -> Self {
        Self {
            id,
            name: name.into(),
            role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_courier(&self, courier_id: Uuid) -> bool {
        self.role == Role::Courier && self.id == courier_id
    }
}

//! User and role types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ResourceId;
use crate::impl_wire_enum_conversions;

/// Authorization role assigned to a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Editor,
    Author,
    #[default]
    Reader,
}

impl_wire_enum_conversions!(Role {
    Admin => "admin",
    Editor => "editor",
    Author => "author",
    Reader => "reader",
});

impl Role {
    /// Whether the role may edit or delete content it does not own
    pub const fn can_moderate(&self) -> bool {
        matches!(self, Self::Admin | Self::Editor)
    }

    /// Whether the role may manage other users' accounts and roles
    pub const fn can_manage_users(&self) -> bool {
        matches!(self, Self::Admin)
    }
}

/// A registered user as returned by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: ResourceId,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Author information embedded in posts and comments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: ResourceId,
    pub name: String,
}

/// Payload for creating a user (administrative)
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

impl std::fmt::Debug for NewUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewUser")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("role", &self.role)
            .finish()
    }
}

/// Partial update of a user; absent fields are left unchanged
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUser {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl std::fmt::Debug for UpdateUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateUser")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_wire_format() {
        assert_eq!(serde_json::to_string(&Role::Editor).unwrap(), "\"editor\"");
        assert_eq!("Admin".parse::<Role>().unwrap(), Role::Admin);
        assert!("owner".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_permissions() {
        assert!(Role::Admin.can_manage_users());
        assert!(Role::Editor.can_moderate());
        assert!(!Role::Editor.can_manage_users());
        assert!(!Role::Reader.can_moderate());
    }

    #[test]
    fn test_user_deserializes_without_role() {
        let user: User =
            serde_json::from_str(r#"{ "id": 7, "name": "Ana", "email": "ana@example.com" }"#)
                .unwrap();
        assert_eq!(user.role, Role::Reader);
        assert!(user.created_at.is_none());
    }

    #[test]
    fn test_password_redacted_in_debug() {
        let new_user = NewUser {
            name: "Ana".into(),
            email: "ana@example.com".into(),
            password: "hunter2".into(),
            role: None,
        };
        assert!(!format!("{new_user:?}").contains("hunter2"));

        let update = UpdateUser { password: Some("hunter2".into()), ..UpdateUser::default() };
        assert!(!format!("{update:?}").contains("hunter2"));
        let body = serde_json::to_value(&update).unwrap();
        assert_eq!(body, serde_json::json!({ "password": "hunter2" }));
    }
}

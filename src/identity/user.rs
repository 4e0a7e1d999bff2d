use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub permissions: Vec<String>,
}

/// The signed-in principal as returned by `/auth/login` and `/auth/me`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub email_verified: Option<bool>,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn new(id: impl Into<String>, name: impl Into<String>, email: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: email.into(),
            email_verified: None,
            role,
            created_at: None,
            updated_at: None,
        }
    }
}

impl Role {
    pub fn new<I, S>(name: impl Into<String>, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { id: None, name: name.into(), permissions: permissions.into_iter().map(Into::into).collect() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_backend_shape() {
        let json = r#"{
            "id": "u1", "name": "Ada", "email": "ada@example.com",
            "emailVerified": true,
            "role": {"id": "r1", "name": "admin", "permissions": ["task.create", "user.manage_roles"]},
            "createdAt": "2024-05-01T10:00:00Z", "updatedAt": "2024-05-02T10:00:00Z"
        }"#;
        let u: User = serde_json::from_str(json).unwrap();
        assert_eq!(u.role.name, "admin");
        assert_eq!(u.role.permissions.len(), 2);
        assert_eq!(u.email_verified, Some(true));
        assert!(u.created_at.is_some());
    }

    #[test]
    fn missing_role_defaults_to_no_permissions() {
        let u: User = serde_json::from_str(r#"{"id":"u2","name":"Bo","email":"bo@example.com"}"#).unwrap();
        assert!(u.role.permissions.is_empty());
    }
}

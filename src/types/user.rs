use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// A registered user as seen by the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Unique user identifier.
    pub id: String,

    /// Display name.
    pub name: String,

    /// Email address, lowercased at sign-up.
    pub email: String,

    /// When the account was created.
    #[serde(with = "crate::utils::time")]
    pub created_at: OffsetDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::datetime;

    #[test]
    fn camel_case_wire_format() {
        let user = User {
            id: "user-1".to_string(),
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            created_at: datetime!(2024-01-02 03:04:05 UTC),
        };
        assert_eq!(
            serde_json::to_value(&user).unwrap(),
            json!({
                "id": "user-1",
                "name": "Ada",
                "email": "ada@example.com",
                "createdAt": "2024-01-02T03:04:05Z"
            })
        );
    }
}

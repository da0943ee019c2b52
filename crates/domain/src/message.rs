use serde::{Deserialize, Serialize};

/// A single chat message, provider-agnostic.
///
/// `content` is plain text: the gateway's wire surface (§6) takes
/// `messages: [{role, content}]` and never tool-call or multi-part content,
/// so adapters only need to translate role + text per provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Message {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: text.into(),
        }
    }
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: text.into(),
        }
    }
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: text.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_expected_role() {
        assert_eq!(Message::system("hi").role, Role::System);
        assert_eq!(Message::user("hi").role, Role::User);
        assert_eq!(Message::assistant("hi").role, Role::Assistant);
    }

    #[test]
    fn role_serializes_lowercase() {
        let v = serde_json::to_value(Role::Assistant).unwrap();
        assert_eq!(v, serde_json::json!("assistant"));
    }
}

//! Typed wrappers for JSON columns.

use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One attendee of a recorded call as reported by the provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Participant {
    pub name: String,
    pub email: String,
}

impl Participant {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    /// Email trimmed and lower-cased for comparison against rep emails.
    pub fn normalized_email(&self) -> String {
        self.email.trim().to_lowercase()
    }
}

/// Ordered attendee list stored in `calls.participants`.
#[derive(
    Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult, ToSchema,
)]
pub struct Participants(pub Vec<Participant>);

impl Participants {
    pub fn iter(&self) -> std::slice::Iter<'_, Participant> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Participant>> for Participants {
    fn from(participants: Vec<Participant>) -> Self {
        Self(participants)
    }
}

/// A JSON array of strings, used for rep team allow-lists and analysis key topics.
#[derive(
    Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult, ToSchema,
)]
pub struct StringList(pub Vec<String>);

impl StringList {
    pub fn contains(&self, value: &str) -> bool {
        self.0.iter().any(|v| v == value)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<String>> for StringList {
    fn from(values: Vec<String>) -> Self {
        Self(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_email_trims_and_lowercases() {
        let participant = Participant::new("Jane", "  Jane@Co.COM ");
        assert_eq!(participant.normalized_email(), "jane@co.com");
    }

    #[test]
    fn participants_serialize_as_plain_array() {
        let participants = Participants::from(vec![Participant::new("Jane", "jane@co.com")]);
        let json = serde_json::to_value(&participants).unwrap();
        assert_eq!(
            json,
            serde_json::json!([{ "name": "Jane", "email": "jane@co.com" }])
        );
    }
}

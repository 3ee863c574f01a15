//! Core data types shared by the loader, the prompt composer and the server.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// One loaded file: its filename and the plain text extracted from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub name: String,
    pub text: String,
}

/// Documents keyed by filename, in scan order.
///
/// Names are unique; inserting an existing name replaces its text in place
/// without changing its position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentSet {
    docs: Vec<Document>,
}

impl DocumentSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, text: impl Into<String>) {
        let name = name.into();
        let text = text.into();
        match self.docs.iter_mut().find(|d| d.name == name) {
            Some(existing) => existing.text = text,
            None => self.docs.push(Document { name, text }),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.docs
            .iter()
            .find(|d| d.name == name)
            .map(|d| d.text.as_str())
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.docs.iter().map(|d| d.name.clone()).collect()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Document> {
        self.docs.iter()
    }
}

impl<'a> IntoIterator for &'a DocumentSet {
    type Item = &'a Document;
    type IntoIter = std::slice::Iter<'a, Document>;

    fn into_iter(self) -> Self::IntoIter {
        self.docs.iter()
    }
}

impl<N: Into<String>, T: Into<String>> FromIterator<(N, T)> for DocumentSet {
    fn from_iter<I: IntoIterator<Item = (N, T)>>(iter: I) -> Self {
        let mut set = DocumentSet::new();
        for (name, text) in iter {
            set.insert(name, text);
        }
        set
    }
}

/// Role of a message in the completion API exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// A single message sent to the completion API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// An immutable document set together with the system prompt built from it.
///
/// Snapshots are only ever replaced as a whole, so the prompt always matches
/// the documents stored next to it.
#[derive(Debug, Clone)]
pub struct Knowledge {
    pub documents: DocumentSet,
    pub system_context: String,
    pub loaded_at: DateTime<Utc>,
}

impl Knowledge {
    /// Prompt length in characters, as reported by `/health` and `/`.
    pub fn system_prompt_length(&self) -> usize {
        self.system_context.chars().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_keeps_first_position_for_duplicate_names() {
        let mut set = DocumentSet::new();
        set.insert("a.txt", "one");
        set.insert("b.txt", "two");
        set.insert("a.txt", "three");
        assert_eq!(set.names(), vec!["a.txt", "b.txt"]);
        assert_eq!(set.get("a.txt"), Some("three"));
    }

    #[test]
    fn chat_message_serializes_to_wire_format() {
        let json = serde_json::to_value(ChatMessage::system("ctx")).unwrap();
        assert_eq!(json, serde_json::json!({"role": "system", "content": "ctx"}));
    }

    #[test]
    fn prompt_length_counts_characters() {
        let knowledge = Knowledge {
            documents: DocumentSet::new(),
            system_context: "文件ab".to_string(),
            loaded_at: Utc::now(),
        };
        assert_eq!(knowledge.system_prompt_length(), 4);
    }
}

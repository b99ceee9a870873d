//! User memory types.
//!
//! Memories are short facts about a user (preferences, interests, places
//! visited) used to personalize retrieval and chat answers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// Maximum length of a memory's content, in characters.
pub const MAX_MEMORY_CONTENT_CHARS: usize = 1000;

/// Category of a user memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryType {
    Preference,
    Interest,
    Visited,
    Dislike,
    Context,
}

impl MemoryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryType::Preference => "preference",
            MemoryType::Interest => "interest",
            MemoryType::Visited => "visited",
            MemoryType::Dislike => "dislike",
            MemoryType::Context => "context",
        }
    }
}

impl fmt::Display for MemoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemoryType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "preference" => Ok(MemoryType::Preference),
            "interest" => Ok(MemoryType::Interest),
            "visited" => Ok(MemoryType::Visited),
            "dislike" => Ok(MemoryType::Dislike),
            "context" => Ok(MemoryType::Context),
            other => Err(ValidationError::UnknownMemoryType(other.to_string())),
        }
    }
}

/// A stored user memory.
///
/// `id` is assigned by the durable backend, or synthesized for memories that
/// only live in the volatile cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserMemory {
    pub id: Option<i64>,
    pub user_id: i64,
    pub memory_type: MemoryType,
    pub content: String,
    pub confidence: f64,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// Request to store a new memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUserMemory {
    pub user_id: i64,
    pub memory_type: MemoryType,
    pub content: String,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

fn default_confidence() -> f64 {
    1.0
}

impl NewUserMemory {
    pub fn new(user_id: i64, memory_type: MemoryType, content: impl Into<String>) -> Self {
        Self {
            user_id,
            memory_type,
            content: content.into(),
            confidence: default_confidence(),
            metadata: serde_json::Map::new(),
        }
    }

    /// Validate content length and confidence range.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let chars = self.content.chars().count();
        if self.content.trim().is_empty() {
            return Err(ValidationError::Empty("memory content"));
        }
        if chars > MAX_MEMORY_CONTENT_CHARS {
            return Err(ValidationError::out_of_range(
                "content",
                format!("must be at most {MAX_MEMORY_CONTENT_CHARS} characters, got {chars}"),
            ));
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(ValidationError::out_of_range(
                "confidence",
                format!("must be between 0 and 1, got {}", self.confidence),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_type_round_trip() {
        for ty in [
            MemoryType::Preference,
            MemoryType::Interest,
            MemoryType::Visited,
            MemoryType::Dislike,
            MemoryType::Context,
        ] {
            assert_eq!(ty.to_string().parse::<MemoryType>().unwrap(), ty);
        }
        assert!(matches!(
            "fact".parse::<MemoryType>(),
            Err(ValidationError::UnknownMemoryType(_))
        ));
    }

    #[test]
    fn test_new_memory_defaults_confidence() {
        let json = r#"{"user_id": 123, "memory_type": "preference", "content": "User prefers beach destinations"}"#;
        let memory: NewUserMemory = serde_json::from_str(json).unwrap();
        assert!((memory.confidence - 1.0).abs() < f64::EPSILON);
        assert!(memory.metadata.is_empty());
        assert!(memory.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_content() {
        let memory = NewUserMemory::new(1, MemoryType::Interest, "   ");
        assert_eq!(
            memory.validate().unwrap_err(),
            ValidationError::Empty("memory content")
        );
    }

    #[test]
    fn test_validate_rejects_long_content() {
        let memory = NewUserMemory::new(1, MemoryType::Interest, "a".repeat(1001));
        assert!(memory.validate().is_err());
        let memory = NewUserMemory::new(1, MemoryType::Interest, "a".repeat(1000));
        assert!(memory.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_confidence_out_of_range() {
        let mut memory = NewUserMemory::new(1, MemoryType::Dislike, "crowded places");
        memory.confidence = 1.5;
        assert!(memory.validate().is_err());
        memory.confidence = -0.1;
        assert!(memory.validate().is_err());
        memory.confidence = 0.0;
        assert!(memory.validate().is_ok());
    }
}

//! Entity categories and embedding modalities.

use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// Category of an indexed entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Location,
    Festival,
    Item,
}

impl EntityType {
    pub const ALL: [EntityType; 3] = [EntityType::Location, EntityType::Festival, EntityType::Item];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Location => "location",
            EntityType::Festival => "festival",
            EntityType::Item => "item",
        }
    }

    /// Title-cased name used for navigation targets (e.g. `LocationDetail`).
    pub fn title_case(&self) -> &'static str {
        match self {
            EntityType::Location => "Location",
            EntityType::Festival => "Festival",
            EntityType::Item => "Item",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "location" => Ok(EntityType::Location),
            "festival" => Ok(EntityType::Festival),
            "item" => Ok(EntityType::Item),
            other => Err(ValidationError::UnknownEntityType(other.to_string())),
        }
    }
}

/// Parse an entity-type filter list.
///
/// `"all"` anywhere in the list (or an empty list) means no filter.
pub fn parse_entity_filter<S: AsRef<str>>(
    values: &[S],
) -> Result<Option<Vec<EntityType>>, ValidationError> {
    let mut types = Vec::with_capacity(values.len());
    for value in values {
        let value = value.as_ref();
        if value.trim().eq_ignore_ascii_case("all") {
            return Ok(None);
        }
        let parsed: EntityType = value.parse()?;
        if !types.contains(&parsed) {
            types.push(parsed);
        }
    }
    if types.is_empty() {
        Ok(None)
    } else {
        Ok(Some(types))
    }
}

/// Embedding modality; each modality has its own index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Text,
    Image,
}

impl Modality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Text => "text",
            Modality::Image => "image",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Modality {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Modality::Text),
            "image" => Ok(Modality::Image),
            other => Err(ValidationError::UnknownModality(other.to_string())),
        }
    }
}

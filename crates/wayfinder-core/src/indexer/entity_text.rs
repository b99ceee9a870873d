//! Embedding text and metadata excerpts for source records.
//!
//! Text layout (lines joined by `\n`, absent fields omitted):
//! ```text
//! Title: Dragon Bridge
//! Description: A bridge shaped like a dragon ...
//! Address: Nguyen Van Linh, Da Nang      (locations)
//! Date: 2024-06-01                       (festivals)
//! ```

use tracing::debug;
use wayfinder_types::entity::EntityType;
use wayfinder_types::metadata::{Metadata, MetadataValue};
use wayfinder_types::record::Record;

use crate::records::fields::first_text;
use crate::text::truncate_chars;

const TITLE_KEYS: &[&str] = &["title", "name", "Title", "Name"];
const DESCRIPTION_KEYS: &[&str] = &["description", "content", "Description"];
const ADDRESS_KEYS: &[&str] = &["address", "Address"];
const DATE_KEYS: &[&str] = &["date", "Date"];
const IMAGE_KEYS: &[&str] = &["image_url", "imageUrl", "image", "Image"];

/// Characters of the description used in the embedding text.
pub const TEXT_DESCRIPTION_CHARS: usize = 1000;

/// Characters of long fields kept in the index metadata.
pub const METADATA_EXCERPT_CHARS: usize = 500;

/// Build the text embedded for `record`. Empty when the record has no
/// usable fields.
pub fn entity_text(entity_type: EntityType, record: &Record) -> String {
    let mut lines = Vec::with_capacity(4);
    if let Some(title) = first_text(record, TITLE_KEYS) {
        lines.push(format!("Title: {title}"));
    }
    if let Some(description) = first_text(record, DESCRIPTION_KEYS) {
        lines.push(format!(
            "Description: {}",
            truncate_chars(&description, TEXT_DESCRIPTION_CHARS)
        ));
    }
    match entity_type {
        EntityType::Location => {
            if let Some(address) = first_text(record, ADDRESS_KEYS) {
                lines.push(format!("Address: {address}"));
            }
        }
        EntityType::Festival => {
            if let Some(date) = first_text(record, DATE_KEYS) {
                lines.push(format!("Date: {date}"));
            }
        }
        EntityType::Item => {}
    }
    lines.join("\n")
}

/// Metadata stored beside the vector of `record`.
pub fn entity_metadata(record: &Record) -> Metadata {
    let mut metadata = Metadata::new();
    let fields: [(&str, &[&str], Option<usize>); 6] = [
        ("title", TITLE_KEYS, None),
        ("description", &["description", "Description"], Some(METADATA_EXCERPT_CHARS)),
        ("content", &["content"], Some(METADATA_EXCERPT_CHARS)),
        ("image_url", IMAGE_KEYS, None),
        ("address", ADDRESS_KEYS, None),
        ("date", DATE_KEYS, None),
    ];
    for (key, candidates, limit) in fields {
        let Some(value) = first_text(record, candidates) else {
            continue;
        };
        let value = match limit {
            Some(max) => truncate_chars(&value, max).to_string(),
            None => value,
        };
        if let Err(e) = metadata.insert(key, MetadataValue::Text(value)) {
            debug!(key, error = %e, "Skipping metadata field");
        }
    }
    metadata
}

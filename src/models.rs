//! Records persisted by the [`Store`](crate::store::Store).
//!
//! Relationships are plain foreign-key ids; nothing holds a back-reference.
//! Timestamps are stored as Unix seconds and serialized as ISO 8601.

use serde::{Serialize, Serializer};

/// An uploaded source file and its full extracted text.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub id: i64,
    pub filename: String,
    pub content: String,
    #[serde(serialize_with = "serialize_ts")]
    pub created_at: i64,
    #[serde(serialize_with = "serialize_ts")]
    pub updated_at: i64,
    /// Paragraphs in ascending `order`. Empty while a placeholder.
    pub paragraphs: Vec<Paragraph>,
}

/// One segmenter unit of a document.
#[derive(Debug, Clone, Serialize)]
pub struct Paragraph {
    pub id: i64,
    pub file_id: i64,
    /// 1-based position within the document.
    pub order: i64,
    pub content: String,
    #[serde(serialize_with = "serialize_ts")]
    pub created_at: i64,
    #[serde(serialize_with = "serialize_ts")]
    pub updated_at: i64,
}

/// A user note attached to exactly one paragraph.
#[derive(Debug, Clone, Serialize)]
pub struct Note {
    pub id: i64,
    pub paragraph_id: i64,
    pub content: String,
    #[serde(serialize_with = "serialize_ts")]
    pub created_at: i64,
    #[serde(serialize_with = "serialize_ts")]
    pub updated_at: i64,
}

pub fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts.to_string())
}

fn serialize_ts<S: Serializer>(ts: &i64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_ts_iso(*ts))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamps_serialize_as_iso() {
        let note = Note {
            id: 1,
            paragraph_id: 2,
            content: "summary".to_string(),
            created_at: 0,
            updated_at: 86_400,
        };
        let json = serde_json::to_value(&note).unwrap();
        assert_eq!(json["created_at"], "1970-01-01T00:00:00Z");
        assert_eq!(json["updated_at"], "1970-01-02T00:00:00Z");
        assert_eq!(json["paragraph_id"], 2);
    }
}

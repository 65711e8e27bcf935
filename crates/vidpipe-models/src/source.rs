//! Trigger events and source objects.

use serde::{Deserialize, Serialize};

/// Object-finalize event as delivered by the storage trigger.
///
/// Mirrors the object resource the trigger posts: only `bucket` and `name`
/// are required, everything else is informational.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectFinalizedEvent {
    /// Bucket holding the object
    pub bucket: String,
    /// Full object path within the bucket
    pub name: String,
    /// Declared content type, if any
    #[serde(default)]
    pub content_type: Option<String>,
    /// Object size in bytes (string-encoded by the trigger)
    #[serde(default)]
    pub size: Option<String>,
    /// Object generation
    #[serde(default)]
    pub generation: Option<String>,
    /// Metadata generation
    #[serde(default)]
    pub metageneration: Option<String>,
}

/// The blob that triggered an invocation.
///
/// Immutable for the lifetime of one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceObject {
    /// Bucket holding the object
    pub bucket: String,
    /// Full object path within the bucket
    pub name: String,
    /// Declared content type (empty when the trigger supplied none)
    pub content_type: String,
    /// Final path segment of `name`
    pub file_name: String,
    /// `file_name` without its extension
    pub base_name: String,
    /// Extension after the last dot, as uploaded (not lowercased)
    pub extension: Option<String>,
    /// Directory part of `name`; `.` for objects at the bucket root
    pub directory: String,
}

impl SourceObject {
    /// Build a source object, inferring file name, base name and extension.
    pub fn new(
        bucket: impl Into<String>,
        name: impl Into<String>,
        content_type: impl Into<String>,
    ) -> Self {
        let name = name.into();
        let (directory, file_name) = split_object_path(&name);
        let (base_name, extension) = split_extension(&file_name);

        Self {
            bucket: bucket.into(),
            name,
            content_type: content_type.into(),
            file_name,
            base_name,
            extension,
            directory,
        }
    }

    /// Whether the declared content type is a video type.
    pub fn is_video(&self) -> bool {
        self.content_type
            .trim()
            .to_ascii_lowercase()
            .starts_with("video/")
    }
}

impl From<ObjectFinalizedEvent> for SourceObject {
    fn from(event: ObjectFinalizedEvent) -> Self {
        SourceObject::new(
            event.bucket,
            event.name,
            event.content_type.unwrap_or_default(),
        )
    }
}

/// Split an object path into `(directory, file_name)`.
///
/// Follows POSIX `dirname`/`basename`: trailing slashes are ignored, objects
/// at the root live in `.`, and a single leading slash yields `/`.
pub fn split_object_path(name: &str) -> (String, String) {
    let trimmed = name.trim_end_matches('/');
    if trimmed.is_empty() {
        let dir = if name.starts_with('/') { "/" } else { "." };
        return (dir.to_string(), String::new());
    }

    match trimmed.rfind('/') {
        Some(idx) => {
            let dir = trimmed[..idx].trim_end_matches('/');
            let dir = if dir.is_empty() { "/" } else { dir };
            (dir.to_string(), trimmed[idx + 1..].to_string())
        }
        None => (".".to_string(), trimmed.to_string()),
    }
}

/// Split a file name into `(base_name, extension)` at the last dot.
///
/// A leading dot does not start an extension (`.hidden` has none).
pub fn split_extension(file_name: &str) -> (String, Option<String>) {
    match file_name.rfind('.') {
        Some(idx) if idx > 0 => (
            file_name[..idx].to_string(),
            Some(file_name[idx + 1..].to_string()),
        ),
        _ => (file_name.to_string(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_object_path() {
        assert_eq!(
            split_object_path("media/temp/clip.mov"),
            ("media/temp".to_string(), "clip.mov".to_string())
        );
        assert_eq!(
            split_object_path("clip.mov"),
            (".".to_string(), "clip.mov".to_string())
        );
        assert_eq!(
            split_object_path("/clip.mov"),
            ("/".to_string(), "clip.mov".to_string())
        );
        assert_eq!(
            split_object_path("a//b/"),
            ("a".to_string(), "b".to_string())
        );
        assert_eq!(split_object_path(""), (".".to_string(), String::new()));
    }

    #[test]
    fn test_source_object_inference() {
        let source = SourceObject::new("bucket", "uploads/my.holiday.clip.MOV", "video/quicktime");
        assert_eq!(source.directory, "uploads");
        assert_eq!(source.file_name, "my.holiday.clip.MOV");
        assert_eq!(source.base_name, "my.holiday.clip");
        assert_eq!(source.extension.as_deref(), Some("MOV"));
        assert!(source.is_video());
    }

    #[test]
    fn test_no_extension() {
        let source = SourceObject::new("bucket", "raw/.hidden", "video/mp4");
        assert_eq!(source.base_name, ".hidden");
        assert_eq!(source.extension, None);

        let source = SourceObject::new("bucket", "raw/clip", "video/mp4");
        assert_eq!(source.base_name, "clip");
        assert_eq!(source.extension, None);
    }

    #[test]
    fn test_is_video() {
        assert!(SourceObject::new("b", "a.mp4", "Video/MP4").is_video());
        assert!(!SourceObject::new("b", "a.png", "image/png").is_video());
        assert!(!SourceObject::new("b", "a.mp4", "").is_video());
    }

    #[test]
    fn test_event_deserialization() {
        let json = r#"{
            "bucket": "media-bucket",
            "name": "media/temp/clip.mov",
            "contentType": "video/quicktime",
            "size": "1048576",
            "timeCreated": "2024-01-01T00:00:00Z"
        }"#;

        let event: ObjectFinalizedEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.content_type.as_deref(), Some("video/quicktime"));

        let source = SourceObject::from(event);
        assert_eq!(source.bucket, "media-bucket");
        assert_eq!(source.file_name, "clip.mov");
    }
}

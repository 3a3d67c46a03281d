//! Core data types: the durable image record and the ephemeral search shapes.

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use image::ImageFormat;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque, time-ordered image identifier (UUID v7).
///
/// Ordering follows creation time, and the creation timestamp is recovered
/// from the id itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageId(Uuid);

impl ImageId {
    /// Generate a fresh id for the current instant.
    pub fn generate() -> Self {
        Self(Uuid::now_v7())
    }

    /// Wrap an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// The underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Creation time embedded in the id.
    ///
    /// `None` for ids that were not generated as UUID v7.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        let (secs, nanos) = self.0.get_timestamp()?.to_unix();
        DateTime::from_timestamp(secs as i64, nanos)
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for ImageId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// The image formats Mosaic accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Gif,
    Jpeg,
    Png,
    #[serde(rename = "webp")]
    WebP,
}

impl MediaType {
    /// Map a decoded format onto the accepted set.
    pub fn from_format(format: ImageFormat) -> Option<Self> {
        match format {
            ImageFormat::Gif => Some(Self::Gif),
            ImageFormat::Jpeg => Some(Self::Jpeg),
            ImageFormat::Png => Some(Self::Png),
            ImageFormat::WebP => Some(Self::WebP),
            _ => None,
        }
    }

    /// Infer from a file extension (case-insensitive, without the dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "gif" => Some(Self::Gif),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "webp" => Some(Self::WebP),
            _ => None,
        }
    }

    /// Stored file extension, including the leading dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Gif => ".gif",
            Self::Jpeg => ".jpg",
            Self::Png => ".png",
            Self::WebP => ".webp",
        }
    }

    /// MIME type used when writing to object storage.
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Gif => "image/gif",
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::WebP => "image/webp",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Gif => "gif",
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::WebP => "webp",
        };
        f.write_str(name)
    }
}

/// Processing status of an image record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImageStatus {
    /// Created, not yet uploaded or analyzed
    #[default]
    Pending,
    /// Bytes are in object storage, analysis has not completed
    Uploaded,
    /// Analyzed and confirmed present in object storage
    Complete,
    /// A fetch, upload, or analysis step failed
    Error,
}

/// Where an image's bytes come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "location", rename_all = "snake_case")]
pub enum SourceReference {
    /// Remote URI fetched over HTTP(S)
    Remote(String),
    /// Path on the local filesystem
    Local(PathBuf),
    /// Already in object storage under the record's file name
    Stored,
}

impl fmt::Display for SourceReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote(url) => f.write_str(url),
            Self::Local(path) => write!(f, "{}", path.display()),
            Self::Stored => f.write_str("<stored>"),
        }
    }
}

/// The durable, versioned image entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    // === Identity ===
    pub id: ImageId,

    /// Changes whenever a content-significant field changes
    pub version_id: Uuid,

    // === Display metadata ===
    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub alt_text: String,

    #[serde(default)]
    pub tags: BTreeSet<String>,

    // === Storage ===
    pub source: SourceReference,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_type: Option<MediaType>,

    /// `id` + extension of `media_type`; the object-storage key
    #[serde(default)]
    pub file_name: String,

    #[serde(default)]
    pub file_size: u64,

    // === Fingerprints ===
    /// BLAKE3 hex digest of the raw bytes
    #[serde(default)]
    pub content_hash: String,

    /// Text form of the perceptual hash; empty until analyzed
    #[serde(default)]
    pub perceptual_hash: String,

    // === Dimensions ===
    #[serde(default)]
    pub width: u32,

    #[serde(default)]
    pub height: u32,

    #[serde(default)]
    pub aspect_ratio: f64,

    pub status: ImageStatus,

    pub updated_at: DateTime<Utc>,
}

impl ImageRecord {
    /// Create a PENDING record with fresh identifiers.
    pub fn new(source: SourceReference) -> Self {
        Self {
            id: ImageId::generate(),
            version_id: Uuid::now_v7(),
            title: String::new(),
            alt_text: String::new(),
            tags: BTreeSet::new(),
            source,
            media_type: None,
            file_name: String::new(),
            file_size: 0,
            content_hash: String::new(),
            perceptual_hash: String::new(),
            width: 0,
            height: 0,
            aspect_ratio: 0.0,
            status: ImageStatus::Pending,
            updated_at: Utc::now(),
        }
    }

    /// Creation time, taken from the id.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.id.created_at()
    }

    /// Human-readable origin for logs and error messages.
    pub fn source_label(&self) -> String {
        match &self.source {
            SourceReference::Stored if !self.file_name.is_empty() => self.file_name.clone(),
            SourceReference::Stored => self.id.to_string(),
            other => other.to_string(),
        }
    }

    /// Object-storage key for an id and media type.
    pub fn file_name_for(id: &ImageId, media_type: MediaType) -> String {
        format!("{}{}", id, media_type.extension())
    }

    /// Set the media type and keep `file_name` consistent with it.
    pub fn set_media_type(&mut self, media_type: MediaType) {
        self.media_type = Some(media_type);
        self.file_name = Self::file_name_for(&self.id, media_type);
    }

    /// Check the fields that `Complete` requires.
    pub fn check_complete(&self) -> Result<(), String> {
        if self.file_size == 0 {
            return Err("file_size is zero".into());
        }
        if self.content_hash.is_empty() {
            return Err("content_hash is empty".into());
        }
        if self.perceptual_hash.is_empty() {
            return Err("perceptual_hash is empty".into());
        }
        match self.media_type {
            Some(media_type) if self.file_name == Self::file_name_for(&self.id, media_type) => {
                Ok(())
            }
            Some(_) => Err("file_name does not match id and media_type".into()),
            None => Err("media_type is not set".into()),
        }
    }

    /// The fingerprint index entry for this record, once it has a hash.
    pub fn fingerprint(&self) -> Option<FingerprintEntry> {
        if self.perceptual_hash.is_empty() {
            return None;
        }
        Some(FingerprintEntry {
            id: self.id,
            perceptual_hash: self.perceptual_hash.clone(),
        })
    }

    /// True if every content-significant field matches `other`.
    pub fn same_content(&self, other: &Self) -> bool {
        self.title == other.title
            && self.alt_text == other.alt_text
            && self.tags == other.tags
            && self.source == other.source
            && self.media_type == other.media_type
            && self.file_name == other.file_name
            && self.file_size == other.file_size
            && self.content_hash == other.content_hash
            && self.perceptual_hash == other.perceptual_hash
            && self.width == other.width
            && self.height == other.height
            && self.status == other.status
    }

    /// Forget everything derived from the previous object's bytes.
    pub fn clear_derived(&mut self) {
        self.file_size = 0;
        self.content_hash.clear();
        self.perceptual_hash.clear();
        self.width = 0;
        self.height = 0;
        self.aspect_ratio = 0.0;
    }

    /// Issue a new version id and refresh `updated_at`.
    pub fn bump_version(&mut self) {
        self.version_id = Uuid::now_v7();
        self.updated_at = Utc::now();
    }
}

/// Input for creating a new image.
#[derive(Debug, Clone)]
pub struct NewImage {
    pub source: SourceReference,
    pub title: String,
    pub alt_text: String,
    pub tags: BTreeSet<String>,
}

impl NewImage {
    /// A new image with no display metadata.
    pub fn from_source(source: SourceReference) -> Self {
        Self {
            source,
            title: String::new(),
            alt_text: String::new(),
            tags: BTreeSet::new(),
        }
    }
}

/// A partial update to an existing image. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct ImageUpdate {
    pub title: Option<String>,
    pub alt_text: Option<String>,
    pub tags: Option<BTreeSet<String>>,
    /// A new source re-runs ingestion
    pub source: Option<SourceReference>,
}

/// One entry of the fingerprint index: an id and its hash text.
///
/// The text is kept as stored; it is only parsed during a scan so that a
/// corrupt entry can be skipped without failing the read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FingerprintEntry {
    pub id: ImageId,
    pub perceptual_hash: String,
}

/// A search hit annotated with its distance from the query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistanceResult {
    pub id: ImageId,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageRecord>,

    /// Hamming distance from the query hash (0..=256)
    pub distance: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_time_ordered() {
        let a = ImageId::generate();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = ImageId::generate();
        assert!(a < b);
        assert!(a.to_string() < b.to_string());
    }

    #[test]
    fn test_id_carries_creation_time() {
        let before = Utc::now().timestamp_millis();
        let id = ImageId::generate();
        let created = id.created_at().unwrap().timestamp_millis();
        assert!(created >= before - 1);
        assert!(created <= Utc::now().timestamp_millis());
    }

    #[test]
    fn test_id_parse_round_trip() {
        let id = ImageId::generate();
        let parsed: ImageId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert!("not-a-uuid".parse::<ImageId>().is_err());
    }

    #[test]
    fn test_media_type_mapping() {
        assert_eq!(MediaType::from_format(ImageFormat::Png), Some(MediaType::Png));
        assert_eq!(MediaType::from_format(ImageFormat::WebP), Some(MediaType::WebP));
        assert_eq!(MediaType::from_format(ImageFormat::Bmp), None);
        assert_eq!(MediaType::from_extension("JPEG"), Some(MediaType::Jpeg));
        assert_eq!(MediaType::Jpeg.extension(), ".jpg");
        assert_eq!(MediaType::WebP.content_type(), "image/webp");
    }

    #[test]
    fn test_set_media_type_keeps_file_name_consistent() {
        let mut record = ImageRecord::new(SourceReference::Stored);
        record.set_media_type(MediaType::Png);
        assert_eq!(record.file_name, format!("{}.png", record.id));
        record.set_media_type(MediaType::Gif);
        assert_eq!(record.file_name, format!("{}.gif", record.id));
    }

    #[test]
    fn test_check_complete() {
        let mut record = ImageRecord::new(SourceReference::Stored);
        assert!(record.check_complete().is_err());

        record.set_media_type(MediaType::Png);
        record.file_size = 10;
        record.content_hash = "abc".into();
        assert!(record.check_complete().unwrap_err().contains("perceptual_hash"));

        record.perceptual_hash = "0:0:0:0".into();
        assert!(record.check_complete().is_ok());

        record.file_name = "other.png".into();
        assert!(record.check_complete().is_err());
    }

    #[test]
    fn test_fingerprint_only_when_hashed() {
        let mut record = ImageRecord::new(SourceReference::Stored);
        assert!(record.fingerprint().is_none());
        record.perceptual_hash = "1:2:3:4".into();
        let entry = record.fingerprint().unwrap();
        assert_eq!(entry.id, record.id);
        assert_eq!(entry.perceptual_hash, "1:2:3:4");
    }

    #[test]
    fn test_clear_derived_drops_out_of_index() {
        let mut record = ImageRecord::new(SourceReference::Stored);
        record.set_media_type(MediaType::Png);
        record.file_size = 10;
        record.content_hash = "abc".into();
        record.perceptual_hash = "1:2:3:4".into();
        (record.width, record.height, record.aspect_ratio) = (4, 2, 2.0);

        record.clear_derived();
        assert!(record.fingerprint().is_none());
        assert!(record.content_hash.is_empty());
        assert_eq!((record.file_size, record.width, record.height), (0, 0, 0));
        assert_eq!(record.media_type, Some(MediaType::Png));
    }

    #[test]
    fn test_status_serializes_uppercase() {
        let json = serde_json::to_string(&ImageStatus::Complete).unwrap();
        assert_eq!(json, "\"COMPLETE\"");
    }

    #[test]
    fn test_record_json_round_trip() {
        let mut record = ImageRecord::new(SourceReference::Remote("https://x/y.png".into()));
        record.tags.insert("cat".into());
        let json = serde_json::to_string(&record).unwrap();
        let back: ImageRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}

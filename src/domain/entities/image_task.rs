use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One stored image produced by a job: the original upload or a derived variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ImageTask {
    pub id: Uuid,
    pub task_id: Uuid,
    pub user_id: Uuid,
    pub img_link: String,
    pub created_at: DateTime<Utc>,
}

/// History entry: an image row together with its measurements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageTaskWithStats {
    #[serde(flatten)]
    pub image: ImageTask,
    pub stats: Option<ImageStats>,
}

/// Measurements recorded for every stored image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImageStats {
    pub width: u32,
    pub height: u32,
    pub size: u64,
    /// Seconds spent in the transform itself; zero for the original.
    pub processing_time: f64,
}

/// An ImageTask row and its Stats row, inserted together.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRecord {
    pub task_id: Uuid,
    pub user_id: Uuid,
    pub img_link: String,
    pub stats: ImageStats,
}

impl ImageRecord {
    pub fn new(task_id: Uuid, user_id: Uuid, img_link: impl Into<String>, stats: ImageStats) -> Self {
        ImageRecord {
            task_id,
            user_id,
            img_link: img_link.into(),
            stats,
        }
    }
}

/// The four image forms a job produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    Original,
    Rotated,
    Gray,
    Scaled,
}

impl Variant {
    pub const DERIVED: [Variant; 3] = [Variant::Rotated, Variant::Gray, Variant::Scaled];

    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Original => "original",
            Variant::Rotated => "rotated",
            Variant::Gray => "gray",
            Variant::Scaled => "scaled",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Object keys for each variant of one uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantFilenames {
    pub original: String,
    pub rotated: String,
    pub gray: String,
    pub scaled: String,
}

impl VariantFilenames {
    /// `photo.PNG` becomes `photo_original.png`, `photo_rotated.png`, ...
    pub fn from_upload(file_name: &str) -> Self {
        let path = Path::new(file_name);
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("image");
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        let name = |variant: Variant| {
            if extension.is_empty() {
                format!("{stem}_{variant}")
            } else {
                format!("{stem}_{variant}.{extension}")
            }
        };

        VariantFilenames {
            original: name(Variant::Original),
            rotated: name(Variant::Rotated),
            gray: name(Variant::Gray),
            scaled: name(Variant::Scaled),
        }
    }

    pub fn get(&self, variant: Variant) -> &str {
        match variant {
            Variant::Original => &self.original,
            Variant::Rotated => &self.rotated,
            Variant::Gray => &self.gray,
            Variant::Scaled => &self.scaled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filenames_keep_stem_and_lowercase_extension() {
        let names = VariantFilenames::from_upload("holiday.photo.JPG");
        assert_eq!(names.original, "holiday.photo_original.jpg");
        assert_eq!(names.rotated, "holiday.photo_rotated.jpg");
        assert_eq!(names.gray, "holiday.photo_gray.jpg");
        assert_eq!(names.scaled, "holiday.photo_scaled.jpg");
    }

    #[test]
    fn filenames_drop_client_directories() {
        let names = VariantFilenames::from_upload("uploads/cat.png");
        assert_eq!(names.get(Variant::Original), "cat_original.png");
    }

    #[test]
    fn filenames_without_extension() {
        let names = VariantFilenames::from_upload("scan");
        assert_eq!(names.scaled, "scan_scaled");
    }

    #[test]
    fn variants_serialize_lowercase() {
        assert_eq!(serde_json::to_string(&Variant::Gray).unwrap(), "\"gray\"");
    }
}

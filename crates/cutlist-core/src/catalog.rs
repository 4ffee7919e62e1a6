//! Media reference catalog.
//!
//! Media import and probing happen outside the core. The core only ever
//! looks descriptors up by id; it never opens source files itself.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::time::RationalTime;

/// Frame size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const HD_1080: Self = Self::new(1920, 1080);

    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    #[inline]
    pub fn is_positive(self) -> bool {
        self.width > 0 && self.height > 0
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self::HD_1080
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Probed codec names, e.g. `h264` / `aac`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaCodecs {
    pub video: Option<String>,
    pub audio: Option<String>,
}

/// Immutable description of one imported media file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaDescriptor {
    /// Catalog id that clips reference.
    pub id: String,
    /// Location handed to the renderer.
    pub path: PathBuf,
    /// Full source duration.
    pub duration: RationalTime,
    pub resolution: Resolution,
    #[serde(default)]
    pub codecs: MediaCodecs,
}

impl MediaDescriptor {
    pub fn new(id: impl Into<String>, path: impl Into<PathBuf>, duration: RationalTime) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            duration,
            resolution: Resolution::default(),
            codecs: MediaCodecs::default(),
        }
    }

    pub fn with_resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn with_codecs(mut self, video: Option<&str>, audio: Option<&str>) -> Self {
        self.codecs = MediaCodecs {
            video: video.map(str::to_string),
            audio: audio.map(str::to_string),
        };
        self
    }

    pub fn has_video(&self) -> bool {
        self.codecs.video.is_some()
    }

    pub fn has_audio(&self) -> bool {
        self.codecs.audio.is_some()
    }
}

/// Read-only access to media descriptors.
pub trait MediaCatalog: Send + Sync {
    /// Look up a descriptor by id.
    fn descriptor(&self, id: &str) -> Option<MediaDescriptor>;

    fn contains(&self, id: &str) -> bool {
        self.descriptor(id).is_some()
    }

    /// Source duration of `id`, if known.
    fn source_duration(&self, id: &str) -> Option<RationalTime> {
        self.descriptor(id).map(|d| d.duration)
    }
}

/// Catalog backed by a map, used by the CLI and tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    entries: HashMap<String, MediaDescriptor>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a descriptor.
    pub fn insert(&mut self, descriptor: MediaDescriptor) {
        self.entries.insert(descriptor.id.clone(), descriptor);
    }

    pub fn with(mut self, descriptor: MediaDescriptor) -> Self {
        self.insert(descriptor);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parse a JSON array of descriptors.
    pub fn from_json(data: &[u8]) -> Result<Self, serde_json::Error> {
        let descriptors: Vec<MediaDescriptor> = serde_json::from_slice(data)?;
        Ok(descriptors.into_iter().collect())
    }

    /// Load a JSON array of descriptors from disk.
    pub fn load_from_file(path: &Path) -> crate::Result<Self> {
        let data = std::fs::read(path)?;
        Ok(Self::from_json(&data)?)
    }
}

impl FromIterator<MediaDescriptor> for InMemoryCatalog {
    fn from_iter<I: IntoIterator<Item = MediaDescriptor>>(iter: I) -> Self {
        let mut catalog = Self::new();
        for descriptor in iter {
            catalog.insert(descriptor);
        }
        catalog
    }
}

impl MediaCatalog for InMemoryCatalog {
    fn descriptor(&self, id: &str) -> Option<MediaDescriptor> {
        self.entries.get(id).cloned()
    }
}

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::source::Source;
use crate::ConfigError;

/// The shape of an input file, which decides the adapter used to read it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    Foursquare,
    GooglePlaces,
    Osm,
    TourismSite,
    /// A document previously written by `nbdb-cli merge`.
    Merged,
}

impl InputKind {
    /// The source every record of this kind is attributed to. `Merged`
    /// documents carry their own per-record provenance.
    #[must_use]
    pub fn source(self) -> Option<Source> {
        match self {
            InputKind::Foursquare => Some(Source::Foursquare),
            InputKind::GooglePlaces => Some(Source::GooglePlaces),
            InputKind::Osm => Some(Source::Osm),
            InputKind::TourismSite => Some(Source::TourismSite),
            InputKind::Merged => None,
        }
    }
}

impl std::fmt::Display for InputKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.source() {
            Some(source) => write!(f, "{source}"),
            None => write!(f, "merged"),
        }
    }
}

impl std::str::FromStr for InputKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("merged") {
            return Ok(InputKind::Merged);
        }
        let source: Source = s.parse()?;
        Ok(match source {
            Source::GooglePlaces => InputKind::GooglePlaces,
            Source::Foursquare => InputKind::Foursquare,
            Source::TourismSite => InputKind::TourismSite,
            Source::Osm => InputKind::Osm,
        })
    }
}

/// One input declared in a manifest or on the command line.
///
/// `path` may name a single JSON file or a directory, in which case every
/// `*.json` file directly inside it is read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputEntry {
    pub kind: InputKind,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    pub inputs: Vec<InputEntry>,
    /// Fields whose primary value should come from a specific source when
    /// that source supplied one, e.g. `website: google_places`.
    #[serde(default)]
    pub field_preferences: BTreeMap<String, Source>,
}

/// Load and validate an input manifest from a YAML file.
///
/// Relative input paths are resolved against the manifest's directory.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_manifest(path: &Path) -> Result<Manifest, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ManifestIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let mut manifest: Manifest = serde_yaml::from_str(&content)?;

    let base = path.parent().unwrap_or_else(|| Path::new(""));
    for input in &mut manifest.inputs {
        if input.path.is_relative() {
            input.path = base.join(&input.path);
        }
    }

    validate_manifest(&manifest)?;

    Ok(manifest)
}

fn validate_manifest(manifest: &Manifest) -> Result<(), ConfigError> {
    if manifest.inputs.is_empty() {
        return Err(ConfigError::Validation(
            "manifest must list at least one input".to_string(),
        ));
    }

    let mut seen_paths = HashSet::new();
    for input in &manifest.inputs {
        if input.path.as_os_str().is_empty() {
            return Err(ConfigError::Validation(format!(
                "{} input has an empty path",
                input.kind
            )));
        }
        if !seen_paths.insert(&input.path) {
            return Err(ConfigError::Validation(format!(
                "duplicate input path: '{}'",
                input.path.display()
            )));
        }
    }

    for field in manifest.field_preferences.keys() {
        if field.trim().is_empty() {
            return Err(ConfigError::Validation(
                "field preference names must be non-empty".to_string(),
            ));
        }
    }

    Ok(())
}

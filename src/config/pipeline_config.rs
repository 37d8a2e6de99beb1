use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core::dataset::ArtifactNaming;
use crate::error::{PipelineError, PipelineResult};

/// Camera intrinsics used for the T-LESS primesense renderings
pub const DEFAULT_INTRINSIC_MATRIX: [[f64; 3]; 3] = [
    [572.41140, 0.0, 325.26110],
    [0.0, 573.57043, 242.04899],
    [0.0, 0.0, 1.0],
];

pub const DEFAULT_SEED: u64 = 69;
pub const DEFAULT_SPLIT_FRACTION: f64 = 0.15;
pub const NUM_CLASSES: u32 = 30;

/// An external program that implements one opaque pipeline stage.
///
/// Arguments may contain the placeholders `{root_dir}`, `{background_dir}`,
/// `{context}` and `{epochs}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalCommand {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

/// Pipeline configuration containing every value the driver needs
///
/// Defaults are the values used for the T-LESS training runs.
/// Fields missing from a config file fall back to those defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Dataset root containing the sensor directories
    pub root_dir: PathBuf,

    /// Background images pasted behind rendered objects
    pub background_dir: PathBuf,

    /// Row-major 3x3 camera matrix
    pub intrinsic_matrix: [[f64; 3]; 3],

    /// Class directory name to class id
    pub classes: BTreeMap<String, u32>,

    pub sensors_train: Vec<String>,
    pub sensors_test: Vec<String>,

    /// Fraction of shuffled indices assigned to the train prefix
    pub split_fraction: f64,
    pub seed: u64,

    /// Suffix a file name must end with to count as an image
    pub image_extension: String,

    pub artifact_naming: ArtifactNaming,

    /// Fail instead of warn when discovery finds nothing
    pub require_images: bool,

    pub correspondence_epochs: u32,
    pub refinement_epochs: u32,

    /// External commands keyed by stage name
    pub stages: BTreeMap<String, ExternalCommand>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("datasets/t-less"),
            background_dir: PathBuf::from("datasets/COCO/val2017"),
            intrinsic_matrix: DEFAULT_INTRINSIC_MATRIX,
            classes: default_classes(),
            sensors_train: vec![
                "train_primesense".to_string(),
                "train_kinect".to_string(),
                "train_canon".to_string(),
            ],
            sensors_test: vec![
                "test_primesense".to_string(),
                "test_kinect".to_string(),
                "test_canon".to_string(),
            ],
            split_fraction: DEFAULT_SPLIT_FRACTION,
            seed: DEFAULT_SEED,
            image_extension: ".jpg".to_string(),
            artifact_naming: ArtifactNaming::default(),
            require_images: false,
            correspondence_epochs: 20,
            refinement_epochs: 10,
            stages: BTreeMap::new(),
        }
    }
}

/// T-LESS object classes `"01"..="30"` mapped to ids `1..=30`
pub fn default_classes() -> BTreeMap<String, u32> {
    (1..=NUM_CLASSES).map(|i| (format!("{:02}", i), i)).collect()
}

impl PipelineConfig {
    /// Per-user config file location (e.g. `~/.config/tless-pipeline/config.json`)
    pub fn default_config_path() -> Option<PathBuf> {
        ProjectDirs::from("org", "tless", "tless-pipeline")
            .map(|dirs| dirs.config_dir().join("config.json"))
    }

    /// Load configuration from an explicit file, or from the per-user file,
    /// or fall back to defaults.
    ///
    /// An explicit path must exist and parse. The per-user file is optional
    /// and a corrupt one is ignored with a warning.
    pub fn load(explicit: Option<&Path>) -> PipelineResult<Self> {
        if let Some(path) = explicit {
            info!("Loading configuration from: {:?}", path);
            return Self::load_from(path);
        }

        let Some(path) = Self::default_config_path() else {
            warn!("Could not determine config directory. Using defaults.");
            return Ok(Self::default());
        };

        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<PipelineConfig>(&contents) {
                Ok(config) => {
                    info!("Loaded configuration from: {:?}", path);
                    Ok(config)
                }
                Err(e) => {
                    warn!("Failed to parse config file {:?}: {}. Using defaults.", path, e);
                    Ok(Self::default())
                }
            },
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("Failed to read config file {:?}: {}. Using defaults.", path, e);
                } else {
                    info!("No config file found. Using defaults.");
                }
                Ok(Self::default())
            }
        }
    }

    pub fn load_from(path: &Path) -> PipelineResult<Self> {
        let contents = fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
        serde_json::from_str(&contents).map_err(|e| PipelineError::serialization(path, e))
    }

    /// Write the configuration as pretty JSON, creating parent directories
    pub fn save(&self, path: &Path) -> PipelineResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
            }
        }
        let json =
            serde_json::to_string_pretty(self).map_err(|e| PipelineError::serialization(path, e))?;
        fs::write(path, json).map_err(|e| PipelineError::io(path, e))?;
        info!("Configuration saved to: {:?}", path);
        Ok(())
    }

    pub fn validate(&self) -> PipelineResult<()> {
        if self.sensors_train.is_empty() {
            return Err(invalid("sensors_train must not be empty"));
        }
        if self.sensors_test.is_empty() {
            return Err(invalid("sensors_test must not be empty"));
        }
        if !(0.0..=1.0).contains(&self.split_fraction) {
            return Err(invalid(format!(
                "split_fraction must be within [0, 1], got {}",
                self.split_fraction
            )));
        }
        if self.classes.is_empty() {
            return Err(invalid("classes must not be empty"));
        }

        let ext = self.image_extension.trim_start_matches('.');
        if ext.is_empty() {
            return Err(invalid("image_extension must not be empty"));
        }
        if image::ImageFormat::from_extension(ext).is_none() {
            return Err(invalid(format!(
                "image_extension {:?} is not a recognized image format",
                self.image_extension
            )));
        }

        Ok(())
    }

    /// Image extension normalized to a dotted suffix, `jpg` → `.jpg`
    pub fn image_suffix(&self) -> String {
        format!(".{}", self.image_extension.trim_start_matches('.'))
    }

    /// Epoch count handed to a training stage, if it takes one
    pub fn epochs_for(&self, stage: &str) -> Option<u32> {
        match stage {
            "train_correspondence_block" => Some(self.correspondence_epochs),
            "train_pose_refinement" => Some(self.refinement_epochs),
            _ => None,
        }
    }
}

fn invalid(msg: impl Into<String>) -> PipelineError {
    PipelineError::InvalidConfig(msg.into())
}

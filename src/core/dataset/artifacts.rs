use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::split::IndexSplit;
use crate::error::{PipelineError, PipelineResult};

pub const ALL_IMAGES: &str = "all_images_adr";
pub const TRAIN_INDICES: &str = "train_images_indices";
pub const TEST_INDICES: &str = "test_images_indices";
pub const ALL_TEST_IMAGES: &str = "all_test_images_adr";

const ARTIFACT_EXTENSION: &str = "json";

/// How artifact file names are derived from the dataset root
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactNaming {
    /// `root/all_images_adr.json`
    #[default]
    Joined,
    /// `rootall_images_adr.json`, the raw string concatenation older
    /// consumers expect
    Concatenated,
}

/// Locations of the four persisted index artifacts for one dataset root
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactPaths {
    pub all_images: PathBuf,
    pub train_indices: PathBuf,
    pub test_indices: PathBuf,
    pub all_test_images: PathBuf,
}

impl ArtifactPaths {
    pub fn new(root: &Path, naming: ArtifactNaming) -> Self {
        Self {
            all_images: artifact_path(root, ALL_IMAGES, naming),
            train_indices: artifact_path(root, TRAIN_INDICES, naming),
            test_indices: artifact_path(root, TEST_INDICES, naming),
            all_test_images: artifact_path(root, ALL_TEST_IMAGES, naming),
        }
    }
}

fn artifact_path(root: &Path, stem: &str, naming: ArtifactNaming) -> PathBuf {
    let file_name = format!("{}.{}", stem, ARTIFACT_EXTENSION);
    match naming {
        ArtifactNaming::Joined => root.join(file_name),
        ArtifactNaming::Concatenated => {
            let mut raw = OsString::from(root.as_os_str());
            raw.push(file_name);
            PathBuf::from(raw)
        }
    }
}

/// Serialize `obj` as JSON to `path`.
///
/// The JSON is written to a sibling `.tmp` file and renamed over `path`, so
/// a failed save leaves any existing artifact untouched.
pub fn save_obj<T: Serialize + ?Sized>(obj: &T, path: &Path) -> PipelineResult<()> {
    let tmp_path = tmp_path_for(path);
    if let Err(e) = write_json(obj, path, &tmp_path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }
    fs::rename(&tmp_path, path).map_err(|e| PipelineError::io(path, e))
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut raw = OsString::from(path.as_os_str());
    raw.push(".tmp");
    PathBuf::from(raw)
}

fn write_json<T: Serialize + ?Sized>(
    obj: &T,
    path: &Path,
    tmp_path: &Path,
) -> PipelineResult<()> {
    let file = File::create(tmp_path).map_err(|e| PipelineError::io(tmp_path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, obj).map_err(|e| PipelineError::serialization(path, e))?;
    writer.flush().map_err(|e| PipelineError::io(tmp_path, e))?;
    Ok(())
}

pub fn load_obj<T: DeserializeOwned>(path: &Path) -> PipelineResult<T> {
    let file = File::open(path).map_err(|e| PipelineError::io(path, e))?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|e| PipelineError::serialization(path, e))
}

/// The training image list together with its train/test index split
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexArtifacts {
    pub images: Vec<PathBuf>,
    pub split: IndexSplit,
}

impl IndexArtifacts {
    pub fn save(&self, paths: &ArtifactPaths) -> PipelineResult<()> {
        save_obj(&self.images, &paths.all_images)?;
        save_obj(&self.split.train, &paths.train_indices)?;
        save_obj(&self.split.test, &paths.test_indices)?;
        info!(
            "Saved {} image paths ({} train / {} test indices) to {:?}",
            self.images.len(),
            self.split.train.len(),
            self.split.test.len(),
            paths.all_images
        );
        Ok(())
    }

    /// Reload the three training artifacts and check the split invariant
    pub fn load(paths: &ArtifactPaths) -> PipelineResult<Self> {
        let images: Vec<PathBuf> = load_obj(&paths.all_images)?;
        let split = IndexSplit {
            train: load_obj(&paths.train_indices)?,
            test: load_obj(&paths.test_indices)?,
        };
        split.verify(images.len())?;
        Ok(Self { images, split })
    }
}

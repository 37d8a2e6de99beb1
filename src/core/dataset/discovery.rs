use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::error::{PipelineError, PipelineResult};

/// Name of the per-scene directory holding color frames
pub const RGB_DIR: &str = "rgb";

/// Collect image paths laid out as `root/<sensor>/<scene>/rgb/**/*<suffix>`.
///
/// Sensors are visited in the given order, scene directories by file name,
/// and each `rgb` tree top-down with a directory's files before its
/// subdirectories. A missing sensor directory contributes nothing; a missing
/// root is an error.
pub fn collect_images(
    root: &Path,
    sensors: &[String],
    suffix: &str,
) -> PipelineResult<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(PipelineError::RootNotFound(root.to_path_buf()));
    }

    let mut images = Vec::new();
    for sensor in sensors {
        let sensor_dir = root.join(sensor);
        let before = images.len();
        collect_sensor_images(&sensor_dir, suffix, &mut images)?;
        info!("Found {} images for sensor {:?}", images.len() - before, sensor);
    }

    info!("Found {} images in {:?}", images.len(), root);
    Ok(images)
}

fn collect_sensor_images(
    sensor_dir: &Path,
    suffix: &str,
    out: &mut Vec<PathBuf>,
) -> PipelineResult<()> {
    let entries = match fs::read_dir(sensor_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("Sensor directory not found: {:?}", sensor_dir);
            return Ok(());
        }
        Err(e) => return Err(PipelineError::io(sensor_dir, e)),
    };

    let mut scene_dirs = entries
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| PipelineError::io(sensor_dir, e))?;
    scene_dirs.sort();

    for scene_dir in scene_dirs {
        let rgb_dir = scene_dir.join(RGB_DIR);
        if !rgb_dir.is_dir() {
            debug!("Skipping {:?}: no rgb directory", scene_dir);
            continue;
        }
        walk_rgb_dir(&rgb_dir, suffix, out)?;
    }
    Ok(())
}

fn walk_rgb_dir(rgb_dir: &Path, suffix: &str, out: &mut Vec<PathBuf>) -> PipelineResult<()> {
    for entry in WalkDir::new(rgb_dir).sort_by(files_before_dirs) {
        let entry = entry?;
        if entry.file_type().is_dir() {
            continue;
        }
        // Artifacts store paths as JSON strings
        let Some(path) = entry.path().to_str() else {
            warn!("Skipping non UTF-8 path: {:?}", entry.path());
            continue;
        };
        if path.ends_with(suffix) {
            out.push(entry.into_path());
        }
    }
    Ok(())
}

fn files_before_dirs(a: &DirEntry, b: &DirEntry) -> Ordering {
    a.file_type()
        .is_dir()
        .cmp(&b.file_type().is_dir())
        .then_with(|| a.file_name().cmp(b.file_name()))
}

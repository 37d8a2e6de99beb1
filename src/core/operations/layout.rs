use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{PipelineError, PipelineResult};

/// Per-class output directories, relative to `root/<class>`
pub const CLASS_SUBDIRS: &[&str] = &[
    "predicted_pose",
    "ground_truth/IDmasks",
    "ground_truth/Umasks",
    "ground_truth/Vmasks",
    "changed_background",
    "pose_refinement/real",
    "pose_refinement/rendered",
];

/// Create a directory and all of its parents. Existing directories are fine.
pub fn ensure_dir(path: &Path) -> PipelineResult<()> {
    fs::create_dir_all(path).map_err(|e| PipelineError::io(path, e))
}

/// Create the output tree the ground-truth, training and refinement stages
/// write into, one subtree per class.
///
/// # Returns
/// * The class directories, in class-name order
pub fn dataset_dir_structure<'a, I>(root: &Path, classes: I) -> PipelineResult<Vec<PathBuf>>
where
    I: IntoIterator<Item = &'a String>,
{
    let mut class_dirs = Vec::new();
    for class in classes {
        let class_dir = root.join(class);
        for subdir in CLASS_SUBDIRS {
            ensure_dir(&class_dir.join(subdir))?;
        }
        debug!("Prepared layout for class {:?}", class);
        class_dirs.push(class_dir);
    }

    info!("Prepared output layout for {} classes under {:?}", class_dirs.len(), root);
    Ok(class_dirs)
}

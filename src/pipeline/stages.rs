use std::path::PathBuf;

use tracing::warn;

use super::{
    PipelineContext, Stage, StageOutcome, DATASET_DIR_STRUCTURE, INDEX_TEST_IMAGES,
    INDEX_TRAIN_IMAGES,
};
use crate::config::PipelineConfig;
use crate::core::dataset::{collect_images, save_obj, split_indices, DatasetSplit, IndexArtifacts};
use crate::core::operations::dataset_dir_structure;
use crate::error::{PipelineError, PipelineResult};

/// Discover the images of one sensor set, enforcing `require_images`
fn discover(config: &PipelineConfig, split: DatasetSplit) -> PipelineResult<Vec<PathBuf>> {
    let sensors = match split {
        DatasetSplit::Train => &config.sensors_train,
        DatasetSplit::Test => &config.sensors_test,
    };
    let suffix = config.image_suffix();
    let images = collect_images(&config.root_dir, sensors, &suffix)?;

    if images.is_empty() {
        if config.require_images {
            return Err(PipelineError::NoImages {
                root: config.root_dir.clone(),
                extension: suffix,
            });
        }
        warn!(
            "No {} images found under {:?} for sensors {:?}",
            split.as_str(),
            config.root_dir,
            sensors
        );
    }
    Ok(images)
}

/// Index the training sensors, split the indices and persist all three lists
pub struct IndexTrainImages;

impl Stage for IndexTrainImages {
    fn name(&self) -> &str {
        INDEX_TRAIN_IMAGES
    }

    fn run(&self, ctx: &mut PipelineContext) -> PipelineResult<StageOutcome> {
        let images = discover(&ctx.config, DatasetSplit::Train)?;
        let split = split_indices(images.len(), ctx.config.split_fraction, ctx.config.seed)?;
        let index = IndexArtifacts { images, split };
        index.save(&ctx.artifacts)?;

        let summary = format!(
            "{} images, {} train / {} test indices",
            index.images.len(),
            index.split.train.len(),
            index.split.test.len()
        );
        ctx.train_index = Some(index);
        Ok(StageOutcome::Completed { summary })
    }
}

pub struct DatasetLayout;

impl Stage for DatasetLayout {
    fn name(&self) -> &str {
        DATASET_DIR_STRUCTURE
    }

    fn run(&self, ctx: &mut PipelineContext) -> PipelineResult<StageOutcome> {
        let class_dirs = dataset_dir_structure(&ctx.config.root_dir, ctx.config.classes.keys())?;
        Ok(StageOutcome::Completed {
            summary: format!("{} class directories", class_dirs.len()),
        })
    }
}

/// Index the held-out test sensors; the list is persisted whole, not split
pub struct IndexTestImages;

impl Stage for IndexTestImages {
    fn name(&self) -> &str {
        INDEX_TEST_IMAGES
    }

    fn run(&self, ctx: &mut PipelineContext) -> PipelineResult<StageOutcome> {
        let images = discover(&ctx.config, DatasetSplit::Test)?;
        save_obj(&images, &ctx.artifacts.all_test_images)?;

        let summary = format!(
            "{} test images saved to {:?}",
            images.len(),
            ctx.artifacts.all_test_images
        );
        ctx.test_images = Some(images);
        Ok(StageOutcome::Completed { summary })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::dataset::load_obj;
    use crate::pipeline::{Pipeline, RunSummary};
    use std::fs;
    use std::path::Path;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    fn dataset_with_frames(root: &Path, sensor: &str, scenes: usize, frames: usize) {
        for scene in 1..=scenes {
            for frame in 0..frames {
                touch(&root.join(format!("{}/{:02}/rgb/{:04}.jpg", sensor, scene, frame)));
            }
        }
    }

    fn context_for(root: &Path) -> PipelineContext {
        PipelineContext::new(PipelineConfig {
            root_dir: root.to_path_buf(),
            ..PipelineConfig::default()
        })
    }

    #[test]
    fn test_index_train_images_persists_split() {
        let dir = tempfile::tempdir().unwrap();
        dataset_with_frames(dir.path(), "train_primesense", 4, 25);
        let mut ctx = context_for(dir.path());

        let outcome = IndexTrainImages.run(&mut ctx).unwrap();
        assert_eq!(outcome.as_str(), "completed");

        let loaded = IndexArtifacts::load(&ctx.artifacts).unwrap();
        assert_eq!(loaded.images.len(), 100);
        assert_eq!(loaded.split.train.len(), 15);
        assert_eq!(loaded.split.test.len(), 85);
        assert_eq!(ctx.train_index.as_ref(), Some(&loaded));
    }

    #[test]
    fn test_index_train_images_is_reproducible() {
        let dir = tempfile::tempdir().unwrap();
        dataset_with_frames(dir.path(), "train_kinect", 3, 7);

        let mut first = context_for(dir.path());
        IndexTrainImages.run(&mut first).unwrap();
        let mut second = context_for(dir.path());
        IndexTrainImages.run(&mut second).unwrap();

        assert_eq!(first.train_index, second.train_index);
    }

    #[test]
    fn test_empty_dataset_warns_or_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = context_for(dir.path());
        IndexTrainImages.run(&mut ctx).unwrap();
        assert_eq!(ctx.train_index.as_ref().map(|i| i.images.len()), Some(0));

        ctx.config.require_images = true;
        let result = IndexTrainImages.run(&mut ctx);
        assert!(matches!(result, Err(PipelineError::NoImages { .. })));
    }

    #[test]
    fn test_index_test_images_is_not_split() {
        let dir = tempfile::tempdir().unwrap();
        dataset_with_frames(dir.path(), "test_canon", 2, 3);
        dataset_with_frames(dir.path(), "train_canon", 1, 5);
        let mut ctx = context_for(dir.path());

        IndexTestImages.run(&mut ctx).unwrap();
        let images: Vec<PathBuf> = load_obj(&ctx.artifacts.all_test_images).unwrap();
        assert_eq!(images.len(), 6);
        assert!(images.iter().all(|p| p.starts_with(dir.path().join("test_canon"))));
    }

    #[test]
    fn test_standard_pipeline_without_external_commands() {
        let dir = tempfile::tempdir().unwrap();
        dataset_with_frames(dir.path(), "train_primesense", 2, 10);
        dataset_with_frames(dir.path(), "test_primesense", 1, 4);
        let mut ctx = context_for(dir.path());

        let reports = Pipeline::standard().run(&mut ctx, &[]).unwrap();
        assert_eq!(reports.len(), 9);
        let skipped = reports
            .iter()
            .filter(|r| matches!(r.outcome, StageOutcome::Skipped { .. }))
            .count();
        assert_eq!(skipped, 6);

        assert!(dir.path().join("30/pose_refinement/rendered").is_dir());
        assert_eq!(ctx.test_images.as_ref().map(Vec::len), Some(4));
        assert_eq!(ctx.train_index.as_ref().map(|i| i.split.train.len()), Some(3));
    }

    #[test]
    fn test_standard_pipeline_summary_reports_skips() {
        let dir = tempfile::tempdir().unwrap();
        dataset_with_frames(dir.path(), "train_primesense", 2, 10);
        dataset_with_frames(dir.path(), "test_primesense", 1, 4);
        let mut ctx = context_for(dir.path());

        let reports = Pipeline::standard().run(&mut ctx, &[]).unwrap();
        let summary = RunSummary::new(&reports, &ctx);
        assert_eq!(summary.stages_skipped, 6);
        assert_eq!(
            summary.to_string(),
            "6 of 9 stages skipped; 20 training images (3 train / 17 test); 4 test images"
        );
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_index_train_images_ignores_non_utf8_names() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir().unwrap();
        dataset_with_frames(dir.path(), "train_primesense", 1, 5);
        touch(&dir.path().join("train_primesense/01/rgb").join(OsStr::from_bytes(b"\xff.jpg")));
        let mut ctx = context_for(dir.path());

        IndexTrainImages.run(&mut ctx).unwrap();
        let images: Vec<PathBuf> = load_obj(&ctx.artifacts.all_images).unwrap();
        assert_eq!(images.len(), 5);
    }
}

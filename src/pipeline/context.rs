use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::config::PipelineConfig;
use crate::core::dataset::{save_obj, ArtifactPaths, IndexArtifacts};
use crate::core::operations::ensure_dir;
use crate::error::PipelineResult;

pub const CONTEXT_FILE: &str = "pipeline_context.json";

/// State shared by the stages of one pipeline run
pub struct PipelineContext {
    pub config: PipelineConfig,
    pub artifacts: ArtifactPaths,
    /// Set once the training images have been indexed
    pub train_index: Option<IndexArtifacts>,
    /// Set once the held-out test images have been indexed
    pub test_images: Option<Vec<PathBuf>>,
    context_file: Option<PathBuf>,
}

/// What external stages read from the context file
#[derive(Serialize)]
struct ContextSnapshot<'a> {
    root_dir: &'a Path,
    background_dir: &'a Path,
    intrinsic_matrix: &'a [[f64; 3]; 3],
    classes: &'a BTreeMap<String, u32>,
    artifacts: &'a ArtifactPaths,
}

impl PipelineContext {
    pub fn new(config: PipelineConfig) -> Self {
        let artifacts = ArtifactPaths::new(&config.root_dir, config.artifact_naming);
        Self {
            config,
            artifacts,
            train_index: None,
            test_images: None,
            context_file: None,
        }
    }

    /// Path of the JSON context handed to external stages, written on first use
    pub fn context_file(&mut self) -> PipelineResult<PathBuf> {
        if let Some(path) = &self.context_file {
            return Ok(path.clone());
        }

        ensure_dir(&self.config.root_dir)?;
        let path = self.config.root_dir.join(CONTEXT_FILE);
        let snapshot = ContextSnapshot {
            root_dir: &self.config.root_dir,
            background_dir: &self.config.background_dir,
            intrinsic_matrix: &self.config.intrinsic_matrix,
            classes: &self.config.classes,
            artifacts: &self.artifacts,
        };
        save_obj(&snapshot, &path)?;
        info!("Wrote pipeline context to {:?}", path);

        self.context_file = Some(path.clone());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::dataset::load_obj;

    #[test]
    fn test_context_file_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig {
            root_dir: dir.path().to_path_buf(),
            ..PipelineConfig::default()
        };
        let mut ctx = PipelineContext::new(config);

        let path = ctx.context_file().unwrap();
        assert_eq!(path, dir.path().join(CONTEXT_FILE));

        let value: serde_json::Value = load_obj(&path).unwrap();
        assert_eq!(value["classes"]["07"], 7);
        assert_eq!(value["intrinsic_matrix"][0][0], 572.4114);
        assert!(value["artifacts"]["all_images"]
            .as_str()
            .unwrap()
            .ends_with("all_images_adr.json"));

        std::fs::remove_file(&path).unwrap();
        ctx.context_file().unwrap();
        assert!(!path.exists());
    }
}

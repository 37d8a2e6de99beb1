//! Ordered pipeline of stages
//!
//! Each stage is a capability `run(context) -> outcome`. The standard
//! pipeline runs dataset indexing, layout preparation, the externally
//! implemented ground-truth / training / pose stages, and finally test-set
//! indexing. Execution is sequential and stops at the first failure.

mod context;
mod external;
mod stages;

use std::fmt;
use std::time::{Duration, Instant};

use tracing::{error, info, info_span, warn};

use crate::error::{PipelineError, PipelineResult};

pub use context::PipelineContext;
pub use external::ExternalStage;
pub use stages::{DatasetLayout, IndexTestImages, IndexTrainImages};

pub const INDEX_TRAIN_IMAGES: &str = "index_train_images";
pub const DATASET_DIR_STRUCTURE: &str = "dataset_dir_structure";
pub const CREATE_GT_MASKS: &str = "create_gt_masks";
pub const CREATE_UV_XYZ_DICTIONARY: &str = "create_uv_xyz_dictionary";
pub const TRAIN_CORRESPONDENCE_BLOCK: &str = "train_correspondence_block";
pub const INITIAL_POSE_ESTIMATION: &str = "initial_pose_estimation";
pub const CREATE_REFINEMENT_INPUTS: &str = "create_refinement_inputs";
pub const TRAIN_POSE_REFINEMENT: &str = "train_pose_refinement";
pub const INDEX_TEST_IMAGES: &str = "index_test_images";

/// Result of a stage that did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    Completed { summary: String },
    Skipped { reason: String },
}

impl StageOutcome {
    pub fn as_str(&self) -> &str {
        match self {
            StageOutcome::Completed { .. } => "completed",
            StageOutcome::Skipped { .. } => "skipped",
        }
    }
}

pub trait Stage {
    fn name(&self) -> &str;

    fn run(&self, ctx: &mut PipelineContext) -> PipelineResult<StageOutcome>;
}

#[derive(Debug, Clone)]
pub struct StageReport {
    pub name: String,
    pub outcome: StageOutcome,
    pub elapsed: Duration,
}

/// Totals printed after a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub stages_run: usize,
    pub stages_skipped: usize,
    /// Training image count and its train/test index counts
    pub train: Option<(usize, usize, usize)>,
    pub test_images: Option<usize>,
}

impl RunSummary {
    pub fn new(reports: &[StageReport], ctx: &PipelineContext) -> Self {
        let stages_skipped = reports
            .iter()
            .filter(|r| matches!(r.outcome, StageOutcome::Skipped { .. }))
            .count();
        Self {
            stages_run: reports.len(),
            stages_skipped,
            train: ctx
                .train_index
                .as_ref()
                .map(|i| (i.images.len(), i.split.train.len(), i.split.test.len())),
            test_images: ctx.test_images.as_ref().map(Vec::len),
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} of {} stages skipped", self.stages_skipped, self.stages_run)?;
        if let Some((images, train, test)) = self.train {
            write!(f, "; {} training images ({} train / {} test)", images, train, test)?;
        }
        if let Some(count) = self.test_images {
            write!(f, "; {} test images", count)?;
        }
        Ok(())
    }
}

pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    pub fn new(stages: Vec<Box<dyn Stage>>) -> Self {
        Self { stages }
    }

    /// The full T-LESS pipeline in its fixed order
    pub fn standard() -> Self {
        Self::new(vec![
            Box::new(IndexTrainImages),
            Box::new(DatasetLayout),
            Box::new(ExternalStage::new(CREATE_GT_MASKS)),
            Box::new(ExternalStage::new(CREATE_UV_XYZ_DICTIONARY)),
            Box::new(ExternalStage::new(TRAIN_CORRESPONDENCE_BLOCK)),
            Box::new(ExternalStage::new(INITIAL_POSE_ESTIMATION)),
            Box::new(ExternalStage::new(CREATE_REFINEMENT_INPUTS)),
            Box::new(ExternalStage::new(TRAIN_POSE_REFINEMENT)),
            Box::new(IndexTestImages),
        ])
    }

    pub fn names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run every stage in order, or only those named in `only`.
    ///
    /// Stage order is never changed by `only`. The first failing stage aborts
    /// the run and its error is returned.
    pub fn run(
        &self,
        ctx: &mut PipelineContext,
        only: &[String],
    ) -> PipelineResult<Vec<StageReport>> {
        for name in only {
            if !self.stages.iter().any(|s| s.name() == name) {
                return Err(PipelineError::UnknownStage(name.clone()));
            }
        }

        let total = self.stages.len();
        let mut reports = Vec::new();
        for (position, stage) in self.stages.iter().enumerate() {
            let name = stage.name();
            if !only.is_empty() && !only.iter().any(|o| o == name) {
                continue;
            }

            let span = info_span!("stage", stage = name);
            let _guard = span.enter();
            info!("Running stage {}/{}: {}", position + 1, total, name);

            let started = Instant::now();
            let outcome = match stage.run(ctx) {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("Stage {} failed after {:?}: {}", name, started.elapsed(), e);
                    return Err(e);
                }
            };
            let elapsed = started.elapsed();

            match &outcome {
                StageOutcome::Completed { summary } => {
                    info!("Stage {} completed in {:?}: {}", name, elapsed, summary)
                }
                StageOutcome::Skipped { reason } => warn!("Stage {} skipped: {}", name, reason),
            }

            reports.push(StageReport {
                name: name.to_string(),
                outcome,
                elapsed,
            });
        }

        Ok(reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use std::cell::RefCell;
    use std::path::PathBuf;
    use std::rc::Rc;

    struct RecordingStage {
        name: &'static str,
        fail: bool,
        log: Rc<RefCell<Vec<&'static str>>>,
    }

    impl Stage for RecordingStage {
        fn name(&self) -> &str {
            self.name
        }

        fn run(&self, _ctx: &mut PipelineContext) -> PipelineResult<StageOutcome> {
            self.log.borrow_mut().push(self.name);
            if self.fail {
                return Err(PipelineError::StageFailed {
                    stage: self.name.to_string(),
                    reason: "boom".to_string(),
                });
            }
            Ok(StageOutcome::Completed {
                summary: String::new(),
            })
        }
    }

    fn recording_pipeline(
        names: &[(&'static str, bool)],
        log: &Rc<RefCell<Vec<&'static str>>>,
    ) -> Pipeline {
        Pipeline::new(
            names
                .iter()
                .map(|&(name, fail)| {
                    Box::new(RecordingStage {
                        name,
                        fail,
                        log: Rc::clone(log),
                    }) as Box<dyn Stage>
                })
                .collect(),
        )
    }

    fn test_context() -> PipelineContext {
        PipelineContext::new(PipelineConfig::default())
    }

    #[test]
    fn test_standard_stage_order() {
        let pipeline = Pipeline::standard();
        assert_eq!(
            pipeline.names(),
            vec![
                INDEX_TRAIN_IMAGES,
                DATASET_DIR_STRUCTURE,
                CREATE_GT_MASKS,
                CREATE_UV_XYZ_DICTIONARY,
                TRAIN_CORRESPONDENCE_BLOCK,
                INITIAL_POSE_ESTIMATION,
                CREATE_REFINEMENT_INPUTS,
                TRAIN_POSE_REFINEMENT,
                INDEX_TEST_IMAGES,
            ]
        );
    }

    #[test]
    fn test_runs_in_order_and_stops_at_failure() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let pipeline = recording_pipeline(&[("a", false), ("b", true), ("c", false)], &log);

        let result = pipeline.run(&mut test_context(), &[]);
        assert!(matches!(result, Err(PipelineError::StageFailed { .. })));
        assert_eq!(*log.borrow(), vec!["a", "b"]);
    }

    #[test]
    fn test_only_keeps_fixed_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let pipeline = recording_pipeline(&[("a", false), ("b", false), ("c", false)], &log);

        let only = vec!["c".to_string(), "a".to_string()];
        let reports = pipeline.run(&mut test_context(), &only).unwrap();
        assert_eq!(*log.borrow(), vec!["a", "c"]);
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].name, "a");
    }

    #[test]
    fn test_unknown_stage_is_rejected_before_running() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let pipeline = recording_pipeline(&[("a", false)], &log);

        let result = pipeline.run(&mut test_context(), &["nope".to_string()]);
        assert!(matches!(result, Err(PipelineError::UnknownStage(_))));
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_run_summary_counts_skipped_stages() {
        let mut ctx = test_context();
        let report = |name: &str, outcome: StageOutcome| StageReport {
            name: name.to_string(),
            outcome,
            elapsed: Duration::ZERO,
        };
        let reports = vec![
            report("a", StageOutcome::Completed { summary: String::new() }),
            report("b", StageOutcome::Skipped { reason: "no command".to_string() }),
        ];
        assert_eq!(RunSummary::new(&reports, &ctx).to_string(), "1 of 2 stages skipped");

        ctx.test_images = Some(vec![PathBuf::from("0000.jpg")]);
        let summary = RunSummary::new(&reports, &ctx);
        assert_eq!(summary.stages_skipped, 1);
        assert_eq!(summary.train, None);
        assert_eq!(summary.to_string(), "1 of 2 stages skipped; 1 test images");
    }
}

use std::path::Path;
use std::process::Command;

use tracing::{debug, info, warn};

use super::{PipelineContext, Stage, StageOutcome};
use crate::error::{PipelineError, PipelineResult};

/// A stage implemented by an external program configured under
/// `stages.<name>` in the pipeline configuration.
///
/// Only the exit status is inspected. A stage without a configured command
/// is skipped.
pub struct ExternalStage {
    name: &'static str,
}

impl ExternalStage {
    pub fn new(name: &'static str) -> Self {
        Self { name }
    }
}

/// Replace `{key}` placeholders with their values
fn substitute(arg: &str, vars: &[(&str, String)]) -> String {
    vars.iter().fold(arg.to_string(), |acc, (key, value)| {
        acc.replace(&format!("{{{}}}", key), value)
    })
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

impl Stage for ExternalStage {
    fn name(&self) -> &str {
        self.name
    }

    fn run(&self, ctx: &mut PipelineContext) -> PipelineResult<StageOutcome> {
        let Some(command) = ctx.config.stages.get(self.name).cloned() else {
            warn!("No command configured for stage {}", self.name);
            return Ok(StageOutcome::Skipped {
                reason: format!("no command configured under stages.{}", self.name),
            });
        };

        let context_file = ctx.context_file()?;
        let mut vars = vec![
            ("root_dir", path_string(&ctx.config.root_dir)),
            ("background_dir", path_string(&ctx.config.background_dir)),
            ("context", path_string(&context_file)),
        ];
        if let Some(epochs) = ctx.config.epochs_for(self.name) {
            vars.push(("epochs", epochs.to_string()));
        }

        let args: Vec<String> = command.args.iter().map(|a| substitute(a, &vars)).collect();
        info!("Launching {} {:?}", command.program, args);

        let mut process = Command::new(&command.program);
        process.args(&args);
        for (key, value) in &vars {
            process.env(format!("TLESS_{}", key.to_uppercase()), value);
        }

        let status = process.status().map_err(|e| PipelineError::StageFailed {
            stage: self.name.to_string(),
            reason: format!("failed to launch {:?}: {}", command.program, e),
        })?;
        debug!("{} exited with {}", command.program, status);

        if !status.success() {
            return Err(PipelineError::StageFailed {
                stage: self.name.to_string(),
                reason: format!("{:?} exited with {}", command.program, status),
            });
        }

        Ok(StageOutcome::Completed {
            summary: format!("{} finished successfully", command.program),
        })
    }
}

mod pipeline_config;

pub use pipeline_config::PipelineConfig;
#[cfg(test)]
pub use pipeline_config::{default_classes, ExternalCommand};

pub mod pipeline_config;
pub mod instruments;

pub use pipeline_config::{Credentials, PipelineConfig};

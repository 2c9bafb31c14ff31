pub mod usage;
pub mod pipeline;

pub use pipeline::DailyPipeline;

pub mod pipeline;
pub mod types;

pub use pipeline::ClassifyPipeline;
pub use types::*;

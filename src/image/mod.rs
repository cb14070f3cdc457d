pub mod loader;
pub mod postprocessing;
pub mod preprocessing;
pub mod transforms;

pub use loader::ImageLoader;
pub use postprocessing::{ModelInfo, Prediction, ResultFormatter};
pub use preprocessing::ImagePreprocessor;
pub use transforms::ImageTransforms;

pub mod classify;
pub mod config;
pub mod image;
pub mod models;
pub mod utils;
pub mod web;

// 重新导出主要类型
pub use classify::ClassifyOutput;
pub use config::Config;
pub use image::postprocessing::Prediction;
pub use models::{ColorClassifier, Variant};
pub use utils::error::ClassifierError;

pub type Result<T> = std::result::Result<T, ClassifierError>;

pub mod blocks;
pub mod classifier;
pub mod histogram;
pub mod layers;
pub mod mobilevit;
pub mod network;
pub mod variant;
pub mod weights;

pub use classifier::ColorClassifier;
pub use histogram::ColorHistogram;
pub use network::ColorMobileViT;
pub use variant::{Variant, VariantSpec};

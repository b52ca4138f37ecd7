//! Random forest land-cover classifier: train, predict, assess.
//!
//! CART decision trees grown on bootstrap bags of labelled band vectors,
//! trained in parallel with rayon and seeded with ChaCha8 so a fixed seed
//! always yields the same forest. Accuracy assessment follows the usual
//! remote-sensing conventions: overall accuracy, producer's accuracy (per
//! reference class) and consumer's accuracy (per mapped class).

mod config;
mod confusion;
mod error;
mod forest;
mod importance;
mod node;
mod oob;
mod predict;
mod result;
mod serialize;
mod split;
mod tree;

pub use config::{MaxFeatures, OobMode, RandomForestConfig};
pub use confusion::ConfusionMatrix;
pub use error::ClassifierError;
pub use forest::RandomForest;
pub use importance::RankedBand;
pub use node::{BandIndex, Impurity, Node, NodeIndex};
pub use oob::OobScore;
pub use predict::ClassDistribution;
pub use result::{RandomForestResult, TrainingMetadata};
pub use split::SplitCriterion;
pub use tree::{DecisionTree, DecisionTreeConfig};

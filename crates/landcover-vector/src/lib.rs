//! Administrative boundaries: select the target villages, then simplify and
//! dissolve them into the single polygon every raster stage is clipped to.
//!
//! All distances are in the units of the boundary layer's projected CRS
//! (metres for the Rwandan village layer).

mod error;
mod feature;
mod filter;
mod simplify;

pub use error::VectorError;
pub use feature::{AdminAttributes, AdminFeature, Attribute};
pub use filter::{BoundaryFilter, Predicate};
pub use simplify::{SimplifyConfig, TargetGeometry, dissolve, simplify_features};

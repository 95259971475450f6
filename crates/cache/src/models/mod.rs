mod feature;
mod manifest;

pub(crate) use crate::models::feature::{feature_from_row, feature_to_row, geometry_to_json};
pub use crate::models::manifest::ManifestRow;

//! Conversion between features and the rows of a block table.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use vfk_model::{DataBlock, Feature, Geometry, Value};

pub(crate) fn geometry_to_json(geometry: &Geometry) -> Result<Value> {
    let json = serde_json::to_string(geometry).or_raise(|| ErrorKind::InvalidData("geometry"))?;
    Ok(Value::Text(json))
}

/// Property values followed by the feature id and the geometry column.
pub(crate) fn feature_to_row(feature: &Feature) -> Result<Vec<Value>> {
    let geometry = match feature.geometry() {
        Some(geometry) => geometry_to_json(geometry)?,
        None => Value::Null,
    };
    let mut row = Vec::with_capacity(feature.values().len() + 2);
    row.extend_from_slice(feature.values());
    row.push(Value::Integer(feature.fid()));
    row.push(geometry);
    Ok(row)
}

pub(crate) fn feature_from_row(block: &DataBlock, mut row: Vec<Value>) -> Result<Feature> {
    if row.len() != block.property_count() + 2 {
        exn::bail!(ErrorKind::InvalidData("feature row"));
    }
    let geometry = match row.pop() {
        Some(Value::Text(json)) => {
            Some(serde_json::from_str::<Geometry>(&json).or_raise(|| ErrorKind::InvalidData("geometry"))?)
        },
        _ => None,
    };
    let fid = match row.pop().and_then(|fid| fid.as_i64()) {
        Some(fid) => fid,
        None => exn::bail!(ErrorKind::InvalidData("ogr_fid")),
    };
    Ok(Feature::new(fid, row).with_geometry(geometry))
}

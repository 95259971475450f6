//! Data blocks and the features they own.

use crate::error::{ErrorKind, Result};
use crate::geometry::Geometry;
use crate::property::PropertyDefn;
use crate::value::Value;

/// Separator between property definitions in a block definition string.
pub const DEFINITION_SEPARATOR: char = ';';

/// How the geometry of a block's features is reconstructed, if at all.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GeometryKind {
    /// The block carries no spatial data.
    None,
    /// Surveyed points with their own coordinates (`SOBR`, `OBBP`, `SPOL`).
    Point,
    /// Point-to-line links, consecutive rows forming one line (`SBP`, `SBM`).
    Link,
    /// Lines assembled from the link rows that reference them (`HP`, `DPM`, `OB`, `ZVB`).
    Line,
    /// Areas assembled from the boundary lines that reference them (`PAR`).
    Polygon,
}
impl GeometryKind {
    /// Geometry semantics are fixed per block name by the exchange format.
    pub fn for_block(name: &str) -> Self {
        match name {
            "SOBR" | "OBBP" | "SPOL" => Self::Point,
            "SBP" | "SBM" => Self::Link,
            "HP" | "DPM" | "OB" | "ZVB" => Self::Line,
            "PAR" => Self::Polygon,
            _ => Self::None,
        }
    }

    pub fn is_spatial(&self) -> bool {
        !matches!(self, Self::None)
    }
}

/// One decoded record of a data block.
///
/// Only the accessors needed to (de)serialise a row are exposed; the values
/// are stored in the property order of the owning block.
#[derive(Clone, Debug, PartialEq)]
pub struct Feature {
    fid: i64,
    values: Vec<Value>,
    geometry: Option<Geometry>,
}
impl Feature {
    pub fn new(fid: i64, values: Vec<Value>) -> Self {
        Self { fid, values, geometry: None }
    }

    pub fn with_geometry(mut self, geometry: Option<Geometry>) -> Self {
        self.geometry = geometry;
        self
    }

    /// Feature id, a 1-based sequence within the block.
    pub fn fid(&self) -> i64 {
        self.fid
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn value(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn geometry(&self) -> Option<&Geometry> {
        self.geometry.as_ref()
    }

    pub fn set_geometry(&mut self, geometry: Option<Geometry>) {
        self.geometry = geometry;
    }
}

/// A named record type: its property schema plus every feature read for it.
#[derive(Clone, Debug, PartialEq)]
pub struct DataBlock {
    name: String,
    properties: Vec<PropertyDefn>,
    features: Vec<Feature>,
    records_loaded: bool,
    geometry_loaded: bool,
}
impl DataBlock {
    pub fn new(name: impl Into<String>, properties: Vec<PropertyDefn>) -> Self {
        Self {
            name: name.into(),
            properties,
            features: Vec::new(),
            records_loaded: false,
            geometry_loaded: false,
        }
    }

    /// Build a block from its definition string (`ID N30;NAZEV T255;...`).
    ///
    /// This is the body of a `&B` line and also what the cache manifest
    /// persists, so a block survives a round trip through either.
    pub fn from_definition(name: impl Into<String>, definition: &str) -> Result<Self> {
        let name = name.into();
        let properties = definition
            .split(DEFINITION_SEPARATOR)
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(PropertyDefn::parse)
            .collect::<Result<Vec<_>>>()?;
        if properties.is_empty() {
            exn::bail!(ErrorKind::InvalidProperty(format!("block {name} has no properties")));
        }
        Ok(Self::new(name, properties))
    }

    /// The definition string this block can be rebuilt from.
    pub fn definition(&self) -> String {
        self.properties
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(&DEFINITION_SEPARATOR.to_string())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn geometry_kind(&self) -> GeometryKind {
        GeometryKind::for_block(&self.name)
    }

    pub fn properties(&self) -> &[PropertyDefn] {
        &self.properties
    }

    pub fn property_count(&self) -> usize {
        self.properties.len()
    }

    pub fn property_index(&self, name: &str) -> Option<usize> {
        self.properties.iter().position(|p| p.name() == name)
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn features_mut(&mut self) -> &mut [Feature] {
        &mut self.features
    }

    pub fn feature_count(&self) -> usize {
        self.features.len()
    }

    pub fn feature(&self, index: usize) -> Option<&Feature> {
        self.features.get(index)
    }

    pub fn feature_by_fid(&self, fid: i64) -> Option<&Feature> {
        self.features.iter().find(|f| f.fid == fid)
    }

    /// Value of the named property for a feature.
    pub fn feature_value<'a>(&self, feature: &'a Feature, property: &str) -> Option<&'a Value> {
        self.property_index(property).and_then(|index| feature.value(index))
    }

    /// Append a record from its raw fields, assigning the next feature id.
    pub fn add_record<S: AsRef<str>>(&mut self, fields: &[S]) -> Result<&Feature> {
        if fields.len() != self.properties.len() {
            exn::bail!(ErrorKind::FieldCount {
                block: self.name.clone(),
                expected: self.properties.len(),
                found: fields.len(),
            });
        }
        let values = self.properties.iter().zip(fields).map(|(p, raw)| p.parse_value(raw.as_ref())).collect();
        let fid = i64::try_from(self.features.len()).unwrap_or(i64::MAX - 1) + 1;
        self.features.push(Feature::new(fid, values));
        Ok(&self.features[self.features.len() - 1])
    }

    /// Append an already typed feature, e.g. one restored from the cache.
    pub fn push_feature(&mut self, feature: Feature) -> Result<()> {
        if feature.values.len() != self.properties.len() {
            exn::bail!(ErrorKind::FieldCount {
                block: self.name.clone(),
                expected: self.properties.len(),
                found: feature.values.len(),
            });
        }
        self.features.push(feature);
        Ok(())
    }

    /// Drop all features and reset both phase flags.
    pub fn clear_features(&mut self) {
        self.features.clear();
        self.records_loaded = false;
        self.geometry_loaded = false;
    }

    /// Whether the record phase has populated this block.
    pub fn records_loaded(&self) -> bool {
        self.records_loaded
    }

    pub fn set_records_loaded(&mut self, loaded: bool) {
        self.records_loaded = loaded;
    }

    /// Whether the geometry phase has run for this block.
    pub fn geometry_loaded(&self) -> bool {
        self.geometry_loaded
    }

    pub fn set_geometry_loaded(&mut self, loaded: bool) {
        self.geometry_loaded = loaded;
    }

    /// Number of features carrying a geometry.
    pub fn geometry_count(&self) -> usize {
        self.features.iter().filter(|f| f.geometry.is_some()).count()
    }
}

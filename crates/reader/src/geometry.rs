//! Geometry reconstruction from the cross-references between blocks.
//!
//! Only surveyed points carry coordinates. Everything else is assembled from
//! them, so blocks are processed in dependency order:
//!
//! 1. **Points** (`SOBR`, `OBBP`, `SPOL`): `x = -SOURADNICE_Y`, `y = -SOURADNICE_X`.
//! 2. **Links** (`SBP`, `SBM`): consecutive rows starting at
//!    `PORADOVE_CISLO_BODU = 1` form one line through the `SOBR` points named
//!    by `BP_ID`. The line is attached to its first row.
//! 3. **Lines** (`HP`, `DPM`, `OB`, `ZVB`): the `SBP` rows referencing the
//!    feature (`HP_ID`, ...), ordered by `PORADOVE_CISLO_BODU`.
//! 4. **Polygons** (`PAR`): the `HP` lines naming the parcel in `PAR_ID_1` or
//!    `PAR_ID_2`, chained end to end into closed rings. The largest ring is
//!    the exterior.
//!
//! A feature whose geometry cannot be assembled keeps no geometry.

use crate::core::Blocks;
use std::collections::HashMap;
use vfk_model::{DataBlock, Feature, Geometry, GeometryKind, Point, Value, ring_area};

const POINT_BLOCK: &str = "SOBR";
const LINK_BLOCK: &str = "SBP";
const BOUNDARY_BLOCK: &str = "HP";

const ID: &str = "ID";
const COORDINATE_Y: &str = "SOURADNICE_Y";
const COORDINATE_X: &str = "SOURADNICE_X";
const POINT_REFERENCE: &str = "BP_ID";
const SEQUENCE: &str = "PORADOVE_CISLO_BODU";
const PARCEL_REFERENCES: [&str; 2] = ["PAR_ID_1", "PAR_ID_2"];

const BUILD_ORDER: [GeometryKind; 4] = [GeometryKind::Point, GeometryKind::Link, GeometryKind::Line, GeometryKind::Polygon];

/// Build geometry for every spatial block that has none yet.
///
/// Blocks whose geometry is already loaded (e.g. restored from a cache) are
/// used as inputs but left untouched. Returns the indices of the blocks built.
pub(crate) fn load(blocks: &mut Blocks) -> Vec<usize> {
    let mut built = Vec::new();
    for kind in BUILD_ORDER {
        let points = match kind {
            GeometryKind::Link | GeometryKind::Line => point_index(blocks),
            _ => HashMap::new(),
        };
        for index in 0..blocks.len() {
            let Some(block) = blocks.get(index) else {
                continue;
            };
            if block.geometry_kind() != kind || block.geometry_loaded() {
                continue;
            }
            let geometries = match kind {
                GeometryKind::Point => point_geometries(block),
                GeometryKind::Link => link_geometries(block, &points),
                GeometryKind::Line => line_geometries(block, blocks, &points),
                GeometryKind::Polygon => polygon_geometries(block, blocks),
                GeometryKind::None => continue,
            };
            if let Some(block) = blocks.get_mut(index) {
                apply(block, geometries);
                built.push(index);
            }
        }
    }
    built
}

fn apply(block: &mut DataBlock, geometries: Vec<Option<Geometry>>) {
    for (feature, geometry) in block.features_mut().iter_mut().zip(geometries) {
        feature.set_geometry(geometry);
    }
    block.set_geometry_loaded(true);
    let built = block.geometry_count();
    let missing = block.feature_count() - built;
    if missing > 0 {
        tracing::warn!(block = block.name(), built, missing, "Some features have no usable geometry");
    } else {
        tracing::debug!(block = block.name(), built, "Built geometry");
    }
}

fn integer(feature: &Feature, index: Option<usize>) -> Option<i64> {
    feature.value(index?).and_then(Value::as_i64)
}

fn real(feature: &Feature, index: Option<usize>) -> Option<f64> {
    feature.value(index?).and_then(Value::as_f64)
}

fn point_geometries(block: &DataBlock) -> Vec<Option<Geometry>> {
    let y = block.property_index(COORDINATE_Y);
    let x = block.property_index(COORDINATE_X);
    block
        .features()
        .iter()
        .map(|feature| {
            let (north, east) = (real(feature, y)?, real(feature, x)?);
            Some(Geometry::Point(Point::new(-north, -east)))
        })
        .collect()
}

/// Surveyed point coordinates keyed by point id.
fn point_index(blocks: &Blocks) -> HashMap<i64, Point> {
    let Some(block) = blocks.by_name(POINT_BLOCK) else {
        return HashMap::new();
    };
    let id = block.property_index(ID);
    block
        .features()
        .iter()
        .filter_map(|feature| match (integer(feature, id), feature.geometry()) {
            (Some(id), Some(Geometry::Point(point))) => Some((id, *point)),
            _ => None,
        })
        .collect()
}

fn link_geometries(block: &DataBlock, points: &HashMap<i64, Point>) -> Vec<Option<Geometry>> {
    let mut geometries = vec![None; block.feature_count()];
    let sequence = block.property_index(SEQUENCE);
    let point = block.property_index(POINT_REFERENCE);
    // (first row, vertices, every vertex resolved)
    let mut current: Option<(usize, Vec<Point>, bool)> = None;
    for (row, feature) in block.features().iter().enumerate() {
        if integer(feature, sequence) == Some(1) {
            finish_link(&mut geometries, current.take());
            current = Some((row, Vec::new(), true));
        }
        if let Some((_, vertices, complete)) = current.as_mut() {
            match integer(feature, point).and_then(|id| points.get(&id)) {
                Some(vertex) => vertices.push(*vertex),
                None => *complete = false,
            }
        }
    }
    finish_link(&mut geometries, current);
    geometries
}

fn finish_link(geometries: &mut [Option<Geometry>], link: Option<(usize, Vec<Point>, bool)>) {
    if let Some((row, vertices, true)) = link
        && vertices.len() >= 2
    {
        geometries[row] = Some(Geometry::LineString(vertices));
    }
}

/// Column of `SBP` naming the feature a link row belongs to.
fn link_reference(block: &str) -> Option<&'static str> {
    match block {
        "HP" => Some("HP_ID"),
        "DPM" => Some("DPM_ID"),
        "OB" => Some("OB_ID"),
        "ZVB" => Some("ZVB_ID"),
        _ => None,
    }
}

fn line_geometries(block: &DataBlock, blocks: &Blocks, points: &HashMap<i64, Point>) -> Vec<Option<Geometry>> {
    let (Some(links), Some(reference)) = (blocks.by_name(LINK_BLOCK), link_reference(block.name())) else {
        return vec![None; block.feature_count()];
    };
    let owner = links.property_index(reference);
    let sequence = links.property_index(SEQUENCE);
    let point = links.property_index(POINT_REFERENCE);
    let mut vertices: HashMap<i64, Vec<(i64, Option<i64>)>> = HashMap::new();
    for feature in links.features() {
        if let Some(owner) = integer(feature, owner) {
            let order = integer(feature, sequence).unwrap_or(i64::MAX);
            vertices.entry(owner).or_default().push((order, integer(feature, point)));
        }
    }
    for line in vertices.values_mut() {
        line.sort_by_key(|(order, _)| *order);
    }
    let id = block.property_index(ID);
    block
        .features()
        .iter()
        .map(|feature| {
            let line = vertices.get(&integer(feature, id)?)?;
            let line = line
                .iter()
                .map(|(_, point)| point.and_then(|point| points.get(&point).copied()))
                .collect::<Option<Vec<_>>>()?;
            (line.len() >= 2).then_some(Geometry::LineString(line))
        })
        .collect()
}

fn polygon_geometries(block: &DataBlock, blocks: &Blocks) -> Vec<Option<Geometry>> {
    let Some(boundaries) = blocks.by_name(BOUNDARY_BLOCK) else {
        return vec![None; block.feature_count()];
    };
    let parcels = PARCEL_REFERENCES.map(|column| boundaries.property_index(column));
    let mut lines: HashMap<i64, Vec<&[Point]>> = HashMap::new();
    for feature in boundaries.features() {
        let Some(Geometry::LineString(line)) = feature.geometry() else {
            continue;
        };
        let mut owners = parcels.iter().filter_map(|&column| integer(feature, column)).collect::<Vec<_>>();
        owners.dedup();
        for owner in owners {
            lines.entry(owner).or_default().push(line);
        }
    }
    let id = block.property_index(ID);
    block
        .features()
        .iter()
        .map(|feature| {
            let rings = assemble_rings(lines.get(&integer(feature, id)?)?)?;
            Some(Geometry::Polygon(rings))
        })
        .collect()
}

fn is_closed(ring: &[Point]) -> bool {
    ring.len() >= 4 && ring.first() == ring.last()
}

/// Chain lines sharing end points into closed rings, largest first.
///
/// Returns `None` if any ring cannot be closed.
pub(crate) fn assemble_rings(lines: &[&[Point]]) -> Option<Vec<Vec<Point>>> {
    let mut remaining = lines.iter().filter(|line| !line.is_empty()).copied().collect::<Vec<_>>();
    let mut rings = Vec::new();
    while !remaining.is_empty() {
        let mut ring = remaining.remove(0).to_vec();
        while !is_closed(&ring) {
            let end = *ring.last()?;
            let next = remaining
                .iter()
                .position(|line| line.first() == Some(&end) || line.last() == Some(&end))?;
            let line = remaining.remove(next);
            if line.first() == Some(&end) {
                ring.extend_from_slice(&line[1..]);
            } else {
                ring.extend(line.iter().rev().skip(1));
            }
        }
        rings.push(ring);
    }
    if rings.is_empty() {
        return None;
    }
    rings.sort_by(|a, b| ring_area(b).total_cmp(&ring_area(a)));
    Some(rings)
}

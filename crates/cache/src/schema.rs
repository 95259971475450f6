//! Layout of a cache database.
//!
//! - `vfk_blocks`: the manifest, one row per block. `num_records` is `-1`
//!   until the block's rows have been persisted.
//! - `vfk_header`: the `&H` key/value pairs in file order.
//! - one table per block, named after the block: its properties followed by
//!   [`FID_COLUMN`] and [`GEOMETRY_COLUMN`] (JSON).

use vfk_model::DataBlock;

pub const MANIFEST_TABLE: &str = "vfk_blocks";
pub const HEADER_TABLE: &str = "vfk_header";
/// Column count of a manifest this crate can read.
pub const MANIFEST_COLUMNS: i64 = 7;
/// Marker in `num_records` for a block whose rows are not persisted yet.
pub const RECORDS_PENDING: i64 = -1;

pub const FID_COLUMN: &str = "ogr_fid";
pub const GEOMETRY_COLUMN: &str = "geometry";
pub const ID_COLUMN: &str = "ID";
/// Columns other blocks join on when geometry is rebuilt.
pub const REFERENCE_COLUMNS: [&str; 8] = [
    "BP_ID",
    "HP_ID",
    "OB_ID",
    "DPM_ID",
    "ZVB_ID",
    "PAR_ID_1",
    "PAR_ID_2",
    "PORADOVE_CISLO_BODU",
];

pub(crate) const CREATE_MANIFEST: &str = include_str!("../queries/create_manifest.sql");
pub(crate) const CREATE_HEADER: &str = include_str!("../queries/create_header.sql");

/// Quote an SQL identifier.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub(crate) fn drop_block_table(block: &DataBlock) -> String {
    format!("DROP TABLE IF EXISTS {}", quote_ident(block.name()))
}

pub(crate) fn create_block_table(block: &DataBlock) -> String {
    let columns = block
        .properties()
        .iter()
        .map(|p| format!("{} {}", quote_ident(p.name()), p.kind().sql_type()))
        .chain([format!("{FID_COLUMN} integer"), format!("{GEOMETRY_COLUMN} text")])
        .collect::<Vec<_>>()
        .join(", ");
    format!("CREATE TABLE {} ({columns})", quote_ident(block.name()))
}

fn column_list(block: &DataBlock) -> String {
    block
        .properties()
        .iter()
        .map(|p| quote_ident(p.name()))
        .chain([FID_COLUMN.to_string(), GEOMETRY_COLUMN.to_string()])
        .collect::<Vec<_>>()
        .join(", ")
}

pub(crate) fn insert_feature(block: &DataBlock) -> String {
    let placeholders = (1..=block.property_count() + 2).map(|i| format!("?{i}")).collect::<Vec<_>>().join(", ");
    format!("INSERT INTO {} ({}) VALUES ({placeholders})", quote_ident(block.name()), column_list(block))
}

pub(crate) fn select_features(block: &DataBlock) -> String {
    format!("SELECT {} FROM {} ORDER BY {FID_COLUMN}", column_list(block), quote_ident(block.name()))
}

pub(crate) fn update_geometry(block: &DataBlock) -> String {
    format!("UPDATE {} SET {GEOMETRY_COLUMN} = ?1 WHERE {FID_COLUMN} = ?2", quote_ident(block.name()))
}

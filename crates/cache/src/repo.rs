//! Mapping of blocks, features and header metadata onto a [`Store`].

use crate::error::{ErrorKind, Result};
use crate::models::{ManifestRow, feature_from_row, feature_to_row, geometry_to_json};
use crate::schema::{
    self, CREATE_HEADER, CREATE_MANIFEST, FID_COLUMN, HEADER_TABLE, ID_COLUMN, MANIFEST_TABLE, REFERENCE_COLUMNS,
    quote_ident,
};
use crate::store::{IndexSpec, Store};
use exn::ResultExt;
use tracing::instrument;
use vfk_model::{DataBlock, Value};

/// Repository for the cache of one source file.
///
/// Owns the store. Blocks go through three steps, each recorded in the
/// manifest so a later session can tell how far a previous one got:
///
/// 1. [`Repository::register_block`]: empty table, `num_records = -1`
/// 2. [`Repository::store_features`]: rows, indices, `num_records = n`
/// 3. [`Repository::store_geometry`]: geometry column, `num_geometries = n`
#[derive(Debug)]
pub struct Repository<S> {
    store: S,
}
impl<S: Store> Repository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_inner(self) -> S {
        self.store
    }

    pub fn is_read_only(&self) -> bool {
        self.store.is_read_only()
    }

    // =========================================================================
    // Schema
    // =========================================================================

    /// Create the manifest and header tables of a new cache.
    pub fn create_schema(&mut self) -> Result<()> {
        self.store.execute_all(&[CREATE_MANIFEST, CREATE_HEADER])?;
        Ok(())
    }

    pub fn manifest_exists(&mut self) -> Result<bool> {
        self.store.table_exists(MANIFEST_TABLE)
    }

    pub fn manifest_column_count(&mut self) -> Result<i64> {
        self.store.column_count(MANIFEST_TABLE)
    }

    pub fn row_count(&mut self, table: &str) -> Result<i64> {
        self.store.count(&format!("SELECT COUNT(*) FROM {}", quote_ident(table)), &[])
    }

    // =========================================================================
    // Header
    // =========================================================================

    /// Replace the persisted header with the given pairs, keeping their order.
    pub fn store_header(&mut self, header: &[(String, String)]) -> Result<()> {
        self.store.execute(include_str!("../queries/delete_header.sql"))?;
        let insert = self.store.prepare(include_str!("../queries/insert_header.sql"))?;
        let rows = header
            .iter()
            .map(|(key, value)| [Value::from(key.as_str()), Value::from(value.as_str())])
            .collect::<Vec<_>>();
        self.store.insert_many(&insert, &rows)?;
        Ok(())
    }

    pub fn load_header(&mut self) -> Result<Vec<(String, String)>> {
        if !self.store.table_exists(HEADER_TABLE)? {
            return Ok(Vec::new());
        }
        let rows = self.store.query(include_str!("../queries/select_header.sql"), &[])?;
        Ok(rows
            .into_iter()
            .filter_map(|row| match <[Value; 2]>::try_from(row) {
                Ok([Value::Text(key), value]) => Some((key, value.to_string())),
                _ => None,
            })
            .collect())
    }

    // =========================================================================
    // Blocks
    // =========================================================================

    /// Create an empty table for a block and record it in the manifest as
    /// not yet populated. Any previous table of that name is dropped; its
    /// manifest row is reset in place so block order is kept.
    #[instrument(skip_all, fields(block = block.name()))]
    pub fn register_block(&mut self, block: &DataBlock, file_name: &str, file_size: u64) -> Result<()> {
        self.store.execute_all(&[schema::drop_block_table(block), schema::create_block_table(block)])?;
        let params: [Value; 4] = [
            file_name.into(),
            Value::Integer(i64::try_from(file_size).unwrap_or(i64::MAX)),
            block.name().into(),
            block.definition().into(),
        ];
        let reset = self.store.prepare(include_str!("../queries/reset_manifest_row.sql"))?;
        if self.store.execute_prepared(&reset, &params)? == 0 {
            let insert = self.store.prepare(include_str!("../queries/insert_manifest.sql"))?;
            self.store.execute_prepared(&insert, &params)?;
        }
        tracing::debug!(properties = block.property_count(), "Registered block");
        Ok(())
    }

    /// Every manifest row, in registration order.
    pub fn manifest(&mut self) -> Result<Vec<ManifestRow>> {
        let rows = self.store.query(include_str!("../queries/select_manifest.sql"), &[])?;
        rows.into_iter().map(ManifestRow::try_from).collect()
    }

    pub fn manifest_row(&mut self, table: &str) -> Result<Option<ManifestRow>> {
        let rows = self.store.query(include_str!("../queries/select_manifest_row.sql"), &[table.into()])?;
        rows.into_iter().next().map(ManifestRow::try_from).transpose()
    }

    // =========================================================================
    // Features
    // =========================================================================

    /// Persist every feature of a block in one transaction, update its
    /// manifest counts and build its indices.
    ///
    /// `ID` is indexed as unique, except for amendment files where the same
    /// object may appear more than once.
    #[instrument(skip_all, fields(block = block.name()))]
    pub fn store_features(&mut self, block: &DataBlock, amendment: bool) -> Result<u64> {
        let rows = block.features().iter().map(feature_to_row).collect::<Result<Vec<_>>>()?;
        let insert = self.store.prepare(&schema::insert_feature(block))?;
        let inserted = self.store.insert_many(&insert, &rows)?;
        let update = self.store.prepare(include_str!("../queries/update_manifest_records.sql"))?;
        self.store.execute_prepared(
            &update,
            &[
                Value::Integer(i64::try_from(inserted).unwrap_or(i64::MAX)),
                Value::Integer(i64::try_from(block.feature_count()).unwrap_or(i64::MAX)),
                block.name().into(),
            ],
        )?;
        self.create_indices(block, amendment);
        tracing::debug!(rows = inserted, "Persisted features");
        Ok(inserted)
    }

    fn create_indices(&mut self, block: &DataBlock, amendment: bool) {
        let table = block.name();
        let mut indices = vec![IndexSpec::new(format!("{table}_{FID_COLUMN}"), table, &[FID_COLUMN])];
        if block.property_index(ID_COLUMN).is_some() {
            let index = IndexSpec::new(format!("{table}_{ID_COLUMN}"), table, &[ID_COLUMN]);
            indices.push(if amendment { index.non_unique() } else { index });
        }
        for column in REFERENCE_COLUMNS.into_iter().filter(|c| block.property_index(c).is_some()) {
            indices.push(IndexSpec::new(format!("{table}_{column}"), table, &[column]).non_unique());
        }
        for index in &indices {
            if let Err(err) = self.store.create_index(index) {
                tracing::warn!(index = index.name(), error = ?err, "Failed to create index");
            }
        }
    }

    /// Append the persisted rows of a block to it, including any persisted
    /// geometry, and mark its records as loaded.
    #[instrument(skip_all, fields(block = block.name()))]
    pub fn load_features(&mut self, block: &mut DataBlock) -> Result<usize> {
        let rows = self.store.query(&schema::select_features(block), &[])?;
        let count = rows.len();
        for row in rows {
            let feature = feature_from_row(block, row)?;
            block.push_feature(feature).or_raise(|| ErrorKind::InvalidData("feature row"))?;
        }
        block.set_records_loaded(true);
        tracing::debug!(rows = count, "Loaded features");
        Ok(count)
    }

    // =========================================================================
    // Geometry
    // =========================================================================

    /// Write the geometry of every feature that has one and record the count
    /// in the manifest.
    #[instrument(skip_all, fields(block = block.name()))]
    pub fn store_geometry(&mut self, block: &DataBlock) -> Result<u64> {
        let rows = block
            .features()
            .iter()
            .filter_map(|f| f.geometry().map(|geometry| (f.fid(), geometry)))
            .map(|(fid, geometry)| -> Result<[Value; 2]> { Ok([geometry_to_json(geometry)?, Value::Integer(fid)]) })
            .collect::<Result<Vec<_>>>()?;
        let update = self.store.prepare(&schema::update_geometry(block))?;
        let updated = self.store.insert_many(&update, &rows)?;
        let manifest = self.store.prepare(include_str!("../queries/update_manifest_geometries.sql"))?;
        self.store.execute_prepared(
            &manifest,
            &[Value::Integer(i64::try_from(updated).unwrap_or(i64::MAX)), block.name().into()],
        )?;
        tracing::debug!(rows = updated, "Persisted geometry");
        Ok(updated)
    }
}

use crate::error::{ErrorKind, Result};
use crate::schema::RECORDS_PENDING;
use exn::OptionExt;
use vfk_model::Value;

/// One row of the `vfk_blocks` manifest.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManifestRow {
    pub file_name: String,
    pub file_size: i64,
    pub table_name: String,
    /// Persisted row count, or `-1` while the rows are not persisted.
    pub num_records: i64,
    pub num_features: i64,
    pub num_geometries: i64,
    /// Block definition (`ID N30;NAZEV T255`), enough to rebuild the schema.
    pub table_defn: String,
}
impl ManifestRow {
    pub fn records_persisted(&self) -> bool {
        self.num_records != RECORDS_PENDING
    }

    pub fn geometry_persisted(&self) -> bool {
        self.num_geometries > 0
    }
}
impl TryFrom<Vec<Value>> for ManifestRow {
    type Error = crate::error::Error;

    fn try_from(row: Vec<Value>) -> Result<Self> {
        let [file_name, file_size, table_name, num_records, num_features, num_geometries, table_defn] =
            <[Value; 7]>::try_from(row).ok().ok_or_raise(|| ErrorKind::InvalidData("manifest row"))?;
        let integer = |value: Value| value.as_i64().ok_or_raise(|| ErrorKind::InvalidData("manifest count"));
        let text = |value: Value| -> Result<String> {
            match value {
                Value::Text(s) => Ok(s),
                Value::Null => Ok(String::new()),
                _ => exn::bail!(ErrorKind::InvalidData("manifest text")),
            }
        };
        Ok(Self {
            file_name: text(file_name)?,
            file_size: integer(file_size)?,
            table_name: text(table_name)?,
            num_records: integer(num_records)?,
            num_features: integer(num_features)?,
            num_geometries: integer(num_geometries)?,
            table_defn: text(table_defn)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_row() {
        let row = vec![
            Value::from("sample.vfk"),
            Value::Integer(1024),
            Value::from("PAR"),
            Value::Integer(-1),
            Value::Integer(0),
            Value::Integer(0),
            Value::from("ID N30;NAZEV T20"),
        ];
        let manifest = ManifestRow::try_from(row).unwrap();
        assert_eq!(manifest.table_name, "PAR");
        assert!(!manifest.records_persisted());
        assert!(!manifest.geometry_persisted());
    }

    #[test]
    fn test_from_short_row() {
        let err = ManifestRow::try_from(vec![Value::from("PAR")]).unwrap_err();
        assert!(matches!(*err, ErrorKind::InvalidData(_)));
    }
}

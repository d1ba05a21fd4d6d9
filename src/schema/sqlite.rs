//! Schema discovery from a live SQLite database.

use rusqlite::Connection;
use tracing::debug;

use super::{ColumnSpec, EntityCatalog, SatelliteTable, SchemaError, SchemaProvider, SchemaResult};
use crate::field::FieldType;

/// Reads entity catalogs with `pragma_table_info` / `pragma_foreign_key_list`.
///
/// The entity is the table of the same name. Every table with a foreign key
/// onto it becomes a detail satellite; it is one-to-one when the foreign
/// key column is that table's whole primary key, and multiple otherwise.
pub struct SqliteSchemaProvider<'a> {
    conn: &'a Connection,
}

struct TableColumn {
    name: String,
    declared: String,
    pk: i64,
}

impl<'a> SqliteSchemaProvider<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn table_columns(&self, table: &str) -> SchemaResult<Vec<TableColumn>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, type, pk FROM pragma_table_info(?1) ORDER BY cid")?;
        let rows = stmt.query_map([table], |row| {
            Ok(TableColumn {
                name: row.get(0)?,
                declared: row.get(1)?,
                pk: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn tables(&self) -> SchemaResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        Ok(rows.collect::<Result<Vec<String>, _>>()?)
    }

    /// `(from, to)` pairs of `table`'s foreign keys onto `target`.
    fn foreign_keys(&self, table: &str, target: &str) -> SchemaResult<Vec<(String, Option<String>)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT \"from\", \"to\" FROM pragma_foreign_key_list(?1) WHERE \"table\" = ?2")?;
        let rows = stmt.query_map([table, target], |row| Ok((row.get(0)?, row.get(1)?)))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

fn column_spec(column: &TableColumn) -> ColumnSpec {
    ColumnSpec::new(&column.name, FieldType::from_declared(&column.declared))
}

impl SchemaProvider for SqliteSchemaProvider<'_> {
    fn entity(&self, name: &str) -> SchemaResult<EntityCatalog> {
        let columns = self.table_columns(name)?;
        if columns.is_empty() {
            return Err(SchemaError::UnknownEntity(name.into()));
        }

        let pks: Vec<&TableColumn> = columns.iter().filter(|c| c.pk > 0).collect();
        let key = match pks.as_slice() {
            [single] => single.name.clone(),
            _ => "id".into(),
        };

        let mut catalog = EntityCatalog::new(name, name).with_key(&key);
        catalog.columns = columns.iter().map(column_spec).collect();

        for table in self.tables()? {
            if table == name {
                continue;
            }
            for (from, to) in self.foreign_keys(&table, name)? {
                let sat_columns = self.table_columns(&table)?;
                let sat_pks: Vec<&str> = sat_columns
                    .iter()
                    .filter(|c| c.pk > 0)
                    .map(|c| c.name.as_str())
                    .collect();

                let mut satellite = SatelliteTable::new(&table, &table, &from);
                satellite.entity_column = to.unwrap_or_else(|| key.clone());
                satellite.multiple = sat_pks != [from.as_str()];
                satellite.columns = sat_columns
                    .iter()
                    .filter(|c| c.name != from)
                    .map(column_spec)
                    .collect();

                debug!(entity = name, satellite = %table, multiple = satellite.multiple, "discovered satellite");
                catalog.satellites.push(satellite);
            }
        }

        Ok(catalog)
    }
}

//! SQL building blocks for provider subset strings.
//!
//! Every identifier goes through [`quote_identifier`] and every value
//! through [`SqlDialect::quote_literal`]; nothing user-controlled is ever
//! spliced into a statement unquoted.

use crate::datasource::{DataSource, OgrFormat};
use crate::types::MapLayer;

/// SQL flavour of the database holding a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlDialect {
    /// PostgreSQL with PostGIS.
    PostgreSql,
    /// SQLite with SpatiaLite geometries.
    SpatiaLite,
    /// SQLite with GeoPackage geometry blobs, read through SpatiaLite.
    GeoPackage,
}

/// Quotes an SQL identifier, doubling embedded double quotes.
#[must_use]
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

impl SqlDialect {
    /// Quotes a string literal.
    ///
    /// Single quotes are doubled. On PostgreSQL a value containing a
    /// backslash is emitted as an `E''` literal with doubled backslashes, so
    /// the result does not depend on `standard_conforming_strings`.
    #[must_use]
    pub fn quote_literal(self, value: &str) -> String {
        let escaped = value.replace('\'', "''");
        match self {
            Self::PostgreSql if value.contains('\\') => {
                format!("E'{}'", escaped.replace('\\', "\\\\"))
            }
            _ => format!("'{escaped}'"),
        }
    }

    /// Predicate testing that `token` is one of the comma separated entries
    /// of `column` (spaces ignored).
    #[must_use]
    pub fn membership(self, column: &str, token: &str) -> String {
        let position = match self {
            Self::PostgreSql => "strpos",
            Self::SpatiaLite | Self::GeoPackage => "instr",
        };
        format!(
            "{position}(',' || replace({column}, ' ', '') || ',', {}) > 0",
            self.quote_literal(&format!(",{token},"))
        )
    }

    /// Wraps a geometry column expression so spatial functions accept it.
    #[must_use]
    pub fn geometry(self, column: &str) -> String {
        match self {
            Self::GeoPackage => format!("GeomFromGPB({column})"),
            Self::PostgreSql | Self::SpatiaLite => column.to_string(),
        }
    }
}

/// A layer's table as seen from SQL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlTable {
    pub dialect: SqlDialect,
    /// Quoted, schema-qualified when applicable.
    pub qualified_name: String,
    /// Unquoted geometry column name.
    pub geometry_column: String,
    pub srid: Option<u32>,
}

impl SqlTable {
    /// Builds the table reference for a layer.
    ///
    /// Returns `None` for providers without an SQL backend this module can
    /// target, or when no geometry column is known.
    #[must_use]
    pub fn from_layer(layer: &MapLayer) -> Option<Self> {
        let geometry_column = layer.geometry_column()?.to_string();
        let (dialect, qualified_name, uri_srid) = match &layer.datasource {
            DataSource::Postgres(pg) => {
                let table = match &pg.schema {
                    Some(schema) => {
                        format!("{}.{}", quote_identifier(schema), quote_identifier(&pg.table))
                    }
                    None => quote_identifier(&pg.table),
                };
                (SqlDialect::PostgreSql, table, pg.srid)
            }
            DataSource::SpatiaLite(sl) => {
                (SqlDialect::SpatiaLite, quote_identifier(&sl.table), None)
            }
            DataSource::Ogr(ogr) => {
                let dialect = match ogr.format {
                    OgrFormat::GeoPackage => SqlDialect::GeoPackage,
                    OgrFormat::Sqlite => SqlDialect::SpatiaLite,
                    OgrFormat::Other => return None,
                };
                (dialect, quote_identifier(ogr.table()?), None)
            }
            DataSource::Other { .. } => return None,
        };

        Some(Self {
            dialect,
            qualified_name,
            geometry_column,
            srid: layer.srid.or(uri_srid),
        })
    }
}

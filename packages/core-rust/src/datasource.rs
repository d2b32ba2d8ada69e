//! QGIS datasource URI parsing.
//!
//! Two URI families are understood:
//!
//! - key/value URIs used by the `postgres` and `spatialite` providers:
//!   `dbname='gis' host=db port=5432 key='id' srid=2154 table="public"."zones" (geom) sql=`
//! - OGR URIs: `./data/zones.gpkg|layername=zones`
//!
//! Everything else is kept verbatim as [`DataSource::Other`].

use std::iter::Peekable;
use std::path::{Path, PathBuf};
use std::str::CharIndices;

const DEFAULT_PG_PORT: &str = "5432";

/// Where a layer's features live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    Postgres(PostgresUri),
    SpatiaLite(SpatiaLiteUri),
    Ogr(OgrUri),
    Other { provider: String, uri: String },
}

/// Identity of a PostgreSQL database: two tables can only be joined in one
/// query when this matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PgConnection {
    pub service: Option<String>,
    pub host: Option<String>,
    pub port: String,
    pub dbname: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostgresUri {
    pub connection: PgConnection,
    pub schema: Option<String>,
    pub table: String,
    pub geometry_column: Option<String>,
    pub key: Option<String>,
    pub srid: Option<u32>,
    /// Provider-side filter already set on the layer.
    pub sql: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpatiaLiteUri {
    pub path: PathBuf,
    pub table: String,
    pub geometry_column: Option<String>,
}

/// File formats reachable through the OGR provider that matter for SQL subsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OgrFormat {
    GeoPackage,
    Sqlite,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OgrUri {
    pub path: PathBuf,
    pub layer_name: Option<String>,
    pub format: OgrFormat,
}

impl OgrUri {
    /// Table name: explicit `layername`, else the file stem (single-layer files).
    #[must_use]
    pub fn table(&self) -> Option<&str> {
        self.layer_name
            .as_deref()
            .or_else(|| self.path.file_stem().and_then(|s| s.to_str()))
    }
}

impl DataSource {
    /// Parses a datasource URI for the given provider key.
    ///
    /// Relative file paths are resolved against `base_dir` (the project
    /// directory) when given.
    #[must_use]
    pub fn parse(provider: &str, uri: &str, base_dir: Option<&Path>) -> Self {
        let other = || Self::Other {
            provider: provider.to_string(),
            uri: uri.to_string(),
        };

        match provider {
            "postgres" => {
                let kv = KeyValueUri::parse(uri);
                let Some(table) = kv.table.clone() else {
                    return other();
                };
                Self::Postgres(PostgresUri {
                    connection: PgConnection {
                        service: kv.get("service"),
                        host: kv.get("host"),
                        port: kv.get("port").unwrap_or_else(|| DEFAULT_PG_PORT.to_string()),
                        dbname: kv.get("dbname"),
                    },
                    schema: kv.schema.clone(),
                    table,
                    geometry_column: kv.geometry_column.clone(),
                    key: kv.get("key"),
                    srid: kv.get("srid").and_then(|s| s.parse().ok()),
                    sql: kv.sql.clone(),
                })
            }
            "spatialite" => {
                let kv = KeyValueUri::parse(uri);
                let (Some(table), Some(dbname)) = (kv.table.clone(), kv.get("dbname")) else {
                    return other();
                };
                Self::SpatiaLite(SpatiaLiteUri {
                    path: resolve_path(&dbname, base_dir),
                    table,
                    geometry_column: kv.geometry_column,
                })
            }
            "ogr" => parse_ogr(uri, base_dir),
            _ => other(),
        }
    }

    /// Geometry column of the table backing this source.
    ///
    /// OGR URIs do not carry it; the GDAL driver defaults are used
    /// (`geom` for GeoPackage, `GEOMETRY` for SQLite).
    #[must_use]
    pub fn geometry_column(&self) -> Option<&str> {
        match self {
            Self::Postgres(pg) => pg.geometry_column.as_deref(),
            Self::SpatiaLite(sl) => sl.geometry_column.as_deref(),
            Self::Ogr(ogr) => match ogr.format {
                OgrFormat::GeoPackage => Some("geom"),
                OgrFormat::Sqlite => Some("GEOMETRY"),
                OgrFormat::Other => None,
            },
            Self::Other { .. } => None,
        }
    }

    /// Whether both sources live in the same database, so a single SQL
    /// statement can reference both tables.
    #[must_use]
    pub fn same_database(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Postgres(a), Self::Postgres(b)) => a.connection == b.connection,
            (Self::SpatiaLite(a), Self::SpatiaLite(b)) => a.path == b.path,
            (Self::Ogr(a), Self::Ogr(b)) => {
                a.format != OgrFormat::Other && a.format == b.format && a.path == b.path
            }
            _ => false,
        }
    }
}

fn parse_ogr(uri: &str, base_dir: Option<&Path>) -> DataSource {
    let mut parts = uri.split('|');
    let path = resolve_path(parts.next().unwrap_or_default().trim(), base_dir);
    let layer_name = parts
        .filter_map(|part| part.split_once('='))
        .find(|(k, _)| k.eq_ignore_ascii_case("layername"))
        .map(|(_, v)| v.to_string());

    let format = match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("gpkg") => OgrFormat::GeoPackage,
        Some("sqlite" | "db") => OgrFormat::Sqlite,
        _ => OgrFormat::Other,
    };

    DataSource::Ogr(OgrUri {
        path,
        layer_name,
        format,
    })
}

fn resolve_path(raw: &str, base_dir: Option<&Path>) -> PathBuf {
    let path = Path::new(raw);
    match base_dir {
        Some(base) if path.is_relative() => base.join(path).components().collect(),
        _ => path.components().collect(),
    }
}

// ---------------------------------------------------------------------------
// Key/value URI tokenizer
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct KeyValueUri {
    pairs: Vec<(String, String)>,
    schema: Option<String>,
    table: Option<String>,
    geometry_column: Option<String>,
    sql: Option<String>,
}

type Cursor<'a> = Peekable<CharIndices<'a>>;

impl KeyValueUri {
    fn parse(uri: &str) -> Self {
        let mut out = Self::default();
        let mut chars = uri.char_indices().peekable();

        loop {
            skip_whitespace(&mut chars);
            if chars.peek().is_none() {
                break;
            }

            let mut key = String::new();
            while let Some(&(_, c)) = chars.peek() {
                if c == '=' || c.is_whitespace() {
                    break;
                }
                key.push(c);
                chars.next();
            }
            if peek_char(&mut chars) != Some('=') {
                // Stray token without a value.
                continue;
            }
            chars.next();

            match key.as_str() {
                "sql" => {
                    let start = chars.peek().map_or(uri.len(), |&(i, _)| i);
                    let sql = uri[start..].trim();
                    out.sql = (!sql.is_empty()).then(|| sql.to_string());
                    break;
                }
                "table" => {
                    let first = read_value(&mut chars, true);
                    if peek_char(&mut chars) == Some('.') {
                        chars.next();
                        out.schema = Some(first);
                        out.table = Some(read_value(&mut chars, true));
                    } else {
                        out.table = Some(first);
                    }

                    let mut look = chars.clone();
                    skip_whitespace(&mut look);
                    if peek_char(&mut look) == Some('(') {
                        look.next();
                        let column: String = look.by_ref().map(|(_, c)| c).take_while(|&c| c != ')').collect();
                        let column = column.trim();
                        out.geometry_column = (!column.is_empty()).then(|| column.to_string());
                        chars = look;
                    }
                }
                _ => {
                    let value = read_value(&mut chars, false);
                    out.pairs.push((key, value));
                }
            }
        }

        out
    }

    fn get(&self, key: &str) -> Option<String> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
            .filter(|v| !v.is_empty())
    }
}

fn peek_char(chars: &mut Cursor<'_>) -> Option<char> {
    chars.peek().map(|&(_, c)| c)
}

fn skip_whitespace(chars: &mut Cursor<'_>) {
    while peek_char(chars).is_some_and(char::is_whitespace) {
        chars.next();
    }
}

/// Reads a single value, quoted (`'..'` / `".."`) or bare.
///
/// Quoted values accept backslash escapes and doubled quotes.
fn read_value(chars: &mut Cursor<'_>, stop_at_dot: bool) -> String {
    let mut value = String::new();
    match peek_char(chars) {
        Some(quote @ ('\'' | '"')) => {
            chars.next();
            while let Some((_, c)) = chars.next() {
                if c == '\\' {
                    if let Some((_, escaped)) = chars.next() {
                        value.push(escaped);
                    }
                } else if c == quote {
                    if peek_char(chars) == Some(quote) {
                        chars.next();
                        value.push(quote);
                    } else {
                        break;
                    }
                } else {
                    value.push(c);
                }
            }
        }
        _ => {
            while let Some(c) = peek_char(chars) {
                if c.is_whitespace() || (stop_at_dot && c == '.') {
                    break;
                }
                value.push(c);
                chars.next();
            }
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn postgres_uri_with_host() {
        let uri = "dbname='gis' host=db.example.org port=5433 user='lizmap' sslmode=disable \
                   key='id' srid=2154 type=MultiPolygon checkPrimaryKeyUnicity='1' \
                   table=\"public\".\"zones\" (geom) sql=";
        let DataSource::Postgres(pg) = DataSource::parse("postgres", uri, None) else {
            panic!("expected postgres datasource");
        };
        assert_eq!(pg.connection.dbname.as_deref(), Some("gis"));
        assert_eq!(pg.connection.host.as_deref(), Some("db.example.org"));
        assert_eq!(pg.connection.port, "5433");
        assert_eq!(pg.schema.as_deref(), Some("public"));
        assert_eq!(pg.table, "zones");
        assert_eq!(pg.geometry_column.as_deref(), Some("geom"));
        assert_eq!(pg.key.as_deref(), Some("id"));
        assert_eq!(pg.srid, Some(2154));
    }

    #[test]
    fn postgres_uri_with_service_and_sql() {
        let uri = "service='lizmap' key='fid' table=\"my \"\"odd\"\" schema\".\"t\" (the_geom) sql=\"kind\" = 'a b'";
        let DataSource::Postgres(pg) = DataSource::parse("postgres", uri, None) else {
            panic!("expected postgres datasource");
        };
        assert_eq!(pg.connection.service.as_deref(), Some("lizmap"));
        assert_eq!(pg.connection.port, DEFAULT_PG_PORT);
        assert_eq!(pg.schema.as_deref(), Some("my \"odd\" schema"));
        assert_eq!(pg.table, "t");
        assert_eq!(pg.geometry_column.as_deref(), Some("the_geom"));
        assert_eq!(pg.sql.as_deref(), Some("\"kind\" = 'a b'"));
    }

    #[test]
    fn postgres_uri_without_table_is_other() {
        let ds = DataSource::parse("postgres", "dbname='gis'", None);
        assert!(matches!(ds, DataSource::Other { .. }));
    }

    #[test]
    fn quoted_values_with_escapes() {
        let kv = KeyValueUri::parse(r"password='it\'s' user='a''b' table=zones");
        assert_eq!(kv.get("password").as_deref(), Some("it's"));
        assert_eq!(kv.get("user").as_deref(), Some("a'b"));
        assert_eq!(kv.table.as_deref(), Some("zones"));
        assert!(kv.schema.is_none());
        assert!(kv.geometry_column.is_none());
    }

    #[test]
    fn spatialite_uri_is_resolved_against_project_dir() {
        let uri = "dbname='./data/db.sqlite' table=\"zones\" (geometry) sql=";
        let ds = DataSource::parse("spatialite", uri, Some(Path::new("/srv/projects")));
        let DataSource::SpatiaLite(sl) = ds else {
            panic!("expected spatialite datasource");
        };
        assert_eq!(sl.path, PathBuf::from("/srv/projects/data/db.sqlite"));
        assert_eq!(sl.table, "zones");
        assert_eq!(sl.geometry_column.as_deref(), Some("geometry"));
    }

    #[test]
    fn ogr_geopackage_uri() {
        let ds = DataSource::parse(
            "ogr",
            "./data/city.gpkg|layername=parcels|subset=\"a\" = 1",
            Some(Path::new("/srv/projects")),
        );
        let DataSource::Ogr(ogr) = &ds else {
            panic!("expected ogr datasource");
        };
        assert_eq!(ogr.path, PathBuf::from("/srv/projects/data/city.gpkg"));
        assert_eq!(ogr.layer_name.as_deref(), Some("parcels"));
        assert_eq!(ogr.format, OgrFormat::GeoPackage);
        assert_eq!(ogr.table(), Some("parcels"));
        assert_eq!(ds.geometry_column(), Some("geom"));
    }

    #[test]
    fn ogr_shapefile_has_no_geometry_column() {
        let ds = DataSource::parse("ogr", "/data/zones.shp", None);
        let DataSource::Ogr(ogr) = &ds else {
            panic!("expected ogr datasource");
        };
        assert_eq!(ogr.format, OgrFormat::Other);
        assert_eq!(ogr.table(), Some("zones"));
        assert_eq!(ds.geometry_column(), None);
    }

    #[test]
    fn same_database_rules() {
        let a = DataSource::parse("postgres", "dbname='gis' host=db table=\"public\".\"a\" (geom)", None);
        let b = DataSource::parse("postgres", "dbname='gis' host=db port=5432 table=\"s\".\"b\" (geom)", None);
        let c = DataSource::parse("postgres", "dbname='other' host=db table=\"public\".\"c\" (geom)", None);
        assert!(a.same_database(&b));
        assert!(!a.same_database(&c));

        let g1 = DataSource::parse("ogr", "/d/city.gpkg|layername=a", None);
        let g2 = DataSource::parse("ogr", "/d/city.gpkg|layername=b", None);
        let g3 = DataSource::parse("ogr", "/d/other.gpkg|layername=b", None);
        let s1 = DataSource::parse("ogr", "/d/a.shp", None);
        let s2 = DataSource::parse("ogr", "/d/a.shp", None);
        assert!(g1.same_database(&g2));
        assert!(!g1.same_database(&g3));
        assert!(!s1.same_database(&s2));
        assert!(!a.same_database(&g1));
    }
}

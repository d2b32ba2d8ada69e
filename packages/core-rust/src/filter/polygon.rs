//! Filter by polygon: per-request subset predicate for a vector layer.
//!
//! Decision order:
//!
//! 1. no group and no login → no filter
//! 2. no CFG, or the layer is not published in it → no filter
//! 3. no `filter_by_polygon` rule for the layer, or the rule's mode does not
//!    match the edition context → no filter
//! 4. rule unreadable or invalid for this project → hide everything
//! 5. otherwise → `"pk" IN (SELECT ... WHERE <group membership>)`
//!
//! Steps 4 and 5 never grant more than the configuration allows: every
//! failure ends with [`HIDE_ALL`].

use std::collections::HashSet;

use tracing::{debug, error, warn};

use super::config::{FilterMode, FilterRule, SpatialRelationship};
use super::sql::{quote_identifier, SqlTable};
use crate::cfg::{get_lizmap_layers_config, LizmapConfig};
use crate::context::RequestContext;
use crate::project::Project;
use crate::types::MapLayer;

/// Predicate that is false for every feature, in both OGR and PostgreSQL.
pub const HIDE_ALL: &str = "1 = 0";

/// Outcome of the evaluation for one layer and one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubsetDecision {
    /// Filtering does not apply; the layer is served as is.
    Unfiltered,
    /// Subset string to apply to the layer.
    Filter(String),
}

impl SubsetDecision {
    #[must_use]
    pub fn hide_all() -> Self {
        Self::Filter(HIDE_ALL.to_string())
    }

    /// The subset string, if filtering applies.
    #[must_use]
    pub fn filter(&self) -> Option<&str> {
        match self {
            Self::Unfiltered => None,
            Self::Filter(sql) => Some(sql),
        }
    }
}

/// The rule cannot be applied to this project.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidFilter {
    #[error("polygon layer {id} not found in the project")]
    PolygonLayerNotFound { id: String },
    #[error("polygon layer {id} is not a vector layer")]
    PolygonLayerNotVector { id: String },
    #[error("primary key field {field} not found in layer {layer}")]
    MissingPrimaryKey { field: String, layer: String },
    #[error("group field {field} not found in polygon layer {layer}")]
    MissingGroupField { field: String, layer: String },
    #[error("layer {layer} has no geometry column")]
    MissingGeometryColumn { layer: String },
    #[error("layer {layer} uses provider {provider}, which has no SQL backend")]
    UnsupportedProvider { layer: String, provider: String },
    #[error("layers {layer} and {polygon} are not stored in the same database")]
    DifferentDatabases { layer: String, polygon: String },
}

/// A rule bound to the resolved target and polygon layers.
#[derive(Debug)]
pub struct FilterByPolygon<'a> {
    rule: FilterRule,
    layer: &'a MapLayer,
    polygon: Option<&'a MapLayer>,
    editing: bool,
}

impl<'a> FilterByPolygon<'a> {
    #[must_use]
    pub fn new(rule: FilterRule, project: &'a Project, layer: &'a MapLayer, editing: bool) -> Self {
        let polygon = project.map_layer(&rule.polygon.polygon_layer_id);
        Self {
            rule,
            layer,
            polygon,
            editing,
        }
    }

    /// Whether the rule is active for the current edition context.
    #[must_use]
    pub fn is_filtered(&self) -> bool {
        match self.rule.filter_mode {
            FilterMode::Login => !self.editing,
            FilterMode::Editing => self.editing,
            FilterMode::Both => true,
        }
    }

    /// Checks the rule against the project.
    ///
    /// # Errors
    ///
    /// Returns the first [`InvalidFilter`] reason found.
    pub fn validate(&self) -> Result<(), InvalidFilter> {
        self.tables().map(|_| ())
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Builds the subset string for the identities of `ctx`.
    ///
    /// Without any usable identity the result is [`HIDE_ALL`].
    ///
    /// # Errors
    ///
    /// Returns [`InvalidFilter`] when the rule does not validate.
    pub fn subset_sql(&self, ctx: &RequestContext) -> Result<String, InvalidFilter> {
        let (layer_table, polygon_table) = self.tables()?;

        let tokens = self.identities(ctx);
        if tokens.is_empty() {
            return Ok(HIDE_ALL.to_string());
        }

        let dialect = layer_table.dialect;
        let pk = quote_identifier(&self.rule.primary_key_field);

        let layer_geom = dialect.geometry(&format!(
            "l.{}",
            quote_identifier(&layer_table.geometry_column)
        ));
        let mut polygon_geom = dialect.geometry(&format!(
            "p.{}",
            quote_identifier(&polygon_table.geometry_column)
        ));
        if let (Some(layer_srid), Some(polygon_srid)) = (layer_table.srid, polygon_table.srid) {
            if layer_srid != polygon_srid {
                polygon_geom = format!("ST_Transform({polygon_geom}, {layer_srid})");
            }
        }

        let relation = match self.rule.spatial_relationship {
            SpatialRelationship::Intersects => "ST_Intersects",
            SpatialRelationship::Within => "ST_Within",
        };

        let group_column = format!("p.{}", quote_identifier(&self.rule.polygon.group_field));
        let membership = tokens
            .iter()
            .map(|token| dialect.membership(&group_column, token))
            .collect::<Vec<_>>()
            .join(" OR ");

        Ok(format!(
            "{pk} IN (SELECT l.{pk} FROM {} AS l JOIN {} AS p ON {relation}({layer_geom}, {polygon_geom}) WHERE ({membership}))",
            layer_table.qualified_name, polygon_table.qualified_name,
        ))
    }

    fn tables(&self) -> Result<(SqlTable, SqlTable), InvalidFilter> {
        let polygon_id = &self.rule.polygon.polygon_layer_id;
        let polygon = self.polygon.ok_or_else(|| InvalidFilter::PolygonLayerNotFound {
            id: polygon_id.clone(),
        })?;
        if !polygon.is_vector() {
            return Err(InvalidFilter::PolygonLayerNotVector {
                id: polygon_id.clone(),
            });
        }
        if !self.layer.has_field(&self.rule.primary_key_field) {
            return Err(InvalidFilter::MissingPrimaryKey {
                field: self.rule.primary_key_field.clone(),
                layer: self.layer.name.clone(),
            });
        }
        if !polygon.has_field(&self.rule.polygon.group_field) {
            return Err(InvalidFilter::MissingGroupField {
                field: self.rule.polygon.group_field.clone(),
                layer: polygon.name.clone(),
            });
        }

        let layer_table = sql_table(self.layer)?;
        let polygon_table = sql_table(polygon)?;
        if !self.layer.datasource.same_database(&polygon.datasource)
            || layer_table.dialect != polygon_table.dialect
        {
            return Err(InvalidFilter::DifferentDatabases {
                layer: self.layer.name.clone(),
                polygon: polygon.name.clone(),
            });
        }
        Ok((layer_table, polygon_table))
    }

    /// Tokens matched against the polygon group field: the groups, or the
    /// login when the rule filters by user.
    fn identities(&self, ctx: &RequestContext) -> Vec<String> {
        let raw: Vec<&str> = if self.rule.polygon.filter_by_user {
            ctx.user_login.iter().map(String::as_str).collect()
        } else {
            ctx.groups.iter().map(String::as_str).collect()
        };

        let mut seen = HashSet::new();
        raw.into_iter()
            .filter_map(normalize_identity)
            .filter(|token| seen.insert(token.clone()))
            .collect()
    }
}

fn sql_table(layer: &MapLayer) -> Result<SqlTable, InvalidFilter> {
    if layer.geometry_column().is_none() {
        return Err(InvalidFilter::MissingGeometryColumn {
            layer: layer.name.clone(),
        });
    }
    SqlTable::from_layer(layer).ok_or_else(|| InvalidFilter::UnsupportedProvider {
        layer: layer.name.clone(),
        provider: layer.provider.clone(),
    })
}

/// Normalizes an identity the way the group field is normalized in SQL
/// (spaces removed). Names that cannot appear in a comma separated list
/// are dropped.
fn normalize_identity(name: &str) -> Option<String> {
    let token = name.trim().replace(' ', "");
    if token.is_empty() {
        return None;
    }
    if token.contains([',', '\0']) {
        warn!(identity = %name, "identity cannot match a comma separated group field, ignored");
        return None;
    }
    Some(token)
}

/// Runs the whole decision for one request and one layer.
///
/// Never fails: configuration problems resolve to [`HIDE_ALL`] and are
/// logged at `error` level.
#[must_use]
pub fn evaluate(
    ctx: &RequestContext,
    cfg: Option<&LizmapConfig>,
    project: &Project,
    layer: &MapLayer,
) -> SubsetDecision {
    if ctx.is_anonymous() {
        return SubsetDecision::Unfiltered;
    }

    let Some(cfg) = cfg else {
        return SubsetDecision::Unfiltered;
    };
    let Some(cfg_layers) = get_lizmap_layers_config(cfg) else {
        return SubsetDecision::Unfiltered;
    };
    if !cfg_layers.contains_key(&layer.name) {
        return SubsetDecision::Unfiltered;
    }

    let rule = match FilterRule::load(cfg.filter_by_polygon(), &layer.id) {
        Ok(Some(rule)) => rule,
        Ok(None) => return SubsetDecision::Unfiltered,
        Err(e) => {
            error!(
                layer = %layer.name,
                error = %e,
                "filter by polygon configuration cannot be read, all features are hidden"
            );
            return SubsetDecision::hide_all();
        }
    };

    let filter = FilterByPolygon::new(rule, project, layer, ctx.editing);
    if !filter.is_filtered() {
        return SubsetDecision::Unfiltered;
    }

    if let Err(e) = filter.validate() {
        error!(
            layer = %layer.name,
            error = %e,
            "filter by polygon configuration is not valid, all features are hidden"
        );
        return SubsetDecision::hide_all();
    }

    match filter.subset_sql(ctx) {
        Ok(sql) => {
            debug!(layer = %layer.name, filter = %sql, "filter by polygon applied");
            SubsetDecision::Filter(sql)
        }
        Err(e) => {
            error!(
                layer = %layer.name,
                error = %e,
                "filter by polygon subset cannot be built, all features are hidden"
            );
            SubsetDecision::hide_all()
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde_json::{json, Value};

    use super::*;
    use crate::datasource::DataSource;
    use crate::filter::sql::SqlDialect;
    use crate::types::LayerKind;

    const PG: &str = "dbname='gis' host=db port=5432";

    fn pg_layer(id: &str, name: &str, table: &str, fields: &[&str], srid: u32) -> MapLayer {
        let uri = format!("{PG} key='id' srid={srid} table=\"public\".\"{table}\" (geom)");
        MapLayer {
            id: id.to_string(),
            name: name.to_string(),
            short_name: None,
            kind: LayerKind::Vector,
            provider: "postgres".to_string(),
            datasource: DataSource::parse("postgres", &uri, None),
            fields: fields.iter().map(|f| (*f).to_string()).collect(),
            srid: Some(srid),
        }
    }

    fn gpkg_layer(id: &str, name: &str, fields: &[&str]) -> MapLayer {
        MapLayer {
            id: id.to_string(),
            name: name.to_string(),
            short_name: None,
            kind: LayerKind::Vector,
            provider: "ogr".to_string(),
            datasource: DataSource::parse("ogr", &format!("/data/city.gpkg|layername={name}"), None),
            fields: fields.iter().map(|f| (*f).to_string()).collect(),
            srid: Some(2154),
        }
    }

    fn project() -> Project {
        Project::new(
            "/srv/city.qgs",
            vec![
                pg_layer("restricted_1", "restricted", "restricted", &["pk_field", "name"], 2154),
                pg_layer("zones_2", "zones", "zones", &["id", "groups"], 2154),
                pg_layer("parcels_3", "parcels", "parcels", &["id"], 2154),
                pg_layer("trees_4", "trees", "trees", &["id"], 4326),
                gpkg_layer("roads_5", "roads", &["fid"]),
                gpkg_layer("areas_6", "areas", &["fid", "allowed"]),
            ],
        )
    }

    fn rule_entry(layer: &str, pk: &str, mode: &str, relation: &str) -> Value {
        json!({"layer": layer, "primary_key": pk, "filter_mode": mode, "spatial_relationship": relation})
    }

    fn cfg_with(polygon_layer: &str, group_field: &str, entries: Vec<Value>) -> LizmapConfig {
        LizmapConfig::from_value(json!({
            "layers": {
                "restricted": {}, "zones": {}, "trees": {}, "roads": {}, "areas": {}
            },
            "filter_by_polygon": {
                "config": {"polygon_layer_id": polygon_layer, "group_field": group_field},
                "layers": entries,
            }
        }))
        .unwrap()
    }

    fn default_cfg() -> LizmapConfig {
        cfg_with(
            "zones_2",
            "groups",
            vec![
                rule_entry("restricted_1", "pk_field", "display_and_editing", "intersects"),
                rule_entry("trees_4", "id", "display", "contains"),
                rule_entry("roads_5", "fid", "editing", "intersects"),
            ],
        )
    }

    fn groups(names: &[&str]) -> RequestContext {
        RequestContext {
            groups: names.iter().map(|g| (*g).to_string()).collect(),
            user_login: None,
            editing: false,
        }
    }

    fn eval(ctx: &RequestContext, cfg: Option<&LizmapConfig>, layer_name: &str) -> SubsetDecision {
        let project = project();
        let layer = project.vector_layer(layer_name).unwrap().clone();
        evaluate(ctx, cfg, &project, &layer)
    }

    #[test]
    fn anonymous_request_is_unfiltered() {
        let cfg = default_cfg();
        let decision = eval(&RequestContext::anonymous(), Some(&cfg), "restricted");
        assert_eq!(decision, SubsetDecision::Unfiltered);
    }

    #[test]
    fn no_cfg_or_unpublished_layer_is_unfiltered() {
        let ctx = groups(&["editors"]);
        assert_eq!(eval(&ctx, None, "restricted"), SubsetDecision::Unfiltered);

        // "parcels" is not in the CFG layers section.
        let cfg = default_cfg();
        assert_eq!(eval(&ctx, Some(&cfg), "parcels"), SubsetDecision::Unfiltered);

        let empty = LizmapConfig::from_value(json!({"layers": {}})).unwrap();
        assert_eq!(eval(&ctx, Some(&empty), "restricted"), SubsetDecision::Unfiltered);
    }

    #[test]
    fn layer_without_rule_is_unfiltered() {
        let ctx = groups(&["editors"]);
        let cfg = default_cfg();
        assert_eq!(eval(&ctx, Some(&cfg), "zones"), SubsetDecision::Unfiltered);
    }

    #[test]
    fn postgres_predicate_for_editors() {
        let cfg = default_cfg();
        let decision = eval(&groups(&["editors"]), Some(&cfg), "restricted");
        assert_eq!(
            decision.filter(),
            Some(
                "\"pk_field\" IN (SELECT l.\"pk_field\" FROM \"public\".\"restricted\" AS l \
                 JOIN \"public\".\"zones\" AS p ON ST_Intersects(l.\"geom\", p.\"geom\") \
                 WHERE (strpos(',' || replace(p.\"groups\", ' ', '') || ',', ',editors,') > 0))"
            )
        );
    }

    #[test]
    fn several_groups_are_or_combined_once() {
        let cfg = default_cfg();
        let decision = eval(&groups(&["editors", " admins ", "editors", ""]), Some(&cfg), "restricted");
        let sql = decision.filter().unwrap();
        assert_eq!(sql.matches(" OR ").count(), 1);
        assert!(sql.contains("',editors,'"));
        assert!(sql.contains("',admins,'"));
    }

    #[test]
    fn within_relationship_and_reprojection() {
        let cfg = default_cfg();
        let sql = eval(&groups(&["editors"]), Some(&cfg), "trees")
            .filter()
            .unwrap()
            .to_string();
        assert!(sql.contains("ST_Within(l.\"geom\", ST_Transform(p.\"geom\", 4326))"));
    }

    #[test]
    fn geopackage_predicate() {
        let cfg = cfg_with(
            "areas_6",
            "allowed",
            vec![rule_entry("roads_5", "fid", "display_and_editing", "intersects")],
        );
        let sql = eval(&groups(&["field team"]), Some(&cfg), "roads")
            .filter()
            .unwrap()
            .to_string();
        assert_eq!(
            sql,
            "\"fid\" IN (SELECT l.\"fid\" FROM \"roads\" AS l JOIN \"areas\" AS p \
             ON ST_Intersects(GeomFromGPB(l.\"geom\"), GeomFromGPB(p.\"geom\")) \
             WHERE (instr(',' || replace(p.\"allowed\", ' ', '') || ',', ',fieldteam,') > 0))"
        );
    }

    #[test]
    fn filter_mode_against_edition_context() {
        let cfg = default_cfg();

        // Login mode: only outside editing sessions.
        let mut ctx = groups(&["editors"]);
        ctx.editing = true;
        assert_eq!(eval(&ctx, Some(&cfg), "trees"), SubsetDecision::Unfiltered);
        ctx.editing = false;
        assert!(eval(&ctx, Some(&cfg), "trees").filter().is_some());

        // Editing mode: only inside editing sessions. "roads" lives in a
        // GeoPackage while "zones" lives in PostgreSQL, so once active the
        // rule is invalid and hides everything.
        assert_eq!(eval(&ctx, Some(&cfg), "roads"), SubsetDecision::Unfiltered);
        ctx.editing = true;
        assert_eq!(eval(&ctx, Some(&cfg), "roads"), SubsetDecision::hide_all());

        // Both: always.
        assert!(eval(&ctx, Some(&cfg), "restricted").filter().unwrap().contains("IN (SELECT"));
    }

    #[test]
    fn missing_primary_key_hides_everything() {
        let cfg = cfg_with(
            "zones_2",
            "groups",
            vec![rule_entry("restricted_1", "unknown", "display_and_editing", "intersects")],
        );
        assert_eq!(
            eval(&groups(&["editors"]), Some(&cfg), "restricted"),
            SubsetDecision::hide_all()
        );
    }

    #[test]
    fn invalid_polygon_layer_hides_everything() {
        for (polygon, field) in [("missing", "groups"), ("zones_2", "missing"), ("parcels_3", "groups")] {
            let cfg = cfg_with(
                polygon,
                field,
                vec![rule_entry("restricted_1", "pk_field", "display_and_editing", "intersects")],
            );
            assert_eq!(
                eval(&groups(&["editors"]), Some(&cfg), "restricted"),
                SubsetDecision::hide_all(),
                "polygon layer {polygon} / field {field}"
            );
        }
    }

    #[test]
    fn unreadable_rule_hides_everything() {
        let cfg = cfg_with(
            "zones_2",
            "groups",
            vec![rule_entry("restricted_1", "pk_field", "sometimes", "intersects")],
        );
        assert_eq!(
            eval(&groups(&["editors"]), Some(&cfg), "restricted"),
            SubsetDecision::hide_all()
        );
    }

    #[test]
    fn login_without_groups_hides_everything() {
        let cfg = default_cfg();
        let ctx = RequestContext {
            groups: Vec::new(),
            user_login: Some("alice".to_string()),
            editing: false,
        };
        assert_eq!(eval(&ctx, Some(&cfg), "restricted"), SubsetDecision::hide_all());
    }

    #[test]
    fn filter_by_user_matches_login() {
        let cfg = LizmapConfig::from_value(json!({
            "layers": {"restricted": {}},
            "filter_by_polygon": {
                "config": {"polygon_layer_id": "zones_2", "group_field": "groups", "filter_by_user": true},
                "layers": [rule_entry("restricted_1", "pk_field", "display_and_editing", "intersects")],
            }
        }))
        .unwrap();
        let ctx = RequestContext {
            groups: vec!["editors".to_string()],
            user_login: Some("alice".to_string()),
            editing: false,
        };
        let sql = eval(&ctx, Some(&cfg), "restricted").filter().unwrap().to_string();
        assert!(sql.contains("',alice,'"));
        assert!(!sql.contains("editors"));
    }

    #[test]
    fn identities_with_commas_are_dropped() {
        let cfg = default_cfg();
        assert_eq!(
            eval(&groups(&["a,b"]), Some(&cfg), "restricted"),
            SubsetDecision::hide_all()
        );
    }

    #[test]
    fn validation_reasons() {
        let project = project();
        let layer = project.map_layer("restricted_1").unwrap();
        let rule = FilterRule::load(
            cfg_with(
                "roads_5",
                "fid",
                vec![rule_entry("restricted_1", "pk_field", "display_and_editing", "intersects")],
            )
            .filter_by_polygon(),
            "restricted_1",
        )
        .unwrap()
        .unwrap();
        let filter = FilterByPolygon::new(rule, &project, layer, false);
        assert!(filter.is_filtered());
        assert!(!filter.is_valid());
        assert!(matches!(
            filter.validate(),
            Err(InvalidFilter::DifferentDatabases { .. })
        ));
        assert!(filter.subset_sql(&groups(&["editors"])).is_err());
    }

    fn unquote(literal: &str) -> String {
        if let Some(body) = literal.strip_prefix("E'").and_then(|s| s.strip_suffix('\'')) {
            body.replace("''", "'").replace("\\\\", "\\")
        } else {
            let body = literal
                .strip_prefix('\'')
                .and_then(|s| s.strip_suffix('\''))
                .unwrap();
            body.replace("''", "'")
        }
    }

    const LAYER_IDS: [&str; 6] = ["restricted_1", "zones_2", "parcels_3", "trees_4", "roads_5", "areas_6"];
    const FILTER_MODES: [&str; 5] = ["display", "login", "editing", "display_and_editing", "both"];
    const RELATIONSHIPS: [&str; 3] = ["intersects", "within", "contains"];

    fn valid_section() -> Value {
        json!({
            "config": {"polygon_layer_id": "zones_2", "group_field": "groups"},
            "layers": [rule_entry("restricted_1", "pk_field", "display_and_editing", "intersects")],
        })
    }

    /// One way of damaging [`valid_section`]: keys are `(parent pointer, key)`.
    #[derive(Debug, Clone)]
    enum Breakage {
        Remove(&'static str, &'static str),
        Set(&'static str, &'static str, Value),
        DuplicateEntry,
        Section(Value),
    }

    fn broken_section(breakage: &Breakage) -> Value {
        let mut section = valid_section();
        match breakage {
            Breakage::Remove(parent, key) => {
                section
                    .pointer_mut(parent)
                    .and_then(Value::as_object_mut)
                    .unwrap()
                    .remove(*key);
            }
            Breakage::Set(parent, key, value) => {
                section.pointer_mut(parent).unwrap()[*key] = value.clone();
            }
            Breakage::DuplicateEntry => {
                let entry = section["layers"][0].clone();
                section["layers"].as_array_mut().unwrap().push(entry);
            }
            Breakage::Section(value) => section = value.clone(),
        }
        section
    }

    fn unknown(pattern: &'static str, known: &'static [&'static str]) -> impl Strategy<Value = String> {
        pattern.prop_filter("known value", move |s: &String| !known.contains(&s.as_str()))
    }

    fn wrong_type() -> impl Strategy<Value = Value> {
        prop_oneof![
            any::<i64>().prop_map(Value::from),
            Just(json!(true)),
            Just(json!([])),
            Just(json!({"x": 1})),
        ]
    }

    fn breakage() -> impl Strategy<Value = Breakage> {
        let required = vec![
            ("", "config"),
            ("/config", "polygon_layer_id"),
            ("/config", "group_field"),
            ("/layers/0", "primary_key"),
            ("/layers/0", "filter_mode"),
            ("/layers/0", "spatial_relationship"),
        ];
        let names = vec![
            ("/config", "polygon_layer_id"),
            ("/config", "group_field"),
            ("/layers/0", "primary_key"),
        ];
        let typed = vec![
            ("", "config"),
            ("/config", "polygon_layer_id"),
            ("/config", "group_field"),
            ("/config", "filter_by_user"),
            ("/layers/0", "primary_key"),
            ("/layers/0", "filter_mode"),
            ("/layers/0", "spatial_relationship"),
        ];
        prop_oneof![
            prop::sample::select(required).prop_map(|(parent, key)| Breakage::Remove(parent, key)),
            (prop::sample::select(names), "[ \t]{0,3}")
                .prop_map(|((parent, key), blank)| Breakage::Set(parent, key, Value::from(blank))),
            unknown("[a-z0-9_]{1,12}", &LAYER_IDS)
                .prop_map(|id| Breakage::Set("/config", "polygon_layer_id", Value::from(id))),
            prop::sample::select(vec!["roads_5", "areas_6"])
                .prop_map(|id| Breakage::Set("/config", "polygon_layer_id", Value::from(id))),
            unknown("[a-z_]{1,12}", &["id", "groups"])
                .prop_map(|field| Breakage::Set("/config", "group_field", Value::from(field))),
            unknown("[a-z_]{1,12}", &FILTER_MODES)
                .prop_map(|mode| Breakage::Set("/layers/0", "filter_mode", Value::from(mode))),
            unknown("[a-z_]{1,12}", &RELATIONSHIPS)
                .prop_map(|rel| Breakage::Set("/layers/0", "spatial_relationship", Value::from(rel))),
            (prop::sample::select(typed), wrong_type())
                .prop_map(|((parent, key), value)| Breakage::Set(parent, key, value)),
            prop_oneof![
                any::<i64>().prop_map(Value::from),
                Just(json!({"layer": "restricted_1"})),
                Just(json!("restricted_1")),
            ]
            .prop_map(|layers| Breakage::Set("", "layers", layers)),
            prop_oneof![
                any::<i64>().prop_map(Value::from),
                Just(json!([])),
                Just(json!("filter")),
            ]
            .prop_map(Breakage::Section),
            Just(Breakage::DuplicateEntry),
        ]
    }

    fn cfg_for_section(section: Value) -> LizmapConfig {
        LizmapConfig::from_value(json!({
            "layers": {"restricted": {}, "zones": {}},
            "filter_by_polygon": section,
        }))
        .unwrap()
    }

    #[test]
    fn undamaged_section_filters() {
        let cfg = cfg_for_section(valid_section());
        let decision = eval(&groups(&["editors"]), Some(&cfg), "restricted");
        assert!(decision.filter().is_some_and(|sql| sql != HIDE_ALL));
    }

    proptest! {
        #[test]
        fn invalid_primary_key_always_fails_closed(
            pk in "[a-z_]{1,12}".prop_filter("must not exist", |pk| pk != "pk_field" && pk != "name"),
            mode in prop::sample::select(vec!["display_and_editing", "both", "display"]),
            relation in prop::sample::select(vec!["intersects", "within", "contains"]),
            names in prop::collection::vec("[a-z]{1,8}", 1..5),
        ) {
            let cfg = cfg_with(
                "zones_2",
                "groups",
                vec![rule_entry("restricted_1", &pk, mode, relation)],
            );
            let ctx = RequestContext { groups: names, user_login: None, editing: false };
            prop_assert_eq!(eval(&ctx, Some(&cfg), "restricted"), SubsetDecision::hide_all());
        }

        #[test]
        fn malformed_configuration_always_fails_closed(
            breakage in breakage(),
            names in prop::collection::vec("[a-z]{1,8}", 1..4),
            editing in any::<bool>(),
        ) {
            let cfg = cfg_for_section(broken_section(&breakage));
            let ctx = RequestContext { groups: names, user_login: None, editing };
            prop_assert_eq!(eval(&ctx, Some(&cfg), "restricted"), SubsetDecision::hide_all());
        }

        #[test]
        fn group_names_never_change_predicate_structure(name in "\\PC{1,24}") {
            let Some(token) = normalize_identity(&name) else {
                return Ok(());
            };
            let cfg = default_cfg();
            let reference = eval(&groups(&["x"]), Some(&cfg), "restricted");
            let decision = eval(&groups(&[name.as_str()]), Some(&cfg), "restricted");

            let literal = SqlDialect::PostgreSql.quote_literal(&format!(",{token},"));
            let expected = reference.filter().unwrap().replace("',x,'", &literal);
            prop_assert_eq!(decision.filter(), Some(expected.as_str()));
            prop_assert_eq!(unquote(&literal), format!(",{token},"));
        }
    }
}

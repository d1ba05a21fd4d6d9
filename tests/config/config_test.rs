use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use reportflow::cache;
use reportflow::config::{expand_env_vars, FilterConfig, OutputConfig, ReportConfig};
use reportflow::error::ConfigurationError;
use reportflow::flow::{JoinKind, SortOrder};
use reportflow::source::{AggregateFunction, Aggregation};
use reportflow::sql::Dialect;
use reportflow::Report;

const FULL_TOML: &str = r#"
id = "latest-calls"
dialect = "postgres"
database = "${REPORTFLOW_TEST_DIR}/crm.db"
limit = 25

[[entities]]
name = "contacts"
table = "contacts"
columns = [
    { name = "id", type = "integer" },
    { name = "name", type = "string", title = "Full name" },
]

[[entities]]
name = "events"
table = "events"
columns = [
    { name = "id", type = "integer" },
    { name = "contact_id", type = "integer" },
    { name = "kind", type = "string" },
    { name = "date", type = "date" },
]

[[sources]]
name = "contacts"

[[sources]]
name = "last_event"
entity = "events"
aggregation = { function = "max", target = "date", group_by = ["contact_id"] }

[[joins]]
from = "contacts"
to = "last_event"
kind = "left"
on = [{ from = "id", to = "contact_id" }]

[[filters]]
kind = "membership"
name = "kind"
source = "contacts"
field = "id"
table = "events"
key = "contact_id"
column = "kind"

[[filters]]
kind = "date_range"
name = "since"
source = "last_event"
field = "date"
required = true

[[outputs]]
kind = "field"
alias = "contact"
source = "contacts"
field = "name"

[[outputs]]
kind = "date"
alias = "last_contacted"
source = "last_event"
field = "date"
format = "%d %b %Y"

[[sort]]
alias = "last_contacted"
order = "desc"
"#;

const FULL_JSON: &str = r#"{
    "id": "latest-calls",
    "dialect": "postgres",
    "database": "${REPORTFLOW_TEST_DIR}/crm.db",
    "limit": 25,
    "entities": [
        {"name": "contacts", "table": "contacts", "columns": [
            {"name": "id", "type": "integer"},
            {"name": "name", "type": "string", "title": "Full name"}
        ]},
        {"name": "events", "table": "events", "columns": [
            {"name": "id", "type": "integer"},
            {"name": "contact_id", "type": "integer"},
            {"name": "kind", "type": "string"},
            {"name": "date", "type": "date"}
        ]}
    ],
    "sources": [
        {"name": "contacts"},
        {"name": "last_event", "entity": "events",
         "aggregation": {"function": "max", "target": "date", "group_by": ["contact_id"]}}
    ],
    "joins": [
        {"from": "contacts", "to": "last_event", "kind": "left",
         "on": [{"from": "id", "to": "contact_id"}]}
    ],
    "filters": [
        {"kind": "membership", "name": "kind", "source": "contacts", "field": "id",
         "table": "events", "key": "contact_id", "column": "kind"},
        {"kind": "date_range", "name": "since", "source": "last_event", "field": "date",
         "required": true}
    ],
    "outputs": [
        {"kind": "field", "alias": "contact", "source": "contacts", "field": "name"},
        {"kind": "date", "alias": "last_contacted", "source": "last_event", "field": "date",
         "format": "%d %b %Y"}
    ],
    "sort": [{"alias": "last_contacted", "order": "desc"}]
}"#;

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("reportflow-{}-{}", std::process::id(), name))
}

#[test]
fn test_full_toml_definition() {
    let config = ReportConfig::from_toml_str(FULL_TOML).unwrap();
    config.validate().unwrap();

    assert_eq!(config.key().unwrap(), "latest-calls");
    assert_eq!(config.dialect, Dialect::Postgres);
    assert_eq!(config.limit, Some(25));
    assert_eq!(config.entities.len(), 2);
    assert_eq!(config.sources[1].entity(), "events");
    assert_eq!(
        config.sources[1].aggregation,
        Some(Aggregation {
            function: AggregateFunction::Max,
            target: "date".into(),
            group_by: vec!["contact_id".into()],
        })
    );
    assert_eq!(config.joins[0].kind, JoinKind::Left);
    assert!(matches!(
        &config.filters[1],
        FilterConfig::DateRange { required: true, .. }
    ));
    assert!(matches!(
        &config.outputs[1],
        OutputConfig::Date { format: Some(format), .. } if format == "%d %b %Y"
    ));
    assert_eq!(config.sort[0].order, SortOrder::Desc);
}

#[test]
fn test_json_and_toml_agree() {
    let toml = ReportConfig::from_toml_str(FULL_TOML).unwrap();
    let json = ReportConfig::from_json_str(FULL_JSON).unwrap();
    assert_eq!(toml, json);
    assert_eq!(toml.fingerprint().unwrap(), json.fingerprint().unwrap());
}

#[test]
fn test_joins_default_to_left() {
    let config = ReportConfig::from_toml_str(
        r#"
        [[sources]]
        name = "a"

        [[sources]]
        name = "b"

        [[joins]]
        from = "a"
        to = "b"
        on = [{ from = "id", to = "a_id" }]
        "#,
    )
    .unwrap();
    assert_eq!(config.joins[0].kind, JoinKind::Left);
}

#[test]
fn test_database_path_expands_environment() {
    std::env::set_var("REPORTFLOW_TEST_DIR", "/srv/data");
    let config = ReportConfig::from_toml_str(FULL_TOML).unwrap();
    assert_eq!(
        config.database_path().unwrap().as_deref(),
        Some("/srv/data/crm.db")
    );

    assert_eq!(expand_env_vars("$REPORTFLOW_TEST_DIR/x").unwrap(), "/srv/data/x");
    assert_eq!(expand_env_vars("cost: $5").unwrap(), "cost: $5");
    assert!(matches!(
        expand_env_vars("${REPORTFLOW_SURELY_UNSET_VAR}"),
        Err(ConfigurationError::MissingEnvVar(name)) if name == "REPORTFLOW_SURELY_UNSET_VAR"
    ));
}

#[test]
fn test_validation_errors() {
    let base = ReportConfig::from_toml_str(FULL_TOML).unwrap();

    let mut empty = base.clone();
    empty.sources.clear();
    assert!(matches!(empty.validate(), Err(ConfigurationError::NoSources)));

    let mut duplicate = base.clone();
    duplicate.sources.push(duplicate.sources[0].clone());
    assert!(matches!(
        duplicate.validate(),
        Err(ConfigurationError::DuplicateSource(name)) if name == "contacts"
    ));

    let mut unknown = base.clone();
    unknown.joins[0].to = "invoices".into();
    assert!(matches!(
        unknown.validate(),
        Err(ConfigurationError::UnknownSource(name)) if name == "invoices"
    ));

    let mut no_columns = base.clone();
    no_columns.joins[0].on.clear();
    assert!(matches!(
        no_columns.validate(),
        Err(ConfigurationError::InvalidJoin { .. })
    ));

    let mut orphan = base;
    orphan.joins.clear();
    assert!(matches!(
        Report::from_inline_config(&orphan),
        Err(ConfigurationError::DisconnectedSource(name)) if name == "last_event"
    ));
}

#[test]
fn test_report_from_toml_definition() {
    let config = ReportConfig::from_toml_str(FULL_TOML).unwrap();
    let mut report = Report::from_inline_config(&config).unwrap();
    assert_eq!(report.id(), "latest-calls");
    assert_eq!(report.joins().len(), 1);

    let columns = report.columns();
    assert_eq!(columns[0].title, "Full name");

    // required date range has no value yet
    assert!(report.explain().is_err());
}

#[test]
fn test_cache_reparses_changed_content() {
    let key = "config-test-reparse";
    cache::invalidate(key);

    let mut parses = 0;
    let first = cache::get_or_parse(key, FULL_TOML, |content| {
        parses += 1;
        ReportConfig::from_toml_str(content)
    })
    .unwrap();
    let again = cache::get_or_parse(key, FULL_TOML, |content| {
        parses += 1;
        ReportConfig::from_toml_str(content)
    })
    .unwrap();
    assert_eq!(parses, 1);
    assert!(Arc::ptr_eq(&first, &again));

    let edited = FULL_TOML.replace("limit = 25", "limit = 50");
    let changed = cache::get_or_parse(key, &edited, ReportConfig::from_toml_str).unwrap();
    assert_eq!(changed.limit, Some(50));
    assert_eq!(cache::get(key).unwrap().limit, Some(50));

    assert!(cache::invalidate(key));
    assert!(!cache::invalidate(key));
    assert!(cache::get(key).is_none());
}

#[test]
fn test_cache_does_not_store_parse_failures() {
    let key = "config-test-failure";
    let result = cache::get_or_parse(key, "sources = 3", ReportConfig::from_toml_str);
    assert!(matches!(result, Err(ConfigurationError::Parse { format: "toml", .. })));
    assert!(cache::get(key).is_none());
}

#[test]
fn test_load_file_by_extension() {
    let toml_path = temp_path("report.toml");
    let json_path = temp_path("report.json");
    fs::write(&toml_path, FULL_TOML).unwrap();
    fs::write(&json_path, FULL_JSON).unwrap();

    let from_toml = cache::load_file(&toml_path).unwrap();
    let from_json = cache::load_file(&json_path).unwrap();
    assert_eq!(from_toml, from_json);
    assert_eq!(*from_toml, ReportConfig::load(&toml_path).unwrap());

    let missing = cache::load_file(&temp_path("missing.toml"));
    assert!(matches!(missing, Err(ConfigurationError::Io(_))));

    fs::remove_file(toml_path).unwrap();
    fs::remove_file(json_path).unwrap();
}

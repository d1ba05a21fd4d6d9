use reportflow::config::{JoinColumns, JoinConfig, OutputConfig, ReportConfig, SourceConfig};
use reportflow::exec::SqliteExecutor;
use reportflow::field::FieldType;
use reportflow::flow::{Flow, JoinKind, SortSpec};
use reportflow::predicate::{Operator, Predicate};
use reportflow::report::Report;
use reportflow::schema::{ColumnSpec, EntityCatalog};
use reportflow::source::{Aggregation, FieldResolutionError, Source, Target};
use reportflow::sql::test_utils::validate_sql;
use reportflow::sql::Dialect;
use reportflow::value::Value;

fn events_catalog() -> EntityCatalog {
    EntityCatalog::new("events", "events")
        .with_column(ColumnSpec::new("id", FieldType::Integer))
        .with_column(ColumnSpec::new("owner", FieldType::String))
        .with_column(ColumnSpec::new("kind", FieldType::String))
        .with_column(ColumnSpec::new("date", FieldType::Date))
}

fn executor() -> SqliteExecutor {
    let exec = SqliteExecutor::open_in_memory().unwrap();
    exec.connection()
        .execute_batch(
            "CREATE TABLE events (id INTEGER PRIMARY KEY, owner TEXT, kind TEXT, date DATE);
             INSERT INTO events VALUES
                 (1, 'ada', 'call', '2024-01-01'),
                 (2, 'ada', 'mail', '2024-02-01'),
                 (3, 'ada', 'call', '2024-03-01'),
                 (4, 'bob', 'call', '2024-01-15'),
                 (5, 'bob', 'mail', '2024-04-01');",
        )
        .unwrap();
    exec
}

fn events_source() -> Source {
    let mut source = Source::new("events", events_catalog());
    source.ensure_field_in_source("id", "events_id").unwrap();
    source.ensure_field_in_source("owner", "events_owner").unwrap();
    source
}

fn count(source: &mut Source, exec: &SqliteExecutor) -> u64 {
    let mut flow: Flow = source.flow().unwrap().clone();
    flow.record_count(exec).unwrap()
}

fn ids(source: &mut Source, exec: &SqliteExecutor) -> Vec<Value> {
    let mut flow: Flow = source.flow().unwrap().clone();
    flow.add_sort(SortSpec::asc("events_id")).unwrap();
    let mut ids = Vec::new();
    loop {
        match flow.retrieve_next_record(exec) {
            Ok(record) => ids.push(record.value("events_id")),
            Err(err) if err.is_end_of_stream() => return ids,
            Err(err) => panic!("{err}"),
        }
    }
}

#[test]
fn test_enable_then_disable_restores_the_row_count() {
    let exec = executor();
    let mut source = events_source();
    assert_eq!(count(&mut source, &exec), 5);

    source
        .set_aggregation(Aggregation::max("date", &["owner"]))
        .unwrap();
    let sql = source.flow().unwrap().to_sql(Dialect::Sqlite).unwrap();
    assert!(sql.contains("GROUP BY"));
    assert!(sql.contains("INNER JOIN \"events\" AS \"events\""));
    validate_sql(&sql, Dialect::Sqlite).unwrap();
    assert_eq!(ids(&mut source, &exec), vec![Value::Int(3), Value::Int(5)]);

    source.clear_aggregation();
    let sql = source.flow().unwrap().to_sql(Dialect::Sqlite).unwrap();
    assert!(!sql.contains("GROUP BY"));
    assert!(!sql.contains("events_agg"));
    assert_eq!(count(&mut source, &exec), 5);
}

#[test]
fn test_min_picks_the_earliest_row() {
    let exec = executor();
    let mut source = events_source();
    source
        .set_aggregation(Aggregation::min("date", &["owner"]))
        .unwrap();
    assert_eq!(ids(&mut source, &exec), vec![Value::Int(1), Value::Int(4)]);
}

#[test]
fn test_entity_filters_apply_inside_the_aggregate() {
    let exec = executor();
    let mut source = events_source();
    let kind = source.ensure_field("kind").unwrap();
    source
        .add_clause(
            &Target::Entity,
            Predicate::for_field(&kind.field, Operator::Eq, Value::from("call")).unwrap(),
        )
        .unwrap();
    source
        .set_aggregation(Aggregation::max("date", &["owner"]))
        .unwrap();

    // latest call per owner, not the latest event
    assert_eq!(ids(&mut source, &exec), vec![Value::Int(3), Value::Int(4)]);
}

#[test]
fn test_join_reference_moves_keys_to_the_derived_table() {
    let mut source = events_source();
    assert_eq!(source.join_alias(), "events");
    source
        .set_aggregation(Aggregation::max("date", &["owner"]))
        .unwrap();

    assert_eq!(source.join_alias(), "events_agg");
    let key = source.join_reference("owner");
    assert_eq!((key.table.as_str(), key.column.as_str()), ("events_agg", "events_agg_owner"));
    let other = source.join_reference("id");
    assert_eq!((other.table.as_str(), other.column.as_str()), ("events", "id"));
    assert!(source.joinable_on("owner"));
    assert!(!source.joinable_on("id"));
}

#[test]
fn test_invalid_aggregations() {
    let mut source = events_source();
    assert!(matches!(
        source.set_aggregation(Aggregation::max("date", &[])),
        Err(FieldResolutionError::InvalidAggregation { .. })
    ));
    assert!(matches!(
        source.set_aggregation(Aggregation::max("date", &["date"])),
        Err(FieldResolutionError::InvalidAggregation { .. })
    ));
    assert!(matches!(
        source.set_aggregation(Aggregation::max("created", &["owner"])),
        Err(FieldResolutionError::InvalidAggregation { .. })
    ));
    assert!(source.aggregation().is_none());
}

fn latest_event_config(kind: JoinKind) -> ReportConfig {
    ReportConfig {
        entities: vec![
            events_catalog(),
            EntityCatalog::new("owners", "owners")
                .with_key("login")
                .with_column(ColumnSpec::new("login", FieldType::String))
                .with_column(ColumnSpec::new("name", FieldType::String)),
        ],
        sources: vec![
            SourceConfig {
                name: "owners".into(),
                entity: None,
                aggregation: None,
            },
            SourceConfig {
                name: "latest".into(),
                entity: Some("events".into()),
                aggregation: Some(Aggregation::max("date", &["owner"])),
            },
        ],
        joins: vec![JoinConfig {
            from: "owners".into(),
            to: "latest".into(),
            kind,
            on: vec![JoinColumns {
                from: "login".into(),
                to: "owner".into(),
            }],
        }],
        outputs: vec![
            OutputConfig::Field {
                alias: "name".into(),
                source: "owners".into(),
                field: "name".into(),
                title: None,
            },
            OutputConfig::Field {
                alias: "last_kind".into(),
                source: "latest".into(),
                field: "kind".into(),
                title: None,
            },
        ],
        sort: vec![SortSpec::asc("name")],
        ..Default::default()
    }
}

fn owners_executor(owners: &str) -> SqliteExecutor {
    let exec = executor();
    exec.connection()
        .execute_batch(&format!(
            "CREATE TABLE owners (login TEXT PRIMARY KEY, name TEXT);
             INSERT INTO owners VALUES {owners};"
        ))
        .unwrap();
    exec
}

fn names_and_kinds(report: &mut Report, exec: &SqliteExecutor) -> Vec<(String, String)> {
    report
        .rows(exec)
        .unwrap()
        .iter()
        .map(|row| {
            (
                row.get("name").unwrap().formatted_value.clone(),
                row.get("last_kind").unwrap().formatted_value.clone(),
            )
        })
        .collect()
}

fn pair(name: &str, kind: &str) -> (String, String) {
    (name.to_string(), kind.to_string())
}

#[test]
fn test_latest_event_per_owner_joined_into_a_report() {
    let exec = owners_executor("('ada', 'Ada'), ('bob', 'Bob')");
    let mut report = Report::from_inline_config(&latest_event_config(JoinKind::Left)).unwrap();
    let sql = report.explain().unwrap().sql;
    assert!(sql.contains("\"latest_agg\".\"latest_agg_owner\" = \"owners\".\"login\""));
    validate_sql(&sql, Dialect::Sqlite).unwrap();

    assert_eq!(
        names_and_kinds(&mut report, &exec),
        vec![pair("Ada", "call"), pair("Bob", "mail")]
    );
}

#[test]
fn test_left_join_onto_aggregate_keeps_owners_without_events() {
    let exec = owners_executor("('ada', 'Ada'), ('bob', 'Bob'), ('cyd', 'Cyd')");
    let mut report = Report::from_inline_config(&latest_event_config(JoinKind::Left)).unwrap();

    let sql = report.explain().unwrap().sql;
    assert!(sql.contains("LEFT JOIN \"events\" AS \"latest\""));
    assert!(!sql.contains("INNER JOIN"));
    validate_sql(&sql, Dialect::Sqlite).unwrap();

    assert_eq!(
        names_and_kinds(&mut report, &exec),
        vec![pair("Ada", "call"), pair("Bob", "mail"), pair("Cyd", "")]
    );
    report.reset();
    assert_eq!(report.record_count(&exec).unwrap(), 3);
}

#[test]
fn test_inner_join_onto_aggregate_drops_owners_without_events() {
    let exec = owners_executor("('ada', 'Ada'), ('bob', 'Bob'), ('cyd', 'Cyd')");
    let mut report = Report::from_inline_config(&latest_event_config(JoinKind::Inner)).unwrap();

    assert_eq!(
        names_and_kinds(&mut report, &exec),
        vec![pair("Ada", "call"), pair("Bob", "mail")]
    );
}

use reportflow::exec::SqliteExecutor;
use reportflow::field::{DataSpecification, FieldError, FieldSpecification, FieldType, SqlWrapper};
use reportflow::flow::{
    ColumnRef, CombinedFlow, Flow, FlowError, JoinStrategy, SortSpec, SubqueryFlow, TableFlow,
};
use reportflow::predicate::{Operator, Predicate};
use reportflow::sql::test_utils::validate_sql;
use reportflow::sql::Dialect;
use reportflow::value::Value;

fn events(rows: i64) -> SqliteExecutor {
    let exec = SqliteExecutor::open_in_memory().unwrap();
    let conn = exec.connection();
    conn.execute_batch(
        "CREATE TABLE events (id INTEGER PRIMARY KEY, owner TEXT, kind TEXT, happened DATE);",
    )
    .unwrap();
    for i in 1..=rows {
        conn.execute(
            "INSERT INTO events (id, owner, kind, happened) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![
                i,
                if i % 2 == 0 { "ada" } else { "bob" },
                if i % 3 == 0 { "call" } else { "mail" },
                format!("2024-01-{:02}", i)
            ],
        )
        .unwrap();
    }
    exec
}

fn events_flow() -> Flow {
    let mut table = TableFlow::new("events", "e");
    for (name, field_type) in [
        ("id", FieldType::Integer),
        ("owner", FieldType::String),
        ("kind", FieldType::String),
        ("happened", FieldType::Date),
    ] {
        table
            .push_field(FieldSpecification::new(name, field_type).with_alias(&format!("e_{}", name)))
            .unwrap();
    }
    table.into()
}

fn drain(flow: &mut Flow, exec: &SqliteExecutor, alias: &str) -> Vec<Value> {
    let mut values = Vec::new();
    loop {
        match flow.retrieve_next_record(exec) {
            Ok(record) => values.push(record.value(alias)),
            Err(FlowError::EndOfStream) => return values,
            Err(err) => panic!("unexpected error: {err}"),
        }
    }
}

#[test]
fn test_offset_without_limit_emits_the_remainder_in_order() {
    let exec = events(12);
    let mut flow = events_flow();
    flow.add_sort(SortSpec::asc("e_id")).unwrap();
    flow.set_offset(Some(5)).unwrap();

    assert_eq!(flow.record_count(&exec).unwrap(), 12);
    let ids = drain(&mut flow, &exec, "e_id");
    assert_eq!(ids, (6..=12).map(Value::Int).collect::<Vec<_>>());
}

#[test]
fn test_limit_without_offset_starts_at_the_first_row() {
    let exec = events(12);
    let mut flow = events_flow();
    flow.add_sort(SortSpec::desc("e_id")).unwrap();
    flow.set_limit(Some(3)).unwrap();

    assert_eq!(flow.record_count(&exec).unwrap(), 12);
    assert_eq!(
        drain(&mut flow, &exec, "e_id"),
        vec![Value::Int(12), Value::Int(11), Value::Int(10)]
    );
}

#[test]
fn test_end_of_stream_is_signalled_on_every_read_after_the_last_row() {
    let exec = events(2);
    let mut flow = events_flow();
    assert_eq!(drain(&mut flow, &exec, "e_id").len(), 2);
    for _ in 0..3 {
        assert_eq!(flow.retrieve_next_record(&exec), Err(FlowError::EndOfStream));
    }
}

#[test]
fn test_empty_result_ends_immediately() {
    let exec = events(0);
    let mut flow = events_flow();
    assert_eq!(flow.record_count(&exec).unwrap(), 0);
    assert_eq!(flow.retrieve_next_record(&exec), Err(FlowError::EndOfStream));
}

#[test]
fn test_filters_and_null_inclusive_negation_against_sqlite() {
    let exec = events(6);
    exec.connection()
        .execute("INSERT INTO events (id, owner, kind) VALUES (7, NULL, 'mail')", [])
        .unwrap();

    let mut flow = events_flow();
    flow.add_clause(
        Predicate::new(Some("e"), "owner", Operator::Ne, Value::from("ada"), FieldType::String)
            .unwrap(),
    )
    .unwrap();
    flow.add_sort(SortSpec::asc("e_id")).unwrap();

    // bob rows plus the row without an owner
    assert_eq!(
        drain(&mut flow, &exec, "e_id"),
        vec![Value::Int(1), Value::Int(3), Value::Int(5), Value::Int(7)]
    );
}

#[test]
fn test_list_value_with_equals_matches_any() {
    let exec = events(6);
    let mut flow = events_flow();
    flow.add_clause(
        Predicate::new(
            Some("e"),
            "id",
            Operator::Eq,
            vec![Value::Int(2), Value::Int(4)],
            FieldType::Integer,
        )
        .unwrap(),
    )
    .unwrap();

    let sql = flow.to_sql(Dialect::Sqlite).unwrap();
    assert!(sql.contains("\"e\".\"id\" IN (2, 4)"));
    assert_eq!(flow.record_count(&exec).unwrap(), 2);
}

#[test]
fn test_group_by_through_subquery() {
    let exec = events(6);
    let mut table = TableFlow::new("events", "e");
    table
        .push_field(FieldSpecification::new("owner", FieldType::String).with_alias("e_owner"))
        .unwrap();
    table
        .push_field(
            FieldSpecification::new("happened", FieldType::Date)
                .with_alias("e_last")
                .with_wrapper(SqlWrapper::function("MAX")),
        )
        .unwrap();
    let mut inner: Flow = table.into();
    inner.add_aggregate("e_owner").unwrap();

    let mut flow: Flow = SubqueryFlow::new(inner, "latest").into();
    flow.add_sort(SortSpec::asc("e_owner")).unwrap();

    let sql = flow.to_sql(Dialect::Sqlite).unwrap();
    validate_sql(&sql, Dialect::Sqlite).unwrap();
    assert!(sql.contains("GROUP BY \"e\".\"owner\""));

    assert_eq!(flow.record_count(&exec).unwrap(), 2);
    let mut rows = Vec::new();
    loop {
        match flow.retrieve_next_record(&exec) {
            Ok(record) => rows.push((record.value("e_owner"), record.value("e_last"))),
            Err(err) if err.is_end_of_stream() => break,
            Err(err) => panic!("{err}"),
        }
    }
    assert_eq!(
        rows,
        vec![
            (Value::from("ada"), Value::from("2024-01-06")),
            (Value::from("bob"), Value::from("2024-01-05")),
        ]
    );
}

#[test]
fn test_combined_flow_reads_rows_with_fields_of_every_child() {
    let exec = events(4);
    exec.connection()
        .execute_batch(
            "CREATE TABLE owners (login TEXT PRIMARY KEY, name TEXT);
             INSERT INTO owners VALUES ('ada', 'Ada Lovelace'), ('bob', 'Bob Moog');",
        )
        .unwrap();

    let mut owners = TableFlow::new("owners", "w");
    owners
        .push_field(FieldSpecification::new("name", FieldType::String).with_alias("w_name"))
        .unwrap();

    let combined = CombinedFlow::new(events_flow()).with_join(
        owners,
        JoinStrategy::left().on(
            ColumnRef::new("e", "owner"),
            ColumnRef::new("w", "login"),
        ),
    );
    let mut flow: Flow = combined.into();
    flow.add_sort(SortSpec::asc("e_id")).unwrap();

    let record = flow.retrieve_next_record(&exec).unwrap();
    assert_eq!(record.value("e_id"), Value::Int(1));
    assert_eq!(record.value("w_name"), Value::from("Bob Moog"));
}

#[test]
fn test_data_specification_alias_collision() {
    let mut spec = DataSpecification::new();
    spec.add("id", FieldSpecification::new("id", FieldType::Integer).with_alias("e_id"))
        .unwrap();
    let before = spec.clone();

    let err = spec
        .add("key", FieldSpecification::new("key", FieldType::Integer).with_alias("e_id"))
        .unwrap_err();
    assert_eq!(err, FieldError::AlreadyExists("e_id".into()));
    assert_eq!(spec, before);
    assert_eq!(spec.get_by_name("id"), spec.get_by_alias("e_id"));
}

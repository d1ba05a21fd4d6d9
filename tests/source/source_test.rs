use reportflow::exec::SqliteExecutor;
use reportflow::field::FieldType;
use reportflow::flow::{Flow, FlowError, SortSpec};
use reportflow::predicate::{Operator, Predicate};
use reportflow::schema::{
    ColumnSpec, EntityCatalog, SatelliteTable, SchemaProvider, SqliteSchemaProvider,
};
use reportflow::source::{FieldResolutionError, Source, Target};
use reportflow::sql::test_utils::validate_sql;
use reportflow::sql::Dialect;
use reportflow::value::Value;

fn contacts() -> EntityCatalog {
    EntityCatalog::new("contacts", "contacts")
        .with_column(ColumnSpec::new("id", FieldType::Integer))
        .with_column(ColumnSpec::new("name", FieldType::String))
        .with_satellite(
            SatelliteTable::new("address", "addresses", "contact_id")
                .with_column(ColumnSpec::new("city", FieldType::String)),
        )
        .with_satellite(
            SatelliteTable::new("phones", "phones", "contact_id")
                .multiple()
                .with_column(ColumnSpec::new("number", FieldType::String)),
        )
        .with_satellite(
            SatelliteTable::new("survey", "custom_survey", "entity_id")
                .custom_group()
                .with_column(ColumnSpec::new("score", FieldType::Integer)),
        )
}

fn executor() -> SqliteExecutor {
    let exec = SqliteExecutor::open_in_memory().unwrap();
    exec.connection()
        .execute_batch(
            "CREATE TABLE contacts (id INTEGER PRIMARY KEY, name TEXT);
             CREATE TABLE addresses (contact_id INTEGER PRIMARY KEY REFERENCES contacts(id), city TEXT);
             CREATE TABLE phones (id INTEGER PRIMARY KEY, contact_id INTEGER REFERENCES contacts(id), number TEXT);
             CREATE TABLE custom_survey (entity_id INTEGER, score INTEGER);
             INSERT INTO contacts VALUES (1, 'Ada'), (2, 'Bob'), (3, 'Cy');
             INSERT INTO addresses VALUES (1, 'London'), (2, 'Paris');
             INSERT INTO phones VALUES (1, 1, '555-0101'), (2, 1, '555-0100'), (3, 3, '555-0300');
             INSERT INTO custom_survey VALUES (1, 9), (2, 4);",
        )
        .unwrap();
    exec
}

#[test]
fn test_satellites_join_only_when_referenced() {
    let mut source = Source::new("contacts", contacts());
    source.ensure_field_in_source("name", "contacts_name").unwrap();

    let sql = source.flow().unwrap().to_sql(Dialect::Sqlite).unwrap();
    assert!(!sql.contains("JOIN"));

    source.ensure_field_in_source("address.city", "contacts_address_city").unwrap();
    let sql = source.flow().unwrap().to_sql(Dialect::Sqlite).unwrap();
    assert!(sql.contains(
        "LEFT JOIN \"addresses\" AS \"contacts_address\" ON \"contacts_address\".\"contact_id\" = \"contacts\".\"id\""
    ));
    assert_eq!(source.attached_satellites().collect::<Vec<_>>(), vec!["address"]);
    validate_sql(&sql, Dialect::Sqlite).unwrap();
}

#[test]
fn test_ensure_field_attaches_without_projecting() {
    let mut source = Source::new("contacts", contacts());
    let field = source.ensure_field("address.city").unwrap();

    assert_eq!(field.target, Target::Satellite("address".into()));
    assert_eq!(field.alias, "contacts_address_city");
    assert_eq!(field.field.table.as_deref(), Some("contacts_address"));
    assert!(source.aliases().is_empty());
    assert_eq!(source.attached_satellites().count(), 1);
}

#[test]
fn test_same_column_under_two_aliases() {
    let mut source = Source::new("contacts", contacts());
    source.ensure_field_in_source("name", "display_name").unwrap();
    source.ensure_field_in_source("name", "sort_name").unwrap();
    // idempotent for the same column
    source.ensure_field_in_source("name", "sort_name").unwrap();

    assert_eq!(source.aliases(), vec!["display_name", "sort_name"]);
    assert!(matches!(
        source.ensure_field_in_source("id", "sort_name"),
        Err(FieldResolutionError::AliasConflict(alias)) if alias == "sort_name"
    ));
}

#[test]
fn test_unknown_paths() {
    let mut source = Source::new("contacts", contacts());
    assert!(matches!(
        source.ensure_field("email"),
        Err(FieldResolutionError::UnknownField { .. })
    ));
    assert!(matches!(
        source.ensure_field("billing.city"),
        Err(FieldResolutionError::UnknownSatellite { .. })
    ));
    assert!(matches!(
        source.ensure_detail("survey"),
        Err(FieldResolutionError::WrongSatelliteKind { .. })
    ));
    source.ensure_custom_group("survey").unwrap();
}

#[test]
fn test_multiple_satellite_reduces_to_one_row_per_entity() {
    let exec = executor();
    let mut source = Source::new("contacts", contacts());
    source.ensure_field_in_source("id", "contacts_id").unwrap();
    source.ensure_field_in_source("phones.number", "contacts_phone").unwrap();

    let mut flow = source.flow().unwrap().clone();
    let sql = flow.to_sql(Dialect::Sqlite).unwrap();
    assert!(sql.contains("MIN(\"contacts_phones\".\"number\")"));
    assert!(sql.contains("GROUP BY \"contacts_phones\".\"contact_id\""));
    validate_sql(&sql, Dialect::Sqlite).unwrap();

    flow.add_sort(SortSpec::asc("contacts_id")).unwrap();
    assert_eq!(flow.record_count(&exec).unwrap(), 3);
    let phones: Vec<Value> = (0..3)
        .map(|_| flow.retrieve_next_record(&exec).unwrap().value("contacts_phone"))
        .collect();
    assert_eq!(
        phones,
        vec![Value::from("555-0100"), Value::Null, Value::from("555-0300")]
    );
}

#[test]
fn test_multiple_satellite_flow_groups_by_join_column() {
    let mut source = Source::new("contacts", contacts());
    let flow = source.ensure_satellite("phones").unwrap();
    assert!(matches!(flow, Flow::Subquery(_)));
    assert!(flow.has_field("contacts_phones_contact_id"));

    let sql = flow.to_sql(Dialect::Sqlite).unwrap();
    assert!(sql.contains("GROUP BY \"contacts_phones\".\"contact_id\""));
    assert!(sql.contains(") AS \"contacts_phones\""));
}

#[test]
fn test_filter_on_satellite_reads_through_join() {
    let exec = executor();
    let mut source = Source::new("contacts", contacts());
    source.ensure_field_in_source("name", "contacts_name").unwrap();
    let city = source.ensure_field("address.city").unwrap();
    let id = source
        .add_clause(
            &city.target,
            Predicate::for_field(&city.field, Operator::Eq, Value::from("Paris")).unwrap(),
        )
        .unwrap();

    let mut flow = source.flow().unwrap().clone();
    assert_eq!(flow.record_count(&exec).unwrap(), 1);
    assert_eq!(
        flow.retrieve_next_record(&exec).unwrap().value("contacts_name"),
        Value::from("Bob")
    );

    assert!(source.remove_clause(id).unwrap());
    assert!(!source.has_clause(id));
    let mut flow = source.flow().unwrap().clone();
    assert_eq!(flow.record_count(&exec).unwrap(), 3);
}

#[test]
fn test_composed_flow_is_cached_until_changed() {
    let mut source = Source::new("contacts", contacts());
    source.ensure_field_in_source("name", "contacts_name").unwrap();
    assert!(!source.is_cached());

    source.flow().unwrap();
    assert!(source.is_cached());

    source.ensure_field("address.city").unwrap();
    assert!(!source.is_cached());
    let sql = source.flow().unwrap().to_sql(Dialect::Sqlite).unwrap();
    assert!(sql.contains("\"addresses\""));
}

#[test]
fn test_aggregate_field_groups_rows() {
    let exec = executor();
    let mut source = Source::new("contacts", contacts());
    source.ensure_field_in_source("address.city", "city").unwrap();
    source.add_aggregate("city").unwrap();
    assert!(source.is_aggregate("city"));

    let mut flow = source.flow().unwrap().clone();
    let sql = flow.to_sql(Dialect::Sqlite).unwrap();
    assert!(sql.contains("GROUP BY \"contacts_address\".\"city\""));
    // London, Paris and the contact without an address
    assert_eq!(flow.record_count(&exec).unwrap(), 3);

    assert!(source.remove_aggregate("city").unwrap());
    assert!(!source.is_aggregate("city"));
    assert!(matches!(
        source.add_aggregate("nope"),
        Err(FieldResolutionError::UnknownField { .. })
    ));
}

#[test]
fn test_sqlite_schema_discovers_detail_satellites() {
    let exec = executor();
    let provider = SqliteSchemaProvider::new(exec.connection());
    let catalog = provider.entity("contacts").unwrap();

    let address = catalog.satellite("addresses").unwrap();
    assert!(!address.multiple);
    assert!(catalog.satellite("phones").unwrap().multiple);

    let mut source = Source::new("contacts", catalog);
    source.ensure_field_in_source("addresses.city", "city").unwrap();
    let mut flow = source.flow().unwrap().clone();
    assert_eq!(flow.record_count(&exec).unwrap(), 3);
    assert!(matches!(flow.retrieve_next_record(&exec), Ok(_)));
    assert_eq!(flow.set_limit(Some(1)), Err(FlowError::AlreadyInitialized));
    flow.reset();
    flow.set_limit(Some(1)).unwrap();
}

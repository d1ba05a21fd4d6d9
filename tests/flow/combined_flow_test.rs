use reportflow::exec::SqliteExecutor;
use reportflow::field::{FieldSpecification, FieldType};
use reportflow::flow::{ColumnRef, CombinedFlow, Flow, JoinStrategy, SortSpec, TableFlow};
use reportflow::predicate::{MembershipMode, MembershipPredicate, Operator, Predicate};
use reportflow::sql::test_utils::validate_sql;
use reportflow::sql::Dialect;
use reportflow::value::Value;

fn table(name: &str, alias: &str, columns: &[(&str, FieldType)]) -> TableFlow {
    let mut flow = TableFlow::new(name, alias);
    for (column, field_type) in columns {
        flow.push_field(
            FieldSpecification::new(column, *field_type).with_alias(&format!("{}_{}", alias, column)),
        )
        .unwrap();
    }
    flow
}

fn orders_with_customers() -> CombinedFlow {
    let orders = table(
        "orders",
        "o",
        &[("id", FieldType::Integer), ("customer", FieldType::Integer)],
    );
    let customers = table(
        "customers",
        "c",
        &[("id", FieldType::Integer), ("name", FieldType::String)],
    );
    CombinedFlow::new(orders).with_join(
        customers,
        JoinStrategy::left().on(ColumnRef::new("o", "customer"), ColumnRef::new("c", "id")),
    )
}

fn executor() -> SqliteExecutor {
    let exec = SqliteExecutor::open_in_memory().unwrap();
    exec.connection()
        .execute_batch(
            "CREATE TABLE customers (id INTEGER PRIMARY KEY, name TEXT);
             CREATE TABLE orders (id INTEGER PRIMARY KEY, customer INTEGER);
             CREATE TABLE customer_tags (customer_id INTEGER, tag TEXT);
             INSERT INTO customers VALUES (1, 'Ada'), (2, 'Bob');
             INSERT INTO orders VALUES (10, 1), (11, 2), (12, 3);
             INSERT INTO customer_tags VALUES (1, 'vip'), (2, 'new');",
        )
        .unwrap();
    exec
}

#[test]
fn test_join_clause_lands_in_on_and_is_removed_with_its_owner() {
    let mut combined = orders_with_customers();
    let predicate = Predicate::new(Some("c"), "name", Operator::Eq, Value::from("Ada"), FieldType::String)
        .unwrap()
        .as_join_clause();
    let id = combined.child_mut(1).unwrap().add_clause(predicate).unwrap();

    let flow: Flow = combined.clone().into();
    insta::assert_snapshot!(flow.to_sql(Dialect::Sqlite).unwrap(), @r#"
    SELECT
      "o"."id" AS "o_id",
      "o"."customer" AS "o_customer",
      "c"."id" AS "c_id",
      "c"."name" AS "c_name"
    FROM "orders" AS "o"
    LEFT JOIN "customers" AS "c" ON "c"."id" = "o"."customer" AND "c"."name" = 'Ada'
    "#);

    assert!(combined.child_mut(1).unwrap().remove_clause(id).unwrap());
    let sql = Flow::from(combined).to_sql(Dialect::Sqlite).unwrap();
    assert!(sql.contains("LEFT JOIN \"customers\" AS \"c\" ON \"c\".\"id\" = \"o\".\"customer\""));
    assert!(!sql.contains("'Ada'"));
}

#[test]
fn test_join_clause_keeps_unmatched_rows_of_an_outer_join() {
    let exec = executor();
    let mut combined = orders_with_customers();
    combined
        .child_mut(1)
        .unwrap()
        .add_clause(
            Predicate::new(Some("c"), "name", Operator::Eq, Value::from("Ada"), FieldType::String)
                .unwrap()
                .as_join_clause(),
        )
        .unwrap();
    let mut flow: Flow = combined.into();
    flow.add_sort(SortSpec::asc("o_id")).unwrap();

    assert_eq!(flow.record_count(&exec).unwrap(), 3);
    let first = flow.retrieve_next_record(&exec).unwrap();
    let second = flow.retrieve_next_record(&exec).unwrap();
    assert_eq!(first.value("c_name"), Value::from("Ada"));
    assert_eq!(second.value("o_id"), Value::Int(11));
    assert_eq!(second.value("c_name"), Value::Null);
}

#[test]
fn test_child_where_clause_is_pulled_up() {
    let exec = executor();
    let mut combined = orders_with_customers();
    combined
        .child_mut(1)
        .unwrap()
        .add_clause(
            Predicate::new(Some("c"), "name", Operator::Eq, Value::from("Ada"), FieldType::String)
                .unwrap(),
        )
        .unwrap();
    let mut flow: Flow = combined.into();

    let sql = flow.to_sql(Dialect::Sqlite).unwrap();
    assert!(sql.contains("WHERE \"c\".\"name\" = 'Ada'"));
    validate_sql(&sql, Dialect::Sqlite).unwrap();
    assert_eq!(flow.record_count(&exec).unwrap(), 1);
}

#[test]
fn test_nested_combined_flows_render_one_from_list() {
    let tags = table("customer_tags", "t", &[("tag", FieldType::String)]);
    let inner = orders_with_customers().with_join(
        tags,
        JoinStrategy::left().on(ColumnRef::new("c", "id"), ColumnRef::new("t", "customer_id")),
    );
    let outer = CombinedFlow::new(inner);
    let sql = Flow::from(outer).to_sql(Dialect::Postgres).unwrap();

    assert_eq!(sql.matches("SELECT").count(), 1);
    assert!(sql.contains("LEFT JOIN \"customer_tags\" AS \"t\""));
    validate_sql(&sql, Dialect::Postgres).unwrap();
}

#[test]
fn test_membership_predicate_filters_by_related_rows() {
    let exec = executor();
    let membership = MembershipPredicate::new(
        Some("o"),
        "customer",
        "customer_tags",
        "customer_id",
        MembershipMode::Excludes,
    )
    .with_condition("tag", Operator::Eq, Value::from("vip"), FieldType::String)
    .unwrap();

    let mut flow: Flow = orders_with_customers().into();
    flow.add_clause(membership).unwrap();
    flow.add_sort(SortSpec::asc("o_id")).unwrap();

    validate_sql(&flow.to_sql(Dialect::Sqlite).unwrap(), Dialect::Sqlite).unwrap();
    assert_eq!(flow.record_count(&exec).unwrap(), 2);
    assert_eq!(flow.retrieve_next_record(&exec).unwrap().value("o_id"), Value::Int(11));
    assert_eq!(flow.retrieve_next_record(&exec).unwrap().value("o_id"), Value::Int(12));
}

use reportflow::config::ReportConfig;
use reportflow::exec::SqliteExecutor;
use reportflow::filter::{FilterInput, FilterParams};
use reportflow::flow::{FlowError, SortSpec};
use reportflow::predicate::Operator;
use reportflow::schema::{LayeredSchemaProvider, SqliteSchemaProvider};
use reportflow::sql::test_utils::validate_sql;
use reportflow::sql::Dialect;
use reportflow::value::Value;
use reportflow::{Report, ReportError};

const ORDERS_REPORT: &str = r#"
id = "large-orders"
dialect = "sqlite"

[[entities]]
name = "orders"
table = "orders"
columns = [
    { name = "id", type = "integer" },
    { name = "customer", type = "integer" },
    { name = "date", type = "date" },
    { name = "amount", type = "money" },
    { name = "status", type = "integer", options = [{ value = 1, label = "Open" }, { value = 2, label = "Shipped" }] },
]

[[entities]]
name = "customers"
table = "customers"
columns = [
    { name = "id", type = "integer" },
    { name = "first_name", type = "string" },
    { name = "last_name", type = "string" },
]

[[sources]]
name = "orders"

[[sources]]
name = "customers"

[[joins]]
from = "orders"
to = "customers"
kind = "left"
on = [{ from = "customer", to = "id" }]

[[filters]]
kind = "value"
name = "amount"
source = "orders"
field = "amount"

[[outputs]]
kind = "field"
alias = "order_id"
source = "orders"
field = "id"

[[outputs]]
kind = "date"
alias = "order_date"
source = "orders"
field = "date"
format = "%d/%m/%Y"

[[outputs]]
kind = "field"
alias = "order_amount"
source = "orders"
field = "amount"

[[outputs]]
kind = "option"
alias = "order_status"
source = "orders"
field = "status"

[[outputs]]
kind = "concat"
alias = "customer_name"
source = "customers"
fields = ["first_name", "last_name"]

[[outputs]]
kind = "link"
alias = "customer_link"
source = "customers"
field = "last_name"
key = "id"
url = "/customers/{}"
title = "Customer"
"#;

fn executor() -> SqliteExecutor {
    let exec = SqliteExecutor::open_in_memory().unwrap();
    exec.connection()
        .execute_batch(
            "CREATE TABLE customers (id INTEGER PRIMARY KEY, first_name TEXT, last_name TEXT);
             CREATE TABLE orders (
                 id INTEGER PRIMARY KEY, customer INTEGER, date TEXT, amount REAL, status INTEGER
             );
             INSERT INTO customers VALUES (1, 'Ada', 'Lovelace'), (2, 'Bob', NULL), (3, 'Cy', 'Young');
             INSERT INTO orders VALUES
                 (1, 1, '2024-01-05', 80.0, 1),
                 (2, 1, '2024-02-10', 150.0, 2),
                 (3, 2, '2024-02-20', 220.0, 1),
                 (4, 3, '2024-03-01', 120.0, 2),
                 (5, 2, '2024-03-15', 90.0, 1),
                 (6, NULL, '2024-04-01', 60.0, 1);",
        )
        .unwrap();
    exec
}

fn report() -> Report {
    let config = ReportConfig::from_toml_str(ORDERS_REPORT).unwrap();
    Report::from_inline_config(&config).unwrap()
}

fn over_100() -> FilterParams {
    FilterParams::new().with("amount", FilterInput::new(Operator::Gt, Value::Int(100)))
}

#[test]
fn test_filtered_sorted_page_of_joined_sources() {
    let exec = executor();
    let mut report = report();
    report.set_filters(over_100()).unwrap();
    report.add_sort(SortSpec::desc("order_date")).unwrap();
    report.set_limit(Some(2)).unwrap();
    report.set_offset(Some(0)).unwrap();

    let explain = report.explain().unwrap();
    validate_sql(&explain.sql, Dialect::Sqlite).unwrap();
    validate_sql(&explain.count_sql, Dialect::Sqlite).unwrap();
    assert!(explain.sql.contains("LEFT JOIN \"customers\" AS \"customers\""));
    assert!(explain.sql.contains("LIMIT 2"));

    let rows = report.rows(&exec).unwrap();
    assert_eq!(rows.len(), 2);
    for row in &rows {
        let amount = row.get("order_amount").unwrap().raw_value.as_f64().unwrap();
        assert!(amount > 100.0);
        for alias in ["order_id", "order_date", "customer_name", "customer_link"] {
            assert!(row.get(alias).is_some(), "missing {alias}");
        }
    }
    let dates: Vec<String> = rows
        .iter()
        .map(|row| row.get("order_date").unwrap().raw_value.as_text())
        .collect();
    assert!(dates.windows(2).all(|pair| pair[0] >= pair[1]));
    assert_eq!(dates, vec!["2024-03-01", "2024-02-20"]);

    report.reset();
    assert_eq!(report.record_count(&exec).unwrap(), 3);
}

#[test]
fn test_rows_are_formatted_by_their_outputs() {
    let exec = executor();
    let mut report = report();
    report.add_sort(SortSpec::asc("order_id")).unwrap();

    let rows = report.rows(&exec).unwrap();
    assert_eq!(rows.len(), 6);

    let first = &rows[0];
    assert_eq!(first.get("order_date").unwrap().formatted_value, "05/01/2024");
    assert_eq!(first.get("order_amount").unwrap().formatted_value, "80.00");
    assert_eq!(first.get("order_status").unwrap().formatted_value, "Open");
    assert_eq!(first.get("order_status").unwrap().raw_value, Value::Int(1));
    assert_eq!(first.get("customer_name").unwrap().formatted_value, "Ada Lovelace");
    assert_eq!(
        first.get("customer_link").unwrap().html_value.as_deref(),
        Some("<a href=\"/customers/1\">Lovelace</a>")
    );

    assert_eq!(rows[1].get("order_status").unwrap().formatted_value, "Shipped");
    assert_eq!(rows[2].get("customer_name").unwrap().formatted_value, "Bob");

    let unmatched = &rows[5];
    assert_eq!(unmatched.get("customer_name").unwrap().raw_value, Value::Null);
    assert_eq!(unmatched.get("customer_link").unwrap().html_value, None);
    assert_eq!(unmatched.get("order_date").unwrap().formatted_value, "01/04/2024");
}

#[test]
fn test_columns_follow_output_order() {
    let columns = report().columns();
    let aliases: Vec<&str> = columns.iter().map(|c| c.alias.as_str()).collect();
    assert_eq!(
        aliases,
        vec![
            "order_id",
            "order_date",
            "order_amount",
            "order_status",
            "customer_name",
            "customer_link"
        ]
    );
    assert_eq!(columns[1].title, "Date");
    assert_eq!(columns[4].title, "Customer Name");
    assert_eq!(columns[5].title, "Customer");
}

#[test]
fn test_end_of_stream_after_last_row() {
    let exec = executor();
    let mut report = report();
    report.set_filters(over_100()).unwrap();

    for _ in 0..3 {
        report.next_row(&exec).unwrap();
    }
    for _ in 0..2 {
        let err = report.next_row(&exec).unwrap_err();
        assert!(err.is_end_of_stream());
    }
}

#[test]
fn test_request_changes_rejected_mid_read() {
    let exec = executor();
    let mut report = report();
    report.next_row(&exec).unwrap();

    assert!(matches!(
        report.set_limit(Some(1)),
        Err(ReportError::Flow(FlowError::AlreadyInitialized))
    ));
    assert!(report.set_filters(over_100()).is_err());

    report.reset();
    report.set_limit(Some(1)).unwrap();
    assert_eq!(report.rows(&exec).unwrap().len(), 1);
}

#[test]
fn test_offset_pages_through_rows() {
    let exec = executor();
    let mut report = report();
    report.add_sort(SortSpec::asc("order_id")).unwrap();
    report.set_limit(Some(4)).unwrap();
    report.set_offset(Some(4)).unwrap();

    let rows = report.rows(&exec).unwrap();
    let ids: Vec<Value> = rows
        .iter()
        .map(|row| row.get("order_id").unwrap().raw_value.clone())
        .collect();
    assert_eq!(ids, vec![Value::Int(5), Value::Int(6)]);
    assert_eq!(report.record_count(&exec).unwrap(), 6);
}

#[test]
fn test_group_by_output() {
    let exec = executor();
    let mut report = report();
    assert!(!report.is_aggregated("order_status"));

    report.enable_aggregation("order_status").unwrap();
    assert!(report.is_aggregated("order_status"));
    let sql = report.explain().unwrap().sql;
    assert!(sql.contains("GROUP BY"));
    assert_eq!(report.record_count(&exec).unwrap(), 2);

    report.reset();
    report.disable_aggregation("order_status").unwrap();
    assert!(!report.is_aggregated("order_status"));
    assert_eq!(report.record_count(&exec).unwrap(), 6);

    assert!(report.enable_aggregation("customer_link").is_err());
    assert!(report.enable_aggregation("nope").is_err());
}

#[test]
fn test_entities_introspected_from_database() {
    let exec = executor();
    let mut config = ReportConfig::from_toml_str(ORDERS_REPORT).unwrap();
    config.entities.retain(|entity| entity.name == "orders");

    let inline = config.schema_provider();
    let introspected = SqliteSchemaProvider::new(exec.connection());
    let provider = LayeredSchemaProvider::new(&inline, &introspected);
    let mut report = Report::from_config(&config, &provider).unwrap();

    report.set_filters(over_100()).unwrap();
    assert_eq!(report.record_count(&exec).unwrap(), 3);
}

use std::collections::BTreeMap;

use super::*;
use crate::value::Value;

fn ior_store() -> Store {
    let mut store = Store::open_in_memory().expect("in-memory store opens");
    for (name, numeric, key) in [
        ("operation", false, true),
        ("nodes", true, true),
        ("bandwidth", true, false),
    ] {
        store
            .add_field(
                "ior",
                &FieldSpec {
                    name: name.to_string(),
                    numeric,
                    key,
                    default: None,
                },
            )
            .expect("field is added to empty benchmark");
    }
    store
}

fn row(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect()
}

const IOR_CSV: &str = "operation,nodes,bandwidth\nread,1,100\nread,2,200\n";

struct CancelAfter {
    limit: u64,
    done: u64,
    chunks: Vec<u64>,
}

impl ImportObserver for CancelAfter {
    fn row_done(&mut self, _line: u64) {
        self.done += 1;
    }

    fn chunk_committed(&mut self, total_rows: u64) {
        self.chunks.push(total_rows);
    }

    fn cancel_requested(&self) -> bool {
        self.done >= self.limit
    }
}

#[test]
fn canonical_names_fold_case_and_punctuation() {
    assert_eq!(canonical_name(" read-bw ").expect("valid name"), "READ_BW");
    assert_eq!(canonical_name("Nodes").expect("valid name"), "NODES");
    assert!(canonical_name("").is_err());
    assert!(canonical_name("9lives").is_err());
    assert!(canonical_name("exp").is_err());
}

#[test]
fn identity_escaping_keeps_values_apart() {
    assert_ne!(identity_string(&["a|b"]), identity_string(&["a", "b"]));
    assert_eq!(identity_string(&["a|b", "c\\"]), "a\\pb|c\\\\");
}

#[test]
fn fields_create_benchmark_and_wide_table() {
    let store = ior_store();
    let fields = store.fields("IOR").expect("fields load");
    let names: Vec<&str> = fields.iter().map(|field| field.name.as_str()).collect();
    assert_eq!(names, vec!["OPERATION", "NODES", "BANDWIDTH"]);

    let raw = store
        .query_raw("SELECT BENCH, EXP, OUT, _OPERATION, _NODES, _BANDWIDTH FROM IOR_VIEW")
        .expect("wide table follows naming convention");
    assert_eq!(raw.columns.len(), 6);
    assert!(raw.rows.is_empty());
}

#[test]
fn reinserting_same_identity_is_a_noop() {
    let mut store = ior_store();
    let first = store
        .insert_experiment("ior", &row(&[("operation", "read"), ("nodes", "1"), ("bandwidth", "100")]))
        .expect("first insert");
    let again = store
        .insert_experiment("IOR", &row(&[("Operation", "read"), ("nodes", "1.0"), ("bandwidth", "999")]))
        .expect("second insert");

    assert!(first.is_inserted());
    assert_eq!(again, InsertOutcome::Existing(first.id()));
    assert_eq!(store.experiment_count("ior").expect("count"), 1);
}

#[test]
fn insertion_requires_key_values_and_numbers() {
    let mut store = ior_store();
    let missing_key = store.insert_experiment("ior", &row(&[("operation", "read"), ("bandwidth", "1")]));
    assert!(matches!(missing_key, Err(StoreError::InvalidValue(_))));

    let bad_number = store.insert_experiment("ior", &row(&[("operation", "read"), ("nodes", "many")]));
    assert!(matches!(bad_number, Err(StoreError::InvalidValue(_))));

    let unknown = store.insert_experiment("ior", &row(&[("operation", "read"), ("nodes", "1"), ("size", "4")]));
    assert!(matches!(unknown, Err(StoreError::NotFound { kind: "field", .. })));
    assert_eq!(store.experiment_count("ior").expect("count"), 0);
}

#[test]
fn two_spellings_of_one_field_are_rejected() {
    let mut store = ior_store();
    let clash = store.insert_experiment(
        "ior",
        &row(&[("operation", "read"), ("nodes", "1"), ("Nodes", "2")]),
    );
    assert!(matches!(clash, Err(StoreError::InvalidValue(message)) if message.contains("NODES")));
    assert_eq!(store.experiment_count("ior").expect("count"), 0);

    let options = ImportOptions {
        fixed: row(&[("bandwidth", "1"), ("BANDWIDTH", "2")]),
        ..ImportOptions::default()
    };
    let import = store.import_csv("ior", IOR_CSV.as_bytes(), &options, &mut ());
    assert!(matches!(import, Err(StoreError::InvalidValue(_))));
    assert_eq!(store.experiment_count("ior").expect("count"), 0);
}

#[test]
fn benchmark_without_key_rejects_insertion() {
    let mut store = Store::open_in_memory().expect("store opens");
    store
        .add_field(
            "plain",
            &FieldSpec {
                name: "value".to_string(),
                numeric: true,
                ..FieldSpec::default()
            },
        )
        .expect("field added");
    let result = store.insert_experiment("plain", &row(&[("value", "1")]));
    assert!(matches!(result, Err(StoreError::SchemaViolation(_))));
}

#[test]
fn schema_changes_fail_once_data_exists() {
    let mut store = ior_store();
    store
        .insert_experiment("ior", &row(&[("operation", "read"), ("nodes", "1"), ("bandwidth", "100")]))
        .expect("insert");

    let key_field = FieldSpec {
        name: "api".to_string(),
        numeric: false,
        key: true,
        default: Some("posix".to_string()),
    };
    assert!(matches!(store.add_field("ior", &key_field), Err(StoreError::SchemaViolation(_))));
    assert!(store.remove_field("ior", "bandwidth").is_err());
    assert!(store.set_field_numeric("ior", "operation", true).is_err());
    assert!(store.set_field_key("ior", "bandwidth", true).is_err());
    assert_eq!(store.fields("ior").expect("fields").len(), 3);

    let ids = store.experiment_ids("ior").expect("ids");
    assert_eq!(store.delete_experiments("ior", &ids).expect("delete"), 1);

    store.add_field("ior", &key_field).expect("key field added once empty");
    store.remove_field("ior", "bandwidth").expect("field removed once empty");
    store
        .set_field_numeric("ior", "operation", true)
        .expect("type changes once empty");
}

#[test]
fn non_key_field_backfills_default() {
    let mut store = ior_store();
    store
        .insert_experiment("ior", &row(&[("operation", "read"), ("nodes", "1"), ("bandwidth", "100")]))
        .expect("insert");

    let without_default = FieldSpec {
        name: "fs".to_string(),
        ..FieldSpec::default()
    };
    assert!(store.add_field("ior", &without_default).is_err());

    store
        .add_field(
            "ior",
            &FieldSpec {
                name: "fs".to_string(),
                default: Some("lustre".to_string()),
                ..FieldSpec::default()
            },
        )
        .expect("non-key field with default is added");

    let rows = store.select_rows("ior", &RowQuery::default()).expect("rows");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].values["FS"], Value::text("lustre"));
    assert_eq!(rows[0].values["BANDWIDTH"], Value::Number(100.0));
}

#[test]
fn renames_preserve_data_and_indices() {
    let mut store = ior_store();
    store
        .insert_experiment("ior", &row(&[("operation", "write"), ("nodes", "4"), ("bandwidth", "50")]))
        .expect("insert");
    store
        .create_index("ior", "by_nodes", &["nodes".to_string(), "operation".to_string()])
        .expect("index created");

    store.rename_field("ior", "bandwidth", "bw").expect("field renamed");
    let renamed = store.rename_benchmark("ior", "ior2").expect("benchmark renamed");
    assert_eq!(renamed.view_table(), "IOR2_VIEW");

    let raw = store.query_raw("SELECT _BW FROM IOR2_VIEW").expect("renamed column");
    assert_eq!(raw.rows, vec![vec![Value::Number(50.0)]]);

    let indices = store.indices("ior2").expect("indices");
    assert_eq!(indices[0].fields, vec!["NODES".to_string(), "OPERATION".to_string()]);
    let physical = store
        .query_raw("SELECT name FROM sqlite_master WHERE type = 'index' AND tbl_name = 'IOR2_VIEW'")
        .expect("index lookup");
    assert_eq!(physical.rows, vec![vec![Value::text("IOR2_BY_NODES_IDX")]]);
}

#[test]
fn removing_field_drops_referencing_index() {
    let mut store = ior_store();
    store
        .create_index("ior", "bw", &["bandwidth".to_string()])
        .expect("index created");
    store.remove_field("ior", "bandwidth").expect("field removed");
    assert!(store.indices("ior").expect("indices").is_empty());
}

#[test]
fn remove_benchmark_requires_no_fields() {
    let mut store = ior_store();
    assert!(matches!(store.remove_benchmark("ior"), Err(StoreError::SchemaViolation(_))));
    for field in ["operation", "nodes", "bandwidth"] {
        store.remove_field("ior", field).expect("field removed");
    }
    store.remove_benchmark("ior").expect("empty benchmark removed");
    assert!(store.find_benchmark("ior").expect("lookup").is_none());
}

#[test]
fn descriptions_can_be_replaced_and_cleared() {
    let mut store = Store::open_in_memory().expect("in-memory store opens");
    store
        .create_benchmark("mdtest", Some("metadata rates"))
        .expect("benchmark created");
    assert!(matches!(
        store.create_benchmark("MDTEST", None),
        Err(StoreError::Duplicate { .. })
    ));

    store
        .set_description("mdtest", Some("create and stat"))
        .expect("description updated");
    let bench = store.benchmark("mdtest").expect("benchmark exists");
    assert_eq!(bench.description.as_deref(), Some("create and stat"));

    store.set_description("mdtest", None).expect("description cleared");
    assert_eq!(store.benchmark("mdtest").expect("benchmark exists").description, None);
}

#[test]
fn outliers_are_excluded_unless_requested() {
    let mut store = ior_store();
    store
        .import_csv("ior", IOR_CSV.as_bytes(), &ImportOptions::default(), &mut ())
        .expect("import");
    let touched = store
        .set_outlier_where("ior", "_NODES = 2", true)
        .expect("outliers marked");
    assert_eq!(touched, 1);

    let visible = store.select_rows("ior", &RowQuery::default()).expect("rows");
    assert_eq!(visible.len(), 1);
    let all = store
        .select_rows(
            "ior",
            &RowQuery {
                include_outliers: true,
                ..RowQuery::default()
            },
        )
        .expect("rows");
    assert_eq!(all.len(), 2);
    assert!(store.is_outlier("ior", all[1].experiment).expect("flag"));

    store
        .set_outlier("ior", all[1].experiment, false)
        .expect("flag cleared");
    assert_eq!(store.select_rows("ior", &RowQuery::default()).expect("rows").len(), 2);
}

#[test]
fn distinct_values_are_sorted_under_filter() {
    let mut store = ior_store();
    let csv = "operation,nodes,bandwidth\nwrite,2,1\nread,2,2\nread,1,3\nwrite,8,4\n";
    store
        .import_csv("ior", csv.as_bytes(), &ImportOptions::default(), &mut ())
        .expect("import");

    let operations = store
        .distinct_values("ior", "operation", &RowQuery::default())
        .expect("distinct");
    assert_eq!(operations, vec![Value::text("read"), Value::text("write")]);

    let nodes = store
        .distinct_values("ior", "nodes", &RowQuery::default().with_predicate("_OPERATION = 'write'"))
        .expect("distinct");
    assert_eq!(nodes, vec![Value::Number(2.0), Value::Number(8.0)]);
}

#[test]
fn repeated_import_reports_existing_rows() {
    let mut store = ior_store();
    let first = store
        .import_csv("ior", IOR_CSV.as_bytes(), &ImportOptions::default(), &mut ())
        .expect("first import");
    let second = store
        .import_csv("ior", IOR_CSV.as_bytes(), &ImportOptions::default(), &mut ())
        .expect("second import");

    assert_eq!(first.inserted, 2);
    assert_eq!(second.inserted, 0);
    assert_eq!(second.existing, 2);
    assert_eq!(store.experiment_count("ior").expect("count"), 2);
}

#[test]
fn data_error_rolls_back_only_open_chunk() {
    let mut store = ior_store();
    let csv = "operation,nodes,bandwidth\nread,1,1\nread,2,2\nread,3,3\nread,many,4\n";
    let options = ImportOptions {
        chunk_size: 2,
        ..ImportOptions::default()
    };
    let result = store.import_csv("ior", csv.as_bytes(), &options, &mut ());

    match result {
        Err(StoreError::Data { line, .. }) => assert_eq!(line, 5),
        other => panic!("expected data error, got {other:?}"),
    }
    assert_eq!(store.experiment_count("ior").expect("count"), 2);
}

#[test]
fn cancellation_is_distinct_from_failure() {
    let mut store = ior_store();
    let csv = "operation,nodes,bandwidth\nread,1,1\nread,2,2\nread,3,3\nread,4,4\n";
    let options = ImportOptions {
        chunk_size: 2,
        ..ImportOptions::default()
    };
    let mut observer = CancelAfter {
        limit: 3,
        done: 0,
        chunks: Vec::new(),
    };
    let result = store.import_csv("ior", csv.as_bytes(), &options, &mut observer);

    assert!(matches!(result, Err(StoreError::Canceled { committed: 2 })));
    assert_eq!(observer.chunks, vec![2]);
    assert_eq!(store.experiment_count("ior").expect("count"), 2);
}

#[test]
fn import_applies_fixed_values_and_skips_unknown_columns() {
    let mut store = ior_store();
    let csv = "operation,nodes,bandwidth,comment\nread,1,100,warm\n";
    let options = ImportOptions {
        fixed: row(&[("bandwidth", "7")]),
        ..ImportOptions::default()
    };
    let summary = store
        .import_csv("ior", csv.as_bytes(), &options, &mut ())
        .expect("import");

    assert_eq!(summary.skipped_columns, vec!["comment".to_string()]);
    let rows = store.select_rows("ior", &RowQuery::default()).expect("rows");
    assert_eq!(rows[0].values["BANDWIDTH"], Value::Number(7.0));
}

#[test]
fn auto_key_identifies_rows_by_content() {
    let mut store = Store::open_in_memory().expect("store opens");
    store
        .add_field(
            "runs",
            &FieldSpec {
                name: "time".to_string(),
                numeric: true,
                ..FieldSpec::default()
            },
        )
        .expect("field added");
    let options = ImportOptions {
        auto_key: Some("run_id".to_string()),
        ..ImportOptions::default()
    };
    let csv = "time\n1.5\n2.5\n1.5\n";
    let summary = store
        .import_csv("runs", csv.as_bytes(), &options, &mut ())
        .expect("import");

    assert_eq!(summary.inserted, 2);
    assert_eq!(summary.existing, 1);
    let key = store.field("runs", "run_id").expect("auto key field exists");
    assert!(key.key && !key.numeric);

    let rows = store.select_rows("runs", &RowQuery::default()).expect("rows");
    match &rows[0].values["RUN_ID"] {
        Value::Text(hash) => assert_eq!(hash.len(), 16),
        other => panic!("expected hash text, got {other:?}"),
    }
}

#[test]
fn zero_chunk_size_is_rejected() {
    let mut store = ior_store();
    let options = ImportOptions {
        chunk_size: 0,
        ..ImportOptions::default()
    };
    let result = store.import_csv("ior", IOR_CSV.as_bytes(), &options, &mut ());
    assert!(matches!(result, Err(StoreError::InvalidValue(_))));
}

#[test]
fn version_mismatch_is_fatal() {
    let store = Store::open_in_memory().expect("store opens");
    schema::write_metadata(&store.conn, "schema_version_major", "2").expect("metadata written");
    let result = schema::ensure_schema(&store.conn);
    assert!(matches!(result, Err(StoreError::VersionMismatch { .. })));
}

//! Integration tests for the scriptlite crate.

use std::path::Path;

use scriptlite::{
    Arg, Args, ConnectionHandle, Error, ErrorKind, LookupKey, OpenOptions, ParamType, Parameter,
    ResultSet, Shape, TransactionEnd, TransactionState, Value, args,
};
use tempfile::TempDir;

/// Creates a database file with a `users` table and returns its directory.
fn users_db() -> (TempDir, String) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("users.db").to_string_lossy().into_owned();
    let db = ConnectionHandle::open(&OpenOptions::new(&path).create_file(true)).unwrap();
    db.execute(
        "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL)",
        args![],
    )
    .unwrap();
    db.close().unwrap();
    (dir, path)
}

fn count_users(path: &str) -> Value {
    let db = ConnectionHandle::open(&OpenOptions::new(path)).unwrap();
    db.execute_scalar("SELECT COUNT(*) FROM users", args![])
        .unwrap()
}

// ============================================================================
// Open
// ============================================================================

#[test]
fn test_open_empty_target_is_memory() {
    let db = ConnectionHandle::open(&OpenOptions::default()).unwrap();
    assert!(db.settings().is_memory());
    assert_eq!(
        db.execute_non_query("CREATE TABLE t (x)", args![]).unwrap(),
        0
    );
    assert_eq!(
        db.execute_scalar("SELECT count(*) FROM t", args![]).unwrap(),
        Value::Integer(0)
    );
}

#[test]
fn test_open_missing_file_without_create_fails() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("missing.db");
    let err = ConnectionHandle::open(&OpenOptions::new(path.to_string_lossy())).unwrap_err();
    assert!(matches!(err, Error::Open { .. }));
    assert_eq!(err.kind(), ErrorKind::Lifecycle);
    assert!(!path.exists());
}

#[test]
fn test_open_creates_file_when_asked() {
    let (_dir, path) = users_db();
    assert!(Path::new(&path).exists());
}

#[test]
fn test_open_from_options_string() {
    let (_dir, path) = users_db();
    let opts = OpenOptions::default().options(format!(
        "Data Source={path}; Foreign Keys=True; Busy Timeout=100; Version=3"
    ));
    let db = ConnectionHandle::open(&opts).unwrap();
    assert_eq!(db.settings().data_source, path);
    assert_eq!(
        db.execute_scalar("PRAGMA foreign_keys", args![]).unwrap(),
        Value::Integer(1)
    );
}

#[test]
fn test_open_options_without_data_source_fails() {
    let err = ConnectionHandle::open(&OpenOptions::default().options("Foreign Keys=True"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
}

#[test]
fn test_open_from_yaml_config() {
    let (dir, path) = users_db();
    let config = dir.path().join("open.yml");
    std::fs::write(
        &config,
        format!("database: {path}\nforeign_keys: true\ntransaction: true\n"),
    )
    .unwrap();

    let db = ConnectionHandle::open(&OpenOptions::load(&config).unwrap()).unwrap();
    assert!(db.transaction_state().is_active());
    assert!(db.settings().foreign_keys);
}

#[test]
fn test_journal_mode_option() {
    let (_dir, path) = users_db();
    let db = ConnectionHandle::open(&OpenOptions::new(&path).options("Journal Mode=WAL")).unwrap();
    assert_eq!(
        db.execute_scalar("PRAGMA journal_mode", args![]).unwrap(),
        Value::from("wal")
    );
}

#[test]
fn test_begin_failure_when_database_locked() {
    let (_dir, path) = users_db();
    let holder = ConnectionHandle::open(&OpenOptions::new(&path).transaction(true)).unwrap();
    assert!(holder.transaction_state().is_active());

    let opts = OpenOptions::new(&path)
        .options("Busy Timeout=0")
        .transaction(true);
    let err = ConnectionHandle::open(&opts).unwrap_err();
    assert!(matches!(err, Error::Begin { .. }), "got {err:?}");
    assert_eq!(err.kind(), ErrorKind::Lifecycle);
    assert_eq!(err.sqlite_code(), Some(rusqlite::ErrorCode::DatabaseBusy));

    holder.close().unwrap();
    assert_eq!(count_users(&path), Value::Integer(0));
}

#[test]
fn test_read_only_rejects_writes() {
    let (_dir, path) = users_db();
    let db = ConnectionHandle::open(&OpenOptions::new(&path).read_only(true)).unwrap();
    let err = db
        .execute("INSERT INTO users (name) VALUES ('x')", args![])
        .unwrap_err();
    assert_eq!(err.sqlite_code(), Some(rusqlite::ErrorCode::ReadOnly));
}

// ============================================================================
// Handle-level transaction
// ============================================================================

#[test]
fn test_transaction_rolled_back_on_drop() {
    let (_dir, path) = users_db();
    {
        let db = ConnectionHandle::open(&OpenOptions::new(&path).transaction(true)).unwrap();
        db.execute("INSERT INTO users (name) VALUES (?)", args!["Joe"])
            .unwrap();
    }
    assert_eq!(count_users(&path), Value::Integer(0));
}

#[test]
fn test_transaction_committed() {
    let (_dir, path) = users_db();
    let db = ConnectionHandle::open(&OpenOptions::new(&path).transaction(true)).unwrap();
    db.execute("INSERT INTO users (name) VALUES (?)", args!["Joe"])
        .unwrap();
    db.commit().unwrap();
    assert_eq!(
        db.transaction_state(),
        TransactionState::Terminal(TransactionEnd::Committed)
    );

    let err = db.commit().unwrap_err();
    assert!(matches!(err, Error::NoActiveTransaction));
    db.close().unwrap();

    assert_eq!(count_users(&path), Value::Integer(1));
}

#[test]
fn test_commit_without_transaction_is_usage_error() {
    let db = ConnectionHandle::open_in_memory().unwrap();
    let err = db.commit().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Usage);
    assert_eq!(
        err.to_string(),
        "no active transaction, it is either completed or was never created"
    );
}

// ============================================================================
// Scoped transactions
// ============================================================================

#[test]
fn test_scoped_failure_rolls_back() {
    let (_dir, path) = users_db();
    let db = ConnectionHandle::open(&OpenOptions::new(&path)).unwrap();

    let result: Result<(), Error> = db.use_transaction(|db| {
        db.execute("INSERT INTO users (name) VALUES (?)", args!["Joe"])?;
        db.execute("INSERT INTO users (name) VALUES (?)", Args::Null)
    });
    let err = result.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Engine);
    assert_eq!(err.sqlite_code(), Some(rusqlite::ErrorCode::ConstraintViolation));
    assert_eq!(
        db.execute_scalar("SELECT COUNT(*) FROM users", args![]).unwrap(),
        Value::Integer(0)
    );
}

#[test]
fn test_scoped_panic_rolls_back() {
    let db = ConnectionHandle::open_in_memory().unwrap();
    db.execute("CREATE TABLE t (x)", args![]).unwrap();

    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let _: Result<(), Error> = db.use_transaction(|db| {
            db.execute("INSERT INTO t VALUES (1)", args![])?;
            panic!("body failed");
        });
    }));
    assert!(outcome.is_err());
    assert_eq!(
        db.execute_scalar("SELECT COUNT(*) FROM t", args![]).unwrap(),
        Value::Integer(0)
    );
    assert!(db.connection().unwrap().is_autocommit());
}

#[test]
fn test_scoped_commit_failure_releases_transaction() {
    let (_dir, path) = users_db();
    let db = ConnectionHandle::open(&OpenOptions::new(&path).options("Busy Timeout=0")).unwrap();
    db.execute("INSERT INTO users (name) VALUES ('a'), ('b')", args![])
        .unwrap();

    // A reader part way through a query holds a shared lock.
    let reader = rusqlite::Connection::open(&path).unwrap();
    let mut stmt = reader.prepare("SELECT name FROM users").unwrap();
    let mut rows = stmt.query([]).unwrap();
    assert!(rows.next().unwrap().is_some());

    let err = db
        .use_transaction(|db| db.execute("INSERT INTO users (name) VALUES ('c')", args![]))
        .unwrap_err();
    assert_eq!(err.sqlite_code(), Some(rusqlite::ErrorCode::DatabaseBusy));
    assert!(db.connection().unwrap().is_autocommit());

    drop(rows);
    drop(stmt);
    db.use_transaction(|db| db.execute("INSERT INTO users (name) VALUES ('d')", args![]))
        .unwrap();
    let names = db
        .execute_column("SELECT name FROM users ORDER BY id", args![])
        .unwrap();
    assert_eq!(names, vec![Value::from("a"), Value::from("b"), Value::from("d")]);
}

#[test]
fn test_nested_scopes_use_savepoints() {
    let opts = OpenOptions::memory().options("Flags=AllowNestedTransactions");
    let db = ConnectionHandle::open(&opts).unwrap();
    db.execute("CREATE TABLE t (x)", args![]).unwrap();

    let result: Result<(), Error> = db.use_transaction(|db| {
        db.execute("INSERT INTO t VALUES (1)", args![])?;
        let inner: Result<(), Error> = db.use_transaction(|db| {
            db.execute("INSERT INTO t VALUES (2)", args![])?;
            Err(Error::NoActiveTransaction)
        });
        assert!(inner.is_err());
        db.use_transaction(|db| db.execute("INSERT INTO t VALUES (3)", args![]))
    });
    result.unwrap();

    assert_eq!(
        db.execute_column("SELECT x FROM t ORDER BY x", args![]).unwrap(),
        vec![Value::Integer(1), Value::Integer(3)]
    );
}

#[test]
fn test_nested_scope_without_permission_fails() {
    let db = ConnectionHandle::open_in_memory().unwrap();
    let result: Result<(), Error> = db.use_transaction(|db| db.use_transaction(|_| Ok(())));
    let err = result.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Engine);
    assert_eq!(
        err.to_string(),
        "cannot start a transaction within a transaction"
    );
}

#[test]
fn test_scope_inside_handle_transaction_as_savepoint() {
    let (_dir, path) = users_db();
    let opts = OpenOptions::new(&path)
        .transaction(true)
        .allow_nested_transactions(true);
    let db = ConnectionHandle::open(&opts).unwrap();

    let failed: Result<(), Error> = db.use_transaction(|db| {
        db.execute("INSERT INTO users (name) VALUES ('a')", args![])?;
        Err(Error::CommandDisposed)
    });
    assert!(failed.is_err());
    db.execute("INSERT INTO users (name) VALUES ('b')", args![])
        .unwrap();
    db.commit().unwrap();
    db.close().unwrap();

    assert_eq!(count_users(&path), Value::Integer(1));
}

// ============================================================================
// Results
// ============================================================================

#[test]
fn test_scalar_without_rows_is_null() {
    let (_dir, path) = users_db();
    let db = ConnectionHandle::open(&OpenOptions::new(&path)).unwrap();
    assert_eq!(
        db.execute_scalar("SELECT name FROM users", args![]).unwrap(),
        Value::Null
    );
    assert!(db.execute_scalar("CREATE TABLE x (a)", args![]).unwrap().is_null());
}

#[test]
fn test_lookup_keeps_first_position_last_value() {
    let db = ConnectionHandle::open_in_memory().unwrap();
    let lookup = db
        .execute_lookup(
            "SELECT 1, 'a' UNION ALL SELECT 2, 'b' UNION ALL SELECT 1, 'c'",
            args![],
        )
        .unwrap();
    let pairs: Vec<_> = lookup.into_iter().collect();
    assert_eq!(
        pairs,
        vec![
            (LookupKey::from(1), Value::from("c")),
            (LookupKey::from(2), Value::from("b")),
        ]
    );
}

#[test]
fn test_lookup_with_one_column_fails_before_stepping() {
    let db = ConnectionHandle::open_in_memory().unwrap();
    let err = db.execute_lookup("SELECT 1", args![]).unwrap_err();
    assert!(matches!(err, Error::ProjectionArity(1)));
}

#[test]
fn test_table_and_rows() {
    let (_dir, path) = users_db();
    let db = ConnectionHandle::open(&OpenOptions::new(&path)).unwrap();
    db.execute(
        "INSERT INTO users (name) VALUES (?), (?)",
        args!["Ann", "Bob"],
    )
    .unwrap();

    let table = db
        .execute_table("SELECT id, name FROM users ORDER BY id", args![])
        .unwrap();
    assert_eq!(table.column_names(), ["id", "name"]);
    assert_eq!(table.columns[1].decl_type.as_deref(), Some("TEXT"));
    assert_eq!(table.rows[1].get("NAME"), Some(&Value::from("Bob")));

    let rows = db
        .execute_rows("SELECT name FROM users WHERE id > ?", args![1])
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get_index(0), Some(&Value::from("Bob")));
}

#[test]
fn test_query_by_shape() {
    let db = ConnectionHandle::open_in_memory().unwrap();
    let result = db
        .query("SELECT 1 UNION ALL SELECT NULL", args![], Shape::Column)
        .unwrap();
    assert_eq!(
        result,
        ResultSet::Column(vec![Value::Integer(1), Value::Null])
    );
    let result = db
        .query("CREATE TABLE t (x)", args![], Shape::NonQuery)
        .unwrap();
    assert_eq!(result, ResultSet::NonQueryCount(0));
}

#[test]
fn test_regexp_on_number_is_false() {
    let db = ConnectionHandle::open_in_memory().unwrap();
    assert_eq!(
        db.execute_scalar("SELECT 123 REGEXP '^1'", args![]).unwrap(),
        Value::Integer(0)
    );
    assert_eq!(
        db.execute_scalar("SELECT '123' REGEXP '^1'", args![]).unwrap(),
        Value::Integer(1)
    );
}

#[test]
fn test_host_function() {
    let db = ConnectionHandle::open_in_memory().unwrap();
    db.register_function("shout", 1, |args| match args[0].as_str() {
        Some(s) => Value::from(s.to_uppercase()),
        None => Value::Null,
    })
    .unwrap();
    assert_eq!(
        db.execute_scalar("SELECT shout(?)", args!["hi"]).unwrap(),
        Value::from("HI")
    );
}

// ============================================================================
// Raw commands
// ============================================================================

#[test]
fn test_raw_command_with_arguments_is_rejected() {
    let db = ConnectionHandle::open_in_memory().unwrap();
    let cmd = db.create_command("SELECT 1", false, vec![]).unwrap();
    let err = db.execute_scalar(&cmd, args![1]).unwrap_err();
    assert!(matches!(err, Error::ParametersWithRawCommand));
    assert_eq!(err.to_string(), "parameters are not used with a raw command");
    assert_eq!(db.execute_scalar(&cmd, Args::None).unwrap(), Value::Integer(1));
}

#[test]
fn test_raw_command_reused_with_typed_parameter() {
    let (_dir, path) = users_db();
    let db = ConnectionHandle::open(&OpenOptions::new(&path)).unwrap();
    let insert = db
        .create_command(
            "INSERT INTO users (id, name) VALUES (:id, :name)",
            true,
            vec![
                Parameter::typed("id", ParamType::Integer, 0).unwrap(),
                Parameter::new("name", ""),
            ],
        )
        .unwrap();

    for (id, name) in [("1", "Ann"), ("2", "Bob")] {
        insert.set_value("id", id).unwrap();
        insert.set_value("name", name).unwrap();
        assert_eq!(db.execute_non_query(&insert, args![]).unwrap(), 1);
    }
    assert_eq!(
        db.execute_column("SELECT id FROM users ORDER BY id", args![]).unwrap(),
        vec![Value::Integer(1), Value::Integer(2)]
    );
}

#[test]
fn test_tracked_commands_disposed_exactly_once() {
    let db = ConnectionHandle::open_in_memory().unwrap();
    let early = db.create_command("SELECT 1", true, vec![]).unwrap();
    let late = db.create_command("SELECT 2", true, vec![]).unwrap();
    assert_eq!(db.tracked_commands(), 2);

    early.dispose();
    let err = db.execute_scalar(&early, args![]).unwrap_err();
    assert!(matches!(err, Error::CommandDisposed));
    assert!(!late.is_disposed());

    db.close().unwrap();
    assert!(early.is_disposed());
    assert!(late.is_disposed());
}

#[test]
fn test_named_and_positional_arguments_mix() {
    let db = ConnectionHandle::open_in_memory().unwrap();
    let value = db
        .execute_scalar(
            "SELECT ?1 || ?2 || :sep",
            args!["a", Arg::named([("sep", "-")]), "b"],
        )
        .unwrap();
    assert_eq!(value, Value::from("ab-"));
}

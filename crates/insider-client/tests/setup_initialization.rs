use insider_client::setup::ensure_initialized_at;
use rusqlite::Connection;
use tempfile::tempdir;

fn object_exists(connection: &Connection, object_type: &str, object_name: &str) -> bool {
    connection
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = ?1 AND name = ?2",
            [object_type, object_name],
            |_| Ok(()),
        )
        .is_ok()
}

fn table_columns(connection: &Connection, table: &str) -> Vec<String> {
    let statement = connection.prepare("SELECT name FROM pragma_table_info(?1)");
    let mut columns = Vec::new();
    if let Ok(mut stmt) = statement {
        let rows = stmt.query_map([table], |row| row.get::<_, String>(0));
        if let Ok(iter) = rows {
            for name in iter.flatten() {
                columns.push(name);
            }
        }
    }
    columns
}

fn user_version(connection: &Connection) -> Option<i64> {
    connection
        .query_row("PRAGMA user_version", [], |row| row.get::<_, i64>(0))
        .ok()
}

#[test]
fn setup_creates_store_db_at_home_override() {
    let temp = tempdir();
    assert!(temp.is_ok());
    if let Ok(temp_dir) = temp {
        let home = temp_dir.path().join("insider-home");

        let context = ensure_initialized_at(&home);
        assert!(context.is_ok());
        if let Ok(setup_context) = context {
            assert!(setup_context.db_path.ends_with("insider.db"));
            assert!(home.join("insider.db").exists());
            let connection = Connection::open(&setup_context.db_path);
            assert!(connection.is_ok());
            if let Ok(conn) = connection {
                assert_eq!(user_version(&conn), Some(1));
            }
        }
    }
}

#[test]
fn store_table_has_exactly_the_filing_columns() {
    let temp = tempdir();
    assert!(temp.is_ok());
    if let Ok(temp_dir) = temp {
        let context = ensure_initialized_at(temp_dir.path());
        assert!(context.is_ok());
        if let Ok(setup_context) = context {
            let connection = Connection::open(&setup_context.db_path);
            assert!(connection.is_ok());
            if let Ok(conn) = connection {
                assert_eq!(
                    table_columns(&conn, "insider_data"),
                    vec![
                        "ACCESSION_NUMBER",
                        "FILING_DATE",
                        "ISSUERTRADINGSYMBOL",
                        "TRANS_SHARES",
                        "TRANS_PRICEPERSHARE",
                        "TRANS_ACQUIRED_DISP_CD",
                        "SHRS_OWND_FOLWNG_TRANS",
                    ]
                );
                assert!(object_exists(&conn, "index", "idx_ISSUERTRADINGSYMBOL"));
            }
        }
    }
}

#[test]
fn setup_is_idempotent_and_migrates_once() {
    let temp = tempdir();
    assert!(temp.is_ok());
    if let Ok(temp_dir) = temp {
        let home = temp_dir.path().join("insider-home");

        let first = ensure_initialized_at(&home);
        assert!(first.is_ok());
        let second = ensure_initialized_at(&home);
        assert!(second.is_ok());

        if let (Ok(first_context), Ok(second_context)) = (first, second) {
            assert_eq!(first_context.db_path, second_context.db_path);
            let connection = Connection::open(&second_context.db_path);
            assert!(connection.is_ok());
            if let Ok(conn) = connection {
                assert_eq!(user_version(&conn), Some(1));
            }
        }
    }
}

#[test]
fn setup_repairs_dropped_ticker_index() {
    let temp = tempdir();
    assert!(temp.is_ok());
    if let Ok(temp_dir) = temp {
        let home = temp_dir.path().join("insider-home");
        let first = ensure_initialized_at(&home);
        assert!(first.is_ok());

        if let Ok(context) = first {
            let connection = Connection::open(&context.db_path);
            assert!(connection.is_ok());
            if let Ok(conn) = connection {
                assert!(conn.execute_batch("DROP INDEX idx_ISSUERTRADINGSYMBOL").is_ok());
                assert!(!object_exists(&conn, "index", "idx_ISSUERTRADINGSYMBOL"));
            }

            assert!(ensure_initialized_at(&home).is_ok());

            let reopened = Connection::open(&context.db_path);
            assert!(reopened.is_ok());
            if let Ok(conn) = reopened {
                assert!(object_exists(&conn, "index", "idx_ISSUERTRADINGSYMBOL"));
            }
        }
    }
}

#[test]
fn setup_rejects_a_store_missing_required_columns() {
    let temp = tempdir();
    assert!(temp.is_ok());
    if let Ok(temp_dir) = temp {
        let home = temp_dir.path().join("insider-home");
        assert!(std::fs::create_dir_all(&home).is_ok());
        let connection = Connection::open(home.join("insider.db"));
        assert!(connection.is_ok());
        if let Ok(conn) = connection {
            let seeded = conn.execute_batch(
                "CREATE TABLE insider_data (ACCESSION_NUMBER TEXT);
                 PRAGMA user_version = 1;",
            );
            assert!(seeded.is_ok());
        }

        let result = ensure_initialized_at(&home);
        assert!(matches!(result, Err(error) if error.code == "store_corrupt"));
    }
}

#[test]
fn setup_rejects_a_non_sqlite_file() {
    let temp = tempdir();
    assert!(temp.is_ok());
    if let Ok(temp_dir) = temp {
        let home = temp_dir.path().join("insider-home");
        assert!(std::fs::create_dir_all(&home).is_ok());
        assert!(std::fs::write(home.join("insider.db"), vec![0x42_u8; 4096]).is_ok());

        let result = ensure_initialized_at(&home);
        assert!(result.is_err());
        if let Err(error) = result {
            assert!(error.is_internal());
        }
    }
}

use std::path::Path;

use rusqlite::{Connection, OptionalExtension, params};

use crate::migrations::{
    EXPECTED_USER_VERSION, REQUIRED_INDEX_NAMES, STORE_COLUMNS, STORE_TABLE, run_pending,
    safe_repair_statement,
};
use crate::state::{
    ensure_store_directory, map_sqlite_error, open_connection, resolve_store_home, store_db_path,
};
use crate::{ClientError, ClientResult};

#[derive(Debug, Clone)]
pub struct SetupContext {
    pub db_path: String,
}

pub fn ensure_initialized() -> ClientResult<SetupContext> {
    ensure_initialized_with_home_override(None)
}

pub fn ensure_initialized_at(home_override: &Path) -> ClientResult<SetupContext> {
    ensure_initialized_with_home_override(Some(home_override))
}

pub(crate) fn ensure_initialized_with_home_override(
    home_override: Option<&Path>,
) -> ClientResult<SetupContext> {
    let store_home = resolve_store_home(home_override)?;
    ensure_store_directory(&store_home)?;

    let db_path = store_db_path(&store_home);
    let mut connection = open_connection(&db_path)?;

    run_pending(&mut connection).map_err(|error| map_migration_error(&db_path, &error))?;

    verify_store_table(&connection, &db_path)?;
    repair_missing_indexes(&connection, &db_path)?;
    verify_post_repair_objects(&connection, &db_path)?;

    Ok(SetupContext {
        db_path: db_path.display().to_string(),
    })
}

fn map_migration_error(db_path: &Path, error: &rusqlite_migration::Error) -> ClientError {
    match error {
        rusqlite_migration::Error::RusqliteError { query: _, err } => {
            let mapped = map_sqlite_error(db_path, err);
            if mapped.code == "store_locked"
                || mapped.code == "store_corrupt"
                || mapped.code == "store_init_permission_denied"
            {
                mapped
            } else {
                ClientError::migration_failed(db_path, &error.to_string())
            }
        }
        _ => ClientError::migration_failed(db_path, &error.to_string()),
    }
}

fn verify_store_table(connection: &Connection, db_path: &Path) -> ClientResult<()> {
    if !sqlite_object_exists(connection, "table", STORE_TABLE, db_path)? {
        return Err(ClientError::store_corrupt(db_path));
    }

    let columns = store_table_columns(connection, db_path)?;
    for required_column in STORE_COLUMNS {
        if !columns.iter().any(|column| column == required_column) {
            return Err(ClientError::store_corrupt(db_path));
        }
    }

    Ok(())
}

fn repair_missing_indexes(connection: &Connection, db_path: &Path) -> ClientResult<()> {
    for index_name in REQUIRED_INDEX_NAMES {
        if !sqlite_object_exists(connection, "index", index_name, db_path)? {
            tracing::warn!(index = index_name, "recreating missing store index");
            let sql = safe_repair_statement(index_name).ok_or_else(|| {
                ClientError::store_init_failed(db_path, "Missing canonical SQL for index repair.")
            })?;
            connection
                .execute_batch(&sql)
                .map_err(|error| map_sqlite_error(db_path, &error))?;
        }
    }

    Ok(())
}

fn verify_post_repair_objects(connection: &Connection, db_path: &Path) -> ClientResult<()> {
    let user_version = connection
        .query_row("PRAGMA user_version", [], |row| row.get::<_, i64>(0))
        .map_err(|error| map_sqlite_error(db_path, &error))?;
    if user_version != EXPECTED_USER_VERSION {
        return Err(ClientError::store_corrupt(db_path));
    }

    for index_name in REQUIRED_INDEX_NAMES {
        if !sqlite_object_exists(connection, "index", index_name, db_path)? {
            return Err(ClientError::store_corrupt(db_path));
        }
    }

    Ok(())
}

fn sqlite_object_exists(
    connection: &Connection,
    object_type: &str,
    object_name: &str,
    db_path: &Path,
) -> ClientResult<bool> {
    let exists = connection
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = ?1 AND name = ?2 LIMIT 1",
            params![object_type, object_name],
            |_row| Ok(true),
        )
        .optional()
        .map_err(|error| map_sqlite_error(db_path, &error))?
        .unwrap_or(false);

    Ok(exists)
}

fn store_table_columns(connection: &Connection, db_path: &Path) -> ClientResult<Vec<String>> {
    let mut statement = connection
        .prepare("SELECT name FROM pragma_table_info(?1)")
        .map_err(|error| map_sqlite_error(db_path, &error))?;

    let column_iter = statement
        .query_map([STORE_TABLE], |row| row.get::<_, String>(0))
        .map_err(|error| map_sqlite_error(db_path, &error))?;

    let mut columns: Vec<String> = Vec::new();
    for row in column_iter {
        let column = row.map_err(|error| map_sqlite_error(db_path, &error))?;
        columns.push(column);
    }

    Ok(columns)
}

// SPDX-FileCopyrightText: 2026 MrTooley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite backend.
//!
//! Every node is a row of the `tree` table. Mappings are rows with flag 1 that
//! other rows point at through `parent`; deleting a mapping cascades to its
//! subtree. All statements run on the single tokio-rusqlite background
//! connection.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rusqlite::types::Value as SqlValue;
use rusqlite::{OptionalExtension, params};
use tokio_rusqlite::Connection;
use tracing::debug;

use mrtooley_core::{
    AdapterType, HealthStatus, MrTooleyError, NodeEntry, NodeId, PluginAdapter, SerializedObject,
    Serializer, StorageBackend, Value, ValueKind,
};

use crate::codec;
use crate::fs::{OpenOptions, prepare_file};
use crate::migrations::run_migrations;

/// Row flags.
mod flag {
    pub const NATIVE: i64 = 0;
    pub const MAPPING: i64 = 1;
    pub const BOOL: i64 = 2;
    pub const OBJECT: i64 = 3;
    pub const LIST: i64 = 4;
}

/// Storage backend on a SQLite database file.
pub struct SqliteFile {
    conn: Connection,
    path: Option<PathBuf>,
    serializer: Serializer,
}

impl std::fmt::Debug for SqliteFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteFile").field("path", &self.path).finish()
    }
}

impl SqliteFile {
    /// Opens (or creates, per `options`) the database at `path`.
    pub async fn open(path: impl AsRef<Path>, options: OpenOptions) -> Result<Self, MrTooleyError> {
        let path = path.as_ref().to_path_buf();
        let existed = prepare_file(&path, options, "SQLite").await?;
        let conn = Connection::open(&path)
            .await
            .map_err(MrTooleyError::storage)?;
        debug!(path = %path.display(), existed, "opened SQLite storage");
        Self::init(conn, Some(path)).await
    }

    /// A private `:memory:` database.
    pub async fn in_memory() -> Result<Self, MrTooleyError> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(MrTooleyError::storage)?;
        Self::init(conn, None).await
    }

    async fn init(conn: Connection, path: Option<PathBuf>) -> Result<Self, MrTooleyError> {
        conn.call(|conn| -> Result<(), MrTooleyError> {
            conn.execute_batch("PRAGMA foreign_keys = ON;")
                .map_err(MrTooleyError::storage)?;
            run_migrations(conn)
        })
        .await
        .map_err(unwrap_call_err)?;
        Ok(Self {
            conn,
            path,
            serializer: Serializer::with_builtin(),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn encode(&self, value: Value) -> Result<(i64, SqlValue), MrTooleyError> {
        Ok(match value {
            Value::Null => (flag::NATIVE, SqlValue::Null),
            Value::Int(i) => (flag::NATIVE, SqlValue::Integer(i)),
            Value::Float(f) => (flag::NATIVE, SqlValue::Real(f)),
            Value::Str(s) => (flag::NATIVE, SqlValue::Text(s)),
            Value::Bytes(b) => (flag::NATIVE, SqlValue::Blob(b)),
            Value::Bool(b) => (flag::BOOL, SqlValue::Integer(i64::from(b))),
            Value::Object(obj) => {
                self.serializer.check(&obj)?;
                (flag::OBJECT, SqlValue::Blob(obj.to_packed()))
            }
            list @ Value::List(_) => {
                let json = codec::encode_value(&list)?;
                (flag::LIST, SqlValue::Text(json.to_string()))
            }
        })
    }

    fn decode(&self, id: i64, row_flag: i64, value: SqlValue) -> Result<NodeEntry, MrTooleyError> {
        let value = match (row_flag, value) {
            (flag::MAPPING, _) => return Ok(NodeEntry::Mapping(NodeId::Id(id))),
            (flag::NATIVE, SqlValue::Null) => Value::Null,
            (flag::NATIVE, SqlValue::Integer(i)) => Value::Int(i),
            (flag::NATIVE, SqlValue::Real(f)) => Value::Float(f),
            (flag::NATIVE, SqlValue::Text(s)) => Value::Str(s),
            (flag::NATIVE, SqlValue::Blob(b)) => Value::Bytes(b),
            (flag::BOOL, SqlValue::Integer(i)) => Value::Bool(i != 0),
            (flag::OBJECT, SqlValue::Blob(packed)) => {
                let obj = SerializedObject::from_packed(&packed)?;
                self.serializer.check(&obj)?;
                Value::Object(obj)
            }
            (flag::LIST, SqlValue::Text(text)) => {
                let json = serde_json::from_str(&text).map_err(MrTooleyError::storage)?;
                codec::decode_value(json, &self.serializer)?
            }
            (other, value) => {
                return Err(MrTooleyError::storage(format!(
                    "row {id} has flag {other} with unexpected {:?}",
                    value.data_type()
                )));
            }
        };
        Ok(NodeEntry::Value(value))
    }
}

/// Flattens a call error whose inner error is already ours.
fn unwrap_call_err(e: tokio_rusqlite::Error<MrTooleyError>) -> MrTooleyError {
    match e {
        tokio_rusqlite::Error::Error(inner) => inner,
        other => MrTooleyError::storage(other.to_string()),
    }
}

fn row_count_err(action: &str, key: &str, affected: usize) -> MrTooleyError {
    MrTooleyError::storage(format!(
        "{action} of '{key}' affected {affected} rows instead of 1"
    ))
}

#[async_trait]
impl PluginAdapter for SqliteFile {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, MrTooleyError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(MrTooleyError::storage)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), MrTooleyError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA optimize;")?;
                Ok(())
            })
            .await
            .map_err(MrTooleyError::storage)?;
        debug!("SQLite storage shut down");
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for SqliteFile {
    fn native_types(&self) -> &'static [ValueKind] {
        &[
            ValueKind::Null,
            ValueKind::Int,
            ValueKind::Float,
            ValueKind::Str,
            ValueKind::Bytes,
            ValueKind::Mapping,
        ]
    }

    fn extra_types(&self) -> &'static [ValueKind] {
        &[ValueKind::Bool, ValueKind::Object, ValueKind::List]
    }

    async fn get_child(&self, parent: NodeId, key: &str) -> Result<Option<NodeEntry>, MrTooleyError> {
        let parent = parent.as_parent();
        let key = key.to_string();
        let row = self
            .conn
            .call(move |conn| -> Result<Option<(i64, i64, SqlValue)>, rusqlite::Error> {
                conn.query_row(
                    "SELECT id, flag, value FROM tree WHERE parent IS ?1 AND key = ?2",
                    params![parent, key],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
                .optional()
            })
            .await
            .map_err(MrTooleyError::storage)?;
        row.map(|(id, row_flag, value)| self.decode(id, row_flag, value))
            .transpose()
    }

    async fn set_value(&self, parent: NodeId, key: &str, value: Value) -> Result<(), MrTooleyError> {
        let (new_flag, encoded) = self.encode(value)?;
        let parent = parent.as_parent();
        let owned_key = key.to_string();
        let affected = self
            .conn
            .call(move |conn| -> Result<usize, rusqlite::Error> {
                let tx = conn.transaction()?;
                let existing: Option<(i64, i64)> = tx
                    .query_row(
                        "SELECT id, flag FROM tree WHERE parent IS ?1 AND key = ?2",
                        params![parent, owned_key],
                        |row| Ok((row.get(0)?, row.get(1)?)),
                    )
                    .optional()?;
                let affected = match existing {
                    Some((id, flag::MAPPING)) => {
                        tx.execute("DELETE FROM tree WHERE id = ?1", params![id])?;
                        tx.execute(
                            "INSERT INTO tree (parent, key, flag, value) VALUES (?1, ?2, ?3, ?4)",
                            params![parent, owned_key, new_flag, encoded],
                        )?
                    }
                    Some((id, _)) => tx.execute(
                        "UPDATE tree SET flag = ?1, value = ?2 WHERE id = ?3",
                        params![new_flag, encoded, id],
                    )?,
                    None => tx.execute(
                        "INSERT INTO tree (parent, key, flag, value) VALUES (?1, ?2, ?3, ?4)",
                        params![parent, owned_key, new_flag, encoded],
                    )?,
                };
                if affected == 1 {
                    tx.commit()?;
                }
                Ok(affected)
            })
            .await
            .map_err(MrTooleyError::storage)?;
        if affected != 1 {
            return Err(row_count_err("write", key, affected));
        }
        Ok(())
    }

    async fn set_mapping(&self, parent: NodeId, key: &str) -> Result<NodeId, MrTooleyError> {
        let parent = parent.as_parent();
        let owned_key = key.to_string();
        let (affected, id) = self
            .conn
            .call(move |conn| -> Result<(usize, i64), rusqlite::Error> {
                let tx = conn.transaction()?;
                tx.execute(
                    "DELETE FROM tree WHERE parent IS ?1 AND key = ?2",
                    params![parent, owned_key],
                )?;
                let affected = tx.execute(
                    "INSERT INTO tree (parent, key, flag, value) VALUES (?1, ?2, ?3, NULL)",
                    params![parent, owned_key, flag::MAPPING],
                )?;
                let id = tx.last_insert_rowid();
                if affected == 1 {
                    tx.commit()?;
                }
                Ok((affected, id))
            })
            .await
            .map_err(MrTooleyError::storage)?;
        if affected != 1 {
            return Err(row_count_err("mapping insert", key, affected));
        }
        Ok(NodeId::Id(id))
    }

    async fn remove_child(&self, parent: NodeId, key: &str) -> Result<bool, MrTooleyError> {
        let parent = parent.as_parent();
        let key = key.to_string();
        let affected = self
            .conn
            .call(move |conn| -> Result<usize, rusqlite::Error> {
                conn.execute(
                    "DELETE FROM tree WHERE parent IS ?1 AND key = ?2",
                    params![parent, key],
                )
            })
            .await
            .map_err(MrTooleyError::storage)?;
        Ok(affected > 0)
    }

    async fn child_keys(&self, parent: NodeId) -> Result<Vec<String>, MrTooleyError> {
        let parent = parent.as_parent();
        self.conn
            .call(move |conn| -> Result<Vec<String>, rusqlite::Error> {
                let mut stmt =
                    conn.prepare("SELECT key FROM tree WHERE parent IS ?1 ORDER BY key")?;
                let rows = stmt.query_map(params![parent], |row| row.get(0))?;
                rows.collect()
            })
            .await
            .map_err(MrTooleyError::storage)
    }

    async fn child_count(&self, parent: NodeId) -> Result<usize, MrTooleyError> {
        let parent = parent.as_parent();
        let count = self
            .conn
            .call(move |conn| -> Result<i64, rusqlite::Error> {
                conn.query_row(
                    "SELECT COUNT(*) FROM tree WHERE parent IS ?1",
                    params![parent],
                    |row| row.get(0),
                )
            })
            .await
            .map_err(MrTooleyError::storage)?;
        usize::try_from(count).map_err(|e| MrTooleyError::Internal(e.to_string()))
    }

    /// Statements run in autocommit mode, so there is nothing to flush.
    async fn flush(&self) -> Result<(), MrTooleyError> {
        Ok(())
    }
}

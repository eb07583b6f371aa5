//! Document CRUD over the `documents` table.

use super::{Database, now_ms};
use crate::error::StoreError;
use crate::types::{Document, Fields, ID_FIELD, Query};
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde_json::Value;
use uuid::Uuid;

fn parse_document_row(row: &Row) -> rusqlite::Result<(String, String)> {
    Ok((row.get("id")?, row.get("fields")?))
}

fn decode_fields(id: &str, raw: &str) -> Result<Fields> {
    match serde_json::from_str::<Value>(raw)? {
        Value::Object(map) => Ok(map),
        _ => Err(StoreError::Malformed(format!("{}: fields are not an object", id)).into()),
    }
}

fn encode_fields(fields: &Fields) -> Result<String> {
    Ok(serde_json::to_string(fields)?)
}

/// Drop the reserved `id` key so a payload cannot shadow the document id.
fn strip_reserved(mut fields: Fields) -> Fields {
    fields.remove(ID_FIELD);
    fields
}

fn get_fields_internal(conn: &Connection, collection: &str, id: &str) -> Result<Option<Fields>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT fields FROM documents WHERE collection = ?1 AND id = ?2",
            params![collection, id],
            |row| row.get(0),
        )
        .optional()?;
    raw.map(|raw| decode_fields(id, &raw)).transpose()
}

impl Database {
    /// Insert a new document and return its generated id.
    pub fn insert_document(&self, collection: &str, fields: Fields) -> Result<String> {
        let id = Uuid::now_v7().to_string();
        let fields = strip_reserved(fields);
        let encoded = encode_fields(&fields)?;
        let now = now_ms();

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO documents (collection, id, fields, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)",
                params![collection, id, encoded, now],
            )?;
            Ok(())
        })?;

        Ok(id)
    }

    /// Shallow-merge `partial` into an existing document and return the
    /// merged fields. Fails with `StoreError::NotFound` if it does not exist.
    pub fn update_document_fields(
        &self,
        collection: &str,
        id: &str,
        partial: Fields,
    ) -> Result<Fields> {
        let partial = strip_reserved(partial);

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let mut fields = get_fields_internal(&tx, collection, id)?
                .ok_or_else(|| StoreError::not_found(collection, id))?;
            for (key, value) in partial {
                fields.insert(key, value);
            }

            tx.execute(
                "UPDATE documents SET fields = ?1, updated_at = ?2
                 WHERE collection = ?3 AND id = ?4",
                params![encode_fields(&fields)?, now_ms(), collection, id],
            )?;
            tx.commit()?;

            Ok(fields)
        })
    }

    /// Delete a document. Returns whether a row was removed.
    pub fn delete_document(&self, collection: &str, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let affected = conn.execute(
                "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection, id],
            )?;
            Ok(affected > 0)
        })
    }

    /// All documents of a collection in insertion order.
    pub fn list_documents(&self, collection: &str) -> Result<Vec<Document>> {
        self.query_documents(&Query {
            collection: collection.to_string(),
            filter: None,
        })
    }

    /// Documents matching a query, in insertion order.
    pub fn query_documents(&self, query: &Query) -> Result<Vec<Document>> {
        self.with_conn(|conn| {
            let rows: Vec<(String, String)> = match &query.filter {
                None => {
                    let mut stmt = conn.prepare(
                        "SELECT id, fields FROM documents WHERE collection = ?1 ORDER BY seq",
                    )?;
                    stmt.query_map(params![query.collection], parse_document_row)?
                        .collect::<rusqlite::Result<_>>()?
                }
                Some(filter) => {
                    let path = format!("$.\"{}\"", filter.field.replace('"', ""));
                    let mut stmt = conn.prepare(
                        "SELECT id, fields FROM documents
                         WHERE collection = ?1 AND json_extract(fields, ?2) = ?3
                         ORDER BY seq",
                    )?;
                    stmt.query_map(
                        params![query.collection, path, filter.value],
                        parse_document_row,
                    )?
                    .collect::<rusqlite::Result<_>>()?
                }
            };

            rows.into_iter()
                .map(|(id, raw)| {
                    let fields = decode_fields(&id, &raw)?;
                    Ok(Document::new(id, fields))
                })
                .collect()
        })
    }
}

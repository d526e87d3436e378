#![forbid(unsafe_code)]

//! Typed column readers. Stored text that fails to parse back into a domain
//! value surfaces as a conversion failure on that column.

use super::super::StoreError;
use rusqlite::types::Type;
use rusqlite::{ErrorCode, Row};
use serde_json::Value as JsonValue;

fn conversion_failure<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

pub(in crate::store) fn get_parsed<T, E>(
    row: &Row<'_>,
    idx: usize,
    parse: impl FnOnce(String) -> Result<T, E>,
) -> Result<T, rusqlite::Error>
where
    E: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    parse(raw).map_err(|err| conversion_failure(idx, err))
}

pub(in crate::store) fn get_parsed_opt<T, E>(
    row: &Row<'_>,
    idx: usize,
    parse: impl FnOnce(String) -> Result<T, E>,
) -> Result<Option<T>, rusqlite::Error>
where
    E: std::error::Error + Send + Sync + 'static,
{
    let raw: Option<String> = row.get(idx)?;
    raw.map(parse)
        .transpose()
        .map_err(|err| conversion_failure(idx, err))
}

pub(in crate::store) fn get_json(row: &Row<'_>, idx: usize) -> Result<JsonValue, rusqlite::Error> {
    get_parsed(row, idx, |raw| serde_json::from_str::<JsonValue>(&raw))
}

pub(in crate::store) fn get_json_opt(
    row: &Row<'_>,
    idx: usize,
) -> Result<Option<JsonValue>, rusqlite::Error> {
    get_parsed_opt(row, idx, |raw| serde_json::from_str::<JsonValue>(&raw))
}

pub(in crate::store) fn json_text(value: &JsonValue) -> Result<String, StoreError> {
    Ok(serde_json::to_string(value)?)
}

pub(in crate::store) fn json_text_opt(value: Option<&JsonValue>) -> Result<Option<String>, StoreError> {
    value.map(json_text).transpose()
}

pub(in crate::store) fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(code, message) => {
            code.code == ErrorCode::ConstraintViolation
                || message.as_deref().is_some_and(|value| {
                    value.contains("UNIQUE constraint failed")
                        || value.contains("PRIMARY KEY constraint failed")
                })
        }
        _ => false,
    }
}

pub(in crate::store) fn to_sqlite_i64(value: usize) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| StoreError::InvalidInput("numeric overflow"))
}

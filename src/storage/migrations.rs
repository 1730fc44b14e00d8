use std::path::PathBuf;

use serde_json::{Map, Value};

use crate::storage::StorageError;

type MigrationFn = fn(Value) -> Result<Value, StorageError>;

/// Step `n` upgrades a version `n + 1` document to version `n + 2`
const MIGRATIONS: &[MigrationFn] = &[migrate_v1_to_v2];

/// Flat documents written before versioning have no `version` field and count as 1
pub fn detect_version(content: &str) -> Result<u32, StorageError> {
    let document: Value = serde_json::from_str(content).map_err(|source| StorageError::ParseFailed {
        path: PathBuf::from("<store>"),
        source,
    })?;

    match document.get("version") {
        Some(v) => v
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or(StorageError::MalformedDocument("version")),
        None => Ok(1),
    }
}

/// Upgrades `data` one version at a time until it reaches `to_version`
pub fn apply_migrations(
    data: Value,
    from_version: u32,
    to_version: u32,
) -> Result<Value, StorageError> {
    if from_version > to_version {
        return Err(StorageError::FutureVersion(from_version));
    }

    (from_version..to_version).try_fold(data, |data, version| {
        let step = version
            .checked_sub(1)
            .and_then(|index| MIGRATIONS.get(index as usize))
            .ok_or(StorageError::UnsupportedVersion(version))?;
        step(data)
    })
}

/// v1 kept every entry as a top-level string holding serialized JSON.
/// v2 nests entries under `entries` and stores them as JSON values; strings
/// that do not parse as JSON are kept as plain strings.
fn migrate_v1_to_v2(value: Value) -> Result<Value, StorageError> {
    let Value::Object(obj) = value else {
        return Err(StorageError::MalformedDocument("root"));
    };

    let entries: Map<String, Value> = obj
        .into_iter()
        .filter(|(key, _)| key != "version")
        .map(|(key, raw)| {
            let value = match raw {
                Value::String(s) => serde_json::from_str(&s).unwrap_or(Value::String(s)),
                other => other,
            };
            (key, value)
        })
        .collect();

    let mut migrated = Map::new();
    migrated.insert("version".to_string(), Value::from(2));
    migrated.insert("entries".to_string(), Value::Object(entries));
    Ok(Value::Object(migrated))
}

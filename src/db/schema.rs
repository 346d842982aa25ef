//! Versioned JSON encoding of the user aggregate.
//!
//! Current format: `{"schemaVersion": 1, "user": {...}}`.
//! A bare user object without `schemaVersion` is the legacy (version 0)
//! browser blob: arrays may be missing and configs may lack a status.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::User;

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EnvelopeRef<'a> {
    schema_version: u32,
    user: &'a User,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    schema_version: u32,
    user: Value,
}

/// Serialize a user at the current schema version.
pub fn encode(user: &User) -> Result<String> {
    serde_json::to_string(&EnvelopeRef {
        schema_version: SCHEMA_VERSION,
        user,
    })
    .context("Failed to serialize user")
}

/// Parse and validate a stored user, migrating older layouts.
pub fn decode(raw: &str) -> Result<User> {
    let value: Value = serde_json::from_str(raw).context("Stored user is not valid JSON")?;

    let (version, mut body) = if value.get("schemaVersion").is_some() {
        let envelope: Envelope =
            serde_json::from_value(value).context("Malformed user envelope")?;
        (envelope.schema_version, envelope.user)
    } else {
        (0, value)
    };

    if version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (newest known is {})",
            version,
            SCHEMA_VERSION
        );
    }

    if version == 0 {
        migrate_v0(&mut body);
    }

    let user: User = serde_json::from_value(body)
        .with_context(|| format!("Stored user does not match schema v{}", version))?;
    user.validate()?;
    Ok(user)
}

/// Fill in fields the legacy blob left optional.
fn migrate_v0(body: &mut Value) {
    let Some(configs) = body.get_mut("copyTrades").and_then(Value::as_array_mut) else {
        return;
    };

    for config in configs.iter_mut().filter_map(Value::as_object_mut) {
        if !config.contains_key("status") {
            let enabled = config
                .get("enabled")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            let status = if enabled { "running" } else { "stopped" };
            config.insert("status".to_string(), Value::from(status));
        }
    }
}

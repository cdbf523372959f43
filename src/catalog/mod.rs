//! Reading privilege state from the system catalogs

pub mod acl;
pub mod lookup;

use std::collections::BTreeMap;

use serde::Deserialize;
use sqlx::PgPool;
use tracing::debug;

use crate::db::error_code;
use crate::error::{ReconcileError, Result};
use crate::privilege::PrivilegeSet;

pub use lookup::{fetch_current, fetch_current_defaults};

/// The decoded privilege state of every object a rule covers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectPrivileges {
    per_object: BTreeMap<String, PrivilegeSet>,
}

impl ObjectPrivileges {
    pub fn insert(&mut self, object: String, privileges: PrivilegeSet) {
        self.per_object.insert(object, privileges);
    }

    pub fn per_object(&self) -> &BTreeMap<String, PrivilegeSet> {
        &self.per_object
    }

    /// Privileges held by at least one object.
    pub fn union(&self) -> PrivilegeSet {
        self.per_object
            .values()
            .fold(PrivilegeSet::new(), |acc, set| {
                acc.union(set).cloned().collect()
            })
    }

    /// Privileges held by every object. This is what a rule "currently has":
    /// a privilege missing on any covered object is not uniformly granted.
    pub fn intersection(&self) -> PrivilegeSet {
        let mut values = self.per_object.values();
        let Some(first) = values.next() else {
            return PrivilegeSet::new();
        };
        values.fold(first.clone(), |acc, set| {
            acc.intersection(set).cloned().collect()
        })
    }
}

/// Options attached to an external schema, decoded from the catalog's JSON
/// payload. Every field is optional; an absent or unparsable payload decodes
/// to the default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ExternalSchemaOptions {
    #[serde(rename = "IAM_ROLE")]
    pub iam_role: Option<String>,
    #[serde(rename = "EXTERNAL_DATABASE")]
    pub external_database: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaKind {
    Local,
    External(ExternalSchemaOptions),
}

/// Distinguish local from external schemas.
///
/// External schemas only support `usage` grants, so callers consult this
/// before planning a schema grant.
pub async fn schema_kind(pool: &PgPool, schema: &str) -> Result<SchemaKind> {
    let options = sqlx::query_scalar::<_, String>(
        "SELECT COALESCE(esoptions, '') FROM svv_external_schemas WHERE schemaname = $1",
    )
    .bind(schema.to_lowercase())
    .fetch_optional(pool)
    .await
    .map_err(ReconcileError::from_sqlx)?;

    match options {
        None => Ok(SchemaKind::Local),
        Some(payload) => Ok(SchemaKind::External(parse_schema_options(
            schema, &payload,
        ))),
    }
}

fn parse_schema_options(schema: &str, payload: &str) -> ExternalSchemaOptions {
    serde_json::from_str(payload).unwrap_or_else(|e| {
        debug!("unparsable options payload for external schema {schema}: {e}");
        ExternalSchemaOptions::default()
    })
}

/// Deployment flavor of the target cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deployment {
    Provisioned,
    Serverless,
}

/// Probe a restricted system view to tell provisioned from serverless.
///
/// An insufficient-privilege response is the signal, not a failure; any
/// other error propagates. The probe reuses the classifier's code check
/// without touching retry policy.
pub async fn detect_deployment(pool: &PgPool) -> Result<Deployment> {
    match sqlx::query("SELECT 1 FROM stv_sessions LIMIT 1")
        .execute(pool)
        .await
    {
        Ok(_) => Ok(Deployment::Provisioned),
        Err(e) if error_code::is_code(&e, error_code::INSUFFICIENT_PRIVILEGE) => {
            Ok(Deployment::Serverless)
        }
        Err(e) => Err(ReconcileError::from_sqlx(e)),
    }
}

//! Name resolution and privilege-state reads against the system catalogs
//!
//! Names are folded to lowercase before querying: the backend folds unquoted
//! identifiers, so the catalog stores the folded form while the declared
//! spelling is preserved for identifier construction.

use std::collections::BTreeSet;

use itertools::Itertools;
use sqlx::PgPool;
use tracing::debug;

use super::ObjectPrivileges;
use super::acl;
use crate::error::{ReconcileError, Result};
use crate::grant::{Grantee, Target, parse_signature};
use crate::privilege::{ObjectKind, PrivilegeSet};

fn fold(name: &str) -> String {
    name.to_lowercase()
}

/// Resolve a schema name to its namespace OID.
pub async fn namespace_id(pool: &PgPool, schema: &str) -> Result<Option<i32>> {
    sqlx::query_scalar::<_, i32>("SELECT oid::int4 FROM pg_namespace WHERE nspname = $1")
        .bind(fold(schema))
        .fetch_optional(pool)
        .await
        .map_err(ReconcileError::from_sqlx)
}

/// Resolve a user name to its system id.
pub async fn user_id(pool: &PgPool, name: &str) -> Result<Option<i32>> {
    sqlx::query_scalar::<_, i32>("SELECT usesysid::int4 FROM pg_user WHERE usename = $1")
        .bind(fold(name))
        .fetch_optional(pool)
        .await
        .map_err(ReconcileError::from_sqlx)
}

/// Resolve a group name to its system id.
pub async fn group_id(pool: &PgPool, name: &str) -> Result<Option<i32>> {
    sqlx::query_scalar::<_, i32>("SELECT grosysid::int4 FROM pg_group WHERE groname = $1")
        .bind(fold(name))
        .fetch_optional(pool)
        .await
        .map_err(ReconcileError::from_sqlx)
}

pub async fn role_exists(pool: &PgPool, name: &str) -> Result<bool> {
    sqlx::query_scalar::<_, i32>("SELECT 1 FROM svv_roles WHERE role_name = $1")
        .bind(fold(name))
        .fetch_optional(pool)
        .await
        .map(|row| row.is_some())
        .map_err(ReconcileError::from_sqlx)
}

/// Confirm the grantee exists, resolving it to its internal id where one
/// exists. `NotFound` here is how a vanished principal surfaces.
pub async fn resolve_grantee(pool: &PgPool, grantee: &Grantee) -> Result<()> {
    match grantee {
        Grantee::User(name) => {
            user_id(pool, name)
                .await?
                .ok_or_else(|| ReconcileError::not_found(format!("user {name}")))?;
        }
        Grantee::Group(name) => {
            group_id(pool, name)
                .await?
                .ok_or_else(|| ReconcileError::not_found(format!("group {name}")))?;
        }
        Grantee::Role(name) => {
            if !role_exists(pool, name).await? {
                return Err(ReconcileError::not_found(format!("role {name}")));
            }
        }
        Grantee::Public => {}
    }
    Ok(())
}

/// Fetch the raw ACL text for one catalog object. `None` means the object
/// itself is missing; an object with no explicit ACL comes back as `""`.
pub async fn object_acl(
    pool: &PgPool,
    kind: ObjectKind,
    schema: Option<&str>,
    object: &str,
) -> Result<Option<String>> {
    match kind {
        ObjectKind::Database => {
            sqlx::query_scalar::<_, String>(
                "SELECT COALESCE(array_to_string(datacl, ','), '') FROM pg_database WHERE datname = $1",
            )
            .bind(fold(object))
            .fetch_optional(pool)
            .await
            .map_err(ReconcileError::from_sqlx)
        }
        ObjectKind::Schema => {
            sqlx::query_scalar::<_, String>(
                "SELECT COALESCE(array_to_string(nspacl, ','), '') FROM pg_namespace WHERE nspname = $1",
            )
            .bind(fold(object))
            .fetch_optional(pool)
            .await
            .map_err(ReconcileError::from_sqlx)
        }
        ObjectKind::Table => {
            sqlx::query_scalar::<_, String>(
                "SELECT COALESCE(array_to_string(c.relacl, ','), '') \
                 FROM pg_class c \
                 JOIN pg_namespace n ON c.relnamespace = n.oid \
                 WHERE n.nspname = $1 AND c.relname = $2",
            )
            .bind(fold(schema.unwrap_or_default()))
            .bind(fold(object))
            .fetch_optional(pool)
            .await
            .map_err(ReconcileError::from_sqlx)
        }
        ObjectKind::Function | ObjectKind::Procedure => {
            callable_acl(pool, schema.unwrap_or_default(), object).await
        }
        ObjectKind::Language => {
            sqlx::query_scalar::<_, String>(
                "SELECT COALESCE(array_to_string(lanacl, ','), '') FROM pg_language WHERE lanname = $1",
            )
            .bind(fold(object))
            .fetch_optional(pool)
            .await
            .map_err(ReconcileError::from_sqlx)
        }
        ObjectKind::Role => Err(ReconcileError::validation(
            "role is not a valid grant target",
        )),
    }
}

/// Match one declared callable signature against the catalog's overload set.
/// Overloads are distinct objects, so the full argument list participates in
/// the match.
async fn callable_acl(pool: &PgPool, schema: &str, signature: &str) -> Result<Option<String>> {
    let (name, _) = parse_signature(signature);
    let overloads = sqlx::query_as::<_, (String, String)>(
        "SELECT p.proname || '(' || oidvectortypes(p.proargtypes) || ')', \
                COALESCE(array_to_string(p.proacl, ','), '') \
         FROM pg_proc p \
         JOIN pg_namespace n ON p.pronamespace = n.oid \
         WHERE n.nspname = $1 AND p.proname = $2",
    )
    .bind(fold(schema))
    .bind(fold(name))
    .fetch_all(pool)
    .await
    .map_err(ReconcileError::from_sqlx)?;

    let wanted = normalize_signature(signature);
    Ok(overloads
        .into_iter()
        .find(|(sig, _)| normalize_signature(sig) == wanted)
        .map(|(_, acl)| acl))
}

/// Canonicalize a callable signature for comparison: lowercase, trimmed
/// argument spacing, and common type aliases folded to the names
/// `oidvectortypes` emits.
pub fn normalize_signature(signature: &str) -> String {
    let (name, args) = parse_signature(signature);
    let args = args
        .split(',')
        .map(|arg| canonical_type(arg))
        .filter(|arg| !arg.is_empty())
        .join(",");
    format!("{}({args})", fold(name))
}

fn canonical_type(declared: &str) -> String {
    let folded = declared.trim().to_lowercase();
    let collapsed = folded.split_whitespace().join(" ");
    match collapsed.as_str() {
        "int" | "int4" => "integer",
        "int2" => "smallint",
        "int8" => "bigint",
        "bool" => "boolean",
        "float" | "float8" => "double precision",
        "float4" => "real",
        "varchar" => "character varying",
        "char" => "character",
        "decimal" => "numeric",
        other => other,
    }
    .to_string()
}

/// Read the current per-object privilege state for a (grantee, target) pair.
pub async fn fetch_current(
    pool: &PgPool,
    grantee: &Grantee,
    target: &Target,
) -> Result<ObjectPrivileges> {
    resolve_grantee(pool, grantee).await?;

    let mut current = ObjectPrivileges::default();
    for object in target.acl_objects() {
        let acl_text = object_acl(pool, target.kind, target.schema.as_deref(), object)
            .await?
            .ok_or_else(|| ReconcileError::not_found(format!("{} {object}", target.kind)))?;
        let privileges = acl::grantee_privileges(&acl_text, grantee, target.kind);
        debug!("decoded {} {object} for {grantee}: {privileges:?}", target.kind);
        current.insert(object.to_string(), privileges);
    }
    Ok(current)
}

fn defacl_objtype(kind: ObjectKind) -> &'static str {
    match kind {
        ObjectKind::Table => "r",
        ObjectKind::Function => "f",
        ObjectKind::Procedure => "p",
        _ => unreachable!("default privileges only cover tables, functions and procedures"),
    }
}

/// Read the current default-privilege state for a rule.
///
/// The catalog record embeds internal ids rather than names, so the owner,
/// grantee and schema are resolved first; an unscoped rule lives under
/// namespace 0. A missing record decodes to the empty set.
pub async fn fetch_current_defaults(
    pool: &PgPool,
    grantee: &Grantee,
    owner: &str,
    schema: Option<&str>,
    kind: ObjectKind,
) -> Result<PrivilegeSet> {
    let owner_id = user_id(pool, owner)
        .await?
        .ok_or_else(|| ReconcileError::not_found(format!("user {owner}")))?;
    resolve_grantee(pool, grantee).await?;
    let namespace = match schema {
        Some(schema) => namespace_id(pool, schema)
            .await?
            .ok_or_else(|| ReconcileError::not_found(format!("schema {schema}")))?,
        None => 0,
    };

    let acl_text = sqlx::query_scalar::<_, String>(
        "SELECT COALESCE(array_to_string(defaclacl, ','), '') \
         FROM pg_default_acl \
         WHERE defacluser = $1 AND defaclnamespace = $2 AND defaclobjtype = $3",
    )
    .bind(owner_id)
    .bind(namespace)
    .bind(defacl_objtype(kind))
    .fetch_optional(pool)
    .await
    .map_err(ReconcileError::from_sqlx)?;

    Ok(acl_text
        .map(|text| acl::grantee_privileges(&text, grantee, kind))
        .unwrap_or_default())
}

/// Roles currently granted to a user.
pub async fn user_roles(pool: &PgPool, user: &str) -> Result<BTreeSet<String>> {
    let rows =
        sqlx::query_scalar::<_, String>("SELECT role_name FROM svv_user_grants WHERE user_name = $1")
            .bind(fold(user))
            .fetch_all(pool)
            .await
            .map_err(ReconcileError::from_sqlx)?;
    Ok(rows.into_iter().collect())
}

/// Roles currently granted to another role.
pub async fn role_roles(pool: &PgPool, role: &str) -> Result<BTreeSet<String>> {
    let rows = sqlx::query_scalar::<_, String>(
        "SELECT granted_role_name FROM svv_role_grants WHERE role_name = $1",
    )
    .bind(fold(role))
    .fetch_all(pool)
    .await
    .map_err(ReconcileError::from_sqlx)?;
    Ok(rows.into_iter().collect())
}

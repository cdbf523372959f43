//! Canonical grant identifiers
//!
//! Every tracked rule carries a durable string ID of the form
//! `<kindTag>:<principal>_<schemaToken>_ot:<objectKind>[_<object>...]` with
//! `gn`/`un`/`rn` tagging the principal kind and the literal `noschema`
//! standing in for an unscoped rule. The object list is sorted before
//! encoding so the ID is independent of declaration order.

use crate::constants::{GROUP_TAG, NO_SCHEMA_TOKEN, OBJECT_TYPE_MARKER, ROLE_TAG, USER_TAG};
use crate::error::{ReconcileError, Result};
use crate::grant::{Grantee, Target};
use crate::privilege::ObjectKind;

/// The components recovered from a canonical grant ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantId {
    pub grantee: Grantee,
    pub kind: ObjectKind,
    pub schema: Option<String>,
    pub objects: Vec<String>,
}

impl GrantId {
    pub fn target(&self) -> Target {
        Target::new(self.kind, self.schema.clone(), self.objects.clone())
    }
}

/// Encode a (principal, target) pair into its canonical ID.
///
/// Injective across principal kinds: a group and a user of the same name get
/// distinct tags. `Public` has no durable identity and is rejected.
pub fn encode(
    grantee: &Grantee,
    kind: ObjectKind,
    schema: Option<&str>,
    objects: &[String],
) -> Result<String> {
    let (tag, name) = match grantee {
        Grantee::Group(name) => (GROUP_TAG, name),
        Grantee::User(name) => (USER_TAG, name),
        Grantee::Role(name) => (ROLE_TAG, name),
        Grantee::Public => {
            return Err(ReconcileError::validation(
                "public cannot be the principal of a tracked grant",
            ));
        }
    };

    let schema_token = schema.unwrap_or(NO_SCHEMA_TOKEN);

    let mut sorted: Vec<&String> = objects.iter().collect();
    sorted.sort();

    let mut id = format!("{tag}:{name}_{schema_token}_{OBJECT_TYPE_MARKER}{kind}");
    for object in sorted {
        id.push('_');
        id.push_str(object);
    }
    Ok(id)
}

/// Decode a canonical ID back into its components.
///
/// Fails with `MalformedId` when a structural marker is missing or the field
/// count does not line up; it never truncates silently.
pub fn decode(id: &str) -> Result<GrantId> {
    let parts: Vec<&str> = id.split('_').collect();

    let ot_idx = parts
        .iter()
        .position(|p| p.starts_with(OBJECT_TYPE_MARKER))
        .ok_or_else(|| ReconcileError::malformed_id(id, "missing object type marker"))?;
    if ot_idx < 2 {
        return Err(ReconcileError::malformed_id(
            id,
            "expected principal and schema fields before the object type marker",
        ));
    }

    let principal_field = parts[..ot_idx - 1].join("_");
    let (tag, name) = principal_field
        .split_once(':')
        .ok_or_else(|| ReconcileError::malformed_id(id, "missing principal kind tag"))?;
    if name.is_empty() {
        return Err(ReconcileError::malformed_id(id, "empty principal name"));
    }
    let grantee = match tag {
        GROUP_TAG => Grantee::Group(name.to_string()),
        USER_TAG => Grantee::User(name.to_string()),
        ROLE_TAG => Grantee::Role(name.to_string()),
        other => {
            return Err(ReconcileError::malformed_id(
                id,
                format!("unknown principal kind tag {other:?}"),
            ));
        }
    };

    let schema_token = parts[ot_idx - 1];
    if schema_token.is_empty() {
        return Err(ReconcileError::malformed_id(id, "empty schema token"));
    }
    let schema = (schema_token != NO_SCHEMA_TOKEN).then(|| schema_token.to_string());

    let kind_token = &parts[ot_idx][OBJECT_TYPE_MARKER.len()..];
    let kind = ObjectKind::parse(kind_token).ok_or_else(|| {
        ReconcileError::malformed_id(id, format!("unknown object type {kind_token:?}"))
    })?;

    let objects: Vec<String> = parts[ot_idx + 1..].iter().map(|s| s.to_string()).collect();
    if objects.iter().any(String::is_empty) {
        return Err(ReconcileError::malformed_id(id, "empty object segment"));
    }

    Ok(GrantId {
        grantee,
        kind,
        schema,
        objects,
    })
}

//! Privilege vocabularies per object kind

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{ReconcileError, Result};

/// A set of lowercase capability tokens. BTreeSet keeps iteration (and thus
/// every rendered statement) deterministic.
pub type PrivilegeSet = BTreeSet<String>;

/// The kinds of objects a privilege rule can address. `Role` exists only so
/// role-grant identifiers share the codec; it carries no privilege
/// vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Database,
    Schema,
    Table,
    Function,
    Procedure,
    Language,
    Role,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Database => "database",
            ObjectKind::Schema => "schema",
            ObjectKind::Table => "table",
            ObjectKind::Function => "function",
            ObjectKind::Procedure => "procedure",
            ObjectKind::Language => "language",
            ObjectKind::Role => "role",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "database" => Some(ObjectKind::Database),
            "schema" => Some(ObjectKind::Schema),
            "table" => Some(ObjectKind::Table),
            "function" => Some(ObjectKind::Function),
            "procedure" => Some(ObjectKind::Procedure),
            "language" => Some(ObjectKind::Language),
            "role" => Some(ObjectKind::Role),
            _ => None,
        }
    }

    /// The capability tokens grantable on this object kind.
    pub fn vocabulary(&self) -> &'static [&'static str] {
        match self {
            ObjectKind::Database => &["create", "temporary"],
            ObjectKind::Schema => &["create", "usage", "alter"],
            ObjectKind::Table => &[
                "select",
                "insert",
                "update",
                "delete",
                "references",
                "rule",
                "trigger",
                "truncate",
                "alter",
                "drop",
            ],
            ObjectKind::Function | ObjectKind::Procedure => &["execute"],
            ObjectKind::Language => &["usage"],
            ObjectKind::Role => &[],
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Check every privilege against the object kind's vocabulary.
///
/// Runs before any statement is planned, so an invalid token can never cause
/// partial application.
pub fn validate_privileges(kind: ObjectKind, privileges: &PrivilegeSet) -> Result<()> {
    for privilege in privileges {
        if !kind.vocabulary().contains(&privilege.as_str()) {
            return Err(ReconcileError::validation(format!(
                "privilege {privilege:?} is not valid for object kind {kind}"
            )));
        }
    }
    Ok(())
}

/// Normalize a declared privilege list into a set: lowercase, deduplicated.
pub fn privilege_set<I, S>(privileges: I) -> PrivilegeSet
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    privileges
        .into_iter()
        .map(|p| p.as_ref().trim().to_lowercase())
        .filter(|p| !p.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ObjectKind::Database, "create")]
    #[case(ObjectKind::Database, "temporary")]
    #[case(ObjectKind::Schema, "usage")]
    #[case(ObjectKind::Schema, "alter")]
    #[case(ObjectKind::Table, "references")]
    #[case(ObjectKind::Table, "truncate")]
    #[case(ObjectKind::Function, "execute")]
    #[case(ObjectKind::Procedure, "execute")]
    #[case(ObjectKind::Language, "usage")]
    fn test_valid_privilege(#[case] kind: ObjectKind, #[case] privilege: &str) {
        let set = privilege_set([privilege]);
        assert!(validate_privileges(kind, &set).is_ok());
    }

    #[rstest]
    #[case(ObjectKind::Database, "select")]
    #[case(ObjectKind::Schema, "insert")]
    #[case(ObjectKind::Table, "execute")]
    #[case(ObjectKind::Function, "usage")]
    #[case(ObjectKind::Language, "execute")]
    #[case(ObjectKind::Role, "select")]
    fn test_invalid_privilege(#[case] kind: ObjectKind, #[case] privilege: &str) {
        let set = privilege_set([privilege]);
        let err = validate_privileges(kind, &set).unwrap_err();
        assert!(matches!(err, ReconcileError::Validation(_)));
    }

    #[test]
    fn test_privilege_set_normalizes() {
        let set = privilege_set(["SELECT", " insert ", "select", ""]);
        assert_eq!(
            set.into_iter().collect::<Vec<_>>(),
            vec!["insert".to_string(), "select".to_string()]
        );
    }

    #[test]
    fn test_object_kind_round_trip() {
        for kind in [
            ObjectKind::Database,
            ObjectKind::Schema,
            ObjectKind::Table,
            ObjectKind::Function,
            ObjectKind::Procedure,
            ObjectKind::Language,
            ObjectKind::Role,
        ] {
            assert_eq!(ObjectKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ObjectKind::parse("view"), None);
    }
}

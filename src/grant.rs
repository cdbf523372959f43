//! Grantees and grant targets

use serde::{Deserialize, Serialize};

use crate::error::{ReconcileError, Result};
use crate::privilege::ObjectKind;

/// The principal receiving privileges.
///
/// `Public` appears only when decoding catalog ACLs; declarative rules must
/// name a concrete user, group, or role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grantee {
    User(String),
    Group(String),
    Role(String),
    Public,
}

impl Grantee {
    pub fn name(&self) -> Option<&str> {
        match self {
            Grantee::User(name) | Grantee::Group(name) | Grantee::Role(name) => Some(name),
            Grantee::Public => None,
        }
    }

    /// Build a grantee from the declarative `user`/`group` pair, enforcing
    /// that exactly one side is set.
    pub fn from_user_or_group(user: Option<&str>, group: Option<&str>) -> Result<Self> {
        match (user, group) {
            (Some(user), None) => Ok(Grantee::User(user.to_string())),
            (None, Some(group)) => Ok(Grantee::Group(group.to_string())),
            (Some(_), Some(_)) => Err(ReconcileError::validation(
                "exactly one of user or group must be set, not both",
            )),
            (None, None) => Err(ReconcileError::validation(
                "exactly one of user or group must be set",
            )),
        }
    }
}

impl std::fmt::Display for Grantee {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Grantee::User(name) => write!(f, "user {name}"),
            Grantee::Group(name) => write!(f, "group {name}"),
            Grantee::Role(name) => write!(f, "role {name}"),
            Grantee::Public => write!(f, "public"),
        }
    }
}

/// The object side of a grant rule.
///
/// Shape rules per kind: database and language targets carry object names and
/// no schema; schema targets carry only the schema name; table, function and
/// procedure targets carry a schema plus object names (full parenthesized
/// signatures for function/procedure, since overloads are distinct objects).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub kind: ObjectKind,
    pub schema: Option<String>,
    pub objects: Vec<String>,
}

impl Target {
    pub fn new(kind: ObjectKind, schema: Option<String>, objects: Vec<String>) -> Self {
        Self {
            kind,
            schema,
            objects,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let schema_set = self.schema.is_some();
        let has_objects = !self.objects.is_empty();
        match self.kind {
            ObjectKind::Database | ObjectKind::Language => {
                if schema_set {
                    return Err(ReconcileError::validation(format!(
                        "{} targets do not take a schema",
                        self.kind
                    )));
                }
                if !has_objects {
                    return Err(ReconcileError::validation(format!(
                        "{} targets require at least one object name",
                        self.kind
                    )));
                }
            }
            ObjectKind::Schema => {
                if !schema_set {
                    return Err(ReconcileError::validation("schema targets require a schema"));
                }
                if has_objects {
                    return Err(ReconcileError::validation(
                        "schema targets do not take an object list",
                    ));
                }
            }
            ObjectKind::Table | ObjectKind::Function | ObjectKind::Procedure => {
                if !schema_set {
                    return Err(ReconcileError::validation(format!(
                        "{} targets require a schema",
                        self.kind
                    )));
                }
                if !has_objects {
                    return Err(ReconcileError::validation(format!(
                        "{} targets require at least one object name",
                        self.kind
                    )));
                }
            }
            ObjectKind::Role => {
                return Err(ReconcileError::validation(
                    "role is not a valid grant target",
                ));
            }
        }
        Ok(())
    }

    /// The catalog objects whose ACLs hold this target's privilege state.
    /// For schema targets that is the schema itself.
    pub fn acl_objects(&self) -> Vec<&str> {
        match self.kind {
            ObjectKind::Schema => self.schema.iter().map(String::as_str).collect(),
            _ => self.objects.iter().map(String::as_str).collect(),
        }
    }
}

/// Split a declared callable signature `name(arg, arg)` into name and args.
/// A bare name decodes as an empty argument list.
pub fn parse_signature(signature: &str) -> (&str, &str) {
    match signature.split_once('(') {
        Some((name, rest)) => (name.trim(), rest.trim_end_matches(')').trim()),
        None => (signature.trim(), ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exactly_one_principal() {
        assert_eq!(
            Grantee::from_user_or_group(Some("alice"), None).unwrap(),
            Grantee::User("alice".to_string())
        );
        assert_eq!(
            Grantee::from_user_or_group(None, Some("reporters")).unwrap(),
            Grantee::Group("reporters".to_string())
        );
        assert!(matches!(
            Grantee::from_user_or_group(Some("alice"), Some("reporters")),
            Err(ReconcileError::Validation(_))
        ));
        assert!(matches!(
            Grantee::from_user_or_group(None, None),
            Err(ReconcileError::Validation(_))
        ));
    }

    #[test]
    fn test_schema_target_shape() {
        let ok = Target::new(ObjectKind::Schema, Some("analytics".to_string()), vec![]);
        assert!(ok.validate().is_ok());
        assert_eq!(ok.acl_objects(), vec!["analytics"]);

        let missing_schema = Target::new(ObjectKind::Schema, None, vec![]);
        assert!(missing_schema.validate().is_err());

        let with_objects = Target::new(
            ObjectKind::Schema,
            Some("analytics".to_string()),
            vec!["t".to_string()],
        );
        assert!(with_objects.validate().is_err());
    }

    #[test]
    fn test_table_target_shape() {
        let ok = Target::new(
            ObjectKind::Table,
            Some("analytics".to_string()),
            vec!["events".to_string(), "users".to_string()],
        );
        assert!(ok.validate().is_ok());
        assert_eq!(ok.acl_objects(), vec!["events", "users"]);

        let no_objects = Target::new(ObjectKind::Table, Some("analytics".to_string()), vec![]);
        assert!(no_objects.validate().is_err());

        let no_schema = Target::new(ObjectKind::Table, None, vec!["events".to_string()]);
        assert!(no_schema.validate().is_err());
    }

    #[test]
    fn test_database_target_shape() {
        let ok = Target::new(ObjectKind::Database, None, vec!["analytics_db".to_string()]);
        assert!(ok.validate().is_ok());

        let with_schema = Target::new(
            ObjectKind::Database,
            Some("analytics".to_string()),
            vec!["analytics_db".to_string()],
        );
        assert!(with_schema.validate().is_err());
    }

    #[test]
    fn test_role_is_not_a_grant_target() {
        let target = Target::new(ObjectKind::Role, None, vec!["admin".to_string()]);
        assert!(target.validate().is_err());
    }

    #[test]
    fn test_parse_signature() {
        assert_eq!(parse_signature("f(int, int)"), ("f", "int, int"));
        assert_eq!(parse_signature("f()"), ("f", ""));
        assert_eq!(parse_signature("f"), ("f", ""));
    }
}

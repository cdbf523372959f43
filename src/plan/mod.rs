//! Diff planning between desired and actual privilege state

pub mod render;

use tracing::debug;

use crate::catalog::ObjectPrivileges;
use crate::error::{ReconcileError, Result};
use crate::grant::{Grantee, Target};
use crate::privilege::{ObjectKind, PrivilegeSet, validate_privileges};

/// The ordered statements one apply will execute in a single transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatementPlan {
    statements: Vec<String>,
}

impl StatementPlan {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, sql: String) {
        self.statements.push(sql);
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn statements(&self) -> &[String] {
        &self.statements
    }
}

/// Declared desired state next to the actual state read from the catalog.
#[derive(Debug, Clone)]
pub struct GrantRecord {
    pub desired: PrivilegeSet,
    pub actual: ObjectPrivileges,
}

impl GrantRecord {
    /// Split into the privileges to grant and to revoke.
    ///
    /// Granting goes against the intersection of the per-object sets (a
    /// privilege missing on any object must be granted; re-granting the rest
    /// is a no-op) and revoking against their union (a privilege held by any
    /// object but not desired must go; revoking where absent is a no-op).
    pub fn diff(&self) -> PrivilegeDiff {
        let held_everywhere = self.actual.intersection();
        let held_anywhere = self.actual.union();
        PrivilegeDiff {
            to_grant: self
                .desired
                .difference(&held_everywhere)
                .cloned()
                .collect(),
            to_revoke: held_anywhere.difference(&self.desired).cloned().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivilegeDiff {
    pub to_grant: PrivilegeSet,
    pub to_revoke: PrivilegeSet,
}

impl PrivilegeDiff {
    pub fn is_empty(&self) -> bool {
        self.to_grant.is_empty() && self.to_revoke.is_empty()
    }
}

/// Plan a direct object grant: at most one REVOKE followed by at most one
/// GRANT, each covering the full object list.
pub fn plan_grant(grantee: &Grantee, target: &Target, record: &GrantRecord) -> Result<StatementPlan> {
    target.validate()?;
    validate_privileges(target.kind, &record.desired)?;

    let diff = record.diff();
    debug!(
        "planned {} for {}: grant {:?}, revoke {:?}",
        target.kind, grantee, diff.to_grant, diff.to_revoke
    );

    let mut plan = StatementPlan::new();
    if !diff.to_revoke.is_empty() {
        plan.push(render::render_revoke(&diff.to_revoke, target, grantee));
    }
    if !diff.to_grant.is_empty() {
        plan.push(render::render_grant(&diff.to_grant, target, grantee));
    }
    Ok(plan)
}

/// Plan a default-privilege rule.
///
/// There is no atomic "set exactly" primitive for default privileges, so the
/// plan always starts with REVOKE ALL for the (owner, schema, kind, grantee)
/// tuple and re-grants the full desired set when it is non-empty.
pub fn plan_default_privileges(
    grantee: &Grantee,
    owner: &str,
    schema: Option<&str>,
    kind: ObjectKind,
    desired: &PrivilegeSet,
) -> Result<StatementPlan> {
    if !matches!(
        kind,
        ObjectKind::Table | ObjectKind::Function | ObjectKind::Procedure
    ) {
        return Err(ReconcileError::validation(format!(
            "default privileges do not apply to object kind {kind}"
        )));
    }
    validate_privileges(kind, desired)?;

    let mut plan = StatementPlan::new();
    plan.push(render::render_default_revoke_all(owner, schema, kind, grantee));
    if !desired.is_empty() {
        plan.push(render::render_default_grant(
            desired, owner, schema, kind, grantee,
        ));
    }
    Ok(plan)
}

/// Plan a role-grant rule: the symmetric set difference, one GRANT ROLE and
/// one REVOKE ROLE statement at most.
pub fn plan_role_grants(
    grantee: &Grantee,
    desired: &std::collections::BTreeSet<String>,
    actual: &std::collections::BTreeSet<String>,
) -> Result<StatementPlan> {
    if !matches!(grantee, Grantee::User(_) | Grantee::Role(_)) {
        return Err(ReconcileError::validation(
            "roles can only be granted to a user or to another role",
        ));
    }

    let to_grant: std::collections::BTreeSet<String> =
        desired.difference(actual).cloned().collect();
    let to_revoke: std::collections::BTreeSet<String> =
        actual.difference(desired).cloned().collect();

    let mut plan = StatementPlan::new();
    if !to_revoke.is_empty() {
        plan.push(render::render_role_revoke(&to_revoke, grantee));
    }
    if !to_grant.is_empty() {
        plan.push(render::render_role_grant(&to_grant, grantee));
    }
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::privilege::privilege_set;
    use std::collections::BTreeSet;

    fn group(name: &str) -> Grantee {
        Grantee::Group(name.to_string())
    }

    fn schema_target(schema: &str) -> Target {
        Target::new(ObjectKind::Schema, Some(schema.to_string()), vec![])
    }

    fn actual_for(object: &str, privileges: &[&str]) -> ObjectPrivileges {
        let mut actual = ObjectPrivileges::default();
        actual.insert(object.to_string(), privilege_set(privileges.iter().copied()));
        actual
    }

    #[test]
    fn test_grant_only_missing_privilege() {
        // usage already granted; adding create must not revoke anything
        let record = GrantRecord {
            desired: privilege_set(["usage", "create"]),
            actual: actual_for("analytics", &["usage"]),
        };
        let plan = plan_grant(&group("reporters"), &schema_target("analytics"), &record).unwrap();
        assert_eq!(
            plan.statements(),
            ["GRANT CREATE ON SCHEMA \"analytics\" TO GROUP \"reporters\""]
        );
    }

    #[test]
    fn test_idempotent_apply_is_empty() {
        let record = GrantRecord {
            desired: privilege_set(["usage", "create"]),
            actual: actual_for("analytics", &["usage", "create"]),
        };
        let plan = plan_grant(&group("reporters"), &schema_target("analytics"), &record).unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn test_revoke_to_empty() {
        let record = GrantRecord {
            desired: PrivilegeSet::new(),
            actual: actual_for("analytics", &["usage", "create"]),
        };
        let plan = plan_grant(&group("reporters"), &schema_target("analytics"), &record).unwrap();
        assert_eq!(
            plan.statements(),
            ["REVOKE CREATE, USAGE ON SCHEMA \"analytics\" FROM GROUP \"reporters\""]
        );
    }

    #[test]
    fn test_revoke_then_grant_order() {
        let record = GrantRecord {
            desired: privilege_set(["create"]),
            actual: actual_for("analytics", &["usage"]),
        };
        let plan = plan_grant(&group("reporters"), &schema_target("analytics"), &record).unwrap();
        assert_eq!(plan.len(), 2);
        assert!(plan.statements()[0].starts_with("REVOKE USAGE"));
        assert!(plan.statements()[1].starts_with("GRANT CREATE"));
    }

    #[test]
    fn test_never_more_than_two_statements() {
        let target = Target::new(
            ObjectKind::Table,
            Some("s".to_string()),
            vec!["a".to_string(), "b".to_string(), "c".to_string()],
        );
        let mut actual = ObjectPrivileges::default();
        actual.insert("a".to_string(), privilege_set(["select", "rule", "trigger"]));
        actual.insert("b".to_string(), privilege_set(["delete"]));
        actual.insert("c".to_string(), PrivilegeSet::new());
        let record = GrantRecord {
            desired: privilege_set(["select", "insert"]),
            actual,
        };
        let plan = plan_grant(&group("g"), &target, &record).unwrap();
        assert_eq!(plan.len(), 2);
    }

    #[test]
    fn test_multi_object_straggler_converges() {
        // "events" already has select, "users" does not: select must be in
        // the grant list so the straggler catches up.
        let target = Target::new(
            ObjectKind::Table,
            Some("s".to_string()),
            vec!["events".to_string(), "users".to_string()],
        );
        let mut actual = ObjectPrivileges::default();
        actual.insert("events".to_string(), privilege_set(["select"]));
        actual.insert("users".to_string(), PrivilegeSet::new());
        let record = GrantRecord {
            desired: privilege_set(["select"]),
            actual,
        };
        let plan = plan_grant(&group("g"), &target, &record).unwrap();
        assert_eq!(
            plan.statements(),
            ["GRANT SELECT ON \"s\".\"events\", \"s\".\"users\" TO GROUP \"g\""]
        );
    }

    #[test]
    fn test_symmetry_restores_original_set() {
        let original = privilege_set(["usage", "create"]);

        // revoke to empty
        let record = GrantRecord {
            desired: PrivilegeSet::new(),
            actual: actual_for("analytics", &["usage", "create"]),
        };
        let revoke_plan =
            plan_grant(&group("g"), &schema_target("analytics"), &record).unwrap();
        assert_eq!(revoke_plan.len(), 1);

        // re-grant from empty
        let record = GrantRecord {
            desired: original.clone(),
            actual: actual_for("analytics", &[]),
        };
        let grant_plan = plan_grant(&group("g"), &schema_target("analytics"), &record).unwrap();
        assert_eq!(
            grant_plan.statements(),
            ["GRANT CREATE, USAGE ON SCHEMA \"analytics\" TO GROUP \"g\""]
        );
    }

    #[test]
    fn test_validation_happens_before_planning() {
        let record = GrantRecord {
            desired: privilege_set(["select"]),
            actual: ObjectPrivileges::default(),
        };
        let err = plan_grant(&group("g"), &schema_target("analytics"), &record).unwrap_err();
        assert!(matches!(err, ReconcileError::Validation(_)));
    }

    #[test]
    fn test_default_privileges_always_revoke_all_first() {
        let plan = plan_default_privileges(
            &group("loaders"),
            "etl_svc",
            None,
            ObjectKind::Table,
            &privilege_set(["select", "insert"]),
        )
        .unwrap();
        assert_eq!(plan.len(), 2);
        assert_eq!(
            plan.statements()[0],
            "ALTER DEFAULT PRIVILEGES FOR USER \"etl_svc\" REVOKE ALL ON TABLES FROM GROUP \"loaders\""
        );
        assert_eq!(
            plan.statements()[1],
            "ALTER DEFAULT PRIVILEGES FOR USER \"etl_svc\" GRANT INSERT, SELECT ON TABLES TO GROUP \"loaders\""
        );
    }

    #[test]
    fn test_default_privileges_empty_set_is_single_revoke() {
        let plan = plan_default_privileges(
            &group("loaders"),
            "etl_svc",
            None,
            ObjectKind::Table,
            &PrivilegeSet::new(),
        )
        .unwrap();
        assert_eq!(plan.len(), 1);
        assert!(plan.statements()[0].contains("REVOKE ALL"));
    }

    #[test]
    fn test_default_privileges_reject_wrong_kind() {
        let err = plan_default_privileges(
            &group("g"),
            "owner",
            None,
            ObjectKind::Schema,
            &PrivilegeSet::new(),
        )
        .unwrap_err();
        assert!(matches!(err, ReconcileError::Validation(_)));
    }

    #[test]
    fn test_role_grant_diff() {
        let desired: BTreeSet<String> = ["analyst".to_string(), "reader".to_string()].into();
        let actual: BTreeSet<String> = ["reader".to_string(), "stale".to_string()].into();
        let plan =
            plan_role_grants(&Grantee::User("alice".to_string()), &desired, &actual).unwrap();
        assert_eq!(
            plan.statements(),
            [
                "REVOKE ROLE \"stale\" FROM \"alice\"",
                "GRANT ROLE \"analyst\" TO \"alice\"",
            ]
        );
    }

    #[test]
    fn test_role_grant_rejects_group_grantee() {
        let err = plan_role_grants(&group("g"), &BTreeSet::new(), &BTreeSet::new()).unwrap_err();
        assert!(matches!(err, ReconcileError::Validation(_)));
    }

    #[test]
    fn test_role_grant_idempotent() {
        let set: BTreeSet<String> = ["analyst".to_string()].into();
        let plan = plan_role_grants(&Grantee::Role("parent".to_string()), &set, &set).unwrap();
        assert!(plan.is_empty());
    }
}

//! SQL rendering for GRANT/REVOKE statements
//!
//! Single home for identifier quoting and statement text so case-folding and
//! escaping rules live in one place.

use itertools::Itertools;

use crate::grant::{Grantee, Target, parse_signature};
use crate::privilege::{ObjectKind, PrivilegeSet};

pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

pub fn escape_string(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Render the grantee clause: `GROUP "g"`, `ROLE "r"`, `"user"`, or PUBLIC.
pub fn grantee_clause(grantee: &Grantee) -> String {
    match grantee {
        Grantee::User(name) => quote_ident(name),
        Grantee::Group(name) => format!("GROUP {}", quote_ident(name)),
        Grantee::Role(name) => format!("ROLE {}", quote_ident(name)),
        Grantee::Public => "PUBLIC".to_string(),
    }
}

/// Render the object clause. Tables are listed without an object keyword;
/// every other kind carries its keyword. Signatures stay unquoted inside the
/// parens.
fn object_clause(target: &Target) -> String {
    let schema = target.schema.as_deref().unwrap_or_default();
    match target.kind {
        ObjectKind::Database => format!(
            "DATABASE {}",
            target.objects.iter().map(|o| quote_ident(o)).join(", ")
        ),
        ObjectKind::Schema => format!("SCHEMA {}", quote_ident(schema)),
        ObjectKind::Table => target
            .objects
            .iter()
            .map(|o| format!("{}.{}", quote_ident(schema), quote_ident(o)))
            .join(", "),
        ObjectKind::Function | ObjectKind::Procedure => {
            let keyword = if target.kind == ObjectKind::Function {
                "FUNCTION"
            } else {
                "PROCEDURE"
            };
            format!(
                "{keyword} {}",
                target
                    .objects
                    .iter()
                    .map(|sig| {
                        let (name, args) = parse_signature(sig);
                        format!("{}.{}({})", quote_ident(schema), quote_ident(name), args)
                    })
                    .join(", ")
            )
        }
        ObjectKind::Language => format!(
            "LANGUAGE {}",
            target.objects.iter().map(|o| quote_ident(o)).join(", ")
        ),
        ObjectKind::Role => unreachable!("role targets are rejected during validation"),
    }
}

fn privilege_list(privileges: &PrivilegeSet) -> String {
    privileges.iter().map(|p| p.to_uppercase()).join(", ")
}

pub fn render_grant(privileges: &PrivilegeSet, target: &Target, grantee: &Grantee) -> String {
    format!(
        "GRANT {} ON {} TO {}",
        privilege_list(privileges),
        object_clause(target),
        grantee_clause(grantee)
    )
}

pub fn render_revoke(privileges: &PrivilegeSet, target: &Target, grantee: &Grantee) -> String {
    format!(
        "REVOKE {} ON {} FROM {}",
        privilege_list(privileges),
        object_clause(target),
        grantee_clause(grantee)
    )
}

/// The plural keyword ALTER DEFAULT PRIVILEGES uses per object kind.
pub fn default_privileges_keyword(kind: ObjectKind) -> &'static str {
    match kind {
        ObjectKind::Table => "TABLES",
        ObjectKind::Function => "FUNCTIONS",
        ObjectKind::Procedure => "PROCEDURES",
        _ => unreachable!("default privileges only cover tables, functions and procedures"),
    }
}

fn default_privileges_prefix(owner: &str, schema: Option<&str>) -> String {
    match schema {
        Some(schema) => format!(
            "ALTER DEFAULT PRIVILEGES FOR USER {} IN SCHEMA {}",
            quote_ident(owner),
            quote_ident(schema)
        ),
        None => format!("ALTER DEFAULT PRIVILEGES FOR USER {}", quote_ident(owner)),
    }
}

pub fn render_default_revoke_all(
    owner: &str,
    schema: Option<&str>,
    kind: ObjectKind,
    grantee: &Grantee,
) -> String {
    format!(
        "{} REVOKE ALL ON {} FROM {}",
        default_privileges_prefix(owner, schema),
        default_privileges_keyword(kind),
        grantee_clause(grantee)
    )
}

pub fn render_default_grant(
    privileges: &PrivilegeSet,
    owner: &str,
    schema: Option<&str>,
    kind: ObjectKind,
    grantee: &Grantee,
) -> String {
    format!(
        "{} GRANT {} ON {} TO {}",
        default_privileges_prefix(owner, schema),
        privilege_list(privileges),
        default_privileges_keyword(kind),
        grantee_clause(grantee)
    )
}

fn role_list(roles: &std::collections::BTreeSet<String>) -> String {
    roles
        .iter()
        .map(|r| format!("ROLE {}", quote_ident(r)))
        .join(", ")
}

pub fn render_role_grant(roles: &std::collections::BTreeSet<String>, grantee: &Grantee) -> String {
    format!("GRANT {} TO {}", role_list(roles), grantee_clause(grantee))
}

pub fn render_role_revoke(roles: &std::collections::BTreeSet<String>, grantee: &Grantee) -> String {
    format!(
        "REVOKE {} FROM {}",
        role_list(roles),
        grantee_clause(grantee)
    )
}

//! Decoding of catalog ACL text
//!
//! Privilege state comes out of the catalog as opaque aclitem text like
//! `group loaders=arwdR/etl_svc,admin=arwdRxtDAP/etl_svc,=r/etl_svc`. Each
//! entry is `<grantee>=<codes>/<grantor>`: a `group ` prefix marks a group
//! grantee, a bare name a user or role, and an empty grantee PUBLIC. The
//! single-letter codes map to capabilities per object kind; `*` (grant
//! option) and codes outside the kind's vocabulary are skipped.

use crate::grant::Grantee;
use crate::privilege::{ObjectKind, PrivilegeSet};

const TABLE_CODES: &[(char, &str)] = &[
    ('r', "select"),
    ('a', "insert"),
    ('w', "update"),
    ('d', "delete"),
    ('x', "references"),
    ('R', "rule"),
    ('t', "trigger"),
    ('D', "truncate"),
    ('A', "alter"),
    ('P', "drop"),
];

const DATABASE_CODES: &[(char, &str)] = &[('C', "create"), ('T', "temporary")];

const SCHEMA_CODES: &[(char, &str)] = &[('C', "create"), ('U', "usage"), ('A', "alter")];

const FUNCTION_CODES: &[(char, &str)] = &[('X', "execute")];

const LANGUAGE_CODES: &[(char, &str)] = &[('U', "usage")];

fn code_table(kind: ObjectKind) -> &'static [(char, &'static str)] {
    match kind {
        ObjectKind::Table => TABLE_CODES,
        ObjectKind::Database => DATABASE_CODES,
        ObjectKind::Schema => SCHEMA_CODES,
        ObjectKind::Function | ObjectKind::Procedure => FUNCTION_CODES,
        ObjectKind::Language => LANGUAGE_CODES,
        ObjectKind::Role => &[],
    }
}

/// Map one ACL code letter to its capability for the given object kind.
pub fn privilege_for_code(code: char, kind: ObjectKind) -> Option<&'static str> {
    code_table(kind)
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, p)| *p)
}

/// Extract the privilege set a specific grantee holds, from ACL text.
///
/// Absence of a matching entry is not an error: it decodes to the empty set,
/// exactly like a NULL ACL column.
pub fn grantee_privileges(acl: &str, grantee: &Grantee, kind: ObjectKind) -> PrivilegeSet {
    match entry_codes(acl, grantee) {
        Some(codes) => codes
            .chars()
            .filter_map(|c| privilege_for_code(c, kind))
            .map(str::to_string)
            .collect(),
        None => PrivilegeSet::new(),
    }
}

/// Locate the code letters of the ACL entry scoped to `grantee`.
fn entry_codes<'a>(acl: &'a str, grantee: &Grantee) -> Option<&'a str> {
    let acl = acl.trim().trim_start_matches('{').trim_end_matches('}');
    for entry in acl.split(',') {
        let entry = entry.trim().trim_matches('"');
        let Some((who, rest)) = entry.split_once('=') else {
            continue;
        };
        let codes = rest.split('/').next().unwrap_or(rest);
        if matches(who, grantee) {
            return Some(codes);
        }
    }
    None
}

fn matches(who: &str, grantee: &Grantee) -> bool {
    let who = who.trim();
    match grantee {
        Grantee::Public => who.is_empty(),
        Grantee::Group(name) => who
            .strip_prefix("group ")
            .map(|g| g.trim_matches('"') == name)
            .unwrap_or(false),
        Grantee::User(name) | Grantee::Role(name) => {
            !who.starts_with("group ") && who.trim_matches('"') == name
        }
    }
}

//! Declarative privilege reconciliation for Amazon Redshift.
//!
//! Given a desired set of privileges for a principal over a target object,
//! the engine computes and atomically applies the minimal GRANT/REVOKE
//! statements that make the live catalog match the declared state:
//! idempotently, safely under concurrent mutation, and with
//! transient-failure retry. Three resources expose the lifecycle to a
//! declarative framework: direct object grants, default-privilege rules,
//! and role grants.

pub mod catalog;
pub mod constants;
pub mod db;
pub mod error;
pub mod grant;
pub mod ident;
pub mod plan;
pub mod privilege;
pub mod resource;

pub use error::{ReconcileError, Result};
pub use grant::{Grantee, Target};
pub use privilege::{ObjectKind, PrivilegeSet};
pub use resource::{
    DefaultPrivilegesConfig, DefaultPrivilegesResource, GrantConfig, GrantResource, Resource,
    RoleGrantConfig, RoleGrantResource,
};

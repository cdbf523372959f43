//! Declarative resource lifecycles
//!
//! Each resource wires the identity codec, catalog reader, diff planner and
//! transaction executor into the canonical Create/Read/Update/Delete/Exists
//! operations the surrounding framework drives.

pub mod default_privileges;
pub mod grant;
pub mod role_grant;

use std::future::Future;

use crate::error::Result;

pub use default_privileges::{DefaultPrivilegesConfig, DefaultPrivilegesResource};
pub use grant::{GrantConfig, GrantResource};
pub use role_grant::{RoleGrantConfig, RoleGrantResource};

/// The lifecycle contract every reconciled resource implements.
///
/// `create` returns the durable identifier attached to the resource
/// instance; `read` returns `Ok(None)` once the underlying principal or
/// object has disappeared, so the caller clears its tracked state instead of
/// failing; `exists` is the cheap drift probe.
pub trait Resource {
    type Config;

    fn create(&self, config: &Self::Config) -> impl Future<Output = Result<String>>;
    fn read(&self, id: &str) -> impl Future<Output = Result<Option<Self::Config>>>;
    fn update(&self, config: &Self::Config) -> impl Future<Output = Result<()>>;
    fn delete(&self, id: &str) -> impl Future<Output = Result<()>>;
    fn exists(&self, id: &str) -> impl Future<Output = Result<bool>>;
}

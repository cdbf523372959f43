//! Role grants
//!
//! Reconciles the set of roles held by a user or by another role. Unlike
//! object grants there is no ACL text to decode: the role-grant views expose
//! the membership directly.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{debug, warn};

use crate::catalog::lookup;
use crate::db::{RetrySettings, Sleeper, TokioSleeper, execute_plan, run_with_retry};
use crate::error::{ReconcileError, Result};
use crate::grant::Grantee;
use crate::ident;
use crate::plan;
use crate::privilege::ObjectKind;
use crate::resource::Resource;

/// Declared state of one role-grant rule: the full set of roles the grantee
/// should hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleGrantConfig {
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub roles: BTreeSet<String>,
}

impl RoleGrantConfig {
    pub fn grantee(&self) -> Result<Grantee> {
        match (self.user.as_deref(), self.role.as_deref()) {
            (Some(user), None) => Ok(Grantee::User(user.to_string())),
            (None, Some(role)) => Ok(Grantee::Role(role.to_string())),
            (Some(_), Some(_)) => Err(ReconcileError::validation(
                "exactly one of user or role must be set, not both",
            )),
            (None, None) => Err(ReconcileError::validation(
                "exactly one of user or role must be set",
            )),
        }
    }

    pub fn id(&self) -> Result<String> {
        let grantee = self.grantee()?;
        let roles: Vec<String> = self.roles.iter().cloned().collect();
        ident::encode(&grantee, ObjectKind::Role, None, &roles)
    }
}

pub struct RoleGrantResource<S: Sleeper = TokioSleeper> {
    pool: PgPool,
    sleeper: S,
    retry: RetrySettings,
}

impl RoleGrantResource {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            sleeper: TokioSleeper,
            retry: RetrySettings::default(),
        }
    }
}

impl<S: Sleeper> RoleGrantResource<S> {
    pub fn with_sleeper(pool: PgPool, sleeper: S, retry: RetrySettings) -> Self {
        Self {
            pool,
            sleeper,
            retry,
        }
    }

    async fn apply(&self, grantee: &Grantee, desired: &BTreeSet<String>) -> Result<()> {
        let pool = &self.pool;
        run_with_retry(
            &self.sleeper,
            self.retry.max_attempts,
            self.retry.delay,
            move || async move {
                let actual = actual_roles(pool, grantee).await?;
                let plan = plan::plan_role_grants(grantee, desired, &actual)?;
                execute_plan(pool, &plan).await
            },
        )
        .await?
        .into_result()?;

        let applied = actual_roles(pool, grantee).await?;
        if &applied != desired {
            warn!("read-back of roles for {grantee} does not match desired state");
        }
        Ok(())
    }

    fn decode(&self, id: &str) -> Result<(Grantee, BTreeSet<String>)> {
        let decoded = ident::decode(id)?;
        if decoded.kind != ObjectKind::Role {
            return Err(ReconcileError::malformed_id(
                id,
                format!("expected object type role, found {}", decoded.kind),
            ));
        }
        if matches!(decoded.grantee, Grantee::Group(_)) {
            return Err(ReconcileError::malformed_id(
                id,
                "roles are tracked for users and roles only",
            ));
        }
        Ok((decoded.grantee, decoded.objects.into_iter().collect()))
    }
}

/// The roles a grantee currently holds, with the grantee's existence checked
/// on the way.
async fn actual_roles(pool: &PgPool, grantee: &Grantee) -> Result<BTreeSet<String>> {
    match grantee {
        Grantee::User(name) => {
            lookup::user_id(pool, name)
                .await?
                .ok_or_else(|| ReconcileError::not_found(format!("user {name}")))?;
            lookup::user_roles(pool, name).await
        }
        Grantee::Role(name) => {
            if !lookup::role_exists(pool, name).await? {
                return Err(ReconcileError::not_found(format!("role {name}")));
            }
            lookup::role_roles(pool, name).await
        }
        _ => Err(ReconcileError::validation(
            "roles can only be granted to a user or to another role",
        )),
    }
}

impl<S: Sleeper> Resource for RoleGrantResource<S> {
    type Config = RoleGrantConfig;

    async fn create(&self, config: &RoleGrantConfig) -> Result<String> {
        let grantee = config.grantee()?;
        self.apply(&grantee, &config.roles).await?;
        config.id()
    }

    async fn read(&self, id: &str) -> Result<Option<RoleGrantConfig>> {
        let (grantee, _declared) = self.decode(id)?;
        match actual_roles(&self.pool, &grantee).await {
            Ok(actual) => {
                let (user, role) = match &grantee {
                    Grantee::User(name) => (Some(name.clone()), None),
                    _ => (None, grantee.name().map(str::to_string)),
                };
                Ok(Some(RoleGrantConfig {
                    user,
                    role,
                    roles: actual,
                }))
            }
            Err(ReconcileError::NotFound(what)) => {
                debug!("{what} is gone, treating role grant {id} as deleted");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn update(&self, config: &RoleGrantConfig) -> Result<()> {
        let grantee = config.grantee()?;
        self.apply(&grantee, &config.roles).await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let (grantee, _declared) = self.decode(id)?;
        match self.apply(&grantee, &BTreeSet::new()).await {
            Ok(()) => Ok(()),
            Err(ReconcileError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn exists(&self, id: &str) -> Result<bool> {
        let (grantee, _declared) = self.decode(id)?;
        match &grantee {
            Grantee::User(name) => Ok(lookup::user_id(&self.pool, name).await?.is_some()),
            Grantee::Role(name) => lookup::role_exists(&self.pool, name).await,
            _ => Ok(false),
        }
    }
}

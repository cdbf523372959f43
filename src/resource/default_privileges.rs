//! Default-privilege rules
//!
//! Default privileges attach to objects an owner creates in the future,
//! which makes them a different beast from grants on existing objects: the
//! catalog record is keyed by internal ids, and there is no primitive to set
//! the privilege list exactly, so every apply revokes all and re-grants.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{debug, warn};

use crate::catalog::lookup;
use crate::db::{RetrySettings, Sleeper, TokioSleeper, execute_plan, run_with_retry};
use crate::error::{ReconcileError, Result};
use crate::grant::Grantee;
use crate::ident;
use crate::plan;
use crate::privilege::{ObjectKind, PrivilegeSet};
use crate::resource::Resource;

/// Declared state of one default-privilege rule. `schema: None` scopes the
/// rule to all schemas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultPrivilegesConfig {
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
    pub owner: String,
    #[serde(default)]
    pub schema: Option<String>,
    pub object_kind: ObjectKind,
    #[serde(default)]
    pub privileges: PrivilegeSet,
}

impl DefaultPrivilegesConfig {
    pub fn grantee(&self) -> Result<Grantee> {
        Grantee::from_user_or_group(self.user.as_deref(), self.group.as_deref())
    }

    /// The durable identifier; the owner rides in the trailing object slot
    /// so rules for different owners stay distinct.
    pub fn id(&self) -> Result<String> {
        let grantee = self.grantee()?;
        ident::encode(
            &grantee,
            self.object_kind,
            self.schema.as_deref(),
            std::slice::from_ref(&self.owner),
        )
    }
}

pub struct DefaultPrivilegesResource<S: Sleeper = TokioSleeper> {
    pool: PgPool,
    sleeper: S,
    retry: RetrySettings,
}

impl DefaultPrivilegesResource {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            sleeper: TokioSleeper,
            retry: RetrySettings::default(),
        }
    }
}

impl<S: Sleeper> DefaultPrivilegesResource<S> {
    pub fn with_sleeper(pool: PgPool, sleeper: S, retry: RetrySettings) -> Self {
        Self {
            pool,
            sleeper,
            retry,
        }
    }

    async fn apply(
        &self,
        grantee: &Grantee,
        owner: &str,
        schema: Option<&str>,
        kind: ObjectKind,
        desired: &PrivilegeSet,
    ) -> Result<()> {
        // the plan is independent of actual state (always revoke-all first),
        // so validation and planning happen once, before any attempt
        let plan = plan::plan_default_privileges(grantee, owner, schema, kind, desired)?;

        let pool = &self.pool;
        run_with_retry(
            &self.sleeper,
            self.retry.max_attempts,
            self.retry.delay,
            move || {
                let plan = plan.clone();
                async move {
                    lookup::user_id(pool, owner)
                        .await?
                        .ok_or_else(|| ReconcileError::not_found(format!("user {owner}")))?;
                    lookup::resolve_grantee(pool, grantee).await?;
                    if let Some(schema) = schema {
                        lookup::namespace_id(pool, schema)
                            .await?
                            .ok_or_else(|| ReconcileError::not_found(format!("schema {schema}")))?;
                    }
                    execute_plan(pool, &plan).await
                }
            },
        )
        .await?
        .into_result()?;

        let applied = lookup::fetch_current_defaults(pool, grantee, owner, schema, kind).await?;
        if &applied != desired {
            warn!(
                "read-back of default privileges for {grantee} under owner {owner} does not match desired state"
            );
        }
        Ok(())
    }

    fn decode(&self, id: &str) -> Result<(Grantee, String, Option<String>, ObjectKind)> {
        let decoded = ident::decode(id)?;
        if matches!(decoded.grantee, Grantee::Role(_)) {
            return Err(ReconcileError::malformed_id(
                id,
                "default privileges are tracked for users and groups only",
            ));
        }
        if decoded.objects.is_empty() {
            return Err(ReconcileError::malformed_id(id, "missing owner segment"));
        }
        if !matches!(
            decoded.kind,
            ObjectKind::Table | ObjectKind::Function | ObjectKind::Procedure
        ) {
            return Err(ReconcileError::malformed_id(
                id,
                format!("default privileges do not apply to {}", decoded.kind),
            ));
        }
        // the owner is the only trailing payload, so underscore-bearing
        // names are rejoined rather than mistaken for multiple segments
        Ok((
            decoded.grantee,
            decoded.objects.join("_"),
            decoded.schema,
            decoded.kind,
        ))
    }
}

impl<S: Sleeper> Resource for DefaultPrivilegesResource<S> {
    type Config = DefaultPrivilegesConfig;

    async fn create(&self, config: &DefaultPrivilegesConfig) -> Result<String> {
        let grantee = config.grantee()?;
        self.apply(
            &grantee,
            &config.owner,
            config.schema.as_deref(),
            config.object_kind,
            &config.privileges,
        )
        .await?;
        config.id()
    }

    async fn read(&self, id: &str) -> Result<Option<DefaultPrivilegesConfig>> {
        let (grantee, owner, schema, kind) = self.decode(id)?;
        match lookup::fetch_current_defaults(&self.pool, &grantee, &owner, schema.as_deref(), kind)
            .await
        {
            Ok(actual) => {
                let (user, group) = match &grantee {
                    Grantee::User(name) => (Some(name.clone()), None),
                    _ => (None, grantee.name().map(str::to_string)),
                };
                Ok(Some(DefaultPrivilegesConfig {
                    user,
                    group,
                    owner,
                    schema,
                    object_kind: kind,
                    privileges: actual,
                }))
            }
            Err(ReconcileError::NotFound(what)) => {
                debug!("{what} is gone, treating default-privilege rule {id} as deleted");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn update(&self, config: &DefaultPrivilegesConfig) -> Result<()> {
        let grantee = config.grantee()?;
        self.apply(
            &grantee,
            &config.owner,
            config.schema.as_deref(),
            config.object_kind,
            &config.privileges,
        )
        .await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let (grantee, owner, schema, kind) = self.decode(id)?;
        match self
            .apply(&grantee, &owner, schema.as_deref(), kind, &PrivilegeSet::new())
            .await
        {
            Ok(()) => Ok(()),
            Err(ReconcileError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn exists(&self, id: &str) -> Result<bool> {
        let (grantee, owner, schema, _) = self.decode(id)?;
        if lookup::user_id(&self.pool, &owner).await?.is_none() {
            return Ok(false);
        }
        match lookup::resolve_grantee(&self.pool, &grantee).await {
            Ok(()) => {}
            Err(ReconcileError::NotFound(_)) => return Ok(false),
            Err(e) => return Err(e),
        }
        if let Some(schema) = &schema
            && lookup::namespace_id(&self.pool, schema).await?.is_none()
        {
            return Ok(false);
        }
        Ok(true)
    }
}

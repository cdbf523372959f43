//! Transaction-scoped plan execution

use sqlx::PgPool;
use tracing::{debug, info};

use crate::error::{ReconcileError, Result};
use crate::plan::StatementPlan;

/// Execute every statement of a plan inside one transaction.
///
/// Commit only happens after the full plan succeeded. A statement failure
/// rolls back explicitly; any other early exit drops the transaction, which
/// rolls back as well, so external state is never left partially mutated.
pub async fn execute_plan(pool: &PgPool, plan: &StatementPlan) -> Result<()> {
    if plan.is_empty() {
        debug!("empty plan, nothing to apply");
        return Ok(());
    }

    let mut tx = pool.begin().await.map_err(ReconcileError::from_sqlx)?;
    for statement in plan.statements() {
        if let Err(e) = sqlx::query(statement).execute(&mut *tx).await {
            // keep the statement error even if the rollback itself fails
            let _ = tx.rollback().await;
            return Err(ReconcileError::from_sqlx(e));
        }
        info!("applied: {statement}");
    }
    tx.commit().await.map_err(ReconcileError::from_sqlx)?;
    Ok(())
}

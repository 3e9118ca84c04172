//! Audit log writer and reader
//!
//! Entries are appended inside the caller's unit of work, so a failed
//! audit write aborts the whole operation.

use crate::error::BankResult;
use crate::services::ServiceContext;
use banco_core::{Actor, AuditDetail, AuditEntry, OperationType, ProductRef};
use banco_persistence::UnitOfWork;
use chrono::{DateTime, Utc};

/// Appends audit entries within an open unit of work
pub struct AuditWriter;

impl AuditWriter {
    /// Append one entry; returns its id
    pub async fn record(
        uow: &mut dyn UnitOfWork,
        operation_type: OperationType,
        actor: Actor,
        product: ProductRef,
        detail: AuditDetail,
        at: DateTime<Utc>,
    ) -> BankResult<i64> {
        let product_id = Some(product.to_string());
        let entry = AuditEntry::new(operation_type, actor, product_id, detail, at);
        Ok(uow.append_audit(&entry).await?)
    }
}

/// Read-only view over the audit log
pub struct AuditLog<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> AuditLog<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Whole log, oldest first
    pub async fn entries(&self) -> BankResult<Vec<AuditEntry>> {
        let mut uow = self.ctx.read().await?;
        Ok(uow.audit_entries(None).await?)
    }

    /// Entries touching one account, loan, transfer or user
    pub async fn for_product(&self, product: &ProductRef) -> BankResult<Vec<AuditEntry>> {
        let product_id = product.to_string();
        let mut uow = self.ctx.read().await?;
        Ok(uow.audit_entries(Some(&product_id)).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use banco_persistence::InMemoryStore;
    use chrono::TimeZone;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_record_is_discarded_without_commit() {
        let ctx = ServiceContext::new(Arc::new(InMemoryStore::default()));
        let at = Utc.with_ymd_and_hms(2026, 6, 2, 9, 0, 0).unwrap();

        {
            let mut uow = ctx.begin(vec![]).await.unwrap();
            AuditWriter::record(
                uow.as_mut(),
                OperationType::TransferExpired,
                Actor::System,
                ProductRef::Transfer(1),
                AuditDetail::new(),
                at,
            )
            .await
            .unwrap();
        }
        assert!(AuditLog::new(&ctx).entries().await.unwrap().is_empty());

        let mut uow = ctx.begin(vec![]).await.unwrap();
        AuditWriter::record(
            uow.as_mut(),
            OperationType::TransferExpired,
            Actor::System,
            ProductRef::Transfer(1),
            AuditDetail::new().with("previous_status", "pending_approval"),
            at,
        )
        .await
        .unwrap();
        uow.commit().await.unwrap();

        let log = AuditLog::new(&ctx);
        let entries = log.for_product(&ProductRef::Transfer(1)).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].affected_product_id.as_deref(), Some("transfer:1"));
        assert!(log.for_product(&ProductRef::Transfer(2)).await.unwrap().is_empty());
        assert!(log.for_product(&ProductRef::Loan(1)).await.unwrap().is_empty());
    }
}

//! Per-tenant job number allocation.
//!
//! The atomic counter is authoritative. When it is unavailable the sequencer
//! degrades to `max(job_number) + 1`, which can race; the unique
//! `(tenant_id, job_number)` constraint turns such a race into a
//! `UniqueViolation` on insert, and callers allocate again.

use serde::Serialize;
use tracing::warn;

use studiodesk_core::{JobNumber, TenantId};

use crate::store::{JobStore, StoreError, StoreResult};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NumberSource {
    Atomic,
    Fallback,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct IssuedNumber {
    pub number: JobNumber,
    pub source: NumberSource,
}

pub async fn next_job_number<S>(store: &S, tenant_id: TenantId) -> StoreResult<IssuedNumber>
where
    S: JobStore + ?Sized,
{
    match store.increment_job_counter(tenant_id).await {
        Ok(number) => Ok(IssuedNumber {
            number,
            source: NumberSource::Atomic,
        }),
        Err(err) => {
            warn!(
                tenant_id = %tenant_id,
                error = %err,
                "atomic job counter failed; falling back to max + 1"
            );
            let number = match store.max_job_number(tenant_id).await? {
                Some(max) => max
                    .next()
                    .map_err(|e| StoreError::Backend(e.to_string()))?,
                None => JobNumber::FIRST,
            };
            Ok(IssuedNumber {
                number,
                source: NumberSource::Fallback,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStudioStore;

    #[tokio::test]
    async fn atomic_numbers_are_consecutive() {
        let store = InMemoryStudioStore::new();
        let tenant = TenantId::new();
        for expected in 1..=5 {
            let issued = next_job_number(&store, tenant).await.unwrap();
            assert_eq!(issued.number.value(), expected);
            assert_eq!(issued.source, NumberSource::Atomic);
        }
    }

    #[tokio::test]
    async fn falls_back_to_max_plus_one() {
        let store = InMemoryStudioStore::new();
        let tenant = TenantId::new();
        store.fail_operation("increment_job_counter");

        let issued = next_job_number(&store, tenant).await.unwrap();
        assert_eq!(issued.number, JobNumber::FIRST);
        assert_eq!(issued.source, NumberSource::Fallback);
    }

    #[tokio::test]
    async fn fallback_failure_propagates() {
        let store = InMemoryStudioStore::new();
        store.fail_operation("increment_job_counter");
        store.fail_operation("max_job_number");
        assert!(matches!(
            next_job_number(&store, TenantId::new()).await,
            Err(StoreError::Unavailable(_))
        ));
    }
}

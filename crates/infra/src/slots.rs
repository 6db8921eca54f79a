//! Slot allocation against the store.
//!
//! Every transition is one conditional write. Reads happen only after a
//! write reported "no row changed", to classify the failure for the caller.

use chrono::Utc;
use tracing::{debug, info};

use studiodesk_core::{BookingEventId, ClientId, JobId, SlotId, TenantId, TenantScoped};
use studiodesk_scheduling::{AvailabilityWindow, BookingSlot, SlotClaim, SlotStatus, expand_slots};

use crate::provisioning::{ProvisioningError, ProvisioningResult};
use crate::store::{CatalogStore, SlotStore};

pub struct SlotAllocator<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S> SlotAllocator<'a, S>
where
    S: SlotStore + CatalogStore + ?Sized,
{
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// available -> booked. The conditional claim is the first and only
    /// guard; zero affected rows is reported as `NotFound`, `Expired` or
    /// `Conflict`, never as a generic failure.
    pub async fn reserve(
        &self,
        slot_id: SlotId,
        claim: &SlotClaim,
    ) -> ProvisioningResult<BookingSlot> {
        if let Some(slot) = self.store.claim_slot(slot_id, claim).await? {
            info!(slot_id = %slot_id, tenant_id = %slot.tenant_id, "slot claimed");
            return Ok(slot);
        }

        let err = match self.store.get_slot(slot_id).await? {
            None => ProvisioningError::NotFound(format!("slot {slot_id} does not exist")),
            Some(slot) => slot.status.claim_rejection().into(),
        };
        debug!(slot_id = %slot_id, error = %err, "slot claim rejected");
        Err(err)
    }

    /// Back-fill client/job references after provisioning.
    pub async fn link(
        &self,
        slot_id: SlotId,
        client_id: Option<ClientId>,
        job_id: Option<JobId>,
    ) -> ProvisioningResult<bool> {
        Ok(self.store.link_slot(slot_id, client_id, job_id).await?)
    }

    /// booked -> available. `false` when the slot was not booked.
    pub async fn release(&self, tenant_id: TenantId, slot_id: SlotId) -> ProvisioningResult<bool> {
        let released = self.store.release_slot(tenant_id, slot_id).await?;
        if released {
            info!(tenant_id = %tenant_id, slot_id = %slot_id, "slot released");
        }
        Ok(released)
    }

    /// Claim a slot again for an existing job. `None` when the slot was
    /// taken (or removed) in the meantime.
    pub async fn reclaim(
        &self,
        tenant_id: TenantId,
        slot_id: SlotId,
        claim: SlotClaim,
    ) -> ProvisioningResult<Option<BookingSlot>> {
        match self.store.get_slot(slot_id).await? {
            Some(slot) if slot.belongs_to(tenant_id) => {}
            _ => return Ok(None),
        }
        Ok(self.store.claim_slot(slot_id, &claim).await?)
    }

    pub async fn block(&self, tenant_id: TenantId, slot_id: SlotId) -> ProvisioningResult<BookingSlot> {
        self.transition(tenant_id, slot_id, &[SlotStatus::Available], SlotStatus::Blocked)
            .await
    }

    /// available|blocked -> canceled. Booked slots must be released through
    /// their job first.
    pub async fn cancel(&self, tenant_id: TenantId, slot_id: SlotId) -> ProvisioningResult<BookingSlot> {
        self.transition(
            tenant_id,
            slot_id,
            &[SlotStatus::Available, SlotStatus::Blocked],
            SlotStatus::Canceled,
        )
        .await
    }

    /// Expand availability windows into fresh `available` slots for an event.
    pub async fn generate(
        &self,
        tenant_id: TenantId,
        event_id: BookingEventId,
        windows: &[AvailabilityWindow],
    ) -> ProvisioningResult<Vec<BookingSlot>> {
        let event = self
            .store
            .get_event(tenant_id, event_id)
            .await?
            .ok_or_else(|| ProvisioningError::NotFound(format!("event {event_id}")))?;

        let now = Utc::now();
        let slots: Vec<BookingSlot> =
            expand_slots(windows, event.slot_duration_minutes, event.buffer_minutes)?
                .into_iter()
                .map(|w| BookingSlot::available(SlotId::new(), tenant_id, event_id, w, now))
                .collect();

        self.store.insert_slots(slots.clone()).await?;
        info!(tenant_id = %tenant_id, event_id = %event_id, count = slots.len(), "slots generated");
        Ok(slots)
    }

    /// Delete an event and every slot it owns. Returns the number of slots removed.
    pub async fn delete_event(
        &self,
        tenant_id: TenantId,
        event_id: BookingEventId,
    ) -> ProvisioningResult<u64> {
        let removed = self
            .store
            .delete_event(tenant_id, event_id)
            .await?
            .ok_or_else(|| ProvisioningError::NotFound(format!("event {event_id}")))?;
        info!(tenant_id = %tenant_id, event_id = %event_id, removed, "event deleted");
        Ok(removed)
    }

    async fn transition(
        &self,
        tenant_id: TenantId,
        slot_id: SlotId,
        from: &[SlotStatus],
        to: SlotStatus,
    ) -> ProvisioningResult<BookingSlot> {
        if let Some(slot) = self
            .store
            .transition_slot(tenant_id, slot_id, from, to)
            .await?
        {
            info!(tenant_id = %tenant_id, slot_id = %slot_id, to = to.as_str(), "slot transitioned");
            return Ok(slot);
        }

        match self.store.get_slot(slot_id).await? {
            Some(slot) if slot.belongs_to(tenant_id) => Err(ProvisioningError::Conflict(format!(
                "slot cannot move from {} to {}",
                slot.status.as_str(),
                to.as_str()
            ))),
            _ => Err(ProvisioningError::NotFound(format!("slot {slot_id}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};
    use studiodesk_core::Money;
    use studiodesk_scheduling::{BookingEvent, BookingEventStatus};

    use crate::store::InMemoryStudioStore;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    async fn event(store: &InMemoryStudioStore, tenant_id: TenantId) -> BookingEventId {
        let event = BookingEvent {
            id: BookingEventId::new(),
            tenant_id,
            title: "Autumn Minis".to_string(),
            description: None,
            location: Some("Botanic Gardens".to_string()),
            package_id: None,
            custom_price: Some(Money::from_major(150)),
            slot_duration_minutes: 20,
            buffer_minutes: 10,
            status: BookingEventStatus::Published,
            auto_create_job: true,
            auto_create_invoice: true,
            created_at: Utc::now(),
        };
        let id = event.id;
        store.insert_event(event).await.unwrap();
        id
    }

    fn window() -> AvailabilityWindow {
        AvailabilityWindow {
            date: NaiveDate::from_ymd_opt(2026, 4, 4).unwrap(),
            start: t(9, 0),
            end: t(10, 0),
        }
    }

    fn claim() -> SlotClaim {
        SlotClaim::new("Sarah Lee", "sarah@example.com", None, Utc::now()).unwrap()
    }

    #[tokio::test]
    async fn generate_then_reserve_then_conflict() {
        let store = InMemoryStudioStore::new();
        let tenant = TenantId::new();
        let event_id = event(&store, tenant).await;
        let allocator = SlotAllocator::new(&store);

        let slots = allocator.generate(tenant, event_id, &[window()]).await.unwrap();
        assert_eq!(slots.len(), 2);

        let first = slots[0].id;
        let booked = allocator.reserve(first, &claim()).await.unwrap();
        assert_eq!(booked.status, SlotStatus::Booked);
        assert!(matches!(
            allocator.reserve(first, &claim()).await,
            Err(ProvisioningError::Conflict(_))
        ));
        assert!(matches!(
            allocator.reserve(SlotId::new(), &claim()).await,
            Err(ProvisioningError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn canceled_slots_are_expired_and_booked_slots_cannot_be_canceled() {
        let store = InMemoryStudioStore::new();
        let tenant = TenantId::new();
        let event_id = event(&store, tenant).await;
        let allocator = SlotAllocator::new(&store);
        let slots = allocator.generate(tenant, event_id, &[window()]).await.unwrap();

        allocator.block(tenant, slots[0].id).await.unwrap();
        allocator.cancel(tenant, slots[0].id).await.unwrap();
        assert!(matches!(
            allocator.reserve(slots[0].id, &claim()).await,
            Err(ProvisioningError::Expired(_))
        ));

        allocator.reserve(slots[1].id, &claim()).await.unwrap();
        assert!(matches!(
            allocator.cancel(tenant, slots[1].id).await,
            Err(ProvisioningError::Conflict(_))
        ));
        assert!(matches!(
            allocator.block(TenantId::new(), slots[1].id).await,
            Err(ProvisioningError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn release_and_reclaim() {
        let store = InMemoryStudioStore::new();
        let tenant = TenantId::new();
        let event_id = event(&store, tenant).await;
        let allocator = SlotAllocator::new(&store);
        let slot = allocator.generate(tenant, event_id, &[window()]).await.unwrap()[0].id;

        allocator.reserve(slot, &claim()).await.unwrap();
        assert!(allocator.release(tenant, slot).await.unwrap());
        assert!(!allocator.release(tenant, slot).await.unwrap());

        let job = JobId::new();
        let reclaimed = allocator
            .reclaim(tenant, slot, claim().for_job(None, job))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reclaimed.job_id, Some(job));
        assert!(allocator
            .reclaim(tenant, slot, claim())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn delete_event_cascades() {
        let store = InMemoryStudioStore::new();
        let tenant = TenantId::new();
        let event_id = event(&store, tenant).await;
        let allocator = SlotAllocator::new(&store);
        allocator.generate(tenant, event_id, &[window()]).await.unwrap();

        assert_eq!(allocator.delete_event(tenant, event_id).await.unwrap(), 2);
        assert!(store.list_slots(tenant, event_id).await.unwrap().is_empty());
        assert!(matches!(
            allocator.delete_event(tenant, event_id).await,
            Err(ProvisioningError::NotFound(_))
        ));
    }
}

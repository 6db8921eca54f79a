//! Postgres-backed studio store.
//!
//! Conditional writes are single statements of the form
//! `UPDATE .. WHERE <predicate> RETURNING ..`; an empty result means the
//! predicate did not hold. Uniqueness (client email, job number, invoice
//! number, signing token) is enforced by constraints in
//! `migrations/0001_studio.sql`.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Code | StoreError |
//! |------------|-----------------|------------|
//! | Database (unique violation) | `23505` | `UniqueViolation` |
//! | Database (undefined function/table) | `42883`, `42P01` | `Unavailable` |
//! | Database (other) | any | `Backend` |
//! | PoolClosed / PoolTimedOut | N/A | `Unavailable` |
//! | Other | N/A | `Backend` |

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row};
use tracing::instrument;
use uuid::Uuid;

use studiodesk_billing::{Invoice, LineItem, Package};
use studiodesk_contracts::{Contract, SignatureData};
use studiodesk_core::{
    BookingEventId, ClientId, ContractId, DomainError, InvoiceId, JobId, JobNumber, LeadId, Money,
    PackageId, Percent, SlotId, TenantId,
};
use studiodesk_crm::{Client, Job, Lead, normalize_email};
use studiodesk_scheduling::{BookingEvent, BookingSlot, SlotClaim, SlotStatus};

use super::{
    CatalogStore, ClientStore, ContractStore, InvoiceStore, JobStore, LeadStore, PaymentDetails,
    SlotStore, StoreError, StoreResult, StudioProfile,
};

const MIGRATION: &str = include_str!("../../migrations/0001_studio.sql");

const SLOT_COLUMNS: &str = "id, tenant_id, event_id, date, start_time, end_time, status, \
    client_id, job_id, booked_name, booked_email, booked_phone, booked_at, created_at";

const JOB_COLUMNS: &str = "id, tenant_id, job_number, client_id, lead_id, booking_slot_id, title, \
    job_type, date, time, end_time, location, package_id, package_name, package_amount_cents, \
    included_images, status, notes, created_at";

const CONTRACT_COLUMNS: &str = "id, tenant_id, job_id, client_id, content, status, signing_token, \
    sent_at, viewed_at, expires_at, signed_at, signature_data, created_at";

const LEAD_COLUMNS: &str = "id, tenant_id, client_id, job_type, preferred_date, location, source, \
    status, notes, quoted_package_id, quoted_amount_cents, quote_token, quote_accepted_at, created_at";

#[derive(Debug, Clone)]
pub struct PostgresStudioStore {
    pool: Arc<PgPool>,
}

impl PostgresStudioStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Apply the bundled schema. Idempotent.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::raw_sql(MIGRATION)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }
}

#[async_trait]
impl SlotStore for PostgresStudioStore {
    #[instrument(skip(self, slots), fields(count = slots.len()), err)]
    async fn insert_slots(&self, slots: Vec<BookingSlot>) -> StoreResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        for slot in &slots {
            sqlx::query(
                r#"
                INSERT INTO booking_slots (id, tenant_id, event_id, date, start_time, end_time, status, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(*slot.id.as_uuid())
            .bind(*slot.tenant_id.as_uuid())
            .bind(*slot.event_id.as_uuid())
            .bind(slot.date)
            .bind(slot.start_time)
            .bind(slot.end_time)
            .bind(slot.status.as_str())
            .bind(slot.created_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_slots", e))?;
        }
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(slot_id = %slot_id), err)]
    async fn get_slot(&self, slot_id: SlotId) -> StoreResult<Option<BookingSlot>> {
        let row = sqlx::query(&format!("SELECT {SLOT_COLUMNS} FROM booking_slots WHERE id = $1"))
            .bind(*slot_id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_slot", e))?;
        row.as_ref().map(slot_from_row).transpose()
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, event_id = %event_id), err)]
    async fn list_slots(
        &self,
        tenant_id: TenantId,
        event_id: BookingEventId,
    ) -> StoreResult<Vec<BookingSlot>> {
        let rows = sqlx::query(&format!(
            "SELECT {SLOT_COLUMNS} FROM booking_slots \
             WHERE tenant_id = $1 AND event_id = $2 ORDER BY date, start_time"
        ))
        .bind(*tenant_id.as_uuid())
        .bind(*event_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_slots", e))?;
        rows.iter().map(slot_from_row).collect()
    }

    #[instrument(skip(self, claim), fields(slot_id = %slot_id), err)]
    async fn claim_slot(
        &self,
        slot_id: SlotId,
        claim: &SlotClaim,
    ) -> StoreResult<Option<BookingSlot>> {
        let row = sqlx::query(&format!(
            "UPDATE booking_slots SET status = 'booked', booked_name = $2, booked_email = $3, \
             booked_phone = $4, booked_at = $5, client_id = $6, job_id = $7 \
             WHERE id = $1 AND status = 'available' RETURNING {SLOT_COLUMNS}"
        ))
        .bind(*slot_id.as_uuid())
        .bind(&claim.name)
        .bind(&claim.email)
        .bind(claim.phone.as_deref())
        .bind(claim.booked_at)
        .bind(claim.client_id.map(|id| *id.as_uuid()))
        .bind(claim.job_id.map(|id| *id.as_uuid()))
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("claim_slot", e))?;
        row.as_ref().map(slot_from_row).transpose()
    }

    #[instrument(skip(self), fields(slot_id = %slot_id), err)]
    async fn link_slot(
        &self,
        slot_id: SlotId,
        client_id: Option<ClientId>,
        job_id: Option<JobId>,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE booking_slots
            SET client_id = COALESCE($2, client_id), job_id = COALESCE($3, job_id)
            WHERE id = $1 AND status = 'booked'
            "#,
        )
        .bind(*slot_id.as_uuid())
        .bind(client_id.map(|id| *id.as_uuid()))
        .bind(job_id.map(|id| *id.as_uuid()))
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("link_slot", e))?;
        Ok(result.rows_affected() == 1)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, slot_id = %slot_id), err)]
    async fn release_slot(&self, tenant_id: TenantId, slot_id: SlotId) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE booking_slots
            SET status = 'available', client_id = NULL, job_id = NULL, booked_name = NULL,
                booked_email = NULL, booked_phone = NULL, booked_at = NULL
            WHERE id = $1 AND tenant_id = $2 AND status = 'booked'
            "#,
        )
        .bind(*slot_id.as_uuid())
        .bind(*tenant_id.as_uuid())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("release_slot", e))?;
        Ok(result.rows_affected() == 1)
    }

    #[instrument(skip(self, from), fields(tenant_id = %tenant_id, slot_id = %slot_id, to = to.as_str()), err)]
    async fn transition_slot(
        &self,
        tenant_id: TenantId,
        slot_id: SlotId,
        from: &[SlotStatus],
        to: SlotStatus,
    ) -> StoreResult<Option<BookingSlot>> {
        let from: Vec<&str> = from.iter().map(SlotStatus::as_str).collect();
        let row = sqlx::query(&format!(
            "UPDATE booking_slots SET status = $3 \
             WHERE id = $1 AND tenant_id = $2 AND status = ANY($4) RETURNING {SLOT_COLUMNS}"
        ))
        .bind(*slot_id.as_uuid())
        .bind(*tenant_id.as_uuid())
        .bind(to.as_str())
        .bind(&from)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("transition_slot", e))?;
        row.as_ref().map(slot_from_row).transpose()
    }
}

#[async_trait]
impl CatalogStore for PostgresStudioStore {
    #[instrument(skip(self, event), fields(event_id = %event.id), err)]
    async fn insert_event(&self, event: BookingEvent) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO booking_events (id, tenant_id, title, description, location, package_id,
                custom_price_cents, slot_duration_minutes, buffer_minutes, status,
                auto_create_job, auto_create_invoice, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(*event.id.as_uuid())
        .bind(*event.tenant_id.as_uuid())
        .bind(&event.title)
        .bind(event.description.as_deref())
        .bind(event.location.as_deref())
        .bind(event.package_id.map(|id| *id.as_uuid()))
        .bind(event.custom_price.map(|m| m.cents()))
        .bind(event.slot_duration_minutes as i32)
        .bind(event.buffer_minutes as i32)
        .bind(event.status.as_str())
        .bind(event.auto_create_job)
        .bind(event.auto_create_invoice)
        .bind(event.created_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_event", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, event_id = %event_id), err)]
    async fn get_event(
        &self,
        tenant_id: TenantId,
        event_id: BookingEventId,
    ) -> StoreResult<Option<BookingEvent>> {
        let row = sqlx::query(
            r#"
            SELECT id, tenant_id, title, description, location, package_id, custom_price_cents,
                   slot_duration_minutes, buffer_minutes, status, auto_create_job,
                   auto_create_invoice, created_at
            FROM booking_events
            WHERE id = $1 AND tenant_id = $2
            "#,
        )
        .bind(*event_id.as_uuid())
        .bind(*tenant_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_event", e))?;

        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(BookingEvent {
            id: BookingEventId::from_uuid(col(&row, "id")?),
            tenant_id: TenantId::from_uuid(col(&row, "tenant_id")?),
            title: col(&row, "title")?,
            description: col(&row, "description")?,
            location: col(&row, "location")?,
            package_id: col::<Option<Uuid>>(&row, "package_id")?.map(PackageId::from_uuid),
            custom_price: col::<Option<i64>>(&row, "custom_price_cents")?.map(Money::from_cents),
            slot_duration_minutes: col::<i32>(&row, "slot_duration_minutes")? as u32,
            buffer_minutes: col::<i32>(&row, "buffer_minutes")? as u32,
            status: parse(col(&row, "status")?)?,
            auto_create_job: col(&row, "auto_create_job")?,
            auto_create_invoice: col(&row, "auto_create_invoice")?,
            created_at: col(&row, "created_at")?,
        }))
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, event_id = %event_id), err)]
    async fn delete_event(
        &self,
        tenant_id: TenantId,
        event_id: BookingEventId,
    ) -> StoreResult<Option<u64>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let slots = sqlx::query("DELETE FROM booking_slots WHERE event_id = $1 AND tenant_id = $2")
            .bind(*event_id.as_uuid())
            .bind(*tenant_id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_event", e))?;
        let events = sqlx::query("DELETE FROM booking_events WHERE id = $1 AND tenant_id = $2")
            .bind(*event_id.as_uuid())
            .bind(*tenant_id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_event", e))?;

        if events.rows_affected() == 0 {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Ok(None);
        }
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(Some(slots.rows_affected()))
    }

    #[instrument(skip(self, package), fields(package_id = %package.id), err)]
    async fn insert_package(&self, package: Package) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO packages (id, tenant_id, name, price_cents, duration_minutes,
                included_images, require_deposit, deposit_percent_bp)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(*package.id.as_uuid())
        .bind(*package.tenant_id.as_uuid())
        .bind(&package.name)
        .bind(package.price.cents())
        .bind(package.duration_minutes.map(|m| m as i32))
        .bind(package.included_images.map(|n| n as i32))
        .bind(package.require_deposit)
        .bind(package.deposit_percent.map(|p| p.basis_points() as i32))
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_package", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, package_id = %package_id), err)]
    async fn get_package(
        &self,
        tenant_id: TenantId,
        package_id: PackageId,
    ) -> StoreResult<Option<Package>> {
        let row = sqlx::query(
            r#"
            SELECT id, tenant_id, name, price_cents, duration_minutes, included_images,
                   require_deposit, deposit_percent_bp
            FROM packages
            WHERE id = $1 AND tenant_id = $2
            "#,
        )
        .bind(*package_id.as_uuid())
        .bind(*tenant_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_package", e))?;

        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(Package {
            id: PackageId::from_uuid(col(&row, "id")?),
            tenant_id: TenantId::from_uuid(col(&row, "tenant_id")?),
            name: col(&row, "name")?,
            price: Money::from_cents(col(&row, "price_cents")?),
            duration_minutes: col::<Option<i32>>(&row, "duration_minutes")?.map(|m| m as u32),
            included_images: col::<Option<i32>>(&row, "included_images")?.map(|n| n as u32),
            require_deposit: col(&row, "require_deposit")?,
            deposit_percent: col::<Option<i32>>(&row, "deposit_percent_bp")?
                .map(|bp| Percent::from_basis_points(bp as u32)),
        }))
    }

    #[instrument(skip(self, profile), fields(tenant_id = %profile.tenant_id), err)]
    async fn upsert_studio_profile(&self, profile: StudioProfile) -> StoreResult<()> {
        let payment_details = serde_json::to_value(&profile.payment_details)
            .map_err(|e| StoreError::Backend(format!("encode payment details: {e}")))?;
        sqlx::query(
            r#"
            INSERT INTO studio_profiles (tenant_id, photographer_name, business_name, brand_color,
                logo_url, phone, email, website, signature_image, contract_template, currency,
                payment_details)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (tenant_id) DO UPDATE SET
                photographer_name = EXCLUDED.photographer_name,
                business_name = EXCLUDED.business_name,
                brand_color = EXCLUDED.brand_color,
                logo_url = EXCLUDED.logo_url,
                phone = EXCLUDED.phone,
                email = EXCLUDED.email,
                website = EXCLUDED.website,
                signature_image = EXCLUDED.signature_image,
                contract_template = EXCLUDED.contract_template,
                currency = EXCLUDED.currency,
                payment_details = EXCLUDED.payment_details
            "#,
        )
        .bind(*profile.tenant_id.as_uuid())
        .bind(&profile.photographer_name)
        .bind(profile.business_name.as_deref())
        .bind(profile.brand_color.as_deref())
        .bind(profile.logo_url.as_deref())
        .bind(profile.phone.as_deref())
        .bind(profile.email.as_deref())
        .bind(profile.website.as_deref())
        .bind(profile.signature_image.as_deref())
        .bind(profile.contract_template.as_deref())
        .bind(&profile.currency)
        .bind(payment_details)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("upsert_studio_profile", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn get_studio_profile(&self, tenant_id: TenantId) -> StoreResult<Option<StudioProfile>> {
        let row = sqlx::query(
            r#"
            SELECT tenant_id, photographer_name, business_name, brand_color, logo_url, phone,
                   email, website, signature_image, contract_template, currency, payment_details
            FROM studio_profiles
            WHERE tenant_id = $1
            "#,
        )
        .bind(*tenant_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_studio_profile", e))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let payment_details: PaymentDetails =
            serde_json::from_value(col(&row, "payment_details")?)
                .map_err(|e| StoreError::Backend(format!("decode payment details: {e}")))?;
        Ok(Some(StudioProfile {
            tenant_id: TenantId::from_uuid(col(&row, "tenant_id")?),
            photographer_name: col(&row, "photographer_name")?,
            business_name: col(&row, "business_name")?,
            brand_color: col(&row, "brand_color")?,
            logo_url: col(&row, "logo_url")?,
            phone: col(&row, "phone")?,
            email: col(&row, "email")?,
            website: col(&row, "website")?,
            signature_image: col(&row, "signature_image")?,
            contract_template: col(&row, "contract_template")?,
            currency: col(&row, "currency")?,
            payment_details,
        }))
    }
}

#[async_trait]
impl ClientStore for PostgresStudioStore {
    #[instrument(skip(self, email), fields(tenant_id = %tenant_id), err)]
    async fn find_client_by_email(
        &self,
        tenant_id: TenantId,
        email: &str,
    ) -> StoreResult<Option<Client>> {
        let row = sqlx::query(
            r#"
            SELECT id, tenant_id, first_name, last_name, email, phone, notes, tags, source, created_at
            FROM clients
            WHERE tenant_id = $1 AND email = $2
            "#,
        )
        .bind(*tenant_id.as_uuid())
        .bind(normalize_email(email))
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_client_by_email", e))?;
        row.as_ref().map(client_from_row).transpose()
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, client_id = %client_id), err)]
    async fn get_client(
        &self,
        tenant_id: TenantId,
        client_id: ClientId,
    ) -> StoreResult<Option<Client>> {
        let row = sqlx::query(
            r#"
            SELECT id, tenant_id, first_name, last_name, email, phone, notes, tags, source, created_at
            FROM clients
            WHERE id = $1 AND tenant_id = $2
            "#,
        )
        .bind(*client_id.as_uuid())
        .bind(*tenant_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_client", e))?;
        row.as_ref().map(client_from_row).transpose()
    }

    #[instrument(skip(self, client), fields(tenant_id = %client.tenant_id), err)]
    async fn insert_client(&self, client: Client) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO clients (id, tenant_id, first_name, last_name, email, phone, notes, tags,
                source, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(*client.id.as_uuid())
        .bind(*client.tenant_id.as_uuid())
        .bind(&client.first_name)
        .bind(client.last_name.as_deref())
        .bind(client.email.as_deref())
        .bind(client.phone.as_deref())
        .bind(client.notes.as_deref())
        .bind(&client.tags)
        .bind(client.source.map(|s| s.as_str()))
        .bind(client.created_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_client", e))?;
        Ok(())
    }
}

#[async_trait]
impl JobStore for PostgresStudioStore {
    /// The first increment for a tenant creates its counter just above the
    /// highest job number already stored, so jobs numbered before the row
    /// existed are never issued again.
    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn increment_job_counter(&self, tenant_id: TenantId) -> StoreResult<JobNumber> {
        let value: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO job_counters (tenant_id, counter)
            VALUES ($1, COALESCE((SELECT MAX(job_number) FROM jobs WHERE tenant_id = $1), 0) + 1)
            ON CONFLICT (tenant_id) DO UPDATE SET counter = job_counters.counter + 1
            RETURNING counter
            "#,
        )
        .bind(*tenant_id.as_uuid())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("increment_job_counter", e))?;

        JobNumber::new(value as u32).map_err(|e| StoreError::Backend(e.to_string()))
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn max_job_number(&self, tenant_id: TenantId) -> StoreResult<Option<JobNumber>> {
        let max: Option<i32> =
            sqlx::query_scalar("SELECT MAX(job_number) FROM jobs WHERE tenant_id = $1")
                .bind(*tenant_id.as_uuid())
                .fetch_one(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("max_job_number", e))?;
        max.map(|n| JobNumber::new(n as u32))
            .transpose()
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    #[instrument(skip(self, job), fields(tenant_id = %job.tenant_id, job_number = job.job_number.value()), err)]
    async fn insert_job(&self, job: Job) -> StoreResult<()> {
        sqlx::query(&format!(
            "INSERT INTO jobs ({JOB_COLUMNS}) VALUES \
             ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)"
        ))
        .bind(*job.id.as_uuid())
        .bind(*job.tenant_id.as_uuid())
        .bind(job.job_number.value() as i32)
        .bind(job.client_id.map(|id| *id.as_uuid()))
        .bind(job.lead_id.map(|id| *id.as_uuid()))
        .bind(job.booking_slot_id.map(|id| *id.as_uuid()))
        .bind(&job.title)
        .bind(job.job_type.as_deref())
        .bind(job.date)
        .bind(job.time)
        .bind(job.end_time)
        .bind(job.location.as_deref())
        .bind(job.package_id.map(|id| *id.as_uuid()))
        .bind(job.package_name.as_deref())
        .bind(job.package_amount.map(|m| m.cents()))
        .bind(job.included_images.map(|n| n as i32))
        .bind(job.status.as_str())
        .bind(job.notes.as_deref())
        .bind(job.created_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_job", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, job_id = %job_id), err)]
    async fn get_job(&self, tenant_id: TenantId, job_id: JobId) -> StoreResult<Option<Job>> {
        let row = sqlx::query(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1 AND tenant_id = $2"
        ))
        .bind(*job_id.as_uuid())
        .bind(*tenant_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_job", e))?;
        row.as_ref().map(job_from_row).transpose()
    }

    #[instrument(skip(self, job), fields(job_id = %job.id), err)]
    async fn update_job(&self, job: &Job) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE jobs SET status = $3, booking_slot_id = $4, client_id = $5, notes = $6
            WHERE id = $1 AND tenant_id = $2
            "#,
        )
        .bind(*job.id.as_uuid())
        .bind(*job.tenant_id.as_uuid())
        .bind(job.status.as_str())
        .bind(job.booking_slot_id.map(|id| *id.as_uuid()))
        .bind(job.client_id.map(|id| *id.as_uuid()))
        .bind(job.notes.as_deref())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_job", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("job {}", job.id)));
        }
        Ok(())
    }
}

#[async_trait]
impl InvoiceStore for PostgresStudioStore {
    #[instrument(skip(self, invoices), fields(count = invoices.len()), err)]
    async fn insert_invoices(&self, invoices: Vec<Invoice>) -> StoreResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        for invoice in &invoices {
            let line_items = serde_json::to_value(&invoice.line_items)
                .map_err(|e| StoreError::Backend(format!("encode line items: {e}")))?;
            sqlx::query(
                r#"
                INSERT INTO invoices (id, tenant_id, job_id, client_id, invoice_number, invoice_type,
                    status, amount_cents, tax_cents, total_cents, paid_amount_cents, currency,
                    due_date, line_items, notes, created_at, paid_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
                "#,
            )
            .bind(*invoice.id.as_uuid())
            .bind(*invoice.tenant_id.as_uuid())
            .bind(invoice.job_id.map(|id| *id.as_uuid()))
            .bind(invoice.client_id.map(|id| *id.as_uuid()))
            .bind(&invoice.invoice_number)
            .bind(invoice.invoice_type.as_str())
            .bind(invoice.status.as_str())
            .bind(invoice.amount.cents())
            .bind(invoice.tax.cents())
            .bind(invoice.total.cents())
            .bind(invoice.paid_amount.cents())
            .bind(&invoice.currency)
            .bind(invoice.due_date)
            .bind(line_items)
            .bind(invoice.notes.as_deref())
            .bind(invoice.created_at)
            .bind(invoice.paid_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_invoices", e))?;
        }
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, job_id = %job_id), err)]
    async fn list_invoices_for_job(
        &self,
        tenant_id: TenantId,
        job_id: JobId,
    ) -> StoreResult<Vec<Invoice>> {
        let rows = sqlx::query(
            r#"
            SELECT id, tenant_id, job_id, client_id, invoice_number, invoice_type, status,
                   amount_cents, tax_cents, total_cents, paid_amount_cents, currency, due_date,
                   line_items, notes, created_at, paid_at
            FROM invoices
            WHERE tenant_id = $1 AND job_id = $2
            ORDER BY invoice_number
            "#,
        )
        .bind(*tenant_id.as_uuid())
        .bind(*job_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_invoices_for_job", e))?;
        rows.iter().map(invoice_from_row).collect()
    }
}

#[async_trait]
impl ContractStore for PostgresStudioStore {
    #[instrument(skip(self, contract), fields(contract_id = %contract.id), err)]
    async fn insert_contract(&self, contract: Contract) -> StoreResult<()> {
        let signature_data = encode_signature(contract.signature_data.as_ref())?;
        sqlx::query(&format!(
            "INSERT INTO contracts ({CONTRACT_COLUMNS}) VALUES \
             ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)"
        ))
        .bind(*contract.id.as_uuid())
        .bind(*contract.tenant_id.as_uuid())
        .bind(contract.job_id.map(|id| *id.as_uuid()))
        .bind(contract.client_id.map(|id| *id.as_uuid()))
        .bind(&contract.content)
        .bind(contract.status.as_str())
        .bind(&contract.signing_token)
        .bind(contract.sent_at)
        .bind(contract.viewed_at)
        .bind(contract.expires_at)
        .bind(contract.signed_at)
        .bind(signature_data)
        .bind(contract.created_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_contract", e))?;
        Ok(())
    }

    #[instrument(skip(self, token), err)]
    async fn get_contract_by_token(&self, token: &str) -> StoreResult<Option<Contract>> {
        let row = sqlx::query(&format!(
            "SELECT {CONTRACT_COLUMNS} FROM contracts WHERE signing_token = $1"
        ))
        .bind(token)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_contract_by_token", e))?;
        row.as_ref().map(contract_from_row).transpose()
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, job_id = %job_id), err)]
    async fn contracts_for_job(
        &self,
        tenant_id: TenantId,
        job_id: JobId,
    ) -> StoreResult<Vec<Contract>> {
        let rows = sqlx::query(&format!(
            "SELECT {CONTRACT_COLUMNS} FROM contracts WHERE tenant_id = $1 AND job_id = $2"
        ))
        .bind(*tenant_id.as_uuid())
        .bind(*job_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("contracts_for_job", e))?;
        rows.iter().map(contract_from_row).collect()
    }

    #[instrument(skip(self, contract), fields(contract_id = %contract.id), err)]
    async fn update_contract(&self, contract: &Contract) -> StoreResult<()> {
        let signature_data = encode_signature(contract.signature_data.as_ref())?;
        let result = sqlx::query(
            r#"
            UPDATE contracts
            SET status = $2, viewed_at = $3, signed_at = $4, signature_data = $5
            WHERE id = $1
            "#,
        )
        .bind(*contract.id.as_uuid())
        .bind(contract.status.as_str())
        .bind(contract.viewed_at)
        .bind(contract.signed_at)
        .bind(signature_data)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_contract", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("contract {}", contract.id)));
        }
        Ok(())
    }
}

#[async_trait]
impl LeadStore for PostgresStudioStore {
    #[instrument(skip(self, lead), fields(lead_id = %lead.id), err)]
    async fn insert_lead(&self, lead: Lead) -> StoreResult<()> {
        sqlx::query(&format!(
            "INSERT INTO leads ({LEAD_COLUMNS}) VALUES \
             ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)"
        ))
        .bind(*lead.id.as_uuid())
        .bind(*lead.tenant_id.as_uuid())
        .bind(lead.client_id.map(|id| *id.as_uuid()))
        .bind(lead.job_type.as_deref())
        .bind(lead.preferred_date)
        .bind(lead.location.as_deref())
        .bind(lead.source.as_deref())
        .bind(lead.status.as_str())
        .bind(lead.notes.as_deref())
        .bind(lead.quoted_package_id.map(|id| *id.as_uuid()))
        .bind(lead.quoted_amount.map(|m| m.cents()))
        .bind(lead.quote_token.as_deref())
        .bind(lead.quote_accepted_at)
        .bind(lead.created_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_lead", e))?;
        Ok(())
    }

    #[instrument(skip(self, token), err)]
    async fn get_lead_by_token(&self, token: &str) -> StoreResult<Option<Lead>> {
        let row = sqlx::query(&format!(
            "SELECT {LEAD_COLUMNS} FROM leads WHERE quote_token = $1"
        ))
        .bind(token)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_lead_by_token", e))?;
        row.as_ref().map(lead_from_row).transpose()
    }

    #[instrument(skip(self), fields(lead_id = %lead_id), err)]
    async fn accept_lead(&self, lead_id: LeadId, at: DateTime<Utc>) -> StoreResult<Option<Lead>> {
        let row = sqlx::query(&format!(
            "UPDATE leads SET status = 'booked', quote_accepted_at = $2 \
             WHERE id = $1 AND status NOT IN ('booked', 'lost') RETURNING {LEAD_COLUMNS}"
        ))
        .bind(*lead_id.as_uuid())
        .bind(at)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("accept_lead", e))?;
        row.as_ref().map(lead_from_row).transpose()
    }
}

fn col<'r, T>(row: &'r PgRow, name: &str) -> StoreResult<T>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(name).map_err(|e| map_sqlx_error(name, e))
}

fn parse<T>(raw: String) -> StoreResult<T>
where
    T: FromStr<Err = DomainError>,
{
    raw.parse()
        .map_err(|e: DomainError| StoreError::Backend(format!("corrupt column value: {e}")))
}

fn encode_signature(data: Option<&SignatureData>) -> StoreResult<Option<serde_json::Value>> {
    data.map(serde_json::to_value)
        .transpose()
        .map_err(|e| StoreError::Backend(format!("encode signature data: {e}")))
}

fn slot_from_row(row: &PgRow) -> StoreResult<BookingSlot> {
    Ok(BookingSlot {
        id: SlotId::from_uuid(col(row, "id")?),
        tenant_id: TenantId::from_uuid(col(row, "tenant_id")?),
        event_id: BookingEventId::from_uuid(col(row, "event_id")?),
        date: col(row, "date")?,
        start_time: col(row, "start_time")?,
        end_time: col(row, "end_time")?,
        status: parse(col(row, "status")?)?,
        client_id: col::<Option<Uuid>>(row, "client_id")?.map(ClientId::from_uuid),
        job_id: col::<Option<Uuid>>(row, "job_id")?.map(JobId::from_uuid),
        booked_name: col(row, "booked_name")?,
        booked_email: col(row, "booked_email")?,
        booked_phone: col(row, "booked_phone")?,
        booked_at: col(row, "booked_at")?,
        created_at: col(row, "created_at")?,
    })
}

fn client_from_row(row: &PgRow) -> StoreResult<Client> {
    Ok(Client {
        id: ClientId::from_uuid(col(row, "id")?),
        tenant_id: TenantId::from_uuid(col(row, "tenant_id")?),
        first_name: col(row, "first_name")?,
        last_name: col(row, "last_name")?,
        email: col(row, "email")?,
        phone: col(row, "phone")?,
        notes: col(row, "notes")?,
        tags: col(row, "tags")?,
        source: col::<Option<String>>(row, "source")?
            .map(parse)
            .transpose()?,
        created_at: col(row, "created_at")?,
    })
}

fn job_from_row(row: &PgRow) -> StoreResult<Job> {
    let number: i32 = col(row, "job_number")?;
    Ok(Job {
        id: JobId::from_uuid(col(row, "id")?),
        tenant_id: TenantId::from_uuid(col(row, "tenant_id")?),
        job_number: JobNumber::new(number as u32).map_err(|e| StoreError::Backend(e.to_string()))?,
        client_id: col::<Option<Uuid>>(row, "client_id")?.map(ClientId::from_uuid),
        lead_id: col::<Option<Uuid>>(row, "lead_id")?.map(LeadId::from_uuid),
        booking_slot_id: col::<Option<Uuid>>(row, "booking_slot_id")?.map(SlotId::from_uuid),
        title: col(row, "title")?,
        job_type: col(row, "job_type")?,
        date: col(row, "date")?,
        time: col(row, "time")?,
        end_time: col(row, "end_time")?,
        location: col(row, "location")?,
        package_id: col::<Option<Uuid>>(row, "package_id")?.map(PackageId::from_uuid),
        package_name: col(row, "package_name")?,
        package_amount: col::<Option<i64>>(row, "package_amount_cents")?.map(Money::from_cents),
        included_images: col::<Option<i32>>(row, "included_images")?.map(|n| n as u32),
        status: parse(col(row, "status")?)?,
        notes: col(row, "notes")?,
        created_at: col(row, "created_at")?,
    })
}

fn invoice_from_row(row: &PgRow) -> StoreResult<Invoice> {
    let line_items: Vec<LineItem> = serde_json::from_value(col(row, "line_items")?)
        .map_err(|e| StoreError::Backend(format!("decode line items: {e}")))?;
    Ok(Invoice {
        id: InvoiceId::from_uuid(col(row, "id")?),
        tenant_id: TenantId::from_uuid(col(row, "tenant_id")?),
        job_id: col::<Option<Uuid>>(row, "job_id")?.map(JobId::from_uuid),
        client_id: col::<Option<Uuid>>(row, "client_id")?.map(ClientId::from_uuid),
        invoice_number: col(row, "invoice_number")?,
        invoice_type: parse(col(row, "invoice_type")?)?,
        status: parse(col(row, "status")?)?,
        amount: Money::from_cents(col(row, "amount_cents")?),
        tax: Money::from_cents(col(row, "tax_cents")?),
        total: Money::from_cents(col(row, "total_cents")?),
        paid_amount: Money::from_cents(col(row, "paid_amount_cents")?),
        currency: col(row, "currency")?,
        due_date: col(row, "due_date")?,
        line_items,
        notes: col(row, "notes")?,
        created_at: col(row, "created_at")?,
        paid_at: col(row, "paid_at")?,
    })
}

fn contract_from_row(row: &PgRow) -> StoreResult<Contract> {
    let signature_data = col::<Option<serde_json::Value>>(row, "signature_data")?
        .map(serde_json::from_value::<SignatureData>)
        .transpose()
        .map_err(|e| StoreError::Backend(format!("decode signature data: {e}")))?;
    Ok(Contract {
        id: ContractId::from_uuid(col(row, "id")?),
        tenant_id: TenantId::from_uuid(col(row, "tenant_id")?),
        job_id: col::<Option<Uuid>>(row, "job_id")?.map(JobId::from_uuid),
        client_id: col::<Option<Uuid>>(row, "client_id")?.map(ClientId::from_uuid),
        content: col(row, "content")?,
        status: parse(col(row, "status")?)?,
        signing_token: col(row, "signing_token")?,
        sent_at: col(row, "sent_at")?,
        viewed_at: col(row, "viewed_at")?,
        expires_at: col(row, "expires_at")?,
        signed_at: col(row, "signed_at")?,
        signature_data,
        created_at: col(row, "created_at")?,
    })
}

fn lead_from_row(row: &PgRow) -> StoreResult<Lead> {
    Ok(Lead {
        id: LeadId::from_uuid(col(row, "id")?),
        tenant_id: TenantId::from_uuid(col(row, "tenant_id")?),
        client_id: col::<Option<Uuid>>(row, "client_id")?.map(ClientId::from_uuid),
        job_type: col(row, "job_type")?,
        preferred_date: col(row, "preferred_date")?,
        location: col(row, "location")?,
        source: col(row, "source")?,
        status: parse(col(row, "status")?)?,
        notes: col(row, "notes")?,
        quoted_package_id: col::<Option<Uuid>>(row, "quoted_package_id")?
            .map(PackageId::from_uuid),
        quoted_amount: col::<Option<i64>>(row, "quoted_amount_cents")?.map(Money::from_cents),
        quote_token: col(row, "quote_token")?,
        quote_accepted_at: col(row, "quote_accepted_at")?,
        created_at: col(row, "created_at")?,
    })
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::UniqueViolation(msg),
                // undefined function / undefined table
                Some("42883") | Some("42P01") => StoreError::Unavailable(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut => {
            StoreError::Unavailable(format!("connection pool unavailable in {operation}"))
        }
        sqlx::Error::RowNotFound => {
            StoreError::NotFound(format!("unexpected row not found in {operation}"))
        }
        other => StoreError::Backend(format!("sqlx error in {operation}: {other}")),
    }
}

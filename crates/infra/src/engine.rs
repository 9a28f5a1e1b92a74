//! The inventory engine: single owner of the live shop state.
//!
//! Every mutation is serialized through one write guard. It runs the domain
//! operation on a working copy, commits that copy to the store, and only then
//! publishes it. A domain error or a failed commit drops the copy, so callers
//! never observe a partial change. Reads share the read guard.

use chrono::Utc;
use thiserror::Error;
use tokio::sync::{RwLock, RwLockReadGuard};
use tracing::{debug, error, info, instrument, warn};

use filaforge_core::{
    DomainError, DomainResult, EngineConfig, FilamentId, JobId, LotId, MachineId, OrderId,
};
use filaforge_inventory::{Allocation, FilamentTotals, NewFilament, NewLot, Reservation, ReservationItem, ReserveOutcome};
use filaforge_planning::{AtpResult, FilamentView, ShopState, Snapshot, calculate_atp};
use filaforge_production::{Direction, MachinePatch, NewJob, NewMachine};

use crate::store::{ShopChanges, ShopStore, StoreError};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EngineError {
    /// Stable machine-readable code, shared with [`DomainError::code`].
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::Domain(e) => e.code(),
            EngineError::Store(_) => "store_error",
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

pub struct InventoryEngine<S> {
    store: S,
    config: EngineConfig,
    state: RwLock<ShopState>,
}

impl<S> InventoryEngine<S>
where
    S: ShopStore,
{
    /// Load the last committed state from `store` and take ownership of it.
    #[instrument(skip(store, config), err)]
    pub async fn open(store: S, config: EngineConfig) -> EngineResult<Self> {
        let state = store.load().await?;
        info!(
            filaments = state.ledger.filaments().len(),
            machines = state.fleet.machines().len(),
            "shop state loaded"
        );
        Ok(Self {
            store,
            config,
            state: RwLock::new(state),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Apply `op` to a working copy and publish it once it is committed.
    ///
    /// Returns the operation's output together with a read guard on the
    /// published state, so callers can build their response from exactly the
    /// state they produced.
    async fn apply<T, F>(
        &self,
        operation: &'static str,
        op: F,
    ) -> EngineResult<(T, RwLockReadGuard<'_, ShopState>)>
    where
        F: FnOnce(&mut ShopState, &EngineConfig) -> DomainResult<T>,
    {
        let mut guard = self.state.write().await;
        let mut next = guard.clone();
        let out = op(&mut next, &self.config).map_err(|e| {
            debug!(operation, error = %e, "operation rejected");
            e
        })?;

        let changes = ShopChanges::between(&guard, &next);
        if changes.is_empty() {
            debug!(operation, "state unchanged, commit skipped");
        } else {
            if let Err(e) = self.store.commit(&next, changes).await {
                error!(operation, error = %e, "commit failed, change discarded");
                return Err(e.into());
            }
            *guard = next;
        }
        Ok((out, guard.downgrade()))
    }

    fn snapshot_of(&self, state: &ShopState) -> Snapshot {
        Snapshot::assemble(state, &self.config)
    }

    // Reads

    #[instrument(skip(self))]
    pub async fn snapshot(&self) -> Snapshot {
        let state = self.state.read().await;
        self.snapshot_of(&state)
    }

    #[instrument(skip(self), fields(filament_id = %id))]
    pub async fn totals(&self, id: &FilamentId) -> EngineResult<FilamentTotals> {
        Ok(self.state.read().await.ledger.totals(id)?)
    }

    #[instrument(skip(self), fields(filament_id = %id))]
    pub async fn filament(&self, id: &FilamentId) -> EngineResult<FilamentView> {
        let state = self.state.read().await;
        Ok(FilamentView::from(state.ledger.filament(id)?))
    }

    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn reservation(&self, order_id: &OrderId) -> EngineResult<Reservation> {
        self.state
            .read()
            .await
            .ledger
            .reservation(order_id)
            .cloned()
            .ok_or_else(|| DomainError::not_found(format!("reservation {order_id}")).into())
    }

    #[instrument(skip(self))]
    pub async fn calculate_atp(&self, sku: &str) -> EngineResult<AtpResult> {
        let state = self.state.read().await;
        Ok(calculate_atp(&state, sku)?)
    }

    // Filaments

    #[instrument(skip(self, payload), fields(sku = %payload.sku))]
    pub async fn create_filament(&self, payload: &NewFilament) -> EngineResult<FilamentView> {
        let now = Utc::now();
        let (id, state) = self
            .apply("create_filament", |s, config| {
                s.ledger
                    .create_filament(payload, config, now)
                    .map(|f| f.id.clone())
            })
            .await?;
        info!(filament_id = %id, "filament created");
        Ok(FilamentView::from(state.ledger.filament(&id)?))
    }

    #[instrument(skip(self), fields(filament_id = %id))]
    pub async fn adjust_filament_grams(&self, id: &FilamentId, delta: f64) -> EngineResult<Snapshot> {
        let now = Utc::now();
        let ((), state) = self
            .apply("adjust_filament_grams", |s, _| s.ledger.adjust_grams(id, delta, now))
            .await?;
        info!(delta, "filament grams adjusted");
        Ok(self.snapshot_of(&state))
    }

    #[instrument(skip(self), fields(filament_id = %id))]
    pub async fn update_reorder_point(&self, id: &FilamentId, grams: f64) -> EngineResult<Snapshot> {
        let ((), state) = self
            .apply("update_reorder_point", |s, _| s.ledger.update_reorder_point(id, grams))
            .await?;
        info!(grams, "reorder point updated");
        Ok(self.snapshot_of(&state))
    }

    #[instrument(skip(self, lot), fields(filament_id = %id, grams = lot.grams))]
    pub async fn receive_lot(&self, id: &FilamentId, lot: &NewLot) -> EngineResult<Snapshot> {
        let lot_id = lot.id.as_deref().map(LotId::parse).transpose()?;
        let received_at = lot.received_at.unwrap_or_else(Utc::now);
        let (lot_id, state) = self
            .apply("receive_lot", |s, _| {
                s.ledger.receive_lot(id, lot_id, lot.grams, received_at)
            })
            .await?;
        info!(lot_id = %lot_id, "lot received");
        Ok(self.snapshot_of(&state))
    }

    // Machines

    #[instrument(skip(self, payload), fields(name = %payload.name))]
    pub async fn add_machine(&self, payload: &NewMachine) -> EngineResult<Snapshot> {
        let (id, state) = self
            .apply("add_machine", |s, config| {
                s.fleet.add(payload, config).map(|m| m.id.clone())
            })
            .await?;
        info!(machine_id = %id, "machine added");
        Ok(self.snapshot_of(&state))
    }

    #[instrument(skip(self, patch), fields(machine_id = %id))]
    pub async fn update_machine(&self, id: &MachineId, patch: &MachinePatch) -> EngineResult<Snapshot> {
        let ((), state) = self
            .apply("update_machine", |s, _| s.fleet.update(id, patch))
            .await?;
        info!("machine updated");
        Ok(self.snapshot_of(&state))
    }

    #[instrument(skip(self), fields(machine_id = %id))]
    pub async fn remove_machine(&self, id: &MachineId) -> EngineResult<Snapshot> {
        let (removed, state) = self
            .apply("remove_machine", |s, _| s.fleet.remove(id))
            .await?;
        if !removed.queue.is_empty() {
            warn!(dropped_jobs = removed.queue.len(), "machine removed with queued jobs");
        }
        info!("machine removed");
        Ok(self.snapshot_of(&state))
    }

    #[instrument(skip(self), fields(machine_id = %id))]
    pub async fn complete_maintenance(&self, id: &MachineId) -> EngineResult<Snapshot> {
        let now = Utc::now();
        let ((), state) = self
            .apply("complete_maintenance", |s, _| s.fleet.complete_maintenance(id, now))
            .await?;
        info!("maintenance completed");
        Ok(self.snapshot_of(&state))
    }

    #[instrument(skip(self), fields(machine_id = %id))]
    pub async fn record_machine_hours(&self, id: &MachineId, hours: f64) -> EngineResult<Snapshot> {
        let ((), state) = self
            .apply("record_machine_hours", |s, _| s.fleet.record_hours(id, hours))
            .await?;
        info!(hours, "machine hours recorded");
        Ok(self.snapshot_of(&state))
    }

    // Queues

    #[instrument(skip(self, job), fields(machine_id = %id, sku = %job.sku, qty = job.qty))]
    pub async fn enqueue_job(&self, id: &MachineId, job: &NewJob) -> EngineResult<Snapshot> {
        let (job_id, state) = self
            .apply("enqueue_job", |s, config| s.fleet.enqueue(id, job, config))
            .await?;
        info!(job_id = %job_id, "job enqueued");
        Ok(self.snapshot_of(&state))
    }

    #[instrument(skip(self), fields(machine_id = %id, job_id = %job_id))]
    pub async fn remove_job(&self, id: &MachineId, job_id: &JobId) -> EngineResult<Snapshot> {
        let (_, state) = self
            .apply("remove_job", |s, _| s.fleet.remove_job(id, job_id))
            .await?;
        info!("job removed");
        Ok(self.snapshot_of(&state))
    }

    #[instrument(skip(self), fields(machine_id = %id, job_id = %job_id))]
    pub async fn move_job(
        &self,
        id: &MachineId,
        job_id: &JobId,
        direction: Direction,
    ) -> EngineResult<Snapshot> {
        let (moved, state) = self
            .apply("move_job", |s, _| s.fleet.move_job(id, job_id, direction))
            .await?;
        if moved {
            info!(?direction, "job moved");
        } else {
            debug!(?direction, "job already at queue boundary");
        }
        Ok(self.snapshot_of(&state))
    }

    #[instrument(skip(self), fields(machine_id = %id, job_id = %job_id))]
    pub async fn set_job_position(
        &self,
        id: &MachineId,
        job_id: &JobId,
        position: i64,
    ) -> EngineResult<Snapshot> {
        let (moved, state) = self
            .apply("set_job_position", |s, _| {
                s.fleet.set_job_position(id, job_id, position)
            })
            .await?;
        if moved {
            info!(position, "job repositioned");
        }
        Ok(self.snapshot_of(&state))
    }

    // Reservations

    #[instrument(skip(self, items), fields(order_id = %order_id, items = items.len()))]
    pub async fn reserve(
        &self,
        order_id: &OrderId,
        items: &[ReservationItem],
    ) -> EngineResult<Vec<Allocation>> {
        let now = Utc::now();
        let (outcome, _state) = self
            .apply("reserve", |s, _| s.ledger.reserve(order_id, items, now))
            .await?;

        match &outcome {
            ReserveOutcome::Created(r) => {
                info!(grams = r.total_grams(), lots = r.allocations.len(), "reservation created")
            }
            ReserveOutcome::Existing { differs: false, .. } => {
                debug!("reservation already exists, returning it")
            }
            ReserveOutcome::Existing {
                reservation,
                differs: true,
            } => warn!(
                held_grams = reservation.total_grams(),
                "repeat reservation asked for a different amount; keeping the original"
            ),
        }
        Ok(outcome.into_reservation().allocations)
    }

    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn consume(&self, order_id: &OrderId) -> EngineResult<Snapshot> {
        let (consumed, state) = self
            .apply("consume", |s, _| Ok(s.ledger.consume(order_id)))
            .await?;
        match consumed {
            Some(r) => info!(grams = r.total_grams(), "reservation consumed"),
            None => debug!("no reservation to consume"),
        }
        Ok(self.snapshot_of(&state))
    }

    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn release(&self, order_id: &OrderId) -> EngineResult<Snapshot> {
        let (released, state) = self
            .apply("release", |s, _| Ok(s.ledger.release(order_id)))
            .await?;
        match released {
            Some(r) => info!(grams = r.total_grams(), "reservation released"),
            None => debug!("no reservation to release"),
        }
        Ok(self.snapshot_of(&state))
    }
}

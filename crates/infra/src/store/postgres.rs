//! Postgres-backed shop store.
//!
//! The shop state is normalized into six tables: three for the ledger and three
//! for the fleet. `commit` rewrites the tables of each changed half inside one
//! transaction, so readers of the database never see a half-applied state. Row order (filaments, machines, lots, materials, jobs, allocations) is
//! kept in explicit `position` columns because Postgres does not preserve
//! insertion order.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{Span, instrument};

use filaforge_core::{FilamentId, JobId, LotId, MachineId, OrderId};
use filaforge_inventory::{Allocation, Filament, Ledger, Lot, Reservation};
use filaforge_planning::ShopState;
use filaforge_production::{Fleet, Job, JobQueue, Machine, MachineStatus};

use super::{ShopChanges, ShopStore, StoreError};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS filaments (
        id                      TEXT PRIMARY KEY,
        position                INTEGER NOT NULL,
        sku                     TEXT NOT NULL UNIQUE,
        material                TEXT NOT NULL,
        color                   TEXT NOT NULL,
        diameter                DOUBLE PRECISION NOT NULL,
        grams_per_unit          DOUBLE PRECISION NOT NULL CHECK (grams_per_unit > 0),
        est_print_min_per_unit  DOUBLE PRECISION NOT NULL CHECK (est_print_min_per_unit > 0),
        reorder_point_grams     DOUBLE PRECISION NOT NULL CHECK (reorder_point_grams >= 0)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS lots (
        filament_id  TEXT NOT NULL REFERENCES filaments (id) ON DELETE CASCADE,
        id           TEXT NOT NULL,
        position     INTEGER NOT NULL,
        grams        DOUBLE PRECISION NOT NULL CHECK (grams >= 0),
        reserved     DOUBLE PRECISION NOT NULL CHECK (reserved >= 0),
        received_at  TIMESTAMPTZ NOT NULL,
        PRIMARY KEY (filament_id, id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS machines (
        id                       TEXT PRIMARY KEY,
        position                 INTEGER NOT NULL,
        name                     TEXT NOT NULL,
        model                    TEXT NOT NULL,
        status                   TEXT NOT NULL,
        nozzle                   TEXT NOT NULL,
        avg_speed_factor         DOUBLE PRECISION NOT NULL CHECK (avg_speed_factor > 0),
        maintenance_every_hours  DOUBLE PRECISION NOT NULL CHECK (maintenance_every_hours > 0),
        maintenance_hours_used   DOUBLE PRECISION NOT NULL CHECK (maintenance_hours_used >= 0),
        last_maintenance_at      TIMESTAMPTZ
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS machine_materials (
        machine_id  TEXT NOT NULL REFERENCES machines (id) ON DELETE CASCADE,
        position    INTEGER NOT NULL,
        material    TEXT NOT NULL,
        PRIMARY KEY (machine_id, position)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS jobs (
        machine_id            TEXT NOT NULL REFERENCES machines (id) ON DELETE CASCADE,
        id                    TEXT NOT NULL,
        position              INTEGER NOT NULL,
        sku                   TEXT NOT NULL,
        qty                   BIGINT NOT NULL CHECK (qty > 0),
        est_minutes_per_unit  DOUBLE PRECISION NOT NULL,
        remaining_minutes     DOUBLE PRECISION,
        PRIMARY KEY (machine_id, id),
        UNIQUE (machine_id, position)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS reservations (
        order_id     TEXT NOT NULL,
        filament_id  TEXT NOT NULL,
        lot_id       TEXT NOT NULL,
        position     INTEGER NOT NULL,
        grams        DOUBLE PRECISION NOT NULL CHECK (grams > 0),
        created_at   TIMESTAMPTZ NOT NULL,
        UNIQUE (order_id, filament_id, lot_id)
    )
    "#,
];

#[derive(Debug, Clone)]
pub struct PostgresShopStore {
    pool: Arc<PgPool>,
}

impl PostgresShopStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Create the schema if it does not exist yet. Safe to run on every start.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("migrate", e))?;
        }
        Ok(())
    }

    async fn load_filaments(&self) -> Result<Vec<Filament>, StoreError> {
        let lot_rows = sqlx::query(
            r#"
            SELECT filament_id, id, grams, reserved, received_at
            FROM lots
            ORDER BY filament_id, position
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_lots", e))?;

        let mut lots: HashMap<String, Vec<Lot>> = HashMap::new();
        for row in lot_rows {
            let filament_id: String = get(&row, "filament_id")?;
            lots.entry(filament_id).or_default().push(Lot {
                id: LotId::from(get::<String>(&row, "id")?.as_str()),
                grams: get(&row, "grams")?,
                reserved: get(&row, "reserved")?,
                received_at: get(&row, "received_at")?,
            });
        }

        let rows = sqlx::query(
            r#"
            SELECT id, sku, material, color, diameter, grams_per_unit,
                   est_print_min_per_unit, reorder_point_grams
            FROM filaments
            ORDER BY position
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_filaments", e))?;

        rows.iter()
            .map(|row| {
                let id: String = get(row, "id")?;
                Ok(Filament {
                    lots: lots.remove(&id).unwrap_or_default(),
                    id: FilamentId::from(id.as_str()),
                    sku: get(row, "sku")?,
                    material: get(row, "material")?,
                    color: get(row, "color")?,
                    diameter: get(row, "diameter")?,
                    grams_per_unit: get(row, "grams_per_unit")?,
                    est_print_min_per_unit: get(row, "est_print_min_per_unit")?,
                    reorder_point_grams: get(row, "reorder_point_grams")?,
                })
            })
            .collect()
    }

    async fn load_reservations(&self) -> Result<Vec<Reservation>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT order_id, filament_id, lot_id, grams, created_at
            FROM reservations
            ORDER BY order_id, position
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_reservations", e))?;

        let mut out: Vec<Reservation> = Vec::new();
        for row in rows {
            let order_id = OrderId::from(get::<String>(&row, "order_id")?.as_str());
            let allocation = Allocation {
                filament_id: FilamentId::from(get::<String>(&row, "filament_id")?.as_str()),
                lot_id: LotId::from(get::<String>(&row, "lot_id")?.as_str()),
                grams: get(&row, "grams")?,
            };
            match out.last_mut() {
                Some(last) if last.order_id == order_id => last.allocations.push(allocation),
                _ => out.push(Reservation {
                    order_id,
                    allocations: vec![allocation],
                    created_at: get::<DateTime<Utc>>(&row, "created_at")?,
                }),
            }
        }
        Ok(out)
    }

    async fn load_machines(&self) -> Result<Vec<Machine>, StoreError> {
        let material_rows = sqlx::query(
            "SELECT machine_id, material FROM machine_materials ORDER BY machine_id, position",
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_machine_materials", e))?;

        let mut materials: HashMap<String, Vec<String>> = HashMap::new();
        for row in material_rows {
            materials
                .entry(get(&row, "machine_id")?)
                .or_default()
                .push(get(&row, "material")?);
        }

        let job_rows = sqlx::query(
            r#"
            SELECT machine_id, id, sku, qty, est_minutes_per_unit, remaining_minutes
            FROM jobs
            ORDER BY machine_id, position
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_jobs", e))?;

        let mut jobs: HashMap<String, Vec<Job>> = HashMap::new();
        for row in job_rows {
            let qty: i64 = get(&row, "qty")?;
            let job = Job {
                id: JobId::from(get::<String>(&row, "id")?.as_str()),
                sku: get(&row, "sku")?,
                qty: u32::try_from(qty)
                    .map_err(|_| StoreError::Corrupt(format!("job qty {qty} out of range")))?,
                est_minutes_per_unit: get(&row, "est_minutes_per_unit")?,
                remaining_minutes: get(&row, "remaining_minutes")?,
            };
            jobs.entry(get(&row, "machine_id")?).or_default().push(job);
        }

        let rows = sqlx::query(
            r#"
            SELECT id, name, model, status, nozzle, avg_speed_factor,
                   maintenance_every_hours, maintenance_hours_used, last_maintenance_at
            FROM machines
            ORDER BY position
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_machines", e))?;

        rows.iter()
            .map(|row| {
                let id: String = get(row, "id")?;
                let status: String = get(row, "status")?;
                Ok(Machine {
                    status: status
                        .parse::<MachineStatus>()
                        .map_err(|e| StoreError::Corrupt(e.to_string()))?,
                    compatible_materials: materials.remove(&id).unwrap_or_default(),
                    queue: JobQueue::from(jobs.remove(&id).unwrap_or_default()),
                    id: MachineId::from(id.as_str()),
                    name: get(row, "name")?,
                    model: get(row, "model")?,
                    nozzle: get(row, "nozzle")?,
                    avg_speed_factor: get(row, "avg_speed_factor")?,
                    maintenance_every_hours: get(row, "maintenance_every_hours")?,
                    maintenance_hours_used: get(row, "maintenance_hours_used")?,
                    last_maintenance_at: get(row, "last_maintenance_at")?,
                })
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl ShopStore for PostgresShopStore {
    #[instrument(
        skip(self),
        fields(filaments = tracing::field::Empty, machines = tracing::field::Empty),
        err
    )]
    async fn load(&self) -> Result<ShopState, StoreError> {
        let filaments = self.load_filaments().await?;
        let reservations = self.load_reservations().await?;
        let machines = self.load_machines().await?;

        let span = Span::current();
        span.record("filaments", filaments.len());
        span.record("machines", machines.len());

        Ok(ShopState::new(
            Ledger::from_parts(filaments, reservations),
            Fleet::from_machines(machines),
        ))
    }

    #[instrument(
        skip(self, state, changes),
        fields(
            filaments = state.ledger.filaments().len(),
            machines = state.fleet.machines().len(),
            ledger = changes.ledger,
            fleet = changes.fleet
        ),
        err
    )]
    async fn commit(&self, state: &ShopState, changes: ShopChanges) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        // Each changed half is replaced wholesale; the other keeps its rows.
        if changes.ledger {
            clear_tables(&mut tx, LEDGER_TABLES).await?;
            write_ledger(&mut tx, &state.ledger).await?;
        }
        if changes.fleet {
            clear_tables(&mut tx, FLEET_TABLES).await?;
            write_fleet(&mut tx, &state.fleet).await?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }
}

/// Ledger tables, children first (reservations carry no FK).
const LEDGER_TABLES: &[&str] = &["reservations", "lots", "filaments"];

/// Fleet tables, children first.
const FLEET_TABLES: &[&str] = &["jobs", "machine_materials", "machines"];

async fn clear_tables(tx: &mut Transaction<'_, Postgres>, tables: &[&str]) -> Result<(), StoreError> {
    for table in tables {
        sqlx::query(&format!("DELETE FROM {table}"))
            .execute(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("clear_tables", e))?;
    }
    Ok(())
}

async fn write_ledger(tx: &mut Transaction<'_, Postgres>, ledger: &Ledger) -> Result<(), StoreError> {
    for (position, f) in ledger.filaments().iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO filaments (
                id, position, sku, material, color, diameter,
                grams_per_unit, est_print_min_per_unit, reorder_point_grams
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(f.id.as_str())
        .bind(to_position(position)?)
        .bind(&f.sku)
        .bind(&f.material)
        .bind(&f.color)
        .bind(f.diameter)
        .bind(f.grams_per_unit)
        .bind(f.est_print_min_per_unit)
        .bind(f.reorder_point_grams)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("insert_filament", e))?;

        for (position, lot) in f.lots.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO lots (filament_id, id, position, grams, reserved, received_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(f.id.as_str())
            .bind(lot.id.as_str())
            .bind(to_position(position)?)
            .bind(lot.grams)
            .bind(lot.reserved)
            .bind(lot.received_at)
            .execute(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("insert_lot", e))?;
        }
    }

    for reservation in ledger.reservations() {
        for (position, a) in reservation.allocations.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO reservations (order_id, filament_id, lot_id, position, grams, created_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(reservation.order_id.as_str())
            .bind(a.filament_id.as_str())
            .bind(a.lot_id.as_str())
            .bind(to_position(position)?)
            .bind(a.grams)
            .bind(reservation.created_at)
            .execute(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("insert_reservation", e))?;
        }
    }
    Ok(())
}

async fn write_fleet(tx: &mut Transaction<'_, Postgres>, fleet: &Fleet) -> Result<(), StoreError> {
    for (position, m) in fleet.machines().iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO machines (
                id, position, name, model, status, nozzle, avg_speed_factor,
                maintenance_every_hours, maintenance_hours_used, last_maintenance_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(m.id.as_str())
        .bind(to_position(position)?)
        .bind(&m.name)
        .bind(&m.model)
        .bind(m.status.as_str())
        .bind(&m.nozzle)
        .bind(m.avg_speed_factor)
        .bind(m.maintenance_every_hours)
        .bind(m.maintenance_hours_used)
        .bind(m.last_maintenance_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("insert_machine", e))?;

        for (position, material) in m.compatible_materials.iter().enumerate() {
            sqlx::query(
                "INSERT INTO machine_materials (machine_id, position, material) VALUES ($1, $2, $3)",
            )
            .bind(m.id.as_str())
            .bind(to_position(position)?)
            .bind(material)
            .execute(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("insert_machine_material", e))?;
        }

        for (position, job) in m.queue.jobs().iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO jobs (
                    machine_id, id, position, sku, qty, est_minutes_per_unit, remaining_minutes
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(m.id.as_str())
            .bind(job.id.as_str())
            .bind(to_position(position)?)
            .bind(&job.sku)
            .bind(i64::from(job.qty))
            .bind(job.est_minutes_per_unit)
            .bind(job.remaining_minutes)
            .execute(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("insert_job", e))?;
        }
    }
    Ok(())
}

fn to_position(index: usize) -> Result<i32, StoreError> {
    i32::try_from(index).map_err(|_| StoreError::Corrupt(format!("position {index} out of range")))
}

fn get<'r, T>(row: &'r sqlx::postgres::PgRow, column: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(column)
        .map_err(|e| StoreError::Corrupt(format!("column {column}: {e}")))
}

fn map_sqlx_error(operation: &'static str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let code = db_err.code().map(|c| c.into_owned()).unwrap_or_default();
            StoreError::backend(operation, format!("{} (sqlstate {code})", db_err.message()))
        }
        sqlx::Error::PoolClosed => StoreError::backend(operation, "connection pool closed"),
        other => StoreError::backend(operation, other.to_string()),
    }
}

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use chrono::{Duration, TimeZone, Utc};
use filaforge_core::{FilamentId, LotId, MachineId, OrderId};
use filaforge_inventory::{Filament, Ledger, Lot, ReservationItem};
use filaforge_planning::{ShopState, Snapshot, calculate_atp};
use filaforge_production::{Fleet, Job, JobQueue, Machine, MachineStatus};

fn filament(idx: usize, lots: usize) -> Filament {
    let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    Filament {
        id: FilamentId::from(format!("fil-{idx}").as_str()),
        sku: format!("SKU-{idx}"),
        material: if idx % 2 == 0 { "PLA" } else { "PETG" }.to_string(),
        color: "gris".to_string(),
        diameter: 1.75,
        grams_per_unit: 80.0,
        est_print_min_per_unit: 35.0,
        reorder_point_grams: 500.0,
        lots: (0..lots)
            .map(|l| {
                Lot::new(
                    LotId::from(format!("fil-{idx}-lot-{l}").as_str()),
                    1000.0,
                    t0 + Duration::hours(l as i64),
                )
            })
            .collect(),
    }
}

fn machine(idx: usize, jobs: usize) -> Machine {
    let queue: Vec<Job> = (0..jobs)
        .map(|j| Job {
            id: format!("m{idx}-j{j}").as_str().into(),
            sku: "SKU-0".to_string(),
            qty: 2,
            est_minutes_per_unit: 20.0,
            remaining_minutes: None,
        })
        .collect();
    Machine {
        id: MachineId::from(format!("m{idx}").as_str()),
        name: format!("Printer {idx}"),
        model: "MK4".to_string(),
        status: MachineStatus::Online,
        nozzle: "0.4".to_string(),
        avg_speed_factor: 1.0,
        maintenance_every_hours: 200.0,
        maintenance_hours_used: 50.0,
        last_maintenance_at: None,
        compatible_materials: vec!["PLA".to_string(), "PETG".to_string()],
        queue: JobQueue::from(queue),
    }
}

fn shop(filaments: usize, lots: usize, machines: usize) -> ShopState {
    ShopState::new(
        Ledger::from_parts((0..filaments).map(|i| filament(i, lots)).collect(), vec![]),
        Fleet::from_machines((0..machines).map(|i| machine(i, 8)).collect()),
    )
}

fn bench_reserve_release(c: &mut Criterion) {
    let mut group = c.benchmark_group("reserve_release");
    group.throughput(Throughput::Elements(1));

    for lots in [1usize, 10, 100].iter() {
        group.bench_with_input(BenchmarkId::new("spanning_lots", lots), lots, |b, &lots| {
            let mut state = shop(4, lots, 4);
            let order = OrderId::from("bench-order");
            // Half of the filament's total mass so the claim walks half the lots.
            let qty = (lots as u32 * 1000 / 80 / 2).max(1);
            let items = [ReservationItem::new("SKU-0", qty)];
            b.iter(|| {
                state
                    .ledger
                    .reserve(black_box(&order), black_box(&items), Utc::now())
                    .unwrap();
                state.ledger.release(&order).unwrap();
            });
        });
    }

    group.finish();
}

fn bench_atp(c: &mut Criterion) {
    let mut group = c.benchmark_group("calculate_atp");

    for machines in [1usize, 20, 200].iter() {
        group.bench_with_input(BenchmarkId::new("machines", machines), machines, |b, &machines| {
            let state = shop(50, 5, machines);
            b.iter(|| calculate_atp(black_box(&state), black_box("SKU-0")).unwrap());
        });
    }

    group.finish();
}

fn bench_snapshot(c: &mut Criterion) {
    let state = shop(50, 5, 20);
    let config = filaforge_core::EngineConfig::default();
    c.bench_function("snapshot_assemble", |b| {
        b.iter(|| Snapshot::assemble(black_box(&state), &config))
    });
}

criterion_group!(benches, bench_reserve_release, bench_atp, bench_snapshot);
criterion_main!(benches);

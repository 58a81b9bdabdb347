//! Latency harness against a running tanseeq server:
//!   TANSEEQ_DATA_DIR=/tmp/tanseeq-bench cargo run --release &
//!   cargo bench
//!
//! Override host/port with TANSEEQ_BENCH_HOST / TANSEEQ_BENCH_PORT.

use std::time::{Duration, Instant};

use tokio_postgres::{Config, NoTls};
use ulid::Ulid;

const PROJECTS: usize = 20;
const BOOKINGS_PER_PROJECT: usize = 50;

async fn connect(host: &str, port: u16) -> tokio_postgres::Client {
    let mut config = Config::new();
    config
        .host(host)
        .port(port)
        .dbname(format!("bench_{}", Ulid::new()))
        .user("tanseeq")
        .password("tanseeq");

    let (client, conn) = config.connect(NoTls).await.expect("connect failed");
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            eprintln!("connection error: {e}");
        }
    });
    client
}

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((sorted.len() as f64) * p / 100.0) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn print_latency(label: &str, latencies: &mut [Duration]) {
    latencies.sort();
    let total: Duration = latencies.iter().sum();
    let avg = total / latencies.len() as u32;
    println!("  {label}:");
    println!(
        "    n={}, avg={:.2}ms, p50={:.2}ms, p95={:.2}ms, p99={:.2}ms, max={:.2}ms",
        latencies.len(),
        avg.as_secs_f64() * 1000.0,
        percentile(latencies, 50.0).as_secs_f64() * 1000.0,
        percentile(latencies, 95.0).as_secs_f64() * 1000.0,
        percentile(latencies, 99.0).as_secs_f64() * 1000.0,
        latencies.last().unwrap().as_secs_f64() * 1000.0,
    );
}

fn insert_sql(project: &str, day: usize, slot: usize) -> String {
    // Two-hour slots, never overlapping within a day.
    let date = format!("2025-{:02}-{:02}", 6 + day / 28, 1 + day % 28);
    let time = format!("{:02}:00", 6 + slot * 2);
    format!(
        "INSERT INTO bookings (project_id, service_type, provider_id, provider_name, \
         scheduled_date, start_time, duration_hours, location, estimated_cost) \
         VALUES ('{project}', 'equipment-rental', 'prov', 'Bench Provider', \
         '{date}', '{time}', 2, 'Riyadh', 500)"
    )
}

#[tokio::main]
async fn main() {
    let host = std::env::var("TANSEEQ_BENCH_HOST").unwrap_or_else(|_| "127.0.0.1".into());
    let port: u16 = std::env::var("TANSEEQ_BENCH_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(5433);

    let client = connect(&host, port).await;
    println!(
        "tanseeq stress: {PROJECTS} projects x {BOOKINGS_PER_PROJECT} bookings against {host}:{port}"
    );

    // Phase 1: conflict-checked inserts.
    let mut insert_lat = Vec::with_capacity(PROJECTS * BOOKINGS_PER_PROJECT);
    for p in 0..PROJECTS {
        let project = format!("bench-project-{p}");
        for i in 0..BOOKINGS_PER_PROJECT {
            let sql = insert_sql(&project, i / 5, i % 5);
            let start = Instant::now();
            client.batch_execute(&sql).await.expect("insert failed");
            insert_lat.push(start.elapsed());
        }
    }
    print_latency("insert (conflict-checked)", &mut insert_lat);

    // Phase 2: candidate probes against populated days.
    let mut probe_lat = Vec::with_capacity(PROJECTS * 10);
    for p in 0..PROJECTS {
        let project = format!("bench-project-{p}");
        for _ in 0..10 {
            let start = Instant::now();
            client
                .simple_query(&format!(
                    "SELECT * FROM conflict_check WHERE project_id = '{project}' \
                     AND scheduled_date = '2025-06-01' AND start_time = '07:00' AND duration_hours = 2"
                ))
                .await
                .expect("probe failed");
            probe_lat.push(start.elapsed());
        }
    }
    print_latency("conflict probe", &mut probe_lat);

    // Phase 3: read-side projections.
    let mut read_lat = Vec::with_capacity(PROJECTS * 3);
    for p in 0..PROJECTS {
        let project = format!("bench-project-{p}");
        for table in ["bookings", "calendar", "timeline"] {
            let start = Instant::now();
            client
                .simple_query(&format!(
                    "SELECT * FROM {table} WHERE project_id = '{project}'"
                ))
                .await
                .expect("read failed");
            read_lat.push(start.elapsed());
        }
    }
    print_latency("projection reads", &mut read_lat);
}

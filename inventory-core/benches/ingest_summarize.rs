use std::time::Instant;

use rand::{Rng, SeedableRng, rngs::StdRng, seq::SliceRandom};

use inventory_core::services::aggregator::summarize;
use inventory_core::services::ingestor::{IngestMapping, Ingestor};

const CATEGORIES: [&str; 5] = ["Electronics", "Furniture", "Vehicles", "Tools", "Other"];
const STATUSES: [&str; 4] = ["in_use", "In_Maintenance", "retired", "AVAILABLE"];
const CONDITIONS: [&str; 6] = ["excellent", "xc", "good", "fair", "poor", "damaged"];

#[derive(Clone, Debug)]
struct BenchCfg {
    rows: usize,
    rounds: usize,
    seed: u64,
}

impl Default for BenchCfg {
    fn default() -> Self {
        let rows = std::env::var("BENCH_ROWS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(50_000);
        Self {
            rows,
            rounds: 5,
            seed: 42,
        }
    }
}

fn synthetic_csv(cfg: &BenchCfg) -> String {
    let mut rng = StdRng::seed_from_u64(cfg.seed);
    let mut out = String::with_capacity(cfg.rows * 96);
    out.push_str("id,asset_name,category,status,condition,purchase_cost,current_value\n");
    for i in 0..cfg.rows {
        let purchase: f64 = rng.gen_range(50.0..40_000.0);
        let current = purchase * rng.gen_range(0.3..1.0);
        // every tenth row carries a quoted name with an embedded separator and quote
        let name = if i % 10 == 0 {
            format!("\"Unit {i}, \"\"rev B\"\"\"")
        } else {
            format!("Unit {i}")
        };
        let id = if i % 97 == 0 { "[Asset]".to_string() } else { format!("a-{i}") };
        out.push_str(&format!(
            "{id},{name},{},{},{},{purchase:.2},{current:.2}\n",
            CATEGORIES.choose(&mut rng).unwrap_or(&"Other"),
            STATUSES.choose(&mut rng).unwrap_or(&"in_use"),
            CONDITIONS.choose(&mut rng).unwrap_or(&"good"),
        ));
    }
    out
}

fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((sorted.len() - 1) as f64 * p).round() as usize;
    sorted[idx]
}

fn main() {
    let cfg = BenchCfg::default();
    let csv = synthetic_csv(&cfg);
    let ingestor = Ingestor::new(IngestMapping::inventory_assets());

    let mut ingest_ms = Vec::with_capacity(cfg.rounds);
    let mut summarize_ms = Vec::with_capacity(cfg.rounds);
    let mut last_count = 0;

    for _ in 0..cfg.rounds {
        let t0 = Instant::now();
        let report = ingestor.ingest(&csv);
        ingest_ms.push(t0.elapsed().as_secs_f64() * 1000.0);

        let t1 = Instant::now();
        let summary = summarize(&report.records);
        summarize_ms.push(t1.elapsed().as_secs_f64() * 1000.0);
        last_count = summary.total_count;
    }

    ingest_ms.sort_by(|a, b| a.total_cmp(b));
    summarize_ms.sort_by(|a, b| a.total_cmp(b));

    println!("== ingest_summarize ==");
    println!("rows: {} (kept {}), rounds: {}", cfg.rows, last_count, cfg.rounds);
    println!(
        "ingest    p50 {:.2} ms  p95 {:.2} ms",
        percentile(&ingest_ms, 0.50),
        percentile(&ingest_ms, 0.95)
    );
    println!(
        "summarize p50 {:.2} ms  p95 {:.2} ms",
        percentile(&summarize_ms, 0.50),
        percentile(&summarize_ms, 0.95)
    );
}

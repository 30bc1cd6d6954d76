//! Demo producer: spins up a few instrumented worker threads against a
//! running collector so there is something to look at in the trace viewer.

use clap::Parser;
use eyre::{Context, Result};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracer::{trace_scope, Exporter, IpcExporter, TraceScope};
use tracing::info;

#[derive(Parser)]
#[command(name = "workload")]
#[command(about = "emit sample trace events to a running collector")]
struct Args {
    #[arg(
        short,
        long,
        default_value = "/tmp/tracer.pipe",
        help = "named pipe the collector reads from"
    )]
    pipe: String,

    #[arg(short, long, default_value = "3", help = "number of worker threads")]
    threads: usize,

    #[arg(
        short,
        long,
        default_value = "5",
        help = "instrumented iterations per worker"
    )]
    iterations: u32,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let exporter = Arc::new(
        IpcExporter::connect(&args.pipe)
            .with_context(|| format!("failed to connect to pipe={}", args.pipe))?,
    );
    info!(pipe = %args.pipe, threads = args.threads, "workload connected");

    let mut handles = Vec::with_capacity(args.threads);
    for worker in 0..args.threads {
        let exporter = exporter.clone();
        let handle = thread::Builder::new()
            .name(format!("workload-{worker}"))
            .spawn(move || run_worker(exporter.as_ref(), worker, args.iterations))?;
        handles.push(handle);
    }

    for handle in handles {
        handle.join().expect("worker panicked");
    }

    info!("workload complete");
    Ok(())
}

fn run_worker(exporter: &dyn Exporter, worker: usize, iterations: u32) {
    for i in 0..iterations {
        let _span = TraceScope::with_category(
            exporter,
            format!("worker-{worker}-iteration-{i}"),
            "workload",
        );
        compute(exporter);
        thread::sleep(Duration::from_millis(2));
    }
}

fn compute(exporter: &dyn Exporter) {
    trace_scope!(exporter, "compute", "workload");
    let mut acc = 0u64;
    for i in 0..50_000u64 {
        acc = acc.wrapping_mul(31).wrapping_add(i);
    }
    std::hint::black_box(acc);
}

//! ParPut CLI - Parallel uploads to remote object stores

use clap::Parser;
use humansize::{format_size, BINARY};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use parput::config::{CliArgs, UploadConfig};
use parput::dispatch::WorkerPool;
use parput::error::{ParputError, Result};
use parput::fs::{survey, Survey};
use parput::pool::ConnectionPool;
use parput::progress::TransferProgress;
use parput::remote::SftpConnection;
use parput::transfer::{upload, TransferSettings, UploadContext};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

fn main() {
    let args = CliArgs::parse();

    // Initialize logging; -v/-vv raise the default level, RUST_LOG wins.
    let filter = match args.verbose {
        0 => EnvFilter::from_default_env(),
        1 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        _ => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    if let Err(e) = run(args) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(args: CliArgs) -> Result<()> {
    if args.source.is_none() || args.destination.is_none() {
        eprintln!("Usage: parput <SOURCE> <USER@HOST:/PATH> [OPTIONS]");
        eprintln!("       parput --help for more information");
        std::process::exit(1);
    }

    let config = UploadConfig::from_cli(&args).map_err(ParputError::ConfigError)?;

    if args.verbose > 0 {
        print_config(&config);
    }

    // One read-only pass to size the run.
    let survey = survey(&config.source);
    if !config.dry_run && survey.files == 0 && survey.directories == 0 && !survey.is_clean() {
        return Err(ParputError::NotFound(config.source.clone()));
    }

    if config.dry_run {
        print_plan(&config, &survey);
        return Ok(());
    }

    let start = Instant::now();

    let remote = config.remote.clone();
    let pool = Arc::new(ConnectionPool::new(config.connections, || {
        SftpConnection::connect(&remote)
    })?);

    let workers = WorkerPool::new(config.effective_workers());
    let progress = Arc::new(TransferProgress::new());
    progress.set_totals(survey.files, survey.total_bytes);

    let ctx = UploadContext::new(
        Arc::clone(&pool),
        workers.handle(),
        TransferSettings::from(&config),
        Arc::clone(&progress),
    );

    let renderer = if args.progress && !args.quiet {
        Some(ProgressRenderer::spawn(Arc::clone(&progress), &survey))
    } else {
        None
    };

    let outcome = upload(&ctx, &config.source, &config.destination);
    workers.join();

    if let Some(renderer) = renderer {
        renderer.finish();
    }

    // A root-level failure still waits for already submitted tasks above.
    outcome?;

    let failures = workers.take_failures();
    if !args.quiet {
        print_summary(&progress, &failures, start.elapsed().as_secs_f64());
    }

    if !failures.is_empty() {
        std::process::exit(1);
    }

    Ok(())
}

fn print_config(config: &UploadConfig) {
    println!("=== Configuration ===");
    match serde_json::to_string_pretty(config) {
        Ok(json) => println!("{json}"),
        Err(e) => println!("(unprintable: {e})"),
    }
    println!();
}

fn print_plan(config: &UploadConfig, survey: &Survey) {
    println!("=== Dry Run ===");
    println!("Source:       {:?}", survey.root);
    println!(
        "Destination:  {}@{}:{:?}",
        config.remote.user, config.remote.host, config.destination
    );
    println!("Files:        {}", survey.files);
    println!("Directories:  {}", survey.directories);
    println!("Total size:   {}", format_size(survey.total_bytes, BINARY));
    println!("Connections:  {}", config.connections);
    println!("Workers:      {}", config.effective_workers());
    println!("Parts:        {}", config.effective_parts());

    if !survey.is_clean() {
        println!("\nUnreadable entries:");
        for error in &survey.errors {
            println!("  {error}");
        }
    }
}

fn print_summary(progress: &TransferProgress, failures: &[ParputError], elapsed_secs: f64) {
    let snapshot = progress.snapshot();
    let throughput = if elapsed_secs > 0.0 {
        snapshot.bytes as f64 / elapsed_secs
    } else {
        0.0
    };

    println!("\n=== Transfer Summary ===");
    println!("Files uploaded:      {}", snapshot.files);
    println!("Collections created: {}", snapshot.collections);
    println!("Bytes transferred:   {}", format_size(snapshot.bytes, BINARY));
    println!("Duration:            {elapsed_secs:.2}s");
    println!(
        "Throughput:          {}/s",
        format_size(throughput as u64, BINARY)
    );

    if !failures.is_empty() {
        println!("\nFailures ({}):", failures.len());
        for failure in failures {
            println!("  {failure}");
        }
    }
}

/// Background thread driving indicatif bars from the shared counters
struct ProgressRenderer {
    stop: Arc<AtomicBool>,
    handle: std::thread::JoinHandle<()>,
}

impl ProgressRenderer {
    fn spawn(progress: Arc<TransferProgress>, survey: &Survey) -> Self {
        let multi = MultiProgress::new();

        let files_bar = multi.add(ProgressBar::new(survey.files));
        files_bar.set_style(
            ProgressStyle::default_bar()
                .template("{prefix:.bold.dim} [{bar:40.cyan/blue}] {pos}/{len} files")
                .expect("Invalid template")
                .progress_chars("=> "),
        );
        files_bar.set_prefix("Files");

        let bytes_bar = multi.add(ProgressBar::new(survey.total_bytes));
        bytes_bar.set_style(
            ProgressStyle::default_bar()
                .template("{prefix:.bold.dim} [{bar:40.green/white}] {bytes}/{total_bytes} ({bytes_per_sec}, ETA {eta})")
                .expect("Invalid template")
                .progress_chars("=> "),
        );
        bytes_bar.set_prefix("Data ");

        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let handle = std::thread::spawn(move || {
            while !stop_flag.load(Ordering::SeqCst) {
                let snapshot = progress.snapshot();
                files_bar.set_position(snapshot.files);
                bytes_bar.set_position(snapshot.bytes);
                std::thread::sleep(std::time::Duration::from_millis(100));
            }
            let snapshot = progress.snapshot();
            files_bar.set_position(snapshot.files);
            bytes_bar.set_position(snapshot.bytes);
            files_bar.finish();
            bytes_bar.finish();
        });

        Self { stop, handle }
    }

    fn finish(self) {
        self.stop.store(true, Ordering::SeqCst);
        let _ = self.handle.join();
    }
}

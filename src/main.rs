use std::fs::File;
use std::io::{self, BufReader};

use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use recbuf::cli::Args;
use recbuf::compare::compare_records;
use recbuf::config::Config;
use recbuf::error::Result;
use recbuf::{input, output};

/// Set up SIGPIPE handling for Unix systems
/// This prevents "broken pipe" errors when output is piped to commands like `head`
#[cfg(unix)]
fn setup_sigpipe() {
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_DFL);
    }
}

#[cfg(not(unix))]
fn setup_sigpipe() {
    // Windows doesn't have SIGPIPE
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();
}

fn main() {
    setup_sigpipe();
    init_tracing();

    if let Err(e) = run() {
        eprintln!("recsort: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = Args::parse();
    let config = Config::from_args(&args)?;
    let mut buf = config.buffer.build()?;

    let delimiter = config.record_delimiter;
    let mut count = 0;
    if config.input_files.is_empty() {
        count += input::read_records(io::stdin().lock(), delimiter, &mut buf)?;
    } else {
        for path in &config.input_files {
            count += if path == "-" {
                input::read_records(io::stdin().lock(), delimiter, &mut buf)?
            } else {
                input::read_records(BufReader::new(File::open(path)?), delimiter, &mut buf)?
            };
        }
    }
    debug!(records = count, bytes = buf.len(), kind = %buf.kind(), "staged input");

    let end = buf.len();
    buf.sort_between_with(1, end, &config.sort, |a, b| compare_records(a, b, &config));

    let out = output::open_output(&config)?;
    output::write_records(out, &buf, &config)?;

    buf.release()
}

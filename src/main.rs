use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use ls8::{read_program, Vm};

/// LS-8 emulator
#[derive(Parser)]
struct Args {
    /// Program image, one binary byte per line
    program: PathBuf,
    /// Log machine state before every instruction
    #[arg(long)]
    trace: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.trace { "debug" } else { "warn" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();

    let program = read_program(&args.program)
        .with_context(|| format!("loading {}", args.program.display()))?;

    let mut vm = Vm::new().with_trace(args.trace);
    vm.load(&program)?;
    if let Err(err) = vm.run() {
        tracing::error!(pc = vm.pc(), "{}", err);
        return Err(err).context("machine stopped");
    }

    Ok(())
}

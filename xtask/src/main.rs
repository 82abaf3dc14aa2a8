//! Build automation tasks for the rust-mysql-driver workspace.
//!
//! Run with `cargo xtask <command>`.
//!
//! ## Available Commands
//!
//! - `ci`: Run all CI checks (format, lint, test)
//! - `fmt`: Check/apply code formatting
//! - `clippy`: Run clippy lints
//! - `test`: Run all tests
//! - `doc`: Generate documentation
//! - `fuzz`: Run a fuzz target (requires cargo-fuzz + nightly)

use anyhow::Result;
use clap::{Parser, Subcommand};
use xshell::{Shell, cmd};

#[derive(Parser)]
#[command(name = "xtask", about = "Build automation for rust-mysql-driver")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run all checks (format, lint, test)
    Ci,
    /// Run cargo fmt (--check by default, --fix to apply)
    Fmt {
        /// Apply formatting fixes
        #[arg(long)]
        fix: bool,
    },
    /// Run clippy with all targets
    Clippy {
        /// Apply clippy suggestions
        #[arg(long)]
        fix: bool,
    },
    /// Run all tests
    Test {
        /// Test a specific package
        #[arg(short, long)]
        package: Option<String>,
    },
    /// Generate documentation
    Doc {
        /// Open in browser after building
        #[arg(long)]
        open: bool,
    },
    /// Run a fuzz target for a bounded number of runs
    Fuzz {
        /// Fuzz target name (see fuzz/fuzz_targets)
        target: String,
        /// Number of runs
        #[arg(long, default_value = "100000")]
        runs: u64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let sh = Shell::new()?;

    match cli.command {
        Command::Ci => {
            cmd!(sh, "cargo fmt --all --check").run()?;
            cmd!(sh, "cargo clippy --workspace --all-targets -- -D warnings").run()?;
            cmd!(sh, "cargo test --workspace").run()?;
        }
        Command::Fmt { fix } => {
            if fix {
                cmd!(sh, "cargo fmt --all").run()?;
            } else {
                cmd!(sh, "cargo fmt --all --check").run()?;
            }
        }
        Command::Clippy { fix } => {
            if fix {
                cmd!(sh, "cargo clippy --workspace --all-targets --fix --allow-dirty").run()?;
            } else {
                cmd!(sh, "cargo clippy --workspace --all-targets -- -D warnings").run()?;
            }
        }
        Command::Test { package } => match package {
            Some(package) => cmd!(sh, "cargo test -p {package}").run()?,
            None => cmd!(sh, "cargo test --workspace").run()?,
        },
        Command::Doc { open } => {
            if open {
                cmd!(sh, "cargo doc --workspace --no-deps --open").run()?;
            } else {
                cmd!(sh, "cargo doc --workspace --no-deps").run()?;
            }
        }
        Command::Fuzz { target, runs } => {
            let runs = runs.to_string();
            let _dir = sh.push_dir("fuzz");
            cmd!(sh, "cargo +nightly fuzz run {target} -- -runs={runs}").run()?;
        }
    }

    Ok(())
}

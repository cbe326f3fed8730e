use clap::Parser;
use maybe_slow::config::{self, WatchdogConfig};
use maybe_slow::policy::Reporting;
use maybe_slow::session;
use maybe_slow::TracingReporter;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

/// Run a command and, while it takes long, periodically log that it is
/// still alive and what it is doing.
#[derive(Parser, Debug)]
#[command(name = "maybe-slow", version, about)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "maybe-slow.toml")]
    config: PathBuf,

    /// Name shown in status lines (default: the command line)
    #[arg(short, long)]
    label: Option<String>,

    /// Wait before the first status line, in ms (overrides config)
    #[arg(long)]
    base_ms: Option<u64>,

    /// Longest wait between status lines, in ms (overrides config)
    #[arg(long)]
    cap_ms: Option<u64>,

    /// Report a plain "still running" instead of the process state
    #[arg(long)]
    generic: bool,

    /// Validate config and print resolved settings, don't run
    #[arg(long)]
    dry_run: bool,

    /// Extra logging (watchdog start/stop, spawn details)
    #[arg(short, long)]
    verbose: bool,

    /// Command to run, after `--`
    #[arg(last = true, value_name = "COMMAND", required_unless_present = "dry_run")]
    command: Vec<String>,
}

impl Cli {
    fn apply_overrides(&self, watchdog: &mut WatchdogConfig) {
        if let Some(base_ms) = self.base_ms {
            watchdog.base_ms = base_ms;
        }
        if let Some(cap_ms) = self.cap_ms {
            watchdog.cap_ms = cap_ms;
        }
        if self.generic {
            watchdog.reporting = Reporting::Generic;
        }
    }

    fn label(&self) -> String {
        self.label
            .clone()
            .unwrap_or_else(|| session::default_label(&self.command))
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("maybe-slow: {e}");
            return ExitCode::from(2);
        }
    };

    let default_filter = if cli.verbose {
        "maybe_slow=debug".to_string()
    } else {
        config.log.filter.clone()
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    tracing::debug!(?cli, "parsed CLI arguments");

    cli.apply_overrides(&mut config.watchdog);
    if let Err(e) = config.watchdog.validate() {
        tracing::error!("{e}");
        return ExitCode::from(2);
    }
    let policy = config.watchdog.policy();

    if cli.dry_run {
        println!("maybe-slow v{}", env!("CARGO_PKG_VERSION"));
        println!("Config file: {}", cli.config.display());
        println!("Base interval: {}ms", config.watchdog.base_ms);
        println!("Cap interval: {}ms", config.watchdog.cap_ms);
        println!("Reporting: {:?}", config.watchdog.reporting);
        if !cli.command.is_empty() {
            println!("Command: {}", cli.label());
        }
        return ExitCode::SUCCESS;
    }

    match session::run_watched(&cli.command, &cli.label(), policy, Arc::new(TracingReporter)).await
    {
        Ok(result) => ExitCode::from(exit_byte(result.exit_code)),
        Err(e) => {
            tracing::error!(error = %e, "could not run command");
            ExitCode::FAILURE
        }
    }
}

/// Mirror the child's exit code; signals and out-of-range codes become 1.
fn exit_byte(code: Option<i32>) -> u8 {
    code.and_then(|c| u8::try_from(c).ok()).unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command_after_separator() {
        let cli = Cli::try_parse_from(["maybe-slow", "--", "cargo", "test", "-q"]).unwrap();
        assert_eq!(cli.command, vec!["cargo", "test", "-q"]);
        assert_eq!(cli.label(), "cargo test -q");
        assert_eq!(cli.config, PathBuf::from("maybe-slow.toml"));
    }

    #[test]
    fn test_explicit_label_wins() {
        let cli = Cli::try_parse_from(["maybe-slow", "-l", "integration", "--", "make", "check"])
            .unwrap();
        assert_eq!(cli.label(), "integration");
    }

    #[test]
    fn test_command_required_without_dry_run() {
        assert!(Cli::try_parse_from(["maybe-slow"]).is_err());
        assert!(Cli::try_parse_from(["maybe-slow", "--dry-run"]).is_ok());
    }

    #[test]
    fn test_overrides_applied() {
        let cli = Cli::try_parse_from([
            "maybe-slow",
            "--base-ms",
            "500",
            "--cap-ms",
            "9000",
            "--generic",
            "--",
            "true",
        ])
        .unwrap();
        let mut watchdog = WatchdogConfig::default();
        cli.apply_overrides(&mut watchdog);
        assert_eq!(watchdog.base_ms, 500);
        assert_eq!(watchdog.cap_ms, 9_000);
        assert_eq!(watchdog.reporting, Reporting::Generic);
    }

    #[test]
    fn test_no_overrides_keeps_config() {
        let cli = Cli::try_parse_from(["maybe-slow", "--", "true"]).unwrap();
        let mut watchdog = WatchdogConfig::default();
        cli.apply_overrides(&mut watchdog);
        assert_eq!(watchdog.base_ms, 2_000);
        assert_eq!(watchdog.reporting, Reporting::Detailed);
    }

    #[test]
    fn test_exit_code_mapping() {
        assert_eq!(exit_byte(Some(0)), 0);
        assert_eq!(exit_byte(Some(42)), 42);
        assert_eq!(exit_byte(None), 1);
        assert_eq!(exit_byte(Some(-1)), 1);
        assert_eq!(exit_byte(Some(300)), 1);
    }
}

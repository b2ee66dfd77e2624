//! devnet-supervisor command-line front-end
//!
//! Usage:
//!   devnet-supervisor --config node.toml start
//!   devnet-supervisor --config node.toml monitor

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use devnet_supervisor::utils::{init_logging_from_config, wait_for_shutdown_signal};
use devnet_supervisor::{
    Monitor, ProcessStatus, ProcessSupervisor, StartOutcome, SupervisorConfig, SupervisorError,
};

#[derive(Parser, Debug)]
#[command(name = "devnet-supervisor", version, about = "Start, stop and monitor one devnet binary")]
struct Args {
    /// Supervisor configuration file (TOML or JSON)
    #[arg(short, long, global = true, default_value = "supervisor.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the process unless it is already running
    Start,
    /// Stop the process (SIGTERM, then SIGKILL after the timeout)
    Stop {
        /// Graceful stop window in seconds (default: from config)
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Stop then start
    Restart {
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Show whether the process is running
    Status {
        /// Print status as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the last lines of the process log
    Logs {
        #[arg(short = 'n', long, default_value_t = 50)]
        lines: usize,
    },
    /// Watch the process and restart it on crashes or failed health checks
    Monitor,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = SupervisorConfig::from_file(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    init_logging_from_config(config.logging.as_ref());

    let mut supervisor = ProcessSupervisor::from_config(&config);
    let stop_timeout = |timeout: Option<u64>| {
        timeout
            .map(Duration::from_secs)
            .unwrap_or_else(|| config.stop_timeout())
    };

    match args.command {
        Command::Start => {
            let result = supervisor.start().await;
            report_start(supervisor.name(), result)?;
        }
        Command::Stop { timeout } => {
            supervisor.stop(stop_timeout(timeout)).await?;
            println!("{} stopped", supervisor.name());
        }
        Command::Restart { timeout } => {
            let result = supervisor.restart(stop_timeout(timeout)).await;
            report_start(supervisor.name(), result)?;
        }
        Command::Status { json } => {
            let status = supervisor.status().await;
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                print_status(supervisor.name(), &status);
            }
            if status == ProcessStatus::NotRunning {
                std::process::exit(3);
            }
        }
        Command::Logs { lines } => {
            for line in supervisor.log_tail(lines)? {
                println!("{}", line);
            }
        }
        Command::Monitor => {
            let mut monitor =
                Monitor::new(supervisor, config.health_probe()?, config.restart_policy()?)?;
            monitor.run_until(wait_for_shutdown_signal()).await?;
        }
    }

    Ok(())
}

fn report_start(
    name: &str,
    result: Result<StartOutcome, SupervisorError>,
) -> anyhow::Result<()> {
    match result {
        Ok(StartOutcome::Started(process)) => {
            println!(
                "{} started (pid {}), logs: {}",
                name,
                process.pid,
                process.log_path.display()
            );
            Ok(())
        }
        Ok(StartOutcome::AlreadyRunning(pid)) => {
            println!("{} is already running (pid {})", name, pid);
            Ok(())
        }
        Err(SupervisorError::StartFailed { reason, log_tail }) => {
            eprintln!("{} failed to start: {}", name, reason);
            if !log_tail.is_empty() {
                eprintln!("--- last {} log lines ---", log_tail.len());
                for line in &log_tail {
                    eprintln!("{}", line);
                }
            }
            bail!("{} failed to start", name)
        }
        Err(e) => Err(e.into()),
    }
}

fn print_status(name: &str, status: &ProcessStatus) {
    match status {
        ProcessStatus::Running { pid, resources } => {
            print!("{}: running (pid {})", name, pid);
            if let Some(r) = resources {
                print!(", rss {} MiB", r.memory_bytes / (1024 * 1024));
                if let Some(cpu) = r.cpu_percent {
                    print!(", cpu {:.1}%", cpu);
                }
                if let Some(secs) = r.run_time_secs {
                    print!(", up {}s", secs);
                }
            }
            println!();
        }
        ProcessStatus::NotRunning => println!("{}: not running", name),
    }
}

use crate::comm::channel::{ChannelId, CommPaths};
use crate::comm::markers::TurnSignal;
use crate::comm::router::{clear_all, collect_outbound, post_inbound, ChannelRouter};
use crate::config::{get_config_path, load_config, save_config, Config};
use crate::relay::RelayLoop;
use crate::scheduler::gate::DaemonGate;
use crate::scheduler::service::SchedulerService;
use crate::store::types::{RepeatSpec, TaskRecord};
use crate::store::TaskStore;
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "taskrelay")]
#[command(about = "Scheduled-task daemon with a file-based message relay")]
#[command(version = crate::VERSION)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize taskrelay configuration and workspace
    Onboard,
    /// Run the scheduler daemon and the foreground relay loop
    Daemon,
    /// Manage scheduled tasks
    Task {
        #[command(subcommand)]
        cmd: TaskCommands,
    },
    /// Post a message into an inbound channel
    Send {
        #[arg(long, short = 'c', default_value = "local")]
        channel: String,
        #[arg(long, short = 'm')]
        message: String,
        /// Overwrite a pending message instead of refusing
        #[arg(long)]
        replace: bool,
    },
    /// Drain a completed reply from an outbound channel
    Recv {
        #[arg(long, short = 'c', default_value = "local")]
        channel: String,
    },
}

#[derive(Subcommand)]
enum TaskCommands {
    /// Create or update a task
    Add {
        #[arg(long, short = 'n')]
        name: String,
        /// Instruction payload handed to the consumer when the task fires
        #[arg(long, short = 'a')]
        action: String,
        /// Seconds until the first firing
        #[arg(long, default_value_t = 0)]
        countdown: i64,
        /// Repeat interval in seconds (minimum 60, smaller values are clamped)
        #[arg(long, short = 'e')]
        every: Option<u64>,
        /// Number of firings; -1 for unbounded
        #[arg(long, short = 'r')]
        remain: Option<i64>,
        /// Fire exactly once, no looping
        #[arg(long, conflicts_with_all = ["every", "remain"])]
        once: bool,
    },
    /// List all persisted tasks
    List,
    /// Show a task's raw file content
    Info {
        #[arg(long, short = 'n')]
        name: String,
    },
    /// Delete a task
    Remove {
        #[arg(long, short = 'n')]
        name: String,
    },
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Onboard => {
            onboard()?;
        }
        Commands::Daemon => {
            daemon().await?;
        }
        Commands::Task { cmd } => {
            task_command(cmd)?;
        }
        Commands::Send {
            channel,
            message,
            replace,
        } => {
            send(&channel, &message, replace)?;
        }
        Commands::Recv { channel } => {
            recv(&channel)?;
        }
    }

    Ok(())
}

fn onboard() -> Result<()> {
    let config_path = get_config_path()?;
    if config_path.exists() {
        println!("Config already exists at {}", config_path.display());
        println!("Overwrite? (y/N): ");
        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;
        if !input.trim().eq_ignore_ascii_case("y") {
            return Ok(());
        }
    }

    let config = Config::default();
    save_config(&config, Some(config_path.as_path()))?;
    println!("Created config at {}", config_path.display());

    crate::utils::ensure_dir(config.tasks_dir())?;
    crate::utils::ensure_dir(config.comm_dir())?;
    println!("Created workspace at {}", config.workspace_path().display());

    println!("\ntaskrelay is ready.");
    println!("\nNext steps:");
    println!("  1. Schedule something: taskrelay task add -n hello -a \"say hello\" --once");
    println!("  2. Run the daemon:     taskrelay daemon");

    Ok(())
}

/// Wire the scheduler and the foreground relay loop together and run until
/// interrupted.
async fn daemon() -> Result<()> {
    let config = load_config(None)?;
    crate::utils::ensure_dir(config.tasks_dir())?;
    crate::utils::ensure_dir(config.comm_dir())?;

    let paths = CommPaths::new(config.comm_dir());
    // Stale slots from a previous run must never be replayed
    clear_all(&paths)?;

    let store = Arc::new(TaskStore::new(config.tasks_dir()));
    let gate = DaemonGate::new();
    let scheduler = SchedulerService::with_scan_interval(
        store,
        paths.clone(),
        gate.clone(),
        config.scheduler.scan_interval_secs,
    );
    if config.scheduler.enabled {
        scheduler.start().await?;
    }

    let router = ChannelRouter::new(paths, config.comm.poll_ms);
    let relay = RelayLoop::new(router, gate, RelayLoop::echo_handler());

    info!("taskrelay {} up; press ctrl-c to stop", crate::VERSION);
    tokio::select! {
        result = relay.run() => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
        }
    }

    scheduler.stop().await;
    Ok(())
}

fn task_command(cmd: TaskCommands) -> Result<()> {
    let config = load_config(None)?;
    let store = TaskStore::new(config.tasks_dir());

    match cmd {
        TaskCommands::Add {
            name,
            action,
            countdown,
            every,
            remain,
            once,
        } => {
            if action.trim().is_empty() {
                bail!("Task action must not be empty");
            }
            let repeat = if once {
                RepeatSpec {
                    enable: false,
                    interval: 60,
                    remain: 1,
                    exec_count: 0,
                }
            } else {
                RepeatSpec {
                    enable: true,
                    interval: every.unwrap_or(60),
                    remain: remain.unwrap_or(-1),
                    exec_count: 0,
                }
            };
            if repeat.remain < -1 {
                bail!("remain must be -1 (unbounded) or >= 0, got {}", repeat.remain);
            }
            let existed = store.exists(&name);
            let accepted = store.accept(&name, TaskRecord::new(countdown, action, repeat))?;
            println!(
                "{} task '{}' (countdown {}s, interval {}s, remain {})",
                if existed { "Updated" } else { "Created" },
                name,
                countdown,
                accepted.repeat.interval,
                accepted.repeat.remain
            );
        }
        TaskCommands::List => {
            let names = store.list()?;
            if names.is_empty() {
                println!("No tasks scheduled");
            }
            for name in names {
                println!("{}", name);
            }
        }
        TaskCommands::Info { name } => {
            print!("{}", store.read_raw(&name)?);
        }
        TaskCommands::Remove { name } => {
            store.delete(&name)?;
            println!("Removed task '{}'", name);
        }
    }

    Ok(())
}

fn send(channel: &str, message: &str, replace: bool) -> Result<()> {
    let config = load_config(None)?;
    let channel = ChannelId::from_str(channel).map_err(anyhow::Error::msg)?;
    let paths = CommPaths::new(config.comm_dir());
    post_inbound(&paths, channel, message, replace)
        .with_context(|| format!("Failed to post to '{}'", channel))?;
    println!("Posted to '{}'", channel);
    Ok(())
}

fn recv(channel: &str) -> Result<()> {
    let config = load_config(None)?;
    let channel = ChannelId::from_str(channel).map_err(anyhow::Error::msg)?;
    let paths = CommPaths::new(config.comm_dir());
    match collect_outbound(&paths, channel)? {
        Some((text, signal)) => {
            println!("{}", text);
            if signal == TurnSignal::Done {
                println!("(more output pending this turn)");
            }
        }
        None => {
            println!("(no completed reply pending)");
        }
    }
    Ok(())
}

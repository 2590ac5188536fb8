//! `skiff` command line client.
//!
//! Talks to a running `skiff-apid` over HTTP. The only local state is the
//! saved identity under `~/.config/skiff/user.json`.

mod client;
mod config;
mod render;

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde_json::Value;

use client::ApiClient;
use render::{TableView, dash_if_empty, short_timestamp};
use skiff_model::{TaskStatus, VolumeStatus};

#[derive(Debug, Parser)]
#[command(
    name = "skiff",
    version,
    about = "Submit and manage batch tasks and volumes on a Kubernetes cluster"
)]
struct Cli {
    /// API server URL. Defaults to $SKIFF_API_URL or http://localhost:8000.
    #[arg(long, global = true, value_name = "URL")]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Save an identity for subsequent commands.
    Login {
        username: String,
    },
    /// Show the saved identity.
    Whoami,
    /// Manage tasks.
    #[command(subcommand)]
    Jobs(JobsCommand),
    /// Manage volumes.
    #[command(subcommand)]
    Volumes(VolumesCommand),
}

#[derive(Debug, Subcommand)]
enum JobsCommand {
    /// Submit a task from a YAML file and tail its logs.
    Submit {
        /// Path to the task definition.
        task_file: PathBuf,
        /// Return right after submission instead of tailing logs.
        #[arg(long, short)]
        detach: bool,
    },
    /// List tasks.
    List {
        /// Include per-node counts.
        #[arg(long, short = 'd')]
        details: bool,
        /// Include tasks of every user.
        #[arg(long, short = 'u')]
        all_users: bool,
    },
    /// Show one task in full.
    Status {
        task_id: String,
    },
    /// Stop a task, or every task with --all.
    Stop {
        task_id: Option<String>,
        /// Stop all tasks of the current user.
        #[arg(long, short = 'a')]
        all: bool,
        /// With --all, stop tasks of every user.
        #[arg(long, short = 'u')]
        all_users: bool,
    },
    /// Tail the merged logs of a task.
    Logs {
        task_id: String,
    },
}

#[derive(Debug, Subcommand)]
enum VolumesCommand {
    /// Create a volume.
    Create {
        name: String,
        /// Capacity in cluster quantity syntax, e.g. 10Gi.
        size: String,
        #[arg(long, short = 's')]
        storage_class: Option<String>,
        /// Comma-separated access modes.
        #[arg(long, short = 'a', default_value = "ReadWriteOnce")]
        access_modes: String,
    },
    /// List volumes.
    List {
        /// Include storage class, access modes and claim name.
        #[arg(long, short = 'd')]
        details: bool,
        /// Include volumes of every user.
        #[arg(long, short = 'u')]
        all_users: bool,
    },
    /// Show one volume in full.
    Status {
        volume_id: String,
    },
    /// Delete a volume.
    Delete {
        volume_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Login { username } => {
            config::save_user(&username)?;
            println!("Logged in as: {username}");
            Ok(())
        }
        Command::Whoami => {
            match config::current_user() {
                Some(user) => println!("Logged in as: {user}"),
                None => println!("Not logged in"),
            }
            Ok(())
        }
        Command::Jobs(cmd) => run_jobs(cmd, cli.api_url).await,
        Command::Volumes(cmd) => run_volumes(cmd, cli.api_url).await,
    }
}

fn api_client(api_url: Option<String>) -> Result<ApiClient> {
    let user = config::require_user()?;
    Ok(ApiClient::new(config::api_url(api_url), user))
}

async fn run_jobs(cmd: JobsCommand, api_url: Option<String>) -> Result<()> {
    let client = api_client(api_url)?;
    match cmd {
        JobsCommand::Submit { task_file, detach } => {
            let task = load_task_file(&task_file)?;
            let receipt = client.submit_task(&task).await?;
            println!("Task submitted successfully");
            println!("  Task ID: {}", receipt.task_id);
            println!("  Status: {}", receipt.status);
            if !detach {
                println!("\nTailing logs for task {}...", receipt.task_id);
                tail(&client, &receipt.task_id).await;
            }
            Ok(())
        }
        JobsCommand::List { details, all_users } => {
            let tasks = client.list_tasks(all_users).await?;
            print_task_table(&tasks, details, all_users);
            Ok(())
        }
        JobsCommand::Status { task_id } => {
            let task = client.task_status(&task_id).await?;
            print_task(&task);
            Ok(())
        }
        JobsCommand::Stop {
            task_id,
            all,
            all_users,
        } => {
            if all_users && !all {
                bail!("--all-users requires --all");
            }
            match (task_id, all) {
                (Some(_), true) => bail!("cannot combine a task ID with --all"),
                (None, false) => bail!("provide a task ID or use --all"),
                (Some(id), false) => {
                    let receipt = client.stop_task(&id).await?;
                    println!("Task stopped successfully");
                    println!("  Task ID: {}", receipt.task_id);
                    println!("  Status: {}", receipt.status);
                }
                (None, true) => {
                    let receipt = client.stop_all_tasks(all_users).await?;
                    println!("Tasks stopped successfully");
                    println!("  Count: {}", receipt.count);
                    println!("  Status: {}", receipt.status);
                }
            }
            Ok(())
        }
        JobsCommand::Logs { task_id } => {
            tail(&client, &task_id).await;
            Ok(())
        }
    }
}

async fn run_volumes(cmd: VolumesCommand, api_url: Option<String>) -> Result<()> {
    let client = api_client(api_url)?;
    match cmd {
        VolumesCommand::Create {
            name,
            size,
            storage_class,
            access_modes,
        } => {
            let mut def = serde_json::json!({ "name": name, "size": size });
            if let Some(class) = storage_class {
                def["storage_class"] = class.into();
            }
            let modes: Vec<&str> = access_modes
                .split(',')
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .collect();
            def["access_modes"] = serde_json::json!(modes);

            let receipt = client.create_volume(&def).await?;
            println!("Volume created successfully");
            println!("  Volume ID: {}", receipt.volume_id);
            println!("  Status: {}", receipt.status);
            Ok(())
        }
        VolumesCommand::List { details, all_users } => {
            let volumes = client.list_volumes(all_users).await?;
            print_volume_table(&volumes, details, all_users);
            Ok(())
        }
        VolumesCommand::Status { volume_id } => {
            let volume = client.volume_status(&volume_id).await?;
            print_volume(&volume);
            Ok(())
        }
        VolumesCommand::Delete { volume_id } => {
            let receipt = client.delete_volume(&volume_id).await?;
            println!("Volume deleted successfully");
            println!("  Volume ID: {}", receipt.volume_id);
            println!("  Status: {}", receipt.status);
            Ok(())
        }
    }
}

/// Parse a task YAML file into the JSON payload the server expects.
fn load_task_file(path: &PathBuf) -> Result<Value> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading task file {}", path.display()))?;
    let task: Value = serde_yaml::from_str(&raw)
        .with_context(|| format!("parsing task file {}", path.display()))?;
    if task.get("run").and_then(Value::as_str).is_none() {
        bail!("'run' field is required in the task definition");
    }
    Ok(task)
}

/// Log tailing is best effort; a broken stream never fails the command.
async fn tail(client: &ApiClient, task_id: &str) {
    if let Err(err) = client.tail_logs(task_id, |line| println!("{line}")).await {
        eprintln!("Warning: could not tail logs: {err}");
    }
}

fn print_task_table(tasks: &[TaskStatus], details: bool, all_users: bool) {
    if tasks.is_empty() {
        println!("No tasks found");
        return;
    }

    let mut headers = vec!["TASK ID", "NAME", "STATUS", "CREATED"];
    if all_users {
        headers.push("USER");
    }
    if details {
        headers.push("NODES");
        headers.push("UNITS");
    }

    let mut table = TableView::new(&headers);
    for task in tasks {
        let mut row = vec![
            task.task_id.to_string(),
            dash_if_empty(task.name.as_deref()),
            task.state.as_str().to_string(),
            short_timestamp(&task.created_at).to_string(),
        ];
        if all_users {
            row.push(dash_if_empty(task.username.as_deref()));
        }
        if details {
            row.push(task.nodes.num_nodes.to_string());
            row.push(task.nodes.unit_names.join(","));
        }
        table.row(row);
    }

    print!("{}", table.render());
    println!("\nTotal tasks: {}", table.len());
}

fn print_task(task: &TaskStatus) {
    println!("Task Details");
    println!("  Task ID: {}", task.task_id);
    println!("  Name: {}", dash_if_empty(task.name.as_deref()));
    println!("  Status: {}", task.state.as_str());
    println!("  Created: {}", task.created_at);
    println!("  Updated: {}", task.updated_at);
    if let Some(user) = &task.username {
        println!("  User: {user}");
    }
    println!("\nNodes");
    println!("  Requested: {}", task.nodes.num_nodes);
    println!("  Succeeded: {}", task.nodes.succeeded);
    println!("  Failed: {}", task.nodes.failed);
    println!("  Running: {}", task.nodes.running);
    println!("  Pending: {}", task.nodes.pending);
    for unit in &task.nodes.unit_names {
        println!("  Unit: {unit}");
    }
}

fn print_volume_table(volumes: &[VolumeStatus], details: bool, all_users: bool) {
    if volumes.is_empty() {
        println!("No volumes found");
        return;
    }

    let mut headers = vec!["VOLUME ID", "NAME", "SIZE", "STATUS", "CREATED"];
    if all_users {
        headers.push("USER");
    }
    if details {
        headers.push("STORAGE CLASS");
        headers.push("ACCESS MODES");
        headers.push("CLAIM");
    }

    let mut table = TableView::new(&headers);
    for volume in volumes {
        let mut row = vec![
            volume.volume_id.to_string(),
            dash_if_empty(volume.name.as_deref()),
            volume.size.clone(),
            volume.phase.clone(),
            short_timestamp(&volume.created_at).to_string(),
        ];
        if all_users {
            row.push(dash_if_empty(volume.username.as_deref()));
        }
        if details {
            row.push(dash_if_empty(volume.storage_class.as_deref()));
            row.push(volume.access_modes.join(","));
            row.push(volume.claim_name.clone());
        }
        table.row(row);
    }

    print!("{}", table.render());
    println!("\nTotal volumes: {}", table.len());
}

fn print_volume(volume: &VolumeStatus) {
    println!("Volume Details");
    println!("  Volume ID: {}", volume.volume_id);
    println!("  Name: {}", dash_if_empty(volume.name.as_deref()));
    println!("  Size: {}", volume.size);
    println!("  Status: {}", volume.phase);
    println!(
        "  Storage Class: {}",
        dash_if_empty(volume.storage_class.as_deref())
    );
    println!("  Access Modes: {}", volume.access_modes.join(", "));
    println!("  Claim: {}", volume.claim_name);
    println!("  Namespace: {}", volume.namespace);
    println!("  Created: {}", volume.created_at);
    if let Some(user) = &volume.username {
        println!("  User: {user}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn task_file_requires_run() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "name: demo\nsetup: pip install -r requirements.txt").unwrap();
        let err = load_task_file(&file.path().to_path_buf()).unwrap_err();
        assert!(err.to_string().contains("'run' field is required"));
    }

    #[test]
    fn task_file_parses_yaml_into_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "run: python train.py\nnum_nodes: 2\nenvs:\n  MODE: fast"
        )
        .unwrap();
        let task = load_task_file(&file.path().to_path_buf()).unwrap();
        assert_eq!(task["run"], "python train.py");
        assert_eq!(task["num_nodes"], 2);
        assert_eq!(task["envs"]["MODE"], "fast");
    }

    #[test]
    fn cli_parses_nested_subcommands() {
        let cli = Cli::try_parse_from(["skiff", "jobs", "list", "--all-users"]).unwrap();
        match cli.command {
            Command::Jobs(JobsCommand::List { all_users, details }) => {
                assert!(all_users);
                assert!(!details);
            }
            other => panic!("unexpected command: {other:?}"),
        }

        let cli =
            Cli::try_parse_from(["skiff", "volumes", "create", "data", "10Gi", "-a", "ReadWriteMany"])
                .unwrap();
        match cli.command {
            Command::Volumes(VolumesCommand::Create { name, size, access_modes, .. }) => {
                assert_eq!(name, "data");
                assert_eq!(size, "10Gi");
                assert_eq!(access_modes, "ReadWriteMany");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}

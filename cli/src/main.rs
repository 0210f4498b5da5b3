use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use taskflow_core::types::timestamp;
use taskflow_core::{
    Config, Filter, NewTask, ReqwestTransport, TaskFlow, TaskId, TaskListState, TaskPatch, TaskStatus,
};
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

mod render;

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Parser, Debug)]
#[command(author, version, about = "Organize your tasks from the terminal")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an account and log in
    Register { username: String, password: String },
    /// Log in and remember the session
    Login { username: String, password: String },
    /// Forget the stored session
    Logout,
    #[command(flatten)]
    Task(TaskCommand),
}

/// Commands that need a logged-in session.
#[derive(Subcommand, Debug)]
enum TaskCommand {
    /// Show tasks
    List {
        #[arg(short, long, default_value = "all")]
        filter: Filter,
    },
    /// Show task counts
    Stats,
    /// Create a task
    Add {
        title: String,
        #[arg(short, long)]
        description: Option<String>,
        /// e.g. 2025-04-15T17:00 or an RFC 3339 timestamp
        #[arg(long, value_parser = parse_deadline)]
        deadline: Option<DateTime<Utc>>,
    },
    /// Move a task to its next status (todo -> in_progress -> done -> todo)
    Cycle { id: TaskId },
    /// Set a task's status
    Status { id: TaskId, status: TaskStatus },
    /// Change a task's title, description or deadline
    Edit {
        id: TaskId,
        #[arg(long)]
        title: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
        #[arg(long, value_parser = parse_deadline)]
        deadline: Option<DateTime<Utc>>,
    },
    /// Delete a task
    Rm { id: TaskId },
}

fn parse_deadline(s: &str) -> Result<DateTime<Utc>, String> {
    timestamp::parse(s).map_err(|e| format!("invalid deadline `{s}`: {e}"))
}

fn validate_registration(username: &str, password: &str) -> Result<()> {
    if username.trim().is_empty() || password.is_empty() {
        bail!("Please fill in all fields");
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        bail!("Password must be at least {MIN_PASSWORD_LEN} characters long");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = Config::load();
    debug!(api = %config.api_base_url, session = %config.token_path.display(), "loaded config");
    let app = TaskFlow::from_config(&config);
    app.start().await;

    match args.command {
        Command::Register { username, password } => {
            validate_registration(&username, &password)?;
            app.sign_up(&username, &password).await?;
            println!("Account created. Logged in as {username}.");
            show(&app, Filter::All);
        }
        Command::Login { username, password } => {
            app.sign_in(&username, &password).await?;
            println!("Logged in as {username}.");
            show(&app, Filter::All);
        }
        Command::Logout => {
            app.sign_out();
            println!("Logged out.");
        }
        Command::Task(command) => {
            if !app.session().is_authenticated() {
                bail!("Not logged in. Run `taskflow login <username> <password>` first.");
            }
            run(&app, command).await?;
        }
    }
    Ok(())
}

async fn run(app: &TaskFlow<ReqwestTransport>, command: TaskCommand) -> Result<()> {
    let tasks = app.tasks();
    let filter = match command {
        TaskCommand::List { filter } => {
            loaded(tasks.snapshot())?;
            filter
        }
        TaskCommand::Stats => {
            let state = loaded(tasks.snapshot())?;
            println!("{}", render::stats(&state.stats()));
            return Ok(());
        }
        TaskCommand::Add { title, description, deadline } => {
            let id = tasks.add(NewTask { title, description, deadline }).await?;
            println!("Created task {id}.");
            Filter::All
        }
        TaskCommand::Cycle { id } => {
            let status = tasks.cycle(id).await?;
            println!("Task {id} is now {status}.");
            Filter::All
        }
        TaskCommand::Status { id, status } => {
            tasks.set_status(id, status).await?;
            println!("Task {id} is now {status}.");
            Filter::All
        }
        TaskCommand::Edit { id, title, description, deadline } => {
            let patch = TaskPatch { title, description, status: None, deadline };
            if patch.is_empty() {
                bail!("Nothing to change: pass --title, --description or --deadline.");
            }
            tasks.update(id, &patch).await?;
            println!("Task {id} updated.");
            Filter::All
        }
        TaskCommand::Rm { id } => {
            tasks.remove(id).await?;
            println!("Task {id} deleted.");
            Filter::All
        }
    };
    show(app, filter);
    Ok(())
}

/// Fail unless a task list has been loaded, naming the last failure.
fn loaded(state: TaskListState) -> Result<TaskListState> {
    if !state.loaded {
        bail!(
            "Could not load tasks: {}",
            state.last_error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(state)
}

fn show(app: &TaskFlow<ReqwestTransport>, filter: Filter) {
    let state = app.tasks().snapshot();
    if let Some(e) = &state.last_error {
        eprintln!("warning: task list may be out of date: {e}");
    }
    println!("{}", render::task_list(&state, filter, Utc::now()));
    println!("\n{}", render::stats(&state.stats()));
}

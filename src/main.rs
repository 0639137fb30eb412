use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use agent_provider::{RunMessage, ToolCallRequest};
use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use dataframe_chat::chat::ChatService;
use dataframe_chat::config::EnvConfig;
use dataframe_chat::uploads::load_upload;
use dataframe_chat::{logging, prompt, providers};
use session_store::{
    LogEntryKind, SessionManager, SessionStatus, SqliteMetadataStore, UploadOutcome,
};
use tool_bridge::{tool_definitions, ScriptRunner};

/// Chat with an agent about your tabular data
#[derive(Debug, Parser)]
#[command(name = "dataframe_chat", version, about)]
struct Cli {
    /// Session catalog database (overrides SESSION_DB)
    #[arg(long, global = true)]
    session_db: Option<PathBuf>,

    /// Conversation log directory (overrides MESSAGE_DB)
    #[arg(long, global = true)]
    message_db: Option<PathBuf>,

    /// Root of the per-session working folders (overrides CACHE_ROOT)
    #[arg(long, global = true)]
    cache_root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create a new chat session
    New {
        /// Display name; defaults to a timestamp label
        #[arg(long)]
        name: Option<String>,
    },

    /// List active sessions
    List,

    /// Rename a session
    Rename { id: String, name: String },

    /// Soft-delete a session (its folder is kept)
    Delete { id: String },

    /// List the files in a session's working folder
    Files { id: String },

    /// Copy local files into a session's working folder
    Upload {
        id: String,
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Print the tool descriptors exposed to the agent
    Tools,

    /// Run a JSON array of tool calls against a session
    Invoke { id: String, calls: PathBuf },

    /// Print a session's conversation history
    History { id: String },

    /// Send a message and print the agent's reply
    Send {
        id: String,
        message: String,
        /// Files to upload with the message
        #[arg(long = "upload")]
        uploads: Vec<PathBuf>,
    },
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = EnvConfig::from_env()?;
    logging::init(&config.log_filter);

    if let Commands::Tools = cli.command {
        println!("{}", serde_json::to_string_pretty(&tool_definitions())?);
        return Ok(());
    }

    let mut service = build_service(&cli, &config)?;

    match cli.command {
        Commands::New { name } => {
            let record = service.create_chat(name.as_deref())?;
            println!("{}\t{}\t{}", record.id, record.name, record.folder);
        }
        Commands::List => {
            for record in service.sessions().list_active_sessions()? {
                println!("{}\t{}\t{}", record.id, record.name, record.updated);
            }
        }
        Commands::Rename { id, name } => {
            let name = name.trim();
            if name.is_empty() {
                println!("ignored empty name");
                return Ok(());
            }
            if !service.sessions_mut().rename_session(&id, name)? {
                bail!("session '{id}' not found");
            }
        }
        Commands::Delete { id } => {
            if !service
                .sessions_mut()
                .set_session_status(&id, SessionStatus::Deleted)?
            {
                bail!("session '{id}' not found");
            }
        }
        Commands::Files { id } => {
            let record = active_record(&service, &id)?;
            for name in service.sessions().list_files(&record)? {
                println!("{name}");
            }
        }
        Commands::Upload { id, paths } => {
            let record = active_record(&service, &id)?;
            let files = paths
                .iter()
                .map(|path| load_upload(path).with_context(|| format!("reading {}", path.display())))
                .collect::<anyhow::Result<Vec<_>>>()?;

            for status in service.sessions().save_uploaded_files(&record, &files) {
                match status.outcome {
                    UploadOutcome::Saved => println!("{}: saved", status.name),
                    UploadOutcome::Failed { kind, message } => {
                        println!("{}: failed ({kind}, {message})", status.name);
                    }
                }
            }
        }
        Commands::Invoke { id, calls: path } => {
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            let calls: Vec<ToolCallRequest> = serde_json::from_str(&raw)
                .with_context(|| format!("parsing tool calls in {}", path.display()))?;

            let results = service.invoke(&id, &calls)?;
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
        Commands::History { id } => {
            for message in service.history(&id)? {
                println!("{}", render_message(&message));
            }
        }
        Commands::Send {
            id,
            message,
            uploads,
        } => {
            let files = uploads
                .iter()
                .map(|path| load_upload(path).with_context(|| format!("reading {}", path.display())))
                .collect::<anyhow::Result<Vec<_>>>()?;

            for entry in service.send_message(&id, &message, &files)? {
                if matches!(entry.kind, LogEntryKind::UserText { .. }) {
                    continue;
                }
                println!("{}", render_message(&RunMessage::from(entry.kind)));
            }
        }
        Commands::Tools => {}
    }

    Ok(())
}

fn build_service(cli: &Cli, config: &EnvConfig) -> anyhow::Result<ChatService<SqliteMetadataStore>> {
    let session_db = cli.session_db.clone().unwrap_or_else(|| config.session_db.clone());
    let message_db = cli.message_db.clone().unwrap_or_else(|| config.message_db.clone());
    let cache_root = cli.cache_root.clone().unwrap_or_else(|| config.cache_root.clone());

    let store = SqliteMetadataStore::open(&session_db)?;
    let sessions = SessionManager::new(store, cache_root)?;
    let provider = providers::provider_for_id(&config.provider_id).map_err(anyhow::Error::msg)?;
    let runner = ScriptRunner::new(
        config.python.clone(),
        Duration::from_secs(config.script_timeout_sec),
    );
    let instructions = prompt::system_instructions(config.system_instructions.as_deref());

    Ok(ChatService::new(
        sessions,
        message_db,
        provider,
        runner,
        instructions,
    ))
}

fn active_record(
    service: &ChatService<SqliteMetadataStore>,
    id: &str,
) -> anyhow::Result<session_store::SessionRecord> {
    match service.sessions().find_session(id)? {
        Some(record) if record.status == SessionStatus::Active => Ok(record),
        Some(_) => bail!("session '{id}' has been deleted"),
        None => bail!("session '{id}' not found"),
    }
}

fn render_message(message: &RunMessage) -> String {
    match message {
        RunMessage::UserText { text } | RunMessage::AssistantText { text } => {
            format!("[{}] {text}", message.role())
        }
        RunMessage::ToolCall {
            tool_name,
            arguments,
            ..
        } => format!("[{}] call {tool_name} {arguments}", message.role()),
        RunMessage::ToolResult {
            tool_name,
            content,
            is_error,
            ..
        } => {
            let label = if *is_error { "error" } else { "result" };
            format!("[{}] {label} {tool_name} {content}", message.role())
        }
    }
}

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use agent_provider::{
    RunEvent, RunId, RunMessage, RunProvider, RunRequest, ToolCallRequest, ToolResult,
};
use session_store::{
    conversation_log_path, ConversationLog, LogEntry, LogEntryKind, MetadataStore,
    SessionManager, SessionRecord, SessionStatus, SessionStoreError, UploadedFile,
};
use thiserror::Error;
use tool_bridge::{
    invoke_tool, invoke_tools, ScriptRunner, ToolContext, ToolError, ToolErrorKind,
};
use tracing::{debug, info, warn};

use crate::prompt::{format_user_message, pick_opening};

#[derive(Debug, Error)]
pub enum ChatError {
    #[error(transparent)]
    Store(#[from] SessionStoreError),

    #[error("session working directory unavailable: {0}")]
    WorkingDir(#[from] ToolError),

    #[error("session '{id}' not found")]
    SessionNotFound { id: String },

    #[error("session '{id}' has been deleted")]
    SessionDeleted { id: String },

    #[error("run {run_id} failed: {error}")]
    RunFailed { run_id: RunId, error: String },
}

/// Drives conversation turns: history, provider runs, and tool dispatch for each session.
pub struct ChatService<S> {
    sessions: SessionManager<S>,
    log_root: PathBuf,
    provider: Arc<dyn RunProvider>,
    runner: ScriptRunner,
    instructions: String,
    next_run_id: RunId,
}

impl<S: MetadataStore> ChatService<S> {
    pub fn new(
        sessions: SessionManager<S>,
        log_root: impl Into<PathBuf>,
        provider: Arc<dyn RunProvider>,
        runner: ScriptRunner,
        instructions: impl Into<String>,
    ) -> Self {
        Self {
            sessions,
            log_root: log_root.into(),
            provider,
            runner,
            instructions: instructions.into(),
            next_run_id: 1,
        }
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionManager<S> {
        &self.sessions
    }

    pub fn sessions_mut(&mut self) -> &mut SessionManager<S> {
        &mut self.sessions
    }

    #[must_use]
    pub fn log_root(&self) -> &Path {
        &self.log_root
    }

    #[must_use]
    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    /// Creates a session and seeds its history with a greeting.
    pub fn create_chat(&mut self, display_name: Option<&str>) -> Result<SessionRecord, ChatError> {
        let record = self.sessions.create_session(display_name)?;

        let mut log = ConversationLog::create(&self.log_root, &record.id)?;
        let greeting = pick_opening(&mut rand::thread_rng());
        log.append(LogEntryKind::AssistantText {
            text: greeting.to_string(),
        })?;

        info!(session_id = %record.id, name = %record.name, "created chat");
        Ok(record)
    }

    /// Full history of a session, deleted ones included.
    pub fn history(&self, session_id: &str) -> Result<Vec<RunMessage>, ChatError> {
        self.find_session(session_id)?;

        let path = conversation_log_path(&self.log_root, session_id);
        if !path.exists() {
            return Ok(Vec::new());
        }

        Ok(ConversationLog::open(&path)?.messages())
    }

    /// Runs tool calls directly against a session's working directory.
    pub fn invoke(
        &self,
        session_id: &str,
        calls: &[ToolCallRequest],
    ) -> Result<Vec<ToolResult>, ChatError> {
        let record = self.active_session(session_id)?;
        let ctx = ToolContext::new(self.sessions.working_dir(&record))?;

        Ok(invoke_tools(calls, &ctx, &self.runner))
    }

    /// Runs one user turn and returns the history entries it appended.
    ///
    /// Uploads are written first and described in the user message. Tool calls and
    /// their results are logged as they happen; assistant text is logged once the
    /// run finishes. A failed run keeps the user and tool entries but no assistant reply.
    pub fn send_message(
        &mut self,
        session_id: &str,
        text: &str,
        uploads: &[UploadedFile],
    ) -> Result<Vec<LogEntry>, ChatError> {
        let record = self.active_session(session_id)?;
        let statuses = self.sessions.save_uploaded_files(&record, uploads);
        let message = format_user_message(text, &statuses);

        let mut log = ConversationLog::open_or_create(&self.log_root, session_id)?;
        let first_new = log.entries().len();
        log.append(LogEntryKind::UserText { text: message })?;

        let ctx = ToolContext::new(self.sessions.working_dir(&record))?;
        let run_id = self.next_run_id;
        self.next_run_id += 1;

        let request = RunRequest {
            run_id,
            messages: log.messages(),
            instructions: self.instructions.clone(),
        };
        info!(session_id, run_id, history = request.messages.len(), "starting run");

        let runner = &self.runner;
        let provider = Arc::clone(&self.provider);
        let mut log_error: Option<SessionStoreError> = None;
        let mut turn = TurnOutput::default();

        let outcome = {
            let mut execute_tool = |call: ToolCallRequest| -> ToolResult {
                dispatch_logged(&mut log, &mut log_error, &call, &ctx, runner)
            };
            let mut emit = |event: RunEvent| turn.apply(run_id, event);

            catch_unwind(AssertUnwindSafe(|| {
                provider.run(request, &mut execute_tool, &mut emit)
            }))
        };

        if let Some(error) = log_error {
            return Err(error.into());
        }

        let failure = match outcome {
            Ok(Ok(())) => turn.failure(),
            Ok(Err(error)) => Some(error),
            Err(_) => Some("Provider panicked".to_string()),
        };
        if let Some(error) = failure {
            warn!(session_id, run_id, %error, "run failed");
            return Err(ChatError::RunFailed { run_id, error });
        }

        if !turn.text.is_empty() {
            log.append(LogEntryKind::AssistantText { text: turn.text })?;
        }
        info!(session_id, run_id, "run finished");

        Ok(log.entries()[first_new..].to_vec())
    }

    fn find_session(&self, session_id: &str) -> Result<SessionRecord, ChatError> {
        self.sessions
            .find_session(session_id)?
            .ok_or_else(|| ChatError::SessionNotFound {
                id: session_id.to_string(),
            })
    }

    fn active_session(&self, session_id: &str) -> Result<SessionRecord, ChatError> {
        let record = self.find_session(session_id)?;
        if record.status == SessionStatus::Deleted {
            return Err(ChatError::SessionDeleted {
                id: session_id.to_string(),
            });
        }

        Ok(record)
    }
}

#[derive(Debug, Default)]
struct TurnOutput {
    text: String,
    finished: bool,
    failed: Option<String>,
}

impl TurnOutput {
    fn apply(&mut self, run_id: RunId, event: RunEvent) {
        if event.run_id() != run_id {
            debug!(expected = run_id, got = event.run_id(), "ignoring stale run event");
            return;
        }

        match event {
            RunEvent::Started { .. } => {}
            RunEvent::Chunk { text, .. } => self.text.push_str(&text),
            RunEvent::Finished { .. } => self.finished = true,
            RunEvent::Failed { error, .. } => self.failed = Some(error),
        }
    }

    fn failure(&self) -> Option<String> {
        if let Some(error) = &self.failed {
            return Some(error.clone());
        }

        (!self.finished).then(|| "Provider exited without terminal event".to_string())
    }
}

/// Runs one tool call with its request and result logged around it.
///
/// Once the log has failed nothing else is dispatched, so no tool runs without a record.
fn dispatch_logged(
    log: &mut ConversationLog,
    log_error: &mut Option<SessionStoreError>,
    call: &ToolCallRequest,
    ctx: &ToolContext,
    runner: &ScriptRunner,
) -> ToolResult {
    record_message(
        log,
        log_error,
        RunMessage::ToolCall {
            call_id: call.call_id.clone(),
            tool_name: call.tool_name.clone(),
            arguments: call.arguments.clone(),
        },
    );
    if log_error.is_some() {
        let error = ToolError::new(
            ToolErrorKind::Io,
            "Conversation log is unavailable; tool call was not run",
        );
        return ToolResult::error(&call.call_id, &call.tool_name, error.to_value());
    }

    let result = invoke_tool(call, ctx, runner);
    record_message(log, log_error, result.clone().into_message());
    result
}

fn record_message(
    log: &mut ConversationLog,
    first_error: &mut Option<SessionStoreError>,
    message: RunMessage,
) {
    if first_error.is_some() {
        return;
    }

    if let Err(error) = log.append_message(message) {
        *first_error = Some(error);
    }
}

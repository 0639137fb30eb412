//! Chat back-end for exploring tabular data with an LLM agent.
//!
//! ## Layout
//!
//! - `session_store`: SQLite session catalog, per-session working folders, uploads,
//!   and the JSONL conversation log.
//! - `tool_bridge`: the `save_text` / `execute_script` tools and their dispatcher.
//! - `agent_provider`: provider-neutral run contract; `agent_provider_mock` ships the
//!   deterministic scripted provider.
//! - this crate: environment config, logging, prompts, and the [`chat::ChatService`]
//!   turn driver used by the `dataframe_chat` binary.
//!
//! ## Configuration
//!
//! | Variable | Default |
//! | --- | --- |
//! | `SESSION_DB` | `data/sessions.db` |
//! | `MESSAGE_DB` | `data/messages` |
//! | `CACHE_ROOT` | `data/cache` |
//! | `DATAFRAME_CHAT_PYTHON` | `python3` |
//! | `DATAFRAME_CHAT_SCRIPT_TIMEOUT_SEC` | `300` |
//! | `DATAFRAME_CHAT_PROVIDER` | `mock` |
//! | `DATAFRAME_CHAT_LOG` | `info` |
//! | `DATAFRAME_CHAT_SYSTEM_INSTRUCTIONS` | built-in conversation guidelines |
//!
//! Conversation memory contract: the log owns model-facing history and the full
//! history is replayed to the provider on every turn as `RunMessage` items.

pub mod chat;
pub mod config;
pub mod logging;
pub mod prompt;
pub mod providers;
pub mod uploads;

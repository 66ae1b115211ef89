//! CLI command implementations
//!
//! Every command loads the configuration, opens the engine on the file
//! store and returns the JSON `data` of its response. `run` writes the
//! response envelope.

use std::path::Path;

use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::authority::{AuthorityEngine, StartupOptions, StatusChange};
use crate::config::AuthorityConfig;
use crate::model::RevisionSubmission;
use crate::observability::{init_logging, Event};

use super::args::{Command, StatusAction};
use super::errors::CliResult;
use super::io::{read_request, write_error, write_response};

/// Parse arguments, run the command and write its response
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    match run_command(cli.command) {
        Ok(data) => write_response(data),
        Err(err) => {
            write_error(err.code(), &err.to_string())?;
            Err(err)
        }
    }
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<Value> {
    match cmd {
        Command::Init { config } => init(&config),
        Command::Register { config } => register(&config, &read_request()?),
        Command::Graph {
            config,
            document,
            force_rebuild,
        } => with_engine(&config, |engine| {
            to_data(&engine.get_revision_graph(&document, force_rebuild)?)
        }),
        Command::Compare {
            config,
            document,
            from,
            to,
        } => with_engine(&config, |engine| {
            to_data(&engine.compare_revisions(&document, &from, &to)?)
        }),
        Command::Lineage { config, document, part } => with_engine(&config, |engine| {
            to_data(&engine.validate_part_lineage(&part, &document)?)
        }),
        Command::Validate { config, document } => with_engine(&config, |engine| {
            let anomalies = engine.validate_consistency(&document)?;
            to_data(&serde_json::json!({
                "document_id": document,
                "consistent": anomalies.is_empty(),
                "anomalies": anomalies,
            }))
        }),
        Command::Status {
            config,
            document,
            revision,
            action,
            actor,
            notes,
            signature,
        } => {
            let change = status_change(action, actor, notes, signature);
            with_engine(&config, |engine| {
                to_data(&engine.transition_status(&document, &revision, change)?)
            })
        }
        Command::Trail { config, document } => {
            with_engine(&config, |engine| to_data(&engine.audit_trail(&document)?))
        }
    }
}

/// Create the data directory, open the store and run the startup checks.
///
/// Safe to run again on an existing data directory.
pub fn init(config_path: &Path) -> CliResult<Value> {
    let config = load_config(config_path)?;
    let engine = AuthorityEngine::from_config(&config)?;
    let report = engine.initialize(&StartupOptions::from(&config))?;
    to_data(&report)
}

/// Register the submission in `request`; loose part records are coerced.
pub fn register(config_path: &Path, request: &Value) -> CliResult<Value> {
    let submission = RevisionSubmission::from_loose_json(request)?;
    with_engine(config_path, |engine| to_data(&engine.register_revision(submission)?))
}

fn status_change(
    action: StatusAction,
    actor: String,
    notes: Option<String>,
    signature: Option<String>,
) -> StatusChange {
    match action {
        StatusAction::Submit => StatusChange::SubmitForReview { actor },
        StatusAction::Approve => StatusChange::Approve { actor, notes, signature },
        StatusAction::Reject => StatusChange::Reject { actor, notes },
    }
}

fn with_engine<F>(config_path: &Path, f: F) -> CliResult<Value>
where
    F: FnOnce(&AuthorityEngine) -> CliResult<Value>,
{
    let config = load_config(config_path)?;
    let engine = AuthorityEngine::from_config(&config)?;
    f(&engine)
}

fn load_config(path: &Path) -> CliResult<AuthorityConfig> {
    let config = AuthorityConfig::load(path)?;
    init_logging(&config.logging);
    info!(
        event = Event::ConfigLoaded.as_str(),
        path = %path.display(),
        data_dir = %config.data_dir.display(),
        "configuration loaded"
    );
    Ok(config)
}

fn to_data<T: Serialize>(value: &T) -> CliResult<Value> {
    Ok(serde_json::to_value(value)?)
}

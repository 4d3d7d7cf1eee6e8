use std::{fs, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use editor_core::{
    status_text, BufferSurface, EditorSurface, ExerciseSession, RemoteSync, SessionOptions,
};
use exercise_api::ExerciseApi;
use shared::domain::ExerciseId;
use storage::DraftStore;
use tracing::info;

mod config;

/// Headless exercise editing session: sync a local file against the
/// exercise service once, printing the save status and lint findings.
#[derive(Parser, Debug)]
struct Args {
    /// Exercise identifier on the remote service.
    #[arg(long)]
    exercise: i64,
    /// Source file holding the exercise code.
    #[arg(long)]
    file: PathBuf,
    /// Override the configured service URL.
    #[arg(long)]
    server_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let args = Args::parse();
    let mut settings = config::load_settings();
    if let Some(server_url) = args.server_url {
        settings.server_url = server_url;
    }

    let exercise_id = ExerciseId(args.exercise);
    let code = fs::read_to_string(&args.file)
        .with_context(|| format!("failed to read '{}'", args.file.display()))?;

    let store = DraftStore::open(&settings.database_url).await?;
    let api = ExerciseApi::new(&settings.server_url, &settings.csrf_token)?;
    let surface = Arc::new(BufferSurface::new(code));
    let session = ExerciseSession::new(
        exercise_id,
        Arc::clone(&surface) as Arc<dyn EditorSurface>,
        Arc::new(api) as Arc<dyn RemoteSync>,
        store,
        SessionOptions::default(),
    );

    if let Some(draft) = session.load_draft().await? {
        if draft.code != surface.content() {
            info!("restoring local draft from {}", draft.timestamp);
            surface.set_content(&draft.code);
            if let Some(cursor) = draft.cursor_position {
                surface.set_cursor(cursor);
            }
            if let Some(selection) = draft.selection {
                surface.set_selection(selection);
            }
        }
    }

    session.autosave().save().await;
    session.lint().check_code().await;

    println!(
        "status: {}",
        status_text(session.autosave().state().await, Utc::now())
    );

    let presented = session.lint().presented_issues().await;
    if presented.is_empty() {
        println!("lint: no issues");
    } else {
        let counts = session.lint().counts().await;
        println!(
            "lint: {} issues ({} errors, {} warnings, {} infos)",
            counts.total(),
            counts.errors,
            counts.warnings,
            counts.infos
        );
        for (index, issue) in &presented {
            println!(
                "  [{index}] {:?} at {}:{}: {}",
                issue.severity, issue.line, issue.column, issue.message
            );
        }
    }

    session.shutdown().await?;
    Ok(())
}

//! `folio` — drive Folio editing sessions from the command line.
//!
//! Usage:
//!   folio new "Release notes" --kind news
//!   folio add 0192ab PARAGRAPH "First paragraph"
//!   folio move 0192ab 12 0
//!   folio publish 0192ab
//!   folio history 0192ab
//!   folio restore 0192ab 3
//!
//! Documents are addressed by any unique prefix of their hex id.

mod commands;
mod text;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::Instrument;

use folio_editor::EditorConfig;
use folio_store::DocumentDb;
use folio_types::{BlockType, ContentKind};

use crate::commands::App;

/// Block-based document editor.
#[derive(Parser, Debug)]
#[command(name = "folio")]
#[command(about = "Edit block-based documents")]
struct Args {
    /// SQLite database (default: data dir/folio/folio.db)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Editor config TOML (default: config dir/folio/editor.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a document
    New {
        title: String,
        #[arg(long, default_value = "article", value_parser = parse_kind)]
        kind: ContentKind,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// List documents, featured first
    List,
    /// Print a document's blocks
    Show {
        document: String,
        /// Render the sanitized preview as HTML
        #[arg(long)]
        html: bool,
    },
    /// Append a block
    Add {
        document: String,
        #[arg(value_parser = parse_block_type)]
        block_type: BlockType,
        text: Option<String>,
        /// Insert at this position instead of appending
        #[arg(long)]
        at: Option<usize>,
    },
    /// Replace a block's text
    Edit {
        document: String,
        block: String,
        text: String,
    },
    /// Move a block to a new position
    Move {
        document: String,
        block: String,
        to: usize,
    },
    /// Delete a block
    Rm { document: String, block: String },
    /// Publish (or unpublish) a document
    Publish {
        document: String,
        #[arg(long)]
        undo: bool,
    },
    /// Archive a document
    Archive { document: String },
    /// Move a document into (or out of) the featured grid
    Feature {
        document: String,
        #[arg(long)]
        off: bool,
        /// Position within the target grid
        #[arg(long)]
        at: Option<usize>,
    },
    /// List a document's revisions
    History { document: String },
    /// Restore a document to a revision
    Restore { document: String, revision: u64 },
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::New { .. } => "new",
            Command::List => "list",
            Command::Show { .. } => "show",
            Command::Add { .. } => "add",
            Command::Edit { .. } => "edit",
            Command::Move { .. } => "move",
            Command::Rm { .. } => "rm",
            Command::Publish { .. } => "publish",
            Command::Archive { .. } => "archive",
            Command::Feature { .. } => "feature",
            Command::History { .. } => "history",
            Command::Restore { .. } => "restore",
        }
    }
}

fn parse_kind(s: &str) -> Result<ContentKind, String> {
    ContentKind::from_str(s).ok_or_else(|| format!("unknown content kind '{s}'"))
}

fn parse_block_type(s: &str) -> Result<BlockType, String> {
    BlockType::from_str(s).ok_or_else(|| {
        let known: Vec<&str> = BlockType::ALL.iter().map(|t| t.as_str()).collect();
        format!("unknown block type '{s}' (one of {})", known.join(", "))
    })
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("folio")
        .join("folio.db")
}

fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("folio")
        .join("editor.toml")
}

#[tokio::main]
async fn main() -> Result<()> {
    let _telemetry = folio_telemetry::init_with("folio", "warn");
    let args = Args::parse();

    let config = EditorConfig::load_or_default(&args.config.unwrap_or_else(default_config_path));
    let db_path = args.db.unwrap_or_else(default_db_path);
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let db = DocumentDb::open(&db_path).with_context(|| format!("opening {}", db_path.display()))?;
    let app = App::new(Arc::new(db), config);

    let span = tracing::info_span!("cli.command", command = args.command.name());
    run(&app, args.command).instrument(span).await
}

async fn run(app: &App<DocumentDb>, command: Command) -> Result<()> {
    match command {
        Command::New { title, kind, description } => {
            let meta = app.new_document(&title, kind, &description)?;
            println!("{}  {}", meta.id.short(), meta.title);
        }
        Command::List => print!("{}", app.list()?),
        Command::Show { document, html } => print!("{}", app.show(&document, html)?),
        Command::Add { document, block_type, text, at } => {
            let id = app.add(&document, block_type, text.as_deref(), at).await?;
            println!("added {id}");
        }
        Command::Edit { document, block, text } => {
            app.edit(&document, &block, &text).await?;
            println!("saved");
        }
        Command::Move { document, block, to } => {
            if app.move_block(&document, &block, to).await? {
                println!("moved");
            } else {
                println!("already there");
            }
        }
        Command::Rm { document, block } => {
            app.remove(&document, &block).await?;
            println!("removed");
        }
        Command::Publish { document, undo } => {
            let status = app.publish(&document, !undo).await?;
            println!("{status}");
        }
        Command::Archive { document } => {
            app.archive(&document).await?;
            println!("archived");
        }
        Command::Feature { document, off, at } => {
            let change = app.feature(&document, !off, at).await?;
            println!("{change:?}");
        }
        Command::History { document } => print!("{}", app.history(&document)?),
        Command::Restore { document, revision } => {
            let restored = app.restore(&document, revision)?;
            println!("restored as {restored}");
        }
    }
    Ok(())
}

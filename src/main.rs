//! # Helpdesk CLI (`helpdesk`)
//!
//! ## Usage
//!
//! ```bash
//! helpdesk --config ./config/helpdesk.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `helpdesk init` | Create the SQLite database and run schema migrations |
//! | `helpdesk ask "<question>"` | Answer a question through the full pipeline |
//! | `helpdesk doc add/update/delete/list/show` | Manage knowledge-base documents |
//! | `helpdesk reindex` | Re-chunk and re-embed every document |
//! | `helpdesk faq list` | Show cached FAQ entries by hits |
//! | `helpdesk questions top` | Most frequently asked questions |
//! | `helpdesk intents` | Question counts per intent |
//! | `helpdesk stats` | Database and usage summary |
//! | `helpdesk feedback add/list` | Record whether an answer helped, review votes |
//!
//! Logging goes to stderr and is controlled by `RUST_LOG`
//! (e.g. `RUST_LOG=helpdesk_core=debug`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use uni_helpdesk::{ask, config, documents, feedback, migrate, stats};

/// University helpdesk assistant.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/helpdesk.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "helpdesk",
    about = "University helpdesk: intent routing, FAQ cache and document-grounded answers",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/helpdesk.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Ask a question.
    ///
    /// Routes the question, checks the FAQ cache, retrieves document
    /// chunks and generates an answer.
    Ask {
        question: String,

        /// Print the full answer and metadata as JSON.
        #[arg(long)]
        json: bool,

        /// Also print stage errors, debug notes and the request id.
        #[arg(long, short)]
        verbose: bool,
    },

    /// Manage knowledge-base documents.
    Doc {
        #[command(subcommand)]
        action: DocAction,
    },

    /// Re-chunk and re-embed every document.
    ///
    /// Useful after changing chunking settings or the embedding model.
    Reindex,

    /// Inspect the FAQ cache.
    Faq {
        #[command(subcommand)]
        action: FaqAction,
    },

    /// Inspect the question log.
    Questions {
        #[command(subcommand)]
        action: QuestionsAction,
    },

    /// Question counts per intent.
    Intents,

    /// Show database and usage statistics.
    Stats,

    /// Record or review answer feedback.
    Feedback {
        #[command(subcommand)]
        action: FeedbackAction,
    },
}

#[derive(Subcommand)]
enum FeedbackAction {
    /// Record whether an answer was helpful.
    Add {
        /// The question that was asked.
        #[arg(long)]
        question: String,

        /// The answer that was shown.
        #[arg(long, default_value = "")]
        answer: String,

        /// Mark the answer as helpful.
        #[arg(long, conflicts_with = "not_helpful")]
        helpful: bool,

        /// Mark the answer as not helpful.
        #[arg(long)]
        not_helpful: bool,

        #[arg(long)]
        comment: Option<String>,
    },
    /// Show recent feedback, newest first.
    List {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

#[derive(Subcommand)]
enum DocAction {
    /// Add a document and index it.
    Add {
        #[arg(long)]
        title: String,
        /// Read content from a file.
        #[arg(long)]
        file: Option<PathBuf>,
        /// Inline content.
        #[arg(long)]
        text: Option<String>,
        /// Recorded on the revision row.
        #[arg(long)]
        by: Option<String>,
    },
    /// Replace a document's content and re-index it.
    Update {
        id: i64,
        /// New title; keeps the current one when omitted.
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        file: Option<PathBuf>,
        #[arg(long)]
        text: Option<String>,
        #[arg(long)]
        by: Option<String>,
    },
    /// Delete a document and its vectors.
    Delete { id: i64 },
    /// List documents.
    List,
    /// Print a document.
    Show { id: i64 },
}

#[derive(Subcommand)]
enum FaqAction {
    /// List FAQ entries by hit count.
    List {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

#[derive(Subcommand)]
enum QuestionsAction {
    /// Most frequently asked questions.
    Top {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ask {
            question,
            json,
            verbose,
        } => {
            ask::run_ask(&cfg, &question, json, verbose).await?;
        }
        Commands::Doc { action } => match action {
            DocAction::Add {
                title,
                file,
                text,
                by,
            } => {
                let content = documents::read_content(file.as_deref(), text.as_deref())?;
                documents::run_add(&cfg, &title, &content, by.as_deref()).await?;
            }
            DocAction::Update {
                id,
                title,
                file,
                text,
                by,
            } => {
                let content = documents::read_content(file.as_deref(), text.as_deref())?;
                documents::run_update(&cfg, id, title.as_deref(), &content, by.as_deref())
                    .await?;
            }
            DocAction::Delete { id } => documents::run_delete(&cfg, id).await?,
            DocAction::List => documents::run_list(&cfg).await?,
            DocAction::Show { id } => documents::run_show(&cfg, id).await?,
        },
        Commands::Reindex => documents::run_reindex(&cfg).await?,
        Commands::Faq {
            action: FaqAction::List { limit },
        } => stats::run_faq_list(&cfg, limit).await?,
        Commands::Questions {
            action: QuestionsAction::Top { limit },
        } => stats::run_top_questions(&cfg, limit).await?,
        Commands::Intents => stats::run_intents(&cfg).await?,
        Commands::Stats => stats::run_stats(&cfg).await?,
        Commands::Feedback { action } => match action {
            FeedbackAction::Add {
                question,
                answer,
                helpful,
                not_helpful,
                comment,
            } => {
                if helpful == not_helpful {
                    anyhow::bail!("Pass exactly one of --helpful or --not-helpful");
                }
                feedback::run_feedback(&cfg, &question, &answer, helpful, comment.as_deref())
                    .await?;
            }
            FeedbackAction::List { limit } => feedback::run_feedback_list(&cfg, limit).await?,
        },
    }

    Ok(())
}

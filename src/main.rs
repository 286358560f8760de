//! receipt-ledger: scan receipts into an expense ledger from the command line.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::task::JoinHandle;

use receipt_ledger::config;
use receipt_ledger::db::{ReceiptImageStore, SqliteExpenseStore};
use receipt_ledger::ledger::LedgerRow;
use receipt_ledger::models::{Expense, ExpenseId};
use receipt_ledger::pipeline::ollama::OllamaClient;
use receipt_ledger::pipeline::{
    CategorySource, ExpenseDraft, FilePhotoSource, OllamaPredictor, OllamaVisionOcr,
    ProcessingError, ProcessingSession, ReceiptProcessor, RetryAffordance, SessionKind,
};
use receipt_ledger::pipeline_config::{
    PipelineConfig, CATEGORY_MODEL_ENV, OLLAMA_URL_ENV, VISION_MODEL_ENV,
};
use receipt_ledger::summary::summarize;

#[derive(Parser)]
#[command(name = "receipt-ledger", about = "Turn receipt photos into a categorized expense ledger.")]
#[command(version)]
struct Cli {
    /// Data directory holding the database and receipt images
    #[arg(long, global = true, env = config::DATA_DIR_ENV)]
    data_dir: Option<PathBuf>,

    /// Ollama server URL
    #[arg(long, global = true, env = OLLAMA_URL_ENV)]
    ollama_url: Option<String>,

    /// Vision model used to read receipts
    #[arg(long, global = true, env = VISION_MODEL_ENV)]
    vision_model: Option<String>,

    /// Text model used to suggest categories
    #[arg(long, global = true, env = CATEGORY_MODEL_ENV)]
    category_model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read a receipt photo and record it. Flags override what was read.
    Scan {
        /// Path to the receipt image
        image: PathBuf,
        #[arg(long)]
        merchant: Option<String>,
        #[arg(long)]
        amount: Option<f64>,
        /// Category (blank: suggested by the model)
        #[arg(long)]
        category: Option<String>,
    },
    /// Record an expense by hand.
    Add {
        #[arg(long)]
        merchant: String,
        #[arg(long)]
        amount: f64,
        /// Category (blank: suggested by the model)
        #[arg(long)]
        category: Option<String>,
    },
    /// Change fields of an existing expense.
    Edit {
        id: ExpenseId,
        #[arg(long)]
        merchant: Option<String>,
        #[arg(long)]
        amount: Option<f64>,
        #[arg(long)]
        category: Option<String>,
    },
    /// List expenses, newest first.
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Delete an expense.
    Delete { id: ExpenseId },
    /// Export all expenses as CSV.
    Export {
        /// Output file (default: stdout)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Import expenses from a CSV export.
    Import { file: PathBuf },
    /// Spending per category.
    Summary {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    receipt_ledger::init_tracing();
    let cli = Cli::parse();

    tracing::info!("{} v{}", config::APP_NAME, config::APP_VERSION);

    let data_dir = cli.data_dir.clone().unwrap_or_else(config::app_data_dir);
    let pipeline_config = pipeline_config(&cli);
    let processor = Arc::new(build_processor(&data_dir, &pipeline_config)?);
    processor.load().context("Failed to load expenses")?;

    match cli.command {
        Commands::Scan {
            image,
            merchant,
            amount,
            category,
        } => {
            let session = processor.begin(SessionKind::PhotoImport);
            let watcher = cancel_on_ctrl_c(&processor, &session);
            let source = FilePhotoSource::new(Some(image));

            let outcome: Result<Option<Expense>, ProcessingError> = async {
                let Some(scan) = processor.import_photo(&session, &source).await? else {
                    return Ok(None);
                };
                println!(
                    "Read: merchant={:?} amount={:.2}",
                    scan.fields.merchant, scan.fields.amount
                );
                let draft = ExpenseDraft {
                    merchant: merchant.unwrap_or(scan.fields.merchant),
                    amount: amount.unwrap_or(scan.fields.amount),
                    category: CategorySource::from_input(category.as_deref()),
                };
                processor.finalize(&session, draft).await.map(Some)
            }
            .await;
            watcher.abort();

            match outcome {
                Ok(Some(expense)) => print_saved(&expense),
                Ok(None) => println!("No photo selected."),
                Err(e) => return Err(report(e)),
            }
        }
        Commands::Add {
            merchant,
            amount,
            category,
        } => {
            let session = processor.begin(SessionKind::ManualEntry);
            let watcher = cancel_on_ctrl_c(&processor, &session);
            let draft = ExpenseDraft {
                merchant,
                amount,
                category: CategorySource::from_input(category.as_deref()),
            };
            let outcome = match processor.enter_manually(&session) {
                Ok(_) => processor.finalize(&session, draft).await,
                Err(e) => Err(e),
            };
            watcher.abort();
            print_saved(&outcome.map_err(report)?);
        }
        Commands::Edit {
            id,
            merchant,
            amount,
            category,
        } => {
            let Some(original) = processor.ledger().expenses().into_iter().find(|e| e.id == id)
            else {
                bail!("No expense with id {id}");
            };
            let session = processor.begin(SessionKind::Edit {
                original: original.clone(),
            });
            let watcher = cancel_on_ctrl_c(&processor, &session);
            let draft = ExpenseDraft {
                merchant: merchant.unwrap_or(original.merchant),
                amount: amount.unwrap_or(original.amount),
                // Keep the current category unless a new one is given.
                category: CategorySource::from_input(Some(
                    category.as_deref().unwrap_or(&original.category),
                )),
            };
            let outcome = match processor.enter_manually(&session) {
                Ok(_) => processor.finalize(&session, draft).await,
                Err(e) => Err(e),
            };
            watcher.abort();
            print_saved(&outcome.map_err(report)?);
        }
        Commands::List { json } => {
            if json {
                let expenses = processor.ledger().expenses();
                println!("{}", serde_json::to_string_pretty(&expenses)?);
            } else {
                for row in processor.ledger().snapshot() {
                    if let LedgerRow::Expense(expense) = row {
                        print_expense(&expense);
                    }
                }
            }
        }
        Commands::Delete { id } => {
            processor.delete_expense(id).map_err(report)?;
            println!("Deleted {id}");
        }
        Commands::Export { output } => {
            let bytes = processor.export_csv().map_err(report)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, &bytes)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    println!("Exported to {}", path.display());
                }
                None => print!("{}", String::from_utf8_lossy(&bytes)),
            }
        }
        Commands::Import { file } => {
            let bytes = std::fs::read(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let summary = processor.import_csv(&bytes).map_err(report)?;
            println!(
                "Imported {} expenses ({} skipped)",
                summary.imported, summary.skipped
            );
        }
        Commands::Summary { json } => {
            let summary = summarize(&processor.ledger().expenses());
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
                return Ok(());
            }
            println!("Total: {:.2} across {} expenses", summary.total, summary.count);
            for category in summary.categories {
                println!(
                    "  {:<16} {:>10.2}  {:>5.1}%  ({})",
                    category.category, category.total, category.share_pct, category.count
                );
            }
        }
    }

    Ok(())
}

fn pipeline_config(cli: &Cli) -> PipelineConfig {
    let mut config = PipelineConfig::from_env();
    if let Some(url) = &cli.ollama_url {
        config.ollama_url = url.clone();
    }
    if let Some(model) = &cli.vision_model {
        config.vision_model = model.clone();
    }
    if let Some(model) = &cli.category_model {
        config.category_model = model.clone();
    }
    config
}

fn build_processor(data_dir: &std::path::Path, config: &PipelineConfig) -> Result<ReceiptProcessor> {
    let store = SqliteExpenseStore::open(&data_dir.join(config::DATABASE_FILE))
        .context("Failed to open expense database")?;
    let images = ReceiptImageStore::new(&data_dir.join(config::RECEIPTS_DIR));

    let client = Arc::new(
        OllamaClient::new(&config.ollama_url, config.request_timeout)
            .context("Failed to create Ollama client")?,
    );
    let extractor = OllamaVisionOcr::new(Arc::clone(&client), config.vision_model.clone());
    let predictor = OllamaPredictor::new(client, config.category_model.clone());

    Ok(ReceiptProcessor::new(
        Arc::new(extractor),
        Arc::new(predictor),
        Arc::new(store),
        config,
        Some(images),
    ))
}

/// Cancel `session` when the user presses Ctrl+C.
fn cancel_on_ctrl_c(
    processor: &Arc<ReceiptProcessor>,
    session: &Arc<ProcessingSession>,
) -> JoinHandle<()> {
    let processor = Arc::clone(processor);
    let session = Arc::clone(session);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!(session_id = %session.id(), "Received Ctrl+C, cancelling");
            processor.cancel(&session);
        }
    })
}

fn report(err: ProcessingError) -> anyhow::Error {
    let hint = match err.retry() {
        RetryAffordance::Retry => Some("Run the command again."),
        RetryAffordance::RetryOrEnterManually => {
            Some("Run the command again, or use `add` to enter the expense by hand.")
        }
        RetryAffordance::RetryOrPickCategory => {
            Some("Run the command again, or pass --category to choose one.")
        }
        RetryAffordance::FixInput => Some("Correct the values and run the command again."),
        RetryAffordance::None => None,
    };
    eprintln!("{}", err.user_message());
    if let Some(hint) = hint {
        eprintln!("{hint}");
    }
    anyhow::Error::new(err)
}

fn print_saved(expense: &Expense) {
    println!("Saved:");
    print_expense(expense);
}

fn print_expense(expense: &Expense) {
    println!(
        "{:>14}  {}  {:<28} {:<16} {:>10.2}{}",
        expense.id,
        expense.timestamp.format("%Y-%m-%d %H:%M"),
        expense.merchant,
        expense.category,
        expense.amount,
        if expense.receipt_image.is_some() { "  [receipt]" } else { "" },
    )
}

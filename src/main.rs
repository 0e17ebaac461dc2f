mod db;
mod error;
mod export;
mod inbox;
mod ledger;
mod model;
mod parser;
mod review;
mod settings;
mod store;

use std::collections::VecDeque;
use std::io::Write;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use crate::db::SqliteStore;
use crate::error::{ImportError, LedgerError};
use crate::inbox::{IdScheme, Inbox};
use crate::ledger::Ledger;
use crate::model::{Message, DELETION_REASONS, OTHER_REASON};
use crate::parser::links;
use crate::review::Review;
use crate::settings::Settings;

#[derive(Parser)]
#[command(name = "link_triage", about = "Classify links found in chat message CSV exports")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import CSV exports and list their messages and links
    Scan {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Show only messages whose links are all classified
        #[arg(long, conflicts_with = "all")]
        processed: bool,
        /// Show every message
        #[arg(long)]
        all: bool,
    },
    /// Walk through unclassified links and pick a reason for each
    Triage {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Classify a single link
    Classify {
        /// Message id as printed by `scan`
        #[arg(short, long)]
        message: String,
        #[arg(short, long)]
        link: String,
        /// Preset reason name or number (see `reasons`)
        #[arg(short, long)]
        reason: String,
        /// Custom reason text, required with "Other"
        #[arg(long)]
        note: Option<String>,
    },
    /// List classified links
    Ledger,
    /// Write classified links to a JSONL file and clear the ledger
    Export {
        /// Directory for the export file (default: settings export_dir)
        #[arg(short, long)]
        out_dir: Option<PathBuf>,
    },
    /// List preset deletion reasons
    Reasons,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load().context("Failed to load settings")?;
    debug!(?settings, "settings loaded");

    let result = match cli.command {
        Commands::Scan { files, processed, all } => {
            let inbox = import(&files, settings.id_scheme).await;
            let ledger = open_ledger(&settings)?;
            let shown: Vec<&Message> = if all {
                inbox.messages().iter().collect()
            } else if processed {
                ledger.processed_messages(inbox.messages())
            } else {
                ledger.unprocessed_messages(inbox.messages())
            };

            for message in &shown {
                print_message(message, &ledger);
            }
            println!(
                "\n{} messages loaded, {} shown, {} links classified.",
                inbox.len(),
                shown.len(),
                ledger.len()
            );
            Ok(())
        }
        Commands::Triage { files } => {
            let inbox = import(&files, settings.id_scheme).await;
            let mut ledger = open_ledger(&settings)?;
            triage(&inbox, &mut ledger, settings.fade_delay()).await
        }
        Commands::Classify {
            message,
            link,
            reason,
            note,
        } => {
            let Some(reason) = model::resolve_reason(&reason, note.as_deref()) else {
                anyhow::bail!(
                    "Unknown reason {:?} (\"{}\" needs --note). Run `link_triage reasons`.",
                    reason,
                    OTHER_REASON
                );
            };
            let mut ledger = open_ledger(&settings)?;
            let entry = ledger.classify(&message, &link, &reason)?;
            println!(
                "Classified {} as \"{}\" at {}",
                entry.link, entry.reason, entry.deletion_time
            );
            Ok(())
        }
        Commands::Ledger => {
            let ledger = open_ledger(&settings)?;
            if ledger.is_empty() {
                println!("No classified links.");
                return Ok(());
            }
            println!(
                "{:>3} | {:<48} | {:<22} | {:<24} | {}",
                "#", "Link", "Reason", "Time", "Message"
            );
            println!("{}", "-".repeat(120));
            for (i, e) in ledger.entries().iter().enumerate() {
                println!(
                    "{:>3} | {:<48} | {:<22} | {:<24} | {}",
                    i + 1,
                    truncate(&e.link, 48),
                    truncate(&e.reason, 22),
                    e.deletion_time,
                    e.message_id
                );
            }
            Ok(())
        }
        Commands::Export { out_dir } => {
            let dir = out_dir.unwrap_or_else(|| settings.export_dir.clone());
            let mut ledger = open_ledger(&settings)?;
            if ledger.is_empty() {
                println!("No classified links to export.");
                return Ok(());
            }
            let batch = ledger.export_with(|batch| export::write_batch(&dir, batch).map(|_| ()))?;
            println!(
                "Exported {} links to {} ({}). Ledger cleared.",
                batch.count,
                dir.join(&batch.file_name).display(),
                export::CONTENT_TYPE
            );
            Ok(())
        }
        Commands::Reasons => {
            print_reasons();
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn open_ledger(settings: &Settings) -> anyhow::Result<Ledger<SqliteStore>> {
    let store = SqliteStore::open(&settings.database)?;
    Ok(Ledger::open(store, &settings.storage_key))
}

/// Import every file, reporting failures and moving on.
async fn import(files: &[PathBuf], scheme: IdScheme) -> Inbox {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(format!("Importing {} file(s)...", files.len()));
    pb.enable_steady_tick(Duration::from_millis(100));

    let mut inbox = Inbox::new(scheme);
    let outcomes = inbox.import_files(files).await;
    pb.finish_and_clear();

    for (path, outcome) in outcomes {
        match outcome {
            Ok(added) => println!("{}: {} messages", path.display(), added),
            Err(ImportError::Format(e)) => {
                println!("{}: {}. Please check the format.", path.display(), e);
                println!("    {}", truncate(&e.raw, 100));
            }
            Err(e) => println!("{}: {}", path.display(), e),
        }
    }
    inbox
}

async fn triage(
    inbox: &Inbox,
    ledger: &mut Ledger<SqliteStore>,
    fade_delay: Duration,
) -> anyhow::Result<()> {
    let visible: Vec<Message> = ledger
        .unprocessed_messages(inbox.messages())
        .into_iter()
        .cloned()
        .collect();

    let mut queue: VecDeque<(String, String)> = visible
        .iter()
        .flat_map(|m| {
            ledger
                .pending_links(m)
                .into_iter()
                .map(|link| (m.id.clone(), link))
        })
        .collect();

    if queue.is_empty() {
        println!("Nothing to triage: every link is already classified.");
        return Ok(());
    }

    let (mut review, mut faded) = Review::new(visible, fade_delay);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("{} links to classify.", queue.len());
    print_reasons();

    let mut prompted = false;
    while let Some((message_id, link)) = queue.front().cloned() {
        if ledger.is_processed(&link) {
            queue.pop_front();
            continue;
        }
        if !prompted {
            if let Some(message) = inbox.find(&message_id) {
                println!("\n{} | {} | {}", message.id, message.author, message.date);
            }
            print!("  {}\n  Reason [1-{}, s=skip, q=quit]: ", link, DELETION_REASONS.len());
            std::io::stdout().flush()?;
            prompted = true;
        }

        let line = tokio::select! {
            line = lines.next_line() => line?,
            Some(id) = faded.recv() => {
                announce_removed(&mut review, &id);
                continue;
            }
        };
        prompted = false;

        let Some(line) = line else { break };
        let choice = line.trim();
        match choice {
            "q" => break,
            "s" => {
                queue.pop_front();
                continue;
            }
            _ => {}
        }

        let note = if is_other(choice) {
            print!("  Custom reason: ");
            std::io::stdout().flush()?;
            lines.next_line().await?
        } else {
            None
        };

        let Some(reason) = model::resolve_reason(choice, note.as_deref()) else {
            println!("  Unknown reason {:?}.", choice);
            continue;
        };

        match ledger.classify(&message_id, &link, &reason) {
            Ok(_) | Err(LedgerError::DuplicateClassification(_)) => {
                queue.pop_front();
            }
            Err(e) => return Err(e.into()),
        }

        for id in review.refresh(ledger) {
            println!(
                "  All links in message {} have been processed; removing in {}s.",
                id,
                fade_delay.as_secs()
            );
        }
    }

    while review.pending_fades() > 0 && queue.is_empty() {
        match faded.recv().await {
            Some(id) => announce_removed(&mut review, &id),
            None => break,
        }
    }

    println!(
        "\n{} links classified in total, {} messages still open.",
        ledger.len(),
        review.visible().len()
    );
    Ok(())
}

fn announce_removed(review: &mut Review, id: &str) {
    if let Some(message) = review.remove(id) {
        println!("\n  Removed message {} ({}) from view.", message.id, message.author);
    }
}

fn is_other(choice: &str) -> bool {
    choice.eq_ignore_ascii_case(OTHER_REASON) || choice == DELETION_REASONS.len().to_string()
}

fn print_message(message: &Message, ledger: &Ledger<SqliteStore>) {
    println!("\n{} | {} | {}", message.id, message.author, message.date);
    let text = links::remaining_text(&message.content);
    if !text.is_empty() {
        println!("  {}", truncate(&text, 100));
    }
    for link in links::extract(&message.content) {
        let mark = if ledger.is_processed(&link) { "x" } else { " " };
        println!("  [{}] {}", mark, link);
    }
}

fn print_reasons() {
    for (i, reason) in DELETION_REASONS.iter().enumerate() {
        println!("  {}. {}", i + 1, reason);
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

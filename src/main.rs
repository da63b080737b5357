//! Sentence Engine CLI
//!
//! Usage:
//!   sentence-engine                                  # Interactive REPL (in-memory)
//!   sentence-engine --data-dir ./data                # REPL with durable storage
//!   sentence-engine --serve --addr 127.0.0.1:3000    # HTTP + WebSocket API
//!   sentence-engine --remote-url http://host/api     # Enable remote sync
//!   sentence-engine --json                           # JSON snapshots in the REPL

use std::io::Write;
use std::path::PathBuf;
use clap::Parser;
use colored::Colorize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use sentence_engine::core::{parse_command, run_server, Command, Engine, EngineConfig, FlushOutcome};
use sentence_engine::core::command::HELP;
use sentence_engine::types::{Snapshot, StoreError, SyncStatus};
use sentence_engine::VERSION;

#[derive(Parser, Debug)]
#[command(
    name = "sentence-engine",
    version = VERSION,
    about = "Sentence Builder state and sync engine",
    long_about = "Holds the learner's state in a single store with undo/redo,\n\
                  adaptive skill tracking, achievements, and an offline queue\n\
                  that is drained against a remote sync service.\n\n\
                  Modes:\n  \
                  --interactive  REPL (default)\n  \
                  --serve        HTTP + WebSocket API"
)]
struct Args {
    /// Interactive REPL
    #[arg(short, long)]
    interactive: bool,

    /// Run as HTTP API server
    #[arg(short, long)]
    serve: bool,

    /// Server address
    #[arg(long, default_value = "127.0.0.1:3000")]
    addr: String,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory for persisted state (overrides config)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Base URL of the remote sync service (overrides config)
    #[arg(long)]
    remote_url: Option<String>,

    /// Print snapshots as JSON
    #[arg(long)]
    json: bool,

    /// Disable colors in output
    #[arg(long)]
    no_color: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sentence_engine=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    if args.no_color {
        colored::control::set_override(false);
    }

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(2);
        }
    };

    let engine = Engine::start(config).await;
    if args.serve {
        run_serve(&args, &engine).await;
    } else {
        run_interactive(&args, &engine).await;
    }
    engine.shutdown().await;
}

fn load_config(args: &Args) -> Result<EngineConfig, StoreError> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if args.data_dir.is_some() {
        config.data_dir = args.data_dir.clone();
    }
    if args.remote_url.is_some() {
        config.remote_url = args.remote_url.clone();
    }
    Ok(config)
}

/// Run HTTP API server
async fn run_serve(args: &Args, engine: &Engine) {
    println!();
    println!("{}", format!("Sentence Engine v{} - API Server", VERSION).bold());
    println!();

    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("could not listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("shutdown requested");
    };
    if let Err(e) = run_server(&args.addr, engine.store.clone(), engine.sync.clone(), ctrl_c).await {
        eprintln!("Server error: {}", e);
    }
}

/// Run the REPL
async fn run_interactive(args: &Args, engine: &Engine) {
    print_header();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("{}", prompt(&engine.store.get_snapshot()));
        let _ = std::io::stdout().flush();

        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) | Err(_) => break,
        };

        let command = match parse_command(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                println!("{}", format!("  {}", e).yellow());
                continue;
            }
        };

        match command {
            Command::Quit => break,
            Command::Help => println!("{}", HELP),
            Command::Dispatch(action) => match engine.store.dispatch(action) {
                Ok(snapshot) => print_snapshot(&snapshot, args.json),
                Err(e) => println!("{}", format!("  ✗ {} [{}]", e, e.code()).red()),
            },
            Command::Undo => match engine.store.undo() {
                Some(snapshot) => print_snapshot(&snapshot, args.json),
                None => println!("{}", "  nothing to undo".dimmed()),
            },
            Command::Redo => match engine.store.redo() {
                Some(snapshot) => print_snapshot(&snapshot, args.json),
                None => println!("{}", "  nothing to redo".dimmed()),
            },
            Command::Sync => match engine.flush().await {
                Some(report) => {
                    let line = format!(
                        "  sync: sent {} discarded {} remaining {}",
                        report.sent.len(),
                        report.discarded.len(),
                        report.remaining
                    );
                    match report.outcome {
                        FlushOutcome::Completed => println!("{}", line.green()),
                        FlushOutcome::Failed { error } => println!("{} ({})", line.red(), error),
                        other => println!("{} ({:?})", line.yellow(), other),
                    }
                }
                None => println!("{}", "  no remote configured (--remote-url)".yellow()),
            },
            Command::Status => print_status(&engine.store.get_snapshot()),
            Command::Queue => print_queue(&engine.store.get_snapshot()),
            Command::Patterns => {
                let snapshot = engine.store.get_snapshot();
                for pattern in snapshot.content.custom_patterns.iter().chain(snapshot.content.patterns.values()) {
                    let tags: Vec<&str> = pattern.structure.iter().map(|p| p.as_str()).collect();
                    println!("  {:<14} {:>3} pts  {}", pattern.id.bold(), pattern.points, tags.join(" "));
                }
            }
            Command::Generate { topic, level } => match engine.content.generate(&topic, &level).await {
                Ok(content) => {
                    for sentence in content.sentences {
                        println!("  {}", sentence.cyan());
                    }
                }
                Err(e) => println!("{}", format!("  ✗ {}", e).red()),
            },
        }
    }

    engine.persist_now().await;
    let snapshot = engine.store.get_snapshot();
    println!(
        "\nSession ended. Sentences: {} | Score: {} | Queued: {}",
        snapshot.learning.progress.total_sentences,
        snapshot.gamification.score,
        snapshot.offline.queue.len()
    );
}

fn print_header() {
    println!("{}", format!("Sentence Engine v{}", VERSION).bold());
    println!("Build sentences word by word. Type 'help' for commands, 'quit' to exit.");
    println!();
}

fn prompt(snapshot: &Snapshot) -> String {
    let net = if snapshot.offline.is_online { "online".green() } else { "offline".red() };
    let sync = match snapshot.offline.sync_status {
        SyncStatus::Error => format!(" {}", "sync-error".red()),
        SyncStatus::Syncing => format!(" {}", "syncing".yellow()),
        _ => String::new(),
    };
    format!(
        "[{} | {} | {}{}] > ",
        snapshot.learning.current_pattern.bold(),
        snapshot.learning.text(),
        net,
        sync
    )
}

fn print_snapshot(snapshot: &Snapshot, json: bool) {
    if json {
        println!("{}", serde_json::to_string(snapshot).unwrap_or_default());
        return;
    }

    let words: Vec<String> = snapshot
        .learning
        .current_sentence
        .iter()
        .map(|w| format!("{}:{}({})", w.id, w.word, w.part))
        .collect();
    println!("  sentence: {}", words.join(" "));

    if let Some(outcome) = &snapshot.learning.last_validation {
        if outcome.valid {
            println!("{}", format!("  ✓ valid {}", outcome.pattern).green());
        } else {
            for error in &outcome.errors {
                println!("{}", format!("  ✗ {}", error).red());
            }
        }
    }
    if snapshot.ui.achievement_modal {
        for record in snapshot.gamification.achievements.recent.iter().take(1) {
            println!("{}", format!("  ★ achievement unlocked: {}", record.id).yellow().bold());
        }
    }
    if let Some(feedback) = &snapshot.ui.feedback {
        println!("  {}", feedback.message.italic());
    }
}

fn print_status(snapshot: &Snapshot) {
    let p = &snapshot.learning.progress;
    let a = &snapshot.learning.adaptive;
    let g = &snapshot.gamification;
    println!("  level {} ({} xp) | sentences {} | attempts {} | accuracy {:.1}%",
        p.level, p.xp, p.total_sentences, p.attempts, p.accuracy);
    println!("  streak {} (best {}) | mastered {:?}", p.current_streak, p.best_streak, p.mastered_patterns);
    println!("  skill {:.2} | confidence {:.2} | rate {:.2}", a.skill_level, a.confidence, a.learning_rate);
    println!("  score {} | coins {} | gems {} | achievements {:?}", g.score, g.coins, g.gems, g.achievements.ids());
    println!("  wpm {} | vocabulary {} | credits {}",
        snapshot.learning.metrics.words_per_minute,
        snapshot.learning.metrics.vocabulary_size,
        snapshot.content.generated.credits);
    let last_sync = snapshot
        .offline
        .last_sync
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "never".to_string());
    println!("  sync {} | last sync {} | device {}", snapshot.offline.sync_status, last_sync, snapshot.user.device_id);
}

fn print_queue(snapshot: &Snapshot) {
    if snapshot.offline.queue.is_empty() {
        println!("{}", "  queue empty".dimmed());
        return;
    }
    for op in snapshot.offline.queue.iter() {
        let error = op.last_error.as_deref().unwrap_or("");
        println!("  #{:<4} {:<20} attempts {} {}", op.id, op.kind.to_string(), op.attempts, error.red());
    }
}

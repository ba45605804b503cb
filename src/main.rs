//! # TuitionBell — daily tuition payment notifications
//!
//! Classifies active students by days until their next due date, emails
//! the parent, and logs every successful send.
//!
//! Usage:
//!   tuitionbell serve                    # HTTP trigger + daily scheduler
//!   tuitionbell serve --port 8080        # Custom port
//!   tuitionbell run --date 2026-03-10    # One run, result JSON on stdout
//!   tuitionbell check-config             # Validate configuration and exit

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use tuitionbell_channels::SmtpMailer;
use tuitionbell_core::config::StoreBackend;
use tuitionbell_core::{NotificationLog, Student, StudentStore, TuitionBellConfig};
use tuitionbell_notify::{NotificationEngine, reference_at};
use tuitionbell_scheduler::{DailyTrigger, spawn_daily};
use tuitionbell_store::{PostgrestStore, SqliteStore};

#[derive(Parser)]
#[command(
    name = "tuitionbell",
    version,
    about = "🔔 TuitionBell — tuition payment reminders for parents"
)]
struct Cli {
    /// Config file (default: $TUITIONBELL_CONFIG or ~/.tuitionbell/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP trigger and the daily scheduler (default)
    Serve {
        /// Listening port (overrides config and PORT)
        #[arg(short, long)]
        port: Option<u16>,

        /// Don't start the daily scheduler
        #[arg(long)]
        no_schedule: bool,
    },
    /// Run the notification engine once and print the results
    Run {
        /// Classify against this day instead of today (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Validate configuration and exit
    CheckConfig,
    /// Write a default config file if none exists
    Init,
    /// Load students from a JSON array into the SQLite store
    ImportStudents {
        /// JSON file with student rows
        file: PathBuf,
    },
    /// Print the notification log of the SQLite store
    History,
}

/// Collaborators picked by `store.backend`.
struct Backends {
    students: Arc<dyn StudentStore>,
    log: Arc<dyn NotificationLog>,
}

fn load_config(path: Option<&PathBuf>) -> Result<TuitionBellConfig> {
    match path {
        Some(path) => {
            let mut config = TuitionBellConfig::load_from(path)?;
            config.apply_env();
            Ok(config)
        }
        None => Ok(TuitionBellConfig::load()?),
    }
}

fn enforce_config(config: &TuitionBellConfig) -> Result<()> {
    config
        .check_startup()
        .context("invalid configuration (set startup.strict_config = false to start anyway)")
}

fn open_sqlite(config: &TuitionBellConfig) -> Result<Arc<SqliteStore>> {
    let path = config.store.expanded_sqlite_path();
    let store = SqliteStore::open(&path)?;
    tracing::info!("💾 SQLite store: {}", path.display());
    Ok(Arc::new(store))
}

fn build_backends(config: &TuitionBellConfig) -> Result<Backends> {
    match config.store.backend {
        StoreBackend::Postgrest => {
            let store = Arc::new(PostgrestStore::from_config(&config.store)?);
            tracing::info!("🗄️ PostgREST store: {}", store.table_url("students"));
            Ok(Backends {
                students: store.clone(),
                log: store,
            })
        }
        StoreBackend::Sqlite => {
            let store = open_sqlite(config)?;
            Ok(Backends {
                students: store.clone(),
                log: store,
            })
        }
    }
}

fn build_engine(config: &TuitionBellConfig) -> Result<Arc<NotificationEngine>> {
    let backends = build_backends(config)?;
    let mailer = SmtpMailer::new(config.email.clone());
    if !mailer.is_configured() {
        tracing::warn!("⚠️ SMTP not configured — every send will be reported as failed");
    }
    Ok(Arc::new(NotificationEngine::new(
        backends.students,
        backends.log,
        Arc::new(mailer),
    )))
}

fn require_sqlite(config: &TuitionBellConfig) -> Result<Arc<SqliteStore>> {
    if config.store.backend != StoreBackend::Sqlite {
        anyhow::bail!("this command needs store.backend = \"sqlite\"");
    }
    open_sqlite(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "tuitionbell=debug,tower_http=debug"
    } else {
        "tuitionbell=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    let mut config = load_config(cli.config.as_ref())?;

    match cli.command.unwrap_or(Command::Serve {
        port: None,
        no_schedule: false,
    }) {
        Command::Serve { port, no_schedule } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            enforce_config(&config)?;
            let engine = build_engine(&config)?;

            if config.schedule.enabled && !no_schedule {
                let trigger = DailyTrigger::from_config(&config.schedule)?;
                tokio::spawn(spawn_daily(engine.clone(), trigger));
            } else {
                tracing::info!("⏰ Daily scheduler disabled");
            }

            println!("🔔 TuitionBell v{}", env!("CARGO_PKG_VERSION"));
            println!("   🌐 Trigger: http://{}:{}/send-notifications", config.server.host, config.server.port);
            tuitionbell_gateway::start(&config.server, engine).await?;
        }
        Command::Run { date } => {
            enforce_config(&config)?;
            let engine = build_engine(&config)?;
            let result = match date {
                Some(date) => engine.run(reference_at(date)).await?,
                None => engine.run_now().await?,
            };
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::CheckConfig => {
            config.validate()?;
            DailyTrigger::from_config(&config.schedule)?;
            println!("✅ Configuration OK");
            println!("   Store:    {:?}", config.store.backend);
            println!(
                "   SMTP:     {}",
                if SmtpMailer::new(config.email.clone()).is_configured() {
                    config.email.smtp_host.as_str()
                } else {
                    "(not configured)"
                }
            );
            println!(
                "   Schedule: {} ({:02}:{:02} local)",
                if config.schedule.enabled { "on" } else { "off" },
                config.schedule.hour,
                config.schedule.minute
            );
        }
        Command::Init => {
            let path = TuitionBellConfig::default_path();
            if path.exists() {
                println!("⚠️  Config already exists: {}", path.display());
            } else {
                TuitionBellConfig::default().save()?;
                println!("✅ Wrote default config: {}", path.display());
            }
        }
        Command::ImportStudents { file } => {
            let store = require_sqlite(&config)?;
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let students: Vec<Student> = serde_json::from_str(&raw)?;
            for student in &students {
                store.upsert_student(student)?;
            }
            println!("✅ Imported {} student(s)", students.len());
        }
        Command::History => {
            let store = require_sqlite(&config)?;
            for event in store.list_notifications()? {
                println!(
                    "{}  {:<8} {}",
                    event.sent_date.to_rfc3339(),
                    event.kind.as_str(),
                    event.student_id
                );
            }
        }
    }

    Ok(())
}

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use presenced::{
    captioner::CaptionClient,
    config::{Config, ConfigWatcher},
    jobs,
    presence::PresenceClient,
    rest, rules, AppContext,
};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(
    name = "presenced",
    about = "Presence Host — always-on tab-presence & meme-caption daemon",
    version
)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// REST control surface port
    #[arg(long, env = "PRESENCED_PORT")]
    port: Option<u16>,

    /// Data directory for config, state, activity log, and saved memes
    #[arg(long, env = "PRESENCED_DATA_DIR")]
    data_dir: Option<std::path::PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "PRESENCED_LOG")]
    log: Option<String>,

    /// Bind address for the REST server (default: 127.0.0.1)
    #[arg(long, env = "PRESENCED_BIND")]
    bind_address: Option<String>,

    /// Write logs to this file path (rotated daily). Optional.
    #[arg(long, env = "PRESENCED_LOG_FILE")]
    log_file: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Start the daemon (default when no subcommand given).
    ///
    /// Runs presenced in the foreground: the REST control surface, the
    /// config hot-reload watcher, and the periodic status/captioning jobs.
    ///
    /// Examples:
    ///   presenced serve
    ///   presenced
    Serve,
    /// Publish a presence status once and exit.
    ///
    /// Uses the configured token (or PRESENCED_TOKEN). Bypasses rule
    /// matching; the cooldown does not apply to one-shot runs.
    ///
    /// Examples:
    ///   presenced publish "Reviewing PRs"
    Publish {
        /// Status text to publish
        status: String,
    },
    /// Print the currently published custom status.
    ///
    /// Examples:
    ///   presenced status
    Status,
    /// Check a caption API key against the models listing.
    ///
    /// Uses the configured key when none is given. Exit code 0 if valid,
    /// 1 otherwise.
    ///
    /// Examples:
    ///   presenced validate-key
    ///   presenced validate-key --api-key sk-...
    ValidateKey {
        #[arg(long)]
        api_key: Option<String>,
    },
    /// Capture, caption, and composite one page right now.
    ///
    /// Runs the full pipeline outside the daemon. The PNG lands in the
    /// configured output folder unless auto-save is off.
    ///
    /// Examples:
    ///   presenced meme https://example.com
    Meme {
        /// Page URL to capture
        url: String,
    },
    /// Test a URL pattern the way the rule matcher would.
    ///
    /// Accepts a plain substring or a /body/flags regex.
    ///
    /// Examples:
    ///   presenced test-pattern youtube.com https://www.youtube.com/watch
    ///   presenced test-pattern "/gpt|ai/i" https://chat.openai.com/
    TestPattern { pattern: String, url: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::new(args.port, args.data_dir, args.log, args.bind_address);

    let _log_guard = setup_logging(
        &config.settings.log,
        args.log_file.as_deref(),
        &config.settings.log_format,
    );

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => run_serve(config).await,
        Command::Publish { status } => run_publish(config, &status).await,
        Command::Status => run_status(config).await,
        Command::ValidateKey { api_key } => run_validate_key(config, api_key).await,
        Command::Meme { url } => run_meme(config, &url).await,
        Command::TestPattern { pattern, url } => run_test_pattern(&pattern, &url),
    }
}

// ── Serve ─────────────────────────────────────────────────────────────────────

async fn run_serve(config: Config) -> Result<()> {
    install_panic_hook(config.data_dir.clone());
    report_previous_crash(&config.data_dir);

    let data_dir = config.data_dir.clone();
    let ctx = Arc::new(AppContext::new(config).await?);
    info!(
        version = env!("CARGO_PKG_VERSION"),
        data_dir = %data_dir.display(),
        "presenced starting"
    );

    ctx.sync_jobs().await;

    // Config hot-reload: each file change delivers a whole new snapshot.
    if let Some((watcher, mut reloads)) = ConfigWatcher::start(&data_dir) {
        let ctx = Arc::clone(&ctx);
        tokio::spawn(async move {
            // Moving the watcher in keeps the file watch alive.
            let _watcher = watcher;
            while let Some(snapshot) = reloads.recv().await {
                ctx.apply_settings(snapshot).await;
            }
        });
    }

    rest::serve(ctx).await
}

// ── One-shot commands ─────────────────────────────────────────────────────────

async fn run_publish(config: Config, status: &str) -> Result<()> {
    let client = PresenceClient::new(&config.settings.presence.api_base)?;
    client
        .set_status(&config.settings.token, status)
        .await
        .context("publish failed")?;
    println!("Status updated to \"{status}\"");
    Ok(())
}

async fn run_status(config: Config) -> Result<()> {
    let client = PresenceClient::new(&config.settings.presence.api_base)?;
    match client
        .current_status(&config.settings.token)
        .await
        .context("status fetch failed")?
    {
        Some(text) => println!("{text}"),
        None => println!("(no custom status set)"),
    }
    Ok(())
}

async fn run_validate_key(config: Config, api_key: Option<String>) -> Result<()> {
    let key = api_key.unwrap_or_else(|| config.settings.captioning.api_key.clone());
    let client = CaptionClient::new(
        &config.settings.captioning.api_base,
        &config.settings.captioning.model,
    )?;
    if client
        .validate_key(&key)
        .await
        .context("validation call failed")?
    {
        println!("valid");
        Ok(())
    } else {
        println!("invalid");
        std::process::exit(1);
    }
}

async fn run_meme(config: Config, url: &str) -> Result<()> {
    let ctx = Arc::new(AppContext::new(config).await?);
    let record = jobs::generate_meme(&ctx, url)
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    println!("caption: {}", record.caption_text);
    match &record.path {
        Some(path) => println!("saved:   {}", path.display()),
        None => println!("saved:   (auto-save off)"),
    }
    Ok(())
}

fn run_test_pattern(pattern: &str, url: &str) -> Result<()> {
    match rules::pattern_matches(pattern, url) {
        Ok(true) => {
            println!("MATCH");
            Ok(())
        }
        Ok(false) => {
            println!("no match");
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(2);
        }
    }
}

// ── Logging setup ─────────────────────────────────────────────────────────────

/// Initialise tracing with an optional daily-rolling log file.
///
/// If the log directory cannot be created, falls back to stdout-only logging
/// with a warning — never panics.
fn setup_logging(
    log_level: &str,
    log_file: Option<&std::path::Path>,
    log_format: &str,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let use_json = log_format == "json";

    if let Some(path) = log_file {
        let dir = path.parent().unwrap_or_else(|| std::path::Path::new("."));
        let filename = path
            .file_name()
            .unwrap_or_else(|| std::ffi::OsStr::new("presenced.log"));

        if let Err(e) = std::fs::create_dir_all(dir) {
            eprintln!(
                "warn: could not create log directory '{}': {e} — falling back to stdout",
                dir.display()
            );
            if use_json {
                tracing_subscriber::fmt().json().with_env_filter(log_level).init();
            } else {
                tracing_subscriber::fmt().with_env_filter(log_level).compact().init();
            }
            return None;
        }

        let appender = tracing_appender::rolling::daily(dir, filename);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);

        if use_json {
            tracing_subscriber::registry()
                .with(EnvFilter::new(log_level))
                .with(fmt::layer().json())
                .with(fmt::layer().json().with_writer(non_blocking))
                .init();
        } else {
            tracing_subscriber::registry()
                .with(EnvFilter::new(log_level))
                .with(fmt::layer().compact())
                .with(fmt::layer().with_writer(non_blocking))
                .init();
        }
        Some(guard)
    } else if use_json {
        tracing_subscriber::fmt().json().with_env_filter(log_level).init();
        None
    } else {
        tracing_subscriber::fmt().with_env_filter(log_level).compact().init();
        None
    }
}

// ── Panic hook + crash log ────────────────────────────────────────────────────

/// Write panic info to `{data_dir}/crash.log` so the next start can report
/// it. The original hook still prints to stderr.
fn install_panic_hook(data_dir: std::path::PathBuf) {
    let original = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        original(info);

        let msg = info
            .payload()
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| info.payload().downcast_ref::<String>().map(|s| s.as_str()))
            .unwrap_or("unknown panic");
        let location = info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_else(|| "unknown location".to_string());

        let content = format!(
            "presenced panic at {location}\nmessage: {msg}\nversion: {}\n",
            env!("CARGO_PKG_VERSION")
        );
        let _ = std::fs::write(data_dir.join("crash.log"), content);
    }));
}

/// Report and clear a crash log left by the previous run.
fn report_previous_crash(data_dir: &std::path::Path) {
    let crash_path = data_dir.join("crash.log");
    match std::fs::read_to_string(&crash_path) {
        Ok(content) => {
            warn!(
                crash_report = %content.trim(),
                "previous run ended with a panic"
            );
            let _ = std::fs::remove_file(&crash_path);
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            warn!(err = %e, "could not read crash.log");
        }
    }
}

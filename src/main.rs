use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use repoaudit::{
    config::Config,
    observer::TracingObserver,
    output::{format_report, format_scan_result, OutputFormat},
    Narrator, OpenAiNarrator, Pipeline, ScanEvent, ScanObserver, ScanOutcome, ScanResult,
};
use std::future::Future;
use std::io::Write;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Exit codes for CI integration
mod exit_codes {
    pub const SUCCESS: u8 = 0;
    pub const ERROR: u8 = 1;
    pub const FINDINGS: u8 = 2;
}

#[derive(Parser)]
#[command(name = "repoaudit")]
#[command(
    author,
    version,
    about = "Scan a GitHub repository's npm dependencies and narrate the risk for healthcare compliance"
)]
struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a repository and generate a narrated security report
    Report(TargetArgs),

    /// Scan a repository and list findings without generating a report
    Scan(TargetArgs),

    /// Show or create config file
    Config {
        /// Generate default config file
        #[arg(long)]
        init: bool,

        /// Show config file path
        #[arg(long)]
        path: bool,
    },
}

#[derive(Args)]
struct TargetArgs {
    /// Repository URL, e.g. https://github.com/owner/repo[/branch]
    url: String,

    /// Output format (text, table, json)
    #[arg(short, long)]
    format: Option<String>,

    /// Write output to file
    #[arg(short, long)]
    output: Option<String>,

    /// Maximum number of dependencies to check
    #[arg(long)]
    limit: Option<usize>,

    /// Branch to scan, overriding the one in the URL
    #[arg(short, long)]
    branch: Option<String>,

    /// Exit with code 2 if any vulnerable dependency is found
    #[arg(long)]
    fail_on_findings: bool,
}

/// Logs through tracing and, when enabled, prints report fragments as they
/// stream in.
struct TerminalObserver {
    mirror_fragments: bool,
}

impl ScanObserver for TerminalObserver {
    fn on_event(&self, event: &ScanEvent<'_>) {
        match event {
            ScanEvent::ReportFragment(fragment) if self.mirror_fragments => {
                let mut stdout = std::io::stdout().lock();
                let _ = stdout.write_all(fragment.as_bytes());
                let _ = stdout.flush();
            }
            _ => TracingObserver.on_event(event),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(if cli.verbose { Level::DEBUG } else { Level::WARN });

    match run(cli.command).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_codes::ERROR)
        }
    }
}

fn init_tracing(level: Level) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .ok();
}

async fn run(command: Commands) -> Result<u8> {
    let config = Config::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Ignoring unreadable config file");
        Config::default()
    });

    match command {
        Commands::Report(args) => run_report(&config, args).await,
        Commands::Scan(args) => run_scan(&config, args).await,
        Commands::Config { init, path } => {
            handle_config(init, path)?;
            Ok(exit_codes::SUCCESS)
        }
    }
}

fn build_pipeline(config: &Config, args: &TargetArgs, observer: TerminalObserver) -> Pipeline {
    let mut config = config.clone();
    if let Some(limit) = args.limit {
        config.dependency_limit = limit;
    }

    Pipeline::from_config(&config)
        .with_branch_override(args.branch.clone())
        .with_observer(Arc::new(observer))
}

fn resolve_format(config: &Config, args: &TargetArgs) -> Result<OutputFormat> {
    let format = args.format.as_deref().unwrap_or(&config.default_format);
    OutputFormat::from_str(format).map_err(|e| anyhow::anyhow!(e))
}

async fn run_report(config: &Config, args: TargetArgs) -> Result<u8> {
    let format = resolve_format(config, &args)?;
    let streaming = format != OutputFormat::Json && args.output.is_none();

    let pipeline = build_pipeline(
        config,
        &args,
        TerminalObserver {
            mirror_fragments: streaming,
        },
    );

    let outcome = with_spinner(
        format != OutputFormat::Json,
        "Scanning dependencies...",
        pipeline.scan(&args.url),
    )
    .await;

    // A failed scan reports its diagnostic without needing narrator credentials.
    let pipeline = if outcome.is_failed() {
        pipeline
    } else {
        let narrator: Box<dyn Narrator> = Box::new(
            OpenAiNarrator::from_config(&config.narrator)
                .context("Cannot generate a report")?,
        );
        pipeline.with_narrator(narrator)
    };

    let report = pipeline
        .report(&outcome)
        .await
        .context("Report generation failed")?;

    if let Some(path) = &args.output {
        std::fs::write(path, format_report(&report, format)?)?;
        println!("Report written to: {}", path);
    } else if streaming {
        // Fragments were already printed; a diagnostic report never streams.
        if outcome.is_failed() {
            print!("{}", report.text);
        }
        println!();
    } else {
        println!("{}", format_report(&report, format)?);
    }

    Ok(exit_code(&outcome, args.fail_on_findings))
}

async fn run_scan(config: &Config, args: TargetArgs) -> Result<u8> {
    let format = match resolve_format(config, &args)? {
        OutputFormat::Text => OutputFormat::Table,
        other => other,
    };

    let pipeline = build_pipeline(
        config,
        &args,
        TerminalObserver {
            mirror_fragments: false,
        },
    );

    let outcome = with_spinner(
        format != OutputFormat::Json,
        "Scanning dependencies...",
        pipeline.scan(&args.url),
    )
    .await;

    let rendered = format_scan_result(&ScanResult::from(&outcome), format)?;
    if let Some(path) = &args.output {
        std::fs::write(path, rendered)?;
        println!("Results written to: {}", path);
    } else {
        print!("{}", rendered);
        if !rendered.ends_with('\n') {
            println!();
        }
    }

    if outcome.is_failed() {
        return Ok(exit_codes::ERROR);
    }
    Ok(exit_code(&outcome, args.fail_on_findings))
}

/// Shows a spinner on stderr while `task` runs, if `interactive`.
async fn with_spinner<F: Future>(interactive: bool, message: &str, task: F) -> F::Output {
    if !interactive {
        return task.await;
    }

    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(message.to_string());

    let output = task.await;
    pb.finish_and_clear();
    output
}

fn exit_code(outcome: &ScanOutcome, fail_on_findings: bool) -> u8 {
    match outcome {
        ScanOutcome::Vulnerable(_) if fail_on_findings => exit_codes::FINDINGS,
        _ => exit_codes::SUCCESS,
    }
}

fn handle_config(init: bool, show_path: bool) -> Result<()> {
    let config_path = Config::config_path();

    if show_path {
        println!("{}", config_path.display());
        return Ok(());
    }

    if init {
        if config_path.exists() {
            println!("Config file already exists at: {}", config_path.display());
            return Ok(());
        }

        let config = Config::default();
        config.save()?;
        println!("Created config file at: {}", config_path.display());
        println!();
        println!("Default configuration:");
        println!("{}", Config::generate_default_config());
        return Ok(());
    }

    if config_path.exists() {
        let content = std::fs::read_to_string(&config_path)?;
        println!("Config file: {}", config_path.display());
        println!();
        println!("{}", content);
    } else {
        println!("No config file found.");
        println!("Run 'repoaudit config --init' to create one.");
        println!();
        println!("Config path: {}", config_path.display());
    }

    Ok(())
}

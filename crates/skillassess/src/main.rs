mod batch;
mod config;
mod init;
mod input;

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use serde::Serialize;
use tracing::debug;

use skillassess_agent::{
    create_client, ModelClient, ProviderConfig, ProviderType, RetryPolicy, Throttle,
    ThrottledClient,
};
use skillassess_core::{HostedModelCaller, Pipeline, PipelineOutcome};
use skillassess_critic::CritiqueVerdict;
use skillassess_export::{ExportError, ExportPaths, Exporter};
use skillassess_logging::{init_tracing, LogEvent, LogFormat, Logger};
use skillassess_model::Competency;

use crate::batch::BatchFile;
use crate::config::ProjectConfig;
use crate::input::CompetencyArgs;

/// Exit code when the grid was accepted but could not be written
const EXIT_EXPORT_FAILED: i32 = 3;

/// Exit code for errors before or outside a run (input, config, credentials)
const EXIT_ERROR: i32 = 2;

#[derive(Parser, Debug)]
#[command(
    name = "skillassess",
    about = "Generate and critique competency assessment grids",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate one assessment grid
    Generate {
        #[command(flatten)]
        competency: CompetencyArgs,

        #[command(flatten)]
        run: RunArgs,
    },
    /// Generate a grid for every competency in a batch file
    Batch {
        /// TOML file with one [[competency]] table per grid
        file: PathBuf,

        #[command(flatten)]
        run: RunArgs,
    },
    /// Choose a default provider and write the global config
    Init,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Model provider (overrides the config file)
    #[arg(short, long, value_enum)]
    provider: Option<ProviderChoice>,

    /// Model for both generator and critic
    #[arg(short, long)]
    model: Option<String>,

    /// Directory exported grids are written to (default: current directory)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Regenerations allowed after the first rejection
    #[arg(short = 'b', long)]
    regeneration_budget: Option<usize>,

    /// Log output format
    #[arg(long, value_enum, default_value = "pretty")]
    log_format: LogFormatChoice,

    /// Also append JSON log lines to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Output final result as JSON
    #[arg(long)]
    json_output: bool,

    /// Dry run: show what would happen without calling the model
    #[arg(long)]
    dry_run: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ProviderChoice {
    Gemini,
    Deepseek,
}

impl From<ProviderChoice> for ProviderType {
    fn from(choice: ProviderChoice) -> Self {
        match choice {
            ProviderChoice::Gemini => ProviderType::Gemini,
            ProviderChoice::Deepseek => ProviderType::DeepSeek,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormatChoice {
    Pretty,
    Json,
    Compact,
}

impl From<LogFormatChoice> for LogFormat {
    fn from(choice: LogFormatChoice) -> Self {
        match choice {
            LogFormatChoice::Pretty => LogFormat::Pretty,
            LogFormatChoice::Json => LogFormat::Json,
            LogFormatChoice::Compact => LogFormat::Compact,
        }
    }
}

/// Effective settings after merging flags, config file and defaults
#[derive(Debug)]
struct Settings {
    provider: ProviderType,
    generator_model: String,
    critic_model: String,
    generator_temperature: Option<f32>,
    critic_temperature: Option<f32>,
    output_dir: PathBuf,
    regeneration_budget: usize,
    policy: RetryPolicy,
    max_concurrent: usize,
    min_interval: Duration,
}

impl Settings {
    /// Priority: flag > role config > global config > built-in default
    fn resolve(args: &RunArgs, config: &ProjectConfig, working_dir: &Path) -> Result<Self> {
        let provider = match args.provider {
            Some(choice) => choice.into(),
            None => config.provider()?.unwrap_or(ProviderType::Gemini),
        };
        let model = |role: Option<&str>| {
            args.model
                .as_deref()
                .or(role)
                .unwrap_or(provider.default_model())
                .to_string()
        };
        let output_dir = args
            .output_dir
            .clone()
            .or_else(|| config.output_dir.clone())
            .map(|dir| if dir.is_absolute() { dir } else { working_dir.join(dir) })
            .unwrap_or_else(|| working_dir.to_path_buf());

        Ok(Self {
            provider,
            generator_model: model(config.generator_model()),
            critic_model: model(config.critic_model()),
            generator_temperature: config.generator.temperature,
            critic_temperature: config.critic.temperature,
            output_dir,
            regeneration_budget: args
                .regeneration_budget
                .or(config.pipeline.regeneration_budget)
                .unwrap_or(skillassess_core::DEFAULT_REGENERATION_BUDGET),
            policy: config.retry_policy(),
            max_concurrent: config.max_concurrent(),
            min_interval: config.min_interval(),
        })
    }
}

/// JSON report for one run
#[derive(Serialize)]
struct RunReport<'a> {
    #[serde(flatten)]
    outcome: &'a PipelineOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    exported: Option<&'a ExportPaths>,
    #[serde(skip_serializing_if = "Option::is_none")]
    export_error: Option<String>,
}

/// A finished run and what happened to its artifacts
struct Completed {
    outcome: PipelineOutcome,
    export: Result<Option<ExportPaths>, ExportError>,
}

impl Completed {
    fn exit_code(&self) -> i32 {
        match self.export {
            Err(_) => EXIT_EXPORT_FAILED,
            Ok(_) => self.outcome.exit_code(),
        }
    }

    fn report(&self) -> RunReport<'_> {
        RunReport {
            outcome: &self.outcome,
            exported: self.export.as_ref().ok().and_then(Option::as_ref),
            export_error: self.export.as_ref().err().map(ToString::to_string),
        }
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".bright_red().bold(), e);
            EXIT_ERROR
        }
    };

    // Exit with appropriate code
    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Command::Init => {
            init::handle_init()?;
            Ok(0)
        }
        Command::Generate { competency, run } => {
            init_tracing("warn", run.log_format.into());
            let interactive = std::io::stdin().is_terminal();
            let competency = input::collect(&competency, interactive)?;
            generate(competency, &run).await
        }
        Command::Batch { file, run } => {
            init_tracing("warn", run.log_format.into());
            let competencies = BatchFile::load(&file)?.competencies()?;
            generate_batch(competencies, &run).await
        }
    }
}

async fn generate(competency: Competency, args: &RunArgs) -> Result<i32> {
    let settings = load_settings(args)?;
    if args.dry_run {
        print_dry_run(&settings, std::slice::from_ref(&competency));
        return Ok(0);
    }

    let caller = build_caller(&settings)?;
    let logger = build_logger(args)?;
    let exporter = Exporter::new(&settings.output_dir);
    let pipeline = Pipeline::new(&caller, logger.clone())
        .with_regeneration_budget(settings.regeneration_budget);
    install_interrupt_handler(pipeline.interrupt_handle())?;

    let outcome = pipeline.run(competency).await?;
    let completed = finish(outcome, &exporter, &logger);

    if args.json_output {
        let json = serde_json::to_string_pretty(&completed.report())?;
        println!("{}", json);
    } else {
        print_outcome(&completed);
    }

    Ok(completed.exit_code())
}

async fn generate_batch(competencies: Vec<Competency>, args: &RunArgs) -> Result<i32> {
    let settings = load_settings(args)?;
    if args.dry_run {
        print_dry_run(&settings, &competencies);
        return Ok(0);
    }

    let caller = build_caller(&settings)?;
    let logger = build_logger(args)?;
    let exporter = Exporter::new(&settings.output_dir);
    let pipeline = Pipeline::new(&caller, logger.clone())
        .with_regeneration_budget(settings.regeneration_budget);
    install_interrupt_handler(pipeline.interrupt_handle())?;

    let labels: Vec<String> = competencies
        .iter()
        .map(|c| c.statement().to_string())
        .collect();
    let results = pipeline.run_batch(competencies).await;

    let mut exit_code = 0;
    let mut completed = Vec::new();
    for (label, result) in labels.iter().zip(results) {
        match result {
            Ok(outcome) => {
                let done = finish(outcome, &exporter, &logger);
                exit_code = exit_code.max(done.exit_code());
                completed.push((label, done));
            }
            Err(e) => {
                eprintln!("{} {}: {}", "Error:".bright_red().bold(), label, e);
                exit_code = exit_code.max(EXIT_ERROR);
            }
        }
    }

    if args.json_output {
        let reports: Vec<_> = completed.iter().map(|(_, done)| done.report()).collect();
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        print_batch_summary(&completed);
    }

    Ok(exit_code)
}

fn load_settings(args: &RunArgs) -> Result<Settings> {
    let working_dir = std::env::current_dir().context("Failed to get current directory")?;
    let config = ProjectConfig::load(&working_dir)?;
    let settings = Settings::resolve(args, &config, &working_dir)?;
    debug!(
        provider = %settings.provider,
        generator_model = %settings.generator_model,
        critic_model = %settings.critic_model,
        output_dir = %settings.output_dir.display(),
        "Resolved settings"
    );
    Ok(settings)
}

/// Read the provider's API key from the environment (or `.env`)
fn read_api_key(provider: ProviderType) -> Result<String> {
    provider
        .api_key_vars()
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|key| !key.trim().is_empty())
        .ok_or_else(|| {
            anyhow::anyhow!(
                "No API key for {}. Set {}",
                provider,
                provider.api_key_vars().join(" or ")
            )
        })
}

fn build_caller(settings: &Settings) -> Result<HostedModelCaller> {
    let api_key = read_api_key(settings.provider)?;
    // Both roles draw from one provider quota
    let throttle = Arc::new(Throttle::new(settings.max_concurrent, settings.min_interval));

    let client = |model: &str| -> Result<Arc<dyn ModelClient>> {
        let config = ProviderConfig::new(settings.provider, api_key.clone())
            .with_model(model.to_string())
            .with_timeout(settings.policy.timeout);
        let inner = create_client(&config)
            .with_context(|| format!("Failed to create {} client", settings.provider))?;
        let throttled: Arc<dyn ModelClient> =
            Arc::new(ThrottledClient::sharing(inner, throttle.clone()));
        Ok(throttled)
    };

    let generator = client(&settings.generator_model)?;
    let critic = client(&settings.critic_model)?;
    Ok(
        HostedModelCaller::new(generator, critic, settings.policy.clone())
            .with_temperatures(settings.generator_temperature, settings.critic_temperature),
    )
}

fn build_logger(args: &RunArgs) -> Result<Arc<Logger>> {
    let format: LogFormat = args.log_format.into();
    let logger = match &args.log_file {
        Some(path) => Logger::with_file(format, path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?,
        None => Logger::new(format),
    };
    Ok(Arc::new(logger))
}

/// Handle Ctrl+C gracefully
fn install_interrupt_handler(interrupt_handle: Arc<AtomicBool>) -> Result<()> {
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupted. Stopping at the next step...");
        interrupt_handle.store(true, Ordering::SeqCst);
    })
    .context("Failed to set Ctrl+C handler")
}

/// Export the grid of an accepted run; other outcomes write nothing
fn finish(outcome: PipelineOutcome, exporter: &Exporter, logger: &Logger) -> Completed {
    let export = match &outcome {
        PipelineOutcome::Accepted {
            run_id,
            grid,
            summary,
            ..
        } => {
            let verdict = CritiqueVerdict::Accepted {
                summary: summary.clone(),
            };
            exporter.export(grid, &verdict).map(|paths| {
                logger.log(&LogEvent::ExportCompleted {
                    run_id: run_id.clone(),
                    json_path: paths.json.clone(),
                    markdown_path: paths.markdown.clone(),
                });
                Some(paths)
            })
        }
        _ => Ok(None),
    };
    Completed { outcome, export }
}

fn print_dry_run(settings: &Settings, competencies: &[Competency]) {
    println!("=== Dry Run ===");
    println!("Provider: {}", settings.provider);
    println!("Generator model: {}", settings.generator_model);
    println!("Critic model: {}", settings.critic_model);
    println!("Output dir: {}", settings.output_dir.display());
    println!("Regeneration budget: {}", settings.regeneration_budget);
    println!(
        "Retries: {} transport, {} repair (timeout {:?})",
        settings.policy.max_transport_retries,
        settings.policy.max_repair_retries,
        settings.policy.timeout
    );
    println!(
        "Throttle: {} concurrent, {:?} between calls",
        settings.max_concurrent, settings.min_interval
    );
    for competency in competencies {
        println!(
            "Competency: {} [{} / {}, {}]",
            truncate(competency.statement(), 100),
            competency.level(),
            competency.track(),
            competency.duration_label()
        );
    }
}

fn print_outcome(completed: &Completed) {
    match &completed.outcome {
        PipelineOutcome::Accepted {
            cycles,
            summary,
            total_duration_secs,
            ..
        } => {
            eprintln!();
            eprintln!("=== ACCEPTED ===");
            eprintln!("Cycles: {}", cycles);
            eprintln!("Duration: {:.1}s", total_duration_secs);
            eprintln!("Summary: {}", summary);
        }
        PipelineOutcome::Failed {
            cycles,
            failed_in,
            reason,
            error,
            findings,
            total_duration_secs,
            ..
        } => {
            eprintln!();
            eprintln!("=== FAILED ===");
            eprintln!("Failed while {} after {} cycle(s): {}", failed_in, cycles, reason);
            eprintln!("Error: {}", error);
            eprintln!("Duration: {:.1}s", total_duration_secs);
            for finding in findings {
                eprintln!("  - {}", finding);
            }
        }
        PipelineOutcome::Cancelled {
            state,
            cycles,
            total_duration_secs,
            ..
        } => {
            eprintln!();
            eprintln!("=== CANCELLED ===");
            eprintln!("Stopped while {} after {} cycle(s)", state, cycles);
            eprintln!("Duration: {:.1}s", total_duration_secs);
            eprintln!("Nothing was exported.");
        }
    }

    match &completed.export {
        Ok(Some(paths)) => {
            eprintln!("JSON: {}", paths.json.display());
            eprintln!("Markdown: {}", paths.markdown.display());
        }
        Ok(None) => {}
        Err(e) => {
            eprintln!("{} {}", "Export failed:".bright_red().bold(), e);
            // Keep the accepted grid reachable so the work is not lost
            if let Ok(json) = serde_json::to_string_pretty(e.grid.as_ref()) {
                eprintln!("The accepted grid follows on stdout.");
                println!("{}", json);
            }
        }
    }
}

fn print_batch_summary(completed: &[(&String, Completed)]) {
    eprintln!();
    eprintln!("=== BATCH ===");
    for (i, (label, done)) in completed.iter().enumerate() {
        let status = match (&done.outcome, &done.export) {
            (_, Err(_)) => "EXPORT FAILED".bright_red(),
            (PipelineOutcome::Accepted { .. }, Ok(_)) => "ACCEPTED".bright_green(),
            (PipelineOutcome::Failed { .. }, _) => "FAILED".bright_red(),
            (PipelineOutcome::Cancelled { .. }, _) => "CANCELLED".bright_yellow(),
        };
        eprintln!("{:>3}. {} {}", i + 1, status, truncate(label, 60));
        match &done.export {
            Ok(Some(paths)) => eprintln!("     {}", paths.json.display()),
            Err(e) => eprintln!("     {}", e),
            Ok(None) => eprintln!("     {}", done.outcome.summary()),
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let head: String = text.chars().take(max_chars).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> RunArgs {
        RunArgs {
            provider: None,
            model: None,
            output_dir: None,
            regeneration_budget: None,
            log_format: LogFormatChoice::Pretty,
            log_file: None,
            json_output: false,
            dry_run: false,
        }
    }

    #[test]
    fn test_defaults_without_config() {
        let settings =
            Settings::resolve(&args(), &ProjectConfig::default(), Path::new("/work")).unwrap();

        assert_eq!(settings.provider, ProviderType::Gemini);
        assert_eq!(settings.generator_model, "gemini-2.5-flash");
        assert_eq!(settings.critic_model, "gemini-2.5-flash");
        assert_eq!(settings.output_dir, PathBuf::from("/work"));
        assert_eq!(
            settings.regeneration_budget,
            skillassess_core::DEFAULT_REGENERATION_BUDGET
        );
    }

    #[test]
    fn test_flags_override_config() {
        let config: ProjectConfig = toml::from_str(
            r#"
            provider = "gemini"
            output_dir = "grids"

            [pipeline]
            regeneration_budget = 3

            [critic]
            model = "gemini-2.5-pro"
            temperature = 0.1
            "#,
        )
        .unwrap();

        let from_config = Settings::resolve(&args(), &config, Path::new("/work")).unwrap();
        assert_eq!(from_config.output_dir, PathBuf::from("/work/grids"));
        assert_eq!(from_config.critic_model, "gemini-2.5-pro");
        assert_eq!(from_config.critic_temperature, Some(0.1));
        assert_eq!(from_config.regeneration_budget, 3);

        let flags = RunArgs {
            provider: Some(ProviderChoice::Deepseek),
            model: Some("deepseek-chat".into()),
            regeneration_budget: Some(0),
            ..args()
        };
        let settings = Settings::resolve(&flags, &config, Path::new("/work")).unwrap();
        assert_eq!(settings.provider, ProviderType::DeepSeek);
        assert_eq!(settings.generator_model, "deepseek-chat");
        assert_eq!(settings.critic_model, "deepseek-chat");
        assert_eq!(settings.regeneration_budget, 0);
    }

    #[test]
    fn test_cli_parses_generate() {
        let cli = Cli::try_parse_from([
            "skillassess",
            "generate",
            "--competency",
            "Configure a LAN",
            "--level",
            "intermediate",
            "--track",
            "networking",
            "--duration",
            "2h",
            "--provider",
            "deepseek",
            "-b",
            "2",
            "--json-output",
        ])
        .unwrap();

        match cli.command {
            Command::Generate { competency, run } => {
                assert!(competency.missing().is_empty());
                assert!(matches!(run.provider, Some(ProviderChoice::Deepseek)));
                assert_eq!(run.regeneration_budget, Some(2));
                assert!(run.json_output);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_truncate_is_char_safe() {
        assert_eq!(truncate("compétence", 4), "comp...");
        assert_eq!(truncate("short", 10), "short");
    }
}

// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result, anyhow};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use indicatif::{ProgressBar, ProgressStyle};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, debug, error, info, warn};
use std::collections::VecDeque;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;

use subtrans::app_config::{self, Config, ContextSize, TranslationProvider};
use subtrans::events::{ChannelEventSink, JobEvent};
use subtrans::language_utils;
use subtrans::providers::openai::OpenAI;
use subtrans::translation::{LlmTranslator, TranslationJob, TranslationOutcome, TranslationStyle};
use subtrans::verification::{Decision, Issue, VerificationReport};
use subtrans::{SrtBlock, SrtParser, SubtitleService};

/// CLI Wrapper for TranslationProvider to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliTranslationProvider {
    Mistral,
    OpenAI,
    OpenRouter,
}

impl From<CliTranslationProvider> for TranslationProvider {
    fn from(cli_provider: CliTranslationProvider) -> Self {
        match cli_provider {
            CliTranslationProvider::Mistral => TranslationProvider::Mistral,
            CliTranslationProvider::OpenAI => TranslationProvider::OpenAI,
            CliTranslationProvider::OpenRouter => TranslationProvider::OpenRouter,
        }
    }
}

/// CLI Wrapper for TranslationStyle to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliTranslationStyle {
    Precise,
    Natural,
    Creative,
}

impl From<CliTranslationStyle> for TranslationStyle {
    fn from(cli_style: CliTranslationStyle) -> Self {
        match cli_style {
            CliTranslationStyle::Precise => TranslationStyle::Precise,
            CliTranslationStyle::Natural => TranslationStyle::Natural,
            CliTranslationStyle::Creative => TranslationStyle::Creative,
        }
    }
}

/// CLI Wrapper for ContextSize to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliContextSize {
    Small,
    Medium,
    Large,
}

impl From<CliContextSize> for ContextSize {
    fn from(cli_size: CliContextSize) -> Self {
        match cli_size {
            CliContextSize::Small => ContextSize::Small,
            CliContextSize::Medium => ContextSize::Medium,
            CliContextSize::Large => ContextSize::Large,
        }
    }
}

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Translate an SRT file
    Translate(TranslateArgs),

    /// Review an existing translation block by block
    Verify(VerifyArgs),

    /// Generate shell completions for subtrans
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Options shared by every command that talks to a provider
#[derive(clap::Args, Debug)]
struct ProviderArgs {
    /// Translation provider to use
    #[arg(short, long, value_enum)]
    provider: Option<CliTranslationProvider>,

    /// Model name to use
    #[arg(short, long)]
    model: Option<String>,

    /// Target language, as an ISO code or an English name
    #[arg(short, long)]
    target_language: Option<String>,
}

#[derive(Parser, Debug)]
struct TranslateArgs {
    /// SRT file to translate
    #[arg(value_name = "INPUT_FILE")]
    input_file: PathBuf,

    /// Output file (default: INPUT.<lang>.srt next to the input)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Force overwrite of existing output files
    #[arg(short, long)]
    force_overwrite: bool,

    #[command(flatten)]
    provider: ProviderArgs,

    /// Translation style
    #[arg(short, long, value_enum)]
    style: Option<CliTranslationStyle>,

    /// Context window preset
    #[arg(long, value_enum)]
    context_size: Option<CliContextSize>,

    /// Seed for reproducible sampling
    #[arg(long)]
    seed: Option<u64>,

    /// Review the translation once it is complete
    #[arg(long)]
    verify: bool,
}

#[derive(Parser, Debug)]
struct VerifyArgs {
    /// Source SRT file
    #[arg(value_name = "ORIGINAL_FILE")]
    original_file: PathBuf,

    /// Translated SRT file to review
    #[arg(value_name = "TRANSLATED_FILE")]
    translated_file: PathBuf,

    /// Output file (default: overwrite TRANSLATED_FILE)
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[command(flatten)]
    provider: ProviderArgs,
}

/// subtrans - AI subtitle translation with reviewer approval
#[derive(Parser, Debug)]
#[command(name = "subtrans")]
#[command(version)]
#[command(about = "AI-powered subtitle translation with human review")]
#[command(long_about = "subtrans translates SRT subtitles with a chat-completion model and lets you review the result.

EXAMPLES:
    subtrans translate movie.srt                    # Translate using default config
    subtrans translate -t fr -s precise movie.srt   # French, literal style
    subtrans translate --verify movie.srt           # Translate, then review
    subtrans verify movie.srt movie.ru.srt          # Review an existing translation
    subtrans completions bash > subtrans.bash       # Generate bash completions

WHILE TRANSLATING:
    p + Enter pauses, r + Enter resumes, c + Enter or Ctrl-C cancels.

WHILE REVIEWING:
    a + Enter approves the proposal, e <text> + Enter replaces it with <text>,
    s + Enter keeps the current translation.

CONFIGURATION:
    Configuration is stored in conf.json by default. If the file doesn't
    exist, a default one is created. The API key can also be given through
    the SUBTRANS_API_KEY environment variable.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json", global = true)]
    config_path: PathBuf,

    /// Set logging level
    #[arg(short, long, value_enum, global = true)]
    log_level: Option<CliLogLevel>,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(level));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: ANSI colour code for log level
    fn color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "1;31",
            Level::Warn => "1;33",
            Level::Info => "1;32",
            Level::Debug => "1;36",
            Level::Trace => "1;35",
        }
    }

    // @returns: Tag for log level
    fn tag_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "ERR",
            Level::Warn => "WRN",
            Level::Info => "",
            Level::Debug => "DBG",
            Level::Trace => "TRC",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level && metadata.target().starts_with("subtrans")
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let level = record.level();
            let _ = writeln!(
                std::io::stderr(),
                "\x1B[{}m{} {:>3} {}\x1B[0m",
                Self::color_for_level(level),
                now,
                Self::tag_for_level(level),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Info until the config says otherwise
    CustomLogger::init(LevelFilter::Trace)?;
    log::set_max_level(LevelFilter::Info);

    let cli = CommandLineOptions::parse();

    match cli.command {
        Commands::Completions { shell } => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "subtrans", &mut std::io::stdout());
            Ok(())
        }
        Commands::Translate(args) => {
            let config = load_config(&cli.config_path, cli.log_level, &args.provider, |config| {
                if let Some(style) = &args.style {
                    config.translation.style = style.clone().into();
                }
                if let Some(size) = &args.context_size {
                    config.translation.context_size = size.clone().into();
                }
                if args.seed.is_some() {
                    config.translation.seed = args.seed;
                }
            })?;
            run_translate(args, config).await
        }
        Commands::Verify(args) => {
            let config = load_config(&cli.config_path, cli.log_level, &args.provider, |_| {})?;
            run_verify(args, config).await
        }
    }
}

/// Load the config file, apply command-line overrides and validate
fn load_config(
    path: &Path,
    log_level: Option<CliLogLevel>,
    provider: &ProviderArgs,
    overrides: impl FnOnce(&mut Config),
) -> Result<Config> {
    if let Some(level) = &log_level {
        let level: app_config::LogLevel = level.clone().into();
        log::set_max_level(level.to_level_filter());
    }

    let mut config = Config::load_or_create(path)?;

    if let Some(provider_type) = &provider.provider {
        let provider_type: TranslationProvider = provider_type.clone().into();
        if provider_type != config.provider.provider_type {
            // Model, endpoint and rate limit belong to the old provider
            let api_key = std::mem::take(&mut config.provider.api_key);
            config.provider = app_config::ProviderConfig::new(provider_type);
            config.provider.api_key = api_key;
        }
    }
    if let Some(model) = &provider.model {
        config.provider.model = model.clone();
    }
    if let Some(language) = &provider.target_language {
        config.target_language = language.clone();
    }
    if let Some(level) = log_level {
        config.log_level = level.into();
    }
    overrides(&mut config);

    config.validate().context("Configuration validation failed")?;
    log::set_max_level(config.log_level.to_level_filter());
    Ok(config)
}

/// Service backed by the configured provider, plus its event stream
fn build_service(config: &Config) -> Result<(Arc<SubtitleService>, mpsc::UnboundedReceiver<JobEvent>)> {
    let provider = OpenAI::from_config(&config.provider)?;
    let model = config.provider.get_model();
    info!("Using {} with model {}", config.provider.provider_type.display_name(), model);

    let translator = LlmTranslator::new(provider, model).with_analysis_parameters(
        config.verification.analysis_temperature,
        config.verification.analysis_top_p,
    );
    let (sink, events) = ChannelEventSink::new();
    let service = SubtitleService::from_config(config, Arc::new(translator), Arc::new(sink));
    Ok((Arc::new(service), events))
}

async fn run_translate(args: TranslateArgs, config: Config) -> Result<()> {
    let language = language_utils::resolve_language_name(&config.target_language)?;
    let output = match &args.output {
        Some(path) => path.clone(),
        None => default_output_path(&args.input_file, &config.target_language),
    };
    if output.exists() && !args.force_overwrite {
        return Err(anyhow!("Output file already exists: {}. Use -f to force overwrite.", output.display()));
    }

    let content = std::fs::read_to_string(&args.input_file)
        .with_context(|| format!("Failed to read subtitle file: {}", args.input_file.display()))?;
    let original = SrtParser::parse_document(&content)?;

    let (service, events) = build_service(&config)?;
    let job_id = SubtitleService::new_job_id();
    service.prepare_job(&job_id);
    let job = TranslationJob::new(language.clone(), config.translation.style).with_seed(config.translation.seed);
    info!("Translating {} to {} ({} blocks)", args.input_file.display(), language, original.len());

    let console = tokio::spawn(run_console(Arc::clone(&service), job_id.clone(), events));
    let outcome = service.translate_blocks(&job_id, &original, &job).await;

    let translated = match outcome? {
        TranslationOutcome::Completed(blocks) => blocks,
        TranslationOutcome::Cancelled { partial, windows_completed } => {
            console.abort();
            warn!("Cancelled after {} window(s), writing partial translation", windows_completed);
            write_srt(&output, &partial)?;
            info!("Partial result: {}", output.display());
            return Ok(());
        }
    };
    write_srt(&output, &translated)?;
    info!("Success: {}", output.display());

    if args.verify {
        let report = service.verify(&job_id, &original, &translated, &language).await;
        console.abort();
        let report = report?;
        write_srt(&output, &report.blocks)?;
        log_report(&report, &output);
    } else {
        console.abort();
    }
    Ok(())
}

async fn run_verify(args: VerifyArgs, config: Config) -> Result<()> {
    let language = language_utils::resolve_language_name(&config.target_language)?;
    let original = read_srt(&args.original_file)?;
    let translated = read_srt(&args.translated_file)?;
    let output = args.output.unwrap_or_else(|| args.translated_file.clone());

    let (service, events) = build_service(&config)?;
    let job_id = SubtitleService::new_job_id();
    info!("Reviewing {} ({} blocks, {})", args.translated_file.display(), translated.len(), language);

    let console = tokio::spawn(run_console(Arc::clone(&service), job_id.clone(), events));
    let report = service.verify(&job_id, &original, &translated, &language).await;
    console.abort();

    let report = report?;
    write_srt(&output, &report.blocks)?;
    log_report(&report, &output);
    Ok(())
}

fn read_srt(path: &Path) -> Result<Vec<SrtBlock>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read subtitle file: {}", path.display()))?;
    Ok(SrtParser::parse_document(&content)?)
}

fn write_srt(path: &Path, blocks: &[SrtBlock]) -> Result<()> {
    std::fs::write(path, SrtParser::build(blocks))
        .with_context(|| format!("Failed to write subtitle file: {}", path.display()))
}

// @returns: movie.srt -> movie.<lang>.srt in the same directory
fn default_output_path(input: &Path, language: &str) -> PathBuf {
    let stem = input.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_else(|| "output".to_string());
    let code = language.trim().to_lowercase().replace(char::is_whitespace, "_");
    input.with_file_name(format!("{}.{}.srt", stem, code))
}

fn log_report(report: &VerificationReport, output: &Path) {
    if !report.unresolved.is_empty() {
        let blocks: Vec<String> = report.unresolved.iter().map(|issue| issue.block_number.to_string()).collect();
        warn!("No proposal for block(s) {}, left unchanged", blocks.join(", "));
    }
    info!("Review complete: {} decision(s) applied to {}", report.decided.len(), output.display());
}

/// Terminal front end of a running job
///
/// Renders progress from the event stream and turns typed lines into run
/// control signals or review decisions.
async fn run_console(service: Arc<SubtitleService>, job_id: String, mut events: mpsc::UnboundedReceiver<JobEvent>) {
    let mut lines = spawn_stdin_reader();
    let progress_bar = ProgressBar::new(0);
    let template_result = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} blocks ({percent}%) {msg} {eta}")
        .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} ({percent}%) {msg}"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    progress_bar.set_style(template_result);

    let mut awaiting: VecDeque<Issue> = VecDeque::new();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                render_event(&progress_bar, &mut awaiting, event);
            }
            line = lines.recv(), if stdin_open => {
                let Some(line) = line else {
                    stdin_open = false;
                    continue;
                };
                handle_line(&service, &job_id, &progress_bar, &mut awaiting, line.trim());
            }
            result = tokio::signal::ctrl_c() => {
                if result.is_ok() {
                    progress_bar.println("Cancelling...");
                    service.cancel(&job_id);
                }
            }
        }
    }
}

fn render_event(progress_bar: &ProgressBar, awaiting: &mut VecDeque<Issue>, event: JobEvent) {
    match event {
        JobEvent::Progress { current, total, .. } => {
            progress_bar.set_length(total as u64);
            progress_bar.set_position(current as u64);
        }
        JobEvent::RunStateChanged { state, .. } => {
            let message = if state.cancelled {
                "cancelling"
            } else if state.paused {
                "paused"
            } else {
                ""
            };
            progress_bar.set_message(message);
        }
        JobEvent::JobCancelled { windows_completed, .. } => {
            progress_bar.abandon_with_message(format!("cancelled after {} window(s)", windows_completed));
        }
        JobEvent::VerificationStatus { description, percentage, .. } => {
            progress_bar.set_length(100);
            progress_bar.set_position(u64::from(percentage));
            progress_bar.set_message(description);
        }
        JobEvent::IssueFound { issue, .. } => {
            debug!("Issue on block {}: {}", issue.block_number, join_problems(&issue));
        }
        JobEvent::ApprovalRequested { issue, context_before, context_after, .. } => {
            progress_bar.suspend(|| print_approval_request(&issue, &context_before, &context_after));
            awaiting.push_back(issue);
        }
        JobEvent::DecisionApplied { block_number, status, .. } => {
            debug!("Block {} is now {:?}", block_number, status);
        }
        JobEvent::VerificationError { message, .. } => {
            error!("Review stopped: {}", message);
        }
        JobEvent::TranslationUpdate { .. } | JobEvent::OriginalUpdate { .. } => {}
    }
}

fn handle_line(
    service: &SubtitleService,
    job_id: &str,
    progress_bar: &ProgressBar,
    awaiting: &mut VecDeque<Issue>,
    line: &str,
) {
    if let Some(issue) = awaiting.front() {
        let block_number = issue.block_number;
        let decision = match line.split_once(' ').map_or((line, ""), |(cmd, rest)| (cmd, rest.trim())) {
            ("a", _) => Decision::approve(block_number, None),
            ("s", _) => Decision::skip(block_number),
            ("e", text) if !text.is_empty() => Decision::edit(block_number, text),
            _ => {
                progress_bar.println("  a = approve, e <text> = edit, s = skip");
                return;
            }
        };
        match service.submit_decision(job_id, decision) {
            Ok(()) => {
                awaiting.pop_front();
            }
            Err(e) => error!("Decision for block {} not accepted: {}", block_number, e),
        }
        return;
    }

    let reviewing = service.is_reviewing(job_id);
    let state = match line {
        "p" => service.pause(job_id),
        "r" => service.resume(job_id),
        "c" => service.cancel(job_id),
        "" => return,
        other => {
            progress_bar.println(format!("Unknown command '{}' (p = pause, r = resume, c = cancel)", other));
            return;
        }
    };
    // cancel still ends a review round
    if state.is_none() && !(line == "c" && reviewing) {
        progress_bar.println("No translation is running");
    }
}

fn print_approval_request(issue: &Issue, before: &[SrtBlock], after: &[SrtBlock]) {
    println!();
    println!("Block {} (score {}/10): {}", issue.block_number, issue.quality_score, join_problems(issue));
    for block in before {
        println!("    {} | {}", block.number, block.text.replace('\n', " / "));
    }
    println!("  original : {}", issue.original_text.replace('\n', " / "));
    println!("  current  : {}", issue.current_translation.replace('\n', " / "));
    if let Some(improved) = &issue.improved_translation {
        println!("  proposed : {}", improved.replace('\n', " / "));
    }
    if let Some(recommendations) = &issue.recommendations {
        println!("  notes    : {}", recommendations);
    }
    for block in after {
        println!("    {} | {}", block.number, block.text.replace('\n', " / "));
    }
    print!("[a]pprove, [e]dit <text>, [s]kip > ");
    let _ = std::io::stdout().flush();
}

fn join_problems(issue: &Issue) -> String {
    issue.problem_types.iter().map(|problem| problem.label()).collect::<Vec<_>>().join(", ")
}

// Blocking reads on a plain thread so runtime shutdown never waits on stdin
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (sender, receiver) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if sender.send(line).is_err() {
                break;
            }
        }
    });
    receiver
}

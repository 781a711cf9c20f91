//! Touchline CLI binary.
//!
//! Provides the command-line interface for multi-touch attribution, channel
//! importance and funnel stage analysis.

mod integration;

use chrono::{Duration, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use integration::cache_manager::{open_cache, print_cache_info};
use integration::event_pipeline::{EventInput, InputConfig, load_input};
use integration::funnel_import::FunnelFile;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration as StdDuration;
use touchline::{AttributionEngine, AttributionModel, EngineConfig, EngineRun};
use touchline_algorithmic::{
    AbsorptionMethod, MarkovConfig, MarkovModel, ShapleyConfig, ShapleyMode, ShapleyModel,
    StageMarkovService,
};
use touchline_data::ingest::write_events;
use touchline_data::{AnalysisCache, ChannelGrouping, EventFormat, EventGenerator, MemoryCache};
use touchline_models::{ModelCategory, available_models, models_by_category};
use touchline_output::{
    ChannelRow, ChannelTable, CreditRow, CreditTable, Exporter, ReportBuilder, StageRow,
    StageTable, TouchpointRow, compare_models,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "touchline")]
#[command(about = "Touchline: multi-touch marketing attribution", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Engine configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Seed for Monte-Carlo walks, Shapley sampling and event generation
    #[arg(long, global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct InputArgs {
    /// Event export (csv, json, jsonl or parquet)
    #[arg(short, long)]
    events: PathBuf,

    /// Event file format; detected from the extension when omitted
    #[arg(long, value_parser = parse_event_format)]
    input_format: Option<EventFormat>,

    /// Identity map JSON (`{"identity": ["anonymous id", ...]}`)
    #[arg(long)]
    identities: Option<PathBuf>,

    /// How touchpoints are grouped into channels
    #[arg(long, value_enum)]
    grouping: Option<GroupingArg>,
}

#[derive(Args)]
struct OutputArgs {
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Write to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Attribute conversions to touchpoints and roll credit up per channel
    Attribute {
        #[command(flatten)]
        input: InputArgs,

        /// Attribution model; the configured default when omitted
        #[arg(short, long, value_parser = parse_model)]
        model: Option<AttributionModel>,

        /// Attribution window in days
        #[arg(long)]
        window: Option<i64>,

        /// Export per-touchpoint credit instead of channel totals
        #[arg(long)]
        touchpoints: bool,

        /// Also write a JSON report envelope
        #[arg(long)]
        report: Option<PathBuf>,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Compare channel revenue shares across models
    Compare {
        #[command(flatten)]
        input: InputArgs,

        /// Models to compare (comma separated); all when omitted
        #[arg(long, value_delimiter = ',', value_parser = parse_model)]
        models: Vec<AttributionModel>,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Markov removal effects per channel
    Markov {
        #[command(flatten)]
        input: InputArgs,

        /// Random walks per simulation
        #[arg(long)]
        walks: Option<usize>,

        /// Solve absorption probabilities instead of simulating walks
        #[arg(long)]
        analytic: bool,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Shapley values per channel
    Shapley {
        #[command(flatten)]
        input: InputArgs,

        /// Solver
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,

        /// Permutations for the sampled solver
        #[arg(long)]
        samples: Option<usize>,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Funnel stage importance for an organization
    Stages {
        /// Organization id
        #[arg(long)]
        org: String,

        /// First day of the period (YYYY-MM-DD)
        #[arg(long)]
        start: NaiveDate,

        /// Last day of the period, inclusive (YYYY-MM-DD)
        #[arg(long)]
        end: NaiveDate,

        /// SQLite store; defaults to the platform cache directory
        #[arg(long)]
        db: Option<PathBuf>,

        /// Import a funnel export (JSON) into the store first
        #[arg(long)]
        import: Option<PathBuf>,

        /// Do not read or write cached analyses in the store
        #[arg(long)]
        no_cache: bool,

        /// Drop the cached analysis for this period before analyzing
        #[arg(long)]
        refresh: bool,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Generate synthetic journeys
    Generate {
        /// Number of journeys
        #[arg(long, default_value = "500")]
        journeys: usize,

        /// Days of history ending now
        #[arg(long, default_value = "30")]
        days: i64,

        /// Destination file
        #[arg(short, long)]
        output: PathBuf,

        /// File format; detected from the extension when omitted
        #[arg(long, value_parser = parse_event_format)]
        format: Option<EventFormat>,
    },

    /// List available attribution models
    Models,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Markdown,
    Csv,
    Json,
    PrettyJson,
}

impl OutputFormat {
    const fn export_format(self) -> Option<touchline_output::ExportFormat> {
        match self {
            Self::Text | Self::Markdown => None,
            Self::Csv => Some(touchline_output::ExportFormat::Csv),
            Self::Json => Some(touchline_output::ExportFormat::Json),
            Self::PrettyJson => Some(touchline_output::ExportFormat::PrettyJson),
        }
    }

    const fn is_table(self) -> bool {
        matches!(self, Self::Text | Self::Markdown)
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum GroupingArg {
    Source,
    SourceMedium,
    Full,
}

impl From<GroupingArg> for ChannelGrouping {
    fn from(arg: GroupingArg) -> Self {
        match arg {
            GroupingArg::Source => Self::Source,
            GroupingArg::SourceMedium => Self::SourceMedium,
            GroupingArg::Full => Self::Full,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Exact,
    Sampled,
    Auto,
}

impl From<ModeArg> for ShapleyMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Exact => Self::Exact,
            ModeArg::Sampled => Self::Sampled,
            ModeArg::Auto => Self::Auto,
        }
    }
}

fn parse_model(s: &str) -> Result<AttributionModel, String> {
    s.parse().map_err(|e: touchline::EngineError| e.to_string())
}

fn parse_event_format(s: &str) -> Result<EventFormat, String> {
    s.parse().map_err(|e: touchline_data::DataError| e.to_string())
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> CliResult {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if let Some(seed) = cli.seed {
        config.markov.seed = Some(seed);
        config.shapley.seed = Some(seed);
        config.stage.markov.seed = Some(seed);
    }
    debug!(?config, "Resolved engine configuration");

    match cli.command {
        Commands::Attribute {
            input,
            model,
            window,
            touchpoints,
            report,
            output,
        } => {
            if let Some(window) = window {
                config.path_builder.attribution_window_days = window;
            }
            attribute(config, &input, model, touchpoints, report, &output)?;
        }
        Commands::Compare {
            input,
            models,
            output,
        } => {
            compare(config, &input, models, &output)?;
        }
        Commands::Markov {
            input,
            walks,
            analytic,
            output,
        } => {
            if let Some(walks) = walks {
                config.markov.walks = walks;
            }
            if analytic {
                config.markov.method = AbsorptionMethod::Analytic;
            }
            markov(config, &input, &output)?;
        }
        Commands::Shapley {
            input,
            mode,
            samples,
            output,
        } => {
            if let Some(mode) = mode {
                config.shapley.mode = mode.into();
            }
            if let Some(samples) = samples {
                config.shapley.samples = samples;
            }
            shapley(config, &input, &output)?;
        }
        Commands::Stages {
            org,
            start,
            end,
            db,
            import,
            no_cache,
            refresh,
            output,
        } => {
            let request = StageRequest {
                org,
                start,
                end,
                db,
                import,
                no_cache,
                refresh,
            };
            stages(&config, &request, &output)?;
        }
        Commands::Generate {
            journeys,
            days,
            output,
            format,
        } => {
            generate(cli.seed, journeys, days, &output, format)?;
        }
        Commands::Models => list_models(),
    }

    Ok(())
}

fn load_with_progress(input: &InputArgs) -> CliResult<EventInput> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.enable_steady_tick(StdDuration::from_millis(100));

    let config = InputConfig {
        events: input.events.clone(),
        format: input.input_format,
        identities: input.identities.clone(),
    };
    match load_input(&config, Some(&pb)) {
        Ok(loaded) => Ok(loaded),
        Err(e) => {
            pb.finish_with_message("Failed!");
            Err(format!("Failed to load events: {}", e).into())
        }
    }
}

fn apply_grouping(config: &mut EngineConfig, input: &InputArgs) {
    if let Some(grouping) = input.grouping {
        config.grouping = grouping.into();
    }
}

/// Print `rows` as a table or export them, to stdout or `--output`.
fn emit<E: Exporter>(
    output: &OutputArgs,
    rows: &E,
    ascii: impl FnOnce() -> String,
    markdown: impl FnOnce() -> String,
) -> CliResult {
    let content = match output.format.export_format() {
        Some(format) => {
            if let Some(path) = &output.output {
                rows.export_to_file(path, format)?;
                println!("Wrote {}", path.display());
                return Ok(());
            }
            rows.export_to_string(format)?
        }
        None if output.format == OutputFormat::Markdown => markdown(),
        None => ascii(),
    };

    match &output.output {
        Some(path) => {
            std::fs::write(path, content)?;
            println!("Wrote {}", path.display());
        }
        None => println!("{content}"),
    }
    Ok(())
}

fn print_banner(title: &str) {
    println!("\n{}", "=".repeat(64));
    println!("{:^64}", title);
    println!("{}\n", "=".repeat(64));
}

fn print_run_summary(run: &EngineRun) {
    let paths = &run.paths;
    println!("Model:                {}", run.model);
    println!("Conversion paths:     {}", paths.conversion_paths.len());
    println!("Non-conversion paths: {}", paths.non_conversion_paths.len());
    println!("Conversion rate:      {:.2}%", paths.conversion_rate() * 100.0);
    if paths.dropped_events > 0 {
        println!("Dropped events:       {} (no identity)", paths.dropped_events);
    }
    println!("Credited value:       {:.2}\n", run.total_credit());
}

fn touchpoint_listing(rows: &[TouchpointRow]) -> String {
    let mut out = format!(
        "{:<24} {:>4} {:<32} {:>12} {:>8}\n",
        "Path", "Pos", "Channel", "Credit", "Share"
    );
    out.push_str(&"-".repeat(84));
    out.push('\n');
    for row in rows {
        out.push_str(&format!(
            "{:<24} {:>4} {:<32} {:>12.2} {:>7.2}%\n",
            row.path_id, row.position, row.channel_key, row.credit, row.credit_percentage
        ));
    }
    out
}

fn attribute(
    mut config: EngineConfig,
    input: &InputArgs,
    model: Option<AttributionModel>,
    touchpoints: bool,
    report: Option<PathBuf>,
    output: &OutputArgs,
) -> CliResult {
    apply_grouping(&mut config, input);
    let model = model.unwrap_or(config.model);
    let loaded = load_with_progress(input)?;

    let engine = AttributionEngine::new(config)?;
    let run = engine.run(model, &loaded.events, &loaded.identities)?;

    if output.format.is_table() {
        print_banner(&format!("ATTRIBUTION: {}", model.name().to_uppercase()));
        if loaded.skipped > 0 {
            println!("Skipped rows:         {} (unparseable timestamp)", loaded.skipped);
        }
        print_run_summary(&run);
    }

    if touchpoints {
        let rows = TouchpointRow::from_results(&run.results);
        emit(output, &rows, || touchpoint_listing(&rows), || touchpoint_listing(&rows))?;
    } else {
        let table = ChannelTable::new(model.name(), run.channels.clone());
        emit(
            output,
            &table.rows(),
            || table.to_ascii_table(),
            || table.to_markdown(),
        )?;
    }

    if let Some(path) = report {
        ReportBuilder::new()
            .model(model.name())
            .contents_from(&ChannelRow::from_aggregated(model.name(), &run.channels))?
            .build()?
            .write_to(&path)?;
        println!("Report written to {}", path.display());
    }

    Ok(())
}

fn compare(
    mut config: EngineConfig,
    input: &InputArgs,
    models: Vec<AttributionModel>,
    output: &OutputArgs,
) -> CliResult {
    apply_grouping(&mut config, input);
    let models = if models.is_empty() {
        AttributionModel::all().to_vec()
    } else {
        models
    };
    let loaded = load_with_progress(input)?;

    let engine = AttributionEngine::new(config)?;
    let paths = engine.build_paths(&loaded.events, &loaded.identities, Utc::now());

    let pb = ProgressBar::new(models.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("█▓░"),
    );

    let mut results = Vec::with_capacity(models.len());
    for model in models {
        pb.set_message(model.name());
        let run = engine.run_paths(model, paths.clone())?;
        results.push((model.name().to_string(), run.channels));
        pb.inc(1);
    }
    pb.finish_with_message("Compared");

    let comparison = compare_models(&results);
    if output.format.is_table() {
        print_banner("MODEL COMPARISON");
        if let Some(row) = comparison.most_contested() {
            println!(
                "Most contested channel: {} (share spread {:.1} pts)\n",
                row.channel_key,
                row.spread()
            );
        }
    }
    emit(
        output,
        &comparison,
        || comparison.to_ascii_table(),
        || comparison.to_markdown(),
    )
}

fn markov(mut config: EngineConfig, input: &InputArgs, output: &OutputArgs) -> CliResult {
    apply_grouping(&mut config, input);
    let loaded = load_with_progress(input)?;
    let engine = AttributionEngine::new(config)?;
    let paths = engine.build_paths(&loaded.events, &loaded.identities, Utc::now());

    let config = engine.config();
    let model = MarkovModel::new(MarkovConfig {
        grouping: config.grouping,
        ..config.markov.clone()
    })?;
    let analysis = model.analyze(&paths.conversion_paths, &paths.non_conversion_paths);

    if output.format.is_table() {
        print_banner("MARKOV REMOVAL EFFECTS");
        println!("Method:              {:?}", config.markov.method);
        println!(
            "Baseline conversion: {:.2}%\n",
            analysis.baseline_conversion_rate * 100.0
        );
    }

    let table = CreditTable::from_markov(&analysis);
    emit(
        output,
        &CreditRow::from_markov(&analysis),
        || table.to_ascii_table(),
        || table.to_markdown(),
    )
}

fn shapley(mut config: EngineConfig, input: &InputArgs, output: &OutputArgs) -> CliResult {
    apply_grouping(&mut config, input);
    let loaded = load_with_progress(input)?;
    let engine = AttributionEngine::new(config)?;
    let paths = engine.build_paths(&loaded.events, &loaded.identities, Utc::now());

    let config = engine.config();
    let model = ShapleyModel::new(ShapleyConfig {
        grouping: config.grouping,
        ..config.shapley.clone()
    })?;
    let analysis = model.analyze(&paths.conversion_paths, &paths.non_conversion_paths);

    if output.format.is_table() {
        print_banner("SHAPLEY VALUES");
        println!("Solver:          {:?}", analysis.mode_used);
        println!("Coalition value: {:.4}", analysis.total_value);
        if !analysis.excluded_channels.is_empty() {
            println!(
                "Excluded:        {} (above the exact cutoff)",
                analysis.excluded_channels.join(", ")
            );
        }
        println!();
    }

    let table = CreditTable::from_shapley(&analysis);
    emit(
        output,
        &CreditRow::from_shapley(&analysis),
        || table.to_ascii_table(),
        || table.to_markdown(),
    )
}

struct StageRequest {
    org: String,
    start: NaiveDate,
    end: NaiveDate,
    db: Option<PathBuf>,
    import: Option<PathBuf>,
    no_cache: bool,
    refresh: bool,
}

fn stages(config: &EngineConfig, request: &StageRequest, output: &OutputArgs) -> CliResult {
    let (store, path) = open_cache(request.db.as_deref())?;

    if let Some(import) = &request.import {
        let funnel = FunnelFile::from_json_file(import)?;
        let rows = funnel.import_into(&store)?;
        println!("Imported {} transition rows for {}", rows, funnel.org_id);
    }

    let memory = MemoryCache::new();
    let cache: &dyn AnalysisCache = if request.no_cache { &memory } else { &store };
    let service = StageMarkovService::new(&store, cache, config.stage.clone())?;

    if request.refresh {
        service.invalidate(&request.org, request.start, request.end)?;
    }
    let analysis = service.analyze(&request.org, request.start, request.end)?;

    if output.format.is_table() {
        print_banner(&format!("FUNNEL STAGES: {}", request.org));
        println!("Period:   {} to {}", analysis.period_start, analysis.period_end);
        println!("Visitors: {}", analysis.total_visitors);
        println!("Quality:  {}", analysis.quality);
        println!(
            "Baseline: {:.2}%",
            analysis.baseline_conversion_probability * 100.0
        );
        if analysis.used_fallback {
            println!("Note:     no usable transitions; position heuristic applied");
        }
        print_cache_info(&store, &path);
        println!();
    }

    let rows = StageRow::from_analysis(&analysis);
    let table = StageTable::new(analysis);
    emit(output, &rows, || table.to_ascii_table(), || table.to_markdown())
}

fn generate(
    seed: Option<u64>,
    journeys: usize,
    days: i64,
    output: &Path,
    format: Option<EventFormat>,
) -> CliResult {
    if days <= 0 {
        return Err(format!("days must be positive, got {}", days).into());
    }
    let end = Utc::now();
    let start = end - Duration::days(days);
    let format = format.unwrap_or_else(|| EventFormat::from_path(output));

    let events = EventGenerator::new(seed).generate_journeys(journeys, start, end);
    write_events(&events, output, format)?;

    println!(
        "Generated {} events over {} journeys into {} ({})",
        events.len(),
        journeys,
        output.display(),
        format.extension()
    );
    Ok(())
}

fn list_models() {
    println!("Attribution models:");
    println!("===================\n");

    for category in [
        ModelCategory::Direct,
        ModelCategory::Lift,
        ModelCategory::Probabilistic,
        ModelCategory::GameTheoretic,
    ] {
        let models = models_by_category(category);
        if models.is_empty() {
            continue;
        }
        println!("{}:", category.name());
        for info in models {
            let marker = if info.needs_non_conversions { "*" } else { " " };
            println!("  {:16}{} {}", info.name, marker, info.description);
        }
        println!();
    }

    println!(
        "{} models; * learns from non-converting journeys too",
        available_models().len()
    );
}

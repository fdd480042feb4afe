use anyhow::{anyhow, Context, Result};
use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{info, warn, Level};

use crate::analyzers::WeatherAnalyzer;
use crate::cli::args::{AnalysisInput, Cli, Commands, InputArgs};
use crate::config::EngineConfig;
use crate::models::{AlertRule, DataKind, Metric, Observation, Period, TimeRange};
use crate::processors::{IntegrityChecker, ParallelProcessor};
use crate::readers::{parse_timestamp, ConcurrentReader, InMemorySource, ObservationReader};
use crate::utils::generate_default_parquet_filename;
use crate::utils::progress::ProgressReporter;
use crate::writers::{CleaningReportWriter, ExportFormat, Exporter, ParquetWriter, Tabular};

pub async fn run(cli: Cli) -> Result<()> {
    init_logging(cli.verbose, cli.log_file.as_deref())?;

    let config = EngineConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Clean {
            input,
            output_dir,
            report_dir,
            compression,
            kind,
            pre_validate,
            no_progress,
        } => {
            let kind: DataKind = kind.parse()?;
            let observations = load_observations(&input, &config).await?;
            let batches = ParallelProcessor::group_by_city(observations);
            println!("Cleaning {} cities as {} data...", batches.len(), kind);

            let mut processor = ParallelProcessor::from_config(&config)
                .with_data_kind(kind)
                .with_pre_validation(pre_validate);
            if let Some(workers) = input.max_workers {
                processor = processor.with_max_workers(workers);
            }

            let progress = ProgressReporter::new(batches.len() as u64, "Cleaning cities", no_progress);
            let outcomes = processor.process_cities(batches, Some(&progress))?;

            let writer = ParquetWriter::new()
                .with_compression(&compression)?
                .with_row_group_size(config.processing.chunk_size);
            std::fs::create_dir_all(&output_dir)
                .with_context(|| format!("Failed to create {}", output_dir.display()))?;

            let mut cleaning_log = Vec::new();
            let mut failed = 0;
            for outcome in outcomes {
                match outcome.result {
                    Ok(cleaned) => {
                        if cleaned.batch.is_empty() {
                            println!("{}: no records", outcome.city);
                            continue;
                        }
                        let path = generate_default_parquet_filename(&output_dir, &outcome.city);
                        writer
                            .write_batch(&cleaned.batch, &path)
                            .with_context(|| format!("Failed to write {}", path.display()))?;
                        println!(
                            "{}: {} records, {} cleaning actions -> {}",
                            outcome.city,
                            cleaned.batch.len(),
                            cleaned.cleaning_log.len(),
                            path.display()
                        );
                        cleaning_log.extend(cleaned.cleaning_log);
                    }
                    Err(e) => {
                        failed += 1;
                        println!("{}: failed: {}", outcome.city, e);
                    }
                }
            }

            let report_dir = report_dir.unwrap_or(output_dir);
            match CleaningReportWriter::new(report_dir).write(&cleaning_log, Local::now().naive_local())? {
                Some(paths) => println!(
                    "Cleaning report: {}\nCleaning summary: {}",
                    paths.detail.display(),
                    paths.summary.display()
                ),
                None => println!("No cleaning actions were needed"),
            }

            if failed > 0 {
                warn!(failed, "Some cities could not be cleaned");
            }
            println!("Cleaning complete!");
        }

        Commands::Validate { input } => {
            let observations = load_observations(&input, &config).await?;
            let checker = IntegrityChecker::new();
            let (_standardized, report) = checker.validate_and_standardize(&observations)?;

            println!("\n{}", checker.generate_summary(&report));
            if report.violations.is_empty() {
                println!("All data passed validation checks");
            } else {
                println!("Found {} validation issues", report.violations.len());
            }
        }

        Commands::TimeAnalysis {
            analysis,
            city,
            metric,
            period,
        } => {
            let metric: Metric = metric.parse()?;
            let period: Period = period.parse()?;
            let analyzer = build_analyzer(&analysis, &config).await?;
            let table = analyzer.time_dimension_analysis(&city, metric, period);
            emit_table(&table, analysis.output.as_deref())?;
        }

        Commands::Regional {
            analysis,
            metric,
            period,
        } => {
            let metric: Metric = metric.parse()?;
            let period: Period = period.parse()?;
            let analyzer = build_analyzer(&analysis, &config).await?;
            let table = analyzer.regional_dimension_analysis(metric, period);
            emit_table(&table, analysis.output.as_deref())?;
        }

        Commands::Correlation { analysis, city } => {
            let analyzer = build_analyzer(&analysis, &config).await?;
            let matrix = analyzer.correlation_analysis(&city);
            emit_table(&matrix, analysis.output.as_deref())?;
        }

        Commands::Extremes {
            analysis,
            city,
            start,
            end,
        } => {
            let start = start.as_deref().map(parse_cli_timestamp).transpose()?;
            let end = end.as_deref().map(parse_cli_timestamp).transpose()?;
            let range = (start.is_some() || end.is_some()).then(|| TimeRange::new(start, end));

            let analyzer = build_analyzer(&analysis, &config).await?;
            let events = analyzer.identify_extreme_events(&city, range);
            emit_list(&events, analysis.output.as_deref())?;
        }

        Commands::Forecast {
            analysis,
            city,
            metric,
            horizon,
        } => {
            let metric: Metric = metric.parse()?;
            let analyzer = build_analyzer(&analysis, &config).await?;
            let forecast = analyzer.arima_forecast(&city, metric, horizon);
            if let Some(message) = forecast.message() {
                warn!(city = %city, "Forecast unavailable: {}", message);
            }
            emit_json(&forecast, analysis.output.as_deref())?;
        }

        Commands::Alerts {
            analysis,
            city,
            rules,
            now,
        } => {
            let rules = load_alert_rules(&rules)?;
            let now = match now.as_deref() {
                Some(s) => parse_cli_timestamp(s)?,
                None => Local::now().naive_local(),
            };
            let analyzer = build_analyzer(&analysis, &config).await?;
            let alerts = analyzer.check_weather_alerts(&city, &rules, now);
            emit_list(&alerts, analysis.output.as_deref())?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let builder = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false);

    match log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create log file {}", path.display()))?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
                .map_err(|e| anyhow!("Failed to initialise logging: {}", e))
        }
        None => builder
            .with_writer(std::io::stderr)
            .try_init()
            .map_err(|e| anyhow!("Failed to initialise logging: {}", e)),
    }
}

async fn load_observations(input: &InputArgs, config: &EngineConfig) -> Result<Vec<Observation>> {
    let reader = ObservationReader::new()
        .with_mmap(input.mmap)
        .with_encoding(&input.encoding)?;
    let workers = input.max_workers.unwrap_or(config.processing.max_workers);
    let concurrent = ConcurrentReader::new(workers).with_reader(reader);

    let mut files: Vec<PathBuf> = Vec::new();
    let mut observations = Vec::new();
    for path in &input.inputs {
        if path.is_dir() {
            observations.extend(
                concurrent
                    .read_directory(path)
                    .await
                    .with_context(|| format!("Failed to read {}", path.display()))?,
            );
        } else {
            files.push(path.clone());
        }
    }
    if !files.is_empty() {
        observations.extend(
            concurrent
                .read_files(files)
                .await
                .context("Failed to read observation files")?,
        );
    }

    info!(rows = observations.len(), "Observations loaded");
    Ok(observations)
}

async fn build_analyzer(
    analysis: &AnalysisInput,
    config: &EngineConfig,
) -> Result<WeatherAnalyzer<InMemorySource>> {
    let observations = load_observations(&analysis.input, config).await?;

    let observations = if analysis.clean {
        let mut processor = ParallelProcessor::from_config(config);
        if let Some(workers) = analysis.input.max_workers {
            processor = processor.with_max_workers(workers);
        }
        let outcomes =
            processor.process_cities(ParallelProcessor::group_by_city(observations), None)?;
        let mut cleaned = Vec::new();
        for outcome in outcomes {
            match outcome.result {
                Ok(result) => cleaned.extend(result.batch.into_observations()),
                Err(e) => warn!(city = %outcome.city, "Skipping city that failed cleaning: {}", e),
            }
        }
        cleaned
    } else {
        observations
    };

    Ok(WeatherAnalyzer::from_config(InMemorySource::new(observations), config))
}

fn load_alert_rules(path: &Path) -> Result<BTreeMap<Metric, AlertRule>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open alert rules {}", path.display()))?;
    let raw: BTreeMap<String, AlertRule> =
        serde_json::from_reader(file).context("Alert rules must map metric names to rules")?;

    raw.into_iter()
        .map(|(name, rule)| -> Result<(Metric, AlertRule)> { Ok((name.parse()?, rule)) })
        .collect()
}

fn parse_cli_timestamp(s: &str) -> Result<NaiveDateTime> {
    parse_timestamp(s).ok_or_else(|| anyhow!("Invalid timestamp: '{}'", s))
}

fn emit_table<T: Tabular + ?Sized>(table: &T, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            Exporter::table_to_file(table, path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Wrote {}", path.display());
        }
        None => {
            let stdout = std::io::stdout();
            Exporter::write_table(table, ExportFormat::Csv, stdout.lock())?;
        }
    }
    Ok(())
}

fn emit_list<T: Serialize>(items: &[T], output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            Exporter::list_to_file(items, path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Wrote {} records to {}", items.len(), path.display());
        }
        None => emit_json(items, None)?,
    }
    Ok(())
}

fn emit_json<T: Serialize + ?Sized>(value: &T, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            Exporter::write_json(value, file)?;
            println!("Wrote {}", path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            Exporter::write_json(value, &mut stdout)?;
            writeln!(stdout)?;
        }
    }
    Ok(())
}

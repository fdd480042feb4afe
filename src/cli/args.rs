use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::utils::constants::MAX_FORECAST_HORIZON;

#[derive(Parser)]
#[command(name = "weather-analytics")]
#[command(about = "Data-quality pipeline and analytics for city weather observations")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Log file path")]
    pub log_file: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        help = "Configuration file [default: weather-analytics.toml if present]"
    )]
    pub config: Option<PathBuf>,
}

/// Where observations are read from
#[derive(Args, Debug, Clone)]
pub struct InputArgs {
    #[arg(
        short,
        long = "input",
        required = true,
        num_args = 1..,
        help = "Observation CSV files or directories of CSV files"
    )]
    pub inputs: Vec<PathBuf>,

    #[arg(long, default_value = "utf-8", help = "Text encoding of the input files (e.g. gbk)")]
    pub encoding: String,

    #[arg(long, default_value = "false", help = "Memory-map input files")]
    pub mmap: bool,

    #[arg(long, help = "Worker threads [default: processing.max_workers]")]
    pub max_workers: Option<usize>,
}

/// Inputs for analysis commands, optionally cleaned before analysis
#[derive(Args, Debug, Clone)]
pub struct AnalysisInput {
    #[command(flatten)]
    pub input: InputArgs,

    #[arg(long, default_value = "false", help = "Run the quality pipeline before analysing")]
    pub clean: bool,

    #[arg(
        short,
        long,
        help = "Write the result to this file (.csv or .json) instead of stdout"
    )]
    pub output: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the quality pipeline and write cleaned Parquet files and a cleaning report
    Clean {
        #[command(flatten)]
        input: InputArgs,

        #[arg(short, long, default_value = "output")]
        output_dir: PathBuf,

        #[arg(long, help = "Cleaning report directory [default: output dir]")]
        report_dir: Option<PathBuf>,

        #[arg(short, long, default_value = "snappy")]
        compression: String,

        #[arg(
            short,
            long,
            default_value = "historical",
            help = "Batch kind: realtime, historical or extreme"
        )]
        kind: String,

        #[arg(long, default_value = "false", help = "Range-check and standardize before cleaning")]
        pre_validate: bool,

        #[arg(long, default_value = "false")]
        no_progress: bool,
    },

    /// Check input integrity without cleaning
    Validate {
        #[command(flatten)]
        input: InputArgs,
    },

    /// Aggregate one metric of one city by day, month or season
    TimeAnalysis {
        #[command(flatten)]
        analysis: AnalysisInput,

        #[arg(long)]
        city: String,

        #[arg(short, long, default_value = "temperature")]
        metric: String,

        #[arg(short, long, default_value = "daily", help = "daily, monthly or seasonal")]
        period: String,
    },

    /// Compare one metric across cities
    Regional {
        #[command(flatten)]
        analysis: AnalysisInput,

        #[arg(short, long, default_value = "temperature")]
        metric: String,

        #[arg(short, long, default_value = "daily", help = "daily or monthly")]
        period: String,
    },

    /// Pairwise metric correlations for one city
    Correlation {
        #[command(flatten)]
        analysis: AnalysisInput,

        #[arg(long)]
        city: String,
    },

    /// List extreme weather events
    Extremes {
        #[command(flatten)]
        analysis: AnalysisInput,

        #[arg(long)]
        city: String,

        #[arg(long, help = "Earliest timestamp (inclusive)")]
        start: Option<String>,

        #[arg(long, help = "Latest timestamp (inclusive)")]
        end: Option<String>,
    },

    /// Forecast daily means with ARIMA
    Forecast {
        #[command(flatten)]
        analysis: AnalysisInput,

        #[arg(long)]
        city: String,

        #[arg(short, long, default_value = "temperature")]
        metric: String,

        #[arg(
            long,
            value_parser = parse_horizon,
            help = "Days to forecast [default: forecast.horizon]"
        )]
        horizon: Option<usize>,
    },

    /// Evaluate threshold alerts against the latest observation
    Alerts {
        #[command(flatten)]
        analysis: AnalysisInput,

        #[arg(long)]
        city: String,

        #[arg(
            short,
            long,
            help = "JSON file mapping metric to {\"operator\": \">\", \"threshold\": 35}"
        )]
        rules: PathBuf,

        #[arg(long, help = "Evaluation time [default: now]")]
        now: Option<String>,
    },
}

fn parse_horizon(s: &str) -> Result<usize, String> {
    let days: usize = s
        .parse()
        .map_err(|_| format!("'{}' is not a number of days", s))?;
    if (1..=MAX_FORECAST_HORIZON).contains(&days) {
        Ok(days)
    } else {
        Err(format!("must be between 1 and {}", MAX_FORECAST_HORIZON))
    }
}

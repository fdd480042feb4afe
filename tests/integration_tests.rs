use chrono::{Duration, NaiveDate, NaiveDateTime};
use pretty_assertions::assert_eq;
use std::collections::BTreeMap;
use std::fs;
use tempfile::TempDir;
use weather_analytics::analyzers::{ExtremeEventDetector, ForecastEngine, WeatherAnalyzer};
use weather_analytics::models::rules::city_code;
use weather_analytics::models::{
    AlertRule, AlertSeverity, CleaningLog, Comparison, DataKind, Metric, Observation, Period,
};
use weather_analytics::processors::{OutlierMethod, ParallelProcessor, QualityProcessor};
use weather_analytics::readers::{ConcurrentReader, InMemorySource};
use weather_analytics::writers::{CleaningReportWriter, Exporter, ParquetWriter};

fn start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 7, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

/// Hourly series with every metric present and small deterministic noise.
fn hourly_series(city: &str, hours: usize) -> Vec<Observation> {
    (0..hours)
        .map(|i| {
            Observation::builder()
                .city(city)
                .timestamp(start() + Duration::hours(i as i64))
                .source("Meteostat")
                .temperature(20.0 + ((i * 7) % 5) as f64 * 0.1)
                .pressure(1013.0)
                .humidity(60.0 + (i % 10) as f64)
                .precipitation(0.0)
                .wind_speed(3.0 + (i % 4) as f64 * 0.5)
                .wind_direction(((i * 37) % 360) as f64)
                .build()
                .unwrap()
        })
        .collect()
}

fn spiked_series() -> Vec<Observation> {
    let mut rows = hourly_series("beijing", 100);
    rows[10].temperature = Some(100.0);
    rows
}

#[test]
fn test_spike_is_flagged_and_interpolated() {
    let rows = spiked_series();
    let processor = QualityProcessor::new();

    let detection = processor.detector().detect_iqr(&rows, Metric::Temperature);
    assert!(detection.indices.contains(&10));

    let mut log = CleaningLog::new();
    let (repaired, count) = processor
        .handle_outliers(&rows, Metric::Temperature, OutlierMethod::Interpolate, &mut log)
        .unwrap();
    assert_eq!(count, 1);
    assert_eq!(log.len(), 1);

    let before = repaired[9].temperature.unwrap();
    let fixed = repaired[10].temperature.unwrap();
    let after = repaired[11].temperature.unwrap();
    assert!(fixed != 100.0);
    assert!(fixed >= before.min(after) && fixed <= before.max(after));

    // caller's data is untouched
    assert_eq!(rows[10].temperature, Some(100.0));
}

#[test]
fn test_pipeline_normalization_properties() {
    let outcome = QualityProcessor::new()
        .preprocess(&spiked_series(), DataKind::Historical)
        .unwrap();
    let batch = outcome.batch;
    assert_eq!(batch.len(), 100);
    assert!(!outcome.cleaning_log.is_empty());

    assert!(batch.normalized_metrics.contains(&Metric::Temperature));
    // constant columns have no derived columns
    assert!(!batch.normalized_metrics.contains(&Metric::Pressure));
    assert!(!batch.standardized_metrics.contains(&Metric::Precipitation));

    let scaled: Vec<f64> = batch
        .records
        .iter()
        .map(|r| r.normalized_value(Metric::Temperature).unwrap())
        .collect();
    assert!(scaled.iter().all(|v| (0.0..=1.0).contains(v)));
    assert!(scaled.contains(&0.0));
    assert!(scaled.contains(&1.0));

    let z: Vec<f64> = batch
        .records
        .iter()
        .map(|r| r.standardized_value(Metric::Humidity).unwrap())
        .collect();
    let n = z.len() as f64;
    let mean = z.iter().sum::<f64>() / n;
    let var = z.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    assert!(mean.abs() < 1e-9);
    assert!((var.sqrt() - 1.0).abs() < 1e-9);

    assert!(batch.records.iter().all(|r| r.city_id == Some(1)));
}

#[test]
fn test_city_code_is_stable() {
    assert_eq!(city_code("beijing"), city_code("beijing"));
    assert_eq!(city_code("beijing"), Some(1));
}

#[test]
fn test_extreme_events_sorted_for_shuffled_input() {
    let mut rows = hourly_series("guangzhou", 48);
    rows[40].temperature = Some(39.0);
    rows[5].precipitation = Some(80.0);
    rows[20].humidity = Some(99.0);
    rows.reverse();

    let events = ExtremeEventDetector::new().detect(&rows, None);
    assert_eq!(events.len(), 3);
    assert!(events.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
}

#[test]
fn test_forecast_contract() {
    let daily: Vec<Observation> = (0..15)
        .map(|d| {
            let mut obs = Observation::new("shanghai", start() + Duration::days(d), "Kaggle");
            obs.temperature = Some(28.0 + (d % 3) as f64 + 0.1 * d as f64);
            obs
        })
        .collect();

    let engine = ForecastEngine::new();
    let result = engine.forecast(&daily, "shanghai", Metric::Temperature, 3);
    assert!(result.is_success(), "{:?}", result.message());

    let points = result.points();
    assert_eq!(points.len(), 3);
    let last_day = (start() + Duration::days(14)).date();
    for (i, point) in points.iter().enumerate() {
        assert_eq!(point.date, last_day + Duration::days(i as i64 + 1));
        assert!(point.lower_bound <= point.predicted_value);
        assert!(point.predicted_value <= point.upper_bound);
    }

    let short = engine.forecast(&daily[..9], "shanghai", Metric::Temperature, 3);
    assert!(!short.is_success());
    assert!(short.message().unwrap().contains('9'));
}

#[test]
fn test_alert_severity_scenario() {
    let now = start() + Duration::hours(12);
    let rules = BTreeMap::from([(Metric::Temperature, AlertRule::new(Comparison::Greater, 35.0))]);

    let check = |value: f64| {
        let mut obs = Observation::new("shenzhen", now - Duration::hours(1), "OpenWeatherMap");
        obs.temperature = Some(value);
        WeatherAnalyzer::new(InMemorySource::new(vec![obs])).check_weather_alerts("shenzhen", &rules, now)
    };

    assert_eq!(check(36.0)[0].severity, AlertSeverity::Medium);
    assert_eq!(check(40.0)[0].severity, AlertSeverity::High);
    assert!(check(30.0).is_empty());
}

#[tokio::test]
async fn test_csv_to_parquet_and_reports() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let input_dir = temp_dir.path().join("input");
    let output_dir = temp_dir.path().join("output");
    fs::create_dir_all(&input_dir).unwrap();

    for city in ["beijing", "chengdu"] {
        let mut text = String::from(
            "timestamp,city,temperature,pressure,humidity,precipitation,wind_speed,wind_direction,source\n",
        );
        for obs in hourly_series(city, 30) {
            let humidity = if obs.timestamp == start() + Duration::hours(3) {
                String::new()
            } else {
                obs.humidity.unwrap().to_string()
            };
            text.push_str(&format!(
                "{},{},{},{},{},{},{},{},{}\n",
                obs.timestamp.format("%Y-%m-%d %H:%M:%S"),
                city,
                obs.temperature.unwrap(),
                obs.pressure.unwrap(),
                humidity,
                obs.precipitation.unwrap(),
                obs.wind_speed.unwrap(),
                obs.wind_direction.unwrap(),
                obs.source
            ));
        }
        fs::write(input_dir.join(format!("{city}.csv")), text).unwrap();
    }

    let observations = ConcurrentReader::new(2).read_directory(&input_dir).await.unwrap();
    assert_eq!(observations.len(), 60);

    let batches = ParallelProcessor::group_by_city(observations);
    let outcomes = ParallelProcessor::new(2).process_cities(batches, None).unwrap();
    assert_eq!(outcomes.len(), 2);

    fs::create_dir_all(&output_dir).unwrap();
    let writer = ParquetWriter::new();
    let mut cleaning_log = Vec::new();
    let mut cleaned = Vec::new();
    for outcome in outcomes {
        let result = outcome.result.unwrap();
        let path = output_dir.join(format!("{}.parquet", outcome.city));
        writer.write_batch(&result.batch, &path).unwrap();
        assert_eq!(writer.get_file_info(&path).unwrap().total_rows, 30);

        cleaning_log.extend(result.cleaning_log);
        cleaned.extend(result.batch.into_observations());
    }
    assert!(cleaned.iter().all(|o| o.humidity.is_some()));

    let at = start() + Duration::days(10);
    let paths = CleaningReportWriter::new(&output_dir)
        .write(&cleaning_log, at)
        .unwrap()
        .expect("missing humidity should be logged");
    assert!(paths.summary.exists());

    let analyzer = WeatherAnalyzer::new(InMemorySource::new(cleaned));
    let table = analyzer.time_dimension_analysis("chengdu", Metric::Temperature, Period::Daily);
    assert_eq!(table.rows.len(), 2);
    assert_eq!(table.rows[0].count, 24);

    let csv_path = output_dir.join("chengdu_daily.csv");
    Exporter::table_to_file(&table, &csv_path).unwrap();
    assert_eq!(fs::read_to_string(&csv_path).unwrap().lines().count(), 3);

    let events = analyzer.identify_extreme_events("beijing", None);
    let json_path = output_dir.join("events.json");
    Exporter::list_to_file(&events, &json_path).unwrap();
    assert!(Exporter::list_to_file(&events, &output_dir.join("events.csv")).is_err());
}

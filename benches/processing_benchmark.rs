use chrono::{Duration, NaiveDate};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use weather_analytics::analyzers::{AggregationEngine, ExtremeEventDetector, ForecastEngine};
use weather_analytics::models::{DataKind, Metric, Observation, Period};
use weather_analytics::processors::{IntegrityChecker, ParallelProcessor, QualityProcessor};

// Hourly series with periodic gaps and an occasional spike
fn create_test_series(city: &str, hours: usize) -> Vec<Observation> {
    let start = NaiveDate::from_ymd_opt(2023, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();

    (0..hours)
        .map(|i| {
            let mut obs = Observation::new(city, start + Duration::hours(i as i64), "Meteostat");
            let daily = ((i % 24) as f64 / 24.0 * std::f64::consts::TAU).sin();
            obs.temperature = Some(if i % 97 == 0 { 75.0 } else { 15.0 + 8.0 * daily });
            obs.pressure = Some(1010.0 + (i % 13) as f64);
            obs.humidity = if i % 11 == 0 { None } else { Some(55.0 + 20.0 * daily) };
            obs.precipitation = Some(if i % 50 == 0 { 60.0 } else { 0.0 });
            obs.wind_speed = Some(2.0 + (i % 7) as f64);
            obs.wind_direction = Some(((i * 23) % 360) as f64);
            obs
        })
        .collect()
}

fn benchmark_quality_pipeline(c: &mut Criterion) {
    let series = create_test_series("beijing", 24 * 30);

    c.bench_function("quality_pipeline_30_days", |b| {
        let processor = QualityProcessor::new();
        b.iter(|| {
            let outcome = processor.preprocess(black_box(&series), DataKind::Historical);
            black_box(outcome.map(|o| o.batch.len()).unwrap_or(0))
        })
    });
}

fn benchmark_integrity_checker(c: &mut Criterion) {
    let series = create_test_series("shanghai", 24 * 30);

    c.bench_function("integrity_checker", |b| {
        b.iter(|| {
            let checker = IntegrityChecker::new();
            let result = checker.validate_and_standardize(black_box(&series));
            black_box(result.map(|(_, r)| r.total_records).unwrap_or(0))
        })
    });
}

fn benchmark_aggregations(c: &mut Criterion) {
    let mut rows = create_test_series("beijing", 24 * 365);
    rows.extend(create_test_series("guangzhou", 24 * 365));
    let engine = AggregationEngine::new();

    let mut group = c.benchmark_group("aggregation");
    for period in [Period::Daily, Period::Monthly, Period::Seasonal] {
        group.bench_with_input(BenchmarkId::new("time", period), &period, |b, &period| {
            b.iter(|| black_box(engine.time_dimension(&rows, "beijing", Metric::Temperature, period)))
        });
    }
    group.bench_function("regional_monthly", |b| {
        b.iter(|| black_box(engine.regional_dimension(&rows, Metric::Humidity, Period::Monthly)))
    });
    group.bench_function("correlation", |b| {
        b.iter(|| black_box(engine.correlation(&rows, "guangzhou")))
    });
    group.finish();
}

fn benchmark_analysis(c: &mut Criterion) {
    let rows = create_test_series("chengdu", 24 * 90);

    c.bench_function("extreme_events_90_days", |b| {
        let detector = ExtremeEventDetector::new();
        b.iter(|| black_box(detector.detect(&rows, None).len()))
    });

    c.bench_function("arima_forecast_90_days", |b| {
        let engine = ForecastEngine::new();
        b.iter(|| black_box(engine.forecast(&rows, "chengdu", Metric::Temperature, 7)))
    });
}

fn benchmark_parallel_cities(c: &mut Criterion) {
    let mut group = c.benchmark_group("parallel_cities");

    for &cities in &[1usize, 5, 20] {
        group.bench_with_input(BenchmarkId::new("cities", cities), &cities, |b, &count| {
            let rows: Vec<Observation> = (0..count)
                .flat_map(|c| create_test_series(&format!("city_{c}"), 24 * 7))
                .collect();
            let processor = ParallelProcessor::default();

            b.iter(|| {
                let batches = ParallelProcessor::group_by_city(rows.clone());
                let outcomes = processor.process_cities(batches, None);
                black_box(outcomes.map(|o| o.len()).unwrap_or(0))
            })
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    benchmark_quality_pipeline,
    benchmark_integrity_checker,
    benchmark_aggregations,
    benchmark_analysis,
    benchmark_parallel_cities
);
criterion_main!(benches);

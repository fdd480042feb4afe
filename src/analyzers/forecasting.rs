//! Univariate ARIMA forecasting on daily-resampled series.
//!
//! AR coefficients are estimated with Yule-Walker (Levinson-Durbin), MA
//! coefficients from the autocorrelation of the AR residuals, and prediction
//! intervals from the psi-weights of the integrated model.

use chrono::{Duration, NaiveDate};
use statrs::distribution::{ContinuousCDF, Normal};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info, warn};

use crate::config::ForecastConfig;
use crate::error::{AnalyticsError, Result};
use crate::models::{ForecastPoint, ForecastResult, Metric, ObservationRow};
use crate::processors::imputation::interpolate_linear;
use crate::utils::constants::{
    DEFAULT_CONFIDENCE_LEVEL, DEFAULT_FORECAST_HORIZON, DEFAULT_MIN_FORECAST_OBSERVATIONS,
    FALLBACK_ARIMA_ORDER, MAX_FORECAST_HORIZON, PRIMARY_ARIMA_ORDER,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArimaOrder {
    pub p: usize,
    pub d: usize,
    pub q: usize,
}

impl From<(usize, usize, usize)> for ArimaOrder {
    fn from((p, d, q): (usize, usize, usize)) -> Self {
        Self { p, d, q }
    }
}

impl fmt::Display for ArimaOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.p, self.d, self.q)
    }
}

/// Point forecast with its two-sided prediction interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictionInterval {
    pub mean: f64,
    pub lower: f64,
    pub upper: f64,
}

/// A fitted ARIMA(p, d, q) model.
#[derive(Debug, Clone)]
pub struct Arima {
    order: ArimaOrder,
    ar: Vec<f64>,
    ma: Vec<f64>,
    /// Mean of the differenced series; acts as drift after integration.
    mean: f64,
    /// Innovations variance.
    sigma2: f64,
    /// Differenced series minus its mean.
    centered: Vec<f64>,
    residuals: Vec<f64>,
    /// Last value of each differencing level, level 0 first.
    tails: Vec<f64>,
    n_obs: usize,
}

impl Arima {
    pub fn fit(data: &[f64], order: ArimaOrder) -> Result<Self> {
        if data.iter().any(|v| !v.is_finite()) {
            return Err(AnalyticsError::ModelFit(
                "series contains non-finite values".to_string(),
            ));
        }

        let mut series = data.to_vec();
        let mut tails = Vec::with_capacity(order.d);
        for _ in 0..order.d {
            let Some(&last) = series.last() else {
                break;
            };
            tails.push(last);
            series = difference(&series);
        }

        let required = order.p + order.q + 3;
        if series.len() < required {
            return Err(AnalyticsError::ModelFit(format!(
                "ARIMA{} needs at least {} points after differencing, got {}",
                order,
                required,
                series.len()
            )));
        }

        let n = series.len();
        let mean = series.iter().sum::<f64>() / n as f64;
        let centered: Vec<f64> = series.iter().map(|v| v - mean).collect();

        let ar = yule_walker(&centered, order.p);
        let ar_residuals: Vec<f64> = (order.p..n)
            .map(|t| centered[t] - (0..order.p).map(|j| ar[j] * centered[t - j - 1]).sum::<f64>())
            .collect();
        let ma = residual_ma(&ar_residuals, order.q);

        let residuals = arma_residuals(&centered, &ar, &ma);
        let conditional = &residuals[order.p..];
        let sigma2 = conditional.iter().map(|e| e * e).sum::<f64>() / conditional.len() as f64;

        if !mean.is_finite()
            || !sigma2.is_finite()
            || ar.iter().chain(ma.iter()).any(|c| !c.is_finite())
        {
            return Err(AnalyticsError::ModelFit(format!(
                "ARIMA{} estimation produced non-finite coefficients",
                order
            )));
        }

        debug!(order = %order, ?ar, ?ma, sigma2, "Fitted ARIMA model");

        Ok(Self {
            order,
            ar,
            ma,
            mean,
            sigma2,
            centered,
            residuals,
            tails,
            n_obs: data.len(),
        })
    }

    pub fn order(&self) -> ArimaOrder {
        self.order
    }

    pub fn ar_coefficients(&self) -> &[f64] {
        &self.ar
    }

    pub fn ma_coefficients(&self) -> &[f64] {
        &self.ma
    }

    pub fn sigma2(&self) -> f64 {
        self.sigma2
    }

    /// Point forecasts on the original scale.
    pub fn forecast(&self, steps: usize) -> Vec<f64> {
        let n = self.centered.len();
        let mut x = self.centered.clone();
        let mut e = self.residuals.clone();

        for _ in 0..steps {
            let len = x.len();
            let ar_part: f64 = self
                .ar
                .iter()
                .enumerate()
                .map(|(j, c)| c * x[len - j - 1])
                .sum();
            let ma_part: f64 = self
                .ma
                .iter()
                .enumerate()
                .filter(|(k, _)| *k < e.len())
                .map(|(k, c)| c * e[e.len() - k - 1])
                .sum();
            x.push(ar_part + ma_part);
            // future shocks have zero expectation
            e.push(0.0);
        }

        let diffs: Vec<f64> = x[n..].iter().map(|v| v + self.mean).collect();
        self.integrate(diffs)
    }

    /// Forecasts with intervals at `confidence` (e.g. 0.95).
    pub fn forecast_with_intervals(
        &self,
        steps: usize,
        confidence: f64,
    ) -> Result<Vec<PredictionInterval>> {
        if !(confidence > 0.0 && confidence < 1.0) {
            return Err(AnalyticsError::Config(format!(
                "confidence level must be in (0, 1), got {}",
                confidence
            )));
        }

        let normal = Normal::new(0.0, 1.0).map_err(|e| AnalyticsError::ModelFit(e.to_string()))?;
        let z = normal.inverse_cdf(1.0 - (1.0 - confidence) / 2.0);

        let mut cumulative = 0.0;
        let intervals = self
            .forecast(steps)
            .into_iter()
            .zip(self.psi_weights(steps))
            .map(|(mean, psi)| {
                cumulative += psi * psi;
                let se = (self.sigma2 * cumulative).sqrt();
                PredictionInterval {
                    mean,
                    lower: mean - z * se,
                    upper: mean + z * se,
                }
            })
            .collect();

        Ok(intervals)
    }

    /// Psi-weights of the integrated model; the h-step forecast variance is
    /// `sigma2 * sum(psi[0..h]^2)`.
    fn psi_weights(&self, steps: usize) -> Vec<f64> {
        // (1 - sum ar_j B^j)(1 - B)^d
        let mut poly = vec![1.0];
        poly.extend(self.ar.iter().map(|c| -c));
        for _ in 0..self.order.d {
            let mut next = poly.clone();
            next.push(0.0);
            for i in 1..next.len() {
                next[i] -= poly[i - 1];
            }
            poly = next;
        }
        let phi: Vec<f64> = poly[1..].iter().map(|c| -c).collect();

        let mut psi = Vec::with_capacity(steps);
        for j in 0..steps {
            if j == 0 {
                psi.push(1.0);
                continue;
            }
            let theta = self.ma.get(j - 1).copied().unwrap_or(0.0);
            let ar_part: f64 = (1..=j.min(phi.len())).map(|i| phi[i - 1] * psi[j - i]).sum();
            psi.push(theta + ar_part);
        }
        psi
    }

    fn integrate(&self, mut values: Vec<f64>) -> Vec<f64> {
        for &start in self.tails.iter().rev() {
            let mut level = start;
            for v in values.iter_mut() {
                level += *v;
                *v = level;
            }
        }
        values
    }

    pub fn summary(&self) -> String {
        let fmt_coeffs = |coeffs: &[f64]| {
            coeffs
                .iter()
                .map(|c| format!("{:.4}", c))
                .collect::<Vec<_>>()
                .join(", ")
        };

        let mut summary = String::new();
        summary.push_str(&format!(
            "ARIMA{} fitted on {} daily observations\n",
            self.order, self.n_obs
        ));
        summary.push_str(&format!("AR coefficients: [{}]\n", fmt_coeffs(&self.ar)));
        summary.push_str(&format!("MA coefficients: [{}]\n", fmt_coeffs(&self.ma)));
        summary.push_str(&format!("Drift: {:.4}\n", self.mean));
        summary.push_str(&format!("Sigma^2: {:.4}\n", self.sigma2));
        summary
    }
}

fn difference(series: &[f64]) -> Vec<f64> {
    series.windows(2).map(|w| w[1] - w[0]).collect()
}

fn autocovariance(centered: &[f64], lag: usize) -> f64 {
    let n = centered.len();
    (lag..n).map(|t| centered[t] * centered[t - lag]).sum::<f64>() / n as f64
}

/// Solve the Yule-Walker equations by Levinson-Durbin recursion.
fn yule_walker(centered: &[f64], p: usize) -> Vec<f64> {
    let mut phi = vec![0.0; p];
    let gamma: Vec<f64> = (0..=p).map(|k| autocovariance(centered, k)).collect();

    let mut v = gamma[0];
    for k in 1..=p {
        if v.abs() < 1e-12 {
            break;
        }
        let acc = gamma[k] - (1..k).map(|j| phi[j - 1] * gamma[k - j]).sum::<f64>();
        let kappa = acc / v;
        let prev = phi.clone();
        phi[k - 1] = kappa;
        for j in 1..k {
            phi[j - 1] = prev[j - 1] - kappa * prev[k - j - 1];
        }
        v *= 1.0 - kappa * kappa;
    }
    phi
}

/// MA coefficients from the lagged autocorrelation of the AR residuals,
/// bounded to keep the model invertible.
fn residual_ma(residuals: &[f64], q: usize) -> Vec<f64> {
    let mut theta = vec![0.0; q];
    if q == 0 || residuals.is_empty() {
        return theta;
    }

    let n = residuals.len() as f64;
    let mean = residuals.iter().sum::<f64>() / n;
    let centered: Vec<f64> = residuals.iter().map(|r| r - mean).collect();
    let var = autocovariance(&centered, 0);
    if var.abs() < 1e-12 {
        return theta;
    }

    for (k, coeff) in theta.iter_mut().enumerate() {
        *coeff = (autocovariance(&centered, k + 1) / var).clamp(-0.99, 0.99);
    }
    theta
}

/// One-step-ahead innovations of the ARMA recursion. Residuals before the
/// first full AR window are zero.
fn arma_residuals(centered: &[f64], ar: &[f64], ma: &[f64]) -> Vec<f64> {
    let p = ar.len();
    let mut eps = vec![0.0; centered.len()];
    for t in p..centered.len() {
        let ar_part: f64 = ar.iter().enumerate().map(|(j, c)| c * centered[t - j - 1]).sum();
        let ma_part: f64 = ma
            .iter()
            .enumerate()
            .filter(|(k, _)| t > *k)
            .map(|(k, c)| c * eps[t - k - 1])
            .sum();
        eps[t] = centered[t] - ar_part - ma_part;
    }
    eps
}

/// Forecasts one metric for one city with order fallback.
#[derive(Debug, Clone)]
pub struct ForecastEngine {
    min_observations: usize,
    horizon: usize,
    confidence_level: f64,
    primary_order: ArimaOrder,
    fallback_order: ArimaOrder,
}

impl ForecastEngine {
    pub fn new() -> Self {
        Self {
            min_observations: DEFAULT_MIN_FORECAST_OBSERVATIONS,
            horizon: DEFAULT_FORECAST_HORIZON,
            confidence_level: DEFAULT_CONFIDENCE_LEVEL,
            primary_order: PRIMARY_ARIMA_ORDER.into(),
            fallback_order: FALLBACK_ARIMA_ORDER.into(),
        }
    }

    pub fn from_config(config: &ForecastConfig) -> Self {
        Self {
            min_observations: config.min_observations,
            horizon: config.horizon,
            confidence_level: config.confidence_level,
            primary_order: config.primary_order.into(),
            fallback_order: config.fallback_order.into(),
        }
    }

    pub fn with_confidence_level(mut self, confidence_level: f64) -> Self {
        self.confidence_level = confidence_level;
        self
    }

    pub fn default_horizon(&self) -> usize {
        self.horizon
    }

    /// Forecast `horizon` days of `metric` for `city`. Never fails: every
    /// error becomes a `ForecastResult::Failure` carrying its message.
    pub fn forecast<R: ObservationRow>(
        &self,
        rows: &[R],
        city: &str,
        metric: Metric,
        horizon: usize,
    ) -> ForecastResult {
        match self.try_forecast(rows, city, metric, horizon) {
            Ok(result) => result,
            Err(e) => {
                warn!(city, metric = %metric, "Forecast failed: {}", e);
                ForecastResult::failure(e.to_string())
            }
        }
    }

    fn try_forecast<R: ObservationRow>(
        &self,
        rows: &[R],
        city: &str,
        metric: Metric,
        horizon: usize,
    ) -> Result<ForecastResult> {
        if !(1..=MAX_FORECAST_HORIZON).contains(&horizon) {
            return Err(AnalyticsError::InvalidFormat(format!(
                "forecast horizon must be between 1 and {} days, got {}",
                MAX_FORECAST_HORIZON, horizon
            )));
        }

        let daily = daily_means(rows, city, metric);
        if daily.len() < self.min_observations {
            return Err(AnalyticsError::InsufficientData {
                actual: daily.len(),
                required: self.min_observations,
            });
        }

        let series = fill_calendar_gaps(&daily);
        let values: Vec<f64> = series.iter().map(|(_, v)| *v).collect();
        let Some(&(last_date, _)) = series.last() else {
            return Err(AnalyticsError::InsufficientData {
                actual: 0,
                required: self.min_observations,
            });
        };

        let model = match Arima::fit(&values, self.primary_order) {
            Ok(model) => model,
            Err(primary_err) => {
                warn!(
                    order = %self.primary_order,
                    fallback = %self.fallback_order,
                    "Primary ARIMA fit failed, retrying: {}",
                    primary_err
                );
                Arima::fit(&values, self.fallback_order)?
            }
        };

        let intervals = model.forecast_with_intervals(horizon, self.confidence_level)?;
        let dates = (1..=horizon as i64).map_while(|i| last_date.checked_add_signed(Duration::days(i)));

        // Only the common prefix of dates and intervals is emitted
        let forecast_data: Vec<ForecastPoint> = dates
            .zip(intervals)
            .map(|(date, interval)| ForecastPoint {
                date,
                predicted_value: interval.mean,
                lower_bound: interval.lower,
                upper_bound: interval.upper,
            })
            .collect();

        info!(
            city,
            metric = %metric,
            order = %model.order(),
            points = forecast_data.len(),
            "Forecast complete"
        );

        Ok(ForecastResult::Success {
            city: city.to_string(),
            metric,
            forecast_days: horizon,
            forecast_data,
            model_summary: model.summary(),
        })
    }
}

impl Default for ForecastEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Daily means of the present values of `metric` for `city`, by date.
pub fn daily_means<R: ObservationRow>(rows: &[R], city: &str, metric: Metric) -> Vec<(NaiveDate, f64)> {
    let mut days: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
    for obs in rows.iter().map(|r| r.observation()).filter(|o| o.city == city) {
        if let Some(value) = obs.value(metric) {
            let slot = days.entry(obs.timestamp.date()).or_insert((0.0, 0));
            slot.0 += value;
            slot.1 += 1;
        }
    }
    days.into_iter()
        .map(|(date, (sum, count))| (date, sum / count as f64))
        .collect()
}

/// Put the series on a gap-free daily grid, interpolating missing days.
fn fill_calendar_gaps(daily: &[(NaiveDate, f64)]) -> Vec<(NaiveDate, f64)> {
    let (Some(&(first, _)), Some(&(last, _))) = (daily.first(), daily.last()) else {
        return Vec::new();
    };

    let span = (last - first).num_days() as usize + 1;
    let mut column: Vec<Option<f64>> = vec![None; span];
    for (date, value) in daily {
        column[(*date - first).num_days() as usize] = Some(*value);
    }
    interpolate_linear(&mut column);

    column
        .into_iter()
        .enumerate()
        .filter_map(|(i, v)| Some((first + Duration::days(i as i64), v?)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Observation;
    use chrono::NaiveDateTime;

    fn day(offset: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
            + Duration::days(offset)
    }

    fn daily_temperatures(values: &[f64]) -> Vec<Observation> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let mut obs = Observation::new("beijing", day(i as i64), "Meteostat");
                obs.temperature = Some(*v);
                obs
            })
            .collect()
    }

    fn wavy(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| 15.0 + 0.3 * i as f64 + 2.0 * (i as f64 * 0.9).sin())
            .collect()
    }

    #[test]
    fn test_insufficient_data_names_count() {
        let rows = daily_temperatures(&wavy(7));
        let result = ForecastEngine::new().forecast(&rows, "beijing", Metric::Temperature, 3);
        assert!(!result.is_success());
        let message = result.message().unwrap();
        assert!(message.contains("7"), "message was: {message}");
        assert!(message.to_lowercase().contains("insufficient data"));
    }

    #[test]
    fn test_forecast_shape_and_bounds() {
        let rows = daily_temperatures(&wavy(30));
        let result = ForecastEngine::new().forecast(&rows, "beijing", Metric::Temperature, 3);
        assert!(result.is_success(), "{:?}", result.message());

        let points = result.points();
        assert_eq!(points.len(), 3);
        let last_observed = day(29).date();
        for (i, point) in points.iter().enumerate() {
            assert_eq!(point.date, last_observed + Duration::days(i as i64 + 1));
            assert!(point.lower_bound <= point.predicted_value);
            assert!(point.predicted_value <= point.upper_bound);
        }
        // intervals widen with the horizon
        let width = |p: &ForecastPoint| p.upper_bound - p.lower_bound;
        assert!(width(&points[2]) >= width(&points[0]));
    }

    #[test]
    fn test_horizon_out_of_range_fails() {
        let rows = daily_temperatures(&wavy(30));
        let engine = ForecastEngine::new();

        let zero = engine.forecast(&rows, "beijing", Metric::Temperature, 0);
        assert!(!zero.is_success());
        assert!(zero.message().unwrap().contains("horizon"));

        let huge = engine.forecast(&rows, "beijing", Metric::Temperature, MAX_FORECAST_HORIZON + 1);
        assert!(!huge.is_success());
    }

    #[test]
    fn test_ten_points_is_enough() {
        let rows = daily_temperatures(&wavy(10));
        let result = ForecastEngine::new().forecast(&rows, "beijing", Metric::Temperature, 3);
        assert!(result.is_success(), "{:?}", result.message());
        assert_eq!(result.points().len(), 3);
    }

    #[test]
    fn test_falls_back_to_simpler_order() {
        // Primary order cannot fit on 6 differenced points with p+q+3 = 8
        let mut config = ForecastConfig::default();
        config.min_observations = 7;
        config.primary_order = (4, 1, 1);
        let rows = daily_temperatures(&wavy(7));

        let result = ForecastEngine::from_config(&config).forecast(&rows, "beijing", Metric::Temperature, 2);
        assert!(result.is_success(), "{:?}", result.message());
        match result {
            ForecastResult::Success { model_summary, .. } => {
                assert!(model_summary.starts_with("ARIMA(1, 1, 0)"))
            }
            ForecastResult::Failure { .. } => unreachable!(),
        }
    }

    #[test]
    fn test_both_orders_failing_reports_fit_error() {
        let mut config = ForecastConfig::default();
        config.min_observations = 3;
        let rows = daily_temperatures(&[1.0, 2.0, 4.0]);
        let result = ForecastEngine::from_config(&config).forecast(&rows, "beijing", Metric::Temperature, 3);
        assert!(!result.is_success());
        assert!(result.message().unwrap().contains("Model fit failed"));
    }

    #[test]
    fn test_linear_trend_is_extrapolated() {
        let values: Vec<f64> = (0..12).map(|i| 10.0 + 2.0 * i as f64).collect();
        let model = Arima::fit(&values, ArimaOrder { p: 1, d: 1, q: 0 }).unwrap();
        let forecast = model.forecast(3);
        for (i, v) in forecast.iter().enumerate() {
            assert!((v - (34.0 + 2.0 * i as f64)).abs() < 1e-9);
        }
    }

    #[test]
    fn test_psi_weights_of_integrated_ar1() {
        let model = Arima {
            order: ArimaOrder { p: 1, d: 1, q: 0 },
            ar: vec![0.5],
            ma: Vec::new(),
            mean: 0.0,
            sigma2: 1.0,
            centered: vec![0.0; 5],
            residuals: vec![0.0; 5],
            tails: vec![0.0],
            n_obs: 6,
        };
        // (1 - 0.5B)(1 - B) = 1 - 1.5B + 0.5B^2
        assert_eq!(model.psi_weights(3), vec![1.0, 1.5, 1.75]);
    }

    #[test]
    fn test_non_finite_series_is_rejected() {
        let result = Arima::fit(&[1.0, f64::INFINITY, 2.0, 3.0, 4.0, 5.0], ArimaOrder { p: 1, d: 1, q: 0 });
        assert!(matches!(result, Err(AnalyticsError::ModelFit(_))));
    }

    #[test]
    fn test_gaps_are_interpolated_on_daily_grid() {
        let d0 = day(0).date();
        let filled = fill_calendar_gaps(&[(d0, 1.0), (d0 + Duration::days(3), 4.0)]);
        let values: Vec<f64> = filled.iter().map(|(_, v)| *v).collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_daily_means_average_within_day() {
        let mut rows = daily_temperatures(&[10.0, 20.0]);
        let mut extra = rows[0].clone();
        extra.timestamp += Duration::hours(5);
        extra.temperature = Some(14.0);
        rows.push(extra);

        let daily = daily_means(&rows, "beijing", Metric::Temperature);
        assert_eq!(daily.len(), 2);
        assert_eq!(daily[0].1, 12.0);
    }
}

use channel_forecast::orchestrator::{ChannelState, FailureKind};
use channel_forecast::{ForecastConfig, ForecastOrchestrator, Frequency, ModelKind, TimeSeries};
use chrono::NaiveDate;
use pretty_assertions::assert_eq;

fn quick_config() -> ForecastConfig {
    let mut config = ForecastConfig::for_frequency(Frequency::Monthly);
    config.sequence.epochs = Some(3);
    config.sequence.hidden_size = 4;
    config.machine_learning.random_forest.n_estimators = 5;
    config.machine_learning.xgboost.n_estimators = 5;
    config.machine_learning.lightgbm.n_estimators = 5;
    config
}

fn monthly(values: Vec<f64>) -> TimeSeries {
    TimeSeries::new(Frequency::Monthly, NaiveDate::from_ymd_opt(2022, 1, 1).unwrap(), values).unwrap()
}

fn trending(len: usize) -> TimeSeries {
    monthly((0..len).map(|i| 500.0 + 15.0 * i as f64 + 30.0 * ((i % 12) as f64 - 5.5).abs()).collect())
}

#[test]
fn test_forecasts_share_the_future_grid() {
    let series = trending(30);
    let orchestrator = ForecastOrchestrator::new(&quick_config());
    let outcome = orchestrator.train_and_forecast(&series, 4).unwrap();

    assert_eq!(outcome.state(), ChannelState::Done);
    let expected: Vec<NaiveDate> = [(2024, 7), (2024, 8), (2024, 9), (2024, 10)]
        .iter()
        .map(|&(y, m)| NaiveDate::from_ymd_opt(y, m, 1).unwrap())
        .collect();
    assert_eq!(outcome.grid(), expected.as_slice());

    assert!(!outcome.forecasts().is_empty());
    for forecast in outcome.forecasts().iter() {
        assert_eq!(forecast.periods(), outcome.grid());
        assert_eq!(forecast.len(), 4);
        assert!(forecast.values().iter().all(|v| *v >= 0.0));
    }
}

#[test]
fn test_every_model_is_accounted_for() {
    let orchestrator = ForecastOrchestrator::new(&quick_config());
    let outcome = orchestrator.train_and_forecast(&trending(14), 3).unwrap();

    let produced = outcome.forecasts().len();
    let failed = outcome.failures().len();
    assert_eq!(produced + failed, ModelKind::ALL.len());

    // SARIMA needs two full seasons
    let sarima = outcome.failure("SARIMA").unwrap();
    assert_eq!(sarima.kind, FailureKind::InsufficientData);
}

#[test]
fn test_forecasts_follow_panel_order() {
    let orchestrator = ForecastOrchestrator::new(&quick_config());
    let outcome = orchestrator.train_and_forecast(&trending(30), 2).unwrap();

    let positions: Vec<usize> = outcome
        .forecasts()
        .model_names()
        .map(|name| ModelKind::ALL.iter().position(|k| k.name() == name).unwrap())
        .collect();
    let mut sorted = positions.clone();
    sorted.sort_unstable();
    assert_eq!(positions, sorted);
}

#[test]
fn test_constant_series_isolates_sarima_failure() {
    let series = monthly(vec![50.0; 24]);
    let orchestrator = ForecastOrchestrator::new(&quick_config());
    let outcome = orchestrator.train_and_forecast(&series, 3).unwrap();

    let sarima = outcome.failure("SARIMA").unwrap();
    assert_eq!(sarima.kind, FailureKind::FitFailure);
    assert!(!outcome.forecasts().contains("SARIMA"));

    assert!(outcome.forecasts().contains("ARIMA"));
    assert!(outcome.forecasts().contains("Random Forest"));
    assert_eq!(outcome.state(), ChannelState::Done);
}

#[test]
fn test_runs_are_idempotent() {
    let series = trending(26);
    let orchestrator = ForecastOrchestrator::new(&quick_config());
    let first = orchestrator.train_and_forecast(&series, 3).unwrap();
    let second = orchestrator.train_and_forecast(&series, 3).unwrap();
    assert_eq!(first.forecasts(), second.forecasts());
    assert_eq!(first.failures(), second.failures());
}

#[test]
fn test_single_observation_channel() {
    let orchestrator = ForecastOrchestrator::new(&quick_config());
    let outcome = orchestrator.train_and_forecast(&monthly(vec![42.0]), 3).unwrap();

    assert_eq!(outcome.state(), ChannelState::InsufficientData);
    assert!(outcome.forecasts().is_empty());
    assert_eq!(
        outcome.transitions(),
        &[ChannelState::NotStarted, ChannelState::Preparing, ChannelState::InsufficientData]
    );
}

#[test]
fn test_twelve_point_panel_run() {
    let series = monthly(vec![
        10.0, 12.0, 11.0, 13.0, 14.0, 16.0, 15.0, 17.0, 18.0, 20.0, 19.0, 21.0,
    ]);
    let outcome = ForecastOrchestrator::new(&quick_config())
        .train_and_forecast(&series, 3)
        .unwrap();

    assert_eq!(outcome.state(), ChannelState::Done);
    for name in ["ARIMA", "ETS"] {
        let forecast = outcome.forecasts().get(name).unwrap();
        assert_eq!(forecast.len(), 3, "{}", name);
        assert!(forecast.values().iter().all(|v| *v >= 0.0), "{}", name);
    }

    let sarima = outcome.failure("SARIMA").unwrap();
    assert_eq!(sarima.kind, FailureKind::InsufficientData);
    assert!(!outcome.forecasts().contains("SARIMA"));
    assert_eq!(
        outcome.forecasts().len() + outcome.failures().len(),
        ModelKind::ALL.len()
    );
}

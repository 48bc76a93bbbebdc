use assert_approx_eq::assert_approx_eq;
use channel_forecast::{Evaluator, Forecast, ForecastSet, Frequency, Metric, TimeSeries};
use chrono::NaiveDate;
use rstest::rstest;

fn monthly(values: Vec<f64>) -> TimeSeries {
    TimeSeries::new(Frequency::Monthly, NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(), values).unwrap()
}

fn forecast_set(series: &TimeSeries, entries: &[(&str, Vec<f64>)]) -> ForecastSet {
    let mut set = ForecastSet::new();
    for (name, values) in entries {
        let grid = series.future_periods(values.len()).unwrap();
        set.insert(Forecast::new(*name, grid, values.clone()).unwrap());
    }
    set
}

#[rstest]
#[case(1, 3)]
#[case(12, 3)]
#[case(13, 12)]
#[case(52, 12)]
fn test_holdout_follows_horizon(#[case] horizon: usize, #[case] holdout: usize) {
    assert_eq!(Evaluator::for_horizon(horizon).holdout(), holdout);
}

#[test]
fn test_perfect_prediction_on_three_points() {
    let series = monthly(vec![10.0, 20.0, 30.0, 40.0, 50.0, 60.0]);
    let set = forecast_set(&series, &[("ARIMA", vec![40.0, 50.0, 60.0])]);
    let evaluation = Evaluator::new(3).unwrap().evaluate(&series, &set);

    let metrics = evaluation.get("ARIMA").unwrap().metrics.unwrap();
    assert_eq!(metrics.mae, Some(0.0));
    assert_eq!(metrics.rmse, Some(0.0));
    assert_eq!(metrics.mape, Some(0.0));
    assert_approx_eq!(metrics.r2.unwrap(), 1.0);
}

#[test]
fn test_constant_perfect_prediction() {
    let series = monthly(vec![5.0, 5.0, 5.0]);
    let set = forecast_set(&series, &[("ETS", vec![5.0, 5.0, 5.0])]);
    let evaluation = Evaluator::new(3).unwrap().evaluate(&series, &set);

    let metrics = evaluation.get("ETS").unwrap().metrics.unwrap();
    assert_eq!(metrics.mae, Some(0.0));
    assert_eq!(metrics.mse, Some(0.0));
    assert_eq!(metrics.rmse, Some(0.0));
    assert_eq!(metrics.mape, Some(0.0));
    assert_eq!(metrics.r2, None);
}

#[test]
fn test_empty_forecasts_give_empty_evaluation() {
    let series = monthly(vec![42.0]);
    let evaluation = Evaluator::new(3).unwrap().evaluate(&series, &ForecastSet::new());
    assert!(evaluation.is_empty());
    assert!(evaluation.best_models().is_empty());
}

#[test]
fn test_constant_actuals_leave_r2_undefined() {
    let series = monthly(vec![5.0, 7.0, 7.0, 7.0]);
    let set = forecast_set(&series, &[("ETS", vec![6.0, 7.0, 8.0])]);
    let evaluation = Evaluator::new(3).unwrap().evaluate(&series, &set);

    let metrics = evaluation.get("ETS").unwrap().metrics.unwrap();
    assert_eq!(metrics.r2, None);
    assert_approx_eq!(metrics.mae.unwrap(), 2.0 / 3.0);
}

#[test]
fn test_zero_actual_leaves_mape_undefined() {
    let series = monthly(vec![3.0, 0.0, 4.0, 5.0]);
    let set = forecast_set(&series, &[("ETS", vec![1.0, 4.0, 5.0])]);
    let metrics = Evaluator::new(3)
        .unwrap()
        .evaluate(&series, &set)
        .get("ETS")
        .unwrap()
        .metrics
        .unwrap();
    assert_eq!(metrics.mape, None);
    assert!(metrics.mae.is_some());
}

#[test]
fn test_short_series_or_forecast_is_unscored() {
    let series = monthly(vec![1.0, 2.0]);
    let set = forecast_set(&series, &[("ARIMA", vec![1.0, 2.0, 3.0])]);
    let evaluation = Evaluator::new(3).unwrap().evaluate(&series, &set);
    assert_eq!(evaluation.len(), 1);
    assert!(evaluation.get("ARIMA").unwrap().metrics.is_none());
    assert!(evaluation.best_models().is_empty());
}

#[test]
fn test_best_models_per_metric() {
    let series = monthly(vec![100.0, 110.0, 120.0, 130.0, 140.0]);
    let set = forecast_set(
        &series,
        &[
            ("ARIMA", vec![125.0, 135.0, 145.0]),
            ("ETS", vec![121.0, 130.0, 139.0]),
            ("LSTM", vec![100.0, 100.0, 100.0]),
        ],
    );
    let evaluation = Evaluator::new(3).unwrap().evaluate(&series, &set);
    let best = evaluation.best_models();

    for metric in [Metric::Mae, Metric::Mse, Metric::Rmse, Metric::R2, Metric::Mape] {
        assert_eq!(best.get(metric).unwrap().model, "ETS", "{}", metric);
    }
    assert_approx_eq!(best.get(Metric::Mae).unwrap().value, 2.0 / 3.0);
}

#[test]
fn test_ties_keep_the_first_model() {
    let series = monthly(vec![1.0, 2.0, 3.0, 4.0]);
    let set = forecast_set(&series, &[("SARIMA", vec![2.0, 3.0, 5.0]), ("ARIMA", vec![2.0, 3.0, 5.0])]);
    let best = Evaluator::new(3).unwrap().evaluate(&series, &set).best_models();
    assert_eq!(best.get(Metric::Mae).unwrap().model, "SARIMA");
}

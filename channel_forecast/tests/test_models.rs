use channel_forecast::models::arima::ArimaModel;
use channel_forecast::models::exponential_smoothing::EtsModel;
use channel_forecast::{ForecastConfig, ForecastError, ForecastModel, Frequency, ModelFamily, ModelKind, TimeSeries};
use chrono::NaiveDate;
use rstest::rstest;

fn quick_config() -> ForecastConfig {
    let mut config = ForecastConfig::for_frequency(Frequency::Monthly);
    config.sequence.epochs = Some(5);
    config.sequence.hidden_size = 8;
    config.machine_learning.random_forest.n_estimators = 10;
    config.machine_learning.xgboost.n_estimators = 10;
    config.machine_learning.lightgbm.n_estimators = 10;
    config
}

fn monthly(values: Vec<f64>) -> TimeSeries {
    TimeSeries::new(Frequency::Monthly, NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(), values).unwrap()
}

fn seasonal(len: usize) -> TimeSeries {
    monthly(
        (0..len)
            .map(|i| {
                let season = (std::f64::consts::TAU * (i % 12) as f64 / 12.0).sin();
                200.0 + 2.0 * i as f64 + 40.0 * season
            })
            .collect(),
    )
}

#[test]
fn test_panel_names_and_families() {
    let names: Vec<&str> = ModelKind::ALL.iter().map(|k| k.name()).collect();
    assert_eq!(
        names,
        vec!["ARIMA", "SARIMA", "ETS", "Random Forest", "XGBoost", "LightGBM", "LSTM", "N-BEATS"]
    );
    for kind in ModelKind::ALL {
        assert_eq!(ModelKind::from_name(kind.name()), Some(kind));
        assert_eq!(kind.build(&quick_config()).family(), kind.family());
    }
    assert_eq!(ModelFamily::Sequence.label(), "Deep Learning");
}

#[rstest]
#[case(ModelKind::Arima)]
#[case(ModelKind::Sarima)]
#[case(ModelKind::Ets)]
#[case(ModelKind::RandomForest)]
#[case(ModelKind::XGBoost)]
#[case(ModelKind::LightGbm)]
#[case(ModelKind::Lstm)]
#[case(ModelKind::NBeats)]
fn test_every_model_forecasts_the_horizon(#[case] kind: ModelKind) {
    let model = kind.build(&quick_config());
    let trained = model.train(&seasonal(36)).unwrap();
    let forecast = trained.forecast(6).unwrap();

    assert_eq!(trained.name(), kind.name());
    assert_eq!(forecast.len(), 6);
    assert!(forecast.iter().all(|v| v.is_finite() && *v >= 0.0));
}

#[rstest]
#[case(ModelKind::Sarima, 24)]
#[case(ModelKind::Ets, 12)]
#[case(ModelKind::RandomForest, 12)]
#[case(ModelKind::LightGbm, 12)]
#[case(ModelKind::Lstm, 12)]
#[case(ModelKind::NBeats, 12)]
fn test_minimum_data_gates(#[case] kind: ModelKind, #[case] needed: usize) {
    let model = kind.build(&quick_config());
    assert_eq!(model.min_observations(), needed);

    let err = model.train(&seasonal(needed - 1)).unwrap_err();
    assert!(matches!(err, ForecastError::InsufficientData { got, .. } if got == needed - 1));
}

#[test]
fn test_twelve_point_scenario() {
    let series = monthly(vec![
        10.0, 12.0, 11.0, 13.0, 14.0, 16.0, 15.0, 17.0, 18.0, 20.0, 19.0, 21.0,
    ]);
    let config = quick_config();

    let arima = ArimaModel::from_config(&config.statistical)
        .train(&series)
        .unwrap()
        .forecast(3)
        .unwrap();
    let ets = EtsModel::from_config(&config.statistical, Frequency::Monthly)
        .train(&series)
        .unwrap()
        .forecast(3)
        .unwrap();
    assert_eq!(arima.len(), 3);
    assert_eq!(ets.len(), 3);
    assert!(arima.iter().chain(ets.iter()).all(|v| *v >= 0.0));

    let sarima = ModelKind::Sarima.build(&config).train(&series);
    assert!(matches!(sarima, Err(ForecastError::InsufficientData { needed: 24, got: 12 })));
}

#[test]
fn test_ets_respects_floor() {
    let series = monthly((0..12).map(|i| 60.0 - 5.0 * i as f64).collect());
    let forecast = EtsModel::from_config(&quick_config().statistical, Frequency::Monthly)
        .train(&series)
        .unwrap()
        .forecast(12)
        .unwrap();
    assert!(forecast.iter().all(|v| *v >= 1.0));
}

#[test]
fn test_sequence_models_are_deterministic() {
    let config = quick_config();
    for kind in [ModelKind::Lstm, ModelKind::NBeats] {
        let model = kind.build(&config);
        let a = model.train(&seasonal(24)).unwrap().forecast(4).unwrap();
        let b = model.train(&seasonal(24)).unwrap().forecast(4).unwrap();
        assert_eq!(a, b);
    }
}

#[test]
fn test_weekly_sequence_lookback() {
    let config = ForecastConfig::for_frequency(Frequency::Weekly);
    assert_eq!(ModelKind::Lstm.build(&config).min_observations(), 24);
    assert_eq!(ModelKind::Sarima.build(&config).min_observations(), 104);
}

use channel_forecast::data::TOTAL_CHANNEL;
use channel_forecast::orchestrator::ChannelState;
use channel_forecast::report::{FORECASTS_FILE, REPORT_FILE};
use channel_forecast::{ChannelDataset, DataLoader, ForecastConfig, ForecastPipeline, Frequency};
use std::fs;
use std::io::Write;
use tempfile::{tempdir, NamedTempFile};

// Two years of monthly counts for sms and email, plus a one-row push channel
fn create_sample_data() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "month,channels,notification_count").unwrap();
    for i in 0..24u32 {
        let year = 2022 + i / 12;
        let month = i % 12 + 1;
        let sms = 1000 + 25 * i + if month == 12 { 300 } else { 0 };
        let email = 400 + 10 * (i % 6);
        writeln!(file, "{}-{:02}-01,sms,{}", year, month, sms).unwrap();
        writeln!(file, "{}-{:02}-01,email,{}", year, month, email).unwrap();
    }
    writeln!(file, "2023-12-01,push,3").unwrap();
    file.flush().unwrap();
    file
}

fn quick_config() -> ForecastConfig {
    let mut config = ForecastConfig::for_frequency(Frequency::Monthly);
    config.horizon = 3;
    config.sequence.epochs = Some(3);
    config.sequence.hidden_size = 4;
    config.machine_learning.random_forest.n_estimators = 5;
    config.machine_learning.xgboost.n_estimators = 5;
    config.machine_learning.lightgbm.n_estimators = 5;
    config
}

#[test]
fn test_full_forecast_workflow() {
    // 1. Load and prepare
    let data_file = create_sample_data();
    let records = DataLoader::from_csv(data_file.path(), Frequency::Monthly).unwrap();
    assert_eq!(records.len(), 49);
    let dataset = ChannelDataset::from_records(&records, Frequency::Monthly)
        .unwrap()
        .with_total()
        .unwrap();
    assert_eq!(dataset.len(), 2);

    // 2. Forecast and evaluate every channel
    let pipeline = ForecastPipeline::new(quick_config()).unwrap();
    let report = pipeline.run(&dataset).unwrap();
    let names: Vec<&str> = report.channels.iter().map(|c| c.channel.as_str()).collect();
    assert_eq!(names, vec!["email", "sms", "push", TOTAL_CHANNEL]);
    assert_eq!(report.holdout, 3);

    for channel in ["email", "sms", TOTAL_CHANNEL] {
        let channel = report.channel(channel).unwrap();
        assert_eq!(channel.outcome.state(), ChannelState::Done);
        assert!(!channel.outcome.forecasts().is_empty());
        for forecast in channel.outcome.forecasts().iter() {
            assert_eq!(forecast.len(), 3);
            assert_eq!(forecast.periods(), channel.outcome.grid());
        }
        let evaluated: Vec<&str> = channel.evaluation.entries.iter().map(|e| e.model.as_str()).collect();
        let forecasted: Vec<&str> = channel.outcome.forecasts().model_names().collect();
        assert_eq!(evaluated, forecasted);
    }
    assert_eq!(
        report.channel("push").unwrap().outcome.state(),
        ChannelState::InsufficientData
    );

    // 3. Export
    let dir = tempdir().unwrap();
    let (report_path, forecasts_path) = report.save(dir.path().join("run")).unwrap();
    assert!(report_path.ends_with(REPORT_FILE));

    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(report_path).unwrap()).unwrap();
    assert_eq!(json["horizon"], 3);
    assert_eq!(json["channels"].as_array().unwrap().len(), 4);

    assert!(forecasts_path.ends_with(FORECASTS_FILE));
    let table = fs::read_to_string(forecasts_path).unwrap();
    assert!(table_is_well_formed(&table));
    assert!(report.evaluation_summary().contains("Channel sms"));
    assert!(report.best_models_summary().contains("total"));
}

fn table_is_well_formed(table: &str) -> bool {
    let mut lines = table.lines();
    lines.next() == Some("channel,model,period,value") && lines.all(|line| line.split(',').count() == 4)
}

#[test]
fn test_backtest_can_be_disabled() {
    let data_file = create_sample_data();
    let records = DataLoader::from_csv(data_file.path(), Frequency::Monthly).unwrap();
    let dataset = ChannelDataset::from_records(&records, Frequency::Monthly).unwrap();

    let mut config = quick_config();
    config.evaluation.backtest = false;
    let report = ForecastPipeline::new(config).unwrap().run(&dataset).unwrap();

    // Without a backtest the final forecasts are scored directly
    let sms = report.channel("sms").unwrap();
    assert!(sms.evaluation.entries.iter().all(|e| e.metrics.is_some()));
    assert!(report.channel(TOTAL_CHANNEL).is_none());
}

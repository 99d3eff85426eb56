//! End-to-end behaviour of the aggregator against a temporary data dir

use chrono::{Duration, TimeZone, Utc};
use gazette_aggregator::{AggregatorSettings, Outcome, Rejection, SensorAggregator};
use gazette_core::{read_stats, read_status, LogEntry, SensorValue, Timestamp};

const INTERIOR_TEMP: &str = "greenhouse/interior/sensor/temp/state";
const INTERIOR_HUMIDITY: &str = "greenhouse/interior/sensor/humidity/state";

fn t(secs: i64) -> Timestamp {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap() + Duration::seconds(secs)
}

#[test]
fn test_spike_is_rejected_and_stats_cover_window() {
    let dir = tempfile::tempdir().unwrap();
    let mut agg = SensorAggregator::new(AggregatorSettings::in_dir(dir.path()));

    assert!(agg.handle_message_at(INTERIOR_TEMP, b"70.0", t(0)).is_accepted());
    assert!(agg.handle_message_at(INTERIOR_TEMP, b"71.0", t(30)).is_accepted());
    let outcome = agg.handle_message_at(INTERIOR_TEMP, b"95.0", t(40));
    assert!(matches!(outcome, Outcome::Rejected(Rejection::Spike { .. })));

    assert_eq!(agg.latest("interior_temp"), Some(&SensorValue::Number(71.0)));
    let metrics = agg.prune_and_compute_stats(t(40));
    assert_eq!(metrics["interior_temp_min"], 70.0);
    assert_eq!(metrics["interior_temp_max"], 71.0);
}

#[test]
fn test_stats_file_shape() {
    let dir = tempfile::tempdir().unwrap();
    let settings = AggregatorSettings::in_dir(dir.path());
    let stats_path = settings.stats_path.clone();
    let mut agg = SensorAggregator::new(settings);

    agg.handle_message_at(INTERIOR_TEMP, b"70.0", t(0));
    agg.handle_message_at(INTERIOR_HUMIDITY, b"55", t(10));
    agg.handle_message_at(INTERIOR_TEMP, b"71.0", t(30));
    agg.handle_message_at(INTERIOR_HUMIDITY, b"57.5", t(60));

    let text = std::fs::read_to_string(&stats_path).unwrap();
    insta::assert_snapshot!(text.trim_end(), @r###"
    {
      "metrics": {
        "interior_humidity_max": 57.5,
        "interior_humidity_min": 55.0,
        "interior_temp_max": 71.0,
        "interior_temp_min": 70.0
      },
      "window_end": "2024-06-01T12:01:00Z",
      "window_start": "2024-05-31T12:01:00Z"
    }
    "###);

    let stats = read_stats(&stats_path).unwrap();
    assert!(stats.window_is_consistent(t(60)));
}

#[test]
fn test_status_file_tracks_latest_and_last_seen() {
    let dir = tempfile::tempdir().unwrap();
    let settings = AggregatorSettings::in_dir(dir.path());
    let status_path = settings.status_path.clone();
    let mut agg = SensorAggregator::new(settings);

    agg.handle_message_at("greenhouse/weather/sensor/condition/state", b"Partly Cloudy", t(0));
    agg.handle_message_at(INTERIOR_TEMP, b"68.5", t(60));

    let status = read_status(&status_path).unwrap();
    assert_eq!(status.updated_at, t(60));
    assert_eq!(status.sensors["weather_condition"], SensorValue::from("Partly Cloudy"));
    assert_eq!(status.sensors["interior_temp"], SensorValue::Number(68.5));
    assert_eq!(status.last_seen["weather_condition"], t(0));
    assert_eq!(status.last_seen["interior_temp"], t(60));
}

#[test]
fn test_cap_keeps_most_recent_samples() {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = AggregatorSettings::in_dir(dir.path());
    settings.max_samples_per_key = 50;
    let mut agg = SensorAggregator::new(settings);

    for i in 0..80 {
        let payload = format!("{}", 60.0 + (i % 10) as f64 * 0.5);
        assert!(agg
            .handle_message_at(INTERIOR_TEMP, payload.as_bytes(), t(i))
            .is_accepted());
    }

    let history = agg.history("interior_temp").unwrap();
    assert_eq!(history.len(), 50);
    assert_eq!(history.iter().next().unwrap().0, t(30));
    assert_eq!(history.last().unwrap().0, t(79));
}

#[test]
fn test_crash_recovery_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let settings = AggregatorSettings::in_dir(dir.path());

    let mut first = SensorAggregator::new(settings.clone());
    first.handle_message_at(INTERIOR_TEMP, b"60.0", t(0));
    first.handle_message_at("greenhouse/weather/sensor/condition/state", b"rain", t(10));
    let late = t(0) + Duration::hours(20);
    first.handle_message_at(INTERIOR_TEMP, b"75.0", late);
    first.persist(late);

    // Restart five hours later: the first sample has left the window
    let restart = t(0) + Duration::hours(25);
    let mut second = SensorAggregator::new(settings);
    assert_eq!(second.restore(restart), 2);

    assert_eq!(second.latest("interior_temp"), Some(&SensorValue::Number(75.0)));
    assert_eq!(second.latest("weather_condition"), Some(&SensorValue::from("rain")));
    assert_eq!(second.last_seen("interior_temp"), Some(late));
    assert_eq!(second.last_seen("weather_condition"), Some(t(10)));

    let history = second.history("interior_temp").unwrap();
    assert_eq!(history.to_vec(), vec![(late, 75.0)]);

    let metrics = second.prune_and_compute_stats(restart);
    assert_eq!(metrics["interior_temp_min"], 75.0);
    assert_eq!(metrics["interior_temp_max"], 75.0);
}

#[test]
fn test_restored_history_still_guards_against_spikes() {
    let dir = tempfile::tempdir().unwrap();
    let settings = AggregatorSettings::in_dir(dir.path());

    let mut first = SensorAggregator::new(settings.clone());
    first.handle_message_at(INTERIOR_TEMP, b"70.0", t(0));
    first.persist(t(0));

    let mut second = SensorAggregator::new(settings);
    second.restore(t(60));
    let outcome = second.handle_message_at(INTERIOR_TEMP, b"100.0", t(120));
    assert!(matches!(outcome, Outcome::Rejected(Rejection::Spike { .. })));
}

#[test]
fn test_persist_flushes_long_term_log() {
    let dir = tempfile::tempdir().unwrap();
    let settings = AggregatorSettings::in_dir(dir.path());
    let log_dir = settings.sensor_log_dir.clone();
    let mut agg = SensorAggregator::new(settings);

    agg.handle_message_at(INTERIOR_TEMP, b"70.0", t(0));
    agg.handle_message_at(INTERIOR_TEMP, b"70.5", t(60));
    agg.handle_message_at(INTERIOR_TEMP, b"71.0", t(120));
    assert_eq!(agg.pending_log_entries(), 2);

    agg.persist(t(130));
    assert_eq!(agg.pending_log_entries(), 0);

    let lines: Vec<LogEntry> = std::fs::read_to_string(log_dir.join("2024-06.jsonl"))
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[2].ts, t(120));
    assert_eq!(lines[2].sensors["interior_temp"], SensorValue::Number(71.0));
}

#[test]
fn test_oversized_intervals_hold_writes_back() {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = AggregatorSettings::in_dir(dir.path());
    settings.write_interval = u64::MAX;
    settings.cache_interval = 10_000_000_000_000_000;
    settings.log_flush_interval = u64::MAX;
    let status_path = settings.status_path.clone();
    let mut agg = SensorAggregator::new(settings);

    agg.handle_message_at(INTERIOR_TEMP, b"70.0", t(0));
    agg.handle_message_at(INTERIOR_TEMP, b"70.5", t(1));

    let status = read_status(&status_path).unwrap();
    assert_eq!(status.updated_at, t(0));
    assert_eq!(status.sensors["interior_temp"], SensorValue::Number(70.0));
    assert!(agg.has_unsaved_changes());
}

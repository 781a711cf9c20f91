//! Integration tests: direct-model rollups through tables, exports and reports

use chrono::{Duration, TimeZone, Utc};
use touchline_data::Channel;
use touchline_models::{
    AggregatedAttribution, AttributionResult, ConversionPath, Touchpoint, aggregate, first_touch,
    linear,
};
use touchline_output::{
    ChannelRow, ChannelTable, ExportFormat, Exporter, ReportBuilder, compare_models,
};

fn paths() -> Vec<ConversionPath> {
    let at = Utc.with_ymd_and_hms(2024, 5, 20, 9, 30, 0).unwrap();
    let touch = |id: &str, days: i64, source: &str| {
        Touchpoint::new(id, at - Duration::days(days), Channel::new(source, Some("cpc"), None))
    };
    vec![
        ConversionPath::new(
            "c1",
            vec![touch("a", 10, "google"), touch("b", 5, "facebook"), touch("c", 1, "email")],
            at,
            9_000.0,
        ),
        ConversionPath::new("c2", vec![touch("d", 2, "google")], at, 1_000.0),
    ]
}

fn rollup(model: &str) -> Vec<AggregatedAttribution> {
    let results: Vec<AttributionResult> = paths()
        .iter()
        .map(|p| {
            let credited = match model {
                "first_touch" => first_touch(&p.touchpoints, p.conversion_value),
                _ => linear(&p.touchpoints, p.conversion_value),
            };
            AttributionResult::new(p, model, credited)
        })
        .collect();
    aggregate(&results)
}

#[test]
fn test_channel_rows_round_trip_through_csv_file() {
    let table = ChannelTable::new("linear", rollup("linear"));
    assert!((table.total_revenue() - 10_000.0).abs() < 1e-6);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("linear.csv");
    table.rows().export_to_file(&path, ExportFormat::Csv).unwrap();

    let mut reader = csv::Reader::from_path(&path).unwrap();
    let rows: Vec<ChannelRow> = reader.deserialize().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].source, "google");
    assert!((rows[0].attributed_revenue - 4_000.0).abs() < 1e-6);
}

#[test]
fn test_comparison_and_report() {
    let comparison = compare_models(&[
        ("first_touch".to_string(), rollup("first_touch")),
        ("linear".to_string(), rollup("linear")),
    ]);
    assert_eq!(comparison.rows[0].channel_key, "google|cpc|(none)");
    assert!((comparison.rows[0].share_pct[0] - 100.0).abs() < 1e-9);

    let report = ReportBuilder::new()
        .model("compare")
        .contents_from(&comparison)
        .unwrap()
        .build()
        .unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("report.json");
    report.write_to(&path).unwrap();

    let written = std::fs::read_to_string(&path).unwrap();
    let value: serde_json::Value = serde_json::from_str(&written).unwrap();
    assert_eq!(value["model"], "compare");
    assert_eq!(value["contents"]["models"][1], "linear");
}

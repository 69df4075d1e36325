use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use asnx_ddca::layout::list_csv;
use asnx_ddca::record::{write_sensor_records, Readings, SensorRecord};
use asnx_ddca::{rerun_simulation, HarnessConfig, Layout};

fn row(i: usize, indicators: [f64; 8], label: u8) -> SensorRecord {
    SensorRecord {
        snid: "a1".to_string(),
        timestamp: 1_620_000_000 + 600 * i as i64,
        sntime: 1000 + 600 * i as i64,
        readings: Readings::new(
            20.0 + (i % 5) as f64 * 0.1,
            18.0,
            45.0 + (i % 3) as f64 * 0.5,
            60.0,
        ),
        indicators,
        label,
    }
}

fn write_dataset(path: &Path, rows: usize) {
    let data: Vec<SensorRecord> = (0..rows).map(|i| row(i, [0.0; 8], 0)).collect();
    write_sensor_records(path, &data).unwrap();
}

fn write_signature(path: &Path, len: usize, indicator: usize) {
    let data: Vec<SensorRecord> = (0..len)
        .map(|i| {
            let mut ind = [0.0; 8];
            ind[indicator] = 1.0;
            let mut r = row(i, ind, 1);
            r.readings = Readings::new(8.0, 0.0, -10.0, 0.0);
            r
        })
        .collect();
    write_sensor_records(path, &data).unwrap();
}

fn seeded_root() -> (tempfile::TempDir, Layout) {
    let dir = tempfile::tempdir().unwrap();
    let layout = Layout::new(dir.path());
    fs::create_dir_all(&layout.base_datasets).unwrap();
    fs::create_dir_all(&layout.fault_signatures).unwrap();

    write_dataset(&layout.base_datasets.join("indoor_-_stable.csv"), 150);
    write_dataset(&layout.base_datasets.join("outdoor_-_rain.csv"), 90);
    write_signature(&layout.fault_signatures.join("bad_adc.csv"), 6, 6);
    write_signature(&layout.fault_signatures.join("usart.csv"), 3, 7);
    (dir, layout)
}

#[test]
fn rerun_produces_one_file_per_dataset_and_run() {
    let (_dir, layout) = seeded_root();
    let cfg = HarnessConfig {
        seed: Some(2021),
        ..HarnessConfig::default()
    };

    let report = rerun_simulation(&cfg, &layout, 3).unwrap();
    assert!(report.failures.is_empty(), "{:?}", report.failures);
    assert_eq!(report.results.len(), 6);

    let names: BTreeSet<String> = list_csv(&layout.results)
        .unwrap()
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    let expected: BTreeSet<String> = ["indoor_-_stable", "outdoor_-_rain"]
        .iter()
        .flat_map(|stem| (1..=3).map(move |run| format!("{stem}-ddca_with_faults-{run}.csv")))
        .collect();
    assert_eq!(names, expected);

    assert_eq!(report.plots.len(), 6);
    for plot in &report.plots {
        assert!(plot.is_file());
        assert!(plot.starts_with(&layout.plots));
    }

    let summary = fs::read_to_string(layout.summary_path()).unwrap();
    let lines: Vec<&str> = summary.lines().collect();
    assert_eq!(lines.len(), 1 + 3 + 6);
    assert!(lines[1].starts_with("total (6 datasets),mean,"));
    assert!(lines[2].starts_with("total (6 datasets),min,"));
    assert!(lines[3].starts_with("total (6 datasets),max,"));

    let manifest: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(layout.manifest_path()).unwrap()).unwrap();
    assert_eq!(manifest["runs"], 3);
    assert_eq!(manifest["results"].as_array().unwrap().len(), 6);
}

#[test]
fn seeded_batches_are_reproducible() {
    let cfg = HarnessConfig {
        seed: Some(99),
        ..HarnessConfig::default()
    };

    let (_a, first) = seeded_root();
    let (_b, second) = seeded_root();
    rerun_simulation(&cfg, &first, 2).unwrap();
    rerun_simulation(&cfg, &second, 2).unwrap();

    for path in list_csv(&first.results).unwrap() {
        let twin = second.results.join(path.file_name().unwrap());
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            fs::read_to_string(&twin).unwrap(),
            "{}",
            path.display()
        );
    }
}

#[test]
fn missing_base_directory_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let layout = Layout::new(dir.path());
    assert!(rerun_simulation(&HarnessConfig::default(), &layout, 1).is_err());
}

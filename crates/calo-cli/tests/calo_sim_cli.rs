use serde_json::Value;
use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

const CONFIG: &str = r#"
{
  "etaPhiBins": [
    { "eta": [-1.0, 0.0, 1.0], "phi": [-1.0, 0.0, 1.0] }
  ],
  "energyFractions": [
    { "pid": 0, "ecal": 0.0, "hcal": 1.0 },
    { "pid": 11, "ecal": 1.0, "hcal": 0.0 },
    { "pid": 22, "ecal": 1.0, "hcal": 0.0 }
  ],
  "ecalResolutionFormula": "0",
  "hcalResolutionFormula": "0"
}
"#;

const EVENTS: &str = r#"
{
  "events": [
    {
      "particles": [
        { "pid": 22, "position": [0.8775825618903728, 0.479425538604203, 0.5210953054937474, 0.0], "momentum": [7.7, 4.2, 4.6, 10.0] },
        { "pid": 211, "position": [0.8775825618903728, -0.479425538604203, -0.5210953054937474, 0.0], "momentum": [3.0, -1.6, -1.7, 4.0] }
      ],
      "tracks": [
        { "pid": 211, "position": [0.8775825618903728, -0.479425538604203, -0.5210953054937474, 0.0], "momentum": [3.0, -1.6, -1.7, 4.0] }
      ]
    },
    { "particles": [], "tracks": [] }
  ]
}
"#;

fn write_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("parent directory should be created");
    }
    fs::write(path, content).expect("file should be written");
}

fn calo_sim(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_calo-sim"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("calo-sim should start")
}

#[test]
fn run_command_writes_summary_and_report() {
    let temp = TempDir::new().expect("tempdir should be created");
    let config = temp.path().join("config.json");
    let events = temp.path().join("events.json");
    let report = temp.path().join("out/report.json");
    write_file(&config, CONFIG);
    write_file(&events, EVENTS);

    let output = calo_sim(&[
        "run",
        "--config",
        config.to_str().unwrap(),
        "--events",
        events.to_str().unwrap(),
        "--seed",
        "17",
        "--report",
        report.to_str().unwrap(),
    ]);

    assert!(
        output.status.success(),
        "command should succeed, stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Processed 2 event(s) (seed 17, serial mode)"));
    assert!(stdout.contains("Towers: 2  Photons: 1  EFlow tracks: 1"));

    let parsed: Value =
        serde_json::from_str(&fs::read_to_string(&report).expect("report should exist"))
            .expect("report should be JSON");
    assert_eq!(parsed["eventCount"], 2);
    assert_eq!(parsed["events"][0]["towers"], 2);
    assert_eq!(parsed["events"][0]["photons"], 1);
    assert_eq!(parsed["events"][0]["eflowTracks"], 1);
    assert_eq!(parsed["events"][1]["towers"], 0);
    let energy = parsed["towerEnergy"].as_f64().expect("energy should be a number");
    assert!((energy - 14.0).abs() < 1e-9, "tower energy {energy}");
}

#[test]
fn parallel_run_matches_serial_run() {
    let temp = TempDir::new().expect("tempdir should be created");
    let config = temp.path().join("config.json");
    let events = temp.path().join("events.json");
    write_file(
        &config,
        &CONFIG.replace(r#""ecalResolutionFormula": "0""#, r#""ecalResolutionFormula": "0.1 * energy""#),
    );
    write_file(&events, EVENTS);

    let report_for = |name: &str, parallel: bool| {
        let report = temp.path().join(name);
        let mut args = vec![
            "run",
            "--config",
            config.to_str().unwrap(),
            "--events",
            events.to_str().unwrap(),
            "--report",
            report.to_str().unwrap(),
        ];
        if parallel {
            args.push("--parallel");
        }
        let output = calo_sim(&args);
        assert!(output.status.success());
        let parsed: Value =
            serde_json::from_str(&fs::read_to_string(&report).expect("report should exist"))
                .expect("report should be JSON");
        parsed["events"].clone()
    };

    assert_eq!(report_for("serial.json", false), report_for("parallel.json", true));
}

#[test]
fn check_config_reports_layout() {
    let temp = TempDir::new().expect("tempdir should be created");
    let config = temp.path().join("config.json");
    write_file(&config, CONFIG);

    let output = calo_sim(&["check-config", "--config", config.to_str().unwrap()]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Configuration: OK"));
    assert!(stdout.contains("Eta bins: 2"));
    assert!(stdout.contains("Towers: 4"));
    assert!(stdout.contains("Outputs: towers, photons, eflowTracks, eflowTowers"));
}

#[test]
fn invalid_configuration_exits_with_configuration_code() {
    let temp = TempDir::new().expect("tempdir should be created");
    let config = temp.path().join("config.json");
    write_file(&config, r#"{ "etaPhiBins": [ { "eta": [0.5], "phi": [-1.0, 1.0] } ] }"#);

    let output = calo_sim(&["check-config", "--config", config.to_str().unwrap()]);

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ERROR: [CONFIG.GRID]"), "stderr: {stderr}");
    assert!(stderr.contains("FATAL EXIT CODE: 2"));
}

#[test]
fn missing_event_file_is_an_io_error() {
    let temp = TempDir::new().expect("tempdir should be created");
    let config = temp.path().join("config.json");
    write_file(&config, CONFIG);
    let missing = temp.path().join("missing.json");

    let output = calo_sim(&[
        "run",
        "--config",
        config.to_str().unwrap(),
        "--events",
        missing.to_str().unwrap(),
    ]);

    assert_eq!(output.status.code(), Some(4));
    assert!(String::from_utf8_lossy(&output.stderr).contains("ERROR: [IO.EVENTS_READ]"));
}

#[test]
fn usage_errors_exit_with_input_code() {
    let output = calo_sim(&["run", "--config"]);
    assert_eq!(output.status.code(), Some(3));
    assert!(String::from_utf8_lossy(&output.stderr).contains("ERROR: [INPUT.CLI_USAGE]"));
}

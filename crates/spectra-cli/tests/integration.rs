//! Integration tests for spectra-cli.
//!
//! Every test drives the `spectra` binary against the synthetic source with
//! real-time pacing disabled, and points `--config` at a temp file so the
//! user's own configuration never leaks in.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

/// Helper to get the path to the `spectra` binary built by cargo.
fn spectra_bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_spectra"))
}

/// Write a minimal synthetic-source config into `dir`.
fn synthetic_config(dir: &Path, extra: &str) -> PathBuf {
    let path = dir.join("spectra.toml");
    let body = format!(
        "[acquisition]\nbackend = \"synthetic\"\nrealtime = false\ntone_hz = 750.0\n\n\
         [transform]\ndft_size = 4096\n\n[display]\ninterval_ms = 1\n{extra}"
    );
    std::fs::write(&path, body).unwrap();
    path
}

fn run(cmd: &mut Command) -> Output {
    let output = cmd.output().expect("failed to run spectra");
    if !output.status.success() {
        eprintln!("stderr: {}", String::from_utf8_lossy(&output.stderr));
    }
    output
}

#[test]
fn cli_help_lists_commands() {
    let output = run(spectra_bin().arg("--help"));
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    for command in ["devices", "monitor", "dump", "config"] {
        assert!(stdout.contains(command), "help should mention '{command}'");
    }
}

#[test]
fn monitor_json_reports_tone_peak() {
    let dir = TempDir::new().unwrap();
    let config = synthetic_config(dir.path(), "");

    let output = run(spectra_bin()
        .arg("--config")
        .arg(&config)
        .args(["monitor", "--json", "--blocks", "5", "--snri", "700", "800"]));
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let last = stdout.lines().last().expect("at least one report line");
    let line: serde_json::Value = serde_json::from_str(last).unwrap();

    assert!(line["block"].as_u64().unwrap() >= 5);
    assert_eq!(line["state"], "Stopped");
    assert_eq!(line["sample_rate"], 48000);

    let channels = line["channels"].as_array().unwrap();
    assert_eq!(channels.len(), 2);
    assert_eq!(channels[0]["peak_frequency"].as_f64(), Some(750.0));
    assert_eq!(channels[1]["peak_frequency"].as_f64(), Some(1500.0));
    assert!(channels[0]["snri_db"].as_f64().unwrap() > 40.0);
    // A band holding no energy at all reports -inf, which JSON carries as null.
    assert!(channels[1]["snri_db"].as_f64().is_none_or(|v| v < -40.0));
    assert_eq!(channels[0]["mask"]["error_count"], 0);
}

#[test]
fn monitor_flags_override_config() {
    let dir = TempDir::new().unwrap();
    let config = synthetic_config(dir.path(), "");

    let output = run(spectra_bin().arg("--config").arg(&config).args([
        "monitor", "--json", "--blocks", "2", "--tone", "1500", "--dft-size", "1024",
    ]));
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let line: serde_json::Value = serde_json::from_str(stdout.lines().last().unwrap()).unwrap();
    let ch0 = &line["channels"][0];
    assert_eq!(ch0["peak_frequency"].as_f64(), Some(1500.0));
    // 1024 points at 48 kHz: 46.875 Hz bins, 1500 Hz lands on bin 32.
    assert_eq!(ch0["peak"]["index"], 32);
}

#[test]
fn monitor_reports_mask_trespass() {
    let dir = TempDir::new().unwrap();
    let config = synthetic_config(
        dir.path(),
        "\n[[masks]]\nchannel = 0\nattenuation = 60.0\nvertical_offset = 0.0\n",
    );

    let output = run(spectra_bin()
        .arg("--config")
        .arg(&config)
        .args(["monitor", "--json", "--blocks", "3"]));
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let line: serde_json::Value = serde_json::from_str(stdout.lines().last().unwrap()).unwrap();
    let mask = &line["channels"][0]["mask"];
    assert!(mask["error_count"].as_u64().unwrap() > 0);
    assert_eq!(mask["first"]["frequency"].as_f64(), Some(750.0));
}

#[test]
fn monitor_text_output_has_channel_rows() {
    let dir = TempDir::new().unwrap();
    let config = synthetic_config(dir.path(), "");

    let output = run(spectra_bin()
        .arg("--config")
        .arg(&config)
        .args(["monitor", "--blocks", "2"]));
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Monitoring 2 channel(s) at 48000 Hz"));
    assert!(stdout.contains("peak Hz"));
    assert!(stdout.contains("750.0"));
}

#[test]
fn monitor_exits_nonzero_when_source_fails() {
    let dir = TempDir::new().unwrap();
    let config = synthetic_config(dir.path(), "");

    let output = run(spectra_bin()
        .arg("--config")
        .arg(&config)
        .args(["monitor", "--json", "--fail-after", "3"]));
    assert!(!output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("crashed"), "stderr: {stderr}");

    let stdout = String::from_utf8_lossy(&output.stdout);
    let line: serde_json::Value = serde_json::from_str(stdout.lines().last().unwrap()).unwrap();
    assert_eq!(line["state"], "Crashed");
    assert_eq!(line["block"], 3);
}

#[test]
fn dump_writes_half_spectrum_table() {
    let dir = TempDir::new().unwrap();
    let config = synthetic_config(dir.path(), "");
    let out = dir.path().join("psd.txt");

    let output = run(spectra_bin()
        .arg("--config")
        .arg(&config)
        .args(["dump", "--blocks", "3"])
        .arg(&out));
    assert!(output.status.success());

    let table = std::fs::read_to_string(&out).unwrap();
    let rows: Vec<&str> = table.lines().collect();
    assert_eq!(rows.len(), 2048);
    // frequency column plus one column per channel
    assert_eq!(rows[64].split_whitespace().count(), 3);
    let freq: f64 = rows[64].split_whitespace().next().unwrap().parse().unwrap();
    assert!((freq - 750.0).abs() < 1e-6);
}

#[test]
fn wav_backend_without_file_is_rejected() {
    let dir = TempDir::new().unwrap();
    let config = synthetic_config(dir.path(), "");

    let output = run(spectra_bin()
        .arg("--config")
        .arg(&config)
        .args(["monitor", "--backend", "wav", "--blocks", "1"]));
    assert!(!output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("wav_path"), "stderr: {stderr}");
}

#[test]
fn config_init_then_show() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("conf").join("spectra.toml");

    let output = run(spectra_bin().args(["config", "init"]).arg(&path));
    assert!(output.status.success());
    assert!(path.exists());

    // Refuses to clobber without --force.
    let output = run(spectra_bin().args(["config", "init"]).arg(&path));
    assert!(!output.status.success());
    let output = run(spectra_bin().args(["config", "init", "--force"]).arg(&path));
    assert!(output.status.success());

    let output = run(spectra_bin().arg("--config").arg(&path).args(["config", "show"]));
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("[acquisition]"));
    assert!(stdout.contains("dft_size = 4096"));
}

#[test]
fn missing_explicit_config_is_an_error() {
    let dir = TempDir::new().unwrap();
    let output = run(spectra_bin()
        .arg("--config")
        .arg(dir.path().join("nope.toml"))
        .args(["config", "show"]));
    assert!(!output.status.success());
}

//! End-to-end checks of the probe against a small hand-assembled story file,
//! through the library report and through the `grue-probe` binary.

use grue_probe::config::ProbeConfig;
use grue_probe::report::Report;
use grue_probe::tracer::Termination;
use std::fs;
use std::path::PathBuf;
use std::process::Command;

const PROPERTY_TABLE: usize = 0x100;
const STATIC_BASE: usize = 0x120;
const HIGH_BASE: usize = 0x140;

fn put_word(memory: &mut [u8], addr: usize, value: usize) {
    memory[addr..addr + 2].copy_from_slice(&(value as u16).to_be_bytes());
}

/// One object whose only property is 9 bytes long, and a routine body of
/// `nop; rtrue`
fn sample_story() -> Vec<u8> {
    let mut memory = vec![0u8; 0x150];
    memory[0] = 3;
    put_word(&mut memory, 2, 88);
    put_word(&mut memory, 4, HIGH_BASE);
    put_word(&mut memory, 6, HIGH_BASE);
    put_word(&mut memory, 8, STATIC_BASE);
    put_word(&mut memory, 10, 0x40);
    put_word(&mut memory, 12, 0x110);
    put_word(&mut memory, 14, STATIC_BASE);

    // object 1 entry starts after the 62 bytes of property defaults
    put_word(&mut memory, 0x40 + 62 + 7, PROPERTY_TABLE);

    let table = [
        0x00, // no name
        0x85, 0x09, // property 5, 9 bytes
        0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, //
        0x00,
    ];
    memory[PROPERTY_TABLE..PROPERTY_TABLE + table.len()].copy_from_slice(&table);

    memory[HIGH_BASE] = 0xB4;
    memory[HIGH_BASE + 1] = 0xB0;
    memory
}

fn write_temp(name: &str, bytes: &[u8]) -> PathBuf {
    let mut path = std::env::temp_dir();
    path.push(format!("grue-probe-{}-{}", std::process::id(), name));
    fs::write(&path, bytes).expect("write temp story");
    path
}

fn probe() -> Command {
    Command::new(env!("CARGO_BIN_EXE_grue-probe"))
}

#[test]
fn test_report_on_sample_story() {
    let story = sample_story();
    let report = Report::build(&story, &ProbeConfig::default()).unwrap();

    assert!(report.header_anomalies.is_empty());
    assert_eq!(report.trace.steps.len(), 2);
    assert_eq!(report.trace.termination, Termination::ReturnTrue);
    assert_eq!(report.properties.objects.len(), 1);
    assert_eq!(report.violations().len(), 1);
    assert_eq!(report.violations()[0].size, 9);
    assert_eq!(report.violations()[0].address, PROPERTY_TABLE + 1);
    assert_eq!(report.exit_status(), 1);
}

#[test]
fn test_cli_exit_status_is_violation_count() {
    let path = write_temp("sample.z3", &sample_story());

    let output = probe().arg(&path).output().expect("run grue-probe");
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert_eq!(output.status.code(), Some(1));
    assert!(stdout.contains("Execution would return TRUE"));
    assert!(stdout.contains("Found 1 property size violations:"));
    assert!(stdout.contains("Object #1 (1 violations):"));
    assert!(stdout.contains("Property #5: 9 bytes (max allowed: 8)"));

    let _ = fs::remove_file(path);
}

#[test]
fn test_cli_options_override_defaults() {
    let path = write_temp("options.z3", &sample_story());

    let output = probe()
        .arg(&path)
        .args(["--steps", "1", "--properties"])
        .output()
        .expect("run grue-probe");
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert_eq!(output.status.code(), Some(1));
    assert!(stdout.contains("Step limit of 1 reached"));
    assert!(stdout.contains("=== OBJECT PROPERTIES ==="));

    let _ = fs::remove_file(path);
}

#[test]
fn test_cli_fatal_errors() {
    let missing = probe()
        .arg("/nonexistent/story.z3")
        .output()
        .expect("run grue-probe");
    assert_eq!(missing.status.code(), Some(102));

    let path = write_temp("short.z3", &[3, 0, 0, 0]);
    let short = probe().arg(&path).output().expect("run grue-probe");
    assert_eq!(short.status.code(), Some(101));
    let _ = fs::remove_file(path);

    let bad_option = probe()
        .args(["story.z3", "--bogus"])
        .output()
        .expect("run grue-probe");
    assert_eq!(bad_option.status.code(), Some(103));
}

#[test]
fn test_cli_utility_commands() {
    let output = probe()
        .args(["decode-text", "3551c685"])
        .output()
        .expect("run grue-probe");
    assert_eq!(output.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&output.stdout).contains("\"hello\""));

    let output = probe()
        .args(["packed-addr", "0x1234", "5"])
        .output()
        .expect("run grue-probe");
    assert!(String::from_utf8_lossy(&output.stdout).contains("0x48d0"));

    let path = write_temp("property.z3", &sample_story());
    let output = probe()
        .arg("property")
        .arg(&path)
        .arg("0x100")
        .output()
        .expect("run grue-probe");
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stdout).contains("Property #5: 9 bytes"));
    let _ = fs::remove_file(path);

    let help = probe().output().expect("run grue-probe");
    assert_eq!(help.status.code(), Some(0));
}

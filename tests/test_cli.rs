mod fixtures;

use fixtures::*;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::tempdir;

fn write_inputs(dir: &Path) -> (PathBuf, PathBuf) {
    let dictionary = dir.join("dict.json");
    fs::write(&dictionary, DICTIONARY_JSON).unwrap();

    let packets = dir.join("packets.txt");
    let mut f = File::create(&packets).unwrap();
    writeln!(f, "# heater then power state").unwrap();
    writeln!(f, "{}", to_hex(&PacketBuilder::new(100).u32_param(3).build())).unwrap();
    writeln!(
        f,
        "5,2,14,9:{}",
        to_hex(&PacketBuilder::new(102).i32_param(1).build())
    )
    .unwrap();
    (dictionary, packets)
}

#[test]
fn test_it_prints_summaries() {
    let d = tempdir().unwrap();
    let (dictionary, packets) = write_inputs(d.path());

    let mut cmd = Command::new(assert_cmd::cargo_bin!("evr_dump"));
    cmd.args([
        "-d",
        dictionary.to_str().unwrap(),
        packets.to_str().unwrap(),
    ]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("HEATER_ON (100): Heater 3 on"))
        .stdout(predicate::str::contains("PWR_STATE (102): State is ON"));
}

#[test]
fn test_it_prints_jsonl() {
    let d = tempdir().unwrap();
    let (dictionary, packets) = write_inputs(d.path());

    let mut cmd = Command::new(assert_cmd::cargo_bin!("evr_dump"));
    cmd.args([
        "-d",
        dictionary.to_str().unwrap(),
        "-o",
        "jsonl",
        "-t",
        "1",
        packets.to_str().unwrap(),
    ]);

    let output = cmd.output().unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let records: Vec<serde_json::Value> = stdout
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["message"], "Heater 3 on");
    assert_eq!(records[1]["apid"], 5);
    assert_eq!(records[1]["virtual_channel_id"], 2);
    assert_eq!(records[1]["station_id"], 14);
}

#[test]
fn test_it_reports_bad_lines_and_keeps_going() {
    let d = tempdir().unwrap();
    let (dictionary, packets) = write_inputs(d.path());
    let mut f = fs::OpenOptions::new().append(true).open(&packets).unwrap();
    writeln!(f, "not hex").unwrap();
    writeln!(f, "{}", to_hex(&PacketBuilder::new(999).build())).unwrap();

    let mut cmd = Command::new(assert_cmd::cargo_bin!("evr_dump"));
    cmd.args([
        "-d",
        dictionary.to_str().unwrap(),
        packets.to_str().unwrap(),
    ]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Heater 3 on"))
        .stderr(predicate::str::contains("line 4"))
        .stderr(predicate::str::contains("Could not find EVR event id 999"));
}

#[test]
fn test_it_reads_stdin() {
    let d = tempdir().unwrap();
    let (dictionary, _) = write_inputs(d.path());

    let mut cmd = assert_cmd::Command::new(assert_cmd::cargo_bin!("evr_dump"));
    cmd.args(["-d", dictionary.to_str().unwrap(), "-"])
        .write_stdin(format!("{}\n", to_hex(&PacketBuilder::new(100).u32_param(9).build())));

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Heater 9 on"));
}

#[test]
fn it_respects_directory_output() {
    let d = tempdir().unwrap();
    let (dictionary, packets) = write_inputs(d.path());
    let f = d.as_ref().join("out").join("test.out");

    let mut cmd = Command::new(assert_cmd::cargo_bin!("evr_dump"));
    cmd.args([
        "-d",
        dictionary.to_str().unwrap(),
        "-f",
        &f.to_string_lossy(),
        packets.to_str().unwrap(),
    ]);

    assert!(
        cmd.output().unwrap().stdout.is_empty(),
        "Expected output to be printed to file, but was printed to stdout"
    );

    let mut expected = vec![];
    File::open(&f).unwrap().read_to_end(&mut expected).unwrap();
    assert!(!expected.is_empty(), "Expected output to be printed to file")
}

#[test]
fn test_it_refuses_to_overwrite_directory() {
    let d = tempdir().unwrap();
    let (dictionary, packets) = write_inputs(d.path());

    let mut cmd = Command::new(assert_cmd::cargo_bin!("evr_dump"));
    cmd.args([
        "-d",
        dictionary.to_str().unwrap(),
        "-f",
        &d.path().to_string_lossy(),
        packets.to_str().unwrap(),
    ]);

    cmd.assert().failure().code(1);
}

#[test]
fn test_it_overwrites_file_anyways_if_passed_flag() {
    let d = tempdir().unwrap();
    let (dictionary, packets) = write_inputs(d.path());
    let f = d.as_ref().join("test.out");

    let mut file = File::create(&f).unwrap();
    file.write_all(b"I'm a file!").unwrap();

    let mut cmd = Command::new(assert_cmd::cargo_bin!("evr_dump"));
    cmd.args([
        "-d",
        dictionary.to_str().unwrap(),
        "-f",
        &f.to_string_lossy(),
        "--no-confirm-overwrite",
        packets.to_str().unwrap(),
    ]);

    assert!(
        cmd.output().unwrap().stdout.is_empty(),
        "Expected output to be printed to file"
    );

    let mut expected = vec![];
    File::open(&f).unwrap().read_to_end(&mut expected).unwrap();
    assert!(!expected.is_empty(), "Expected output to be printed to file");
    assert!(!expected.starts_with(b"I'm a file!"));
}

#[test]
fn test_it_fails_on_missing_dictionary() {
    let d = tempdir().unwrap();
    let (_, packets) = write_inputs(d.path());

    let mut cmd = Command::new(assert_cmd::cargo_bin!("evr_dump"));
    cmd.args([
        "-d",
        d.path().join("missing.json").to_str().unwrap(),
        packets.to_str().unwrap(),
    ]);

    cmd.assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Failed to load dictionary"));
}

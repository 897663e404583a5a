// Command-line behavior of the shipped binaries.
mod support;

use anyhow::{Context, Result};
use serde_json::Value;
use std::process::Command;
use support::{DocsFixture, NOTES_RAML, PLAIN_OPENAPI, run_command};

fn binary(fixture: &DocsFixture, name: &str) -> Command {
    let path = match name {
        "convert-specs" => env!("CARGO_BIN_EXE_convert-specs"),
        "resolve-spec" => env!("CARGO_BIN_EXE_resolve-spec"),
        "registry-validate" => env!("CARGO_BIN_EXE_registry-validate"),
        other => panic!("unknown binary {other}"),
    };
    let mut cmd = Command::new(path);
    cmd.env("SPEC_CATALOG_ROOT", fixture.root())
        .env("RUST_LOG", "warn")
        .env_remove("SPEC_CATALOG_TIMEOUT_SECS")
        .current_dir(fixture.root());
    cmd
}

fn mixed_fixture() -> Result<DocsFixture> {
    let fixture = DocsFixture::new()?;
    fixture.write_doc("a.yaml", PLAIN_OPENAPI)?;
    fixture.write_doc("b.raml", NOTES_RAML)?;
    fixture.write_doc("c.raml", "#%RAML 1.0\ntitle: C\n/x:\n  get:\n    is: [nope]\n")?;
    fixture.write_registry(&[
        ("a", "a.yaml", "openapi"),
        ("b", "b.raml", "raml"),
        ("c", "c.raml", "raml"),
    ])?;
    Ok(fixture)
}

// Ensures convert-specs writes artifacts, prints one JSON record per legacy
// entry and still exits 0 when an entry fails.
#[test]
fn convert_specs_reports_json_records() -> Result<()> {
    let fixture = mixed_fixture()?;
    let mut cmd = binary(&fixture, "convert-specs");
    cmd.arg("--json");
    let output = run_command(cmd)?;
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8(output.stdout)?;
    let records: Vec<Value> = stdout
        .lines()
        .map(serde_json::from_str)
        .collect::<Result<_, _>>()
        .context("stdout is JSON lines")?;
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["id"], "b");
    assert_eq!(records[0]["status"], "converted");
    assert_eq!(records[0]["output"], "b.converted.yaml");
    assert_eq!(records[1]["id"], "c");
    assert_eq!(records[1]["status"], "failed");
    assert_eq!(records[1]["stage"], "resolve");
    assert!(fixture.doc_path("b.converted.yaml").is_file());
    Ok(())
}

// Ensures --strict turns entry failures into exit status 2.
#[test]
fn convert_specs_strict_exit_status() -> Result<()> {
    let fixture = mixed_fixture()?;
    let mut cmd = binary(&fixture, "convert-specs");
    cmd.args(["--strict", "--jobs", "2"]);
    let output = run_command(cmd)?;
    assert_eq!(output.status.code(), Some(2));
    assert!(fixture.doc_path("b.converted.yaml").is_file());
    Ok(())
}

// Ensures an invalid registry aborts the run before any conversion.
#[test]
fn convert_specs_rejects_invalid_registry() -> Result<()> {
    let fixture = DocsFixture::new()?;
    fixture.write_doc("b.raml", NOTES_RAML)?;
    std::fs::write(
        fixture.registry_path(),
        r#"{"apis": [{"id": "b", "specPath": "b.raml", "type": "wsdl"}]}"#,
    )?;
    let output = run_command(binary(&fixture, "convert-specs"))?;
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("wsdl"), "stderr: {stderr}");
    assert!(!fixture.doc_path("b.converted.yaml").exists());
    Ok(())
}

// Ensures resolve-spec prints the path a viewer should load, before and
// independently of conversion.
#[test]
fn resolve_spec_prints_entry_paths() -> Result<()> {
    let fixture = mixed_fixture()?;
    for (id, expected) in [("a", "a.yaml"), ("b", "b.converted.yaml")] {
        let mut cmd = binary(&fixture, "resolve-spec");
        cmd.arg(id);
        let output = run_command(cmd)?;
        assert!(output.status.success());
        assert_eq!(String::from_utf8(output.stdout)?.trim(), expected);
    }

    let mut cmd = binary(&fixture, "resolve-spec");
    cmd.arg("missing");
    let output = run_command(cmd)?;
    assert_eq!(output.status.code(), Some(1));
    Ok(())
}

// Ensures resolve-spec --all emits a manifest grouped by category.
#[test]
fn resolve_spec_manifest_groups_categories() -> Result<()> {
    let fixture = mixed_fixture()?;
    let mut cmd = binary(&fixture, "resolve-spec");
    cmd.arg("--all");
    let output = run_command(cmd)?;
    assert!(output.status.success());
    let manifest: Value = serde_json::from_slice(&output.stdout)?;
    let categories = manifest["categories"]
        .as_array()
        .context("categories array")?;
    let names: Vec<&str> = categories
        .iter()
        .filter_map(|c| c["name"].as_str())
        .collect();
    assert_eq!(names, vec!["Current", "Legacy"]);
    let legacy = &categories[1]["apis"];
    assert_eq!(legacy[0]["id"], "b");
    assert_eq!(legacy[0]["artifactPath"], "b.converted.yaml");
    assert_eq!(legacy[0]["format"], "raml");
    Ok(())
}

// Ensures registry-validate counts entries and flags missing sources on
// request.
#[test]
fn registry_validate_checks_sources() -> Result<()> {
    let fixture = mixed_fixture()?;
    let output = run_command(binary(&fixture, "registry-validate"))?;
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout)?;
    assert!(stdout.contains("3 entries (2 to convert)"), "{stdout}");

    std::fs::remove_file(fixture.doc_path("c.raml"))?;
    let mut cmd = binary(&fixture, "registry-validate");
    cmd.arg("--check-sources");
    let output = run_command(cmd)?;
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("c (c.raml)"), "stderr: {stderr}");
    Ok(())
}

// Batch driver behavior across many entries.
mod support;

use anyhow::{Context, Result};
use spec_catalog::{BatchOptions, BatchSummary, Stage, run_all, run_all_with};
use support::{DocsFixture, NOTES_RAML, PLAIN_OPENAPI};

fn numbered_api(index: usize) -> String {
    format!(
        "#%RAML 1.0\ntitle: Api {index}\nversion: v{index}\nmediaType: application/json\n/items{index}:\n  get:\n    responses:\n      200:\n        body: string\n"
    )
}

// Ensures one broken entry does not stop the entries after it and that the
// summary counts every outcome.
#[test]
fn failures_are_isolated_per_entry() -> Result<()> {
    let fixture = DocsFixture::new()?;
    fixture.write_doc("first.raml", NOTES_RAML)?;
    fixture.write_doc("broken.raml", "#%RAML 1.0\ntitle: Broken\n/a:\n  get:\n    is: [missing]\n")?;
    fixture.write_doc("last.raml", &numbered_api(3))?;
    fixture.write_doc("plain.yaml", PLAIN_OPENAPI)?;
    let registry = fixture.write_registry(&[
        ("first", "first.raml", "raml"),
        ("broken", "broken.raml", "raml"),
        ("plain", "plain.yaml", "openapi"),
        ("last", "last.raml", "raml"),
    ])?;

    let results = run_all(&registry, &fixture.context());
    let ids: Vec<&str> = results.iter().map(|r| r.entry_id.as_str()).collect();
    assert_eq!(ids, vec!["first", "broken", "last"]);
    assert!(results[0].is_success());
    let err = results[1].error().context("broken entry fails")?;
    assert_eq!(err.stage(), Stage::Resolve);
    assert!(err.to_string().contains("missing"), "{err}");
    assert!(results[2].is_success());
    assert!(fixture.doc_path("last.converted.yaml").is_file());
    assert!(!fixture.doc_path("broken.converted.yaml").exists());

    let summary = BatchSummary::from_results(&registry, &results);
    assert_eq!(
        summary,
        BatchSummary {
            converted: 2,
            failed: 1,
            skipped: 1
        }
    );
    Ok(())
}

// Ensures parallel runs report the same outcomes in the same order and write
// the same bytes as a sequential run.
#[test]
fn parallel_runs_match_sequential_runs() -> Result<()> {
    let fixture = DocsFixture::new()?;
    let mut apis = Vec::new();
    for index in 0..8 {
        let spec_path = format!("apis/api{index}.raml");
        fixture.write_doc(&spec_path, &numbered_api(index))?;
        apis.push((format!("api{index}"), spec_path));
    }
    fixture.write_doc("apis/bad.raml", "not raml")?;
    apis.push(("bad".to_string(), "apis/bad.raml".to_string()));
    let triples: Vec<(&str, &str, &str)> = apis
        .iter()
        .map(|(id, path)| (id.as_str(), path.as_str(), "raml"))
        .collect();
    let registry = fixture.write_registry(&triples)?;

    let sequential = run_all(&registry, &fixture.context());
    let sequential_text = fixture.read_doc("apis/api5.converted.yaml")?;
    let parallel = run_all_with(&registry, &fixture.context(), &BatchOptions { jobs: 4 });

    assert_eq!(sequential.len(), parallel.len());
    for (seq, par) in sequential.iter().zip(&parallel) {
        assert_eq!(seq.entry_id, par.entry_id);
        assert_eq!(seq.output_path(), par.output_path());
        assert_eq!(
            seq.error().map(|e| e.stage()),
            par.error().map(|e| e.stage())
        );
    }
    assert_eq!(fixture.read_doc("apis/api5.converted.yaml")?, sequential_text);
    assert_eq!(
        parallel.last().and_then(|r| r.error()).map(|e| e.stage()),
        Some(Stage::Parse)
    );
    Ok(())
}

// Ensures a registry of canonical entries converts nothing.
#[test]
fn canonical_only_registry_is_a_no_op() -> Result<()> {
    let fixture = DocsFixture::new()?;
    fixture.write_doc("plain.yaml", PLAIN_OPENAPI)?;
    let registry = fixture.write_registry(&[("plain", "plain.yaml", "openapi")])?;
    let results = run_all_with(&registry, &fixture.context(), &BatchOptions { jobs: 3 });
    assert!(results.is_empty());
    assert!(!BatchSummary::from_results(&registry, &results).has_failures());
    Ok(())
}

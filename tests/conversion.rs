// End-to-end conversion of registry entries into OpenAPI artifacts.
mod support;

use anyhow::{Context, Result};
use openapiv3::{ReferenceOr, StatusCode};
use spec_catalog::{
    ConversionError, ConvertOptions, Stage, artifact_path, convert, resolve, run_all,
};
use std::time::Duration;
use support::{DocsFixture, NOTES_RAML, PLAIN_OPENAPI, parse_openapi};

// Ensures a mixed registry converts only the legacy entry and that both
// entries resolve to a loadable document.
#[test]
fn mixed_registry_converts_legacy_entries_only() -> Result<()> {
    let fixture = DocsFixture::new()?;
    fixture.write_doc("a.yaml", PLAIN_OPENAPI)?;
    fixture.write_doc("b.raml", NOTES_RAML)?;
    let registry = fixture.write_registry(&[("a", "a.yaml", "openapi"), ("b", "b.raml", "raml")])?;

    let results = run_all(&registry, &fixture.context());
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].entry_id, "b");
    assert_eq!(results[0].output_path(), Some("b.converted.yaml"));

    let artifact = fixture.read_doc("b.converted.yaml")?;
    let document = parse_openapi(&artifact)?;
    assert_eq!(document.info.title, "Notes");
    assert_eq!(document.info.version, "v1");

    let a = registry.get("a").context("entry a")?;
    let b = registry.get("b").context("entry b")?;
    assert_eq!(resolve(a), "a.yaml");
    assert_eq!(resolve(b), "b.converted.yaml");
    assert_eq!(fixture.read_doc("a.yaml")?, PLAIN_OPENAPI);
    Ok(())
}

// Ensures the generated document carries the resources, types and responses
// of the source in a shape an independent OpenAPI model accepts.
#[test]
fn artifact_describes_paths_types_and_responses() -> Result<()> {
    let fixture = DocsFixture::new()?;
    fixture.write_doc("specs/notes.raml", NOTES_RAML)?;
    let registry = fixture.write_registry(&[("notes", "specs/notes.raml", "raml")])?;
    let entry = registry.get("notes").context("entry")?;

    let result = convert(entry, &fixture.context());
    assert_eq!(result.output_path(), Some("specs/notes.converted.yaml"));
    let document = parse_openapi(&fixture.read_doc("specs/notes.converted.yaml")?)?;

    let paths: Vec<&str> = document.paths.paths.keys().map(String::as_str).collect();
    assert_eq!(paths, vec!["/notes", "/notes/{noteId}"]);

    let notes = document.paths.paths["/notes"]
        .as_item()
        .context("/notes is inline")?;
    let get = notes.get.as_ref().context("GET /notes")?;
    assert!(get.tags.contains(&"Notes".to_string()));
    assert!(get.responses.responses.contains_key(&StatusCode::Code(200)));
    assert!(notes.post.as_ref().context("POST /notes")?.request_body.is_some());

    let item = document.paths.paths["/notes/{noteId}"]
        .as_item()
        .context("/notes/{noteId} is inline")?;
    let path_params: Vec<String> = item
        .parameters
        .iter()
        .filter_map(|param| param.as_item())
        .map(|param| param.parameter_data_ref().name.clone())
        .collect();
    assert_eq!(path_params, vec!["noteId".to_string()]);
    let get_one = item.get.as_ref().context("GET /notes/{noteId}")?;
    match &get_one.responses.responses[&StatusCode::Code(404)] {
        ReferenceOr::Item(response) => assert_eq!(response.description, "404 response"),
        ReferenceOr::Reference { reference } => panic!("unexpected reference {reference}"),
    }

    let components = document.components.context("components")?;
    assert!(components.schemas.contains_key("Note"));
    assert_eq!(document.servers[0].url, "https://api.example.com/{version}");
    Ok(())
}

// Ensures converting the same source twice produces byte-identical output.
#[test]
fn reconversion_is_idempotent() -> Result<()> {
    let fixture = DocsFixture::new()?;
    fixture.write_doc("notes.raml", NOTES_RAML)?;
    let registry = fixture.write_registry(&[("notes", "notes.raml", "raml")])?;

    let first = run_all(&registry, &fixture.context());
    assert!(first[0].is_success());
    let before = fixture.read_doc("notes.converted.yaml")?;
    let second = run_all(&registry, &fixture.context());
    assert!(second[0].is_success());
    assert_eq!(fixture.read_doc("notes.converted.yaml")?, before);
    Ok(())
}

// Ensures a missing source is reported as not found and leaves no artifact.
#[test]
fn missing_source_is_reported_without_an_artifact() -> Result<()> {
    let fixture = DocsFixture::new()?;
    let registry = fixture.write_registry(&[("gone", "gone.raml", "raml")])?;
    let results = run_all(&registry, &fixture.context());
    let err = results[0].error().context("expected a failure")?;
    assert!(err.is_not_found());
    assert_eq!(err.stage(), Stage::Load);
    assert!(!fixture.doc_path(&artifact_path("gone.raml")).exists());
    Ok(())
}

// Ensures a failed conversion leaves a previously written artifact in place.
#[test]
fn failed_conversion_keeps_the_previous_artifact() -> Result<()> {
    let fixture = DocsFixture::new()?;
    fixture.write_doc("notes.raml", NOTES_RAML)?;
    let registry = fixture.write_registry(&[("notes", "notes.raml", "raml")])?;
    assert!(run_all(&registry, &fixture.context())[0].is_success());
    let before = fixture.read_doc("notes.converted.yaml")?;

    fixture.write_doc("notes.raml", "title: no header\n")?;
    let results = run_all(&registry, &fixture.context());
    assert_eq!(
        results[0].error().map(ConversionError::stage),
        Some(Stage::Parse)
    );
    assert_eq!(fixture.read_doc("notes.converted.yaml")?, before);
    Ok(())
}

// Ensures malformed YAML and empty documents fail at the parse stage.
#[test]
fn malformed_documents_fail_to_parse() -> Result<()> {
    let fixture = DocsFixture::new()?;
    fixture.write_doc("broken.raml", "#%RAML 1.0\ntitle: [unclosed\n")?;
    fixture.write_doc("empty.raml", "")?;
    let registry = fixture.write_registry(&[
        ("broken", "broken.raml", "raml"),
        ("empty", "empty.raml", "raml"),
    ])?;
    let results = run_all(&registry, &fixture.context());
    for result in &results {
        let err = result.error().context("expected a failure")?;
        assert_eq!(err.stage(), Stage::Parse, "{}: {err}", result.entry_id);
    }
    Ok(())
}

// Ensures includes are read relative to the including file and that a cycle
// between included files is a resolve failure naming the chain.
#[test]
fn includes_resolve_relative_and_cycles_fail() -> Result<()> {
    let fixture = DocsFixture::new()?;
    fixture.write_doc(
        "api/types/note.yaml",
        "properties:\n  id: integer\n  text: string\n",
    )?;
    fixture.write_doc(
        "api/notes.raml",
        "#%RAML 1.0\ntitle: Included\nmediaType: application/json\ntypes:\n  Note: !include types/note.yaml\n/notes:\n  get:\n    responses:\n      200:\n        body: Note\n",
    )?;
    fixture.write_doc("loop/a.yaml", "next: !include b.yaml\n")?;
    fixture.write_doc("loop/b.yaml", "next: !include a.yaml\n")?;
    fixture.write_doc(
        "loop/api.raml",
        "#%RAML 1.0\ntitle: Loop\ndocumentation:\n  - title: Loop\n    content: !include a.yaml\n",
    )?;
    let registry = fixture.write_registry(&[
        ("included", "api/notes.raml", "raml"),
        ("loop", "loop/api.raml", "raml"),
    ])?;

    let results = run_all(&registry, &fixture.context());
    assert!(results[0].is_success(), "{:?}", results[0].error());
    let document = parse_openapi(&fixture.read_doc("api/notes.converted.yaml")?)?;
    assert!(document.components.context("components")?.schemas.contains_key("Note"));

    let err = results[1].error().context("expected a cycle")?;
    assert_eq!(err.stage(), Stage::Resolve);
    assert!(err.to_string().contains("cyclic include"), "{err}");
    Ok(())
}

// Ensures traits applied to a method contribute their parameters to the
// generated operation.
#[test]
fn traits_contribute_operation_parameters() -> Result<()> {
    let fixture = DocsFixture::new()?;
    fixture.write_doc(
        "paged.raml",
        r#"#%RAML 1.0
title: Paged
traits:
  paged:
    queryParameters:
      page:
        type: integer
        description: Page of <<resourcePathName>>
/books:
  get:
    is: [paged]
"#,
    )?;
    let registry = fixture.write_registry(&[("paged", "paged.raml", "raml")])?;
    let results = run_all(&registry, &fixture.context());
    assert!(results[0].is_success(), "{:?}", results[0].error());

    let document = parse_openapi(&fixture.read_doc("paged.converted.yaml")?)?;
    let books = document.paths.paths["/books"].as_item().context("inline")?;
    let get = books.get.as_ref().context("GET /books")?;
    let page = get
        .parameters
        .iter()
        .filter_map(|param| param.as_item())
        .map(|param| param.parameter_data_ref())
        .find(|data| data.name == "page")
        .context("page parameter")?;
    assert_eq!(page.description.as_deref(), Some("Page of books"));
    Ok(())
}

// Ensures security schemes with no OpenAPI counterpart fail generation
// instead of being dropped silently.
#[test]
fn oauth1_schemes_fail_generation() -> Result<()> {
    let fixture = DocsFixture::new()?;
    fixture.write_doc(
        "legacy.raml",
        "#%RAML 1.0\ntitle: Legacy\nsecuritySchemes:\n  signed:\n    type: OAuth 1.0\n    settings:\n      requestTokenUri: https://auth/request\n      authorizationUri: https://auth/authorize\n      tokenCredentialsUri: https://auth/token\nsecuredBy: [signed]\n/a:\n  get:\n",
    )?;
    let registry = fixture.write_registry(&[("legacy", "legacy.raml", "raml")])?;
    let results = run_all(&registry, &fixture.context());
    let err = results[0].error().context("expected a failure")?;
    assert_eq!(err.stage(), Stage::Generate);
    assert!(!fixture.doc_path("legacy.converted.yaml").exists());
    Ok(())
}

// Ensures RAML 0.8 documents with embedded JSON schemas convert.
#[test]
fn raml_08_documents_convert() -> Result<()> {
    let fixture = DocsFixture::new()?;
    fixture.write_doc(
        "old.raml",
        r#"#%RAML 0.8
title: Old
version: v0
baseUri: http://old.example.com
schemas:
  - Item: |
      {"$schema": "http://json-schema.org/draft-04/schema#", "type": "object", "properties": {"name": {"type": "string"}}}
/items:
  get:
    responses:
      200:
        body:
          application/json:
            schema: Item
"#,
    )?;
    let registry = fixture.write_registry(&[("old", "old.raml", "raml")])?;
    let results = run_all(&registry, &fixture.context());
    assert!(results[0].is_success(), "{:?}", results[0].error());
    let text = fixture.read_doc("old.converted.yaml")?;
    assert!(!text.contains("$schema"), "{text}");
    let document = parse_openapi(&text)?;
    assert_eq!(document.info.version, "v0");
    Ok(())
}

// Ensures an exhausted time limit fails the entry at the resolve stage.
#[test]
fn zero_timeout_fails_at_resolve() -> Result<()> {
    let fixture = DocsFixture::new()?;
    fixture.write_doc("notes.raml", NOTES_RAML)?;
    let registry = fixture.write_registry(&[("notes", "notes.raml", "raml")])?;
    let ctx = fixture.context().with_options(ConvertOptions {
        timeout: Some(Duration::ZERO),
    });
    let results = run_all(&registry, &ctx);
    let err = results[0].error().context("expected a timeout")?;
    assert_eq!(err.stage(), Stage::Resolve);
    assert!(!fixture.doc_path("notes.converted.yaml").exists());
    Ok(())
}

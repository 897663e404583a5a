use super::{
    METHOD_KEYS, RESOURCE_KEYS, ROOT_KEYS, RamlError, RamlVersion, is_annotation_key,
};
use crate::model::{HttpMethod, SourceDocument};
use serde_yaml_ng::{Mapping, Value};
use std::path::Path;

/// First-line `#%RAML <version> [fragment]` marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Header {
    pub version: RamlVersion,
    pub fragment: Option<String>,
}

pub(crate) fn parse_header(text: &str) -> Result<Header, RamlError> {
    let first = text
        .trim_start_matches('\u{feff}')
        .lines()
        .next()
        .unwrap_or_default()
        .trim();
    let mut parts = first.split_whitespace();
    if parts.next() != Some("#%RAML") {
        return Err(RamlError::MissingHeader);
    }
    let version = RamlVersion::parse(parts.next().ok_or(RamlError::MissingHeader)?)?;
    let rest: Vec<&str> = parts.collect();
    let fragment = (!rest.is_empty()).then(|| rest.join(" "));
    Ok(Header { version, fragment })
}

/// Parse an API definition into a shape-checked tree. Includes stay as tagged
/// nodes for the resolve stage.
pub(crate) fn parse_api(text: &str, origin: &Path) -> Result<SourceDocument, RamlError> {
    if text.trim().is_empty() {
        return Err(RamlError::Empty);
    }
    let header = parse_header(text)?;
    if let Some(fragment) = header.fragment {
        return Err(RamlError::NotAnApi(fragment));
    }

    let tree: Value = serde_yaml_ng::from_str(text)?;
    let Value::Mapping(root) = &tree else {
        return Err(RamlError::shape("/", "document root must be a mapping"));
    };
    match root.get("title") {
        Some(Value::String(title)) if !title.trim().is_empty() => {}
        Some(Value::Tagged(_)) => {}
        _ => return Err(RamlError::shape("/title", "a non-empty title is required")),
    }
    validate_root(root)?;

    Ok(SourceDocument {
        origin: origin.to_path_buf(),
        dialect: header.version.as_str().to_string(),
        tree,
    })
}

/// HTTP status code of a `responses` key, if it is one.
pub(crate) fn status_code(key: &Value) -> Option<String> {
    let code = match key {
        Value::Number(n) => n.as_u64()?,
        Value::String(s) => s.trim().parse::<u64>().ok()?,
        _ => return None,
    };
    (100..=599).contains(&code).then(|| code.to_string())
}

pub(crate) fn key_str<'a>(key: &'a Value, pointer: &str) -> Result<&'a str, RamlError> {
    match key {
        Value::String(s) => Ok(s.as_str()),
        other => Err(RamlError::shape(
            pointer,
            format!("keys must be strings, found {}", describe(other)),
        )),
    }
}

pub(crate) fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

fn validate_root(root: &Mapping) -> Result<(), RamlError> {
    for (key, value) in root {
        let key = key_str(key, "/")?;
        if key.starts_with('/') {
            validate_resource(key, value)?;
        } else if !ROOT_KEYS.contains(&key) && !is_annotation_key(key) {
            return Err(RamlError::shape(
                format!("/{key}"),
                format!("unknown root property '{key}'"),
            ));
        }
    }
    Ok(())
}

fn validate_resource(path: &str, value: &Value) -> Result<(), RamlError> {
    let map = match value {
        Value::Null | Value::Tagged(_) => return Ok(()),
        Value::Mapping(map) => map,
        other => {
            return Err(RamlError::shape(
                path,
                format!("a resource must be a mapping, found {}", describe(other)),
            ));
        }
    };
    for (key, value) in map {
        let key = key_str(key, path)?;
        if key.starts_with('/') {
            validate_resource(&format!("{path}{key}"), value)?;
        } else if HttpMethod::from_name(key).is_some() {
            validate_method(&format!("{path} {key}"), value)?;
        } else if !RESOURCE_KEYS.contains(&key) && !is_annotation_key(key) {
            return Err(RamlError::shape(
                path,
                format!("unknown resource property '{key}'"),
            ));
        }
    }
    Ok(())
}

fn validate_method(pointer: &str, value: &Value) -> Result<(), RamlError> {
    let map = match value {
        Value::Null | Value::Tagged(_) => return Ok(()),
        Value::Mapping(map) => map,
        other => {
            return Err(RamlError::shape(
                pointer,
                format!("a method must be a mapping, found {}", describe(other)),
            ));
        }
    };
    for (key, value) in map {
        let key = key_str(key, pointer)?;
        if key == "responses" {
            validate_responses(pointer, value)?;
        } else if !METHOD_KEYS.contains(&key) && !is_annotation_key(key) {
            return Err(RamlError::shape(
                pointer,
                format!("unknown method property '{key}'"),
            ));
        }
    }
    Ok(())
}

fn validate_responses(pointer: &str, value: &Value) -> Result<(), RamlError> {
    let pointer = format!("{pointer} responses");
    let map = match value {
        Value::Null | Value::Tagged(_) => return Ok(()),
        Value::Mapping(map) => map,
        other => {
            return Err(RamlError::shape(
                pointer,
                format!("responses must be a mapping, found {}", describe(other)),
            ));
        }
    };
    for (key, value) in map {
        if status_code(key).is_none() {
            let shown = serde_yaml_ng::to_string(key).unwrap_or_default();
            return Err(RamlError::shape(
                &pointer,
                format!("'{}' is not an HTTP status code", shown.trim()),
            ));
        }
        if !matches!(value, Value::Null | Value::Mapping(_) | Value::Tagged(_)) {
            return Err(RamlError::shape(
                &pointer,
                format!("a response must be a mapping, found {}", describe(value)),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<SourceDocument, RamlError> {
        parse_api(text, Path::new("/docs/api.raml"))
    }

    #[test]
    fn header_names_version_and_fragment() {
        let header = parse_header("#%RAML 1.0 Library\ntypes: {}").expect("header");
        assert_eq!(header.version, RamlVersion::V10);
        assert_eq!(header.fragment.as_deref(), Some("Library"));

        let header = parse_header("\u{feff}#%RAML 0.8\ntitle: x").expect("bom header");
        assert_eq!(header.version, RamlVersion::V08);
        assert!(header.fragment.is_none());
    }

    #[test]
    fn empty_and_headerless_documents_are_rejected() {
        assert!(matches!(parse(""), Err(RamlError::Empty)));
        assert!(matches!(parse("  \n\t\n"), Err(RamlError::Empty)));
        assert!(matches!(parse("title: x\n"), Err(RamlError::MissingHeader)));
        assert!(matches!(
            parse("#%RAML 2.0\ntitle: x\n"),
            Err(RamlError::UnsupportedVersion(_))
        ));
        assert!(matches!(
            parse("#%RAML 1.0 Trait\ndescription: x\n"),
            Err(RamlError::NotAnApi(_))
        ));
    }

    #[test]
    fn yaml_syntax_errors_surface() {
        let err = parse("#%RAML 1.0\ntitle: [unterminated\n").expect_err("bad yaml");
        assert!(matches!(err, RamlError::Yaml(_)));
    }

    #[test]
    fn title_is_required() {
        let err = parse("#%RAML 1.0\nversion: v1\n").expect_err("no title");
        assert!(err.to_string().contains("title"));
    }

    #[test]
    fn unknown_keys_are_reported_with_their_location() {
        let err = parse("#%RAML 1.0\ntitle: x\n/users:\n  get:\n    respones: {}\n")
            .expect_err("typo");
        let message = err.to_string();
        assert!(message.contains("/users get"), "{message}");
        assert!(message.contains("respones"), "{message}");

        let err = parse("#%RAML 1.0\ntitle: x\nendpoints: {}\n").expect_err("unknown root");
        assert!(err.to_string().contains("endpoints"));
    }

    #[test]
    fn response_keys_must_be_status_codes() {
        let err = parse("#%RAML 1.0\ntitle: x\n/a:\n  get:\n    responses:\n      ok: {}\n")
            .expect_err("bad code");
        assert!(err.to_string().contains("HTTP status code"));
    }

    #[test]
    fn includes_and_annotations_pass_shape_checks() {
        let doc = parse(
            "#%RAML 1.0\ntitle: x\n(internal): true\ntraits: !include traits.raml\n/a: !include a.raml\n/b:\n  get:\n    responses:\n      200:\n      404: !include nf.raml\n",
        )
        .expect("valid");
        assert_eq!(doc.dialect, "1.0");
    }
}

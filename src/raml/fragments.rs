//! Resource types and traits: references, `<<parameter>>` substitution and
//! merging into the node that applies them.

use super::RamlError;
use super::parse::{describe, key_str};
use crate::model::HttpMethod;
use serde_yaml_ng::{Mapping, Value};
use std::collections::BTreeMap;

/// One entry of a `type:` or `is:` list with its parameter values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FragmentRef {
    pub name: String,
    pub params: BTreeMap<String, String>,
}

impl FragmentRef {
    fn bare(name: &str) -> Self {
        Self {
            name: name.to_string(),
            params: BTreeMap::new(),
        }
    }
}

/// Read `collection`, `[secured, paged]` or `{ paged: { max: 10 } }` forms.
pub(crate) fn fragment_refs(value: &Value, pointer: &str) -> Result<Vec<FragmentRef>, RamlError> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::String(name) => Ok(vec![FragmentRef::bare(name)]),
        Value::Mapping(map) => parameterised(map, pointer),
        Value::Sequence(items) => {
            let mut refs = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::String(name) => refs.push(FragmentRef::bare(name)),
                    Value::Mapping(map) => refs.extend(parameterised(map, pointer)?),
                    other => {
                        return Err(RamlError::shape(
                            pointer,
                            format!("expected a fragment name, found {}", describe(other)),
                        ));
                    }
                }
            }
            Ok(refs)
        }
        other => Err(RamlError::shape(
            pointer,
            format!("expected a fragment reference, found {}", describe(other)),
        )),
    }
}

fn parameterised(map: &Mapping, pointer: &str) -> Result<Vec<FragmentRef>, RamlError> {
    let mut refs = Vec::with_capacity(map.len());
    for (key, args) in map {
        let name = key_str(key, pointer)?;
        let mut params = BTreeMap::new();
        match args {
            Value::Null => {}
            Value::Mapping(args) => {
                for (param, value) in args {
                    let param = key_str(param, pointer)?;
                    let value = scalar_text(value).ok_or_else(|| {
                        RamlError::shape(
                            pointer,
                            format!("parameter '{param}' of '{name}' must be a scalar"),
                        )
                    })?;
                    params.insert(param.to_string(), value);
                }
            }
            other => {
                return Err(RamlError::shape(
                    pointer,
                    format!("parameters of '{name}' must be a mapping, found {}", describe(other)),
                ));
            }
        }
        refs.push(FragmentRef {
            name: name.to_string(),
            params,
        });
    }
    Ok(refs)
}

pub(crate) fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Last path segment that is not a URI parameter: `/users/{id}` gives `users`.
pub(crate) fn resource_path_name(path: &str) -> String {
    path.rsplit('/')
        .find(|segment| !segment.is_empty() && !segment.starts_with('{'))
        .unwrap_or_default()
        .to_string()
}

/// Replace `<<param>>` and `<<param | !transformer>>` in keys and values.
pub(crate) fn substitute(
    value: &Value,
    params: &BTreeMap<String, String>,
    fragment: &'static str,
    name: &str,
) -> Result<Value, RamlError> {
    Ok(match value {
        Value::String(text) => Value::String(substitute_text(text, params, fragment, name)?),
        Value::Sequence(items) => Value::Sequence(
            items
                .iter()
                .map(|item| substitute(item, params, fragment, name))
                .collect::<Result<_, _>>()?,
        ),
        Value::Mapping(map) => {
            let mut out = Mapping::with_capacity(map.len());
            for (key, value) in map {
                out.insert(
                    substitute(key, params, fragment, name)?,
                    substitute(value, params, fragment, name)?,
                );
            }
            Value::Mapping(out)
        }
        other => other.clone(),
    })
}

/// Substitute a resource type body. Each method inside it also sees
/// `<<methodName>>`.
pub(crate) fn substitute_resource_type(
    value: &Value,
    params: &BTreeMap<String, String>,
    name: &str,
) -> Result<Value, RamlError> {
    let Value::Mapping(map) = value else {
        return substitute(value, params, "resource type", name);
    };
    let mut out = Mapping::with_capacity(map.len());
    for (key, body) in map {
        let verb = key
            .as_str()
            .map(|k| k.trim_end_matches('?'))
            .and_then(HttpMethod::from_name);
        let body = match verb {
            Some(verb) => {
                let mut scoped = params.clone();
                scoped.insert("methodName".to_string(), verb.as_str().to_string());
                substitute(body, &scoped, "resource type", name)?
            }
            None => substitute(body, params, "resource type", name)?,
        };
        out.insert(substitute(key, params, "resource type", name)?, body);
    }
    Ok(Value::Mapping(out))
}

fn substitute_text(
    text: &str,
    params: &BTreeMap<String, String>,
    fragment: &'static str,
    name: &str,
) -> Result<String, RamlError> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("<<") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find(">>") else {
            out.push_str(&rest[start..]);
            return Ok(out);
        };
        let mut parts = after[..end].split('|');
        let parameter = parts.next().unwrap_or_default().trim();
        let mut value = params
            .get(parameter)
            .cloned()
            .ok_or_else(|| RamlError::MissingParameter {
                parameter: parameter.to_string(),
                fragment,
                name: name.to_string(),
            })?;
        for transformer in parts {
            let transformer = transformer.trim();
            value = transform(&value, transformer.strip_prefix('!').unwrap_or(transformer))?;
        }
        out.push_str(&value);
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    Ok(out)
}

pub(crate) fn transform(value: &str, transformer: &str) -> Result<String, RamlError> {
    Ok(match transformer {
        "singularize" => singularize(value),
        "pluralize" => pluralize(value),
        "uppercase" => value.to_uppercase(),
        "lowercase" => value.to_lowercase(),
        "lowercamelcase" => camel(&words(value), false),
        "uppercamelcase" => camel(&words(value), true),
        "lowerunderscorecase" => words(value).join("_").to_lowercase(),
        "upperunderscorecase" => words(value).join("_").to_uppercase(),
        "lowerhyphencase" => words(value).join("-").to_lowercase(),
        "upperhyphencase" => words(value).join("-").to_uppercase(),
        other => return Err(RamlError::UnknownTransformer(other.to_string())),
    })
}

// Split on separators and lower-to-upper case boundaries.
fn words(value: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;
    for c in value.chars() {
        if matches!(c, '_' | '-' | ' ' | '.') {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if c.is_uppercase() && prev_lower && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        prev_lower = c.is_lowercase() || c.is_ascii_digit();
        current.push(c);
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn camel(words: &[String], upper_first: bool) -> String {
    words
        .iter()
        .enumerate()
        .map(|(i, word)| {
            let lower = word.to_lowercase();
            if i == 0 && !upper_first {
                return lower;
            }
            let mut chars = lower.chars();
            chars
                .next()
                .map(|first| first.to_uppercase().chain(chars).collect())
                .unwrap_or_default()
        })
        .collect()
}

fn singularize(word: &str) -> String {
    let lower = word.to_lowercase();
    if lower.ends_with("ies") && word.len() > 3 {
        format!("{}y", &word[..word.len() - 3])
    } else if ["sses", "xes", "zes", "ches", "shes"]
        .iter()
        .any(|suffix| lower.ends_with(suffix))
    {
        word[..word.len() - 2].to_string()
    } else if lower.ends_with('s') && !lower.ends_with("ss") {
        word[..word.len() - 1].to_string()
    } else {
        word.to_string()
    }
}

fn pluralize(word: &str) -> String {
    let lower = word.to_lowercase();
    let consonant_y = lower.ends_with('y')
        && !lower
            .chars()
            .rev()
            .nth(1)
            .is_some_and(|c| "aeiou".contains(c));
    if consonant_y {
        format!("{}ies", &word[..word.len() - 1])
    } else if ["s", "x", "z", "ch", "sh"]
        .iter()
        .any(|suffix| lower.ends_with(suffix))
    {
        format!("{word}es")
    } else {
        format!("{word}s")
    }
}

/// Merge `base` underneath `own`: values already present in `own` win, nested
/// mappings merge recursively and `is` lists are concatenated.
pub(crate) fn merge_under(own: &mut Mapping, base: Mapping) {
    for (key, value) in base {
        let is_trait_list = key.as_str() == Some("is");
        match own.get_mut(&key) {
            None => {
                own.insert(key, value);
            }
            Some(existing) if existing.is_null() => *existing = value,
            Some(existing) => match (existing, value) {
                (Value::Mapping(mine), Value::Mapping(theirs)) => merge_under(mine, theirs),
                (Value::Sequence(mine), Value::Sequence(theirs)) if is_trait_list => {
                    for item in theirs {
                        if !mine.contains(&item) {
                            mine.push(item);
                        }
                    }
                }
                _ => {}
            },
        }
    }
}

/// Keep `get?`-style optional methods of a resource type only where the
/// resource itself declares that method.
pub(crate) fn settle_optional_methods(base: &mut Mapping, own: &Mapping) {
    let optional: Vec<(Value, String)> = base
        .keys()
        .filter_map(|key| {
            let name = key.as_str()?.strip_suffix('?')?;
            HttpMethod::from_name(name).map(|_| (key.clone(), name.to_string()))
        })
        .collect();
    for (key, name) in optional {
        let Some(body) = base.remove(&key) else {
            continue;
        };
        if own.contains_key(name.as_str()) && !base.contains_key(name.as_str()) {
            base.insert(Value::String(name), body);
        }
    }
}

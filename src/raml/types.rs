//! RAML type declarations and type expressions.
//!
//! Declarations are kept by qualified name (`lib.User` for library types).
//! References resolve to `ShapeKind::Reference` rather than being inlined, so
//! recursive types stay finite; inheritance and union cycles are rejected.

use super::parse::{describe, key_str};
use super::{RamlError, RamlVersion};
use crate::deadline::Deadline;
use crate::model::{Property, Scalar, ScalarKind, Shape, ShapeKind};
use indexmap::IndexMap;
use serde_json::{Number, Value as JsonValue};
use serde_yaml_ng::{Mapping, Value};
use std::collections::BTreeMap;

/// A declaration together with the namespace prefix it was declared under.
#[derive(Debug, Clone)]
pub(crate) struct Scoped<T> {
    pub value: T,
    pub scope: String,
}

/// Named declarations of one kind (types, traits, resource types, ...).
#[derive(Debug, Clone)]
pub(crate) struct Catalog<T> {
    entries: IndexMap<String, Scoped<T>>,
}

impl<T> Default for Catalog<T> {
    fn default() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }
}

impl<T> Catalog<T> {
    pub(crate) fn insert(&mut self, qualified: String, value: T, scope: &str) {
        self.entries.insert(
            qualified,
            Scoped {
                value,
                scope: scope.to_string(),
            },
        );
    }

    /// Resolve `name` as written, then relative to each scope in turn.
    pub(crate) fn qualify(&self, name: &str, scopes: &[String]) -> Option<String> {
        if self.entries.contains_key(name) {
            return Some(name.to_string());
        }
        scopes
            .iter()
            .filter(|scope| !scope.is_empty())
            .map(|scope| format!("{scope}{name}"))
            .find(|candidate| self.entries.contains_key(candidate))
    }

    pub(crate) fn get(&self, qualified: &str) -> Option<&Scoped<T>> {
        self.entries.get(qualified)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&String, &Scoped<T>)> {
        self.entries.iter()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TypeExpr {
    Named(String),
    Array(Box<TypeExpr>),
    Union(Vec<TypeExpr>),
}

/// Parse `Name`, `Name[]`, `A | B` and parenthesised combinations.
pub(crate) fn parse_type_expr(src: &str) -> Result<TypeExpr, RamlError> {
    let tokens = tokenize(src)?;
    if tokens.is_empty() {
        return Err(expr_error(src, "expression is empty"));
    }
    let mut pos = 0;
    let expr = parse_union(&tokens, &mut pos, src)?;
    if pos != tokens.len() {
        return Err(expr_error(src, "unexpected trailing input"));
    }
    Ok(expr)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Name(String),
    Pipe,
    Open,
    Close,
    Brackets,
}

fn tokenize(src: &str) -> Result<Vec<Token>, RamlError> {
    let mut tokens = Vec::new();
    let mut chars = src.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '|' => {
                chars.next();
                tokens.push(Token::Pipe);
            }
            '(' => {
                chars.next();
                tokens.push(Token::Open);
            }
            ')' => {
                chars.next();
                tokens.push(Token::Close);
            }
            '[' => {
                chars.next();
                if chars.next() != Some(']') {
                    return Err(expr_error(src, "'[' must be followed by ']'"));
                }
                tokens.push(Token::Brackets);
            }
            c if is_name_char(c) => {
                let mut name = String::new();
                while let Some(&c) = chars.peek() {
                    if !is_name_char(c) {
                        break;
                    }
                    name.push(c);
                    chars.next();
                }
                tokens.push(Token::Name(name));
            }
            other => {
                return Err(expr_error(src, format!("unexpected character '{other}'")));
            }
        }
    }
    Ok(tokens)
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.')
}

fn parse_union(tokens: &[Token], pos: &mut usize, src: &str) -> Result<TypeExpr, RamlError> {
    let mut members = vec![parse_postfix(tokens, pos, src)?];
    while tokens.get(*pos) == Some(&Token::Pipe) {
        *pos += 1;
        members.push(parse_postfix(tokens, pos, src)?);
    }
    Ok(if members.len() == 1 {
        members.remove(0)
    } else {
        TypeExpr::Union(members)
    })
}

fn parse_postfix(tokens: &[Token], pos: &mut usize, src: &str) -> Result<TypeExpr, RamlError> {
    let mut expr = parse_primary(tokens, pos, src)?;
    while tokens.get(*pos) == Some(&Token::Brackets) {
        *pos += 1;
        expr = TypeExpr::Array(Box::new(expr));
    }
    Ok(expr)
}

fn parse_primary(tokens: &[Token], pos: &mut usize, src: &str) -> Result<TypeExpr, RamlError> {
    match tokens.get(*pos) {
        Some(Token::Name(name)) => {
            *pos += 1;
            Ok(TypeExpr::Named(name.clone()))
        }
        Some(Token::Open) => {
            *pos += 1;
            let inner = parse_union(tokens, pos, src)?;
            if tokens.get(*pos) != Some(&Token::Close) {
                return Err(expr_error(src, "missing ')'"));
            }
            *pos += 1;
            Ok(inner)
        }
        _ => Err(expr_error(src, "expected a type name")),
    }
}

fn expr_error(src: &str, message: impl Into<String>) -> RamlError {
    RamlError::TypeExpression {
        expression: src.to_string(),
        message: message.into(),
    }
}

fn builtin_shape(name: &str) -> Option<Shape> {
    let scalar = |kind| Some(Shape::new(ShapeKind::Scalar(Scalar::new(kind))));
    match name {
        "string" => scalar(ScalarKind::String),
        "number" => scalar(ScalarKind::Number),
        "integer" => scalar(ScalarKind::Integer),
        "boolean" => scalar(ScalarKind::Boolean),
        "date-only" => scalar(ScalarKind::DateOnly),
        "time-only" => scalar(ScalarKind::TimeOnly),
        "datetime-only" => scalar(ScalarKind::DateTimeOnly),
        "datetime" | "date" => scalar(ScalarKind::DateTime),
        "file" => scalar(ScalarKind::File),
        "any" => Some(Shape::new(ShapeKind::Any)),
        "nil" => Some(Shape::new(ShapeKind::Nil)),
        "object" => Some(Shape::new(ShapeKind::Object {
            properties: Vec::new(),
            additional_properties: None,
        })),
        "array" => Some(Shape::new(ShapeKind::Array {
            items: Box::new(Shape::new(ShapeKind::Any)),
            min_items: None,
            max_items: None,
            unique_items: false,
        })),
        _ => None,
    }
}

/// Shape used when a declaration names no type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Fallback {
    String,
    Any,
}

impl Fallback {
    fn shape(self) -> Shape {
        match self {
            Fallback::String => Shape::string(),
            Fallback::Any => Shape::new(ShapeKind::Any),
        }
    }
}

pub(crate) struct TypeTable {
    declared: Catalog<Value>,
    version: RamlVersion,
}

impl TypeTable {
    pub(crate) fn new(declared: Catalog<Value>, version: RamlVersion) -> Self {
        Self { declared, version }
    }

    /// Build the component shape of every declared type, in declaration order.
    pub(crate) fn resolve_all(&self, deadline: &Deadline) -> Result<IndexMap<String, Shape>, RamlError> {
        self.check_inheritance()?;
        let mut shapes = IndexMap::new();
        for (name, decl) in self.declared.iter() {
            deadline.check()?;
            let scopes = [decl.scope.clone()];
            let shape = self.shape(&decl.value, &scopes, Fallback::String, name)?;
            shapes.insert(name.clone(), shape);
        }
        Ok(shapes)
    }

    /// Shape of an inline or named type declaration.
    pub(crate) fn shape(
        &self,
        value: &Value,
        scopes: &[String],
        fallback: Fallback,
        context: &str,
    ) -> Result<Shape, RamlError> {
        match value {
            Value::Null => Ok(fallback.shape()),
            Value::String(text) => self.shape_from_text(text, scopes, context),
            Value::Sequence(parents) => {
                let parts = parents
                    .iter()
                    .map(|parent| self.shape(parent, scopes, fallback, context))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Shape::new(ShapeKind::AllOf(parts)))
            }
            Value::Mapping(map) => self.shape_from_mapping(map, scopes, fallback, context),
            other => Err(RamlError::shape(
                context,
                format!("expected a type declaration, found {}", describe(other)),
            )),
        }
    }

    /// Named properties or parameters. A trailing `?` marks the entry optional
    /// unless an explicit `required` facet is present.
    pub(crate) fn properties(
        &self,
        value: &Value,
        scopes: &[String],
        required_by_default: bool,
        context: &str,
    ) -> Result<Vec<Property>, RamlError> {
        let map = match value {
            Value::Null => return Ok(Vec::new()),
            Value::Mapping(map) => map,
            other => {
                return Err(RamlError::shape(
                    context,
                    format!("expected named declarations, found {}", describe(other)),
                ));
            }
        };
        let mut properties = Vec::with_capacity(map.len());
        for (key, decl) in map {
            let raw = key_str(key, context)?;
            let explicit = decl.get("required").and_then(Value::as_bool);
            let (name, required) = match (explicit, raw.strip_suffix('?')) {
                (Some(required), _) => (raw.to_string(), required),
                (None, Some(stripped)) => (stripped.to_string(), false),
                (None, None) => (raw.to_string(), required_by_default),
            };
            let mut shape = self.shape(decl, scopes, Fallback::String, &format!("{context}.{name}"))?;
            if decl.get("repeat").and_then(Value::as_bool) == Some(true) {
                shape = Shape::new(ShapeKind::Array {
                    items: Box::new(shape),
                    min_items: None,
                    max_items: None,
                    unique_items: false,
                });
            }
            properties.push(Property {
                name,
                required,
                shape,
            });
        }
        Ok(properties)
    }

    fn shape_from_text(&self, text: &str, scopes: &[String], context: &str) -> Result<Shape, RamlError> {
        let trimmed = text.trim();
        if trimmed.starts_with('{') {
            let mut schema: JsonValue =
                serde_json::from_str(trimmed).map_err(|err| RamlError::JsonSchema {
                    name: context.to_string(),
                    message: err.to_string(),
                })?;
            if let Some(object) = schema.as_object_mut() {
                object.remove("$schema");
                object.remove("id");
                object.remove("$id");
            }
            return Ok(Shape::new(ShapeKind::Raw(schema)));
        }
        if trimmed.starts_with('<') {
            // XML schemas have no JSON Schema counterpart; keep the body untyped.
            return Ok(Shape::new(ShapeKind::Any));
        }
        let expr = parse_type_expr(trimmed)?;
        self.shape_from_expr(&expr, scopes)
    }

    fn shape_from_expr(&self, expr: &TypeExpr, scopes: &[String]) -> Result<Shape, RamlError> {
        match expr {
            TypeExpr::Named(name) => {
                if let Some(shape) = builtin_shape(name) {
                    return Ok(shape);
                }
                self.declared
                    .qualify(name, scopes)
                    .map(|qualified| Shape::new(ShapeKind::Reference(qualified)))
                    .ok_or_else(|| RamlError::unknown("type", name.as_str()))
            }
            TypeExpr::Array(inner) => Ok(Shape::new(ShapeKind::Array {
                items: Box::new(self.shape_from_expr(inner, scopes)?),
                min_items: None,
                max_items: None,
                unique_items: false,
            })),
            TypeExpr::Union(members) => {
                let members = members
                    .iter()
                    .map(|member| self.shape_from_expr(member, scopes))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(union_shape(members))
            }
        }
    }

    fn shape_from_mapping(
        &self,
        map: &Mapping,
        scopes: &[String],
        fallback: Fallback,
        context: &str,
    ) -> Result<Shape, RamlError> {
        let base = map.get("type").or_else(|| map.get("schema"));
        let mut shape = match base {
            Some(value) => self.shape(value, scopes, fallback, context)?,
            None if map.contains_key("properties") || map.contains_key("formParameters") => {
                builtin_shape("object").unwrap_or_default()
            }
            None if map.contains_key("items") => builtin_shape("array").unwrap_or_default(),
            None => fallback.shape(),
        };

        let declared_properties = map.get("properties").or_else(|| map.get("formParameters"));
        if let Some(props) = declared_properties {
            let required_default = map.contains_key("properties")
                && self.version == RamlVersion::V10;
            let properties = self.properties(props, scopes, required_default, context)?;
            shape = with_properties(shape, properties);
        }

        let additional = map.get("additionalProperties").and_then(Value::as_bool);
        if let Some(items_decl) = map.get("items") {
            let items = self.shape(items_decl, scopes, Fallback::Any, &format!("{context}[]"))?;
            if let ShapeKind::Array { items: slot, .. } = &mut shape.kind {
                **slot = items;
            }
        }

        match &mut shape.kind {
            ShapeKind::Scalar(scalar) => apply_scalar_facets(scalar, map),
            ShapeKind::Array {
                min_items,
                max_items,
                unique_items,
                ..
            } => {
                *min_items = map.get("minItems").and_then(Value::as_u64).or(*min_items);
                *max_items = map.get("maxItems").and_then(Value::as_u64).or(*max_items);
                *unique_items |= map.get("uniqueItems").and_then(Value::as_bool) == Some(true);
            }
            ShapeKind::Object {
                additional_properties,
                ..
            } => {
                if additional.is_some() {
                    *additional_properties = additional;
                }
            }
            _ => {}
        }

        if let Some(description) = map.get("description").and_then(Value::as_str) {
            shape.description = Some(description.to_string());
        }
        if let Some(example) = map.get("example") {
            shape.example = Some(example_value(example));
        } else if let Some(Value::Mapping(examples)) = map.get("examples") {
            if let Some((_, first)) = examples.iter().next() {
                let value = match first {
                    Value::Mapping(wrapper) => wrapper.get("value").unwrap_or(first),
                    other => other,
                };
                shape.example = Some(example_value(value));
            }
        }
        if let Some(default) = map.get("default") {
            shape.default = Some(json_value(default));
        }
        if let Some(Value::Sequence(values)) = map.get("enum") {
            shape.enum_values = values.iter().map(json_value).collect();
        }
        Ok(shape)
    }

    fn check_inheritance(&self) -> Result<(), RamlError> {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Mark {
            Visiting,
            Done,
        }

        fn visit(
            table: &TypeTable,
            name: &str,
            marks: &mut BTreeMap<String, Mark>,
            path: &mut Vec<String>,
        ) -> Result<(), RamlError> {
            match marks.get(name) {
                Some(Mark::Done) => return Ok(()),
                Some(Mark::Visiting) => {
                    let start = path.iter().position(|n| n == name).unwrap_or(0);
                    let mut chain = path[start..].to_vec();
                    chain.push(name.to_string());
                    return Err(RamlError::Cycle {
                        kind: "type inheritance",
                        chain: chain.join(" -> "),
                    });
                }
                None => {}
            }
            let Some(decl) = table.declared.get(name) else {
                return Ok(());
            };
            marks.insert(name.to_string(), Mark::Visiting);
            path.push(name.to_string());
            let scopes = [decl.scope.clone()];
            for parent in table.parents(&decl.value, &scopes) {
                visit(table, &parent, marks, path)?;
            }
            path.pop();
            marks.insert(name.to_string(), Mark::Done);
            Ok(())
        }

        let mut marks = BTreeMap::new();
        for (name, _) in self.declared.iter() {
            visit(self, name, &mut marks, &mut Vec::new())?;
        }
        Ok(())
    }

    // Named types a declaration extends directly or through a union. Array
    // items and properties are not inheritance and may recurse.
    fn parents(&self, value: &Value, scopes: &[String]) -> Vec<String> {
        fn collect(expr: &TypeExpr, out: &mut Vec<String>) {
            match expr {
                TypeExpr::Named(name) => out.push(name.clone()),
                TypeExpr::Union(members) => members.iter().for_each(|m| collect(m, out)),
                TypeExpr::Array(_) => {}
            }
        }

        let mut names = Vec::new();
        let base = match value {
            Value::Mapping(map) => map.get("type").or_else(|| map.get("schema")),
            other => Some(other),
        };
        let texts: Vec<&str> = match base {
            Some(Value::String(text)) => vec![text.as_str()],
            Some(Value::Sequence(items)) => items.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        };
        for text in texts {
            if let Ok(expr) = parse_type_expr(text.trim()) {
                collect(&expr, &mut names);
            }
        }
        names
            .into_iter()
            .filter(|name| builtin_shape(name).is_none())
            .filter_map(|name| self.declared.qualify(&name, scopes))
            .collect()
    }
}

fn with_properties(shape: Shape, properties: Vec<Property>) -> Shape {
    match shape.kind {
        ShapeKind::Object {
            properties: inherited,
            additional_properties,
        } if inherited.is_empty() => Shape {
            kind: ShapeKind::Object {
                properties,
                additional_properties,
            },
            ..shape
        },
        ShapeKind::Any => Shape {
            kind: ShapeKind::Object {
                properties,
                additional_properties: None,
            },
            ..shape
        },
        _ => {
            let own = Shape::new(ShapeKind::Object {
                properties,
                additional_properties: None,
            });
            let annotated = shape.has_annotations();
            let mut parts = match shape.kind {
                ShapeKind::AllOf(parents) if !annotated => parents,
                _ => vec![shape],
            };
            parts.push(own);
            Shape::new(ShapeKind::AllOf(parts))
        }
    }
}

fn union_shape(members: Vec<Shape>) -> Shape {
    let (nils, mut rest): (Vec<_>, Vec<_>) = members
        .into_iter()
        .partition(|member| matches!(member.kind, ShapeKind::Nil));
    let nullable = !nils.is_empty();
    let mut shape = match rest.len() {
        0 => Shape::new(ShapeKind::Nil),
        1 => rest.remove(0),
        _ => Shape::new(ShapeKind::Union(rest)),
    };
    shape.nullable |= nullable && !matches!(shape.kind, ShapeKind::Nil);
    shape
}

fn apply_scalar_facets(scalar: &mut Scalar, map: &Mapping) {
    if let Some(pattern) = map.get("pattern").and_then(Value::as_str) {
        scalar.pattern = Some(pattern.to_string());
    }
    if let Some(format) = map.get("format").and_then(Value::as_str) {
        scalar.format = Some(format.to_string());
    }
    scalar.min_length = map.get("minLength").and_then(Value::as_u64).or(scalar.min_length);
    scalar.max_length = map.get("maxLength").and_then(Value::as_u64).or(scalar.max_length);
    scalar.minimum = map.get("minimum").and_then(json_number).or(scalar.minimum.take());
    scalar.maximum = map.get("maximum").and_then(json_number).or(scalar.maximum.take());
    scalar.multiple_of = map.get("multipleOf").and_then(json_number).or(scalar.multiple_of.take());
}

fn json_number(value: &Value) -> Option<Number> {
    match json_value(value) {
        JsonValue::Number(n) => Some(n),
        _ => None,
    }
}

/// Convert a YAML value into JSON for examples, defaults and enums.
pub(crate) fn json_value(value: &Value) -> JsonValue {
    match value {
        Value::Null => JsonValue::Null,
        Value::Bool(b) => JsonValue::Bool(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                JsonValue::from(i)
            } else if let Some(u) = n.as_u64() {
                JsonValue::from(u)
            } else {
                n.as_f64()
                    .and_then(Number::from_f64)
                    .map(JsonValue::Number)
                    .unwrap_or(JsonValue::Null)
            }
        }
        Value::String(s) => JsonValue::String(s.clone()),
        Value::Sequence(items) => JsonValue::Array(items.iter().map(json_value).collect()),
        Value::Mapping(map) => JsonValue::Object(
            map.iter()
                .map(|(key, value)| (scalar_key(key), json_value(value)))
                .collect(),
        ),
        Value::Tagged(tagged) => json_value(&tagged.value),
    }
}

/// Examples included from JSON files arrive as text; decode them.
pub(crate) fn example_value(value: &Value) -> JsonValue {
    if let Value::String(text) = value {
        let trimmed = text.trim();
        if trimmed.starts_with('{') || trimmed.starts_with('[') {
            if let Ok(parsed) = serde_json::from_str(trimmed) {
                return parsed;
            }
        }
    }
    json_value(value)
}

fn scalar_key(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        other => serde_yaml_ng::to_string(other)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(source: &str) -> TypeTable {
        let value: Value = serde_yaml_ng::from_str(source).unwrap();
        let mut declared = Catalog::default();
        if let Value::Mapping(map) = value {
            for (key, value) in map {
                declared.insert(key.as_str().unwrap().to_string(), value, "");
            }
        }
        TypeTable::new(declared, RamlVersion::V10)
    }

    fn root() -> Vec<String> {
        vec![String::new()]
    }

    #[test]
    fn type_expressions_parse_with_precedence() {
        assert_eq!(
            parse_type_expr("User[] | nil").unwrap(),
            TypeExpr::Union(vec![
                TypeExpr::Array(Box::new(TypeExpr::Named("User".into()))),
                TypeExpr::Named("nil".into()),
            ])
        );
        assert_eq!(
            parse_type_expr("(lib.A | B)[]").unwrap(),
            TypeExpr::Array(Box::new(TypeExpr::Union(vec![
                TypeExpr::Named("lib.A".into()),
                TypeExpr::Named("B".into()),
            ])))
        );
        assert!(parse_type_expr("User[").is_err());
        assert!(parse_type_expr("(A | B").is_err());
        assert!(parse_type_expr("A B").is_err());
        assert!(parse_type_expr("").is_err());
    }

    #[test]
    fn object_properties_default_to_required() {
        let types = table(
            "User:\n  properties:\n    id: integer\n    nickname?: string\n    email:\n      type: string\n      required: false\n      pattern: '^.+@.+$'\n",
        );
        let shapes = types.resolve_all(&Deadline::unlimited()).unwrap();
        let ShapeKind::Object { properties, .. } = &shapes["User"].kind else {
            panic!("expected object");
        };
        let summary: Vec<_> = properties.iter().map(|p| (p.name.as_str(), p.required)).collect();
        assert_eq!(summary, vec![("id", true), ("nickname", false), ("email", false)]);
        let ShapeKind::Scalar(scalar) = &properties[2].shape.kind else {
            panic!("expected scalar");
        };
        assert_eq!(scalar.pattern.as_deref(), Some("^.+@.+$"));
    }

    #[test]
    fn inheritance_with_extra_properties_becomes_all_of() {
        let types = table(
            "Base:\n  properties:\n    id: string\nAdmin:\n  type: Base\n  properties:\n    role: string\n",
        );
        let shapes = types.resolve_all(&Deadline::unlimited()).unwrap();
        let ShapeKind::AllOf(parts) = &shapes["Admin"].kind else {
            panic!("expected allOf, got {:?}", shapes["Admin"].kind);
        };
        assert_eq!(parts[0].kind, ShapeKind::Reference("Base".into()));
        assert!(matches!(parts[1].kind, ShapeKind::Object { .. }));
    }

    #[test]
    fn recursive_properties_are_allowed() {
        let types = table(
            "Node:\n  properties:\n    children: Node[]\n    parent: Node | nil\n",
        );
        let shapes = types.resolve_all(&Deadline::unlimited()).unwrap();
        let ShapeKind::Object { properties, .. } = &shapes["Node"].kind else {
            panic!("expected object");
        };
        assert!(properties[1].shape.nullable);
        assert_eq!(properties[1].shape.kind, ShapeKind::Reference("Node".into()));
    }

    #[test]
    fn inheritance_cycles_are_rejected() {
        let types = table("A:\n  type: B\nB:\n  type: C\nC: A\n");
        let err = types.resolve_all(&Deadline::unlimited()).expect_err("cycle");
        let RamlError::Cycle { chain, .. } = err else {
            panic!("expected cycle, got {err}");
        };
        assert_eq!(chain, "A -> B -> C -> A");
    }

    #[test]
    fn dangling_references_are_rejected() {
        let types = table("Order:\n  properties:\n    customer: Customer\n");
        let err = types.resolve_all(&Deadline::unlimited()).expect_err("dangling");
        assert!(matches!(err, RamlError::Unknown { kind: "type", .. }));
    }

    #[test]
    fn scoped_names_resolve_inside_their_library() {
        let mut declared = Catalog::default();
        declared.insert("lib.Id".to_string(), Value::String("string".into()), "lib.");
        declared.insert(
            "lib.User".to_string(),
            serde_yaml_ng::from_str("properties:\n  id: Id\n").unwrap(),
            "lib.",
        );
        let types = TypeTable::new(declared, RamlVersion::V10);
        let shapes = types.resolve_all(&Deadline::unlimited()).unwrap();
        let ShapeKind::Object { properties, .. } = &shapes["lib.User"].kind else {
            panic!("expected object");
        };
        assert_eq!(properties[0].shape.kind, ShapeKind::Reference("lib.Id".into()));
        assert!(types.shape(&Value::String("Id".into()), &root(), Fallback::Any, "x").is_err());
    }

    #[test]
    fn json_schema_strings_are_embedded() {
        let types = table("Legacy: '{\"$schema\": \"http://json-schema.org/draft-04/schema#\", \"type\": \"object\"}'\n");
        let shapes = types.resolve_all(&Deadline::unlimited()).unwrap();
        let ShapeKind::Raw(schema) = &shapes["Legacy"].kind else {
            panic!("expected raw schema");
        };
        assert_eq!(schema, &serde_json::json!({"type": "object"}));
    }
}

use super::document::Schema;
use crate::model::{Property, Scalar, ScalarKind, Shape, ShapeKind};
use indexmap::IndexMap;
use serde_json::Value as JsonValue;

const COMPONENT_PREFIX: &str = "#/components/schemas/";

/// Component key for a declared type. OpenAPI restricts keys to
/// `[A-Za-z0-9._-]`; anything else becomes `_`.
pub fn component_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

pub fn schema_for(shape: &Shape) -> Schema {
    let mut schema = match &shape.kind {
        ShapeKind::Any => Schema::default(),
        ShapeKind::Nil => Schema {
            nullable: true,
            enum_values: vec![JsonValue::Null],
            ..Schema::default()
        },
        ShapeKind::Scalar(scalar) => scalar_schema(scalar),
        ShapeKind::Array {
            items,
            min_items,
            max_items,
            unique_items,
        } => Schema {
            items: Some(Box::new(schema_for(items))),
            min_items: *min_items,
            max_items: *max_items,
            unique_items: *unique_items,
            ..Schema::typed("array")
        },
        ShapeKind::Object {
            properties,
            additional_properties,
        } => object_schema(properties, *additional_properties),
        ShapeKind::Union(members) => Schema {
            any_of: members.iter().map(schema_for).collect(),
            ..Schema::default()
        },
        ShapeKind::Reference(name) => {
            let target = Schema::reference(format!("{COMPONENT_PREFIX}{}", component_name(name)));
            // Siblings of `$ref` are ignored in 3.0, so annotated references wrap it.
            if shape.has_annotations() {
                Schema {
                    all_of: vec![target],
                    ..Schema::default()
                }
            } else {
                return target;
            }
        }
        ShapeKind::AllOf(parts) => Schema {
            all_of: parts.iter().map(schema_for).collect(),
            ..Schema::default()
        },
        ShapeKind::Raw(json) => Schema {
            extra: json.as_object().cloned().unwrap_or_default(),
            ..Schema::default()
        },
    };
    schema.description = shape.description.clone();
    schema.example = shape.example.clone();
    schema.default = shape.default.clone();
    if !shape.enum_values.is_empty() {
        schema.enum_values = shape.enum_values.clone();
    }
    schema.nullable |= shape.nullable;
    schema
}

fn scalar_schema(scalar: &Scalar) -> Schema {
    let (kind, implied_format) = match scalar.kind {
        ScalarKind::String => ("string", None),
        ScalarKind::Number => ("number", None),
        ScalarKind::Integer => ("integer", None),
        ScalarKind::Boolean => ("boolean", None),
        ScalarKind::DateOnly => ("string", Some("date")),
        ScalarKind::TimeOnly => ("string", Some("time")),
        ScalarKind::DateTimeOnly | ScalarKind::DateTime => ("string", Some("date-time")),
        ScalarKind::File => ("string", Some("binary")),
    };
    let format = match scalar.kind {
        ScalarKind::Number | ScalarKind::Integer => scalar.format.as_deref().and_then(numeric_format),
        _ => implied_format.or(scalar.format.as_deref()),
    };
    // RAML number formats that name an integer width narrow the type.
    let kind = match (kind, format) {
        ("number", Some("int32" | "int64")) => "integer",
        _ => kind,
    };
    Schema {
        format: format.map(str::to_string),
        pattern: scalar.pattern.clone(),
        min_length: scalar.min_length,
        max_length: scalar.max_length,
        minimum: scalar.minimum.clone(),
        maximum: scalar.maximum.clone(),
        multiple_of: scalar.multiple_of.clone(),
        ..Schema::typed(kind)
    }
}

fn numeric_format(format: &str) -> Option<&'static str> {
    match format {
        "int" | "int8" | "int16" | "int32" => Some("int32"),
        "int64" | "long" => Some("int64"),
        "float" => Some("float"),
        "double" => Some("double"),
        _ => None,
    }
}

fn object_schema(properties: &[Property], additional: Option<bool>) -> Schema {
    let required = properties
        .iter()
        .filter(|p| p.required)
        .map(|p| p.name.clone())
        .collect();
    let properties: IndexMap<String, Schema> = properties
        .iter()
        .map(|p| (p.name.clone(), schema_for(&p.shape)))
        .collect();
    Schema {
        properties,
        required,
        additional_properties: additional,
        ..Schema::typed("object")
    }
}

/// Properties of an object shape, following references and `allOf` parts.
/// `None` when the shape is not an object.
pub fn object_properties(shape: &Shape, types: &IndexMap<String, Shape>) -> Option<Vec<Property>> {
    fn walk(
        shape: &Shape,
        types: &IndexMap<String, Shape>,
        depth: usize,
    ) -> Option<Vec<Property>> {
        if depth > 32 {
            return None;
        }
        match &shape.kind {
            ShapeKind::Object { properties, .. } => Some(properties.clone()),
            ShapeKind::Reference(name) => walk(types.get(name)?, types, depth + 1),
            ShapeKind::AllOf(parts) => {
                let mut merged: Vec<Property> = Vec::new();
                for part in parts {
                    for property in walk(part, types, depth + 1)? {
                        merged.retain(|existing| existing.name != property.name);
                        merged.push(property);
                    }
                }
                Some(merged)
            }
            _ => None,
        }
    }
    walk(shape, types, 0)
}

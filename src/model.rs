//! Format-neutral document models shared by the pipeline stages.
//!
//! Grammars parse raw text into a `SourceDocument`, resolve it into an
//! `ApiModel` with every reference, include and reusable fragment expanded,
//! and the OpenAPI generator serializes that model. Nothing in an `ApiModel`
//! points back at source files.

use indexmap::IndexMap;
use serde_json::{Number, Value as JsonValue};
use serde_yaml_ng::Value;
use std::path::PathBuf;

/// Output of the parse stage: a syntactically valid, shape-checked tree whose
/// includes and fragments are still unresolved.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub origin: PathBuf,
    pub dialect: String,
    pub tree: Value,
}

#[derive(Debug, Clone, Default)]
pub struct ApiModel {
    pub title: String,
    pub version: Option<String>,
    pub description: Option<String>,
    pub base_uri: Option<String>,
    pub base_uri_parameters: Vec<Parameter>,
    pub protocols: Vec<String>,
    pub media_types: Vec<String>,
    pub documentation: Vec<DocSection>,
    pub types: IndexMap<String, Shape>,
    pub security_schemes: IndexMap<String, SecurityScheme>,
    pub secured_by: Vec<SecurityRequirement>,
    pub groups: Vec<ResourceGroup>,
    pub resources: Vec<Resource>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocSection {
    pub title: String,
    pub content: String,
}

/// Top-level resource and everything nested below it.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceGroup {
    pub name: String,
    pub description: Option<String>,
}

/// A resource flattened to its absolute path.
#[derive(Debug, Clone)]
pub struct Resource {
    pub path: String,
    pub group: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub uri_parameters: Vec<Parameter>,
    pub methods: Vec<Method>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Put,
    Post,
    Delete,
    Options,
    Head,
    Patch,
    Trace,
}

impl HttpMethod {
    pub const ALL: [HttpMethod; 8] = [
        HttpMethod::Get,
        HttpMethod::Put,
        HttpMethod::Post,
        HttpMethod::Delete,
        HttpMethod::Options,
        HttpMethod::Head,
        HttpMethod::Patch,
        HttpMethod::Trace,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "get",
            HttpMethod::Put => "put",
            HttpMethod::Post => "post",
            HttpMethod::Delete => "delete",
            HttpMethod::Options => "options",
            HttpMethod::Head => "head",
            HttpMethod::Patch => "patch",
            HttpMethod::Trace => "trace",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|method| method.as_str() == name)
    }
}

#[derive(Debug, Clone)]
pub struct Method {
    pub verb: HttpMethod,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub query_parameters: Vec<Parameter>,
    pub headers: Vec<Parameter>,
    pub query_string: Option<Shape>,
    pub bodies: Vec<Body>,
    pub responses: Vec<Response>,
    /// `None` inherits the API-wide requirements.
    pub secured_by: Option<Vec<SecurityRequirement>>,
}

#[derive(Debug, Clone)]
pub struct Body {
    /// `None` when the source relies on a default media type it never declared.
    pub media_type: Option<String>,
    pub shape: Shape,
}

#[derive(Debug, Clone)]
pub struct Response {
    pub status: String,
    pub description: Option<String>,
    pub headers: Vec<Parameter>,
    pub bodies: Vec<Body>,
}

#[derive(Debug, Clone)]
pub struct Parameter {
    pub name: String,
    pub required: bool,
    pub shape: Shape,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecurityRequirement {
    Anonymous,
    Scheme { name: String, scopes: Vec<String> },
}

#[derive(Debug, Clone)]
pub struct SecurityScheme {
    pub kind: SecuritySchemeKind,
    pub description: Option<String>,
    pub headers: Vec<Parameter>,
    pub query_parameters: Vec<Parameter>,
    pub settings: SecuritySettings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecuritySchemeKind {
    OAuth2,
    OAuth1,
    Basic,
    Digest,
    PassThrough,
    Custom(String),
}

#[derive(Debug, Clone, Default)]
pub struct SecuritySettings {
    pub authorization_uri: Option<String>,
    pub access_token_uri: Option<String>,
    pub grants: Vec<OAuthGrant>,
    pub scopes: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OAuthGrant {
    AuthorizationCode,
    Implicit,
    Password,
    ClientCredentials,
}

/// A data shape with its documentation facets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Shape {
    pub kind: ShapeKind,
    pub description: Option<String>,
    pub example: Option<JsonValue>,
    pub default: Option<JsonValue>,
    pub enum_values: Vec<JsonValue>,
    pub nullable: bool,
}

impl Shape {
    pub fn new(kind: ShapeKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    pub fn string() -> Self {
        Self::new(ShapeKind::Scalar(Scalar::new(ScalarKind::String)))
    }

    pub fn has_annotations(&self) -> bool {
        self.description.is_some()
            || self.example.is_some()
            || self.default.is_some()
            || !self.enum_values.is_empty()
            || self.nullable
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum ShapeKind {
    #[default]
    Any,
    Nil,
    Scalar(Scalar),
    Array {
        items: Box<Shape>,
        min_items: Option<u64>,
        max_items: Option<u64>,
        unique_items: bool,
    },
    Object {
        properties: Vec<Property>,
        additional_properties: Option<bool>,
    },
    Union(Vec<Shape>),
    /// Named type declared in the API's type table.
    Reference(String),
    AllOf(Vec<Shape>),
    /// Embedded JSON Schema carried through verbatim.
    Raw(JsonValue),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: String,
    pub required: bool,
    pub shape: Shape,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Scalar {
    pub kind: ScalarKind,
    pub format: Option<String>,
    pub pattern: Option<String>,
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    pub minimum: Option<Number>,
    pub maximum: Option<Number>,
    pub multiple_of: Option<Number>,
}

impl Scalar {
    pub fn new(kind: ScalarKind) -> Self {
        Self {
            kind,
            format: None,
            pattern: None,
            min_length: None,
            max_length: None,
            minimum: None,
            maximum: None,
            multiple_of: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScalarKind {
    String,
    Number,
    Integer,
    Boolean,
    DateOnly,
    TimeOnly,
    DateTimeOnly,
    DateTime,
    File,
}

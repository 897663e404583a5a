//! OpenAPI 3.0 generation from a resolved `ApiModel`.
//!
//! Generation is shared by every legacy grammar. Constructs OpenAPI 3.0 cannot
//! express are reported as `GenerateError`s rather than dropped silently.

pub mod document;
pub mod schema;

use crate::deadline::{Deadline, DeadlineExceeded};
use crate::model::{
    ApiModel, Body, HttpMethod, Method, OAuthGrant, Parameter, Resource, SecurityRequirement,
    SecurityScheme, SecuritySchemeKind,
};
use document::{
    Components, HeaderObject, Info, MediaTypeObject, OAuthFlow, OAuthFlows, OpenApiDocument,
    Operation, ParameterLocation, ParameterObject, PathItem, RequestBody, ResponseObject, Schema,
    SecurityRequirementObject, SecuritySchemeObject, SecuritySchemeType, Server, ServerVariable,
    Tag,
};
use indexmap::IndexMap;
use schema::{component_name, object_properties, schema_for};
use thiserror::Error;

pub const OPENAPI_VERSION: &str = "3.0.3";

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("security scheme '{0}' uses OAuth 1.0, which OpenAPI 3.0 cannot describe")]
    OAuth1(String),

    #[error(
        "security scheme '{name}' must describe exactly one header or query parameter to map to an API key (found {found})"
    )]
    UnmappableScheme { name: String, found: usize },

    #[error("OAuth 2.0 scheme '{0}' declares no supported authorization grant")]
    NoOAuthFlows(String),

    #[error("OAuth 2.0 scheme '{name}' grant {grant} requires {missing}")]
    IncompleteOAuthFlow {
        name: String,
        grant: &'static str,
        missing: &'static str,
    },

    #[error("{method} {path}: queryString must be an object type")]
    QueryStringNotObject { method: &'static str, path: String },

    #[error("{method} {path}: {context} has no media type and the API declares no default mediaType")]
    MissingMediaType {
        method: &'static str,
        path: String,
        context: String,
    },

    #[error("{kind} '{second}' and '{first}' both map to component name '{component}'")]
    ComponentNameClash {
        kind: &'static str,
        first: String,
        second: String,
        component: String,
    },

    #[error("duplicate operation {method} {path}")]
    DuplicateOperation { method: &'static str, path: String },

    #[error("serializing OpenAPI document: {0}")]
    Serialize(#[from] serde_yaml_ng::Error),

    #[error(transparent)]
    TimedOut(#[from] DeadlineExceeded),
}

// Sanitizing may fold distinct names together; a second owner of the same
// key would replace the first schema under every `$ref` to it.
fn claim_component<'m>(
    owners: &mut IndexMap<String, &'m str>,
    kind: &'static str,
    name: &'m str,
) -> Result<String, GenerateError> {
    let key = component_name(name);
    if let Some(first) = owners.insert(key.clone(), name) {
        return Err(GenerateError::ComponentNameClash {
            kind,
            first: first.to_string(),
            second: name.to_string(),
            component: key,
        });
    }
    Ok(key)
}

/// Render `model` as OpenAPI 3.0 YAML. `fallback_version` fills `info.version`
/// when the source declares none.
pub fn generate(
    model: &ApiModel,
    fallback_version: &str,
    deadline: &Deadline,
) -> Result<String, GenerateError> {
    let document = build_document(model, fallback_version, deadline)?;
    Ok(serde_yaml_ng::to_string(&document)?)
}

pub fn build_document(
    model: &ApiModel,
    fallback_version: &str,
    deadline: &Deadline,
) -> Result<OpenApiDocument, GenerateError> {
    let version = model
        .version
        .clone()
        .filter(|v| !v.trim().is_empty())
        .or_else(|| (!fallback_version.trim().is_empty()).then(|| fallback_version.to_string()))
        .unwrap_or_else(|| "1.0".to_string());

    let mut components = Components::default();
    let mut owners: IndexMap<String, &str> = IndexMap::new();
    for (name, shape) in &model.types {
        deadline.check()?;
        let key = claim_component(&mut owners, "type", name)?;
        components.schemas.insert(key, schema_for(shape));
    }
    owners.clear();
    for (name, scheme) in &model.security_schemes {
        let key = claim_component(&mut owners, "security scheme", name)?;
        components
            .security_schemes
            .insert(key, security_scheme(name, scheme)?);
    }

    let mut paths: IndexMap<String, PathItem> = IndexMap::new();
    for resource in &model.resources {
        deadline.check()?;
        add_resource(&mut paths, resource, model)?;
    }

    Ok(OpenApiDocument {
        openapi: OPENAPI_VERSION,
        info: Info {
            title: model.title.clone(),
            description: info_description(model),
            version: version.clone(),
        },
        servers: servers(model, &version),
        tags: model
            .groups
            .iter()
            .map(|group| Tag {
                name: group.name.clone(),
                description: group.description.clone(),
            })
            .collect(),
        paths,
        components,
        security: requirements(&model.secured_by),
    })
}

fn info_description(model: &ApiModel) -> Option<String> {
    let mut parts: Vec<String> = model.description.iter().cloned().collect();
    parts.extend(
        model
            .documentation
            .iter()
            .map(|section| format!("## {}\n\n{}", section.title, section.content.trim_end())),
    );
    (!parts.is_empty()).then(|| parts.join("\n\n"))
}

fn servers(model: &ApiModel, version: &str) -> Vec<Server> {
    let Some(base_uri) = model.base_uri.as_deref() else {
        return Vec::new();
    };
    let mut variables = IndexMap::new();
    for name in template_names(base_uri) {
        let declared = model.base_uri_parameters.iter().find(|p| p.name == name);
        let enum_values: Vec<String> = declared
            .map(|p| p.shape.enum_values.iter().filter_map(json_text).collect())
            .unwrap_or_default();
        let default = declared
            .and_then(|p| p.shape.default.as_ref().or(p.shape.example.as_ref()))
            .and_then(json_text)
            .or_else(|| enum_values.first().cloned())
            .or_else(|| (name == "version").then(|| version.to_string()))
            .unwrap_or_default();
        variables.insert(
            name.clone(),
            ServerVariable {
                default,
                enum_values,
                description: declared.and_then(|p| p.shape.description.clone()),
            },
        );
    }

    let (scheme, rest) = match base_uri.split_once("://") {
        Some((scheme, rest)) => (Some(scheme), rest),
        None => (None, base_uri),
    };
    let mut protocols = model.protocols.clone();
    if protocols.is_empty() {
        protocols.extend(scheme.map(str::to_ascii_lowercase));
    }
    if protocols.is_empty() {
        return vec![Server {
            url: base_uri.to_string(),
            variables,
        }];
    }
    protocols
        .iter()
        .map(|protocol| Server {
            url: format!("{protocol}://{rest}"),
            variables: variables.clone(),
        })
        .collect()
}

fn json_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// `{name}` placeholders in a path or URI template, in order.
pub(crate) fn template_names(template: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        let after = &rest[start + 1..];
        let Some(end) = after.find('}') else {
            break;
        };
        let name = after[..end].trim_start_matches(['+', '#']);
        if !name.is_empty() && !names.iter().any(|n: &String| n == name) {
            names.push(name.to_string());
        }
        rest = &after[end + 1..];
    }
    names
}

fn add_resource(
    paths: &mut IndexMap<String, PathItem>,
    resource: &Resource,
    model: &ApiModel,
) -> Result<(), GenerateError> {
    let item = paths.entry(resource.path.clone()).or_default();
    if item.summary.is_none() {
        item.summary = resource.display_name.clone();
    }
    if item.description.is_none() {
        item.description = resource.description.clone();
    }
    for name in template_names(&resource.path) {
        if item.parameters.iter().any(|p| p.name == name) {
            continue;
        }
        let parameter = match resource.uri_parameters.iter().find(|p| p.name == name) {
            Some(declared) => parameter_object(declared, ParameterLocation::Path),
            None => ParameterObject {
                name,
                location: ParameterLocation::Path,
                description: None,
                required: true,
                schema: Schema::typed("string"),
            },
        };
        item.parameters.push(ParameterObject {
            required: true,
            ..parameter
        });
    }

    for method in &resource.methods {
        let verb = method.verb.as_str();
        if item.operations.contains_key(verb) {
            return Err(GenerateError::DuplicateOperation {
                method: verb,
                path: resource.path.clone(),
            });
        }
        item.operations
            .insert(verb, operation(resource, method, model)?);
    }
    Ok(())
}

fn operation(resource: &Resource, method: &Method, model: &ApiModel) -> Result<Operation, GenerateError> {
    let path = &resource.path;
    let verb = method.verb;

    let mut parameters: Vec<ParameterObject> = method
        .query_parameters
        .iter()
        .map(|p| parameter_object(p, ParameterLocation::Query))
        .chain(
            method
                .headers
                .iter()
                .map(|p| parameter_object(p, ParameterLocation::Header)),
        )
        .collect();
    if let Some(query_string) = &method.query_string {
        let properties = object_properties(query_string, &model.types).ok_or_else(|| {
            GenerateError::QueryStringNotObject {
                method: verb.as_str(),
                path: path.clone(),
            }
        })?;
        for property in properties {
            if parameters
                .iter()
                .any(|p| p.location == ParameterLocation::Query && p.name == property.name)
            {
                continue;
            }
            parameters.push(parameter_object(
                &Parameter {
                    name: property.name,
                    required: property.required,
                    shape: property.shape,
                },
                ParameterLocation::Query,
            ));
        }
    }

    let request_body = if method.bodies.is_empty() {
        None
    } else {
        Some(RequestBody {
            content: content(&method.bodies, verb, path, "request body")?,
        })
    };

    let mut responses = IndexMap::new();
    for response in &method.responses {
        let headers = response
            .headers
            .iter()
            .map(|header| {
                let mut schema = schema_for(&header.shape);
                let description = schema.description.take();
                (
                    header.name.clone(),
                    HeaderObject {
                        description,
                        required: header.required,
                        schema,
                    },
                )
            })
            .collect();
        let context = format!("response {}", response.status);
        responses.insert(
            response.status.clone(),
            ResponseObject {
                description: response
                    .description
                    .clone()
                    .unwrap_or_else(|| format!("{} response", response.status)),
                headers,
                content: content(&response.bodies, verb, path, &context)?,
            },
        );
    }
    if responses.is_empty() {
        responses.insert(
            "default".to_string(),
            ResponseObject {
                description: "Default response".to_string(),
                headers: IndexMap::new(),
                content: IndexMap::new(),
            },
        );
    }

    Ok(Operation {
        tags: vec![resource.group.clone()],
        summary: method.display_name.clone(),
        description: method.description.clone(),
        parameters,
        request_body,
        responses,
        security: method.secured_by.as_deref().map(requirements),
    })
}

fn content(
    bodies: &[Body],
    verb: HttpMethod,
    path: &str,
    context: &str,
) -> Result<IndexMap<String, MediaTypeObject>, GenerateError> {
    let mut content = IndexMap::new();
    for body in bodies {
        let media_type = body
            .media_type
            .clone()
            .ok_or_else(|| GenerateError::MissingMediaType {
                method: verb.as_str(),
                path: path.to_string(),
                context: context.to_string(),
            })?;
        content.insert(
            media_type,
            MediaTypeObject {
                schema: schema_for(&body.shape),
            },
        );
    }
    Ok(content)
}

fn parameter_object(parameter: &Parameter, location: ParameterLocation) -> ParameterObject {
    let mut schema = schema_for(&parameter.shape);
    let description = schema.description.take();
    ParameterObject {
        name: parameter.name.clone(),
        location,
        description,
        required: parameter.required || location == ParameterLocation::Path,
        schema,
    }
}

fn requirements(secured_by: &[SecurityRequirement]) -> Vec<SecurityRequirementObject> {
    secured_by
        .iter()
        .map(|requirement| match requirement {
            SecurityRequirement::Anonymous => IndexMap::new(),
            SecurityRequirement::Scheme { name, scopes } => {
                IndexMap::from([(component_name(name), scopes.clone())])
            }
        })
        .collect()
}

fn security_scheme(name: &str, scheme: &SecurityScheme) -> Result<SecuritySchemeObject, GenerateError> {
    let base = SecuritySchemeObject {
        kind: SecuritySchemeType::Http,
        description: scheme.description.clone(),
        scheme: None,
        name: None,
        location: None,
        flows: None,
    };
    match &scheme.kind {
        SecuritySchemeKind::Basic => Ok(SecuritySchemeObject {
            scheme: Some("basic"),
            ..base
        }),
        SecuritySchemeKind::Digest => Ok(SecuritySchemeObject {
            scheme: Some("digest"),
            ..base
        }),
        SecuritySchemeKind::OAuth1 => Err(GenerateError::OAuth1(name.to_string())),
        SecuritySchemeKind::PassThrough | SecuritySchemeKind::Custom(_) => {
            let found = scheme.headers.len() + scheme.query_parameters.len();
            let key = match (scheme.headers.as_slice(), scheme.query_parameters.as_slice()) {
                ([header], []) => (header, ParameterLocation::Header),
                ([], [query]) => (query, ParameterLocation::Query),
                _ => {
                    return Err(GenerateError::UnmappableScheme {
                        name: name.to_string(),
                        found,
                    });
                }
            };
            Ok(SecuritySchemeObject {
                kind: SecuritySchemeType::ApiKey,
                name: Some(key.0.name.clone()),
                location: Some(key.1),
                ..base
            })
        }
        SecuritySchemeKind::OAuth2 => Ok(SecuritySchemeObject {
            kind: SecuritySchemeType::OAuth2,
            flows: Some(oauth_flows(name, scheme)?),
            ..base
        }),
    }
}

fn oauth_flows(name: &str, scheme: &SecurityScheme) -> Result<OAuthFlows, GenerateError> {
    let settings = &scheme.settings;
    if settings.grants.is_empty() {
        return Err(GenerateError::NoOAuthFlows(name.to_string()));
    }
    let scopes: IndexMap<String, String> = settings
        .scopes
        .iter()
        .map(|scope| (scope.clone(), String::new()))
        .collect();
    let require = |uri: &Option<String>, grant: &'static str, missing: &'static str| {
        uri.clone().ok_or_else(|| GenerateError::IncompleteOAuthFlow {
            name: name.to_string(),
            grant,
            missing,
        })
    };

    let mut flows = OAuthFlows::default();
    for grant in &settings.grants {
        match grant {
            OAuthGrant::AuthorizationCode => {
                flows.authorization_code = Some(OAuthFlow {
                    authorization_url: Some(require(
                        &settings.authorization_uri,
                        "authorization_code",
                        "authorizationUri",
                    )?),
                    token_url: Some(require(
                        &settings.access_token_uri,
                        "authorization_code",
                        "accessTokenUri",
                    )?),
                    scopes: scopes.clone(),
                });
            }
            OAuthGrant::Implicit => {
                flows.implicit = Some(OAuthFlow {
                    authorization_url: Some(require(
                        &settings.authorization_uri,
                        "implicit",
                        "authorizationUri",
                    )?),
                    token_url: None,
                    scopes: scopes.clone(),
                });
            }
            OAuthGrant::Password => {
                flows.password = Some(OAuthFlow {
                    authorization_url: None,
                    token_url: Some(require(&settings.access_token_uri, "password", "accessTokenUri")?),
                    scopes: scopes.clone(),
                });
            }
            OAuthGrant::ClientCredentials => {
                flows.client_credentials = Some(OAuthFlow {
                    authorization_url: None,
                    token_url: Some(require(
                        &settings.access_token_uri,
                        "client_credentials",
                        "accessTokenUri",
                    )?),
                    scopes: scopes.clone(),
                });
            }
        }
    }
    Ok(flows)
}

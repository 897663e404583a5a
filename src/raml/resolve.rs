use super::fragments::{
    FragmentRef, fragment_refs, merge_under, resource_path_name, scalar_text,
    settle_optional_methods, substitute, substitute_resource_type,
};
use super::include::IncludeExpander;
use super::parse::{describe, key_str, status_code};
use super::types::{Catalog, Fallback, TypeTable};
use super::{RamlError, RamlVersion};
use crate::deadline::Deadline;
use crate::model::{
    ApiModel, Body, DocSection, HttpMethod, Method, OAuthGrant, Parameter, Resource,
    ResourceGroup, Response, SecurityRequirement, SecurityScheme, SecuritySchemeKind,
    SecuritySettings, SourceDocument,
};
use indexmap::IndexMap;
use serde_yaml_ng::{Mapping, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub(crate) fn resolve_api(document: SourceDocument, deadline: &Deadline) -> Result<ApiModel, RamlError> {
    let version = RamlVersion::parse(&document.dialect)?;
    let mut expander = IncludeExpander::new(deadline);
    let tree = expander.expand_file(document.tree, &document.origin)?;
    let Value::Mapping(root) = tree else {
        return Err(RamlError::shape("/", "document root must be a mapping"));
    };

    let base_dir = document
        .origin
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let mut declarations = Declarations::default();
    declarations.collect(&root, "")?;
    load_libraries(&root, &base_dir, "", &mut expander, &mut Vec::new(), &mut declarations)?;

    let Declarations {
        types,
        traits,
        resource_types,
        security_schemes,
    } = declarations;
    let resolver = Resolver {
        version,
        types: TypeTable::new(types, version),
        traits,
        resource_types,
        security_schemes,
        deadline,
        media_types: string_list(root.get("mediaType"), "/mediaType")?,
    };
    resolver.api(&root)
}

#[derive(Default)]
struct Declarations {
    types: Catalog<Value>,
    traits: Catalog<Value>,
    resource_types: Catalog<Value>,
    security_schemes: Catalog<Value>,
}

impl Declarations {
    fn collect(&mut self, map: &Mapping, scope: &str) -> Result<(), RamlError> {
        for section in ["types", "schemas"] {
            for (name, value) in section_entries(map, section)? {
                self.types.insert(format!("{scope}{name}"), value, scope);
            }
        }
        for (name, value) in section_entries(map, "traits")? {
            self.traits.insert(format!("{scope}{name}"), value, scope);
        }
        for (name, value) in section_entries(map, "resourceTypes")? {
            self.resource_types.insert(format!("{scope}{name}"), value, scope);
        }
        for (name, value) in section_entries(map, "securitySchemes")? {
            self.security_schemes.insert(format!("{scope}{name}"), value, scope);
        }
        Ok(())
    }
}

// RAML 0.8 writes declaration sections as a sequence of single-entry maps.
fn section_entries(map: &Mapping, section: &str) -> Result<Vec<(String, Value)>, RamlError> {
    let pointer = format!("/{section}");
    let mut entries = Vec::new();
    let mut take = |map: &Mapping| -> Result<(), RamlError> {
        for (key, value) in map {
            entries.push((key_str(key, &pointer)?.to_string(), value.clone()));
        }
        Ok(())
    };
    match map.get(section) {
        None | Some(Value::Null) => {}
        Some(Value::Mapping(declared)) => take(declared)?,
        Some(Value::Sequence(items)) => {
            for item in items {
                match item {
                    Value::Mapping(declared) => take(declared)?,
                    other => {
                        return Err(RamlError::shape(
                            &pointer,
                            format!("expected a mapping of declarations, found {}", describe(other)),
                        ));
                    }
                }
            }
        }
        Some(other) => {
            return Err(RamlError::shape(
                &pointer,
                format!("expected a mapping of declarations, found {}", describe(other)),
            ));
        }
    }
    Ok(entries)
}

/// Load `uses` libraries, registering their declarations under `<ns>.`.
fn load_libraries(
    map: &Mapping,
    base_dir: &Path,
    scope: &str,
    expander: &mut IncludeExpander<'_>,
    stack: &mut Vec<PathBuf>,
    declarations: &mut Declarations,
) -> Result<(), RamlError> {
    let uses = match map.get("uses") {
        None | Some(Value::Null) => return Ok(()),
        Some(Value::Mapping(uses)) => uses,
        Some(other) => {
            return Err(RamlError::shape(
                "/uses",
                format!("expected a mapping of libraries, found {}", describe(other)),
            ));
        }
    };
    for (namespace, target) in uses {
        let namespace = key_str(namespace, "/uses")?;
        let Value::String(target) = target else {
            return Err(RamlError::shape(
                format!("/uses/{namespace}"),
                "a library reference must be a file path",
            ));
        };
        let path = base_dir.join(target.trim());
        let canonical =
            fs::canonicalize(&path).map_err(|_| RamlError::MissingInclude { path: path.clone() })?;
        if let Some(pos) = stack.iter().position(|p| p == &canonical) {
            let chain = stack[pos..]
                .iter()
                .chain(std::iter::once(&canonical))
                .map(|p| p.file_name().unwrap_or_default().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join(" -> ");
            return Err(RamlError::Cycle {
                kind: "library",
                chain,
            });
        }

        let Value::Mapping(library) = expander.load(target, base_dir)? else {
            return Err(RamlError::shape(
                format!("/uses/{namespace}"),
                "a library must be a mapping",
            ));
        };
        let nested = format!("{scope}{namespace}.");
        debug!(library = %canonical.display(), scope = %nested, "loaded library");
        declarations.collect(&library, &nested)?;

        stack.push(canonical.clone());
        let library_dir = canonical.parent().map(Path::to_path_buf).unwrap_or_default();
        load_libraries(&library, &library_dir, &nested, expander, stack, declarations)?;
        stack.pop();
    }
    Ok(())
}

struct Resolver<'d> {
    version: RamlVersion,
    types: TypeTable,
    traits: Catalog<Value>,
    resource_types: Catalog<Value>,
    security_schemes: Catalog<Value>,
    deadline: &'d Deadline,
    media_types: Vec<String>,
}

/// Inherited state while walking nested resources.
struct Frame {
    path: String,
    uri_parameters: Vec<Parameter>,
    group: Option<String>,
}

impl Resolver<'_> {
    fn api(&self, root: &Mapping) -> Result<ApiModel, RamlError> {
        let scopes = vec![String::new()];
        let title = text_field(root, "title", "/")?
            .filter(|title| !title.trim().is_empty())
            .ok_or_else(|| RamlError::shape("/title", "a non-empty title is required"))?;

        let mut base_uri_parameters =
            self.parameters(root.get("baseUriParameters"), &scopes, true, "/baseUriParameters")?;
        base_uri_parameters.iter_mut().for_each(|p| p.required = true);

        let mut model = ApiModel {
            title,
            version: text_field(root, "version", "/")?,
            description: text_field(root, "description", "/")?,
            base_uri: text_field(root, "baseUri", "/")?,
            base_uri_parameters,
            protocols: string_list(root.get("protocols"), "/protocols")?
                .into_iter()
                .map(|protocol| protocol.to_ascii_lowercase())
                .collect(),
            media_types: self.media_types.clone(),
            documentation: documentation(root.get("documentation"))?,
            types: self.types.resolve_all(self.deadline)?,
            security_schemes: self.security_schemes()?,
            secured_by: self
                .secured_by(root.get("securedBy"), &scopes, "/securedBy")?
                .unwrap_or_default(),
            ..ApiModel::default()
        };

        let top = Frame {
            path: String::new(),
            uri_parameters: Vec::new(),
            group: None,
        };
        for (key, value) in root {
            let key = key_str(key, "/")?;
            if key.starts_with('/') {
                self.resource(&top, key, value, &mut model.groups, &mut model.resources)?;
            }
        }
        Ok(model)
    }

    fn resource(
        &self,
        frame: &Frame,
        key: &str,
        value: &Value,
        groups: &mut Vec<ResourceGroup>,
        out: &mut Vec<Resource>,
    ) -> Result<(), RamlError> {
        self.deadline.check()?;
        let path = format!("{}{}", frame.path, key);
        let mut own = node_mapping(value, &path)?;
        let mut scopes = vec![String::new()];
        self.apply_resource_type(&mut own, &path, &mut scopes, &mut Vec::new())?;

        let resource_traits = match own.get("is") {
            Some(value) => fragment_refs(value, &path)?,
            None => Vec::new(),
        };
        let mut uri_parameters = frame.uri_parameters.clone();
        for mut param in self.parameters(own.get("uriParameters"), &scopes, true, &path)? {
            param.required = true;
            uri_parameters.retain(|existing| existing.name != param.name);
            uri_parameters.push(param);
        }
        let display_name = text_field(&own, "displayName", &path)?;
        let description = text_field(&own, "description", &path)?;
        let resource_secured = self.secured_by(own.get("securedBy"), &scopes, &path)?;

        let group = match &frame.group {
            Some(group) => group.clone(),
            None => {
                let name = display_name.clone().unwrap_or_else(|| path.clone());
                if !groups.iter().any(|group| group.name == name) {
                    groups.push(ResourceGroup {
                        name: name.clone(),
                        description: description.clone(),
                    });
                }
                name
            }
        };

        let mut methods = Vec::new();
        for (key, body) in &own {
            if let Some(verb) = key.as_str().and_then(HttpMethod::from_name) {
                methods.push(self.method(
                    verb,
                    body,
                    &path,
                    &resource_traits,
                    &scopes,
                    resource_secured.as_ref(),
                )?);
            }
        }

        out.push(Resource {
            path: path.clone(),
            group: group.clone(),
            display_name,
            description,
            uri_parameters: uri_parameters.clone(),
            methods,
        });

        let child = Frame {
            path,
            uri_parameters,
            group: Some(group),
        };
        for (key, body) in &own {
            if let Some(segment) = key.as_str().filter(|k| k.starts_with('/')) {
                self.resource(&child, segment, body, groups, out)?;
            }
        }
        Ok(())
    }

    fn apply_resource_type(
        &self,
        own: &mut Mapping,
        path: &str,
        scopes: &mut Vec<String>,
        chain: &mut Vec<String>,
    ) -> Result<(), RamlError> {
        let Some(type_value) = own.remove("type") else {
            return Ok(());
        };
        let refs = fragment_refs(&type_value, path)?;
        let reference = match refs.as_slice() {
            [] => return Ok(()),
            [single] => single,
            _ => return Err(RamlError::shape(path, "a resource can have only one type")),
        };
        let qualified = self
            .resource_types
            .qualify(&reference.name, scopes)
            .ok_or_else(|| RamlError::unknown("resource type", reference.name.as_str()))?;
        if let Some(pos) = chain.iter().position(|name| name == &qualified) {
            let mut cycle = chain[pos..].to_vec();
            cycle.push(qualified);
            return Err(RamlError::Cycle {
                kind: "resource type",
                chain: cycle.join(" -> "),
            });
        }
        let Some(decl) = self.resource_types.get(&qualified) else {
            return Err(RamlError::unknown("resource type", qualified));
        };
        chain.push(qualified.clone());

        let params = self.fragment_params(reference, path, None);
        let body = substitute_resource_type(&decl.value, &params, &qualified)?;
        let mut base = fragment_body(body, "resource type", &qualified)?;
        if !scopes.contains(&decl.scope) {
            scopes.push(decl.scope.clone());
        }
        self.apply_resource_type(&mut base, path, scopes, chain)?;
        settle_optional_methods(&mut base, own);
        merge_under(own, base);
        Ok(())
    }

    fn fragment_params(
        &self,
        reference: &FragmentRef,
        path: &str,
        verb: Option<HttpMethod>,
    ) -> BTreeMap<String, String> {
        let mut params = reference.params.clone();
        params.insert("resourcePath".to_string(), path.to_string());
        params.insert("resourcePathName".to_string(), resource_path_name(path));
        if let Some(verb) = verb {
            params.insert("methodName".to_string(), verb.as_str().to_string());
        }
        params
    }

    fn method(
        &self,
        verb: HttpMethod,
        value: &Value,
        path: &str,
        resource_traits: &[FragmentRef],
        scopes: &[String],
        resource_secured: Option<&Vec<SecurityRequirement>>,
    ) -> Result<Method, RamlError> {
        let pointer = format!("{path} {}", verb.as_str());
        let mut own = node_mapping(value, &pointer)?;

        let mut refs = match own.get("is") {
            Some(value) => fragment_refs(value, &pointer)?,
            None => Vec::new(),
        };
        for reference in resource_traits {
            if !refs.iter().any(|r| r.name == reference.name) {
                refs.push(reference.clone());
            }
        }
        let mut scopes = scopes.to_vec();
        for reference in &refs {
            self.deadline.check()?;
            let qualified = self
                .traits
                .qualify(&reference.name, &scopes)
                .ok_or_else(|| RamlError::unknown("trait", reference.name.as_str()))?;
            let Some(decl) = self.traits.get(&qualified) else {
                return Err(RamlError::unknown("trait", qualified));
            };
            let params = self.fragment_params(reference, path, Some(verb));
            let body = substitute(&decl.value, &params, "trait", &qualified)?;
            let base = fragment_body(body, "trait", &qualified)?;
            if !scopes.contains(&decl.scope) {
                scopes.push(decl.scope.clone());
            }
            merge_under(&mut own, base);
        }

        let required = self.version.parameters_required_by_default();
        let secured_by = match self.secured_by(own.get("securedBy"), &scopes, &pointer)? {
            Some(requirements) => Some(requirements),
            None => resource_secured.cloned(),
        };
        Ok(Method {
            verb,
            display_name: text_field(&own, "displayName", &pointer)?,
            description: text_field(&own, "description", &pointer)?,
            query_parameters: self.parameters(own.get("queryParameters"), &scopes, required, &pointer)?,
            headers: self.parameters(own.get("headers"), &scopes, required, &pointer)?,
            query_string: own
                .get("queryString")
                .map(|decl| self.types.shape(decl, &scopes, Fallback::Any, &pointer))
                .transpose()?,
            bodies: self.bodies(own.get("body"), &scopes, &pointer)?,
            responses: self.responses(own.get("responses"), &scopes, &pointer)?,
            secured_by,
        })
    }

    fn parameters(
        &self,
        value: Option<&Value>,
        scopes: &[String],
        required_by_default: bool,
        pointer: &str,
    ) -> Result<Vec<Parameter>, RamlError> {
        let Some(value) = value else {
            return Ok(Vec::new());
        };
        Ok(self
            .types
            .properties(value, scopes, required_by_default, pointer)?
            .into_iter()
            .map(|property| Parameter {
                name: property.name,
                required: property.required,
                shape: property.shape,
            })
            .collect())
    }

    fn bodies(&self, value: Option<&Value>, scopes: &[String], pointer: &str) -> Result<Vec<Body>, RamlError> {
        let value = match value {
            None | Some(Value::Null) => return Ok(Vec::new()),
            Some(value) => value,
        };
        if let Value::Mapping(map) = value {
            let per_media_type = !map.is_empty()
                && map
                    .keys()
                    .all(|key| key.as_str().is_some_and(|key| key.contains('/')));
            if per_media_type {
                let mut bodies = Vec::with_capacity(map.len());
                for (key, decl) in map {
                    let media_type = key_str(key, pointer)?;
                    let context = format!("{pointer} body {media_type}");
                    bodies.push(Body {
                        media_type: Some(media_type.to_string()),
                        shape: self.types.shape(decl, scopes, Fallback::Any, &context)?,
                    });
                }
                return Ok(bodies);
            }
        }

        let shape = self.types.shape(value, scopes, Fallback::Any, pointer)?;
        if self.media_types.is_empty() {
            return Ok(vec![Body {
                media_type: None,
                shape,
            }]);
        }
        Ok(self
            .media_types
            .iter()
            .map(|media_type| Body {
                media_type: Some(media_type.clone()),
                shape: shape.clone(),
            })
            .collect())
    }

    fn responses(
        &self,
        value: Option<&Value>,
        scopes: &[String],
        pointer: &str,
    ) -> Result<Vec<Response>, RamlError> {
        let map = match value {
            None | Some(Value::Null) => return Ok(Vec::new()),
            Some(Value::Mapping(map)) => map,
            Some(other) => {
                return Err(RamlError::shape(
                    pointer,
                    format!("responses must be a mapping, found {}", describe(other)),
                ));
            }
        };
        let required = self.version.parameters_required_by_default();
        let mut responses = Vec::with_capacity(map.len());
        for (key, decl) in map {
            let status = status_code(key).ok_or_else(|| {
                RamlError::shape(pointer, "response keys must be HTTP status codes")
            })?;
            let context = format!("{pointer} {status}");
            let decl = node_mapping(decl, &context)?;
            responses.push(Response {
                description: text_field(&decl, "description", &context)?,
                headers: self.parameters(decl.get("headers"), scopes, required, &context)?,
                bodies: self.bodies(decl.get("body"), scopes, &context)?,
                status,
            });
        }
        Ok(responses)
    }

    /// `None` when the node does not mention `securedBy` at all.
    fn secured_by(
        &self,
        value: Option<&Value>,
        scopes: &[String],
        pointer: &str,
    ) -> Result<Option<Vec<SecurityRequirement>>, RamlError> {
        let items: Vec<&Value> = match value {
            None | Some(Value::Null) => return Ok(None),
            Some(Value::Sequence(items)) => items.iter().collect(),
            Some(single) => vec![single],
        };
        let mut requirements = Vec::with_capacity(items.len());
        for item in items {
            let (name, settings) = match item {
                Value::Null => {
                    requirements.push(SecurityRequirement::Anonymous);
                    continue;
                }
                Value::String(name) => (name.as_str(), None),
                Value::Mapping(map) if map.len() == 1 => match map.iter().next() {
                    Some((key, settings)) => (key_str(key, pointer)?, Some(settings)),
                    None => continue,
                },
                other => {
                    return Err(RamlError::shape(
                        pointer,
                        format!("expected a security scheme name, found {}", describe(other)),
                    ));
                }
            };
            let qualified = self
                .security_schemes
                .qualify(name, scopes)
                .ok_or_else(|| RamlError::unknown("security scheme", name))?;
            let granted = string_list(settings.and_then(|s| s.get("scopes")), pointer)?;
            requirements.push(SecurityRequirement::Scheme {
                name: qualified,
                scopes: granted,
            });
        }
        Ok(Some(requirements))
    }

    fn security_schemes(&self) -> Result<IndexMap<String, SecurityScheme>, RamlError> {
        let mut schemes = IndexMap::new();
        for (name, decl) in self.security_schemes.iter() {
            let pointer = format!("/securitySchemes/{name}");
            let map = node_mapping(&decl.value, &pointer)?;
            let kind = text_field(&map, "type", &pointer)?
                .map(|kind| scheme_kind(&kind))
                .ok_or_else(|| RamlError::shape(&pointer, "a security scheme needs a type"))?;
            let scopes = [decl.scope.clone()];
            let described = match map.get("describedBy") {
                Some(value) => node_mapping(value, &pointer)?,
                None => Mapping::new(),
            };
            let required = self.version.parameters_required_by_default();
            schemes.insert(
                name.clone(),
                SecurityScheme {
                    kind,
                    description: text_field(&map, "description", &pointer)?,
                    headers: self.parameters(described.get("headers"), &scopes, required, &pointer)?,
                    query_parameters: self.parameters(
                        described.get("queryParameters"),
                        &scopes,
                        required,
                        &pointer,
                    )?,
                    settings: settings(map.get("settings"), &pointer)?,
                },
            );
        }
        Ok(schemes)
    }
}

fn scheme_kind(name: &str) -> SecuritySchemeKind {
    match name {
        "OAuth 2.0" => SecuritySchemeKind::OAuth2,
        "OAuth 1.0" => SecuritySchemeKind::OAuth1,
        "Basic Authentication" => SecuritySchemeKind::Basic,
        "Digest Authentication" => SecuritySchemeKind::Digest,
        "Pass Through" => SecuritySchemeKind::PassThrough,
        other => SecuritySchemeKind::Custom(other.to_string()),
    }
}

fn settings(value: Option<&Value>, pointer: &str) -> Result<SecuritySettings, RamlError> {
    let map = match value {
        None => return Ok(SecuritySettings::default()),
        Some(value) => node_mapping(value, pointer)?,
    };
    let mut grants = Vec::new();
    for grant in string_list(map.get("authorizationGrants"), pointer)? {
        match grant.as_str() {
            "authorization_code" | "code" => grants.push(OAuthGrant::AuthorizationCode),
            "implicit" | "token" => grants.push(OAuthGrant::Implicit),
            "password" | "owner" => grants.push(OAuthGrant::Password),
            "client_credentials" | "credentials" => grants.push(OAuthGrant::ClientCredentials),
            other => debug!(grant = other, "ignoring extension OAuth grant"),
        }
    }
    Ok(SecuritySettings {
        authorization_uri: text_field(&map, "authorizationUri", pointer)?,
        access_token_uri: text_field(&map, "accessTokenUri", pointer)?,
        grants,
        scopes: string_list(map.get("scopes"), pointer)?,
    })
}

fn documentation(value: Option<&Value>) -> Result<Vec<DocSection>, RamlError> {
    let items = match value {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Sequence(items)) => items,
        Some(other) => {
            return Err(RamlError::shape(
                "/documentation",
                format!("expected a sequence, found {}", describe(other)),
            ));
        }
    };
    items
        .iter()
        .map(|item| {
            let map = node_mapping(item, "/documentation")?;
            let title = text_field(&map, "title", "/documentation")?;
            let content = text_field(&map, "content", "/documentation")?;
            match (title, content) {
                (Some(title), Some(content)) => Ok(DocSection { title, content }),
                _ => Err(RamlError::shape(
                    "/documentation",
                    "each section needs a title and content",
                )),
            }
        })
        .collect()
}

fn fragment_body(body: Value, fragment: &'static str, name: &str) -> Result<Mapping, RamlError> {
    match body {
        Value::Null => Ok(Mapping::new()),
        Value::Mapping(map) => Ok(map),
        other => Err(RamlError::shape(
            format!("{fragment} '{name}'"),
            format!("expected a mapping, found {}", describe(&other)),
        )),
    }
}

fn node_mapping(value: &Value, pointer: &str) -> Result<Mapping, RamlError> {
    match value {
        Value::Null => Ok(Mapping::new()),
        Value::Mapping(map) => Ok(map.clone()),
        other => Err(RamlError::shape(
            pointer,
            format!("expected a mapping, found {}", describe(other)),
        )),
    }
}

fn text_field(map: &Mapping, key: &str, pointer: &str) -> Result<Option<String>, RamlError> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => scalar_text(value).map(Some).ok_or_else(|| {
            RamlError::shape(
                pointer,
                format!("'{key}' must be a scalar, found {}", describe(value)),
            )
        }),
    }
}

fn string_list(value: Option<&Value>, pointer: &str) -> Result<Vec<String>, RamlError> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Sequence(items)) => items
            .iter()
            .map(|item| {
                scalar_text(item).ok_or_else(|| {
                    RamlError::shape(pointer, format!("expected a scalar, found {}", describe(item)))
                })
            })
            .collect(),
        Some(other) => scalar_text(other).map(|text| vec![text]).ok_or_else(|| {
            RamlError::shape(pointer, format!("expected a list, found {}", describe(other)))
        }),
    }
}

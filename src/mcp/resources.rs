//! Resource registry
//!
//! Maps URI templates such as `sharepoint://drive/{folderId?}` to listing
//! operations. Reads resolve template parameters and hand them to the bound
//! resolver; unknown URIs are rejected before anything remote happens.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;

use super::protocol::{ResourceDefinition, ResourceTemplateDefinition};
use crate::error::{Result, SharePointError};
use crate::shaper::Entry;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param { name: String, optional: bool },
}

/// Parsed URI template: `scheme://segment/segment/...`
///
/// Parameters occupy whole path segments. Optional parameters (`{name?}`)
/// may only appear at the end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UriTemplate {
    raw: String,
    scheme: String,
    segments: Vec<Segment>,
}

impl UriTemplate {
    pub fn parse(template: &str) -> Result<Self> {
        let invalid = |reason: &str| {
            SharePointError::Config(format!("invalid URI template '{}': {}", template, reason))
        };

        let (scheme, path) = template
            .split_once("://")
            .ok_or_else(|| invalid("missing scheme"))?;
        if scheme.is_empty() {
            return Err(invalid("missing scheme"));
        }

        let mut segments = Vec::new();
        let mut seen_optional = false;
        for part in path.split('/').filter(|part| !part.is_empty()) {
            let segment = match part.strip_prefix('{') {
                Some(rest) => {
                    let inner = rest
                        .strip_suffix('}')
                        .ok_or_else(|| invalid("unterminated parameter"))?;
                    let (name, optional) = match inner.strip_suffix('?') {
                        Some(name) => (name, true),
                        None => (inner, false),
                    };
                    if name.is_empty() || name.contains(['{', '}']) {
                        return Err(invalid("bad parameter name"));
                    }
                    if segments
                        .iter()
                        .any(|s| matches!(s, Segment::Param { name: n, .. } if n == name))
                    {
                        return Err(invalid("duplicate parameter"));
                    }
                    Segment::Param {
                        name: name.to_string(),
                        optional,
                    }
                }
                None if part.contains(['{', '}']) => return Err(invalid("stray brace")),
                None => Segment::Literal(part.to_string()),
            };

            match &segment {
                Segment::Param { optional: true, .. } => seen_optional = true,
                _ if seen_optional => {
                    return Err(invalid("optional parameters must come last"));
                }
                _ => {}
            }
            segments.push(segment);
        }

        Ok(Self {
            raw: template.to_string(),
            scheme: scheme.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Extract parameters if `uri` matches this template
    pub fn matches(&self, uri: &str) -> Option<TemplateParams> {
        let (scheme, path) = uri.split_once("://")?;
        if scheme != self.scheme {
            return None;
        }

        let mut parts = path.split('/').filter(|part| !part.is_empty());
        let mut params = HashMap::new();
        for segment in &self.segments {
            match (segment, parts.next()) {
                (Segment::Literal(expected), Some(part)) if part == expected => {}
                (Segment::Literal(_), _) => return None,
                (Segment::Param { name, .. }, Some(part)) => {
                    params.insert(name.clone(), part.to_string());
                }
                (Segment::Param { optional: true, .. }, None) => {}
                (Segment::Param { optional: false, .. }, None) => return None,
            }
        }

        if parts.next().is_some() {
            return None;
        }
        Some(TemplateParams(params))
    }

    /// The URI obtained by leaving out every optional parameter, or `None`
    /// when the template has required parameters.
    pub fn default_uri(&self) -> Option<String> {
        let mut uri = format!("{}://", self.scheme);
        let mut literals = Vec::new();
        let mut has_optional = false;
        for segment in &self.segments {
            match segment {
                Segment::Literal(literal) => literals.push(literal.as_str()),
                Segment::Param { optional: false, .. } => return None,
                Segment::Param { optional: true, .. } => has_optional = true,
            }
        }
        uri.push_str(&literals.join("/"));
        if has_optional {
            uri.push('/');
        }
        Some(uri)
    }
}

/// Parameters extracted from a matched URI
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateParams(HashMap<String, String>);

impl TemplateParams {
    /// Present parameter value; absent optional parameters are `None`
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

type Resolver = Arc<dyn Fn(TemplateParams) -> BoxFuture<'static, Result<Vec<Entry>>> + Send + Sync>;

struct RegisteredResource {
    name: String,
    description: String,
    template: UriTemplate,
    resolver: Resolver,
}

/// Registry of readable resources
#[derive(Default)]
pub struct ResourceRegistry {
    resources: Vec<RegisteredResource>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a URI template to a listing operation
    pub fn register<F, Fut>(
        &mut self,
        name: &str,
        uri_template: &str,
        description: &str,
        resolver: F,
    ) -> Result<()>
    where
        F: Fn(TemplateParams) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<Entry>>> + Send + 'static,
    {
        if self.resources.iter().any(|r| r.name == name) {
            return Err(SharePointError::Config(format!(
                "resource '{}' registered twice",
                name
            )));
        }

        let template = UriTemplate::parse(uri_template)?;
        self.resources.push(RegisteredResource {
            name: name.to_string(),
            description: description.to_string(),
            template,
            resolver: Arc::new(move |params| resolver(params).boxed()),
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Read a resource; `NoSuchResource` if no template matches
    pub async fn read(&self, uri: &str) -> Result<Vec<Entry>> {
        let (resource, params) = self
            .resources
            .iter()
            .find_map(|r| r.template.matches(uri).map(|params| (r, params)))
            .ok_or_else(|| SharePointError::NoSuchResource(uri.to_string()))?;

        tracing::debug!(resource = %resource.name, uri, "reading resource");
        (resource.resolver)(params).await
    }

    /// Templates for `resources/templates/list`
    pub fn templates(&self) -> Vec<ResourceTemplateDefinition> {
        self.resources
            .iter()
            .map(|r| ResourceTemplateDefinition {
                uri_template: r.template.as_str().to_string(),
                name: r.name.clone(),
                description: Some(r.description.clone()),
            })
            .collect()
    }

    /// Parameter-free resources for `resources/list`
    pub fn resources(&self) -> Vec<ResourceDefinition> {
        self.resources
            .iter()
            .filter_map(|r| {
                r.template.default_uri().map(|uri| ResourceDefinition {
                    uri,
                    name: r.name.clone(),
                    description: Some(r.description.clone()),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_optional_parameter_matching() {
        let template = UriTemplate::parse("sharepoint://drive/{folderId?}").unwrap();

        let root = template.matches("sharepoint://drive/").unwrap();
        assert_eq!(root.get("folderId"), None);
        assert!(template.matches("sharepoint://drive").is_some());

        let folder = template.matches("sharepoint://drive/01ABC").unwrap();
        assert_eq!(folder.get("folderId"), Some("01ABC"));

        assert!(template.matches("sharepoint://drive/a/b").is_none());
        assert!(template.matches("sharepoint://sites").is_none());
        assert!(template.matches("other://drive/").is_none());
    }

    #[test]
    fn test_required_parameter() {
        let template = UriTemplate::parse("sharepoint://sites/{siteId}/lists").unwrap();
        assert!(template.matches("sharepoint://sites/lists").is_none());
        let params = template.matches("sharepoint://sites/s1/lists").unwrap();
        assert_eq!(params.get("siteId"), Some("s1"));
        assert_eq!(template.default_uri(), None);
    }

    #[test]
    fn test_malformed_templates() {
        for bad in [
            "drive/{id}",
            "sharepoint://drive/{id",
            "sharepoint://drive/{}",
            "sharepoint://{a?}/b",
            "sharepoint://x{a}",
            "sharepoint://{a}/{a}",
        ] {
            assert!(UriTemplate::parse(bad).is_err(), "accepted {}", bad);
        }
    }

    #[test]
    fn test_default_uri() {
        let drive = UriTemplate::parse("sharepoint://drive/{folderId?}").unwrap();
        assert_eq!(drive.default_uri().as_deref(), Some("sharepoint://drive/"));
        let sites = UriTemplate::parse("sharepoint://sites").unwrap();
        assert_eq!(sites.default_uri().as_deref(), Some("sharepoint://sites"));
    }

    fn entry(id: &str) -> Entry {
        Entry {
            uri: format!("sharepoint://drive/{}", id),
            label: id.to_string(),
            payload: json!({"id": id}),
        }
    }

    #[tokio::test]
    async fn test_read_dispatches_with_params() {
        let mut registry = ResourceRegistry::new();
        registry
            .register(
                "items",
                "sharepoint://drive/{folderId?}",
                "Drive items",
                |params: TemplateParams| async move {
                    Ok(vec![entry(params.get("folderId").unwrap_or("root"))])
                },
            )
            .unwrap();

        let root = registry.read("sharepoint://drive/").await.unwrap();
        assert_eq!(root[0].label, "root");
        let folder = registry.read("sharepoint://drive/F1").await.unwrap();
        assert_eq!(folder[0].label, "F1");
    }

    #[tokio::test]
    async fn test_unknown_uri() {
        let registry = ResourceRegistry::new();
        assert!(matches!(
            registry.read("sharepoint://nothing").await,
            Err(SharePointError::NoSuchResource(_))
        ));
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut registry = ResourceRegistry::new();
        let resolver = |_: TemplateParams| async { Ok(Vec::new()) };
        registry
            .register("sites", "sharepoint://sites", "", resolver)
            .unwrap();
        assert!(registry
            .register("sites", "sharepoint://sites", "", resolver)
            .is_err());
        assert_eq!(registry.len(), 1);
    }
}

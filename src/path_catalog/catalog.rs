use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{info, warn};

use super::defaults;
use super::template::PathTemplate;
use crate::error::{Error, Result};

/// Manufacturer string -> catalog key ("Hikvision Digital" -> "HIKVISION_DIGITAL")
pub fn normalize_vendor(manufacturer: &str) -> String {
    manufacturer.trim().replace(' ', "_").to_uppercase()
}

/// Ensure a path starts with '/'
pub fn normalize_path(path: &str) -> String {
    let path = path.trim();
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}

/// Operator-supplied main/sub path pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomPathPair {
    pub main: String,
    pub sub: Option<String>,
}

impl CustomPathPair {
    pub fn new(main: &str, sub: Option<&str>) -> Self {
        Self {
            main: normalize_path(main),
            sub: sub.map(normalize_path),
        }
    }

    /// `main` or `main,sub`
    pub fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.splitn(2, ',').map(str::trim);
        let main = parts.next().filter(|m| !m.is_empty())?;
        let sub = parts.next().filter(|s| !s.is_empty());
        Some(Self::new(main, sub))
    }
}

/// JSON resource layout
#[derive(Debug, Default, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    vendors: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    nvr_templates: Vec<PathTemplate>,
    #[serde(default)]
    fallback_template: Option<PathTemplate>,
    #[serde(default)]
    generic_paths: Vec<String>,
}

/// Vendor paths, NVR templates and generic fallbacks. Immutable after load.
#[derive(Debug)]
pub struct PathCatalog {
    vendors: HashMap<String, Vec<String>>,
    /// normalized alias -> template, in declaration order
    aliases: Vec<(String, Arc<PathTemplate>)>,
    fallback: Arc<PathTemplate>,
    generic_paths: Vec<String>,
}

impl PathCatalog {
    /// Built-in tables
    pub fn builtin() -> Result<Self> {
        Self::build(CatalogFile::default())
    }

    /// Parse a JSON catalog. Sections that are absent fall back to the
    /// built-in table; a catalog with every section empty is rejected.
    pub fn from_json(json: &str) -> Result<Self> {
        let file: CatalogFile = serde_json::from_str(json)?;
        if file.vendors.is_empty() && file.nvr_templates.is_empty() && file.generic_paths.is_empty() {
            return Err(Error::Config("path catalog is empty".to_string()));
        }
        Self::build(file)
    }

    /// Load from `path`, or use the built-in tables when the resource is
    /// missing, empty or malformed
    pub async fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            info!("No path catalog configured, using built-in tables");
            return Self::builtin();
        };

        let loaded = match tokio::fs::read_to_string(path).await {
            Ok(content) => Self::from_json(&content),
            Err(e) => Err(Error::Io(e)),
        };

        match loaded {
            Ok(catalog) => {
                info!(
                    path = %path.display(),
                    vendors = catalog.vendors.len(),
                    nvr_aliases = catalog.aliases.len(),
                    generic_paths = catalog.generic_paths.len(),
                    "Path catalog loaded"
                );
                Ok(catalog)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Path catalog unusable, using built-in tables");
                Self::builtin()
            }
        }
    }

    fn build(file: CatalogFile) -> Result<Self> {
        let vendors: HashMap<String, Vec<String>> = if file.vendors.is_empty() {
            defaults::VENDOR_PATHS
                .iter()
                .map(|(k, paths)| (k.to_string(), paths.iter().map(|p| p.to_string()).collect()))
                .collect()
        } else {
            file.vendors
                .into_iter()
                .map(|(k, paths)| {
                    (
                        normalize_vendor(&k),
                        paths.iter().map(|p| normalize_path(p)).collect(),
                    )
                })
                .collect()
        };

        let templates: Vec<Arc<PathTemplate>> = if file.nvr_templates.is_empty() {
            defaults::NVR_TEMPLATES
                .iter()
                .map(|(key, aliases, main, sub)| PathTemplate::new(key, aliases, main, *sub))
                .collect::<Result<_>>()?
        } else {
            file.nvr_templates.into_iter().map(Arc::new).collect()
        };

        let mut aliases = Vec::new();
        for template in &templates {
            aliases.push((normalize_vendor(&template.key), Arc::clone(template)));
            for alias in &template.aliases {
                aliases.push((normalize_vendor(alias), Arc::clone(template)));
            }
        }

        let fallback = match file.fallback_template {
            Some(t) => Arc::new(t),
            None => {
                let (key, main, sub) = defaults::FALLBACK_NVR_TEMPLATE;
                PathTemplate::new(key, &[], main, sub)?
            }
        };

        let generic_paths = if file.generic_paths.is_empty() {
            defaults::GENERIC_PATHS.iter().map(|p| p.to_string()).collect()
        } else {
            file.generic_paths.iter().map(|p| normalize_path(p)).collect()
        };

        Ok(Self {
            vendors,
            aliases,
            fallback,
            generic_paths,
        })
    }

    /// Vendor paths for a manufacturer string: exact key first, otherwise the
    /// longest key contained in the normalized name
    pub fn vendor_paths(&self, manufacturer: &str) -> &[String] {
        let key = normalize_vendor(manufacturer);
        if key.is_empty() {
            return &[];
        }
        if let Some(paths) = self.vendors.get(&key) {
            return paths;
        }
        self.vendors
            .iter()
            .filter(|(k, _)| key.contains(k.as_str()))
            .max_by_key(|(k, _)| k.len())
            .map(|(_, paths)| paths.as_slice())
            .unwrap_or(&[])
    }

    /// NVR template: exact alias, then substring alias, then the fallback
    pub fn resolve_template(&self, manufacturer: Option<&str>) -> Arc<PathTemplate> {
        let key = manufacturer.map(normalize_vendor).unwrap_or_default();
        if key.is_empty() {
            return Arc::clone(&self.fallback);
        }

        if let Some((_, t)) = self.aliases.iter().find(|(alias, _)| *alias == key) {
            return Arc::clone(t);
        }

        self.aliases
            .iter()
            .filter(|(alias, _)| !alias.is_empty() && key.contains(alias.as_str()))
            .max_by_key(|(alias, _)| alias.len())
            .map(|(_, t)| Arc::clone(t))
            .unwrap_or_else(|| Arc::clone(&self.fallback))
    }

    pub fn generic_paths(&self) -> &[String] {
        &self.generic_paths
    }
}

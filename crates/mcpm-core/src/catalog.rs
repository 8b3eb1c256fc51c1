//! Combined view of registry packages, registry servers and local installs.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;

use crate::registry::{RegistryPackage, RegistryServer};
use crate::store::InstalledPackage;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageRow {
    pub name: String,
    pub registry_version: Option<String>,
    pub installed_version: Option<String>,
    pub description: String,
    pub author: String,
}

impl PackageRow {
    pub fn installed(&self) -> bool {
        self.installed_version.is_some()
    }

    /// Installed version when present, else the registry version.
    pub fn display_version(&self) -> &str {
        self.installed_version
            .as_deref()
            .or(self.registry_version.as_deref())
            .unwrap_or("N/A")
    }
}

/// Installed package the registry does not list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocalRow {
    pub name: String,
    pub version: String,
    pub install_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerRow {
    pub registry_name: String,
    pub description: String,
    pub installed_version: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Catalog {
    pub packages: Vec<PackageRow>,
    pub local_only: Vec<LocalRow>,
    pub servers: Vec<ServerRow>,
    /// Whether the registry could be reached
    pub registry_available: bool,
}

impl Catalog {
    /// Join registry listings with the local store.
    ///
    /// `None` for a registry listing means it could not be fetched; that
    /// section is then empty.
    pub fn build(
        packages: Option<Vec<RegistryPackage>>,
        servers: Option<Vec<RegistryServer>>,
        installed: Vec<InstalledPackage>,
    ) -> Self {
        let registry_available = packages.is_some() || servers.is_some();
        let packages = packages.unwrap_or_default();
        let servers = servers.unwrap_or_default();
        let installed: BTreeMap<String, InstalledPackage> =
            installed.into_iter().map(|p| (p.name.clone(), p)).collect();

        let package_rows: Vec<PackageRow> = packages
            .iter()
            .map(|pkg| PackageRow {
                name: pkg.name.clone(),
                registry_version: pkg.version.clone(),
                installed_version: installed.get(&pkg.name).map(|p| p.version.clone()),
                description: pkg.description.clone().unwrap_or_default(),
                author: pkg.author.clone().unwrap_or_default(),
            })
            .collect();

        let local_only = installed
            .values()
            .filter(|p| !packages.iter().any(|r| r.name == p.name))
            .map(|p| LocalRow {
                name: p.name.clone(),
                version: p.version.clone(),
                install_path: p.install_path.clone(),
            })
            .collect();

        let server_rows = servers
            .iter()
            .map(|s| ServerRow {
                registry_name: s.registry_name.clone(),
                description: s
                    .description
                    .clone()
                    .unwrap_or_else(|| "No description".to_string()),
                installed_version: installed.get(&s.registry_name).map(|p| p.version.clone()),
            })
            .collect();

        Self {
            packages: package_rows,
            local_only,
            servers: server_rows,
            registry_available,
        }
    }

    /// Rows whose name, description or author contains `term`, ignoring case.
    ///
    /// Local-only rows match on name; servers on name and description.
    pub fn search(&self, term: &str) -> Catalog {
        let term = term.to_lowercase();
        let hit = |s: &str| s.to_lowercase().contains(&term);
        Catalog {
            packages: self
                .packages
                .iter()
                .filter(|p| hit(&p.name) || hit(&p.description) || hit(&p.author))
                .cloned()
                .collect(),
            local_only: self
                .local_only
                .iter()
                .filter(|p| hit(&p.name))
                .cloned()
                .collect(),
            servers: self
                .servers
                .iter()
                .filter(|s| hit(&s.registry_name) || hit(&s.description))
                .cloned()
                .collect(),
            registry_available: self.registry_available,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty() && self.local_only.is_empty() && self.servers.is_empty()
    }
}

/// Shorten `text` to at most `max` characters, ending in `...` when cut.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    if max <= 3 {
        return text.chars().take(max).collect();
    }
    let mut out: String = text.chars().take(max - 3).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::Map;

    use super::*;

    fn registry_package(name: &str, version: &str, description: &str) -> RegistryPackage {
        RegistryPackage {
            name: name.into(),
            version: Some(version.into()),
            description: Some(description.into()),
            author: Some("Ada".into()),
            extra: Map::new(),
        }
    }

    fn installed(name: &str, version: &str) -> InstalledPackage {
        InstalledPackage {
            name: name.into(),
            version: version.into(),
            install_path: PathBuf::from(format!("/p/{name}")),
            installed_at: Utc::now(),
        }
    }

    #[test]
    fn joins_registry_and_store() {
        let catalog = Catalog::build(
            Some(vec![
                registry_package("calc", "2.0.0", "Adds numbers"),
                registry_package("weather", "1.0.0", "Forecasts"),
            ]),
            Some(vec![RegistryServer {
                registry_name: "github".into(),
                description: None,
                config_command: None,
                extra: Map::new(),
            }]),
            vec![installed("calc", "1.0.0"), installed("scratch", "0.1.0")],
        );

        assert!(catalog.packages[0].installed());
        assert_eq!(catalog.packages[0].display_version(), "1.0.0");
        assert!(!catalog.packages[1].installed());
        assert_eq!(catalog.local_only.len(), 1);
        assert_eq!(catalog.local_only[0].name, "scratch");
        assert_eq!(catalog.servers[0].description, "No description");
    }

    #[test]
    fn unavailable_registry_leaves_only_local_rows() {
        let catalog = Catalog::build(None, None, vec![installed("calc", "1.0.0")]);
        assert!(!catalog.registry_available);
        assert!(catalog.packages.is_empty());
        assert_eq!(catalog.local_only.len(), 1);
    }

    #[test]
    fn search_is_case_insensitive() {
        let catalog = Catalog::build(
            Some(vec![
                registry_package("calc", "2.0.0", "Adds NUMBERS"),
                registry_package("weather", "1.0.0", "Forecasts"),
            ]),
            None,
            Vec::new(),
        );
        let found = catalog.search("numbers");
        assert_eq!(found.packages.len(), 1);
        assert_eq!(found.packages[0].name, "calc");
        assert!(catalog.search("nothing-matches").is_empty());
    }

    #[test]
    fn truncate_marks_cut_text() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a long description", 10), "a long ...");
    }
}

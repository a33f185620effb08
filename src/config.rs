use crate::traits::FileSystem;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;

pub const ENV_URL: &str = "LIVEKIT_URL";
pub const ENV_API_KEY: &str = "LIVEKIT_API_KEY";
pub const ENV_API_SECRET: &str = "LIVEKIT_API_SECRET";
pub const ENV_SANDBOX_ID: &str = "LIVEKIT_SANDBOX_ID";

const CONFIG_DIR: &str = ".lk";
const CONFIG_FILE: &str = "config.yaml";

/// A named set of project credentials
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectConfig {
    pub name: String,
    pub url: String,
    pub api_key: String,
    pub api_secret: String,
}

impl ProjectConfig {
    /// Project URL with ws(s) scheme rewritten to http(s), for REST endpoints
    pub fn http_url(&self) -> Result<String> {
        let mut parsed = Url::parse(&self.url)
            .with_context(|| format!("Invalid project URL: {}", self.url))?;

        let scheme = match parsed.scheme() {
            "ws" => "http",
            "wss" => "https",
            other => other,
        }
        .to_string();

        if parsed.set_scheme(&scheme).is_err() {
            bail!("Unsupported project URL scheme: {}", self.url);
        }

        Ok(parsed.to_string().trim_end_matches('/').to_string())
    }
}

/// Persisted CLI configuration: known projects and the default selection
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_project: Option<String>,
    #[serde(default)]
    pub projects: Vec<ProjectConfig>,
}

impl CliConfig {
    /// Path of the config file under the user's home directory
    pub fn path() -> Result<PathBuf> {
        let home_dir =
            dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?;
        Ok(home_dir.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Load the config file; a missing file yields an empty config
    pub fn load(fs: &dyn FileSystem) -> Result<Self> {
        let path = Self::path()?;
        if !fs.exists(&path) {
            return Ok(Self::default());
        }

        let content = fs.read_to_string(&path)?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Persist the config file
    pub fn save(&self, fs: &dyn FileSystem) -> Result<()> {
        let path = Self::path()?;
        let content =
            serde_yaml::to_string(self).context("Failed to serialize config")?;
        fs.write(&path, &content)
    }

    /// Add or replace a project by name; the first project becomes the default
    pub fn upsert_project(&mut self, project: ProjectConfig) {
        if let Some(existing) = self.projects.iter_mut().find(|p| p.name == project.name) {
            *existing = project;
        } else {
            if self.projects.is_empty() && self.default_project.is_none() {
                self.default_project = Some(project.name.clone());
            }
            self.projects.push(project);
        }
    }

    /// The configured default project, if any
    pub fn default_project(&self) -> Option<&ProjectConfig> {
        let name = self.default_project.as_deref()?;
        self.projects.iter().find(|p| p.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::MockFileSystem;

    fn project(name: &str) -> ProjectConfig {
        ProjectConfig {
            name: name.to_string(),
            url: format!("wss://{}.example.io", name),
            api_key: "key".to_string(),
            api_secret: "secret".to_string(),
        }
    }

    #[test]
    fn test_http_url_rewrites_ws_schemes() {
        let mut p = project("demo");
        p.url = "wss://demo.example.io".to_string();
        assert_eq!(p.http_url().unwrap(), "https://demo.example.io");

        p.url = "ws://localhost:7880".to_string();
        assert_eq!(p.http_url().unwrap(), "http://localhost:7880");

        p.url = "https://demo.example.io".to_string();
        assert_eq!(p.http_url().unwrap(), "https://demo.example.io");
    }

    #[test]
    fn test_http_url_rejects_garbage() {
        let mut p = project("demo");
        p.url = "not a url".to_string();
        assert!(p.http_url().is_err());
    }

    #[test]
    fn test_load_missing_config_is_empty() {
        let fs = MockFileSystem::new();
        let config = CliConfig::load(&fs).unwrap();
        assert!(config.projects.is_empty());
        assert!(config.default_project.is_none());
    }

    #[test]
    fn test_save_load_round_trip() {
        let fs = MockFileSystem::new();
        let mut config = CliConfig::default();
        config.upsert_project(project("alpha"));
        config.upsert_project(project("beta"));
        config.save(&fs).unwrap();

        let loaded = CliConfig::load(&fs).unwrap();
        assert_eq!(loaded.projects.len(), 2);
        assert_eq!(loaded.default_project.as_deref(), Some("alpha"));
        assert_eq!(loaded.default_project().unwrap().name, "alpha");
    }

    #[test]
    fn test_upsert_replaces_by_name() {
        let mut config = CliConfig::default();
        config.upsert_project(project("alpha"));

        let mut updated = project("alpha");
        updated.api_key = "rotated".to_string();
        config.upsert_project(updated);

        assert_eq!(config.projects.len(), 1);
        assert_eq!(config.projects[0].api_key, "rotated");
    }
}

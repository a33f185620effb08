use crate::config::{ENV_API_KEY, ENV_API_SECRET, ENV_URL, ProjectConfig};
use crate::traits::FileSystem;
use anyhow::{Context as AnyhowContext, Result};
use std::path::Path;

pub const DOTENV_FILE: &str = ".env";

/// An ordered set of environment variables. Insertion order is write order;
/// re-inserting a key overwrites its value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvSet {
    entries: Vec<(String, String)>,
}

impl EnvSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: &str, value: &str) {
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| k == key) {
            entry.1 = value.to_string();
        } else {
            self.entries.push((key.to_string(), value.to_string()));
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Render as dotenv lines
    fn to_dotenv(&self) -> String {
        let mut content = String::new();
        for (key, value) in self.iter() {
            content.push_str(key);
            content.push('=');
            content.push_str(value);
            content.push('\n');
        }
        content
    }

    /// Parse dotenv lines; comments and blanks are skipped
    fn parse(content: &str) -> Self {
        let mut set = Self::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                set.set(key.trim(), value.trim());
            }
        }
        set
    }
}

/// Seed the environment a new app needs from the active project, then
/// overlay caller extras (extras win on conflict).
pub fn build_env(project: &ProjectConfig, extras: &[(String, String)]) -> EnvSet {
    let mut env = EnvSet::new();
    env.set(ENV_URL, &project.url);
    env.set(ENV_API_KEY, &project.api_key);
    env.set(ENV_API_SECRET, &project.api_secret);
    for (key, value) in extras {
        env.set(key, value);
    }
    env
}

/// Merge `env` with any existing dotenv file at `root` and persist it.
///
/// Keys whose prior value differs from the incoming one go through
/// `prompt`; an empty answer keeps the prior value. Keys only present in
/// the prior file are preserved after the incoming ones. The file is left
/// untouched when the merged content is byte-identical.
pub fn instantiate_dotenv(
    fs: &dyn FileSystem,
    root: &Path,
    env: &EnvSet,
    prompt: &dyn Fn(&str, &str) -> Result<String>,
) -> Result<()> {
    let dotenv_path = root.join(DOTENV_FILE);

    let prior = if fs.exists(&dotenv_path) {
        let content = fs
            .read_to_string(&dotenv_path)
            .with_context(|| format!("Failed to read {}", dotenv_path.display()))?;
        Some(EnvSet::parse(&content))
    } else {
        None
    };

    let mut merged = EnvSet::new();
    for (key, value) in env.iter() {
        let resolved = match prior.as_ref().and_then(|p| p.get(key)) {
            Some(prior_value) if prior_value != value => {
                let answer = prompt(key, prior_value)?;
                if answer.is_empty() {
                    prior_value.to_string()
                } else {
                    answer
                }
            }
            _ => value.to_string(),
        };
        merged.set(key, &resolved);
    }

    if let Some(prior) = &prior {
        for (key, value) in prior.iter() {
            if merged.get(key).is_none() {
                merged.set(key, value);
            }
        }
    }

    let content = merged.to_dotenv();
    if fs.exists(&dotenv_path) {
        let current = fs.read_to_string(&dotenv_path)?;
        if current == content {
            return Ok(());
        }
    }

    fs.write(&dotenv_path, &content)
        .with_context(|| format!("Failed to write {}", dotenv_path.display()))
}

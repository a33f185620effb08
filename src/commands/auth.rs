use crate::config::{CliConfig, ProjectConfig};
use crate::context::Context;
use anyhow::{Context as AnyhowContext, Result, bail};
use url::Url;

/// Handles the 'auth' command - collects and persists project credentials
pub struct AuthCommand;

impl AuthCommand {
    pub fn execute(ctx: &Context) -> Result<ProjectConfig> {
        ctx.output.section("Authenticate Project");
        ctx.output
            .dimmed("Credentials are stored locally and used to bootstrap new apps.");

        let name = Self::required(ctx.input.text("Project name", Some("default"))?, "project name")?;
        let url = Self::required(ctx.input.text("Project URL (wss://...)", None)?, "project URL")?;
        Url::parse(&url).with_context(|| format!("Invalid project URL: {}", url))?;
        let api_key = Self::required(ctx.input.text("API key", None)?, "API key")?;
        let api_secret = Self::required(ctx.input.text("API secret", None)?, "API secret")?;

        let project = ProjectConfig {
            name,
            url,
            api_key,
            api_secret,
        };

        let mut config = CliConfig::load(&*ctx.fs)?;
        config.upsert_project(project.clone());
        config.save(&*ctx.fs)?;

        ctx.output.success(&format!(
            "Saved project \"{}\" to {}",
            project.name,
            CliConfig::path()?.display()
        ));

        Ok(project)
    }

    fn required(value: String, what: &str) -> Result<String> {
        let value = value.trim().to_string();
        if value.is_empty() {
            bail!("{} is required", what);
        }
        Ok(value)
    }
}

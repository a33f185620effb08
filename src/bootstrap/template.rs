use crate::config::ProjectConfig;
use crate::context::Context;
use anyhow::{Context as AnyhowContext, Result, bail};
use serde::Deserialize;

/// Public index of known application templates
pub const TEMPLATE_INDEX_URL: &str =
    "https://raw.githubusercontent.com/livekit-examples/index/main/templates.yaml";

/// Where the template repositories live, for help text
pub const TEMPLATE_BASE_URL: &str = "https://github.com/livekit-examples";

/// Cloud API endpoint serving sandbox details
pub const DEFAULT_SERVER_URL: &str = "https://cloud-api.livekit.io";

/// A named application skeleton hosted at a cloneable URL
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Template {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub desc: Option<String>,
}

impl Template {
    /// Construct directly from a user-supplied URL, naming it by the last path segment
    pub fn from_url(url: &str) -> Self {
        let name = url
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(url)
            .trim_end_matches(".git")
            .to_string();
        Self {
            name,
            url: url.to_string(),
            desc: None,
        }
    }

    fn display_line(&self) -> String {
        match self.desc.as_deref() {
            Some(desc) if !desc.is_empty() => format!("{} - {}", self.name, desc),
            _ => self.name.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxDetails {
    #[serde(default)]
    pub child_templates: Vec<Template>,
}

/// What the caller asked to instantiate; at most one of name/url may be set
pub struct TemplateRequest<'a> {
    pub template_name: Option<&'a str>,
    pub template_url: Option<&'a str>,
    pub sandbox_id: Option<&'a str>,
    pub server_url: &'a str,
}

/// Fetch the public template catalog
pub fn fetch_templates(ctx: &Context) -> Result<Vec<Template>> {
    let content = ctx.http.get(TEMPLATE_INDEX_URL)?;
    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse template index from: {}", TEMPLATE_INDEX_URL))
}

/// Fetch sandbox details (authenticated); fails when the sandbox has no child templates
pub fn fetch_sandbox_details(
    ctx: &Context,
    project: &ProjectConfig,
    server_url: &str,
    sandbox_id: &str,
) -> Result<SandboxDetails> {
    let url = format!(
        "{}/api/sandbox/details?id={}",
        server_url.trim_end_matches('/'),
        sandbox_id
    );
    let content = ctx
        .http
        .get_authed(&url, &project.api_key, &project.api_secret)?;
    let details: SandboxDetails = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse sandbox details from: {}", url))?;

    if details.child_templates.is_empty() {
        bail!("no child templates found for sandbox: {}", sandbox_id);
    }

    Ok(details)
}

/// Reduce a template request to a single concrete template.
///
/// A direct URL wins without any network call. A named template is matched
/// exactly against the fetched catalog. With nothing specified, the catalog
/// (or the sandbox's child templates) is offered for interactive selection.
pub fn resolve_template(
    ctx: &Context,
    project: &ProjectConfig,
    request: &TemplateRequest,
) -> Result<Template> {
    if request.template_name.is_some() && request.template_url.is_some() {
        bail!("only one of --template or --template-url can be specified");
    }

    if let Some(url) = request.template_url {
        return Ok(Template::from_url(url));
    }

    let options = match request.sandbox_id {
        Some(sandbox_id) => {
            fetch_sandbox_details(ctx, project, request.server_url, sandbox_id)?.child_templates
        }
        None => fetch_templates(ctx)?,
    };

    if let Some(name) = request.template_name {
        return options.into_iter().find(|t| t.name == name).ok_or_else(|| {
            anyhow::anyhow!("template not found: {} (see {})", name, TEMPLATE_BASE_URL)
        });
    }

    let display: Vec<String> = options.iter().map(|t| t.display_line()).collect();
    let selected = ctx
        .input
        .select("Select a template", display.clone())
        .context("Failed to select template")?;
    let index = display
        .iter()
        .position(|line| line == &selected)
        .context("Template not found")?;

    Ok(options.into_iter().nth(index).unwrap())
}

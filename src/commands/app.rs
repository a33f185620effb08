use crate::bootstrap::clone::clone_template;
use crate::bootstrap::env::{build_env, instantiate_dotenv};
use crate::bootstrap::taskfile::{KnownTask, parse_taskfile, run_task};
use crate::bootstrap::template::{Template, TemplateRequest, resolve_template};
use crate::commands::auth::AuthCommand;
use crate::config::{CliConfig, ENV_SANDBOX_ID, ProjectConfig};
use crate::context::Context;
use anyhow::{Context as AnyhowContext, Result, bail};
use lazy_static::lazy_static;
use regex::Regex;
use std::path::{Path, PathBuf};

lazy_static! {
    static ref APP_NAME_REGEX: Regex = Regex::new("^[a-zA-Z_][a-zA-Z0-9_-]*$").unwrap();
}

const MIN_APP_NAME_LEN: usize = 3;

/// How the invocation identified the active project, before falling back
/// to the config file
pub struct ProjectSelector<'a> {
    pub url: Option<&'a str>,
    pub api_key: Option<&'a str>,
    pub api_secret: Option<&'a str>,
    pub project_name: Option<&'a str>,
}

/// Resolve the active project: explicit credentials win, then a named or
/// default config entry, then interactive selection. With nothing
/// configured, offer the auth detour and retry exactly once.
pub fn require_project(ctx: &Context, selector: &ProjectSelector) -> Result<ProjectConfig> {
    if let (Some(url), Some(api_key), Some(api_secret)) =
        (selector.url, selector.api_key, selector.api_secret)
    {
        return Ok(ProjectConfig {
            name: "command-line".to_string(),
            url: url.to_string(),
            api_key: api_key.to_string(),
            api_secret: api_secret.to_string(),
        });
    }

    for attempt in 0..2 {
        let config = CliConfig::load(&*ctx.fs)?;

        if let Some(name) = selector.project_name {
            return config
                .projects
                .iter()
                .find(|p| p.name == name)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("project not found in config: {}", name));
        }

        if let Some(project) = config.default_project() {
            return Ok(project.clone());
        }

        if !config.projects.is_empty() {
            let options: Vec<String> = config
                .projects
                .iter()
                .map(|p| format!("{} [{}]", p.name, p.api_key))
                .collect();
            let selected = ctx
                .input
                .select("Select a project to use for this app", options.clone())
                .context("Failed to select project")?;
            let index = options
                .iter()
                .position(|o| o == &selected)
                .context("Project not found")?;
            return Ok(config.projects[index].clone());
        }

        if attempt == 0 {
            let should_auth = ctx
                .input
                .confirm("No local projects found. Authenticate one now?", true)?;
            if !should_auth {
                bail!("no project selected");
            }
            AuthCommand::execute(ctx)?;
        }
    }

    bail!("no project configured")
}

pub struct CreateOptions<'a> {
    pub app_name: Option<&'a str>,
    pub template_name: Option<&'a str>,
    pub template_url: Option<&'a str>,
    pub sandbox_id: Option<&'a str>,
    pub server_url: &'a str,
    pub install: bool,
}

/// Handles the 'app create' command - bootstraps an application from a template
pub struct CreateCommand;

impl CreateCommand {
    /// Execute the create command end to end. Once the application
    /// directory exists it is never rolled back; later failures surface
    /// with the directory left in place.
    pub fn execute(ctx: &Context, project: &ProjectConfig, options: &CreateOptions) -> Result<()> {
        let template = Self::resolve(ctx, project, options)?;
        let app_name = Self::resolve_app_name(ctx, options.app_name, options.sandbox_id)?;

        ctx.output.section("Create App");
        ctx.output.key_value("Project", &project.name);
        ctx.output.key_value_highlight("Template", &template.name);
        ctx.output.key_value("Name", &app_name);
        ctx.output.blank();

        ctx.output.info("Cloning template...");
        clone_template(ctx, &template.url, &app_name)?;

        ctx.output.info("Instantiating environment...");
        let root = PathBuf::from(&app_name);
        let mut extras = Vec::new();
        if let Some(sandbox_id) = options.sandbox_id {
            extras.push((ENV_SANDBOX_ID.to_string(), sandbox_id.to_string()));
        }
        instantiate_env(ctx, project, &root, &extras)?;

        if options.install {
            let taskfile = parse_taskfile(ctx, &root)?;
            ctx.output.info("Installing...");
            run_task(ctx, &taskfile, &root, KnownTask::Install.as_str())?;
        } else {
            Self::post_create(ctx, &root)?;
        }

        ctx.output.blank();
        ctx.output
            .success(&format!("App created in ./{}", app_name));
        ctx.output
            .dimmed(&format!("  cd {} && lk app install", app_name));
        Ok(())
    }

    fn resolve(
        ctx: &Context,
        project: &ProjectConfig,
        options: &CreateOptions,
    ) -> Result<Template> {
        resolve_template(
            ctx,
            project,
            &TemplateRequest {
                template_name: options.template_name,
                template_url: options.template_url,
                sandbox_id: options.sandbox_id,
                server_url: options.server_url,
            },
        )
    }

    /// Settle the application directory name. An explicit argument only
    /// has to match the identifier pattern and be unused; the interactive
    /// prompt additionally enforces a minimum length and re-asks until
    /// the name passes.
    fn resolve_app_name(
        ctx: &Context,
        app_name: Option<&str>,
        sandbox_id: Option<&str>,
    ) -> Result<String> {
        if let Some(name) = app_name {
            if !APP_NAME_REGEX.is_match(name) {
                bail!("invalid app name: {}", name);
            }
            if ctx.fs.exists(Path::new(name)) {
                bail!("that name is in use: {}", name);
            }
            return Ok(name.to_string());
        }

        let default = sandbox_id.filter(|id| !id.is_empty());
        loop {
            let name = ctx
                .input
                .text("Application Name", default.or(Some("my-app")))?;
            match Self::validate_prompted_name(ctx, &name) {
                Ok(()) => return Ok(name),
                Err(err) => ctx.output.warning(&err.to_string()),
            }
        }
    }

    fn validate_prompted_name(ctx: &Context, name: &str) -> Result<()> {
        if name.len() < MIN_APP_NAME_LEN {
            bail!("name is too short");
        }
        if !APP_NAME_REGEX.is_match(name) {
            bail!("try a simpler name");
        }
        if ctx.fs.exists(Path::new(name)) {
            bail!("that name is in use");
        }
        Ok(())
    }

    /// Run the post-create task when the cloned app defines one; a missing
    /// optional lifecycle task is not an error.
    fn post_create(ctx: &Context, root: &Path) -> Result<()> {
        let taskfile = parse_taskfile(ctx, root)?;
        if taskfile.task(KnownTask::PostCreate.as_str()).is_none() {
            return Ok(());
        }
        ctx.output.info("Cleaning up...");
        run_task(ctx, &taskfile, root, KnownTask::PostCreate.as_str())
    }
}

/// Build the app's environment and reconcile it with any existing dotenv
/// file, prompting per conflicting key (empty answer keeps the old value)
pub(crate) fn instantiate_env(
    ctx: &Context,
    project: &ProjectConfig,
    root: &Path,
    extras: &[(String, String)],
) -> Result<()> {
    let env = build_env(project, extras);
    let prompt = |key: &str, old_value: &str| -> Result<String> {
        ctx.input
            .text(&format!("Enter {}?", key), Some(old_value))
    };
    instantiate_dotenv(&*ctx.fs, root, &env, &prompt)
}

/// Handles the 'app install' command - runs the install task of an app
pub struct InstallCommand;

impl InstallCommand {
    pub fn execute(ctx: &Context, dir: Option<&str>) -> Result<()> {
        let root = PathBuf::from(dir.unwrap_or("."));
        let taskfile = parse_taskfile(ctx, &root)?;
        ctx.output.info("Installing...");
        run_task(ctx, &taskfile, &root, KnownTask::Install.as_str())
    }
}

/// Handles the 'app run' command - runs a named or selected task
pub struct RunCommand;

impl RunCommand {
    pub fn execute(ctx: &Context, task: Option<&str>) -> Result<()> {
        let root = PathBuf::from(".");
        let taskfile = parse_taskfile(ctx, &root)?;

        let name = match task {
            Some(name) => name.to_string(),
            None => ctx
                .input
                .select("Select Task", taskfile.task_names())
                .context("Failed to select task")?,
        };

        ctx.output.info(&format!("Running task {}...", name));
        run_task(ctx, &taskfile, &root, &name)
    }
}

/// Handles the 'app env' command - reconciles ./.env with the active project
pub struct EnvCommand;

impl EnvCommand {
    pub fn execute(ctx: &Context, project: &ProjectConfig) -> Result<()> {
        instantiate_env(ctx, project, Path::new("."), &[])?;
        ctx.output.success("Environment up to date");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootstrap::template::DEFAULT_SERVER_URL;
    use crate::test_helpers::{ContextBuilder, FakeGit, in_temp_dir, test_project};
    use crate::traits::user_input::MockResponse;
    use crate::traits::{
        FileSystem, MockCommandExecutor, MockFileSystem, MockHttpClient, MockOutput, MockUserInput,
        RealFileSystem,
    };
    use std::sync::Arc;

    fn options<'a>(
        app_name: Option<&'a str>,
        template_name: Option<&'a str>,
        template_url: Option<&'a str>,
        sandbox_id: Option<&'a str>,
    ) -> CreateOptions<'a> {
        CreateOptions {
            app_name,
            template_name,
            template_url,
            sandbox_id,
            server_url: DEFAULT_SERVER_URL,
            install: false,
        }
    }

    #[test]
    fn test_create_with_conflicting_flags_changes_nothing() {
        let fs = Arc::new(MockFileSystem::new());
        let command = Arc::new(MockCommandExecutor::new());
        let ctx = ContextBuilder::new()
            .fs(fs.clone())
            .command(command.clone())
            .build();

        let result = CreateCommand::execute(
            &ctx,
            &test_project(),
            &options(Some("myapp"), Some("foo"), Some("https://x"), None),
        );

        let err = format!("{}", result.unwrap_err());
        assert!(err.contains("only one of"));
        assert!(fs.list_files().is_empty());
        assert!(command.get_calls().is_empty());
    }

    #[test]
    fn test_create_with_empty_sandbox_never_clones() {
        let http = MockHttpClient::new()
            .with_response("/api/sandbox/details?id=abc123", r#"{"childTemplates": []}"#);
        let command = Arc::new(MockCommandExecutor::new());
        let ctx = ContextBuilder::new()
            .command(command.clone())
            .http(Arc::new(http))
            .build();

        let result = CreateCommand::execute(
            &ctx,
            &test_project(),
            &options(Some("myapp"), None, None, Some("abc123")),
        );

        let err = format!("{}", result.unwrap_err());
        assert!(err.contains("no child templates found for sandbox: abc123"));
        assert!(command.get_calls().is_empty());
    }

    #[test]
    fn test_create_end_to_end_from_named_template() {
        in_temp_dir(|dir| {
            let http = MockHttpClient::new().with_response(
                "templates.yaml",
                "- name: foo\n  url: https://example.com/foo.git\n",
            );
            let ctx = ContextBuilder::new()
                .fs(Arc::new(RealFileSystem))
                .command(Arc::new(FakeGit::new()))
                .http(Arc::new(http))
                .build();

            CreateCommand::execute(
                &ctx,
                &test_project(),
                &options(Some("myapp"), Some("foo"), None, None),
            )
            .unwrap();

            let app = dir.join("myapp");
            assert!(app.is_dir());
            assert!(!app.join(".git").exists());

            let dotenv = std::fs::read_to_string(app.join(".env")).unwrap();
            assert!(dotenv.contains("LIVEKIT_URL=wss://demo.example.io"));
            assert!(dotenv.contains("LIVEKIT_API_KEY=APIxyz"));
            assert!(dotenv.contains("LIVEKIT_API_SECRET=supersecret"));
            assert!(!dotenv.contains("LIVEKIT_SANDBOX_ID"));
        });
    }

    #[test]
    fn test_create_sandbox_records_sandbox_id_in_env() {
        in_temp_dir(|dir| {
            let http = MockHttpClient::new().with_response(
                "/api/sandbox/details?id=abc123",
                r#"{"childTemplates": [{"name": "child", "url": "https://example.com/child.git"}]}"#,
            );
            let input = MockUserInput::with_responses(vec![
                MockResponse::Select("child".to_string()),
                MockResponse::Text("abc123".to_string()),
            ]);
            let ctx = ContextBuilder::new()
                .fs(Arc::new(RealFileSystem))
                .input(Arc::new(input))
                .command(Arc::new(FakeGit::new()))
                .http(Arc::new(http))
                .build();

            CreateCommand::execute(
                &ctx,
                &test_project(),
                &options(None, None, None, Some("abc123")),
            )
            .unwrap();

            let dotenv = std::fs::read_to_string(dir.join("abc123/.env")).unwrap();
            assert!(dotenv.contains("LIVEKIT_SANDBOX_ID=abc123"));
        });
    }

    #[test]
    fn test_create_failed_post_create_leaves_app_directory() {
        in_temp_dir(|dir| {
            let git = FakeGit::with_taskfile(
                "version: '3'\ntasks:\n  post-create:\n    cmds:\n      - ./setup.sh\n",
            )
            .shell_exit(1);
            let ctx = ContextBuilder::new()
                .fs(Arc::new(RealFileSystem))
                .command(Arc::new(git))
                .build();

            let result = CreateCommand::execute(
                &ctx,
                &test_project(),
                &options(
                    Some("myapp"),
                    None,
                    Some("https://example.com/tpl.git"),
                    None,
                ),
            );

            let err = format!("{}", result.unwrap_err());
            assert!(err.contains("task 'post-create' failed"));
            assert!(dir.join("myapp").is_dir());
            assert!(dir.join("myapp/.env").is_file());
        });
    }

    #[test]
    fn test_create_without_post_create_task_is_silent() {
        in_temp_dir(|_| {
            let ctx = ContextBuilder::new()
                .fs(Arc::new(RealFileSystem))
                .command(Arc::new(FakeGit::new()))
                .build();

            CreateCommand::execute(
                &ctx,
                &test_project(),
                &options(
                    Some("myapp"),
                    None,
                    Some("https://example.com/tpl.git"),
                    None,
                ),
            )
            .unwrap();
        });
    }

    #[test]
    fn test_create_with_install_runs_install_task() {
        in_temp_dir(|_| {
            let git = Arc::new(FakeGit::with_taskfile(
                "version: '3'\ntasks:\n  install:\n    cmds:\n      - npm install\n",
            ));
            let ctx = ContextBuilder::new()
                .fs(Arc::new(RealFileSystem))
                .command(git.clone())
                .build();

            let mut opts = options(
                Some("myapp"),
                None,
                Some("https://example.com/tpl.git"),
                None,
            );
            opts.install = true;
            CreateCommand::execute(&ctx, &test_project(), &opts).unwrap();

            assert!(git.get_calls().contains(&"npm install".to_string()));
        });
    }

    #[test]
    fn test_app_name_argument_must_match_pattern() {
        let ctx = ContextBuilder::new().build();
        let result = CreateCommand::execute(
            &ctx,
            &test_project(),
            &options(
                Some("9bad name"),
                None,
                Some("https://example.com/tpl.git"),
                None,
            ),
        );

        assert!(format!("{}", result.unwrap_err()).contains("invalid app name"));
    }

    #[test]
    fn test_prompted_app_name_rejected_until_valid() {
        let fs = Arc::new(MockFileSystem::new());
        fs.create_dir_all(Path::new("taken")).unwrap();
        let input = MockUserInput::with_responses(vec![
            MockResponse::Text("ab".to_string()),
            MockResponse::Text("taken".to_string()),
            MockResponse::Text("fresh-app".to_string()),
        ]);
        let output = Arc::new(MockOutput::new());
        let ctx = ContextBuilder::new()
            .fs(fs)
            .input(Arc::new(input))
            .output(output.clone())
            .build();

        let name = CreateCommand::resolve_app_name(&ctx, None, None).unwrap();
        assert_eq!(name, "fresh-app");
        assert!(output.contains_text("name is too short"));
        assert!(output.contains_text("that name is in use"));
    }

    #[test]
    fn test_require_project_uses_explicit_credentials() {
        let ctx = ContextBuilder::new().build();
        let project = require_project(
            &ctx,
            &ProjectSelector {
                url: Some("wss://cli.example.io"),
                api_key: Some("k"),
                api_secret: Some("s"),
                project_name: None,
            },
        )
        .unwrap();

        assert_eq!(project.url, "wss://cli.example.io");
        assert_eq!(project.name, "command-line");
    }

    #[test]
    fn test_require_project_selects_among_configured() {
        let fs = Arc::new(MockFileSystem::new());
        let mut config = CliConfig::default();
        config.projects.push(test_project());
        let mut other = test_project();
        other.name = "other".to_string();
        config.projects.push(other);
        config.save(&*fs).unwrap();

        let input = MockUserInput::with_responses(vec![MockResponse::Select(
            "other [APIxyz]".to_string(),
        )]);
        let ctx = ContextBuilder::new().fs(fs).input(Arc::new(input)).build();

        let project = require_project(
            &ctx,
            &ProjectSelector {
                url: None,
                api_key: None,
                api_secret: None,
                project_name: None,
            },
        )
        .unwrap();
        assert_eq!(project.name, "other");
    }

    #[test]
    fn test_require_project_auth_detour_retries_once() {
        let fs = Arc::new(MockFileSystem::new());
        let input = MockUserInput::with_responses(vec![
            MockResponse::Confirm(true),
            MockResponse::Text("demo".to_string()),
            MockResponse::Text("wss://demo.example.io".to_string()),
            MockResponse::Text("APIxyz".to_string()),
            MockResponse::Text("supersecret".to_string()),
        ]);
        let ctx = ContextBuilder::new().fs(fs).input(Arc::new(input)).build();

        let project = require_project(
            &ctx,
            &ProjectSelector {
                url: None,
                api_key: None,
                api_secret: None,
                project_name: None,
            },
        )
        .unwrap();

        assert_eq!(project.name, "demo");
        assert_eq!(project.api_key, "APIxyz");
    }

    #[test]
    fn test_require_project_declined_auth_fails() {
        let fs = Arc::new(MockFileSystem::new());
        let input = MockUserInput::with_responses(vec![MockResponse::Confirm(false)]);
        let ctx = ContextBuilder::new().fs(fs).input(Arc::new(input)).build();

        let result = require_project(
            &ctx,
            &ProjectSelector {
                url: None,
                api_key: None,
                api_secret: None,
                project_name: None,
            },
        );

        assert!(format!("{}", result.unwrap_err()).contains("no project selected"));
    }

    #[test]
    fn test_env_command_reconciles_current_directory() {
        in_temp_dir(|dir| {
            let ctx = ContextBuilder::new().fs(Arc::new(RealFileSystem)).build();
            EnvCommand::execute(&ctx, &test_project()).unwrap();

            let dotenv = std::fs::read_to_string(dir.join(".env")).unwrap();
            assert!(dotenv.contains("LIVEKIT_URL=wss://demo.example.io"));
        });
    }

    #[test]
    fn test_install_command_requires_install_task() {
        let fs = Arc::new(MockFileSystem::new());
        fs.write(Path::new("app/taskfile.yaml"), "version: '3'\n").unwrap();
        let ctx = ContextBuilder::new().fs(fs).build();

        let err = format!("{}", InstallCommand::execute(&ctx, Some("app")).unwrap_err());
        assert!(err.contains("task not found in task file: install"));
    }

    #[test]
    fn test_run_command_offers_selection_when_no_task_given() {
        in_temp_dir(|_| {
            std::fs::write(
                "taskfile.yaml",
                "version: '3'\ntasks:\n  dev:\n    cmds:\n      - echo dev\n",
            )
            .unwrap();

            let command = Arc::new(MockCommandExecutor::new());
            let input =
                MockUserInput::with_responses(vec![MockResponse::Select("dev".to_string())]);
            let ctx = ContextBuilder::new()
                .fs(Arc::new(RealFileSystem))
                .input(Arc::new(input))
                .command(command.clone())
                .build();

            RunCommand::execute(&ctx, None).unwrap();
            assert_eq!(command.get_calls(), vec!["echo dev"]);
        });
    }
}

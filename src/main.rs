mod bootstrap;
mod commands;
mod config;
mod context;
mod dispatch;
mod output;
mod test_helpers;
mod traits;

use anyhow::Result;
use bootstrap::template::DEFAULT_SERVER_URL;
use clap::{Args, Parser, Subcommand};
use commands::app::{CreateOptions, ProjectSelector, require_project};
use commands::{AuthCommand, CreateCommand, DispatchCommand, EnvCommand, InstallCommand, RunCommand};
use config::{ENV_API_KEY, ENV_API_SECRET, ENV_URL};
use context::Context;

#[derive(Parser)]
#[command(name = "lk")]
#[command(about = "Bootstrap realtime agent apps from templates and manage agent dispatches", long_about = None)]
#[command(version)]
struct Cli {
    /// Surface captured process output even on success
    #[arg(long, global = true)]
    verbose: bool,

    #[command(flatten)]
    project: ProjectArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ProjectArgs {
    /// Project URL to use instead of the configured project
    #[arg(long, global = true, env = ENV_URL)]
    url: Option<String>,

    /// API key to use instead of the configured project
    #[arg(long, global = true, env = ENV_API_KEY, hide_env_values = true)]
    api_key: Option<String>,

    /// API secret to use instead of the configured project
    #[arg(long, global = true, env = ENV_API_SECRET, hide_env_values = true)]
    api_secret: Option<String>,

    /// Name of a configured project to use
    #[arg(long, global = true)]
    project: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Bootstrap and manage template-based apps
    App {
        #[command(subcommand)]
        command: AppCommands,
    },

    /// Store project credentials for bootstrapping apps
    Auth,

    /// Create, list, and delete agent dispatches
    Dispatch {
        #[command(subcommand)]
        command: DispatchCommands,
    },
}

#[derive(Subcommand)]
enum AppCommands {
    /// Bootstrap a new application from a template or through guided creation
    Create {
        /// Name for the new application directory
        app_name: Option<String>,

        /// Template to instantiate, see <https://github.com/livekit-examples>
        #[arg(long)]
        template: Option<String>,

        /// URL to instantiate, must contain a taskfile.yaml
        #[arg(long)]
        template_url: Option<String>,

        /// Sandbox to instantiate, see your cloud dashboard
        #[arg(long)]
        sandbox: Option<String>,

        #[arg(long, default_value = DEFAULT_SERVER_URL, hide = true)]
        server_url: String,

        /// Run installation tasks after creating the app
        #[arg(long)]
        install: bool,
    },

    /// Execute the install task defined in an app's taskfile.yaml
    Install {
        /// Location of the project directory (default: current directory)
        dir: Option<String>,
    },

    /// Execute a task defined in the current directory's taskfile.yaml
    Run {
        /// Task to run
        task: Option<String>,
    },

    /// Reconcile the .env in the current directory with the active project
    Env,
}

#[derive(Subcommand)]
enum DispatchCommands {
    /// List all agent dispatches in a room
    List {
        room: String,
        #[arg(long)]
        json: bool,
    },

    /// Get an agent dispatch by room and ID
    Get {
        room: String,
        id: String,
        #[arg(long)]
        json: bool,
    },

    /// Create an agent dispatch
    Create {
        /// Room name
        #[arg(long)]
        room: Option<String>,

        /// Generate a unique room name
        #[arg(long)]
        new_room: bool,

        /// Agent to dispatch
        #[arg(long)]
        agent_name: Option<String>,

        /// Metadata to send to the agent
        #[arg(long)]
        metadata: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// Delete an agent dispatch
    Delete {
        room: String,
        id: String,
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let ctx = Context::new(cli.verbose);
    let selector = ProjectSelector {
        url: cli.project.url.as_deref(),
        api_key: cli.project.api_key.as_deref(),
        api_secret: cli.project.api_secret.as_deref(),
        project_name: cli.project.project.as_deref(),
    };

    match cli.command {
        Commands::App { command } => match command {
            AppCommands::Create {
                app_name,
                template,
                template_url,
                sandbox,
                server_url,
                install,
            } => {
                let project = require_project(&ctx, &selector)?;
                CreateCommand::execute(
                    &ctx,
                    &project,
                    &CreateOptions {
                        app_name: app_name.as_deref(),
                        template_name: template.as_deref(),
                        template_url: template_url.as_deref(),
                        sandbox_id: sandbox.as_deref(),
                        server_url: &server_url,
                        install,
                    },
                )
            }
            AppCommands::Install { dir } => InstallCommand::execute(&ctx, dir.as_deref()),
            AppCommands::Run { task } => RunCommand::execute(&ctx, task.as_deref()),
            AppCommands::Env => {
                let project = require_project(&ctx, &selector)?;
                EnvCommand::execute(&ctx, &project)
            }
        },
        Commands::Auth => AuthCommand::execute(&ctx).map(|_| ()),
        Commands::Dispatch { command } => {
            let project = require_project(&ctx, &selector)?;
            match command {
                DispatchCommands::List { room, json } => {
                    DispatchCommand::list(&ctx, &project, &room, json)
                }
                DispatchCommands::Get { room, id, json } => {
                    DispatchCommand::get(&ctx, &project, &room, &id, json)
                }
                DispatchCommands::Create {
                    room,
                    new_room,
                    agent_name,
                    metadata,
                    json,
                } => DispatchCommand::create(
                    &ctx,
                    &project,
                    room.as_deref(),
                    new_room,
                    agent_name.as_deref(),
                    metadata.as_deref(),
                    json,
                ),
                DispatchCommands::Delete { room, id, json } => {
                    DispatchCommand::delete(&ctx, &project, &room, &id, json)
                }
            }
        }
    }
}

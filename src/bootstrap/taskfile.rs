use crate::context::Context;
use anyhow::{Context as AnyhowContext, Result, bail};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Recognized task file names at an application root
pub const TASKFILE_NAMES: [&str; 2] = ["taskfile.yaml", "Taskfile.yaml"];

/// Task names invoked automatically by the bootstrap flow
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KnownTask {
    Install,
    PostCreate,
}

impl KnownTask {
    pub fn as_str(&self) -> &'static str {
        match self {
            KnownTask::Install => "install",
            KnownTask::PostCreate => "post-create",
        }
    }
}

/// A declarative task file enumerating named, runnable tasks
#[derive(Debug, Deserialize)]
pub struct TaskFile {
    #[serde(default)]
    pub tasks: BTreeMap<String, Task>,
}

#[derive(Debug, Deserialize)]
pub struct Task {
    #[serde(default)]
    pub desc: Option<String>,
    #[serde(default)]
    pub cmds: Vec<String>,
}

impl TaskFile {
    pub fn task_names(&self) -> Vec<String> {
        self.tasks.keys().cloned().collect()
    }

    pub fn task(&self, name: &str) -> Option<&Task> {
        self.tasks.get(name)
    }
}

/// Locate and parse the task file at `root`; absence is a configuration error
pub fn parse_taskfile(ctx: &Context, root: &Path) -> Result<TaskFile> {
    for name in TASKFILE_NAMES {
        let path = root.join(name);
        if ctx.fs.exists(&path) {
            let content = ctx.fs.read_to_string(&path)?;
            return serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse task file: {}", path.display()));
        }
    }
    bail!(
        "no {} found in: {}",
        TASKFILE_NAMES[0],
        root.display()
    )
}

/// Run the named task's commands sequentially from `root`.
///
/// Stops at the first failing command; its captured output rides along on
/// the error. Execution is never retried.
pub fn run_task(ctx: &Context, taskfile: &TaskFile, root: &Path, name: &str) -> Result<()> {
    let task = taskfile
        .task(name)
        .ok_or_else(|| anyhow::anyhow!("task not found in task file: {}", name))?;

    for cmd in &task.cmds {
        let output = ctx
            .command
            .execute_shell(cmd, root)
            .with_context(|| format!("Failed to execute task command: {}", cmd))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() && ctx.verbose {
            ctx.output.dimmed(stdout.trim());
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("task '{}' failed: {}\n{}", name, cmd, stderr.trim());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::ContextBuilder;
    use crate::traits::command::{MockCommandExecutor, MockCommandResult};
    use crate::traits::FileSystem;
    use crate::traits::MockFileSystem;
    use std::path::PathBuf;
    use std::sync::Arc;

    const TASKFILE: &str = r#"
version: "3"
tasks:
  install:
    desc: Install dependencies
    cmds:
      - npm install
  post-create:
    cmds:
      - rm -rf scratch
  dev:
    cmds:
      - npm run dev
"#;

    fn context_with_taskfile(command: Arc<MockCommandExecutor>) -> Context {
        let fs = Arc::new(MockFileSystem::new());
        fs.write(&PathBuf::from("app/taskfile.yaml"), TASKFILE).unwrap();
        ContextBuilder::new().fs(fs).command(command).build()
    }

    #[test]
    fn test_parse_lists_tasks_in_stable_order() {
        let ctx = context_with_taskfile(Arc::new(MockCommandExecutor::new()));
        let taskfile = parse_taskfile(&ctx, &PathBuf::from("app")).unwrap();

        assert_eq!(taskfile.task_names(), vec!["dev", "install", "post-create"]);
        assert_eq!(
            taskfile.task("install").unwrap().desc.as_deref(),
            Some("Install dependencies")
        );
    }

    #[test]
    fn test_missing_taskfile_is_a_configuration_error() {
        let ctx = ContextBuilder::new().build();
        let err = format!("{}", parse_taskfile(&ctx, &PathBuf::from("app")).unwrap_err());
        assert!(err.contains("no taskfile.yaml found"));
    }

    #[test]
    fn test_capitalized_taskfile_is_recognized() {
        let fs = Arc::new(MockFileSystem::new());
        fs.write(&PathBuf::from("app/Taskfile.yaml"), TASKFILE).unwrap();
        let ctx = ContextBuilder::new().fs(fs).build();

        assert!(parse_taskfile(&ctx, &PathBuf::from("app")).is_ok());
    }

    #[test]
    fn test_run_task_executes_commands_in_order() {
        let command = Arc::new(MockCommandExecutor::new());
        let ctx = context_with_taskfile(command.clone());
        let taskfile = parse_taskfile(&ctx, &PathBuf::from("app")).unwrap();

        run_task(&ctx, &taskfile, &PathBuf::from("app"), "install").unwrap();

        assert_eq!(command.get_calls(), vec!["npm install"]);
    }

    #[test]
    fn test_run_task_stops_at_first_failure() {
        let command = Arc::new(MockCommandExecutor::with_outputs(vec![MockCommandResult {
            command: "npm install".to_string(),
            exit_code: 1,
            stdout: String::new(),
            stderr: "ERESOLVE unable to resolve dependency tree".to_string(),
        }]));
        let ctx = context_with_taskfile(command);
        let taskfile = parse_taskfile(&ctx, &PathBuf::from("app")).unwrap();

        let err = format!(
            "{}",
            run_task(&ctx, &taskfile, &PathBuf::from("app"), "install").unwrap_err()
        );
        assert!(err.contains("task 'install' failed"));
        assert!(err.contains("ERESOLVE"));
    }

    #[test]
    fn test_unknown_task_is_an_error() {
        let ctx = context_with_taskfile(Arc::new(MockCommandExecutor::new()));
        let taskfile = parse_taskfile(&ctx, &PathBuf::from("app")).unwrap();

        let err = format!(
            "{}",
            run_task(&ctx, &taskfile, &PathBuf::from("app"), "deploy").unwrap_err()
        );
        assert!(err.contains("task not found in task file: deploy"));
    }
}

//! Shared helpers for tests that exercise the bootstrap flows
//!
//! Tests that drive the staged cloner against the real filesystem change
//! the process working directory; they take the lock below so they never
//! interleave.

#![cfg(test)]

use crate::config::ProjectConfig;
use crate::context::Context;
use crate::traits::{
    CommandExecutor, FileSystem, HttpClient, MockCommandExecutor, MockFileSystem, MockHttpClient,
    MockOutput, MockUserInput, Output, UserInput,
};
use std::path::Path;
use std::sync::{Arc, Mutex};

static CWD_LOCK: Mutex<()> = Mutex::new(());

/// Run `f` inside a fresh temporary directory as the process cwd.
///
/// Serialized across the whole test binary; the previous cwd is restored
/// even when `f` panics (the next holder recovers the poisoned lock).
pub fn in_temp_dir<T>(f: impl FnOnce(&Path) -> T) -> T {
    let _guard = CWD_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let temp = tempfile::TempDir::new().unwrap();
    let old = std::env::current_dir().unwrap();
    std::env::set_current_dir(temp.path()).unwrap();
    let result = f(temp.path());
    std::env::set_current_dir(old).unwrap();
    result
}

/// A project credential set for tests
pub fn test_project() -> ProjectConfig {
    ProjectConfig {
        name: "demo".to_string(),
        url: "wss://demo.example.io".to_string(),
        api_key: "APIxyz".to_string(),
        api_secret: "supersecret".to_string(),
    }
}

/// Builder assembling a test context from individually overridable mocks
pub struct ContextBuilder {
    fs: Arc<dyn FileSystem>,
    input: Arc<dyn UserInput>,
    output: Arc<dyn Output>,
    command: Arc<dyn CommandExecutor>,
    http: Arc<dyn HttpClient>,
}

impl ContextBuilder {
    pub fn new() -> Self {
        Self {
            fs: Arc::new(MockFileSystem::new()),
            input: Arc::new(MockUserInput::new()),
            output: Arc::new(MockOutput::new()),
            command: Arc::new(MockCommandExecutor::new()),
            http: Arc::new(MockHttpClient::new()),
        }
    }

    pub fn fs(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = fs;
        self
    }

    pub fn input(mut self, input: Arc<dyn UserInput>) -> Self {
        self.input = input;
        self
    }

    pub fn output(mut self, output: Arc<dyn Output>) -> Self {
        self.output = output;
        self
    }

    pub fn command(mut self, command: Arc<dyn CommandExecutor>) -> Self {
        self.command = command;
        self
    }

    pub fn http(mut self, http: Arc<dyn HttpClient>) -> Self {
        self.http = http;
        self
    }

    pub fn build(self) -> Context {
        Context::test_with(self.fs, self.input, self.output, self.command, self.http)
    }
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub fn exit_status(code: i32) -> std::process::ExitStatus {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        std::process::ExitStatus::from_raw(code << 8)
    }

    #[cfg(windows)]
    {
        use std::os::windows::process::ExitStatusExt;
        std::process::ExitStatus::from_raw(code as u32)
    }
}

/// Command executor that imitates git by materializing a cloned tree on the
/// real filesystem, and replays a fixed exit code for shell commands.
pub struct FakeGit {
    pub fail_clone: bool,
    pub shell_exit: i32,
    /// Content written as the clone's taskfile.yaml, when set
    pub taskfile: Option<String>,
    calls: Mutex<Vec<String>>,
}

impl FakeGit {
    pub fn new() -> Self {
        Self {
            fail_clone: false,
            shell_exit: 0,
            taskfile: Some("version: '3'\n".to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_clone() -> Self {
        Self {
            fail_clone: true,
            ..Self::new()
        }
    }

    pub fn with_taskfile(taskfile: &str) -> Self {
        Self {
            taskfile: Some(taskfile.to_string()),
            ..Self::new()
        }
    }

    /// Make every shell command replay this exit code
    pub fn shell_exit(mut self, code: i32) -> Self {
        self.shell_exit = code;
        self
    }

    pub fn get_calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Default for FakeGit {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandExecutor for FakeGit {
    fn execute(
        &self,
        command: &str,
        args: &[&str],
        _working_dir: &Path,
    ) -> anyhow::Result<std::process::Output> {
        assert_eq!(command, "git");
        if args == ["--version"] {
            return Ok(std::process::Output {
                status: exit_status(0),
                stdout: b"git version 2.43.0".to_vec(),
                stderr: Vec::new(),
            });
        }

        self.calls
            .lock()
            .unwrap()
            .push(format!("git {}", args.join(" ")));

        assert_eq!(&args[..2], &["clone", "--depth=1"]);
        if self.fail_clone {
            return Ok(std::process::Output {
                status: exit_status(128),
                stdout: Vec::new(),
                stderr: b"fatal: repository not found".to_vec(),
            });
        }

        let dest = Path::new(args[3]);
        std::fs::create_dir_all(dest.join(".git")).unwrap();
        std::fs::write(dest.join(".git/HEAD"), "ref: refs/heads/main").unwrap();
        std::fs::write(dest.join("README.md"), "# template\n").unwrap();
        if let Some(taskfile) = &self.taskfile {
            std::fs::write(dest.join("taskfile.yaml"), taskfile).unwrap();
        }
        Ok(std::process::Output {
            status: exit_status(0),
            stdout: b"Cloning into ...".to_vec(),
            stderr: Vec::new(),
        })
    }

    fn execute_shell(
        &self,
        command: &str,
        _working_dir: &Path,
    ) -> anyhow::Result<std::process::Output> {
        self.calls.lock().unwrap().push(command.to_string());
        let stderr = if self.shell_exit == 0 {
            Vec::new()
        } else {
            b"task command failed".to_vec()
        };
        Ok(std::process::Output {
            status: exit_status(self.shell_exit),
            stdout: Vec::new(),
            stderr,
        })
    }
}

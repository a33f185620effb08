use crate::traits::{
    CommandExecutor, FileSystem, HttpClient, InquireUserInput, Output, RealCommandExecutor,
    RealFileSystem, ReqwestClient, TerminalOutput, UserInput,
};
#[cfg(test)]
use crate::traits::{MockCommandExecutor, MockFileSystem, MockHttpClient, MockOutput, MockUserInput};
use std::sync::Arc;

/// Application context that holds all dependencies for dependency injection
pub struct Context {
    pub fs: Arc<dyn FileSystem>,
    pub input: Arc<dyn UserInput>,
    pub output: Arc<dyn Output>,
    pub command: Arc<dyn CommandExecutor>,
    pub http: Arc<dyn HttpClient>,
    /// Surface captured process output even on success
    pub verbose: bool,
}

impl Context {
    /// Create a new context with real implementations (for production use)
    pub fn new(verbose: bool) -> Self {
        Self {
            fs: Arc::new(RealFileSystem),
            input: Arc::new(InquireUserInput),
            output: Arc::new(TerminalOutput),
            command: Arc::new(RealCommandExecutor::new()),
            http: Arc::new(ReqwestClient),
            verbose,
        }
    }

    /// Create a new context with mock implementations (for testing)
    #[cfg(test)]
    #[allow(dead_code)]
    pub fn test() -> Self {
        Self {
            fs: Arc::new(MockFileSystem::new()),
            input: Arc::new(MockUserInput::new()),
            output: Arc::new(MockOutput::new()),
            command: Arc::new(MockCommandExecutor::new()),
            http: Arc::new(MockHttpClient::new()),
            verbose: false,
        }
    }

    /// Create a test context with specific mock implementations
    #[cfg(test)]
    #[allow(dead_code)]
    pub fn test_with(
        fs: Arc<dyn FileSystem>,
        input: Arc<dyn UserInput>,
        output: Arc<dyn Output>,
        command: Arc<dyn CommandExecutor>,
        http: Arc<dyn HttpClient>,
    ) -> Self {
        Self {
            fs,
            input,
            output,
            command,
            http,
            verbose: false,
        }
    }
}

impl Clone for Context {
    fn clone(&self) -> Self {
        Self {
            fs: Arc::clone(&self.fs),
            input: Arc::clone(&self.input),
            output: Arc::clone(&self.output),
            command: Arc::clone(&self.command),
            http: Arc::clone(&self.http),
            verbose: self.verbose,
        }
    }
}

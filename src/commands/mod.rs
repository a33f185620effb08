pub mod app;
pub mod auth;
pub mod dispatch;

pub use app::{CreateCommand, EnvCommand, InstallCommand, RunCommand};
pub use auth::AuthCommand;
pub use dispatch::DispatchCommand;

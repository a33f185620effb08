use crate::context::Context;
use crate::traits::FileSystem;
use anyhow::{Context as AnyhowContext, Result, bail};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const MAX_STAGING_CANDIDATES: u32 = 100;

/// A disposable clone target, removed on drop no matter how the clone went.
///
/// The directory is only ever observed at its final name after a successful
/// promotion; drop after promote is a no-op because the path is gone.
pub struct StagingDir {
    fs: Arc<dyn FileSystem>,
    path: PathBuf,
}

impl StagingDir {
    /// Allocate an unused staging path next to the intended final name
    pub fn allocate(fs: Arc<dyn FileSystem>, final_name: &str) -> Result<Self> {
        for attempt in 0..MAX_STAGING_CANDIDATES {
            let candidate = if attempt == 0 {
                PathBuf::from(format!(".{}.staging", final_name))
            } else {
                PathBuf::from(format!(".{}.staging-{}", final_name, attempt))
            };
            if !fs.exists(&candidate) {
                return Ok(Self {
                    fs,
                    path: candidate,
                });
            }
        }
        bail!("could not allocate a staging directory for: {}", final_name)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Move the staged content to its final name; the destination must not exist
    pub fn promote(&self, final_path: &Path) -> Result<()> {
        if self.fs.exists(final_path) {
            bail!("destination already exists: {}", final_path.display());
        }
        self.fs.rename(&self.path, final_path).with_context(|| {
            format!("Failed to move staged clone to: {}", final_path.display())
        })
    }
}

impl Drop for StagingDir {
    fn drop(&mut self) {
        if self.fs.exists(&self.path) {
            let _ = self.fs.remove_dir_all(&self.path);
        }
    }
}

/// Shallow-clone `url` into a staging directory and promote it to `app_name`.
///
/// The final directory exists in a complete state if and only if this
/// returns Ok; on any failure the staging directory is removed and the
/// final name is untouched.
pub fn clone_template(ctx: &Context, url: &str, app_name: &str) -> Result<()> {
    let final_path = PathBuf::from(app_name);
    if ctx.fs.exists(&final_path) {
        bail!("destination already exists: {}", app_name);
    }

    if !is_git_available(ctx) {
        bail!(
            "Git is not installed or not available in PATH.\n\
             Please install git to create apps from templates."
        );
    }

    let staging = StagingDir::allocate(Arc::clone(&ctx.fs), app_name)?;
    let staging_path = staging.path().to_string_lossy().to_string();

    let output = ctx
        .command
        .execute(
            "git",
            &["clone", "--depth=1", url, &staging_path],
            Path::new("."),
        )
        .context("Failed to execute git clone")?;

    // Strip VCS metadata before looking at the clone result; a partially
    // cloned tree must not keep its .git either.
    let _ = ctx.fs.remove_dir_all(&staging.path().join(".git"));

    let mut combined = String::from_utf8_lossy(&output.stdout).to_string();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    let combined = combined.trim();
    if !combined.is_empty() && (!output.status.success() || ctx.verbose) {
        ctx.output.dimmed(combined);
    }

    if !output.status.success() {
        bail!(
            "Failed to clone template: {}\n\
             Please check the template URL.",
            url
        );
    }

    staging.promote(&final_path)
}

fn is_git_available(ctx: &Context) -> bool {
    ctx.command
        .execute("git", &["--version"], Path::new("."))
        .map(|output| output.status.success())
        .unwrap_or(false)
}

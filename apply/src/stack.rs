use std::path::Path;

use kmt_ctx::Paths;
use tracing::{debug, info};

use crate::ApplyError;

/// Appended to every stack name.
pub const STACK_SUFFIX: &str = "-kmt";

/// Name of the branch checked out in the repository at `repo_dir`, with `/` replaced by `-`.
pub async fn active_branch(repo_dir: &Path) -> Result<String, ApplyError> {
    let head_path = repo_dir.join(".git").join("HEAD");
    let head = tokio::fs::read_to_string(&head_path)
        .await
        .map_err(|source| ApplyError::ReadFile {
            path: head_path.clone(),
            source,
        })?;
    branch_from_head(&head).ok_or(ApplyError::DetachedHead { path: head_path })
}

fn branch_from_head(head: &str) -> Option<String> {
    let branch = head
        .trim()
        .strip_prefix("ref:")?
        .trim()
        .strip_prefix("refs/heads/")?;
    if branch.is_empty() {
        return None;
    }
    Some(branch.replace('/', "-"))
}

pub fn stack_name(name: &str) -> String {
    if name.ends_with(STACK_SUFFIX) {
        name.to_owned()
    } else {
        format!("{name}{STACK_SUFFIX}")
    }
}

/// Resolves the stack to operate on, falling back to the active branch of `repo_dir`.
pub async fn check_and_get_stack(
    stack: Option<String>,
    repo_dir: &Path,
) -> Result<String, ApplyError> {
    let name = match stack {
        Some(stack) => stack,
        None => {
            let branch = active_branch(repo_dir).await?;
            debug!(branch = %branch, "no stack given, using active branch");
            branch
        }
    };
    Ok(stack_name(&name))
}

pub async fn stack_exists(paths: &Paths, stack: &str) -> bool {
    tokio::fs::try_exists(paths.stack_dir(stack))
        .await
        .unwrap_or(false)
}

pub async fn create_stack(paths: &Paths, stack: &str) -> Result<(), ApplyError> {
    let dir = paths.stack_dir(stack);
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|source| ApplyError::CreateStack {
            path: dir.clone(),
            source,
        })?;
    info!(stack = %stack, "created stack");
    Ok(())
}

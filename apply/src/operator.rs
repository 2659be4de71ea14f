use std::path::Path;

use async_trait::async_trait;
use comfy_table::Table;
use kmt_cmd::Command;
use kmt_vmconfig::ConfigChange;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::warn;

use crate::ApplyError;

/// A pending rewrite of a stack's configuration, as shown to the operator.
#[derive(Debug)]
pub struct Review<'a> {
    pub stack: &'a str,
    /// File the proposal is compared against.
    pub current: &'a Path,
    /// Temporary file holding the proposed document.
    pub proposed: &'a Path,
    pub changes: &'a [ConfigChange],
}

/// Whoever decides whether a proposed configuration gets written.
#[async_trait]
pub trait Operator: Send {
    async fn review(&mut self, review: &Review<'_>) -> Result<(), ApplyError>;

    async fn confirm(&mut self, question: &str) -> Result<bool, ApplyError>;
}

/// Interactive operator on the controlling terminal.
#[derive(Debug, Default)]
pub struct TerminalOperator;

#[async_trait]
impl Operator for TerminalOperator {
    async fn review(&mut self, review: &Review<'_>) -> Result<(), ApplyError> {
        println!("{}", changes_table(review.changes));

        match which::which("git") {
            Ok(git) => {
                Command::new(git)
                    .args(["--no-pager", "diff", "--no-index"])
                    .arg(review.current)
                    .arg(review.proposed)
                    .stdout(true)
                    .run_allowing(&[1])
                    .await?;
            }
            Err(err) => warn!("git not found, skipping textual diff: {err}"),
        }
        Ok(())
    }

    async fn confirm(&mut self, question: &str) -> Result<bool, ApplyError> {
        let mut stdout = tokio::io::stdout();
        stdout
            .write_all(format!("{question} (y/n) ").as_bytes())
            .await
            .map_err(ApplyError::Prompt)?;
        stdout.flush().await.map_err(ApplyError::Prompt)?;

        let mut answer = String::new();
        BufReader::new(tokio::io::stdin())
            .read_line(&mut answer)
            .await
            .map_err(ApplyError::Prompt)?;
        Ok(is_affirmative(&answer))
    }
}

fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

pub fn changes_table(changes: &[ConfigChange]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(comfy_table::presets::UTF8_FULL)
        .apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS)
        .set_content_arrangement(comfy_table::ContentArrangement::Dynamic)
        .set_header(vec!["vmset", "change"]);

    for change in changes {
        table.add_row(vec![change.set().to_owned(), change.to_string()]);
    }

    table
}

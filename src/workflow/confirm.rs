//! User confirmation for applying detected roles

use crate::error::CloneError;

/// Answer to a confirmation prompt. There is no per-item selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Accept,
    Decline,
}

/// Asks whether a list of items should be applied
pub trait Confirm {
    fn confirm(&self, prompt: &str, items: &[String]) -> Result<Decision, CloneError>;
}

/// Always accepts; used for `--yes` and non-interactive runs
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoApprove;

impl Confirm for AutoApprove {
    fn confirm(&self, _prompt: &str, _items: &[String]) -> Result<Decision, CloneError> {
        Ok(Decision::Accept)
    }
}

/// Prints the items and blocks on a yes/no answer from the terminal
#[derive(Debug, Clone, Copy, Default)]
pub struct InteractiveConfirm;

impl Confirm for InteractiveConfirm {
    fn confirm(&self, prompt: &str, items: &[String]) -> Result<Decision, CloneError> {
        println!();
        for item in items {
            println!("  {}", item);
        }
        println!();

        let accepted = dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(true)
            .interact()?;

        Ok(if accepted {
            Decision::Accept
        } else {
            Decision::Decline
        })
    }
}

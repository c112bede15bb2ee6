use tracing::info;

use crate::core::error::{UpdaterError, UpdaterResult};

/// Yes/no gate in front of risky apply steps.
pub trait Confirm: Send + Sync {
    fn confirm(&self, prompt: &str) -> UpdaterResult<bool>;
}

/// Unattended runs: every prompt is answered yes.
pub struct AutoConfirm;

impl Confirm for AutoConfirm {
    fn confirm(&self, prompt: &str) -> UpdaterResult<bool> {
        info!("{} [auto-confirmed]", prompt);
        Ok(true)
    }
}

/// Interactive `[y/N]` prompt on the controlling terminal.
pub struct TerminalConfirm {
    assume_yes: bool,
}

impl TerminalConfirm {
    pub fn new(assume_yes: bool) -> Self {
        Self { assume_yes }
    }
}

impl Confirm for TerminalConfirm {
    fn confirm(&self, prompt: &str) -> UpdaterResult<bool> {
        if self.assume_yes {
            return AutoConfirm.confirm(prompt);
        }
        dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
            .map_err(|e| UpdaterError::Prompt(e.to_string()))
    }
}

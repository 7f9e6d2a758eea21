//! Confirm-then-act seam for destructive operations.

use crate::error::OrbitError;

pub trait Confirmation {
    /// Ask the user to approve `prompt`. `Ok(false)` means declined.
    fn confirm(&self, prompt: &str) -> Result<bool, OrbitError>;
}

/// Approves everything.
pub struct AssumeYes;

impl Confirmation for AssumeYes {
    fn confirm(&self, _prompt: &str) -> Result<bool, OrbitError> {
        Ok(true)
    }
}

/// Declines everything.
pub struct AssumeNo;

impl Confirmation for AssumeNo {
    fn confirm(&self, _prompt: &str) -> Result<bool, OrbitError> {
        Ok(false)
    }
}

/// Yes/no prompt on the terminal, defaulting to "no". `assume_yes` (the
/// `--yes` flag) skips the prompt.
pub struct Interactive {
    pub assume_yes: bool,
}

impl Confirmation for Interactive {
    fn confirm(&self, prompt: &str) -> Result<bool, OrbitError> {
        if self.assume_yes {
            return Ok(true);
        }
        match inquire::Confirm::new(prompt).with_default(false).prompt() {
            Err(inquire::InquireError::OperationCanceled) => Ok(false),
            other => other.map_err(map_inquire_err),
        }
    }
}

/// Esc and Ctrl+C become `Cancelled`; anything else is a prompt failure.
pub(crate) fn map_inquire_err(e: inquire::InquireError) -> OrbitError {
    match e {
        inquire::InquireError::OperationCanceled
        | inquire::InquireError::OperationInterrupted => OrbitError::Cancelled,
        other => OrbitError::Prompt {
            message: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assume_yes_never_prompts() {
        let confirm = Interactive { assume_yes: true };
        assert!(confirm.confirm("Delete everything?").unwrap());
    }

    #[test]
    fn cancel_maps_to_cancelled() {
        assert!(matches!(
            map_inquire_err(inquire::InquireError::OperationInterrupted),
            OrbitError::Cancelled
        ));
        assert!(matches!(
            map_inquire_err(inquire::InquireError::NotTTY),
            OrbitError::Prompt { .. }
        ));
    }
}

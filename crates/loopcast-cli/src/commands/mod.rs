//! Command handlers grouped by concern.

pub(crate) mod logs;
pub(crate) mod playlist;
pub(crate) mod session;

use loopcast_api::SourceInput;

use crate::client::{CliError, CliResult};

/// Trim `--source` values into wire inputs, rejecting blanks.
pub(crate) fn source_inputs(raw: &[String]) -> CliResult<Vec<SourceInput>> {
    if raw.is_empty() {
        return Err(CliError::validation("at least one --source is required"));
    }
    raw.iter()
        .map(|value| {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                Err(CliError::validation("--source values cannot be empty"))
            } else {
                Ok(SourceInput::Raw(trimmed.to_string()))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_inputs_trim_and_reject_blanks() {
        let inputs = source_inputs(&[" a.mp4 ".to_string()]).expect("valid source");
        assert_eq!(inputs, vec![SourceInput::Raw("a.mp4".to_string())]);

        let err = source_inputs(&["  ".to_string()]).expect_err("blank source");
        assert_eq!(err.exit_code(), 2);
        let err = source_inputs(&[]).expect_err("no sources");
        assert_eq!(err.exit_code(), 2);
    }
}

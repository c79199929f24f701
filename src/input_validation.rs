//! Submission validation
//!
//! Rejects a [`JobConfig`] before anything touches the disk. Failures here
//! become `ConfigError`s: the submission is refused and no job is created.

use anyhow::{bail, Result};
use std::path::Path;

use crate::job_engine::types::JobConfig;

const MAX_PATH_LENGTH: usize = 4096;
const MAX_TOKENS: usize = 100;
const MAX_TOKEN_LENGTH: usize = 255;

/// Validate a whole submission.
pub fn validate_job_config(config: &JobConfig) -> Result<()> {
    if config.source.as_os_str().is_empty() || config.target.as_os_str().is_empty() {
        bail!("Please select both source and target folders!");
    }

    validate_path_argument(&config.source, "Source")?;
    validate_path_argument(&config.target, "Target")?;

    if config.source == config.target {
        bail!("Source and target must be different folders");
    }

    validate_exclusion_tokens(&config.exclusions)
}

/// Validate exclusion tokens.
///
/// Tokens are plain substrings, not globs, and are passed to the copy tool
/// as separate arguments.
pub fn validate_exclusion_tokens(tokens: &[String]) -> Result<()> {
    let non_empty: Vec<&str> = tokens
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .collect();

    if non_empty.len() > MAX_TOKENS {
        bail!(
            "Too many exclusions: {} (max: {})",
            non_empty.len(),
            MAX_TOKENS
        );
    }

    for token in non_empty {
        if token.chars().count() > MAX_TOKEN_LENGTH {
            let head: String = token.chars().take(20).collect();
            bail!(
                "Exclusion too long: '{}…' ({} chars, max: {})",
                head,
                token.chars().count(),
                MAX_TOKEN_LENGTH
            );
        }

        if token.chars().any(char::is_control) {
            bail!("Exclusion contains control characters");
        }
    }

    Ok(())
}

fn validate_path_argument(path: &Path, label: &str) -> Result<()> {
    let raw = path.to_string_lossy();

    if raw.len() > MAX_PATH_LENGTH {
        bail!("{label} path too long: {} bytes (max: {MAX_PATH_LENGTH})", raw.len());
    }

    if raw.contains('\0') {
        bail!("{label} path contains null byte");
    }

    if raw.contains('\n') || raw.contains('\r') {
        bail!("{label} path contains line breaks");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_source_or_target() {
        let config = JobConfig::new("", "/backup");
        let err = validate_job_config(&config).unwrap_err();
        assert!(err.to_string().contains("source and target"));

        let config = JobConfig::new("/data", "");
        assert!(validate_job_config(&config).is_err());
    }

    #[test]
    fn test_valid_config() {
        let mut config = JobConfig::new("C:\\data", "D:\\backup");
        config.exclusions = vec!["cache".into(), "  ".into(), "Thumbs.db".into()];
        assert!(validate_job_config(&config).is_ok());
    }

    #[test]
    fn test_same_source_and_target() {
        let config = JobConfig::new("/data", "/data");
        assert!(validate_job_config(&config).is_err());
    }

    #[test]
    fn test_null_byte_in_path() {
        let config = JobConfig::new("/da\0ta", "/backup");
        assert!(validate_job_config(&config).is_err());
    }

    #[test]
    fn test_too_many_tokens() {
        let tokens: Vec<String> = (0..101).map(|i| format!("token_{}", i)).collect();
        assert!(validate_exclusion_tokens(&tokens).is_err());
    }

    #[test]
    fn test_empty_tokens_do_not_count() {
        let mut tokens: Vec<String> = (0..100).map(|i| format!("token_{}", i)).collect();
        tokens.extend(["".to_string(), "   ".to_string()]);
        assert!(validate_exclusion_tokens(&tokens).is_ok());
    }

    #[test]
    fn test_token_too_long() {
        let tokens = vec!["x".repeat(256)];
        assert!(validate_exclusion_tokens(&tokens).is_err());
    }

    #[test]
    fn test_token_with_control_characters() {
        let tokens = vec!["bad\ttoken".to_string()];
        assert!(validate_exclusion_tokens(&tokens).is_err());
    }
}

//! Input validation for scan targets and update bodies

use crate::error::{IrisError, Result};
use crate::models::{ScanStatus, ScanUpdate};
use url::Url;

/// Validates a single target address: absolute http(s) URI with a host
pub fn validate_target(target: &str) -> Result<()> {
    let url = Url::parse(target.trim())
        .map_err(|e| IrisError::ValidationError(format!("'{target}' is not a valid URI: {e}")))?;

    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(IrisError::ValidationError(format!(
                "'{target}' uses unsupported scheme '{other}'"
            )))
        }
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(IrisError::ValidationError(format!("'{target}' has no host")));
    }

    Ok(())
}

/// Validates the target list used to create a scan
pub fn validate_targets(targets: &[String]) -> Result<()> {
    if targets.is_empty() {
        return Err(IrisError::ValidationError(
            "At least one target is required".to_string(),
        ));
    }
    targets.iter().try_for_each(|t| validate_target(t))
}

/// Validates an update body: at least one field, targets follow create rules.
/// Only an execution may move a scan to `running`, and new targets always
/// start over as a pending scan.
pub fn validate_update(update: &ScanUpdate) -> Result<()> {
    if update.is_empty() {
        return Err(IrisError::ValidationError(
            "Update must change targets or status".to_string(),
        ));
    }
    if update.status == Some(ScanStatus::Running) {
        return Err(IrisError::ValidationError(
            "Status 'running' is set by execution only".to_string(),
        ));
    }
    if let Some(ref targets) = update.targets {
        validate_targets(targets)?;
        if update.status.is_some_and(|s| s.is_terminal()) {
            return Err(IrisError::ValidationError(
                "Changing targets resets the scan to pending".to_string(),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_http_and_https() {
        assert!(validate_target("https://example.com").is_ok());
        assert!(validate_target("http://localhost:8080/path?q=1").is_ok());
    }

    #[test]
    fn test_rejects_relative_and_garbage() {
        assert!(validate_target("invalid-url").is_err());
        assert!(validate_target("/relative/path").is_err());
        assert!(validate_target("").is_err());
    }

    #[test]
    fn test_rejects_non_web_schemes() {
        assert!(validate_target("ftp://example.com").is_err());
        assert!(validate_target("file:///etc/passwd").is_err());
        assert!(validate_target("javascript:alert(1)").is_err());
    }

    #[test]
    fn test_empty_target_list_rejected() {
        let err = validate_targets(&[]).unwrap_err();
        assert!(err.to_string().contains("At least one target"));
    }

    #[test]
    fn test_one_bad_target_rejects_list() {
        let targets = vec!["https://example.com".to_string(), "nope".to_string()];
        assert!(validate_targets(&targets).is_err());
    }

    #[test]
    fn test_update_rules() {
        assert!(validate_update(&ScanUpdate::default()).is_err());
        assert!(validate_update(&ScanUpdate {
            targets: Some(vec![]),
            status: None,
        })
        .is_err());
        assert!(validate_update(&ScanUpdate {
            targets: None,
            status: Some(ScanStatus::Pending),
        })
        .is_ok());
    }

    #[test]
    fn test_update_cannot_fake_a_run() {
        assert!(validate_update(&ScanUpdate {
            targets: None,
            status: Some(ScanStatus::Running),
        })
        .is_err());
        assert!(validate_update(&ScanUpdate {
            targets: Some(vec!["https://example.com".into()]),
            status: Some(ScanStatus::Completed),
        })
        .is_err());
        assert!(validate_update(&ScanUpdate {
            targets: None,
            status: Some(ScanStatus::Failed),
        })
        .is_ok());
    }
}

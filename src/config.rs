use crate::error::{CovdeltaError, Result};

/// Default percentage-point drop a file may take before it counts as a
/// regression.
pub const DEFAULT_FAIL_DELTA: f64 = 0.2;

pub const DEFAULT_TITLE: &str = "Coverage Report";

/// Settings for one comparison run. Built once by the CLI and passed by
/// reference into every entry point that needs it.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportConfig {
    /// Literal prefix to remove from coverage keys before path alignment.
    pub strip_path_prefix: Option<String>,
    /// Files dropping by this many percentage points or less do not fail.
    pub fail_delta: f64,
    pub title: String,
    /// Extra markdown appended to the rendered report.
    pub custom_message: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            strip_path_prefix: None,
            fail_delta: DEFAULT_FAIL_DELTA,
            title: DEFAULT_TITLE.to_string(),
            custom_message: String::new(),
        }
    }
}

impl ReportConfig {
    /// Validate and normalize. An empty strip prefix counts as none.
    pub fn validated(mut self) -> Result<Self> {
        if !self.fail_delta.is_finite() || self.fail_delta < 0.0 {
            return Err(CovdeltaError::Config(format!(
                "fail delta must be a non-negative number, got {}",
                self.fail_delta
            )));
        }
        if self.strip_path_prefix.as_deref() == Some("") {
            self.strip_path_prefix = None;
        }
        Ok(self)
    }

    #[must_use]
    pub fn strip_path_prefix(&self) -> Option<&str> {
        self.strip_path_prefix.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ReportConfig::default();
        assert_eq!(config.fail_delta, 0.2);
        assert!(config.strip_path_prefix().is_none());
        assert_eq!(config.title, "Coverage Report");
    }

    #[test]
    fn test_empty_strip_prefix_is_none() {
        let config = ReportConfig {
            strip_path_prefix: Some(String::new()),
            ..Default::default()
        }
        .validated()
        .unwrap();
        assert!(config.strip_path_prefix().is_none());
    }

    #[test]
    fn test_negative_fail_delta_rejected() {
        let result = ReportConfig {
            fail_delta: -0.5,
            ..Default::default()
        }
        .validated();
        assert!(matches!(result, Err(CovdeltaError::Config(_))));
    }

    #[test]
    fn test_nan_fail_delta_rejected() {
        let result = ReportConfig {
            fail_delta: f64::NAN,
            ..Default::default()
        }
        .validated();
        assert!(result.is_err());
    }
}

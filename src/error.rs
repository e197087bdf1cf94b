use crate::mcp::McpError;
use crate::rules::RuleError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("No targets found")]
    NoTargets,

    #[error(transparent)]
    Rule(#[from] RuleError),

    #[error("Failed to read rules file: {path}")]
    RulesRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("MCP target {url} failed")]
    Mcp {
        url: String,
        #[source]
        source: McpError,
    },

    #[error("Failed to read {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Scan not found: {0}")]
    ScanNotFound(String),
}

pub type Result<T> = std::result::Result<T, ScanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_targets_display() {
        assert_eq!(ScanError::NoTargets.to_string(), "No targets found");
    }

    #[test]
    fn test_io_display_carries_path() {
        let err = ScanError::Io {
            path: "/p/x".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        };
        assert_eq!(err.to_string(), "Failed to read /p/x");
    }

    #[test]
    fn test_scan_not_found_display() {
        let err = ScanError::ScanNotFound("123-abc".to_string());
        assert!(err.to_string().contains("123-abc"));
    }
}

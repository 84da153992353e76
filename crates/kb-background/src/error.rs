use kb_compiler::CompileError;
use kb_core::EntryError;

/// The external key-value store failed a read or write.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Storage error: {0}")]
pub struct StorageError(pub String);

/// The request-blocking engine rejected a rule set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Rule installation failed: {0}")]
pub struct RuleInstallError(pub String);

/// A tab query or update failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Tab operation failed: {0}")]
pub struct TabError(pub String);

/// Configuration could not be parsed or is inconsistent.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid rule settings: {0}")]
    Compile(#[from] CompileError),
}

#[derive(Debug, thiserror::Error)]
pub enum BlockerError {
    #[error("Keyword already in block list: {0}")]
    DuplicateKeyword(String),
    #[error("Index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },
    #[error(transparent)]
    InvalidEntry(#[from] EntryError),
    #[error("Cannot derive a keyword from URL: {0}")]
    InvalidUrl(String),
    #[error(transparent)]
    Persistence(#[from] StorageError),
    #[error(transparent)]
    RuleInstall(#[from] RuleInstallError),
    #[error(transparent)]
    Tab(#[from] TabError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl BlockerError {
    /// Status line shown to the user by the settings UI.
    pub fn user_message(&self) -> String {
        match self {
            BlockerError::DuplicateKeyword(_) => "Item already in block list!".to_string(),
            BlockerError::InvalidEntry(EntryError::EmptyKeyword) => "Please enter a keyword or URL.".to_string(),
            BlockerError::InvalidEntry(EntryError::ExpirationTooSoon { .. }) => {
                "Expiration date must be at least 10 minutes in the future!".to_string()
            }
            other => format!("Error: {}", other),
        }
    }
}

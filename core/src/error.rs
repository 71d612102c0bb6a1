use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("catalog request failed: {0}")]
    Network(String),
    #[error("malformed catalog response: {0}")]
    Parse(String),
    #[error("catalog exhausted: needed {needed} unique entries, got {got}")]
    Exhausted { needed: usize, got: usize },
}

pub type Result<T> = core::result::Result<T, CatalogError>;

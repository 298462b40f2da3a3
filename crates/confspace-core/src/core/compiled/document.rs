use super::CompiledConfSpace;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("Document serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Document parsing error for '{path}': {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
}

impl CompiledConfSpace {
    /// Serializes this conformation space to its structured text document.
    pub fn to_document_string(&self) -> Result<String, DocumentError> {
        Ok(toml::to_string(self)?)
    }

    /// Parses a conformation space back from its document form.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid TOML or does not match
    /// the artifact schema.
    pub fn from_document_str(document: &str) -> Result<Self, DocumentError> {
        toml::from_str(document).map_err(|e| DocumentError::Parse {
            path: "<string>".to_string(),
            source: e,
        })
    }

    /// Writes the document to a file.
    pub fn save(&self, path: &Path) -> Result<(), DocumentError> {
        let document = self.to_document_string()?;
        std::fs::write(path, document).map_err(|e| DocumentError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })
    }

    /// Reads a conformation space from a document file.
    pub fn load(path: &Path) -> Result<Self, DocumentError> {
        let content = std::fs::read_to_string(path).map_err(|e| DocumentError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| DocumentError::Parse {
            path: path.to_string_lossy().to_string(),
            source: e,
        })
    }
}

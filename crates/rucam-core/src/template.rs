//! The instruction template injected into every analysis prompt.
//!
//! The template is read once and shared read-only between stages. Its content
//! is opaque here: it is embedded verbatim, never parsed or edited.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use rucam_contracts::error::{RucamError, RucamResult};

/// Production prompt compiled into the binary, used when no override is given.
const EMBEDDED_TEMPLATE: &str = include_str!("../../../prompts/rucam_analysis_production.md");

/// An immutable, cheaply clonable instruction document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionTemplate {
    text: Arc<str>,
    source: Option<PathBuf>,
}

impl InstructionTemplate {
    /// The built-in production template.
    pub fn embedded() -> Self {
        Self {
            text: Arc::from(EMBEDDED_TEMPLATE),
            source: None,
        }
    }

    /// Wrap template text that is already in memory.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: Arc::from(text.into()),
            source: None,
        }
    }

    /// Read the template at `path`.
    ///
    /// Returns `RucamError::TemplateUnavailable` if the file cannot be read.
    pub fn from_file(path: &Path) -> RucamResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| RucamError::TemplateUnavailable {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        debug!(path = %path.display(), bytes = text.len(), "instruction template loaded");
        Ok(Self {
            text: Arc::from(text),
            source: Some(path.to_path_buf()),
        })
    }

    /// The override at `path` if given, the embedded template otherwise.
    pub fn load(path: Option<&Path>) -> RucamResult<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => Ok(Self::embedded()),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// The file the template was read from, `None` when embedded or in-memory.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn embedded_template_is_not_empty() {
        let template = InstructionTemplate::embedded();
        assert!(!template.text().trim().is_empty());
        assert!(template.source().is_none());
    }

    #[test]
    fn file_template_is_read_verbatim() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "  Score every item.\n\n  Emit SECTION C.  ").unwrap();

        let template = InstructionTemplate::load(Some(file.path())).unwrap();
        assert_eq!(template.text(), "  Score every item.\n\n  Emit SECTION C.  ");
        assert_eq!(template.source(), Some(file.path()));
    }

    #[test]
    fn missing_template_names_the_path() {
        let err = InstructionTemplate::from_file(Path::new("/nonexistent/prompt.md")).unwrap_err();
        match err {
            RucamError::TemplateUnavailable { path, .. } => assert!(path.contains("prompt.md")),
            other => panic!("expected TemplateUnavailable, got {:?}", other),
        }
    }
}

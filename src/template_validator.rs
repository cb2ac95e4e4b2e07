use crate::error::{Error, Result};
use std::fs;
use std::path::Path;
use tera::Tera;

/// Maximum template file size (1MB)
const MAX_TEMPLATE_SIZE: u64 = 1024 * 1024;

/// Variables an instruction template usually interpolates
const EXPECTED_VARIABLES: &[&str] = &["date", "version_label", "components"];

/// Validates user-supplied instruction templates
pub(crate) struct TemplateValidator;

impl TemplateValidator {
    /// Validates an instruction template file
    ///
    /// Performs the following checks:
    /// 1. File exists and is readable
    /// 2. File size is within limits
    /// 3. Template is not blank
    /// 4. Template syntax is valid (can be compiled by Tera)
    ///
    /// # Errors
    ///
    /// Returns an error if any of the checks fails.
    pub(crate) fn validate_template(path: &Path) -> Result<()> {
        let name = path.to_string_lossy().to_string();

        if !path.exists() {
            return Err(Error::io(
                path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "Template file not found"),
            ));
        }

        if !path.is_file() {
            return Err(Error::template_validation(name, "Path is not a file"));
        }

        let metadata = fs::metadata(path).map_err(|e| Error::io(path, e))?;
        if metadata.len() > MAX_TEMPLATE_SIZE {
            return Err(Error::template_validation(
                name,
                format!(
                    "Template file too large: {} bytes (max: {} bytes)",
                    metadata.len(),
                    MAX_TEMPLATE_SIZE
                ),
            ));
        }

        let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;

        if content.trim().is_empty() {
            return Err(Error::template_validation(name, "Template file is empty"));
        }

        let mut temp_tera = Tera::default();
        temp_tera
            .add_raw_template("validation", &content)
            .map_err(|e| {
                Error::template_validation(name, format!("Template syntax error: {e}"))
            })?;

        Self::check_expected_variables(&content);

        Ok(())
    }

    /// Logs the expected variables a template never references
    fn check_expected_variables(content: &str) {
        for var in EXPECTED_VARIABLES {
            let patterns = [format!("{{{{ {var}"), format!("{{{{{var}"), format!("in {var}")];

            if !patterns.iter().any(|pattern| content.contains(pattern)) {
                tracing::debug!("Instruction template does not use variable: {}", var);
            }
        }
    }
}

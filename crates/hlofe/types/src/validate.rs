//! Descriptor validation
//!
//! Turns the raw YAML body of a request into a [`Descriptor`].

use crate::descriptor::Descriptor;
use thiserror::Error;
use tracing::{debug, warn};

/// Reasons a descriptor is rejected
#[derive(Debug, Error)]
pub enum DescriptorError {
    /// The text is not a YAML document
    #[error("descriptor is not valid YAML: {0}")]
    MalformedInput(#[source] serde_yaml::Error),

    /// The document does not have the descriptor's shape
    #[error("descriptor does not match the expected schema: {0}")]
    SchemaViolation(String),
}

/// Parse and type-check a descriptor
///
/// Rejections are logged here, so callers only map the error to their own
/// failure type.
pub fn parse_descriptor(text: &str) -> Result<Descriptor, DescriptorError> {
    match read_descriptor(text) {
        Ok(descriptor) => {
            debug!(
                components = descriptor.components.len(),
                "Descriptor validated"
            );
            Ok(descriptor)
        }
        Err(e) => {
            warn!(error = %e, "Descriptor rejected");
            Err(e)
        }
    }
}

fn read_descriptor(text: &str) -> Result<Descriptor, DescriptorError> {
    let document: serde_yaml::Value =
        serde_yaml::from_str(text).map_err(DescriptorError::MalformedInput)?;

    if !document.is_mapping() {
        return Err(DescriptorError::SchemaViolation(
            "document root must be a mapping".to_string(),
        ));
    }

    serde_yaml::from_value(document).map_err(|e| DescriptorError::SchemaViolation(e.to_string()))
}

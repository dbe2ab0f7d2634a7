use crate::{config::UploadConfig, error::ValidationError, models::UploadedFile};

/// Check size bounds and the accepted-type pattern. First failure wins.
///
/// A bound of zero disables that check.
pub fn validate_file(file: &UploadedFile, config: &UploadConfig) -> Result<(), ValidationError> {
    if config.min_file_size > 0 && file.size < config.min_file_size {
        return Err(ValidationError::TooSmall);
    }
    if config.max_file_size > 0 && file.size > config.max_file_size {
        return Err(ValidationError::TooBig);
    }
    if !config.accept_file_types.is_match(&file.name) {
        return Err(ValidationError::TypeNotAllowed);
    }
    Ok(())
}

use super::models::Config;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("You must specify an S3 bucket.")]
    MissingBucket,

    #[error(
        "Set the KEYLIME_TOOLBOX_EMAIL and KEYLIME_TOOLBOX_TOKEN environment variables. \
         You can find these at https://app.keylime.io/settings/profile."
    )]
    MissingCredentials,

    #[error(
        "You must specify an AWS region with the --region option or the AWS_REGION \
         environment variable."
    )]
    MissingRegion,
}

/// Check that the run can authenticate and address its destination
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_credentials(config)?;
    validate_storage(config)?;
    Ok(())
}

fn validate_credentials(config: &Config) -> Result<(), ValidationError> {
    if config.api.email.is_none() || config.api.token.is_none() {
        return Err(ValidationError::MissingCredentials);
    }
    Ok(())
}

fn validate_storage(config: &Config) -> Result<(), ValidationError> {
    if config.storage.bucket.is_none() {
        return Err(ValidationError::MissingBucket);
    }
    if config.storage.region.is_none() {
        return Err(ValidationError::MissingRegion);
    }
    Ok(())
}

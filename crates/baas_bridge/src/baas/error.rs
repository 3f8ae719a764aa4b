use thiserror::Error;

#[derive(Error, Debug)]
pub enum BaasError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("request failed, status code: {status}, message: {message}")]
    Api { status: u16, message: String },
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

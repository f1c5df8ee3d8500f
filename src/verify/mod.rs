use std::future::Future;
use thiserror::Error;
use crate::address::AddressComponents;
use crate::verify::smarty::SmartyClientProxy;
use crate::verify::usps::UspsClient;

pub mod smarty;
pub mod usps;

/// Why a verification attempt produced no usable address.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("request error: {0}")]
    Transport(String),
    #[error("HTTP {0}")]
    Status(u16),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("{service} API error: {description}")]
    Rejected {
        service: &'static str,
        description: String,
    },
    #[error("all [{0}] accounts have used up their lookups")]
    QuotaExhausted(usize),
    #[error("cannot build request: {0}")]
    Request(String),
}

impl VerifyError {
    /// whether the same request may succeed when sent again
    pub fn is_transient(&self) -> bool {
        match self {
            VerifyError::Transport(_) => true,
            VerifyError::Status(code) => *code >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for VerifyError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => VerifyError::Status(status.as_u16()),
            None => VerifyError::Transport(err.to_string()),
        }
    }
}

/// A remote service that corrects an already normalized address.
pub trait Verify {
    fn name(&self) -> &'static str;

    /// Called at most once per address per attempt.
    fn verify(&self, address: &AddressComponents) -> impl Future<Output = Result<AddressComponents, VerifyError>>;
}

/// the verification backends the CLI can select
pub enum Verifier {
    Usps(UspsClient),
    Smarty(SmartyClientProxy),
}

impl Verify for Verifier {
    fn name(&self) -> &'static str {
        match self {
            Verifier::Usps(_) => "USPS",
            Verifier::Smarty(_) => "Smarty",
        }
    }

    async fn verify(&self, address: &AddressComponents) -> Result<AddressComponents, VerifyError> {
        match self {
            Verifier::Usps(client) => client.verify(address).await,
            Verifier::Smarty(client) => client.verify(address).await,
        }
    }
}

use std::fmt;

use thiserror::Error;

/// Failure of a single HTTP round trip to the gateway.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unexpected status code {status} from {url}")]
    Status { status: u16, url: String },
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("digest authentication failed: {0}")]
    Auth(String),
    #[error("invalid uri: {0}")]
    InvalidUri(String),
    #[error("unexpected markup: {0}")]
    Markup(String),
}

/// A raw vendor code that could not be turned into a standardized code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    #[error("malformed input: {0}")]
    MalformedInput(String),
}

/// A raw value that is not a number.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot parse '{value}' as a number")]
pub struct ParseError {
    pub value: String,
}

/// Candidate selection found nothing to pick.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("discovery error: {0}")]
pub struct DiscoveryError(pub String);

/// The step of a fetch cycle a transport failure happened in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    ListCandidates,
    CandidateDetails(String),
    DeviceInfo,
    Readings,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::ListCandidates => write!(f, "listing meter candidates"),
            Step::CandidateDetails(id) => write!(f, "fetching details of candidate {id}"),
            Step::DeviceInfo => write!(f, "fetching device info"),
            Step::Readings => write!(f, "fetching readings"),
        }
    }
}

/// Errors surfaced by a gateway call. Per-entry problems never end up here.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("{step} failed: {source}")]
    Transport {
        step: Step,
        #[source]
        source: TransportError,
    },
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    #[error("failed to discover meter identity: {0}")]
    DiscoveryFailed(#[source] Box<GatewayError>),
    #[error("no readings found")]
    NoReadingsFound,
    #[error("operation cancelled")]
    Cancelled,
    #[error("failed to discover gateway: {0}")]
    AddressNotFound(String),
    #[error("configuration error: {0}")]
    Config(String),
}

impl GatewayError {
    pub fn transport(step: Step) -> impl FnOnce(TransportError) -> GatewayError {
        move |source| GatewayError::Transport { step, source }
    }

    /// Wraps a discovery-step failure. Cancellation passes through untouched.
    pub fn discovery_failed(err: GatewayError) -> GatewayError {
        match err {
            GatewayError::Cancelled => GatewayError::Cancelled,
            other => GatewayError::DiscoveryFailed(Box::new(other)),
        }
    }
}

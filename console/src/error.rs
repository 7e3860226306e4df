use hub_api::error::HubApiError;
use thiserror::Error;

/// Errors returned by console actions.
///
/// Every variant is recoverable; the console stays usable after any of them.
#[derive(Clone, Debug, Error)]
pub enum ConsoleError {
    /// A mutating action was attempted before `GET /api/csrf` succeeded.
    #[error("csrf not loaded")]
    MissingCsrf,

    /// The action isn't supported by the Hub's current Lightning backend.
    #[error("Not supported by the {backend} backend")]
    UnsupportedBackend { backend: String },

    #[error("please fill out all fields")]
    IncompleteSetup,

    #[error(transparent)]
    Api(#[from] HubApiError),
}

impl ConsoleError {
    /// Whether the action was rejected before its request was sent.
    pub fn is_precondition(&self) -> bool {
        !matches!(self, Self::Api(_))
    }
}

use cdp_session::SessionError;
use thiserror::Error;

/// Fatal-to-journey failures. Everything else degrades to a partial result.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("session creation failed: {0}")]
    SessionCreate(SessionError),
    #[error("homepage unreachable: {0}")]
    HomepageUnreachable(String),
}

/// Stage-local failures: logged, the stage is omitted, the journey continues.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("no product found")]
    NoProductFound,
    #[error("add to cart failed: every strategy exhausted")]
    AddToCartExhausted,
    #[error("checkout entry did not change the url")]
    CheckoutEntryFailed,
    #[error("identity challenge encountered")]
    IdentityChallenge,
    #[error("navigation failed for {0}")]
    NavigationFailed(String),
    #[error(transparent)]
    Session(#[from] SessionError),
}

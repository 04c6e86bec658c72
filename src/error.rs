use crate::location::LocationToken;

/// Failures reported by a render engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("location {token} rejected by render engine: {reason}")]
    Rejected {
        token: LocationToken,
        reason: String,
    },

    #[error("{detail}")]
    Generic { detail: String },
}

impl EngineError {
    pub fn rejected(token: &LocationToken, reason: impl Into<String>) -> Self {
        Self::Rejected {
            token: token.clone(),
            reason: reason.into(),
        }
    }

    pub fn generic(msg: impl Into<String>) -> Self {
        Self::Generic { detail: msg.into() }
    }
}

/// Failures surfaced to whoever drives the position bridge.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// The view was unmounted; the handle is no longer usable.
    #[error("reader view is detached")]
    Detached,

    #[error("cannot jump to {token}")]
    Navigation {
        token: LocationToken,
        #[source]
        source: EngineError,
    },
}

/// Why a toolbar action did not run.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("nothing selected")]
    NothingSelected,

    #[error("reading position unknown")]
    PositionUnknown,

    #[error("reader is still loading")]
    NotReady,

    #[error("clipboard write failed: {detail}")]
    Clipboard { detail: String },

    #[error("highlight failed")]
    Highlight(#[from] EngineError),
}

impl ActionError {
    /// Precondition failures are expected user situations, not faults.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::NothingSelected | Self::PositionUnknown | Self::NotReady
        )
    }
}

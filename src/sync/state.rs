use std::fmt;

use crate::error::ApiError;

/// Identifies one logical fetch for retry bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OperationTag(pub &'static str);

impl fmt::Display for OperationTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeatureFailure {
    /// Offline. A retry affordance keyed by the tag is armed.
    NoConnection { tag: OperationTag },
    /// Anything the feature cannot interpret. Not retryable.
    Technical { detail: Option<String> },
}

/// Per-feature state. `Loading` re-enters only through a new context
/// generation, an armed retry, or an explicit refresh.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FeatureState<T> {
    #[default]
    Loading,
    Success(T),
    /// Loaded fine, nothing to show.
    Empty,
    Error(FeatureFailure),
    /// Not offered in the current context.
    Unavailable,
}

impl<T> FeatureState<T> {
    pub fn status(&self) -> FeatureStatus {
        match self {
            Self::Loading => FeatureStatus::Loading,
            Self::Success(_) => FeatureStatus::Success,
            Self::Empty => FeatureStatus::Empty,
            Self::Error(_) => FeatureStatus::Error,
            Self::Unavailable => FeatureStatus::Unavailable,
        }
    }
}

/// Payload-free mirror of [`FeatureState`] for status checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureStatus {
    Loading,
    Success,
    Empty,
    Error,
    Unavailable,
}

/// Offline arms a retry; a listed domain code is terminal for this context.
pub(crate) fn classify_failure<T>(
    error: ApiError,
    tag: OperationTag,
    unavailable_codes: &[&str],
) -> FeatureState<T> {
    match error {
        ApiError::NoConnection => FeatureState::Error(FeatureFailure::NoConnection { tag }),
        ApiError::Domain { code, .. } if unavailable_codes.contains(&code.as_str()) => {
            FeatureState::Unavailable
        }
        ApiError::Unclassified { detail, .. } => {
            FeatureState::Error(FeatureFailure::Technical { detail })
        }
        other => FeatureState::Error(FeatureFailure::Technical {
            detail: Some(other.to_string()),
        }),
    }
}

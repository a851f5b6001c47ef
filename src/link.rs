//! Best-quality link selection

use crate::error::{Error, Result};
use crate::types::{MediaRole, MediaVariant};

/// Pick the best offered URL of a media variant
///
/// Links are tried in priority order `higher`, `high`, `med`; the first
/// non-empty one wins. Fails with [`Error::ResourceNotFound`] when no quality
/// is offered.
pub fn select_best_link(variant: &MediaVariant, role: MediaRole) -> Result<&str> {
    variant
        .ranked()
        .into_iter()
        .find(|link| link.is_offered())
        .map(|link| link.url.as_str())
        .ok_or(Error::ResourceNotFound { role })
}

//! Candidate identity resolution.

use std::sync::Arc;

use error_common::{VisitError, VisitResult};
use visit_model::{CoreRecord, VisitCandidate};
use visit_store::CoreStore;

/// Matches an inbound candidate to an existing visit.
///
/// Resolution order is load-bearing: the offline id is checked first, then
/// the server id. A device may create a record offline (only `offlineId`
/// known), later learn its assigned `id`, and resubmit with both fields
/// set — resolution must still match the original record rather than
/// create a duplicate.
pub struct IdentityResolver {
    core: Arc<dyn CoreStore>,
}

impl IdentityResolver {
    pub fn new(core: Arc<dyn CoreStore>) -> Self {
        Self { core }
    }

    /// Resolve to exactly one existing record or none.
    ///
    /// # Errors
    ///
    /// [`VisitError::IdentityConflict`] when the candidate's `offlineId`
    /// and `id` resolve to *different* records. That is corrupted client
    /// state and must never be silently merged.
    pub async fn resolve(&self, candidate: &VisitCandidate) -> VisitResult<Option<CoreRecord>> {
        let by_offline = match &candidate.offline_id {
            Some(offline_id) => self
                .core
                .find_by_offline_id(offline_id)
                .await
                .map_err(|e| VisitError::StoreFailure(e.to_string()))?,
            None => None,
        };

        let by_id = match candidate.id {
            Some(id) => self
                .core
                .find(id)
                .await
                .map_err(|e| VisitError::StoreFailure(e.to_string()))?,
            None => None,
        };

        match (by_offline, by_id) {
            (Some(a), Some(b)) if a.id != b.id => Err(VisitError::IdentityConflict {
                offline_id: candidate.offline_id.clone().unwrap_or_default(),
                id: b.id.to_string(),
            }),
            (Some(record), _) => Ok(Some(record)),
            (None, Some(record)) => Ok(Some(record)),
            (None, None) => Ok(None),
        }
    }
}

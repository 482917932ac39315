use crate::inference::{InferenceService, SubmissionError};
use crate::intake::{self, UploadCandidate, ValidationError};
use crate::record::{AnalysisRecord, Principal};
use crate::store::{RecordStore, StoreError};

/// Request-scoped state for one caller: who they are and whether they
/// already have a submission outstanding. Passed explicitly into every
/// engine call instead of living in ambient globals.
#[derive(Debug, Clone)]
pub struct Session {
    principal: Principal,
    in_flight: bool,
}

impl Session {
    pub fn new(principal: Principal) -> Self {
        Session {
            principal,
            in_flight: false,
        }
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AnalysisError {
    #[error("an analysis is already in progress for this session")]
    InFlight,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Submission(#[from] SubmissionError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AnalysisError {
    /// Which step of the lifecycle failed; the component boundary is the
    /// error-reporting boundary.
    pub fn step(&self) -> &'static str {
        match self {
            AnalysisError::InFlight | AnalysisError::Validation(_) => "validation",
            AnalysisError::Submission(_) => "submission",
            AnalysisError::Store(_) => "storage",
        }
    }
}

/// The analysis-request lifecycle: validate, persist a pending record,
/// call the inference endpoint, transition the record exactly once to a
/// terminal state.
pub struct AnalysisEngine<C, S> {
    client: C,
    store: S,
}

impl<C: InferenceService, S: RecordStore> AnalysisEngine<C, S> {
    pub fn new(client: C, store: S) -> Self {
        AnalysisEngine { client, store }
    }

    /// Submit one upload. Refuses to start while the session already has
    /// a submission in flight, and clears the flag on every exit path.
    pub async fn submit(
        &self,
        session: &mut Session,
        candidate: UploadCandidate,
    ) -> Result<AnalysisRecord, AnalysisError> {
        if session.in_flight {
            return Err(AnalysisError::InFlight);
        }
        session.in_flight = true;
        let outcome = self.run_submission(&session.principal, candidate).await;
        session.in_flight = false;
        outcome
    }

    async fn run_submission(
        &self,
        principal: &Principal,
        candidate: UploadCandidate,
    ) -> Result<AnalysisRecord, AnalysisError> {
        // Validation happens before any record or network activity.
        let file = intake::validate(candidate)?;

        let pending = self.store.create(principal, &file.path)?;

        match self.client.classify(&file).await {
            Ok(result) => Ok(self.store.complete(principal, pending.id, &result)?),
            Err(err) => {
                // The record must still reach a terminal state; if even
                // that write fails, the submission error wins.
                if let Err(store_err) = self.store.fail(principal, pending.id, &err.to_string()) {
                    log::warn!(
                        "could not mark analysis {} as failed: {store_err}",
                        pending.id
                    );
                }
                Err(err.into())
            }
        }
    }

    /// The session's analysis history, newest first.
    pub fn history(&self, session: &Session) -> Result<Vec<AnalysisRecord>, AnalysisError> {
        Ok(self.store.list(&session.principal)?)
    }

    /// Look up one of the session's records for report rendering.
    pub fn record(&self, session: &Session, id: i64) -> Result<AnalysisRecord, AnalysisError> {
        self.store
            .list(&session.principal)?
            .into_iter()
            .find(|record| record.id == id)
            .ok_or(AnalysisError::Store(StoreError::NotFound(id)))
    }
}

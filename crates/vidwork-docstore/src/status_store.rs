//! Status store (component C3): the single source of truth `GET
//! /status/:uploadId` reads from (§4.3).
//!
//! Backed by a `jobs` collection keyed on the upload id. Writes always go
//! through [`Job::set_state`] so the forward-only transition rule is
//! enforced before anything reaches Firestore.

use tracing::instrument;
use vidwork_models::{Job, JobInput, JobState, UploadId, UserId};

use crate::client::FirestoreClient;
use crate::convert::{fields_to_struct, struct_to_fields};
use crate::error::{FirestoreError, FirestoreResult};
use crate::retry::{with_retry, RetryConfig};

const COLLECTION: &str = "jobs";

/// Status store over a `FirestoreClient`.
#[derive(Clone)]
pub struct StatusStore {
    client: FirestoreClient,
    retry: RetryConfig,
}

impl StatusStore {
    pub fn new(client: FirestoreClient) -> Self {
        Self {
            client,
            retry: RetryConfig::from_env(),
        }
    }

    /// Create the job document in `Pending` state. Fails with
    /// `AlreadyExists` if `uploadId` was already submitted, matching the
    /// idempotent-submission contract in §6.
    #[instrument(skip(self, input))]
    pub async fn init(
        &self,
        upload_id: &UploadId,
        user_id: &UserId,
        input: JobInput,
    ) -> FirestoreResult<Job> {
        let job = Job::new(upload_id.clone(), user_id.clone(), input);
        let fields = struct_to_fields(&job)?;
        with_retry(&self.retry, "status_store.init", || {
            let client = self.client.clone();
            let fields = fields.clone();
            let doc_id = upload_id.as_str().to_string();
            async move { client.create_document(COLLECTION, &doc_id, fields).await }
        })
        .await?;
        Ok(job)
    }

    /// Fetch the current job, or `None` if `uploadId` was never submitted.
    #[instrument(skip(self))]
    pub async fn get(&self, upload_id: &UploadId) -> FirestoreResult<Option<Job>> {
        let doc_id = upload_id.as_str().to_string();
        let doc = with_retry(&self.retry, "status_store.get", || {
            let client = self.client.clone();
            let doc_id = doc_id.clone();
            async move { client.get_document(COLLECTION, &doc_id).await }
        })
        .await?;

        match doc {
            None => Ok(None),
            Some(doc) => {
                let fields = doc.fields.unwrap_or_default();
                Ok(Some(fields_to_struct(&fields)?))
            }
        }
    }

    /// Transition the job to `next`, rejecting backward moves per §3.
    #[instrument(skip(self, next))]
    pub async fn update(&self, upload_id: &UploadId, next: JobState) -> FirestoreResult<Job> {
        let mut job = self.get(upload_id).await?.ok_or_else(|| {
            FirestoreError::not_found(format!("{COLLECTION}/{}", upload_id.as_str()))
        })?;

        job.set_state(next);

        let fields = struct_to_fields(&job)?;
        let doc_id = upload_id.as_str().to_string();
        with_retry(&self.retry, "status_store.update", || {
            let client = self.client.clone();
            let fields = fields.clone();
            let doc_id = doc_id.clone();
            async move { client.update_document(COLLECTION, &doc_id, fields, None).await }
        })
        .await?;
        Ok(job)
    }

    /// Convenience wrapper around [`Self::update`] for the terminal success
    /// path.
    pub async fn complete(&self, upload_id: &UploadId, result_key: String) -> FirestoreResult<Job> {
        self.update(upload_id, JobState::Completed { result_key }).await
    }

    /// Convenience wrapper around [`Self::update`] for the terminal failure
    /// path. `Error` is reachable from any state, including another
    /// terminal one, so this never fails on the transition check.
    pub async fn fail(
        &self,
        upload_id: &UploadId,
        error_code: String,
        message: String,
    ) -> FirestoreResult<Job> {
        self.update(upload_id, JobState::Error { error_code, message }).await
    }
}

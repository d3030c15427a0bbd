//! Checkpoint store (component C4): durable, CAS-protected resume state
//! (§3, §4.4).
//!
//! Saves race the orchestrator's own stage completions against a possible
//! concurrent resume after a crash, so every write goes through Firestore's
//! `updateTime` precondition via [`FirestoreClient::update_document_with_precondition`].
//! A conflicting write surfaces as [`FirestoreError::PreconditionFailed`]
//! and the caller is expected to reload and retry.

use chrono::Utc;
use tracing::instrument;
use vidwork_models::{Checkpoint, UploadId};

use crate::client::FirestoreClient;
use crate::convert::{fields_to_struct, struct_to_fields};
use crate::error::{FirestoreError, FirestoreResult};
use crate::retry::{with_retry, RetryConfig};

const COLLECTION: &str = "checkpoints";

/// Checkpoint store over a `FirestoreClient`.
#[derive(Clone)]
pub struct CheckpointStore {
    client: FirestoreClient,
    retry: RetryConfig,
}

impl CheckpointStore {
    pub fn new(client: FirestoreClient) -> Self {
        Self {
            client,
            retry: RetryConfig::from_env(),
        }
    }

    /// Load the checkpoint for `uploadId`, or `None` if there is none (a
    /// fresh job, or one whose checkpoint already expired and was swept).
    #[instrument(skip(self))]
    pub async fn load(&self, upload_id: &UploadId) -> FirestoreResult<Option<Checkpoint>> {
        let doc_id = upload_id.as_str().to_string();
        let doc = with_retry(&self.retry, "checkpoint_store.load", || {
            let client = self.client.clone();
            let doc_id = doc_id.clone();
            async move { client.get_document(COLLECTION, &doc_id).await }
        })
        .await?;

        match doc {
            None => Ok(None),
            Some(doc) => {
                let fields = doc.fields.unwrap_or_default();
                let mut checkpoint: Checkpoint = fields_to_struct(&fields)?;
                checkpoint
                    .check_invariants()
                    .map_err(FirestoreError::InvalidResponse)?;
                checkpoint.observed_update_time = doc.update_time;
                Ok(Some(checkpoint))
            }
        }
    }

    /// Persist `checkpoint`, bumping `version` and CAS-protecting the write
    /// against `checkpoint.observed_update_time` — the `updateTime` this
    /// exact in-memory checkpoint was loaded (or last saved) against, not a
    /// value re-fetched here. Re-fetching immediately before the write would
    /// always observe the precondition it is about to satisfy, making the
    /// CAS unable to ever detect a write this checkpoint never saw (§4.4).
    /// Creates the document on the first save for a given upload.
    #[instrument(skip(self, checkpoint))]
    pub async fn save(&self, checkpoint: &mut Checkpoint) -> FirestoreResult<()> {
        checkpoint
            .check_invariants()
            .map_err(FirestoreError::InvalidResponse)?;

        let doc_id = checkpoint.upload_id.as_str().to_string();
        checkpoint.version += 1;
        let fields = struct_to_fields(checkpoint)?;
        let precondition = checkpoint.observed_update_time.clone();

        let doc = match precondition {
            None => {
                with_retry(&self.retry, "checkpoint_store.save.create", || {
                    let client = self.client.clone();
                    let fields = fields.clone();
                    let doc_id = doc_id.clone();
                    async move { client.create_document(COLLECTION, &doc_id, fields).await }
                })
                .await?
            }
            Some(update_time) => {
                with_retry(&self.retry, "checkpoint_store.save.cas", || {
                    let client = self.client.clone();
                    let fields = fields.clone();
                    let doc_id = doc_id.clone();
                    let update_time = update_time.clone();
                    async move {
                        client
                            .update_document_with_precondition(
                                COLLECTION,
                                &doc_id,
                                fields,
                                None,
                                Some(&update_time),
                            )
                            .await
                    }
                })
                .await?
            }
        };

        checkpoint.observed_update_time = doc.update_time;
        Ok(())
    }

    /// Delete the checkpoint, typically called once a job reaches a
    /// terminal state (§4.4: a completed job's checkpoint is no longer
    /// needed for resume).
    #[instrument(skip(self))]
    pub async fn delete(&self, upload_id: &UploadId) -> FirestoreResult<()> {
        let doc_id = upload_id.as_str().to_string();
        with_retry(&self.retry, "checkpoint_store.delete", || {
            let client = self.client.clone();
            let doc_id = doc_id.clone();
            async move { client.delete_document(COLLECTION, &doc_id).await }
        })
        .await
    }

    /// Sweep expired checkpoints (§4.4: TTL cleanup), returning how many
    /// were deleted. Backs the `POST /cron/cleanup-checkpoints` endpoint.
    #[instrument(skip(self))]
    pub async fn sweep(&self) -> FirestoreResult<u32> {
        let now = Utc::now();
        let mut deleted = 0u32;
        let mut page_token: Option<String> = None;

        loop {
            let page = with_retry(&self.retry, "checkpoint_store.sweep.list", || {
                let client = self.client.clone();
                let page_token = page_token.clone();
                async move {
                    client
                        .list_documents(COLLECTION, Some(100), page_token.as_deref())
                        .await
                }
            })
            .await?;

            for doc in page.documents.unwrap_or_default() {
                let fields = doc.fields.unwrap_or_default();
                let Ok(checkpoint) = fields_to_struct::<Checkpoint>(&fields) else {
                    continue;
                };
                if checkpoint.is_expired(now) {
                    self.delete(&checkpoint.upload_id).await?;
                    deleted += 1;
                }
            }

            page_token = page.next_page_token;
            if page_token.is_none() {
                break;
            }
        }

        Ok(deleted)
    }
}

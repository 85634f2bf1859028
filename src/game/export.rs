/*!
 * Export of the accumulated clips as one merged video.
 */

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::errors::GameError;
use crate::game::session::GameSession;
use crate::models::ClipReference;
use crate::services::ClipMerger;

/// Fewest clips worth merging
pub const MIN_EXPORT_CLIPS: usize = 2;

/// Merged video ready for download
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportArtifact {
    /// Reference returned by the merger
    pub reference: ClipReference,
    /// File name offered for the download
    pub file_name: String,
    /// Number of clips merged
    pub clip_count: usize,
}

/// One merge request built from a session's accumulator
#[derive(Debug, Clone, PartialEq)]
pub struct MergePlan {
    pub clips: Vec<ClipReference>,
    pub file_name: String,
}

/// Turns a session's clip accumulator into a merge request
#[derive(Debug, Clone)]
pub struct ExportCoordinator {
    merger: Arc<dyn ClipMerger>,
}

impl ExportCoordinator {
    pub fn new(merger: Arc<dyn ClipMerger>) -> Self {
        Self { merger }
    }

    /// Build the merge request, rejecting sessions with too few clips
    pub fn plan(session: &GameSession) -> Result<MergePlan, GameError> {
        let available = session.clip_accumulator().len();
        if available < MIN_EXPORT_CLIPS {
            return Err(GameError::NotEnoughClips {
                required: MIN_EXPORT_CLIPS,
                available,
            });
        }
        Ok(MergePlan {
            clips: session.clip_accumulator().to_vec(),
            file_name: session.mode().export_file_name().to_string(),
        })
    }

    /// Send the merge request
    pub async fn execute(&self, plan: MergePlan) -> Result<ExportArtifact, GameError> {
        info!("Merging {} clips into {}", plan.clips.len(), plan.file_name);
        let reference = self.merger.merge_clips(&plan.clips).await.map_err(|e| {
            warn!("Merge failed: {}", e);
            GameError::from(e)
        })?;
        info!("Merged video ready: {}", reference);
        Ok(ExportArtifact {
            reference,
            file_name: plan.file_name,
            clip_count: plan.clips.len(),
        })
    }
}

//! Annotation workflow state machine.
//!
//! The store is the single owner of the annotation session and advances
//! through an explicit transition function: `handle(event)` mutates the
//! store and returns the side effects to execute. Network completions come
//! back in as events carrying the generation tag of the request that caused
//! them; completions for a superseded generation are discarded. Submission
//! state only moves to `Submitted`/`Failed`/`Finished` on completion of the
//! matching asynchronous operation, never optimistically.

use chrono::Utc;
use serde_json::Value;

use crate::model::{
    AnnotationSession, AnnotationUnit, Feature, FlagStatus, MarkupArray, Question, Study,
    SubmissionPayload, SubmissionState,
};
use crate::segmentation::Segmentation;
use crate::workflow::gateway::ImageMetadata;

/// Inputs to the workflow store.
#[derive(Debug, Clone)]
pub enum WorkflowEvent {
    /// Operator asked for the next pending annotation unit
    FetchNext {
        study_id: String,
    },
    /// Study metadata arrived
    StudyFetched {
        study: Study,
    },
    /// The next annotation unit arrived
    AnnotationFetched {
        generation: u64,
        unit: AnnotationUnit,
    },
    /// The server signalled an empty queue
    QueueExhausted {
        generation: u64,
    },
    /// An annotation or image fetch failed
    FetchFailed {
        generation: u64,
        error: String,
    },
    /// Image metadata and segmentation arrived for the active session
    ImageReady {
        generation: u64,
        metadata: ImageMetadata,
        segmentation: Segmentation,
    },
    /// Operator answered (or retracted the answer to) a question
    RecordResponse {
        question_id: String,
        answer: Option<Value>,
    },
    /// Operator saved (or removed) the markup for a feature
    RecordMarkup {
        feature_id: String,
        markup: Option<MarkupArray>,
    },
    /// Operator flagged the image
    SetFlagStatus {
        status: FlagStatus,
    },
    /// Operator discarded all recorded responses
    ResetResponses,
    /// Operator discarded all recorded markups
    ResetMarkups,
    /// Operator switched the paint-active feature
    SetActiveFeature {
        feature_id: Option<String>,
    },
    /// Operator requested submission
    Submit,
    /// The server accepted the submission
    SubmitSucceeded {
        generation: u64,
    },
    /// The submission failed
    SubmitFailed {
        generation: u64,
        error: String,
    },
}

/// Side effects emitted by the store, executed by the driver.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowEffect {
    /// Fetch study metadata (once per workflow)
    FetchStudy { generation: u64, study_id: String },
    /// Fetch the next annotation unit
    FetchAnnotation { generation: u64, study_id: String },
    /// Fetch image metadata, tile dimensions and segmentation
    FetchImage { generation: u64, image_id: String },
    /// Submit the payload for the active session
    SubmitAnnotation {
        generation: u64,
        annotation_id: String,
        payload: SubmissionPayload,
    },
}

/// Finite-state workflow driving one operator through a study's queue.
#[derive(Debug, Default)]
pub struct AnnotationWorkflowStore {
    submission_state: SubmissionState,
    study: Option<Study>,
    study_requested: bool,
    session: Option<AnnotationSession>,
    image: Option<ImageMetadata>,
    generation: u64,
}

impl AnnotationWorkflowStore {
    /// Create an empty store in the `Unsubmitted` state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current submission state.
    pub fn submission_state(&self) -> SubmissionState {
        self.submission_state
    }

    /// Whether the queue has been exhausted.
    pub fn is_finished(&self) -> bool {
        self.submission_state.is_terminal()
    }

    /// The active session, if an annotation unit is loaded.
    pub fn session(&self) -> Option<&AnnotationSession> {
        self.session.as_ref()
    }

    /// Study metadata, once fetched.
    pub fn study(&self) -> Option<&Study> {
        self.study.as_ref()
    }

    /// Questions of the study; empty until the study is fetched.
    pub fn questions(&self) -> &[Question] {
        self.study.as_ref().map_or(&[], |s| &s.questions)
    }

    /// Features of the study; empty until the study is fetched.
    pub fn features(&self) -> &[Feature] {
        self.study.as_ref().map_or(&[], |s| &s.features)
    }

    /// Ids of features with a recorded markup in the active session.
    pub fn marked_up_feature_ids(&self) -> Vec<&str> {
        self.session
            .as_ref()
            .map_or_else(Vec::new, AnnotationSession::marked_up_feature_ids)
    }

    /// Metadata of the active session's image, once fetched.
    pub fn image_metadata(&self) -> Option<&ImageMetadata> {
        self.image.as_ref()
    }

    /// Generation tag of the most recent fetch; completions for older
    /// generations are discarded.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Apply one event, returning the effects to execute.
    pub fn handle(&mut self, event: &WorkflowEvent) -> Vec<WorkflowEffect> {
        match event {
            WorkflowEvent::FetchNext { study_id } => self.on_fetch_next(study_id),
            WorkflowEvent::StudyFetched { study } => {
                self.study = Some(study.clone());
                Vec::new()
            }
            WorkflowEvent::AnnotationFetched { generation, unit } => {
                self.on_annotation_fetched(*generation, unit)
            }
            WorkflowEvent::QueueExhausted { generation } => self.on_queue_exhausted(*generation),
            WorkflowEvent::FetchFailed { generation, error } => {
                self.on_failure(*generation, error, "fetch")
            }
            WorkflowEvent::ImageReady {
                generation,
                metadata,
                ..
            } => self.on_image_ready(*generation, *metadata),
            WorkflowEvent::RecordResponse {
                question_id,
                answer,
            } => {
                self.with_session("record response", |session| {
                    session.record_response(question_id, answer.clone());
                });
                Vec::new()
            }
            WorkflowEvent::RecordMarkup { feature_id, markup } => {
                self.with_session("record markup", |session| {
                    session.record_markup(feature_id, markup.clone());
                });
                Vec::new()
            }
            WorkflowEvent::SetFlagStatus { status } => {
                self.with_session("set flag status", |session| {
                    session.flag_status = *status;
                });
                Vec::new()
            }
            WorkflowEvent::ResetResponses => {
                self.with_session("reset responses", AnnotationSession::reset_responses);
                Vec::new()
            }
            WorkflowEvent::ResetMarkups => {
                self.with_session("reset markups", AnnotationSession::reset_markups);
                Vec::new()
            }
            WorkflowEvent::SetActiveFeature { feature_id } => {
                self.with_session("set active feature", |session| {
                    session.active_feature_id = feature_id.clone();
                });
                Vec::new()
            }
            WorkflowEvent::Submit => self.on_submit(),
            WorkflowEvent::SubmitSucceeded { generation } => {
                if self.is_stale(*generation, "submit result") {
                    return Vec::new();
                }
                log::info!("annotation submitted");
                self.submission_state = SubmissionState::Submitted;
                Vec::new()
            }
            WorkflowEvent::SubmitFailed { generation, error } => {
                self.on_failure(*generation, error, "submit")
            }
        }
    }

    fn on_fetch_next(&mut self, study_id: &str) -> Vec<WorkflowEffect> {
        if self.is_finished() {
            log::warn!("fetch requested after the queue finished; ignoring");
            return Vec::new();
        }
        if self.submission_state == SubmissionState::Submitting {
            log::warn!("fetch requested while a submission is in flight; ignoring");
            return Vec::new();
        }

        self.generation += 1;
        log::debug!(
            "fetching next annotation for study {study_id} (generation {})",
            self.generation
        );

        let mut effects = Vec::new();
        if self.study.is_none() && !self.study_requested {
            self.study_requested = true;
            effects.push(WorkflowEffect::FetchStudy {
                generation: self.generation,
                study_id: study_id.to_string(),
            });
        }
        effects.push(WorkflowEffect::FetchAnnotation {
            generation: self.generation,
            study_id: study_id.to_string(),
        });
        effects
    }

    fn on_annotation_fetched(
        &mut self,
        generation: u64,
        unit: &AnnotationUnit,
    ) -> Vec<WorkflowEffect> {
        if self.is_stale(generation, "annotation unit") {
            return Vec::new();
        }

        log::info!("annotation {} fetched for image {}", unit.id, unit.image_id);
        self.session = Some(AnnotationSession::new(unit, Utc::now()));
        self.image = None;
        self.submission_state = SubmissionState::Unsubmitted;

        vec![WorkflowEffect::FetchImage {
            generation,
            image_id: unit.image_id.clone(),
        }]
    }

    fn on_queue_exhausted(&mut self, generation: u64) -> Vec<WorkflowEffect> {
        if self.is_stale(generation, "queue-exhausted signal") {
            return Vec::new();
        }
        log::info!("annotation queue exhausted; workflow finished");
        self.submission_state = SubmissionState::Finished;
        self.session = None;
        self.image = None;
        Vec::new()
    }

    fn on_image_ready(&mut self, generation: u64, metadata: ImageMetadata) -> Vec<WorkflowEffect> {
        if self.is_stale(generation, "image") {
            return Vec::new();
        }
        log::debug!(
            "image ready ({} x {} px)",
            metadata.size_x,
            metadata.size_y
        );
        self.image = Some(metadata);
        Vec::new()
    }

    fn on_submit(&mut self) -> Vec<WorkflowEffect> {
        // Unsubmitted submits; Failed retries. Everything else is invalid.
        match self.submission_state {
            SubmissionState::Unsubmitted | SubmissionState::Failed => {}
            other => {
                log::warn!("submit requested in state {}; ignoring", other.name());
                return Vec::new();
            }
        }
        let Some(session) = self.session.as_mut() else {
            log::warn!("submit requested without an active session; ignoring");
            return Vec::new();
        };

        let stop_time = Utc::now();
        session.stop_time = Some(stop_time);
        let payload = session.to_payload(stop_time);
        let annotation_id = session.annotation_id.clone();

        self.submission_state = SubmissionState::Submitting;
        log::debug!("submitting annotation {annotation_id}");
        vec![WorkflowEffect::SubmitAnnotation {
            generation: self.generation,
            annotation_id,
            payload,
        }]
    }

    fn on_failure(&mut self, generation: u64, error: &str, what: &str) -> Vec<WorkflowEffect> {
        if self.is_stale(generation, "failure") {
            return Vec::new();
        }
        // A transient failure is retryable; it must never look like Finished.
        log::error!("{what} failed: {error}");
        self.submission_state = SubmissionState::Failed;
        Vec::new()
    }

    fn is_stale(&self, generation: u64, what: &str) -> bool {
        if generation != self.generation {
            log::debug!(
                "discarding {what} for superseded generation {generation} (current {})",
                self.generation
            );
            true
        } else {
            false
        }
    }

    fn with_session(&mut self, what: &str, mutate: impl FnOnce(&mut AnnotationSession)) {
        match self.session.as_mut() {
            Some(session) => mutate(session),
            None => log::warn!("cannot {what}: no active session"),
        }
    }
}

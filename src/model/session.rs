//! The in-progress annotation session and its submission wire format.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::markup::MarkupArray;

/// Operator flag for an image.
///
/// Anything other than `Ok` marks the image as unsuitable for annotation and
/// is carried in the submission `status` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlagStatus {
    /// Image is usable
    #[default]
    Ok,
    /// Image contains personal health information
    Phi,
    /// Image quality is too low
    Quality,
    /// Insufficient zoom level
    Zoom,
    /// Inappropriate content
    Inappropriate,
    /// Other problem
    Other,
}

impl FlagStatus {
    /// Wire name of this flag.
    pub fn as_str(&self) -> &'static str {
        match self {
            FlagStatus::Ok => "ok",
            FlagStatus::Phi => "phi",
            FlagStatus::Quality => "quality",
            FlagStatus::Zoom => "zoom",
            FlagStatus::Inappropriate => "inappropriate",
            FlagStatus::Other => "other",
        }
    }
}

/// Lifecycle state of the submission workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubmissionState {
    /// Session is editable and has not been sent
    #[default]
    Unsubmitted,
    /// Submission request is in flight
    Submitting,
    /// Server accepted the submission
    Submitted,
    /// Submission or fetch failed; operator may retry or skip
    Failed,
    /// Queue is exhausted; no further fetches are made
    Finished,
}

impl SubmissionState {
    /// Get the display name for this state.
    pub fn name(&self) -> &'static str {
        match self {
            SubmissionState::Unsubmitted => "Unsubmitted",
            SubmissionState::Submitting => "Submitting",
            SubmissionState::Submitted => "Submitted",
            SubmissionState::Failed => "Failed",
            SubmissionState::Finished => "Finished",
        }
    }

    /// Whether the workflow is in the absorbing terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SubmissionState::Finished)
    }
}

/// One pending annotation unit, as returned by the task queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationUnit {
    /// Annotation identifier
    #[serde(rename = "_id")]
    pub id: String,
    /// Owning study
    pub study_id: String,
    /// Image to annotate
    pub image_id: String,
}

/// The in-progress annotation unit: one image, one operator pass.
///
/// Exclusively owned by the workflow store; created when the next unit is
/// fetched, discarded when submission completes or a new unit replaces it.
#[derive(Debug, Clone)]
pub struct AnnotationSession {
    /// Annotation identifier from the fetched unit
    pub annotation_id: String,
    /// Owning study
    pub study_id: String,
    /// Image under annotation
    pub image_id: String,
    /// Stamped when the unit was fetched
    pub start_time: DateTime<Utc>,
    /// Stamped when submission starts; always after `start_time`
    pub stop_time: Option<DateTime<Utc>>,
    /// Operator flag for the image
    pub flag_status: FlagStatus,
    /// Feature currently bound to the paint layer, if any
    pub active_feature_id: Option<String>,
    responses: BTreeMap<String, Value>,
    markups: BTreeMap<String, MarkupArray>,
}

impl AnnotationSession {
    /// Create a fresh session for a fetched unit.
    pub fn new(unit: &AnnotationUnit, start_time: DateTime<Utc>) -> Self {
        Self {
            annotation_id: unit.id.clone(),
            study_id: unit.study_id.clone(),
            image_id: unit.image_id.clone(),
            start_time,
            stop_time: None,
            flag_status: FlagStatus::default(),
            active_feature_id: None,
            responses: BTreeMap::new(),
            markups: BTreeMap::new(),
        }
    }

    /// Upsert the answer to a question.
    ///
    /// A `None`, null or empty-string answer removes the key entirely;
    /// unanswered questions are never stored, so they are never transmitted.
    pub fn record_response(&mut self, question_id: &str, answer: Option<Value>) {
        let removed = match answer {
            None | Some(Value::Null) => true,
            Some(Value::String(ref s)) if s.is_empty() => true,
            _ => false,
        };
        if removed {
            self.responses.remove(question_id);
        } else if let Some(value) = answer {
            self.responses.insert(question_id.to_string(), value);
        }
    }

    /// Upsert the markup array for a feature; `None` removes it entirely.
    pub fn record_markup(&mut self, feature_id: &str, markup: Option<MarkupArray>) {
        match markup {
            Some(values) => {
                self.markups.insert(feature_id.to_string(), values);
            }
            None => {
                self.markups.remove(feature_id);
            }
        }
    }

    /// Recorded responses, keyed by question id.
    pub fn responses(&self) -> &BTreeMap<String, Value> {
        &self.responses
    }

    /// Recorded markups, keyed by feature id.
    pub fn markups(&self) -> &BTreeMap<String, MarkupArray> {
        &self.markups
    }

    /// Ids of all features that currently have a markup recorded.
    pub fn marked_up_feature_ids(&self) -> Vec<&str> {
        self.markups.keys().map(String::as_str).collect()
    }

    /// Remove all recorded responses.
    pub fn reset_responses(&mut self) {
        self.responses.clear();
    }

    /// Remove all recorded markups.
    pub fn reset_markups(&mut self) {
        self.markups.clear();
    }

    /// Build the submission payload, stamping `stop_time`.
    ///
    /// Responses are stripped of null answers; `record_response` never stores
    /// them, but the strip keeps the wire guarantee independent of storage.
    pub fn to_payload(&self, stop_time: DateTime<Utc>) -> SubmissionPayload {
        let responses = self
            .responses
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        SubmissionPayload {
            status: self.flag_status,
            image_id: self.image_id.clone(),
            start_time: self.start_time.timestamp_millis(),
            stop_time: stop_time.timestamp_millis(),
            responses,
            markups: self.markups.clone(),
        }
    }
}

/// Wire shape of a submitted annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionPayload {
    /// Operator flag, `"ok"` for a normal submission
    pub status: FlagStatus,
    /// Image the annotation applies to
    pub image_id: String,
    /// Fetch timestamp, integer milliseconds since the epoch
    pub start_time: i64,
    /// Submission timestamp, integer milliseconds since the epoch
    pub stop_time: i64,
    /// Answered questions only
    pub responses: BTreeMap<String, Value>,
    /// Per-feature markup arrays
    pub markups: BTreeMap<String, MarkupArray>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::model::markup::MarkupState;

    fn test_unit() -> AnnotationUnit {
        AnnotationUnit {
            id: "ann-1".to_string(),
            study_id: "study-1".to_string(),
            image_id: "img-1".to_string(),
        }
    }

    #[test]
    fn test_null_response_removes_key() {
        let mut session = AnnotationSession::new(&test_unit(), Utc::now());
        session.record_response("q1", Some(json!("yes")));
        assert_eq!(session.responses().get("q1"), Some(&json!("yes")));

        session.record_response("q1", None);
        assert!(!session.responses().contains_key("q1"));

        session.record_response("q2", Some(Value::Null));
        assert!(!session.responses().contains_key("q2"));

        session.record_response("q3", Some(json!("")));
        assert!(!session.responses().contains_key("q3"));
    }

    #[test]
    fn test_markup_upsert_and_remove() {
        let mut session = AnnotationSession::new(&test_unit(), Utc::now());
        let mut markup = MarkupArray::absent(8);
        markup.set(3, MarkupState::Definite).unwrap();

        session.record_markup("f1", Some(markup.clone()));
        assert_eq!(session.marked_up_feature_ids(), vec!["f1"]);
        assert_eq!(session.markups().get("f1"), Some(&markup));

        session.record_markup("f1", None);
        assert!(session.markups().is_empty());
    }

    #[test]
    fn test_payload_never_contains_null_responses() {
        let mut session = AnnotationSession::new(&test_unit(), Utc::now());
        session.record_response("q1", Some(json!("yes")));
        session.record_response("q2", Some(Value::Null));

        let payload = session.to_payload(Utc::now());
        assert_eq!(payload.responses.len(), 1);
        assert!(payload.responses.values().all(|v| !v.is_null()));
    }

    #[test]
    fn test_payload_wire_shape() {
        let mut session = AnnotationSession::new(&test_unit(), Utc::now());
        session.record_markup("f1", Some(MarkupArray::absent(2)));
        let payload = session.to_payload(Utc::now());

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["imageId"], "img-1");
        assert!(json["startTime"].is_i64());
        assert!(json["stopTime"].is_i64());
        assert_eq!(json["markups"]["f1"], json!([0.0, 0.0]));
    }

    #[test]
    fn test_stop_time_after_start_time() {
        let session = AnnotationSession::new(&test_unit(), Utc::now());
        let payload = session.to_payload(Utc::now());
        assert!(payload.stop_time >= payload.start_time);
    }
}

//! Study metadata: the questions and annotatable features of one study.

use serde::{Deserialize, Serialize};

/// A named annotatable region-type.
///
/// Exactly one feature owns the paint-active markup array at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feature {
    /// Stable feature identifier, used as the markup map key
    pub id: String,
    /// Human-readable feature name
    pub name: String,
}

impl Feature {
    /// Create a new feature.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Input style of a study question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum QuestionKind {
    /// Single choice from a dropdown of options
    #[default]
    Select,
    /// Single choice from radio buttons
    Radio,
}

/// A study-level question whose answer goes into the session responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    /// Stable question identifier, used as the response map key
    pub id: String,
    /// Question text shown to the operator
    pub text: String,
    /// Input style
    #[serde(rename = "type", default)]
    pub kind: QuestionKind,
    /// Allowed answers for `Select`/`Radio` questions
    #[serde(default)]
    pub options: Vec<String>,
}

impl Question {
    /// Create a select question with the given options.
    pub fn select(
        id: impl Into<String>,
        text: impl Into<String>,
        options: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            kind: QuestionKind::Select,
            options: options.into_iter().map(Into::into).collect(),
        }
    }
}

/// One study: an image queue plus its questions and features.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Study {
    /// Study identifier
    #[serde(rename = "_id")]
    pub id: String,
    /// Study display name
    #[serde(default)]
    pub name: String,
    /// Study-level questions
    #[serde(default)]
    pub questions: Vec<Question>,
    /// Annotatable features
    #[serde(default)]
    pub features: Vec<Feature>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_study_wire_shape() {
        let json = r#"{
            "_id": "study-1",
            "name": "Lesion features",
            "questions": [
                {"id": "q1", "text": "Image quality?", "type": "select",
                 "options": ["good", "poor"]}
            ],
            "features": [
                {"id": "f1", "name": "Pigment network"}
            ]
        }"#;
        let study: Study = serde_json::from_str(json).unwrap();
        assert_eq!(study.id, "study-1");
        assert_eq!(study.questions.len(), 1);
        assert_eq!(study.questions[0].kind, QuestionKind::Select);
        assert_eq!(study.features[0].id, "f1");
    }

    #[test]
    fn test_missing_sections_default_empty() {
        let study: Study = serde_json::from_str(r#"{"_id": "s"}"#).unwrap();
        assert!(study.questions.is_empty());
        assert!(study.features.is_empty());
    }
}

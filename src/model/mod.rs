//! Data models for the annotation engine.

mod markup;
mod session;
mod study;

pub use markup::{MarkupArray, MarkupState, ABSENT_VALUE, DEFINITE_VALUE, POSSIBLE_VALUE};
pub use session::{
    AnnotationSession, AnnotationUnit, FlagStatus, SubmissionPayload, SubmissionState,
};
pub use study::{Feature, Question, QuestionKind, Study};

//! Studyhall decision engine.
//!
//! Everything here is pure and synchronous: the same message, thread and
//! history always produce the same [`Decision`] and [`PriorityScore`].

pub mod context;
pub mod detectors;
pub mod engine;
pub mod priority;
pub mod style;
pub mod types;

pub use context::ContextAnalyzer;
pub use detectors::SignalDetector;
pub use engine::DecisionEngine;
pub use priority::{FactorValue, PriorityCalculator, PriorityLevel, PriorityScore};
pub use style::system_prompt;
pub use types::{
    AcademicSignal, BehaviorMode, ConversationContext, Decision, QuestionKind, QuestionSignal,
    ResponseType, Signals, Subject, Tone,
};

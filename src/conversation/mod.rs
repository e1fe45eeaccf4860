//! The survey conversation core: durable states, triggers, and the engine
//! that drives one employee through one survey at a time.

pub mod engine;
pub mod state;

pub use engine::{ConversationEngine, EngineReply, Notifier};
pub use state::{ConversationData, ConversationState, ErrorKind, RenderDirective, SurveyTrigger};

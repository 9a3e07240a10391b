//! Conversation transcript built from a session's text events

mod aggregator;
mod turn;

pub use aggregator::ConversationAggregator;
pub use turn::{ConversationTurn, Speaker, Transcript};

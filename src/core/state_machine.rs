//! State machine for tracking an offer through the publishing workflow
//!
//! `Unknown → Created → Configured → Submitted → Promoted`
//!
//! An offer that already exists enters the machine through `Created` once its
//! product id is resolved. Configuring again after a submission is allowed,
//! which is how a new version of a live offer is prepared.

use crate::core::error::{PublishError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Offer publishing state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OfferState {
    Unknown,
    /// Product id assigned
    Created,
    /// Properties, listing, availability and packages set
    Configured,
    /// Submission id assigned
    Submitted,
    Promoted,
}

impl OfferState {
    /// States reachable from this one
    fn can_move_to(self, to: OfferState) -> bool {
        use OfferState::*;

        matches!(
            (self, to),
            (Unknown, Created)
                | (Created, Configured)
                | (Created, Submitted)
                | (Configured, Configured)
                | (Configured, Submitted)
                | (Submitted, Promoted)
                | (Submitted, Configured)
                | (Promoted, Configured)
                | (Promoted, Submitted)
        )
    }
}

impl fmt::Display for OfferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// State transition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StateTransition {
    /// From state
    pub from: OfferState,

    /// To state
    pub to: OfferState,

    /// Timestamp
    pub timestamp: DateTime<Utc>,

    /// Additional metadata (product id, submission id, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

/// State machine for tracking one offer
#[derive(Debug, Clone)]
pub struct OfferStateMachine {
    current_state: OfferState,
    transitions: Vec<StateTransition>,
}

impl Default for OfferStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl OfferStateMachine {
    /// Create a new state machine
    pub fn new() -> Self {
        Self {
            current_state: OfferState::Unknown,
            transitions: Vec::new(),
        }
    }

    /// Transition to a new state
    pub fn transition(
        &mut self,
        to: OfferState,
        metadata: Option<HashMap<String, serde_json::Value>>,
    ) -> Result<()> {
        if !self.current_state.can_move_to(to) {
            return Err(PublishError::InvalidStateTransition {
                from: self.current_state.to_string(),
                to: to.to_string(),
            });
        }

        self.transitions.push(StateTransition {
            from: self.current_state,
            to,
            timestamp: Utc::now(),
            metadata,
        });
        self.current_state = to;

        Ok(())
    }

    /// Mark an existing offer as created, no-op when already past that point
    pub fn ensure_created(&mut self, product_id: &str) -> Result<()> {
        if self.current_state != OfferState::Unknown {
            return Ok(());
        }

        let mut metadata = HashMap::new();
        metadata.insert(
            "product_id".to_string(),
            serde_json::Value::String(product_id.to_string()),
        );
        self.transition(OfferState::Created, Some(metadata))
    }

    /// Get current state
    pub fn get_state(&self) -> OfferState {
        self.current_state
    }

    pub fn transitions(&self) -> &[StateTransition] {
        &self.transitions
    }

    /// Get elapsed time since start
    pub fn get_elapsed_time(&self) -> i64 {
        match (self.transitions.first(), self.transitions.last()) {
            (Some(first), Some(last)) => (last.timestamp - first.timestamp).num_milliseconds(),
            _ => 0,
        }
    }

    /// Get transition history as human-readable string
    pub fn get_history(&self) -> String {
        self.transitions
            .iter()
            .map(|t| {
                let time = t.timestamp.to_rfc3339();
                let meta = if let Some(metadata) = &t.metadata {
                    format!(" ({})", serde_json::to_string(metadata).unwrap_or_default())
                } else {
                    String::new()
                };
                format!("{}: {:?} → {:?}{}", time, t.from, t.to, meta)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_machine() {
        let state_machine = OfferStateMachine::new();

        assert_eq!(state_machine.get_state(), OfferState::Unknown);
        assert_eq!(state_machine.get_elapsed_time(), 0);
    }

    #[test]
    fn test_full_lifecycle() {
        let mut state_machine = OfferStateMachine::new();

        state_machine.transition(OfferState::Created, None).unwrap();
        state_machine.transition(OfferState::Configured, None).unwrap();
        state_machine.transition(OfferState::Submitted, None).unwrap();
        state_machine.transition(OfferState::Promoted, None).unwrap();

        assert_eq!(state_machine.get_state(), OfferState::Promoted);
        assert_eq!(state_machine.transitions().len(), 4);
    }

    #[test]
    fn test_invalid_transition() {
        let mut state_machine = OfferStateMachine::new();

        let result = state_machine.transition(OfferState::Promoted, None);

        match result {
            Err(PublishError::InvalidStateTransition { from, to }) => {
                assert_eq!(from, "Unknown");
                assert_eq!(to, "Promoted");
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(state_machine.get_state(), OfferState::Unknown);
    }

    #[test]
    fn test_promote_requires_submission() {
        let mut state_machine = OfferStateMachine::new();
        state_machine.transition(OfferState::Created, None).unwrap();
        state_machine.transition(OfferState::Configured, None).unwrap();

        assert!(state_machine.transition(OfferState::Promoted, None).is_err());
    }

    #[test]
    fn test_ensure_created_records_product_id() {
        let mut state_machine = OfferStateMachine::new();

        state_machine.ensure_created("prod-1").unwrap();
        state_machine.ensure_created("prod-1").unwrap();

        assert_eq!(state_machine.get_state(), OfferState::Created);
        assert_eq!(state_machine.transitions().len(), 1);
        assert!(state_machine.get_history().contains("prod-1"));
    }

    #[test]
    fn test_get_history() {
        let mut state_machine = OfferStateMachine::new();

        state_machine.transition(OfferState::Created, None).unwrap();
        state_machine.transition(OfferState::Configured, None).unwrap();

        let history = state_machine.get_history();
        assert!(history.contains("Unknown → Created"));
        assert!(history.contains("Created → Configured"));
    }
}

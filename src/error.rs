//! Error types for epsilon removal.

use rustfst::StateId;
use std::fmt;
use thiserror::Error;

/// Which tape of the transducer a symbol table belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Input,
    Output,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Side::Input => write!(f, "input"),
            Side::Output => write!(f, "output"),
        }
    }
}

/// Everything that can make [`crate::remove_epsilons`] refuse or abort.
#[derive(Error, Debug)]
pub enum RmEpsilonError {
    /// The transducer has no symbol table on this side
    #[error("no {side} symbol table attached to the fst")]
    MissingSymbolTable { side: Side },

    /// The symbol table exists but does not define `<eps>`
    #[error("{side} symbol table has no epsilon symbol")]
    MissingEpsilon { side: Side },

    /// The start state does not exist
    #[error("start state {start} is out of range (fst has {num_states} states)")]
    InvalidStart { start: StateId, num_states: usize },

    /// A closure was requested for a state that does not exist
    #[error("state {state} is out of range (fst has {num_states} states)")]
    UnknownState { state: StateId, num_states: usize },

    /// A transition points at a state that does not exist
    #[error("transition {state} -> {nextstate} leaves the state range (fst has {num_states} states)")]
    DanglingTransition {
        state: StateId,
        nextstate: StateId,
        num_states: usize,
    },

    /// An epsilon cycle was found while cycles are configured to be rejected
    #[error("epsilon cycle through state {state}")]
    EpsilonCycle { state: StateId },

    /// Errors raised by rustfst (weight arithmetic, fst mutation, connect)
    #[error(transparent)]
    Fst(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, RmEpsilonError>;

//! Epsilon removal for weighted finite-state transducers.
//!
//! [`remove_epsilons`] takes any [`rustfst`] fst and builds a new one that
//! defines the same weighted relation but has no transition whose input and
//! output labels are both epsilon. Weights are combined with the fst's own
//! [`rustfst::Semiring`], so tropical, log, probability and string weights
//! all work.
//!
//! ```
//! use rustfst::prelude::*;
//! use std::sync::Arc;
//!
//! # fn main() -> rmeps::Result<()> {
//! let mut fst = VectorFst::<TropicalWeight>::new();
//! fst.set_input_symbols(Arc::new(rmeps::symbol_table(vec!["a"])));
//! fst.set_output_symbols(Arc::new(rmeps::symbol_table(vec!["a"])));
//! fst.add_states(2);
//! fst.set_start(0)?;
//! fst.add_tr(0, Tr::new(0, 0, 3.0, 1))?;
//! fst.set_final(1, 2.0)?;
//!
//! let res: VectorFst<TropicalWeight> = rmeps::remove_epsilons(&fst)?;
//! assert_eq!(res.num_states(), 1);
//! assert_eq!(res.final_weight(0)?, Some(TropicalWeight::new(5.0)));
//! # Ok(())
//! # }
//! ```
//!
//! With the `python` feature the crate also builds a Python extension
//! module exposing the same operation.

pub mod closure;
pub mod config;
pub mod eliminate;
pub mod error;
pub mod symbols;

#[cfg(feature = "python")]
pub mod python;

pub use crate::closure::{ClosureMap, EpsilonClosure};
pub use crate::config::{EpsilonCycles, RmEpsilonConfig};
pub use crate::eliminate::{remove_epsilons, remove_epsilons_with_config};
pub use crate::error::{Result, RmEpsilonError, Side};
pub use crate::symbols::{symbol_table, EpsilonLabels};

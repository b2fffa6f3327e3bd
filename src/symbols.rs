use rustfst::prelude::*;
use std::sync::Arc;

use crate::error::{Result, RmEpsilonError, Side};

/// Builds a symbol table holding `<eps>` at label 0 followed by `sigma`
/// in order.
///
/// # Example
///
/// ```
/// let symt = rmeps::symbol_table(vec!["a", "b", "c"]);
/// assert_eq!(symt.get_symbol(1), Some("a"));
/// assert_eq!(symt.get_label("<eps>"), Some(0));
/// ```
pub fn symbol_table<S, I>(sigma: I) -> SymbolTable
where
    S: Into<String>,
    I: IntoIterator<Item = S>,
{
    let mut symt = SymbolTable::new();
    symt.add_symbols(sigma);
    symt
}

/// The epsilon label of each tape, as defined by the attached symbol tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpsilonLabels {
    pub input: Label,
    pub output: Label,
}

impl EpsilonLabels {
    /// Looks up `<eps>` in both symbol tables of `fst`.
    pub fn from_fst<W: Semiring, F: Fst<W>>(fst: &F) -> Result<Self> {
        Ok(EpsilonLabels {
            input: epsilon_label(fst.input_symbols(), Side::Input)?,
            output: epsilon_label(fst.output_symbols(), Side::Output)?,
        })
    }

    /// True only when both labels are epsilon. A transition with epsilon
    /// on a single tape is a regular transition.
    pub fn is_epsilon<W: Semiring>(&self, tr: &Tr<W>) -> bool {
        tr.ilabel == self.input && tr.olabel == self.output
    }
}

fn epsilon_label(symt: Option<&Arc<SymbolTable>>, side: Side) -> Result<Label> {
    let symt = symt.ok_or(RmEpsilonError::MissingSymbolTable { side })?;
    symt.get_label(EPS_SYMBOL)
        .ok_or(RmEpsilonError::MissingEpsilon { side })
}

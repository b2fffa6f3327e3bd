use log::debug;
use rustfst::algorithms::{connect, tr_sort};
use rustfst::prelude::*;
use std::sync::Arc;

use crate::closure::EpsilonClosure;
use crate::config::RmEpsilonConfig;
use crate::error::{Result, RmEpsilonError};
use crate::symbols::EpsilonLabels;

/// Removes epsilon transitions from an fst.
///
/// Returns a new epsilon-free fst accepting the same weighted relation and
/// leaves `fst` untouched. The result is connected and its transitions are
/// sorted by input label. Epsilon is whatever label `<eps>` has in the
/// symbol tables of `fst`; both tables must be present.
///
/// # Example
///
/// ```
/// use rustfst::prelude::*;
/// use std::sync::Arc;
///
/// # fn main() -> rmeps::Result<()> {
/// let mut fst = VectorFst::<TropicalWeight>::new();
/// fst.set_input_symbols(Arc::new(rmeps::symbol_table(vec!["a"])));
/// fst.set_output_symbols(Arc::new(rmeps::symbol_table(vec!["a"])));
/// fst.add_states(3);
/// fst.set_start(0)?;
/// fst.add_tr(0, Tr::new(0, 0, 2.0, 1))?;
/// fst.add_tr(1, Tr::new(1, 1, 3.0, 2))?;
/// fst.set_final(2, 0.0)?;
///
/// let res: VectorFst<TropicalWeight> = rmeps::remove_epsilons(&fst)?;
/// assert_eq!(res.num_states(), 2);
/// assert_eq!(res.get_trs(0)?.trs(), &[Tr::<TropicalWeight>::new(1, 1, 5.0, 1)]);
/// # Ok(())
/// # }
/// ```
pub fn remove_epsilons<W, F, O>(fst: &F) -> Result<O>
where
    W: Semiring,
    F: ExpandedFst<W>,
    O: MutableFst<W>,
{
    remove_epsilons_with_config(fst, &RmEpsilonConfig::default())
}

/// Same as [`remove_epsilons`] with explicit cycle handling and
/// post-processing.
pub fn remove_epsilons_with_config<W, F, O>(fst: &F, config: &RmEpsilonConfig) -> Result<O>
where
    W: Semiring,
    F: ExpandedFst<W>,
    O: MutableFst<W>,
{
    let labels = EpsilonLabels::from_fst(fst)?;
    let num_states = fst.num_states();

    let mut res = O::new();
    if let Some(symt) = fst.input_symbols() {
        res.set_input_symbols(Arc::new(SymbolTable::clone(symt)));
    }
    if let Some(symt) = fst.output_symbols() {
        res.set_output_symbols(Arc::new(SymbolTable::clone(symt)));
    }

    // One new state per old state, same final weight.
    let mut old_to_new: Vec<StateId> = Vec::with_capacity(num_states);
    let mut new_to_old: Vec<StateId> = Vec::with_capacity(num_states);
    for old in 0..num_states {
        let new = res.add_state();
        if let Some(w) = fst.final_weight(old)? {
            res.set_final(new, w)?;
        }
        old_to_new.push(new);
        new_to_old.push(old);
    }
    if let Some(start) = fst.start() {
        let new_start = *old_to_new
            .get(start)
            .ok_or(RmEpsilonError::InvalidStart { start, num_states })?;
        res.set_start(new_start)?;
    }

    let retarget = |state: StateId, tr: &Tr<W>| -> Result<StateId> {
        old_to_new
            .get(tr.nextstate)
            .copied()
            .ok_or(RmEpsilonError::DanglingTransition {
                state,
                nextstate: tr.nextstate,
                num_states,
            })
    };

    // Copy the non-epsilon transitions and fill the closure cache.
    let mut closure = EpsilonClosure::new(fst, labels, config.cycles);
    let mut num_dropped = 0;
    for old in 0..num_states {
        for tr in fst.get_trs(old)?.trs() {
            if labels.is_epsilon(tr) {
                num_dropped += 1;
                continue;
            }
            let next = retarget(old, tr)?;
            res.add_tr(
                old_to_new[old],
                Tr::new(tr.ilabel, tr.olabel, tr.weight.clone(), next),
            )?;
        }
        closure.compute(old)?;
    }

    // Splice in what the epsilon paths lead to.
    let mut num_added = 0;
    for (new, &old) in new_to_old.iter().enumerate() {
        let cl = match closure.get(old) {
            Some(cl) => cl,
            None => continue,
        };
        for (&target, path_weight) in cl {
            if let Some(final_weight) = fst.final_weight(target)? {
                if !final_weight.is_zero() {
                    let current = res.final_weight(new)?.unwrap_or_else(W::zero);
                    res.set_final(new, current.plus(path_weight.times(&final_weight)?)?)?;
                }
            }
            for tr in fst.get_trs(target)?.trs() {
                if labels.is_epsilon(tr) {
                    continue;
                }
                let next = retarget(target, tr)?;
                res.add_tr(
                    new,
                    Tr::new(tr.ilabel, tr.olabel, path_weight.times(&tr.weight)?, next),
                )?;
                num_added += 1;
            }
        }
    }

    debug!(
        "removed {} epsilon transitions from {} states, added {}",
        num_dropped, num_states, num_added
    );

    if config.connect {
        connect(&mut res)?;
    }
    if config.sort {
        tr_sort(&mut res, ILabelCompare {});
    }
    debug!("epsilon-free fst has {} states", res.num_states());

    Ok(res)
}

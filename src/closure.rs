//! Weighted epsilon closures.
//!
//! The closure of a state maps every state reachable through epsilon
//! transitions only to the `plus`-sum of the weights of those paths.
//! Closures are computed on demand and cached for the lifetime of one
//! [`EpsilonClosure`].
//!
//! The epsilon subgraph is walked with Tarjan's algorithm. Strongly
//! connected components finish in reverse topological order, so when a
//! component is closed every component it leads to is closed already.
//! Inside a component that contains a cycle, only paths of at most as many
//! transitions as the component has states are summed. Every state
//! reachable through the cycle still ends up in the closure, and when going
//! round a cycle can never improve a path (tropical weights that are not
//! negative) the weights are exact.

use log::{debug, trace};
use rustfst::prelude::*;
use std::collections::BTreeMap;

use crate::config::EpsilonCycles;
use crate::error::{Result, RmEpsilonError};
use crate::symbols::EpsilonLabels;

/// Closure of one state: destination -> accumulated path weight.
pub type ClosureMap<W> = BTreeMap<StateId, W>;

/// A state on the depth-first stack with its epsilon successors.
struct Frame<W> {
    state: StateId,
    trs: Vec<(StateId, W)>,
    pos: usize,
}

/// Per-call cache of epsilon closures over a read-only fst.
///
/// Closures live in an arena indexed by state id. Once a state's closure
/// is stored it is never written again.
pub struct EpsilonClosure<'a, W: Semiring, F: ExpandedFst<W>> {
    fst: &'a F,
    labels: EpsilonLabels,
    cycles: EpsilonCycles,
    closures: Vec<Option<ClosureMap<W>>>,
    // Tarjan numbering, only read for states whose closure is not stored.
    index: Vec<Option<usize>>,
    lowlink: Vec<usize>,
    on_stack: Vec<bool>,
    next_index: usize,
}

impl<'a, W: Semiring, F: ExpandedFst<W>> EpsilonClosure<'a, W, F> {
    pub fn new(fst: &'a F, labels: EpsilonLabels, cycles: EpsilonCycles) -> Self {
        let num_states = fst.num_states();
        EpsilonClosure {
            fst,
            labels,
            cycles,
            closures: vec![None; num_states],
            index: vec![None; num_states],
            lowlink: vec![0; num_states],
            on_stack: vec![false; num_states],
            next_index: 0,
        }
    }

    /// The cached closure of `state`, if it has been computed.
    pub fn get(&self, state: StateId) -> Option<&ClosureMap<W>> {
        self.closures.get(state).and_then(|c| c.as_ref())
    }

    /// Computes and caches the closure of `state` and of every state its
    /// epsilon transitions lead to. Does nothing if already computed.
    ///
    /// The traversal keeps its own stack, so arbitrarily long epsilon
    /// chains do not grow the call stack.
    pub fn compute(&mut self, state: StateId) -> Result<()> {
        let num_states = self.closures.len();
        if state >= num_states {
            return Err(RmEpsilonError::UnknownState { state, num_states });
        }
        if self.closures[state].is_some() {
            return Ok(());
        }

        let mut component = Vec::new();
        let mut stack = vec![self.visit(state, &mut component)?];

        while let Some(frame) = stack.last_mut() {
            match frame.trs.get(frame.pos).map(|&(next, _)| next) {
                Some(next) => {
                    frame.pos += 1;
                    let current = frame.state;
                    if self.closures[next].is_some() {
                        continue;
                    }
                    match self.index[next] {
                        None => {
                            let child = self.visit(next, &mut component)?;
                            stack.push(child);
                        }
                        Some(index) if self.on_stack[next] => {
                            self.lowlink[current] = self.lowlink[current].min(index);
                        }
                        Some(_) => {}
                    }
                }
                None => {
                    let done = frame.state;
                    stack.pop();
                    if let Some(parent) = stack.last() {
                        self.lowlink[parent.state] =
                            self.lowlink[parent.state].min(self.lowlink[done]);
                    }
                    if self.index[done] == Some(self.lowlink[done]) {
                        let mut members = Vec::new();
                        while let Some(s) = component.pop() {
                            self.on_stack[s] = false;
                            members.push(s);
                            if s == done {
                                break;
                            }
                        }
                        self.close(done, members)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn visit(&mut self, state: StateId, component: &mut Vec<StateId>) -> Result<Frame<W>> {
        self.index[state] = Some(self.next_index);
        self.lowlink[state] = self.next_index;
        self.next_index += 1;
        self.on_stack[state] = true;
        component.push(state);
        Ok(Frame {
            state,
            trs: self.epsilon_trs(state)?,
            pos: 0,
        })
    }

    /// The epsilon:epsilon transitions leaving `state`.
    fn epsilon_trs(&self, state: StateId) -> Result<Vec<(StateId, W)>> {
        let num_states = self.closures.len();
        let trs = self.fst.get_trs(state)?;
        let mut out = Vec::new();
        for tr in trs.trs().iter().filter(|tr| self.labels.is_epsilon(tr)) {
            if tr.nextstate >= num_states {
                return Err(RmEpsilonError::DanglingTransition {
                    state,
                    nextstate: tr.nextstate,
                    num_states,
                });
            }
            out.push((tr.nextstate, tr.weight.clone()));
        }
        Ok(out)
    }

    /// Stores the closures of a finished component rooted at `root`.
    fn close(&mut self, root: StateId, members: Vec<StateId>) -> Result<()> {
        let position: BTreeMap<StateId, usize> =
            members.iter().enumerate().map(|(i, &s)| (s, i)).collect();
        let trs = members
            .iter()
            .map(|&s| self.epsilon_trs(s))
            .collect::<Result<Vec<_>>>()?;

        let cyclic = members.len() > 1 || trs[0].iter().any(|&(next, _)| next == root);
        if cyclic {
            if self.cycles == EpsilonCycles::Reject {
                return Err(RmEpsilonError::EpsilonCycle { state: root });
            }
            debug!(
                "breaking epsilon cycle through {} states at {}",
                members.len(),
                root
            );
        }

        let mut closures = Vec::with_capacity(members.len());
        for &source in &members {
            let inner = paths_within(source, &position, &trs)?;
            let mut closure = inner.clone();
            for (i, &via) in members.iter().enumerate() {
                // Weight of getting from `source` to `via` without leaving
                // the component, the empty path included.
                let prefix = match (via == source, inner.get(&via)) {
                    (true, Some(w)) => W::one().plus(w)?,
                    (true, None) => W::one(),
                    (false, Some(w)) => w.clone(),
                    (false, None) => continue,
                };
                for (next, weight) in &trs[i] {
                    if position.contains_key(next) {
                        continue;
                    }
                    let step = prefix.times(weight)?;
                    if let Some(next_closure) = &self.closures[*next] {
                        for (&target, path_weight) in next_closure {
                            add(&mut closure, target, &step.times(path_weight)?)?;
                        }
                    }
                    add(&mut closure, *next, &step)?;
                }
            }
            trace!(
                "epsilon closure of state {} has {} entries",
                source,
                closure.len()
            );
            closures.push(closure);
        }

        for (state, closure) in members.into_iter().zip(closures) {
            self.closures[state] = Some(closure);
        }
        Ok(())
    }
}

/// Sums the paths of one up to `trs.len()` transitions that start at
/// `source` and never leave the component.
fn paths_within<W: Semiring>(
    source: StateId,
    position: &BTreeMap<StateId, usize>,
    trs: &[Vec<(StateId, W)>],
) -> Result<ClosureMap<W>> {
    let mut within = ClosureMap::new();
    let mut layer = ClosureMap::new();
    layer.insert(source, W::one());
    for _ in 0..trs.len() {
        let mut next_layer = ClosureMap::new();
        for (state, w) in &layer {
            for (next, weight) in &trs[position[state]] {
                if position.contains_key(next) {
                    add(&mut next_layer, *next, &w.times(weight)?)?;
                }
            }
        }
        if next_layer.is_empty() {
            break;
        }
        for (&state, w) in &next_layer {
            add(&mut within, state, w)?;
        }
        layer = next_layer;
    }
    Ok(within)
}

/// Records a path to `target`, summing with any path already recorded.
fn add<W: Semiring>(closure: &mut ClosureMap<W>, target: StateId, weight: &W) -> Result<()> {
    match closure.get_mut(&target) {
        Some(w) => w.plus_assign(weight)?,
        None => {
            closure.insert(target, weight.clone());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::symbol_table;
    use std::sync::Arc;

    const EPS: EpsilonLabels = EpsilonLabels { input: 0, output: 0 };

    fn fst_with_states<W: Semiring>(n: usize) -> VectorFst<W> {
        let mut fst = VectorFst::<W>::new();
        fst.set_input_symbols(Arc::new(symbol_table(vec!["a", "b"])));
        fst.set_output_symbols(Arc::new(symbol_table(vec!["a", "b"])));
        fst.add_states(n);
        fst
    }

    fn closure_of<W: Semiring>(
        fst: &VectorFst<W>,
        state: StateId,
        cycles: EpsilonCycles,
    ) -> Result<ClosureMap<W>> {
        let mut cl = EpsilonClosure::new(fst, EPS, cycles);
        cl.compute(state)?;
        Ok(cl.get(state).cloned().unwrap_or_default())
    }

    #[test_log::test]
    fn test_chain_multiplies_along_path() {
        let mut fst = fst_with_states::<TropicalWeight>(3);
        fst.add_tr(0, Tr::new(0, 0, 1.0, 1)).unwrap();
        fst.add_tr(1, Tr::new(0, 0, 2.0, 2)).unwrap();
        let cl = closure_of(&fst, 0, EpsilonCycles::Break).unwrap();
        assert_eq!(cl.len(), 2);
        assert_eq!(cl[&1], TropicalWeight::new(1.0));
        assert_eq!(cl[&2], TropicalWeight::new(3.0));
    }

    #[test_log::test]
    fn test_parallel_paths_are_summed() {
        let mut fst = fst_with_states::<ProbabilityWeight>(2);
        fst.add_tr(0, Tr::new(0, 0, 1.0, 1)).unwrap();
        fst.add_tr(0, Tr::new(0, 0, 4.0, 1)).unwrap();
        let cl = closure_of(&fst, 0, EpsilonCycles::Break).unwrap();
        assert_eq!(cl.len(), 1);
        assert_eq!(cl[&1], ProbabilityWeight::new(5.0));
    }

    #[test_log::test]
    fn test_diamond_sums_both_routes() {
        let mut fst = fst_with_states::<ProbabilityWeight>(4);
        fst.add_tr(0, Tr::new(0, 0, 0.5, 1)).unwrap();
        fst.add_tr(0, Tr::new(0, 0, 0.25, 2)).unwrap();
        fst.add_tr(1, Tr::new(0, 0, 0.5, 3)).unwrap();
        fst.add_tr(2, Tr::new(0, 0, 2.0, 3)).unwrap();
        let cl = closure_of(&fst, 0, EpsilonCycles::Break).unwrap();
        assert_eq!(cl[&3], ProbabilityWeight::new(0.75));
    }

    #[test_log::test]
    fn test_only_double_epsilon_is_followed() {
        let mut fst = fst_with_states::<TropicalWeight>(4);
        fst.add_tr(0, Tr::new(0, 1, 1.0, 1)).unwrap();
        fst.add_tr(0, Tr::new(2, 0, 1.0, 2)).unwrap();
        fst.add_tr(0, Tr::new(1, 1, 1.0, 3)).unwrap();
        let cl = closure_of(&fst, 0, EpsilonCycles::Break).unwrap();
        assert!(cl.is_empty());
    }

    #[test_log::test]
    fn test_closures_are_cached_for_successors() {
        let mut fst = fst_with_states::<TropicalWeight>(3);
        fst.add_tr(0, Tr::new(0, 0, 1.0, 1)).unwrap();
        fst.add_tr(1, Tr::new(0, 0, 1.0, 2)).unwrap();
        let mut cl = EpsilonClosure::new(&fst, EPS, EpsilonCycles::Break);
        cl.compute(0).unwrap();
        assert_eq!(cl.get(1).map(|c| c.len()), Some(1));
        assert_eq!(cl.get(2).map(|c| c.len()), Some(0));
        // Recomputing is a no-op.
        cl.compute(1).unwrap();
        assert_eq!(cl.get(1).map(|c| c.len()), Some(1));
    }

    #[test_log::test]
    fn test_cycle_is_broken() {
        let mut fst = fst_with_states::<TropicalWeight>(3);
        fst.add_tr(0, Tr::new(0, 0, 1.0, 1)).unwrap();
        fst.add_tr(1, Tr::new(0, 0, 2.0, 0)).unwrap();
        fst.add_tr(1, Tr::new(0, 0, 4.0, 2)).unwrap();
        let mut cl = EpsilonClosure::new(&fst, EPS, EpsilonCycles::Break);
        cl.compute(0).unwrap();

        let c0 = cl.get(0).unwrap();
        assert_eq!(c0[&1], TropicalWeight::new(1.0));
        assert_eq!(c0[&0], TropicalWeight::new(3.0));
        assert_eq!(c0[&2], TropicalWeight::new(5.0));

        // Both states of the cycle see each other and everything after it.
        let c1 = cl.get(1).unwrap();
        assert_eq!(c1[&0], TropicalWeight::new(2.0));
        assert_eq!(c1[&1], TropicalWeight::new(3.0));
        assert_eq!(c1[&2], TropicalWeight::new(4.0));
    }

    #[test_log::test]
    fn test_state_entered_mid_cycle_reaches_cycle_exits() {
        // 1 -> 0 -> 1 is a cycle and only 0 leaves it, towards 3.
        let mut fst = fst_with_states::<TropicalWeight>(4);
        fst.add_tr(1, Tr::new(0, 0, 1.0, 0)).unwrap();
        fst.add_tr(0, Tr::new(0, 0, 1.0, 1)).unwrap();
        fst.add_tr(0, Tr::new(0, 0, 1.0, 3)).unwrap();

        for &first in &[0, 1] {
            let mut cl = EpsilonClosure::new(&fst, EPS, EpsilonCycles::Break);
            cl.compute(first).unwrap();
            let c1 = cl.get(1).unwrap();
            assert_eq!(c1[&3], TropicalWeight::new(2.0), "from {}", first);
            assert_eq!(c1[&0], TropicalWeight::new(1.0), "from {}", first);
            let c0 = cl.get(0).unwrap();
            assert_eq!(c0[&3], TropicalWeight::new(1.0), "from {}", first);
        }
    }

    #[test_log::test]
    fn test_cycle_feeding_another_cycle() {
        let mut fst = fst_with_states::<TropicalWeight>(5);
        fst.add_tr(0, Tr::new(0, 0, 1.0, 1)).unwrap();
        fst.add_tr(1, Tr::new(0, 0, 1.0, 0)).unwrap();
        fst.add_tr(1, Tr::new(0, 0, 2.0, 2)).unwrap();
        fst.add_tr(2, Tr::new(0, 0, 1.0, 3)).unwrap();
        fst.add_tr(3, Tr::new(0, 0, 1.0, 2)).unwrap();
        fst.add_tr(3, Tr::new(0, 0, 5.0, 4)).unwrap();
        let cl = closure_of(&fst, 0, EpsilonCycles::Break).unwrap();
        let keys: Vec<StateId> = cl.keys().copied().collect();
        assert_eq!(keys, vec![0, 1, 2, 3, 4]);
        assert_eq!(cl[&4], TropicalWeight::new(9.0));
    }

    #[test_log::test]
    fn test_self_loop_terminates() {
        let mut fst = fst_with_states::<TropicalWeight>(1);
        fst.add_tr(0, Tr::new(0, 0, 1.0, 0)).unwrap();
        let cl = closure_of(&fst, 0, EpsilonCycles::Break).unwrap();
        assert_eq!(cl[&0], TropicalWeight::new(1.0));
    }

    #[test_log::test]
    fn test_cycle_rejected() {
        let mut fst = fst_with_states::<TropicalWeight>(2);
        fst.add_tr(0, Tr::new(0, 0, 1.0, 1)).unwrap();
        fst.add_tr(1, Tr::new(0, 0, 1.0, 0)).unwrap();
        match closure_of(&fst, 0, EpsilonCycles::Reject) {
            Err(RmEpsilonError::EpsilonCycle { state }) => assert_eq!(state, 0),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test_log::test]
    fn test_self_loop_rejected() {
        let mut fst = fst_with_states::<TropicalWeight>(2);
        fst.add_tr(0, Tr::new(0, 0, 1.0, 1)).unwrap();
        fst.add_tr(1, Tr::new(0, 0, 1.0, 1)).unwrap();
        match closure_of(&fst, 0, EpsilonCycles::Reject) {
            Err(RmEpsilonError::EpsilonCycle { state }) => assert_eq!(state, 1),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test_log::test]
    fn test_unknown_state() {
        let fst = fst_with_states::<TropicalWeight>(2);
        let mut cl = EpsilonClosure::new(&fst, EPS, EpsilonCycles::Break);
        match cl.compute(2) {
            Err(RmEpsilonError::UnknownState { state, num_states }) => {
                assert_eq!((state, num_states), (2, 2))
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test_log::test]
    fn test_dangling_epsilon_transition() {
        let mut fst = fst_with_states::<TropicalWeight>(2);
        fst.add_tr(0, Tr::new(0, 0, 1.0, 1)).unwrap();
        fst.add_tr(1, Tr::new(0, 0, 1.0, 9)).unwrap();
        match closure_of(&fst, 0, EpsilonCycles::Break) {
            Err(RmEpsilonError::DanglingTransition {
                state,
                nextstate,
                num_states,
            }) => assert_eq!((state, nextstate, num_states), (1, 9, 2)),
            other => panic!("unexpected {:?}", other),
        }
    }
}

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use rustfst::prelude::*;
use std::fmt::Display;
use std::sync::Arc;

use crate::eliminate::remove_epsilons;
use crate::error::RmEpsilonError;
use crate::symbols::symbol_table;

impl From<RmEpsilonError> for PyErr {
    fn from(e: RmEpsilonError) -> PyErr {
        PyValueError::new_err(e.to_string())
    }
}

fn value_error<E: Display>(e: E) -> PyErr {
    PyValueError::new_err(e.to_string())
}

/// Wraps a [`rustfst`] SymbolTable struct as a Python class.
#[pyclass]
pub struct SymTab {
    symt: SymbolTable,
}

#[pymethods]
impl SymTab {
    /// Constructs a new SymTab; `<eps>` gets label 0 and `sigma` follows.
    #[new]
    pub fn new(sigma: Vec<String>) -> Self {
        SymTab {
            symt: symbol_table(sigma),
        }
    }

    pub fn add_symbol(&mut self, s: &str) -> Label {
        self.symt.add_symbol(s)
    }

    pub fn get_label(&self, s: &str) -> Option<Label> {
        self.symt.get_label(s)
    }

    pub fn get_symbol(&self, l: Label) -> Option<&str> {
        self.symt.get_symbol(l)
    }
}

/// A tropical-weight transducer with labels addressed by symbol.
#[pyclass]
pub struct WeightedFst {
    fst: VectorFst<TropicalWeight>,
}

#[pymethods]
impl WeightedFst {
    #[new]
    pub fn new() -> Self {
        WeightedFst {
            fst: VectorFst::new(),
        }
    }

    pub fn set_input_symbols(&mut self, sym_vec: Vec<String>) {
        self.fst.set_input_symbols(Arc::new(symbol_table(sym_vec)))
    }

    pub fn set_output_symbols(&mut self, sym_vec: Vec<String>) {
        self.fst.set_output_symbols(Arc::new(symbol_table(sym_vec)))
    }

    pub fn add_states(&mut self, n: usize) {
        self.fst.add_states(n)
    }

    pub fn add_state(&mut self) -> StateId {
        self.fst.add_state()
    }

    pub fn num_states(&self) -> usize {
        self.fst.num_states()
    }

    pub fn num_trs(&self, state: StateId) -> PyResult<usize> {
        self.fst.num_trs(state).map_err(value_error)
    }

    pub fn start(&self) -> Option<StateId> {
        self.fst.start()
    }

    pub fn set_start(&mut self, state: StateId) -> PyResult<()> {
        self.fst.set_start(state).map_err(value_error)
    }

    pub fn set_final(&mut self, state: StateId, weight: f32) -> PyResult<()> {
        self.fst.set_final(state, weight).map_err(value_error)
    }

    /// The final weight of `state`, `None` when it is not final.
    pub fn final_weight(&self, state: StateId) -> PyResult<Option<f32>> {
        let w = self.fst.final_weight(state).map_err(value_error)?;
        Ok(w.map(|w| *w.value()))
    }

    pub fn add_tr(
        &mut self,
        isym: &str,
        osym: &str,
        source_state: StateId,
        next_state: StateId,
        weight: f32,
    ) -> PyResult<()> {
        let ilabel = lookup(self.fst.input_symbols(), isym)?;
        let olabel = lookup(self.fst.output_symbols(), osym)?;
        let tr = Tr::<TropicalWeight>::new(ilabel, olabel, weight, next_state);
        self.fst.add_tr(source_state, tr).map_err(value_error)
    }

    /// Returns an equivalent transducer without epsilon:epsilon transitions.
    pub fn rm_epsilon(&self) -> PyResult<WeightedFst> {
        let fst = remove_epsilons(&self.fst)?;
        Ok(WeightedFst { fst })
    }
}

fn lookup(symt: Option<&Arc<SymbolTable>>, sym: &str) -> PyResult<Label> {
    let symt = symt.ok_or_else(|| PyValueError::new_err("no symbol table set"))?;
    symt.get_label(sym)
        .ok_or_else(|| PyValueError::new_err(format!("unknown symbol {:?}", sym)))
}

#[pyfunction]
pub fn rm_epsilon(fst: &WeightedFst) -> PyResult<WeightedFst> {
    fst.rm_epsilon()
}

#[pyfunction]
pub fn tr_ilabel_sort(fst: &mut WeightedFst) {
    tr_sort(&mut fst.fst, ILabelCompare {})
}

#[pyfunction]
pub fn tr_olabel_sort(fst: &mut WeightedFst) {
    tr_sort(&mut fst.fst, OLabelCompare {})
}

#[pymodule]
#[pyo3(name = "rmeps")]
fn rmeps(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_class::<SymTab>()?;
    m.add_class::<WeightedFst>()?;
    m.add_function(wrap_pyfunction!(rm_epsilon, m)?)?;
    m.add_function(wrap_pyfunction!(tr_ilabel_sort, m)?)?;
    m.add_function(wrap_pyfunction!(tr_olabel_sort, m)?)?;
    Ok(())
}

//! Shared fixtures: a one-row spreadsheet workspace and a cell-edit memento.

#![allow(dead_code)]

use std::sync::Arc;

use pigment_history::{
    HistoryContext, HistoryWorkspace, Inverse, Memento, MementoBody, MementoData, MementoError, ToolType,
};

pub const PENCIL: ToolType = ToolType::from_static("pencil");

#[derive(Debug, Default)]
pub struct Ledger {
    pub cells: Vec<i64>,
    pub tool: Option<ToolType>,
    pub null_depth: usize,
}

impl Ledger {
    pub fn with_cells(cells: &[i64]) -> Self {
        Self {
            cells: cells.to_vec(),
            ..Default::default()
        }
    }
}

impl HistoryWorkspace for Ledger {
    fn active_tool(&self) -> Option<ToolType> {
        self.tool.clone()
    }

    fn set_tool(&mut self, tool: &ToolType) {
        self.tool = Some(tool.clone());
    }

    fn push_null_tool(&mut self) {
        self.null_depth += 1;
    }

    fn pop_null_tool(&mut self) {
        self.null_depth -= 1;
    }
}

/// Restores the value held in its payload into `cell`.
pub struct SetCell {
    pub cell: usize,
}

impl MementoBody<Ledger> for SetCell {
    fn on_undo(&mut self, data: &MementoData, ledger: &mut Ledger) -> Result<Inverse<Ledger>, MementoError> {
        let previous = data.require::<i64>()?;
        let current = ledger.cells[self.cell];
        ledger.cells[self.cell] = *previous;
        Ok(Inverse::new(SetCell { cell: self.cell }).with_data(data.persist_inverse(current)?))
    }
}

/// Write `value` into `cell` and return the memento that undoes it.
pub fn set_cell(ctx: &HistoryContext, ledger: &mut Ledger, cell: usize, value: i64, name: &str) -> Memento<Ledger> {
    let previous = ledger.cells[cell];
    ledger.cells[cell] = value;
    Memento::new(ctx, name, SetCell { cell }).with_data(ctx.persist(previous).unwrap())
}

pub fn context() -> Arc<HistoryContext> {
    Arc::new(HistoryContext::temporary().unwrap())
}

pub fn names<'a>(mementos: impl IntoIterator<Item = &'a Memento<Ledger>>) -> Vec<String> {
    mementos.into_iter().map(|m| m.name().to_string()).collect()
}

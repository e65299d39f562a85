//! Budgeted merge of retrieved units into one grounding block.

use std::collections::HashSet;

use docqa_core::error::{Error, Result};
use docqa_core::types::{AssembledContext, RetrievalResult, TextUnit};

pub const SEPARATOR: &str = "\n\n";

/// A unit as it appears in the context, with its provenance line.
pub fn render_unit(unit: &TextUnit) -> String {
    format!("[page {}, part {}]\n{}", unit.offset.page, unit.sequence_index, unit.text)
}

#[derive(Debug, Clone, Copy)]
pub struct ContextAssembler {
    budget: usize,
}

impl ContextAssembler {
    /// `budget` is counted in characters of the rendered context.
    pub fn new(budget: usize) -> Result<Self> {
        if budget == 0 {
            return Err(Error::InvalidConfig("context budget must be greater than zero".into()));
        }
        Ok(Self { budget })
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Take units best-first until the next one would overflow the budget, then
    /// lay the chosen ones out in document order.
    pub fn assemble(&self, results: &[RetrievalResult]) -> Result<AssembledContext> {
        let mut ranked: Vec<&RetrievalResult> = results.iter().collect();
        ranked.sort_by(|a, b| {
            b.score.total_cmp(&a.score).then_with(|| a.unit.sequence_index.cmp(&b.unit.sequence_index))
        });

        let sep = SEPARATOR.chars().count();
        let mut seen = HashSet::new();
        let mut picked: Vec<(&TextUnit, String)> = Vec::new();
        let mut used = 0usize;
        for r in ranked {
            if !seen.insert(r.unit.id.as_str()) {
                continue;
            }
            let rendered = render_unit(&r.unit);
            let cost = rendered.chars().count() + if picked.is_empty() { 0 } else { sep };
            if used + cost > self.budget {
                tracing::debug!(part = r.unit.sequence_index, used, budget = self.budget, "context budget reached");
                break;
            }
            used += cost;
            picked.push((&r.unit, rendered));
        }

        if picked.is_empty() {
            return Err(Error::EmptyContext);
        }
        picked.sort_by_key(|(unit, _)| unit.sequence_index);
        let source_units = picked.iter().map(|(unit, _)| unit.id.clone()).collect();
        let text = picked.into_iter().map(|(_, rendered)| rendered).collect::<Vec<_>>().join(SEPARATOR);
        Ok(AssembledContext { text, source_units })
    }
}

pub fn assemble(results: &[RetrievalResult], budget: usize) -> Result<AssembledContext> {
    ContextAssembler::new(budget)?.assemble(results)
}

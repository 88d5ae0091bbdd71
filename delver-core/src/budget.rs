//! Budget allocation across recursive fan-out.
//!
//! Splits a level's breadth budget as evenly as possible over the follow-up
//! queries actually proposed by a search task. Because every child allocation
//! is carved out of its parent's breadth, total fan-out at any level can
//! never exceed the root breadth; this is the resource control that keeps
//! the tree from exponential blow-up as depth increases.

use crate::types::ResearchBudget;

/// Allocates breadth budgets to child sub-queries.
#[derive(Debug, Default)]
pub struct BudgetAllocator;

impl BudgetAllocator {
    pub fn new() -> Self {
        Self
    }

    /// Split `parent_breadth` across `num_children` as evenly as possible.
    ///
    /// Returns one non-negative allocation per child, in order, summing to
    /// at most `parent_breadth`. When more children are proposed than there
    /// is breadth to give, the first `parent_breadth` children (in proposal
    /// order) receive 1 each and the rest receive 0; zero-allocation
    /// children are pruned by the caller, not deferred.
    pub fn allocate(&self, parent_breadth: usize, num_children: usize) -> Vec<usize> {
        if num_children == 0 {
            return Vec::new();
        }
        let base = parent_breadth / num_children;
        let remainder = parent_breadth % num_children;
        (0..num_children)
            .map(|i| base + usize::from(i < remainder))
            .collect()
    }

    /// Pair proposed follow-up queries with child budgets, descending one
    /// depth level and dropping pruned (zero-breadth) children.
    pub fn plan_children(
        &self,
        parent: ResearchBudget,
        follow_ups: &[String],
    ) -> Vec<(String, ResearchBudget)> {
        let allocations = self.allocate(parent.breadth, follow_ups.len());
        follow_ups
            .iter()
            .zip(allocations)
            .filter(|(_, breadth)| *breadth > 0)
            .map(|(text, breadth)| (text.clone(), parent.descend(breadth)))
            .collect()
    }
}

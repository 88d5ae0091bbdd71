//! Research tree scheduler — recursive, bounded fan-out with upward merge.
//!
//! The root query is expanded once into initial search sub-queries; breadth
//! is allocated over them and each becomes a tree node. A node runs one
//! search task, allocates child budgets over the summarizer's proposed
//! follow-ups, and recurses into the surviving children concurrently.
//! Siblings at a level run in parallel (breadth is the concurrency cap;
//! there is no separate global limit); a parent's task and its children are
//! sequenced because children depend on the parent's follow-up list. A
//! failing node is a leaf-local event: it contributes nothing upward but
//! never marks ancestors failed.

use crate::budget::BudgetAllocator;
use crate::collaborators::QueryGenerator;
use crate::dedup::DedupStore;
use crate::session::{NoOpCallback, ResearchCallback};
use crate::task::SearchTask;
use crate::types::{ResearchBudget, ResearchResult, SubQuery};
use futures::future::{join_all, BoxFuture};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Lifecycle state of one tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Created, not yet dispatched.
    Pending,
    /// Search task or children in flight.
    Running,
    /// Own task and all children resolved.
    Completed,
    /// Own task failed locally; no children were spawned.
    Failed,
}

/// Counters describing one finished tree traversal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeStats {
    /// Search tasks dispatched across the whole tree.
    pub tasks_dispatched: usize,
    /// Tasks that failed locally (provider, summarizer, or timeout).
    pub tasks_failed: usize,
    /// Nodes skipped because their budget was exhausted.
    pub nodes_pruned: usize,
}

/// Drives the recursive fan-out for one research tree.
pub struct TreeScheduler {
    task: SearchTask,
    generator: Arc<dyn QueryGenerator>,
    allocator: BudgetAllocator,
    store: Arc<DedupStore>,
    callback: Arc<dyn ResearchCallback>,
    dispatched: AtomicUsize,
    failed: AtomicUsize,
    pruned: AtomicUsize,
}

impl TreeScheduler {
    pub fn new(task: SearchTask, generator: Arc<dyn QueryGenerator>, store: Arc<DedupStore>) -> Self {
        Self::with_callback(task, generator, store, Arc::new(NoOpCallback))
    }

    pub fn with_callback(
        task: SearchTask,
        generator: Arc<dyn QueryGenerator>,
        store: Arc<DedupStore>,
        callback: Arc<dyn ResearchCallback>,
    ) -> Self {
        Self {
            task,
            generator,
            allocator: BudgetAllocator::new(),
            store,
            callback,
            dispatched: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            pruned: AtomicUsize::new(0),
        }
    }

    /// Run a research tree for `query` to completion and snapshot the store.
    ///
    /// Never fails: a generator outage or exhausted budget yields an empty
    /// result, and failing branches degrade to missing contributions.
    pub async fn run(&self, query: &str, budget: ResearchBudget) -> ResearchResult {
        info!(
            query,
            breadth = budget.breadth,
            depth = budget.depth,
            "Starting research tree"
        );

        if budget.is_exhausted() {
            debug!(query, "Budget exhausted before expansion, returning empty result");
            return self.store.snapshot();
        }

        // Expand the root query into the level-one sub-queries. Deeper
        // levels come from summarizer follow-ups instead.
        let proposals = match self.generator.generate_queries(query, budget.breadth).await {
            Ok(proposals) => proposals,
            Err(e) => {
                warn!(query, error = %e, "Query generation failed, tree degrades to empty");
                return self.store.snapshot();
            }
        };

        let root = SubQuery::root(query, budget);
        let nodes: Vec<SubQuery> = proposals
            .iter()
            .zip(self.allocator.allocate(budget.breadth, proposals.len()))
            .filter(|(_, breadth)| *breadth > 0)
            .map(|(text, breadth)| {
                // Level-one nodes keep the full depth; descent only starts
                // when a node spawns its own children.
                root.child(
                    text.clone(),
                    ResearchBudget {
                        breadth,
                        depth: budget.depth,
                    },
                )
            })
            .collect();

        debug!(query, nodes = nodes.len(), "Dispatching root-level sub-queries");
        join_all(nodes.into_iter().map(|node| self.run_node(node))).await;

        let stats = self.stats();
        info!(
            tasks_dispatched = stats.tasks_dispatched,
            tasks_failed = stats.tasks_failed,
            nodes_pruned = stats.nodes_pruned,
            sources = self.store.source_count(),
            findings = self.store.finding_count(),
            "Research tree complete"
        );

        self.store.snapshot()
    }

    /// Counters accumulated so far.
    pub fn stats(&self) -> TreeStats {
        TreeStats {
            tasks_dispatched: self.dispatched.load(Ordering::Relaxed),
            tasks_failed: self.failed.load(Ordering::Relaxed),
            nodes_pruned: self.pruned.load(Ordering::Relaxed),
        }
    }

    /// Execute one node: its search task, then its children concurrently.
    ///
    /// Boxed because the future recurses through itself for each child
    /// level.
    fn run_node(&self, sub_query: SubQuery) -> BoxFuture<'_, NodeState> {
        Box::pin(async move {
            // Base case: nothing left to spend. The node is a no-op leaf.
            if sub_query.budget.is_exhausted() {
                self.pruned.fetch_add(1, Ordering::Relaxed);
                debug!(query = sub_query.text.as_str(), "Budget exhausted, pruning node");
                return NodeState::Completed;
            }

            self.dispatched.fetch_add(1, Ordering::Relaxed);
            let result = self.task.run(&sub_query).await;

            let task_failed = result.error.is_some();
            if task_failed {
                self.failed.fetch_add(1, Ordering::Relaxed);
            }
            self.callback
                .on_task_completed(&sub_query.text, result.findings.len(), task_failed);

            // Children follow the summarizer's proposal order; allocation
            // truncation happens inside the allocator.
            let children = self
                .allocator
                .plan_children(sub_query.budget, &result.follow_up_queries);

            if !children.is_empty() {
                debug!(
                    query = sub_query.text.as_str(),
                    children = children.len(),
                    "Descending into child queries"
                );
                let child_runs = children
                    .into_iter()
                    .map(|(text, budget)| self.run_node(sub_query.child(text, budget)));
                join_all(child_runs).await;
            }

            // A failed task still counts as a resolved node; the failure is
            // local and the subtree (empty as it is) has completed.
            if task_failed {
                NodeState::Failed
            } else {
                NodeState::Completed
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::mock::{MockQueryGenerator, MockSearchProvider, MockSummarizer};
    use crate::collaborators::{SearchProvider, Summarizer};
    use crate::config::ResearchConfig;
    use crate::types::RawDocument;

    fn make_scheduler(
        generator: Arc<dyn QueryGenerator>,
        provider: Arc<dyn SearchProvider>,
        summarizer: Arc<dyn Summarizer>,
    ) -> (TreeScheduler, Arc<DedupStore>) {
        let store = Arc::new(DedupStore::new());
        let task = SearchTask::new(
            provider,
            summarizer,
            Arc::clone(&store),
            &ResearchConfig::default(),
        );
        (
            TreeScheduler::new(task, generator, Arc::clone(&store)),
            store,
        )
    }

    #[tokio::test]
    async fn test_depth_zero_yields_empty_result() {
        let provider = Arc::new(MockSearchProvider::new(2));
        let (scheduler, _) = make_scheduler(
            Arc::new(MockQueryGenerator::new()),
            provider.clone(),
            Arc::new(MockSummarizer::new()),
        );

        let result = scheduler
            .run("topic", ResearchBudget { breadth: 3, depth: 0 })
            .await;

        assert!(result.is_empty());
        assert_eq!(provider.call_count(), 0);
        assert_eq!(scheduler.stats().tasks_dispatched, 0);
    }

    #[tokio::test]
    async fn test_generator_failure_degrades_to_empty() {
        let provider = Arc::new(MockSearchProvider::new(2));
        let (scheduler, _) = make_scheduler(
            Arc::new(MockQueryGenerator::failing()),
            provider.clone(),
            Arc::new(MockSummarizer::new()),
        );

        let result = scheduler.run("topic", ResearchBudget::new(2, 2)).await;
        assert!(result.is_empty());
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_depth_one_runs_exactly_breadth_tasks() {
        let provider = Arc::new(MockSearchProvider::new(2));
        let (scheduler, _) = make_scheduler(
            Arc::new(MockQueryGenerator::new()),
            provider.clone(),
            Arc::new(MockSummarizer::new()),
        );

        let result = scheduler.run("topic", ResearchBudget::new(2, 1)).await;

        // Two root-level tasks; their children carry depth 0 and are pruned.
        assert_eq!(scheduler.stats().tasks_dispatched, 2);
        assert_eq!(result.visited_urls.len(), 4);
        assert!(result.learnings.len() <= 4 && !result.learnings.is_empty());
    }

    #[tokio::test]
    async fn test_fan_out_never_exceeds_level_breadth() {
        let provider = Arc::new(MockSearchProvider::new(4));
        let (scheduler, _) = make_scheduler(
            Arc::new(MockQueryGenerator::new()),
            provider.clone(),
            Arc::new(MockSummarizer::new()),
        );

        // Breadth 2, depth 2: two root-level tasks with breadth 1 each.
        // Each proposes up to 3 follow-ups but can fund only one child, so
        // level two also holds at most 2 tasks.
        scheduler.run("topic", ResearchBudget::new(2, 2)).await;

        assert_eq!(scheduler.stats().tasks_dispatched, 4);
        assert_eq!(scheduler.stats().tasks_failed, 0);
    }

    #[tokio::test]
    async fn test_sibling_failure_is_isolated() {
        // Three root-level queries; the middle one's provider call fails.
        let generator = Arc::new(MockQueryGenerator::new().with_queries(
            "root",
            vec!["alpha".into(), "beta".into(), "gamma".into()],
        ));
        let provider = Arc::new(MockSearchProvider::new(1).failing_for("beta"));
        let (scheduler, _) = make_scheduler(
            generator,
            provider.clone(),
            Arc::new(MockSummarizer::new()),
        );

        let result = scheduler.run("root", ResearchBudget::new(3, 1)).await;

        assert_eq!(scheduler.stats().tasks_dispatched, 3);
        assert_eq!(scheduler.stats().tasks_failed, 1);

        // The surviving siblings' findings made it into the result.
        assert!(result.learnings.iter().any(|l| l.contains("alpha")));
        assert!(result.learnings.iter().any(|l| l.contains("gamma")));
        assert!(!result.learnings.iter().any(|l| l.contains("beta")));
    }

    #[tokio::test]
    async fn test_no_follow_ups_terminates_branch() {
        let provider = Arc::new(MockSearchProvider::new(0));
        let (scheduler, _) = make_scheduler(
            Arc::new(MockQueryGenerator::new()),
            provider.clone(),
            Arc::new(MockSummarizer::new()),
        );

        // Zero documents means zero findings and zero follow-ups, so the
        // tree ends after level one regardless of remaining depth.
        let result = scheduler.run("topic", ResearchBudget::new(4, 5)).await;

        assert_eq!(scheduler.stats().tasks_dispatched, 4);
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_findings_across_branches_merge() {
        // Both root-level queries surface the same fact from different
        // URLs, and their children surface it again from a third mirror.
        let shared = |url: &str| RawDocument {
            url: url.into(),
            title: Some("shared".into()),
            content: "the same underlying fact".into(),
        };
        let generator = Arc::new(
            MockQueryGenerator::new()
                .with_queries("topic", vec!["left".into(), "right".into()]),
        );
        let provider = Arc::new(
            MockSearchProvider::new(1)
                .with_docs("left", vec![shared("https://a.example/1")])
                .with_docs("right", vec![shared("https://b.example/2")])
                .with_docs("more about shared", vec![shared("https://mirror.example/x")]),
        );
        let (scheduler, store) = make_scheduler(
            generator,
            provider.clone(),
            Arc::new(MockSummarizer::new()),
        );

        let result = scheduler.run("topic", ResearchBudget::new(2, 2)).await;

        // One merged finding, whichever branch registered it first.
        assert_eq!(result.learnings, vec!["the same underlying fact"]);
        let findings = store.findings();
        assert_eq!(findings[0].source_refs.len(), 3);
        assert_eq!(result.visited_urls.len(), 3);
    }

    #[tokio::test]
    async fn test_callback_sees_every_task() {
        use std::sync::Mutex;

        #[derive(Default)]
        struct RecordingCallback {
            completed: Mutex<Vec<(String, bool)>>,
        }

        impl ResearchCallback for RecordingCallback {
            fn on_task_completed(&self, query: &str, _findings: usize, failed: bool) {
                self.completed.lock().unwrap().push((query.to_string(), failed));
            }
        }

        let store = Arc::new(DedupStore::new());
        let task = SearchTask::new(
            Arc::new(MockSearchProvider::new(1)),
            Arc::new(MockSummarizer::new()),
            Arc::clone(&store),
            &ResearchConfig::default(),
        );
        let callback = Arc::new(RecordingCallback::default());
        let scheduler = TreeScheduler::with_callback(
            task,
            Arc::new(MockQueryGenerator::new()),
            Arc::clone(&store),
            Arc::clone(&callback) as Arc<dyn ResearchCallback>,
        );

        scheduler.run("topic", ResearchBudget::new(1, 2)).await;

        let seen = callback.completed.lock().unwrap();
        assert_eq!(seen.len(), scheduler.stats().tasks_dispatched);
        assert!(seen.iter().all(|(_, failed)| !failed));
    }
}

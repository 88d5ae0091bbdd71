//! Research engine — the top-level entry point of the pipeline.
//!
//! Owns the external collaborators and the configuration, and drives the
//! phases: plan -> compose root query -> research tree -> synthesize.
//! Every invocation gets its own dedup store, so multiple research runs
//! can execute concurrently in one process without cross-contamination.

use crate::collaborators::{QueryGenerator, QueryRefiner, ReportWriter, SearchProvider, Summarizer};
use crate::config::ResearchConfig;
use crate::dedup::DedupStore;
use crate::error::Result;
use crate::planner::{compose_root_query, Clarification, QueryPlanner};
use crate::scheduler::{TreeScheduler, TreeStats};
use crate::session::{NoOpCallback, ResearchCallback, ResearchPhase, ResearchSession};
use crate::synthesis::ReportSynthesizer;
use crate::task::SearchTask;
use crate::types::{ResearchBudget, ResearchResult};
use std::sync::Arc;
use tracing::info;

/// The outcome of a full engine run: the report plus everything that went
/// into it.
#[derive(Debug, Clone)]
pub struct ResearchRun {
    /// The synthesized report.
    pub report: String,
    /// The deduplicated findings and sources the report was written from.
    pub result: ResearchResult,
    /// Session bookkeeping for the run.
    pub session: ResearchSession,
}

/// The main research engine.
pub struct ResearchEngine {
    refiner: Arc<dyn QueryRefiner>,
    generator: Arc<dyn QueryGenerator>,
    provider: Arc<dyn SearchProvider>,
    summarizer: Arc<dyn Summarizer>,
    writer: Arc<dyn ReportWriter>,
    config: ResearchConfig,
    callback: Arc<dyn ResearchCallback>,
}

impl ResearchEngine {
    /// Create an engine from its collaborators and configuration.
    pub fn new(
        refiner: Arc<dyn QueryRefiner>,
        generator: Arc<dyn QueryGenerator>,
        provider: Arc<dyn SearchProvider>,
        summarizer: Arc<dyn Summarizer>,
        writer: Arc<dyn ReportWriter>,
        config: ResearchConfig,
    ) -> Self {
        Self {
            refiner,
            generator,
            provider,
            summarizer,
            writer,
            config,
            callback: Arc::new(NoOpCallback),
        }
    }

    /// Attach a progress callback.
    pub fn with_callback(mut self, callback: Arc<dyn ResearchCallback>) -> Self {
        self.callback = callback;
        self
    }

    /// The engine's research configuration.
    pub fn config(&self) -> &ResearchConfig {
        &self.config
    }

    /// Propose clarifying questions for a raw topic.
    ///
    /// A planner outage degrades to an empty list; research can proceed
    /// with the raw topic.
    pub async fn plan(&self, topic: &str) -> Vec<String> {
        let planner = QueryPlanner::new(
            Arc::clone(&self.refiner),
            self.config.clarifying_questions,
        );
        planner.plan(topic).await
    }

    /// Drive one research tree to completion.
    ///
    /// This is the core entry point: it never fails. Branch failures
    /// degrade to missing contributions, and an exhausted budget yields an
    /// empty result.
    pub async fn research(&self, query: &str, breadth: usize, depth: usize) -> ResearchResult {
        let (result, _) = self.research_with_stats(query, breadth, depth).await;
        result
    }

    /// Like [`research`](Self::research), also returning tree counters.
    pub async fn research_with_stats(
        &self,
        query: &str,
        breadth: usize,
        depth: usize,
    ) -> (ResearchResult, TreeStats) {
        let store = Arc::new(DedupStore::new());
        let task = SearchTask::new(
            Arc::clone(&self.provider),
            Arc::clone(&self.summarizer),
            Arc::clone(&store),
            &self.config,
        );
        let scheduler = TreeScheduler::with_callback(
            task,
            Arc::clone(&self.generator),
            store,
            Arc::clone(&self.callback),
        );

        let result = scheduler
            .run(query, ResearchBudget { breadth: breadth.max(1), depth })
            .await;
        (result, scheduler.stats())
    }

    /// Synthesize a report from an existing research result.
    ///
    /// The only failure the engine surfaces: a completed tree without a
    /// report is a user-visible failure.
    pub async fn synthesize(&self, result: &ResearchResult, query: &str) -> Result<String> {
        let synthesizer = ReportSynthesizer::new(Arc::clone(&self.writer));
        Ok(synthesizer.synthesize(result, query).await?)
    }

    /// Run the full pipeline with the configured default budget.
    ///
    /// `clarifications` are the answered planner questions the caller
    /// collected (possibly empty); they are folded into the root query.
    pub async fn run(
        &self,
        topic: &str,
        clarifications: &[Clarification],
    ) -> Result<ResearchRun> {
        self.run_with_budget(
            topic,
            clarifications,
            self.config.default_breadth,
            self.config.default_depth,
        )
        .await
    }

    /// Run the full pipeline with an explicit budget.
    pub async fn run_with_budget(
        &self,
        topic: &str,
        clarifications: &[Clarification],
        breadth: usize,
        depth: usize,
    ) -> Result<ResearchRun> {
        let query = compose_root_query(topic, clarifications);
        let budget = ResearchBudget::new(breadth, depth);
        let mut session = ResearchSession::new(query.clone(), budget);

        info!(
            session = %session.id,
            topic,
            breadth,
            depth,
            "Starting research run"
        );

        session.transition(ResearchPhase::Researching);
        self.callback.on_phase_change(ResearchPhase::Researching);
        let (result, stats) = self.research_with_stats(&query, breadth, depth).await;
        session.record_tasks(stats.tasks_dispatched, stats.tasks_failed);

        session.transition(ResearchPhase::Synthesizing);
        self.callback.on_phase_change(ResearchPhase::Synthesizing);
        let report = match self.synthesize(&result, &query).await {
            Ok(report) => report,
            Err(e) => {
                session.transition(ResearchPhase::Failed);
                self.callback.on_phase_change(ResearchPhase::Failed);
                return Err(e);
            }
        };

        session.transition(ResearchPhase::Complete);
        self.callback.on_phase_change(ResearchPhase::Complete);
        info!(
            session = %session.id,
            learnings = result.learnings.len(),
            sources = result.visited_urls.len(),
            tasks = session.tasks_dispatched,
            failed_tasks = session.tasks_failed,
            "Research run complete"
        );

        Ok(ResearchRun {
            report,
            result,
            session,
        })
    }
}

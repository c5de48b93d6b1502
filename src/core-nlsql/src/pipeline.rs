//! Question in, SQL out: catalog → prompt → generation → extraction.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use uuid::Uuid;

use crate::Config;
use crate::catalog::{Catalog, list_tables};
use crate::errors::PipelineError;
use crate::extract::{ExtractedQuery, extract};
use crate::llms::{GenerationError, Generator, Ollama, Prompt, prompt_text_to_sql};

/// Where a single request is. Requests only move forward; there are no retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    ListingTables,
    BuildingPrompt,
    AwaitingGeneration,
    Extracting,
    Done,
    Failed,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Idle => "idle",
            Stage::ListingTables => "listing-tables",
            Stage::BuildingPrompt => "building-prompt",
            Stage::AwaitingGeneration => "awaiting-generation",
            Stage::Extracting => "extracting",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// Per-request progress, only ever used for logging.
struct Progress {
    request: Uuid,
    stage: Stage,
}

impl Progress {
    fn start() -> Self {
        Self {
            request: Uuid::new_v4(),
            stage: Stage::Idle,
        }
    }

    fn advance(&mut self, next: Stage) {
        tracing::debug!("[request: {}] {} -> {}", self.request, self.stage, next);
        self.stage = next;
    }

    fn fail(&mut self, reason: &PipelineError) {
        tracing::debug!("[request: {}] {} -> {} ({})", self.request, self.stage, Stage::Failed, reason);
        self.stage = Stage::Failed;
    }
}

/// Turns natural-language questions into SQL.
///
/// Holds only configuration and its two collaborators, so one instance can serve any
/// number of concurrent requests.
pub struct Pipeline<C, G> {
    catalog: C,
    generator: G,
    catalog_timeout: Duration,
    generation_timeout: Duration,
}

/// What the HTTP server shares between handlers.
pub type SharedPipeline = Pipeline<Arc<dyn Catalog>, Arc<dyn Generator>>;

impl<C: Catalog> Pipeline<C, Ollama> {
    /// A pipeline generating through the configured endpoint.
    pub fn from_config(catalog: C, config: &Config) -> Self {
        Self::new(
            catalog,
            Ollama::from_config(config),
            config.catalog_timeout,
            config.generation_timeout,
        )
    }
}

impl<C: Catalog, G: Generator> Pipeline<C, G> {
    pub fn new(catalog: C, generator: G, catalog_timeout: Duration, generation_timeout: Duration) -> Self {
        Self {
            catalog,
            generator,
            catalog_timeout,
            generation_timeout,
        }
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    /// Answers `question` within the configured catalog and generation budgets.
    ///
    /// `Ok("")` means the model wrote an empty ```sql block.
    pub async fn answer(&self, question: &str) -> Result<String, PipelineError> {
        let budget = self.catalog_timeout.saturating_add(self.generation_timeout);
        self.answer_before(question, deadline_after(budget)).await
    }

    /// Like [`Pipeline::answer`], giving up on generation at `deadline`.
    /// Each stage is also held to its own configured budget.
    pub async fn answer_before(&self, question: &str, deadline: Instant) -> Result<String, PipelineError> {
        let mut progress = Progress::start();
        let result = self.run(question, deadline, &mut progress).await;
        match &result {
            Ok(sql) => {
                progress.advance(Stage::Done);
                tracing::debug!("[request: {}] extracted {} bytes of SQL", progress.request, sql.len());
            }
            Err(e) => progress.fail(e),
        }
        result
    }

    /// The prompt `question` would be sent as, with the catalog's current tables.
    pub async fn prompt_for(&self, question: &str) -> Result<Prompt, PipelineError> {
        let tables = list_tables(&self.catalog, deadline_after(self.catalog_timeout)).await;
        Ok(prompt_text_to_sql(question, &tables)?)
    }

    async fn run(&self, question: &str, deadline: Instant, progress: &mut Progress) -> Result<String, PipelineError> {
        progress.advance(Stage::ListingTables);
        let tables = list_tables(&self.catalog, self.stage_deadline(self.catalog_timeout, deadline)).await;

        progress.advance(Stage::BuildingPrompt);
        let prompt = prompt_text_to_sql(question, &tables)?;

        progress.advance(Stage::AwaitingGeneration);
        let generation_deadline = self.stage_deadline(self.generation_timeout, deadline);
        let budget = generation_deadline.saturating_duration_since(Instant::now());
        let response = match tokio::time::timeout_at(generation_deadline, self.generator.generate(&prompt)).await {
            Ok(response) => response?,
            Err(_) => return Err(GenerationError::Timeout(budget).into()),
        };

        progress.advance(Stage::Extracting);
        match extract(&response) {
            ExtractedQuery::Sql(sql) => Ok(sql),
            ExtractedQuery::NotFound => Err(PipelineError::ExtractionNotFound { response }),
        }
    }

    /// The earlier of `deadline` and `budget` from now.
    fn stage_deadline(&self, budget: Duration, deadline: Instant) -> Instant {
        std::cmp::min(deadline_after(budget), deadline)
    }
}

/// `budget` from now. Budgets too large to represent become roughly thirty years.
fn deadline_after(budget: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(budget)
        .unwrap_or_else(|| now + Duration::from_secs(86400 * 365 * 30))
}

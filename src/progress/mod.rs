//! Learner progress records and their roll-up into completion statistics.
//!
//! A learner owns at most one [`ProgressRecord`], created on their first
//! completion event. [`compute_stats`] turns a record plus the published
//! catalog sizes into per-category and overall percentages.

pub mod store;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub use store::{CatalogStore, MemoryStore, PgCatalogStore, PgProgressStore, ProgressStore, StoreError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProgressError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleEntry {
    pub module_id: String,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizEntry {
    pub quiz_id: String,
    pub score: u32,
    /// Absent on legacy attempts; absent counts as not passed
    #[serde(default)]
    pub passed: Option<bool>,
    pub completed_at: DateTime<Utc>,
}

impl QuizEntry {
    pub fn is_passed(&self) -> bool {
        self.passed == Some(true)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationEntry {
    pub simulation_id: String,
    #[serde(default)]
    pub outcome_data: Value,
    pub completed_at: DateTime<Utc>,
}

/// One learner's completions. Entries are unique by content id per category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    pub learner_id: String,
    #[serde(default)]
    pub modules: Vec<ModuleEntry>,
    #[serde(default)]
    pub quizzes: Vec<QuizEntry>,
    #[serde(default)]
    pub simulations: Vec<SimulationEntry>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// A single completion reported by a learner
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionEvent {
    Module {
        module_id: String,
    },
    Quiz {
        quiz_id: String,
        score: u32,
        passed: bool,
    },
    Simulation {
        simulation_id: String,
        outcome: Value,
    },
}

impl CompletionEvent {
    fn content_id(&self) -> &str {
        match self {
            CompletionEvent::Module { module_id } => module_id,
            CompletionEvent::Quiz { quiz_id, .. } => quiz_id,
            CompletionEvent::Simulation { simulation_id, .. } => simulation_id,
        }
    }

    pub fn validate(&self) -> Result<(), ProgressError> {
        if self.content_id().trim().is_empty() {
            return Err(ProgressError::InvalidInput("content id must not be empty".to_string()));
        }
        if let CompletionEvent::Quiz { score, .. } = self {
            if *score > 100 {
                return Err(ProgressError::InvalidInput(format!(
                    "quiz score {} is outside 0..=100",
                    score
                )));
            }
        }
        Ok(())
    }
}

impl ProgressRecord {
    /// The zero-state used when a learner has no record yet
    pub fn empty(learner_id: impl Into<String>) -> Self {
        Self {
            learner_id: learner_id.into(),
            modules: Vec::new(),
            quizzes: Vec::new(),
            simulations: Vec::new(),
            updated_at: None,
        }
    }

    pub fn apply(&mut self, event: CompletionEvent, at: DateTime<Utc>) -> Result<(), ProgressError> {
        event.validate()?;

        match event {
            CompletionEvent::Module { module_id } => self.complete_module(module_id, at),
            CompletionEvent::Quiz { quiz_id, score, passed } => self.record_quiz(quiz_id, score, passed, at),
            CompletionEvent::Simulation { simulation_id, outcome } => {
                self.complete_simulation(simulation_id, outcome, at)
            }
        }
        self.updated_at = Some(at);
        Ok(())
    }

    pub fn complete_module(&mut self, module_id: String, at: DateTime<Utc>) {
        match self.modules.iter_mut().find(|e| e.module_id == module_id) {
            Some(entry) => entry.completed_at = at,
            None => self.modules.push(ModuleEntry { module_id, completed_at: at }),
        }
    }

    /// Record a quiz attempt; a retake overwrites the previous score and outcome
    pub fn record_quiz(&mut self, quiz_id: String, score: u32, passed: bool, at: DateTime<Utc>) {
        match self.quizzes.iter_mut().find(|e| e.quiz_id == quiz_id) {
            Some(entry) => {
                entry.score = score;
                entry.passed = Some(passed);
                entry.completed_at = at;
            }
            None => self.quizzes.push(QuizEntry {
                quiz_id,
                score,
                passed: Some(passed),
                completed_at: at,
            }),
        }
    }

    pub fn complete_simulation(&mut self, simulation_id: String, outcome: Value, at: DateTime<Utc>) {
        match self.simulations.iter_mut().find(|e| e.simulation_id == simulation_id) {
            Some(entry) => {
                entry.outcome_data = outcome;
                entry.completed_at = at;
            }
            None => self.simulations.push(SimulationEntry {
                simulation_id,
                outcome_data: outcome,
                completed_at: at,
            }),
        }
    }

    pub fn completed_modules(&self) -> u64 {
        self.modules.len() as u64
    }

    pub fn passed_quizzes(&self) -> u64 {
        self.quizzes.iter().filter(|q| q.is_passed()).count() as u64
    }

    pub fn completed_simulations(&self) -> u64 {
        self.simulations.len() as u64
    }
}

/// Published content counts per category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogTotals {
    pub modules: u64,
    pub quizzes: u64,
    pub simulations: u64,
}

impl CatalogTotals {
    pub fn new(modules: u64, quizzes: u64, simulations: u64) -> Self {
        Self { modules, quizzes, simulations }
    }

    /// Build from raw store counts, rejecting negatives
    pub fn try_from_counts(modules: i64, quizzes: i64, simulations: i64) -> Result<Self, ProgressError> {
        let check = |name: &str, n: i64| {
            u64::try_from(n).map_err(|_| ProgressError::InvalidInput(format!("negative {} total: {}", name, n)))
        };
        Ok(Self {
            modules: check("modules", modules)?,
            quizzes: check("quizzes", quizzes)?,
            simulations: check("simulations", simulations)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryStats {
    pub total: u64,
    pub completed: u64,
    pub percentage: u64,
}

impl CategoryStats {
    pub fn new(completed: u64, total: u64) -> Self {
        Self {
            total,
            completed,
            percentage: percentage(completed, total),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub modules: CategoryStats,
    pub quizzes: CategoryStats,
    pub simulations: CategoryStats,
    pub overall: u64,
}

impl Stats {
    /// Cap every category percentage at 100 for display and re-average
    /// `overall` from the capped values. Counts are left untouched.
    pub fn clamped(mut self) -> Self {
        for category in [&mut self.modules, &mut self.quizzes, &mut self.simulations] {
            category.percentage = category.percentage.min(100);
        }
        self.overall = overall_percentage(&self.modules, &self.quizzes, &self.simulations);
        self
    }
}

/// `round(completed / total * 100)` with ties rounding up; 0 when `total` is 0.
/// Not clamped: completions of since-unpublished content can push this past 100.
pub fn percentage(completed: u64, total: u64) -> u64 {
    if total == 0 {
        return 0;
    }
    (200 * completed + total) / (2 * total)
}

/// Unweighted mean of three category percentages, ties rounding up
fn overall_percentage(modules: &CategoryStats, quizzes: &CategoryStats, simulations: &CategoryStats) -> u64 {
    let sum = modules.percentage + quizzes.percentage + simulations.percentage;
    (2 * sum + 3) / 6
}

/// Roll a learner's record up against the catalog. A missing record counts as empty.
pub fn compute_stats(record: Option<&ProgressRecord>, totals: &CatalogTotals) -> Stats {
    let (modules, quizzes, simulations) = record
        .map(|r| (r.completed_modules(), r.passed_quizzes(), r.completed_simulations()))
        .unwrap_or_default();

    let modules = CategoryStats::new(modules, totals.modules);
    let quizzes = CategoryStats::new(quizzes, totals.quizzes);
    let simulations = CategoryStats::new(simulations, totals.simulations);

    let overall = overall_percentage(&modules, &quizzes, &simulations);

    Stats {
        modules,
        quizzes,
        simulations,
        overall,
    }
}

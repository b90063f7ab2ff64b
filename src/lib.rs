//! Tourplan - monthly touring-plan workflow service
//!
//! Backs a sales-force dashboard with AI-assisted monthly planning. Each
//! representative gets one persistent assistant conversation per month;
//! the workflow engine drives the plan through generation, weekly
//! revisions, daily updates, and a closing review, while a deterministic
//! calculator distributes customer visits and weekly revenue targets.
//!
//! # Modules
//!
//! - [`domain`] - Plans, sessions, actuals, and the distribution calculators
//! - [`assistant`] - PlanningClient trait and the OpenAI Assistants adapter
//! - [`store`] - SQLite-backed session and target actors
//! - [`workflow`] - The session state machine and its concurrency rules
//! - [`server`] - HTTP endpoints with the dashboard envelope
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod assistant;
pub mod cli;
pub mod config;
pub mod domain;
pub mod server;
pub mod store;
pub mod workflow;

// Re-export commonly used types
pub use assistant::{AssistantError, OpenAiPlanningClient, PlanDraft, PlanningClient};
pub use config::{AssistantConfig, Config, ServerConfig, StorageConfig, TargetsConfig};
pub use domain::{
    Customer, DailyActuals, MonthlyActuals, MonthlyPlan, PlanPhase, PlanningSession,
    RevisionRecord, SessionKey, TargetSubmission, TerritoryContext, Tier, WeeklyActuals,
    WeeklyPlan, WeeklyTargetSet,
};
pub use store::{Expected, MemorySessionStore, SessionManager, SessionStore, StoreError, TargetManager};
pub use workflow::{PlanAction, WorkflowEngine, WorkflowError};

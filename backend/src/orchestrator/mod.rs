//! Orchestrator module
//!
//! Turns a decomposed request into a [`TaskGraph`] and runs it:
//!
//! - `graph`: arena of subtasks with dependency validation
//! - `scheduler`: serial ready-queue execution, pause and resume
//! - `gate`: confirmation/selection requests and reply parsing
//! - `executors`: one executor per subtask kind
//! - `report`: final success/partial/failed report

pub mod config;
pub mod constants;
pub mod error;
pub mod executors;
pub mod gate;
pub mod graph;
pub mod report;
pub mod scheduler;
pub mod types;
pub mod utils;

pub use config::OrchestratorConfig;
pub use error::ExecutionError;
pub use executors::{ExecutionContext, ExecutorRegistry, SubTaskExecutor};
pub use gate::{FeedbackKind, FeedbackOption, FeedbackRequest};
pub use graph::TaskGraph;
pub use report::{EntryOutcome, ExecutionReport, ReportEntry, ReportStatus};
pub use scheduler::{RunOutcome, Scheduler};
pub use types::{
    AvailabilityParams, AvailabilityQuery, CreateParams, DeleteParams, GeneralParams,
    OutputData, RsvpParams, ScheduleParams, SearchParams, SubTask, SubTaskKind, SubTaskParams,
    SubTaskSkeleton, SubTaskStatus, TaskOutput, UpdateParams,
};

//! TIRA - Terraform Import & Reconciliation Accelerator
//!
//! Reconciles tracked Terraform state against scanned cloud inventory,
//! classifies drift per division and generates import plans for resources
//! nobody manages yet.

pub mod actors;
pub mod classify;
pub mod config;
pub mod output;
pub mod plan;
pub mod providers;
pub mod reconcile;
pub mod resolver;
pub mod resource;
pub mod sources;
pub mod terraform;

mod error;

pub use actors::{ActionLog, ResourceActions};
pub use classify::{Classification, ClassificationKind, IdentityCollisionError, WatchList};
pub use config::ReconcileConfig;
pub use error::TiraError;
pub use plan::{ImportDirective, ImportPlan, OracleError, WorkspaceOracle};
pub use reconcile::{DivisionInput, DivisionOutcome, DivisionStatus, Engine, RunReport};
pub use resolver::{Resolver, UnresolvedIdentityError};
pub use resource::{InventoryRecord, RawResource, ResourceIdentity};
pub use terraform::{ImportFormat, MalformedStateError, StateDocument};

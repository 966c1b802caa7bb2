//! Core verification engine: content-addressed fingerprinting, structural
//! diffing with tolerance rules, template-driven dynamic response
//! synthesis, OpenAPI contract import, and session replay.
//!
//! See the individual modules for the part of the design each one covers.

pub mod canonical;
pub mod config;
pub mod context;
pub mod contract;
pub mod differ;
pub mod error;
pub mod judge;
pub mod report;
pub mod request_hash;
pub mod replay;
pub mod routing;
pub mod session;
pub mod template;
pub mod tolerance;

pub use config::{ComparisonModeConfig, ContractExampleSelection, ContractImportConfig, ReplayConfig};
pub use context::{ContextBuilder, ContextFn};
pub use contract::ContractImporter;
pub use differ::{diff, Diff, DiffKind};
pub use error::{Error, Result};
pub use judge::{judge_interaction, summarize, ComparisonMode, ComparisonResult, SessionSummary};
pub use report::SessionResult;
pub use replay::{ReplayEngine, ReplayFilter};
pub use request_hash::hash_request;
pub use routing::{Route, RouteResolver, RouteMatch};
pub use session::{list_sessions, session_summary, Interaction, Request, Response, Session};
pub use template::{Helper, HelperRegistry, Template};
pub use tolerance::{ToleranceClassifier, ToleranceConfig};

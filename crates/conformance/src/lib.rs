#![doc = include_str!("../README.md")]
//!
//! # Module Structure
//!
//! - [`error`]: Domain error types (`ConformanceError`)
//! - [`config`]: Harness configuration (`HarnessConfig`, builder, `DenyTimeout`)
//! - [`policy`]: Policy objects and the local decision model (`PolicyObject`, `decide`)
//! - [`cluster`]: Control-plane abstraction (`ControlPlane` trait, manifests)
//! - [`kubernetes`]: Kubernetes control plane (`KubeControlPlane`)
//! - [`memory`]: In-memory reference control plane (`MemoryControlPlane`)
//! - [`wait`]: Bounded polling and per-call timeouts
//! - [`isolation`]: Isolation-mode annotations (`IsolationController`)
//! - [`ledger`]: Created-resource bookkeeping and teardown (`ResourceLedger`)
//! - [`provisioner`]: Domain, server, endpoint, probe and policy creation
//! - [`probe`]: Two-phase probe protocol (`Prober`)
//! - [`scenario`]: Scenario definitions and the scenario-level model
//! - [`catalog`]: Standard scenarios and TOML scenario loading
//! - [`report`]: Scenario and suite reports
//! - [`engine`]: Scenario orchestrator (`ScenarioEngine`)
//!
//! # Architecture
//!
//! ```text
//! Scenario --> ScenarioEngine
//!                  |
//!             Provisioner ----> ControlPlane (kube | memory)
//!                  |                 ^
//!             IsolationController ---|
//!                  |                 |
//!             Prober ----------------'
//!                  |
//!             ScenarioModel (expected vs. model)
//!                  |
//!             ResourceLedger.teardown()
//!                  |
//!             ScenarioReport
//! ```

pub mod catalog;
pub mod cluster;
pub mod config;
pub mod engine;
pub mod error;
pub mod isolation;
pub mod kubernetes;
pub mod ledger;
pub mod memory;
pub mod policy;
pub mod probe;
pub mod provisioner;
pub mod report;
pub mod scenario;
pub mod wait;

// --- Public API Re-exports ---

// Engine (main orchestrator)
pub use engine::{ScenarioEngine, ScenarioPhase};

// Configuration
pub use config::{DenyTimeout, HarnessConfig, HarnessConfigBuilder};

// Error
pub use error::ConformanceError;

// Control planes
pub use cluster::{ControlPlane, ResourceRef};
pub use kubernetes::KubeControlPlane;
pub use memory::MemoryControlPlane;

// Policy
pub use policy::{
    Decision, DecisionReason, IngressRule, LabelSelector, PeerSelector, PolicyObject, PolicySet,
    decide,
};

// Scenarios
pub use catalog::{load_scenario_from_file, load_scenarios_from_dir, standard_scenarios};
pub use scenario::{DomainSpec, ProbeSpec, Scenario, ServerSpec, Step};

// Reports
pub use report::{ProbeRecord, ScenarioReport, ScenarioVerdict, SuiteReport, TeardownFailure};

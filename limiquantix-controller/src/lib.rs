//! # limiquantix Controller
//!
//! Lifecycle orchestration core of the limiquantix control plane.
//!
//! The [`Orchestrator`] accepts declarative VM requests, picks a target
//! hypervisor node, durably records intent through the [`VmRepository`],
//! drives the node daemon over the [`AgentPool`](limiquantix_nodeclient::AgentPool),
//! and keeps each record's observed state current. Reads are augmented with
//! live usage by the [`LiveStateEnricher`]; every mutation is audited by the
//! [`EventRecorder`].
//!
//! ## Architecture
//!
//! ```text
//! operator ──▶ VmService ──▶ validation ──▶ Orchestrator ──▶ VmRepository
//!                                              │    │
//!                                   placement ─┘    └─▶ AgentPool ──▶ node daemon
//! ```
//!
//! Storage and the scheduler's ranking are external: they plug in through
//! the [`repository`] traits and the [`Scheduler`] seam.

pub mod config;
pub mod enrichment;
pub mod error;
pub mod events;
pub mod orchestrator;
pub mod placement;
pub mod repository;
pub mod requests;
pub mod service;
pub mod validation;

pub use config::ControllerConfig;
pub use enrichment::LiveStateEnricher;
pub use error::{ControlPlaneError, Result};
pub use events::EventRecorder;
pub use orchestrator::Orchestrator;
pub use placement::{Placement, Scheduler};
pub use repository::{
    memory::{InMemoryNodeRegistry, InMemoryRepository, InMemorySnapshotRepository},
    EventFilter, NodeRepository, RepositoryError, SnapshotRepository, VmFilter, VmRepository,
};
pub use service::VmService;

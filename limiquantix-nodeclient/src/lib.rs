//! # limiquantix Node Client
//!
//! Client surface for the node daemons the control plane drives.
//!
//! This crate defines the [`NodeAgent`] trait (the per-node RPC surface),
//! typed agent errors with stale-domain classification, the
//! [`AgentPool`] that caches one live client per node, management-address
//! normalization, and the translation from control-plane records to the
//! agent's wire shapes. The gRPC binding that implements [`NodeAgent`] and
//! [`AgentConnector`] over the network lives with the deployment; the
//! in-memory [`MockAgent`] backs development and the test suites.

pub mod client;
pub mod convert;
pub mod error;
pub mod mock;
pub mod pool;
pub mod types;

pub use client::NodeAgent;
pub use convert::{agent_disk, agent_nic, vm_definition};
pub use error::{AgentError, Result};
pub use mock::{MockAgent, MockConnector};
pub use pool::{normalize_agent_address, AgentConnector, AgentPool, DEFAULT_AGENT_PORT};
pub use types::{
    AgentCdrom, AgentCloudInit, AgentCpu, AgentDisk, AgentDisplay, AgentGuestInfo, AgentHealth,
    AgentMemory, AgentNic, AgentResourceUsage, AgentSnapshot, AgentVmStatus, ConsoleEndpoint,
    DiskBus, DiskFormat, GuestResourceUsage, VmDefinition, VmPowerState,
};

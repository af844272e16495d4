//! # limiquantix Domain
//!
//! Domain model for the limiquantix control plane.
//!
//! This crate defines the entities the control plane owns: the
//! [`VirtualMachine`] aggregate with its desired [`VmSpec`] and observed
//! [`VmStatus`], the [`VmState`] lifecycle machine, snapshots, audit
//! events, and the node record the placement layer reads. The node daemon
//! owns the live hypervisor domain; these types describe intent and the
//! last observed state only.

pub mod event;
pub mod guest_os;
pub mod node;
pub mod power;
pub mod snapshot;
pub mod state;
pub mod vm;

pub use event::{EventSeverity, EventType, VmEvent};
pub use guest_os::GuestOsFamily;
pub use node::Node;
pub use power::PowerState;
pub use snapshot::Snapshot;
pub use state::VmState;
pub use vm::{
    generate_mac, BootDevice, BootSpec, CdromSpec, ConsoleStatus, CpuSpec, DiskSpec, DisplaySpec,
    DisplayType, GuestAgentInfo, HaPolicy, MemorySpec, NicSpec, ProvisioningSpec, ResourceUsage,
    VirtualMachine, VmSpec, VmStatus,
};

/// Project every VM belongs to unless the operator names another one.
pub const DEFAULT_PROJECT_ID: &str = "00000000-0000-0000-0000-000000000001";

/// Hardware compatibility tag stamped on newly created VMs.
pub const HARDWARE_VERSION: &str = "v1";

/// MAC address prefix reserved for QEMU/KVM guests.
pub const QEMU_MAC_OUI: &str = "52:54:00";

/// Label recording the source VM on a cloned record.
pub const LABEL_CLONED_FROM: &str = "cloned-from";

/// Label recording whether a clone is linked or full.
pub const LABEL_CLONE_TYPE: &str = "clone-type";

//! Shared harness for orchestrator integration tests.

// Not every test binary exercises every helper
#![allow(dead_code)]

use std::sync::{Arc, Once};

use async_trait::async_trait;

use limiquantix_controller::requests::CreateVmRequest;
use limiquantix_controller::{
    ControllerConfig, InMemoryNodeRegistry, InMemoryRepository, InMemorySnapshotRepository,
    Orchestrator, Placement, Scheduler,
};
use limiquantix_domain::{
    CpuSpec, DiskSpec, MemorySpec, Node, VirtualMachine, VmSpec, VmState,
};
use limiquantix_nodeclient::{AgentPool, MockAgent, MockConnector, VmPowerState};

/// Scheduler that always proposes the same node.
pub struct FixedScheduler(pub String);

#[async_trait]
impl Scheduler for FixedScheduler {
    async fn schedule(&self, _spec: &VmSpec) -> anyhow::Result<Placement> {
        Ok(Placement {
            node_id: self.0.clone(),
            hostname: format!("{}.example.com", self.0),
            score: 1.0,
        })
    }
}

/// Scheduler with no capacity anywhere.
pub struct NoNodesScheduler;

#[async_trait]
impl Scheduler for NoNodesScheduler {
    async fn schedule(&self, _spec: &VmSpec) -> anyhow::Result<Placement> {
        anyhow::bail!("no nodes")
    }
}

/// Everything a test needs to drive the orchestrator.
pub struct Harness {
    pub repo: Arc<InMemoryRepository>,
    pub nodes: Arc<InMemoryNodeRegistry>,
    pub connector: Arc<MockConnector>,
    pub mirror: Arc<InMemorySnapshotRepository>,
    pub orchestrator: Orchestrator,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(None)
    }

    pub fn with_scheduler(scheduler: Arc<dyn Scheduler>) -> Self {
        Self::build(Some(scheduler))
    }

    fn build(scheduler: Option<Arc<dyn Scheduler>>) -> Self {
        // One subscriber per test binary
        static LOG_INIT: Once = Once::new();
        LOG_INIT.call_once(|| {
            let _ = limiquantix_common::init_logging("info");
        });

        let repo = Arc::new(InMemoryRepository::new());
        let nodes = Arc::new(InMemoryNodeRegistry::new());
        let connector = Arc::new(MockConnector::new());
        let mirror = Arc::new(InMemorySnapshotRepository::new());
        let pool = Arc::new(AgentPool::new(connector.clone()));

        let mut orchestrator = Orchestrator::new(
            repo.clone(),
            nodes.clone(),
            pool,
            ControllerConfig::default(),
        )
        .with_snapshot_mirror(mirror.clone());
        if let Some(scheduler) = scheduler {
            orchestrator = orchestrator.with_scheduler(scheduler);
        }

        Self {
            repo,
            nodes,
            connector,
            mirror,
            orchestrator,
        }
    }

    /// Register a node and its mock agent.
    pub fn add_node(&self, node_id: &str) -> Arc<MockAgent> {
        self.add_node_with_ip(node_id, "10.0.0.1")
    }

    /// Register a node with a specific management address.
    pub fn add_node_with_ip(&self, node_id: &str, management_ip: &str) -> Arc<MockAgent> {
        self.nodes.add(Node::new(
            node_id,
            format!("{node_id}.example.com"),
            management_ip,
        ));
        let agent = Arc::new(MockAgent::new());
        self.connector.register(node_id, agent.clone());
        agent
    }

    /// Insert a record directly, bypassing the orchestrator.
    pub async fn seed_vm(&self, name: &str, state: VmState, node_id: &str) -> VirtualMachine {
        use limiquantix_controller::VmRepository;

        let mut vm = VirtualMachine::new(name, "project-1").with_spec(basic_spec());
        vm.status.state = state;
        vm.status.node_id = node_id.to_string();
        vm.status.message = format!("seeded in state {state}");
        self.repo.create(vm).await.expect("seed vm")
    }

    /// Seed a record and mirror its domain on the node's agent.
    pub async fn seed_vm_with_domain(
        &self,
        name: &str,
        state: VmState,
        node_id: &str,
        agent: &MockAgent,
        power: VmPowerState,
    ) -> VirtualMachine {
        let vm = self.seed_vm(name, state, node_id).await;
        agent.insert_domain(&vm.id, power);
        vm
    }
}

/// A small but valid spec: one bootable disk, one NIC.
pub fn basic_spec() -> VmSpec {
    VmSpec {
        cpu: CpuSpec {
            cores: 2,
            ..Default::default()
        },
        memory: MemorySpec {
            size_mib: 2048,
            ..Default::default()
        },
        disks: vec![DiskSpec {
            name: "disk-0".to_string(),
            volume_id: "vol-boot".to_string(),
            size_gib: 20,
            boot_order: 1,
            ..Default::default()
        }],
        nics: vec![limiquantix_domain::NicSpec {
            name: "nic-0".to_string(),
            network_id: "net-default".to_string(),
            mac_address: Some("52:54:00:00:00:01".to_string()),
            ..Default::default()
        }],
        ..Default::default()
    }
}

/// A well-formed create request.
pub fn create_request(name: &str) -> CreateVmRequest {
    CreateVmRequest {
        name: name.to_string(),
        spec: basic_spec(),
        ..Default::default()
    }
}

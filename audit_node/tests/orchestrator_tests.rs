//! End-to-end batch orchestration against mock collaborators

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ethers::types::{Address, Bytes, U256, U64};

use govguard_node::checks;
use govguard_node::config::AdapterFailurePolicy;
use govguard_node::decode::{DecodeContext, StaticAbiResolver};
use govguard_node::error::{AuditError, Result};
use govguard_node::governor::{ExecutionAnchor, GovernorType, GovernorView};
use govguard_node::lifecycle::LifecycleStage;
use govguard_node::orchestrator::{BatchServices, Orchestrator};
use govguard_node::proposal::{Proposal, ProposalId};
use govguard_node::report::{AuditReport, ReportRenderer, ReportStore};
use govguard_node::simulation::adapter::SimulationAdapter;
use govguard_node::simulation::{
    BlockSnapshot, ExecutionBundle, SimulationConfig, SimulationResult,
};

fn addr(byte: u8) -> Address {
    Address::from([byte; 20])
}

fn head() -> BlockSnapshot {
    BlockSnapshot {
        number: U64::from(18_000_000u64),
        timestamp: U256::from(1_700_000_000u64),
    }
}

fn proposal(id: u64, stage: LifecycleStage) -> Proposal {
    Proposal::new(
        ProposalId::from(id),
        addr(0xaa),
        vec![addr(1)],
        vec![U256::zero()],
        vec![Bytes::from(vec![0xde, 0xad, 0xbe, 0xef])],
        Some(vec![String::new()]),
        17_000_000,
        17_050_000,
        None,
        stage,
    )
    .unwrap()
}

struct MockGovernor {
    kind: GovernorType,
    address: Address,
    proposals: HashMap<ProposalId, Proposal>,
    /// Ids whose state ordinal has no lifecycle mapping.
    bad_state: HashSet<ProposalId>,
    timelock: Option<Address>,
    anchors: HashMap<ProposalId, ExecutionAnchor>,
}

impl MockGovernor {
    fn new(proposals: Vec<Proposal>) -> Self {
        let anchors = proposals
            .iter()
            .filter(|p| p.stage == LifecycleStage::Executed)
            .map(|p| {
                (
                    p.id,
                    ExecutionAnchor {
                        block: 17_100_000,
                        tx_hash: None,
                    },
                )
            })
            .collect();
        Self {
            kind: GovernorType::Bravo,
            address: addr(0x11),
            proposals: proposals.into_iter().map(|p| (p.id, p)).collect(),
            bad_state: HashSet::new(),
            timelock: Some(addr(0x77)),
            anchors,
        }
    }
}

#[async_trait]
impl GovernorView for MockGovernor {
    fn kind(&self) -> GovernorType {
        self.kind
    }

    fn address(&self) -> Address {
        self.address
    }

    async fn proposal(&self, id: ProposalId, _as_of_block: u64) -> Result<Proposal> {
        if self.bad_state.contains(&id) {
            return Err(AuditError::UnknownProposalState {
                dialect: self.kind,
                ordinal: 9,
            });
        }
        self.proposals
            .get(&id)
            .cloned()
            .ok_or_else(|| AuditError::Rpc(format!("unknown proposal {id}")))
    }

    async fn proposal_ids(&self, _as_of_block: u64) -> Result<Vec<ProposalId>> {
        let mut ids: Vec<_> = self.proposals.keys().copied().collect();
        ids.sort();
        Ok(ids)
    }

    async fn quorum(&self, _block: u64) -> Result<U256> {
        Ok(U256::from(400_000u64))
    }

    async fn timelock(&self) -> Result<Option<Address>> {
        Ok(self.timelock)
    }

    async fn execution_anchor(&self, id: ProposalId) -> Result<Option<ExecutionAnchor>> {
        Ok(self.anchors.get(&id).copied())
    }
}

#[derive(Default)]
struct MockAdapter {
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    /// Proposal ids the service fails on.
    failing: HashSet<ProposalId>,
}

impl MockAdapter {
    fn failing_on(ids: &[u64]) -> Self {
        Self {
            failing: ids.iter().map(|&i| ProposalId::from(i)).collect(),
            ..Self::default()
        }
    }
}

#[async_trait]
impl SimulationAdapter for MockAdapter {
    async fn simulate(&self, config: &SimulationConfig) -> Result<SimulationResult> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.failing.contains(&config.proposal_id) {
            return Err(AuditError::SimulationAdapter("service unavailable".into()));
        }
        Ok(SimulationResult {
            sim: ExecutionBundle {
                success: true,
                logs: Vec::new(),
                trace: Vec::new(),
                state_diffs: Vec::new(),
            },
            proposal: proposal(config.proposal_id.0.as_u64(), LifecycleStage::Queued),
            latest_block: head(),
        })
    }
}

struct MemoryStore {
    existing: HashSet<ProposalId>,
    queries: AtomicUsize,
}

impl MemoryStore {
    fn with_existing(ids: &[u64]) -> Self {
        Self {
            existing: ids.iter().map(|&i| ProposalId::from(i)).collect(),
            queries: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ReportStore for MemoryStore {
    async fn exists(&self, _dao_name: &str, _governor: Address, id: ProposalId) -> Result<bool> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.existing.contains(&id))
    }
}

#[derive(Default)]
struct MemoryRenderer {
    rendered: Mutex<Vec<AuditReport>>,
}

#[async_trait]
impl ReportRenderer for MemoryRenderer {
    async fn render(&self, report: &AuditReport) -> Result<()> {
        self.rendered.lock().unwrap().push(report.clone());
        Ok(())
    }
}

struct Harness {
    adapter: Arc<MockAdapter>,
    store: Arc<MemoryStore>,
    renderer: Arc<MemoryRenderer>,
    orchestrator: Orchestrator,
}

fn harness(
    proposals: Vec<Proposal>,
    adapter: MockAdapter,
    store: MemoryStore,
    policy: AdapterFailurePolicy,
) -> Harness {
    harness_with(MockGovernor::new(proposals), adapter, store, policy)
}

fn harness_with(
    governor: MockGovernor,
    adapter: MockAdapter,
    store: MemoryStore,
    policy: AdapterFailurePolicy,
) -> Harness {
    let adapter = Arc::new(adapter);
    let store = Arc::new(store);
    let renderer = Arc::new(MemoryRenderer::default());
    let services = BatchServices {
        governor: Arc::new(governor),
        adapter: adapter.clone(),
        resolver: Arc::new(StaticAbiResolver::new()),
        store: store.clone(),
        renderer: renderer.clone(),
    };
    let orchestrator = Orchestrator::new(
        "TestDAO",
        1,
        Vec::new(),
        policy,
        DecodeContext {
            provider: None,
            chain_id: 1,
        },
        services,
    );
    Harness {
        adapter,
        store,
        renderer,
        orchestrator,
    }
}

#[tokio::test]
async fn batch_audits_proposals_and_hands_complete_reports_to_renderer() {
    let h = harness(
        vec![
            proposal(1, LifecycleStage::Executed),
            proposal(2, LifecycleStage::Active),
            proposal(3, LifecycleStage::Queued),
        ],
        MockAdapter::default(),
        MemoryStore::with_existing(&[]),
        AdapterFailurePolicy::Abort,
    );

    let summary = h
        .orchestrator
        .run(
            &[
                ProposalId::from(1u64),
                ProposalId::from(2u64),
                ProposalId::from(3u64),
            ],
            head(),
        )
        .await
        .unwrap();

    assert_eq!(summary.audited.len(), 3);
    assert!(summary.skipped.is_empty());
    assert!(summary.failed.is_empty());
    assert_eq!(h.adapter.calls.load(Ordering::SeqCst), 3);

    let rendered = h.renderer.rendered.lock().unwrap();
    assert_eq!(rendered.len(), 3);
    for report in rendered.iter() {
        // Every registered check id present, every action decoded.
        assert_eq!(report.checks.len(), checks::registry().len());
        assert_eq!(report.actions.len(), report.proposal.action_count());
        assert!(report.actions.iter().all(|a| !a.prose.is_empty()));
    }
}

#[tokio::test]
async fn simulations_never_overlap_across_proposals() {
    let h = harness(
        vec![
            proposal(1, LifecycleStage::Active),
            proposal(2, LifecycleStage::Active),
            proposal(3, LifecycleStage::Active),
        ],
        MockAdapter::default(),
        MemoryStore::with_existing(&[]),
        AdapterFailurePolicy::Abort,
    );
    h.orchestrator
        .run(
            &[
                ProposalId::from(1u64),
                ProposalId::from(2u64),
                ProposalId::from(3u64),
            ],
            head(),
        )
        .await
        .unwrap();
    assert_eq!(h.adapter.max_in_flight.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn existing_artifact_skips_executed_proposal_without_simulating() {
    let h = harness(
        vec![
            proposal(1, LifecycleStage::Executed),
            proposal(2, LifecycleStage::Executed),
        ],
        MockAdapter::default(),
        MemoryStore::with_existing(&[1]),
        AdapterFailurePolicy::Abort,
    );

    let summary = h
        .orchestrator
        .run(&[ProposalId::from(1u64), ProposalId::from(2u64)], head())
        .await
        .unwrap();

    assert_eq!(summary.skipped, vec![ProposalId::from(1u64)]);
    assert_eq!(summary.audited, vec![ProposalId::from(2u64)]);
    // Only the un-gated proposal reached the simulation service.
    assert_eq!(h.adapter.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.renderer.rendered.lock().unwrap().len(), 1);
    assert!(h.store.queries.load(Ordering::SeqCst) >= 2);
}

#[tokio::test]
async fn adapter_failure_aborts_batch_under_default_policy() {
    let h = harness(
        vec![
            proposal(1, LifecycleStage::Active),
            proposal(2, LifecycleStage::Active),
        ],
        MockAdapter::failing_on(&[1]),
        MemoryStore::with_existing(&[]),
        AdapterFailurePolicy::Abort,
    );

    let err = h
        .orchestrator
        .run(&[ProposalId::from(1u64), ProposalId::from(2u64)], head())
        .await
        .unwrap_err();

    assert!(matches!(err, AuditError::SimulationAdapter(_)));
    // The second proposal was never dispatched.
    assert_eq!(h.adapter.calls.load(Ordering::SeqCst), 1);
    assert!(h.renderer.rendered.lock().unwrap().is_empty());
}

#[tokio::test]
async fn adapter_failure_can_skip_and_continue_when_configured() {
    let h = harness(
        vec![
            proposal(1, LifecycleStage::Active),
            proposal(2, LifecycleStage::Active),
        ],
        MockAdapter::failing_on(&[1]),
        MemoryStore::with_existing(&[]),
        AdapterFailurePolicy::SkipProposal,
    );

    let summary = h
        .orchestrator
        .run(&[ProposalId::from(1u64), ProposalId::from(2u64)], head())
        .await
        .unwrap();

    assert_eq!(summary.audited, vec![ProposalId::from(2u64)]);
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].0, ProposalId::from(1u64));
}

#[tokio::test]
async fn unknown_state_drops_proposal_but_batch_continues() {
    let mut governor = MockGovernor::new(vec![
        proposal(1, LifecycleStage::Active),
        proposal(2, LifecycleStage::Active),
    ]);
    governor.bad_state.insert(ProposalId::from(1u64));

    let h = harness_with(
        governor,
        MockAdapter::default(),
        MemoryStore::with_existing(&[]),
        AdapterFailurePolicy::Abort,
    );

    let summary = h
        .orchestrator
        .run(&[ProposalId::from(1u64), ProposalId::from(2u64)], head())
        .await
        .unwrap();

    assert_eq!(summary.audited, vec![ProposalId::from(2u64)]);
    assert_eq!(summary.failed.len(), 1);
    assert!(summary.failed[0].1.contains("unknown proposal state"));
}

#[tokio::test]
async fn missing_timelock_drops_proposal_but_batch_continues() {
    let mut governor = MockGovernor::new(vec![
        proposal(1, LifecycleStage::Active),
        proposal(2, LifecycleStage::Executed),
    ]);
    governor.timelock = None;

    let h = harness_with(
        governor,
        MockAdapter::default(),
        MemoryStore::with_existing(&[]),
        AdapterFailurePolicy::Abort,
    );

    let summary = h
        .orchestrator
        .run(&[ProposalId::from(1u64), ProposalId::from(2u64)], head())
        .await
        .unwrap();

    // The proposed one needs the timelock; the executed replay does not.
    assert_eq!(summary.audited, vec![ProposalId::from(2u64)]);
    assert_eq!(summary.failed.len(), 1);
    assert!(summary.failed[0].1.contains("no timelock"));
}

#[tokio::test]
async fn allow_list_limits_result_map_to_enabled_checks() {
    let adapter = Arc::new(MockAdapter::default());
    let renderer = Arc::new(MemoryRenderer::default());
    let services = BatchServices {
        governor: Arc::new(MockGovernor::new(vec![proposal(1, LifecycleStage::Active)])),
        adapter: adapter.clone(),
        resolver: Arc::new(StaticAbiResolver::new()),
        store: Arc::new(MemoryStore::with_existing(&[])),
        renderer: renderer.clone(),
    };
    let orchestrator = Orchestrator::new(
        "TestDAO",
        1,
        vec!["simulation-success".to_string(), "state-changes".to_string()],
        AdapterFailurePolicy::Abort,
        DecodeContext {
            provider: None,
            chain_id: 1,
        },
        services,
    );

    orchestrator
        .run(&[ProposalId::from(1u64)], head())
        .await
        .unwrap();

    let rendered = renderer.rendered.lock().unwrap();
    let keys: Vec<_> = rendered[0].checks.keys().cloned().collect();
    assert_eq!(keys, vec!["simulation-success", "state-changes"]);
}

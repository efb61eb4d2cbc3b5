//! End-to-end runs of the standard bundles over the memory store.

use std::time::Duration;

use serde_json::json;

use harvester_core::error::{BlockIntegrityError, HarvesterError};
use harvester_core::models::{
    AuditKind, Block, BlockCounters, BlockRef, ChainBlock, ChainEvent, Collective, Interval,
    MotionStatus, StorageParam, TreasuryStatus,
};
use harvester_core::ports::{
    BlockAccumulation, EventContext, FactStore, FactTx, ProcessorRegistry, SequencingContext,
};
use harvester_core::services::{Harvester, HarvesterConfig, HarvesterService, SequencerOutcome};
use harvester_storage::MemoryStore;

use crate::BundleRegistry;
use crate::testing::{
    FakeChain, TestCodec, account, at, chain_block, event, extrinsic, harvester, harvester_with,
};

const SEQUENCER_FLAG: &str = "SEQUENCER_TASK_ID";

fn hex(byte: u8) -> String {
    format!("0x{}", account(byte))
}

fn trade_event(event_idx: u32, hash: &str, price: u64, amount: u64) -> ChainEvent {
    event(
        event_idx,
        Some(0),
        "trademodule",
        "TradeCreated",
        vec![
            ("AccountId", json!(hex(1))),
            ("Hash", json!("DOT")),
            ("Hash", json!("USDT")),
            ("Hash", json!(hash)),
            (
                "Trade",
                json!({
                    "buyer": hex(1),
                    "seller": hex(2),
                    "maker": hex(1),
                    "taker": hex(2),
                    "otype": "Buy",
                    "price": price,
                    "base_amount": amount,
                    "quote_amount": price * amount,
                }),
            ),
        ],
    )
}

async fn add_all(h: &Harvester<FakeChain, MemoryStore>, n: u64) {
    for number in 0..n {
        h.add_block(BlockRef::Number(number)).await.unwrap();
    }
}

// =============================================================================
// Accounts & indices
// =============================================================================

// Test critique: un compte créé puis supprimé libère ses indices
#[tokio::test]
async fn test_account_lifecycle_with_index() {
    let mut chain = FakeChain::new();
    let mut b0 = chain_block(0, at(12, 0, 0));
    b0.events = vec![
        event(0, Some(0), "balances", "NewAccount", vec![("AccountId", json!(hex(7))), ("Balance", json!("500"))]),
        event(1, Some(0), "indices", "NewAccountIndex", vec![("AccountId", json!(hex(7))), ("AccountIndex", json!(3))]),
        // Doublon: compté une seule fois
        event(2, Some(0), "balances", "NewAccount", vec![("AccountId", json!(hex(7))), ("Balance", json!("500"))]),
    ];
    let mut b1 = chain_block(1, at(12, 0, 6));
    b1.events = vec![event(0, Some(0), "balances", "ReapedAccount", vec![("AccountId", json!(hex(7)))])];
    chain.push(b0);
    chain.push(b1);

    let (h, store) = harvester(chain);
    add_all(&h, 2).await;
    assert_eq!(
        h.start_sequencer().await.unwrap(),
        SequencerOutcome::Finished { sequenced: 2, last: Some(1) }
    );

    let state = store.snapshot().await;
    let acc = &state.accounts[&account(7)];
    assert_eq!(acc.address, format!("addr:{}", account(7)));
    assert_eq!(acc.balance, 500);
    assert!(acc.is_reaped);
    assert_eq!(acc.count_reaped, 1);
    assert_eq!(acc.created_at_block, 0);
    assert_eq!(acc.updated_at_block, 1);

    let index = &state.account_indices[&3];
    assert_eq!(index.account_id, None);
    assert!(index.is_reclaimable);
    assert_eq!(index.short_address.as_deref(), Some("idx:3"));

    assert_eq!(state.blocks[&0].counters.accounts_new, 1);
    assert_eq!(state.totals[&0].totals.accounts, 1);
    assert_eq!(state.totals[&1].totals.accounts, 0);
    assert_eq!(state.totals[&1].totals.accounts_reaped, 1);
    assert_eq!(state.totals[&1].blocktime, 6);
}

// Test critique: un événement de forme inattendue est ignoré sans erreur
#[tokio::test]
async fn test_shape_mismatch_is_skipped() {
    let mut chain = FakeChain::new();
    let mut b0 = chain_block(0, at(12, 0, 0));
    b0.events = vec![event(0, Some(0), "Balances", "NewAccount", vec![("AccountId", json!(hex(7))), ("u64", json!(1))])];
    chain.push(b0);

    let (h, store) = harvester(chain);
    h.add_block(BlockRef::Number(0)).await.unwrap();

    let state = store.snapshot().await;
    assert!(state.audits.is_empty());
    assert_eq!(state.blocks[&0].counters.accounts_new, 0);
    assert_eq!(state.events.len(), 1);
}

// =============================================================================
// Orchestration
// =============================================================================

// Test critique: un second ajout du même bloc ne modifie aucune ligne
#[tokio::test]
async fn test_add_block_twice_is_a_skip() {
    let mut chain = FakeChain::new();
    let mut b0 = chain_block(0, at(12, 0, 0));
    b0.extrinsics = vec![extrinsic(0, "balances", "transfer", Some(&account(1)), vec![("value", json!("5"))])];
    b0.events = vec![
        event(0, Some(0), "balances", "NewAccount", vec![("AccountId", json!(hex(7))), ("Balance", json!("500"))]),
        trade_event(1, "t0", 10, 1),
    ];
    chain.push(b0);

    let (h, store) = harvester(chain);
    h.add_block(BlockRef::Number(0)).await.unwrap();
    let before = store.snapshot().await;

    let err = h.add_block(BlockRef::Number(0)).await.unwrap_err();
    assert!(err.is_already_added());
    let after = store.snapshot().await;
    assert_eq!(after, before);
    assert_eq!(after.blocks.len(), 1);
    assert_eq!(after.events.len(), 2);
    assert_eq!(after.trades.len(), 1);
    assert_eq!(after.blocks[&0].counters.accounts_new, 1);

    // Une fois séquencé, le doublon ne touche pas non plus aux entités
    h.start_sequencer().await.unwrap();
    let sequenced = store.snapshot().await;
    assert!(h.add_block(BlockRef::Number(0)).await.unwrap_err().is_already_added());
    assert_eq!(store.snapshot().await, sequenced);
}

// Test critique: un échec d'accumulation ne laisse aucune ligne
#[tokio::test]
async fn test_failed_accumulation_leaves_nothing() {
    let code_hash = hex(9);
    let mut chain = FakeChain::new();
    let mut b0 = chain_block(0, at(12, 0, 0));
    b0.extrinsics = vec![extrinsic(0, "contract", "put_code", Some(&account(1)), vec![("code", json!("0x0061736d"))])];
    b0.events = vec![
        event(0, Some(0), "balances", "NewAccount", vec![("AccountId", json!(hex(7))), ("Balance", json!(1))]),
        event(1, Some(0), "contract", "CodeStored", vec![("Hash", json!(code_hash))]),
        // Même code hash: la contrainte d'unicité échoue
        event(2, Some(0), "contract", "CodeStored", vec![("Hash", json!(code_hash))]),
    ];
    chain.push(b0);

    let (h, store) = harvester(chain);
    assert!(h.add_block(BlockRef::Number(0)).await.is_err());

    let state = store.snapshot().await;
    assert!(state.blocks.is_empty());
    assert!(state.events.is_empty());
    assert!(state.audits.is_empty());
    assert!(state.contracts.is_empty());
}

#[tokio::test]
async fn test_contract_code_stored() {
    let mut chain = FakeChain::new();
    let mut b0 = chain_block(0, at(12, 0, 0));
    b0.extrinsics = vec![extrinsic(0, "contract", "put_code", Some(&account(1)), vec![("code", json!("0x0061736d"))])];
    b0.events = vec![event(0, Some(0), "contract", "CodeStored", vec![("Hash", json!(hex(9)))])];
    chain.push(b0);

    let (h, store) = harvester(chain);
    let block = h.add_block(BlockRef::Number(0)).await.unwrap();
    assert_eq!(block.counters.contracts_new, 1);

    let state = store.snapshot().await;
    let contract = &state.contracts[&account(9)];
    assert_eq!(contract.bytecode.as_deref(), Some("0061736d"));
    assert_eq!(contract.created_at_extrinsic, Some(0));
}

// Test critique: séquencer un bloc avant son parent échoue sans écrire de total
#[tokio::test]
async fn test_out_of_order_sequencing_fails() {
    let mut chain = FakeChain::new();
    chain.push(chain_block(0, at(12, 0, 0)));
    chain.push(chain_block(1, at(12, 0, 6)));

    let (h, store) = harvester(chain);
    add_all(&h, 2).await;

    let err = h.sequence_block_id(1).await.unwrap_err();
    assert!(matches!(
        err,
        HarvesterError::BlockIntegrity(BlockIntegrityError::ParentNotSequenced { block: 1, parent: 0 })
    ));
    assert!(store.block_total(1).await.unwrap().is_none());

    h.sequence_block_id(0).await.unwrap();
    h.sequence_block_id(1).await.unwrap();
    // Un second passage est refusé
    assert!(matches!(
        h.sequence_block_id(1).await.unwrap_err(),
        HarvesterError::BlockIntegrity(BlockIntegrityError::AlreadySequenced(1))
    ));
}

#[tokio::test]
async fn test_sequencer_stops_at_gap() {
    let mut chain = FakeChain::new();
    for n in 0..4 {
        chain.push(chain_block(n, at(12, 0, n as u32 * 6)));
    }

    let (h, store) = harvester(chain);
    for n in [0, 1, 3] {
        h.add_block(BlockRef::Number(n)).await.unwrap();
    }

    assert!(h.integrity_checks().await.is_err());
    assert_eq!(
        h.start_sequencer().await.unwrap(),
        SequencerOutcome::Finished { sequenced: 2, last: Some(1) }
    );
    assert!(store.block_total(3).await.unwrap().is_none());

    let status = h.status().await.unwrap();
    assert_eq!(status.harvester_head, Some(3));
    assert_eq!(status.sequenced_head, Some(1));
    assert_eq!(status.block_process_queue.len(), 1);
}

// Test critique: un séquenceur occupé ne touche à rien
#[tokio::test]
async fn test_busy_sequencer_has_no_side_effects() {
    let mut chain = FakeChain::new();
    chain.push(chain_block(0, at(12, 0, 0)));

    let (h, store) = harvester(chain);
    h.add_block(BlockRef::Number(0)).await.unwrap();

    let lease = h.config().sequencer_lease;
    assert!(store.try_acquire_flag(SEQUENCER_FLAG, "other", lease).await.unwrap());
    assert_eq!(h.start_sequencer().await.unwrap(), SequencerOutcome::Busy);
    assert!(store.snapshot().await.totals.is_empty());
    assert_eq!(store.flag(SEQUENCER_FLAG).await.as_deref(), Some("other"));

    store.release_flag(SEQUENCER_FLAG, "other").await.unwrap();
    assert_eq!(
        h.start_sequencer().await.unwrap(),
        SequencerOutcome::Finished { sequenced: 1, last: Some(0) }
    );
    assert_eq!(store.flag(SEQUENCER_FLAG).await, None);
}

// Test critique: un flag laissé par un séquenceur mort est repris après le bail
#[tokio::test]
async fn test_stale_sequencer_flag_is_taken_over() {
    let mut chain = FakeChain::new();
    chain.push(chain_block(0, at(12, 0, 0)));
    chain.push(chain_block(1, at(12, 0, 6)));

    let config = HarvesterConfig {
        sequencer_lease: Duration::from_millis(5),
        ..Default::default()
    };
    let (h, store) = harvester_with(config, chain);
    add_all(&h, 2).await;

    // Le détenteur disparaît sans libérer le flag
    assert!(store.try_acquire_flag(SEQUENCER_FLAG, "1234:0", Duration::from_secs(600)).await.unwrap());
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(
        h.start_sequencer().await.unwrap(),
        SequencerOutcome::Finished { sequenced: 2, last: Some(1) }
    );
    assert_eq!(store.flag(SEQUENCER_FLAG).await, None);
}

#[tokio::test]
async fn test_harvest_back_walks_to_genesis() {
    let mut chain = FakeChain::new();
    for n in 0..3 {
        chain.push(chain_block(n, at(12, 0, n as u32 * 6)));
    }

    let (h, _store) = harvester(chain);
    h.add_block(BlockRef::Number(1)).await.unwrap();

    let report = h.harvest_back(BlockRef::Number(2), 10).await.unwrap();
    assert_eq!(report.added, 2);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.last_block, Some(0));
    assert_eq!(report.next_parent, None);
}

// Test critique: un tour complet rattrape la tête puis séquence tout
#[tokio::test]
async fn test_harvest_round_catches_up_and_sequences() {
    let mut chain = FakeChain::new();
    for n in 0..5 {
        chain.push(chain_block(n, at(12, 0, n as u32 * 6)));
    }

    let (h, store) = harvester(chain);
    let report = h.harvest_round().await.unwrap();
    assert_eq!(report.head, 4);
    assert_eq!(report.added, 5);
    assert_eq!(report.backfilled, 0);
    assert_eq!(report.sequenced, 5);
    assert_eq!(store.latest_sequenced_id().await.unwrap(), Some(4));

    let again = h.harvest_round().await.unwrap();
    assert_eq!(again.added + again.backfilled + again.sequenced, 0);
}

#[tokio::test]
async fn test_service_stops_on_shutdown() {
    let (h, _store) = harvester(FakeChain::new());
    let service = HarvesterService::new(std::sync::Arc::new(h));

    let (_tx, rx) = tokio::sync::watch::channel(true);
    let result = service.run(rx).await;
    assert!(matches!(result, Err(HarvesterError::ShutdownRequested)));
}

// =============================================================================
// Governance
// =============================================================================

// Test critique: aucune transition ne sort d'un état terminal
#[tokio::test]
async fn test_motion_lattice_and_votes() {
    let motion = hex(0x44);
    let mut chain = FakeChain::new();

    let mut b0 = chain_block(0, at(12, 0, 0));
    b0.extrinsics = vec![extrinsic(0, "council", "propose", Some(&account(1)), vec![("proposal", json!({ "call_module": "Treasury" }))])];
    b0.events = vec![
        event(0, Some(0), "council", "Proposed", vec![
            ("AccountId", json!(hex(1))),
            ("ProposalIndex", json!(5)),
            ("Hash", json!(motion)),
            ("MemberCount", json!(3)),
        ]),
        event(1, Some(0), "council", "Voted", vec![
            ("AccountId", json!(hex(2))),
            ("Hash", json!(motion)),
            ("bool", json!(true)),
            ("MemberCount", json!(2)),
            ("MemberCount", json!(0)),
        ]),
        event(2, Some(0), "council", "Approved", vec![("Hash", json!(motion))]),
    ];

    let mut b1 = chain_block(1, at(12, 0, 6));
    b1.events = vec![
        // Approved -> Disapproved est interdit
        event(0, None, "council", "Disapproved", vec![("Hash", json!(motion))]),
        event(1, None, "council", "Executed", vec![("Hash", json!(motion)), ("bool", json!(true))]),
    ];

    let mut b2 = chain_block(2, at(12, 0, 12));
    b2.events = vec![event(0, None, "council", "Approved", vec![("Hash", json!(motion))])];

    chain.push(b0);
    chain.push(b1);
    chain.push(b2);

    let (h, store) = harvester(chain);
    add_all(&h, 3).await;
    h.start_sequencer().await.unwrap();

    let state = store.snapshot().await;
    let m = &state.motions[&(Collective::Council, 5)];
    assert_eq!(m.motion_hash, account(0x44));
    assert_eq!(m.account_id, account(1));
    assert_eq!(m.member_threshold, 3);
    assert_eq!(m.status, MotionStatus::Executed);
    assert_eq!(m.approved, Some(true));
    assert_eq!(m.executed, Some(true));
    assert_eq!(m.yes_votes_count, 2);
    assert_eq!(m.updated_at_block, 1);
    assert!(m.proposal.is_some());

    let vote = &state.votes[&(Collective::Council, 5, account(2))];
    assert!(vote.vote);
    assert!(state.motions.keys().all(|(c, _)| *c == Collective::Council));
}

#[tokio::test]
async fn test_treasury_proposal_closes_once() {
    let mut chain = FakeChain::new();
    let mut b0 = chain_block(0, at(12, 0, 0));
    b0.extrinsics = vec![extrinsic(0, "treasury", "propose_spend", Some(&account(1)), vec![
        ("value", json!("1000")),
        ("beneficiary", json!(hex(3))),
    ])];
    b0.events = vec![event(0, Some(0), "treasury", "Proposed", vec![("ProposalIndex", json!(0))])];

    let mut b1 = chain_block(1, at(12, 0, 6));
    b1.events = vec![
        event(0, None, "treasury", "Rejected", vec![("ProposalIndex", json!(0)), ("Balance", json!(50))]),
        event(1, None, "treasury", "Awarded", vec![
            ("ProposalIndex", json!(0)),
            ("Balance", json!(1000)),
            ("AccountId", json!(hex(3))),
        ]),
    ];
    chain.push(b0);
    chain.push(b1);

    let (h, store) = harvester(chain);
    add_all(&h, 2).await;
    h.start_sequencer().await.unwrap();

    let proposal = &store.snapshot().await.treasury_proposals[&0];
    assert_eq!(proposal.proposed_by.as_deref(), Some(account(1).as_str()));
    assert_eq!(proposal.beneficiary.as_deref(), Some(account(3).as_str()));
    assert_eq!(proposal.value, Some(1000));
    assert_eq!(proposal.status, TreasuryStatus::Rejected);
    assert_eq!(proposal.slash_value, Some(50));
}

#[tokio::test]
async fn test_referendum_merges_preimage() {
    let proposal_hash = hex(0x55);
    let mut chain = FakeChain::new();
    chain.set_storage(
        "Democracy",
        "ReferendumInfoOf",
        vec![StorageParam::U32(2)],
        json!({ "end": 100, "proposalHash": proposal_hash, "threshold": "SuperMajorityApprove" }),
    );
    chain.set_storage(
        "Democracy",
        "Preimages",
        vec![StorageParam::Hash(account(0x55))],
        json!({ "call_module": "System", "call_name": "remark" }),
    );

    let mut b0 = chain_block(0, at(12, 0, 0));
    b0.events = vec![event(0, None, "democracy", "Started", vec![
        ("ReferendumIndex", json!(2)),
        ("VoteThreshold", json!("SuperMajorityApprove")),
    ])];
    let mut b1 = chain_block(1, at(12, 0, 6));
    b1.events = vec![
        event(0, None, "democracy", "Passed", vec![("ReferendumIndex", json!(2))]),
        event(1, None, "democracy", "Executed", vec![("ReferendumIndex", json!(2)), ("bool", json!(true))]),
    ];
    chain.push(b0);
    chain.push(b1);

    let (h, store) = harvester(chain);
    add_all(&h, 2).await;
    h.start_sequencer().await.unwrap();

    let state = store.snapshot().await;
    let referendum = &state.referenda[&2];
    assert_eq!(referendum.status, "Executed");
    assert_eq!(referendum.success, Some(true));
    assert_eq!(referendum.vote_threshold.as_deref(), Some("SuperMajorityApprove"));
    let proposal = referendum.proposal.as_ref().unwrap();
    assert_eq!(proposal["end"], 100);
    assert_eq!(proposal["call_name"], "remark");
}

#[tokio::test]
async fn test_democracy_proposal_tabled() {
    let mut chain = FakeChain::new();
    let mut b0 = chain_block(0, at(12, 0, 0));
    b0.extrinsics = vec![extrinsic(0, "democracy", "propose", Some(&account(1)), vec![("proposal", json!({ "call_name": "remark" }))])];
    b0.events = vec![event(0, Some(0), "democracy", "Proposed", vec![("PropIndex", json!(4)), ("Balance", json!(100))])];
    let mut b1 = chain_block(1, at(12, 0, 6));
    b1.events = vec![event(0, None, "democracy", "Tabled", vec![
        ("PropIndex", json!(4)),
        ("Balance", json!(100)),
        ("Vec<AccountId>", json!([hex(1)])),
    ])];
    chain.push(b0);
    chain.push(b1);

    let (h, store) = harvester(chain);
    add_all(&h, 2).await;
    h.start_sequencer().await.unwrap();

    let proposal = &store.snapshot().await.democracy_proposals[&4];
    assert_eq!(proposal.status, "Tabled");
    assert_eq!(proposal.bond, Some(100));
    assert_eq!(proposal.proposal, Some(json!({ "call_name": "remark" })));
    assert_eq!(proposal.created_at_block, 0);
    assert_eq!(proposal.updated_at_block, 1);
}

// =============================================================================
// Sessions
// =============================================================================

// Test critique: les lignes de session viennent de l'état de la chaîne au bloc de rotation
#[tokio::test]
async fn test_new_session_materialises_validators() {
    let stash = account(0x10);
    let controller = account(0x20);
    let mut chain = FakeChain::new();
    chain.set_storage("Staking", "CurrentEra", vec![], json!(3));
    chain.set_storage("Session", "Validators", vec![], json!([hex(0x10)]));
    chain.set_storage("Session", "QueuedKeys", vec![], json!([[hex(0x10), { "grandpa": hex(0x30) }]]));
    chain.set_storage("Staking", "Bonded", vec![StorageParam::AccountId(stash.clone())], json!(hex(0x20)));
    chain.set_storage(
        "Staking",
        "Ledger",
        vec![StorageParam::AccountId(controller.clone())],
        json!({ "stash": hex(0x10), "total": 900, "active": 800, "unlocking": [] }),
    );
    chain.set_storage(
        "Staking",
        "Validators",
        vec![StorageParam::AccountId(stash.clone())],
        json!({ "commission": 50_000_000 }),
    );
    chain.set_storage(
        "Staking",
        "ErasStakers",
        vec![StorageParam::U32(3), StorageParam::AccountId(stash.clone())],
        json!({
            "total": 1000,
            "own": 600,
            "others": [
                { "who": hex(0x41), "value": 300 },
                { "who": hex(0x42), "value": 100 },
            ],
        }),
    );

    chain.push(chain_block(0, at(12, 0, 0)));
    let mut b1 = chain_block(1, at(12, 0, 6));
    b1.events = vec![event(0, None, "session", "NewSession", vec![("SessionIndex", json!(1))])];
    chain.push(b1);
    chain.push(chain_block(2, at(12, 0, 12)));
    let mut b3 = chain_block(3, at(12, 0, 18));
    b3.events = vec![event(0, None, "session", "NewSession", vec![("SessionIndex", json!(2))])];
    chain.push(b3);

    let (h, store) = harvester(chain);
    add_all(&h, 4).await;
    h.start_sequencer().await.unwrap();

    let state = store.snapshot().await;
    let session = &state.sessions[&1];
    assert_eq!(session.start_at_block, 2);
    assert_eq!(session.era, Some(3));
    assert_eq!(session.count_validators, 1);
    assert_eq!(session.count_nominators, 2);

    let validator = state.session_validators.iter().find(|v| v.session_id == 1).unwrap();
    assert_eq!(validator.validator_stash.as_deref(), Some(stash.as_str()));
    assert_eq!(validator.validator_controller.as_deref(), Some(controller.as_str()));
    assert_eq!(validator.validator_session, Some(account(0x30)));
    assert_eq!(validator.bonded_total, Some(1000));
    assert_eq!(validator.bonded_own, Some(600));
    assert_eq!(validator.bonded_nominators, Some(400));
    assert_eq!(validator.bonded_active, Some(800));
    assert_eq!(validator.commission, Some(50_000_000));
    assert_eq!(
        state.session_nominators.iter().filter(|n| n.session_id == 1).count(),
        2
    );

    // Session 1 runs from block 2 to block 3
    let closed = &state.session_totals[&1];
    assert_eq!((closed.end_at_block, closed.count_blocks), (3, 2));
    assert_eq!(state.session_totals[&0].count_blocks, 1);

    assert_eq!(state.totals[&1].session_id, 0);
    assert_eq!(state.totals[&2].session_id, 1);
    assert_eq!(state.totals[&3].totals.sessions_new, 2);
}

// Test critique: un NewSession illisible fait quand même avancer la session
#[tokio::test]
async fn test_malformed_new_session_still_advances() {
    let mut chain = FakeChain::new();
    chain.push(chain_block(0, at(12, 0, 0)));
    let mut b1 = chain_block(1, at(12, 0, 6));
    b1.events = vec![event(0, None, "session", "NewSession", vec![("SessionIndex", json!("soon"))])];
    chain.push(b1);
    chain.push(chain_block(2, at(12, 0, 12)));

    let (h, store) = harvester(chain);
    add_all(&h, 3).await;
    h.start_sequencer().await.unwrap();

    let state = store.snapshot().await;
    assert_eq!(state.blocks[&1].counters.sessions_new, 1);
    assert!(state.sessions.is_empty());
    assert_eq!(state.totals[&1].session_id, 0);
    assert_eq!(state.totals[&2].session_id, 1);
}

// =============================================================================
// Market history
// =============================================================================

// Test critique: 10 / 12 / 9 dans la même minute donnent une seule bougie cohérente
#[tokio::test]
async fn test_candles_roll_up_within_one_minute() {
    let mut chain = FakeChain::new();
    for (n, (secs, price)) in [(5, 10), (20, 12), (40, 9)].into_iter().enumerate() {
        let mut block = chain_block(n as u64, at(12, 0, secs));
        block.events = vec![trade_event(0, &format!("t{n}"), price, 1)];
        chain.push(block);
    }

    let (h, store) = harvester(chain);
    add_all(&h, 3).await;
    h.start_sequencer().await.unwrap();

    let state = store.snapshot().await;
    for interval in Interval::ALL {
        let rows = state.candle_rows(interval);
        assert_eq!(rows.len(), 1, "{interval}");
        let v = rows[0].values;
        assert_eq!((v.open, v.high, v.low, v.close), (10, 12, 9, 9), "{interval}");
        assert_eq!((v.base_amount, v.quote_amount), (3, 31), "{interval}");
        assert_eq!(rows[0].base, "DOT");
        assert_eq!(rows[0].quote, "USDT");
    }
    assert_eq!(state.candle_rows(Interval::OneDay)[0].time, at(0, 0, 0));

    let page = h
        .market_history(Interval::OneMinute, "DOT", "USDT", at(23, 0, 0), None)
        .await
        .unwrap();
    assert_eq!(page.len(), 1);
}

// Test critique: une minute sans activité reçoit une ligne plate au dernier close
#[tokio::test]
async fn test_idle_minute_gets_flat_row() {
    let mut chain = FakeChain::new();
    let mut b0 = chain_block(0, at(12, 0, 10));
    b0.events = vec![trade_event(0, "t0", 10, 2)];
    chain.push(b0);
    chain.push(chain_block(1, at(12, 1, 10)));
    chain.push(chain_block(2, at(12, 1, 40)));

    let (h, store) = harvester(chain);
    add_all(&h, 3).await;
    h.start_sequencer().await.unwrap();

    let state = store.snapshot().await;
    let minutes = state.candle_rows(Interval::OneMinute);
    assert_eq!(minutes.len(), 2);
    assert_eq!(minutes[1].time, at(12, 1, 0));
    let flat = minutes[1].values;
    assert_eq!((flat.open, flat.high, flat.low, flat.close), (10, 10, 10, 10));
    assert_eq!((flat.base_amount, flat.quote_amount), (0, 0));

    let five = state.candle_rows(Interval::FiveMinutes);
    assert_eq!(five.len(), 1);
    assert_eq!(five[0].values.base_amount, 2);
    assert_eq!(five[0].values.close, 10);
}

// Test critique: les trades de blocs accumulés en avance ne sont pas vus
#[tokio::test]
async fn test_minute_window_ignores_later_blocks() {
    let mut chain = FakeChain::new();
    let mut b0 = chain_block(0, at(12, 0, 10));
    b0.events = vec![trade_event(0, "t0", 10, 1)];
    let mut b1 = chain_block(1, at(12, 0, 20));
    b1.events = vec![trade_event(0, "t1", 20, 1)];
    chain.push(b0);
    chain.push(b1);

    let (h, store) = harvester(chain);
    add_all(&h, 2).await;
    h.sequence_block_id(0).await.unwrap();

    let rows = store.snapshot().await.candle_rows(Interval::OneMinute);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].values.high, 10);
}

// =============================================================================
// Rollback & revert
// =============================================================================

/// Four blocks touching accounts, a council motion, a session and trades.
fn eventful_chain() -> FakeChain {
    let motion = hex(0x44);
    let mut chain = FakeChain::new();

    let mut b0 = chain_block(0, at(12, 0, 10));
    b0.extrinsics = vec![extrinsic(0, "council", "propose", Some(&account(1)), vec![("proposal", json!({ "call_module": "Treasury" }))])];
    b0.events = vec![
        event(0, Some(0), "balances", "NewAccount", vec![("AccountId", json!(hex(7))), ("Balance", json!("500"))]),
        event(1, Some(0), "council", "Proposed", vec![
            ("AccountId", json!(hex(1))),
            ("ProposalIndex", json!(5)),
            ("Hash", json!(motion)),
            ("MemberCount", json!(3)),
        ]),
        event(2, Some(0), "council", "Voted", vec![
            ("AccountId", json!(hex(2))),
            ("Hash", json!(motion)),
            ("bool", json!(true)),
            ("MemberCount", json!(1)),
            ("MemberCount", json!(0)),
        ]),
        trade_event(3, "t0", 10, 2),
    ];

    let mut b1 = chain_block(1, at(12, 0, 40));
    b1.events = vec![
        event(0, None, "session", "NewSession", vec![("SessionIndex", json!(1))]),
        trade_event(1, "t1", 12, 1),
    ];

    let mut b2 = chain_block(2, at(12, 1, 30));
    b2.events = vec![
        event(0, None, "balances", "ReapedAccount", vec![("AccountId", json!(hex(7)))]),
        event(1, None, "council", "Approved", vec![("Hash", json!(motion))]),
        trade_event(2, "t2", 9, 3),
    ];

    chain.push(b0);
    chain.push(b1);
    chain.push(b2);
    chain.push(chain_block(3, at(12, 3, 0)));
    chain
}

// Test critique: séquencer un bloc, annuler, puis le re-séquencer donne l'état d'un passage propre
#[tokio::test]
async fn test_resequencing_after_rollback_matches_clean_run() {
    let (clean, clean_store) = harvester(eventful_chain());
    add_all(&clean, 4).await;
    clean.start_sequencer().await.unwrap();

    let (h, store) = harvester(eventful_chain());
    add_all(&h, 4).await;
    h.sequence_block_id(0).await.unwrap();
    h.sequence_block_id(1).await.unwrap();

    let registry = BundleRegistry::standard().into_processor_registry();
    let block = store.block(2).await.unwrap().unwrap();
    let parent = store.block(1).await.unwrap().unwrap();
    let parent_total = store.block_total(1).await.unwrap().unwrap();

    let mut tx = store.begin().await.unwrap();
    let mut ctx = SequencingContext::new(&block, Some(&parent), &parent_total, &TestCodec);
    for processor in registry.blocks() {
        processor.sequencing_hook(&mut ctx, tx.as_mut()).await.unwrap();
    }
    let total = ctx.total.take().unwrap();
    tx.insert_block_total(&total).await.unwrap();
    // Le passage a bien écrit avant l'annulation
    let reaped = tx.account(&account(7)).await.unwrap().unwrap();
    assert!(reaped.is_reaped);
    tx.rollback().await.unwrap();

    assert!(store.block_total(2).await.unwrap().is_none());
    assert!(!store.snapshot().await.accounts[&account(7)].is_reaped);

    assert_eq!(
        h.start_sequencer().await.unwrap(),
        SequencerOutcome::Finished { sequenced: 2, last: Some(3) }
    );
    let state = store.snapshot().await;
    assert_eq!(state, clean_store.snapshot().await);
    assert_eq!(state.motions[&(Collective::Council, 5)].status, MotionStatus::Approved);
    assert_eq!(state.totals[&2].session_id, 1);
}

/// Block row as `add_block` stores it, counters left empty.
fn bare_block(block: &ChainBlock) -> Block {
    Block {
        id: block.number,
        hash: block.hash,
        parent_hash: block.parent_hash,
        state_root: block.state_root,
        extrinsics_root: block.extrinsics_root,
        datetime: block.datetime,
        spec_version: block.spec_version,
        counters: BlockCounters::default(),
    }
}

/// Store holding only the row of `block`.
async fn store_with_block(block: &ChainBlock) -> MemoryStore {
    let store = MemoryStore::new();
    let mut tx = store.begin().await.unwrap();
    tx.insert_block(&bare_block(block)).await.unwrap();
    tx.commit().await.unwrap();
    store
}

/// Every event and block accumulation hook the standard bundles run for `block`.
async fn accumulate_hooks(
    registry: &ProcessorRegistry,
    chain: &FakeChain,
    block: &ChainBlock,
    acc: &mut BlockAccumulation,
    tx: &mut dyn FactTx,
) {
    for event in &block.events {
        let Some(processor) = registry.event(&event.module_id, &event.event_id) else {
            continue;
        };
        assert!(event.matches_shape(processor.shape()), "{}", processor.key());
        let ctx = EventContext {
            block,
            event,
            extrinsic: block.extrinsic_for(event),
            legacy_session_lookup: false,
        };
        let prefetched = processor.prefetch(&ctx, chain).await.unwrap();
        processor
            .accumulation_hook(&ctx, &prefetched, acc, tx)
            .await
            .unwrap();
    }
    for processor in registry.blocks() {
        processor.accumulation_hook(acc, tx).await.unwrap();
    }
}

/// Revert hooks only, newest first.
async fn revert_hooks(registry: &ProcessorRegistry, block: &ChainBlock, tx: &mut dyn FactTx) {
    for processor in registry.blocks().iter().rev() {
        processor
            .accumulation_revert(block.number, tx)
            .await
            .unwrap();
    }
    for event in block.events.iter().rev() {
        if let Some(processor) = registry.event(&event.module_id, &event.event_id) {
            processor
                .accumulation_revert(block.number, tx)
                .await
                .unwrap();
        }
    }
}

// Test critique: l'annulation efface les audits de comptes écrits par l'accumulation
#[tokio::test]
async fn test_account_revert_leaves_no_trace() {
    let chain = FakeChain::new();
    let mut block = chain_block(0, at(12, 0, 0));
    block.events = vec![
        event(0, None, "balances", "NewAccount", vec![("AccountId", json!(hex(7))), ("Balance", json!("500"))]),
        event(1, None, "balances", "ReapedAccount", vec![("AccountId", json!(hex(8)))]),
    ];
    let registry = BundleRegistry::standard().into_processor_registry();
    let store = store_with_block(&block).await;
    let before = store.snapshot().await;

    let mut tx = store.begin().await.unwrap();
    let mut acc = BlockAccumulation::new(bare_block(&block), block.logs.clone());
    accumulate_hooks(&registry, &chain, &block, &mut acc, tx.as_mut()).await;
    assert_eq!(tx.audits(AuditKind::Account, 0).await.unwrap().len(), 2);
    assert_eq!(acc.block.counters.accounts_new, 1);

    revert_hooks(&registry, &block, tx.as_mut()).await;
    tx.commit().await.unwrap();
    assert_eq!(store.snapshot().await, before);
}

// Test critique: l'annulation efface les audits de motion et de vote
#[tokio::test]
async fn test_motion_revert_leaves_no_trace() {
    let motion = hex(0x44);
    let chain = FakeChain::new();
    let mut block = chain_block(0, at(12, 0, 0));
    block.extrinsics = vec![extrinsic(0, "council", "propose", Some(&account(1)), vec![("proposal", json!({ "call_module": "Treasury" }))])];
    block.events = vec![
        event(0, Some(0), "council", "Proposed", vec![
            ("AccountId", json!(hex(1))),
            ("ProposalIndex", json!(5)),
            ("Hash", json!(motion)),
            ("MemberCount", json!(3)),
        ]),
        event(1, Some(0), "council", "Voted", vec![
            ("AccountId", json!(hex(2))),
            ("Hash", json!(motion)),
            ("bool", json!(true)),
            ("MemberCount", json!(1)),
            ("MemberCount", json!(0)),
        ]),
        event(2, None, "council", "Approved", vec![("Hash", json!(motion))]),
    ];
    let registry = BundleRegistry::standard().into_processor_registry();
    let store = store_with_block(&block).await;
    let before = store.snapshot().await;

    let mut tx = store.begin().await.unwrap();
    let mut acc = BlockAccumulation::new(bare_block(&block), block.logs.clone());
    accumulate_hooks(&registry, &chain, &block, &mut acc, tx.as_mut()).await;
    assert!(!tx.audits(AuditKind::CouncilMotion, 0).await.unwrap().is_empty());
    assert!(!tx.audits(AuditKind::CouncilVote, 0).await.unwrap().is_empty());

    revert_hooks(&registry, &block, tx.as_mut()).await;
    tx.commit().await.unwrap();
    assert_eq!(store.snapshot().await, before);
}

// Test critique: l'annulation efface la session et ses validateurs
#[tokio::test]
async fn test_session_revert_leaves_no_trace() {
    let mut chain = FakeChain::new();
    chain.set_storage("Session", "Validators", vec![], json!([hex(0x10)]));
    let mut block = chain_block(0, at(12, 0, 0));
    block.events = vec![event(0, None, "session", "NewSession", vec![("SessionIndex", json!(1))])];
    let registry = BundleRegistry::standard().into_processor_registry();
    let store = store_with_block(&block).await;
    let before = store.snapshot().await;

    let mut tx = store.begin().await.unwrap();
    let mut acc = BlockAccumulation::new(bare_block(&block), block.logs.clone());
    accumulate_hooks(&registry, &chain, &block, &mut acc, tx.as_mut()).await;
    let sessions = tx.sessions_created_at(0).await.unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].count_validators, 1);

    revert_hooks(&registry, &block, tx.as_mut()).await;
    tx.commit().await.unwrap();
    let after = store.snapshot().await;
    assert!(after.session_validators.is_empty());
    assert_eq!(after, before);
}

// Test critique: l'annulation efface les trades du bloc
#[tokio::test]
async fn test_trade_revert_leaves_no_trace() {
    let chain = FakeChain::new();
    let mut block = chain_block(0, at(12, 0, 0));
    block.events = vec![trade_event(0, "t0", 10, 2), trade_event(1, "t1", 11, 1)];
    let registry = BundleRegistry::standard().into_processor_registry();
    let store = store_with_block(&block).await;
    let before = store.snapshot().await;

    let mut tx = store.begin().await.unwrap();
    let mut acc = BlockAccumulation::new(bare_block(&block), block.logs.clone());
    accumulate_hooks(&registry, &chain, &block, &mut acc, tx.as_mut()).await;
    let trades = tx.trades_in_window(at(0, 0, 0), at(23, 0, 0), 0).await.unwrap();
    assert_eq!(trades.len(), 2);

    revert_hooks(&registry, &block, tx.as_mut()).await;
    tx.commit().await.unwrap();
    assert_eq!(store.snapshot().await, before);
}

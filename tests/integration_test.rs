//! Integration Tests - End-to-end Redemption Round Testing
//!
//! Tests the interaction between usecases, ports, and mock adapters.
//! Uses mockall for trait mocking and tokio::test for async tests.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use alloy::primitives::{Address, B256, Bytes, U256};
use mockall::mock;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use prediction_redeemer::config::{ContractsConfig, RedeemingConfig};
use prediction_redeemer::domain::claim_params::{AnswerEvent, ClaimParams};
use prediction_redeemer::domain::error::ScanError;
use prediction_redeemer::domain::ledger::RedemptionLedger;
use prediction_redeemer::domain::policy::EGreedyPolicy;
use prediction_redeemer::domain::position::{Condition, Market, Question, Trade};
use prediction_redeemer::ports::gateway::{LedgerGateway, RedeemedQuery};
use prediction_redeemer::usecases::event_scanner::{EventScanner, ScanTarget};
use prediction_redeemer::usecases::reconciliation::reconcile;
use prediction_redeemer::usecases::settlement::{RoundOutcome, Settlement, SkipReason};

// ---- Mock Definitions ----

mock! {
    pub Gateway {}

    #[async_trait::async_trait]
    impl LedgerGateway for Gateway {
        async fn latest_block(&self) -> anyhow::Result<u64>;
        async fn block_at_timestamp(&self, timestamp: u64) -> anyhow::Result<u64>;
        async fn check_redeemed(
            &self,
            query: &RedeemedQuery,
            from_block: u64,
            to_block: u64,
        ) -> anyhow::Result<BTreeMap<B256, U256>>;
        async fn check_resolved(&self, condition_id: B256) -> anyhow::Result<bool>;
        async fn build_redeem_positions_tx(
            &self,
            collateral_token: Address,
            parent_collection_id: B256,
            condition_id: B256,
            index_sets: &[u64],
        ) -> anyhow::Result<Bytes>;
        async fn check_finalized(&self, question_id: B256) -> anyhow::Result<bool>;
        async fn get_history_hash(&self, question_id: B256) -> anyhow::Result<B256>;
        async fn get_claim_params(
            &self,
            question_id: B256,
            from_block: u64,
            to_block: u64,
        ) -> anyhow::Result<Vec<AnswerEvent>>;
        async fn simulate_claim_winnings(
            &self,
            question_id: B256,
            claim_params: &ClaimParams,
            sender: Address,
        ) -> anyhow::Result<bool>;
        async fn build_claim_winnings(
            &self,
            question_id: B256,
            claim_params: &ClaimParams,
        ) -> anyhow::Result<Bytes>;
        async fn build_resolve_tx(
            &self,
            question_id: B256,
            template_id: u64,
            question: &str,
            num_outcomes: u64,
        ) -> anyhow::Result<Bytes>;
    }
}

// ---- Helper Functions ----

fn redeeming_config(dust: Decimal) -> RedeemingConfig {
    RedeemingConfig {
        dust_threshold: dust,
        redeeming_batch_size: 5,
        event_filtering_batch_size: 300,
        minimum_batch_size: 50,
        reduce_factor: 0.5,
        max_filtering_retries: 6,
        contract_timeout_secs: 5,
        step_retry_sleep_ms: 0,
        max_step_retries: 2,
    }
}

fn contracts() -> ContractsConfig {
    ContractsConfig {
        conditional_tokens: Address::repeat_byte(0x01),
        realitio: Address::repeat_byte(0x02),
        realitio_proxy: Address::repeat_byte(0x03),
    }
}

fn safe() -> Address {
    Address::repeat_byte(0x5a)
}

fn winning_trade(seed: u8, tokens: u64, tx: &str) -> Trade {
    Trade {
        market: Market {
            collateral_token: Address::repeat_byte(0xcc),
            condition: Condition {
                id: B256::repeat_byte(seed),
                outcome_slot_count: 2,
            },
            creator: Address::repeat_byte(0xee),
            current_answer: Some(B256::with_last_byte(1)),
            question: Question {
                id: B256::repeat_byte(seed.wrapping_add(0x80)),
                data: format!("question {seed}"),
                answers: Vec::new(),
            },
            template_id: 2,
            answer_finalized_timestamp: 50,
            creation_timestamp: 1_000,
        },
        outcome_index: 1,
        outcome_token_marginal_price: dec!(0.5),
        outcome_tokens_traded: tokens,
        tx_hash: tx.to_string(),
    }
}

fn answer(byte: u8) -> AnswerEvent {
    AnswerEvent {
        history_hash: Some(B256::repeat_byte(byte)),
        user: Some(Address::repeat_byte(byte)),
        bond: Some(U256::from(byte)),
        answer: Some(B256::with_last_byte(1)),
    }
}

fn policy() -> EGreedyPolicy {
    let mut policy = EGreedyPolicy::new(0.1, 2, 10_800).unwrap();
    policy.register_tools(["prediction-offline", "prediction-online"]);
    policy
}

fn empty_query() -> RedeemedQuery {
    RedeemedQuery {
        redeemer: safe(),
        collateral_tokens: Vec::new(),
        parent_collection_ids: Vec::new(),
        condition_ids: Vec::new(),
        index_sets: Vec::new(),
    }
}

// ---- Event Scanner ----

#[tokio::test]
async fn test_scanner_shrinks_batch_and_retries_failed_window() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let mut gateway = MockGateway::new();
    gateway.expect_latest_block().times(1).returning(|| Ok(1_000));

    let seen = Arc::clone(&calls);
    let mut failed_once = false;
    gateway
        .expect_check_redeemed()
        .returning(move |_, from_block, to_block| {
            seen.lock().unwrap().push((from_block, to_block));
            if (from_block, to_block) == (100, 400) && !failed_once {
                failed_once = true;
                return Err(anyhow::anyhow!("query returned more than 10000 results"));
            }
            Ok(BTreeMap::new())
        });

    let config = redeeming_config(Decimal::ZERO);
    let mut ledger = RedemptionLedger::new(300);
    ledger.earliest_block = Some(100);

    let scanner = EventScanner::new(&gateway, &config);
    let report = scanner
        .scan(&mut ledger, &ScanTarget::Redeemed(empty_query()))
        .await
        .unwrap();

    assert_eq!(
        *calls.lock().unwrap(),
        vec![
            (100, 400),
            (100, 250),
            (250, 400),
            (400, 550),
            (550, 700),
            (700, 850),
            (850, 1_000),
        ]
    );
    assert_eq!(report.retries, 1);
    assert_eq!(report.windows, 6);
    assert_eq!(ledger.event_filtering_batch_size, 150);
    assert!(ledger.check.is_finished());
}

#[tokio::test]
async fn test_scanner_gives_up_and_keeps_cursor() {
    let mut gateway = MockGateway::new();
    gateway.expect_latest_block().returning(|| Ok(1_000));
    gateway
        .expect_check_redeemed()
        .times(6)
        .returning(|_, _, _| Err(anyhow::anyhow!("rpc unavailable")));

    let config = redeeming_config(Decimal::ZERO);
    let mut ledger = RedemptionLedger::new(300);
    ledger.earliest_block = Some(100);

    let scanner = EventScanner::new(&gateway, &config);
    let err = scanner
        .scan(&mut ledger, &ScanTarget::Redeemed(empty_query()))
        .await
        .unwrap_err();

    assert!(matches!(err, ScanError::RetriesExhausted { from_block: 100, retries: 6, .. }));
    assert_eq!(ledger.check.from_block, 100);
    assert_eq!(ledger.event_filtering_batch_size, 50);
}

#[tokio::test]
async fn test_scanner_resumes_from_checkpoint() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let mut gateway = MockGateway::new();
    gateway.expect_latest_block().never();

    let seen = Arc::clone(&calls);
    gateway
        .expect_check_redeemed()
        .returning(move |_, from_block, to_block| {
            seen.lock().unwrap().push((from_block, to_block));
            Ok(BTreeMap::new())
        });

    let config = redeeming_config(Decimal::ZERO);
    let mut ledger = RedemptionLedger::new(300);
    ledger.check.start(100, 1_000);
    ledger.check.advance(700);

    let scanner = EventScanner::new(&gateway, &config);
    scanner
        .scan(&mut ledger, &ScanTarget::Redeemed(empty_query()))
        .await
        .unwrap();

    assert_eq!(*calls.lock().unwrap(), vec![(700, 1_000)]);
}

// ---- Reconciliation ----

#[tokio::test]
async fn test_reconciliation_is_idempotent() {
    let mut gateway = MockGateway::new();
    gateway
        .expect_block_at_timestamp()
        .times(1)
        .returning(|_| Ok(100));

    let config = redeeming_config(Decimal::ZERO);
    let mut ledger = RedemptionLedger::new(300);
    let mut policy = policy();
    let trades = vec![winning_trade(1, 20, "0xa"), winning_trade(1, 10, "0xb")];

    reconcile(
        &gateway,
        config.contract_timeout(),
        &mut ledger,
        &mut policy,
        trades.clone(),
        100,
    )
    .await;
    let summary = reconcile(
        &gateway,
        config.contract_timeout(),
        &mut ledger,
        &mut policy,
        trades,
        100,
    )
    .await;

    assert_eq!(summary.inserted, 0);
    assert_eq!(ledger.trades.len(), 2);
    assert_eq!(ledger.claimable_amount(&B256::repeat_byte(1)), dec!(15));
    assert_eq!(ledger.earliest_block, Some(100));
}

#[tokio::test]
async fn test_reconciliation_records_tool_outcome_once() {
    let mut gateway = MockGateway::new();
    gateway.expect_block_at_timestamp().returning(|_| Ok(100));

    let config = redeeming_config(Decimal::ZERO);
    let mut ledger = RedemptionLedger::new(300);
    ledger
        .utilized_tools
        .insert("0xa".to_string(), "prediction-online".to_string());
    let mut policy = policy();
    policy.record_use("prediction-online");

    let trades = vec![winning_trade(1, 20, "0xa")];
    for _ in 0..2 {
        reconcile(
            &gateway,
            config.contract_timeout(),
            &mut ledger,
            &mut policy,
            trades.clone(),
            100,
        )
        .await;
    }

    let info = policy.accuracy_store["prediction-online"];
    assert_eq!(info.requests, 1);
    assert_eq!(info.pending, 0);
    assert!((info.accuracy - 1.0).abs() < f64::EPSILON);
    assert!(ledger.utilized_tools.is_empty());
}

#[tokio::test]
async fn test_older_market_lowers_scan_start() {
    let mut gateway = MockGateway::new();
    gateway
        .expect_block_at_timestamp()
        .times(2)
        .returning(|timestamp| Ok(timestamp / 10));

    let config = redeeming_config(Decimal::ZERO);
    let mut ledger = RedemptionLedger::new(300);
    let mut policy = policy();

    let mut recent = winning_trade(1, 20, "0xa");
    recent.market.creation_timestamp = 50_000;
    let mut older = winning_trade(2, 20, "0xb");
    older.market.creation_timestamp = 10_000;
    let mut newest = winning_trade(3, 20, "0xc");
    newest.market.creation_timestamp = 90_000;

    reconcile(
        &gateway,
        config.contract_timeout(),
        &mut ledger,
        &mut policy,
        vec![recent, older, newest],
        100,
    )
    .await;

    assert_eq!(ledger.earliest_block, Some(1_000));
}

// ---- Settlement ----

#[tokio::test]
async fn test_dust_positions_make_no_contract_calls() {
    let mut gateway = MockGateway::new();
    gateway.expect_block_at_timestamp().returning(|_| Ok(100));
    gateway.expect_latest_block().returning(|| Ok(1_000));
    gateway
        .expect_check_redeemed()
        .returning(|_, _, _| Ok(BTreeMap::new()));
    gateway.expect_check_finalized().never();
    gateway.expect_check_resolved().never();
    gateway.expect_get_history_hash().never();
    gateway.expect_build_redeem_positions_tx().never();

    let settlement = Settlement::with_config(
        gateway,
        redeeming_config(dec!(100)),
        contracts(),
        safe(),
    );
    let mut ledger = RedemptionLedger::new(300);
    let mut policy = policy();

    let report = settlement
        .prepare_round(&mut ledger, &mut policy, vec![winning_trade(1, 20, "0xa")], 100)
        .await;

    assert_eq!(report.outcome, RoundOutcome::NoRedeeming);
    assert_eq!(
        report.skipped,
        vec![(B256::repeat_byte(1), SkipReason::Dust { amount: dec!(10) })]
    );
}

#[tokio::test]
async fn test_full_round_resolves_claims_and_redeems() {
    let mut gateway = MockGateway::new();
    gateway.expect_block_at_timestamp().returning(|_| Ok(100));
    gateway.expect_latest_block().returning(|| Ok(1_000));
    gateway
        .expect_check_redeemed()
        .returning(|_, _, _| Ok(BTreeMap::new()));
    gateway.expect_check_finalized().times(1).returning(|_| Ok(true));
    gateway.expect_check_resolved().times(1).returning(|_| Ok(false));
    gateway
        .expect_build_resolve_tx()
        .withf(|_, template_id, question, num_outcomes| {
            *template_id == 2 && question == "question 1" && *num_outcomes == 2
        })
        .times(1)
        .returning(|_, _, _, _| Ok(Bytes::from_static(b"resolve")));
    gateway
        .expect_get_history_hash()
        .returning(|_| Ok(B256::repeat_byte(0x42)));
    gateway
        .expect_get_claim_params()
        .returning(|_, from_block, _| {
            if from_block == 100 {
                Ok(vec![answer(0xa1), answer(0xa2)])
            } else {
                Ok(Vec::new())
            }
        });
    gateway
        .expect_simulate_claim_winnings()
        .withf(|_, params, sender| params.len() == 2 && *sender == Address::repeat_byte(0x5a))
        .returning(|_, _, _| Ok(true));
    gateway
        .expect_build_claim_winnings()
        .withf(|_, params| {
            params.history_hashes == vec![B256::repeat_byte(0xa1), B256::ZERO]
        })
        .returning(|_, _| Ok(Bytes::from_static(b"claim")));
    gateway
        .expect_build_redeem_positions_tx()
        .withf(|_, parent, _, index_sets| *parent == B256::ZERO && index_sets == [1, 2])
        .returning(|_, _, _, _| Ok(Bytes::from_static(b"redeem")));

    let settlement = Settlement::with_config(
        gateway,
        redeeming_config(dec!(0.001)),
        contracts(),
        safe(),
    );
    let mut ledger = RedemptionLedger::new(300);
    let mut policy = policy();

    let report = settlement
        .prepare_round(&mut ledger, &mut policy, vec![winning_trade(1, 20, "0xa")], 100)
        .await;

    let RoundOutcome::Redeem(plan) = report.outcome else {
        panic!("expected a redemption batch, got {:?}", report.outcome);
    };
    let targets: Vec<Address> = plan.batches.iter().map(|b| b.to).collect();
    assert_eq!(
        targets,
        vec![
            Address::repeat_byte(0x03),
            Address::repeat_byte(0x02),
            Address::repeat_byte(0x01),
        ]
    );
    assert!(plan.batches.iter().all(|b| b.value == U256::ZERO));
    assert_eq!(plan.condition_ids, vec![B256::repeat_byte(1)]);
    assert_eq!(plan.expected_winnings, dec!(10));
    assert!(ledger.is_claiming(&B256::repeat_byte(1)));
}

#[tokio::test]
async fn test_already_claimed_question_only_redeems() {
    let mut gateway = MockGateway::new();
    gateway.expect_block_at_timestamp().returning(|_| Ok(100));
    gateway.expect_latest_block().returning(|| Ok(1_000));
    gateway
        .expect_check_redeemed()
        .returning(|_, _, _| Ok(BTreeMap::new()));
    gateway.expect_check_finalized().returning(|_| Ok(true));
    gateway.expect_check_resolved().returning(|_| Ok(true));
    gateway.expect_build_resolve_tx().never();
    gateway.expect_get_history_hash().returning(|_| Ok(B256::ZERO));
    gateway.expect_get_claim_params().never();
    gateway
        .expect_build_redeem_positions_tx()
        .returning(|_, _, _, _| Ok(Bytes::from_static(b"redeem")));

    let settlement = Settlement::with_config(
        gateway,
        redeeming_config(Decimal::ZERO),
        contracts(),
        safe(),
    );
    let mut ledger = RedemptionLedger::new(300);
    let mut policy = policy();

    let report = settlement
        .prepare_round(&mut ledger, &mut policy, vec![winning_trade(1, 20, "0xa")], 100)
        .await;

    let RoundOutcome::Redeem(plan) = report.outcome else {
        panic!("expected a redemption batch");
    };
    assert_eq!(plan.batches.len(), 1);
    assert_eq!(plan.batches[0].to, Address::repeat_byte(0x01));
}

#[tokio::test]
async fn test_redeemed_positions_are_dropped() {
    let mut gateway = MockGateway::new();
    gateway.expect_block_at_timestamp().returning(|_| Ok(100));
    gateway.expect_latest_block().returning(|| Ok(1_000));
    gateway.expect_check_redeemed().returning(|_, _, _| {
        let mut payouts = BTreeMap::new();
        payouts.insert(B256::repeat_byte(1), U256::from(10u64));
        Ok(payouts)
    });
    gateway.expect_check_finalized().never();

    let settlement = Settlement::with_config(
        gateway,
        redeeming_config(Decimal::ZERO),
        contracts(),
        safe(),
    );
    let mut ledger = RedemptionLedger::new(300);
    let mut policy = policy();

    let report = settlement
        .prepare_round(&mut ledger, &mut policy, vec![winning_trade(1, 20, "0xa")], 100)
        .await;

    assert_eq!(report.outcome, RoundOutcome::NoRedeeming);
    assert!(ledger.trades.is_empty());
    assert!(ledger.redeemed_condition_ids.contains(&B256::repeat_byte(1)));
    assert!(ledger.payout_so_far > U256::ZERO);
}

#[tokio::test]
async fn test_unfinalized_question_is_skipped() {
    let mut gateway = MockGateway::new();
    gateway.expect_block_at_timestamp().returning(|_| Ok(100));
    gateway.expect_latest_block().returning(|| Ok(1_000));
    gateway
        .expect_check_redeemed()
        .returning(|_, _, _| Ok(BTreeMap::new()));
    gateway.expect_check_finalized().returning(|_| Ok(false));
    gateway.expect_check_resolved().never();

    let settlement = Settlement::with_config(
        gateway,
        redeeming_config(Decimal::ZERO),
        contracts(),
        safe(),
    );
    let mut ledger = RedemptionLedger::new(300);
    let mut policy = policy();

    let report = settlement
        .prepare_round(&mut ledger, &mut policy, vec![winning_trade(1, 20, "0xa")], 100)
        .await;

    assert_eq!(report.outcome, RoundOutcome::NoRedeeming);
    assert_eq!(report.skipped, vec![(B256::repeat_byte(1), SkipReason::NotFinalized)]);
    assert!(ledger.claiming_condition_ids.is_empty());
}

#[tokio::test]
async fn test_failing_step_skips_candidate_after_retries() {
    let mut gateway = MockGateway::new();
    gateway.expect_block_at_timestamp().returning(|_| Ok(100));
    gateway.expect_latest_block().returning(|| Ok(1_000));
    gateway
        .expect_check_redeemed()
        .returning(|_, _, _| Ok(BTreeMap::new()));
    // first attempt plus two retries
    gateway
        .expect_check_finalized()
        .times(3)
        .returning(|_| Err(anyhow::anyhow!("execution reverted")));

    let settlement = Settlement::with_config(
        gateway,
        redeeming_config(Decimal::ZERO),
        contracts(),
        safe(),
    );
    let mut ledger = RedemptionLedger::new(300);
    let mut policy = policy();

    let report = settlement
        .prepare_round(&mut ledger, &mut policy, vec![winning_trade(1, 20, "0xa")], 100)
        .await;

    assert_eq!(report.outcome, RoundOutcome::NoRedeeming);
    assert_eq!(report.skipped.len(), 1);
    assert!(matches!(report.skipped[0].1, SkipReason::CallFailed { .. }));
}

#[tokio::test]
async fn test_scan_failure_aborts_round() {
    let mut gateway = MockGateway::new();
    gateway.expect_block_at_timestamp().returning(|_| Ok(100));
    gateway.expect_latest_block().returning(|| Ok(1_000));
    gateway
        .expect_check_redeemed()
        .returning(|_, _, _| Err(anyhow::anyhow!("rpc unavailable")));
    gateway.expect_check_finalized().never();

    let settlement = Settlement::with_config(
        gateway,
        redeeming_config(Decimal::ZERO),
        contracts(),
        safe(),
    );
    let mut ledger = RedemptionLedger::new(300);
    let mut policy = policy();

    let report = settlement
        .prepare_round(&mut ledger, &mut policy, vec![winning_trade(1, 20, "0xa")], 100)
        .await;

    assert!(matches!(report.outcome, RoundOutcome::ScanAborted(_)));
    assert_eq!(report.batch_size, 50);
    assert_eq!(report.scan_retries, 6);
    assert_eq!(ledger.trades.len(), 1);
}

#[tokio::test]
async fn test_batch_size_caps_positions_per_round() {
    let mut gateway = MockGateway::new();
    gateway.expect_block_at_timestamp().returning(|_| Ok(100));
    gateway.expect_latest_block().returning(|| Ok(1_000));
    gateway
        .expect_check_redeemed()
        .returning(|_, _, _| Ok(BTreeMap::new()));
    gateway.expect_check_finalized().times(2).returning(|_| Ok(true));
    gateway.expect_check_resolved().returning(|_| Ok(true));
    gateway.expect_get_history_hash().returning(|_| Ok(B256::ZERO));
    gateway
        .expect_build_redeem_positions_tx()
        .returning(|_, _, _, _| Ok(Bytes::from_static(b"redeem")));

    let mut config = redeeming_config(Decimal::ZERO);
    config.redeeming_batch_size = 2;
    let settlement = Settlement::with_config(gateway, config, contracts(), safe());
    let mut ledger = RedemptionLedger::new(300);
    let mut policy = policy();
    let trades = vec![
        winning_trade(1, 20, "0xa"),
        winning_trade(2, 20, "0xb"),
        winning_trade(3, 20, "0xc"),
    ];

    let report = settlement
        .prepare_round(&mut ledger, &mut policy, trades, 100)
        .await;

    let RoundOutcome::Redeem(plan) = report.outcome else {
        panic!("expected a redemption batch");
    };
    assert_eq!(plan.condition_ids, vec![B256::repeat_byte(1), B256::repeat_byte(2)]);
    assert_eq!(ledger.trades.len(), 3);
}

fn claim_round_gateway(claim_calls: Arc<Mutex<Vec<(u64, u64)>>>) -> MockGateway {
    let mut gateway = MockGateway::new();
    gateway.expect_block_at_timestamp().returning(|_| Ok(100));
    gateway.expect_latest_block().times(1).returning(|| Ok(1_000));
    gateway
        .expect_check_redeemed()
        .returning(|_, _, _| Ok(BTreeMap::new()));
    gateway.expect_check_finalized().returning(|_| Ok(true));
    gateway.expect_check_resolved().returning(|_| Ok(true));
    gateway
        .expect_get_history_hash()
        .returning(|_| Ok(B256::repeat_byte(0x42)));
    gateway
        .expect_get_claim_params()
        .returning(move |_, from_block, to_block| {
            claim_calls.lock().unwrap().push((from_block, to_block));
            if from_block == 400 {
                Ok(vec![answer(0xa2)])
            } else {
                Ok(Vec::new())
            }
        });
    gateway
        .expect_simulate_claim_winnings()
        .returning(|_, _, _| Ok(true));
    gateway
        .expect_build_claim_winnings()
        .withf(|_, params| {
            params.history_hashes == vec![B256::repeat_byte(0xa1), B256::ZERO]
                && params.addresses
                    == vec![Address::repeat_byte(0xa2), Address::repeat_byte(0xa1)]
        })
        .times(1)
        .returning(|_, _| Ok(Bytes::from_static(b"claim")));
    gateway
        .expect_build_redeem_positions_tx()
        .returning(|_, _, _, _| Ok(Bytes::from_static(b"redeem")));
    gateway
}

#[tokio::test]
async fn test_interrupted_claim_scan_resumes_from_cursor() {
    let claim_calls = Arc::new(Mutex::new(Vec::new()));
    let settlement = Settlement::with_config(
        claim_round_gateway(Arc::clone(&claim_calls)),
        redeeming_config(Decimal::ZERO),
        contracts(),
        safe(),
    );

    let trade = winning_trade(1, 20, "0xa");
    let mut ledger = RedemptionLedger::new(300);
    ledger.focus_claim_scan(trade.question_id());
    ledger.claim.start(100, 1_000);
    ledger.claim.advance(400);
    ledger.answered.push(answer(0xa1));
    let mut policy = policy();

    let report = settlement
        .prepare_round(&mut ledger, &mut policy, vec![trade], 100)
        .await;

    assert!(matches!(report.outcome, RoundOutcome::Redeem(_)));
    assert_eq!(*claim_calls.lock().unwrap(), vec![(400, 700), (700, 1_000)]);
    assert_eq!(ledger.answered.len(), 2);
}

#[tokio::test]
async fn test_finished_claim_scan_uses_cached_answers() {
    let claim_calls = Arc::new(Mutex::new(Vec::new()));
    let settlement = Settlement::with_config(
        claim_round_gateway(Arc::clone(&claim_calls)),
        redeeming_config(Decimal::ZERO),
        contracts(),
        safe(),
    );

    let trade = winning_trade(1, 20, "0xa");
    let mut ledger = RedemptionLedger::new(300);
    ledger.focus_claim_scan(trade.question_id());
    ledger.claim.start(100, 1_000);
    ledger.claim.advance(1_000);
    ledger.answered.extend([answer(0xa1), answer(0xa2)]);
    let mut policy = policy();

    let report = settlement
        .prepare_round(&mut ledger, &mut policy, vec![trade], 100)
        .await;

    let RoundOutcome::Redeem(plan) = report.outcome else {
        panic!("expected a redemption batch");
    };
    assert!(claim_calls.lock().unwrap().is_empty());
    assert_eq!(plan.batches.len(), 2);
    assert_eq!(plan.batches[0].to, Address::repeat_byte(0x02));
}

// Activation Invariants - Property tests over random message histories
// Principle: Whatever the admin sends, answers for past heights never move
//
// Invariants tested:
// 1. Never-mentioned features are never usable
// 2. Activation takes effect exactly at its height
// 3. Deactivation takes effect in its own block and stays until a later activation
// 4. Unauthorized messages change nothing
// 5. Repeating a message in place changes nothing
// 6. Clients below the minimum version never see a feature
// 7. Answers for committed heights survive all later blocks
// 8. Snapshots restore to a state indistinguishable from the original

use crate::contracts::activation::{ActivationEngine, ActivationRules, RegistrySnapshot};
use crate::contracts::authorization::AuthorizationGate;
use crate::contracts::registry::FeatureRegistry;
use crate::types::{Address, BlockNumber, FeatureId, FeatureMessage};
use proptest::prelude::*;

// =============================================================================
// TEST HELPERS
// =============================================================================

/// Features the random histories talk about
const MENTIONED: std::ops::RangeInclusive<u32> = 1..=5;

/// Height of the first generated block
const START: BlockNumber = 1;

fn admin() -> Address {
    Address::parse("moSfCMqU8rjB99n7Rm5pBgRvRGevyKVJzY").unwrap()
}

fn stranger() -> Address {
    Address::parse("mxwV8Kc2rLCrWkcxtTgKUTXJvrm7AWkqVT").unwrap()
}

fn f(id: u32) -> FeatureId {
    FeatureId::new(id).unwrap()
}

/// Message template, resolved against the height of the block carrying it
#[derive(Debug, Clone, PartialEq)]
struct RawMessage {
    authorized: bool,
    deactivate: bool,
    feature: u32,
    offset: BlockNumber,
    version: u32,
}

impl RawMessage {
    fn resolve(&self, height: BlockNumber) -> FeatureMessage {
        let sender = if self.authorized { admin() } else { stranger() };
        if self.deactivate {
            FeatureMessage::deactivation(sender, self.feature)
        } else {
            FeatureMessage::activation(sender, self.feature, height + self.offset, self.version)
        }
    }
}

fn arb_raw_message() -> impl Strategy<Value = RawMessage> {
    (
        proptest::bool::weighted(0.8),
        proptest::bool::weighted(0.3),
        MENTIONED,
        0u64..15,
        0u32..3,
    )
        .prop_map(|(authorized, deactivate, feature, offset, version)| RawMessage {
            authorized,
            deactivate,
            feature,
            offset,
            version,
        })
}

fn arb_history() -> impl Strategy<Value = Vec<Vec<RawMessage>>> {
    prop::collection::vec(prop::collection::vec(arb_raw_message(), 0..4), 1..40)
}

fn new_engine() -> ActivationEngine {
    ActivationEngine::new(AuthorizationGate::new(admin()), ActivationRules::default())
}

fn run_on(engine: &mut ActivationEngine, history: &[Vec<RawMessage>], start: BlockNumber) {
    for (i, block) in history.iter().enumerate() {
        let height = start + i as BlockNumber;
        let messages: Vec<FeatureMessage> = block.iter().map(|m| m.resolve(height)).collect();
        engine.process_block(height, &messages).unwrap();
    }
}

fn run(history: &[Vec<RawMessage>]) -> ActivationEngine {
    let mut engine = new_engine();
    run_on(&mut engine, history, START);
    engine
}

/// Extend with empty blocks through `to`
fn advance(engine: &mut ActivationEngine, to: BlockNumber) {
    let from = engine.tip().map_or(START, |t| t + 1);
    for h in from..=to {
        engine.process_block(h, &[]).unwrap();
    }
}

// =============================================================================
// PROPERTIES
// =============================================================================

proptest! {
    #[test]
    fn proptest_never_mentioned_is_never_usable(history in arb_history(), version in 0u32..5) {
        let mut engine = run(&history);
        let tip = engine.tip().unwrap();
        advance(&mut engine, tip + 20);

        for id in 6..=20u32 {
            for h in 0..=tip + 20 {
                prop_assert!(!engine.is_usable(f(id), h, version));
            }
            prop_assert_eq!(
                engine.get_status(f(id)),
                crate::types::FeatureStatus::never_activated()
            );
        }
    }

    #[test]
    fn proptest_activation_boundary(
        history in arb_history(),
        at in 0usize..40,
        delay in 1u64..30,
        min_version in 0u32..5,
    ) {
        // Feature 9 appears nowhere in the random history
        let mut history = history;
        let at = at % history.len();
        let height = START + at as BlockNumber;
        history[at].push(RawMessage {
            authorized: true,
            deactivate: false,
            feature: 9,
            offset: delay,
            version: min_version,
        });

        let mut engine = run(&history);
        let target = height + delay;
        advance(&mut engine, target);

        for v in 0..=min_version + 1 {
            prop_assert!(!engine.is_usable(f(9), target - 1, v));
        }
        prop_assert!(engine.is_usable(f(9), target, min_version));
        prop_assert!(engine.is_usable(f(9), target, min_version + 1));
        if min_version > 0 {
            prop_assert!(!engine.is_usable(f(9), target, min_version - 1));
        }
    }

    #[test]
    fn proptest_deactivation_is_immediate(
        history in arb_history(),
        at in 0usize..40,
        feature in MENTIONED,
    ) {
        // Last message of its block, so nothing later in the block reactivates
        let mut history = history;
        let at = at % history.len();
        let height = START + at as BlockNumber;
        history[at].push(RawMessage {
            authorized: true,
            deactivate: true,
            feature,
            offset: 0,
            version: 0,
        });

        let mut engine = run(&history);
        let tip = engine.tip().unwrap();
        advance(&mut engine, tip + 20);

        let reactivated = engine
            .completed_activations()
            .into_iter()
            .filter(|c| c.feature_id == f(feature) && c.activated_at_block > height)
            .map(|c| c.activated_at_block)
            .min()
            .unwrap_or(tip + 21);

        for h in height..reactivated {
            for v in 0..3 {
                prop_assert!(!engine.is_usable(f(feature), h, v));
            }
        }
    }

    #[test]
    fn proptest_unauthorized_messages_are_inert(history in arb_history()) {
        let authorized_only: Vec<Vec<RawMessage>> = history
            .iter()
            .map(|block| block.iter().filter(|m| m.authorized).cloned().collect())
            .collect();

        let with_strangers = run(&history);
        let baseline = run(&authorized_only);

        prop_assert_eq!(with_strangers.snapshot(), baseline.snapshot());
        for id in MENTIONED {
            prop_assert_eq!(with_strangers.get_status(f(id)), baseline.get_status(f(id)));
        }
    }

    #[test]
    fn proptest_repeated_message_is_idempotent(
        history in arb_history(),
        block in 0usize..40,
        index in 0usize..4,
    ) {
        let block = block % history.len();
        prop_assume!(!history[block].is_empty());
        let index = index % history[block].len();

        let mut doubled = history.clone();
        let repeated = doubled[block][index].clone();
        doubled[block].insert(index, repeated);

        prop_assert_eq!(run(&doubled).snapshot(), run(&history).snapshot());
    }

    #[test]
    fn proptest_registry_activation_idempotent(
        feature in 1u32..100,
        height in 0u64..10_000,
        version in 0u32..10,
    ) {
        let mut once = FeatureRegistry::new();
        once.apply_activation(f(feature), height, version);

        let mut twice = once.clone();
        prop_assert!(!twice.apply_activation(f(feature), height, version));

        prop_assert_eq!(twice.get_status(f(feature)), once.get_status(f(feature)));
        prop_assert_eq!(twice, once);
    }

    #[test]
    fn proptest_version_gating(history in arb_history(), feature in MENTIONED) {
        let engine = run(&history);
        let tip = engine.tip().unwrap();

        // Usability is monotone in the client version
        for h in START..=tip {
            for v in 0..3u32 {
                if engine.is_usable(f(feature), h, v) {
                    prop_assert!(engine.is_usable(f(feature), h, v + 1));
                }
            }
        }

        let status = engine.get_status(f(feature));
        if status.active && status.min_client_version > 0 {
            prop_assert!(!engine.is_usable(f(feature), tip, status.min_client_version - 1));
        }
    }

    #[test]
    fn proptest_committed_answers_never_change(history in arb_history()) {
        let mut engine = new_engine();
        let mut answers = Vec::new();

        for (i, block) in history.iter().enumerate() {
            let height = START + i as BlockNumber;
            let messages: Vec<FeatureMessage> = block.iter().map(|m| m.resolve(height)).collect();
            engine.process_block(height, &messages).unwrap();

            for id in MENTIONED {
                for v in 0..3u32 {
                    answers.push((id, height, v, engine.is_usable(f(id), height, v)));
                }
            }
        }

        let tip = engine.tip().unwrap();
        advance(&mut engine, tip + 20);

        for (id, height, v, answer) in answers {
            prop_assert_eq!(engine.is_usable(f(id), height, v), answer);
        }
    }

    #[test]
    fn proptest_snapshot_restore_is_transparent(
        prefix in arb_history(),
        suffix in arb_history(),
    ) {
        let mut full = Vec::new();
        full.extend(prefix.iter().cloned());
        full.extend(suffix.iter().cloned());
        let uninterrupted = run(&full);

        let bytes = run(&prefix).snapshot().to_bytes().unwrap();
        let mut resumed = new_engine();
        resumed.restore(RegistrySnapshot::from_bytes(&bytes).unwrap());
        run_on(&mut resumed, &suffix, START + prefix.len() as BlockNumber);

        prop_assert_eq!(resumed.snapshot(), uninterrupted.snapshot());
        prop_assert_eq!(
            resumed.snapshot().digest().unwrap(),
            uninterrupted.snapshot().digest().unwrap()
        );
    }
}

// =============================================================================
// FIXED CASES
// =============================================================================

#[test]
fn test_last_activation_by_height_wins() {
    let mut engine = new_engine();
    engine
        .process_block(10, &[FeatureMessage::activation(admin(), 1, 30, 0)])
        .unwrap();
    engine
        .process_block(11, &[FeatureMessage::activation(admin(), 1, 20, 2)])
        .unwrap();
    advance(&mut engine, 30);

    assert_eq!(engine.get_status(f(1)).activated_at_block, Some(30));
    assert_eq!(engine.get_status(f(1)).min_client_version, 0);
    assert!(engine.is_usable(f(1), 25, 2));
    assert!(!engine.is_usable(f(1), 25, 1));
    assert!(engine.is_usable(f(1), 30, 0));
}

#[test]
fn test_same_key_resubmission_replaces() {
    let mut engine = new_engine();
    engine
        .process_block(10, &[FeatureMessage::activation(admin(), 1, 20, 5)])
        .unwrap();
    engine
        .process_block(11, &[FeatureMessage::activation(admin(), 1, 20, 1)])
        .unwrap();

    let pending = engine.pending_activations();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].min_client_version, 1);
    assert_eq!(pending[0].received_at_block, 11);
}

#[test]
fn test_deactivation_then_pending_reactivation() {
    let mut engine = new_engine();
    engine
        .process_block(10, &[FeatureMessage::activation(admin(), 1, 10, 0)])
        .unwrap();
    engine
        .process_block(11, &[FeatureMessage::activation(admin(), 1, 15, 0)])
        .unwrap();
    engine
        .process_block(12, &[FeatureMessage::deactivation(admin(), 1)])
        .unwrap();
    advance(&mut engine, 15);

    assert!(engine.is_usable(f(1), 11, 0));
    assert!(!engine.is_usable(f(1), 12, 0));
    assert!(!engine.is_usable(f(1), 14, 0));
    assert!(engine.is_usable(f(1), 15, 0));
}

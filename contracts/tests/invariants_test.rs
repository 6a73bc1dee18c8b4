//! Randomized and concurrent checks of the ledger invariants.
//!
//! After every operation, successful or not:
//!
//! - `held(h) <= total(h)` for every account;
//! - `held(h)` equals the sum of `h`'s active holds;
//! - the sum of all totals equals the total supply;
//! - no hold ever leaves a terminal status.
//!
//! A rejected operation must leave every balance untouched.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use holdfast_contracts::{HoldError, HoldRequest, HoldStatus, HoldableToken, TokenConfig};
use holdfast_protocol::{Address, HashLock, HoldId, Ledger, ManualClock, NoopSink};

const START: u64 = 1_000_000;

fn accounts() -> Vec<Address> {
    ["a", "b", "c", "d"]
        .iter()
        .map(|l| Address::from_label(l))
        .collect()
}

fn owner() -> Address {
    Address::from_label("owner")
}

/// Every account's `(total, held)` plus the total supply.
fn snapshot(token: &HoldableToken, accounts: &[Address]) -> (Vec<(u64, u64)>, u64) {
    let per_account = token.inspect(|ledger, _| {
        accounts
            .iter()
            .map(|a| (ledger.total(a), ledger.held(a)))
            .collect()
    });
    (per_account, token.total_supply())
}

fn check_invariants(token: &HoldableToken, accounts: &[Address]) {
    let supply = token.total_supply();
    token.inspect(|ledger, holds| {
        for a in accounts {
            assert!(ledger.held(a) <= ledger.total(a), "held > total for {a}");
            assert_eq!(
                ledger.held(a) as u128,
                holds.active_value_of(a),
                "held does not match active holds for {a}"
            );
            assert_eq!(ledger.spendable(a), ledger.total(a) - ledger.held(a));
        }
        assert_eq!(ledger.sum_of_totals(), supply as u128);
        assert_eq!(ledger.total_held(), holds.active_value());
    });
}

#[test]
fn random_operations_preserve_invariants() {
    let mut rng = StdRng::seed_from_u64(0x486f_6c64);
    let clock = Arc::new(ManualClock::new(START));
    let token: HoldableToken = HoldableToken::with_parts(
        TokenConfig::new("Fuzz", "FUZ", owner()),
        clock.clone(),
        Arc::new(NoopSink),
    )
    .unwrap();
    let accounts = accounts();
    let preimage = b"fuzz".to_vec();

    let mut ids: Vec<HoldId> = Vec::new();
    let mut terminal: HashMap<HoldId, HoldStatus> = HashMap::new();

    for step in 0..2_000 {
        let before = snapshot(&token, &accounts);
        let a = accounts[rng.gen_range(0..accounts.len())];
        let b = accounts[rng.gen_range(0..accounts.len())];
        let amount = rng.gen_range(0..200u64);

        let failed = match rng.gen_range(0..9) {
            0 => token.mint(owner(), a, amount).is_err(),
            1 => token.transfer(a, b, amount).is_err(),
            2 => token.approve(a, b, amount).is_err(),
            3 => token.transfer_from(b, a, b, amount).is_err(),
            4 => token.burn(a, amount).is_err(),
            5 => {
                let id = if !ids.is_empty() && rng.gen_bool(0.1) {
                    // Reuse an id on purpose.
                    ids[rng.gen_range(0..ids.len())]
                } else {
                    HoldId::random()
                };
                let mut request = HoldRequest::new(id, b, amount)
                    .expiration(START + rng.gen_range(0..500));
                if rng.gen_bool(0.5) {
                    request = request.recipient(accounts[rng.gen_range(0..accounts.len())]);
                }
                if rng.gen_bool(0.5) {
                    request = request.hash_lock(HashLock::from_preimage(&preimage));
                }
                let result = token.hold(a, request);
                if result.is_ok() {
                    ids.push(id);
                }
                result.is_err()
            }
            6 if !ids.is_empty() => {
                let id = ids[rng.gen_range(0..ids.len())];
                let record = token.retrieve_hold_data(&id).unwrap();
                let caller = if rng.gen_bool(0.5) {
                    record.notary
                } else {
                    record.holder
                };
                token.release_hold(caller, &id).is_err()
            }
            7 if !ids.is_empty() => {
                let id = ids[rng.gen_range(0..ids.len())];
                let record = token.retrieve_hold_data(&id).unwrap();
                let explicit = if record.recipient.is_zero() {
                    Some(b)
                } else {
                    None
                };
                let secret = if rng.gen_bool(0.8) {
                    Some(preimage.as_slice())
                } else {
                    Some(&b"nope"[..])
                };
                token
                    .execute_hold(record.notary, &id, secret, explicit)
                    .is_err()
            }
            _ => {
                clock.advance(rng.gen_range(0..50));
                false
            }
        };

        if failed {
            assert_eq!(
                snapshot(&token, &accounts),
                before,
                "rejected operation changed state at step {step}"
            );
        }

        check_invariants(&token, &accounts);

        for id in &ids {
            let status = token.hold_status(id).unwrap();
            if let Some(previous) = terminal.get(id) {
                assert_eq!(status, *previous, "hold left a terminal status");
            } else if status.is_terminal() {
                terminal.insert(*id, status);
            }
        }
    }

    assert!(!ids.is_empty());
}

#[test]
fn concurrent_holds_never_overdraw() {
    let token: Arc<HoldableToken> = Arc::new(
        HoldableToken::with_parts(
            TokenConfig::new("Threads", "THR", owner()),
            Arc::new(ManualClock::new(START)),
            Arc::new(NoopSink),
        )
        .unwrap(),
    );
    let holder = Address::from_label("holder");
    let notary = Address::from_label("notary");
    token.mint(owner(), holder, 1000).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let token = Arc::clone(&token);
            thread::spawn(move || {
                token
                    .hold(holder, HoldRequest::new(HoldId::random(), notary, 200))
                    .is_ok()
            })
        })
        .collect();

    let successes = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();

    assert_eq!(successes, 5);
    assert_eq!(token.balance_on_hold(&holder), 1000);
    assert_eq!(token.spendable_balance_of(&holder), 0);
}

#[test]
fn concurrent_execute_and_release_have_one_winner() {
    let token: Arc<HoldableToken> = Arc::new(
        HoldableToken::with_parts(
            TokenConfig::new("Threads", "THR", owner()),
            Arc::new(ManualClock::new(START)),
            Arc::new(NoopSink),
        )
        .unwrap(),
    );
    let holder = Address::from_label("holder");
    let notary = Address::from_label("notary");
    let shop = Address::from_label("shop");
    token.mint(owner(), holder, 100).unwrap();
    let id = HoldId::random();
    token
        .hold(holder, HoldRequest::new(id, notary, 100).recipient(shop))
        .unwrap();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let token = Arc::clone(&token);
            thread::spawn(move || {
                if i % 2 == 0 {
                    token.execute_hold(notary, &id, None, None).map(|_| ())
                } else {
                    token.release_hold(notary, &id).map(|_| ())
                }
            })
        })
        .collect();

    let results: Vec<Result<(), HoldError>> =
        handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, HoldError::HoldNotHeld { .. })));

    // Whichever won, value is conserved and nothing is still held.
    assert_eq!(token.balance_on_hold(&holder), 0);
    assert_eq!(token.balance_of(&holder) + token.balance_of(&shop), 100);
}

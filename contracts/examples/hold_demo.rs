//! Terminal walkthrough of a hold's life on a Holdfast token.
//!
//! Mints to a holder, places a hash-locked hold for a shop, shows that the
//! held value cannot be spent or released early, then lets the notary
//! execute with the secret. Ends with the Prometheus exposition.
//!
//! Run with:
//!   cargo run -p holdfast-contracts --example hold_demo
//!
//! Set `RUST_LOG=holdfast_contracts=debug` to see rejected requests too.

use std::sync::Arc;

use holdfast_contracts::{HoldMetrics, HoldRequest, HoldableToken, TokenConfig};
use holdfast_protocol::config::DEFAULT_LOG_FILTER;
use holdfast_protocol::crypto::new_secret_hash_pair;
use holdfast_protocol::logging::{init_logging, LogFormat};
use holdfast_protocol::{Address, Clock, HoldId, SystemClock, TracingSink};

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const CYAN: &str = "\x1b[36m";

fn section(num: u32, title: &str) {
    println!();
    println!("{BOLD}{CYAN}== Step {num} == {title}{RESET}");
}

fn ok(text: &str) {
    println!("  {GREEN}ok{RESET}  {text}");
}

fn refused(text: &str, err: &dyn std::fmt::Display) {
    println!("  {RED}no{RESET}  {text}");
    println!("      {DIM}{err}{RESET}");
}

fn show(token: &HoldableToken, label: &str, account: Address) {
    println!(
        "      {label:<8} total {:>6}  held {:>6}  spendable {:>6}",
        token.balance_of(&account),
        token.balance_on_hold(&account),
        token.spendable_balance_of(&account),
    );
}

fn main() -> anyhow::Result<()> {
    init_logging(DEFAULT_LOG_FILTER, LogFormat::Pretty)?;

    let issuer = Address::from_label("issuer");
    let holder = Address::from_label("holder");
    let shop = Address::from_label("shop");
    let notary = Address::from_label("notary");

    let metrics = HoldMetrics::new()?;
    let token: HoldableToken = HoldableToken::with_parts(
        TokenConfig::new("Holdfast Euro", "HEUR", issuer),
        Arc::new(SystemClock),
        Arc::new(TracingSink),
    )?
    .with_metrics(metrics);

    section(1, "Issue funds");
    token.mint(issuer, holder, 1_000)?;
    ok("issuer minted 1000 HEUR to the holder");
    show(&token, "holder", holder);

    section(2, "Place a hash-locked hold for the shop");
    let (secret, lock) = new_secret_hash_pair();
    let id = HoldId::random();
    token.hold(
        holder,
        HoldRequest::new(id, notary, 900)
            .recipient(shop)
            .expiration(SystemClock.now() + 3_600)
            .hash_lock(lock),
    )?;
    ok(&format!("hold {id} placed, expires in one hour"));
    show(&token, "holder", holder);

    section(3, "Held value is spoken for");
    if let Err(e) = token.transfer(holder, shop, 200) {
        refused("holder tries to transfer 200", &e);
    }
    if let Err(e) = token.release_hold(holder, &id) {
        refused("holder tries to take the hold back early", &e);
    }
    if let Err(e) = token.execute_hold(notary, &id, Some(b"guess"), None) {
        refused("notary executes with a wrong secret", &e);
    }

    section(4, "Notary settles");
    let to = token.execute_hold(notary, &id, Some(secret.as_bytes()), None)?;
    ok(&format!("900 HEUR moved to {to}"));
    show(&token, "holder", holder);
    show(&token, "shop", shop);

    section(5, "Metrics");
    if let Some(metrics) = token.metrics() {
        for line in metrics.encode()?.lines().filter(|l| !l.starts_with('#')) {
            println!("      {DIM}{line}{RESET}");
        }
    }

    Ok(())
}

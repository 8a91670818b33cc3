//! Interactive CLI demo of the full CHROMA colored-coin lifecycle.
//!
//! Walks through wallet creation, asset issuance, backward color
//! resolution, a transfer with per-color change, and the protocol's
//! handling of a malformed kernel tag. The output uses ANSI escape codes
//! for colored, storytelling-style terminal rendering.
//!
//! Run with:
//!   cargo run --example demo --release

use std::sync::Arc;
use std::time::Instant;

use chroma_protocol::asset::{AssetDefinition, AssetRegistry};
use chroma_protocol::compose::{
    CandidateOutput, Composer, ComposerConfig, TransferTarget, UnsignedDraft,
};
use chroma_protocol::graph::{
    InMemoryGraph, LedgerTransaction, LockScript, OutPoint, TxInput, TxOutput,
};
use chroma_protocol::kernel::{KernelId, Tag};
use chroma_protocol::resolve::{ColorResolver, ColorStatus, ResolverConfig};
use chroma_protocol::wallet::{DraftSigner, Keychain, KeychainSigner};

// ---------------------------------------------------------------------------
// ANSI color constants
// ---------------------------------------------------------------------------

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";

const GREEN: &str = "\x1b[32m";
const MAGENTA: &str = "\x1b[35m";
const CYAN: &str = "\x1b[36m";
const WHITE: &str = "\x1b[37m";

const BG_BLUE: &str = "\x1b[44m";

// ---------------------------------------------------------------------------
// Display helpers
// ---------------------------------------------------------------------------

fn banner() {
    println!();
    println!(
        "{BG_BLUE}{BOLD}{WHITE}                                                                    {RESET}"
    );
    println!(
        "{BG_BLUE}{BOLD}{WHITE}    CHROMA PROTOCOL  --  Colored-Coin Lifecycle Demo                {RESET}"
    );
    println!(
        "{BG_BLUE}{BOLD}{WHITE}    Version 0.1.0  |  OBC + EPOBC kernels over a plain ledger       {RESET}"
    );
    println!(
        "{BG_BLUE}{BOLD}{WHITE}                                                                    {RESET}"
    );
    println!();
}

fn section(number: u32, title: &str) {
    println!();
    println!("{BOLD}{CYAN}--- [{number}] {title} {RESET}");
    println!();
}

fn step(text: &str) {
    println!("  {GREEN}*{RESET} {text}");
}

fn detail(label: &str, value: &str) {
    println!("      {DIM}{label:<18}{RESET} {value}");
}

fn short(id: impl ToString) -> String {
    let s = id.to_string();
    format!("{}...{}", &s[..10], &s[s.len() - 6..])
}

fn show_draft(draft: &UnsignedDraft) {
    for (i, input) in draft.inputs.iter().enumerate() {
        let color = input
            .color
            .as_ref()
            .map(|m| format!("{} {}", m.amount, m.asset))
            .unwrap_or_else(|| "uncolored".to_string());
        println!(
            "      {DIM}in  [{i}]{RESET} {:<22} {MAGENTA}{}{RESET}",
            short(input.outpoint),
            color
        );
    }
    for (i, output) in draft.outputs.iter().enumerate() {
        let color = output
            .color
            .as_ref()
            .map(|m| format!("{} {}", m.amount, m.asset))
            .unwrap_or_else(|| "uncolored".to_string());
        println!(
            "      {DIM}out [{i}]{RESET} {:<22} value={:<8} {MAGENTA}{}{RESET}",
            match &output.lock {
                LockScript::Address(a) => short(a),
                LockScript::DataCarrier(_) => "(marker)".to_string(),
            },
            output.value,
            color
        );
    }
    println!("      {DIM}fee{RESET}                {}", draft.fee);
}

// ---------------------------------------------------------------------------
// Demo
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() {
    let started = Instant::now();
    banner();

    // -- 1. Wallets ---------------------------------------------------------

    section(1, "Wallets");
    let issuer = Arc::new(Keychain::mainnet());
    let issuer_addr = issuer.generate_address().expect("address");
    let alice = Arc::new(Keychain::mainnet());
    let alice_addr = alice.generate_address().expect("address");

    step("generated two Ed25519 wallets");
    detail("issuer", &issuer_addr);
    detail("alice", &alice_addr);

    // -- 2. Base-ledger funding --------------------------------------------

    section(2, "Base-ledger funding");
    let graph = Arc::new(InMemoryGraph::new());

    // A coinbase-style transaction funds the issuer with plain value.
    let funding = LedgerTransaction::new(
        vec![],
        vec![TxOutput::to_address(1_000_000, issuer_addr.clone())],
    );
    graph.insert(funding.clone());
    step("indexed an uncolored funding transaction");
    detail("txid", &short(funding.id));
    detail("value", "1000000 base units");

    // -- 3. Issuance --------------------------------------------------------

    section(3, "Issuing 50000 GOLD under the EPOBC kernel");
    let composer = Composer::new(ComposerConfig::default());
    let funding_candidate = CandidateOutput::uncolored(
        OutPoint::new(funding.id, 0),
        1_000_000,
        LockScript::Address(issuer_addr.clone()),
    );

    let issuance = composer
        .compose_issuance(
            "gold",
            KernelId::Epobc,
            50_000,
            LockScript::Address(issuer_addr.clone()),
            &[funding_candidate],
            LockScript::Address(issuer_addr.clone()),
        )
        .expect("issuance composes");
    step("composed the genesis draft");
    show_draft(&issuance.draft);

    let signed = KeychainSigner::new(issuer.clone())
        .sign_draft(&issuance.draft)
        .expect("issuer holds the key");
    graph.insert(signed.transaction.clone());
    step("signed and indexed the genesis transaction");
    detail("genesis", &issuance.genesis.to_string());

    let registry = AssetRegistry::new();
    let gold = registry
        .define("gold", issuance.genesis, KernelId::Epobc)
        .expect("fresh moniker");
    step("registered the asset");
    detail("descriptor", &gold.descriptor());

    // -- 4. Resolution ------------------------------------------------------

    section(4, "Resolving color straight off the ledger");
    let resolver = ColorResolver::new(graph.clone(), ResolverConfig::default());

    let at_genesis = resolver
        .resolve(&gold, gold.genesis)
        .await
        .expect("genesis resolves");
    step("genesis output carries the full declared supply");
    detail("value", &format!("{} GOLD", at_genesis.value));
    detail("status", &format!("{:?}", at_genesis.status));

    // -- 5. Transfer with change -------------------------------------------

    section(5, "Transferring 18000 GOLD to alice");
    let genesis_candidate = CandidateOutput::colored(
        gold.genesis,
        at_genesis.value,
        LockScript::Address(issuer_addr.clone()),
        gold.clone(),
        at_genesis.value,
    );
    let fee_candidate = {
        // The issuance draft's base change output funds the fee.
        let change_vout = (signed.transaction.outputs.len() - 1) as u32;
        let change = &signed.transaction.outputs[change_vout as usize];
        CandidateOutput::uncolored(
            OutPoint::new(signed.transaction.id, change_vout),
            change.value,
            change.lock.clone(),
        )
    };

    let transfer = composer
        .compose(
            &[genesis_candidate, fee_candidate],
            &[TransferTarget::new(
                gold.clone(),
                18_000,
                LockScript::Address(alice_addr.clone()),
            )],
            |_| LockScript::Address(issuer_addr.clone()),
            LockScript::Address(issuer_addr.clone()),
        )
        .expect("transfer composes");
    step("composed the transfer draft (change computed per color)");
    show_draft(&transfer);

    let signed_transfer = KeychainSigner::new(issuer.clone())
        .sign_draft(&transfer)
        .expect("issuer signs");
    let transfer_id = graph.insert(signed_transfer.transaction.clone());
    step("signed and indexed the transfer");

    let alice_balance = resolver
        .resolve(&gold, OutPoint::new(transfer_id, 1))
        .await
        .expect("resolves");
    let issuer_change = resolver
        .resolve(&gold, OutPoint::new(transfer_id, 2))
        .await
        .expect("resolves");
    step("re-resolved both sides of the transfer");
    detail("alice", &format!("{} GOLD", alice_balance.value));
    detail("issuer change", &format!("{} GOLD", issuer_change.value));
    detail(
        "conservation",
        &format!(
            "{} + {} == {}",
            alice_balance.value, issuer_change.value, at_genesis.value
        ),
    );
    assert_eq!(alice_balance.value + issuer_change.value, at_genesis.value);

    // -- 6. Malformed history ----------------------------------------------

    section(6, "A malformed tag cannot poison the rest of the graph");
    let malformed = LedgerTransaction::new(
        vec![TxInput::with_sequence(
            OutPoint::new(transfer_id, 1),
            alice_balance.value,
            Tag::transfer(40).encode(), // padding far past the output count
        )],
        vec![TxOutput::to_address(alice_balance.value, alice_addr.clone())],
    );
    let malformed_id = graph.insert(malformed);

    let poisoned = resolver
        .resolve(&gold, OutPoint::new(malformed_id, 0))
        .await
        .expect("resolution completes");
    step("the bad spend resolves to UNCOLORABLE, not a crash");
    detail("status", &format!("{:?}", poisoned.status));
    assert_eq!(poisoned.status, ColorStatus::Uncolorable);

    let untouched = resolver
        .resolve(&gold, OutPoint::new(transfer_id, 2))
        .await
        .expect("sibling still resolves");
    step("sibling outputs are untouched");
    detail("issuer change", &format!("{} GOLD", untouched.value));

    // -- 7. Sharing the asset ----------------------------------------------

    section(7, "Sharing the asset definition out of band");
    let alice_registry = AssetRegistry::new();
    let imported: AssetDefinition = alice_registry
        .import("issuer-gold", &gold.descriptor())
        .expect("descriptor imports");
    step("alice imported the descriptor under her own moniker");
    detail("moniker", &imported.moniker);
    detail(
        "same genesis",
        &format!("{}", imported.genesis == gold.genesis),
    );

    println!();
    println!(
        "{BOLD}{GREEN}Done.{RESET} {DIM}cache entries: {}, elapsed: {:?}{RESET}",
        resolver.cache_len(),
        started.elapsed()
    );
    println!();
}

//! End-to-end integration tests for the CHROMA protocol.
//!
//! These tests exercise the full colored-coin lifecycle from wallet
//! creation through issuance, transfer, and re-resolution. They prove
//! that the protocol's core components compose correctly: keychain and
//! addresses, issuance and transfer composition, draft signing, the
//! sled-backed transaction index, and backward color resolution with its
//! memoizing cache.
//!
//! Each test stands alone with its own temporary store and resolver.
//! No shared state, no test ordering dependencies, no flaky failures.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use chroma_protocol::asset::{AssetDefinition, AssetRegistry};
use chroma_protocol::compose::{
    CandidateOutput, ComposeError, Composer, ComposerConfig, TransferTarget,
};
use chroma_protocol::graph::{
    GraphError, LedgerTransaction, LockScript, OutPoint, TransactionGraph, TxId, TxInput,
    TxOutput, TxStore,
};
use chroma_protocol::kernel::{KernelId, Tag};
use chroma_protocol::resolve::{ColorResolver, ColorStatus, ResolveError, ResolverConfig};
use chroma_protocol::wallet::{DraftSigner, Keychain, KeychainSigner, SignError};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

/// One test wallet: keys, a store-backed resolver, and a composer.
struct TestWallet {
    keychain: Arc<Keychain>,
    store: Arc<TxStore>,
    resolver: ColorResolver<TxStore>,
    composer: Composer,
    registry: AssetRegistry,
}

impl TestWallet {
    fn new() -> Self {
        let keychain = Arc::new(Keychain::mainnet());
        let store = Arc::new(TxStore::open_temporary().expect("temp store"));
        let resolver = ColorResolver::new(Arc::clone(&store), ResolverConfig::default());
        Self {
            keychain,
            store,
            resolver,
            composer: Composer::new(ComposerConfig::default()),
            registry: AssetRegistry::new(),
        }
    }

    fn address(&self) -> String {
        self.keychain.generate_address().expect("address")
    }

    /// Indexes a coinbase-style funding transaction paying `address`.
    fn fund(&self, address: &str, value: u64) -> OutPoint {
        let tx = LedgerTransaction::new(vec![], vec![TxOutput::to_address(value, address)]);
        self.store.insert_transaction(&tx).expect("index funding");
        OutPoint::new(tx.id, 0)
    }

    /// Composes, signs, and indexes an issuance; registers the asset.
    fn issue(
        &self,
        moniker: &str,
        kernel: KernelId,
        supply: u64,
        owner: &str,
        funding: Vec<CandidateOutput>,
    ) -> AssetDefinition {
        let issuance = self
            .composer
            .compose_issuance(
                moniker,
                kernel,
                supply,
                LockScript::Address(owner.to_string()),
                &funding,
                LockScript::Address(owner.to_string()),
            )
            .expect("issuance composes");
        let signed = KeychainSigner::new(Arc::clone(&self.keychain))
            .sign_draft(&issuance.draft)
            .expect("wallet holds the funding keys");
        self.store
            .insert_transaction(&signed.transaction)
            .expect("index issuance");
        self.registry
            .define(moniker, issuance.genesis, kernel)
            .expect("fresh moniker")
    }

    /// All current unspent outputs resolved against `assets`.
    async fn candidates(&self, assets: &[&AssetDefinition]) -> Vec<CandidateOutput> {
        let unspent = self.store.unspent_outputs(None).expect("scan");
        let mut candidates = Vec::new();
        for (outpoint, output) in unspent {
            let mut color = None;
            for asset in assets {
                let resolved = self
                    .resolver
                    .resolve(asset, outpoint)
                    .await
                    .expect("candidate resolves");
                if resolved.is_colored() {
                    color = Some(((*asset).clone(), resolved.value));
                    break;
                }
            }
            candidates.push(match color {
                Some((asset, value)) => {
                    CandidateOutput::colored(outpoint, output.value, output.lock, asset, value)
                }
                None => CandidateOutput::uncolored(outpoint, output.value, output.lock),
            });
        }
        candidates
    }
}

fn uncolored(outpoint: OutPoint, value: u64, address: &str) -> CandidateOutput {
    CandidateOutput::uncolored(outpoint, value, LockScript::Address(address.to_string()))
}

/// Graph wrapper counting accessor traversals, for cache-collapse checks.
struct CountingStore {
    inner: Arc<TxStore>,
    hits: AtomicUsize,
}

#[async_trait]
impl TransactionGraph for CountingStore {
    async fn get_transaction(&self, txid: &TxId) -> Result<LedgerTransaction, GraphError> {
        self.hits.fetch_add(1, Ordering::SeqCst);
        self.inner.get_transaction(txid).await
    }
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn obc_issue_transfer_resolve_lifecycle() {
    let wallet = TestWallet::new();
    let issuer = wallet.address();
    let funding = wallet.fund(&issuer, 1_000_000);

    let gold = wallet.issue(
        "gold",
        KernelId::Obc,
        10_000,
        &issuer,
        vec![uncolored(funding, 1_000_000, &issuer)],
    );

    // The genesis output carries the declared supply.
    let at_genesis = wallet
        .resolver
        .resolve(&gold, gold.genesis)
        .await
        .expect("genesis resolves");
    assert_eq!(at_genesis.status, ColorStatus::Resolved);
    assert_eq!(at_genesis.value, 10_000);

    // Move 3_500 to a recipient; the rest returns as colored change.
    let recipient = wallet.address();
    let candidates = wallet.candidates(&[&gold]).await;
    let change_addr = wallet.address();
    let draft = wallet
        .composer
        .compose(
            &candidates,
            &[TransferTarget::new(
                gold.clone(),
                3_500,
                LockScript::Address(recipient.clone()),
            )],
            |_| LockScript::Address(change_addr.clone()),
            LockScript::Address(issuer.clone()),
        )
        .expect("transfer composes");
    assert_eq!(draft.input_color_total("gold"), draft.output_color_total("gold"));

    let signed = KeychainSigner::new(Arc::clone(&wallet.keychain))
        .sign_draft(&draft)
        .expect("wallet signs");
    assert!(signed.is_fully_signed());
    wallet
        .store
        .insert_transaction(&signed.transaction)
        .expect("index transfer");

    // Re-resolve both sides straight off the ledger.
    let txid = signed.transaction.id;
    let to_recipient = wallet
        .resolver
        .resolve(&gold, OutPoint::new(txid, 0))
        .await
        .expect("resolves");
    let to_change = wallet
        .resolver
        .resolve(&gold, OutPoint::new(txid, 1))
        .await
        .expect("resolves");
    assert_eq!(to_recipient.value, 3_500);
    assert_eq!(to_change.value, 6_500);
    assert_eq!(to_recipient.value + to_change.value, at_genesis.value);
}

#[tokio::test]
async fn epobc_lifecycle_keeps_marker_uncolored() {
    let wallet = TestWallet::new();
    let issuer = wallet.address();
    let funding = wallet.fund(&issuer, 1_000_000);

    let silver = wallet.issue(
        "silver",
        KernelId::Epobc,
        8_000,
        &issuer,
        vec![uncolored(funding, 1_000_000, &issuer)],
    );
    // EPOBC genesis sits past the marker output.
    assert_eq!(silver.genesis.vout, 1);

    let at_genesis = wallet
        .resolver
        .resolve(&silver, silver.genesis)
        .await
        .expect("genesis resolves");
    assert_eq!(at_genesis.value, 8_000);

    let recipient = wallet.address();
    let candidates = wallet.candidates(&[&silver]).await;
    let draft = wallet
        .composer
        .compose(
            &candidates,
            &[TransferTarget::new(
                silver.clone(),
                5_000,
                LockScript::Address(recipient.clone()),
            )],
            |_| LockScript::Address(issuer.clone()),
            LockScript::Address(issuer.clone()),
        )
        .expect("transfer composes");

    // Marker leads, and the first input carries the transfer tag.
    assert!(draft.outputs[0].lock.is_unspendable());
    assert_eq!(draft.inputs[0].sequence, Tag::transfer(1).encode());

    let signed = KeychainSigner::new(Arc::clone(&wallet.keychain))
        .sign_draft(&draft)
        .expect("wallet signs");
    wallet
        .store
        .insert_transaction(&signed.transaction)
        .expect("index transfer");

    let txid = signed.transaction.id;
    let marker = wallet
        .resolver
        .resolve(&silver, OutPoint::new(txid, 0))
        .await
        .expect("resolves");
    let moved = wallet
        .resolver
        .resolve(&silver, OutPoint::new(txid, 1))
        .await
        .expect("resolves");
    let change = wallet
        .resolver
        .resolve(&silver, OutPoint::new(txid, 2))
        .await
        .expect("resolves");
    assert_eq!(marker.status, ColorStatus::Uncolorable);
    assert_eq!(moved.value, 5_000);
    assert_eq!(change.value, 3_000);
}

// ---------------------------------------------------------------------------
// Composer properties end to end
// ---------------------------------------------------------------------------

#[tokio::test]
async fn five_plus_three_covers_six_with_two_change() {
    // The canonical conservation scenario: holdings of 5 and 3, 6
    // requested. Both must be selected, the destination receives exactly
    // 6, and a 2-unit change output preserves the remainder.
    let wallet = TestWallet::new();
    let issuer = wallet.address();
    let funding = wallet.fund(&issuer, 500_000);

    let x = wallet.issue(
        "x",
        KernelId::Obc,
        8,
        &issuer,
        vec![uncolored(funding, 500_000, &issuer)],
    );

    // Split the 8 into a 5-unit and a 3-unit holding.
    let holder_a = wallet.address();
    let holder_b = wallet.address();
    let candidates = wallet.candidates(&[&x]).await;
    let split = wallet
        .composer
        .compose(
            &candidates,
            &[
                TransferTarget::new(x.clone(), 5, LockScript::Address(holder_a.clone())),
                TransferTarget::new(x.clone(), 3, LockScript::Address(holder_b.clone())),
            ],
            |_| LockScript::Address(issuer.clone()),
            LockScript::Address(issuer.clone()),
        )
        .expect("split composes");
    let signed = KeychainSigner::new(Arc::clone(&wallet.keychain))
        .sign_draft(&split)
        .expect("signs");
    wallet
        .store
        .insert_transaction(&signed.transaction)
        .expect("index split");

    // Now transfer 6 to a destination: both holdings must be selected,
    // one 6-unit output and one 2-unit change output produced.
    let destination = wallet.address();
    let change_addr = wallet.address();
    let candidates = wallet.candidates(&[&x]).await;
    let held: Vec<u64> = candidates
        .iter()
        .filter_map(|c| c.color.as_ref().map(|(_, v)| *v))
        .collect();
    assert_eq!(held.iter().sum::<u64>(), 8, "two holdings of 5 and 3");

    let draft = wallet
        .composer
        .compose(
            &candidates,
            &[TransferTarget::new(
                x.clone(),
                6,
                LockScript::Address(destination.clone()),
            )],
            |_| LockScript::Address(change_addr.clone()),
            LockScript::Address(issuer.clone()),
        )
        .expect("transfer composes");

    let colored_inputs: Vec<_> = draft.inputs.iter().filter(|i| i.color.is_some()).collect();
    assert_eq!(colored_inputs.len(), 2, "5 alone cannot cover 6");

    let to_destination: Vec<_> = draft
        .outputs
        .iter()
        .filter(|o| o.lock == LockScript::Address(destination.clone()))
        .collect();
    assert_eq!(to_destination.len(), 1);
    assert_eq!(to_destination[0].color.as_ref().unwrap().amount, 6);

    let to_change: Vec<_> = draft
        .outputs
        .iter()
        .filter(|o| o.lock == LockScript::Address(change_addr.clone()))
        .collect();
    assert_eq!(to_change.len(), 1);
    assert_eq!(to_change[0].color.as_ref().unwrap().amount, 2);

    assert_eq!(draft.input_color_total("x"), 8);
    assert_eq!(draft.output_color_total("x"), 8);
}

#[tokio::test]
async fn insufficient_funds_names_the_asset_and_returns_no_draft() {
    let wallet = TestWallet::new();
    let issuer = wallet.address();
    let funding = wallet.fund(&issuer, 500_000);

    let y = wallet.issue(
        "asset-y",
        KernelId::Obc,
        4,
        &issuer,
        vec![uncolored(funding, 500_000, &issuer)],
    );

    let candidates = wallet.candidates(&[&y]).await;
    let err = wallet
        .composer
        .compose(
            &candidates,
            &[TransferTarget::new(
                y.clone(),
                10,
                LockScript::Address(wallet.address()),
            )],
            |_| LockScript::Address(issuer.clone()),
            LockScript::Address(issuer.clone()),
        )
        .expect_err("4 cannot cover 10");
    assert_eq!(
        err,
        ComposeError::InsufficientFunds {
            asset: "asset-y".to_string(),
            requested: 10,
            available: 4,
        }
    );
}

#[tokio::test]
async fn mixed_kernel_transfers_are_rejected_whole() {
    let wallet = TestWallet::new();
    let issuer = wallet.address();
    let f1 = wallet.fund(&issuer, 500_000);
    let f2 = wallet.fund(&issuer, 500_000);

    let gold = wallet.issue(
        "gold",
        KernelId::Obc,
        100,
        &issuer,
        vec![uncolored(f1, 500_000, &issuer)],
    );
    let silver = wallet.issue(
        "silver",
        KernelId::Epobc,
        100,
        &issuer,
        vec![uncolored(f2, 500_000, &issuer)],
    );

    let candidates = wallet.candidates(&[&gold, &silver]).await;
    let err = wallet
        .composer
        .compose(
            &candidates,
            &[
                TransferTarget::new(gold.clone(), 10, LockScript::Address(wallet.address())),
                TransferTarget::new(silver.clone(), 10, LockScript::Address(wallet.address())),
            ],
            |_| LockScript::Address(issuer.clone()),
            LockScript::Address(issuer.clone()),
        )
        .expect_err("one draft cannot speak two kernels");
    assert_eq!(
        err,
        ComposeError::IncompatibleKernels {
            first: KernelId::Obc,
            second: KernelId::Epobc,
        }
    );
}

// ---------------------------------------------------------------------------
// Resolution properties end to end
// ---------------------------------------------------------------------------

#[tokio::test]
async fn resolution_is_identical_across_independent_engines() {
    let wallet = TestWallet::new();
    let issuer = wallet.address();
    let funding = wallet.fund(&issuer, 1_000_000);
    let gold = wallet.issue(
        "gold",
        KernelId::Epobc,
        7_777,
        &issuer,
        vec![uncolored(funding, 1_000_000, &issuer)],
    );

    let warm = wallet
        .resolver
        .resolve(&gold, gold.genesis)
        .await
        .expect("resolves");
    let again = wallet
        .resolver
        .resolve(&gold, gold.genesis)
        .await
        .expect("warm cache");
    assert_eq!(warm, again);

    // A second engine over the same store agrees bit for bit.
    let fresh = ColorResolver::new(Arc::clone(&wallet.store), ResolverConfig::default());
    let cold = fresh.resolve(&gold, gold.genesis).await.expect("resolves");
    assert_eq!(warm, cold);
}

#[tokio::test]
async fn concurrent_refreshes_collapse_to_one_traversal_per_node() {
    let wallet = TestWallet::new();
    let issuer = wallet.address();
    let funding = wallet.fund(&issuer, 1_000_000);
    let gold = wallet.issue(
        "gold",
        KernelId::Obc,
        10_000,
        &issuer,
        vec![uncolored(funding, 1_000_000, &issuer)],
    );

    // Two hops of transfer history on top of the genesis.
    let mut tip = gold.genesis;
    for _ in 0..2 {
        let recipient = wallet.address();
        let candidates = wallet.candidates(&[&gold]).await;
        let draft = wallet
            .composer
            .compose(
                &candidates,
                &[TransferTarget::new(
                    gold.clone(),
                    10_000,
                    LockScript::Address(recipient),
                )],
                |_| LockScript::Address(issuer.clone()),
                LockScript::Address(issuer.clone()),
            )
            .expect("hop composes");
        let signed = KeychainSigner::new(Arc::clone(&wallet.keychain))
            .sign_draft(&draft)
            .expect("signs");
        wallet
            .store
            .insert_transaction(&signed.transaction)
            .expect("index hop");
        tip = OutPoint::new(signed.transaction.id, 0);
    }

    // A counting engine over the same store: ten concurrent queries for
    // the tip must fetch each transaction in the ancestry exactly once.
    let counting = Arc::new(CountingStore {
        inner: Arc::clone(&wallet.store),
        hits: AtomicUsize::new(0),
    });
    let engine = ColorResolver::new(Arc::clone(&counting), ResolverConfig::default());

    let queries: Vec<_> = (0..10)
        .map(|_| {
            let engine = engine.clone();
            let gold = gold.clone();
            tokio::spawn(async move { engine.resolve(&gold, tip).await })
        })
        .collect();
    let mut results = Vec::new();
    for query in queries {
        results.push(query.await.expect("task").expect("resolves"));
    }

    assert!(results.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(results[0].value, 10_000);

    // Ancestry: two hop transactions + the issuance + its funding parent.
    assert_eq!(counting.hits.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn missing_ancestor_is_an_error_not_zero_color() {
    let wallet = TestWallet::new();
    let issuer = wallet.address();

    // A transfer whose parent was never indexed.
    let ghost = OutPoint::new(TxId::from_bytes([0x66; 32]), 0);
    let orphan = LedgerTransaction::new(
        vec![TxInput::new(ghost, 1_000)],
        vec![TxOutput::to_address(900, &issuer)],
    );
    wallet.store.insert_transaction(&orphan).expect("index orphan");

    let gold = AssetDefinition::new(
        "gold",
        OutPoint::new(TxId::from_bytes([0x77; 32]), 0),
        KernelId::Obc,
    )
    .expect("definition");

    let err = wallet
        .resolver
        .resolve(&gold, OutPoint::new(orphan.id, 0))
        .await
        .expect_err("broken graph must surface");
    assert_eq!(err, ResolveError::UnknownTransaction(ghost.txid));
}

// ---------------------------------------------------------------------------
// Wallet boundaries
// ---------------------------------------------------------------------------

#[tokio::test]
async fn foreign_wallet_cannot_sign_the_draft() {
    let wallet = TestWallet::new();
    let issuer = wallet.address();
    let funding = wallet.fund(&issuer, 1_000_000);
    let gold = wallet.issue(
        "gold",
        KernelId::Obc,
        1_000,
        &issuer,
        vec![uncolored(funding, 1_000_000, &issuer)],
    );

    let candidates = wallet.candidates(&[&gold]).await;
    let draft = wallet
        .composer
        .compose(
            &candidates,
            &[TransferTarget::new(
                gold,
                1_000,
                LockScript::Address(wallet.address()),
            )],
            |_| LockScript::Address(issuer.clone()),
            LockScript::Address(issuer.clone()),
        )
        .expect("composes");

    let stranger = Arc::new(Keychain::mainnet());
    let err = KeychainSigner::new(stranger).sign_draft(&draft).expect_err(
        "a wallet without the keys must fail, naming the input",
    );
    assert_eq!(err, SignError::SigningFailed { input_index: 0 });
}

#[tokio::test]
async fn descriptor_share_makes_two_wallets_agree() {
    let wallet = TestWallet::new();
    let issuer = wallet.address();
    let funding = wallet.fund(&issuer, 1_000_000);
    let gold = wallet.issue(
        "gold",
        KernelId::Epobc,
        2_500,
        &issuer,
        vec![uncolored(funding, 1_000_000, &issuer)],
    );

    // The counterparty imports the descriptor under its own moniker and
    // resolves against its own copy of the graph.
    let other_registry = AssetRegistry::new();
    let imported = other_registry
        .import("their-gold", &gold.descriptor())
        .expect("imports");
    assert_eq!(imported.genesis, gold.genesis);
    assert_eq!(imported.kernel, gold.kernel);

    let other_engine = ColorResolver::new(Arc::clone(&wallet.store), ResolverConfig::default());
    let theirs = other_engine
        .resolve(&imported, imported.genesis)
        .await
        .expect("resolves");
    let ours = wallet
        .resolver
        .resolve(&gold, gold.genesis)
        .await
        .expect("resolves");
    assert_eq!(theirs.value, ours.value);
    assert_eq!(theirs.status, ours.status);
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

#[tokio::test]
async fn colored_history_survives_store_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let keychain = Arc::new(Keychain::mainnet());
    let issuer = keychain.generate_address().expect("address");
    let composer = Composer::new(ComposerConfig::default());

    let (genesis, descriptor) = {
        let store = Arc::new(TxStore::open(dir.path()).expect("open"));
        let funding = LedgerTransaction::new(
            vec![],
            vec![TxOutput::to_address(1_000_000, &issuer)],
        );
        store.insert_transaction(&funding).expect("index funding");

        let issuance = composer
            .compose_issuance(
                "gold",
                KernelId::Epobc,
                5_000,
                LockScript::Address(issuer.clone()),
                &[uncolored(OutPoint::new(funding.id, 0), 1_000_000, &issuer)],
                LockScript::Address(issuer.clone()),
            )
            .expect("composes");
        let signed = KeychainSigner::new(Arc::clone(&keychain))
            .sign_draft(&issuance.draft)
            .expect("signs");
        store
            .insert_transaction(&signed.transaction)
            .expect("index issuance");
        store.flush().expect("flush");

        let asset = AssetDefinition::new("gold", issuance.genesis, KernelId::Epobc)
            .expect("definition");
        (issuance.genesis, asset.descriptor())
    };

    // A fresh process: reopen the store, re-import the descriptor, and the
    // same color value comes back from a cold cache.
    let store = Arc::new(TxStore::open(dir.path()).expect("reopen"));
    let registry = AssetRegistry::new();
    let gold = registry.import("gold", &descriptor).expect("imports");
    assert_eq!(gold.genesis, genesis);

    let engine = ColorResolver::new(store, ResolverConfig::default());
    let resolved = engine.resolve(&gold, gold.genesis).await.expect("resolves");
    assert_eq!(resolved.value, 5_000);
    assert_eq!(resolved.status, ColorStatus::Resolved);
}

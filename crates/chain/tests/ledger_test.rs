use powchain_chain::{Blockchain, BlockchainError, ChainConfig, ChainValidationError};
use powchain_core::{decode_address, Keypair, Transaction};
use powchain_storage::{ChainStore, Storage};

fn config() -> ChainConfig {
    ChainConfig::with_difficulty(8)
}

#[test]
fn test_data_chain_is_valid() {
    let mut chain = Blockchain::new(config()).unwrap();
    chain.append_data("Send 1 BTC to Ivan").unwrap();
    chain.append_data("Send 2 more BTC to Ivan").unwrap();

    assert_eq!(chain.height(), 2);
    assert!(chain.is_valid());

    let blocks = chain.blocks();
    assert_eq!(blocks[0].payload.data, b"Genesis Block");
    for pair in blocks.windows(2) {
        assert_eq!(pair[1].prev_hash, Some(pair[0].hash));
        assert!(pair[1].hash.leading_zero_bits() >= 8);
    }
}

#[test]
fn test_reward_then_transfer() {
    let alice = Keypair::generate().unwrap();
    let bob = Keypair::generate().unwrap();
    let mut chain = Blockchain::new(config()).unwrap();

    let reward = chain.coinbase(alice.pub_key_hash(), b"");
    chain.mine_block(vec![reward]).unwrap();

    // Pay to Bob's address as a user would type it.
    let bob_pkh = decode_address(&bob.address()).unwrap();
    let tx = chain.new_transfer(&alice, bob_pkh, 6).unwrap();
    assert_eq!(tx.inputs.len(), 1);
    assert_eq!(tx.outputs.len(), 2);
    assert_eq!(tx.outputs[0].value, 6);
    assert_eq!(tx.outputs[1].value, 4);
    chain.mine_block(vec![tx.clone()]).unwrap();

    assert_eq!(chain.balance(&alice.pub_key_hash()), 4);
    assert_eq!(chain.balance(&bob_pkh), 6);
    assert!(chain.verify_transaction(chain.find_transaction(&tx.id).unwrap()));

    let alice_utxos = chain.find_unspent_outputs(&alice.pub_key_hash());
    assert_eq!(alice_utxos.len(), 1);
    assert_eq!(alice_utxos[0].outpoint.txid, tx.id);
    assert!(chain.is_valid());
}

#[test]
fn test_exact_amount_has_no_change() {
    let alice = Keypair::generate().unwrap();
    let bob = Keypair::generate().unwrap();
    let mut chain = Blockchain::new(config()).unwrap();
    let reward = chain.coinbase(alice.pub_key_hash(), b"");
    chain.mine_block(vec![reward]).unwrap();

    let tx = chain.new_transfer(&alice, bob.pub_key_hash(), 10).unwrap();
    assert_eq!(tx.outputs.len(), 1);
    chain.mine_block(vec![tx]).unwrap();

    assert_eq!(chain.balance(&alice.pub_key_hash()), 0);
    assert_eq!(chain.balance(&bob.pub_key_hash()), 10);
}

#[test]
fn test_transfer_gathers_several_outputs() {
    let alice = Keypair::generate().unwrap();
    let bob = Keypair::generate().unwrap();
    let mut chain = Blockchain::new(config()).unwrap();
    for _ in 0..3 {
        let reward = chain.coinbase(alice.pub_key_hash(), b"");
        chain.mine_block(vec![reward]).unwrap();
    }
    assert_eq!(chain.balance(&alice.pub_key_hash()), 30);

    let tx = chain.new_transfer(&alice, bob.pub_key_hash(), 25).unwrap();
    assert_eq!(tx.inputs.len(), 3);
    chain.mine_block(vec![tx]).unwrap();

    assert_eq!(chain.balance(&alice.pub_key_hash()), 5);
    assert_eq!(chain.balance(&bob.pub_key_hash()), 25);
}

#[test]
fn test_insufficient_funds_leaves_chain_untouched() {
    let alice = Keypair::generate().unwrap();
    let bob = Keypair::generate().unwrap();
    let mut chain = Blockchain::new(config()).unwrap();
    let reward = chain.coinbase(alice.pub_key_hash(), b"");
    chain.mine_block(vec![reward]).unwrap();

    let err = chain.new_transfer(&bob, alice.pub_key_hash(), 1).unwrap_err();
    assert!(matches!(
        err,
        BlockchainError::InsufficientFunds {
            required: 1,
            available: 0
        }
    ));
    assert_eq!(chain.height(), 1);
}

#[test]
fn test_forged_store_fails_to_load() {
    let alice = Keypair::generate().unwrap();
    let mut chain = Blockchain::new(config()).unwrap();
    let reward = chain.coinbase(alice.pub_key_hash(), b"");
    chain.mine_block(vec![reward]).unwrap();

    // Swap the reward recipient and seal with a nonce that misses the target.
    let genesis = chain.blocks()[0].clone();
    let mut forged = chain.blocks()[1].clone();
    forged.payload.transactions = vec![Transaction::new_coinbase(
        Keypair::generate().unwrap().pub_key_hash(),
        b"forged",
    )];
    let miss = (0u64..)
        .find(|&nonce| forged.hash_with_nonce(nonce).leading_zero_bits() < 8)
        .unwrap();
    forged = forged.with_nonce(miss);

    // The store only checks linkage, so it accepts the forgery.
    let store = ChainStore::new(Storage::open_temporary().unwrap());
    store.init_genesis(&genesis).unwrap();
    store.append_block(&forged).unwrap();

    match Blockchain::open(store.clone(), config()) {
        Ok(_) => panic!("forged chain must not load"),
        Err(BlockchainError::InvalidStoredChain(err)) => {
            assert_eq!(err, ChainValidationError::ProofOfWork { index: 1 })
        }
        Err(other) => panic!("unexpected error: {other}"),
    }

    // Loading without revalidation still surfaces the damage.
    let damaged = Blockchain::load(store, config()).unwrap();
    assert_eq!(damaged.height(), 1);
    assert!(!damaged.is_valid());
    assert_eq!(
        damaged.validate(),
        Err(ChainValidationError::ProofOfWork { index: 1 })
    );
}

#[test]
fn test_unknown_transaction_not_found() {
    let chain = Blockchain::new(config()).unwrap();
    let missing = Transaction::new_coinbase(Keypair::generate().unwrap().pub_key_hash(), b"x");
    assert!(matches!(
        chain.find_transaction(&missing.id),
        Err(BlockchainError::TransactionNotFound(id)) if id == missing.id
    ));
}

#[test]
fn test_reopen_keeps_balances() {
    let dir = tempfile::tempdir().unwrap();
    let alice = Keypair::generate().unwrap();
    let bob = Keypair::generate().unwrap();

    {
        let store = ChainStore::new(Storage::open(dir.path()).unwrap());
        let mut chain = Blockchain::open(store.clone(), config()).unwrap();
        let reward = chain.coinbase(alice.pub_key_hash(), b"");
        chain.mine_block(vec![reward]).unwrap();
        let tx = chain.new_transfer(&alice, bob.pub_key_hash(), 6).unwrap();
        chain.mine_block(vec![tx]).unwrap();
        store.flush().unwrap();
    }

    let store = ChainStore::new(Storage::open(dir.path()).unwrap());
    let chain = Blockchain::open(store, config()).unwrap();
    assert_eq!(chain.height(), 2);
    assert!(chain.is_valid());
    assert_eq!(chain.balance(&alice.pub_key_hash()), 4);
    assert_eq!(chain.balance(&bob.pub_key_hash()), 6);
}

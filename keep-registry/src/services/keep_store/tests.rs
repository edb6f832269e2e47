use std::{
    sync::{Arc, Barrier},
    thread,
};

use ::metrics::{
    Counter, Gauge, GaugeFn, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit,
};
use keep_types::U256;
use parking_lot::Mutex;

use super::*;

fn keep_address(last: u8) -> KeepAddress {
    let mut raw = [0u8; 20];
    raw[19] = last;
    KeepAddress::from(raw)
}

#[test]
fn created_keep_has_no_public_key() {
    let store = KeepStore::new();
    let address = keep_address(1);
    store.create_keep(address).expect("new keep");
    assert!(store.contains(address));
    assert_eq!(store.len(), 1);
    assert_eq!(store.get_public_key(address), Ok(None));
    assert_eq!(
        store.get_signatures(address, Digest::from([1; 32])),
        Ok(vec![])
    );
}

#[test]
fn duplicate_keep_is_rejected() {
    let store = KeepStore::new();
    let address = keep_address(1);
    store.create_keep(address).expect("new keep");
    let key = KeepPublicKey::from([11; 64]);
    store.set_public_key(address, key).expect("first key");
    assert_eq!(
        store.create_keep(address),
        Err(KeepStoreError::DuplicateKeep(address))
    );
    // the existing keep is untouched
    assert_eq!(store.get_public_key(address), Ok(Some(key)));
    assert_eq!(store.len(), 1);
}

#[test]
fn unknown_keep() {
    let store = KeepStore::new();
    let address = keep_address(7);
    let digest = Digest::from([1; 32]);
    assert_eq!(
        store.get_public_key(address),
        Err(KeepStoreError::UnknownKeep(address))
    );
    assert_eq!(
        store.set_public_key(address, KeepPublicKey::default()),
        Err(KeepStoreError::UnknownKeep(address))
    );
    assert_eq!(
        store.append_signature(address, digest, Signature::new(8u64, 7u64)),
        Err(KeepStoreError::UnknownKeep(address))
    );
    assert_eq!(
        store.get_signatures(address, digest),
        Err(KeepStoreError::UnknownKeep(address))
    );
    assert!(store.is_empty());
}

#[test]
fn first_public_key_wins() {
    let store = KeepStore::new();
    let address = keep_address(1);
    let first = KeepPublicKey::from([11; 64]);
    let second = KeepPublicKey::from([12; 64]);
    store.create_keep(address).expect("new keep");
    store.set_public_key(address, first).expect("first key");
    assert_eq!(
        store.set_public_key(address, second),
        Err(KeepStoreError::DuplicatePublicKey(address))
    );
    // same value is rejected as well
    assert_eq!(
        store.set_public_key(address, first),
        Err(KeepStoreError::DuplicatePublicKey(address))
    );
    assert_eq!(store.get_public_key(address), Ok(Some(first)));
}

#[test]
fn signatures_are_appended_in_order() {
    let store = KeepStore::new();
    let address = keep_address(1);
    let digest = Digest::from([1; 32]);
    let other_digest = Digest::from([2; 32]);
    store.create_keep(address).expect("new keep");

    let signatures = (1..=5u64)
        .map(|i| Signature::new(i, 10 - i))
        .chain(std::iter::once(Signature::new(1u64, 9u64)))
        .collect::<Vec<_>>();
    for signature in signatures.iter() {
        store
            .append_signature(address, digest, *signature)
            .expect("known keep");
    }
    // duplicates are kept
    assert_eq!(store.get_signatures(address, digest), Ok(signatures));
    assert_eq!(store.get_signatures(address, other_digest), Ok(vec![]));
}

#[test]
fn keeps_are_independent() {
    let store = KeepStore::new();
    let a = keep_address(1);
    let b = keep_address(2);
    let digest = Digest::from([1; 32]);
    store.create_keep(a).expect("new keep");
    store.create_keep(b).expect("new keep");
    store
        .set_public_key(a, KeepPublicKey::from([11; 64]))
        .expect("first key");
    store
        .append_signature(a, digest, Signature::new(8u64, 7u64))
        .expect("known keep");
    assert_eq!(store.get_public_key(b), Ok(None));
    assert_eq!(store.get_signatures(b, digest), Ok(vec![]));
    let mut addresses = store.keep_addresses();
    addresses.sort();
    assert_eq!(addresses, vec![a, b]);
}

#[test]
fn concurrent_public_key_exactly_one_wins() {
    const SUBMITTERS: usize = 16;
    let store = KeepStore::new();
    let address = keep_address(1);
    store.create_keep(address).expect("new keep");

    let barrier = Arc::new(Barrier::new(SUBMITTERS));
    let results = thread::scope(|s| {
        let handles = (0..SUBMITTERS)
            .map(|i| {
                let store = store.clone();
                let barrier = Arc::clone(&barrier);
                s.spawn(move || {
                    barrier.wait();
                    let key = KeepPublicKey::from([i as u8; 64]);
                    store.set_public_key(address, key).map(|_| key)
                })
            })
            .collect::<Vec<_>>();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("submitter does not panic"))
            .collect::<Vec<_>>()
    });

    let winners = results
        .iter()
        .filter_map(|result| result.as_ref().ok())
        .collect::<Vec<_>>();
    assert_eq!(winners.len(), 1);
    assert!(
        results
            .iter()
            .filter(|result| result.is_err())
            .all(|result| *result == Err(KeepStoreError::DuplicatePublicKey(address)))
    );
    assert_eq!(store.get_public_key(address), Ok(Some(*winners[0])));
}

#[test]
fn concurrent_signatures_are_all_stored() {
    const SUBMITTERS: u64 = 8;
    const PER_SUBMITTER: u64 = 50;
    let store = KeepStore::new();
    let address = keep_address(1);
    let digest = Digest::from([1; 32]);
    store.create_keep(address).expect("new keep");

    thread::scope(|s| {
        for submitter in 0..SUBMITTERS {
            let store = store.clone();
            s.spawn(move || {
                for i in 0..PER_SUBMITTER {
                    store
                        .append_signature(address, digest, Signature::new(submitter, i))
                        .expect("known keep");
                }
            });
        }
    });

    let signatures = store.get_signatures(address, digest).expect("known keep");
    assert_eq!(signatures.len() as u64, SUBMITTERS * PER_SUBMITTER);
    // per submitter, the order is preserved
    for submitter in 0..SUBMITTERS {
        let own = signatures
            .iter()
            .filter(|signature| signature.r == U256::from(submitter))
            .map(|signature| signature.s)
            .collect::<Vec<_>>();
        assert_eq!(own, (0..PER_SUBMITTER).map(U256::from).collect::<Vec<_>>());
    }
}

#[derive(Default)]
struct TestGauge(Mutex<f64>);

impl GaugeFn for TestGauge {
    fn increment(&self, value: f64) {
        *self.0.lock() += value;
    }

    fn decrement(&self, value: f64) {
        *self.0.lock() -= value;
    }

    fn set(&self, value: f64) {
        *self.0.lock() = value;
    }
}

/// Records the keep gauge, ignores everything else.
#[derive(Default)]
struct KeepGaugeRecorder {
    keeps: Arc<TestGauge>,
}

impl Recorder for KeepGaugeRecorder {
    fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

    fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

    fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

    fn register_counter(&self, _: &Key, _: &Metadata<'_>) -> Counter {
        Counter::noop()
    }

    fn register_gauge(&self, key: &Key, _: &Metadata<'_>) -> Gauge {
        if key.name() == METRICS_ID_REGISTRY_KEEPS {
            Gauge::from_arc(Arc::clone(&self.keeps))
        } else {
            Gauge::noop()
        }
    }

    fn register_histogram(&self, _: &Key, _: &Metadata<'_>) -> Histogram {
        Histogram::noop()
    }
}

#[test]
fn new_store_does_not_reset_keep_gauge() {
    let recorder = KeepGaugeRecorder::default();
    ::metrics::with_local_recorder(&recorder, || {
        let first = KeepStore::new();
        first.create_keep(keep_address(1)).expect("new keep");
        first.create_keep(keep_address(2)).expect("new keep");
        let second = KeepStore::new();
        second.create_keep(keep_address(1)).expect("new keep");
        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 1);
    });
    assert_eq!(*recorder.keeps.0.lock(), 3.0);
}

#[test]
fn concurrent_reads_observe_consistent_snapshots() {
    const SIGNATURES: u64 = 500;
    const READERS: usize = 4;
    let store = KeepStore::new();
    let address = keep_address(1);
    let digest = Digest::from([1; 32]);
    store.create_keep(address).expect("new keep");
    let expected = (0..SIGNATURES)
        .map(|i| Signature::new(i, i + 1))
        .collect::<Vec<_>>();
    let barrier = Arc::new(Barrier::new(READERS + 1));

    let readers = (0..READERS)
        .map(|_| {
            let store = store.clone();
            let barrier = Arc::clone(&barrier);
            let expected = expected.clone();
            thread::spawn(move || {
                barrier.wait();
                let mut last_len = 0;
                while last_len < expected.len() {
                    let observed = store.get_signatures(address, digest).expect("known keep");
                    // a snapshot is always a prefix of the appended sequence and never shrinks
                    assert!(observed.len() >= last_len);
                    assert_eq!(observed[..], expected[..observed.len()]);
                    last_len = observed.len();
                }
            })
        })
        .collect::<Vec<_>>();

    barrier.wait();
    for signature in expected.iter() {
        store
            .append_signature(address, digest, *signature)
            .expect("known keep");
    }
    for reader in readers {
        reader.join().expect("reader did not panic");
    }
    assert_eq!(store.get_signatures(address, digest), Ok(expected));
}

//! Concurrent access to one store.
//!
//! Transactions must run one at a time: every record in the transaction log
//! has a lock window that does not intersect any other.

use std::sync::Arc;
use std::thread;

use tempfile::TempDir;

use fleetconf::store::{CachingDataStore, DataStore, GitDataStore, Properties, StoreOptions};

const THREADS: usize = 4;
const WRITES_PER_THREAD: usize = 5;

fn open(dir: &TempDir) -> GitDataStore {
    GitDataStore::open(StoreOptions::new(dir.path().join("node"))).expect("failed to open store")
}

#[test]
fn concurrent_profile_creation_is_serialized() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(open(&dir));
    store.create_version("1.0").unwrap();

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..WRITES_PER_THREAD {
                    store
                        .create_profile("1.0", &format!("p{}-{}", t, i))
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let profiles = store.profiles("1.0").unwrap();
    assert_eq!(profiles.len(), THREADS * WRITES_PER_THREAD);

    let records = store.transaction_log().records();
    for (i, a) in records.iter().enumerate() {
        for b in &records[i + 1..] {
            assert!(
                !a.overlaps(b),
                "transactions {} and {} overlapped",
                a.seq,
                b.seq
            );
        }
    }
}

#[test]
fn readers_and_writers_through_the_cache() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(CachingDataStore::new(open(&dir)));
    store.create_version("1.0").unwrap();
    store.create_profile("1.0", "web").unwrap();

    let writer = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            for i in 0..10 {
                let mut settings = Properties::new();
                settings.insert("counter".to_string(), i.to_string());
                store
                    .set_configuration("1.0", "web", "stats", Some(&settings))
                    .unwrap();
            }
        })
    };
    let reader = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            for _ in 0..20 {
                let settings = store.configuration("1.0", "web", "stats").unwrap();
                if let Some(value) = settings.get("counter") {
                    assert!(value.parse::<u32>().unwrap() < 10);
                }
            }
        })
    };
    writer.join().unwrap();
    reader.join().unwrap();

    // Once the writer is done, the cache must reflect its last write.
    assert_eq!(
        store
            .configuration("1.0", "web", "stats")
            .unwrap()
            .get("counter")
            .map(String::as_str),
        Some("9")
    );
}

//! Client Tests
//!
//! The thread-safe facade: `Option` results for misses, parsed status,
//! key walks and sharing one client between threads.

#[path = "../support/mock_server.rs"]
mod mock_server;

use std::sync::Arc;
use std::thread;

use mock_server::{Fault, MockServer};
use tyrantkv::{MetaSearch, Order, Query, QueryOp, Tyrant, TyrantError};

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_client() -> (MockServer, Tyrant) {
    let server = MockServer::start();
    let client = Tyrant::connect(server.config()).unwrap();
    (server, client)
}

// =============================================================================
// Key-Value Tests
// =============================================================================

#[test]
fn test_missing_records_are_none() {
    let (_server, client) = setup_client();

    assert_eq!(client.get(b"missing").unwrap(), None);
    assert_eq!(client.vsiz(b"missing").unwrap(), None);
    assert!(!client.out(b"missing").unwrap());
    assert!(!client.contains(b"missing").unwrap());

    client.put(b"k", b"value").unwrap();
    assert_eq!(client.get(b"k").unwrap(), Some(b"value".to_vec()));
    assert_eq!(client.vsiz(b"k").unwrap(), Some(5));
    assert!(client.contains(b"k").unwrap());
    assert!(client.out(b"k").unwrap());
}

#[test]
fn test_putkeep_returns_whether_stored() {
    let (_server, client) = setup_client();

    assert!(client.putkeep(b"k", b"first").unwrap());
    assert!(!client.putkeep(b"k", b"second").unwrap());
    assert_eq!(client.get(b"k").unwrap(), Some(b"first".to_vec()));
}

#[test]
fn test_other_errors_still_surface() {
    let (_server, client) = setup_client();

    client.put(b"text", b"abc").unwrap();
    assert!(matches!(
        client.addint(b"text", 1),
        Err(TyrantError::IncompatibleType)
    ));
}

#[test]
fn test_keys_walks_the_whole_database() {
    let (_server, client) = setup_client();

    for key in ["b", "a", "c"] {
        client.put(key.as_bytes(), b"1").unwrap();
    }

    let keys = client.keys().unwrap();
    assert_eq!(keys, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);

    // Manual walk through the facade
    client.iterinit().unwrap();
    let mut count = 0;
    while client.iternext().unwrap().is_some() {
        count += 1;
    }
    assert_eq!(count, 3);
}

#[test]
fn test_stat_is_parsed() {
    let (_server, client) = setup_client();

    client.put(b"k", b"v").unwrap();
    let stat = client.stat().unwrap();
    assert_eq!(stat.get("version").map(String::as_str), Some("1.1.41-mock"));
    assert_eq!(stat.get("rnum").map(String::as_str), Some("1"));
}

#[test]
fn test_with_session_runs_under_one_lock() {
    let (_server, client) = setup_client();

    let total = client
        .with_session(|session| {
            session.put(b"a", b"1")?;
            session.put(b"b", b"2")?;
            session.rnum()
        })
        .unwrap();
    assert_eq!(total, 2);
}

// =============================================================================
// Table Tests
// =============================================================================

#[test]
fn test_table_facade() {
    let (_server, client) = setup_client();

    assert!(client.tbl_putkeep(b"p1", [("kind", "apple"), ("price", "120")]).unwrap());
    assert!(!client.tbl_putkeep(b"p1", [("kind", "pear")]).unwrap());
    client.tbl_put(b"p2", [("kind", "banana"), ("price", "80")]).unwrap();
    client.tbl_put(b"p3", [("kind", "cherry"), ("price", "300")]).unwrap();

    assert_eq!(client.tbl_get(b"nope").unwrap(), None);
    let columns = client.tbl_get(b"p2").unwrap().unwrap();
    assert_eq!(columns.get(&b"kind"[..]), Some(&b"banana".to_vec()));

    let mut cheap = client.query();
    cheap
        .add_condition("price", QueryOp::NumLt, "200", false)
        .set_order("price", Order::NumAsc);
    assert_eq!(client.search(&cheap).unwrap(), vec![b"p2".to_vec(), b"p1".to_vec()]);
    assert_eq!(client.search_count(&cheap).unwrap(), 2);
    assert!(!client.hint(&cheap).unwrap().is_empty());

    let records = client.search_get(&cheap, &["kind"]).unwrap();
    assert_eq!(records[0].get("kind"), Some(&b"banana"[..]));

    let mut fruit_c = Query::new();
    fruit_c.add_condition("kind", QueryOp::StrBeginsWith, "c", false);
    let either = client.meta_search(&[&cheap, &fruit_c], MetaSearch::Union).unwrap();
    assert_eq!(either.len(), 3);

    client.search_out(&fruit_c).unwrap();
    assert!(!client.tbl_out(b"p3").unwrap());
    assert!(client.tbl_out(b"p1").unwrap());
}

// =============================================================================
// Lifecycle and Concurrency Tests
// =============================================================================

#[test]
fn test_reopen_after_connection_lost() {
    let (server, client) = setup_client();
    client.put(b"k", b"a value long enough to truncate").unwrap();

    server.inject(Fault::CloseMidFrame);
    assert!(client.get(b"k").unwrap_err().is_connection_lost());
    assert!(!client.is_open());
    assert!(matches!(client.get(b"k"), Err(TyrantError::NotConnected)));

    client.open().unwrap();
    assert_eq!(
        client.get(b"k").unwrap(),
        Some(b"a value long enough to truncate".to_vec())
    );
}

#[test]
fn test_concurrent_threads_share_one_client() {
    let (_server, client) = setup_client();
    let client = Arc::new(client);

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let client = Arc::clone(&client);
            thread::spawn(move || {
                for i in 0..25 {
                    let key = format!("t{}:{}", t, i);
                    client.put(key.as_bytes(), key.as_bytes()).unwrap();
                    assert_eq!(client.get(key.as_bytes()).unwrap(), Some(key.into_bytes()));
                    client.addint(b"hits", 1).unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(client.rnum().unwrap(), 101);
    assert_eq!(client.addint(b"hits", 0).unwrap(), 100);
}

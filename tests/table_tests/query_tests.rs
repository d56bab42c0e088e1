//! Query Tests
//!
//! Table records and the query builder against a mock ttserver.

#[path = "../support/mock_server.rs"]
mod mock_server;

use mock_server::{Fault, MockServer};
use tyrantkv::{Condition, IndexKind, MetaSearch, Order, Query, QueryOp, Session, TyrantError};

// =============================================================================
// Helper Functions
// =============================================================================

const PEOPLE: [(&str, &str, &str, &str); 5] = [
    ("u1", "alice", "30", "88"),
    ("u2", "bob", "17", "95"),
    ("u3", "carol", "45", "72"),
    ("u4", "dave", "25", "60"),
    ("u5", "erin", "35", "91"),
];

fn setup_people() -> (MockServer, Session) {
    let server = MockServer::start();
    let mut session = Session::connect(server.config()).unwrap();
    for (key, name, age, score) in PEOPLE {
        session
            .tbl_put(key.as_bytes(), [("name", name), ("age", age), ("score", score)])
            .unwrap();
    }
    (server, session)
}

fn keys(list: &[&str]) -> Vec<Vec<u8>> {
    list.iter().map(|k| k.as_bytes().to_vec()).collect()
}

fn adults_with_high_scores() -> Query {
    let mut query = Query::new();
    query
        .add_condition("age", QueryOp::NumGe, "20", false)
        .add_condition("score", QueryOp::NumGt, "70", false)
        .set_order("score", Order::NumDesc);
    query
}

// =============================================================================
// Record Tests
// =============================================================================

#[test]
fn test_tbl_put_get_out() {
    let (_server, mut session) = setup_people();

    let columns = session.tbl_get(b"u1").unwrap();
    assert_eq!(columns.get(&b"name"[..]), Some(&b"alice".to_vec()));
    assert_eq!(columns.len(), 3);

    session.tbl_out(b"u1").unwrap();
    assert!(session.tbl_get(b"u1").unwrap_err().is_no_record());
    assert!(session.tbl_out(b"u1").unwrap_err().is_no_record());
}

#[test]
fn test_tbl_putkeep_and_putcat() {
    let (_server, mut session) = setup_people();

    let err = session.tbl_putkeep(b"u1", [("name", "mallory")]).unwrap_err();
    assert_eq!(err.code(), Some(tyrantkv::ErrorCode::ExistingRecord));

    session.tbl_putcat(b"u1", [("city", "paris")]).unwrap();
    let columns = session.tbl_get(b"u1").unwrap();
    assert_eq!(columns.get(&b"name"[..]), Some(&b"alice".to_vec()));
    assert_eq!(columns.get(&b"city"[..]), Some(&b"paris".to_vec()));
}

#[test]
fn test_tbl_setindex_and_genuid() {
    let (_server, mut session) = setup_people();

    session.tbl_setindex("age", IndexKind::Decimal, false).unwrap();
    session.tbl_setindex("name", IndexKind::Lexical, true).unwrap();

    let first = session.tbl_genuid().unwrap();
    let second = session.tbl_genuid().unwrap();
    assert!(second > first);
}

#[test]
fn test_invalid_column_names_rejected_locally() {
    let (_server, mut session) = setup_people();

    assert!(matches!(
        session.tbl_put(b"x", [("", "v")]),
        Err(TyrantError::InvalidArgument(_))
    ));
    assert!(matches!(
        session.tbl_setindex("a\0b", IndexKind::Token, false),
        Err(TyrantError::InvalidArgument(_))
    ));
    assert!(session.is_open());
}

#[test]
fn test_undecodable_columns_close_session() {
    let (server, mut session) = setup_people();

    server.inject(Fault::SingleItemList);
    let err = session.tbl_get(b"u1").unwrap_err();
    assert!(matches!(err, TyrantError::MalformedResponse(_)));
    assert!(err.is_fatal());
    assert!(!session.is_open());
    assert!(matches!(session.tbl_get(b"u1"), Err(TyrantError::NotConnected)));

    session.open().unwrap();
    assert_eq!(session.tbl_get(b"u1").unwrap().len(), 3);
}

#[test]
fn test_undecodable_count_closes_session() {
    let (server, mut session) = setup_people();

    server.inject(Fault::SingleItemList);
    assert!(session.search_count(&Query::new()).unwrap_err().is_fatal());
    assert!(!session.is_open());
}

// =============================================================================
// Search Tests
// =============================================================================

#[test]
fn test_numeric_ranges_with_order() {
    let (_server, mut session) = setup_people();

    let query = adults_with_high_scores();
    assert_eq!(session.search(&query).unwrap(), keys(&["u5", "u1", "u3"]));
}

#[test]
fn test_query_is_reusable() {
    let (_server, mut session) = setup_people();

    let query = adults_with_high_scores();
    let first = query.search(&mut session).unwrap();
    let second = query.search(&mut session).unwrap();
    assert_eq!(first, second);
    assert_eq!(query.search_count(&mut session).unwrap(), 3);
}

#[test]
fn test_set_limit_with_skip() {
    let (_server, mut session) = setup_people();

    let mut query = adults_with_high_scores();
    query.set_limit(Some(2), 1);
    assert_eq!(session.search(&query).unwrap(), keys(&["u1", "u3"]));
}

#[test]
fn test_string_conditions_and_negation() {
    let (_server, mut session) = setup_people();

    let mut query = Query::new();
    query
        .add_condition("name", QueryOp::StrBeginsWith, "a", true)
        .set_order("name", Order::StrAsc);
    assert_eq!(session.search(&query).unwrap(), keys(&["u2", "u3", "u4", "u5"]));

    let mut query = Query::new();
    query.add(Condition::new("name", QueryOp::StrEq, "carol").no_index());
    assert_eq!(session.search(&query).unwrap(), keys(&["u3"]));
}

#[test]
fn test_num_between() {
    let (_server, mut session) = setup_people();

    let mut query = Query::new();
    query
        .add_condition("age", QueryOp::NumBetween, "25 35", false)
        .set_order("age", Order::NumAsc);
    assert_eq!(session.search(&query).unwrap(), keys(&["u4", "u1", "u5"]));
}

#[test]
fn test_empty_query_matches_everything() {
    let (_server, mut session) = setup_people();

    assert_eq!(session.search_count(&Query::new()).unwrap(), 5);
}

#[test]
fn test_skip_without_limit() {
    let (_server, mut session) = setup_people();

    let mut query = adults_with_high_scores();
    query.set_limit(None, 1);
    assert_eq!(session.search(&query).unwrap(), keys(&["u1", "u3"]));
}

#[test]
fn test_search_get_returns_records() {
    let (_server, mut session) = setup_people();

    let mut query = Query::new();
    query
        .add_condition("age", QueryOp::NumLt, "30", false)
        .set_order("age", Order::NumAsc);

    let records = query.search_get(&mut session, &[]).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].key, b"u2");
    assert_eq!(records[0].get("name"), Some(&b"bob"[..]));
    assert_eq!(records[1].key, b"u4");
    assert_eq!(records[1].columns.len(), 3);

    let records = session.search_get(&query, &["name"]).unwrap();
    assert_eq!(records[1].get("name"), Some(&b"dave"[..]));
    assert_eq!(records[1].get("age"), None);
}

#[test]
fn test_search_out_removes_matches() {
    let (server, mut session) = setup_people();

    let mut query = Query::new();
    query.add_condition("score", QueryOp::NumLe, "72", false);
    query.search_out(&mut session).unwrap();

    assert_eq!(server.table_len(), 3);
    assert_eq!(session.search_count(&query).unwrap(), 0);
    assert!(session.tbl_get(b"u3").unwrap_err().is_no_record());
}

#[test]
fn test_search_hint_is_separated() {
    let (_server, mut session) = setup_people();

    let query = adults_with_high_scores();
    let (found, hint) = session.search_with_hint(&query).unwrap();
    assert_eq!(found, keys(&["u5", "u1", "u3"]));
    assert!(!hint.is_empty());
    assert!(!query.hint(&mut session).unwrap().is_empty());
}

#[test]
fn test_meta_search() {
    let (_server, mut session) = setup_people();

    let mut young = Query::new();
    young.add_condition("age", QueryOp::NumLt, "30", false);
    let mut strong = Query::new();
    strong.add_condition("score", QueryOp::NumGe, "90", false);

    let union = session.meta_search(&[&young, &strong], MetaSearch::Union).unwrap();
    assert_eq!(union, keys(&["u2", "u4", "u5"]));

    let both = session.meta_search(&[&young, &strong], MetaSearch::Intersection).unwrap();
    assert_eq!(both, keys(&["u2"]));

    let only_young = session.meta_search(&[&young, &strong], MetaSearch::Difference).unwrap();
    assert_eq!(only_young, keys(&["u4"]));

    assert!(session.meta_search(&[], MetaSearch::Union).unwrap().is_empty());
}

#[test]
fn test_building_a_query_needs_no_connection() {
    let mut query = Query::new();
    query
        .add_condition("a", QueryOp::StrInclude, "x", false)
        .set_limit(Some(1), 0);

    let mut closed = Session::new(tyrantkv::Config::default());
    assert!(matches!(
        query.search(&mut closed),
        Err(TyrantError::NotConnected)
    ));
    assert_eq!(query.conditions().len(), 1);
}

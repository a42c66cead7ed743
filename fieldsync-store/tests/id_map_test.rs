//! Identity resolution table: forward and reverse lookups, first-writer-wins
//! on conflicting mappings.

use fieldsync_core::id::{RemoteId, TempId};
use fieldsync_core::traits::IIdentityMap;
use fieldsync_store::StoreEngine;

fn store() -> StoreEngine {
    StoreEngine::open_in_memory().expect("in-memory store")
}

#[test]
fn test_forward_and_reverse_resolution() {
    let store = store();
    let temp = TempId::from_parts("room", "test", 1);
    let remote = RemoteId::new("1001");

    assert!(store.resolve(&temp).unwrap().is_none());
    assert!(store.reverse_resolve(&remote).unwrap().is_none());

    store.record_mapping(&temp, &remote, "room").unwrap();
    assert_eq!(store.resolve(&temp).unwrap(), Some(remote.clone()));
    assert_eq!(store.reverse_resolve(&remote).unwrap(), Some(temp));
}

#[test]
fn test_first_mapping_wins() {
    let store = store();
    let temp = TempId::from_parts("room", "test", 1);
    store
        .record_mapping(&temp, &RemoteId::new("1001"), "room")
        .unwrap();
    // A re-dispatch after a crash may try to record again; the original
    // mapping must be immutable.
    store
        .record_mapping(&temp, &RemoteId::new("2002"), "room")
        .unwrap();
    assert_eq!(store.resolve(&temp).unwrap(), Some(RemoteId::new("1001")));
}

#[test]
fn test_mappings_are_independent_per_temp_id() {
    let store = store();
    let a = TempId::from_parts("room", "test", 1);
    let b = TempId::from_parts("room", "test", 2);
    store.record_mapping(&a, &RemoteId::new("1"), "room").unwrap();
    store.record_mapping(&b, &RemoteId::new("2"), "room").unwrap();

    assert_eq!(store.resolve(&a).unwrap(), Some(RemoteId::new("1")));
    assert_eq!(store.resolve(&b).unwrap(), Some(RemoteId::new("2")));
}

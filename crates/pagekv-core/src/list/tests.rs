use crate::{
    error::ErrorOrigin,
    list::FlatList,
    store::{KeyValueStore, MemoryStore},
    value::{self, Value},
};
use proptest::prelude::*;
use std::sync::Arc;

fn names() -> FlatList<String> {
    FlatList::new("names")
}

fn push_all(list: &FlatList<String>, store: &MemoryStore, values: &[&str]) {
    for value in values {
        list.append(store, &(*value).to_string()).unwrap();
    }
}

fn all(list: &FlatList<String>, store: &MemoryStore) -> Vec<String> {
    list.get_all(store).unwrap()
}

#[test]
fn empty_list_reads_as_empty() {
    let store = MemoryStore::new();
    let list = names();

    assert_eq!(list.count(&store).unwrap(), 0);
    assert_eq!(list.end(&store).unwrap(), 0);
    assert!(list.is_empty(&store).unwrap());
    assert!(all(&list, &store).is_empty());
}

#[test]
fn append_preserves_order_and_counts() {
    let store = MemoryStore::new();
    let list = names();
    push_all(&list, &store, &["a", "b", "c"]);

    assert_eq!(all(&list, &store), vec!["a", "b", "c"]);
    assert_eq!(list.count(&store).unwrap(), 3);
    assert_eq!(list.end(&store).unwrap(), 3);
}

#[test]
fn physical_keys_follow_layout() {
    let store = MemoryStore::new();
    let list = names();
    push_all(&list, &store, &["a", "b"]);
    list.remove(&store, &"a".to_string()).unwrap();

    let keys: Vec<String> = store.snapshot().into_keys().collect();
    assert_eq!(
        keys,
        vec![
            "names__count",
            "names__end",
            "names__free",
            "names__idx__0",
            "names__idx__1",
        ]
    );
    assert_eq!(
        store.get("names__idx__0").unwrap().as_deref(),
        Some(value::TOMBSTONE)
    );
}

#[test]
fn duplicates_are_kept() {
    let store = MemoryStore::new();
    let list = names();
    push_all(&list, &store, &["a", "a"]);

    assert_eq!(all(&list, &store), vec!["a", "a"]);

    list.remove(&store, &"a".to_string()).unwrap();
    assert_eq!(all(&list, &store), vec!["a"]);
}

#[test]
fn remove_missing_value_is_a_noop() {
    let store = MemoryStore::new();
    let list = names();
    push_all(&list, &store, &["a"]);

    assert_eq!(list.remove(&store, &"zz".to_string()).unwrap(), None);
    assert_eq!(list.count(&store).unwrap(), 1);
}

#[test]
fn freed_slots_are_reused_lowest_first() {
    let store = MemoryStore::new();
    let list = names();
    push_all(&list, &store, &["a", "b", "c", "d"]);

    assert_eq!(list.remove(&store, &"c".to_string()).unwrap(), Some(2));
    assert_eq!(list.remove(&store, &"a".to_string()).unwrap(), Some(0));

    assert_eq!(list.append(&store, &"x".to_string()).unwrap(), 0);
    assert_eq!(list.append(&store, &"y".to_string()).unwrap(), 2);
    assert_eq!(list.append(&store, &"z".to_string()).unwrap(), 4);

    assert_eq!(all(&list, &store), vec!["x", "b", "y", "d", "z"]);
    assert_eq!(list.end(&store).unwrap(), 5);
}

#[test]
fn reset_drains_but_keeps_end() {
    let store = MemoryStore::new();
    let list = names();
    push_all(&list, &store, &["a", "b"]);

    list.reset(&store).unwrap();
    assert_eq!(list.count(&store).unwrap(), 0);
    assert_eq!(list.end(&store).unwrap(), 2);
    assert!(all(&list, &store).is_empty());

    // slot numbering continues after the old end
    assert_eq!(list.append(&store, &"c".to_string()).unwrap(), 2);
    assert_eq!(all(&list, &store), vec!["c"]);
}

#[test]
fn range_stops_early() {
    let store = MemoryStore::new();
    let list = names();
    push_all(&list, &store, &["a", "b", "c"]);

    let mut seen = Vec::new();
    list.range(&store, |value| {
        seen.push(value);
        seen.len() < 2
    })
    .unwrap();

    assert_eq!(seen, vec!["a", "b"]);
}

#[test]
fn first_and_last_scan_in_opposite_directions() {
    let store = MemoryStore::new();
    let list = names();
    push_all(&list, &store, &["apple", "bean", "avocado"]);

    let starts_with_a = |v: &String| v.starts_with('a');
    assert_eq!(
        list.first(&store, starts_with_a).unwrap().as_deref(),
        Some("apple")
    );
    assert_eq!(
        list.last(&store, starts_with_a).unwrap().as_deref(),
        Some("avocado")
    );
    assert_eq!(list.first(&store, |v| v.is_empty()).unwrap(), None);
}

#[test]
fn append_unique_skips_present_values() {
    let store = MemoryStore::new();
    let list = names();

    assert!(list.append_unique(&store, &"a".to_string()).unwrap());
    assert!(!list.append_unique(&store, &"a".to_string()).unwrap());
    assert_eq!(list.count(&store).unwrap(), 1);
}

#[test]
fn reading_a_slot_as_the_wrong_type_fails() {
    let store = MemoryStore::new();
    FlatList::<u64>::new("mixed").append(&store, &7).unwrap();

    let err = FlatList::<String>::new("mixed")
        .get_all(&store)
        .unwrap_err();
    assert_eq!(err.origin, ErrorOrigin::Codec);
}

#[test]
fn corrupt_counter_is_reported() {
    let store = MemoryStore::new();
    store
        .set("names__count", &value::encode(&Value::Text("x".into())).unwrap())
        .unwrap();

    let err = names().count(&store).unwrap_err();
    assert_eq!(err.origin, ErrorOrigin::List);
}

#[test]
fn typed_values_round_trip_through_slots() {
    let store = MemoryStore::new();
    let list = FlatList::<Value>::new("values");
    let values = vec![
        Value::I32(-4),
        Value::Text("t".into()),
        Value::Strings(vec!["x".into()]),
    ];
    for value in &values {
        list.append(&store, value).unwrap();
    }

    assert_eq!(list.get_all(&store).unwrap(), values);
}

// ---- yield -------------------------------------------------------------

#[test]
fn yield_values_produces_slot_order() {
    let store = Arc::new(MemoryStore::new());
    let list = names();
    push_all(&list, &store, &["a", "b", "c"]);
    list.remove(store.as_ref(), &"b".to_string()).unwrap();

    let produced: Vec<String> = list
        .yield_values(store)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(produced, vec!["a", "c"]);
}

#[test]
fn abandoned_yield_does_not_block_drop() {
    let store = Arc::new(MemoryStore::new());
    let list = names();
    push_all(&list, &store, &["a", "b", "c", "d"]);

    let mut stream = list.yield_values(store.clone()).unwrap();
    assert_eq!(stream.next().unwrap().unwrap(), "a");
    drop(stream);

    // the store stays usable after the producer exits
    list.append(store.as_ref(), &"e".to_string()).unwrap();
    assert_eq!(list.count(store.as_ref()).unwrap(), 5);
}

#[test]
fn yield_reports_decode_errors_and_stops() {
    let store = Arc::new(MemoryStore::new());
    FlatList::<u64>::new("names").append(store.as_ref(), &1).unwrap();

    let items: Vec<_> = names().yield_values(store).unwrap().collect();
    assert_eq!(items.len(), 1);
    assert!(items[0].is_err());
}

// ---- model check -------------------------------------------------------

#[derive(Clone, Debug)]
enum Op {
    Append(u8),
    Remove(u8),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..6).prop_map(Op::Append),
        (0u8..6).prop_map(Op::Remove),
    ]
}

proptest! {
    #[test]
    fn matches_slot_model(ops in prop::collection::vec(arb_op(), 0..40)) {
        let store = MemoryStore::new();
        let list = FlatList::<u8>::new("model");

        // slots[n] = Some(v) when occupied
        let mut slots: Vec<Option<u8>> = Vec::new();
        let mut last_end = 0;

        for op in ops {
            match op {
                Op::Append(v) => {
                    list.append(&store, &v).unwrap();
                    match slots.iter().position(Option::is_none) {
                        Some(free) => slots[free] = Some(v),
                        None => slots.push(Some(v)),
                    }
                }
                Op::Remove(v) => {
                    list.remove(&store, &v).unwrap();
                    if let Some(at) = slots.iter().position(|s| *s == Some(v)) {
                        slots[at] = None;
                    }
                }
            }

            let end = list.end(&store).unwrap();
            prop_assert!(end >= last_end);
            last_end = end;
        }

        let expected: Vec<u8> = slots.iter().flatten().copied().collect();
        prop_assert_eq!(list.get_all(&store).unwrap(), expected.clone());
        prop_assert_eq!(list.count(&store).unwrap(), expected.len() as u64);
        prop_assert_eq!(list.end(&store).unwrap(), slots.len() as u64);
    }
}

use std::sync::Arc;
use std::thread;

use moe_geoportal_loader::domain::DatasetId;
use moe_geoportal_loader::style::{MemoryStyleStore, StyleDefinition, StyleStore};

#[test]
fn put_then_get_returns_the_exact_style() {
    let store = MemoryStyleStore::new();
    let id: DatasetId = "vg_50000".parse().unwrap();
    let style = StyleDefinition::new(r##"{"renderer":"simple-fill","fill":"#4f9d4f"}"##);
    store.put(&id, style.clone()).unwrap();
    assert_eq!(store.get(&id).unwrap(), Some(style));
}

#[test]
fn styles_are_keyed_per_dataset() {
    let store = MemoryStyleStore::new();
    let veg: DatasetId = "vg_50000".parse().unwrap();
    let mammal: DatasetId = "tanuki".parse().unwrap();

    store.put(&veg, StyleDefinition::new("veg")).unwrap();
    store.put(&mammal, StyleDefinition::new("mammal")).unwrap();

    assert_eq!(store.get(&veg).unwrap(), Some(StyleDefinition::new("veg")));
    assert_eq!(
        store.get(&mammal).unwrap(),
        Some(StyleDefinition::new("mammal"))
    );
}

#[test]
fn concurrent_puts_on_one_key_never_expose_a_torn_style() {
    let store = Arc::new(MemoryStyleStore::new());
    let id: DatasetId = "vg_50000".parse().unwrap();
    store.put(&id, StyleDefinition::new("style-0")).unwrap();

    let writers: Vec<_> = (1..=4)
        .map(|n| {
            let store = Arc::clone(&store);
            let id = id.clone();
            thread::spawn(move || {
                for _ in 0..50 {
                    store.put(&id, StyleDefinition::new(format!("style-{n}"))).unwrap();
                }
            })
        })
        .collect();

    for _ in 0..200 {
        let seen = store.get(&id).unwrap().unwrap();
        assert!(seen.as_str().starts_with("style-"), "torn read: {seen:?}");
    }
    for writer in writers {
        writer.join().unwrap();
    }
}

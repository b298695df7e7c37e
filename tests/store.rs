use std::cell::RefCell;
use std::rc::Rc;

use glogg::runtime::{Emission, Fact, FactStore, Integration, Literal, Sink};

fn fact(pairs: &[(&str, &str)]) -> Fact {
    let mut fact = Fact::new();
    for (label, value) in pairs {
        fact.set(*label, Literal::Text(String::from(*value)));
    }
    fact
}

#[test]
fn new_facts_can_be_appended() {
    let facts = vec![
        fact(&[("tag", "person"), ("name", "Nibor")]),
        fact(&[("tag", "person"), ("name", "Robin")]),
        fact(&[("tag", "cat"), ("name", "Percy")]),
    ];
    let mut store = FactStore::new();
    store.commit(facts[..2].to_vec());
    store.commit(facts[2..].to_vec());
    assert_eq!(store.facts(), &facts[..]);
}

#[test]
fn a_change_listener_is_triggered_after_a_commit() {
    let mut store = FactStore::new();
    let triggered = Rc::new(RefCell::new(false));
    let seen = triggered.clone();
    store.on_change(Rc::new(move |_: &[Fact]| {
        *seen.borrow_mut() = true;
        Vec::new()
    }));
    store.commit(vec![fact(&[("tag", "test")])]);
    assert!(*triggered.borrow());
}

#[test]
fn values_are_deduplicated_on_commit() {
    let mut store = FactStore::new();
    store.commit(vec![fact(&[("tag", "test")])]);
    store.commit(vec![fact(&[("tag", "test")])]);
    assert_eq!(store.facts().len(), 1);
}

#[test]
fn listeners_only_run_when_the_store_actually_changes() {
    let mut store = FactStore::new();
    let count = Rc::new(RefCell::new(0));
    let seen = count.clone();
    store.on_change(Rc::new(move |_: &[Fact]| {
        *seen.borrow_mut() += 1;
        Vec::new()
    }));
    store.commit(vec![fact(&[("tag", "test")])]);
    store.commit(vec![fact(&[("tag", "test")])]);
    assert_eq!(*count.borrow(), 1);
}

#[test]
fn one_invocation_per_distinct_batch() {
    let mut store = FactStore::new();
    let count = Rc::new(RefCell::new(0));
    let seen = count.clone();
    store.on_change(Rc::new(move |_: &[Fact]| {
        *seen.borrow_mut() += 1;
        Vec::new()
    }));
    for i in 0..5 {
        let n = i.to_string();
        store.commit(vec![
            fact(&[("tag", "batch"), ("n", n.as_str())]),
            fact(&[("tag", "extra"), ("n", n.as_str())]),
        ]);
    }
    assert_eq!(*count.borrow(), 5, "batch size does not matter");
}

// A listener that derives a new fact from an existing one: the store keeps
// settling until a round adds nothing, and re-derivation of an unchanged
// fact is a no-op rather than a trigger loop.
#[test]
fn derivations_settle_at_a_fixed_point() {
    let mut store = FactStore::new();
    store.on_change(Rc::new(|facts: &[Fact]| {
        let mut out = Vec::new();
        for f in facts {
            if f.tag() == Some("a") {
                out.push(Emission {
                    sink: Sink::Store,
                    records: vec![fact(&[("tag", "b")])],
                });
            }
        }
        out
    }));
    store.commit(vec![fact(&[("tag", "a")])]);
    assert_eq!(store.facts(), &[fact(&[("tag", "a")]), fact(&[("tag", "b")])]);
}

#[derive(Clone, Default)]
struct Capture(Rc<RefCell<Vec<Fact>>>);

impl Integration for Capture {
    fn commit(&self, records: &[Fact]) {
        self.0.borrow_mut().extend_from_slice(records);
    }
}

#[test]
fn emissions_route_to_a_registered_integration() {
    let mut store = FactStore::new();
    let capture = Capture::default();
    store.register_integration("out", Box::new(capture.clone()));
    store.on_change(Rc::new(|facts: &[Fact]| {
        facts
            .iter()
            .filter(|f| f.tag() == Some("ping"))
            .map(|f| Emission {
                sink: Sink::Named(String::from("out")),
                records: vec![f.clone()],
            })
            .collect()
    }));
    store.commit(vec![fact(&[("tag", "ping")])]);
    assert_eq!(capture.0.borrow().len(), 1);
    assert_eq!(store.facts().len(), 1, "routed records stay out of the store");
}

#[test]
fn an_unregistered_sink_falls_back_to_the_store() {
    let mut store = FactStore::new();
    store.on_change(Rc::new(|facts: &[Fact]| {
        if facts.iter().any(|f| f.tag() == Some("seed"))
            && !facts.iter().any(|f| f.tag() == Some("derived"))
        {
            vec![Emission {
                sink: Sink::Named(String::from("nowhere")),
                records: vec![fact(&[("tag", "derived")])],
            }]
        } else {
            Vec::new()
        }
    }));
    store.commit(vec![fact(&[("tag", "seed")])]);
    assert!(store.facts().contains(&fact(&[("tag", "derived")])));
}

use glogg::grammar::parse_program;
use glogg::persist::Persistor;
use rusqlite::Connection;

fn in_memory() -> Persistor {
    Persistor::new(Connection::open_in_memory().expect("sqlite")).expect("schema")
}

const PROGRAM: &str = "\
commit:
  [ #duck name: \"Scrooge\" ]
  [ #duck name: \"Donald\" uncle: \"Scrooge\" cats: 3 ]

search @persons:
  [ #duck name: scrooges-nephew uncle: \"Scrooge\" ]
bind:
  [ #nephew name: scrooges-nephew ]";

#[test]
fn saving_then_loading_reproduces_the_ast() {
    let mut persistor = in_memory();
    persistor.save_source(PROGRAM).expect("saves");
    let loaded = persistor.load_queries().expect("loads");
    let parsed = parse_program(PROGRAM).expect("parses");
    assert_eq!(loaded, parsed);
}

#[test]
fn query_order_matches_source_order() {
    let mut persistor = in_memory();
    persistor.save_source(PROGRAM).expect("saves");
    let loaded = persistor.load_queries().expect("loads");
    assert_eq!(loaded.len(), 2);
    assert!(loaded[0].is_unconditional());
    assert_eq!(loaded[1].search.context, Some(String::from("persons")));
}

#[test]
fn regenerated_source_parses_back_to_the_same_queries() {
    let mut persistor = in_memory();
    persistor.save_source(PROGRAM).expect("saves");
    let source = persistor.load_source().expect("formats");
    let reparsed = parse_program(&source).expect("round trip parses");
    assert_eq!(reparsed, parse_program(PROGRAM).expect("parses"));
}

#[test]
fn an_empty_program_saves_nothing() {
    let mut persistor = in_memory();
    persistor.save_source("   \n  ").expect("saves");
    assert_eq!(persistor.load_queries().expect("loads").len(), 0);
    assert_eq!(persistor.load_source().expect("formats"), "");
}

#[test]
fn a_bad_program_is_rejected_before_anything_is_stored() {
    let mut persistor = in_memory();
    assert!(persistor.save_source("bind:\n  [ #x ]").is_err());
    assert_eq!(persistor.load_queries().expect("loads").len(), 0);
}

#[test]
fn integrations_are_registered_and_listed() {
    let mut persistor = in_memory();
    persistor
        .add_integration("stdio", "glogg/terminal")
        .expect("adds");
    let specs = persistor.integrations().expect("lists");
    assert_eq!(specs.len(), 1);
    assert_eq!(specs[0].context, "stdio");
    assert_eq!(specs[0].import, "glogg/terminal");
}

#[test]
fn saving_twice_appends_in_order() {
    let mut persistor = in_memory();
    persistor
        .save_source("commit:\n  [ #a ]")
        .expect("first save");
    persistor
        .save_source("commit:\n  [ #b ]")
        .expect("second save");
    let loaded = persistor.load_queries().expect("loads");
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded[0].commit.steps[0].tag(), Some("a"));
    assert_eq!(loaded[1].commit.steps[0].tag(), Some("b"));
}

use glogg::codegen::{IntegrationSpec, JavaScript, Renderer, compile};
use glogg::grammar::parse_program;

fn ducks() -> String {
    [
        "commit:",
        "  [ #duck name: \"Scrooge\" ]",
        "  [ #duck name: \"Donald\" uncle: \"Scrooge\" ]",
        "  [ #duck name: \"Hewie\" uncle: \"Donald\" ]",
        "",
        "search:",
        "  [ #duck name: scrooges-nephew uncle: \"Scrooge\" ]",
        "  [ #duck name: name uncle: scrooges-nephew ]",
        "commit @stdio:",
        "  [ #log message: name ]",
    ]
    .join("\n")
}

fn rendered() -> String {
    let queries = parse_program(&ducks()).expect("parses");
    let integrations = vec![IntegrationSpec {
        context: String::from("stdio"),
        import: String::from("glogg/terminal"),
    }];
    let program = compile(&queries, &integrations).expect("compiles");
    JavaScript.render(&program)
}

#[test]
fn the_header_carries_the_format_version() {
    assert!(rendered().starts_with("// Generated by glogg make (format v1)."));
}

#[test]
fn referenced_integrations_are_imported() {
    assert!(rendered().contains("import * as stdio from \"glogg/terminal\";"));
}

#[test]
fn the_prelude_defines_the_fact_store() {
    let output = rendered();
    assert!(output.contains("class FactStore {"));
    assert!(output.contains("const store = new FactStore();"));
    assert!(output.contains("if (fresh.length === 0) {"));
}

#[test]
fn handlers_register_before_the_initial_commit() {
    let output = rendered();
    let handler = output.find("store.onChange(function () {").expect("handler");
    let initial = output.find("store.commit([").expect("initial commit");
    assert!(handler < initial, "handlers must see the initial commit");
}

#[test]
fn the_join_renders_as_nested_loops_with_guards() {
    let output = rendered();
    assert!(output.contains("for (const row0 of this.facts) {"));
    assert!(output.contains("for (const row1 of this.facts) {"));
    assert!(output.contains(
        "if (row0[\"tag\"] === \"duck\" && row0[\"name\"] !== undefined && row0[\"uncle\"] === \"Scrooge\") {"
    ));
    assert!(output.contains("const scrooges_nephew = row0[\"name\"];"));
    assert!(output.contains("row1[\"uncle\"] === scrooges_nephew"));
    assert!(output.contains("stdio.commit([{ \"tag\": \"log\", \"message\": name }]);"));
}

#[test]
fn the_initial_facts_render_in_source_order() {
    let output = rendered();
    let scrooge = output
        .find("{ \"tag\": \"duck\", \"name\": \"Scrooge\" },")
        .expect("first fact");
    let donald = output
        .find("{ \"tag\": \"duck\", \"name\": \"Donald\", \"uncle\": \"Scrooge\" },")
        .expect("second fact");
    assert!(scrooge < donald);
}

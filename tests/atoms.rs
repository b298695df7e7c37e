use glogg::ast::Value;
use glogg::grammar::{integer, name, string, variable};
use glogg::parse::{Node, Parsed};

fn value_of(result: Parsed) -> Node {
    match result {
        Parsed::Success { value, .. } => value,
        Parsed::Failure { expected, .. } => panic!("expected success, wanted {}", expected),
    }
}

#[test]
fn a_name_is_lowercase_letters_hyphens_and_digits() {
    let result = value_of(name().run("ny-båre1"));
    assert_eq!(result, Node::Text(String::from("ny-båre1")));
}

#[test]
fn a_name_must_start_with_a_lowercase_letter() {
    assert!(!name().run("Robin").is_success());
    assert!(!name().run("1abc").is_success());
    assert!(!name().run("-abc").is_success());
}

#[test]
fn a_name_stops_at_its_terminator_without_consuming_it() {
    match name().run("key: 1") {
        Parsed::Success { value, rest, .. } => {
            assert_eq!(value, Node::Text(String::from("key")));
            assert_eq!(rest, ": 1");
        }
        Parsed::Failure { .. } => panic!("expected success"),
    }
    match name().run("duck]") {
        Parsed::Success { value, rest, .. } => {
            assert_eq!(value, Node::Text(String::from("duck")));
            assert_eq!(rest, "]");
        }
        Parsed::Failure { .. } => panic!("expected success"),
    }
    match name().run("robin  next") {
        Parsed::Success { value, rest, .. } => {
            assert_eq!(value, Node::Text(String::from("robin")));
            assert_eq!(rest, "  next", "whitespace terminator left unconsumed");
        }
        Parsed::Failure { .. } => panic!("expected success"),
    }
}

#[test]
fn a_name_followed_by_a_letter_it_cannot_use_fails() {
    assert!(!name().run("abcX").is_success());
}

#[test]
fn a_string_is_the_text_between_quotes() {
    assert_eq!(
        value_of(string().run("\"hello world\"")),
        Node::Text(String::from("hello world"))
    );
    assert_eq!(value_of(string().run("\"\"")), Node::Text(String::new()));
}

#[test]
fn an_unterminated_string_fails() {
    assert!(!string().run("\"abc").is_success());
}

#[test]
fn an_integer_parses_its_digits() {
    match integer().run("42 ") {
        Parsed::Success { value, rest, .. } => {
            assert_eq!(value, Node::Int(42));
            assert_eq!(rest, " ");
        }
        Parsed::Failure { .. } => panic!("expected success"),
    }
    assert_eq!(value_of(integer().run("007]")), Node::Int(7));
}

#[test]
fn an_integer_with_a_bad_terminator_fails() {
    assert!(!integer().run("12a").is_success());
}

#[test]
fn a_variable_is_a_name_with_a_distinct_kind() {
    assert_eq!(
        value_of(variable().run("pets ")),
        Node::Value(Value::Variable(String::from("pets")))
    );
}

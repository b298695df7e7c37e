//! A small backtracking parser-combinator engine.
//!
//! Every parser is a pure function from remaining input to a [`Parsed`]
//! outcome: either a success carrying the produced [`Node`], the unconsumed
//! remainder and an optional "kept" side-channel, or a failure carrying a
//! human-readable expectation and the remainder at the failure point.
//! Failures are ordinary return values, never panics, and always keep their
//! remainder so that [`one_of`] can pick the alternative that consumed the
//! most input before giving up. That longest-partial-match rule is what
//! makes the errors of a grammar with many alternatives worth reading.
//!
//! Parsers are `Rc`-wrapped and `Clone`, so the same parser can appear in
//! several alternations without shared mutable state.

use std::rc::Rc;

use crate::ast;

/// The dynamic parse tree. Primitives produce characters and text, the
/// repetition and sequencing combinators produce lists, and the grammar
/// layer maps those into the AST variants.
#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    Null,
    Char(char),
    Text(String),
    Int(i64),
    List(Vec<Node>),
    Value(ast::Value),
    Record(ast::Record),
    Query(ast::Query),
}

impl Node {
    pub fn char(&self) -> Option<char> {
        match self {
            Node::Char(c) => Some(*c),
            _ => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Node::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn int(&self) -> Option<i64> {
        match self {
            Node::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn list(&self) -> Option<&[Node]> {
        match self {
            Node::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn value(&self) -> Option<&ast::Value> {
        match self {
            Node::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn record(&self) -> Option<&ast::Record> {
        match self {
            Node::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn query(&self) -> Option<&ast::Query> {
        match self {
            Node::Query(q) => Some(q),
            _ => None,
        }
    }
}

/// The outcome of running a parser. `rest` is present on failure too, so
/// the driver can report how far the parse got.
#[derive(Clone, Debug, PartialEq)]
pub enum Parsed<'a> {
    Success {
        value: Node,
        rest: &'a str,
        kept: Option<Node>,
    },
    Failure {
        expected: String,
        rest: &'a str,
    },
}

impl<'a> Parsed<'a> {
    pub fn is_success(&self) -> bool {
        matches!(self, Parsed::Success { .. })
    }
}

#[derive(Clone)]
pub struct Parser {
    f: Rc<dyn for<'a> Fn(&'a str) -> Parsed<'a>>,
}

impl Parser {
    pub fn new<F>(f: F) -> Parser
    where
        F: for<'a> Fn(&'a str) -> Parsed<'a> + 'static,
    {
        Parser { f: Rc::new(f) }
    }

    pub fn run<'a>(&self, input: &'a str) -> Parsed<'a> {
        (self.f)(input)
    }

    /// Transform a successful value. A mapping that declines (returns
    /// `None`) turns into an ordinary failure instead of unwinding through
    /// the combinator chain.
    pub fn map<F>(self, f: F) -> Parser
    where
        F: Fn(Node) -> Option<Node> + 'static,
    {
        Parser::new(move |input: &str| match self.run(input) {
            Parsed::Success { value, rest, kept } => match f(value) {
                Some(mapped) => Parsed::Success {
                    value: mapped,
                    rest,
                    kept,
                },
                None => Parsed::Failure {
                    expected: String::from("a successful mapping"),
                    rest: input,
                },
            },
            failure => failure,
        })
    }

    /// Mark this parser's successful value as one to propagate into the
    /// enclosing sequence's kept list.
    pub fn keep(self) -> Parser {
        Parser::new(move |input: &str| match self.run(input) {
            Parsed::Success { value, rest, .. } => {
                let kept = Some(value.clone());
                Parsed::Success { value, rest, kept }
            }
            failure => failure,
        })
    }

    /// Like [`Parser::map`] but over the accumulated kept values; a no-op
    /// pass-through when nothing was kept.
    pub fn map_keeps<F>(self, f: F) -> Parser
    where
        F: Fn(&Node) -> Option<Node> + 'static,
    {
        Parser::new(move |input: &str| match self.run(input) {
            Parsed::Success {
                value,
                rest,
                kept: Some(kept),
            } => match f(&kept) {
                Some(mapped) => Parsed::Success {
                    value: mapped,
                    rest,
                    kept: Some(kept),
                },
                None => Parsed::Failure {
                    expected: String::from("a successful mapping"),
                    rest: input,
                },
            },
            other => other,
        })
    }

    /// On success, un-consume the matched text while still reporting the
    /// matched value. Used for zero-width lookahead terminators.
    pub fn backtrack(self) -> Parser {
        Parser::new(move |input: &str| match self.run(input) {
            Parsed::Success { value, kept, .. } => Parsed::Success {
                value,
                rest: input,
                kept,
            },
            failure => failure,
        })
    }
}

// ------------- Primitives -------------

pub fn ch(expected: char) -> Parser {
    Parser::new(move |input: &str| match input.chars().next() {
        Some(c) if c == expected => Parsed::Success {
            value: Node::Char(c),
            rest: &input[c.len_utf8()..],
            kept: None,
        },
        _ => Parsed::Failure {
            expected: format!("'{}'", expected),
            rest: input,
        },
    })
}

pub fn anything_but(excluded: char) -> Parser {
    Parser::new(move |input: &str| match input.chars().next() {
        Some(c) if c != excluded => Parsed::Success {
            value: Node::Char(c),
            rest: &input[c.len_utf8()..],
            kept: None,
        },
        _ => Parsed::Failure {
            expected: format!("anything but '{}'", excluded),
            rest: input,
        },
    })
}

pub fn word(w: &str) -> Parser {
    let w = w.to_owned();
    Parser::new(move |input: &str| match input.strip_prefix(&w) {
        Some(rest) => Parsed::Success {
            value: Node::Text(w.clone()),
            rest,
            kept: None,
        },
        None => Parsed::Failure {
            expected: format!("the word '{}'", w),
            rest: input,
        },
    })
}

/// A single whitespace character: space, carriage return, newline or tab.
pub fn whitespace() -> Parser {
    Parser::new(|input: &str| match input.chars().next() {
        Some(c @ (' ' | '\r' | '\n' | '\t')) => Parsed::Success {
            value: Node::Char(c),
            rest: &input[c.len_utf8()..],
            kept: None,
        },
        _ => Parsed::Failure {
            expected: String::from("whitespace"),
            rest: input,
        },
    })
}

/// Succeeds only on empty input.
pub fn end() -> Parser {
    Parser::new(|input: &str| {
        if input.is_empty() {
            Parsed::Success {
                value: Node::Text(String::new()),
                rest: input,
                kept: None,
            }
        } else {
            Parsed::Failure {
                expected: String::from("end of input"),
                rest: input,
            }
        }
    })
}

pub fn digit() -> Parser {
    Parser::new(|input: &str| match input.chars().next() {
        Some(c) if c.is_ascii_digit() => Parsed::Success {
            value: Node::Char(c),
            rest: &input[c.len_utf8()..],
            kept: None,
        },
        _ => Parsed::Failure {
            expected: String::from("a digit"),
            rest: input,
        },
    })
}

/// Unicode-aware lowercase letter.
pub fn lowercase() -> Parser {
    Parser::new(|input: &str| match input.chars().next() {
        Some(c) if c.is_lowercase() => Parsed::Success {
            value: Node::Char(c),
            rest: &input[c.len_utf8()..],
            kept: None,
        },
        _ => Parsed::Failure {
            expected: String::from("a lowercase letter"),
            rest: input,
        },
    })
}

/// Unicode-aware uppercase letter.
pub fn uppercase() -> Parser {
    Parser::new(|input: &str| match input.chars().next() {
        Some(c) if c.is_uppercase() => Parsed::Success {
            value: Node::Char(c),
            rest: &input[c.len_utf8()..],
            kept: None,
        },
        _ => Parsed::Failure {
            expected: String::from("an uppercase letter"),
            rest: input,
        },
    })
}

// ------------- Combinators -------------

/// Try alternatives in order, returning the first success. When all fail,
/// the failure with the least remaining input wins, marked as a best guess.
pub fn one_of(parsers: Vec<Parser>) -> Parser {
    Parser::new(move |input: &str| {
        let mut best: Option<(String, &str)> = None;
        for parser in &parsers {
            match parser.run(input) {
                success @ Parsed::Success { .. } => return success,
                Parsed::Failure { expected, rest } => {
                    let better = match &best {
                        None => true,
                        Some((_, best_rest)) => rest.len() < best_rest.len(),
                    };
                    if better {
                        best = Some((expected, rest));
                    }
                }
            }
        }
        match best {
            Some((expected, rest)) => Parsed::Failure {
                expected: format!("(best guess) {}", expected),
                rest,
            },
            None => Parsed::Failure {
                expected: String::from("one of no alternatives"),
                rest: input,
            },
        }
    })
}

/// Run parsers in order, threading the remainder. The value is the list of
/// sub-values; the kept list collects the sub-values whose own parser
/// marked them, absent when none did. The first sub-failure propagates
/// as-is.
pub fn sequence(parsers: Vec<Parser>) -> Parser {
    Parser::new(move |input: &str| {
        let mut rest = input;
        let mut items = Vec::with_capacity(parsers.len());
        let mut kept = Vec::new();
        for parser in &parsers {
            match parser.run(rest) {
                Parsed::Success {
                    value,
                    rest: remaining,
                    kept: sub_kept,
                } => {
                    if sub_kept.is_some() {
                        kept.push(value.clone());
                    }
                    items.push(value);
                    rest = remaining;
                }
                failure => return failure,
            }
        }
        Parsed::Success {
            value: Node::List(items),
            rest,
            kept: if kept.is_empty() {
                None
            } else {
                Some(Node::List(kept))
            },
        }
    })
}

/// Greedily repeat a parser. Succeeds with the collected list when at least
/// `n` repetitions matched; otherwise fails with the original input as the
/// remainder (no partial consumption is recorded). A repetition that
/// consumes nothing ends the loop.
pub fn n_or_more(n: usize, parser: Parser) -> Parser {
    Parser::new(move |input: &str| {
        let mut rest = input;
        let mut items = Vec::new();
        let mut last_expected = String::from("another match");
        loop {
            match parser.run(rest) {
                Parsed::Success {
                    value,
                    rest: remaining,
                    ..
                } => {
                    if remaining.len() == rest.len() {
                        break;
                    }
                    items.push(value);
                    rest = remaining;
                }
                Parsed::Failure { expected, .. } => {
                    last_expected = expected;
                    break;
                }
            }
        }
        if items.len() >= n {
            Parsed::Success {
                value: Node::List(items),
                rest,
                kept: None,
            }
        } else {
            Parsed::Failure {
                expected: format!("at least {} of {}", n, last_expected),
                rest: input,
            }
        }
    })
}

/// Never fails: a failed inner parse yields a null value and leaves the
/// input unconsumed.
pub fn optional(parser: Parser) -> Parser {
    Parser::new(move |input: &str| match parser.run(input) {
        success @ Parsed::Success { .. } => success,
        Parsed::Failure { .. } => Parsed::Success {
            value: Node::Null,
            rest: input,
            kept: None,
        },
    })
}

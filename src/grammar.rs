//! The Glogg grammar, composed from the combinators in [`crate::parse`].
//!
//! Atoms (names, quoted strings, integers, logic variables) terminate on a
//! zero-width lookahead so that `name:`, `0]` and friends parse without the
//! atom swallowing its terminator. Records are bracketed label/value lists
//! where `#name` populates the `tag` pseudo-label. A query is either an
//! unconditional `commit` block or a `search` block followed by a `commit`
//! or `bind` block, each block optionally routed with `@context`.

use crate::ast::{Block, Query, Record, Value};
use crate::error::{GloggError, Result};
use crate::parse::{
    self, Node, Parsed, Parser, anything_but, ch, digit, end, lowercase, n_or_more, one_of,
    optional, sequence, word,
};

/// Zero or more whitespace characters.
fn blank() -> Parser {
    n_or_more(0, parse::whitespace())
}

/// What may legally follow a name or integer, checked without consuming.
fn termination() -> Parser {
    one_of(vec![
        end(),
        ch(':'),
        ch(']'),
        n_or_more(1, parse::whitespace()),
    ])
}

fn name_inner() -> Parser {
    one_of(vec![lowercase(), digit(), ch('-')])
}

/// A name: a lowercase letter followed by lowercase letters, digits and
/// hyphens, terminated by lookahead.
pub fn name() -> Parser {
    sequence(vec![
        lowercase().keep(),
        n_or_more(0, name_inner()).keep(),
        termination().backtrack(),
    ])
    .map_keeps(|kept| {
        let parts = kept.list()?;
        let mut out = String::new();
        out.push(parts[0].char()?);
        for c in parts[1].list()? {
            out.push(c.char()?);
        }
        Some(Node::Text(out))
    })
}

/// A quoted string; the value is the inner text, verbatim.
pub fn string() -> Parser {
    sequence(vec![
        ch('"'),
        n_or_more(0, anything_but('"')).keep(),
        ch('"'),
    ])
    .map_keeps(|kept| {
        let inner = kept.list()?[0].list()?;
        let mut out = String::new();
        for c in inner {
            out.push(c.char()?);
        }
        Some(Node::Text(out))
    })
}

/// One or more digits with the same terminator lookahead as [`name`].
pub fn integer() -> Parser {
    sequence(vec![n_or_more(1, digit()).keep(), termination().backtrack()])
        .map_keeps(|kept| {
            let digits = kept.list()?[0].list()?;
            let mut out = String::new();
            for c in digits {
                out.push(c.char()?);
            }
            Some(Node::Int(out.parse().ok()?))
        })
}

/// Syntactically a name, semantically a logic variable.
pub fn variable() -> Parser {
    name().map(|node| Some(Node::Value(Value::Variable(node.text()?.to_owned()))))
}

/// A constraint value: string, integer or variable, in that order.
fn scalar() -> Parser {
    one_of(vec![
        string().map(|node| Some(Node::Value(Value::String(node.text()?.to_owned())))),
        integer().map(|node| Some(Node::Value(Value::Integer(node.int()?)))),
        variable(),
    ])
}

/// `#name`, populating the `tag` pseudo-label.
fn tag_entry() -> Parser {
    sequence(vec![ch('#'), name().keep()]).map_keeps(|kept| {
        let tag = kept.list()?[0].text()?;
        Some(Node::List(vec![
            Node::Text(String::from("tag")),
            Node::Value(Value::String(tag.to_owned())),
        ]))
    })
}

/// `name: value`.
fn pair_entry() -> Parser {
    sequence(vec![name().keep(), blank(), ch(':'), blank(), scalar().keep()]).map_keeps(|kept| {
        let parts = kept.list()?;
        Some(Node::List(vec![parts[0].clone(), parts[1].clone()]))
    })
}

fn entry() -> Parser {
    one_of(vec![tag_entry(), pair_entry()])
}

/// `[` + optional whitespace + `]`.
pub fn empty_record() -> Parser {
    sequence(vec![ch('['), blank(), ch(']')]).map(|_| Some(Node::Record(Record::new())))
}

/// A bracketed list of tag markers and label/value pairs separated by
/// whitespace. Duplicate labels: last occurrence wins.
pub fn non_empty_record() -> Parser {
    sequence(vec![
        ch('['),
        n_or_more(
            1,
            sequence(vec![blank(), entry().keep()]).map_keeps(|kept| Some(kept.list()?[0].clone())),
        )
        .keep(),
        blank(),
        ch(']'),
    ])
    .map_keeps(|kept| {
        let entries = kept.list()?[0].list()?;
        let mut record = Record::new();
        for e in entries {
            let pair = e.list()?;
            record.set(pair[0].text()?.to_owned(), pair[1].value()?.clone());
        }
        Some(Node::Record(record))
    })
}

pub fn record() -> Parser {
    one_of(vec![empty_record(), non_empty_record()])
}

/// `@name` right after a block keyword.
fn context() -> Parser {
    sequence(vec![ch('@'), name().keep()]).map_keeps(|kept| Some(kept.list()?[0].clone()))
}

/// One or more records, each preceded by optional whitespace.
fn records() -> Parser {
    n_or_more(
        1,
        sequence(vec![blank(), non_empty_record().keep()])
            .map_keeps(|kept| Some(kept.list()?[0].clone())),
    )
}

fn block_from(context_node: &Node, steps_node: &Node) -> Option<Block> {
    let context = match context_node {
        Node::Null => None,
        node => Some(node.text()?.to_owned()),
    };
    let mut steps = Vec::new();
    for step in steps_node.list()? {
        steps.push(step.record()?.clone());
    }
    Some(Block { context, steps })
}

/// `commit [@ctx]: records` — a full query on its own, and the commit tail
/// of a conditional query.
fn commit_tail() -> Parser {
    sequence(vec![
        blank(),
        word("commit"),
        blank(),
        optional(context()).keep(),
        blank(),
        ch(':'),
        records().keep(),
    ])
    .map_keeps(|kept| {
        let parts = kept.list()?;
        Some(Node::Query(Query {
            search: Block::default(),
            bind: Block::default(),
            commit: block_from(&parts[0], &parts[1])?,
        }))
    })
}

/// `bind [@ctx]: records` — only valid as the tail of a conditional query.
fn bind_tail() -> Parser {
    sequence(vec![
        blank(),
        word("bind"),
        blank(),
        optional(context()).keep(),
        blank(),
        ch(':'),
        records().keep(),
    ])
    .map_keeps(|kept| {
        let parts = kept.list()?;
        Some(Node::Query(Query {
            search: Block::default(),
            bind: block_from(&parts[0], &parts[1])?,
            commit: Block::default(),
        }))
    })
}

fn conditional() -> Parser {
    sequence(vec![
        blank(),
        word("search"),
        blank(),
        optional(context()).keep(),
        blank(),
        ch(':'),
        records().keep(),
        one_of(vec![commit_tail(), bind_tail()]).keep(),
    ])
    .map_keeps(|kept| {
        let parts = kept.list()?;
        let tail = parts[2].query()?;
        Some(Node::Query(Query {
            search: block_from(&parts[0], &parts[1])?,
            bind: tail.bind.clone(),
            commit: tail.commit.clone(),
        }))
    })
}

/// A single query: an unconditional commit, or a search followed by a
/// commit or bind. A bind with no preceding search does not parse.
pub fn query() -> Parser {
    one_of(vec![commit_tail(), conditional()])
}

/// Parse a whole program: queries applied repeatedly until the input is
/// exhausted. The first sub-failure fails the program, reported with the
/// offending line and the expectation at the deepest point reached.
pub fn parse_program(source: &str) -> Result<Vec<Query>> {
    let mut rest = source.trim();
    let mut queries = Vec::new();
    if rest.is_empty() {
        return Ok(queries);
    }
    let parser = query();
    while !rest.is_empty() {
        match parser.run(rest) {
            Parsed::Success {
                value,
                rest: remaining,
                ..
            } => {
                let query = value.query().cloned().ok_or_else(|| {
                    GloggError::Invariant(String::from("query parser produced a non-query node"))
                })?;
                queries.push(query);
                rest = remaining;
            }
            Parsed::Failure { expected, rest: at } => {
                return Err(GloggError::Parse {
                    expected,
                    line: at.lines().next().unwrap_or("").to_owned(),
                });
            }
        }
    }
    Ok(queries)
}

//! The query AST produced by parsing and consumed by the compiler and the
//! durable store.
//!
//! A [`Query`] holds three optional blocks (search, bind, commit), each a
//! [`Block`] pairing an optional routing context with an ordered list of
//! [`Record`] steps. The `Display` implementations regenerate source text
//! that parses back to a structurally equal AST, which is what the store
//! relies on when a program is edited.

use std::fmt;

/// A constraint value inside a record: a literal or a logic variable.
///
/// A variable refers to the same underlying value everywhere it appears
/// within one query. It is bound at a search site and resolved wherever it
/// is used downstream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    String(String),
    Integer(i64),
    Variable(String),
}

impl Value {
    /// The kind tag used by the durable store.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::Integer(_) => "integer",
            Value::Variable(_) => "variable",
        }
    }

}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "\"{}\"", s),
            Value::Integer(n) => write!(f, "{}", n),
            Value::Variable(v) => write!(f, "{}", v),
        }
    }
}

/// An ordered set of label/value pairs. The pseudo-label `tag` is populated
/// when the record begins with `#name`. Labels are unique; writing a label
/// twice keeps its original position and replaces the value.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a label. Last write wins, in place.
    pub fn set(&mut self, label: String, value: Value) {
        match self.fields.iter_mut().find(|(l, _)| *l == label) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((label, value)),
        }
    }

    pub fn get(&self, label: &str) -> Option<&Value> {
        self.fields.iter().find(|(l, _)| l == label).map(|(_, v)| v)
    }

    pub fn fields(&self) -> &[(String, Value)] {
        &self.fields
    }

    pub fn tag(&self) -> Option<&str> {
        match self.get("tag") {
            Some(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.fields.is_empty() {
            return write!(f, "[]");
        }
        write!(f, "[")?;
        for (label, value) in &self.fields {
            if label == "tag" {
                if let Value::String(name) = value {
                    write!(f, " #{}", name)?;
                    continue;
                }
            }
            write!(f, " {}: {}", label, value)?;
        }
        write!(f, " ]")
    }
}

/// One block of a query: an optional routing context (`@name` after the
/// keyword) and the records that make up the block.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Block {
    pub context: Option<String>,
    pub steps: Vec<Record>,
}

impl Block {
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// A parsed query. Produced once by parsing, never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Query {
    pub search: Block,
    pub bind: Block,
    pub commit: Block,
}

impl Query {
    /// A query with no search and no bind lowers to a direct commit at
    /// program start; everything else becomes a change-triggered handler.
    pub fn is_unconditional(&self) -> bool {
        self.search.is_empty() && self.bind.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.search.is_empty() && self.bind.is_empty() && self.commit.is_empty()
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut blocks = Vec::new();
        for (keyword, block) in [
            ("search", &self.search),
            ("bind", &self.bind),
            ("commit", &self.commit),
        ] {
            if block.is_empty() {
                continue;
            }
            let mut text = match &block.context {
                Some(context) => format!("{} @{}:", keyword, context),
                None => format!("{}:", keyword),
            };
            for record in &block.steps {
                text.push_str("\n  ");
                text.push_str(&record.to_string());
            }
            blocks.push(text);
        }
        write!(f, "{}", blocks.join("\n\n"))
    }
}

/// Format a whole program the way `edit` writes it back to the draft file.
pub fn format_program(queries: &[Query]) -> String {
    let mut out = queries
        .iter()
        .filter(|q| !q.is_empty())
        .map(Query::to_string)
        .collect::<Vec<_>>()
        .join("\n\n");
    if !out.is_empty() {
        out.push('\n');
    }
    out
}

//! The fact store and the evaluator that compiled programs run against.
//!
//! A [`FactStore`] holds an ordered, append-only sequence of facts and a
//! list of change listeners. Committing filters out records structurally
//! equal to an existing fact; when anything new was appended the store
//! settles: listeners run in registration order, round after round, until a
//! round derives nothing new. The rounds replace the call-stack recursion
//! of a commit-inside-listener design while preserving the observable
//! behavior — same facts, same final state, one invocation per successful
//! commit. A rule set that keeps deriving structurally new facts never
//! settles; that is the program's bug, not the store's.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::BuildHasherDefault;
use std::rc::Rc;

use seahash::SeaHasher;
use serde::Serialize;
use tracing::debug;

use crate::codegen::{Cond, Expr, FieldInit, Program, Stmt, Target};
use crate::error::{GloggError, Result};

pub type StrHasher = BuildHasherDefault<SeaHasher>;

/// A literal attribute value carried by a fact.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Literal {
    Text(String),
    Number(i64),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Literal::Text(s) => write!(f, "\"{}\"", s),
            Literal::Number(n) => write!(f, "{}", n),
        }
    }
}

/// A tagged, labeled record held in the working set. Equality is
/// structural: same label set, same values.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct Fact {
    fields: BTreeMap<String, Literal>,
}

impl Fact {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, label: impl Into<String>, value: Literal) {
        self.fields.insert(label.into(), value);
    }

    pub fn get(&self, label: &str) -> Option<&Literal> {
        self.fields.get(label)
    }

    pub fn has(&self, label: &str) -> bool {
        self.fields.contains_key(label)
    }

    pub fn tag(&self) -> Option<&str> {
        match self.fields.get("tag") {
            Some(Literal::Text(s)) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Fact {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[")?;
        for (label, value) in &self.fields {
            if label == "tag" {
                if let Literal::Text(tag) = value {
                    write!(f, " #{}", tag)?;
                    continue;
                }
            }
            write!(f, " {}: {}", label, value)?;
        }
        write!(f, " ]")
    }
}

/// Where a batch of produced records is headed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Sink {
    Store,
    Named(String),
}

/// One batch of records produced by a listener, with its routing target.
#[derive(Clone, Debug, PartialEq)]
pub struct Emission {
    pub sink: Sink,
    pub records: Vec<Fact>,
}

/// A change listener: reads the full current fact set, returns what it
/// wants committed where. Listeners never mutate the store directly; the
/// settle loop applies their output.
pub type Listener = Rc<dyn Fn(&[Fact]) -> Vec<Emission>>;

/// An external sink that receives records routed to it by context and
/// performs side effects outside the fact store.
pub trait Integration {
    fn commit(&self, records: &[Fact]);
}

/// The built-in terminal sink: prints the `message` of `#log` records to
/// stdout and of `#error` records to stderr.
pub struct Terminal;

impl Integration for Terminal {
    fn commit(&self, records: &[Fact]) {
        for record in records {
            let Some(Literal::Text(message)) = record.get("message") else {
                continue;
            };
            match record.tag() {
                Some("log") => println!("{}", message),
                Some("error") => eprintln!("{}", message),
                _ => {}
            }
        }
    }
}

#[derive(Default)]
pub struct FactStore {
    facts: Vec<Fact>,
    listeners: Vec<Listener>,
    integrations: HashMap<String, Box<dyn Integration>, StrHasher>,
}

impl FactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn facts(&self) -> &[Fact] {
        &self.facts
    }

    pub fn on_change(&mut self, listener: Listener) {
        self.listeners.push(listener);
    }

    pub fn register_integration(&mut self, name: impl Into<String>, sink: Box<dyn Integration>) {
        self.integrations.insert(name.into(), sink);
    }

    /// Append records not already present (structural equality, existing
    /// facts keep their positions), then run listeners to a fixed point.
    /// When nothing new was appended, listeners do not run — this is what
    /// keeps re-derivation of unchanged facts from looping.
    pub fn commit(&mut self, records: Vec<Fact>) {
        if self.append(records) {
            self.settle();
        }
    }

    fn append(&mut self, records: Vec<Fact>) -> bool {
        let mut changed = false;
        for record in records {
            if !self.facts.contains(&record) {
                self.facts.push(record);
                changed = true;
            }
        }
        changed
    }

    fn settle(&mut self) {
        let mut rounds = 0u32;
        loop {
            rounds += 1;
            let mut changed = false;
            let listeners = self.listeners.clone();
            for listener in &listeners {
                let emissions = listener(&self.facts);
                for Emission { sink, records } in emissions {
                    match sink {
                        Sink::Store => changed |= self.append(records),
                        Sink::Named(name) => match self.integrations.get(&name) {
                            Some(integration) => integration.commit(&records),
                            // No such sink registered: fall back to the
                            // default store.
                            None => changed |= self.append(records),
                        },
                    }
                }
            }
            if !changed {
                break;
            }
        }
        debug!(rounds, facts = self.facts.len(), "store settled");
    }
}

// ------------- Program evaluation -------------

struct Env {
    rows: HashMap<String, Fact, StrHasher>,
    vars: HashMap<String, Literal, StrHasher>,
}

impl Env {
    fn new() -> Self {
        Env {
            rows: HashMap::default(),
            vars: HashMap::default(),
        }
    }

    fn eval(&self, expr: &Expr) -> Option<Literal> {
        match expr {
            Expr::Text(s) => Some(Literal::Text(s.clone())),
            Expr::Number(n) => Some(Literal::Number(*n)),
            Expr::Var(name) => self.vars.get(name).cloned(),
            Expr::Field { row, label } => self.rows.get(row)?.get(label).cloned(),
        }
    }

    fn holds(&self, cond: &Cond) -> bool {
        match cond {
            Cond::Eq(left, right) => match (self.eval(left), self.eval(right)) {
                (Some(l), Some(r)) => l == r,
                _ => false,
            },
            Cond::Has { row, label } => self.rows.get(row).is_some_and(|f| f.has(label)),
        }
    }

    fn record(&self, fields: &[FieldInit]) -> Option<Fact> {
        let mut fact = Fact::new();
        for init in fields {
            fact.set(init.label.clone(), self.eval(&init.value)?);
        }
        Some(fact)
    }
}

fn eval_block(stmts: &[Stmt], facts: &[Fact], env: &mut Env, out: &mut Vec<Emission>) {
    for stmt in stmts {
        match stmt {
            Stmt::Let { name, expr } => {
                // A missing attribute kills this branch of the join.
                let Some(value) = env.eval(expr) else {
                    return;
                };
                env.vars.insert(name.clone(), value);
            }
            Stmt::ForEach { row, body } => {
                for fact in facts {
                    env.rows.insert(row.clone(), fact.clone());
                    eval_block(body, facts, env, out);
                }
                env.rows.remove(row);
            }
            Stmt::Guard { all, body } => {
                if all.iter().all(|cond| env.holds(cond)) {
                    eval_block(body, facts, env, out);
                }
            }
            Stmt::Emit { target, records } => {
                let sink = match target {
                    Target::Store => Sink::Store,
                    Target::Integration(name) => Sink::Named(name.clone()),
                };
                let records = records
                    .iter()
                    .filter_map(|fields| env.record(fields))
                    .collect::<Vec<_>>();
                out.push(Emission { sink, records });
            }
            Stmt::OnChange { .. } => {
                // Handlers never nest; compile never emits this here.
            }
        }
    }
}

/// Execute a compiled program against a store: register one listener per
/// handler, then perform the initial commits and let the store settle.
pub fn run(program: &Program, store: &mut FactStore) -> Result<()> {
    for stmt in &program.body {
        match stmt {
            Stmt::OnChange { body } => {
                let body = Rc::new(body.clone());
                store.on_change(Rc::new(move |facts: &[Fact]| {
                    let mut out = Vec::new();
                    eval_block(&body, facts, &mut Env::new(), &mut out);
                    out
                }));
            }
            Stmt::Emit { target, records } => {
                let env = Env::new();
                let mut batch = Vec::new();
                for fields in records {
                    let fact = env.record(fields).ok_or_else(|| {
                        GloggError::Invariant(String::from(
                            "initial commit referenced an unbound name",
                        ))
                    })?;
                    batch.push(fact);
                }
                match target {
                    Target::Store => store.commit(batch),
                    Target::Integration(name) => match store.integrations.get(name) {
                        Some(integration) => integration.commit(&batch),
                        None => store.commit(batch),
                    },
                }
            }
            other => {
                return Err(GloggError::Invariant(format!(
                    "unexpected top-level statement: {:?}",
                    other
                )));
            }
        }
    }
    Ok(())
}

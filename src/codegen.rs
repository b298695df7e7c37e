//! Lowering parsed queries into an executable program.
//!
//! The compiler partitions queries into unconditional commits (issued once
//! at program start) and conditional queries (each a change-triggered
//! handler performing a nested-loop join over the full fact set). Output is
//! a versioned imperative IR — loops, guards, bindings, emissions — rather
//! than program text, so back-ends stay pluggable: the [`JavaScript`]
//! renderer turns a [`Program`] into a self-contained script, and
//! [`crate::runtime::run`] evaluates the same IR in-process.

use std::collections::HashSet;

use bimap::BiMap;
use tracing::debug;

use crate::ast::{Block, Query, Record, Value};
use crate::error::{GloggError, Result};
use crate::runtime::StrHasher;

/// Version of the emitted program shape. Renderers embed it in their
/// output header.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Expr {
    Text(String),
    Number(i64),
    /// A previously bound variable, by its normalized name.
    Var(String),
    /// An attribute of the fact currently under a row cursor.
    Field { row: String, label: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Cond {
    Eq(Expr, Expr),
    /// The cursor's fact carries the label at all. Emitted for fresh
    /// variable binding sites, which add no equality constraint.
    Has { row: String, label: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldInit {
    pub label: String,
    pub value: Expr,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Target {
    Store,
    Integration(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Stmt {
    /// Register a change handler; the body runs once per successful commit.
    OnChange { body: Vec<Stmt> },
    /// Iterate the full current fact set under a row cursor.
    ForEach { row: String, body: Vec<Stmt> },
    /// Run the body only when every condition holds.
    Guard { all: Vec<Cond>, body: Vec<Stmt> },
    /// Bind a normalized variable name to an expression.
    Let { name: String, expr: Expr },
    /// Commit records to the default store or a named integration.
    Emit {
        target: Target,
        records: Vec<Vec<FieldInit>>,
    },
}

/// A registered integration: a context name and the module the generated
/// program imports for it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntegrationSpec {
    pub context: String,
    pub import: String,
}

/// A compiled program: change handlers first, then the initial commits.
#[derive(Clone, Debug, PartialEq)]
pub struct Program {
    pub version: u32,
    /// The integrations actually referenced by some emission, in first-use
    /// order.
    pub integrations: Vec<IntegrationSpec>,
    pub body: Vec<Stmt>,
}

/// Normalize a source name into identifier form: hyphens (and anything
/// else outside letters and digits) become underscores.
pub(crate) fn identifier(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect()
}

/// Tracks which source variables are bound so far and what each one is
/// called in the emitted program. The bidirectional map keeps
/// normalization consistent between binding and use, and the `used` set
/// (seeded with the row cursor names) steers collisions away.
struct Bindings {
    names: BiMap<String, String>,
    used: HashSet<String, StrHasher>,
}

impl Bindings {
    fn new(rows: &[String]) -> Self {
        let mut used = HashSet::default();
        for row in rows {
            used.insert(row.clone());
        }
        Bindings {
            names: BiMap::new(),
            used,
        }
    }

    fn emitted(&self, source: &str) -> Option<&str> {
        self.names.get_by_left(source).map(String::as_str)
    }

    fn bind(&mut self, source: &str) -> String {
        if let Some(existing) = self.names.get_by_left(source) {
            return existing.clone();
        }
        let base = identifier(source);
        let mut candidate = base.clone();
        let mut suffix = 2;
        while self.used.contains(&candidate) {
            candidate = format!("{}_{}", base, suffix);
            suffix += 1;
        }
        self.used.insert(candidate.clone());
        self.names.insert(source.to_owned(), candidate.clone());
        candidate
    }
}

fn resolve(context: &Option<String>, integrations: &[IntegrationSpec]) -> Target {
    match context {
        Some(name) if integrations.iter().any(|i| i.context == *name) => {
            Target::Integration(name.clone())
        }
        _ => Target::Store,
    }
}

fn field(row: &str, label: &str) -> Expr {
    Expr::Field {
        row: row.to_owned(),
        label: label.to_owned(),
    }
}

struct Lowering<'a> {
    query: &'a Query,
    index: usize,
    rows: Vec<String>,
    integrations: &'a [IntegrationSpec],
}

impl<'a> Lowering<'a> {
    /// Emit the nesting level for search step `i`, or the innermost
    /// emissions once every step has a level.
    fn step(&self, i: usize, bindings: &mut Bindings) -> Result<Vec<Stmt>> {
        if i == self.rows.len() {
            return self.emits(bindings);
        }
        let row = &self.rows[i];
        let record = &self.query.search.steps[i];
        let mut conds = Vec::new();
        let mut fresh: Vec<(String, String)> = Vec::new();
        for (label, value) in record.fields() {
            match value {
                Value::String(s) => {
                    conds.push(Cond::Eq(field(row, label), Expr::Text(s.clone())));
                }
                Value::Integer(n) => {
                    conds.push(Cond::Eq(field(row, label), Expr::Number(*n)));
                }
                Value::Variable(name) => {
                    if let Some(emitted) = bindings.emitted(name) {
                        conds.push(Cond::Eq(field(row, label), Expr::Var(emitted.to_owned())));
                    } else if let Some((_, first)) =
                        fresh.iter().find(|(source, _)| source == name)
                    {
                        // The variable repeats within this step; equate the
                        // two attributes directly since the binding is not
                        // in scope until the guard has passed.
                        conds.push(Cond::Eq(field(row, label), field(row, first)));
                    } else {
                        conds.push(Cond::Has {
                            row: row.clone(),
                            label: label.clone(),
                        });
                        fresh.push((name.clone(), label.clone()));
                    }
                }
            }
        }
        let mut body = Vec::new();
        for (source, label) in &fresh {
            body.push(Stmt::Let {
                name: bindings.bind(source),
                expr: field(row, label),
            });
        }
        body.extend(self.step(i + 1, bindings)?);
        Ok(vec![Stmt::ForEach {
            row: row.clone(),
            body: vec![Stmt::Guard { all: conds, body }],
        }])
    }

    fn emits(&self, bindings: &Bindings) -> Result<Vec<Stmt>> {
        let mut stmts = Vec::new();
        for block in [&self.query.bind, &self.query.commit] {
            if block.is_empty() {
                continue;
            }
            stmts.push(Stmt::Emit {
                target: resolve(&block.context, self.integrations),
                records: self.lower_records(block, bindings)?,
            });
        }
        Ok(stmts)
    }

    fn lower_records(&self, block: &Block, bindings: &Bindings) -> Result<Vec<Vec<FieldInit>>> {
        let mut records = Vec::new();
        for step in &block.steps {
            records.push(lower_record(step, Some(bindings), self.index)?);
        }
        Ok(records)
    }
}

fn lower_record(
    record: &Record,
    bindings: Option<&Bindings>,
    query: usize,
) -> Result<Vec<FieldInit>> {
    let mut fields = Vec::new();
    for (label, value) in record.fields() {
        let value = match value {
            Value::String(s) => Expr::Text(s.clone()),
            Value::Integer(n) => Expr::Number(*n),
            Value::Variable(name) => match bindings {
                None => {
                    return Err(GloggError::VariableInUnconditional {
                        variable: name.clone(),
                        query,
                    });
                }
                Some(bound) => match bound.emitted(name) {
                    Some(emitted) => Expr::Var(emitted.to_owned()),
                    None => {
                        return Err(GloggError::UnboundVariable {
                            variable: name.clone(),
                            query,
                        });
                    }
                },
            },
        };
        fields.push(FieldInit {
            label: label.clone(),
            value,
        });
    }
    Ok(fields)
}

fn collect_integrations(stmts: &[Stmt], names: &mut Vec<String>) {
    for stmt in stmts {
        match stmt {
            Stmt::Emit {
                target: Target::Integration(name),
                ..
            } => {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
            Stmt::Emit { .. } | Stmt::Let { .. } => {}
            Stmt::OnChange { body } | Stmt::ForEach { body, .. } | Stmt::Guard { body, .. } => {
                collect_integrations(body, names);
            }
        }
    }
}

/// Lower queries into a [`Program`]. Handlers are registered before the
/// initial commits so the first commit triggers one evaluation pass.
pub fn compile(queries: &[Query], integrations: &[IntegrationSpec]) -> Result<Program> {
    let mut handlers = Vec::new();
    let mut initial: Vec<(Target, Vec<Vec<FieldInit>>)> = Vec::new();
    for (index, query) in queries.iter().enumerate() {
        if query.is_unconditional() {
            if query.commit.is_empty() {
                continue;
            }
            let target = resolve(&query.commit.context, integrations);
            let mut records = Vec::new();
            for step in &query.commit.steps {
                records.push(lower_record(step, None, index)?);
            }
            match initial.iter_mut().find(|(t, _)| *t == target) {
                Some((_, existing)) => existing.extend(records),
                None => initial.push((target, records)),
            }
        } else {
            let rows = (0..query.search.steps.len())
                .map(|i| format!("row{}", i))
                .collect::<Vec<_>>();
            let mut bindings = Bindings::new(&rows);
            let lowering = Lowering {
                query,
                index,
                rows,
                integrations,
            };
            handlers.push(Stmt::OnChange {
                body: lowering.step(0, &mut bindings)?,
            });
        }
    }
    let mut body = handlers;
    for (target, records) in initial {
        body.push(Stmt::Emit { target, records });
    }
    let mut referenced = Vec::new();
    collect_integrations(&body, &mut referenced);
    let integrations = referenced
        .into_iter()
        .filter_map(|name| integrations.iter().find(|i| i.context == name).cloned())
        .collect::<Vec<_>>();
    debug!(
        statements = body.len(),
        integrations = integrations.len(),
        "compiled program"
    );
    Ok(Program {
        version: FORMAT_VERSION,
        integrations,
        body,
    })
}

// ------------- Renderers -------------

/// A back-end that turns a compiled program into text for some target
/// language.
pub trait Renderer {
    fn render(&self, program: &Program) -> String;
}

/// Renders a self-contained JavaScript (ESM) program: the fact-store
/// prelude, one import per referenced integration, the handlers, then the
/// initial commits.
pub struct JavaScript;

/// The runtime every rendered program carries along.
const PRELUDE: &str = r#"class FactStore {
  constructor() {
    this.facts = [];
    this.listeners = [];
  }

  commit(records) {
    const fresh = records.filter((record) => !this.facts.some((fact) => equal(fact, record)));
    if (fresh.length === 0) {
      return;
    }
    this.facts = this.facts.concat(fresh);
    for (const listener of this.listeners) {
      listener.call(this);
    }
  }

  onChange(listener) {
    this.listeners.push(listener);
  }
}

function equal(left, right) {
  const leftKeys = Object.keys(left).sort();
  const rightKeys = Object.keys(right).sort();
  if (leftKeys.length !== rightKeys.length) {
    return false;
  }
  return leftKeys.every((key, i) => rightKeys[i] === key && left[key] === right[key]);
}"#;

struct Writer {
    out: String,
    depth: usize,
}

impl Writer {
    fn new() -> Self {
        Writer {
            out: String::new(),
            depth: 0,
        }
    }

    fn line(&mut self, text: &str) {
        for _ in 0..self.depth {
            self.out.push_str("  ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn blank(&mut self) {
        self.out.push('\n');
    }

    fn indent(&mut self) {
        self.depth += 1;
    }

    fn dedent(&mut self) {
        self.depth -= 1;
    }
}

/// JSON-escape a string literal (also used for bracketed field access).
fn quote(text: &str) -> String {
    serde_json::Value::String(text.to_owned()).to_string()
}

impl JavaScript {
    fn expr(e: &Expr) -> String {
        match e {
            Expr::Text(s) => quote(s),
            Expr::Number(n) => n.to_string(),
            Expr::Var(name) => name.clone(),
            Expr::Field { row, label } => format!("{}[{}]", row, quote(label)),
        }
    }

    fn cond(c: &Cond) -> String {
        match c {
            Cond::Eq(left, right) => format!("{} === {}", Self::expr(left), Self::expr(right)),
            Cond::Has { row, label } => format!("{}[{}] !== undefined", row, quote(label)),
        }
    }

    fn record(fields: &[FieldInit]) -> String {
        let inits = fields
            .iter()
            .map(|f| format!("{}: {}", quote(&f.label), Self::expr(&f.value)))
            .collect::<Vec<_>>()
            .join(", ");
        format!("{{ {} }}", inits)
    }

    fn target(target: &Target) -> String {
        match target {
            Target::Store => String::from("store"),
            Target::Integration(name) => identifier(name),
        }
    }

    fn stmt(w: &mut Writer, stmt: &Stmt) {
        match stmt {
            Stmt::OnChange { body } => {
                w.line("store.onChange(function () {");
                w.indent();
                for s in body {
                    Self::stmt(w, s);
                }
                w.dedent();
                w.line("});");
                w.blank();
            }
            Stmt::ForEach { row, body } => {
                w.line(&format!("for (const {} of this.facts) {{", row));
                w.indent();
                for s in body {
                    Self::stmt(w, s);
                }
                w.dedent();
                w.line("}");
            }
            Stmt::Guard { all, body } => {
                let conds = if all.is_empty() {
                    String::from("true")
                } else {
                    all.iter().map(Self::cond).collect::<Vec<_>>().join(" && ")
                };
                w.line(&format!("if ({}) {{", conds));
                w.indent();
                for s in body {
                    Self::stmt(w, s);
                }
                w.dedent();
                w.line("}");
            }
            Stmt::Let { name, expr } => {
                w.line(&format!("const {} = {};", name, Self::expr(expr)));
            }
            Stmt::Emit { target, records } => {
                let target = Self::target(target);
                if records.len() == 1 {
                    w.line(&format!("{}.commit([{}]);", target, Self::record(&records[0])));
                } else {
                    w.line(&format!("{}.commit([", target));
                    w.indent();
                    for record in records {
                        w.line(&format!("{},", Self::record(record)));
                    }
                    w.dedent();
                    w.line("]);");
                }
            }
        }
    }
}

impl Renderer for JavaScript {
    fn render(&self, program: &Program) -> String {
        let mut w = Writer::new();
        w.line(&format!(
            "// Generated by glogg make (format v{}). Do not edit.",
            program.version
        ));
        for spec in &program.integrations {
            w.line(&format!(
                "import * as {} from {};",
                identifier(&spec.context),
                quote(&spec.import)
            ));
        }
        w.blank();
        for line in PRELUDE.lines() {
            w.line(line);
        }
        w.blank();
        w.line("const store = new FactStore();");
        w.blank();
        for stmt in &program.body {
            Self::stmt(&mut w, stmt);
        }
        w.out
    }
}

//! SQLite persistence for parsed queries and the integration registry.
//!
//! Facts are never persisted — only the program itself: per query its
//! search/bind/commit blocks, each block's optional context, its clauses in
//! source order and each clause's label/value/kind constraints. Saving then
//! loading reproduces an equal AST, and loading regenerates source text
//! that parses back to the same queries, which is what `edit` builds on.

use rusqlite::{Connection, OptionalExtension, Transaction, params};
use tracing::info;

use crate::ast::{Block, Query, Record, Value};
use crate::codegen::IntegrationSpec;
use crate::error::{GloggError, Result};
use crate::grammar;

// ------------- Persistence -------------
pub struct Persistor {
    db: Connection,
}

impl Persistor {
    pub fn new(db: Connection) -> Result<Persistor> {
        db.execute_batch(
            "
            create table if not exists query (
                id integer primary key
            );
            create table if not exists search (
                id integer primary key,
                query_id integer not null references query(id) on delete cascade,
                context text
            );
            create table if not exists bind (
                id integer primary key,
                query_id integer not null references query(id) on delete cascade,
                context text
            );
            create table if not exists \"commit\" (
                id integer primary key,
                query_id integer not null references query(id) on delete cascade,
                context text
            );
            create table if not exists clause (
                id integer primary key,
                search_id integer references search(id) on delete cascade,
                bind_id integer references bind(id) on delete cascade,
                commit_id integer references \"commit\"(id) on delete cascade,
                ord integer not null
            );
            create table if not exists \"constraint\" (
                id integer primary key,
                clause_id integer not null references clause(id) on delete cascade,
                label text not null,
                value text not null,
                kind text not null
            );
            create table if not exists integration (
                id integer primary key,
                context text not null unique,
                import_name text not null
            );
            ",
        )?;
        Ok(Persistor { db })
    }

    /// Parse source text and save every query it contains, in order, in
    /// one transaction. Empty input is a no-op.
    pub fn save_source(&mut self, source: &str) -> Result<()> {
        let queries = grammar::parse_program(source)?;
        self.save_queries(&queries)
    }

    pub fn save_queries(&mut self, queries: &[Query]) -> Result<()> {
        let tx = self.db.transaction()?;
        let mut saved = 0usize;
        for query in queries {
            if query.is_empty() {
                continue;
            }
            tx.execute("insert into query default values", [])?;
            let query_id = tx.last_insert_rowid();
            save_block(&tx, query_id, &query.search, "search", "search_id")?;
            save_block(&tx, query_id, &query.bind, "bind", "bind_id")?;
            save_block(&tx, query_id, &query.commit, "\"commit\"", "commit_id")?;
            saved += 1;
        }
        tx.commit()?;
        info!(queries = saved, "saved program");
        Ok(())
    }

    /// Load every stored query, in original source order.
    pub fn load_queries(&self) -> Result<Vec<Query>> {
        let ids = {
            let mut stmt = self.db.prepare("select id from query order by id")?;
            let rows = stmt.query_map([], |row| row.get::<_, i64>(0))?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        };
        let mut queries = Vec::new();
        for query_id in ids {
            queries.push(Query {
                search: self.load_block(query_id, "search", "search_id")?,
                bind: self.load_block(query_id, "bind", "bind_id")?,
                commit: self.load_block(query_id, "\"commit\"", "commit_id")?,
            });
        }
        Ok(queries)
    }

    /// Regenerate the program's source text from the stored queries.
    pub fn load_source(&self) -> Result<String> {
        Ok(crate::ast::format_program(&self.load_queries()?))
    }

    fn load_block(&self, query_id: i64, table: &str, fk: &str) -> Result<Block> {
        let header = self
            .db
            .prepare(&format!(
                "select id, context from {} where query_id = ? order by id",
                table
            ))?
            .query_row(params![query_id], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, Option<String>>(1)?))
            })
            .optional()?;
        let Some((block_id, context)) = header else {
            return Ok(Block::default());
        };
        let clause_ids = {
            let mut stmt = self.db.prepare(&format!(
                "select id from clause where {} = ? order by ord",
                fk
            ))?;
            let rows = stmt.query_map(params![block_id], |row| row.get::<_, i64>(0))?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        };
        let mut steps = Vec::new();
        for clause_id in clause_ids {
            steps.push(self.load_record(clause_id)?);
        }
        Ok(Block { context, steps })
    }

    fn load_record(&self, clause_id: i64) -> Result<Record> {
        let mut stmt = self.db.prepare(
            "select label, value, kind from \"constraint\" where clause_id = ? order by id",
        )?;
        let rows = stmt.query_map(params![clause_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;
        let mut record = Record::new();
        for row in rows {
            let (label, value, kind) = row?;
            let value = match kind.as_str() {
                "string" => Value::String(value),
                "variable" => Value::Variable(value),
                "integer" => Value::Integer(value.parse().map_err(|_| {
                    GloggError::DataCorruption {
                        message: format!("stored integer '{}' does not parse", value),
                    }
                })?),
                other => {
                    return Err(GloggError::DataCorruption {
                        message: format!("unknown constraint kind '{}'", other),
                    });
                }
            };
            record.set(label, value);
        }
        Ok(record)
    }

    pub fn add_integration(&mut self, context: &str, import_name: &str) -> Result<()> {
        self.db.execute(
            "insert into integration (context, import_name) values (?, ?)",
            params![context, import_name],
        )?;
        Ok(())
    }

    pub fn integrations(&self) -> Result<Vec<IntegrationSpec>> {
        let mut stmt = self
            .db
            .prepare("select context, import_name from integration order by id")?;
        let rows = stmt.query_map([], |row| {
            Ok(IntegrationSpec {
                context: row.get(0)?,
                import: row.get(1)?,
            })
        })?;
        let mut specs = Vec::new();
        for row in rows {
            specs.push(row?);
        }
        Ok(specs)
    }
}

fn save_block(
    tx: &Transaction,
    query_id: i64,
    block: &Block,
    table: &str,
    fk: &str,
) -> Result<()> {
    if block.is_empty() {
        return Ok(());
    }
    tx.execute(
        &format!("insert into {} (query_id, context) values (?, ?)", table),
        params![query_id, block.context],
    )?;
    let block_id = tx.last_insert_rowid();
    for (ord, record) in block.steps.iter().enumerate() {
        tx.execute(
            &format!("insert into clause ({}, ord) values (?, ?)", fk),
            params![block_id, ord as i64],
        )?;
        let clause_id = tx.last_insert_rowid();
        for (label, value) in record.fields() {
            let stored = match value {
                Value::String(s) => s.clone(),
                Value::Integer(n) => n.to_string(),
                Value::Variable(v) => v.clone(),
            };
            tx.execute(
                "insert into \"constraint\" (clause_id, label, value, kind) values (?, ?, ?, ?)",
                params![clause_id, label, stored, value.kind()],
            )?;
        }
    }
    Ok(())
}

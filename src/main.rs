//! The glogg command line: initialize a program database, edit its source,
//! compile it to JavaScript, or evaluate it in-process.

use std::fs;
use std::io::Read;
use std::path::Path;
use std::process::Command;

use rusqlite::Connection;
use serde::Deserialize;
use tracing::{info, warn};

use glogg::codegen::{self, JavaScript, Renderer};
use glogg::error::{GloggError, Result};
use glogg::persist::Persistor;
use glogg::runtime::{self, FactStore, Terminal};

/// The import the built-in terminal sink is registered under by `init`.
const TERMINAL_IMPORT: &str = "glogg/terminal";

#[derive(Debug, Deserialize)]
struct Settings {
    database: String,
    output: String,
    draft: String,
    editor: String,
}

fn settings() -> Result<Settings> {
    let editor = std::env::var("EDITOR").unwrap_or_else(|_| String::from("vi"));
    let settings = config::Config::builder()
        .set_default("database", "app.glogg.db")?
        .set_default("output", "app.js")?
        .set_default("draft", "draft.glogg")?
        .set_default("editor", editor)?
        .add_source(config::File::with_name("glogg").required(false))
        .add_source(config::Environment::with_prefix("GLOGG"))
        .build()?
        .try_deserialize::<Settings>()?;
    Ok(settings)
}

fn open_existing(settings: &Settings) -> Result<Persistor> {
    if !Path::new(&settings.database).exists() {
        return Err(GloggError::Config(format!(
            "no database at '{}'; run `glogg init` first",
            settings.database
        )));
    }
    Persistor::new(Connection::open(&settings.database)?)
}

fn init(settings: &Settings) -> Result<()> {
    let mut persistor = Persistor::new(Connection::open(&settings.database)?)?;
    if !persistor
        .integrations()?
        .iter()
        .any(|spec| spec.context == "stdio")
    {
        persistor.add_integration("stdio", TERMINAL_IMPORT)?;
    }
    info!(database = %settings.database, "initialized");
    Ok(())
}

fn edit(settings: &Settings, from_stdin: bool) -> Result<()> {
    if from_stdin {
        let mut source = String::new();
        std::io::stdin().read_to_string(&mut source)?;
        let mut persistor = open_existing(settings)?;
        persistor.save_source(&source)?;
        return Ok(());
    }

    let persistor = open_existing(settings)?;
    let existing = persistor.load_source()?;
    fs::write(&settings.draft, &existing)?;
    let status = Command::new(&settings.editor).arg(&settings.draft).status()?;
    if !status.success() {
        fs::remove_file(&settings.draft)?;
        return Err(GloggError::Config(format!(
            "editor '{}' exited with failure",
            settings.editor
        )));
    }
    let written = fs::read_to_string(&settings.draft)?;

    if written.trim() != existing.trim() {
        // Rebuild a fresh store from the edited source, carrying the
        // integration registry over, then swap it in.
        let tmp = format!("{}.tmp", settings.database);
        let rebuilt = (|| -> Result<()> {
            let mut fresh = Persistor::new(Connection::open(&tmp)?)?;
            fresh.save_source(&written)?;
            for spec in persistor.integrations()? {
                fresh.add_integration(&spec.context, &spec.import)?;
            }
            Ok(())
        })();
        if let Err(e) = rebuilt {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }
        drop(persistor);
        fs::remove_file(&settings.database)?;
        fs::rename(&tmp, &settings.database)?;
    }

    fs::remove_file(&settings.draft)?;
    Ok(())
}

fn make(settings: &Settings) -> Result<()> {
    let persistor = open_existing(settings)?;
    let queries = persistor.load_queries()?;
    let integrations = persistor.integrations()?;
    let program = codegen::compile(&queries, &integrations)?;
    fs::write(&settings.output, JavaScript.render(&program))?;
    info!(output = %settings.output, queries = queries.len(), "compiled");
    Ok(())
}

fn run_in_process(settings: &Settings) -> Result<()> {
    let persistor = open_existing(settings)?;
    let queries = persistor.load_queries()?;
    let integrations = persistor.integrations()?;
    let program = codegen::compile(&queries, &integrations)?;
    let mut store = FactStore::new();
    for spec in &integrations {
        if spec.import != TERMINAL_IMPORT {
            warn!(context = %spec.context, import = %spec.import,
                "only the terminal integration is built in; using it");
        }
        store.register_integration(spec.context.clone(), Box::new(Terminal));
    }
    runtime::run(&program, &mut store)?;
    info!(facts = store.facts().len(), "settled");
    Ok(())
}

fn usage() {
    eprintln!("usage: glogg <command>");
    eprintln!();
    eprintln!("  init                          create the program database");
    eprintln!("  edit [--from=stdin]           edit the stored program");
    eprintln!("  make                          compile to JavaScript");
    eprintln!("  run                           evaluate in-process");
    eprintln!("  integration add <ctx> <mod>   register an integration");
}

fn dispatch() -> Result<()> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let settings = settings()?;
    match args.first().map(String::as_str) {
        Some("init") => init(&settings),
        Some("edit") => edit(&settings, args.iter().any(|a| a == "--from=stdin")),
        Some("make") => make(&settings),
        Some("run") => run_in_process(&settings),
        Some("integration") => match (args.get(1).map(String::as_str), args.get(2), args.get(3)) {
            (Some("add"), Some(context), Some(import)) => {
                let mut persistor = open_existing(&settings)?;
                persistor.add_integration(context, import)
            }
            _ => {
                usage();
                Ok(())
            }
        },
        _ => {
            usage();
            Ok(())
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
    if let Err(e) = dispatch() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

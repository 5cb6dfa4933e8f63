use std::path::Path;

use anyhow::Context;
use colored::Colorize;
use nxdb::{Database, Item, NxdbConfig, Query, Sequence};
use tracing::debug;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;
    match cli.command {
        Command::Query(args) => cmd_query(args, config, &cli.format),
        Command::Config(_) => cmd_config(&config),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<NxdbConfig> {
    match path {
        Some(path) => NxdbConfig::load(path).with_context(|| format!("loading {}", path.display())),
        None => Ok(NxdbConfig::default()),
    }
}

fn cmd_query(args: QueryArgs, config: NxdbConfig, format: &OutputFormat) -> anyhow::Result<()> {
    let db = Database::in_memory("root", config);
    let query = build_query(&db, &args)?;

    match format {
        OutputFormat::Text => {
            let mut count = 0usize;
            for item in db.evaluate(&query)? {
                println!("{}", render(&item?));
                count += 1;
            }
            println!("{}", format!("{count} item(s)").dimmed());
        }
        OutputFormat::Json => {
            let results = db.get_list(&query)?;
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
    }
    Ok(())
}

fn build_query(db: &Database, args: &QueryArgs) -> anyhow::Result<Query> {
    let mut query = db.query(&args.expression)?;
    for (name, value) in &args.vars {
        let item = Item::infer(value).with_context(|| format!("variable ${name}"))?;
        query.set_variable(name, item)?;
    }
    for (name, values) in &args.collections {
        let sequence = parse_list(values).with_context(|| format!("collection {name:?}"))?;
        debug!(collection = %name, items = sequence.len(), "bound collection");
        query.set_collection(name, sequence);
    }
    if let Some(context) = &args.context {
        query.set_initial_context(parse_list(context).context("initial context")?);
    }
    Ok(query)
}

/// Comma-separated values, each inferred independently. Blank entries are
/// skipped.
fn parse_list(values: &str) -> anyhow::Result<Sequence> {
    values
        .split(',')
        .filter(|v| !v.trim().is_empty())
        .map(|v| Item::infer(v).map_err(anyhow::Error::from))
        .collect()
}

fn render(item: &Item) -> String {
    match item {
        Item::Integer(_) | Item::Double(_) => item.to_string().cyan().to_string(),
        Item::Boolean(_) => item.to_string().yellow().to_string(),
        Item::String(s) => s.clone(),
        Item::Node(id) => id.to_string().green().to_string(),
    }
}

fn cmd_config(config: &NxdbConfig) -> anyhow::Result<()> {
    print!("{}", config.to_toml()?);
    Ok(())
}

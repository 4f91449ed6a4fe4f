//! Query command - cached reads against backing-store tables.

use std::sync::Arc;

use anyhow::{Result, bail};
use boilerbrain_query::{CachedTable, ExecutorConfig, MetricsSnapshot, QueryExecutor};
use boilerbrain_types::Filter;
use clap::{Args, Subcommand};
use console::Style;
use serde_json::Value;

use super::Context;

/// Arguments for the query command.
#[derive(Args, Debug)]
pub struct QueryArgs {
    #[command(subcommand)]
    pub command: QueryCommand,
}

#[derive(Subcommand, Debug)]
pub enum QueryCommand {
    /// Fetch one record by key
    Get {
        /// Table name
        table: String,

        /// Record key
        key: String,
    },

    /// List records, optionally filtered by field equality
    List {
        /// Table name
        table: String,

        /// Filter clause `field=value` (repeatable; value parsed as JSON if it can be)
        #[arg(long = "where", value_name = "FIELD=VALUE")]
        clauses: Vec<String>,
    },
}

/// Run the query command.
pub async fn run(args: QueryArgs, ctx: &Context) -> Result<()> {
    let backing = ctx.open_backing()?;
    let executor = Arc::new(QueryExecutor::new(ExecutorConfig::from_provider(
        &ctx.config().query(),
    )));

    match args.command {
        QueryCommand::Get { table, key } => {
            let table = CachedTable::new(table, backing, executor.clone());
            match table.find_by_id(&key).await? {
                Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
                None => {
                    if ctx.json_output {
                        println!("null");
                    } else {
                        println!("{}", Style::new().dim().apply_to("No record found"));
                    }
                }
            }
        }
        QueryCommand::List { table, clauses } => {
            let mut filter = Filter::new();
            for clause in &clauses {
                let (field, value) = parse_clause(clause)?;
                filter = filter.eq(field, value);
            }

            let table = CachedTable::new(table, backing, executor.clone());
            let records = table.find_all(&filter).await?;
            if ctx.json_output {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else {
                for record in &records {
                    println!("{record}");
                }
                println!(
                    "{}",
                    Style::new()
                        .dim()
                        .apply_to(format!("{} record(s)", records.len()))
                );
            }
        }
    }

    if ctx.verbose {
        print_metrics(&executor.metrics().snapshot(), ctx)?;
    }
    Ok(())
}

/// Split `field=value`, reading the value as JSON when it parses and as a
/// plain string otherwise.
fn parse_clause(clause: &str) -> Result<(String, Value)> {
    let Some((field, raw)) = clause.split_once('=') else {
        bail!("filter clause '{clause}' is not of the form field=value");
    };
    let field = field.trim();
    if field.is_empty() {
        bail!("filter clause '{clause}' has an empty field name");
    }
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((field.to_string(), value))
}

fn print_metrics(metrics: &MetricsSnapshot, ctx: &Context) -> Result<()> {
    if ctx.json_output {
        eprintln!("{}", serde_json::to_string(metrics)?);
        return Ok(());
    }
    let avg = metrics
        .avg_latency_ms
        .map_or_else(|| "-".to_string(), |ms| format!("{ms:.1}ms"));
    eprintln!(
        "{}",
        Style::new().dim().apply_to(format!(
            "queries {}  hits {}  misses {}  errors {}  slow {}  avg {}",
            metrics.total_queries,
            metrics.cache_hits,
            metrics.cache_misses,
            metrics.errors,
            metrics.slow_queries,
            avg,
        ))
    );
    Ok(())
}

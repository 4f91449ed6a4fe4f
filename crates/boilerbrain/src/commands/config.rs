//! Config command - configuration inspection.

use anyhow::Result;
use boilerbrain_config::SourceStatus;
use clap::{Args, Subcommand};

use super::Context;

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the merged configuration with defaults filled in
    Show,

    /// Show which config files were checked and loaded
    Which,
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => cmd_show(ctx),
        ConfigCommand::Which => cmd_which(ctx),
    }
}

fn cmd_show(ctx: &Context) -> Result<()> {
    let resolved = ctx.config().resolved();

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&resolved)?);
        return Ok(());
    }

    println!("# BoilerBrain Configuration\n");
    let sources = ctx.loaded.loaded_from();
    if sources.is_empty() {
        println!("# No config files loaded (using defaults)\n");
    } else {
        for source in &sources {
            println!("# from {}", source.display());
        }
        println!();
    }
    print!("{}", resolved.to_toml()?);
    Ok(())
}

fn cmd_which(ctx: &Context) -> Result<()> {
    if ctx.json_output {
        let sources: Vec<_> = ctx
            .loaded
            .sources
            .iter()
            .map(|s| {
                serde_json::json!({
                    "layer": s.layer.to_string(),
                    "path": s.path,
                    "loaded": s.is_loaded(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&sources)?);
        return Ok(());
    }

    println!("Config files (lowest precedence first):");
    for source in &ctx.loaded.sources {
        let marker = match &source.status {
            SourceStatus::Loaded => "loaded".to_string(),
            SourceStatus::Missing => "not found".to_string(),
            SourceStatus::Invalid(reason) => format!("ignored: {reason}"),
        };
        println!("  {:<8} {}  ({})", source.layer, source.path.display(), marker);
    }
    Ok(())
}

//! Session command - inspect and drive conversation sessions.

use anyhow::Result;
use boilerbrain_session::{
    BoilerInfo, Durability, Message, Sender, Session, SessionConfig, SessionStats, SessionStore,
    SessionUpdate,
};
use clap::{Args, Subcommand, ValueEnum};
use console::{Style, style};
use uuid::Uuid;

use super::Context;

/// Arguments for the session command.
#[derive(Args, Debug)]
pub struct SessionArgs {
    #[command(subcommand)]
    pub command: SessionCommand,
}

#[derive(Subcommand, Debug)]
pub enum SessionCommand {
    /// Create a session, generating an ID unless one is given
    New {
        /// Session ID
        #[arg(long)]
        id: Option<String>,

        /// Boiler manufacturer, if already known
        #[arg(long)]
        manufacturer: Option<String>,
    },

    /// Show a session (an unseen id shows an empty session)
    Show {
        /// Session ID
        id: String,
    },

    /// Append a message to a session's history
    Say {
        /// Session ID
        id: String,

        /// Who is speaking
        #[arg(short, long, value_enum, default_value = "user")]
        sender: SenderArg,

        /// Message text
        text: String,
    },

    /// Attach a summary note to a session
    Note {
        /// Session ID
        id: String,

        /// Summary text
        summary: String,
    },

    /// Record boiler facts for a session
    Boiler {
        /// Session ID
        id: String,

        #[arg(long)]
        manufacturer: Option<String>,

        #[arg(long)]
        model: Option<String>,

        /// Gas Council number
        #[arg(long)]
        gc_number: Option<String>,

        /// combi, system or standard
        #[arg(long)]
        system_type: Option<String>,

        /// Fault code seen (repeatable)
        #[arg(long = "fault-code")]
        fault_codes: Vec<String>,
    },

    /// Drop the cached copy and reload from the store
    Recover {
        /// Session ID
        id: String,
    },

    /// Delete a session from the cache and the store
    Delete {
        /// Session ID
        id: String,
    },

    /// Run one expiry sweep and the store maintenance hook
    Sweep,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum SenderArg {
    User,
    Assistant,
}

impl From<SenderArg> for Sender {
    fn from(arg: SenderArg) -> Self {
        match arg {
            SenderArg::User => Sender::User,
            SenderArg::Assistant => Sender::Assistant,
        }
    }
}

/// Run the session command.
pub async fn run(args: SessionArgs, ctx: &Context) -> Result<()> {
    let backing = ctx.open_backing()?;
    let store = SessionStore::new(SessionConfig::from_provider(&ctx.config().session()), backing);

    match args.command {
        SessionCommand::New { id, manufacturer } => {
            let id = id.unwrap_or_else(|| Uuid::new_v4().to_string());
            let mut init = SessionUpdate::new();
            if let Some(manufacturer) = manufacturer {
                init = init.with_boiler_info(BoilerInfo::default().with_manufacturer(manufacturer));
            }
            let session = store.create_session(&id, init, Durability::Sync).await;
            print_session(&session, ctx)?;
        }
        SessionCommand::Show { id } => {
            let session = store.get_session(&id).await;
            print_session(&session, ctx)?;
        }
        SessionCommand::Say { id, sender, text } => {
            let mut history = store.get_session(&id).await.history;
            history.push(Message::new(sender.into(), text));
            let session = store
                .update_session(&id, SessionUpdate::new().with_history(history), Durability::Sync)
                .await;
            print_session(&session, ctx)?;
        }
        SessionCommand::Note { id, summary } => {
            let session = store
                .add_summary(&id, &summary, Durability::BestEffort)
                .await;
            print_session(&session, ctx)?;
        }
        SessionCommand::Boiler {
            id,
            manufacturer,
            model,
            gc_number,
            system_type,
            fault_codes,
        } => {
            let info = BoilerInfo {
                manufacturer,
                model,
                gc_number,
                system_type,
                fault_codes,
                ..BoilerInfo::default()
            };
            let session = store
                .update_session(&id, SessionUpdate::new().with_boiler_info(info), Durability::Sync)
                .await;
            print_session(&session, ctx)?;
        }
        SessionCommand::Recover { id } => {
            let session = store.recover_session(&id).await;
            print_session(&session, ctx)?;
        }
        SessionCommand::Delete { id } => {
            let deleted = store.delete_session(&id).await;
            if ctx.json_output {
                println!("{}", serde_json::json!({ "id": id, "deleted": deleted }));
            } else if deleted {
                println!("{} Session deleted: {}", Style::new().green().apply_to("✓"), id);
            } else {
                eprintln!("{} could not delete {} from the store", Style::new().red().apply_to("Error:"), id);
            }
        }
        SessionCommand::Sweep => {
            let evicted = store.cleanup().await;
            if ctx.json_output {
                println!("{}", serde_json::json!({ "evicted": evicted }));
            } else {
                println!("Evicted {evicted} idle session(s) from cache");
            }
        }
    }

    // Lands any best-effort writes before the process exits.
    store.close().await;

    if ctx.verbose {
        print_stats(&store.stats(), ctx)?;
    }
    Ok(())
}

fn print_session(session: &Session, ctx: &Context) -> Result<()> {
    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(session)?);
        return Ok(());
    }

    let dim = Style::new().dim();
    println!("{} {}", style("Session").bold(), session.id);
    println!(
        "{}",
        dim.apply_to(format!(
            "created {}  updated {}",
            session.created_at.format("%Y-%m-%d %H:%M:%S"),
            session.updated_at.format("%Y-%m-%d %H:%M:%S"),
        ))
    );
    println!("{}", dim.apply_to("─".repeat(50)));

    let info = &session.boiler_info;
    let facts = [
        ("Manufacturer", info.manufacturer.as_deref()),
        ("Model", info.model.as_deref()),
        ("GC number", info.gc_number.as_deref()),
        ("System", info.system_type.as_deref()),
    ];
    for (label, value) in facts {
        if let Some(value) = value {
            println!("{:<14}{}", label, value);
        }
    }
    if !info.fault_codes.is_empty() {
        println!("{:<14}{}", "Fault codes", info.fault_codes.join(", "));
    }

    println!();
    if session.history.is_empty() {
        println!("{}", dim.apply_to("No messages"));
    }
    for message in &session.history {
        let who = match message.sender {
            Sender::User => Style::new().cyan().apply_to("user"),
            Sender::Assistant => Style::new().green().apply_to("assistant"),
        };
        println!("{:>10}  {}", who, message.text);
    }

    if !session.summaries.is_empty() {
        println!();
        println!("{}", style("Summaries").bold());
        for summary in &session.summaries {
            println!(
                "  {} {}",
                dim.apply_to(summary.timestamp.format("%Y-%m-%d %H:%M")),
                summary.summary
            );
        }
    }
    Ok(())
}

fn print_stats(stats: &SessionStats, ctx: &Context) -> Result<()> {
    if ctx.json_output {
        eprintln!("{}", serde_json::to_string(stats)?);
    } else {
        let dim = Style::new().dim();
        eprintln!(
            "{}",
            dim.apply_to(format!(
                "cache {}/{}  hits {}  misses {}  cold starts {}  read failures {}  persist failures {}",
                stats.size,
                stats.capacity,
                stats.cache_hits,
                stats.cache_misses,
                stats.cold_starts,
                stats.read_failures,
                stats.persist_failures,
            ))
        );
    }
    Ok(())
}

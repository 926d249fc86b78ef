use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "prism")]
#[command(about = "Diary client for the Prism mood-journal service")]
pub struct Cli {
    /// Run against local in-memory data instead of the server
    #[arg(long, global = true)]
    pub dev: bool,

    /// Base URL of the Prism API, overrides the config file
    #[arg(long, global = true, env = "PRISM_API_URL")]
    pub api_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Sign in as a guest
    Guest,
    /// Sign in with an access token issued by the web login
    Login {
        #[arg(long)]
        token: String,
    },
    /// Forget the stored session
    Logout,
    /// Show the signed-in user
    Whoami,
    /// List the diary entries of one month
    Month {
        #[arg(long)]
        year: Option<i32>,
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=12))]
        month: Option<u8>,
    },
    /// Show one entry in full
    Show { id: i64 },
    /// Write a new entry and render its picture
    Write {
        /// Entry date as YYYY-MM-DD, today when omitted
        #[arg(long)]
        date: Option<String>,
        /// Entry text, read from stdin when omitted
        content: Option<String>,
    },
    /// Re-run analysis and picture generation for an entry
    Regenerate { id: i64 },
    /// Delete an entry
    Delete { id: i64 },
    /// Admin statistics
    #[command(subcommand)]
    Stats(StatsCommand),
    /// Print config path and create default file if missing
    ConfigPath,
}

#[derive(Debug, Subcommand)]
pub enum StatsCommand {
    /// Most frequent keywords
    Keywords {
        #[arg(long)]
        year: Option<i32>,
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=12))]
        month: Option<u8>,
    },
    /// Average mood per month
    Mood {
        #[arg(long)]
        year: Option<i32>,
    },
}

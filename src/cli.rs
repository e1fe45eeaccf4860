use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "hr-survey-bot")]
#[command(author, version, about = "HR onboarding-survey platform: REST backend + Telegram survey bot", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the bot and the REST API
    Run {
        /// Use webhook mode instead of long polling
        #[arg(long)]
        webhook: bool,
    },

    /// Create the database schema and exit
    InitDb,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

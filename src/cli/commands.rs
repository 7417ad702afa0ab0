use clap::{Parser, Subcommand};

/// `replyguard` - decides when a WhatsApp message can be answered for you.
#[derive(Parser, Debug)]
#[command(name = "replyguard")]
#[command(author = "theonlyhennygod")]
#[command(version = "0.1.0")]
#[command(about = "Guarded WhatsApp auto-replies.", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Poll the bridge and handle incoming messages until Ctrl-C
    Run,

    /// Fetch and handle a single batch of new messages
    PollOnce,

    /// Show configuration, bridge readiness and store health
    Status,

    /// Manage the commitments replies are checked against
    Commitment {
        #[command(subcommand)]
        commitment_command: CommitmentCommands,
    },

    /// Tell the assistant something about your current situation
    Note {
        /// What you want the assistant to keep in mind
        text: String,
    },

    /// Answer the most recent message you were notified about
    Reply {
        /// Your answer, in your own words; it is rewritten before sending
        text: String,

        /// Only consider pending messages from this chat id
        #[arg(long)]
        chat: Option<String>,
    },

    /// Show recent dispatch decisions, one chat's conversation, or search messages
    History {
        /// Show the stored conversation for this chat id
        #[arg(long, conflicts_with = "search")]
        chat: Option<String>,

        /// Case-insensitive search over stored message text
        #[arg(long)]
        search: Option<String>,

        /// Maximum number of entries
        #[arg(short, long)]
        limit: Option<usize>,
    },
}

/// Commitment subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum CommitmentCommands {
    /// Record a commitment
    Add {
        /// Short description, e.g. "dentist"
        description: String,

        /// Start time, local (`2026-10-15 15:00`) or RFC 3339
        #[arg(long)]
        start: String,

        /// End time; defaults to start plus `--minutes`
        #[arg(long)]
        end: Option<String>,

        /// Duration in minutes when `--end` is omitted
        #[arg(long, default_value_t = 60)]
        minutes: i64,

        /// People involved (repeatable)
        #[arg(long = "with")]
        participants: Vec<String>,
    },
    /// List stored commitments
    List,
    /// Remove a commitment by id
    Remove {
        /// Commitment id as shown by `list`
        id: String,
    },
}

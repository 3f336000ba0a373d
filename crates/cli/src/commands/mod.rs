// CLI subcommand dispatch.

use clap::Subcommand;

pub mod conversation;
pub mod history;
pub mod init;
pub mod setup;
pub mod status;
pub mod sync;

#[derive(Subcommand)]
pub enum Command {
    /// Bind a vault to a remote index
    Init(init::InitArgs),
    /// Store the API key and global connection settings
    Setup(setup::SetupArgs),
    /// Reconcile the vault with its remote index
    Sync(sync::SyncArgs),
    /// Show per-document sync status without changing anything
    Status(status::StatusArgs),
    /// Print the history of a conversation
    History(history::HistoryArgs),
    /// Manage conversations
    Conversation(conversation::ConversationArgs),
}

pub fn run(cmd: Command) -> anyhow::Result<()> {
    match cmd {
        Command::Init(args) => init::run(args),
        Command::Setup(args) => setup::run(args),
        Command::Sync(args) => sync::run(args),
        Command::Status(args) => status::run(args),
        Command::History(args) => history::run(args),
        Command::Conversation(args) => conversation::run(args),
    }
}

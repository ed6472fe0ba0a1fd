use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "timeline",
    about = "Timeline — branchable snapshot history for editor documents",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// JSON document holding the history
    #[arg(short, long, global = true, default_value = "document.json")]
    pub file: PathBuf,

    /// TOML file overriding branch names, labels and document keys
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show HEAD and branch state
    Status(StatusArgs),
    /// Show snapshot history
    Log(LogArgs),
    /// Show one snapshot with its payload
    Show(ShowArgs),
    /// Record the document as a new snapshot
    Commit(CommitArgs),
    /// Move HEAD to a snapshot
    Checkout(CheckoutArgs),
    /// Compare a snapshot with the document's current fields
    Diff(DiffArgs),
    /// Change the note of a snapshot
    Rename(RenameArgs),
    /// Remove a snapshot
    Delete(DeleteArgs),
    /// List branches and their tips
    Branches(BranchesArgs),
    /// Import the legacy history list into the tree
    Migrate(MigrateArgs),
    /// Check the tree for broken links
    Verify(VerifyArgs),
}

#[derive(Args)]
pub struct StatusArgs {}

#[derive(Args)]
pub struct LogArgs {
    #[arg(short = 'n', long, default_value = "20")]
    pub limit: usize,
    /// Every snapshot, newest first, instead of HEAD's ancestry
    #[arg(long)]
    pub all: bool,
    #[arg(long)]
    pub oneline: bool,
}

#[derive(Args)]
pub struct ShowArgs {
    pub id: String,
}

#[derive(Args)]
pub struct CommitArgs {
    #[arg(short, long)]
    pub message: Option<String>,
    /// Inline JSON payload (defaults to the document's own fields)
    #[arg(long, conflicts_with = "payload_file")]
    pub payload: Option<String>,
    #[arg(long)]
    pub payload_file: Option<PathBuf>,
}

#[derive(Args)]
pub struct CheckoutArgs {
    pub id: String,
    /// Also copy the snapshot's fields back into the document
    #[arg(long)]
    pub restore: bool,
}

#[derive(Args)]
pub struct DiffArgs {
    pub id: String,
}

#[derive(Args)]
pub struct RenameArgs {
    pub id: String,
    pub note: String,
}

#[derive(Args)]
pub struct DeleteArgs {
    pub id: String,
}

#[derive(Args)]
pub struct BranchesArgs {}

#[derive(Args)]
pub struct MigrateArgs {}

#[derive(Args)]
pub struct VerifyArgs {}

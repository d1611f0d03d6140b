use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

use shoplist_core::BackendType;

#[derive(Parser, Debug)]
#[command(author, version, about = "Manage shopping lists from the terminal")]
pub struct Cli {
    /// Path to the database file (.yaml, .db, or :memory:)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Storage backend to use (yaml, sqlite, memory); inferred from the path by default
    #[arg(long, global = true, value_parser = parse_backend)]
    pub backend: Option<BackendType>,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

fn parse_backend(s: &str) -> Result<BackendType, String> {
    s.parse()
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Work with shopping lists
    #[command(subcommand)]
    List(ListCommand),

    /// Work with items on a list
    #[command(subcommand)]
    Item(ItemCommand),

    /// Database maintenance
    #[command(subcommand)]
    Db(DbCommand),
}

#[derive(Subcommand, Debug)]
pub enum ListCommand {
    /// Create a new list
    Add {
        /// Title of the list
        title: String,
    },

    /// Show all lists, newest first
    Ls,

    /// Show a list and its items
    Show {
        /// The list ID (UUID or unique prefix)
        id: String,
    },

    /// Change the title of a list
    Rename {
        /// The list ID (UUID or unique prefix)
        id: String,

        /// New title
        title: String,
    },

    /// Delete a list and all of its items
    Rm {
        /// The list ID (UUID or unique prefix)
        id: String,

        /// Skip confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum ItemCommand {
    /// Add an item to a list (prompts for fields when --label is omitted)
    Add {
        /// The list ID (UUID or unique prefix)
        #[arg(long)]
        list: String,

        /// Item label
        #[arg(long)]
        label: Option<String>,

        /// Secondary label, e.g. a quantity
        #[arg(long)]
        sub_label: Option<String>,

        /// Free-text note
        #[arg(long)]
        annotation: Option<String>,
    },

    /// Edit an item (prompts for fields when none are given)
    Edit {
        /// The item ID (UUID or unique prefix)
        id: String,

        #[arg(long)]
        label: Option<String>,

        #[arg(long)]
        sub_label: Option<String>,

        #[arg(long)]
        annotation: Option<String>,
    },

    /// Toggle an item between done and not done
    Done {
        /// The item ID (UUID or unique prefix)
        id: String,
    },

    /// Delete an item
    Rm {
        /// The item ID (UUID or unique prefix)
        id: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum DbCommand {
    /// Print the path and backend of the database in use
    Path,

    /// Print record counts
    Stats,

    /// Copy all data into another database (backend inferred from its extension)
    Migrate {
        /// Destination database file
        dest: PathBuf,
    },

    /// Export all data to a JSON file
    Export {
        /// Destination JSON file
        output: PathBuf,
    },

    /// Replace all data with the contents of a JSON file
    Import {
        /// Source JSON file
        input: PathBuf,

        /// Skip confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },
}

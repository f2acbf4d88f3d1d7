use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Quarterly roadmap planning with epics and user stories")]
pub struct Cli {
    /// Product to work on (horizon, pulse-sdg, alpharisk-studio)
    #[clap(long, short = 'p', global = true)]
    pub product: Option<String>,

    /// Timeline year (defaults to the configured year, then the current year)
    #[clap(long, global = true)]
    pub year: Option<i32>,

    /// Log debug output to stderr
    #[clap(long, short = 'v', global = true)]
    pub verbose: bool,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum EpicCommand {
    /// Add a new epic
    Add {
        /// Title of the epic
        #[clap(long)]
        title: Option<String>,

        /// Quarter (Q1, Q2, Q3, Q4)
        #[clap(long, short = 'q')]
        quarter: Option<String>,

        /// Sprint label
        #[clap(long)]
        sprint: Option<String>,

        /// Description of the epic
        #[clap(long)]
        description: Option<String>,

        /// Customer the epic is delivered for
        #[clap(long)]
        customer: Option<String>,

        /// Start date (YYYY-MM-DD)
        #[clap(long)]
        start: Option<String>,

        /// End date (YYYY-MM-DD)
        #[clap(long)]
        end: Option<String>,

        /// Module (Model, Pipeline, Containers, Release, Documentation, or custom)
        #[clap(long)]
        module: Option<String>,

        /// Use interactive mode (prompts)
        #[clap(long)]
        interactive: bool,
    },

    /// List epics of the product
    List {
        /// Only epics in this quarter
        #[clap(long, short = 'q')]
        quarter: Option<String>,
    },

    /// Show an epic with its stories
    Show {
        /// Epic UUID, UUID prefix or title
        id: String,
    },

    /// Edit an existing epic
    Edit {
        /// Epic UUID, UUID prefix or title
        id: String,

        #[clap(long)]
        title: Option<String>,

        #[clap(long, short = 'q')]
        quarter: Option<String>,

        #[clap(long)]
        sprint: Option<String>,

        #[clap(long)]
        description: Option<String>,

        /// Customer; pass an empty string to clear
        #[clap(long)]
        customer: Option<String>,

        /// Start date; pass an empty string to clear
        #[clap(long)]
        start: Option<String>,

        /// End date; pass an empty string to clear
        #[clap(long)]
        end: Option<String>,

        /// Module; pass an empty string to clear
        #[clap(long)]
        module: Option<String>,
    },

    /// Delete an epic and its stories
    Del {
        /// Epic UUID, UUID prefix or title
        id: String,

        /// Skip confirmation prompt
        #[clap(long, short = 'y')]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum StoryCommand {
    /// Add a user story to an epic
    Add {
        /// Epic UUID, UUID prefix or title
        epic: String,

        /// Title of the story
        #[clap(long)]
        title: Option<String>,

        /// Template to pre-fill from (feature, technical, documentation)
        #[clap(long)]
        template: Option<String>,

        /// "As a ..." persona
        #[clap(long)]
        as_a: Option<String>,

        /// "I want ..." capability
        #[clap(long)]
        i_want: Option<String>,

        /// "so that ..." benefit
        #[clap(long)]
        so_that: Option<String>,

        /// Story points
        #[clap(long)]
        points: Option<u32>,

        /// Priority (Must, Should, Could, Won't)
        #[clap(long)]
        priority: Option<String>,

        /// Use interactive mode (prompts)
        #[clap(long)]
        interactive: bool,
    },

    /// Change the status of a story
    Status {
        /// Epic UUID, UUID prefix or title
        epic: String,

        /// Story UUID, UUID prefix or title
        story: String,

        /// New status (Draft, Ready, "In Progress", Done)
        status: String,
    },

    /// Delete a story
    Del {
        /// Epic UUID, UUID prefix or title
        epic: String,

        /// Story UUID, UUID prefix or title
        story: String,

        /// Skip confirmation prompt
        #[clap(long, short = 'y')]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the products in the catalog
    Products,

    /// Select the default product
    Use {
        /// Product id; prompts when omitted
        product: Option<String>,

        /// Forget the default product
        #[clap(long)]
        clear: bool,
    },

    /// Manage epics
    #[clap(subcommand)]
    Epic(EpicCommand),

    /// Manage user stories
    #[clap(subcommand)]
    Story(StoryCommand),

    /// Import roadmap rows from a JSON array of header -> cell objects
    Import {
        /// Path to the rows file
        file: PathBuf,

        /// Map a field onto a column header, e.g. --map "epic=Epic Name"
        #[clap(long = "map")]
        mappings: Vec<String>,

        /// Prompt for columns that could not be mapped automatically
        #[clap(long)]
        interactive: bool,

        /// Show the epics that would be created without saving
        #[clap(long)]
        dry_run: bool,
    },

    /// Gantt chart of the product's epics
    #[clap(alias = "gantt")]
    Timeline {
        /// Show story bars under every epic
        #[clap(long, short = 'e')]
        expand: bool,
    },

    /// Gantt chart across all products
    Portfolio {
        /// Show every product's epics
        #[clap(long, short = 'e')]
        expand: bool,
    },

    /// Epics arranged by sprint
    Sprints,

    /// Epics grouped by quarter
    Quarters,

    /// Dashboard figures for the product
    Stats,

    /// Export stories for a project management tool
    Export {
        /// Format (jira, azure, trello, asana)
        #[clap(long, short = 'f')]
        format: String,

        /// Output file (defaults to the format's file name)
        #[clap(long, short = 'o')]
        output: Option<PathBuf>,

        /// Comma-separated epics to export (defaults to every epic with stories)
        #[clap(long)]
        epics: Option<String>,

        /// Leave out acceptance criteria
        #[clap(long)]
        no_acceptance_criteria: bool,

        /// Leave out definition of done
        #[clap(long)]
        no_definition_of_done: bool,

        /// Write to stdout instead of a file
        #[clap(long)]
        stdout: bool,
    },

    /// Draft user stories for epics with AI
    Generate {
        /// Comma-separated epics (defaults to epics without stories)
        #[clap(long)]
        epics: Option<String>,

        /// Extra instructions for the generator
        #[clap(long)]
        prompt: Option<String>,

        /// Save without asking
        #[clap(long, short = 'y')]
        yes: bool,
    },

    /// Ask the product assistant about the roadmap
    Chat {
        /// Single question; starts an interactive session when omitted
        message: Option<String>,
    },

    /// Show the active configuration
    Config,

    /// Delete all epics of the product
    Clear {
        /// Skip confirmation prompt
        #[clap(long, short = 'y')]
        yes: bool,
    },
}

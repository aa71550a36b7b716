use std::path::PathBuf;

use color_eyre::{Result, eyre::WrapErr};
use gridmate::config::Settings;

mod logging;
mod subcommands;
mod widgets;

use logging::LogConfig;
use subcommands::QueryArgs;

#[derive(clap::Parser)]
#[command(
    name = "gridmate",
    version,
    about = "Query, shape and export JSON record grids",
    long_about = None
)]
struct Cli {
    /// Increase output verbosity (-v, -vv, etc.)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path to config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Filter, sort and page a JSON array of records
    Query {
        /// JSON file holding an array of objects
        rows: PathBuf,

        #[command(flatten)]
        query: QueryArgs,

        /// Output in JSON format
        #[arg(short, long)]
        json: bool,
    },
    /// Write every row matching the query to a CSV file
    Export {
        /// JSON file holding an array of objects
        rows: PathBuf,

        /// Grid id used for saved column preferences (defaults to the file name)
        #[arg(short, long)]
        grid: Option<String>,

        /// JSON file with the grid's column presets
        #[arg(long)]
        presets: Option<PathBuf>,

        #[command(flatten)]
        query: QueryArgs,

        /// Directory to write the file to (defaults to the working directory)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// File name to write instead of `<grid>_<timestamp>.csv`
        #[arg(long)]
        filename: Option<String>,

        /// Write a header-only file when nothing matches
        #[arg(long)]
        allow_empty: bool,

        /// Fetch rows page by page through the paged export loop
        #[arg(long)]
        paged: bool,

        /// Abort a paged export above this many rows
        #[arg(long, requires = "paged")]
        max_rows: Option<usize>,

        /// Abort a paged export after this many pages
        #[arg(long, requires = "paged")]
        max_pages: Option<usize>,
    },
    /// Inspect or change the saved column layout of a grid
    Columns {
        /// Grid id the preferences belong to
        grid: String,

        /// JSON file with the grid's column presets
        #[arg(long, global = true)]
        presets: Option<PathBuf>,

        /// Derive presets from the keys of this JSON rows file
        #[arg(long, global = true)]
        rows: Option<PathBuf>,

        #[command(subcommand)]
        action: subcommands::columns::Action,
    },
    /// Browse rows in an interactive grid
    View {
        /// JSON file holding an array of objects
        rows: PathBuf,

        /// Grid id used for saved column preferences (defaults to the file name)
        #[arg(short, long)]
        grid: Option<String>,

        /// JSON file with the grid's column presets
        #[arg(long)]
        presets: Option<PathBuf>,

        #[command(flatten)]
        query: QueryArgs,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = <Cli as clap::Parser>::parse();
    let settings = Settings::load(cli.config.as_deref()).wrap_err("failed to load settings")?;

    let mut log_config = LogConfig::from_verbosity(cli.verbose);
    if matches!(cli.command, Commands::View { .. }) {
        // stderr belongs to the terminal UI
        log_config = log_config.with_file(settings.log_path());
    }
    logging::init(&log_config).wrap_err("failed to initialise logging")?;
    tracing::debug!(?settings, "Loaded settings");

    match cli.command {
        Commands::Query { rows, query, json } => {
            let options = subcommands::query::Options { rows, query, json };
            subcommands::query::command(&settings, options)
        }
        Commands::Export {
            rows,
            grid,
            presets,
            query,
            out,
            filename,
            allow_empty,
            paged,
            max_rows,
            max_pages,
        } => {
            let options = subcommands::export::Options {
                rows,
                grid,
                presets,
                query,
                out,
                filename,
                allow_empty,
                paged,
                max_rows,
                max_pages,
            };
            subcommands::export::command(&settings, options).await
        }
        Commands::Columns {
            grid,
            presets,
            rows,
            action,
        } => {
            let options = subcommands::columns::Options {
                grid,
                presets,
                rows,
                action,
            };
            subcommands::columns::command(&settings, options)
        }
        Commands::View {
            rows,
            grid,
            presets,
            query,
        } => {
            let options = subcommands::view::Options {
                rows,
                grid,
                presets,
                query,
            };
            subcommands::view::command(&settings, options).await
        }
    }
}

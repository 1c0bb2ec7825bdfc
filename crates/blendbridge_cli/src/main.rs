mod commands;
mod util;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "blendbridge", about = "Drive Blender's batch interface: split, convert and reassemble scene files")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Settings file holding the tool path and feature flags
    #[arg(long, global = true, default_value = "blendbridge.json")]
    settings: PathBuf,

    /// Override the configured tool executable for this invocation
    #[arg(long, global = true)]
    tool: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify the configured tool path (auto-detects when unset) and persist it
    Verify,
    /// Print the number of mesh objects in a native file
    Count { file: PathBuf },
    /// Read a native file: count, split, convert, report the produced nodes
    Read {
        file: PathBuf,
        /// Interchange format for the conversion
        #[arg(short, long)]
        format: Option<String>,
    },
    /// Reassemble source files into one combined native file
    Write {
        destination: PathBuf,
        /// Source files: native files, split fragments or foreign meshes
        #[arg(required = true)]
        sources: Vec<PathBuf>,
    },
    /// Open the file behind a selection of sources in the tool
    Open {
        #[arg(required = true)]
        sources: Vec<PathBuf>,
        /// Terminate other running tool instances first
        #[arg(long)]
        close_others: bool,
    },
    /// Watch native files and print classified change events
    Watch {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Verify => commands::cmd_verify(&cli.settings, cli.tool.as_deref()),
        Commands::Count { ref file } => {
            commands::cmd_count(&cli.settings, cli.tool.as_deref(), file)
        }
        Commands::Read {
            ref file,
            ref format,
        } => commands::cmd_read(&cli.settings, cli.tool.as_deref(), file, format.as_deref()),
        Commands::Write {
            ref destination,
            ref sources,
        } => commands::cmd_write(&cli.settings, cli.tool.as_deref(), destination, sources),
        Commands::Open {
            ref sources,
            close_others,
        } => commands::cmd_open(&cli.settings, cli.tool.as_deref(), sources, close_others),
        Commands::Watch { ref files } => {
            commands::cmd_watch(&cli.settings, cli.tool.as_deref(), files)
        }
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.user_message());
            ExitCode::FAILURE
        }
    }
}

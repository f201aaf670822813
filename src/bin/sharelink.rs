//! sharelink CLI - passcode-protected share links
//!
//! Seals a JSON document into a `<origin>/view/<project>#...` link and opens
//! such links again.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

use sharelink::ErrorKind;
use sharelink::file_ops::{self, OutputTarget};
use sharelink::passcode::{PasscodeReader, ReaderPasscodeReader, TerminalPasscodeReader};

#[derive(Parser)]
#[command(name = "sharelink")]
#[command(version)]
#[command(about = "Passcode-protected share links for JSON payloads.", long_about = None)]
struct Cli {
    /// Read passcode from stdin instead of from terminal
    #[arg(long, global = true)]
    passcode_stdin: bool,

    /// Log level (error, warn, info, debug, trace); RUST_LOG overrides it
    #[arg(long, global = true, default_value = "warn")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Seal a JSON file into a share link
    #[command(alias = "s")]
    Seal {
        /// Path to the JSON document to share
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Project the link opens in the viewer
        #[arg(short, long, value_name = "ID")]
        project: String,

        /// Origin the viewer is served from
        #[arg(long, env = "SHARELINK_ORIGIN", default_value = "http://localhost:3000")]
        origin: String,

        /// Path to write the link to (default: stdout)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Open a share link and print its JSON payload
    #[command(alias = "o")]
    Open {
        /// The share link
        #[arg(short, long, value_name = "URL")]
        url: String,

        /// Path to write the payload to (default: stdout)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Replace the payload behind a share link, while validating that the
    /// passcode is not accidentally changed.
    #[command(alias = "r")]
    Reseal {
        /// The existing share link
        #[arg(short, long, value_name = "URL")]
        url: String,

        /// Path to the new JSON document
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Path to write the new link to (default: stdout)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_level);

    let mut reader = get_passcode_reader(cli.passcode_stdin);
    let result = match cli.command {
        Commands::Seal {
            input,
            project,
            origin,
            output,
        } => {
            let mut output = OutputTarget::from_arg(output);
            file_ops::seal_file(&input, &project, &origin, &mut output, &mut *reader).map(|_| ())
        }
        Commands::Open { url, output } => {
            let output = OutputTarget::from_arg(output);
            file_ops::open_to_file(&url, &output, &mut *reader)
        }
        Commands::Reseal { url, input, output } => {
            let mut output = OutputTarget::from_arg(output);
            file_ops::reseal_file(&url, &input, &mut output, &mut *reader).map(|_| ())
        }
    };

    if let Err(e) = result {
        match e.kind {
            Some(ErrorKind::AuthenticationFailed) => {
                eprintln!("Error: wrong passcode or damaged link");
            }
            Some(ErrorKind::MalformedFragment) => {
                eprintln!("Error: invalid or expired link");
            }
            _ => eprintln!("Error: {}", error_chain(&e)),
        }
        process::exit(1);
    }
}

fn init_logging(level: tracing::Level) {
    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .compact()
        .with_writer(std::io::stderr)
        .with_env_filter(env_filter)
        .init();
}

fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}

fn get_passcode_reader(use_stdin: bool) -> Box<dyn PasscodeReader> {
    if use_stdin {
        Box::new(ReaderPasscodeReader::new(Box::new(std::io::stdin())))
    } else {
        Box::new(TerminalPasscodeReader)
    }
}

//! keysync CLI Client
//!
//! Command-line interface for interacting with a keysync server.

use std::time::Duration;

use clap::{Parser, Subcommand};
use keysync::client::Client;
use keysync::{Result, SetOutcome};

/// keysync CLI
#[derive(Parser, Debug)]
#[command(name = "keysync-cli")]
#[command(about = "CLI for the keysync document sync server")]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:4700")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the server time (Unix milliseconds)
    Now,

    /// Fetch a document
    Get {
        /// 64-character hex reference
        reference: String,

        /// Version already held; data is omitted if it is current
        #[arg(short, long)]
        known: Option<u64>,
    },

    /// Write a document
    Set {
        /// 64-character hex reference
        reference: String,

        /// Encoded payload
        data: String,

        /// Version the write is based on (omit for the first write)
        #[arg(short, long)]
        version: Option<u64>,
    },

    /// Print change events for a document until interrupted
    Watch {
        /// 64-character hex reference
        reference: String,
    },
}

fn main() {
    let args = Args::parse();

    if let Err(e) = run(args) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let mut client = Client::connect(&args.server)?;

    match args.command {
        Commands::Now => println!("{}", client.now()?),

        Commands::Get { reference, known } => {
            client.select_key(Some(&reference))?;
            match client.get(known)? {
                None => println!("(absent)"),
                Some(snapshot) => {
                    println!("version: {}", snapshot.version);
                    match snapshot.data {
                        Some(data) => println!("data: {}", data),
                        None => println!("data: (unchanged)"),
                    }
                }
            }
        }

        Commands::Set {
            reference,
            data,
            version,
        } => {
            client.select_key(Some(&reference))?;
            match client.set(&data, version)? {
                SetOutcome::Committed { version } => println!("committed version {}", version),
                SetOutcome::Conflict { data, version } => {
                    println!("conflict");
                    if let Some(version) = version {
                        println!("current version: {}", version);
                    }
                    if let Some(data) = data {
                        println!("current data: {}", data);
                    }
                    std::process::exit(2);
                }
            }
        }

        Commands::Watch { reference } => {
            client.select_key(Some(&reference))?;
            loop {
                if let Some(event) = client.next_event(Duration::from_secs(60))? {
                    println!("{}", event);
                }
            }
        }
    }

    Ok(())
}

use anyhow::Result;
use clap::{Parser, Subcommand};

mod descriptor;
mod key;
mod network;
#[cfg(test)]
mod test_keys;

#[derive(Parser)]
#[command(name = "wasm-spending-core-cli")]
#[command(about = "Inspect spending keys and descriptors", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build 2-of-3 descriptors and derive addresses
    Descriptor {
        #[command(subcommand)]
        command: descriptor::DescriptorCommand,
    },
    /// Inspect descriptor public keys
    Key {
        #[command(subcommand)]
        command: key::KeyCommand,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Descriptor { command } => descriptor::handle_command(command),
        Commands::Key { command } => key::handle_command(command),
    }
}

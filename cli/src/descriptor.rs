use anyhow::{Context, Result};
use clap::Subcommand;
use wasm_spending_core::descriptor::{watching_descriptor, Scope, WatchingDescriptor};
use wasm_spending_core::keys::{AppSpendingPublicKey, F8eSpendingPublicKey, HwSpendingPublicKey};

use crate::network::NetworkArg;

#[derive(clap::Args)]
pub struct KeysetArgs {
    /// App spending key, e.g. "[fingerprint/84'/0'/0']xpub.../*"
    #[arg(long)]
    app: String,
    /// Hardware spending key
    #[arg(long)]
    hardware: String,
    /// Server spending key
    #[arg(long)]
    server: String,
    /// Use the change chain instead of the receiving chain
    #[arg(long)]
    change: bool,
}

impl KeysetArgs {
    fn descriptor(&self) -> Result<WatchingDescriptor> {
        let app: AppSpendingPublicKey = self.app.parse().context("Invalid app key")?;
        let hardware: HwSpendingPublicKey =
            self.hardware.parse().context("Invalid hardware key")?;
        let server: F8eSpendingPublicKey = self.server.parse().context("Invalid server key")?;
        let scope = if self.change {
            Scope::Internal
        } else {
            Scope::External
        };
        watching_descriptor(&app, &hardware, &server, scope)
            .context("Failed to build descriptor")
    }
}

#[derive(Subcommand)]
pub enum DescriptorCommand {
    /// Print the watch-only descriptor for a keyset
    Build {
        #[command(flatten)]
        keys: KeysetArgs,
    },
    /// Derive addresses from a keyset
    Address {
        #[command(flatten)]
        keys: KeysetArgs,
        /// Network (bitcoin, testnet, signet, regtest)
        #[arg(short, long, value_enum)]
        network: NetworkArg,
        /// First address index
        #[arg(long, default_value_t = 0)]
        index: u32,
        /// Number of addresses to derive
        #[arg(long, default_value_t = 1)]
        count: u32,
    },
}

fn addresses(
    descriptor: &WatchingDescriptor,
    network: NetworkArg,
    index: u32,
    count: u32,
) -> Result<Vec<String>> {
    (index..index.saturating_add(count))
        .map(|i| {
            descriptor
                .address_at(i, network.into())
                .map(|address| address.to_string())
                .with_context(|| format!("Failed to derive address {}", i))
        })
        .collect()
}

pub fn handle_command(command: DescriptorCommand) -> Result<()> {
    match command {
        DescriptorCommand::Build { keys } => {
            println!("{}", keys.descriptor()?);
            Ok(())
        }
        DescriptorCommand::Address {
            keys,
            network,
            index,
            count,
        } => {
            let descriptor = keys.descriptor()?;
            for (i, address) in addresses(&descriptor, network, index, count)?
                .into_iter()
                .enumerate()
            {
                println!("{}\t{}", index as usize + i, address);
            }
            Ok(())
        }
    }
}

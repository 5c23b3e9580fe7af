use anyhow::{Context, Result};
use clap::Subcommand;
use serde::Serialize;
use wasm_spending_core::keys::{DescriptorPublicKey, Wildcard};

#[derive(Subcommand)]
pub enum KeyCommand {
    /// Parse a descriptor public key and print its parts as JSON
    Parse {
        /// Key in the form "[fingerprint/origin/path]xpub/tail/*"
        key: String,
    },
}

#[derive(Debug, Serialize)]
struct ParsedKey {
    normalized: String,
    fingerprint: String,
    origin_path: String,
    xpub: String,
    derivation_path: String,
    wildcard: &'static str,
}

fn parse_key(key: &str) -> Result<ParsedKey> {
    let parsed: DescriptorPublicKey = key.parse().context("Failed to parse descriptor key")?;
    Ok(ParsedKey {
        normalized: parsed.to_canonical_string(),
        fingerprint: parsed.origin().fingerprint.to_string(),
        origin_path: parsed.origin().derivation_path.to_string(),
        xpub: parsed.xpub().to_string(),
        derivation_path: parsed.derivation_path().to_string(),
        wildcard: match parsed.wildcard() {
            Wildcard::None => "none",
            Wildcard::Unhardened => "unhardened",
            Wildcard::Hardened => "hardened",
        },
    })
}

pub fn handle_command(command: KeyCommand) -> Result<()> {
    match command {
        KeyCommand::Parse { key } => {
            let parsed = parse_key(&key)?;
            println!("{}", serde_json::to_string_pretty(&parsed)?);
            Ok(())
        }
    }
}

//! # CLI Interface
//!
//! Defines the command-line argument structure for `vault-cli` using
//! `clap` derive. Connection settings are global flags with environment
//! fallbacks, layered over an optional JSON config file.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use vault_client::crypto::Address;
use vault_client::rpc::Commitment;

use crate::logging::LogFormat;

/// Custody vault client.
///
/// Derives vault addresses, moves native coin and tokens, and drives the
/// vault program's lifecycle on a live cluster.
#[derive(Parser, Debug)]
#[command(
    name = "vault-cli",
    about = "Custody vault client",
    version,
    propagate_version = true
)]
pub struct VaultCli {
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Settings shared by every subcommand.
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// JSON client configuration file. Flags below override its fields.
    #[arg(long, short = 'c', env = "VAULT_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// JSON-RPC endpoint of the cluster.
    #[arg(long, short = 'u', env = "VAULT_RPC_URL", global = true)]
    pub rpc_url: Option<String>,

    /// `confirmed` or `finalized`.
    #[arg(long, env = "VAULT_COMMITMENT", global = true)]
    pub commitment: Option<Commitment>,

    /// Address of the deployed vault program.
    #[arg(long, env = "VAULT_PROGRAM_ID", global = true)]
    pub program_id: Option<Address>,

    /// Wallet keypair file (JSON byte array). Pays fees and signs.
    #[arg(
        long,
        short = 'k',
        env = "VAULT_KEYPAIR",
        global = true,
        default_value = "wallet.json"
    )]
    pub keypair: PathBuf,

    /// Log output format.
    #[arg(long, env = "VAULT_LOG_FORMAT", global = true, value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// More log output on stderr. Repeat for debug (-vv) or trace (-vvv).
    #[arg(long, short = 'v', global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a keypair file.
    Keygen(KeygenArgs),
    /// Print the program-derived addresses of a vault.
    Pda(PdaArgs),
    /// Print the lamport balance of an address (default: the wallet).
    Balance(BalanceArgs),
    /// Send the wallet's entire balance, minus the exact fee, to an address.
    Sweep(SweepArgs),
    /// Send native coin from the wallet.
    Transfer(TransferArgs),
    /// Fungible-token operations.
    #[command(subcommand)]
    Mint(MintCommand),
    /// Custody vault operations.
    #[command(subcommand)]
    Vault(VaultCommand),
    /// Print version information and exit.
    Version,
}

#[derive(Args, Debug)]
pub struct KeygenArgs {
    /// Where to write the keypair.
    #[arg(long, short = 'o', default_value = "wallet.json")]
    pub outfile: PathBuf,

    /// Overwrite an existing file.
    #[arg(long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct PdaArgs {
    /// The vault's state account.
    pub vault_state: Address,

    /// Also print the vault authority's token account for this mint.
    #[arg(long)]
    pub mint: Option<Address>,
}

#[derive(Args, Debug)]
pub struct BalanceArgs {
    pub address: Option<Address>,
}

#[derive(Args, Debug)]
pub struct SweepArgs {
    /// Recipient of the whole balance.
    pub to: Address,
}

#[derive(Args, Debug)]
pub struct TransferArgs {
    pub to: Address,

    /// Amount in SOL, e.g. `0.25`.
    pub amount: String,
}

#[derive(Subcommand, Debug)]
pub enum MintCommand {
    /// Create a new mint with the wallet as mint authority.
    Create {
        /// Decimal places of the token.
        #[arg(long, default_value_t = 6)]
        decimals: u8,

        /// Save the mint keypair here instead of discarding it.
        #[arg(long)]
        outfile: Option<PathBuf>,
    },
    /// Mint tokens into an owner's associated account (default: the wallet's).
    To {
        mint: Address,
        /// Amount in token units, e.g. `1.5`.
        amount: String,
        #[arg(long)]
        owner: Option<Address>,
    },
    /// Transfer tokens from the wallet to another owner.
    Transfer {
        mint: Address,
        to: Address,
        /// Amount in token units.
        amount: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum VaultCommand {
    /// Create a vault owned by the wallet.
    Init {
        /// Save the vault state keypair here.
        #[arg(long)]
        outfile: Option<PathBuf>,
    },
    /// Deposit native coin (amount in SOL).
    Deposit { vault_state: Address, amount: String },
    /// Withdraw native coin (amount in SOL).
    Withdraw { vault_state: Address, amount: String },
    /// Deposit fungible tokens (amount in token units).
    DepositSpl {
        vault_state: Address,
        mint: Address,
        amount: String,
    },
    /// Withdraw fungible tokens (amount in token units).
    WithdrawSpl {
        vault_state: Address,
        mint: Address,
        amount: String,
    },
    /// Deposit an NFT.
    DepositNft { vault_state: Address, mint: Address },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        VaultCli::command().debug_assert();
    }

    #[test]
    fn parses_vault_deposit_with_global_flags() {
        let state = Address::new_random();
        let cli = VaultCli::try_parse_from([
            "vault-cli",
            "vault",
            "deposit",
            &state.to_string(),
            "0.1",
            "--commitment",
            "finalized",
            "-k",
            "owner.json",
        ])
        .unwrap();

        assert_eq!(cli.global.commitment, Some(Commitment::Finalized));
        assert_eq!(cli.global.keypair, PathBuf::from("owner.json"));
        match cli.command {
            Commands::Vault(VaultCommand::Deposit { vault_state, amount }) => {
                assert_eq!(vault_state, state);
                assert_eq!(amount, "0.1");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn logging_flags() {
        let cli = VaultCli::try_parse_from(["vault-cli", "balance", "-vv", "--log-format", "json"])
            .unwrap();
        assert_eq!(cli.global.verbose, 2);
        assert_eq!(cli.global.log_format, LogFormat::Json);

        let quiet = VaultCli::try_parse_from(["vault-cli", "balance"]).unwrap();
        assert_eq!(quiet.global.verbose, 0);
        assert!(VaultCli::try_parse_from(["vault-cli", "balance", "--log-format", "xml"]).is_err());
    }

    #[test]
    fn rejects_malformed_addresses() {
        assert!(VaultCli::try_parse_from(["vault-cli", "sweep", "not-an-address"]).is_err());
        assert!(VaultCli::try_parse_from(["vault-cli", "pda", "0OIl"]).is_err());
    }

    #[test]
    fn mint_create_defaults() {
        let cli = VaultCli::try_parse_from(["vault-cli", "mint", "create"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Mint(MintCommand::Create {
                decimals: 6,
                outfile: None
            })
        ));
    }
}

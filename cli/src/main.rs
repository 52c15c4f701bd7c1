// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Vault CLI
//!
//! Entry point for the `vault-cli` binary. Parses arguments, initializes
//! logging, resolves the client configuration and runs one command.
//!
//! Results go to stdout; logs go to stderr.

mod cli;
mod logging;

use anyhow::{bail, Context, Result};
use clap::Parser;

use vault_client::config::{explorer_tx_url, ClientConfig};
use vault_client::connection::Connection;
use vault_client::crypto::{Address, Keypair, Signature};
use vault_client::program::token::{format_ui_amount, parse_ui_amount};
use vault_client::spl;
use vault_client::transfer;
use vault_client::vault::{VaultAddresses, VaultClient};

use cli::{Commands, GlobalArgs, MintCommand, VaultCli, VaultCommand};

/// Decimal places of the native coin.
const NATIVE_DECIMALS: u8 = 9;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = VaultCli::parse();
    logging::init_logging(cli.global.verbose, cli.global.log_format);

    match cli.command {
        Commands::Version => {
            print_version();
            Ok(())
        }
        Commands::Keygen(args) => keygen(args),
        command => {
            let session = Session::open(&cli.global)?;
            session.run(command).await
        }
    }
}

/// Generates a keypair file, refusing to clobber an existing one.
fn keygen(args: cli::KeygenArgs) -> Result<()> {
    if args.outfile.exists() && !args.force {
        bail!(
            "{} already exists; pass --force to overwrite",
            args.outfile.display()
        );
    }
    let keypair = Keypair::generate();
    keypair
        .write_to_file(&args.outfile)
        .with_context(|| format!("failed to write keypair to {}", args.outfile.display()))?;
    tracing::info!(path = %args.outfile.display(), "keypair written");
    println!("{}", keypair.address());
    Ok(())
}

/// Resolved configuration plus a connection built from it.
struct Session {
    config: ClientConfig,
    connection: Connection,
    keypair_path: std::path::PathBuf,
}

impl Session {
    fn open(global: &GlobalArgs) -> Result<Self> {
        let mut config = match &global.config {
            Some(path) => ClientConfig::from_file(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => ClientConfig::default(),
        };
        if let Some(url) = &global.rpc_url {
            config.rpc_url = url.clone();
        }
        if let Some(commitment) = global.commitment {
            config.commitment = commitment;
        }
        if let Some(program_id) = global.program_id {
            config.vault_program_id = program_id;
        }
        tracing::debug!(
            rpc_url = %config.rpc_url,
            commitment = %config.commitment,
            program_id = %config.vault_program_id,
            "client configured"
        );

        Ok(Self {
            connection: Connection::from_config(&config)
                .context("failed to set up the RPC client")?,
            config,
            keypair_path: global.keypair.clone(),
        })
    }

    fn wallet(&self) -> Result<Keypair> {
        Keypair::read_from_file(&self.keypair_path).with_context(|| {
            format!(
                "failed to read wallet keypair {}",
                self.keypair_path.display()
            )
        })
    }

    fn vault(&self) -> Result<VaultClient> {
        VaultClient::new(self.connection.clone(), self.config.vault_program_id)
            .context("failed to load the vault program interface")
    }

    fn report(&self, signature: &Signature) {
        println!("Signature: {}", signature);
        println!(
            "Explorer:  {}",
            explorer_tx_url(&signature.to_string(), &self.config.rpc_url)
        );
    }

    async fn token_amount(&self, mint: &Address, amount: &str) -> Result<u64> {
        let decimals = self
            .connection
            .mint_decimals(mint)
            .await
            .with_context(|| format!("failed to read mint {}", mint))?;
        parse_ui_amount(amount, decimals).with_context(|| format!("invalid amount {:?}", amount))
    }

    async fn run(&self, command: Commands) -> Result<()> {
        match command {
            Commands::Pda(args) => self.pda(args),
            Commands::Balance(args) => {
                let address = match args.address {
                    Some(address) => address,
                    None => self.wallet()?.address(),
                };
                let lamports = self
                    .connection
                    .balance(&address)
                    .await
                    .context("balance query failed")?;
                println!(
                    "{} SOL ({} lamports)",
                    format_ui_amount(lamports, NATIVE_DECIMALS),
                    lamports
                );
                Ok(())
            }
            Commands::Sweep(args) => {
                let wallet = self.wallet()?;
                let receipt = transfer::sweep(&self.connection, &wallet, &args.to)
                    .await
                    .context("sweep failed")?;
                println!(
                    "Sent {} SOL, fee {} lamports",
                    format_ui_amount(receipt.amount, NATIVE_DECIMALS),
                    receipt.fee
                );
                self.report(&receipt.signature);
                Ok(())
            }
            Commands::Transfer(args) => {
                let wallet = self.wallet()?;
                let lamports = parse_native(&args.amount)?;
                let signature =
                    transfer::transfer_lamports(&self.connection, &wallet, &args.to, lamports)
                        .await
                        .context("transfer failed")?;
                self.report(&signature);
                Ok(())
            }
            Commands::Mint(command) => self.mint(command).await,
            Commands::Vault(command) => self.vault_command(command).await,
            Commands::Version | Commands::Keygen(_) => Ok(()),
        }
    }

    fn pda(&self, args: cli::PdaArgs) -> Result<()> {
        let addresses = VaultAddresses::derive(&args.vault_state, &self.config.vault_program_id)
            .context("derivation failed")?;
        println!("Vault state : {}", addresses.vault_state);
        println!(
            "Vault auth  : {} (bump {})",
            addresses.vault_auth, addresses.vault_auth_bump
        );
        println!(
            "Vault       : {} (bump {})",
            addresses.vault, addresses.vault_bump
        );
        if let Some(mint) = args.mint {
            println!("Vault ATA   : {}", addresses.vault_token_account(&mint)?);
        }
        Ok(())
    }

    async fn mint(&self, command: MintCommand) -> Result<()> {
        let wallet = self.wallet()?;
        match command {
            MintCommand::Create { decimals, outfile } => {
                let mint = Keypair::generate();
                if let Some(path) = &outfile {
                    mint.write_to_file(path)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                }
                let signature = spl::create_mint(
                    &self.connection,
                    &wallet,
                    &mint,
                    &wallet.address(),
                    None,
                    decimals,
                )
                .await
                .context("mint creation failed")?;
                println!("Mint: {}", mint.address());
                self.report(&signature);
            }
            MintCommand::To {
                mint,
                amount,
                owner,
            } => {
                let amount = self.token_amount(&mint, &amount).await?;
                let owner = owner.unwrap_or_else(|| wallet.address());
                let minted =
                    spl::mint_to(&self.connection, &wallet, &mint, &wallet, &owner, amount)
                        .await
                        .context("minting failed")?;
                println!("Token account: {}", minted.destination.address);
                self.report(&minted.signature);
            }
            MintCommand::Transfer { mint, to, amount } => {
                let amount = self.token_amount(&mint, &amount).await?;
                let sent =
                    spl::transfer_tokens(&self.connection, &wallet, &wallet, &mint, &to, amount)
                        .await
                        .context("token transfer failed")?;
                println!("Recipient account: {}", sent.destination.address);
                self.report(&sent.signature);
            }
        }
        Ok(())
    }

    async fn vault_command(&self, command: VaultCommand) -> Result<()> {
        let owner = self.wallet()?;
        let vault = self.vault()?;
        match command {
            VaultCommand::Init { outfile } => {
                let state = Keypair::generate();
                if let Some(path) = &outfile {
                    state
                        .write_to_file(path)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                }
                let init = vault
                    .initialize(&owner, &state)
                    .await
                    .context("vault initialization failed")?;
                println!("Vault state : {}", init.addresses.vault_state);
                println!("Vault auth  : {}", init.addresses.vault_auth);
                println!("Vault       : {}", init.addresses.vault);
                self.report(&init.signature);
            }
            VaultCommand::Deposit {
                vault_state,
                amount,
            } => {
                let signature = vault
                    .deposit(&owner, &vault_state, parse_native(&amount)?)
                    .await
                    .context("deposit failed")?;
                self.report(&signature);
            }
            VaultCommand::Withdraw {
                vault_state,
                amount,
            } => {
                let signature = vault
                    .withdraw(&owner, &vault_state, parse_native(&amount)?)
                    .await
                    .context("withdrawal failed")?;
                self.report(&signature);
            }
            VaultCommand::DepositSpl {
                vault_state,
                mint,
                amount,
            } => {
                let amount = self.token_amount(&mint, &amount).await?;
                let receipt = vault
                    .deposit_spl(&owner, &vault_state, &mint, amount)
                    .await
                    .context("token deposit failed")?;
                println!("Vault token account: {}", receipt.vault_account.address);
                self.report(&receipt.signature);
            }
            VaultCommand::WithdrawSpl {
                vault_state,
                mint,
                amount,
            } => {
                let amount = self.token_amount(&mint, &amount).await?;
                let receipt = vault
                    .withdraw_spl(&owner, &vault_state, &mint, amount)
                    .await
                    .context("token withdrawal failed")?;
                self.report(&receipt.signature);
            }
            VaultCommand::DepositNft { vault_state, mint } => {
                let receipt = vault
                    .deposit_nft(&owner, &vault_state, &mint)
                    .await
                    .context("nft deposit failed")?;
                println!("Vault token account: {}", receipt.vault_account.address);
                self.report(&receipt.signature);
            }
        }
        Ok(())
    }
}

fn parse_native(amount: &str) -> Result<u64> {
    parse_ui_amount(amount, NATIVE_DECIMALS).with_context(|| format!("invalid amount {:?}", amount))
}

/// Prints version information to stdout.
fn print_version() {
    println!("vault-cli {}", env!("CARGO_PKG_VERSION"));
    println!("rustc     {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_amounts_are_in_sol() {
        assert_eq!(parse_native("1").unwrap(), 1_000_000_000);
        assert_eq!(parse_native("0.000000001").unwrap(), 1);
        assert!(parse_native("0.0000000001").is_err());
        assert!(parse_native("abc").is_err());
    }

    #[test]
    fn session_layers_flags_over_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.json");
        std::fs::write(
            &path,
            r#"{ "rpc_url": "http://127.0.0.1:8899", "commitment": "finalized" }"#,
        )
        .unwrap();

        let cli = VaultCli::try_parse_from([
            "vault-cli",
            "balance",
            "-c",
            path.to_str().unwrap(),
            "--rpc-url",
            "https://api.devnet.solana.com",
        ])
        .unwrap();
        let session = Session::open(&cli.global).unwrap();

        assert_eq!(session.config.rpc_url, "https://api.devnet.solana.com");
        assert_eq!(
            session.config.commitment,
            vault_client::rpc::Commitment::Finalized
        );
    }

    #[test]
    fn missing_wallet_is_reported_with_its_path() {
        let cli = VaultCli::try_parse_from(["vault-cli", "balance", "-k", "/nonexistent/w.json"])
            .unwrap();
        let session = Session::open(&cli.global).unwrap();
        let err = session.wallet().unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/w.json"));
    }
}

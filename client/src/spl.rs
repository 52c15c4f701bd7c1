//! Fungible-token operations: creating a mint, minting into an owner's
//! associated account, and owner-to-owner transfers.
//!
//! Decimals always come from the mint account on chain, so amounts given in
//! base units are checked against the same precision the token program
//! enforces.

use crate::config::TOKEN_PROGRAM_ID;
use crate::connection::Connection;
use crate::crypto::{Address, Keypair, Signature};
use crate::error::Result;
use crate::program::{system, token};
use crate::resolver::{AssetAccount, AssetAccountResolver};
use crate::transaction::TransactionBuilder;

/// Result of a token movement: where tokens went and the signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenTransfer {
    pub source: Address,
    pub destination: AssetAccount,
    pub amount: u64,
    pub signature: Signature,
}

/// Creates `mint` with `decimals`, controlled by `mint_authority`. The
/// payer funds rent; both payer and the fresh mint keypair sign.
pub async fn create_mint(
    connection: &Connection,
    payer: &Keypair,
    mint: &Keypair,
    mint_authority: &Address,
    freeze_authority: Option<&Address>,
    decimals: u8,
) -> Result<Signature> {
    let rent = connection.rent_exemption(token::Mint::LEN).await?;
    let builder = TransactionBuilder::new()
        .fee_payer(payer.address())
        .instruction(system::create_account(
            &payer.address(),
            &mint.address(),
            rent,
            token::Mint::LEN as u64,
            &TOKEN_PROGRAM_ID,
        ))
        .instruction(token::initialize_mint2(
            &mint.address(),
            mint_authority,
            freeze_authority,
            decimals,
        ));
    let signature = connection.send(&builder, &[payer, mint]).await?;
    tracing::info!(mint = %mint.address(), decimals, %signature, "created mint");
    Ok(signature)
}

/// Mints `amount` base units into `owner`'s associated account, creating
/// that account first if needed.
pub async fn mint_to(
    connection: &Connection,
    payer: &Keypair,
    mint: &Address,
    mint_authority: &Keypair,
    owner: &Address,
    amount: u64,
) -> Result<TokenTransfer> {
    let resolver = AssetAccountResolver::new(connection.clone());
    let destination = resolver.resolve(owner, mint, payer, false).await?;

    let builder = TransactionBuilder::new()
        .fee_payer(payer.address())
        .instruction(token::mint_to(
            mint,
            &destination.address,
            &mint_authority.address(),
            amount,
        ));
    let signature = connection.send(&builder, &[payer, mint_authority]).await?;
    tracing::info!(%mint, to = %destination.address, amount, %signature, "minted tokens");
    Ok(TokenTransfer {
        source: *mint,
        destination,
        amount,
        signature,
    })
}

/// Moves `amount` base units of `mint` from `owner`'s associated account
/// to `recipient`'s, creating the recipient's account if needed. `payer`
/// pays fees and rent; `owner` authorizes the debit.
pub async fn transfer_tokens(
    connection: &Connection,
    payer: &Keypair,
    owner: &Keypair,
    mint: &Address,
    recipient: &Address,
    amount: u64,
) -> Result<TokenTransfer> {
    let decimals = connection.mint_decimals(mint).await?;
    let resolver = AssetAccountResolver::new(connection.clone());
    let source = resolver
        .resolve(&owner.address(), mint, payer, false)
        .await?;
    let destination = resolver.resolve(recipient, mint, payer, false).await?;

    let builder = TransactionBuilder::new()
        .fee_payer(payer.address())
        .instruction(token::transfer_checked(
            &source.address,
            mint,
            &destination.address,
            &owner.address(),
            amount,
            decimals,
        ));
    let signature = connection.send(&builder, &[payer, owner]).await?;
    tracing::info!(
        %mint,
        from = %source.address,
        to = %destination.address,
        amount,
        %signature,
        "transferred tokens"
    );
    Ok(TokenTransfer {
        source: source.address,
        destination,
        amount,
        signature,
    })
}

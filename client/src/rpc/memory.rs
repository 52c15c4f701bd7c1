//! # In-Memory Ledger
//!
//! [`MemoryLedger`] is a deterministic, single-process stand-in for the
//! network. It validates transactions the way a node does (known blockhash,
//! every required signature present and valid, fee payer solvent), charges
//! a flat fee per signature, and executes instructions through
//! [`ProgramProcessor`]s.
//!
//! The system, token and associated-token programs are built in. Other
//! programs, such as a vault, are plugged in with
//! [`MemoryLedger::with_program`].
//!
//! ## Execution Model
//!
//! 1. Injected failures (see [`MemoryLedger::inject_send_failures`]) are
//!    returned first, before anything else happens.
//! 2. Blockhash, signatures and fee are checked. Failing here costs nothing.
//! 3. The fee is charged and the signature recorded, then every instruction
//!    runs against a scratch copy of the accounts. The copy is committed only
//!    if all instructions succeed, so a failed transaction pays its fee and
//!    changes nothing else.
//! 4. A new blockhash is produced after every processed transaction.
//! 5. Lost replies (see [`MemoryLedger::lose_replies`]) replace the answer
//!    of a transaction that did execute, the way a dropped connection hides
//!    a landed submission from its sender.
//!
//! Rent is quoted but not enforced. Commitment levels are accepted and
//! ignored: everything is final immediately.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;

use super::builtins::{AssociatedTokenProcessor, SystemProcessor, TokenProcessor};
use super::{AccountInfo, Commitment, LedgerClient, LedgerError, TransactionStatus};
use crate::config::{
    ASSOCIATED_TOKEN_PROGRAM_ID, SIGNATURE_FEE_LAMPORTS, SYSTEM_PROGRAM_ID, TOKEN_PROGRAM_ID,
};
use crate::crypto::{Address, Blockhash, Signature};
use crate::pda::create_program_address;
use crate::program::token::TokenAccount;
use crate::transaction::{AccountMeta, Instruction, Message, Transaction};

/// How many recent blockhashes stay valid for new transactions.
const MAX_RECENT_BLOCKHASHES: usize = 150;

/// Nesting limit for cross-program invocations.
const MAX_INVOKE_DEPTH: usize = 4;

/// Storage overhead charged on top of an account's data for rent purposes.
const ACCOUNT_STORAGE_OVERHEAD: u64 = 128;
const LAMPORTS_PER_BYTE_YEAR: u64 = 3_480;
const EXEMPTION_THRESHOLD_YEARS: u64 = 2;

/// Lamports an account with `data_len` bytes needs to be rent exempt.
pub fn rent_exempt_minimum(data_len: usize) -> u64 {
    (ACCOUNT_STORAGE_OVERHEAD + data_len as u64) * LAMPORTS_PER_BYTE_YEAR * EXEMPTION_THRESHOLD_YEARS
}

// ---------------------------------------------------------------------------
// Instruction errors
// ---------------------------------------------------------------------------

/// Why a program refused an instruction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InstructionError {
    #[error("insufficient account keys for instruction")]
    NotEnoughAccountKeys,

    #[error("missing required signature for {0}")]
    MissingRequiredSignature(Address),

    #[error("account {0} already in use")]
    AccountAlreadyInUse(Address),

    #[error("insufficient funds in {address}: need {needed}, have {available}")]
    InsufficientFunds {
        address: Address,
        needed: u64,
        available: u64,
    },

    #[error("invalid account data for {0}")]
    InvalidAccountData(Address),

    #[error("account {0} is owned by a different program")]
    IncorrectProgramId(Address),

    #[error("instruction spent lamports of {0}, which its program does not own")]
    ExternalAccountLamportSpend(Address),

    #[error("instruction modified data of {0}, which its program does not own")]
    ExternalAccountDataModified(Address),

    #[error("invalid instruction data")]
    InvalidInstructionData,

    #[error("provided seeds do not result in a valid address")]
    InvalidSeeds,

    #[error("program {0} is not deployed")]
    UnknownProgram(Address),

    #[error("arithmetic overflow")]
    ArithmeticOverflow,

    #[error("cross-program invocation nested too deeply")]
    CallDepth,

    /// Program-specific error code, rendered the way the network does.
    #[error("custom program error: {0:#x}")]
    Custom(u32),
}

// ---------------------------------------------------------------------------
// Program processors
// ---------------------------------------------------------------------------

/// An executable program inside a [`MemoryLedger`].
pub trait ProgramProcessor: Send + Sync {
    fn process(&self, ctx: &mut InvocationContext<'_>) -> Result<(), InstructionError>;
}

type ProgramTable = HashMap<Address, Arc<dyn ProgramProcessor>>;

/// What a program sees while processing one instruction: its accounts and
/// data, the signer set, and the ledger's account store.
///
/// Lamports may only leave, and data may only change on, accounts owned by
/// the running program. Anything else goes through [`Self::invoke`].
pub struct InvocationContext<'a> {
    program_id: Address,
    accounts: Vec<AccountMeta>,
    data: Vec<u8>,
    signers: HashSet<Address>,
    store: &'a mut HashMap<Address, AccountInfo>,
    programs: &'a ProgramTable,
    depth: usize,
}

impl<'a> InvocationContext<'a> {
    fn new(
        ix: Instruction,
        signers: HashSet<Address>,
        store: &'a mut HashMap<Address, AccountInfo>,
        programs: &'a ProgramTable,
        depth: usize,
    ) -> Self {
        Self {
            program_id: ix.program_id,
            accounts: ix.accounts,
            data: ix.data,
            signers,
            store,
            programs,
            depth,
        }
    }

    pub fn program_id(&self) -> &Address {
        &self.program_id
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn accounts(&self) -> &[AccountMeta] {
        &self.accounts
    }

    /// Address of the instruction's `index`-th account.
    pub fn account_address(&self, index: usize) -> Result<Address, InstructionError> {
        self.accounts
            .get(index)
            .map(|m| m.address)
            .ok_or(InstructionError::NotEnoughAccountKeys)
    }

    pub fn get(&self, address: &Address) -> Option<&AccountInfo> {
        self.store.get(address)
    }

    pub fn lamports(&self, address: &Address) -> u64 {
        self.store.get(address).map_or(0, |a| a.lamports)
    }

    pub fn is_signer(&self, address: &Address) -> bool {
        self.signers.contains(address)
    }

    pub fn require_signer(&self, address: &Address) -> Result<(), InstructionError> {
        if self.is_signer(address) {
            Ok(())
        } else {
            Err(InstructionError::MissingRequiredSignature(*address))
        }
    }

    pub fn rent_exempt_minimum(&self, data_len: usize) -> u64 {
        rent_exempt_minimum(data_len)
    }

    /// Removes lamports from an account the running program owns.
    pub fn debit(&mut self, address: &Address, amount: u64) -> Result<(), InstructionError> {
        let program_id = self.program_id;
        let account = self
            .store
            .get_mut(address)
            .ok_or(InstructionError::InsufficientFunds {
                address: *address,
                needed: amount,
                available: 0,
            })?;
        if account.owner != program_id {
            return Err(InstructionError::ExternalAccountLamportSpend(*address));
        }
        if account.lamports < amount {
            return Err(InstructionError::InsufficientFunds {
                address: *address,
                needed: amount,
                available: account.lamports,
            });
        }
        account.lamports -= amount;
        Ok(())
    }

    /// Adds lamports to any account, creating a system-owned one if needed.
    pub fn credit(&mut self, address: &Address, amount: u64) -> Result<(), InstructionError> {
        let account = self.store.entry(*address).or_insert_with(|| AccountInfo {
            owner: SYSTEM_PROGRAM_ID,
            ..AccountInfo::default()
        });
        account.lamports = account
            .lamports
            .checked_add(amount)
            .ok_or(InstructionError::ArithmeticOverflow)?;
        Ok(())
    }

    /// Overwrites the data of an account the running program owns. The
    /// length may not change.
    pub fn set_data(&mut self, address: &Address, data: Vec<u8>) -> Result<(), InstructionError> {
        let program_id = self.program_id;
        let account = self
            .store
            .get_mut(address)
            .ok_or(InstructionError::InvalidAccountData(*address))?;
        if account.owner != program_id {
            return Err(InstructionError::ExternalAccountDataModified(*address));
        }
        if account.data.len() != data.len() {
            return Err(InstructionError::InvalidAccountData(*address));
        }
        account.data = data;
        Ok(())
    }

    /// Sizes and reassigns a fresh system account. Only the system program
    /// may do this.
    pub(crate) fn allocate_and_assign(
        &mut self,
        address: &Address,
        space: usize,
        owner: &Address,
    ) -> Result<(), InstructionError> {
        if self.program_id != SYSTEM_PROGRAM_ID {
            return Err(InstructionError::IncorrectProgramId(*address));
        }
        let account = self.store.entry(*address).or_insert_with(|| AccountInfo {
            owner: SYSTEM_PROGRAM_ID,
            ..AccountInfo::default()
        });
        if account.owner != SYSTEM_PROGRAM_ID || !account.data.is_empty() {
            return Err(InstructionError::AccountAlreadyInUse(*address));
        }
        account.data = vec![0u8; space];
        account.owner = *owner;
        Ok(())
    }

    /// Cross-program invocation. The running program may sign for PDAs
    /// derived from its own id with `signer_seeds` (bump included).
    pub fn invoke(
        &mut self,
        ix: &Instruction,
        signer_seeds: &[&[&[u8]]],
    ) -> Result<(), InstructionError> {
        if self.depth + 1 >= MAX_INVOKE_DEPTH {
            return Err(InstructionError::CallDepth);
        }

        let mut signers = self.signers.clone();
        for seeds in signer_seeds {
            let pda = create_program_address(seeds, &self.program_id)
                .map_err(|_| InstructionError::InvalidSeeds)?;
            signers.insert(pda);
        }
        if let Some(meta) = ix
            .accounts
            .iter()
            .find(|m| m.is_signer && !signers.contains(&m.address))
        {
            return Err(InstructionError::MissingRequiredSignature(meta.address));
        }

        let processor = self
            .programs
            .get(&ix.program_id)
            .cloned()
            .ok_or(InstructionError::UnknownProgram(ix.program_id))?;
        let mut child = InvocationContext::new(
            ix.clone(),
            signers,
            &mut *self.store,
            self.programs,
            self.depth + 1,
        );
        processor.process(&mut child)
    }
}

// ---------------------------------------------------------------------------
// MemoryLedger
// ---------------------------------------------------------------------------

struct LedgerState {
    accounts: HashMap<Address, AccountInfo>,
    recent_blockhashes: VecDeque<Blockhash>,
    /// Every executed signature, with the error it failed with, if any.
    processed: HashMap<Signature, Option<LedgerError>>,
    injected_failures: VecDeque<LedgerError>,
    /// `(reply, expire blockhashes)` for the next executed submissions.
    lost_replies: VecDeque<(LedgerError, bool)>,
    fee_per_signature: u64,
    send_attempts: usize,
    landed: usize,
}

impl LedgerState {
    fn latest_blockhash(&self) -> Blockhash {
        self.recent_blockhashes.back().copied().unwrap_or_default()
    }

    /// Keeps the charged fee, drops everything else the transaction did.
    fn record_failure(&mut self, signature: Signature, err: LedgerError) -> LedgerError {
        purge_empty(&mut self.accounts);
        self.processed.insert(signature, Some(err.clone()));
        err
    }

    fn expire_blockhashes(&mut self) {
        let next = self.latest_blockhash().next();
        self.recent_blockhashes.clear();
        self.recent_blockhashes.push_back(next);
    }

    fn produce_block(&mut self) {
        let next = self.latest_blockhash().next();
        self.recent_blockhashes.push_back(next);
        while self.recent_blockhashes.len() > MAX_RECENT_BLOCKHASHES {
            self.recent_blockhashes.pop_front();
        }
    }
}

/// See the [module documentation](self).
pub struct MemoryLedger {
    state: Mutex<LedgerState>,
    programs: ProgramTable,
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLedger {
    /// An empty ledger with the native programs deployed.
    pub fn new() -> Self {
        let genesis = Blockhash::new_from_array(crate::crypto::sha256(b"memory-ledger genesis"));
        let ledger = Self {
            state: Mutex::new(LedgerState {
                accounts: HashMap::new(),
                recent_blockhashes: VecDeque::from([genesis]),
                processed: HashMap::new(),
                injected_failures: VecDeque::new(),
                lost_replies: VecDeque::new(),
                fee_per_signature: SIGNATURE_FEE_LAMPORTS,
                send_attempts: 0,
                landed: 0,
            }),
            programs: HashMap::new(),
        };
        ledger
            .with_program(SYSTEM_PROGRAM_ID, SystemProcessor)
            .with_program(TOKEN_PROGRAM_ID, TokenProcessor)
            .with_program(ASSOCIATED_TOKEN_PROGRAM_ID, AssociatedTokenProcessor)
    }

    /// Deploys `processor` at `program_id`.
    pub fn with_program(
        mut self,
        program_id: Address,
        processor: impl ProgramProcessor + 'static,
    ) -> Self {
        self.programs.insert(program_id, Arc::new(processor));
        self.state.get_mut().accounts.insert(
            program_id,
            AccountInfo {
                lamports: 1,
                owner: Address::default(),
                data: Vec::new(),
                executable: true,
            },
        );
        self
    }

    /// Mints lamports out of thin air.
    pub fn airdrop(&self, address: &Address, lamports: u64) {
        let mut st = self.state.lock();
        let account = st.accounts.entry(*address).or_insert_with(|| AccountInfo {
            owner: SYSTEM_PROGRAM_ID,
            ..AccountInfo::default()
        });
        account.lamports = account.lamports.saturating_add(lamports);
    }

    pub fn set_account(&self, address: Address, account: AccountInfo) {
        self.state.lock().accounts.insert(address, account);
    }

    pub fn account(&self, address: &Address) -> Option<AccountInfo> {
        self.state.lock().accounts.get(address).cloned()
    }

    pub fn lamports(&self, address: &Address) -> u64 {
        self.state
            .lock()
            .accounts
            .get(address)
            .map_or(0, |a| a.lamports)
    }

    /// Token amount held by a token account, if it is one.
    pub fn token_amount(&self, address: &Address) -> Option<u64> {
        let st = self.state.lock();
        let account = st.accounts.get(address)?;
        if account.owner != TOKEN_PROGRAM_ID {
            return None;
        }
        TokenAccount::unpack(&account.data).map(|t| t.amount)
    }

    /// Queues errors returned, in order, by the next submissions.
    pub fn inject_send_failures(&self, errors: impl IntoIterator<Item = LedgerError>) {
        self.state.lock().injected_failures.extend(errors);
    }

    /// The next submissions that execute, successfully or not, answer with
    /// these errors instead of their real outcome.
    pub fn lose_replies(&self, errors: impl IntoIterator<Item = LedgerError>) {
        self.state
            .lock()
            .lost_replies
            .extend(errors.into_iter().map(|err| (err, false)));
    }

    /// Like [`lose_replies`](Self::lose_replies) for one submission, and every
    /// blockhash expires before the sender hears back.
    pub fn lose_reply_then_expire(&self, error: LedgerError) {
        self.state.lock().lost_replies.push_back((error, true));
    }

    pub fn set_fee_per_signature(&self, lamports: u64) {
        self.state.lock().fee_per_signature = lamports;
    }

    /// Invalidates every blockhash handed out so far.
    pub fn expire_blockhashes(&self) {
        self.state.lock().expire_blockhashes();
    }

    /// Every call to `send_and_confirm_transaction`, whatever its outcome.
    pub fn send_attempts(&self) -> usize {
        self.state.lock().send_attempts
    }

    /// Transactions that executed successfully.
    pub fn landed_transactions(&self) -> usize {
        self.state.lock().landed
    }

    fn process_transaction(&self, tx: &Transaction) -> Result<Signature, LedgerError> {
        let mut st = self.state.lock();
        st.send_attempts += 1;
        if let Some(err) = st.injected_failures.pop_front() {
            return Err(err);
        }

        let executed_before = st.processed.len();
        let outcome = self.execute(&mut st, tx);
        if st.processed.len() > executed_before {
            if let Some((reply, expire)) = st.lost_replies.pop_front() {
                if expire {
                    st.expire_blockhashes();
                }
                tracing::debug!(error = %reply, "reply lost after execution");
                return Err(reply);
            }
        }
        outcome
    }

    fn execute(&self, st: &mut LedgerState, tx: &Transaction) -> Result<Signature, LedgerError> {
        let message = &tx.message;
        if !st.recent_blockhashes.contains(&message.recent_blockhash) {
            return Err(LedgerError::BlockhashNotFound);
        }

        let bytes = message.serialize();
        let signer_keys = message.signer_keys();
        for (i, key) in signer_keys.iter().enumerate() {
            let valid = tx
                .signatures
                .get(i)
                .is_some_and(|sig| !sig.is_empty() && sig.verify(key, &bytes));
            if !valid {
                return Err(LedgerError::MissingSignature(*key));
            }
        }
        let (Some(fee_payer), Some(signature)) = (message.fee_payer().copied(), tx.signature().copied())
        else {
            return Err(LedgerError::Rejected("transaction has no fee payer".into()));
        };
        if st.processed.contains_key(&signature) {
            return Err(LedgerError::AlreadyProcessed);
        }

        let fee = st.fee_per_signature * signer_keys.len() as u64;
        let balance = st.accounts.get(&fee_payer).map_or(0, |a| a.lamports);
        if balance < fee {
            return Err(LedgerError::Rejected(format!(
                "insufficient funds for fee: {} has {}, needs {}",
                fee_payer, balance, fee
            )));
        }

        if let Some(payer) = st.accounts.get_mut(&fee_payer) {
            payer.lamports -= fee;
        }
        st.processed.insert(signature, None);
        st.produce_block();

        let signers: HashSet<Address> = signer_keys.iter().copied().collect();
        let mut scratch = st.accounts.clone();
        for (index, ix) in message.decompile().into_iter().enumerate() {
            let Some(processor) = self.programs.get(&ix.program_id).cloned() else {
                return Err(st.record_failure(
                    signature,
                    LedgerError::Rejected(format!(
                        "instruction {}: program {} is not deployed",
                        index, ix.program_id
                    )),
                ));
            };
            let mut ctx = InvocationContext::new(ix, signers.clone(), &mut scratch, &self.programs, 0);
            if let Err(err) = processor.process(&mut ctx) {
                tracing::debug!(%signature, index, error = %err, "transaction failed");
                let err = match err {
                    InstructionError::AccountAlreadyInUse(address) => {
                        LedgerError::AccountAlreadyExists(address)
                    }
                    other => LedgerError::Rejected(format!("instruction {}: {}", index, other)),
                };
                return Err(st.record_failure(signature, err));
            }
        }

        purge_empty(&mut scratch);
        st.accounts = scratch;
        st.landed += 1;
        tracing::debug!(%signature, fee, "transaction landed");
        Ok(signature)
    }
}

/// Accounts drained to zero lamports cease to exist.
fn purge_empty(accounts: &mut HashMap<Address, AccountInfo>) {
    accounts.retain(|_, a| a.lamports > 0 || a.executable);
}

#[async_trait]
impl LedgerClient for MemoryLedger {
    async fn get_balance(
        &self,
        address: &Address,
        _commitment: Commitment,
    ) -> Result<u64, LedgerError> {
        Ok(self.lamports(address))
    }

    async fn get_account(
        &self,
        address: &Address,
        _commitment: Commitment,
    ) -> Result<Option<AccountInfo>, LedgerError> {
        Ok(self.account(address))
    }

    async fn get_latest_blockhash(
        &self,
        _commitment: Commitment,
    ) -> Result<Blockhash, LedgerError> {
        Ok(self.state.lock().latest_blockhash())
    }

    async fn get_fee_for_message(
        &self,
        message: &Message,
        _commitment: Commitment,
    ) -> Result<Option<u64>, LedgerError> {
        let st = self.state.lock();
        if !st.recent_blockhashes.contains(&message.recent_blockhash) {
            return Ok(None);
        }
        Ok(Some(
            st.fee_per_signature * u64::from(message.header.num_required_signatures),
        ))
    }

    async fn get_minimum_balance_for_rent_exemption(
        &self,
        data_len: usize,
    ) -> Result<u64, LedgerError> {
        Ok(rent_exempt_minimum(data_len))
    }

    async fn send_and_confirm_transaction(
        &self,
        tx: &Transaction,
        _commitment: Commitment,
    ) -> Result<Signature, LedgerError> {
        self.process_transaction(tx)
    }

    async fn get_signature_status(
        &self,
        signature: &Signature,
        _commitment: Commitment,
    ) -> Result<Option<TransactionStatus>, LedgerError> {
        Ok(self.state.lock().processed.get(signature).map(|failure| match failure {
            Some(err) => TransactionStatus::Failed(err.clone()),
            None => TransactionStatus::Confirmed,
        }))
    }
}

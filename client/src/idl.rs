//! # Program Interface Descriptions
//!
//! Anchor programs publish an interface file (IDL) listing each
//! instruction's name, its ordered accounts with signer/writable flags, and
//! its typed arguments. [`ProgramInterface`] loads such a file and turns a
//! named call into an [`Instruction`]:
//!
//! ```text
//! data = sha256("global:" ‖ snake_case(name))[..8] ‖ borsh(args...)
//! accounts = idl order, flags copied verbatim
//! ```
//!
//! The client does not reinterpret the flags. If the file is wrong, the
//! network says so.
//!
//! The vault program's interface ships with the crate; see
//! [`ProgramInterface::vault`].

use serde::Deserialize;
use thiserror::Error;

use crate::crypto::{sighash, Address};
use crate::transaction::{AccountMeta, Instruction};

const VAULT_IDL: &str = include_str!("../idl/wba_vault.json");

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdlError {
    #[error("malformed interface file: {0}")]
    Parse(String),

    #[error("program {program} has no instruction named {name}")]
    UnknownInstruction { program: String, name: String },

    #[error("instruction {instruction} needs account {account}")]
    MissingAccount {
        instruction: String,
        account: String,
    },

    #[error("instruction {instruction} has no account named {account}")]
    UnknownAccount {
        instruction: String,
        account: String,
    },

    #[error("instruction {instruction} takes {expected} arguments, got {got}")]
    ArgCount {
        instruction: String,
        expected: usize,
        got: usize,
    },

    #[error("argument {arg} of {instruction} must be {expected:?}")]
    ArgType {
        instruction: String,
        arg: String,
        expected: IdlType,
    },
}

// ---------------------------------------------------------------------------
// Interface file model
// ---------------------------------------------------------------------------

/// Argument types this client can encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IdlType {
    Bool,
    U8,
    U16,
    U32,
    U64,
    I64,
    PublicKey,
    String,
    Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IdlAccount {
    pub name: String,
    #[serde(rename = "isMut")]
    pub is_mut: bool,
    #[serde(rename = "isSigner")]
    pub is_signer: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IdlArg {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: IdlType,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IdlInstruction {
    pub name: String,
    pub accounts: Vec<IdlAccount>,
    #[serde(default)]
    pub args: Vec<IdlArg>,
}

#[derive(Debug, Deserialize)]
struct IdlDocument {
    name: String,
    instructions: Vec<IdlInstruction>,
}

/// A typed argument value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgValue {
    Bool(bool),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    I64(i64),
    PublicKey(Address),
    String(String),
    Bytes(Vec<u8>),
}

impl ArgValue {
    fn ty(&self) -> IdlType {
        match self {
            Self::Bool(_) => IdlType::Bool,
            Self::U8(_) => IdlType::U8,
            Self::U16(_) => IdlType::U16,
            Self::U32(_) => IdlType::U32,
            Self::U64(_) => IdlType::U64,
            Self::I64(_) => IdlType::I64,
            Self::PublicKey(_) => IdlType::PublicKey,
            Self::String(_) => IdlType::String,
            Self::Bytes(_) => IdlType::Bytes,
        }
    }

    /// Borsh encoding: little-endian integers, `u32` length prefixes.
    fn encode_into(&self, buf: &mut Vec<u8>) {
        match self {
            Self::Bool(v) => buf.push(u8::from(*v)),
            Self::U8(v) => buf.push(*v),
            Self::U16(v) => buf.extend_from_slice(&v.to_le_bytes()),
            Self::U32(v) => buf.extend_from_slice(&v.to_le_bytes()),
            Self::U64(v) => buf.extend_from_slice(&v.to_le_bytes()),
            Self::I64(v) => buf.extend_from_slice(&v.to_le_bytes()),
            Self::PublicKey(v) => buf.extend_from_slice(v.as_bytes()),
            Self::String(v) => {
                buf.extend_from_slice(&(v.len() as u32).to_le_bytes());
                buf.extend_from_slice(v.as_bytes());
            }
            Self::Bytes(v) => {
                buf.extend_from_slice(&(v.len() as u32).to_le_bytes());
                buf.extend_from_slice(v);
            }
        }
    }
}

/// `depositSpl` -> `deposit_spl`. Already-snake names pass through.
pub fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

// ---------------------------------------------------------------------------
// ProgramInterface
// ---------------------------------------------------------------------------

/// A deployed program plus its interface description.
#[derive(Debug, Clone)]
pub struct ProgramInterface {
    program_id: Address,
    name: String,
    instructions: Vec<IdlInstruction>,
}

impl ProgramInterface {
    /// Parses an Anchor interface file for the program at `program_id`.
    pub fn from_json(json: &str, program_id: Address) -> Result<Self, IdlError> {
        let doc: IdlDocument =
            serde_json::from_str(json).map_err(|e| IdlError::Parse(e.to_string()))?;
        Ok(Self {
            program_id,
            name: doc.name,
            instructions: doc.instructions,
        })
    }

    /// The bundled custody vault interface, bound to `program_id`.
    pub fn vault(program_id: Address) -> Result<Self, IdlError> {
        Self::from_json(VAULT_IDL, program_id)
    }

    pub fn program_id(&self) -> &Address {
        &self.program_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Looks up an instruction by its interface name or snake_case form.
    pub fn instruction_def(&self, name: &str) -> Option<&IdlInstruction> {
        let wanted = to_snake_case(name);
        self.instructions
            .iter()
            .find(|ix| to_snake_case(&ix.name) == wanted)
    }

    /// The 8-byte discriminator that prefixes the instruction's data.
    pub fn discriminator(&self, name: &str) -> [u8; 8] {
        sighash("global", &to_snake_case(name))
    }

    /// Builds the instruction `name` from named accounts and positional
    /// arguments.
    ///
    /// Every account the interface lists must be supplied, and nothing
    /// else. Argument count and types are checked against the interface.
    pub fn instruction(
        &self,
        name: &str,
        accounts: &[(&str, Address)],
        args: &[ArgValue],
    ) -> Result<Instruction, IdlError> {
        let def = self
            .instruction_def(name)
            .ok_or_else(|| IdlError::UnknownInstruction {
                program: self.name.clone(),
                name: name.to_string(),
            })?;

        if let Some((unknown, _)) = accounts
            .iter()
            .find(|(n, _)| !def.accounts.iter().any(|a| a.name == *n))
        {
            return Err(IdlError::UnknownAccount {
                instruction: def.name.clone(),
                account: unknown.to_string(),
            });
        }

        let metas = def
            .accounts
            .iter()
            .map(|acc| {
                let address = accounts
                    .iter()
                    .find(|(n, _)| *n == acc.name)
                    .map(|(_, a)| *a)
                    .ok_or_else(|| IdlError::MissingAccount {
                        instruction: def.name.clone(),
                        account: acc.name.clone(),
                    })?;
                Ok(AccountMeta {
                    address,
                    is_signer: acc.is_signer,
                    is_writable: acc.is_mut,
                })
            })
            .collect::<Result<Vec<_>, IdlError>>()?;

        if args.len() != def.args.len() {
            return Err(IdlError::ArgCount {
                instruction: def.name.clone(),
                expected: def.args.len(),
                got: args.len(),
            });
        }

        let mut data = self.discriminator(&def.name).to_vec();
        for (param, value) in def.args.iter().zip(args) {
            if value.ty() != param.ty {
                return Err(IdlError::ArgType {
                    instruction: def.name.clone(),
                    arg: param.name.clone(),
                    expected: param.ty,
                });
            }
            value.encode_into(&mut data);
        }

        tracing::debug!(
            program = %self.name,
            instruction = %def.name,
            accounts = metas.len(),
            data_len = data.len(),
            "encoded program instruction"
        );

        Ok(Instruction::new(self.program_id, metas, data))
    }
}

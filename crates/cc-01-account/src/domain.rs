//! Account rules shared by the mempool check and block execution.

use shared_types::Account;

/// CheckTx / ExecTxResult codes owned by this module.
pub mod codes {
    pub const UNDECODABLE: u32 = 1;
    pub const EMPTY_ADDRESS: u32 = 2;
    pub const ACCOUNT_EXISTS: u32 = 3;
}

/// Largest address accepted, in bytes.
pub const MAX_ADDRESS_LEN: usize = 128;

/// Why an account cannot be created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountRejection {
    EmptyAddress,
    AddressTooLong,
    AlreadyExists,
}

impl AccountRejection {
    pub fn code(&self) -> u32 {
        match self {
            Self::EmptyAddress | Self::AddressTooLong => codes::EMPTY_ADDRESS,
            Self::AlreadyExists => codes::ACCOUNT_EXISTS,
        }
    }

    pub fn log(&self) -> &'static str {
        match self {
            Self::EmptyAddress => "account address is empty",
            Self::AddressTooLong => "account address is too long",
            Self::AlreadyExists => "account already exists",
        }
    }
}

/// Stateless shape check.
pub fn validate_shape(account: &Account) -> Result<(), AccountRejection> {
    if account.address.trim().is_empty() {
        return Err(AccountRejection::EmptyAddress);
    }
    if account.address.len() > MAX_ADDRESS_LEN {
        return Err(AccountRejection::AddressTooLong);
    }
    Ok(())
}

//! Error types for TIDEMARK

use crate::types::ValidatorId;
use crate::Address;
use thiserror::Error;

/// Main error type for TIDEMARK
///
/// Every variant that can reject a transaction carries a stable numeric
/// code, see [`TidemarkError::code`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TidemarkError {
    // ============ Message Errors ============
    #[error("Invalid message: {0}")]
    InvalidMsg(String),

    #[error("Old txhash not allowed")]
    OldTx,

    // ============ Cryptography Errors ============
    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Invalid public key")]
    InvalidPublicKey,

    // ============ Checkpoint Errors ============
    #[error("Proposer is not valid, current proposer is {expected}")]
    InvalidProposerInput { expected: Address },

    #[error("Wrong roothash for given start and end block numbers")]
    BadBlockInput,

    #[error("Ack not valid")]
    BadAck,

    #[error("Checkpoint already exists in buffer, ACK expected, expires in {expires_in}s")]
    NoACK { expires_in: i64 },

    #[error("Invalid timestamp, it must be in near past")]
    BadTimeStamp,

    #[error("Invalid no-ack")]
    InvalidNoACK,

    #[error("Too many no-acks")]
    TooManyNoACK,

    #[error("Checkpoint not found")]
    NoCheckpointFound,

    #[error("Checkpoint already received for given start and end block")]
    OldCheckpoint,

    #[error("Checkpoint not in continuity")]
    DiscontinuousCheckpoint,

    // ============ Staking Errors ============
    #[error("Validator information not found")]
    NoValidator,

    #[error("Signer address doesn't match pubkey address")]
    ValSignerMismatch,

    #[error("Unable to connect to root chain")]
    NoConn,

    #[error("Please wait for {confirmations} confirmations before sending transaction")]
    WaitForConfirmation { confirmations: u64 },

    #[error("Validator set mismatch: {0}")]
    ValSetMisMatch(String),

    #[error("Invalid genesis: {0}")]
    InvalidGenesis(String),

    // ============ Reward Errors ============
    #[error("Error while fetching signers from transaction: {0}")]
    FetchCheckpointSigners(String),

    #[error("Error while computing signer rewards: {0}")]
    ComputeSignerRewards(String),

    #[error("Error while computing genesis account root hash")]
    ComputeGenesisAccountRoot,

    #[error("Account root hash mismatch")]
    AccountRootMismatch,

    #[error("Error while computing checkpoint rewards")]
    ComputeCheckpointRewards,

    // ============ Delegation Errors ============
    #[error("Delegator information not found")]
    NoDelegator,

    #[error("Delegator account not found")]
    NoDelegatorAccount,

    #[error("Delegator has already joined")]
    DelegatorAlreadyJoined,

    #[error("Delegator is already bonded to validator {0}")]
    DelegatorAlreadyBonded(ValidatorId),

    #[error("Delegator is already unbonded")]
    DelegatorAlreadyUnbonded,

    #[error("Unable to convert amount to power: {0}")]
    PowerConversion(String),

    // ============ State Errors ============
    #[error("State corruption detected: {0}")]
    StateCorruption(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Serialization failed: {0}")]
    SerializationError(String),

    // ============ Configuration Errors ============
    #[error("Configuration error: {0}")]
    ConfigError(String),

    // ============ General Errors ============
    #[error("Internal error: {0}")]
    Internal(String),
}

impl TidemarkError {
    /// Stable numeric code reported alongside rejected transactions
    pub fn code(&self) -> u32 {
        match self {
            TidemarkError::InvalidMsg(_) => 1400,

            TidemarkError::InvalidProposerInput { .. } => 1500,
            TidemarkError::BadBlockInput => 1501,
            TidemarkError::BadAck => 1502,
            TidemarkError::NoACK { .. } => 1503,
            TidemarkError::BadTimeStamp => 1504,
            TidemarkError::InvalidNoACK => 1505,
            TidemarkError::TooManyNoACK => 1506,
            TidemarkError::NoCheckpointFound => 1508,
            TidemarkError::OldCheckpoint => 1509,
            TidemarkError::DiscontinuousCheckpoint => 1510,

            TidemarkError::NoValidator => 2501,
            TidemarkError::ValSignerMismatch => 2502,
            TidemarkError::OldTx => 2508,
            TidemarkError::NoConn => 2509,
            TidemarkError::WaitForConfirmation { .. } => 2510,

            TidemarkError::ValSetMisMatch(_) => 3504,
            TidemarkError::InvalidGenesis(_) => 3506,

            TidemarkError::FetchCheckpointSigners(_) => 4501,
            TidemarkError::ComputeSignerRewards(_) => 4502,
            TidemarkError::ComputeGenesisAccountRoot => 4503,
            TidemarkError::AccountRootMismatch => 4504,
            TidemarkError::ComputeCheckpointRewards => 4505,

            TidemarkError::NoDelegator => 6501,
            TidemarkError::NoDelegatorAccount => 6501,
            TidemarkError::DelegatorAlreadyJoined => 6503,
            TidemarkError::DelegatorAlreadyBonded(_) => 6504,
            TidemarkError::DelegatorAlreadyUnbonded => 6505,
            TidemarkError::PowerConversion(_) => 6506,

            TidemarkError::InvalidSignature
            | TidemarkError::InvalidPublicKey
            | TidemarkError::StateCorruption(_)
            | TidemarkError::StorageError(_)
            | TidemarkError::SerializationError(_)
            | TidemarkError::ConfigError(_)
            | TidemarkError::Internal(_) => 1,
        }
    }
}

impl From<std::io::Error> for TidemarkError {
    fn from(err: std::io::Error) -> Self {
        TidemarkError::StorageError(err.to_string())
    }
}

impl From<bincode::Error> for TidemarkError {
    fn from(err: bincode::Error) -> Self {
        TidemarkError::SerializationError(err.to_string())
    }
}

impl From<serde_json::Error> for TidemarkError {
    fn from(err: serde_json::Error) -> Self {
        TidemarkError::SerializationError(err.to_string())
    }
}

//! Checkpoint message handlers
//!
//! A proposal occupies the single buffer slot until it is acknowledged or
//! until a later proposal arrives after the buffer time has run out. Acks
//! promote the buffer to a confirmed header, pay the signers and rotate the
//! proposer. A no-ack only rotates the proposer.

use serde::{Deserialize, Serialize};
use tidemark_core::{
    Address, CheckpointStaking, Clock, EventKind, KvStore, RootChainEvent, RootChainOracle,
    RootHashValidator, TidemarkError, TidemarkResult,
};
use tracing::{debug, error, info};

use crate::account_root::account_root_hash;
use crate::keeper::CheckpointKeeper;
use crate::msg::{MsgCheckpoint, MsgCheckpointAck, MsgCheckpointNoAck};

/// Result of an accepted checkpoint message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CheckpointEvent {
    CheckpointBuffered {
        proposer: Address,
        start_block: u64,
        end_block: u64,
    },
    CheckpointAcknowledged {
        header_index: u64,
        new_proposer: Option<Address>,
    },
    CheckpointNoAck {
        new_proposer: Option<Address>,
    },
}

/// Checkpoint state machine bound to its collaborators
pub struct CheckpointHandler<'a> {
    keeper: &'a CheckpointKeeper,
    staking: &'a dyn CheckpointStaking,
    oracle: &'a dyn RootChainOracle,
    root_validator: &'a dyn RootHashValidator,
    clock: &'a dyn Clock,
}

impl<'a> CheckpointHandler<'a> {
    pub fn new(
        keeper: &'a CheckpointKeeper,
        staking: &'a dyn CheckpointStaking,
        oracle: &'a dyn RootChainOracle,
        root_validator: &'a dyn RootHashValidator,
        clock: &'a dyn Clock,
    ) -> Self {
        Self {
            keeper,
            staking,
            oracle,
            root_validator,
            clock,
        }
    }

    pub fn handle_checkpoint(
        &self,
        store: &mut dyn KvStore,
        msg: &MsgCheckpoint,
    ) -> TidemarkResult<CheckpointEvent> {
        debug!(start = msg.start_block, end = msg.end_block, proposer = %msg.proposer, "Validating checkpoint");
        msg.validate_basic()?;

        let now = self.clock.now().as_secs();
        if msg.timestamp == 0 || msg.timestamp > now {
            error!(now, checkpoint_time = msg.timestamp, "Checkpoint timestamp must be in near past");
            return Err(TidemarkError::BadTimeStamp);
        }

        let buffer_time = self.keeper.params().checkpoint_buffer_time;
        if let Some(buffered) = self.keeper.get_checkpoint_from_buffer(store)? {
            let expired = buffered.timestamp == 0
                || (msg.timestamp > buffered.timestamp
                    && msg.timestamp - buffered.timestamp >= buffer_time);
            if !expired {
                let expiry = buffered.timestamp.saturating_add(buffer_time);
                let expires_in = expiry as i64 - now as i64;
                error!(checkpoint = %buffered, expires_in, "Checkpoint already exists in buffer");
                return Err(TidemarkError::NoACK { expires_in });
            }
            debug!(
                timestamp = msg.timestamp,
                buffered_timestamp = buffered.timestamp,
                "Checkpoint timed out, flushing buffer"
            );
            self.keeper.flush_checkpoint_buffer(store)?;
        }

        if !self
            .root_validator
            .validate_range(msg.start_block, msg.end_block, &msg.root_hash)
        {
            error!(start = msg.start_block, end = msg.end_block, root = %msg.root_hash, "Root hash is not valid");
            return Err(TidemarkError::BadBlockInput);
        }

        match self.keeper.get_last_checkpoint(store) {
            Ok(last) => {
                if last.end_block >= msg.start_block {
                    error!(tip = last.end_block, start = msg.start_block, "Checkpoint already exists");
                    return Err(TidemarkError::OldCheckpoint);
                }
                if last.end_block + 1 != msg.start_block {
                    error!(tip = last.end_block, start = msg.start_block, "Checkpoint not in continuity");
                    return Err(TidemarkError::DiscontinuousCheckpoint);
                }
                if last.account_root_hash != msg.account_root_hash {
                    error!(
                        expected = %last.account_root_hash,
                        got = %msg.account_root_hash,
                        "Account root hash does not match last checkpoint"
                    );
                    return Err(TidemarkError::BadBlockInput);
                }
            }
            Err(TidemarkError::NoCheckpointFound) => {
                if msg.start_block != 0 {
                    error!(start = msg.start_block, "First checkpoint must start from block 0");
                    return Err(TidemarkError::BadBlockInput);
                }
                let accounts = self.staking.validator_accounts(store)?;
                let genesis_root = account_root_hash(&accounts).map_err(|err| {
                    error!(error = %err, "Unable to compute genesis account root");
                    TidemarkError::ComputeGenesisAccountRoot
                })?;
                if genesis_root != msg.account_root_hash {
                    error!(expected = %genesis_root, got = %msg.account_root_hash, "Genesis account root mismatch");
                    return Err(TidemarkError::AccountRootMismatch);
                }
            }
            Err(err) => return Err(err),
        }

        let expected = self
            .staking
            .current_proposer(store)?
            .map(|v| v.signer)
            .unwrap_or(Address::ZERO);
        if msg.proposer != expected {
            error!(current = %expected, proposer = %msg.proposer, "Invalid proposer in checkpoint");
            return Err(TidemarkError::InvalidProposerInput { expected });
        }

        let header = msg.to_header();
        self.keeper.set_checkpoint_buffer(store, &header)?;
        info!(checkpoint = %header, "Buffered checkpoint awaiting ack");

        Ok(CheckpointEvent::CheckpointBuffered {
            proposer: msg.proposer,
            start_block: msg.start_block,
            end_block: msg.end_block,
        })
    }

    pub fn handle_checkpoint_ack(
        &self,
        store: &mut dyn KvStore,
        msg: &MsgCheckpointAck,
    ) -> TidemarkResult<CheckpointEvent> {
        debug!(header_block = msg.header_block, tx = %msg.tx_hash, "Validating checkpoint ack");
        msg.validate_basic()?;

        let info = self.oracle.header_block(msg.header_block).map_err(|err| {
            error!(error = %err, header_block = msg.header_block, "Unable to fetch header from root chain");
            TidemarkError::BadAck
        })?;

        let latest = self.oracle.latest_root_chain_height().map_err(|err| {
            error!(error = %err, "Unable to reach root chain");
            TidemarkError::NoConn
        })?;
        let confirmations = self.keeper.params().confirmation_blocks;
        if latest.saturating_sub(info.created_at) < confirmations {
            error!(latest, created_at = info.created_at, "Not enough confirmations");
            return Err(TidemarkError::WaitForConfirmation { confirmations });
        }

        let mut header = self.keeper.get_checkpoint_from_buffer(store)?.ok_or_else(|| {
            error!("No checkpoint in buffer");
            TidemarkError::BadAck
        })?;
        if info.start_block != header.start_block {
            error!(expected = header.start_block, got = info.start_block, "Invalid start block");
            return Err(TidemarkError::BadAck);
        }
        if info.end_block == header.end_block && info.root_hash != header.root_hash {
            error!(expected = %header.root_hash, got = %info.root_hash, "Root hash mismatch in ack");
            return Err(TidemarkError::BadAck);
        }
        if header.end_block > info.end_block {
            // proposer stays as buffered
            info!(
                old_end = header.end_block,
                adjusted_end = info.end_block,
                "Adjusting end block to the one submitted on chain"
            );
            header.end_block = info.end_block;
            header.root_hash = info.root_hash;
        }

        let votes = self.oracle.vote_signatures(&msg.tx_hash).map_err(|err| {
            error!(error = %err, "Unable to fetch signers from transaction");
            TidemarkError::FetchCheckpointSigners(err.to_string())
        })?;

        let receipt = self
            .oracle
            .confirmed_receipt(&msg.tx_hash)
            .ok()
            .flatten()
            .ok_or(TidemarkError::WaitForConfirmation { confirmations })?;

        let reward = match self
            .oracle
            .decode_event(&receipt, msg.log_index, EventKind::NewHeaderBlock)
        {
            Ok(RootChainEvent::NewHeaderBlock { reward, .. }) => reward,
            _ => {
                error!(tx = %msg.tx_hash, log_index = msg.log_index, "Unable to fetch header block event");
                return Err(TidemarkError::InvalidMsg(
                    "unable to fetch logs for tx hash".to_string(),
                ));
            }
        };
        info!(reward = %reward, "Fetched checkpoint reward from event");

        let rewards = self
            .staking
            .calculate_signer_rewards(store, &header.proposer, &votes, reward)
            .map_err(|err| {
                error!(error = %err, "Unable to calculate signer rewards");
                TidemarkError::ComputeCheckpointRewards
            })?;
        self.staking.update_validator_rewards(store, &rewards)?;

        let accounts = self.staking.validator_accounts(store)?;
        header.account_root_hash = account_root_hash(&accounts)?;
        debug!(account_root = %header.account_root_hash, "Computed validator account root");

        self.keeper.add_checkpoint(store, msg.header_block, &header)?;
        self.keeper.flush_checkpoint_buffer(store)?;
        let ack_count = self.keeper.update_ack_count(store)?;

        self.staking.increment_accum(store, 1)?;
        let new_proposer = self.staking.current_proposer(store)?;
        info!(
            ack_count,
            header_block = msg.header_block,
            proposer = ?new_proposer.as_ref().map(|v| v.signer),
            "Checkpoint acknowledged"
        );

        Ok(CheckpointEvent::CheckpointAcknowledged {
            header_index: msg.header_block,
            new_proposer: new_proposer.map(|v| v.signer),
        })
    }

    pub fn handle_checkpoint_no_ack(
        &self,
        store: &mut dyn KvStore,
        msg: &MsgCheckpointNoAck,
    ) -> TidemarkResult<CheckpointEvent> {
        debug!(timestamp = msg.timestamp, "Validating checkpoint no-ack");
        msg.validate_basic()?;

        let buffer_time = self.keeper.params().checkpoint_buffer_time;
        let current = msg.timestamp;

        let last_checkpoint_time = match self.keeper.get_last_checkpoint(store) {
            Ok(last) => last.timestamp,
            Err(TidemarkError::NoCheckpointFound) => 0,
            Err(err) => return Err(err),
        };
        if last_checkpoint_time > current || current - last_checkpoint_time < buffer_time {
            debug!(last_checkpoint_time, current, "Invalid no-ack, buffer period ongoing");
            return Err(TidemarkError::InvalidNoACK);
        }

        let last_no_ack = self.keeper.get_last_no_ack(store)?;
        if last_no_ack > current || current - last_no_ack < buffer_time {
            debug!(last_no_ack, current, "Too many no-acks");
            return Err(TidemarkError::TooManyNoACK);
        }

        self.keeper.set_last_no_ack(store, current)?;
        self.staking.increment_accum(store, 1)?;

        let new_proposer = self.staking.current_proposer(store)?.map(|v| v.signer);
        info!(last_no_ack = current, proposer = ?new_proposer, "Checkpoint no-ack accepted");

        Ok(CheckpointEvent::CheckpointNoAck { new_proposer })
    }
}

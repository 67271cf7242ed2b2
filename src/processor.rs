// Autoraffle - Processor
use solana_program::{
    account_info::{next_account_info, AccountInfo},
    entrypoint::ProgramResult,
    msg,
    program::{invoke, invoke_signed, set_return_data},
    program_error::ProgramError,
    pubkey::Pubkey,
    system_instruction,
    sysvar::{clock::Clock, rent::Rent, Sysvar},
};

use crate::error::RaffleError;
use crate::instruction::RaffleInstruction;
use crate::state::{find_raffle_address, Raffle, RAFFLE_SEED};
use crate::vrf;

pub struct Processor;

impl Processor {
    pub fn process(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        instruction_data: &[u8],
    ) -> ProgramResult {
        let instruction = RaffleInstruction::unpack(instruction_data)?;

        match instruction {
            RaffleInstruction::Initialize {
                entrance_fee,
                interval,
                callback_gas_limit,
                min_oracle_confirmations,
            } => {
                msg!("Instruction: Initialize");
                Self::process_initialize(
                    accounts,
                    entrance_fee,
                    interval,
                    callback_gas_limit,
                    min_oracle_confirmations,
                    program_id,
                )
            }
            RaffleInstruction::Enter { amount } => {
                msg!("Instruction: Enter");
                Self::process_enter(accounts, amount, program_id)
            }
            RaffleInstruction::CheckUpkeep => {
                msg!("Instruction: Check Upkeep");
                Self::process_check_upkeep(accounts, program_id)
            }
            RaffleInstruction::PerformUpkeep { payload } => {
                msg!("Instruction: Perform Upkeep");
                Self::process_perform_upkeep(accounts, &payload, program_id)
            }
            RaffleInstruction::SettleRound => {
                msg!("Instruction: Settle Round");
                Self::process_settle_round(accounts, program_id)
            }
        }
    }

    /// Create the raffle account and record the immutable configuration.
    /// One-time; a second call is rejected.
    fn process_initialize(
        accounts: &[AccountInfo],
        entrance_fee: u64,
        interval: i64,
        callback_gas_limit: u32,
        min_oracle_confirmations: u16,
        program_id: &Pubkey,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let payer_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;
        let oracle_queue_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        if !payer_info.is_signer {
            msg!("Payer must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }

        let (expected_raffle_address, bump_seed) = find_raffle_address(program_id);
        if *raffle_info.key != expected_raffle_address {
            msg!("Invalid raffle account address");
            return Err(ProgramError::InvalidArgument);
        }

        if entrance_fee == 0 {
            msg!("Entrance fee must be greater than zero");
            return Err(ProgramError::InvalidArgument);
        }
        if interval <= 0 {
            msg!("Interval must be greater than zero");
            return Err(ProgramError::InvalidArgument);
        }

        if raffle_info.owner == program_id {
            let existing = Raffle::load(&raffle_info.data.borrow())?;
            if existing.is_initialized {
                msg!("Raffle account is already initialized");
                return Err(ProgramError::AccountAlreadyInitialized);
            }
        } else {
            let rent = Rent::get()?;
            let rent_lamports = rent.minimum_balance(Raffle::SIZE);

            invoke_signed(
                &system_instruction::create_account(
                    payer_info.key,
                    raffle_info.key,
                    rent_lamports,
                    Raffle::SIZE as u64,
                    program_id,
                ),
                &[
                    payer_info.clone(),
                    raffle_info.clone(),
                    system_program_info.clone(),
                ],
                &[&[RAFFLE_SEED, &[bump_seed]]],
            )?;
        }

        let clock = Clock::get()?;
        let raffle = Raffle::new(
            *payer_info.key,
            *oracle_queue_info.key,
            entrance_fee,
            interval,
            callback_gas_limit,
            min_oracle_confirmations,
            clock.unix_timestamp,
        );
        raffle.store(&mut raffle_info.data.borrow_mut())?;

        msg!(
            "Raffle initialized: fee={} lamports, interval={}s, queue={}",
            entrance_fee,
            interval,
            oracle_queue_info.key
        );
        Ok(())
    }

    /// Record one paid entry: the fee moves into the pool held by the
    /// raffle account and the entrant gets one slot in the current round.
    fn process_enter(accounts: &[AccountInfo], amount: u64, program_id: &Pubkey) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let entrant_info = next_account_info(account_info_iter)?;
        let raffle_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        if !entrant_info.is_signer {
            msg!("Entrant must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }
        if raffle_info.owner != program_id {
            msg!("Raffle account must be owned by this program");
            return Err(ProgramError::IncorrectProgramId);
        }

        let mut raffle = Raffle::load(&raffle_info.data.borrow())?;
        if !raffle.is_initialized {
            return Err(ProgramError::UninitializedAccount);
        }

        // validate and record the slot before any lamports move
        raffle.enter(*entrant_info.key, amount)?;

        invoke(
            &system_instruction::transfer(entrant_info.key, raffle_info.key, amount),
            &[
                entrant_info.clone(),
                raffle_info.clone(),
                system_program_info.clone(),
            ],
        )?;

        raffle.store(&mut raffle_info.data.borrow_mut())?;

        msg!(
            "Entrant joined: {} paid {} lamports, {} slots in round",
            entrant_info.key,
            amount,
            raffle.entrant_count()
        );
        Ok(())
    }

    /// Evaluate the upkeep predicate without mutating anything. The
    /// verdict is logged and published as return data (a leading flag
    /// byte followed by the opaque payload) for simulating bots.
    fn process_check_upkeep(accounts: &[AccountInfo], program_id: &Pubkey) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let raffle_info = next_account_info(account_info_iter)?;

        if raffle_info.owner != program_id {
            msg!("Raffle account must be owned by this program");
            return Err(ProgramError::IncorrectProgramId);
        }

        let raffle = Raffle::load(&raffle_info.data.borrow())?;
        if !raffle.is_initialized {
            return Err(ProgramError::UninitializedAccount);
        }

        let clock = Clock::get()?;
        let (needed, payload) = raffle.check_upkeep(clock.unix_timestamp);

        msg!(
            "Upkeep check: needed={} state={:?} pool={} entrants={} elapsed={}s",
            needed,
            raffle.state,
            raffle.pool_balance,
            raffle.entrant_count(),
            clock.unix_timestamp.saturating_sub(raffle.round_start_time)
        );

        let mut return_data = Vec::with_capacity(1 + payload.len());
        return_data.push(needed as u8);
        return_data.extend_from_slice(&payload);
        set_return_data(&return_data);

        Ok(())
    }

    /// Close entry for the round and issue exactly one randomness request.
    /// The predicate is re-evaluated here; the caller's view is never
    /// trusted and the carried payload is not interpreted.
    fn process_perform_upkeep(
        accounts: &[AccountInfo],
        _payload: &[u8],
        program_id: &Pubkey,
    ) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let raffle_info = next_account_info(account_info_iter)?;
        let vrf_info = next_account_info(account_info_iter)?;
        let payer_info = next_account_info(account_info_iter)?;
        let switchboard_program_info = next_account_info(account_info_iter)?;
        let oracle_queue_info = next_account_info(account_info_iter)?;
        let token_program_info = next_account_info(account_info_iter)?;
        let remaining_accounts: Vec<AccountInfo> = account_info_iter.cloned().collect();

        if raffle_info.owner != program_id {
            msg!("Raffle account must be owned by this program");
            return Err(ProgramError::IncorrectProgramId);
        }

        let mut raffle = Raffle::load(&raffle_info.data.borrow())?;
        if !raffle.is_initialized {
            return Err(ProgramError::UninitializedAccount);
        }

        let clock = Clock::get()?;
        let (needed, _) = raffle.check_upkeep(clock.unix_timestamp);
        if !needed {
            msg!(
                "Upkeep not needed: state={:?} pool={} entrants={} elapsed={}s",
                raffle.state,
                raffle.pool_balance,
                raffle.entrant_count(),
                clock.unix_timestamp.saturating_sub(raffle.round_start_time)
            );
            return Err(RaffleError::UpkeepNotNeeded.into());
        }

        if *oracle_queue_info.key != raffle.oracle_queue {
            msg!(
                "Oracle queue {} does not match configured queue {}",
                oracle_queue_info.key,
                raffle.oracle_queue
            );
            return Err(RaffleError::OracleQueueMismatch.into());
        }

        vrf::request_randomness(
            switchboard_program_info,
            vrf_info,
            payer_info,
            oracle_queue_info,
            token_program_info,
            &remaining_accounts,
            raffle.callback_gas_limit,
            raffle.min_oracle_confirmations,
        )?;

        raffle.begin_settlement(*vrf_info.key, clock.unix_timestamp)?;
        raffle.store(&mut raffle_info.data.borrow_mut())?;

        msg!(
            "Settlement requested: request={} pool={} entrants={}",
            vrf_info.key,
            raffle.pool_balance,
            raffle.entrant_count()
        );
        Ok(())
    }

    /// Deliver the randomness fulfillment: verify the oracle result for
    /// the pending request, pay the whole pool to the selected entrant
    /// and reopen the round. Nothing is committed unless the payout
    /// succeeds, so a failed transfer leaves the request retryable.
    fn process_settle_round(accounts: &[AccountInfo], program_id: &Pubkey) -> ProgramResult {
        let account_info_iter = &mut accounts.iter();
        let raffle_info = next_account_info(account_info_iter)?;
        let vrf_info = next_account_info(account_info_iter)?;
        let winner_info = next_account_info(account_info_iter)?;

        if raffle_info.owner != program_id {
            msg!("Raffle account must be owned by this program");
            return Err(ProgramError::IncorrectProgramId);
        }

        let mut raffle = Raffle::load(&raffle_info.data.borrow())?;
        if !raffle.is_initialized {
            return Err(ProgramError::UninitializedAccount);
        }

        // the request id gate comes first: a stale or never-issued id is
        // rejected before the oracle account is even parsed
        if !raffle.is_pending_request(vrf_info.key) {
            msg!("No pending randomness request matches {}", vrf_info.key);
            return Err(RaffleError::UnknownRequest.into());
        }

        let result = vrf::verify_result(vrf_info)?;
        let random_words = vrf::random_words(&result);

        let clock = Clock::get()?;
        let settlement = raffle.settle(*vrf_info.key, &random_words, clock.unix_timestamp)?;

        if *winner_info.key != settlement.winner {
            msg!(
                "Winner account {} does not match selected entrant {}",
                winner_info.key,
                settlement.winner
            );
            return Err(RaffleError::WinnerMismatch.into());
        }

        // move the pool, then commit the reopened round; the raffle
        // account keeps its rent-exempt reserve
        let raffle_remaining = raffle_info
            .lamports()
            .checked_sub(settlement.payout)
            .ok_or(RaffleError::PayoutFailed)?;
        let winner_total = winner_info
            .lamports()
            .checked_add(settlement.payout)
            .ok_or(RaffleError::PayoutFailed)?;
        **raffle_info.try_borrow_mut_lamports()? = raffle_remaining;
        **winner_info.try_borrow_mut_lamports()? = winner_total;

        raffle.store(&mut raffle_info.data.borrow_mut())?;

        msg!(
            "Winner picked: {} paid {} lamports, round {} settled",
            settlement.winner,
            settlement.payout,
            raffle.rounds_settled
        );
        Ok(())
    }
}

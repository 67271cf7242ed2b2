// Autoraffle - Instructions
use solana_program::{
    instruction::{AccountMeta, Instruction},
    program_error::ProgramError,
    pubkey::Pubkey,
    system_program,
};

use crate::state::find_raffle_address;

#[derive(Clone, Debug, PartialEq)]
pub enum RaffleInstruction {
    /// Initialize the raffle for this deployment. One-time; configuration
    /// is immutable afterwards.
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` Payer funding the raffle account
    /// 1. `[writable]` The raffle account (PDA, seed "raffle")
    /// 2. `[]` Oracle queue the randomness requests will target
    /// 3. `[]` The system program
    Initialize {
        /// Minimum payment to enter, in lamports
        entrance_fee: u64,
        /// Minimum elapsed seconds before settlement becomes eligible
        interval: i64,
        /// Oracle request parameter, forwarded uninterpreted
        callback_gas_limit: u32,
        /// Oracle confirmation depth, forwarded uninterpreted
        min_oracle_confirmations: u16,
    },

    /// Enter the current round by paying `amount` lamports into the pool.
    /// Overpayment above the entrance fee is retained.
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` The entrant paying the fee
    /// 1. `[writable]` The raffle account
    /// 2. `[]` The system program
    Enter {
        /// Lamports to pay; must be at least the entrance fee
        amount: u64,
    },

    /// Evaluate the upkeep predicate. Read-only: logs the verdict and
    /// publishes it via return data so automation bots can simulate this
    /// instruction instead of submitting it.
    ///
    /// Accounts expected:
    /// 0. `[]` The raffle account
    CheckUpkeep,

    /// Close entry and issue the randomness request. Permissionless: the
    /// predicate is re-evaluated on chain and the call fails when it does
    /// not hold.
    ///
    /// Accounts expected:
    /// 0. `[writable]` The raffle account
    /// 1. `[writable]` The VRF account (owned by Switchboard)
    /// 2. `[signer, writable]` Payer for the oracle request
    /// 3. `[]` The Switchboard program
    /// 4. `[]` The oracle queue (must match the configured queue)
    /// 5. `[]` The token program
    /// Remaining accounts: queue-side accounts required by Switchboard
    PerformUpkeep {
        /// Opaque carry-through from the upkeep check; not interpreted
        payload: Vec<u8>,
    },

    /// Deliver the randomness fulfillment: verify the oracle result for
    /// the pending request, pay the whole pool to the selected entrant and
    /// reopen the round.
    ///
    /// Accounts expected:
    /// 0. `[writable]` The raffle account
    /// 1. `[]` The VRF account holding the resolved result
    /// 2. `[writable]` The winner (must be the selected entrant)
    SettleRound,
}

impl RaffleInstruction {
    /// Unpacks a byte buffer into a RaffleInstruction
    pub fn unpack(input: &[u8]) -> Result<Self, ProgramError> {
        let (tag, rest) = input
            .split_first()
            .ok_or(ProgramError::InvalidInstructionData)?;

        Ok(match tag {
            0 => {
                let (entrance_fee, rest) = Self::unpack_u64(rest)?;
                let (interval, rest) = Self::unpack_i64(rest)?;
                let (callback_gas_limit, rest) = Self::unpack_u32(rest)?;
                let (min_oracle_confirmations, _) = Self::unpack_u16(rest)?;
                Self::Initialize {
                    entrance_fee,
                    interval,
                    callback_gas_limit,
                    min_oracle_confirmations,
                }
            }
            1 => {
                let (amount, _) = Self::unpack_u64(rest)?;
                Self::Enter { amount }
            }
            2 => Self::CheckUpkeep,
            3 => {
                let (payload, _) = Self::unpack_bytes(rest)?;
                Self::PerformUpkeep { payload }
            }
            4 => Self::SettleRound,
            _ => return Err(ProgramError::InvalidInstructionData),
        })
    }

    /// Packs a RaffleInstruction into a byte buffer
    pub fn pack(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        match self {
            Self::Initialize {
                entrance_fee,
                interval,
                callback_gas_limit,
                min_oracle_confirmations,
            } => {
                buf.push(0);
                buf.extend_from_slice(&entrance_fee.to_le_bytes());
                buf.extend_from_slice(&interval.to_le_bytes());
                buf.extend_from_slice(&callback_gas_limit.to_le_bytes());
                buf.extend_from_slice(&min_oracle_confirmations.to_le_bytes());
            }
            Self::Enter { amount } => {
                buf.push(1);
                buf.extend_from_slice(&amount.to_le_bytes());
            }
            Self::CheckUpkeep => buf.push(2),
            Self::PerformUpkeep { payload } => {
                buf.push(3);
                buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
                buf.extend_from_slice(payload);
            }
            Self::SettleRound => buf.push(4),
        }
        buf
    }

    fn unpack_u64(input: &[u8]) -> Result<(u64, &[u8]), ProgramError> {
        if input.len() < 8 {
            return Err(ProgramError::InvalidInstructionData);
        }
        let (bytes, rest) = input.split_at(8);
        let value = u64::from_le_bytes(
            bytes
                .try_into()
                .map_err(|_| ProgramError::InvalidInstructionData)?,
        );
        Ok((value, rest))
    }

    fn unpack_i64(input: &[u8]) -> Result<(i64, &[u8]), ProgramError> {
        let (value, rest) = Self::unpack_u64(input)?;
        Ok((value as i64, rest))
    }

    fn unpack_u32(input: &[u8]) -> Result<(u32, &[u8]), ProgramError> {
        if input.len() < 4 {
            return Err(ProgramError::InvalidInstructionData);
        }
        let (bytes, rest) = input.split_at(4);
        let value = u32::from_le_bytes(
            bytes
                .try_into()
                .map_err(|_| ProgramError::InvalidInstructionData)?,
        );
        Ok((value, rest))
    }

    fn unpack_u16(input: &[u8]) -> Result<(u16, &[u8]), ProgramError> {
        if input.len() < 2 {
            return Err(ProgramError::InvalidInstructionData);
        }
        let (bytes, rest) = input.split_at(2);
        let value = u16::from_le_bytes(
            bytes
                .try_into()
                .map_err(|_| ProgramError::InvalidInstructionData)?,
        );
        Ok((value, rest))
    }

    fn unpack_bytes(input: &[u8]) -> Result<(Vec<u8>, &[u8]), ProgramError> {
        let (len, rest) = Self::unpack_u32(input)?;
        let len = len as usize;
        if rest.len() < len {
            return Err(ProgramError::InvalidInstructionData);
        }
        let (bytes, rest) = rest.split_at(len);
        Ok((bytes.to_vec(), rest))
    }
}

/// Create an initialize instruction
pub fn initialize(
    program_id: &Pubkey,
    payer: &Pubkey,
    oracle_queue: &Pubkey,
    entrance_fee: u64,
    interval: i64,
    callback_gas_limit: u32,
    min_oracle_confirmations: u16,
) -> Instruction {
    let data = RaffleInstruction::Initialize {
        entrance_fee,
        interval,
        callback_gas_limit,
        min_oracle_confirmations,
    }
    .pack();
    let (raffle_address, _) = find_raffle_address(program_id);

    let accounts = vec![
        AccountMeta::new(*payer, true),
        AccountMeta::new(raffle_address, false),
        AccountMeta::new_readonly(*oracle_queue, false),
        AccountMeta::new_readonly(system_program::id(), false),
    ];

    Instruction {
        program_id: *program_id,
        accounts,
        data,
    }
}

/// Create an enter instruction
pub fn enter(program_id: &Pubkey, entrant: &Pubkey, amount: u64) -> Instruction {
    let data = RaffleInstruction::Enter { amount }.pack();
    let (raffle_address, _) = find_raffle_address(program_id);

    let accounts = vec![
        AccountMeta::new(*entrant, true),
        AccountMeta::new(raffle_address, false),
        AccountMeta::new_readonly(system_program::id(), false),
    ];

    Instruction {
        program_id: *program_id,
        accounts,
        data,
    }
}

/// Create a check-upkeep instruction
pub fn check_upkeep(program_id: &Pubkey) -> Instruction {
    let (raffle_address, _) = find_raffle_address(program_id);

    Instruction {
        program_id: *program_id,
        accounts: vec![AccountMeta::new_readonly(raffle_address, false)],
        data: RaffleInstruction::CheckUpkeep.pack(),
    }
}

/// Create a perform-upkeep instruction
pub fn perform_upkeep(
    program_id: &Pubkey,
    vrf_account: &Pubkey,
    payer: &Pubkey,
    switchboard_program: &Pubkey,
    oracle_queue: &Pubkey,
    oracle_accounts: &[AccountMeta],
    payload: Vec<u8>,
) -> Instruction {
    let data = RaffleInstruction::PerformUpkeep { payload }.pack();
    let (raffle_address, _) = find_raffle_address(program_id);

    let mut accounts = vec![
        AccountMeta::new(raffle_address, false),
        AccountMeta::new(*vrf_account, false),
        AccountMeta::new(*payer, true),
        AccountMeta::new_readonly(*switchboard_program, false),
        AccountMeta::new_readonly(*oracle_queue, false),
        AccountMeta::new_readonly(spl_token::id(), false),
    ];
    accounts.extend_from_slice(oracle_accounts);

    Instruction {
        program_id: *program_id,
        accounts,
        data,
    }
}

/// Create a settle-round instruction
pub fn settle_round(program_id: &Pubkey, vrf_account: &Pubkey, winner: &Pubkey) -> Instruction {
    let data = RaffleInstruction::SettleRound.pack();
    let (raffle_address, _) = find_raffle_address(program_id);

    let accounts = vec![
        AccountMeta::new(raffle_address, false),
        AccountMeta::new_readonly(*vrf_account, false),
        AccountMeta::new(*winner, false),
    ];

    Instruction {
        program_id: *program_id,
        accounts,
        data,
    }
}

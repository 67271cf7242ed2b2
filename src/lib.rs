//! Autoraffle - a self-operating lottery program.
//!
//! Participants pay a fixed entrance fee to join the pool; once the
//! configured interval has elapsed, a permissionless upkeep call closes
//! entry and requests a verifiable random value from Switchboard VRF, and
//! the fulfillment pays the entire pool to the selected entrant and
//! reopens the round.

pub mod entrypoint;
pub mod error;
pub mod instruction;
pub mod processor;
pub mod state;
pub mod vrf;

use solana_program::{
    account_info::AccountInfo, entrypoint::ProgramResult, pubkey::Pubkey,
};

pub fn process_instruction(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    instruction_data: &[u8],
) -> ProgramResult {
    processor::Processor::process(program_id, accounts, instruction_data)
}

// Switchboard VRF integration for the autoraffle program
use solana_program::{
    account_info::AccountInfo,
    entrypoint::ProgramResult,
    instruction::{AccountMeta, Instruction},
    msg,
    program::invoke,
    program_error::ProgramError,
};
use switchboard_v2::{VrfAccountData, SWITCHBOARD_PROGRAM_ID};

use crate::error::RaffleError;

/// Randomness-request instruction tag understood by the oracle program
const REQUEST_RANDOMNESS_TAG: u8 = 1;

/// Submit a randomness request for the given VRF account.
///
/// The gas limit and confirmation depth come from the raffle configuration
/// and are forwarded to the oracle uninterpreted. `remaining_accounts` are
/// the queue-side accounts Switchboard needs (data buffer, permission,
/// escrow, payer wallet, sysvars); they are passed through with the
/// caller's own signer/writable flags.
pub fn request_randomness<'a>(
    switchboard_program_info: &AccountInfo<'a>,
    vrf_info: &AccountInfo<'a>,
    payer_info: &AccountInfo<'a>,
    oracle_queue_info: &AccountInfo<'a>,
    token_program_info: &AccountInfo<'a>,
    remaining_accounts: &[AccountInfo<'a>],
    callback_gas_limit: u32,
    min_confirmations: u16,
) -> ProgramResult {
    if !payer_info.is_signer {
        msg!("Payer must sign the randomness request");
        return Err(ProgramError::MissingRequiredSignature);
    }
    if *switchboard_program_info.key != SWITCHBOARD_PROGRAM_ID {
        msg!("Oracle program account is not the Switchboard program");
        return Err(ProgramError::IncorrectProgramId);
    }
    if vrf_info.owner != &SWITCHBOARD_PROGRAM_ID {
        msg!("VRF account not owned by the Switchboard program");
        return Err(ProgramError::IllegalOwner);
    }
    // the oracle escrow is token-denominated; Switchboard expects the token
    // program among the request accounts
    if *token_program_info.key != spl_token::id() {
        msg!("Token program account mismatch");
        return Err(ProgramError::IncorrectProgramId);
    }

    let mut data = Vec::with_capacity(1 + 4 + 2);
    data.push(REQUEST_RANDOMNESS_TAG);
    data.extend_from_slice(&callback_gas_limit.to_le_bytes());
    data.extend_from_slice(&min_confirmations.to_le_bytes());

    let mut accounts = vec![
        AccountMeta::new(*vrf_info.key, false),
        AccountMeta::new(*payer_info.key, true),
        AccountMeta::new_readonly(*oracle_queue_info.key, false),
        AccountMeta::new_readonly(*token_program_info.key, false),
    ];
    let mut account_infos = vec![
        vrf_info.clone(),
        payer_info.clone(),
        oracle_queue_info.clone(),
        token_program_info.clone(),
    ];
    for info in remaining_accounts {
        accounts.push(AccountMeta {
            pubkey: *info.key,
            is_signer: info.is_signer,
            is_writable: info.is_writable,
        });
        account_infos.push(info.clone());
    }
    account_infos.push(switchboard_program_info.clone());

    invoke(
        &Instruction {
            program_id: *switchboard_program_info.key,
            accounts,
            data,
        },
        &account_infos,
    )?;

    msg!("Randomness request submitted for vrf={}", vrf_info.key);
    Ok(())
}

/// Read a resolved result out of a VRF account.
///
/// Fails with `RandomnessNotResolved` while the oracle has not landed a
/// result yet; the fulfillment can be retried against the same request.
pub fn verify_result(vrf_info: &AccountInfo) -> Result<[u8; 32], ProgramError> {
    if vrf_info.owner != &SWITCHBOARD_PROGRAM_ID {
        msg!("VRF account not owned by the Switchboard program");
        return Err(ProgramError::IllegalOwner);
    }

    let vrf_account =
        VrfAccountData::new(vrf_info).map_err(|_| ProgramError::InvalidAccountData)?;
    let result = vrf_account
        .get_result()
        .map_err(|_| ProgramError::InvalidAccountData)?;

    if result == [0u8; 32] {
        msg!("VRF account does not hold a resolved result");
        return Err(RaffleError::RandomnessNotResolved.into());
    }
    Ok(result)
}

/// Expand the 32-byte oracle result into little-endian 64-bit words.
/// Winner selection consumes the first word.
pub fn random_words(result: &[u8; 32]) -> Vec<u64> {
    result
        .chunks_exact(8)
        .map(|chunk| {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(chunk);
            u64::from_le_bytes(bytes)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_words_are_little_endian_chunks() {
        let mut result = [0u8; 32];
        result[0] = 42;
        result[8] = 1;

        let words = random_words(&result);
        assert_eq!(words.len(), 4);
        assert_eq!(words[0], 42);
        assert_eq!(words[1], 1);
        assert_eq!(words[2], 0);
    }
}

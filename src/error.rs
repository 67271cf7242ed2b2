// Autoraffle - Errors
use solana_program::{
    decode_error::DecodeError, msg, program_error::PrintProgramError,
    program_error::ProgramError,
};
use thiserror::Error;

/// Errors that may be returned by the raffle program
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum RaffleError {
    /// Payment below the entrance fee
    #[error("Payment is below the entrance fee")]
    InsufficientPayment,

    /// Entry attempted while the round is settling
    #[error("Raffle is not open for entries")]
    RaffleNotOpen,

    /// Entrant list is at capacity for this round
    #[error("Round entrant list is full")]
    RoundFull,

    /// Settlement requested while the round is not eligible
    #[error("Upkeep is not needed")]
    UpkeepNotNeeded,

    /// Fulfillment for a request that is not the pending one
    #[error("Randomness request is unknown or no longer pending")]
    UnknownRequest,

    /// Oracle has not produced a result for the pending request yet
    #[error("Randomness result is not resolved yet")]
    RandomnessNotResolved,

    /// Randomness request aimed at a queue other than the configured one
    #[error("Oracle queue does not match the configured queue")]
    OracleQueueMismatch,

    /// Payout account does not match the selected entrant
    #[error("Winner account does not match the selected entrant")]
    WinnerMismatch,

    /// Pool transfer to the winner could not be completed
    #[error("Payout transfer failed")]
    PayoutFailed,

    /// Checked arithmetic overflowed
    #[error("Arithmetic overflow")]
    ArithmeticOverflow,
}

impl From<RaffleError> for ProgramError {
    fn from(e: RaffleError) -> Self {
        ProgramError::Custom(e as u32)
    }
}

impl<T> DecodeError<T> for RaffleError {
    fn type_of() -> &'static str {
        "Raffle Error"
    }
}

impl PrintProgramError for RaffleError {
    fn print<E>(&self) {
        msg!(&self.to_string());
    }
}

// Autoraffle - State
use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    clock::UnixTimestamp, program_error::ProgramError, pubkey::Pubkey,
};

use crate::error::RaffleError;

/// Seed for the single raffle account of a deployment
pub const RAFFLE_SEED: &[u8] = b"raffle";

/// Find the program derived address of the raffle account
pub fn find_raffle_address(program_id: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[RAFFLE_SEED], program_id)
}

/// Round status
#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoundState {
    /// Round is accepting entries
    Open,
    /// A randomness request is in flight; entries are closed
    Calculating,
}

/// Outcome of a settled round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settlement {
    /// Entrant selected by the oracle result
    pub winner: Pubkey,
    /// Lamports owed to the winner (the entire pool)
    pub payout: u64,
}

/// Raffle account data
///
/// One account per deployment; the round cycles Open -> Calculating -> Open
/// in place. All four transitions live here so the machine can be driven
/// synchronously, with the processor supplying accounts, lamports and the
/// oracle CPI around it.
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq)]
pub struct Raffle {
    /// Is the account initialized
    pub is_initialized: bool,
    /// Deployer identity, recorded for observability; every operation
    /// after initialization is permissionless
    pub authority: Pubkey,
    /// Minimum payment to enter, in lamports
    pub entrance_fee: u64,
    /// Minimum elapsed seconds before settlement becomes eligible
    pub interval: i64,
    /// Oracle queue the randomness request must target
    pub oracle_queue: Pubkey,
    /// Oracle request parameter, forwarded uninterpreted
    pub callback_gas_limit: u32,
    /// Oracle confirmation depth, forwarded uninterpreted
    pub min_oracle_confirmations: u16,
    /// Current round status
    pub state: RoundState,
    /// Entrants of the current round, in entry order; duplicates allowed,
    /// each element is one equal-weight slot
    pub entrants: Vec<Pubkey>,
    /// Lamports collected this round
    pub pool_balance: u64,
    /// Timestamp the current round opened
    pub round_start_time: UnixTimestamp,
    /// In-flight randomness request; Some exactly while Calculating
    pub pending_request: Option<Pubkey>,
    /// Most recently paid winner
    pub recent_winner: Option<Pubkey>,
    /// Completed round count
    pub rounds_settled: u64,
}

impl Raffle {
    /// Entrant slots the account is sized for
    pub const MAX_ENTRANTS: usize = 128;

    /// Serialized size the account is created with: flag + authority + fee
    /// + interval + queue + gas limit + confirmations + status tag
    /// + entrant vec (len prefix + slots) + pool + start time
    /// + two optional pubkeys + round counter
    pub const SIZE: usize = 1
        + 32
        + 8
        + 8
        + 32
        + 4
        + 2
        + 1
        + (4 + 32 * Self::MAX_ENTRANTS)
        + 8
        + 8
        + (1 + 32)
        + (1 + 32)
        + 8;

    pub fn new(
        authority: Pubkey,
        oracle_queue: Pubkey,
        entrance_fee: u64,
        interval: i64,
        callback_gas_limit: u32,
        min_oracle_confirmations: u16,
        now: UnixTimestamp,
    ) -> Self {
        Self {
            is_initialized: true,
            authority,
            entrance_fee,
            interval,
            oracle_queue,
            callback_gas_limit,
            min_oracle_confirmations,
            state: RoundState::Open,
            entrants: Vec::new(),
            pool_balance: 0,
            round_start_time: now,
            pending_request: None,
            recent_winner: None,
            rounds_settled: 0,
        }
    }

    /// Deserialize from account data; trailing zero padding is expected
    pub fn load(data: &[u8]) -> Result<Self, ProgramError> {
        let mut slice = data;
        Self::deserialize(&mut slice).map_err(|_| ProgramError::InvalidAccountData)
    }

    /// Serialize into account data
    pub fn store(&self, dst: &mut [u8]) -> Result<(), ProgramError> {
        let mut writer = dst;
        self.serialize(&mut writer)
            .map_err(|_| ProgramError::AccountDataTooSmall)
    }

    pub fn entrant_count(&self) -> usize {
        self.entrants.len()
    }

    pub fn entrant(&self, index: usize) -> Option<&Pubkey> {
        self.entrants.get(index)
    }

    /// Record one paid entry slot.
    ///
    /// `payment` must meet the entrance fee; anything above it stays in the
    /// pool (no change is given). No state is touched on rejection.
    pub fn enter(&mut self, entrant: Pubkey, payment: u64) -> Result<(), RaffleError> {
        if payment < self.entrance_fee {
            return Err(RaffleError::InsufficientPayment);
        }
        if self.state != RoundState::Open {
            return Err(RaffleError::RaffleNotOpen);
        }
        if self.entrants.len() >= Self::MAX_ENTRANTS {
            return Err(RaffleError::RoundFull);
        }
        self.pool_balance = self
            .pool_balance
            .checked_add(payment)
            .ok_or(RaffleError::ArithmeticOverflow)?;
        self.entrants.push(entrant);
        Ok(())
    }

    /// Upkeep predicate: the round is ready to settle when it is open, the
    /// interval has elapsed, the pool holds funds, and somebody entered.
    /// Each condition blocks settlement on its own. Read-only; the payload
    /// is an opaque carry-through, empty in this design.
    pub fn check_upkeep(&self, now: UnixTimestamp) -> (bool, Vec<u8>) {
        let is_open = self.state == RoundState::Open;
        let interval_elapsed = now.saturating_sub(self.round_start_time) >= self.interval;
        let has_balance = self.pool_balance > 0;
        let has_entrants = !self.entrants.is_empty();
        (
            is_open && interval_elapsed && has_balance && has_entrants,
            Vec::new(),
        )
    }

    /// Close entry and mark the randomness request in flight.
    ///
    /// Re-evaluates the upkeep predicate against current state; a caller's
    /// own view is never trusted. Because the predicate requires an open
    /// round, at most one request can ever be in flight per round.
    pub fn begin_settlement(
        &mut self,
        request_id: Pubkey,
        now: UnixTimestamp,
    ) -> Result<(), RaffleError> {
        let (needed, _) = self.check_upkeep(now);
        if !needed {
            return Err(RaffleError::UpkeepNotNeeded);
        }
        self.state = RoundState::Calculating;
        self.pending_request = Some(request_id);
        Ok(())
    }

    /// Whether `request_id` is the single pending request of a calculating
    /// round. False for never-issued, already-consumed and stale ids.
    pub fn is_pending_request(&self, request_id: &Pubkey) -> bool {
        self.state == RoundState::Calculating && self.pending_request.as_ref() == Some(request_id)
    }

    /// Consume the randomness fulfillment: pick the winner from the frozen
    /// entrant list and reopen the round.
    ///
    /// Lamports do not move here; the caller pays `Settlement::payout` to
    /// `Settlement::winner` and only then commits this state, so a failed
    /// payout leaves the pending request retryable.
    pub fn settle(
        &mut self,
        request_id: Pubkey,
        random_words: &[u64],
        now: UnixTimestamp,
    ) -> Result<Settlement, RaffleError> {
        if !self.is_pending_request(&request_id) {
            return Err(RaffleError::UnknownRequest);
        }
        let word = *random_words
            .first()
            .ok_or(RaffleError::RandomnessNotResolved)?;
        let winner_index = word
            .checked_rem(self.entrants.len() as u64)
            .ok_or(RaffleError::ArithmeticOverflow)? as usize;
        let winner = self.entrants[winner_index];
        let payout = self.pool_balance;

        self.recent_winner = Some(winner);
        self.rounds_settled = self.rounds_settled.saturating_add(1);
        self.entrants.clear();
        self.pool_balance = 0;
        self.state = RoundState::Open;
        self.round_start_time = now;
        self.pending_request = None;

        Ok(Settlement { winner, payout })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEE: u64 = 10_000_000; // 0.01 SOL
    const INTERVAL: i64 = 30;
    const T0: i64 = 1_700_000_000;

    fn open_raffle() -> Raffle {
        Raffle::new(
            Pubkey::new_unique(),
            Pubkey::new_unique(),
            FEE,
            INTERVAL,
            500_000,
            3,
            T0,
        )
    }

    fn eligible_raffle() -> (Raffle, Pubkey) {
        let mut raffle = open_raffle();
        let entrant = Pubkey::new_unique();
        raffle.enter(entrant, FEE).unwrap();
        (raffle, entrant)
    }

    #[test]
    fn new_round_starts_open_and_empty() {
        let raffle = open_raffle();
        assert!(raffle.is_initialized);
        assert_eq!(raffle.state, RoundState::Open);
        assert_eq!(raffle.entrant_count(), 0);
        assert_eq!(raffle.pool_balance, 0);
        assert_eq!(raffle.round_start_time, T0);
        assert_eq!(raffle.pending_request, None);
        assert_eq!(raffle.recent_winner, None);
    }

    #[test]
    fn enter_records_slots_in_order() {
        let mut raffle = open_raffle();
        let a = Pubkey::new_unique();
        let b = Pubkey::new_unique();

        raffle.enter(a, FEE).unwrap();
        raffle.enter(b, FEE).unwrap();
        // the same identity may enter again; each entry is its own slot
        raffle.enter(a, FEE).unwrap();

        assert_eq!(raffle.entrants, vec![a, b, a]);
        assert_eq!(raffle.pool_balance, 3 * FEE);
    }

    #[test]
    fn enter_rejects_underpayment_without_mutation() {
        let mut raffle = open_raffle();
        let before = raffle.clone();

        let err = raffle.enter(Pubkey::new_unique(), FEE - 1).unwrap_err();
        assert_eq!(err, RaffleError::InsufficientPayment);
        assert_eq!(raffle, before);
    }

    #[test]
    fn enter_retains_overpayment() {
        let mut raffle = open_raffle();
        raffle.enter(Pubkey::new_unique(), FEE + 123).unwrap();
        assert_eq!(raffle.pool_balance, FEE + 123);
        assert_eq!(raffle.entrant_count(), 1);
    }

    #[test]
    fn enter_rejects_while_calculating() {
        let (mut raffle, _) = eligible_raffle();
        raffle
            .begin_settlement(Pubkey::new_unique(), T0 + INTERVAL)
            .unwrap();
        let before = raffle.clone();

        let err = raffle.enter(Pubkey::new_unique(), FEE).unwrap_err();
        assert_eq!(err, RaffleError::RaffleNotOpen);
        assert_eq!(raffle, before);
    }

    #[test]
    fn enter_rejects_when_round_is_full() {
        let mut raffle = open_raffle();
        for _ in 0..Raffle::MAX_ENTRANTS {
            raffle.enter(Pubkey::new_unique(), FEE).unwrap();
        }

        let err = raffle.enter(Pubkey::new_unique(), FEE).unwrap_err();
        assert_eq!(err, RaffleError::RoundFull);
        assert_eq!(raffle.entrant_count(), Raffle::MAX_ENTRANTS);
    }

    #[test]
    fn upkeep_blocked_while_calculating() {
        let (mut raffle, _) = eligible_raffle();
        raffle
            .begin_settlement(Pubkey::new_unique(), T0 + INTERVAL)
            .unwrap();
        let (needed, _) = raffle.check_upkeep(T0 + INTERVAL + 100);
        assert!(!needed);
    }

    #[test]
    fn upkeep_blocked_before_interval_elapses() {
        let (raffle, _) = eligible_raffle();
        let (needed, _) = raffle.check_upkeep(T0 + INTERVAL - 1);
        assert!(!needed);
        // the boundary itself is eligible
        let (needed, _) = raffle.check_upkeep(T0 + INTERVAL);
        assert!(needed);
    }

    #[test]
    fn upkeep_blocked_without_funds() {
        let mut raffle = open_raffle();
        // a funded-but-empty pool cannot arise through enter; force the
        // shape to show the conjunct blocks on its own
        raffle.entrants.push(Pubkey::new_unique());
        let (needed, _) = raffle.check_upkeep(T0 + INTERVAL + 1);
        assert!(!needed);
    }

    #[test]
    fn upkeep_blocked_without_entrants() {
        let mut raffle = open_raffle();
        raffle.pool_balance = FEE;
        let (needed, _) = raffle.check_upkeep(T0 + INTERVAL + 1);
        assert!(!needed);
    }

    #[test]
    fn upkeep_needed_when_all_conditions_hold() {
        let (raffle, _) = eligible_raffle();
        let (needed, payload) = raffle.check_upkeep(T0 + INTERVAL + 1);
        assert!(needed);
        assert!(payload.is_empty());
    }

    #[test]
    fn settlement_request_follows_the_predicate() {
        let (mut raffle, _) = eligible_raffle();
        let request = Pubkey::new_unique();

        // too early: rejected, nothing recorded
        let err = raffle.begin_settlement(request, T0 + INTERVAL - 1).unwrap_err();
        assert_eq!(err, RaffleError::UpkeepNotNeeded);
        assert_eq!(raffle.state, RoundState::Open);
        assert_eq!(raffle.pending_request, None);

        raffle.begin_settlement(request, T0 + INTERVAL + 1).unwrap();
        assert_eq!(raffle.state, RoundState::Calculating);
        assert_eq!(raffle.pending_request, Some(request));
        assert!(raffle.is_pending_request(&request));
    }

    #[test]
    fn second_settlement_request_is_blocked() {
        let (mut raffle, _) = eligible_raffle();
        let now = T0 + INTERVAL + 1;
        raffle.begin_settlement(Pubkey::new_unique(), now).unwrap();

        let err = raffle
            .begin_settlement(Pubkey::new_unique(), now)
            .unwrap_err();
        assert_eq!(err, RaffleError::UpkeepNotNeeded);
        assert_eq!(raffle.state, RoundState::Calculating);
    }

    #[test]
    fn settle_rejects_unknown_request_without_mutation() {
        let (mut raffle, _) = eligible_raffle();
        let request = Pubkey::new_unique();
        let now = T0 + INTERVAL + 1;
        raffle.begin_settlement(request, now).unwrap();
        let before = raffle.clone();

        let err = raffle
            .settle(Pubkey::new_unique(), &[42], now + 5)
            .unwrap_err();
        assert_eq!(err, RaffleError::UnknownRequest);
        assert_eq!(raffle, before);
    }

    #[test]
    fn settle_rejects_while_open() {
        let (mut raffle, _) = eligible_raffle();
        let err = raffle
            .settle(Pubkey::new_unique(), &[42], T0 + INTERVAL + 1)
            .unwrap_err();
        assert_eq!(err, RaffleError::UnknownRequest);
    }

    #[test]
    fn settle_pays_the_single_entrant_and_reopens() {
        let (mut raffle, entrant) = eligible_raffle();
        let request = Pubkey::new_unique();
        raffle.begin_settlement(request, T0 + INTERVAL + 1).unwrap();

        let settled_at = T0 + INTERVAL + 20;
        let settlement = raffle.settle(request, &[42], settled_at).unwrap();

        assert_eq!(settlement.winner, entrant);
        assert_eq!(settlement.payout, FEE);
        assert_eq!(raffle.state, RoundState::Open);
        assert_eq!(raffle.entrant_count(), 0);
        assert_eq!(raffle.pool_balance, 0);
        assert_eq!(raffle.round_start_time, settled_at);
        assert_eq!(raffle.pending_request, None);
        assert_eq!(raffle.recent_winner, Some(entrant));
        assert_eq!(raffle.rounds_settled, 1);
    }

    #[test]
    fn settle_picks_word_modulo_entrant_count() {
        let mut raffle = open_raffle();
        let entrants: Vec<Pubkey> = (0..4).map(|_| Pubkey::new_unique()).collect();
        for entrant in &entrants {
            raffle.enter(*entrant, FEE).unwrap();
        }
        let request = Pubkey::new_unique();
        raffle.begin_settlement(request, T0 + INTERVAL + 1).unwrap();

        let word: u64 = 7; // 7 % 4 = 3
        let settlement = raffle.settle(request, &[word], T0 + INTERVAL + 2).unwrap();

        assert_eq!(settlement.winner, entrants[3]);
        // the whole pool goes to the one winner
        assert_eq!(settlement.payout, 4 * FEE);
    }

    #[test]
    fn stale_request_from_settled_round_is_rejected() {
        let (mut raffle, _) = eligible_raffle();
        let request = Pubkey::new_unique();
        raffle.begin_settlement(request, T0 + INTERVAL + 1).unwrap();
        raffle.settle(request, &[9], T0 + INTERVAL + 2).unwrap();
        let before = raffle.clone();

        // a late replay of the consumed request must not settle anything
        let err = raffle.settle(request, &[9], T0 + INTERVAL + 3).unwrap_err();
        assert_eq!(err, RaffleError::UnknownRequest);
        assert_eq!(raffle, before);
    }

    #[test]
    fn calculating_round_waits_indefinitely_without_fulfillment() {
        let (mut raffle, _) = eligible_raffle();
        let request = Pubkey::new_unique();
        raffle.begin_settlement(request, T0 + INTERVAL + 1).unwrap();

        // no timeout or abandon path exists: far in the future the round is
        // still calculating, still closed to entries and to new requests
        let much_later = T0 + 1_000_000;
        let (needed, _) = raffle.check_upkeep(much_later);
        assert!(!needed);
        assert_eq!(
            raffle.enter(Pubkey::new_unique(), FEE).unwrap_err(),
            RaffleError::RaffleNotOpen
        );
        assert_eq!(
            raffle
                .begin_settlement(Pubkey::new_unique(), much_later)
                .unwrap_err(),
            RaffleError::UpkeepNotNeeded
        );
        assert_eq!(raffle.state, RoundState::Calculating);
        assert_eq!(raffle.pending_request, Some(request));
    }

    #[test]
    fn fresh_round_lifecycle() {
        // fee 0.01 SOL, interval 30s: enter, wait out the interval, settle
        let mut raffle = open_raffle();
        let a = Pubkey::new_unique();

        raffle.enter(a, FEE).unwrap();
        assert_eq!(raffle.entrants, vec![a]);
        assert_eq!(raffle.pool_balance, FEE);
        assert!(!raffle.check_upkeep(T0).0);

        assert!(raffle.check_upkeep(T0 + 31).0);
        let request = Pubkey::new_unique();
        raffle.begin_settlement(request, T0 + 31).unwrap();
        assert_eq!(raffle.state, RoundState::Calculating);

        let settlement = raffle.settle(request, &[42], T0 + 40).unwrap();
        assert_eq!(settlement.winner, a);
        assert_eq!(settlement.payout, FEE);
        assert_eq!(raffle.state, RoundState::Open);

        // the next round accepts entries again
        raffle.enter(Pubkey::new_unique(), FEE).unwrap();
        assert_eq!(raffle.entrant_count(), 1);
    }

    #[test]
    fn load_store_round_trips_through_account_buffer() {
        let (mut raffle, _) = eligible_raffle();
        raffle
            .begin_settlement(Pubkey::new_unique(), T0 + INTERVAL)
            .unwrap();

        let mut buf = vec![0u8; Raffle::SIZE];
        raffle.store(&mut buf).unwrap();
        let loaded = Raffle::load(&buf).unwrap();
        assert_eq!(loaded, raffle);
    }
}

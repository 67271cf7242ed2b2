//! Program entrypoint

#![cfg(all(target_os = "solana", not(feature = "no-entrypoint")))]

use solana_program::entrypoint;

use crate::process_instruction;

entrypoint!(process_instruction);

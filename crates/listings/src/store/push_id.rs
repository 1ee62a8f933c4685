//! Chronologically ordered push keys.
//!
//! A key is 20 characters: 8 encode the millisecond timestamp and 12 are
//! random. Keys created within the same millisecond reuse the random tail
//! incremented by one, so lexicographic key order is creation order. Stores
//! that return collections sorted by key therefore return them in insertion
//! order.

use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use rand::Rng;

use tradepost_core::ProductId;

/// Alphabet in ascending ASCII order, so string comparison matches numeric order.
const PUSH_CHARS: &[u8; 64] = b"-0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ_abcdefghijklmnopqrstuvwxyz";

const TIME_CHARS: usize = 8;
const RANDOM_CHARS: usize = 12;

/// Generates push keys for new records.
#[derive(Debug, Default)]
pub struct PushIdGenerator {
    state: Mutex<PushState>,
}

#[derive(Debug, Default)]
struct PushState {
    last_millis: u64,
    last_random: [u8; RANDOM_CHARS],
}

impl PushIdGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Next key, using the current wall-clock time.
    pub fn next_id(&self) -> ProductId {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX));
        self.next_id_at(millis)
    }

    /// Next key for an explicit timestamp.
    pub fn next_id_at(&self, millis: u64) -> ProductId {
        let mut state = self.state.lock();

        // A clock that stepped backwards keeps the last timestamp so keys stay ordered.
        let millis = millis.max(state.last_millis);
        if millis == state.last_millis && state.last_millis != 0 {
            increment(&mut state.last_random);
        } else {
            let mut rng = rand::rng();
            for digit in &mut state.last_random {
                *digit = rng.random_range(0..64);
            }
        }
        state.last_millis = millis;

        let mut key = String::with_capacity(TIME_CHARS + RANDOM_CHARS);
        let mut time_chars = [0u8; TIME_CHARS];
        let mut remaining = millis;
        for slot in time_chars.iter_mut().rev() {
            *slot = digit_char(remaining % 64);
            remaining /= 64;
        }
        key.extend(time_chars.iter().map(|&c| char::from(c)));
        key.extend(
            state
                .last_random
                .iter()
                .map(|&d| char::from(digit_char(u64::from(d)))),
        );

        ProductId::new(key)
    }
}

/// Add one to a base-64 digit string, carrying from the right.
fn increment(digits: &mut [u8; RANDOM_CHARS]) {
    for digit in digits.iter_mut().rev() {
        if *digit == 63 {
            *digit = 0;
        } else {
            *digit += 1;
            return;
        }
    }
}

fn digit_char(value: u64) -> u8 {
    PUSH_CHARS
        .get(usize::try_from(value).unwrap_or(0))
        .copied()
        .unwrap_or(b'-')
}

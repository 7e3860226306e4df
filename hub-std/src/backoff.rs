use std::{cmp::min, time::Duration};

const INITIAL_WAIT_MS: u64 = 250;
const MAXIMUM_WAIT_MS: u64 = 8_000;
const EXP_BASE: u64 = 2;

/// Get an iterator of [`Duration`]s to sleep between retries of an idempotent
/// request. Waits start at 250ms and double up to a cap of 8s.
///
/// ```
/// let mut waits = hub_std::backoff::get_backoff_iter();
/// assert_eq!(waits.next().unwrap().as_millis(), 250);
/// assert_eq!(waits.next().unwrap().as_millis(), 500);
/// ```
pub fn get_backoff_iter() -> impl Iterator<Item = Duration> {
    iter_with_initial_wait_ms(INITIAL_WAIT_MS)
}

/// Like [`get_backoff_iter`], but with a custom initial wait in milliseconds.
pub fn iter_with_initial_wait_ms(
    initial_wait_ms: u64,
) -> impl Iterator<Item = Duration> {
    debug_assert!(initial_wait_ms <= MAXIMUM_WAIT_MS);

    (0u32..).map(move |index| {
        let factor = EXP_BASE.saturating_pow(index);
        let wait_ms = initial_wait_ms.saturating_mul(factor);
        Duration::from_millis(min(wait_ms, MAXIMUM_WAIT_MS))
    })
}

#[cfg(test)]
mod test {
    use proptest::{prop_assert, proptest};

    use super::*;

    #[test]
    fn no_integer_overflow() {
        let mut backoff_durations = get_backoff_iter();
        for _ in 0..200 {
            backoff_durations.next();
        }
    }

    #[test]
    fn waits_are_bounded_and_non_decreasing() {
        proptest!(|(initial in 1_u64..=MAXIMUM_WAIT_MS)| {
            let waits = iter_with_initial_wait_ms(initial)
                .take(64)
                .collect::<Vec<_>>();
            for pair in waits.windows(2) {
                prop_assert!(pair[0] <= pair[1]);
            }
            let max = Duration::from_millis(MAXIMUM_WAIT_MS);
            prop_assert!(waits.iter().all(|wait| *wait <= max));
        });
    }
}

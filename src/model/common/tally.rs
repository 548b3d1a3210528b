//! Derived statistics over a snapshot of an election's option counts.
//!
//! Everything here is pure: callers take a snapshot from the store first and
//! compute on that, so the numbers always agree with each other.

/// Total votes across all options, or `None` if the sum does not fit.
pub fn total_votes(counts: &[u64]) -> Option<u64> {
    counts
        .iter()
        .try_fold(0_u64, |total, &count| total.checked_add(count))
}

/// Index of the leading option: the maximum count, with ties going to
/// whichever option comes first. `None` only when there are no options.
pub fn leader(counts: &[u64]) -> Option<usize> {
    let mut best: Option<(usize, u64)> = None;
    for (index, &count) in counts.iter().enumerate() {
        match best {
            Some((_, best_count)) if count <= best_count => {}
            _ => best = Some((index, count)),
        }
    }
    best.map(|(index, _)| index)
}

/// Share of the total as a percentage in `0.0..=100.0`; zero when nobody has voted.
pub fn percentage(count: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        (count as f64 * 100.0) / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alice_and_bob() {
        let counts = [3, 7];
        let total = total_votes(&counts).unwrap();
        assert_eq!(total, 10);
        assert_eq!(leader(&counts), Some(1));
        assert_eq!(percentage(counts[0], total), 30.0);
        assert_eq!(percentage(counts[1], total), 70.0);
    }

    #[test]
    fn ties_go_to_first_occurrence() {
        assert_eq!(leader(&[2, 5, 5, 1]), Some(1));
        assert_eq!(leader(&[0, 0, 0]), Some(0));
        assert_eq!(leader(&[]), None);
    }

    #[test]
    fn no_votes_means_zero_percent() {
        assert_eq!(total_votes(&[0, 0]), Some(0));
        assert_eq!(percentage(0, 0), 0.0);
    }

    #[test]
    fn total_overflow_is_detected() {
        assert_eq!(total_votes(&[u64::MAX, 0]), Some(u64::MAX));
        assert_eq!(total_votes(&[u64::MAX, 1]), None);
        assert_eq!(total_votes(&[u64::MAX / 2 + 1, u64::MAX / 2 + 1]), None);
    }
}

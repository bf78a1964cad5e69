//! Consecutive-run (tandem repeat) detection over hit lists.

/// Minimum run size needed for a forward repeat
pub const MIN_TANDEM_RUN: usize = 2;

/// A maximal run of positions `p, p + L, p + 2L, ...`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Run {
    /// First position of the run
    pub start: usize,
    /// Number of positions in the run
    pub count: usize,
}

/// Run-size rule applied to reverse-complement hits
///
/// Forward hits always need a tandem run of at least [`MIN_TANDEM_RUN`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReverseRule {
    /// Reverse-complement runs of any size are reported, single hits included
    #[default]
    Singletons,
    /// Reverse-complement runs follow the forward rule
    TandemOnly,
}

impl ReverseRule {
    /// Smallest run size that is reported for the given orientation
    #[must_use]
    pub fn min_run(self, is_reverse: bool) -> usize {
        match (self, is_reverse) {
            (Self::Singletons, true) => 1,
            _ => MIN_TANDEM_RUN,
        }
    }
}

/// Splits `positions` into maximal runs spaced exactly `length` apart
///
/// Runs are appended to `out` (after clearing it) in the order they appear in
/// `positions`; runs shorter than `min_count` are skipped. `positions` is expected
/// to be ascending.
pub fn find_runs_into(positions: &[usize], length: usize, min_count: usize, out: &mut Vec<Run>) {
    out.clear();
    let Some((&first, rest)) = positions.split_first() else {
        return;
    };

    let mut current = Run {
        start: first,
        count: 1,
    };
    let mut previous = first;
    for &pos in rest {
        if pos == previous + length {
            current.count += 1;
        } else {
            if current.count >= min_count {
                out.push(current);
            }
            current = Run {
                start: pos,
                count: 1,
            };
        }
        previous = pos;
    }
    if current.count >= min_count {
        out.push(current);
    }
}

/// Allocating convenience wrapper around [`find_runs_into`]
#[must_use]
pub fn find_runs(positions: &[usize], length: usize, min_count: usize) -> Vec<Run> {
    let mut out = Vec::new();
    find_runs_into(positions, length, min_count, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_tandem_run() {
        let runs = find_runs(&[0, 4, 8], 4, 2);
        assert_eq!(runs, vec![Run { start: 0, count: 3 }]);
    }

    #[test]
    fn test_split_runs() {
        // 0,4 tandem; 9 alone; 20,24,28 tandem; 40 alone
        let positions = [0, 4, 9, 20, 24, 28, 40];
        assert_eq!(
            find_runs(&positions, 4, 2),
            vec![Run { start: 0, count: 2 }, Run { start: 20, count: 3 }]
        );
        assert_eq!(find_runs(&positions, 4, 1).len(), 4);
    }

    #[test]
    fn test_overlapping_hits_are_not_tandem() {
        // AAAAAA indexed at length 2 yields hits at every offset
        assert!(find_runs(&[0, 1, 2, 3, 4], 2, 2).is_empty());
    }

    #[test]
    fn test_empty_and_single() {
        assert!(find_runs(&[], 3, 1).is_empty());
        assert!(find_runs(&[5], 3, 2).is_empty());
        assert_eq!(find_runs(&[5], 3, 1), vec![Run { start: 5, count: 1 }]);
    }

    #[test]
    fn test_reverse_rule() {
        assert_eq!(ReverseRule::Singletons.min_run(true), 1);
        assert_eq!(ReverseRule::Singletons.min_run(false), 2);
        assert_eq!(ReverseRule::TandemOnly.min_run(true), 2);
    }

    #[test]
    fn test_buffer_is_reused() {
        let mut out = vec![Run { start: 99, count: 9 }];
        find_runs_into(&[1, 3], 2, 2, &mut out);
        assert_eq!(out, vec![Run { start: 1, count: 2 }]);
    }
}

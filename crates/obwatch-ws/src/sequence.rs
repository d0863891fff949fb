//! Sequence continuity check for the update stream.

/// Result of checking an update's sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceCheck {
    Accepted,
    /// The update does not follow the last accepted one. The cursor is left
    /// unchanged.
    Gap { expected: Option<u64>, received: u64 },
}

impl SequenceCheck {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// Last accepted sequence number of the current session.
///
/// Empty at session start and after every disconnect. Once set, only
/// `last + 1` is accepted; a snapshot re-baselines it unconditionally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SequenceCursor {
    last: Option<u64>,
}

impl SequenceCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check an update's sequence and advance on success.
    pub fn accept(&mut self, sequence: u64) -> SequenceCheck {
        match self.last {
            None => {
                self.last = Some(sequence);
                SequenceCheck::Accepted
            }
            Some(last) => {
                // u64::MAX has no successor: treated as a gap.
                let expected = last.checked_add(1);
                if expected == Some(sequence) {
                    self.last = Some(sequence);
                    SequenceCheck::Accepted
                } else {
                    SequenceCheck::Gap {
                        expected,
                        received: sequence,
                    }
                }
            }
        }
    }

    /// Re-baseline from a snapshot.
    pub fn reset_to(&mut self, sequence: u64) {
        self.last = Some(sequence);
    }

    pub fn clear(&mut self) {
        self.last = None;
    }

    pub fn last(&self) -> Option<u64> {
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_update_sets_baseline() {
        let mut cursor = SequenceCursor::new();
        assert_eq!(cursor.accept(42), SequenceCheck::Accepted);
        assert_eq!(cursor.last(), Some(42));
    }

    #[test]
    fn test_contiguous_after_snapshot() {
        let mut cursor = SequenceCursor::new();
        cursor.reset_to(100);
        for seq in 101..=103 {
            assert!(cursor.accept(seq).is_accepted());
        }
        assert_eq!(cursor.last(), Some(103));
    }

    #[test]
    fn test_gap_does_not_advance() {
        let mut cursor = SequenceCursor::new();
        cursor.reset_to(100);

        assert_eq!(
            cursor.accept(105),
            SequenceCheck::Gap {
                expected: Some(101),
                received: 105
            }
        );
        assert_eq!(cursor.last(), Some(100));
    }

    #[test]
    fn test_duplicate_and_reorder_are_gaps() {
        let mut cursor = SequenceCursor::new();
        cursor.reset_to(10);
        assert!(!cursor.accept(10).is_accepted());
        assert!(!cursor.accept(9).is_accepted());
    }

    #[test]
    fn test_overflow_is_gap() {
        let mut cursor = SequenceCursor::new();
        cursor.reset_to(u64::MAX);
        assert_eq!(
            cursor.accept(0),
            SequenceCheck::Gap {
                expected: None,
                received: 0
            }
        );
    }

    #[test]
    fn test_snapshot_overrides_and_clear_empties() {
        let mut cursor = SequenceCursor::new();
        cursor.reset_to(500);
        cursor.reset_to(7);
        assert_eq!(cursor.last(), Some(7));

        cursor.clear();
        assert_eq!(cursor.last(), None);
        assert!(cursor.accept(1000).is_accepted());
    }
}

use chrono::{DateTime, Utc};
use rdfo_types::{vocab, Term};

use crate::error::{GraphError, GraphResult};
use crate::triples::TripleSet;

/// Result of a point-in-time validity check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValidityOutcome {
    Valid,
    Invalid,
    /// No start date was ever recorded; never treated as current.
    Unknown,
}

impl ValidityOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidityOutcome::Valid)
    }
}

/// A validity window. `until` is inclusive and `None` means open-ended.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Validity {
    from: Option<DateTime<Utc>>,
    until: Option<DateTime<Utc>>,
}

impl Validity {
    pub fn new(from: Option<DateTime<Utc>>, until: Option<DateTime<Utc>>) -> GraphResult<Self> {
        if let (Some(f), Some(u)) = (from, until) {
            if f > u {
                return Err(GraphError::InvalidValidity {
                    from: f.to_rfc3339(),
                    until: u.to_rfc3339(),
                });
            }
        }
        Ok(Self { from, until })
    }

    /// Valid from `from` with no end.
    pub fn starting(from: DateTime<Utc>) -> Self {
        Self {
            from: Some(from),
            until: None,
        }
    }

    pub fn from(&self) -> Option<DateTime<Utc>> {
        self.from
    }

    pub fn until(&self) -> Option<DateTime<Utc>> {
        self.until
    }

    pub fn with_from(self, from: Option<DateTime<Utc>>) -> GraphResult<Self> {
        Self::new(from, self.until)
    }

    pub fn with_until(self, until: Option<DateTime<Utc>>) -> GraphResult<Self> {
        Self::new(self.from, until)
    }

    pub fn check(&self, at: DateTime<Utc>) -> ValidityOutcome {
        let Some(from) = self.from else {
            return ValidityOutcome::Unknown;
        };
        if at < from {
            return ValidityOutcome::Invalid;
        }
        match self.until {
            Some(until) if at > until => ValidityOutcome::Invalid,
            _ => ValidityOutcome::Valid,
        }
    }

    /// Read `ov:validFrom` / `ov:validUntil` from a graph's description.
    ///
    /// Values that do not parse as timestamps are ignored. The window is
    /// taken as recorded, even if it ends before it starts; such a window is
    /// valid at no instant.
    pub fn from_triples(ts: &TripleSet) -> Self {
        let read = |predicate: &'static str| {
            ts.objects(&vocab::uri(predicate))
                .iter()
                .filter_map(Term::as_datetime)
                .min()
        };
        Self {
            from: read(vocab::OV_VALID_FROM),
            until: read(vocab::OV_VALID_UNTIL),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rdfo_types::{Literal, NamespaceRegistry, Uri};
    use std::sync::Arc;

    fn t(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn bounded_window_is_inclusive() {
        let v = Validity::new(Some(t(2020, 1, 1)), Some(t(2020, 12, 31))).unwrap();
        assert_eq!(v.check(t(2019, 12, 31)), ValidityOutcome::Invalid);
        assert_eq!(v.check(t(2020, 1, 1)), ValidityOutcome::Valid);
        assert_eq!(v.check(t(2020, 6, 1)), ValidityOutcome::Valid);
        assert_eq!(v.check(t(2020, 12, 31)), ValidityOutcome::Valid);
        assert_eq!(v.check(t(2020, 12, 31) + Duration::seconds(1)), ValidityOutcome::Invalid);
    }

    #[test]
    fn open_ended_window() {
        let v = Validity::starting(t(2020, 1, 1));
        assert!(v.check(t(2999, 1, 1)).is_valid());
        assert!(!v.check(t(2000, 1, 1)).is_valid());
    }

    #[test]
    fn missing_start_is_unknown() {
        let v = Validity::new(None, Some(t(2030, 1, 1))).unwrap();
        assert_eq!(v.check(t(2020, 1, 1)), ValidityOutcome::Unknown);
        assert!(!ValidityOutcome::Unknown.is_valid());
    }

    #[test]
    fn rejects_inverted_window() {
        let err = Validity::new(Some(t(2021, 1, 1)), Some(t(2020, 1, 1))).unwrap_err();
        assert!(matches!(err, GraphError::InvalidValidity { .. }));
        assert!(Validity::starting(t(2021, 1, 1)).with_until(Some(t(2020, 1, 1))).is_err());
    }

    #[test]
    fn reads_window_from_triples() {
        let mut ts = TripleSet::new(
            Uri::parse("info:local/e/g1").unwrap(),
            Arc::new(NamespaceRegistry::with_defaults()),
        );
        ts.add_triple("ov:validFrom", Literal::datetime(t(2020, 1, 1))).unwrap();
        ts.add_triple("ov:validUntil", Literal::string("2020-06-30T00:00:00")).unwrap();
        let v = Validity::from_triples(&ts);
        assert_eq!(v.from(), Some(t(2020, 1, 1)));
        assert_eq!(v.until(), Some(t(2020, 6, 30)));

        let empty = TripleSet::new(Uri::parse("info:local/e/g2").unwrap(), ts.registry().clone());
        assert_eq!(Validity::from_triples(&empty), Validity::default());
    }
}

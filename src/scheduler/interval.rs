use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Half-open time range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct Interval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Interval {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Touching ranges (`a.end == b.start`) do not overlap.
    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains(&self, other: &Interval) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

/// How an existing booking intersects a candidate window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overlap {
    None,
    /// The candidate lies entirely within the booking.
    CandidateInside,
    /// The booking lies strictly within the candidate.
    ExistingInside,
    /// The booking covers the end of the candidate.
    Tail,
    /// The booking covers the start of the candidate.
    Head,
}

pub fn classify(candidate: &Interval, existing: &Interval) -> Overlap {
    if !candidate.overlaps(existing) {
        Overlap::None
    } else if existing.contains(candidate) {
        Overlap::CandidateInside
    } else if candidate.start < existing.start && existing.end < candidate.end {
        Overlap::ExistingInside
    } else if existing.start > candidate.start {
        Overlap::Tail
    } else {
        Overlap::Head
    }
}

/// The parts of `candidate` not covered by any of `existing`.
///
/// Bookings are applied in start order; each one narrows every remaining
/// piece, so a booking strictly inside a piece splits it in two. Empty
/// pieces are dropped. Output is ordered and pairwise disjoint.
pub fn resolve(candidate: Interval, existing: &[Interval]) -> Vec<Interval> {
    if candidate.is_empty() {
        return Vec::new();
    }

    let mut bookings: Vec<&Interval> = existing.iter().filter(|e| !e.is_empty()).collect();
    bookings.sort_by_key(|e| (e.start, e.end));

    let mut working = vec![candidate];
    for booked in bookings {
        working = working
            .into_iter()
            .flat_map(|piece| cut(piece, booked))
            .collect();
        if working.is_empty() {
            break;
        }
    }
    working
}

fn cut(piece: Interval, booked: &Interval) -> Vec<Interval> {
    let pieces = match classify(&piece, booked) {
        Overlap::None => vec![piece],
        Overlap::CandidateInside => Vec::new(),
        Overlap::ExistingInside => vec![
            Interval::new(piece.start, booked.start),
            Interval::new(booked.end, piece.end),
        ],
        Overlap::Tail => vec![Interval::new(piece.start, booked.start)],
        Overlap::Head => vec![Interval::new(booked.end, piece.end)],
    };
    pieces.into_iter().filter(|p| !p.is_empty()).collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;

    pub fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, h, m, 0).unwrap()
    }

    pub fn iv(h1: u32, m1: u32, h2: u32, m2: u32) -> Interval {
        Interval::new(at(h1, m1), at(h2, m2))
    }

    #[test]
    fn test_booking_inside_candidate_splits() {
        let out = resolve(iv(9, 50, 10, 40), &[iv(10, 0, 10, 30)]);
        assert_eq!(out, vec![iv(9, 50, 10, 0), iv(10, 30, 10, 40)]);
    }

    #[test]
    fn test_candidate_inside_booking_is_rejected() {
        assert!(resolve(iv(9, 30, 10, 30), &[iv(9, 0, 11, 0)]).is_empty());
    }

    #[test]
    fn test_head_overlap_truncates_start() {
        let out = resolve(iv(9, 15, 10, 0), &[iv(9, 0, 9, 30)]);
        assert_eq!(out, vec![iv(9, 30, 10, 0)]);
    }

    #[test]
    fn test_tail_overlap_truncates_end() {
        let out = resolve(iv(9, 0, 10, 0), &[iv(9, 45, 11, 0)]);
        assert_eq!(out, vec![iv(9, 0, 9, 45)]);
    }

    #[test]
    fn test_touching_boundaries_do_not_overlap() {
        let candidate = iv(9, 0, 10, 0);
        assert_eq!(resolve(candidate, &[iv(10, 0, 10, 30)]), vec![candidate]);
        assert_eq!(resolve(candidate, &[iv(8, 0, 9, 0)]), vec![candidate]);
        assert_eq!(classify(&candidate, &iv(10, 0, 10, 30)), Overlap::None);
    }

    #[test]
    fn test_shared_start_is_head_overlap() {
        let candidate = iv(9, 0, 10, 0);
        assert_eq!(classify(&candidate, &iv(9, 0, 9, 20)), Overlap::Head);
        assert_eq!(resolve(candidate, &[iv(9, 0, 9, 20)]), vec![iv(9, 20, 10, 0)]);
        assert_eq!(classify(&candidate, &iv(9, 40, 10, 0)), Overlap::Tail);
        assert_eq!(classify(&candidate, &candidate), Overlap::CandidateInside);
    }

    #[test]
    fn test_multiple_bookings_in_any_order() {
        let candidate = iv(9, 0, 12, 0);
        let existing = [iv(11, 30, 12, 30), iv(8, 30, 9, 15), iv(10, 0, 10, 30)];
        let out = resolve(candidate, &existing);
        assert_eq!(out, vec![iv(9, 15, 10, 0), iv(10, 30, 11, 30)]);
    }

    #[test]
    fn test_two_bookings_inside_leave_three_pieces() {
        let out = resolve(iv(9, 0, 12, 0), &[iv(9, 30, 10, 0), iv(11, 0, 11, 30)]);
        assert_eq!(
            out,
            vec![iv(9, 0, 9, 30), iv(10, 0, 11, 0), iv(11, 30, 12, 0)]
        );
    }

    #[test]
    fn test_degenerate_candidate_and_bookings() {
        assert!(resolve(iv(10, 0, 10, 0), &[]).is_empty());
        assert!(resolve(iv(10, 0, 9, 0), &[]).is_empty());
        // An empty booking blocks nothing.
        assert_eq!(resolve(iv(9, 0, 10, 0), &[iv(9, 30, 9, 30)]), vec![iv(9, 0, 10, 0)]);
    }

    /// Small deterministic generator so the property checks below are
    /// reproducible.
    struct XorShift(u64);

    impl XorShift {
        fn next(&mut self, bound: u32) -> u32 {
            self.0 ^= self.0 << 13;
            self.0 ^= self.0 >> 7;
            self.0 ^= self.0 << 17;
            (self.0 % bound as u64) as u32
        }
    }

    fn minute(m: u32) -> DateTime<Utc> {
        at(0, 0) + Duration::minutes(m as i64)
    }

    /// Non-overlapping bookings laid out left to right across one day.
    fn bookings(rng: &mut XorShift) -> Vec<Interval> {
        let mut out = Vec::new();
        let mut cursor = rng.next(60);
        while cursor < 1400 && out.len() < 8 {
            let len = 1 + rng.next(90);
            out.push(Interval::new(minute(cursor), minute(cursor + len)));
            cursor += len + rng.next(120);
        }
        out
    }

    fn covered(intervals: &[Interval], t: DateTime<Utc>) -> bool {
        intervals.iter().any(|i| i.start <= t && t < i.end)
    }

    #[test]
    fn test_resolver_properties_on_generated_cases() {
        let mut rng = XorShift(0x2545_f491_4f6c_dd1d);
        for _ in 0..300 {
            let existing = bookings(&mut rng);
            let start = rng.next(1440);
            let candidate = Interval::new(minute(start), minute(start + 1 + rng.next(240)));

            let out = resolve(candidate, &existing);

            for (i, a) in out.iter().enumerate() {
                assert!(!a.is_empty());
                assert!(candidate.contains(a));
                assert!(existing.iter().all(|e| !a.overlaps(e)));
                for b in &out[i + 1..] {
                    assert!(!a.overlaps(b));
                    assert!(a.end <= b.start);
                }
            }

            // Every minute of the candidate is either kept or booked.
            let mut m = start;
            while minute(m) < candidate.end {
                let t = minute(m);
                assert_ne!(covered(&out, t), covered(&existing, t));
                m += 1;
            }

            // Idempotent.
            assert_eq!(resolve(candidate, &existing), out);

            // Booking the result leaves nothing for the same candidate.
            let mut booked = existing.clone();
            booked.extend(out.iter().copied());
            assert!(resolve(candidate, &booked).is_empty());
        }
    }
}

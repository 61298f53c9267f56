use super::constant::Constant;

/// A closed/open/unbounded interval over a single type (spec §3).
///
/// Grounded on the teacher's `Predicate`/`Op` (`storage`/`predicate.rs`),
/// which pairs a single comparison operator with one field; `ConstantRange`
/// generalizes this to the two-sided range a range-scan cursor needs,
/// closer to the teacher's later `btree::table::Predicate` usage pattern
/// (`Op::GreaterThanOrEq`/`Op::LessThanOrEq` combined by the caller).
#[derive(Clone, Debug)]
pub struct ConstantRange {
    lo: Option<Constant>,
    hi: Option<Constant>,
    lo_inclusive: bool,
    hi_inclusive: bool,
}

impl ConstantRange {
    pub fn new(
        lo: Option<Constant>,
        hi: Option<Constant>,
        lo_inclusive: bool,
        hi_inclusive: bool,
    ) -> Self {
        Self {
            lo,
            hi,
            lo_inclusive,
            hi_inclusive,
        }
    }

    /// A closed range `[lo, hi]` matching exactly one key.
    pub fn single(key: Constant) -> Self {
        Self::new(Some(key.clone()), Some(key), true, true)
    }

    /// The unbounded range `(-inf, +inf)`.
    pub fn unbounded() -> Self {
        Self::new(None, None, true, true)
    }

    pub fn lo(&self) -> Option<&Constant> {
        self.lo.as_ref()
    }

    pub fn hi(&self) -> Option<&Constant> {
        self.hi.as_ref()
    }

    pub fn lo_inclusive(&self) -> bool {
        self.lo_inclusive
    }

    pub fn hi_inclusive(&self) -> bool {
        self.hi_inclusive
    }

    /// A range with `lo > hi` is invalid and yields no rows (spec §6/§7,
    /// "invalid_range").
    pub fn is_valid(&self) -> bool {
        match (&self.lo, &self.hi) {
            (Some(lo), Some(hi)) => lo <= hi,
            _ => true,
        }
    }

    pub fn contains(&self, value: &Constant) -> bool {
        if let Some(lo) = &self.lo {
            if self.lo_inclusive {
                if value < lo {
                    return false;
                }
            } else if value <= lo {
                return false;
            }
        }
        if let Some(hi) = &self.hi {
            if self.hi_inclusive {
                if value > hi {
                    return false;
                }
            } else if value >= hi {
                return false;
            }
        }
        true
    }

    /// True once `value` has moved past the upper bound, i.e. the cursor
    /// scanning in ascending order can stop (spec §4.4 "Cursor algorithm").
    pub fn past_hi(&self, value: &Constant) -> bool {
        if let Some(hi) = &self.hi {
            if self.hi_inclusive {
                value > hi
            } else {
                value >= hi
            }
        } else {
            false
        }
    }
}

//! Sort specifications for tree children and flat rows.

use alloc::vec::Vec;
use core::cmp::Ordering;
use strata_core::Scalar;

/// Direction of one sort key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum SortOrder {
    /// Smallest first.
    #[default]
    Asc,
    /// Largest first.
    Desc,
    /// Smallest magnitude first.
    AscAbs,
    /// Largest magnitude first.
    DescAbs,
    /// Keep the existing order.
    None,
}

impl SortOrder {
    /// Compares two keys in this order.
    pub fn compare(&self, a: &Scalar, b: &Scalar) -> Ordering {
        match self {
            SortOrder::Asc => a.cmp(b),
            SortOrder::Desc => b.cmp(a),
            SortOrder::AscAbs => a.abs().cmp(&b.abs()),
            SortOrder::DescAbs => b.abs().cmp(&a.abs()),
            SortOrder::None => Ordering::Equal,
        }
    }
}

/// One sort key: an aggregate (or, for flat views, a column) and a direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SortSpec {
    pub index: usize,
    pub order: SortOrder,
}

impl SortSpec {
    /// Creates a sort key.
    pub fn new(index: usize, order: SortOrder) -> Self {
        Self { index, order }
    }

    /// Ascending on `index`.
    pub fn asc(index: usize) -> Self {
        Self::new(index, SortOrder::Asc)
    }

    /// Descending on `index`.
    pub fn desc(index: usize) -> Self {
        Self::new(index, SortOrder::Desc)
    }
}

/// Compares two key tuples under a multi-key spec; the first unequal key wins.
pub fn compare_keys(spec: &[SortSpec], a: &[Scalar], b: &[Scalar]) -> Ordering {
    for (k, s) in spec.iter().enumerate() {
        let (Some(x), Some(y)) = (a.get(k), b.get(k)) else {
            break;
        };
        let ord = s.order.compare(x, y);
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// Returns true if the spec reorders anything.
pub fn is_active(spec: &[SortSpec]) -> bool {
    spec.iter().any(|s| s.order != SortOrder::None)
}

/// Drops keys whose index is `>= limit`, returning how many were dropped.
pub fn retain_valid(spec: &mut Vec<SortSpec>, limit: usize) -> usize {
    let before = spec.len();
    spec.retain(|s| s.index < limit);
    before - spec.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn test_orders() {
        let a = Scalar::Float64(-5.0);
        let b = Scalar::Float64(3.0);
        assert_eq!(SortOrder::Asc.compare(&a, &b), Ordering::Less);
        assert_eq!(SortOrder::Desc.compare(&a, &b), Ordering::Greater);
        assert_eq!(SortOrder::AscAbs.compare(&a, &b), Ordering::Greater);
        assert_eq!(SortOrder::DescAbs.compare(&a, &b), Ordering::Less);
        assert_eq!(SortOrder::None.compare(&a, &b), Ordering::Equal);
    }

    #[test]
    fn test_compare_keys_first_difference_wins() {
        let spec = [SortSpec::asc(0), SortSpec::desc(1)];
        let a = [Scalar::Int64(1), Scalar::Int64(1)];
        let b = [Scalar::Int64(1), Scalar::Int64(2)];
        assert_eq!(compare_keys(&spec, &a, &b), Ordering::Greater);
        assert_eq!(compare_keys(&[], &a, &b), Ordering::Equal);
    }

    #[test]
    fn test_retain_valid() {
        let mut spec = vec![SortSpec::asc(0), SortSpec::asc(4)];
        assert_eq!(retain_valid(&mut spec, 2), 1);
        assert_eq!(spec, vec![SortSpec::asc(0)]);
        assert!(is_active(&spec));
        assert!(!is_active(&[SortSpec::new(0, SortOrder::None)]));
    }
}

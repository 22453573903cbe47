//! Reference number allocation tests
//!
//! - Concurrent allocation never hands out the same number twice
//! - Counters are independent per order type and year
//! - Reference numbers are zero-padded and sortable

use std::collections::HashSet;
use std::sync::Arc;

use proptest::prelude::*;
use retail_transfer_backend::services::{InMemorySequenceAllocator, SequenceAllocator};
use shared::format_reference_no;

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// 100 concurrent callers receive 100 distinct, gap-free values
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_allocations_are_distinct() {
        let allocator: Arc<dyn SequenceAllocator> = Arc::new(InMemorySequenceAllocator::new("BR"));

        let handles: Vec<_> = (0..100)
            .map(|_| {
                let allocator = allocator.clone();
                tokio::spawn(async move { allocator.allocate("branch_request", 2025).await })
            })
            .collect();

        let mut values = HashSet::new();
        for handle in handles {
            let value = handle.await.unwrap().unwrap();
            assert!(values.insert(value), "duplicate sequence {}", value);
        }

        assert_eq!(values.len(), 100);
        assert_eq!(values.iter().min(), Some(&1));
        assert_eq!(values.iter().max(), Some(&100));
    }

    /// Each (order type, year) key has its own counter
    #[tokio::test]
    async fn test_keys_are_independent() {
        let allocator = InMemorySequenceAllocator::new("BR");

        assert_eq!(allocator.allocate("branch_request", 2025).await.unwrap(), 1);
        assert_eq!(allocator.allocate("branch_request", 2025).await.unwrap(), 2);
        assert_eq!(allocator.allocate("branch_request", 2026).await.unwrap(), 1);
        assert_eq!(allocator.allocate("purchase_order", 2025).await.unwrap(), 1);
        assert_eq!(allocator.allocate("branch_request", 2025).await.unwrap(), 3);
    }

    #[test]
    fn test_allocation_from_sync_context() {
        let allocator = InMemorySequenceAllocator::new("BR");
        let first = tokio_test::block_on(allocator.allocate("branch_request", 2025)).unwrap();
        let second = tokio_test::block_on(allocator.allocate("branch_request", 2025)).unwrap();
        assert!(second > first);
        assert_eq!(allocator.prefix(), "BR");
    }

    #[test]
    fn test_reference_format() {
        assert_eq!(format_reference_no("BR", 2025, 42), "BR-2025-00042");
        assert_eq!(format_reference_no("BR", 2025, 123456), "BR-2025-123456");
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        /// Sequential allocations are strictly increasing
        #[test]
        fn prop_allocations_strictly_increase(count in 1usize..50, year in 2000i32..2100) {
            let allocator = InMemorySequenceAllocator::new("BR");
            let values: Vec<i64> = (0..count)
                .map(|_| tokio_test::block_on(allocator.allocate("branch_request", year)).unwrap())
                .collect();

            prop_assert!(values.windows(2).all(|w| w[0] < w[1]));
            prop_assert_eq!(values.last().copied(), Some(count as i64));
        }

        /// Reference numbers of the same year sort in allocation order
        #[test]
        fn prop_reference_numbers_sort_by_sequence(a in 1i64..99999, b in 1i64..99999) {
            let ra = format_reference_no("BR", 2025, a);
            let rb = format_reference_no("BR", 2025, b);
            prop_assert_eq!(a.cmp(&b), ra.cmp(&rb));
        }
    }
}

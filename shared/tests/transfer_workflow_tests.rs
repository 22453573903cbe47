//! Transfer workflow tests
//!
//! End-to-end lifecycle scenarios driven through the pure aggregate:
//! - Dispatch, receipt within tolerance, completion
//! - Out-of-tolerance receipt opening a weight variance discrepancy
//! - Resolution producing stock effects
//! - Transition graph and weight arithmetic properties
//! - Random operation sequences against the lifecycle

use std::collections::HashMap;
use std::str::FromStr;

use chrono::Utc;
use proptest::prelude::*;
use rust_decimal::Decimal;
use uuid::Uuid;

use shared::reconciliation;
use shared::{
    DiscrepancyStatus, Disposition, NewDiscrepancy, NewDiscrepancyLine, NewTransfer,
    NewTransferLine, ReasonCategory, ReceiptInput, ShipmentInput, StockEffect, TransferAggregate,
    TransferError, TransferEvent, TransferStatus, UnloadingMismatch,
};

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

/// The transfer lifecycle, written out edge by edge
const LIFECYCLE_EDGES: [(TransferStatus, TransferStatus); 7] = [
    (TransferStatus::Draft, TransferStatus::Approved),
    (TransferStatus::Approved, TransferStatus::Dispatched),
    (TransferStatus::Dispatched, TransferStatus::InTransit),
    (TransferStatus::InTransit, TransferStatus::DeliveredPendingConfirm),
    (TransferStatus::DeliveredPendingConfirm, TransferStatus::Completed),
    (TransferStatus::DeliveredPendingConfirm, TransferStatus::Discrepant),
    (TransferStatus::Discrepant, TransferStatus::Resolved),
];

fn new_transfer(products: &[(Uuid, &str)]) -> NewTransfer {
    NewTransfer {
        from_branch_id: Uuid::new_v4(),
        to_branch_id: Uuid::new_v4(),
        lines: products
            .iter()
            .map(|(product_id, qty)| NewTransferLine {
                product_id: *product_id,
                expected_qty: dec(qty),
            })
            .collect(),
        notes: Some("weekly replenishment".into()),
    }
}

fn shipment(gross: &str, tare: &str) -> ShipmentInput {
    ShipmentInput {
        transporter_name: "Sharma Roadlines".into(),
        vehicle_no: "MH12AB1234".into(),
        lr_no: Some("LR-1001".into()),
        gross_weight_kg: dec(gross),
        tare_weight_kg: dec(tare),
    }
}

fn reweigh(gross: &str, tare: &str) -> ReceiptInput {
    ReceiptInput {
        reweigh_gross_kg: dec(gross),
        reweigh_tare_kg: dec(tare),
        tolerance_percent: None,
        unloading_mismatches: vec![],
    }
}

/// Draft -> approved -> in_transit with one shipment of 105/5 kg
fn in_transit(products: &[(Uuid, &str)]) -> TransferAggregate {
    let mut agg =
        TransferAggregate::create(new_transfer(products), "BR-2025-00042".into(), Utc::now())
            .unwrap();
    agg.approve(Utc::now()).unwrap();
    agg.dispatch(shipment("105", "5"), Utc::now()).unwrap();
    agg
}

/// Apply effects the way the stock service does, keyed for idempotency
fn apply_effects(
    ledger: &mut HashMap<(Uuid, Uuid), Decimal>,
    applied: &mut Vec<Uuid>,
    effects: &[StockEffect],
) {
    for effect in effects {
        if let StockEffect::Adjust {
            idempotency_key,
            branch_id,
            product_id,
            delta,
        } = effect
        {
            if applied.contains(idempotency_key) {
                continue;
            }
            applied.push(*idempotency_key);
            *ledger.entry((*branch_id, *product_id)).or_default() +=
                delta.weight_kg.unwrap_or_default();
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// Shipped 100 kg, received 99 kg at 1% tolerance completes
    #[test]
    fn test_receipt_on_tolerance_boundary_completes() {
        let mut agg = in_transit(&[(Uuid::new_v4(), "100")]);
        agg.mark_reached(Utc::now()).unwrap();

        let outcome = agg.receive(reweigh("104", "5"), dec("1.0"), Utc::now()).unwrap();

        assert!(outcome.receipt.within_tolerance);
        assert_eq!(outcome.receipt.reweigh_net_kg, dec("99"));
        assert_eq!(outcome.receipt.variance_ratio, Some(dec("0.01")));
        assert_eq!(agg.status(), TransferStatus::Completed);
        assert!(agg.discrepancies.is_empty());
    }

    /// Shipped 100 kg, received 95 kg opens a weight variance discrepancy
    #[test]
    fn test_out_of_tolerance_receipt_opens_discrepancy() {
        let product = Uuid::new_v4();
        let mut agg = in_transit(&[(product, "100")]);
        agg.mark_reached(Utc::now()).unwrap();
        agg.take_events();

        let outcome = agg.receive(reweigh("100", "5"), dec("1.0"), Utc::now()).unwrap();

        assert!(!outcome.receipt.within_tolerance);
        assert_eq!(agg.status(), TransferStatus::Discrepant);
        assert_eq!(outcome.discrepancies.len(), 1);

        let discrepancy = &outcome.discrepancies[0];
        assert_eq!(discrepancy.reason_category, ReasonCategory::WeightVariance);
        assert_eq!(discrepancy.status, DiscrepancyStatus::Open);
        assert_eq!(discrepancy.lines.len(), 1);
        assert_eq!(discrepancy.lines[0].product_id, Some(product));
        assert_eq!(discrepancy.lines[0].weight_delta_kg, Some(dec("-5")));
        assert_eq!(discrepancy.lines[0].qty_delta, Some(dec("-5")));

        let events = agg.take_events();
        assert!(events.contains(&TransferEvent::DiscrepancyRaised {
            discrepancy_id: discrepancy.id,
            transfer_id: agg.id(),
        }));
    }

    /// Adjusting a -5 kg line lowers receiving stock by 5 and resolves the transfer
    #[test]
    fn test_adjust_resolution_decreases_receiving_stock() {
        let product = Uuid::new_v4();
        let mut agg = in_transit(&[(product, "100")]);
        let outcome = agg.receive(reweigh("100", "5"), dec("1.0"), Utc::now()).unwrap();
        let discrepancy_id = outcome.discrepancies[0].id;

        agg.start_review(discrepancy_id, Utc::now()).unwrap();
        let resolution = agg
            .resolve(discrepancy_id, Disposition::Adjust, Some("accepted shortage".into()), Utc::now())
            .unwrap();

        let mut ledger = HashMap::new();
        let mut applied = Vec::new();
        let receiving = agg.transfer.to_branch_id;
        ledger.insert((receiving, product), dec("100"));
        apply_effects(&mut ledger, &mut applied, &resolution.effects);
        // Replaying the same effects changes nothing
        apply_effects(&mut ledger, &mut applied, &resolution.effects);

        assert_eq!(ledger[&(receiving, product)], dec("95"));
        assert_eq!(resolution.transfer_status, TransferStatus::Resolved);
        assert_eq!(resolution.discrepancy.status, DiscrepancyStatus::Resolved);
        assert!(resolution.discrepancy.resolved_at.is_some());
    }

    /// Receive accepted straight from in_transit
    #[test]
    fn test_receive_twice_is_invalid_state() {
        let mut agg = in_transit(&[(Uuid::new_v4(), "10")]);
        agg.receive(reweigh("105", "5"), dec("1.0"), Utc::now()).unwrap();

        let before = agg.clone();
        let err = agg
            .receive(reweigh("105", "5"), dec("1.0"), Utc::now())
            .unwrap_err();
        assert!(matches!(err, TransferError::InvalidState { action: "receive", .. }));
        assert_eq!(agg.receipts, before.receipts);
        assert_eq!(agg.status(), TransferStatus::Completed);
    }

    /// Invalid actions leave the aggregate untouched
    #[test]
    fn test_invalid_transitions_change_nothing() {
        let mut agg = TransferAggregate::create(
            new_transfer(&[(Uuid::new_v4(), "5")]),
            "BR-2025-00043".into(),
            Utc::now(),
        )
        .unwrap();
        let before = agg.clone();

        assert!(agg.mark_reached(Utc::now()).is_err());
        assert!(agg.dispatch(shipment("105", "5"), Utc::now()).is_err());
        assert!(agg.receive(reweigh("105", "5"), dec("1"), Utc::now()).is_err());
        assert_eq!(agg, before);
        assert!(agg.pending_events().is_empty());
    }

    /// Weight variance across two products sums exactly to the total
    #[test]
    fn test_multi_line_apportionment_sums_to_variance() {
        let mut agg = in_transit(&[(Uuid::new_v4(), "30"), (Uuid::new_v4(), "70")]);
        let outcome = agg.receive(reweigh("95.5", "5"), dec("1.0"), Utc::now()).unwrap();

        let lines = &outcome.discrepancies[0].lines;
        assert_eq!(lines.len(), 2);
        let total: Decimal = lines.iter().filter_map(|l| l.weight_delta_kg).sum();
        assert_eq!(total, dec("-9.5"));
        assert_eq!(lines[0].weight_delta_kg, Some(dec("-2.85")));
    }

    /// Invalid tolerance rejected before anything is recorded
    #[test]
    fn test_tolerance_out_of_range() {
        let mut agg = in_transit(&[(Uuid::new_v4(), "10")]);
        let mut input = reweigh("105", "5");
        input.tolerance_percent = Some(dec("150"));

        assert!(matches!(
            agg.receive(input, dec("1"), Utc::now()),
            Err(TransferError::Validation { .. })
        ));
        assert!(agg.receipts.is_empty());
        assert_eq!(agg.status(), TransferStatus::InTransit);
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    /// Weights in kg with one decimal place, 0.1 to 10000.0
    fn weight_strategy() -> impl Strategy<Value = Decimal> {
        (1i64..=100000i64).prop_map(|n| Decimal::new(n, 1))
    }

    fn status_strategy() -> impl Strategy<Value = TransferStatus> {
        prop::sample::select(TransferStatus::ALL.to_vec())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Net weight is gross minus tare and never negative
        #[test]
        fn prop_net_weight_is_gross_minus_tare(
            tare in weight_strategy(),
            extra in weight_strategy()
        ) {
            let gross = tare + extra;
            prop_assert_eq!(reconciliation::net_weight(gross, tare).unwrap(), extra);
        }

        /// Gross below tare fails and records no shipment
        #[test]
        fn prop_gross_below_tare_persists_nothing(
            gross in weight_strategy(),
            extra in weight_strategy()
        ) {
            let tare = gross + extra;
            let mut agg = TransferAggregate::create(
                new_transfer(&[(Uuid::new_v4(), "1")]),
                "BR-2025-00001".into(),
                Utc::now(),
            )
            .unwrap();
            agg.approve(Utc::now()).unwrap();

            let input = ShipmentInput {
                gross_weight_kg: gross,
                tare_weight_kg: tare,
                ..shipment("1", "0")
            };
            let is_invalid_weight = matches!(
                agg.dispatch(input, Utc::now()),
                Err(TransferError::InvalidWeight { .. })
            );
            prop_assert!(is_invalid_weight);
            prop_assert!(agg.shipments.is_empty());
            prop_assert_eq!(agg.status(), TransferStatus::Approved);
        }

        /// A variance of exactly the tolerance is within tolerance
        #[test]
        fn prop_tolerance_boundary_is_inclusive(
            shipped in weight_strategy(),
            tolerance_tenths in 0i64..=100i64
        ) {
            let tolerance = Decimal::new(tolerance_tenths, 1);
            let received = shipped - shipped * tolerance / Decimal::ONE_HUNDRED;
            let ratio = reconciliation::variance_ratio(shipped, received).unwrap();
            prop_assert!(reconciliation::is_within_tolerance(ratio, tolerance));
        }

        /// Exactly the lifecycle edges are accepted
        #[test]
        fn prop_transition_graph_matches_lifecycle(
            from in status_strategy(),
            to in status_strategy()
        ) {
            prop_assert_eq!(from.can_transition_to(to), LIFECYCLE_EDGES.contains(&(from, to)));
            if from.is_terminal() {
                prop_assert!(!LIFECYCLE_EDGES.iter().any(|(f, _)| *f == from));
            }
        }

        /// Apportioned weight deltas always sum to the variance
        #[test]
        fn prop_apportion_preserves_total(
            shipped in weight_strategy(),
            received in weight_strategy(),
            qtys in prop::collection::vec(1i64..=500i64, 1..6)
        ) {
            let comparison = reconciliation::compare(shipped, received, Decimal::ZERO, Decimal::ONE).unwrap();
            let lines: Vec<(Uuid, Decimal)> = qtys
                .iter()
                .map(|q| (Uuid::new_v4(), Decimal::from(*q)))
                .collect();

            let deltas = reconciliation::apportion(&comparison, &lines).unwrap();
            let total: Decimal = deltas.iter().map(|d| d.weight_delta_kg).sum();
            prop_assert_eq!(deltas.len(), lines.len());
            prop_assert_eq!(total, comparison.variance_kg);
        }
    }
}

// ============================================================================
// Operation Sequences
// ============================================================================

#[cfg(test)]
mod sequence_tests {
    use super::*;

    #[derive(Debug, Clone)]
    enum Op {
        Approve,
        Dispatch { net_tenths: i64 },
        MarkReached,
        /// Re-weigh at shipped net plus `offset_tenths`
        Receive { offset_tenths: i64, mismatch: bool },
        Raise,
        StartReview(usize),
        Reopen(usize),
        Resolve(usize, Disposition),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            Just(Op::Approve),
            (1i64..=2000i64).prop_map(|net_tenths| Op::Dispatch { net_tenths }),
            Just(Op::MarkReached),
            (-100i64..=100i64, any::<bool>())
                .prop_map(|(offset_tenths, mismatch)| Op::Receive { offset_tenths, mismatch }),
            Just(Op::Raise),
            (0usize..4).prop_map(Op::StartReview),
            (0usize..4).prop_map(Op::Reopen),
            (0usize..4, prop::sample::select(vec![Disposition::Adjust, Disposition::Scrap]))
                .prop_map(|(idx, disposition)| Op::Resolve(idx, disposition)),
        ]
    }

    fn target(agg: &TransferAggregate, idx: usize) -> (Option<usize>, Uuid) {
        if agg.discrepancies.is_empty() {
            (None, Uuid::new_v4())
        } else {
            let idx = idx % agg.discrepancies.len();
            (Some(idx), agg.discrepancies[idx].id)
        }
    }

    fn apply(agg: &mut TransferAggregate, op: &Op, product: Uuid) -> Result<(), TransferError> {
        let now = Utc::now();
        match *op {
            Op::Approve => agg.approve(now),
            Op::Dispatch { net_tenths } => agg
                .dispatch(
                    ShipmentInput {
                        gross_weight_kg: Decimal::new(net_tenths, 1) + dec("5"),
                        tare_weight_kg: dec("5"),
                        ..shipment("1", "0")
                    },
                    now,
                )
                .map(|_| ()),
            Op::MarkReached => agg.mark_reached(now),
            Op::Receive { offset_tenths, mismatch } => {
                let gross = (agg.shipped_net_kg() + Decimal::new(offset_tenths, 1)).max(Decimal::ZERO);
                let mut input = ReceiptInput {
                    reweigh_gross_kg: gross,
                    ..reweigh("0", "0")
                };
                if mismatch {
                    input.unloading_mismatches.push(UnloadingMismatch {
                        product_id: product,
                        qty_delta: dec("-1"),
                        notes: None,
                    });
                }
                agg.receive(input, Decimal::ONE, now).map(|_| ())
            }
            Op::Raise => agg
                .raise_discrepancy(
                    NewDiscrepancy {
                        reason_category: ReasonCategory::Damage,
                        lines: vec![NewDiscrepancyLine {
                            product_id: product,
                            qty_delta: Some(dec("-1")),
                            weight_delta_kg: None,
                            notes: None,
                        }],
                        notes: None,
                    },
                    now,
                )
                .map(|_| ()),
            Op::StartReview(idx) => {
                let (_, id) = target(agg, idx);
                agg.start_review(id, now).map(|_| ())
            }
            Op::Reopen(idx) => {
                let (_, id) = target(agg, idx);
                agg.reopen(id, None, now).map(|_| ())
            }
            Op::Resolve(idx, disposition) => {
                let (_, id) = target(agg, idx);
                agg.resolve(id, disposition, None, now).map(|_| ())
            }
        }
    }

    /// Ops whose input is valid by construction can only fail on state
    fn fails_on_state_only(op: &Op) -> bool {
        matches!(
            op,
            Op::Approve | Op::Dispatch { .. } | Op::MarkReached | Op::Receive { .. } | Op::Raise
        )
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Any sequence of operations only ever walks lifecycle edges, and a
        /// failed operation leaves the aggregate as it was. The one exception
        /// is a rejected resolution, which reopens a discrepancy under review.
        #[test]
        fn prop_operation_sequences_respect_lifecycle(
            ops in prop::collection::vec(op_strategy(), 1..30)
        ) {
            let product = Uuid::new_v4();
            let mut agg = TransferAggregate::create(
                new_transfer(&[(product, "40"), (Uuid::new_v4(), "60")]),
                "BR-2025-00500".into(),
                Utc::now(),
            )
            .unwrap();
            agg.take_events();

            for op in &ops {
                let before = agg.clone();
                let result = apply(&mut agg, op, product);
                let events = agg.take_events();

                match result {
                    Ok(()) => {
                        let mut current = before.status();
                        for event in &events {
                            if let TransferEvent::TransferStatusChanged { from_status, to_status, .. } = event {
                                prop_assert_eq!(*from_status, current);
                                prop_assert!(
                                    LIFECYCLE_EDGES.contains(&(*from_status, *to_status)),
                                    "{:?} emitted {} -> {}", op, from_status, to_status
                                );
                                current = *to_status;
                            }
                        }
                        prop_assert_eq!(current, agg.status());
                    }
                    Err(err) => {
                        prop_assert!(events.is_empty(), "{:?} failed but emitted {:?}", op, events);
                        if fails_on_state_only(op) {
                            let is_invalid_state = matches!(err, TransferError::InvalidState { .. });
                            prop_assert!(is_invalid_state, "{:?} failed with {:?}", op, err);
                        }

                        let reopened = match op {
                            Op::Resolve(idx, _) if matches!(err, TransferError::Validation { .. }) => {
                                target(&before, *idx).0.filter(|i| {
                                    before.discrepancies[*i].status == DiscrepancyStatus::UnderReview
                                })
                            }
                            _ => None,
                        };
                        if let Some(idx) = reopened {
                            let mut expected = before.clone();
                            expected.discrepancies[idx].status = DiscrepancyStatus::Reopened;
                            expected.transfer.updated_at = agg.transfer.updated_at;
                            prop_assert_eq!(&agg, &expected);
                        } else {
                            prop_assert_eq!(&agg, &before);
                        }
                    }
                }

                if before.status().is_terminal() {
                    prop_assert_eq!(agg.status(), before.status());
                }
                if agg.status() == TransferStatus::Completed {
                    prop_assert!(agg.discrepancies.is_empty());
                }
                if agg.status() == TransferStatus::Resolved {
                    prop_assert!(agg
                        .discrepancies
                        .iter()
                        .all(|d| d.status == DiscrepancyStatus::Resolved));
                }
            }
        }
    }
}

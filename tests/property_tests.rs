use chrono::Utc;
use proptest::prelude::*;

use stockroom_api::entities::conversion_rate;
use stockroom_api::services::unit_conversion::{self, LevelQuantities};

fn rates(level1_rate: i64, level2_rate: i64) -> conversion_rate::Model {
    conversion_rate::Model {
        sku: "PROP-SKU".into(),
        level1_unit_name: "carton".into(),
        level2_unit_name: "box".into(),
        level3_unit_name: "piece".into(),
        level1_rate,
        level2_rate,
        created_at: Utc::now(),
        updated_at: None,
    }
}

proptest! {
    // Greedy decomposition followed by conversion back to base units is
    // lossless for any positive rates.
    #[test]
    fn breakdown_round_trips_to_base(
        level1_rate in 1i64..10_000,
        level2_rate in 1i64..10_000,
        base in 0i64..1_000_000_000,
    ) {
        let r = rates(level1_rate, level2_rate);
        let (quantities, rates_missing) = unit_conversion::to_display_breakdown(base, Some(&r));
        prop_assert!(!rates_missing);
        let total = unit_conversion::to_base_units(&quantities, Some(&r)).unwrap();
        prop_assert_eq!(total.total, base);
    }

    // The decomposition never produces a negative count, and everything
    // below the level-1 cut fits under one more level-1 container.
    #[test]
    fn breakdown_is_canonical(
        level1_rate in 1i64..10_000,
        level2_rate in 1i64..10_000,
        base in 0i64..1_000_000_000,
    ) {
        let r = rates(level1_rate, level2_rate);
        let (q, _) = unit_conversion::to_display_breakdown(base, Some(&r));
        prop_assert!(q.is_non_negative());
        prop_assert!(q.level3 < level2_rate);
        prop_assert!(q.level2 * level2_rate + q.level3 < level1_rate);
    }

    // Without configured rates the total is the naive sum and the flag is
    // raised, never an error.
    #[test]
    fn naive_fallback_is_plain_sum(
        level1 in 0i64..1_000_000,
        level2 in 0i64..1_000_000,
        level3 in 0i64..1_000_000,
    ) {
        let total = unit_conversion::to_base_units(
            &LevelQuantities::new(level1, level2, level3),
            None,
        ).unwrap();
        prop_assert_eq!(total.total, level1 + level2 + level3);
        prop_assert!(total.rates_missing);
    }

    // Converting to base units is monotone in every level.
    #[test]
    fn base_total_is_monotone(
        level1_rate in 1i64..10_000,
        level2_rate in 1i64..10_000,
        level1 in 0i64..10_000,
        level2 in 0i64..10_000,
        level3 in 0i64..10_000,
    ) {
        let r = rates(level1_rate, level2_rate);
        let base = unit_conversion::to_base_units(
            &LevelQuantities::new(level1, level2, level3), Some(&r)).unwrap();
        let bigger = unit_conversion::to_base_units(
            &LevelQuantities::new(level1 + 1, level2, level3 + 1), Some(&r)).unwrap();
        prop_assert!(bigger.total > base.total);
    }
}

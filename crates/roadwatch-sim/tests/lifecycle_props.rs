use proptest::prelude::*;
use roadwatch_sim::scenario::ChurnConfig;
use roadwatch_sim::{SimulationConfig, Simulator};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn any_seed_and_churn_upholds_lifecycle(
        seed in any::<u64>(),
        minutes_per_pass in 1i64..240,
        write_fault_percent in 0u8..20,
        vanish_percent in 0u8..30,
        flip_percent in 0u8..30,
    ) {
        let config = SimulationConfig {
            seed,
            passes: 40,
            minutes_per_pass,
            write_fault_percent,
            churn: ChurnConfig {
                vanish_percent,
                flip_percent,
                reappear_percent: 10,
                ..ChurnConfig::default()
            },
            ..SimulationConfig::default()
        };
        let result = Simulator::new(config).expect("config").run().expect("run");
        prop_assert!(result.oracle.passed, "{:?}", result.oracle.violations);
        prop_assert!(result.notifications.completed <= result.notifications.opened);
    }
}

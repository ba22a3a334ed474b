//! Property-based tests for the condition language and the engine.
//!
//! These tests use proptest to verify properties hold across
//! many randomly generated inputs.

use proptest::prelude::*;
use tablefsm::core::ChannelHistory;
use tablefsm::{Condition, Engine, EngineConfig, Output};

const STATES: &str = "name,repeats,outputs\nidle,0,grid clear\narmed,0\ndone,0,video play 2\n";
const TRANSITIONS: &str = "home,dest,/trigger,/placement 4\n\
    idle,armed,ANY,\n\
    armed,done,,COUNT 2\n\
    done,idle,~ANY,NEW\n";

fn engine() -> Engine {
    let mut engine = Engine::load(STATES, TRANSITIONS, EngineConfig::default()).unwrap();
    engine.init();
    engine
}

prop_compose! {
    fn arbitrary_event()(
        placement in any::<bool>(),
        index in 0i64..6,
        value in -2i32..4,
    ) -> (&'static str, i64, f64) {
        let key = if placement { "/placement" } else { "/trigger" };
        (key, index, value as f64)
    }
}

/// Everything observable after replaying `events` at `level`.
type Observed = (Vec<Output>, Option<String>, Vec<Vec<f64>>, Vec<Vec<f64>>);

fn replay(level: u8, events: &[(&'static str, i64, f64)]) -> Observed {
    let config = EngineConfig::default().with_verbosity(level);
    let mut engine = Engine::load(STATES, TRANSITIONS, config).unwrap();
    engine.init();
    for (key, index, value) in events {
        let _ = engine.handle_event(key, *index, *value);
    }

    let history = engine
        .states()
        .iter()
        .flat_map(|state| {
            engine.channels().keys().map(move |key| {
                state
                    .history()
                    .snapshots(key)
                    .iter()
                    .flat_map(|snapshot| snapshot.values.iter().copied())
                    .collect::<Vec<f64>>()
            })
        })
        .collect();
    let channels = engine.channels().iter().map(|(_, v)| v.to_vec()).collect();
    (
        engine.drain_outputs(),
        engine.active_name().map(str::to_string),
        history,
        channels,
    )
}

fn small_values() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec((-3i32..4).prop_map(f64::from), 1..6)
}

proptest! {
    #[test]
    fn reset_always_zeroes_channels_and_history(
        events in prop::collection::vec(arbitrary_event(), 0..40)
    ) {
        let mut engine = engine();
        for (key, index, value) in events {
            let _ = engine.handle_event(key, index, value);
        }
        let active = engine.active_name().map(str::to_string);

        engine.reset();

        prop_assert!(engine.channels().iter().all(|(_, v)| v.iter().all(|x| *x == 0.0)));
        prop_assert!(engine.states().iter().all(|s| s.history().is_empty()));
        prop_assert_eq!(engine.active_name().map(str::to_string), active);
    }

    #[test]
    fn verbosity_never_changes_behavior(
        events in prop::collection::vec(arbitrary_event(), 0..40)
    ) {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_writer(std::io::sink)
            .finish();
        let (quiet, verbose) = tracing::subscriber::with_default(subscriber, || {
            (replay(0, &events), replay(6, &events))
        });
        prop_assert_eq!(quiet, verbose);
    }

    #[test]
    fn out_of_range_index_never_mutates(index in prop_oneof![-5i64..1, 5i64..20], value in -10.0f64..10.0) {
        let mut engine = engine();
        prop_assert!(engine.handle_event("/placement", index, value).is_err());
        prop_assert_eq!(engine.channel("/placement"), Some(&[0.0; 4][..]));
        prop_assert_eq!(engine.active_name(), Some("idle"));
    }

    #[test]
    fn aggregate_conditions_agree_with_direct_computation(values in small_values()) {
        let history = ChannelHistory::new();
        let eval = |expression: &str| {
            Condition::parse(expression).unwrap().evaluate("/c", &values, &history)
        };

        let sum: f64 = values.iter().sum();
        let positive = values.iter().filter(|v| **v > 0.0).count();

        prop_assert_eq!(eval("ANY"), values.iter().any(|v| *v != 0.0));
        prop_assert_eq!(eval("ALL"), values.iter().all(|v| *v > 0.0));
        let sum_expr = format!("SUM {sum}");
        let sum_plus_one_expr = format!("SUM {}", sum + 1.0);
        let count_expr = format!("COUNT {positive}");
        prop_assert!(eval(sum_expr.as_str()));
        prop_assert!(!eval(sum_plus_one_expr.as_str()));
        prop_assert!(eval(count_expr.as_str()));
        prop_assert_eq!(eval("~ANY"), !eval("ANY"));
    }

    #[test]
    fn wildcard_equal_matches_any_vector_of_same_length(values in small_values()) {
        let pattern = vec!["*"; values.len()].join(" ");
        let condition = Condition::parse(&format!("EQUAL {pattern}")).unwrap();
        let history = ChannelHistory::new();
        prop_assert!(condition.evaluate("/c", &values, &history));

        let mut longer = values.clone();
        longer.push(0.0);
        prop_assert!(!condition.evaluate("/c", &longer, &history));
    }

    #[test]
    fn last_matching_transition_wins(count in 1usize..8) {
        let names: Vec<String> = (0..count).map(|i| format!("s{i}")).collect();
        let mut states = String::from("name,repeats\nhome,0\n");
        let mut transitions = String::from("home,dest,/trigger\n");
        for name in &names {
            states.push_str(&format!("{name},0\n"));
            transitions.push_str(&format!("home,{name},ANY\n"));
        }

        let mut engine = Engine::load(&states, &transitions, EngineConfig::default()).unwrap();
        engine.init();
        let entered = engine.handle_event("/trigger", 1, 1.0).unwrap();
        prop_assert_eq!(entered.as_deref(), names.last().map(String::as_str));
    }
}

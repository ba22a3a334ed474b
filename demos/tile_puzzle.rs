//! Tile Puzzle Installation
//!
//! This example drives a small installation from two tables: a visitor
//! presses a trigger, places tiles on a 4-slot grid, and the machine
//! locks the grid once all four are down.
//!
//! Key concepts:
//! - States and transitions loaded from table text
//! - Guards over sensor channels (`ANY`, `COUNT`, `EQUAL`)
//! - Lifecycle hooks for logic the tables cannot express
//! - Draining emitted state names and actions
//!
//! Run with: cargo run --example tile_puzzle

use tablefsm::{Action, Engine, EngineConfig, HookError, HookTable, Output, StateHooks};

const STATES: &str = "\
name,repeats,outputs
idle,0,video loop attract,grid clear
await,1,video play instructions
solved,0,video play reward,audio cue fanfare
";

const TRANSITIONS: &str = "\
home,dest,/trigger,/placement 4
idle,await,ANY,
await,idle,,\"~ANY; CHANGE\"
solved,idle,ANY,EQUAL 0 0 0 0
";

fn print_outputs(engine: &mut Engine) {
    for output in engine.drain_outputs() {
        match output {
            Output::State(name) => println!("  state   -> {name}"),
            Output::Action(action) => println!("  action  -> {action}"),
        }
    }
}

fn main() {
    println!("=== Tile Puzzle Example ===\n");

    // The grid lock and "solved" decision live in hooks, not in the tables.
    let hooks = HookTable::new()
        .state(
            "await",
            StateHooks::new().on_update(|ctx| {
                let placed = ctx
                    .channel("/placement")
                    .map(|v| v.iter().filter(|x| **x > 0.0).count())
                    .unwrap_or(0);
                Ok((placed == 4).then(|| "solved".to_string()))
            }),
        )
        .state(
            "solved",
            StateHooks::new().on_begin(|ctx| {
                ctx.emit(Action::parse("grid lock all"));
                ctx.set("/trigger", 1, 0.0)
                    .map_err(|e| HookError::new(e.to_string()))
            }),
        );

    let mut engine = Engine::load(STATES, TRANSITIONS, EngineConfig::default())
        .expect("tables should load")
        .with_hooks(hooks);

    println!("Init:");
    engine.init();
    print_outputs(&mut engine);

    println!("\nTrigger pressed:");
    engine.handle_event("/trigger", 1, 1.0).expect("known channel");
    print_outputs(&mut engine);

    for slot in 1..=4 {
        println!("\nTile placed in slot {slot}:");
        engine.handle_event("/placement", slot, 1.0).expect("known channel");
        print_outputs(&mut engine);
    }

    println!("\nOut-of-range slot is rejected:");
    match engine.handle_event("/placement", 9, 1.0) {
        Ok(_) => println!("  unexpectedly accepted"),
        Err(err) => println!("  {err}"),
    }

    println!("\nPath: {:?}", engine.transition_log().get_path());
    println!("\n=== Example Complete ===");
}

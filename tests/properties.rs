//! Whole-world invariants under arbitrary input

use proptest::prelude::*;
use sinaloa_dragon::Settings;
use sinaloa_dragon::sim::level::{EnemySpawnDescriptor, SolidDescriptor, SpawnProperties};
use sinaloa_dragon::sim::{LevelData, PlayerInput, PlayerState, World};

const PENETRATION_TOLERANCE: f32 = 0.1;

fn arena() -> LevelData {
    let solid = |x: f32, y: f32, width: f32, height: f32, kind: &str| SolidDescriptor {
        x,
        y,
        width,
        height,
        kind: kind.to_string(),
    };
    let enemy = |x: f32, y: f32, kind: &str| EnemySpawnDescriptor {
        x,
        y,
        kind: kind.to_string(),
        properties: SpawnProperties {
            respawn: true,
            spawn_delay: 1.0,
        },
    };
    LevelData {
        name: "arena".to_string(),
        player_spawn: [160.0, 176.0],
        platforms: vec![
            solid(0.0, 200.0, 640.0, 40.0, "solid"),
            solid(-16.0, -200.0, 16.0, 440.0, "solid"),
            solid(640.0, -200.0, 16.0, 440.0, "solid"),
            solid(240.0, 150.0, 80.0, 8.0, "platform"),
            solid(420.0, 120.0, 40.0, 16.0, "solid"),
        ],
        enemy_spawns: vec![
            enemy(80.0, 176.0, "maton"),
            enemy(300.0, 184.0, "chacal"),
            enemy(520.0, 174.0, "luchador"),
            enemy(360.0, 80.0, "drone"),
        ],
        ..Default::default()
    }
}

fn input_strategy() -> impl Strategy<Value = PlayerInput> {
    (
        -1.0f32..=1.0,
        -1.0f32..=1.0,
        any::<bool>(),
        any::<bool>(),
        any::<bool>(),
        any::<bool>(),
        any::<bool>(),
    )
        .prop_map(|(move_x, move_y, jump, attack_light, attack_heavy, roll, parry)| PlayerInput {
            move_x,
            move_y,
            jump,
            attack_light,
            attack_heavy,
            roll,
            parry,
        })
}

fn check_invariants(world: &World) -> Result<(), TestCaseError> {
    let player = &world.player;
    prop_assert!(player.health.current() >= 0 && player.health.current() <= player.health.max());
    prop_assert!(player.body.rect.is_well_formed());
    prop_assert!(player.body.velocity.is_finite());
    if player.health.is_dead() {
        prop_assert_eq!(player.state, PlayerState::Dead);
        prop_assert_eq!(player.body.velocity.x, 0.0);
    }

    let mut bodies = vec![player.body.rect];
    for enemy in &world.enemies {
        prop_assert!(enemy.pawn.body.rect.is_well_formed());
        prop_assert!(enemy.pawn.body.velocity.is_finite());
        if enemy.is_dead() {
            prop_assert_eq!(enemy.pawn.body.velocity.x, 0.0);
        }
        bodies.push(enemy.pawn.body.rect);
    }

    for body in &bodies {
        for solid in world.physics.active_solids() {
            prop_assert!(
                !body.penetrates(solid, PENETRATION_TOLERANCE),
                "{:?} inside {:?} at frame {}",
                body,
                solid,
                world.frame
            );
        }
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_world_invariants_hold(inputs in prop::collection::vec(input_strategy(), 1..240)) {
        let mut world = World::new(Settings::default(), 11);
        world.load_level(&arena());
        world.player.unlock_skill("dash");
        world.player.unlock_skill("double_jump");

        for input in &inputs {
            world.step(input);
            world.drain_events();
            check_invariants(&world)?;
        }
    }

    #[test]
    fn prop_same_inputs_same_outcome(inputs in prop::collection::vec(input_strategy(), 1..120)) {
        let run = |inputs: &[PlayerInput]| {
            let mut world = World::new(Settings::default(), 3);
            world.load_level(&arena());
            let mut events = Vec::new();
            for input in inputs {
                world.step(input);
                events.extend(world.drain_events());
            }
            (world.player.body.rect, world.player.health.current(), events)
        };
        let a = run(&inputs);
        let b = run(&inputs);
        prop_assert_eq!(a.0, b.0);
        prop_assert_eq!(a.1, b.1);
        prop_assert_eq!(a.2, b.2);
    }
}

//! Sinaloa Dragon headless runner
//!
//! Loads a level (a JSON path, or the built-in demo), plays a scripted input
//! sequence for a number of frames and logs what happens.
//!
//! Usage: `sinaloa-dragon [level.json] [frames] [settings.json]`

use std::process::ExitCode;

use sinaloa_dragon::consts::SIM_DT;
use sinaloa_dragon::sim::{GameEvent, LevelData, PlayerInput, World};
use sinaloa_dragon::{RunStats, Settings};

const DEFAULT_FRAMES: u64 = 1200;
const SEED: u64 = 0x51_4E_A1_0A;

/// Walk right, hop now and then, throw a light chain when something is close
fn scripted_input(world: &World) -> PlayerInput {
    let frame = world.frame;
    let player = world.player.body.center();
    let enemy_close = world
        .enemies
        .iter()
        .filter(|e| !e.is_dead())
        .any(|e| e.pawn.body.center().distance(player) < 40.0);

    PlayerInput {
        move_x: if enemy_close { 0.0 } else { 1.0 },
        jump: frame % 90 == 45,
        attack_light: enemy_close && frame % 12 == 0,
        parry: enemy_close && frame % 40 == 20,
        ..Default::default()
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let level = match args.next() {
        Some(path) => LevelData::load(&path)?,
        None => LevelData::demo(),
    };
    let frames = match args.next() {
        Some(n) => n.parse::<u64>()?,
        None => DEFAULT_FRAMES,
    };
    let settings = match args.next() {
        Some(path) => Settings::load(&path)?,
        None => Settings::default(),
    };

    let mut world = World::new(settings, SEED);
    let errors = world.load_level(&level);
    if !errors.is_empty() {
        log::warn!("{} level descriptors skipped", errors.len());
    }
    world.player.unlock_skill("dash");
    world.player.unlock_skill("double_jump");

    let mut stats = RunStats::new();
    for _ in 0..frames {
        let input = scripted_input(&world);
        world.advance(SIM_DT, &input);

        let events = world.drain_events();
        for event in &events {
            match event {
                GameEvent::Hit(hit) => log::debug!(
                    "frame {}: {} hit {} for {}",
                    world.frame,
                    hit.attacker,
                    hit.defender,
                    hit.damage
                ),
                other => log::info!("frame {}: {:?}", world.frame, other),
            }
        }
        stats.record_all(&events);

        if world.player.is_dead() {
            log::info!("Player down at frame {}", world.frame);
            break;
        }
    }

    log::info!(
        "Finished after {} frames: hp {}/{}, {} coins, {} enemies defeated, completed: {}",
        world.frame,
        world.player.health.current(),
        world.player.health.max(),
        world.coins,
        world.enemies_defeated,
        world.completed
    );
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

fn main() -> ExitCode {
    #[cfg(not(target_arch = "wasm32"))]
    env_logger::init();
    log::info!("Sinaloa Dragon (headless) starting...");

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

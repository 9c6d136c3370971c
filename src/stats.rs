//! Run statistics
//!
//! Accumulated from drained `GameEvent`s so HUD and save collaborators never
//! reach into the simulation. How they are stored is up to the caller.

use serde::{Deserialize, Serialize};

use crate::sim::{EntityId, GameEvent};

/// Counters for one play session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub hits_landed: u32,
    pub hits_taken: u32,
    pub damage_dealt: u32,
    pub damage_taken: u32,
    pub parries: u32,
    pub enemies_defeated: u32,
    pub coins: u32,
    pub best_combo: u32,
    pub meter_earned: u32,
    pub deaths: u32,
    pub levels_completed: u32,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one event into the counters
    pub fn record(&mut self, event: &GameEvent) {
        let player = EntityId::PLAYER;
        match *event {
            GameEvent::Hit(hit) => {
                let damage = hit.damage.max(0) as u32;
                if hit.attacker == player {
                    self.hits_landed += 1;
                    self.damage_dealt += damage;
                } else if hit.defender == player {
                    self.hits_taken += 1;
                    self.damage_taken += damage;
                }
            }
            GameEvent::HazardDamage { id, damage } if id == player => {
                self.damage_taken += damage.max(0) as u32;
            }
            GameEvent::Parried { defender, .. } if defender == player => self.parries += 1,
            GameEvent::EntityDied { id } => {
                if id == player {
                    self.deaths += 1;
                } else {
                    self.enemies_defeated += 1;
                }
            }
            GameEvent::Collected { kind, value } => {
                if kind == crate::sim::CollectibleKind::Coin {
                    self.coins += value.max(0) as u32;
                }
            }
            GameEvent::ComboFinished { count, meter_awarded } => {
                self.best_combo = self.best_combo.max(count);
                if meter_awarded {
                    self.meter_earned += 1;
                }
            }
            GameEvent::LevelCompleted { .. } => self.levels_completed += 1,
            _ => {}
        }
    }

    pub fn record_all<'a>(&mut self, events: impl IntoIterator<Item = &'a GameEvent>) {
        for event in events {
            self.record(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{AttackEffect, AttackId, CollectibleKind, HitEvent};
    use glam::Vec2;

    fn hit(attacker: u32, defender: u32, damage: i32) -> GameEvent {
        GameEvent::Hit(HitEvent {
            attacker: EntityId(attacker),
            defender: EntityId(defender),
            attack: AttackId(1),
            damage,
            knockback: Vec2::ZERO,
            effect: AttackEffect::None,
            hit_point: Vec2::ZERO,
        })
    }

    #[test]
    fn test_record_events() {
        let mut stats = RunStats::new();
        stats.record_all(&[
            hit(1, 5, 8),
            hit(1, 5, 10),
            hit(5, 1, 6),
            GameEvent::Parried {
                attacker: EntityId(5),
                defender: EntityId(1),
            },
            GameEvent::EntityDied { id: EntityId(5) },
            GameEvent::Collected {
                kind: CollectibleKind::Coin,
                value: 3,
            },
            GameEvent::Collected {
                kind: CollectibleKind::Health,
                value: 10,
            },
            GameEvent::ComboFinished {
                count: 12,
                meter_awarded: true,
            },
            GameEvent::ComboFinished {
                count: 4,
                meter_awarded: false,
            },
        ]);
        assert_eq!(stats.hits_landed, 2);
        assert_eq!(stats.damage_dealt, 18);
        assert_eq!(stats.hits_taken, 1);
        assert_eq!(stats.damage_taken, 6);
        assert_eq!(stats.parries, 1);
        assert_eq!(stats.enemies_defeated, 1);
        assert_eq!(stats.coins, 3);
        assert_eq!(stats.best_combo, 12);
        assert_eq!(stats.meter_earned, 1);
    }
}

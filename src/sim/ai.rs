//! Enemy AI state machine engine
//!
//! Reusable finite-state machine: transitions are (from, to, condition,
//! priority) tuples evaluated in descending priority each frame, and the
//! first satisfied one wins. A behavior function then runs for the current
//! state only. Conditions and behaviors are plain function pointers looked
//! up from a `Brain`, so archetypes customize a table rather than override
//! methods.
//!
//! A condition or behavior that fails drops the agent back to Idle for that
//! frame; it never stops the rest of the simulation.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use glam::Vec2;
use rand::SeedableRng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::entity::EntityId;
use super::geom::Rect;
use super::physics::PhysicsWorld;
use crate::error::AiError;
use crate::finite_or_zero;

/// Built-in AI states
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum AiState {
    #[default]
    Idle,
    Patrol,
    Chase,
    Attack,
    Flee,
    Stunned,
}

impl AiState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AiState::Idle => "idle",
            AiState::Patrol => "patrol",
            AiState::Chase => "chase",
            AiState::Attack => "attack",
            AiState::Flee => "flee",
            AiState::Stunned => "stunned",
        }
    }
}

// ============================================================================
// Blackboard
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BlackboardValue {
    Float(f32),
    Vec2(Vec2),
    Bool(bool),
    Entity(EntityId),
}

/// Per-agent scratch memory
///
/// Keys set with `set_transient` are dropped on every state change; keys set
/// with `set` survive until removed.
#[derive(Debug, Clone, Default)]
pub struct Blackboard {
    values: BTreeMap<&'static str, BlackboardValue>,
    transient: BTreeSet<&'static str>,
}

impl Blackboard {
    pub fn set(&mut self, key: &'static str, value: BlackboardValue) {
        self.transient.remove(key);
        self.values.insert(key, value);
    }

    pub fn set_transient(&mut self, key: &'static str, value: BlackboardValue) {
        self.transient.insert(key);
        self.values.insert(key, value);
    }

    pub fn get(&self, key: &'static str) -> Option<&BlackboardValue> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &'static str) -> bool {
        self.values.contains_key(key)
    }

    pub fn remove(&mut self, key: &'static str) {
        self.values.remove(key);
        self.transient.remove(key);
    }

    pub fn is_transient(&self, key: &'static str) -> bool {
        self.transient.contains(key)
    }

    pub fn float(&self, key: &'static str) -> Result<f32, AiError> {
        match self.values.get(key) {
            Some(BlackboardValue::Float(v)) => Ok(*v),
            Some(_) => Err(AiError::TypeMismatch { key, expected: "float" }),
            None => Err(AiError::MissingKey(key)),
        }
    }

    pub fn vec2(&self, key: &'static str) -> Result<Vec2, AiError> {
        match self.values.get(key) {
            Some(BlackboardValue::Vec2(v)) => Ok(*v),
            Some(_) => Err(AiError::TypeMismatch { key, expected: "vec2" }),
            None => Err(AiError::MissingKey(key)),
        }
    }

    pub fn flag(&self, key: &'static str) -> Result<bool, AiError> {
        match self.values.get(key) {
            Some(BlackboardValue::Bool(v)) => Ok(*v),
            Some(_) => Err(AiError::TypeMismatch { key, expected: "bool" }),
            None => Err(AiError::MissingKey(key)),
        }
    }

    pub fn entity(&self, key: &'static str) -> Result<EntityId, AiError> {
        match self.values.get(key) {
            Some(BlackboardValue::Entity(v)) => Ok(*v),
            Some(_) => Err(AiError::TypeMismatch { key, expected: "entity" }),
            None => Err(AiError::MissingKey(key)),
        }
    }

    /// A missing key reads as `false`; a key of the wrong type is still an error
    pub fn flag_or_false(&self, key: &'static str) -> Result<bool, AiError> {
        match self.flag(key) {
            Err(AiError::MissingKey(_)) => Ok(false),
            other => other,
        }
    }

    /// Drop all transient keys (called on state change)
    pub fn clear_transient(&mut self) {
        for key in std::mem::take(&mut self.transient) {
            self.values.remove(key);
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

// ============================================================================
// Context
// ============================================================================

/// What an agent may perceive of the player
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Target {
    pub id: EntityId,
    pub rect: Rect,
}

impl Target {
    pub fn center(&self) -> Vec2 {
        self.rect.center()
    }
}

/// Read-only world view for one AI frame (positions are from the previous frame)
pub struct AiContext<'a> {
    pub physics: &'a PhysicsWorld,
    /// None when the player is dead or absent
    pub target: Option<Target>,
    pub dt: f32,
}

impl AiContext<'_> {
    pub fn require_target(&self) -> Result<Target, AiError> {
        self.target.ok_or(AiError::NoTarget)
    }
}

/// Hook the engine needs from whatever it drives
pub trait AiAgent {
    /// Stop self-driven movement (used when falling back to Idle)
    fn halt(&mut self);
}

pub type Condition<P> = fn(&P, &AiContext, &AiMachine) -> Result<bool, AiError>;
pub type Behavior<P> = fn(&mut P, &AiContext, &mut AiMachine) -> Result<(), AiError>;

/// One edge of the state graph
pub struct Transition<P> {
    pub from: AiState,
    pub to: AiState,
    pub priority: i32,
    /// For logs
    pub name: &'static str,
    pub condition: Condition<P>,
}

// ============================================================================
// Brain (shared, immutable per archetype)
// ============================================================================

/// Transition table and behaviors for one kind of agent
pub struct Brain<P> {
    pub name: &'static str,
    /// Sorted by descending priority, insertion order among equals
    transitions: Vec<Transition<P>>,
    behaviors: BTreeMap<AiState, Behavior<P>>,
}

impl<P> fmt::Debug for Brain<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Brain")
            .field("name", &self.name)
            .field(
                "transitions",
                &self
                    .transitions
                    .iter()
                    .map(|t| (t.from, t.to, t.priority, t.name))
                    .collect::<Vec<_>>(),
            )
            .field("behaviors", &self.behaviors.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<P> Brain<P> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            transitions: Vec::new(),
            behaviors: BTreeMap::new(),
        }
    }

    pub fn add_transition(
        &mut self,
        from: AiState,
        to: AiState,
        priority: i32,
        name: &'static str,
        condition: Condition<P>,
    ) -> &mut Self {
        self.transitions.push(Transition {
            from,
            to,
            priority,
            name,
            condition,
        });
        // Stable: equal priorities keep insertion order
        self.transitions.sort_by(|a, b| b.priority.cmp(&a.priority));
        self
    }

    /// Install or replace the behavior for a state
    pub fn set_behavior(&mut self, state: AiState, behavior: Behavior<P>) -> &mut Self {
        self.behaviors.insert(state, behavior);
        self
    }

    pub fn behavior(&self, state: AiState) -> Option<Behavior<P>> {
        self.behaviors.get(&state).copied()
    }

    /// Outgoing transitions of `state`, highest priority first
    pub fn transitions_from(&self, state: AiState) -> impl Iterator<Item = &Transition<P>> {
        self.transitions.iter().filter(move |t| t.from == state)
    }

    pub fn transition_count(&self) -> usize {
        self.transitions.len()
    }
}

// ============================================================================
// Machine (one per agent)
// ============================================================================

/// Per-agent FSM instance
#[derive(Debug, Clone)]
pub struct AiMachine {
    state: AiState,
    previous: AiState,
    time_in_state: f32,
    pub blackboard: Blackboard,
    /// Seeded per agent so runs replay identically
    pub rng: Pcg32,
    /// Failed frames so far (for diagnostics)
    pub error_count: u32,
}

impl AiMachine {
    pub fn new(seed: u64) -> Self {
        Self {
            state: AiState::Idle,
            previous: AiState::Idle,
            time_in_state: 0.0,
            blackboard: Blackboard::default(),
            rng: Pcg32::seed_from_u64(seed),
            error_count: 0,
        }
    }

    pub fn state(&self) -> AiState {
        self.state
    }

    pub fn previous_state(&self) -> AiState {
        self.previous
    }

    pub fn time_in_state(&self) -> f32 {
        self.time_in_state
    }

    /// Enter `state` now (external events such as being stunned)
    pub fn force_state(&mut self, state: AiState) {
        self.change_state(state);
    }

    fn change_state(&mut self, state: AiState) {
        log::trace!("AI {} -> {}", self.state.as_str(), state.as_str());
        self.previous = self.state;
        self.state = state;
        self.time_in_state = 0.0;
        self.blackboard.clear_transient();
    }

    /// Pick the winning transition for the current state, if any
    pub fn select_transition<P>(&self, brain: &Brain<P>, agent: &P, ctx: &AiContext) -> Result<Option<AiState>, AiError> {
        for transition in brain.transitions_from(self.state) {
            if (transition.condition)(agent, ctx, self)? {
                return Ok(Some(transition.to));
            }
        }
        Ok(None)
    }

    /// Run one frame: advance time, take at most one transition, run the behavior
    ///
    /// On error the agent is halted and put in Idle; the error is logged and
    /// returned for diagnostics.
    pub fn update<P: AiAgent>(&mut self, brain: &Brain<P>, agent: &mut P, ctx: &AiContext) -> Result<(), AiError> {
        self.time_in_state += finite_or_zero(ctx.dt).max(0.0);

        let result = self.step(brain, agent, ctx);
        if let Err(err) = &result {
            self.error_count += 1;
            log::warn!(
                "{} AI failed in {}: {}; falling back to idle",
                brain.name,
                self.state.as_str(),
                err
            );
            if self.state != AiState::Idle {
                self.change_state(AiState::Idle);
            }
            agent.halt();
        }
        result
    }

    fn step<P>(&mut self, brain: &Brain<P>, agent: &mut P, ctx: &AiContext) -> Result<(), AiError> {
        if let Some(next) = self.select_transition(brain, agent, ctx)? {
            self.change_state(next);
        }
        match brain.behavior(self.state) {
            Some(behavior) => behavior(agent, ctx, self),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::PhysicsTuning;

    #[derive(Default)]
    struct Dummy {
        speed: f32,
        alert: bool,
        broken: bool,
        ran: Vec<AiState>,
    }

    impl AiAgent for Dummy {
        fn halt(&mut self) {
            self.speed = 0.0;
        }
    }

    fn alerted(d: &Dummy, _: &AiContext, _: &AiMachine) -> Result<bool, AiError> {
        Ok(d.alert)
    }

    fn always(_: &Dummy, _: &AiContext, _: &AiMachine) -> Result<bool, AiError> {
        Ok(true)
    }

    fn broken(d: &Dummy, _: &AiContext, m: &AiMachine) -> Result<bool, AiError> {
        if d.broken {
            m.blackboard.float("missing")?;
        }
        Ok(false)
    }

    fn record(d: &mut Dummy, _: &AiContext, m: &mut AiMachine) -> Result<(), AiError> {
        d.ran.push(m.state());
        d.speed = 10.0;
        Ok(())
    }

    fn brain() -> Brain<Dummy> {
        let mut brain = Brain::new("dummy");
        brain
            .add_transition(AiState::Idle, AiState::Patrol, 1, "wander", always)
            .add_transition(AiState::Idle, AiState::Chase, 5, "alert", alerted)
            .add_transition(AiState::Idle, AiState::Flee, 9, "broken", broken);
        for state in [AiState::Idle, AiState::Patrol, AiState::Chase] {
            brain.set_behavior(state, record);
        }
        brain
    }

    fn ctx(physics: &PhysicsWorld) -> AiContext<'_> {
        AiContext {
            physics,
            target: None,
            dt: 1.0 / 60.0,
        }
    }

    #[test]
    fn test_highest_priority_wins() {
        let physics = PhysicsWorld::new(PhysicsTuning::default());
        let brain = brain();
        let mut machine = AiMachine::new(1);
        let mut dummy = Dummy {
            alert: true,
            ..Default::default()
        };
        machine.update(&brain, &mut dummy, &ctx(&physics)).unwrap();
        assert_eq!(machine.state(), AiState::Chase);
        assert_eq!(machine.previous_state(), AiState::Idle);
        // Behavior ran for the new state only
        assert_eq!(dummy.ran, vec![AiState::Chase]);
    }

    #[test]
    fn test_lower_priority_when_higher_fails() {
        let physics = PhysicsWorld::new(PhysicsTuning::default());
        let brain = brain();
        let mut machine = AiMachine::new(1);
        let mut dummy = Dummy::default();
        machine.update(&brain, &mut dummy, &ctx(&physics)).unwrap();
        assert_eq!(machine.state(), AiState::Patrol);
    }

    #[test]
    fn test_failing_condition_falls_back_to_idle() {
        let physics = PhysicsWorld::new(PhysicsTuning::default());
        let brain = brain();
        let mut machine = AiMachine::new(1);
        let mut dummy = Dummy {
            broken: true,
            speed: 50.0,
            ..Default::default()
        };
        let err = machine.update(&brain, &mut dummy, &ctx(&physics)).unwrap_err();
        assert_eq!(err, AiError::MissingKey("missing"));
        assert_eq!(machine.state(), AiState::Idle);
        assert_eq!(dummy.speed, 0.0);
        assert!(dummy.ran.is_empty());
        assert_eq!(machine.error_count, 1);
    }

    #[test]
    fn test_equal_priority_keeps_insertion_order() {
        let mut brain: Brain<Dummy> = Brain::new("ties");
        brain
            .add_transition(AiState::Idle, AiState::Chase, 3, "first", always)
            .add_transition(AiState::Idle, AiState::Flee, 3, "second", always);
        let names: Vec<_> = brain.transitions_from(AiState::Idle).map(|t| t.name).collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[test]
    fn test_transient_keys_cleared_on_state_change() {
        let mut machine = AiMachine::new(7);
        machine.blackboard.set("anchor", BlackboardValue::Vec2(Vec2::new(1.0, 2.0)));
        machine.blackboard.set_transient("windup", BlackboardValue::Float(0.5));
        machine.force_state(AiState::Attack);
        assert!(machine.blackboard.contains("anchor"));
        assert!(!machine.blackboard.contains("windup"));
        assert_eq!(machine.time_in_state(), 0.0);
    }

    #[test]
    fn test_blackboard_typed_getters() {
        let mut bb = Blackboard::default();
        bb.set("speed", BlackboardValue::Float(3.0));
        bb.set("target", BlackboardValue::Entity(EntityId(4)));
        assert_eq!(bb.float("speed"), Ok(3.0));
        assert_eq!(bb.entity("target"), Ok(EntityId(4)));
        assert_eq!(
            bb.vec2("speed"),
            Err(AiError::TypeMismatch { key: "speed", expected: "vec2" })
        );
        assert_eq!(bb.flag("nope"), Err(AiError::MissingKey("nope")));
        assert_eq!(bb.flag_or_false("nope"), Ok(false));
        assert!(bb.flag_or_false("speed").is_err());
    }

    #[test]
    fn test_setting_persistent_overrides_transient() {
        let mut bb = Blackboard::default();
        bb.set_transient("k", BlackboardValue::Bool(true));
        bb.set("k", BlackboardValue::Bool(false));
        bb.clear_transient();
        assert_eq!(bb.flag("k"), Ok(false));
    }

    #[test]
    fn test_time_in_state_accumulates() {
        let physics = PhysicsWorld::new(PhysicsTuning::default());
        let mut brain: Brain<Dummy> = Brain::new("still");
        brain.set_behavior(AiState::Idle, record);
        let mut machine = AiMachine::new(3);
        let mut dummy = Dummy::default();
        for _ in 0..60 {
            machine.update(&brain, &mut dummy, &ctx(&physics)).unwrap();
        }
        assert!((machine.time_in_state() - 1.0).abs() < 1e-3);
        assert_eq!(dummy.ran.len(), 60);
    }
}

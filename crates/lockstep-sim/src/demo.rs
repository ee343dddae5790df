//! A small deterministic world used by the daemon binary and by tests.
//!
//! Roles own a treasury and build on a shared tile grid. Every command
//! result is folded back into the world RNG, so any divergence in command
//! execution shows up in the fingerprint within one tick.

use lockstep_proto::messages::command::CommandBody;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    command::Command,
    rng::WorldRng,
    simulation::{CommandCheck, Simulation},
};

const DEFAULT_TILES: usize = 64 * 64;
const STARTING_FUNDS: i64 = 100_000;
/// Ticks between income payouts.
const INCOME_PERIOD: u32 = 16;

#[derive(Debug, Error)]
pub enum DemoError {
    #[error("snapshot decode failed: {0}")]
    Decode(#[from] postcard::Error),
    #[error("expected {expected} seed pairs, got {actual}")]
    SeedCount { expected: usize, actual: usize },
    #[error("inconsistent snapshot: {0}")]
    Inconsistent(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemoWorld {
    tick: u32,
    rng: WorldRng,
    growth: u32,
    tiles: Vec<u32>,
    treasury: Vec<i64>,
    names: Vec<String>,
    /// Per-role generators. Shipped out of band, never inside the blob.
    #[serde(skip)]
    role_rngs: Vec<WorldRng>,
}

impl DemoWorld {
    /// Raise tile `tile` by `p1` plus a role-seeded bonus, paid from the treasury.
    pub const OP_BUILD: u32 = 1;
    /// Move `p1` funds from the issuer to role `p2`.
    pub const OP_TRANSFER: u32 = 2;
    /// Set the issuer's display name to the command text.
    pub const OP_RENAME: u32 = 3;
    /// Change the world growth rate; authority only.
    pub const OP_SET_GROWTH: u32 = 100;

    pub fn new(seed: u64, roles: u8) -> Self {
        Self::with_tiles(seed, roles, DEFAULT_TILES)
    }

    pub fn with_tiles(seed: u64, roles: u8, tiles: usize) -> Self {
        let mut rng = WorldRng::new(seed);
        let role_rngs = (0..roles).map(|_| WorldRng::new(rng.next_u64())).collect();
        let tiles = (0..tiles.max(1)).map(|_| rng.below(4)).collect();
        Self {
            tick: 0,
            rng,
            growth: 1,
            tiles,
            treasury: vec![STARTING_FUNDS; roles as usize],
            names: (0..roles).map(|r| format!("Company {}", r + 1)).collect(),
            role_rngs,
        }
    }

    pub fn tick(&self) -> u32 {
        self.tick
    }

    pub fn roles(&self) -> usize {
        self.treasury.len()
    }

    pub fn tile(&self, index: usize) -> Option<u32> {
        self.tiles.get(index).copied()
    }

    pub fn treasury(&self, role: u8) -> Option<i64> {
        self.treasury.get(role as usize).copied()
    }

    pub fn name(&self, role: u8) -> Option<&str> {
        self.names.get(role as usize).map(String::as_str)
    }

    fn mix(&mut self, value: u64) {
        let next = self.rng.next_u64() ^ value.rotate_left(17);
        self.rng = WorldRng::new(next);
    }
}

impl Simulation for DemoWorld {
    type Error = DemoError;

    fn serialize(&self) -> Result<Vec<u8>, DemoError> {
        Ok(postcard::to_stdvec(self)?)
    }

    fn deserialize(bytes: &[u8], seeds: &[[u32; 2]]) -> Result<Self, DemoError> {
        let mut world: DemoWorld = postcard::from_bytes(bytes)?;
        if world.tiles.is_empty() {
            return Err(DemoError::Inconsistent("no tiles"));
        }
        if world.names.len() != world.treasury.len() {
            return Err(DemoError::Inconsistent("names and treasuries disagree"));
        }
        if seeds.len() != world.roles() {
            return Err(DemoError::SeedCount {
                expected: world.roles(),
                actual: seeds.len(),
            });
        }
        world.role_rngs = seeds.iter().copied().map(WorldRng::from_pair).collect();
        Ok(world)
    }

    fn side_seeds(&self) -> Vec<[u32; 2]> {
        self.role_rngs.iter().map(WorldRng::pair).collect()
    }

    fn advance_tick(&mut self) {
        self.tick = self.tick.wrapping_add(1);
        let index = self.rng.below(self.tiles.len() as u32) as usize;
        self.tiles[index] = self.tiles[index].saturating_add(self.growth);

        if self.tick % INCOME_PERIOD == 0 {
            let total: u64 = self.tiles.iter().map(|&t| t as u64).sum();
            let income = (total / self.tiles.len() as u64) as i64;
            for funds in &mut self.treasury {
                *funds = funds.saturating_add(income);
            }
        }
    }

    fn sample_fingerprint(&self) -> u32 {
        let [hi, lo] = self.rng.pair();
        hi ^ lo
    }

    fn apply_command(&mut self, command: &Command) {
        let body = &command.body;
        let issuer = body.issuer as usize;
        if issuer >= self.roles() {
            return;
        }
        match body.op {
            Self::OP_BUILD => {
                let index = body.tile as usize % self.tiles.len();
                let bonus = self.role_rngs[issuer].below(3);
                let cost = i64::from(body.p1) + i64::from(bonus);
                self.treasury[issuer] = self.treasury[issuer].saturating_sub(cost);
                self.tiles[index] = self.tiles[index].saturating_add(body.p1.saturating_add(bonus));
                self.mix((u64::from(self.tiles[index]) << 8) | issuer as u64);
            }
            Self::OP_TRANSFER => {
                let to = body.p2 as usize;
                if to < self.roles() && to != issuer {
                    let amount = i64::from(body.p1).min(self.treasury[issuer].max(0));
                    self.treasury[issuer] -= amount;
                    self.treasury[to] += amount;
                    self.mix(amount as u64);
                }
            }
            Self::OP_RENAME => {
                self.names[issuer] = body.text.clone();
                let len = body.text.len() as u64;
                self.mix(len);
            }
            Self::OP_SET_GROWTH => {
                self.growth = body.p1.min(64);
                self.mix(u64::from(self.growth));
            }
            _ => {}
        }
    }

    fn check_command(&self, body: &CommandBody) -> CommandCheck {
        if body.issuer as usize >= self.roles() {
            return CommandCheck::Invalid;
        }
        match body.op {
            Self::OP_BUILD | Self::OP_TRANSFER | Self::OP_RENAME => CommandCheck::Allowed,
            Self::OP_SET_GROWTH => CommandCheck::ServerOnly,
            _ => CommandCheck::Invalid,
        }
    }
}

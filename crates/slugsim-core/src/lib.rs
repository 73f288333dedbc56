//! Core simulation engine shared across the slugsim workspace.
//!
//! A [`World`] owns a bounded 2D extent, a seeded RNG, and an ordered
//! [`EntityRegistry`] of live entities. Each call to [`World::step`] advances
//! every entity, culls the expired and the out-of-bounds, and may spawn a new
//! slug; [`World::snapshot`] rasterizes the survivors onto a text grid for
//! whatever front end is driving the loop.

use rand::{Rng, SeedableRng, rngs::SmallRng};
use serde::{Deserialize, Serialize};
use slotmap::{SlotMap, new_key_type};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

new_key_type! {
    /// Stable handle for entities backed by a generational slot map.
    pub struct EntityId;
}

/// Distance a slug covers per tick, in cell units.
pub const SLUG_SPEED: f64 = 0.12;
/// Number of ticks a slug lives before expiring.
pub const SLUG_AGE_THRESHOLD: u64 = 256;
/// Glyph drawn for a cell occupied by a slug.
pub const SLUG_GLYPH: char = 'S';
/// Denominator of the per-tick spawn probability (one chance in N).
pub const SLUG_SPAWN_CHANCE: u32 = 32;

/// Glyph used for unoccupied cells.
pub const EMPTY_GLYPH: char = ' ';
/// Fixed output of [`World::snapshot`] before the first resize.
pub const UNSIZED_PLACEHOLDER: &str = "not initialized";

/// Cardinal movement direction in grid space, where y grows downward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    /// All directions, in sampling order.
    pub const ALL: [Self; 4] = [Self::North, Self::East, Self::South, Self::West];

    /// Unit displacement vector; North decreases y, South increases y.
    #[must_use]
    pub const fn unit_vector(self) -> (f64, f64) {
        match self {
            Self::North => (0.0, -1.0),
            Self::East => (1.0, 0.0),
            Self::South => (0.0, 1.0),
            Self::West => (-1.0, 0.0),
        }
    }

    fn sample(rng: &mut SmallRng) -> Self {
        Self::ALL[rng.random_range(0..Self::ALL.len())]
    }
}

/// Discrete grid cell used for bounds checks and rendering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coordinates {
    pub x: i32,
    pub y: i32,
}

impl Coordinates {
    /// Construct a new cell coordinate.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Continuous simulation-space position; authoritative for motion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PreciseCoordinates {
    pub x: f64,
    pub y: f64,
}

impl PreciseCoordinates {
    /// Construct a new position.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// This position displaced `distance` units along `direction`.
    #[must_use]
    pub fn advanced(self, direction: Direction, distance: f64) -> Self {
        let (dx, dy) = direction.unit_vector();
        Self {
            x: self.x + dx * distance,
            y: self.y + dy * distance,
        }
    }

    /// Nearest grid cell; ties round away from zero.
    #[must_use]
    pub fn discretize(self) -> Coordinates {
        Coordinates {
            x: self.x.round() as i32,
            y: self.y.round() as i32,
        }
    }
}

/// Rectangular extent `[0, width) x [0, height)` entities must remain within.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub width: u32,
    pub height: u32,
}

impl Bounds {
    /// Construct a new extent.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Whether `cell` lies inside the extent.
    #[must_use]
    pub fn contains(self, cell: Coordinates) -> bool {
        cell.x >= 0 && cell.y >= 0 && (cell.x as u32) < self.width && (cell.y as u32) < self.height
    }

    /// Cell count of the extent.
    #[must_use]
    pub const fn area(self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// A slug drifts in the direction fixed at its birth until old age.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Slug {
    age: u64,
    position: PreciseCoordinates,
    direction: Direction,
}

impl Slug {
    /// Create a newborn slug at `position` heading `direction`.
    #[must_use]
    pub const fn new(position: PreciseCoordinates, direction: Direction) -> Self {
        Self {
            age: 0,
            position,
            direction,
        }
    }

    /// Ticks survived so far.
    #[must_use]
    pub const fn age(&self) -> u64 {
        self.age
    }

    /// Continuous position.
    #[must_use]
    pub const fn position(&self) -> PreciseCoordinates {
        self.position
    }

    /// Movement direction, immutable after spawn.
    #[must_use]
    pub const fn direction(&self) -> Direction {
        self.direction
    }

    fn advance(&mut self) -> bool {
        self.age += 1;
        if self.age > SLUG_AGE_THRESHOLD {
            return false;
        }
        self.position = self.position.advanced(self.direction, SLUG_SPEED);
        true
    }
}

/// Closed set of simulated entity kinds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Entity {
    Slug(Slug),
}

impl Entity {
    /// Mutate internal state for one tick.
    ///
    /// Returns false once the entity reaches its terminal condition and
    /// should be removed from the registry.
    pub fn advance(&mut self) -> bool {
        match self {
            Self::Slug(slug) => slug.advance(),
        }
    }

    /// Glyph drawn when this entity occupies a cell.
    #[must_use]
    pub fn glyph(&self) -> char {
        match self {
            Self::Slug(_) => SLUG_GLYPH,
        }
    }

    /// Current position rounded to the nearest grid cell.
    #[must_use]
    pub fn cell(&self) -> Coordinates {
        match self {
            Self::Slug(slug) => slug.position.discretize(),
        }
    }
}

#[derive(Debug, Clone)]
struct EntityNode {
    entity: Entity,
    prev: Option<EntityId>,
    next: Option<EntityId>,
}

/// Ordered collection of live entities.
///
/// Nodes live in a generational arena and are chained into a doubly linked
/// list. Traversal follows the links rather than arena order, which keeps
/// insertion order stable under removal and makes erase-while-iterating safe.
#[derive(Debug, Clone, Default)]
pub struct EntityRegistry {
    nodes: SlotMap<EntityId, EntityNode>,
    head: Option<EntityId>,
    tail: Option<EntityId>,
}

impl EntityRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: SlotMap::with_key(),
            head: None,
            tail: None,
        }
    }

    /// Number of live entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true when no entities are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Borrow the entity behind `id`, if it is still live.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.nodes.get(id).map(|node| &node.entity)
    }

    /// Returns true if `id` refers to a live entity.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Append `entity` at the tail, returning its handle.
    pub fn push_back(&mut self, entity: Entity) -> EntityId {
        let prev = self.tail;
        let id = self.nodes.insert(EntityNode {
            entity,
            prev,
            next: None,
        });
        match prev {
            Some(tail) => self.nodes[tail].next = Some(id),
            None => self.head = Some(id),
        }
        self.tail = Some(id);
        id
    }

    /// Iterate entities in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> + '_ {
        EntityIter {
            nodes: &self.nodes,
            cursor: self.head,
        }
    }

    /// Traverse in order, keeping entities for which `keep` returns true.
    ///
    /// Every entity present when the traversal starts is visited exactly
    /// once. The successor link is captured before `keep` runs, so unlinking
    /// the current node can never skip or double-visit a neighbor.
    pub fn retain_mut(&mut self, mut keep: impl FnMut(&mut Entity) -> bool) {
        let mut cursor = self.head;
        while let Some(id) = cursor {
            cursor = self.nodes[id].next;
            if !keep(&mut self.nodes[id].entity) {
                self.unlink(id);
            }
        }
    }

    fn unlink(&mut self, id: EntityId) {
        let Some(node) = self.nodes.remove(id) else {
            return;
        };
        match node.prev {
            Some(prev) => self.nodes[prev].next = node.next,
            None => self.head = node.next,
        }
        match node.next {
            Some(next) => self.nodes[next].prev = node.prev,
            None => self.tail = node.prev,
        }
    }
}

struct EntityIter<'a> {
    nodes: &'a SlotMap<EntityId, EntityNode>,
    cursor: Option<EntityId>,
}

impl<'a> Iterator for EntityIter<'a> {
    type Item = &'a Entity;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.nodes.get(self.cursor?)?;
        self.cursor = node.next;
        Some(&node.entity)
    }
}

/// High level simulation clock (ticks processed since boot).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct Tick(pub u64);

impl Tick {
    /// Returns the next sequential tick.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Resets the tick counter back to zero.
    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }
}

/// Events emitted after processing a world tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickEvents {
    pub tick: Tick,
    /// Entities removed this tick, whether expired or out of bounds.
    pub culled: usize,
    /// Whether the spawn roll introduced a new entity this tick.
    pub spawned: bool,
}

/// Errors that can occur when constructing world state.
#[derive(Debug, Error)]
pub enum WorldError {
    /// Indicates an invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

/// Static configuration for a slugsim world, read once at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlugSimConfig {
    /// Seed for the world RNG; equal seeds reproduce runs exactly.
    pub rng_seed: u64,
    /// Wall-clock delay between simulation ticks.
    pub tick_interval: Duration,
}

impl Default for SlugSimConfig {
    fn default() -> Self {
        Self {
            rng_seed: 0,
            tick_interval: Duration::from_millis(100),
        }
    }
}

impl SlugSimConfig {
    /// Check invariants the simulation relies on.
    pub fn validate(&self) -> Result<(), WorldError> {
        if self.tick_interval.is_zero() {
            return Err(WorldError::InvalidConfig("tick_interval must be non-zero"));
        }
        Ok(())
    }

    fn seeded_rng(&self) -> SmallRng {
        SmallRng::seed_from_u64(self.rng_seed)
    }
}

/// Bounded 2D world advancing in fixed ticks.
///
/// A world starts uninitialized: until the first [`World::resize`] delivers
/// an extent, stepping is a no-op and [`World::snapshot`] yields a
/// placeholder. The RNG is owned here exclusively; no other component
/// consumes randomness.
pub struct World {
    config: SlugSimConfig,
    tick: Tick,
    bounds: Option<Bounds>,
    rng: SmallRng,
    entities: EntityRegistry,
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("config", &self.config)
            .field("tick", &self.tick)
            .field("bounds", &self.bounds)
            .field("entity_count", &self.entities.len())
            .finish()
    }
}

impl World {
    /// Instantiate a new world using the supplied configuration.
    pub fn new(config: SlugSimConfig) -> Result<Self, WorldError> {
        config.validate()?;
        let rng = config.seeded_rng();
        Ok(Self {
            config,
            tick: Tick::zero(),
            bounds: None,
            rng,
            entities: EntityRegistry::new(),
        })
    }

    /// Returns an immutable reference to configuration.
    #[must_use]
    pub fn config(&self) -> &SlugSimConfig {
        &self.config
    }

    /// Current simulation tick.
    #[must_use]
    pub const fn tick(&self) -> Tick {
        self.tick
    }

    /// Current extent, once the first resize has established one.
    #[must_use]
    pub const fn bounds(&self) -> Option<Bounds> {
        self.bounds
    }

    /// Whether the first resize has arrived and the world is ticking.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.bounds.is_some()
    }

    /// Read-only access to the entity registry.
    #[must_use]
    pub fn entities(&self) -> &EntityRegistry {
        &self.entities
    }

    /// Number of live entities.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Update the world extent.
    ///
    /// The first call activates the world. Later calls update the extent in
    /// place; entities stranded outside a shrunken extent are not clipped
    /// here, they are culled on the next tick.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.bounds = Some(Bounds::new(width, height));
    }

    /// Register an externally constructed entity, returning its handle.
    pub fn spawn_entity(&mut self, entity: Entity) -> EntityId {
        self.entities.push_back(entity)
    }

    /// Advance the simulation by one tick.
    ///
    /// Every entity advances exactly once, then is culled if it reported
    /// expiry or its cell left the extent, in that order. Afterwards a
    /// 1-in-[`SLUG_SPAWN_CHANCE`] roll may append one freshly spawned slug,
    /// which is never subject to the same tick's culling pass.
    pub fn step(&mut self) -> TickEvents {
        let Some(bounds) = self.bounds else {
            return TickEvents {
                tick: self.tick,
                ..TickEvents::default()
            };
        };

        self.tick = self.tick.next();

        let before = self.entities.len();
        self.entities.retain_mut(|entity| {
            // advance() runs first so its state mutation happens even for
            // entities the bounds check is about to cull.
            let alive = entity.advance();
            alive && bounds.contains(entity.cell())
        });
        let culled = before - self.entities.len();

        let mut spawned = false;
        if self.rng.random_range(0..SLUG_SPAWN_CHANCE) == 0 && bounds.area() > 0 {
            let position = PreciseCoordinates::new(
                f64::from(self.rng.random_range(0..bounds.width)),
                f64::from(self.rng.random_range(0..bounds.height)),
            );
            let direction = Direction::sample(&mut self.rng);
            self.entities
                .push_back(Entity::Slug(Slug::new(position, direction)));
            spawned = true;
        }

        TickEvents {
            tick: self.tick,
            culled,
            spawned,
        }
    }

    /// Rasterize the current entity positions as a text grid.
    ///
    /// Produces `height` rows of `width` glyphs joined by newlines, with no
    /// terminator after the last row. Entities occupying the same cell
    /// overwrite each other, last writer wins. Before the first resize this
    /// returns [`UNSIZED_PLACEHOLDER`] instead of a grid.
    #[must_use]
    pub fn snapshot(&self) -> String {
        let Some(bounds) = self.bounds else {
            return UNSIZED_PLACEHOLDER.to_string();
        };
        let width = bounds.width as usize;
        let height = bounds.height as usize;

        let mut canvas = vec![vec![EMPTY_GLYPH; width]; height];
        for entity in self.entities.iter() {
            let cell = entity.cell();
            // A resize since the last tick may have stranded entities outside
            // the extent; they are culled next tick, not drawn now.
            if bounds.contains(cell) {
                canvas[cell.y as usize][cell.x as usize] = entity.glyph();
            }
        }

        let mut grid = String::with_capacity(height * (width + 1));
        for (index, row) in canvas.iter().enumerate() {
            if index > 0 {
                grid.push('\n');
            }
            grid.extend(row.iter());
        }
        grid
    }
}

use std::time::Duration;

use slugsim_core::{
    Direction, Entity, PreciseCoordinates, SLUG_AGE_THRESHOLD, SLUG_SPAWN_CHANCE, Slug,
    SlugSimConfig, Tick, World,
};

fn seeded_world(seed: u64, width: u32, height: u32) -> World {
    let config = SlugSimConfig {
        rng_seed: seed,
        ..SlugSimConfig::default()
    };
    let mut world = World::new(config).expect("world");
    world.resize(width, height);
    world
}

#[test]
fn seeded_worlds_advance_deterministically() {
    let mut world_a = seeded_world(0xDEAD_BEEF, 40, 12);
    let mut world_b = seeded_world(0xDEAD_BEEF, 40, 12);

    for _ in 0..512 {
        let events_a = world_a.step();
        let events_b = world_b.step();
        assert_eq!(events_a, events_b);
    }

    assert_eq!(world_a.tick(), Tick(512));
    assert_eq!(world_a.entity_count(), world_b.entity_count());
    assert_eq!(world_a.snapshot(), world_b.snapshot());
}

#[test]
fn different_seeds_diverge() {
    let mut world_a = seeded_world(1, 40, 12);
    let mut world_b = seeded_world(2, 40, 12);

    let spawns_a: Vec<bool> = (0..256).map(|_| world_a.step().spawned).collect();
    let spawns_b: Vec<bool> = (0..256).map(|_| world_b.step().spawned).collect();
    assert_ne!(spawns_a, spawns_b);
}

#[test]
fn every_surviving_entity_stays_inside_bounds() {
    let mut world = seeded_world(7, 6, 5);
    let bounds = world.bounds().expect("active");

    // A small extent forces plenty of boundary culling over a slug lifetime.
    for _ in 0..(SLUG_AGE_THRESHOLD * 4) {
        world.step();
        for entity in world.entities().iter() {
            assert!(
                bounds.contains(entity.cell()),
                "entity at {:?} escaped {:?}",
                entity.cell(),
                bounds
            );
        }
    }
}

#[test]
fn spawn_frequency_converges_to_the_configured_chance() {
    let mut world = seeded_world(42, 80, 24);

    let ticks = 12_800_u64;
    let mut spawns = 0_u64;
    for _ in 0..ticks {
        if world.step().spawned {
            spawns += 1;
        }
    }

    let expected = ticks / u64::from(SLUG_SPAWN_CHANCE);
    // Four standard deviations of the binomial around 400.
    let tolerance = 80;
    assert!(
        spawns.abs_diff(expected) <= tolerance,
        "observed {spawns} spawns, expected about {expected}"
    );
}

#[test]
fn snapshot_has_exactly_height_rows_of_width_glyphs() {
    let mut world = seeded_world(3, 17, 9);
    for _ in 0..200 {
        world.step();
        let grid = world.snapshot();
        let rows: Vec<&str> = grid.split('\n').collect();
        assert_eq!(rows.len(), 9);
        assert!(rows.iter().all(|row| row.chars().count() == 17));
        assert!(!grid.ends_with('\n'));
    }
}

#[test]
fn snapshot_draws_each_entity_at_its_cell() {
    let mut world = seeded_world(0, 10, 10);
    world.spawn_entity(Entity::Slug(Slug::new(
        PreciseCoordinates::new(5.0, 5.0),
        Direction::North,
    )));

    let grid = world.snapshot();
    let rows: Vec<&str> = grid.split('\n').collect();
    assert_eq!(rows[5].chars().nth(5), Some('S'));
    assert_eq!(grid.chars().filter(|&c| c == 'S').count(), 1);
}

#[test]
fn injected_slug_drifts_north_at_fixed_speed() {
    // Random spawns may join the registry along the way; the injected slug is
    // tracked through its handle and unaffected by them.
    let mut world = seeded_world(9, 100, 100);
    let id = world.spawn_entity(Entity::Slug(Slug::new(
        PreciseCoordinates::new(50.0, 50.0),
        Direction::North,
    )));

    for _ in 0..5 {
        world.step();
    }

    let entity = world.entities().get(id).expect("slug alive");
    let Entity::Slug(slug) = entity;
    assert_eq!(slug.age(), 5);
    assert_eq!(slug.position().x, 50.0);
    assert!((slug.position().y - (50.0 - 5.0 * 0.12)).abs() < 1e-9);
    assert_eq!(entity.cell().x, 50);
    assert_eq!(entity.cell().y, 49);
}

#[test]
fn slug_is_removed_on_the_tick_age_first_exceeds_the_threshold() {
    let mut world = seeded_world(11, 200, 200);
    let id = world.spawn_entity(Entity::Slug(Slug::new(
        PreciseCoordinates::new(100.0, 100.0),
        Direction::West,
    )));

    for _ in 0..SLUG_AGE_THRESHOLD {
        world.step();
        assert!(world.entities().contains(id));
    }

    // Tick 257 of its life: advance() reports expiry and the cull removes it.
    world.step();
    assert!(!world.entities().contains(id));
}

#[test]
fn shrinking_resize_culls_on_the_next_tick_not_immediately() {
    let mut world = seeded_world(5, 50, 50);
    let id = world.spawn_entity(Entity::Slug(Slug::new(
        PreciseCoordinates::new(40.0, 40.0),
        Direction::East,
    )));

    world.resize(10, 10);
    assert!(world.entities().contains(id));

    world.step();
    assert!(!world.entities().contains(id));
}

#[test]
fn tick_interval_is_opaque_to_the_core() {
    let config = SlugSimConfig {
        rng_seed: 0xFEED,
        tick_interval: Duration::from_millis(5),
    };
    let mut fast = World::new(config).expect("world");
    fast.resize(40, 12);
    let mut slow = seeded_world(0xFEED, 40, 12);

    for _ in 0..128 {
        fast.step();
        slow.step();
    }
    assert_eq!(fast.snapshot(), slow.snapshot());
}

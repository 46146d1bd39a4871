//! End-to-end behaviour of the chunk tree while the focal point moves.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use glam::DVec2;
use verdant_lod::{
    BuildMode, ChunkEvent, ChunkNode, ChunkTree, Direction, NodeId, StreamingConfig,
};
use verdant_terrain::{ElevationConfig, ElevationField};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("verdant_lod=debug")
        .with_test_writer()
        .try_init();
}

/// Roots 256 wide, three levels, coarse grids so tests stay fast.
fn config() -> StreamingConfig {
    StreamingConfig {
        min_size: 32.0,
        max_depth: 3,
        render_distance: 300.0,
        subdivisions: 8,
        samples_per_tick: 20_000,
        max_concurrent_builds: 8,
        min_dwell_ticks: 2,
        ..Default::default()
    }
}

fn field() -> Arc<ElevationField> {
    Arc::new(ElevationField::new(ElevationConfig::default()).unwrap())
}

fn tree_with(config: StreamingConfig) -> ChunkTree {
    init_tracing();
    ChunkTree::new(field(), config).unwrap()
}

fn settle(tree: &mut ChunkTree, focal: DVec2) -> Vec<ChunkEvent> {
    let mut events = Vec::new();
    for _ in 0..2000 {
        events.extend(tree.update(focal));
        if tree.is_settled() {
            return events;
        }
    }
    panic!("tree did not settle around {focal}");
}

fn root_area(tree: &ChunkTree) -> f64 {
    tree.roots()
        .map(|r| tree.node(r).unwrap().bounds().area())
        .sum()
}

fn assert_finals_disjoint(tree: &ChunkTree) {
    let finals: Vec<&ChunkNode> = tree.final_nodes().collect();
    for (i, a) in finals.iter().enumerate() {
        for b in &finals[i + 1..] {
            assert!(
                !a.bounds().overlaps(&b.bounds()),
                "final nodes {} and {} overlap",
                a.id(),
                b.id()
            );
        }
    }
}

/// No final node has a final neighbour more than one level coarser.
fn assert_finals_balanced(tree: &ChunkTree) {
    for node in tree.final_nodes() {
        for dir in Direction::ALL {
            let across = point_across(node, dir);
            if let Some(other) = tree.final_node_at(across.x, across.y) {
                assert!(
                    other.depth() + 1 >= node.depth(),
                    "tick {}: {} (depth {}) borders {} (depth {})",
                    tree.tick(),
                    node.id(),
                    node.depth(),
                    other.id(),
                    other.depth()
                );
            }
        }
    }
}

/// Every link resolves to a live node and matches [`expected_link`].
fn assert_links_resolve(tree: &ChunkTree) {
    for node in tree.nodes() {
        for dir in Direction::ALL {
            let link = node.neighbour(dir);
            assert_eq!(link, expected_link(tree, node.id(), dir), "link {dir:?} of {}", node.id());
            if let Some(id) = link {
                assert!(tree.node(id).is_some(), "{} links to dead {id}", node.id());
                assert!(tree.neighbour(node.id(), dir).is_some());
            }
        }
    }
}

/// Reference definition of the neighbour link.
fn expected_link(tree: &ChunkTree, id: NodeId, dir: Direction) -> Option<NodeId> {
    let cell = id.adjacent(dir);
    (0..=cell.depth)
        .rev()
        .map(|d| cell.ancestor_at(d))
        .find(|candidate| tree.node(*candidate).is_some())
}

/// A point inside the same-depth cell across `dir`.
fn point_across(node: &ChunkNode, dir: Direction) -> DVec2 {
    let (dx, dz) = dir.offset();
    node.center() + DVec2::new(dx as f64, dz as f64) * node.size()
}

#[test]
fn test_settled_finals_partition_the_roots() {
    let mut tree = tree_with(config());
    settle(&mut tree, DVec2::new(40.0, -25.0));

    assert_finals_disjoint(&tree);
    let final_area: f64 = tree.final_nodes().map(|n| n.bounds().area()).sum();
    assert!(
        (final_area - root_area(&tree)).abs() < 1e-6,
        "finals cover {final_area}, roots cover {}",
        root_area(&tree)
    );
    assert!(tree.final_nodes().all(|n| n.has_surface() && n.is_leaf()));
}

#[test]
fn test_finals_never_overlap_while_moving() {
    let mut tree = tree_with(config());
    settle(&mut tree, DVec2::ZERO);
    for step in 0..300 {
        let t = step as f64 * 0.02;
        tree.update(DVec2::new(t.cos() * 200.0, t.sin() * 200.0));
        assert_finals_disjoint(&tree);
        assert_finals_balanced(&tree);
    }
}

/// Under the default tuning builds trail the focal point by many ticks;
/// the drawn tiling must stay balanced throughout a walk and a jump.
#[test]
fn test_default_tuning_stays_balanced_every_tick() {
    let mut tree = tree_with(StreamingConfig {
        subdivisions: 8,
        samples_per_tick: 400,
        ..StreamingConfig::default()
    });
    let mut focal = DVec2::ZERO;
    for step in 0..500 {
        focal = if step == 350 {
            DVec2::new(1000.0, 1000.0)
        } else {
            focal + DVec2::new(6.0, 2.0)
        };
        tree.update(focal);
        assert_finals_disjoint(&tree);
        assert_finals_balanced(&tree);
    }
}

#[test]
fn test_adjacent_finals_differ_by_at_most_one_level() {
    let mut tree = tree_with(config());
    settle(&mut tree, DVec2::new(5.0, 5.0));
    assert_finals_balanced(&tree);
}

/// Coarse edge vertices read identically from both sides of a level seam.
#[test]
fn test_level_seams_share_coarse_vertices() {
    let mut tree = tree_with(config());
    settle(&mut tree, DVec2::new(5.0, 5.0));

    let mut seams = 0;
    for fine in tree.final_nodes() {
        for dir in Direction::ALL {
            let Some(coarse) = tree.neighbour(fine.id(), dir) else {
                continue;
            };
            if coarse.depth() >= fine.depth() || !coarse.is_final() {
                continue;
            }
            seams += 1;
            let fb = fine.bounds();
            let cgrid = coarse.grid();
            for k in 0..=cgrid.subdivisions as i64 {
                let (x, z) = match dir {
                    Direction::East => (fb.max.x, cgrid.sample_z(k)),
                    Direction::West => (fb.min.x, cgrid.sample_z(k)),
                    Direction::North => (cgrid.sample_x(k), fb.min.y),
                    Direction::South => (cgrid.sample_x(k), fb.max.y),
                };
                if !fb.contains(x, z) {
                    continue;
                }
                let a = fine.elevation_at(x, z).unwrap();
                let b = coarse.elevation_at(x, z).unwrap();
                assert_eq!(a.to_bits(), b.to_bits(), "seam mismatch at ({x}, {z})");
            }
        }
    }
    assert!(seams > 0, "expected at least one level seam");
}

#[test]
fn test_neighbour_links_are_consistent() {
    let mut tree = tree_with(config());
    settle(&mut tree, DVec2::new(-60.0, 130.0));
    for step in 0..40 {
        tree.update(DVec2::new(-60.0 + step as f64 * 5.0, 130.0));
    }

    for node in tree.nodes() {
        for dir in Direction::ALL {
            let link = node.neighbour(dir);
            assert_eq!(link, expected_link(&tree, node.id(), dir));

            let Some(other) = link.and_then(|id| tree.node(id)) else {
                continue;
            };
            let back = other.neighbour(dir.opposite());
            if other.depth() == node.depth() {
                assert_eq!(back, Some(node.id()), "same-depth links are mutual");
            } else {
                assert_eq!(
                    back,
                    Some(node.id().ancestor_at(other.depth())),
                    "a coarse neighbour links back to our ancestor at its depth"
                );
            }
        }
    }
}

/// Created precedes Ready, Destroyed ends the sequence, and subtrees are
/// torn down children first.
#[test]
fn test_lifecycle_events_are_ordered() {
    let mut tree = tree_with(config());
    let mut live: HashSet<NodeId> = HashSet::new();
    let mut check = |events: Vec<ChunkEvent>| {
        for event in events {
            match event {
                ChunkEvent::Created(id) => {
                    assert!(live.insert(id), "{id} created twice");
                    if let Some(parent) = id.parent() {
                        assert!(live.contains(&parent), "{id} created before its parent");
                    }
                }
                ChunkEvent::Ready(id) => assert!(live.contains(&id), "{id} ready before created"),
                ChunkEvent::Destroyed(id) => {
                    assert!(live.remove(&id), "{id} destroyed while not live");
                    assert!(
                        live.iter().all(|other| !id.contains(other)),
                        "{id} destroyed before its children"
                    );
                }
            }
        }
    };

    for step in 0..600 {
        let t = step as f64;
        check(tree.update(DVec2::new(t * 3.0, (t * 0.05).sin() * 300.0)));
    }
    check(settle(&mut tree, DVec2::new(-500.0, 0.0)));

    let actual: HashSet<NodeId> = tree.nodes().map(|n| n.id()).collect();
    assert_eq!(live, actual, "events describe exactly the live node set");
}

#[test]
fn test_jump_rebuilds_around_new_focal() {
    let mut tree = tree_with(config());
    settle(&mut tree, DVec2::ZERO);
    let before: HashSet<NodeId> = tree.nodes().map(|n| n.id()).collect();

    let target = DVec2::new(1000.0, 1000.0);
    let mut events = tree.update(target);
    assert_links_resolve(&tree);
    assert_finals_balanced(&tree);
    events.extend(settle(&mut tree, target));
    assert_links_resolve(&tree);

    let radius = tree.config().render_distance;
    for root in tree.roots() {
        let bounds = tree.node(root).unwrap().bounds();
        assert!(bounds.intersects_circle(target, radius), "{root} is out of range");
    }
    for id in &before {
        if tree.node(*id).is_none() {
            assert!(events.contains(&ChunkEvent::Destroyed(*id)));
        }
    }
    assert!(tree.node(NodeId::root(0, 0)).is_none(), "old origin root is gone");

    let live: HashSet<NodeId> = tree.nodes().map(|n| n.id()).collect();
    let mut registry = before.clone();
    for event in &events {
        match event {
            ChunkEvent::Created(id) => assert!(registry.insert(*id), "{id} created twice"),
            ChunkEvent::Destroyed(id) => assert!(registry.remove(id)),
            ChunkEvent::Ready(_) => {}
        }
    }
    assert_eq!(registry, live, "created minus destroyed is the live set");

    let near = tree.final_node_at(target.x, target.y).unwrap();
    assert_eq!(near.depth(), tree.config().max_depth);
    assert!(tree.elevation_for_position(target.x, target.y).is_some());
}

/// Once the focal area is built, walking never leaves the player without
/// ground: splits keep the parent surface until the children are ready.
#[test]
fn test_elevation_stays_available_while_walking() {
    let mut tree = tree_with(config());
    let mut focal = DVec2::new(10.0, 10.0);
    settle(&mut tree, focal);
    for _ in 0..400 {
        focal += DVec2::new(1.5, 0.5);
        tree.update(focal);
        assert!(
            tree.elevation_for_position(focal.x, focal.y).is_some(),
            "no ground under {focal}"
        );
    }
}

#[test]
fn test_subscribers_see_the_same_events() {
    let mut tree = tree_with(config());
    let receiver = tree.subscribe();
    let mut returned = Vec::new();
    for step in 0..50 {
        returned.extend(tree.update(DVec2::new(step as f64 * 4.0, 0.0)));
    }
    let received: Vec<ChunkEvent> = receiver.try_iter().flatten().collect();
    assert_eq!(received, returned);
}

#[test]
fn test_same_path_same_events() {
    let path: Vec<DVec2> = (0..200)
        .map(|i| DVec2::new(i as f64 * 2.5, -(i as f64) * 1.5))
        .collect();
    let run = || {
        let mut tree = tree_with(config());
        path.iter().flat_map(|&p| tree.update(p)).collect::<Vec<_>>()
    };
    assert_eq!(run(), run());
}

#[test]
fn test_threaded_mode_matches_cooperative_surfaces() {
    let mut cooperative = tree_with(config());
    settle(&mut cooperative, DVec2::ZERO);

    let mut threaded = tree_with(StreamingConfig {
        build_mode: BuildMode::Threaded { workers: 2 },
        ..config()
    });
    let deadline = Instant::now() + Duration::from_secs(60);
    while !threaded.is_settled() {
        assert!(Instant::now() < deadline, "threaded tree did not settle");
        threaded.update(DVec2::ZERO);
        std::thread::sleep(Duration::from_millis(1));
    }

    let a: HashSet<NodeId> = cooperative.final_nodes().map(|n| n.id()).collect();
    let b: HashSet<NodeId> = threaded.final_nodes().map(|n| n.id()).collect();
    assert_eq!(a, b);
    for id in a {
        let sa = cooperative.node(id).unwrap().surface().unwrap();
        let sb = threaded.node(id).unwrap().surface().unwrap();
        let side = sa.grid().side();
        for j in 0..side {
            for i in 0..side {
                assert_eq!(sa.sample(i, j).to_bits(), sb.sample(i, j).to_bits());
            }
        }
    }
}

/// Hysteresis plus dwell keeps a focal point hovering on a split boundary
/// from splitting and merging every tick.
#[test]
fn test_no_thrashing_at_threshold() {
    let mut tree = tree_with(StreamingConfig {
        min_dwell_ticks: 30,
        ..config()
    });
    let radius = tree.thresholds().radius(2).unwrap();
    // Node 2:0:0 spans [0, 64]; its center is (32, 32).
    let center = DVec2::new(32.0, 32.0);
    let inside = center + DVec2::new(radius - 0.5, 0.0);
    let outside = center + DVec2::new(radius + 0.5, 0.0);
    settle(&mut tree, inside);

    let mut transitions = 0;
    for step in 0..120 {
        let focal = if step % 2 == 0 { outside } else { inside };
        let events = tree.update(focal);
        transitions += events
            .iter()
            .filter(|e| matches!(e, ChunkEvent::Destroyed(id) if id.depth == 3))
            .count();
    }
    assert_eq!(transitions, 0, "children of a boundary node must not churn");
}

use contact_resolution::*;
use std::sync::{Arc, Mutex};
use std::thread;

fn rain(parallel: bool) -> ContactWorld {
    let mut world = ContactWorld::new();
    world.set_parallel_enabled(parallel);
    let ground = world.add_rigid_body(RigidBody::fixed(Transform::default()));
    world
        .add_geometry(Geometry::half_space(DVec3::Y, BodyLink::rigid(ground)))
        .unwrap();
    for i in 0..8 {
        let x = i as f64 * 2.0;
        let id = world.add_rigid_body(
            RigidBody::new(MassProperties::solid_sphere(0.5, 1.0 + i as f64))
                .with_position(DVec3::new(x, 0.5, 0.0))
                .with_velocity(DVec3::new(0.3 * i as f64, -1.0 - i as f64, 0.1), DVec3::ZERO),
        );
        world
            .add_geometry(Geometry::sphere(0.5, BodyLink::rigid(id)))
            .unwrap();
    }
    world
}

fn velocities(world: &ContactWorld) -> Vec<DVec3> {
    world
        .bodies
        .iter()
        .filter_map(|(_, body)| body.as_rigid().map(|r| r.velocity.linear))
        .collect()
}

#[test]
fn contact_world_is_sync_and_send() {
    fn assert_sync_send<T: Sync + Send>() {}
    assert_sync_send::<ContactWorld>();
    assert_sync_send::<ResolutionError>();
}

#[test]
fn parallel_and_sequential_solves_agree() {
    let mut sequential = rain(false);
    let mut parallel = rain(true);
    assert!(parallel.parallel_enabled());

    let a = sequential.resolve_impacts().unwrap();
    let b = parallel.resolve_impacts().unwrap();
    assert_eq!(a.islands, 8);
    assert_eq!(a.metrics, b.metrics);
    assert_eq!(velocities(&sequential), velocities(&parallel));
}

#[test]
fn shared_world_across_threads() {
    let world = Arc::new(Mutex::new(rain(true)));

    let mut handles = vec![];
    for _ in 0..4 {
        let world_clone = Arc::clone(&world);
        handles.push(thread::spawn(move || {
            let mut world = world_clone.lock().unwrap();
            world.resolve_impacts().map(|report| report.islands)
        }));
    }

    let solved: usize = handles
        .into_iter()
        .map(|handle| handle.join().unwrap().unwrap())
        .sum();
    // Only the first resolution finds approaching contacts.
    assert_eq!(solved, 8);
}

use contact_resolution::*;

const DT: f64 = 1.0 / 120.0;
const GRAVITY: DVec3 = DVec3::new(0.0, -9.81, 0.0);

/// Minimal explicit integrator so the demo has impacts to resolve.
fn advance(world: &mut ContactWorld, dt: f64) {
    for (_, body) in world.bodies.iter_mut() {
        if let Some(rigid) = body.as_rigid_mut() {
            if rigid.is_immovable() {
                continue;
            }
            rigid.velocity.linear += GRAVITY * dt;
            rigid.transform.position += rigid.velocity.linear * dt;
        }
    }
}

fn main() {
    let mut world = ContactWorld::new();
    world.set_parallel_enabled(true);

    let ground = world.add_rigid_body(RigidBody::fixed(Transform::default()));
    world
        .add_geometry(Geometry::half_space(DVec3::Y, BodyLink::rigid(ground)))
        .expect("ground geometry");

    let mut balls = Vec::new();
    for i in 0..6 {
        let id = world.add_rigid_body(
            RigidBody::new(MassProperties::solid_sphere(0.5, 1.0))
                .with_position(DVec3::new(i as f64 * 0.3, 1.0 + i as f64 * 1.2, 0.0)),
        );
        let material = Material::default().with_restitution(0.2 * (i % 3) as f64);
        world
            .add_geometry(Geometry::sphere(0.5, BodyLink::rigid(id)).with_material(material))
            .expect("ball geometry");
        balls.push(id);
    }

    let mut impacts = ImpactMetrics::default();
    for _ in 0..360 {
        advance(&mut world, DT);
        match world.resolve_impacts() {
            Ok(report) => impacts.merge(&report.metrics),
            Err(err) => eprintln!("impact resolution failed: {err}"),
        }
        if let Err(err) = world.stabilize() {
            eprintln!("stabilization failed: {err}");
        }
    }

    world.timings().report();
    println!(
        "solved {} islands ({} contacts), energy change {:.3} J",
        impacts.islands_solved, impacts.contacts_solved, impacts.energy_change
    );
    for id in balls {
        if let Some(rigid) = world.body(id).and_then(|b| b.as_rigid()) {
            println!("{id:?}: position {:.3?}", rigid.transform.position);
        }
    }
}

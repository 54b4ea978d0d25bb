use approx::assert_relative_eq;
use contact_resolution::dynamics::problem::ProblemData;
use contact_resolution::utils::linalg::asymmetry;
use contact_resolution::*;

/// Two stacked balls on the ground, the top one also touching a pendulum bob.
fn stacked_world() -> ContactWorld {
    let mut world = ContactWorld::new();
    let ground = world.add_rigid_body(RigidBody::fixed(Transform::default()));
    world
        .add_geometry(Geometry::half_space(DVec3::Y, BodyLink::rigid(ground)))
        .unwrap();
    for y in [0.5, 1.5] {
        let id = world.add_rigid_body(
            RigidBody::new(MassProperties::solid_sphere(0.5, 1.0))
                .with_position(DVec3::new(0.0, y, 0.0))
                .with_velocity(DVec3::new(0.1, -1.0, 0.0), DVec3::new(0.0, 0.0, 0.3)),
        );
        world
            .add_geometry(Geometry::sphere(0.5, BodyLink::rigid(id)))
            .unwrap();
    }

    let mut mb = Multibody::new(Transform::from_position(DVec3::new(-2.0, 1.5, 0.0)));
    let mut arm = Link::new("arm", None, JointType::Revolute { axis: DVec3::Z }).with_limits(-1.0, 0.0);
    arm.com_offset = DVec3::X;
    mb.add_link(arm);
    mb.dq[0] = 0.5;
    let pendulum = world.add_multibody(mb);
    world
        .add_geometry(Geometry::sphere(0.5, BodyLink::link(pendulum, 0)).with_offset(DVec3::X))
        .unwrap();
    world
}

#[test]
fn connected_stack_forms_one_island_with_symmetric_coupling() {
    let mut world = stacked_world();
    let constraints = world.find_constraints();
    // ground/bottom, bottom/top, top/bob, and the pendulum's upper limit.
    assert_eq!(constraints.len(), 4);
    assert_eq!(constraints.iter().filter(|c| c.is_contact()).count(), 3);

    let mut manager = IslandManager::new();
    manager.build_islands(&world.bodies, &constraints).unwrap();
    assert_eq!(manager.islands().len(), 1);
    let island = &manager.islands()[0];
    assert_eq!(island.bodies.len(), 3);

    let problem = ProblemData::assemble(island, &world.bodies).unwrap();
    assert_eq!(problem.n_contacts, 3);
    assert_eq!(problem.n_limits, 1);
    assert!(asymmetry(&problem.coupling) < 1e-12);

    for i in 0..problem.num_groups() {
        let (diagonal, _) = problem.constraint_data(i);
        assert!(asymmetry(&diagonal) < 1e-12);
        for j in 0..problem.num_groups() {
            match (problem.cross_constraint_data(i, j), problem.cross_constraint_data(j, i)) {
                (Some(ij), Some(ji)) => assert_relative_eq!(ij, ji.transpose(), epsilon = 1e-12),
                (None, None) => {}
                _ => panic!("cross data of groups {i} and {j} is one-sided"),
            }
        }
    }
}

#[test]
fn stack_impact_leaves_no_contact_approaching() {
    let mut world = stacked_world();
    let report = world.resolve_impacts().unwrap();
    assert_eq!(report.islands, 1);

    for constraint in &report.constraints {
        let velocity = dynamics::island::approach_velocity(constraint, &world.bodies).unwrap();
        assert!(velocity >= -1e-6, "constraint still approaching at {velocity}");
    }
}

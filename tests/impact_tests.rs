use approx::assert_relative_eq;
use contact_resolution::*;

fn ball(world: &mut ContactWorld, position: DVec3, velocity: DVec3, material: Material) -> BodyId {
    let id = world.add_rigid_body(
        RigidBody::new(MassProperties::solid_sphere(0.5, 2.0))
            .with_position(position)
            .with_velocity(velocity, DVec3::ZERO),
    );
    world
        .add_geometry(Geometry::sphere(0.5, BodyLink::rigid(id)).with_material(material))
        .expect("ball geometry");
    id
}

fn ground(world: &mut ContactWorld, material: Material) -> BodyId {
    let id = world.add_rigid_body(RigidBody::fixed(Transform::default()));
    world
        .add_geometry(Geometry::half_space(DVec3::Y, BodyLink::rigid(id)).with_material(material))
        .expect("ground geometry");
    id
}

fn linear_velocity(world: &ContactWorld, id: BodyId) -> DVec3 {
    world.body(id).unwrap().as_rigid().unwrap().velocity.linear
}

#[test]
fn inelastic_drop_stops_the_ball() {
    let mut world = ContactWorld::new();
    ground(&mut world, Material::default());
    let id = ball(&mut world, DVec3::new(0.0, 0.5, 0.0), DVec3::new(0.0, -3.0, 0.0), Material::default());

    let report = world.resolve_impacts().unwrap();
    assert_eq!(report.islands, 1);
    let contact = report.constraints[0].as_contact().unwrap();
    assert_relative_eq!(contact.impulse.normal, 6.0, epsilon = 1e-6);
    assert_relative_eq!(linear_velocity(&world, id).y, 0.0, epsilon = 1e-6);
    assert_relative_eq!(report.metrics.energy_change, -9.0, epsilon = 1e-6);
}

#[test]
fn elastic_drop_reverses_the_ball() {
    let mut world = ContactWorld::new();
    let bouncy = Material::frictionless().with_restitution(1.0);
    ground(&mut world, bouncy);
    let id = ball(&mut world, DVec3::new(0.0, 0.5, 0.0), DVec3::new(0.0, -3.0, 0.0), bouncy);

    let before = world.total_kinetic_energy();
    world.resolve_impacts().unwrap();
    assert_relative_eq!(linear_velocity(&world, id).y, 3.0, epsilon = 1e-6);
    assert_relative_eq!(world.total_kinetic_energy(), before, epsilon = 1e-6);
}

#[test]
fn head_on_collision_of_equal_spheres_swaps_velocities() {
    let mut world = ContactWorld::new();
    let bouncy = Material::frictionless().with_restitution(1.0);
    let a = ball(&mut world, DVec3::new(-0.5, 0.0, 0.0), DVec3::X, bouncy);
    let b = ball(&mut world, DVec3::new(0.5, 0.0, 0.0), -DVec3::X, bouncy);

    world.resolve_impacts().unwrap();
    assert_relative_eq!(linear_velocity(&world, a).x, -1.0, epsilon = 1e-6);
    assert_relative_eq!(linear_velocity(&world, b).x, 1.0, epsilon = 1e-6);
}

#[test]
fn frictional_impact_never_adds_energy() {
    let mut world = ContactWorld::new();
    let rough = Material::default();
    ground(&mut world, rough);
    let id = ball(&mut world, DVec3::new(0.0, 0.5, 0.0), DVec3::new(2.0, -3.0, 1.0), rough);

    let before = world.total_kinetic_energy();
    let report = world.resolve_impacts().unwrap();
    assert!(world.total_kinetic_energy() <= before + 1e-9);
    assert!(report.metrics.energy_change <= 1e-9);
    assert!(linear_velocity(&world, id).y >= -1e-6);

    let contact = report.constraints[0].as_contact().unwrap();
    let [t1, t2] = contact.impulse.tangent;
    // Tangential impulse stays inside the (polygonal) cone.
    assert!((t1 * t1 + t2 * t2).sqrt() <= 0.5 * contact.impulse.normal * 2f64.sqrt() + 1e-6);
}

#[test]
fn exact_cone_impact_uses_the_nonlinear_solve() {
    let mut world = ContactWorld::new();
    let exact = Material::default().with_friction_model(FrictionModel::ExactCone);
    ground(&mut world, exact);
    let id = ball(&mut world, DVec3::new(0.0, 0.5, 0.0), DVec3::new(1.0, -2.0, 0.0), exact);

    let before = world.total_kinetic_energy();
    let report = world.resolve_impacts().unwrap();
    assert_eq!(report.metrics.nqp_islands, 1);
    assert!(world.total_kinetic_energy() <= before + 1e-9);
    assert!(linear_velocity(&world, id).y >= -1e-6);

    let contact = report.constraints[0].as_contact().unwrap();
    let [t1, t2] = contact.impulse.tangent;
    assert!((t1 * t1 + t2 * t2).sqrt() <= 0.5 * contact.impulse.normal + 1e-6);
}

#[test]
fn resting_and_separating_contacts_get_no_impulse() {
    let mut world = ContactWorld::new();
    ground(&mut world, Material::default());
    let resting = ball(&mut world, DVec3::new(0.0, 0.5, 0.0), DVec3::ZERO, Material::default());
    let leaving = ball(&mut world, DVec3::new(3.0, 0.5, 0.0), DVec3::Y, Material::default());

    let report = world.resolve_impacts().unwrap();
    assert_eq!(report.constraints.len(), 2);
    assert_eq!(report.islands, 0);
    assert!(report
        .constraints
        .iter()
        .all(|c| c.as_contact().unwrap().impulse.normal == 0.0));
    assert_eq!(linear_velocity(&world, resting), DVec3::ZERO);
    assert_eq!(linear_velocity(&world, leaving), DVec3::Y);
}

#[test]
fn bodies_resting_on_static_ground_form_separate_islands() {
    let mut world = ContactWorld::new();
    ground(&mut world, Material::default());
    let a = ball(&mut world, DVec3::new(0.0, 0.5, 0.0), DVec3::new(0.0, -1.0, 0.0), Material::default());
    let b = ball(&mut world, DVec3::new(4.0, 0.5, 0.0), DVec3::new(0.0, -2.0, 0.0), Material::default());

    let constraints = world.find_constraints();
    let mut manager = IslandManager::new();
    manager.build_islands(&world.bodies, &constraints).unwrap();
    assert_eq!(manager.islands().len(), 2);
    assert_eq!(manager.islands()[0].bodies, vec![a]);
    assert_eq!(manager.islands()[1].bodies, vec![b]);

    let report = world.resolve_constraints(constraints).unwrap();
    assert_eq!(report.islands, 2);
    assert_relative_eq!(linear_velocity(&world, a).y, 0.0, epsilon = 1e-6);
    assert_relative_eq!(linear_velocity(&world, b).y, 0.0, epsilon = 1e-6);
}

#[test]
fn failed_island_leaves_every_body_untouched() {
    let mut world = ContactWorld::new();
    let floor = ground(&mut world, Material::default());
    let good = ball(&mut world, DVec3::new(4.0, 0.5, 0.0), DVec3::new(0.0, -1.0, 0.0), Material::default());
    let bad = ball(&mut world, DVec3::new(0.0, 0.5, 0.0), DVec3::new(0.0, -1.0, 0.0), Material::default());

    let mut constraints = world.find_constraints();
    // Non-unit normal that still reports an approaching pair.
    constraints.push(
        ContactConstraint::new(
            (GeometryId::from_index(7), BodyLink::rigid(bad)),
            (GeometryId::from_index(0), BodyLink::rigid(floor)),
            DVec3::ZERO,
            DVec3::new(0.0, 2.0, 0.0),
            0.0,
        )
        .into(),
    );

    let err = world.resolve_constraints(constraints).unwrap_err();
    assert!(matches!(err, ResolutionError::DegenerateConstraint { .. }));
    assert_eq!(err.kind(), ErrorKind::NumericalDegeneracy);
    assert_eq!(linear_velocity(&world, good).y, -1.0);
    assert_eq!(linear_velocity(&world, bad).y, -1.0);
}

#[test]
fn constraint_on_removed_body_is_rejected() {
    let mut world = ContactWorld::new();
    ground(&mut world, Material::default());
    let id = ball(&mut world, DVec3::new(0.0, 0.5, 0.0), DVec3::new(0.0, -1.0, 0.0), Material::default());
    let constraints = world.find_constraints();
    world.remove_body(id);

    let err = world.resolve_constraints(constraints).unwrap_err();
    assert!(matches!(err, ResolutionError::UnknownBody(missing) if missing == id));
    assert!(world.geometries.iter().all(|(_, g)| g.body.body != id));
}

#[test]
fn centimeter_ball_picks_up_spin_from_friction() {
    let mut world = ContactWorld::new();
    ground(&mut world, Material::default());
    let id = world.add_rigid_body(
        RigidBody::new(MassProperties::solid_sphere(0.01, 0.1))
            .with_position(DVec3::new(0.0, 0.01, 0.0))
            .with_velocity(DVec3::new(1.0, -1.0, 0.0), DVec3::ZERO),
    );
    world
        .add_geometry(Geometry::sphere(0.01, BodyLink::rigid(id)))
        .unwrap();

    let before = world.total_kinetic_energy();
    world.resolve_impacts().unwrap();
    let body = world.body(id).unwrap().as_rigid().unwrap();
    // Sticking friction leaves the ball rolling: v = 5/7, ω = -v / r.
    assert_relative_eq!(body.velocity.linear.x, 5.0 / 7.0, epsilon = 1e-4);
    assert_relative_eq!(body.velocity.angular.z, -500.0 / 7.0, max_relative = 1e-3);
    assert!(world.total_kinetic_energy() <= before + 1e-9);
}

#[test]
fn point_mass_without_rotational_inertia_is_rejected() {
    let mut world = ContactWorld::new();
    ground(&mut world, Material::default());
    let id = world.add_rigid_body(
        RigidBody::new(MassProperties {
            mass: 1.0,
            inertia: DMat3::ZERO,
        })
        .with_position(DVec3::new(0.0, 0.5, 0.0))
        .with_velocity(DVec3::new(0.0, -1.0, 0.0), DVec3::ZERO),
    );
    world
        .add_geometry(Geometry::sphere(0.5, BodyLink::rigid(id)))
        .unwrap();

    let err = world.resolve_impacts().unwrap_err();
    assert!(matches!(err, ResolutionError::SingularInertia { body } if body == id));
    assert_eq!(err.kind(), ErrorKind::NumericalDegeneracy);
    assert_eq!(linear_velocity(&world, id).y, -1.0);
}

/// Ground contact of a falling ball, with the coefficients overwritten by `edit`.
fn edited_ground_contact(edit: impl Fn(&mut ContactConstraint)) -> (ContactWorld, BodyId, Vec<UnilateralConstraint>) {
    let mut world = ContactWorld::new();
    ground(&mut world, Material::default());
    let id = ball(&mut world, DVec3::new(0.0, 0.5, 0.0), DVec3::new(0.0, -1.0, 0.0), Material::default());
    let mut constraints = world.find_constraints();
    assert_eq!(constraints.len(), 1);
    if let UnilateralConstraint::Contact(c) = &mut constraints[0] {
        edit(c);
    }
    (world, id, constraints)
}

#[test]
fn invalid_contact_coefficients_are_rejected() {
    let edits: [fn(&mut ContactConstraint); 5] = [
        |c| c.friction = -0.1,
        |c| c.restitution = -0.5,
        |c| c.friction = f64::NAN,
        |c| c.friction_model = FrictionModel::LinearizedCone { edges: 3 },
        |c| c.friction_model = FrictionModel::LinearizedCone { edges: 0 },
    ];
    for edit in edits {
        let (mut world, id, constraints) = edited_ground_contact(edit);
        let err = world.resolve_constraints(constraints).unwrap_err();
        assert!(matches!(err, ResolutionError::DegenerateConstraint { constraint: 0, .. }), "{err}");
        assert_eq!(linear_velocity(&world, id).y, -1.0);
    }
}

#[test]
fn exhausted_solver_leaves_the_world_untouched() {
    let (mut world, id, constraints) = edited_ground_contact(|_| {});
    // A negative tolerance can never be met by either solve.
    world.config_mut().lcp.tolerance = -1.0;

    let err = world.resolve_constraints(constraints).unwrap_err();
    assert!(matches!(err, ResolutionError::SolverExhausted { .. }), "{err}");
    assert_eq!(err.kind(), ErrorKind::SolverExhaustion);
    assert_eq!(linear_velocity(&world, id).y, -1.0);
}

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use contact_resolution::{dynamics::lcp::LcpSolver, *};
use nalgebra::{DMatrix, DVector};
use std::hint::black_box;

/// A row of balls dropping onto the ground plus a pile touching each other.
fn prepare_world(ball_count: usize, model: FrictionModel) -> ContactWorld {
    let mut world = ContactWorld::new();
    let ground = world.add_rigid_body(RigidBody::fixed(Transform::default()));
    world
        .add_geometry(Geometry::half_space(DVec3::Y, BodyLink::rigid(ground)))
        .unwrap();
    let material = Material::default().with_friction_model(model);
    for i in 0..ball_count {
        let x = (i / 2) as f64 * 1.0;
        let y = 0.5 + (i % 2) as f64;
        let id = world.add_rigid_body(
            RigidBody::new(MassProperties::solid_sphere(0.5, 1.0))
                .with_position(DVec3::new(x, y, 0.0))
                .with_velocity(DVec3::new(0.2, -1.0 - y, 0.0), DVec3::ZERO),
        );
        world
            .add_geometry(Geometry::sphere(0.5, BodyLink::rigid(id)).with_material(material))
            .unwrap();
    }
    world
}

fn bench_resolve_impacts(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve_impacts");
    for &count in &[8usize, 32, 64] {
        group.bench_with_input(BenchmarkId::new("linearized", count), &count, |b, &count| {
            b.iter(|| {
                let mut world = prepare_world(count, FrictionModel::LinearizedCone { edges: 4 });
                world.set_parallel_enabled(false);
                black_box(world.resolve_impacts().ok());
            })
        });
        group.bench_with_input(BenchmarkId::new("linearized_parallel", count), &count, |b, &count| {
            b.iter(|| {
                let mut world = prepare_world(count, FrictionModel::LinearizedCone { edges: 4 });
                world.set_parallel_enabled(true);
                black_box(world.resolve_impacts().ok());
            })
        });
        group.bench_with_input(BenchmarkId::new("exact_cone", count), &count, |b, &count| {
            b.iter(|| {
                let mut world = prepare_world(count, FrictionModel::ExactCone);
                black_box(world.resolve_impacts().ok());
            })
        });
    }
    group.finish();
}

/// Diagonally dominant LCP of size `n` with a mix of active and inactive rows.
fn dominant_lcp(n: usize) -> (DMatrix<f64>, DVector<f64>) {
    let m = DMatrix::from_fn(n, n, |r, c| if r == c { n as f64 } else { 1.0 / (1.0 + (r + c) as f64) });
    let q = DVector::from_fn(n, |r, _| if r % 3 == 0 { 1.0 } else { -1.0 - r as f64 * 0.1 });
    (m, q)
}

fn bench_lcp(c: &mut Criterion) {
    let mut group = c.benchmark_group("lcp");
    let solver = LcpSolver::default();
    for &n in &[8usize, 32, 96] {
        let (m, q) = dominant_lcp(n);
        group.bench_with_input(BenchmarkId::new("fast", n), &n, |b, _| {
            b.iter(|| black_box(solver.solve_fast(&m, &q)))
        });
        group.bench_with_input(BenchmarkId::new("regularized", n), &n, |b, _| {
            b.iter(|| black_box(solver.solve_regularized(&m, &q, "bench")))
        });
    }
    group.finish();
}

fn bench_stabilize(c: &mut Criterion) {
    c.bench_function("stabilize_sunken_row", |b| {
        b.iter(|| {
            let mut world = ContactWorld::new();
            let ground = world.add_rigid_body(RigidBody::fixed(Transform::default()));
            world
                .add_geometry(Geometry::half_space(DVec3::Y, BodyLink::rigid(ground)))
                .unwrap();
            for i in 0..16 {
                let id = world.add_rigid_body(
                    RigidBody::new(MassProperties::solid_sphere(0.5, 1.0))
                        .with_position(DVec3::new(i as f64 * 2.0, 0.4, 0.0)),
                );
                world
                    .add_geometry(Geometry::sphere(0.5, BodyLink::rigid(id)))
                    .unwrap();
            }
            black_box(world.stabilize().ok());
        })
    });
}

criterion_group!(benches, bench_resolve_impacts, bench_lcp, bench_stabilize);
criterion_main!(benches);

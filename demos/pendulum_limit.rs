use contact_resolution::*;

const DT: f64 = 1.0 / 240.0;

fn main() {
    let mut mb = Multibody::new(Transform::default());
    let mut arm = Link::new("arm", None, JointType::Revolute { axis: DVec3::Z })
        .with_limits(-std::f64::consts::FRAC_PI_4, std::f64::consts::FRAC_PI_4);
    arm.mass = 1.5;
    arm.com_offset = DVec3::X;
    arm.inertia = DMat3::ZERO;
    mb.add_link(arm);
    mb.dq[0] = 3.0;

    let mut world = ContactWorld::new();
    world.config_mut().impact.use_kappa = true;
    let pendulum = world.add_multibody(mb);

    let mut hits = 0;
    for step in 0..480 {
        if let Some(mb) = world.body_mut(pendulum).and_then(|b| b.as_multibody_mut()) {
            mb.q[0] += mb.dq[0] * DT;
        }
        let report = match world.resolve_impacts() {
            Ok(report) => report,
            Err(err) => {
                eprintln!("step {step}: {err}");
                continue;
            }
        };
        if report.islands > 0 {
            hits += 1;
            for limit in report.constraints.iter().filter_map(|c| c.as_limit()) {
                println!("step {step}: {:?} limit impulse {:.4}", limit.bound, limit.impulse);
            }
        }
        if let Err(err) = world.stabilize() {
            eprintln!("step {step}: {err}");
        }
    }

    if let Some(mb) = world.body(pendulum).and_then(|b| b.as_multibody()) {
        println!("{hits} limit impacts, final angle {:.4} rad, rate {:.4} rad/s", mb.q[0], mb.dq[0]);
    }
}

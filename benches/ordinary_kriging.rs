use criterion::{black_box, criterion_group, criterion_main, Criterion};
use geostrata::prelude::*;
use nalgebra::{Point3, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn create_point_set(domain: [[f64; 3]; 2], n_points: usize, rng: &mut StdRng) -> PointSet {
    let mut coords = vec![];
    let mut values = vec![];
    for _ in 0..n_points {
        let x = rng.gen_range(domain[0][0]..domain[1][0]);
        let y = rng.gen_range(domain[0][1]..domain[1][1]);
        let z = rng.gen_range(domain[0][2]..domain[1][2]);
        coords.push([x, y, z]);
        values.push(rng.gen::<f64>());
    }
    PointSet::from_xyz(&coords, values).expect("valid point set")
}

fn create_grid(domain: [[f64; 3]; 2], counts: [usize; 3]) -> GridDefinition {
    let spacing = Vector3::new(
        (domain[1][0] - domain[0][0]) / counts[0] as f64,
        (domain[1][1] - domain[0][1]) / counts[1] as f64,
        (domain[1][2] - domain[0][2]) / counts[2] as f64,
    );
    let origin = Point3::from(domain[0]) + spacing / 2.0;
    GridDefinition::new(origin, spacing, counts)
}

fn create_vgram(range: Vector3<f64>, sill: f64) -> CompositeVariogram {
    let anisotropy = Anisotropy::new(range.y, range.x, range.z, 0.0, 0.0, 0.0);
    CompositeVariogram::new(vec![
        VariogramType::nugget(0.1 * sill),
        VariogramType::spherical(0.9 * sill, anisotropy),
    ])
}

fn criterion_benchmark(c: &mut Criterion) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let mut rng = StdRng::seed_from_u64(0);
    let domain = [[0.0, 0.0, 0.0], [100.0, 100.0, 100.0]];
    let cond_points = create_point_set(domain, 100_000, &mut rng);
    let grid = create_grid(domain, [20, 20, 20]);

    let vgram = create_vgram(Vector3::new(20.0, 20.0, 10.0), 1.0);
    let search_ellipsoid = Ellipsoid::isotropic(20.0);
    let params = ConditioningParams::default();

    let nodes = grid.nodes();
    c.bench_function("ordinary kriging points", |b| {
        b.iter(|| {
            estimate(
                black_box(&cond_points),
                black_box(&vgram),
                black_box(&search_ellipsoid),
                black_box(&params),
                black_box(&OKSystemBuilder),
                black_box(&nodes),
            )
        })
    });

    let blocks = grid.blocks(Vector3::new(2.5, 2.5, 2.5));
    c.bench_function("ordinary kriging blocks", |b| {
        b.iter(|| {
            estimate_blocks(
                black_box(&cond_points),
                black_box(&vgram),
                black_box(&search_ellipsoid),
                black_box(&params),
                black_box(&OKSystemBuilder),
                black_box(&blocks),
            )
        })
    });

    let ns_points = cond_points
        .with_values((0..cond_points.len()).map(|_| rng.gen_range(-2.0..2.0)).collect())
        .expect("matching length");
    let sim_params = SimulationParameters::new(
        4,
        create_grid(domain, [10, 10, 10]),
        42,
        Ellipsoid::isotropic(20.0),
    )
    .with_search(ConditioningParams::new(16, 4, None, 1));
    let mut group = c.benchmark_group("simulation");
    group.sample_size(10);
    group.bench_function("sgs", |b| {
        b.iter(|| {
            sgs_simulate(
                black_box(&ns_points),
                black_box(&vgram),
                &IdentityTransform,
                &SGSParameters::default(),
                black_box(&sim_params),
            )
        })
    });
    group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use seedcluster::silhouette::silhouette_score;

fn bench_silhouette(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(42);
    let k = 8;

    for n in [500, 2000] {
        let data = black_box(Array2::from_shape_fn((n, 32), |_| rng.random_range(0.0..100.0)));
        let labels: Vec<usize> = (0..n).map(|i| i % k).collect();

        c.bench_function(&format!("silhouette_{n}"), |b| b.iter(|| silhouette_score(data.view(), &labels)));
    }
}

criterion_group!(benches, bench_silhouette);
criterion_main!(benches);

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use digitnet::{ActivationKind, Matrix, ModelConfig, Network, PoolingKind};

fn mnist_sized_network() -> Network {
    let config = ModelConfig {
        hidden_layers: vec![128],
        activation: ActivationKind::Sigmoid,
        pooling: PoolingKind::Identity,
        ..ModelConfig::default()
    };
    Network::new_with_seed(config, 0).unwrap()
}

fn forward_bench(c: &mut Criterion) {
    let mut network = mnist_sized_network();
    let input = Matrix::from_vec(vec![120.0; 784], 1, 784).unwrap();

    c.bench_function("forward_784_128_10", |b| {
        b.iter(|| {
            let out = network.forward(black_box(input.clone())).unwrap();
            black_box(out.rows());
        })
    });
}

fn backpropagate_bench(c: &mut Criterion) {
    let mut network = mnist_sized_network();
    let input = Matrix::from_vec(vec![120.0; 784], 1, 784).unwrap();
    network.forward(input).unwrap();
    let error = Network::error_batch(&[3], network.output()).unwrap();

    c.bench_function("backpropagate_784_128_10", |b| {
        b.iter(|| {
            network
                .backpropagate(black_box(error.clone()), 0.1)
                .unwrap();
        })
    });
}

criterion_group!(benches, forward_bench, backpropagate_bench);
criterion_main!(benches);

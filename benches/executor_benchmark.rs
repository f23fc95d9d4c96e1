use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use taskpool::pool::{task, ExecutorConfig, ParallelExecutor, Task, TaskError};
use tokio::runtime::Runtime;

fn make_tasks(count: usize, fail_every: usize) -> Vec<Task> {
    (0..count)
        .map(|i| {
            task(move || {
                black_box(i * 31);
                if fail_every > 0 && i % fail_every == 0 {
                    Err(TaskError::failed("bench failure"))
                } else {
                    Ok(())
                }
            })
        })
        .collect()
}

fn benchmark_worker_counts(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("worker_counts");

    for workers in [1i64, 2, 4, 8] {
        group.bench_with_input(BenchmarkId::from_parameter(workers), &workers, |b, &workers| {
            let executor = ParallelExecutor::new(ExecutorConfig::new(workers, 0)).unwrap();
            let executor = &executor;
            b.to_async(&rt).iter(|| async move {
                executor.execute(make_tasks(256, 0)).await
            })
        });
    }

    group.finish();
}

fn benchmark_early_abort(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    c.bench_function("early_abort", |b| {
        let executor = ParallelExecutor::new(ExecutorConfig::new(4, 5)).unwrap();
        let executor = &executor;
        b.to_async(&rt).iter(|| async move {
            let _ = executor.execute(make_tasks(1024, 2)).await;
        })
    });
}

criterion_group!(benches, benchmark_worker_counts, benchmark_early_abort);

criterion_main!(benches);

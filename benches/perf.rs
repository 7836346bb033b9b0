use divan::{bench, AllocProfiler, Bencher};
use forage::{Builder, CancelToken};
use itertools::iproduct;
use std::time::Duration;

#[global_allocator]
static ALLOC: AllocProfiler = AllocProfiler::system();

const THREADS: &[usize] = &[1, 4, 8, 16];
const NUM_SHORT_TASKS: &[usize] = &[1, 100, 10_000, 100_000];
const NUM_LONG_TASKS: &[usize] = &[1, 10, 100, 1_000];

fn sum(acc: &usize, x: usize) -> Result<usize, ()> {
    Ok(acc + x)
}

#[bench(args = iproduct!(THREADS, NUM_SHORT_TASKS))]
fn bench_short_task(bencher: Bencher, (num_threads, num_tasks): (&usize, &usize)) {
    let builder = Builder::new().num_threads(*num_threads);
    bencher.bench_local(|| {
        builder
            .map_reduce(&CancelToken::new(), 0..*num_tasks, Ok, sum, 0)
            .unwrap()
    })
}

#[bench(args = iproduct!(THREADS, NUM_LONG_TASKS))]
fn bench_long_task(bencher: Bencher, (num_threads, num_tasks): (&usize, &usize)) {
    let builder = Builder::new().num_threads(*num_threads);
    bencher.bench_local(|| {
        builder
            .map_reduce(
                &CancelToken::new(),
                0..*num_tasks,
                |i| {
                    std::thread::sleep(Duration::from_millis(1));
                    Ok(i)
                },
                sum,
                0,
            )
            .unwrap()
    })
}

fn main() {
    divan::main();
}

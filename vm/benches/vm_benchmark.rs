//! Run with:
//!   cargo bench --bench vm_benchmark

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use heap::HeapSettings;
use object::SWord;
use vm::{DiscardSink, Machine, MachineSettings, Program, demos};

fn create_machine() -> Machine {
    // Keep most iterations collection-free; list_sum still triggers some.
    let settings = MachineSettings {
        heap: HeapSettings {
            initial_words: 1 << 18,
            ..HeapSettings::default()
        },
        ..MachineSettings::default()
    };
    Machine::new(settings, Box::new(DiscardSink))
}

fn bench_program(c: &mut Criterion, id: &str, program: Program) {
    let mut machine = create_machine();
    c.bench_function(id, |b| {
        b.iter(|| {
            let v = machine.run(black_box(&program)).expect("program runs");
            black_box(v);
        })
    });
}

fn bench_sum_loop(c: &mut Criterion) {
    let program = demos::sum_loop(10_000).expect("sum_loop builds");
    bench_program(c, "sum_loop_10000", program);
}

fn bench_fibonacci(c: &mut Criterion) {
    let program = demos::fib(20).expect("fib builds");
    bench_program(c, "fibonacci_20", program);
}

fn bench_curry(c: &mut Criterion) {
    let program = demos::curry(10).expect("curry builds");
    bench_program(c, "curry", program);
}

fn bench_list_sum(c: &mut Criterion) {
    let n: SWord = 10_000;
    let program = demos::list_sum(n).expect("list_sum builds");
    bench_program(c, "list_sum_10000", program);
}

criterion_group! {
    name = benches;
    config = Criterion::default().sample_size(20);
    targets = bench_sum_loop, bench_fibonacci, bench_curry, bench_list_sum
}
criterion_main!(benches);

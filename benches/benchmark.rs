use criterion::{Criterion, black_box, criterion_group, criterion_main};

use glogg::codegen::compile;
use glogg::grammar::parse_program;
use glogg::runtime::{self, FactStore};

fn people_program(count: usize) -> String {
    let mut source = String::from("commit:\n");
    for i in 0..count {
        source.push_str(&format!(
            "  [ #person name: \"p{}\" group: {} ]\n",
            i,
            i % 10
        ));
    }
    source.push_str(
        "\nsearch:\n  [ #person name: left group: g ]\n  [ #person name: right group: g ]\n",
    );
    source.push_str("commit:\n  [ #peer left: left right: right ]\n");
    source
}

fn parse_benchmark(c: &mut Criterion) {
    let source = people_program(100);
    c.bench_function("parse 100 records", |b| {
        b.iter(|| parse_program(black_box(&source)))
    });
}

fn compile_benchmark(c: &mut Criterion) {
    let queries = parse_program(&people_program(100)).unwrap();
    c.bench_function("compile 100 records", |b| {
        b.iter(|| compile(black_box(&queries), &[]))
    });
}

fn join_benchmark(c: &mut Criterion) {
    let queries = parse_program(&people_program(50)).unwrap();
    let program = compile(&queries, &[]).unwrap();
    c.bench_function("evaluate self-join over 50 facts", |b| {
        b.iter(|| {
            let mut store = FactStore::new();
            runtime::run(black_box(&program), &mut store).unwrap();
            store.facts().len()
        })
    });
}

criterion_group!(benches, parse_benchmark, compile_benchmark, join_benchmark);
criterion_main!(benches);

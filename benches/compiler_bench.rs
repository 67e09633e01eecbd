use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use descriptor_compiler::snapshot::DocumentSnapshot;
use descriptor_compiler::value::MapValue;
use descriptor_compiler::{
    compile, parse_descriptor_json, MemoryQuery, QueryScope, RecordingQuery, SqlCompiler, Value,
};
use std::collections::HashMap;
use std::hint::black_box;

const CASES: [(&str, &str); 4] = [
    ("simple", r#"{"where": [["status", "==", "Open"]]}"#),
    (
        "medium",
        r#"{"where": [["status", "==", "Open"], ["priority", ">", 2]], "orderBy": [["priority", true]], "limit": 20}"#,
    ),
    (
        "complex",
        r#"{"filters": {"op": "AND", "queries": [
                {"fieldPath": "dueDate", "op": ">", "value": "2024-01-01"},
                {"op": "OR", "queries": [
                    {"fieldPath": "title", "op": "==", "value": "Release Plan"},
                    {"fieldPath": "tags", "op": "array-contains-any", "value": ["v1", "v2"]}
                ]}
            ]},
            "orderBy": [["dueDate", false], ["priority", true]],
            "startAfter": ["2024-02-01", 3],
            "limitToLast": 10}"#,
    ),
    (
        "or_optimization",
        r#"{"filters": {"op": "OR", "queries": [
                {"fieldPath": "status", "op": "==", "value": "Open"},
                {"fieldPath": "status", "op": "==", "value": "Pending"},
                {"fieldPath": "status", "op": "==", "value": "Review"},
                {"fieldPath": "status", "op": "==", "value": "Approved"},
                {"fieldPath": "status", "op": "==", "value": "Testing"}
            ]}}"#,
    ),
];

// 创建一个编译器实例并设置表映射
fn create_compiler() -> SqlCompiler {
    let mut compiler = SqlCompiler::new();
    let mut table_mapping = HashMap::new();
    table_mapping.insert("tasks".to_string(), "task_docs".to_string());
    table_mapping.insert("runs".to_string(), "run_docs".to_string());
    compiler.set_table_mapping(table_mapping);
    compiler
}

fn tasks() -> QueryScope {
    QueryScope::Collection("tasks".to_string())
}

// 基准测试：描述符解析
fn benchmark_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("descriptor_parse");

    for (name, json) in CASES {
        group.bench_with_input(BenchmarkId::new("parse", name), &json, |b, &json| {
            b.iter(|| black_box(parse_descriptor_json(black_box(json)).expect("解析应该成功")))
        });
    }

    group.finish();
}

// 基准测试：编译流水线本身 (记录后端)
fn benchmark_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline");

    for (name, json) in CASES {
        let descriptor = parse_descriptor_json(json).expect("解析应该成功");
        group.bench_with_input(BenchmarkId::new("recording", name), &descriptor, |b, descriptor| {
            b.iter(|| {
                let query = compile(black_box(descriptor), RecordingQuery::new(tasks())).expect("编译应该成功");
                black_box(query)
            })
        });
    }

    group.finish();
}

// 基准测试：SQL编译性能
fn benchmark_sql_compiler(c: &mut Criterion) {
    let compiler = create_compiler();
    let mut group = c.benchmark_group("sql_compiler_performance");

    for (name, json) in CASES {
        let descriptor = parse_descriptor_json(json).expect("解析应该成功");
        group.bench_with_input(BenchmarkId::new("compile", name), &descriptor, |b, descriptor| {
            b.iter(|| black_box(compiler.compile(black_box(descriptor), tasks()).expect("编译应该成功")))
        });
    }

    group.finish();
}

// 基准测试：内存后端执行
fn benchmark_memory_execute(c: &mut Criterion) {
    let documents: Vec<DocumentSnapshot> = (0..1000)
        .map(|i| {
            let mut data = MapValue::new();
            let status = ["Open", "Pending", "Review", "Approved", "Closed"][i % 5];
            data.insert("status".to_string(), Value::from(status));
            data.insert("priority".to_string(), Value::Integer((i % 7) as i64));
            DocumentSnapshot::new(format!("tasks/t{:04}", i), data)
        })
        .collect();

    let mut group = c.benchmark_group("memory_execute");
    for (name, json) in [CASES[1], CASES[3]] {
        let descriptor = parse_descriptor_json(json).expect("解析应该成功");
        group.bench_with_input(BenchmarkId::new("execute", name), &descriptor, |b, descriptor| {
            b.iter(|| {
                let query = compile(descriptor, MemoryQuery::collection("tasks", documents.clone()))
                    .expect("编译应该成功");
                black_box(query.execute())
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_parse,
    benchmark_pipeline,
    benchmark_sql_compiler,
    benchmark_memory_execute
);
criterion_main!(benches);

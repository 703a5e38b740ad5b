use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use std::time::Duration;
use tidesql::{Params, QueryLogEntry, Value, normalize, quote_sql};

/// SELECT [[col0]], [[col1]], ... FROM {{%t}} WHERE [[col0]] = ? AND [[col1]] = ? ...
fn build_marked_sql(n: usize) -> String {
    let columns: Vec<String> = (0..n).map(|i| format!("[[col{i}]]")).collect();
    let conditions: Vec<String> = (0..n).map(|i| format!("[[col{i}]] = ?")).collect();
    format!(
        "SELECT {} FROM {{{{%t}}}} WHERE {}",
        columns.join(", "),
        conditions.join(" AND ")
    )
}

/// Half `?`, half `:name` markers, so normalization has to rewrite.
fn build_mixed(n: usize) -> (String, Params) {
    let mut params = Params::new();
    let mut parts = Vec::with_capacity(n);
    for i in 0..n {
        if i % 2 == 0 {
            parts.push(format!("c{i} = ?"));
            params.push(i as i64);
        } else {
            parts.push(format!("c{i} = :p{i}"));
            params
                .bind_named(&format!("p{i}"), i as i64)
                .expect("valid name");
        }
    }
    (format!("SELECT * FROM t WHERE {}", parts.join(" AND ")), params)
}

fn bench_quote_sql(c: &mut Criterion) {
    let mut group = c.benchmark_group("sql_builder/quote_sql");

    for n in [1, 5, 10, 50, 100] {
        let sql = build_marked_sql(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &sql, |b, sql| {
            b.iter(|| black_box(quote_sql(sql, "cms_")));
        });
    }

    group.finish();
}

fn bench_normalize(c: &mut Criterion) {
    let mut group = c.benchmark_group("sql_builder/normalize");

    for n in [2, 10, 50, 100] {
        let (sql, params) = build_mixed(n);
        group.bench_with_input(
            BenchmarkId::from_parameter(n),
            &(sql, params),
            |b, (sql, params)| {
                b.iter(|| black_box(normalize(sql, params.clone())));
            },
        );
    }

    group.finish();
}

fn bench_render_log(c: &mut Criterion) {
    let mut group = c.benchmark_group("sql_builder/render_log");

    for n in [1, 10, 100] {
        let entry = QueryLogEntry {
            sql: build_marked_sql(n),
            params: Params::positional((0..n).map(|i| Value::from(format!("v'{i}")))),
            elapsed: Duration::from_micros(250),
        };
        group.bench_with_input(BenchmarkId::from_parameter(n), &entry, |b, entry| {
            b.iter(|| black_box(entry.render(Value::to_sql_literal)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_quote_sql, bench_normalize, bench_render_log);
criterion_main!(benches);

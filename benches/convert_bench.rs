//! Benchmarks for mudanza core conversions.
//!
//! Run with: cargo bench
//!
//! Results include 95% confidence intervals via Criterion.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use mudanza::core::attributes::{self, resolve_attributes};
use mudanza::core::recipe::parse_recipe;
use mudanza::core::scanner;
use mudanza::core::template::convert_template;
use mudanza::core::types::Precedence;

fn synthetic_recipe(resources: usize) -> String {
    (0..resources)
        .map(|i| {
            format!(
                "package 'pkg{i}' do\n  version '1.{i}'\n  action :install\nend\n\nservice 'svc{i}' do\n  action [:enable, :start]\n  only_if 'test -f /etc/svc{i}'\nend\n"
            )
        })
        .collect()
}

fn synthetic_attributes(count: usize) -> String {
    (0..count)
        .map(|i| {
            format!(
                "default['app']['tier{}']['port'] = {}\noverride['app']['tier{}']['ssl'] = true\n",
                i,
                8000 + i,
                i
            )
        })
        .collect()
}

fn synthetic_template(sections: usize) -> String {
    let mut out = String::from("# generated\n");
    for i in 0..sections {
        out.push_str(&format!(
            "<% if node['app']['tier{i}'] %>\nupstream tier{i} {{\n<% servers.each do |s| %>  server <%= s %>:<%= node['app']['port'] %>;\n<% end %>\n}}\n<% end %>\n"
        ));
    }
    out
}

fn bench_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("scan_recipe");
    for size in [4, 32, 128] {
        let src = synthetic_recipe(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &src, |b, src| {
            b.iter(|| {
                let stmts = scanner::scan(black_box(src)).unwrap();
                black_box(stmts);
            });
        });
    }
    group.finish();
}

fn bench_parse_recipe(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_recipe");
    for size in [4, 32, 128] {
        let src = synthetic_recipe(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &src, |b, src| {
            b.iter(|| {
                let parse = parse_recipe(black_box(src)).unwrap();
                black_box(parse);
            });
        });
    }
    group.finish();
}

fn bench_resolve_attributes(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve_attributes");
    for size in [8, 64, 256] {
        let src = synthetic_attributes(size);
        let parsed = attributes::parse_attributes(&src, "bench.rb", Precedence::Normal).unwrap();
        group.bench_with_input(
            BenchmarkId::from_parameter(size),
            &parsed.assignments,
            |b, assignments| {
                b.iter(|| {
                    let resolution = resolve_attributes(black_box(assignments));
                    black_box(resolution);
                });
            },
        );
    }
    group.finish();
}

fn bench_convert_template(c: &mut Criterion) {
    let mut group = c.benchmark_group("convert_template");
    for size in [2, 16, 64] {
        let src = synthetic_template(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &src, |b, src| {
            b.iter(|| {
                let result = convert_template(black_box(src));
                black_box(result);
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_scan,
    bench_parse_recipe,
    bench_resolve_attributes,
    bench_convert_template
);
criterion_main!(benches);

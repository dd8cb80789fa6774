use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use flowgrid::config::LayoutConfig;
use flowgrid::ir::{Fragment, FragmentKind, SourceRange};
use flowgrid::layout::compute_layout;
use flowgrid::parser::parse_fragment_tree;
use flowgrid::text_metrics::MonospaceMetrics;
use std::collections::BTreeSet;
use std::hint::black_box;

/// `width` statements per suite, with an `if`/`else` and a `for` loop
/// nesting the same shape `depth` times.
fn nested_module(depth: usize, width: usize) -> Fragment {
    let mut line = 0usize;
    let mut module = Fragment::new(FragmentKind::Module);
    module.suite = nested_suite(depth, width, &mut line);
    module
}

fn nested_suite(depth: usize, width: usize, line: &mut usize) -> Vec<Fragment> {
    let mut next = |kind: FragmentKind, text: String| {
        *line += 1;
        let mut item = Fragment::new(kind);
        item.range = SourceRange::line(*line);
        item.text = text;
        item
    };
    let mut suite = Vec::new();
    for i in 0..width {
        suite.push(next(FragmentKind::CodeBlock, format!("value_{i} = compute({i})")));
    }
    if depth == 0 {
        suite.push(next(FragmentKind::Return, "value_0".to_string()));
        return suite;
    }

    let mut yes = next(FragmentKind::IfPart, format!("level_{depth} > 0"));
    let mut no = next(FragmentKind::Else, String::new());
    let mut loop_item = next(FragmentKind::For, format!("for item_{depth} in items"));
    yes.suite = nested_suite(depth - 1, width, line);
    no.suite = nested_suite(depth - 1, width, line);
    loop_item.suite = nested_suite(depth - 1, width, line);
    let mut branch = Fragment::new(FragmentKind::If);
    branch.range = yes.range;
    branch.parts = vec![yes, no];
    suite.push(branch);
    suite.push(loop_item);
    suite
}

fn fixture(name: &str) -> &'static str {
    match name {
        "annotated" => include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/tests/fixtures/annotated.json"
        )),
        "groups" => include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/tests/fixtures/groups.json5"
        )),
        "loops" => include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/tests/fixtures/loops.json"
        )),
        "try_except_else" => include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/tests/fixtures/try_except_else.json5"
        )),
        _ => panic!("unknown fixture"),
    }
}

const FIXTURES: [&str; 4] = ["annotated", "groups", "loops", "try_except_else"];

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");
    for name in FIXTURES {
        let input = fixture(name);
        group.bench_with_input(BenchmarkId::from_parameter(name), input, |b, data| {
            b.iter(|| {
                let parsed = parse_fragment_tree(black_box(data)).expect("parse failed");
                black_box(parsed.module.suite.len());
            });
        });
    }
    group.finish();
}

fn bench_layout(c: &mut Criterion) {
    let mut group = c.benchmark_group("layout");
    let config = LayoutConfig::default();
    let metrics = MonospaceMetrics::from_config(&config);
    let collapsed = BTreeSet::new();
    for name in FIXTURES {
        let parsed = parse_fragment_tree(fixture(name)).expect("parse failed");
        group.bench_with_input(
            BenchmarkId::from_parameter(name),
            &parsed.module,
            |b, module| {
                b.iter(|| {
                    let layout = compute_layout(black_box(module), &config, &metrics, &collapsed)
                        .expect("layout failed");
                    black_box(layout.connectors.len());
                });
            },
        );
    }
    group.finish();
}

fn bench_nesting(c: &mut Criterion) {
    let mut group = c.benchmark_group("layout_nesting");
    let config = LayoutConfig::default();
    let metrics = MonospaceMetrics::from_config(&config);
    let collapsed = BTreeSet::new();
    for (depth, width) in [(2usize, 8usize), (4, 4), (5, 2)] {
        let name = format!("nested_{}_{}", depth, width);
        let module = nested_module(depth, width);
        group.bench_with_input(BenchmarkId::from_parameter(name), &module, |b, module| {
            b.iter(|| {
                let layout = compute_layout(black_box(module), &config, &metrics, &collapsed)
                    .expect("layout failed");
                black_box(layout.grid.canvases.len());
            });
        });
    }
    group.finish();
}

criterion_group!(
    name = benches;
    config = Criterion::default();
    targets = bench_parse, bench_layout, bench_nesting
);
criterion_main!(benches);

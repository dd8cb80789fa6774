use std::collections::BTreeSet;
use std::path::Path;

use flowgrid::annotation::Color;
use flowgrid::config::{Config, merge_config};
use flowgrid::layout::{CellKind, Grid, Layout};
use flowgrid::layout_dump::LayoutDump;
use flowgrid::text_metrics::MonospaceMetrics;
use flowgrid::{compute_layout, parse_fragment_tree};

const FIXTURES: [&str; 11] = [
    "annotated.json",
    "collapsed_return.json5",
    "envelope.json",
    "function_return.json",
    "groups.json5",
    "if_else.json",
    "if_groups.json5",
    "if_return.json",
    "loops.json",
    "nested_if_terminal.json",
    "try_except_else.json5",
];

fn layout_fixture_with(name: &str, collapsed: &BTreeSet<String>) -> Layout {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    let input = std::fs::read_to_string(&path).expect("fixture read failed");
    let parsed = parse_fragment_tree(&input).expect("parse failed");
    let config = match parsed.config {
        Some(overrides) => merge_config(Config::default(), overrides).expect("bad overrides"),
        None => Config::default(),
    };
    let metrics = MonospaceMetrics::from_config(&config.layout);
    compute_layout(&parsed.module, &config.layout, &metrics, collapsed).expect("layout failed")
}

fn layout_fixture(name: &str) -> Layout {
    layout_fixture_with(name, &BTreeSet::new())
}

fn merges(layout: &Layout) -> usize {
    layout
        .grid
        .cells()
        .filter(|cell| matches!(&cell.kind, CellKind::Connector(c) if c.is_merge()))
        .count()
}

#[test]
fn cells_never_shrink_below_their_minimum() {
    for name in FIXTURES {
        let layout = layout_fixture(name);
        for cell in layout.grid.cells() {
            assert!(
                cell.width >= cell.min_width && cell.height >= cell.min_height,
                "{name}: {} at ({}, {}) is {}x{}, needs {}x{}",
                cell.kind.name(),
                cell.row,
                cell.column,
                cell.width,
                cell.height,
                cell.min_width,
                cell.min_height
            );
        }
    }
}

#[test]
fn dependent_regions_share_column_widths() {
    for name in FIXTURES {
        let layout = layout_fixture(name);
        for canvas in &layout.grid.canvases {
            for &(begin, end) in &canvas.dependent_regions {
                let rows = &canvas.rows[begin..=end];
                let shared = rows.iter().map(Vec::len).min().unwrap_or(0);
                for column in 0..shared {
                    let widths: Vec<f32> = rows
                        .iter()
                        .map(|cells| &cells[column])
                        .filter(|cell| !cell.tail_comment)
                        .map(|cell| cell.width)
                        .collect();
                    assert!(
                        widths.windows(2).all(|pair| pair[0] == pair[1]),
                        "{name}: canvas {:?} column {column} widths {widths:?}",
                        canvas.id
                    );
                }
            }
        }
    }
}

#[test]
fn repeated_layout_is_identical() {
    for name in FIXTURES {
        let first = serde_json::to_string(&LayoutDump::from_layout(
            &layout_fixture(name),
            &Default::default(),
        ))
        .unwrap();
        let second = serde_json::to_string(&LayoutDump::from_layout(
            &layout_fixture(name),
            &Default::default(),
        ))
        .unwrap();
        assert_eq!(first, second, "{name}");
    }
}

#[test]
fn merge_connectors_follow_branch_termination() {
    assert_eq!(merges(&layout_fixture("if_else.json")), 1);
    assert_eq!(merges(&layout_fixture("if_return.json")), 0);
}

#[test]
fn terminal_branches_skip_the_merge() {
    let collapsed: BTreeSet<String> = ["hit".to_string()].into_iter().collect();
    let layout = layout_fixture_with("collapsed_return.json5", &collapsed);
    assert!(
        layout
            .grid
            .cells()
            .any(|cell| cell.kind.name() == "collapsed-group")
    );
    assert_eq!(merges(&layout), 0);

    assert_eq!(merges(&layout_fixture("nested_if_terminal.json")), 0);
}

#[test]
fn function_body_rows() {
    let layout = layout_fixture("function_return.json");
    let file = layout.grid.cell(Grid::ROOT, 1, 1).unwrap().nested_canvas().unwrap();
    let body = layout.grid.cell(file, 2, 1).unwrap().nested_canvas().unwrap();
    let names: Vec<Vec<String>> = layout
        .grid
        .canvas(body)
        .unwrap()
        .rows
        .iter()
        .map(|cells| cells.iter().map(|cell| cell.kind.name()).collect())
        .collect();
    assert_eq!(names[0], vec!["function-scope-top-left"]);
    assert_eq!(names[1][1], "function-scope-declaration");
    assert_eq!(names[2][1], "v-spacer");
    assert_eq!(names[3][1..], ["connector", "leading-comment"]);
    assert_eq!(names[4][1], "return");
    assert_eq!(names[5], vec!["scope-corner"]);
}

#[test]
fn try_leads_the_else_row_below_its_region() {
    let layout = layout_fixture("try_except_else.json5");
    let file = layout.grid.cell(Grid::ROOT, 1, 1).unwrap().nested_canvas().unwrap();
    let canvas = layout.grid.canvas(file).unwrap();
    assert_eq!(canvas.dependent_regions.len(), 1);
    let (begin, end) = canvas.dependent_regions[0];
    assert_eq!(begin, end);
    let headers = canvas.rows[begin]
        .iter()
        .filter(|cell| cell.nested_canvas().is_some())
        .count();
    assert_eq!(headers, 3, "try plus two handlers share the region row");

    let else_canvas = canvas.rows[end + 1][1].nested_canvas().unwrap();
    assert!(matches!(
        layout.grid.cell(else_canvas, 0, 0).unwrap().kind,
        CellKind::Scope { leader: Some(1), .. }
    ));
    let badges: Vec<&str> = layout.badges.iter().map(|badge| badge.text.as_str()).collect();
    assert_eq!(badges.first(), Some(&"try"));
    assert!(badges.contains(&"else"));
    assert!(badges.contains(&"finally"));
}

#[test]
fn groups_pair_and_report_defects() {
    let layout = layout_fixture("groups.json5");
    assert_eq!(layout.warnings.len(), 1, "{:?}", layout.warnings);
    assert_eq!(layout.warnings[0].line, 11);
    assert!(layout.warnings[0].message.starts_with("Invalid CML comment:"));

    let mut frames: Vec<(&str, usize)> = layout
        .groups
        .iter()
        .map(|group| (group.id.as_str(), group.depth))
        .collect();
    frames.sort();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].0, "inner");
    assert_eq!(frames[1].0, "outer");
    assert!(frames[1].1 > frames[0].1, "outer frame sits deeper than inner");

    let twins = layout
        .grid
        .cells()
        .filter(|cell| cell.kind.name() == "empty-group")
        .count();
    assert_eq!(twins, 2);
}

#[test]
fn groups_around_and_inside_if_branches() {
    let layout = layout_fixture("if_groups.json5");
    assert!(layout.warnings.is_empty(), "{:?}", layout.warnings);
    let depth = |id: &str| {
        layout
            .groups
            .iter()
            .find(|group| group.id == id)
            .map(|group| group.depth)
    };
    assert_eq!(layout.groups.len(), 4);
    assert_eq!(depth("outer"), Some(1));
    assert_eq!(depth("a"), Some(1));
    assert_eq!(depth("b"), Some(2));
    assert_eq!(depth("c"), Some(1));

    assert!(layout.grid.cells().any(|cell| cell.h_shift > 0));
    let spacers = layout
        .grid
        .cells()
        .filter(|cell| matches!(cell.kind, CellKind::HGroupSpacer { .. }))
        .count();
    assert!(spacers > 0);

    let outer = layout.groups.iter().find(|group| group.id == "outer").unwrap();
    for inner in layout.groups.iter().filter(|group| group.id != "outer") {
        assert!(inner.x > outer.x && inner.y > outer.y, "{} sits inside outer", inner.id);
    }
}

#[test]
fn collapsed_group_hides_its_frame() {
    let collapsed: BTreeSet<String> = ["outer".to_string()].into_iter().collect();
    let layout = layout_fixture_with("groups.json5", &collapsed);
    assert!(layout.groups.iter().all(|group| group.id != "outer"));
    assert!(layout.groups.iter().all(|group| group.id != "inner"));
    assert!(
        layout
            .grid
            .cells()
            .any(|cell| cell.kind.name() == "collapsed-group")
    );
}

#[test]
fn annotations_recolor_retext_and_link() {
    let layout = layout_fixture("annotated.json");
    assert!(layout.warnings.is_empty(), "{:?}", layout.warnings);
    let block = layout
        .grid
        .cells()
        .find(|cell| cell.text() == Some("set things up"))
        .expect("replaced text");
    assert_eq!(block.colors().background, Some(Color::rgb(0xff, 0xe0, 0xe0)));
    assert!(
        layout
            .grid
            .cells()
            .any(|cell| cell.kind.name() == "independent-doc" && cell.text() == Some("Run"))
    );
    assert!(
        layout
            .grid
            .cells()
            .any(|cell| cell.kind.name() == "decorator-scope-declaration")
    );
}

#[test]
fn embedded_overrides_hide_comments() {
    let layout = layout_fixture("envelope.json");
    assert!(
        !layout
            .grid
            .cells()
            .any(|cell| cell.kind.name() == "leading-comment")
    );
}

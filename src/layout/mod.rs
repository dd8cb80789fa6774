mod builder;
mod cell;
mod draw;
mod error;
mod groups;
mod measure;
mod text;
pub(crate) mod types;
pub use cell::Style;
pub use error::LayoutError;
pub use types::*;

use std::collections::BTreeSet;

use crate::annotation::validate_tree;
use crate::config::LayoutConfig;
use crate::ir::Fragment;
use crate::text_metrics::TextMetrics;

/// Lays out a module fragment. Groups whose id is in `collapsed` are drawn as
/// a single cell. Annotation and group defects end up in
/// [`Layout::warnings`]; structural failures abort with [`LayoutError`].
pub fn compute_layout(
    module: &Fragment,
    config: &LayoutConfig,
    metrics: &dyn TextMetrics,
    collapsed: &BTreeSet<String>,
) -> Result<Layout, LayoutError> {
    let mut warnings = validate_tree(module);
    let matched = groups::match_markers(module);
    for warning in &matched.warnings {
        tracing::warn!(
            line = warning.line,
            column = warning.column,
            "{}",
            warning.message
        );
    }
    warnings.extend(matched.warnings.iter().cloned());

    let mut grid = builder::build_grid(module, &config.flow, collapsed, &matched)?;
    tracing::debug!(canvases = grid.canvases.len(), "grid built");

    groups::adjust_open_groups(&mut grid, Grid::ROOT)?;

    let style = Style::new(config, metrics);
    let (width, height) = measure::render(&mut grid, Grid::ROOT, &style)?;
    tracing::debug!(width, height, "grid measured");

    let drawing = draw::place(&mut grid, &style)?;
    tracing::trace!(
        connectors = drawing.connectors.len(),
        badges = drawing.badges.len(),
        groups = drawing.groups.len(),
        "grid placed"
    );

    warnings.sort_by_key(|warning| (warning.line, warning.column));
    Ok(Layout {
        width,
        height,
        grid,
        connectors: drawing.connectors,
        badges: drawing.badges,
        groups: drawing.groups,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FlowToggles;
    use crate::ir::{AnnotationSource, Comment, FragmentKind, SourceRange};
    use crate::text_metrics::MonospaceMetrics;

    fn metrics() -> MonospaceMetrics {
        MonospaceMetrics {
            text_size: 10.0,
            badge_size: 8.0,
            line_height: 1.0,
        }
    }

    fn fragment(kind: FragmentKind, line: usize, text: &str) -> Fragment {
        let mut item = Fragment::new(kind);
        item.range = SourceRange::line(line);
        item.text = text.to_string();
        item
    }

    fn marker(line: usize, text: &str) -> Fragment {
        let mut item = fragment(FragmentKind::Annotation, line, "");
        item.leading_annotations.push(AnnotationSource::Text {
            line,
            column: 1,
            text: text.to_string(),
        });
        item
    }

    fn module(suite: Vec<Fragment>) -> Fragment {
        let mut module = Fragment::new(FragmentKind::Module);
        module.suite = suite;
        module
    }

    fn run(module: &Fragment) -> Layout {
        run_with(module, &LayoutConfig::default(), &BTreeSet::new())
    }

    fn run_with(module: &Fragment, config: &LayoutConfig, collapsed: &BTreeSet<String>) -> Layout {
        compute_layout(module, config, &metrics(), collapsed).unwrap()
    }

    fn if_statement(yes: Vec<Fragment>, no: Option<Vec<Fragment>>) -> Fragment {
        let mut part = fragment(FragmentKind::IfPart, 1, "ready");
        part.suite = yes;
        let mut item = fragment(FragmentKind::If, 1, "");
        item.parts.push(part);
        if let Some(suite) = no {
            let mut other = fragment(FragmentKind::Else, 3, "");
            other.suite = suite;
            item.parts.push(other);
        }
        item
    }

    fn merges(layout: &Layout) -> usize {
        layout
            .grid
            .cells()
            .filter(|cell| matches!(&cell.kind, CellKind::Connector(c) if c.is_merge()))
            .count()
    }

    #[test]
    fn every_cell_is_at_least_its_minimum_size() {
        let mut loop_item = fragment(FragmentKind::While, 2, "while True");
        loop_item.suite = vec![fragment(FragmentKind::Break, 3, "")];
        loop_item.leading_comment = Some(Comment {
            text: "spin".to_string(),
            range: SourceRange::line(1),
        });
        let layout = run(&module(vec![
            loop_item,
            if_statement(
                vec![fragment(FragmentKind::Return, 5, "1")],
                Some(vec![fragment(FragmentKind::CodeBlock, 7, "x = 2")]),
            ),
        ]));
        for cell in layout.grid.cells() {
            assert!(cell.width >= cell.min_width, "{}", cell.kind.name());
            assert!(cell.height >= cell.min_height, "{}", cell.kind.name());
        }
        assert!(layout.width > 0.0 && layout.height > 0.0);
    }

    #[test]
    fn layout_is_deterministic() {
        let input = module(vec![
            fragment(FragmentKind::Import, 1, "import os"),
            if_statement(
                vec![fragment(FragmentKind::CodeBlock, 2, "a()")],
                Some(vec![fragment(FragmentKind::CodeBlock, 4, "b()")]),
            ),
        ]);
        let first = run(&input);
        let second = run(&input);
        let geometry = |layout: &Layout| {
            layout
                .grid
                .cells()
                .map(|cell| (cell.x, cell.y, cell.width, cell.height))
                .collect::<Vec<_>>()
        };
        assert_eq!(geometry(&first), geometry(&second));
        assert_eq!(first.connectors.len(), second.connectors.len());
    }

    #[test]
    fn terminal_branch_without_else_does_not_merge() {
        let layout = run(&module(vec![if_statement(
            vec![fragment(FragmentKind::Return, 2, "")],
            None,
        )]));
        assert_eq!(merges(&layout), 0);

        let layout = run(&module(vec![if_statement(
            vec![fragment(FragmentKind::CodeBlock, 2, "a()")],
            Some(vec![fragment(FragmentKind::CodeBlock, 4, "b()")]),
        )]));
        assert_eq!(merges(&layout), 1);
    }

    #[test]
    fn function_rows_follow_header_comment_and_statement() {
        let mut function = fragment(FragmentKind::Function, 1, "def f()");
        let mut ret = fragment(FragmentKind::Return, 3, "1");
        ret.leading_comment = Some(Comment {
            text: "answer".to_string(),
            range: SourceRange::line(2),
        });
        function.suite = vec![ret];
        let layout = run(&module(vec![function]));
        let file = layout.grid.cell(Grid::ROOT, 1, 1).unwrap().nested_canvas().unwrap();
        let body = layout.grid.cell(file, 2, 1).unwrap().nested_canvas().unwrap();
        let rows: Vec<Vec<String>> = layout
            .grid
            .canvas(body)
            .unwrap()
            .rows
            .iter()
            .map(|cells| cells.iter().map(|cell| cell.kind.name()).collect())
            .collect();
        assert_eq!(
            rows,
            vec![
                vec!["function-scope-top-left"],
                vec!["scope-side-edge", "function-scope-declaration"],
                vec!["scope-side-edge", "v-spacer"],
                vec!["scope-side-edge", "connector", "leading-comment"],
                vec!["scope-side-edge", "return"],
                vec!["scope-corner"],
            ]
        );
    }

    #[test]
    fn open_group_gets_spacers_and_a_frame() {
        let layout = run(&module(vec![
            marker(1, "# cml 1 gb id=g title=\"Setup\""),
            fragment(FragmentKind::CodeBlock, 2, "x = 1"),
            marker(3, "# cml 1 ge id=g"),
        ]));
        assert!(layout.warnings.is_empty());
        assert_eq!(layout.groups.len(), 1);
        let frame = &layout.groups[0];
        assert_eq!(frame.title.as_deref(), Some("Setup"));
        assert!(frame.width > 0.0 && frame.height > 0.0);
        assert!(layout
            .grid
            .cells()
            .any(|cell| matches!(cell.kind, CellKind::HGroupSpacer { count: 1 })));
    }

    #[test]
    fn collapsed_group_reports_no_frame() {
        let collapsed: BTreeSet<String> = ["g".to_string()].into_iter().collect();
        let layout = run_with(
            &module(vec![
                marker(1, "# cml 1 gb id=g"),
                fragment(FragmentKind::CodeBlock, 2, "x = 1"),
                marker(3, "# cml 1 ge id=g"),
            ]),
            &LayoutConfig::default(),
            &collapsed,
        );
        assert!(layout.groups.is_empty());
        assert!(layout
            .grid
            .cells()
            .any(|cell| cell.kind.name() == "collapsed-group"));
    }

    #[test]
    fn sibling_groups_with_one_id_resolve_independently() {
        let layout = run(&module(vec![
            marker(1, "# cml 1 gb id=g"),
            marker(2, "# cml 1 ge id=g"),
            marker(3, "# cml 1 gb id=g"),
            marker(4, "# cml 1 ge id=g"),
        ]));
        assert!(layout.warnings.is_empty());
        let empty = layout
            .grid
            .cells()
            .filter(|cell| cell.kind.name() == "empty-group")
            .count();
        assert_eq!(empty, 2);
    }

    #[test]
    fn defects_become_warnings() {
        let mut block = fragment(FragmentKind::CodeBlock, 3, "x = 1");
        block.leading_annotations.push(AnnotationSource::Text {
            line: 2,
            column: 1,
            text: "# cml 1 zz".to_string(),
        });
        let layout = run(&module(vec![marker(1, "# cml 1 gb id=open"), block]));
        assert_eq!(layout.warnings.len(), 2);
        assert_eq!(layout.warnings[0].line, 1);
        assert!(layout.warnings[1].message.contains("not supported"));
    }

    #[test]
    fn no_comment_toggle_drops_comment_rows() {
        let mut item = fragment(FragmentKind::CodeBlock, 2, "x = 1");
        item.leading_comment = Some(Comment {
            text: "note".to_string(),
            range: SourceRange::line(1),
        });
        let config = LayoutConfig {
            flow: FlowToggles {
                no_comment: true,
                ..FlowToggles::default()
            },
            ..LayoutConfig::default()
        };
        let layout = run_with(&module(vec![item]), &config, &BTreeSet::new());
        assert!(!layout.grid.cells().any(|cell| cell.is_comment_like()));
    }

    #[test]
    fn try_region_covers_excepts_and_else_sits_below() {
        let mut item = fragment(FragmentKind::Try, 1, "");
        item.suite = vec![fragment(FragmentKind::CodeBlock, 2, "a()")];
        let mut handler = fragment(FragmentKind::Except, 3, "except ValueError");
        handler.suite = vec![fragment(FragmentKind::CodeBlock, 4, "b()")];
        item.except_parts = vec![handler];
        let mut other = fragment(FragmentKind::Else, 5, "");
        other.suite = vec![fragment(FragmentKind::CodeBlock, 6, "c()")];
        item.else_part = Some(Box::new(other));
        let layout = run(&module(vec![item]));
        let file = layout.grid.cell(Grid::ROOT, 1, 1).unwrap().nested_canvas().unwrap();
        let canvas = layout.grid.canvas(file).unwrap();
        assert_eq!(canvas.dependent_regions, vec![(2, 2)]);
        let else_canvas = canvas.rows[3][1].nested_canvas().unwrap();
        assert!(matches!(
            layout.grid.cell(else_canvas, 0, 0).unwrap().kind,
            CellKind::Scope { leader: Some(1), .. }
        ));
        let badges: Vec<&str> = layout.badges.iter().map(|badge| badge.text.as_str()).collect();
        assert_eq!(badges, vec!["try", "else"]);
    }
}

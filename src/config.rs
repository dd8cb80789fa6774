use crate::theme::Theme;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Which constructs appear in the diagram. `no_*` drops a construct (a
/// statement leaves a connector behind), `hide_*` keeps it in a reduced form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowToggles {
    pub no_block: bool,
    pub no_import: bool,
    pub no_break: bool,
    pub no_continue: bool,
    pub no_return: bool,
    pub no_raise: bool,
    pub no_assert: bool,
    pub no_sys_exit: bool,
    pub no_if: bool,
    pub no_for: bool,
    pub no_while: bool,
    pub no_try: bool,
    pub no_with: bool,
    pub no_comment: bool,
    pub no_docstring: bool,
    pub no_decor: bool,
    pub no_group: bool,
    pub hide_comments: bool,
    pub hide_docstrings: bool,
    pub hide_decors: bool,
    pub hide_excepts: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    pub h_cell_padding: f32,
    pub v_cell_padding: f32,
    pub h_text_padding: f32,
    pub v_text_padding: f32,
    pub h_header_padding: f32,
    pub v_header_padding: f32,
    pub v_spacer: f32,
    pub min_width: f32,
    pub main_line: f32,
    pub if_width: f32,
    pub return_rect_radius: f32,
    pub scope_rect_radius: f32,
    pub open_group_h_spacer: f32,
    pub open_group_v_spacer: f32,
    pub badge_h_spacing: f32,
    pub badge_v_spacing: f32,
    pub group_marker_shift: f32,
    pub icon_width: f32,
    pub line_width: f32,
    pub mono_font_family: String,
    pub mono_font_size: f32,
    pub badge_font_family: String,
    pub badge_font_size: f32,
    pub line_height: f32,
    pub fast_text_metrics: bool,
    pub flow: FlowToggles,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            h_cell_padding: 6.0,
            v_cell_padding: 4.0,
            h_text_padding: 4.0,
            v_text_padding: 4.0,
            h_header_padding: 4.0,
            v_header_padding: 4.0,
            v_spacer: 8.0,
            min_width: 100.0,
            main_line: 25.0,
            if_width: 10.0,
            return_rect_radius: 12.0,
            scope_rect_radius: 4.0,
            open_group_h_spacer: 3.0,
            open_group_v_spacer: 3.0,
            badge_h_spacing: 2.0,
            badge_v_spacing: 1.0,
            group_marker_shift: 4.0,
            icon_width: 16.0,
            line_width: 1.0,
            mono_font_family: "monospace".to_string(),
            mono_font_size: 12.0,
            badge_font_family: "sans-serif".to_string(),
            badge_font_size: 9.0,
            line_height: 1.25,
            fast_text_metrics: false,
            flow: FlowToggles::default(),
        }
    }
}

impl LayoutConfig {
    /// Horizontal room one open group level takes on each side.
    pub fn group_shift(&self, levels: usize) -> f32 {
        levels as f32 * 2.0 * self.open_group_h_spacer
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub theme: Theme,
    pub layout: LayoutConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            theme: Theme::classic(),
            layout: LayoutConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    theme: Option<String>,
    skin: Option<SkinFile>,
    flow: Option<FlowFile>,
    colors: Option<ColorsFile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SkinFile {
    h_cell_padding: Option<f32>,
    v_cell_padding: Option<f32>,
    h_text_padding: Option<f32>,
    v_text_padding: Option<f32>,
    h_header_padding: Option<f32>,
    v_header_padding: Option<f32>,
    v_spacer: Option<f32>,
    min_width: Option<f32>,
    main_line: Option<f32>,
    if_width: Option<f32>,
    return_rect_radius: Option<f32>,
    scope_rect_radius: Option<f32>,
    open_group_h_spacer: Option<f32>,
    open_group_v_spacer: Option<f32>,
    badge_h_spacing: Option<f32>,
    badge_v_spacing: Option<f32>,
    group_marker_shift: Option<f32>,
    icon_width: Option<f32>,
    line_width: Option<f32>,
    mono_font_family: Option<String>,
    mono_font_size: Option<f32>,
    badge_font_family: Option<String>,
    badge_font_size: Option<f32>,
    line_height: Option<f32>,
    fast_text_metrics: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FlowFile {
    no_block: Option<bool>,
    no_import: Option<bool>,
    no_break: Option<bool>,
    no_continue: Option<bool>,
    no_return: Option<bool>,
    no_raise: Option<bool>,
    no_assert: Option<bool>,
    no_sys_exit: Option<bool>,
    no_if: Option<bool>,
    no_for: Option<bool>,
    no_while: Option<bool>,
    no_try: Option<bool>,
    no_with: Option<bool>,
    no_comment: Option<bool>,
    no_docstring: Option<bool>,
    no_decor: Option<bool>,
    no_group: Option<bool>,
    hide_comments: Option<bool>,
    hide_docstrings: Option<bool>,
    hide_decors: Option<bool>,
    hide_excepts: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ColorsFile {
    background: Option<String>,
    line_color: Option<String>,
    box_background: Option<String>,
    box_foreground: Option<String>,
    badge_background: Option<String>,
    badge_foreground: Option<String>,
    comment_background: Option<String>,
    comment_foreground: Option<String>,
    comment_line_color: Option<String>,
    doc_link_background: Option<String>,
    doc_link_foreground: Option<String>,
    file_scope_background: Option<String>,
    function_scope_background: Option<String>,
    class_scope_background: Option<String>,
    decorator_scope_background: Option<String>,
    for_scope_background: Option<String>,
    while_scope_background: Option<String>,
    else_scope_background: Option<String>,
    with_scope_background: Option<String>,
    try_scope_background: Option<String>,
    except_scope_background: Option<String>,
    finally_scope_background: Option<String>,
    break_background: Option<String>,
    continue_background: Option<String>,
    if_background: Option<String>,
    return_background: Option<String>,
    raise_background: Option<String>,
    assert_background: Option<String>,
    sys_exit_background: Option<String>,
    import_background: Option<String>,
    group_background: Option<String>,
    group_border: Option<String>,
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let contents = std::fs::read_to_string(path)?;
    parse_config(&contents)
}

pub fn parse_config(contents: &str) -> anyhow::Result<Config> {
    let parsed: ConfigFile = serde_json::from_str(contents)?;
    apply_file(Config::default(), parsed)
}

/// Applies overrides carried next to the fragment tree on top of `config`.
pub fn merge_config(config: Config, overrides: serde_json::Value) -> anyhow::Result<Config> {
    let parsed: ConfigFile = serde_json::from_value(overrides)?;
    apply_file(config, parsed)
}

fn apply_file(mut config: Config, parsed: ConfigFile) -> anyhow::Result<Config> {
    if let Some(theme_name) = parsed.theme.as_deref() {
        match theme_name {
            "classic" | "default" => config.theme = Theme::classic(),
            "monochrome" | "mono" => config.theme = Theme::monochrome(),
            other => anyhow::bail!("unknown theme '{other}'"),
        }
    }

    if let Some(skin) = parsed.skin {
        apply_skin(&mut config.layout, skin);
    }
    if let Some(flow) = parsed.flow {
        apply_flow(&mut config.layout.flow, flow);
    }
    if let Some(colors) = parsed.colors {
        apply_colors(&mut config.theme, colors);
    }
    tracing::debug!(
        main_line = config.layout.main_line,
        font = %config.layout.mono_font_family,
        "configuration loaded"
    );
    Ok(config)
}

fn apply_skin(layout: &mut LayoutConfig, skin: SkinFile) {
    if let Some(v) = skin.h_cell_padding {
        layout.h_cell_padding = v;
    }
    if let Some(v) = skin.v_cell_padding {
        layout.v_cell_padding = v;
    }
    if let Some(v) = skin.h_text_padding {
        layout.h_text_padding = v;
    }
    if let Some(v) = skin.v_text_padding {
        layout.v_text_padding = v;
    }
    if let Some(v) = skin.h_header_padding {
        layout.h_header_padding = v;
    }
    if let Some(v) = skin.v_header_padding {
        layout.v_header_padding = v;
    }
    if let Some(v) = skin.v_spacer {
        layout.v_spacer = v;
    }
    if let Some(v) = skin.min_width {
        layout.min_width = v;
    }
    if let Some(v) = skin.main_line {
        layout.main_line = v;
    }
    if let Some(v) = skin.if_width {
        layout.if_width = v;
    }
    if let Some(v) = skin.return_rect_radius {
        layout.return_rect_radius = v;
    }
    if let Some(v) = skin.scope_rect_radius {
        layout.scope_rect_radius = v;
    }
    if let Some(v) = skin.open_group_h_spacer {
        layout.open_group_h_spacer = v;
    }
    if let Some(v) = skin.open_group_v_spacer {
        layout.open_group_v_spacer = v;
    }
    if let Some(v) = skin.badge_h_spacing {
        layout.badge_h_spacing = v;
    }
    if let Some(v) = skin.badge_v_spacing {
        layout.badge_v_spacing = v;
    }
    if let Some(v) = skin.group_marker_shift {
        layout.group_marker_shift = v;
    }
    if let Some(v) = skin.icon_width {
        layout.icon_width = v;
    }
    if let Some(v) = skin.line_width {
        layout.line_width = v;
    }
    if let Some(v) = skin.mono_font_family {
        layout.mono_font_family = v;
    }
    if let Some(v) = skin.mono_font_size {
        layout.mono_font_size = v;
    }
    if let Some(v) = skin.badge_font_family {
        layout.badge_font_family = v;
    }
    if let Some(v) = skin.badge_font_size {
        layout.badge_font_size = v;
    }
    if let Some(v) = skin.line_height {
        layout.line_height = v;
    }
    if let Some(v) = skin.fast_text_metrics {
        layout.fast_text_metrics = v;
    }
}

fn apply_flow(flow: &mut FlowToggles, file: FlowFile) {
    let pairs = [
        (&mut flow.no_block, file.no_block),
        (&mut flow.no_import, file.no_import),
        (&mut flow.no_break, file.no_break),
        (&mut flow.no_continue, file.no_continue),
        (&mut flow.no_return, file.no_return),
        (&mut flow.no_raise, file.no_raise),
        (&mut flow.no_assert, file.no_assert),
        (&mut flow.no_sys_exit, file.no_sys_exit),
        (&mut flow.no_if, file.no_if),
        (&mut flow.no_for, file.no_for),
        (&mut flow.no_while, file.no_while),
        (&mut flow.no_try, file.no_try),
        (&mut flow.no_with, file.no_with),
        (&mut flow.no_comment, file.no_comment),
        (&mut flow.no_docstring, file.no_docstring),
        (&mut flow.no_decor, file.no_decor),
        (&mut flow.no_group, file.no_group),
        (&mut flow.hide_comments, file.hide_comments),
        (&mut flow.hide_docstrings, file.hide_docstrings),
        (&mut flow.hide_decors, file.hide_decors),
        (&mut flow.hide_excepts, file.hide_excepts),
    ];
    for (slot, value) in pairs {
        if let Some(v) = value {
            *slot = v;
        }
    }
}

fn apply_colors(theme: &mut Theme, file: ColorsFile) {
    let pairs = [
        (&mut theme.background, file.background),
        (&mut theme.line_color, file.line_color),
        (&mut theme.box_background, file.box_background),
        (&mut theme.box_foreground, file.box_foreground),
        (&mut theme.badge_background, file.badge_background),
        (&mut theme.badge_foreground, file.badge_foreground),
        (&mut theme.comment_background, file.comment_background),
        (&mut theme.comment_foreground, file.comment_foreground),
        (&mut theme.comment_line_color, file.comment_line_color),
        (&mut theme.doc_link_background, file.doc_link_background),
        (&mut theme.doc_link_foreground, file.doc_link_foreground),
        (&mut theme.file_scope_background, file.file_scope_background),
        (
            &mut theme.function_scope_background,
            file.function_scope_background,
        ),
        (&mut theme.class_scope_background, file.class_scope_background),
        (
            &mut theme.decorator_scope_background,
            file.decorator_scope_background,
        ),
        (&mut theme.for_scope_background, file.for_scope_background),
        (&mut theme.while_scope_background, file.while_scope_background),
        (&mut theme.else_scope_background, file.else_scope_background),
        (&mut theme.with_scope_background, file.with_scope_background),
        (&mut theme.try_scope_background, file.try_scope_background),
        (&mut theme.except_scope_background, file.except_scope_background),
        (
            &mut theme.finally_scope_background,
            file.finally_scope_background,
        ),
        (&mut theme.break_background, file.break_background),
        (&mut theme.continue_background, file.continue_background),
        (&mut theme.if_background, file.if_background),
        (&mut theme.return_background, file.return_background),
        (&mut theme.raise_background, file.raise_background),
        (&mut theme.assert_background, file.assert_background),
        (&mut theme.sys_exit_background, file.sys_exit_background),
        (&mut theme.import_background, file.import_background),
        (&mut theme.group_background, file.group_background),
        (&mut theme.group_border, file.group_border),
    ];
    for (slot, value) in pairs {
        if let Some(v) = value {
            *slot = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_path_gives_defaults() {
        let config = load_config(None).unwrap();
        assert_eq!(config.layout.main_line, 25.0);
        assert_eq!(config.theme.if_background, "#ffe57f");
        assert_eq!(config.layout.flow, FlowToggles::default());
    }

    #[test]
    fn overrides_are_applied_field_by_field() {
        let config = parse_config(
            r##"{
                "theme": "monochrome",
                "skin": {"hCellPadding": 10, "monoFontSize": 14},
                "flow": {"hideComments": true, "noReturn": true},
                "colors": {"ifBackground": "#123456"}
            }"##,
        )
        .unwrap();
        assert_eq!(config.layout.h_cell_padding, 10.0);
        assert_eq!(config.layout.v_cell_padding, 4.0);
        assert_eq!(config.layout.mono_font_size, 14.0);
        assert!(config.layout.flow.hide_comments);
        assert!(config.layout.flow.no_return);
        assert!(!config.layout.flow.no_break);
        assert_eq!(config.theme.if_background, "#123456");
        assert_eq!(config.theme.group_border, Theme::monochrome().group_border);
    }

    #[test]
    fn merged_overrides_keep_earlier_settings() {
        let base = parse_config(r#"{"skin": {"mainLine": 30}}"#).unwrap();
        let merged =
            merge_config(base, serde_json::json!({"flow": {"noImport": true}})).unwrap();
        assert_eq!(merged.layout.main_line, 30.0);
        assert!(merged.layout.flow.no_import);
    }

    #[test]
    fn paint_only_skin_keys_are_ignored() {
        let config = parse_config(
            r#"{"skin": {"decorMainLine": 9, "commentCorner": 2, "hSpacer": 40, "vSpacer": 12}}"#,
        )
        .unwrap();
        assert_eq!(config.layout.v_spacer, 12.0);
        assert_eq!(config.layout.main_line, LayoutConfig::default().main_line);
    }

    #[test]
    fn unknown_theme_is_rejected() {
        assert!(parse_config(r#"{"theme": "neon"}"#).is_err());
    }
}

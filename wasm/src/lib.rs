use std::collections::BTreeSet;

use flowgrid::config::Config;
use flowgrid::layout_with_config;
use flowgrid::theme::Theme;
use serde::Deserialize;
use wasm_bindgen::prelude::*;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FlowgridLayoutOptions {
    theme: Option<String>,
    font_size: Option<f32>,
    fast_text: Option<bool>,
    hide_comments: Option<bool>,
    #[serde(default)]
    collapsed: Vec<String>,
}

fn build_config(options: &FlowgridLayoutOptions) -> Config {
    let mut config = Config::default();
    if matches!(options.theme.as_deref(), Some("monochrome" | "mono")) {
        config.theme = Theme::monochrome();
    }
    if let Some(font_size) = options.font_size {
        config.layout.mono_font_size = font_size;
    }
    // No font files in the browser sandbox unless asked for.
    config.layout.fast_text_metrics = options.fast_text.unwrap_or(true);
    if let Some(hide) = options.hide_comments {
        config.layout.flow.hide_comments = hide;
    }
    config
}

fn layout_json(tree: &str, options: FlowgridLayoutOptions) -> anyhow::Result<String> {
    let config = build_config(&options);
    let collapsed: BTreeSet<String> = options.collapsed.into_iter().collect();
    let dump = layout_with_config(tree, config, &collapsed)?;
    Ok(serde_json::to_string(&dump)?)
}

#[wasm_bindgen]
pub fn layout_fragment_json(tree: &str, options_json: Option<String>) -> Result<String, JsValue> {
    let options = if let Some(raw_options) = options_json {
        serde_json::from_str::<FlowgridLayoutOptions>(&raw_options)
            .map_err(|error| JsValue::from_str(&error.to_string()))?
    } else {
        FlowgridLayoutOptions::default()
    };

    layout_json(tree, options).map_err(|error| JsValue::from_str(&format!("{error:#}")))
}

#[cfg(test)]
mod tests {
    use crate::{FlowgridLayoutOptions, layout_json};

    #[test]
    fn lays_out_a_loop_with_a_collapsed_group() {
        let tree = r#"{
            kind: 'module',
            suite: [
                {kind: 'annotation', range: {beginLine: 1}, leadingAnnotations: [{line: 1, text: '# cml 1 gb id=init'}]},
                {kind: 'code-block', text: 'x = 0', range: {beginLine: 2}},
                {kind: 'annotation', range: {beginLine: 3}, leadingAnnotations: [{line: 3, text: '# cml 1 ge id=init'}]},
                {kind: 'while', text: 'x < 10', range: {beginLine: 4}, suite: [
                    {kind: 'code-block', text: 'x += 1', range: {beginLine: 5}},
                ]},
            ],
        }"#;
        let options = FlowgridLayoutOptions {
            collapsed: vec!["init".to_string()],
            ..FlowgridLayoutOptions::default()
        };

        let json = layout_json(tree, options).expect("loop with a group should lay out");

        assert!(json.contains("\"collapsed-group\""));
        assert!(json.contains("x += 1"));
        assert!(json.contains("\"warnings\":[]"));
    }
}

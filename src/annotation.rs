//! Structured annotation comments (`# cml <version> <code> key=value ...`).
//!
//! Annotations tweak the diagram without touching the program: custom colors
//! (`cc`), branch switching for `if` (`sw`), replacement text (`rt`), group
//! begin/end markers (`gb`/`ge`) and documentation links (`doc`).

use std::collections::BTreeMap;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::ir::{AnnotationSource, Docstring, Fragment, FragmentKind};

/// Highest annotation version this engine understands.
pub const CML_VERSION: u32 = 1;

static HEADER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#\s*cml\s+(\d+)\s+([A-Za-z]+)(.*)$").unwrap());
static CONTINUATION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#\s*cml\+(.*)$").unwrap());
static PROPERTY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([A-Za-z_][A-Za-z0-9_]*)\s*=\s*("(?:[^"\\]|\\.)*"|[^\s"]+)"#).unwrap()
});

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnnotationError {
    #[error("malformed annotation comment '{text}'")]
    Malformed { text: String },
    #[error("the CML comment version {version} is not supported, max supported version is 1")]
    UnsupportedVersion { version: u32 },
    #[error("CML comment type '{code}' is not supported")]
    UnknownType { code: String },
    #[error("the '{code}' comment supplies no background, foreground or border color")]
    MissingColor { code: String },
    #[error("invalid color format '{input}'")]
    InvalidColor { input: String },
    #[error("the 'rt' comment does not supply text")]
    MissingText,
    #[error("the '{code}' comment does not supply a group id")]
    MissingGroupId { code: String },
    #[error("the 'doc' comment supplies neither a link nor an anchor")]
    MissingDocTarget,
}

/// A recoverable problem found while reading annotations or matching groups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl Warning {
    pub fn new(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            column,
            message: message.into(),
        }
    }

    pub(crate) fn for_annotation(line: usize, column: usize, err: &AnnotationError) -> Self {
        let message = match err {
            AnnotationError::UnknownType { .. } => err.to_string(),
            _ => format!("Invalid CML comment: {err}"),
        };
        Self::new(line, column, message)
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.line, self.column, self.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Accepts `#rrggbb`, `#rrggbbaa`, `r,g,b` and `r,g,b,a`.
    pub fn parse(input: &str) -> Result<Self, AnnotationError> {
        let invalid = || AnnotationError::InvalidColor {
            input: input.to_string(),
        };
        let input = input.trim();
        if let Some(hex) = input.strip_prefix('#') {
            if !matches!(hex.len(), 6 | 8) || !hex.is_ascii() {
                return Err(invalid());
            }
            let channel = |idx: usize| u8::from_str_radix(&hex[idx..idx + 2], 16);
            let r = channel(0).map_err(|_| invalid())?;
            let g = channel(2).map_err(|_| invalid())?;
            let b = channel(4).map_err(|_| invalid())?;
            let a = if hex.len() == 8 {
                channel(6).map_err(|_| invalid())?
            } else {
                255
            };
            return Ok(Self { r, g, b, a });
        }

        let parts: Vec<&str> = input.split(',').map(str::trim).collect();
        if !matches!(parts.len(), 3 | 4) {
            return Err(invalid());
        }
        let mut channels = [255u8; 4];
        for (slot, part) in channels.iter_mut().zip(&parts) {
            *slot = part.parse::<u8>().map_err(|_| invalid())?;
        }
        Ok(Self {
            r: channels[0],
            g: channels[1],
            b: channels[2],
            a: channels[3],
        })
    }

    pub fn to_hex(&self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Optional color overrides of a single item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Colors {
    pub background: Option<Color>,
    pub foreground: Option<Color>,
    pub border: Option<Color>,
}

impl Colors {
    pub fn is_empty(&self) -> bool {
        self.background.is_none() && self.foreground.is_none() && self.border.is_none()
    }

    fn from_properties(properties: &BTreeMap<String, String>) -> Result<Self, AnnotationError> {
        let pick = |keys: &[&str]| -> Result<Option<Color>, AnnotationError> {
            keys.iter()
                .find_map(|key| properties.get(*key))
                .map(|value| Color::parse(strip_quotes(value)))
                .transpose()
        };
        Ok(Self {
            background: pick(&["background", "bg"])?,
            foreground: pick(&["foreground", "fg"])?,
            border: pick(&["border", "brd"])?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocLink {
    pub link: Option<String>,
    pub anchor: Option<String>,
    pub title: Option<String>,
    pub colors: Colors,
}

impl DocLink {
    pub fn display_text(&self) -> &str {
        self.title
            .as_deref()
            .or(self.link.as_deref())
            .or(self.anchor.as_deref())
            .unwrap_or("doc")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "code", rename_all = "camelCase")]
pub enum Annotation {
    SwitchBranches,
    CustomColors(Colors),
    ReplaceText { text: String },
    GroupBegin {
        id: String,
        title: Option<String>,
        colors: Colors,
    },
    GroupEnd { id: String },
    Doc(DocLink),
}

impl Annotation {
    pub fn from_source(source: &AnnotationSource) -> Result<Self, AnnotationError> {
        let record = RawRecord::from_source(source)?;
        Self::from_record(&record)
    }

    fn from_record(record: &RawRecord) -> Result<Self, AnnotationError> {
        if record.version > CML_VERSION {
            return Err(AnnotationError::UnsupportedVersion {
                version: record.version,
            });
        }
        let props = &record.properties;
        match record.code.as_str() {
            "sw" => Ok(Self::SwitchBranches),
            "cc" => {
                let colors = Colors::from_properties(props)?;
                if colors.is_empty() {
                    return Err(AnnotationError::MissingColor {
                        code: record.code.clone(),
                    });
                }
                Ok(Self::CustomColors(colors))
            }
            "rt" => {
                let text = props
                    .get("text")
                    .map(|value| unescape_text(strip_quotes(value)))
                    .ok_or(AnnotationError::MissingText)?;
                Ok(Self::ReplaceText { text })
            }
            "gb" => Ok(Self::GroupBegin {
                id: group_id(record)?,
                title: props.get("title").map(|value| unescape_text(strip_quotes(value))),
                colors: Colors::from_properties(props)?,
            }),
            "ge" => Ok(Self::GroupEnd {
                id: group_id(record)?,
            }),
            "doc" => {
                let value = |key: &str| props.get(key).map(|v| unescape_text(strip_quotes(v)));
                let doc = DocLink {
                    link: value("link"),
                    anchor: value("anchor"),
                    title: value("title"),
                    colors: Colors::from_properties(props)?,
                };
                if doc.link.is_none() && doc.anchor.is_none() {
                    return Err(AnnotationError::MissingDocTarget);
                }
                Ok(Self::Doc(doc))
            }
            other => Err(AnnotationError::UnknownType {
                code: other.to_string(),
            }),
        }
    }

    pub fn is_group_marker(&self) -> bool {
        matches!(self, Self::GroupBegin { .. } | Self::GroupEnd { .. })
    }
}

fn group_id(record: &RawRecord) -> Result<String, AnnotationError> {
    let id = record
        .properties
        .get("id")
        .map(|value| unescape_text(strip_quotes(value)))
        .unwrap_or_default();
    if id.trim().is_empty() {
        return Err(AnnotationError::MissingGroupId {
            code: record.code.clone(),
        });
    }
    Ok(id)
}

/// Annotation split into its parts but not interpreted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    pub version: u32,
    pub code: String,
    pub properties: BTreeMap<String, String>,
}

impl RawRecord {
    pub fn from_source(source: &AnnotationSource) -> Result<Self, AnnotationError> {
        match source {
            AnnotationSource::Text { text, .. } => Self::parse(text),
            AnnotationSource::Record {
                code,
                version,
                properties,
                ..
            } => Ok(Self {
                version: *version,
                code: code.clone(),
                properties: properties.clone(),
            }),
        }
    }

    /// Parses the comment text. Lines after the first one must be `# cml+`
    /// continuations carrying more properties.
    pub fn parse(text: &str) -> Result<Self, AnnotationError> {
        let malformed = || AnnotationError::Malformed {
            text: text.trim().to_string(),
        };
        let mut lines = text.lines().map(str::trim).filter(|line| !line.is_empty());
        let first = lines.next().ok_or_else(malformed)?;
        let caps = HEADER_RE.captures(first).ok_or_else(malformed)?;
        let version = caps[1].parse::<u32>().map_err(|_| malformed())?;
        let code = caps[2].to_string();

        let mut properties = BTreeMap::new();
        collect_properties(&caps[3], &mut properties);
        for line in lines {
            let caps = CONTINUATION_RE.captures(line).ok_or_else(malformed)?;
            collect_properties(&caps[1], &mut properties);
        }
        Ok(Self {
            version,
            code,
            properties,
        })
    }
}

fn collect_properties(src: &str, properties: &mut BTreeMap<String, String>) {
    for caps in PROPERTY_RE.captures_iter(src) {
        properties.insert(caps[1].to_string(), caps[2].to_string());
    }
}

fn strip_quotes(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(value)
}

/// Escapes a value so it can be written back as a quoted property.
pub fn escape_text(src: &str) -> String {
    let mut out = String::with_capacity(src.len());
    for ch in src.chars() {
        match ch {
            '\n' => out.push_str("\\n"),
            '"' | '\\' => {
                out.push('\\');
                out.push(ch);
            }
            _ => out.push(ch),
        }
    }
    out
}

/// Reverses [`escape_text`]. Unknown escapes keep the backslash.
pub fn unescape_text(src: &str) -> String {
    let mut out = String::with_capacity(src.len());
    let mut chars = src.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.peek() {
            Some('\\') => {
                out.push('\\');
                chars.next();
            }
            Some('n') => {
                out.push('\n');
                chars.next();
            }
            Some('"') => {
                out.push('"');
                chars.next();
            }
            _ => out.push('\\'),
        }
    }
    out
}

/// The valid annotations of one item, reduced to what the layout needs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemAnnotations {
    pub switch_branches: bool,
    pub colors: Colors,
    pub replacement: Option<String>,
    pub doc: Option<(usize, DocLink)>,
}

impl ItemAnnotations {
    /// Invalid records are skipped silently; they are reported by
    /// [`validate_tree`].
    pub fn resolve<'a>(sources: impl IntoIterator<Item = &'a AnnotationSource>) -> Self {
        let mut resolved = Self::default();
        for source in sources {
            match Annotation::from_source(source) {
                Ok(Annotation::SwitchBranches) => resolved.switch_branches = true,
                Ok(Annotation::CustomColors(colors)) => resolved.colors = colors,
                Ok(Annotation::ReplaceText { text }) => resolved.replacement = Some(text),
                Ok(Annotation::Doc(doc)) => {
                    if resolved.doc.is_none() {
                        resolved.doc = Some((source.position().0, doc));
                    }
                }
                Ok(_) | Err(_) => {}
            }
        }
        resolved
    }
}

/// A group marker found among an item's annotations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupMarker {
    pub line: usize,
    pub column: usize,
    pub begin: bool,
    pub id: String,
    pub title: Option<String>,
    pub colors: Colors,
}

impl GroupMarker {
    pub fn key(&self) -> (usize, usize) {
        (self.line, self.column)
    }
}

pub fn group_markers(sources: &[AnnotationSource]) -> Vec<GroupMarker> {
    let mut markers = Vec::new();
    for source in sources {
        let (line, column) = source.position();
        match Annotation::from_source(source) {
            Ok(Annotation::GroupBegin { id, title, colors }) => markers.push(GroupMarker {
                line,
                column,
                begin: true,
                id,
                title,
                colors,
            }),
            Ok(Annotation::GroupEnd { id }) => markers.push(GroupMarker {
                line,
                column,
                begin: false,
                id,
                title: None,
                colors: Colors::default(),
            }),
            _ => {}
        }
    }
    markers
}

/// Checks every annotation reachable from `fragment`.
pub fn validate_tree(fragment: &Fragment) -> Vec<Warning> {
    let mut warnings = Vec::new();
    validate_fragment(fragment, &mut warnings);
    warnings
}

fn validate_fragment(item: &Fragment, warnings: &mut Vec<Warning>) {
    validate_list(&item.leading_annotations, warnings);
    for decorator in &item.decorators {
        validate_fragment(decorator, warnings);
    }
    match item.kind {
        FragmentKind::If => {
            for part in &item.parts {
                validate_fragment(part, warnings);
            }
        }
        FragmentKind::For | FragmentKind::While => {
            if let Some(part) = &item.else_part {
                validate_fragment(part, warnings);
            }
        }
        FragmentKind::Try => {
            if let Some(part) = &item.else_part {
                validate_fragment(part, warnings);
            }
            if let Some(part) = &item.finally_part {
                validate_fragment(part, warnings);
            }
            for part in &item.except_parts {
                validate_fragment(part, warnings);
            }
        }
        _ => {}
    }
    if let Some(Docstring {
        leading_annotations,
        side_annotations,
        ..
    }) = &item.docstring
    {
        validate_list(leading_annotations, warnings);
        validate_list(side_annotations, warnings);
    }
    validate_list(&item.side_annotations, warnings);
    for nested in &item.suite {
        validate_fragment(nested, warnings);
    }
}

fn validate_list(sources: &[AnnotationSource], warnings: &mut Vec<Warning>) {
    for source in sources {
        if let Err(err) = Annotation::from_source(source) {
            let (line, column) = source.position();
            tracing::warn!(line, column, error = %err, "dropping annotation comment");
            warnings.push(Warning::for_annotation(line, column, &err));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(line: usize, src: &str) -> AnnotationSource {
        AnnotationSource::Text {
            line,
            column: 1,
            text: src.to_string(),
        }
    }

    #[test]
    fn parses_colors_in_all_formats() {
        assert_eq!(Color::parse("#ff0080").unwrap(), Color::rgb(255, 0, 128));
        assert_eq!(Color::parse("#ff008040").unwrap().a, 0x40);
        assert_eq!(Color::parse("0, 230,0").unwrap(), Color::rgb(0, 230, 0));
        assert_eq!(Color::parse("1,2,3,4").unwrap().a, 4);
        assert!(Color::parse("#fff").is_err());
        assert!(Color::parse("256,0,0").is_err());
        assert!(Color::parse("red").is_err());
    }

    #[test]
    fn color_hex_keeps_alpha_only_when_translucent() {
        assert_eq!(Color::rgb(1, 2, 3).to_hex(), "#010203");
        assert_eq!(Color::parse("#01020304").unwrap().to_hex(), "#01020304");
    }

    #[test]
    fn reads_custom_colors_with_quoted_values() {
        let ann = Annotation::from_source(&text(
            1,
            r#"# cml 1 cc bg="230,0,0" fg="255,255,255" border=#000000"#,
        ))
        .unwrap();
        let Annotation::CustomColors(colors) = ann else {
            panic!("expected colors");
        };
        assert_eq!(colors.background, Some(Color::rgb(230, 0, 0)));
        assert_eq!(colors.border, Some(Color::rgb(0, 0, 0)));
    }

    #[test]
    fn replacement_text_is_unescaped() {
        let ann = Annotation::from_source(&text(
            1,
            r#"# cml 1 rt text="Quite a \"long\" text\nOn two lines""#,
        ))
        .unwrap();
        assert_eq!(
            ann,
            Annotation::ReplaceText {
                text: "Quite a \"long\" text\nOn two lines".to_string()
            }
        );
    }

    #[test]
    fn escape_then_unescape_is_lossless() {
        let original = "a \"b\"\\c\nd";
        assert_eq!(unescape_text(&escape_text(original)), original);
        assert_eq!(unescape_text(r"\x"), r"\x");
    }

    #[test]
    fn continuation_lines_add_properties() {
        let record = RawRecord::parse("# cml 1 gb id=setup\n# cml+ title=\"Set up\"").unwrap();
        assert_eq!(record.properties.get("id").map(String::as_str), Some("setup"));
        assert_eq!(
            record.properties.get("title").map(String::as_str),
            Some("\"Set up\"")
        );
    }

    #[test]
    fn rejects_newer_versions_and_missing_properties() {
        assert!(matches!(
            Annotation::from_source(&text(1, "# cml 2 sw")),
            Err(AnnotationError::UnsupportedVersion { version: 2 })
        ));
        assert_eq!(
            Annotation::from_source(&text(1, "# cml 1 cc")),
            Err(AnnotationError::MissingColor {
                code: "cc".to_string()
            })
        );
        assert_eq!(
            Annotation::from_source(&text(1, "# cml 1 rt")),
            Err(AnnotationError::MissingText)
        );
        assert!(matches!(
            Annotation::from_source(&text(1, "# cml 1 gb id=\"  \"")),
            Err(AnnotationError::MissingGroupId { .. })
        ));
    }

    #[test]
    fn validation_walks_nested_parts() {
        let mut part = Fragment::new(FragmentKind::IfPart);
        part.leading_annotations.push(text(4, "# cml 1 zz"));
        let mut branch = Fragment::new(FragmentKind::If);
        branch.parts.push(part);
        let mut module = Fragment::new(FragmentKind::Module);
        module.suite.push(branch);
        module.side_annotations.push(text(9, "# cml 1 cc bg=nope"));

        let warnings = validate_tree(&module);
        assert_eq!(warnings.len(), 2);
        assert_eq!(warnings[0].line, 9);
        assert!(warnings[0].message.starts_with("Invalid CML comment: "));
        assert_eq!(warnings[1].message, "CML comment type 'zz' is not supported");
    }

    #[test]
    fn resolve_skips_invalid_records() {
        let resolved = ItemAnnotations::resolve(&[
            text(1, "# cml 1 sw"),
            text(2, "# cml 1 cc"),
            text(3, "# cml 1 rt text=Short"),
        ]);
        assert!(resolved.switch_branches);
        assert!(resolved.colors.is_empty());
        assert_eq!(resolved.replacement.as_deref(), Some("Short"));
    }
}

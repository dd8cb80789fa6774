use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FragmentKind {
    Module,
    Function,
    Class,
    Decorator,
    For,
    While,
    Try,
    Except,
    Else,
    Finally,
    With,
    If,
    IfPart,
    Comment,
    Annotation,
    CodeBlock,
    Break,
    Continue,
    Return,
    Raise,
    Assert,
    SysExit,
    Import,
}

impl FragmentKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Module => "module",
            Self::Function => "function",
            Self::Class => "class",
            Self::Decorator => "decorator",
            Self::For => "for",
            Self::While => "while",
            Self::Try => "try",
            Self::Except => "except",
            Self::Else => "else",
            Self::Finally => "finally",
            Self::With => "with",
            Self::If => "if",
            Self::IfPart => "if-part",
            Self::Comment => "comment",
            Self::Annotation => "annotation",
            Self::CodeBlock => "code-block",
            Self::Break => "break",
            Self::Continue => "continue",
            Self::Return => "return",
            Self::Raise => "raise",
            Self::Assert => "assert",
            Self::SysExit => "sys-exit",
            Self::Import => "import",
        }
    }

    /// Control does not continue to the next sibling after these.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Break | Self::Continue | Self::Return | Self::Raise | Self::SysExit
        )
    }

    pub fn is_scope(self) -> bool {
        matches!(
            self,
            Self::Module
                | Self::Function
                | Self::Class
                | Self::For
                | Self::While
                | Self::Try
                | Self::Except
                | Self::Else
                | Self::Finally
                | Self::With
        )
    }
}

/// One-based lines, one-based columns; `end_*` is inclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SourceRange {
    pub begin_line: usize,
    pub begin_pos: usize,
    pub end_line: usize,
    pub end_pos: usize,
}

impl SourceRange {
    pub fn new(begin_line: usize, begin_pos: usize, end_line: usize, end_pos: usize) -> Self {
        Self {
            begin_line,
            begin_pos,
            end_line,
            end_pos,
        }
    }

    pub fn line(line: usize) -> Self {
        Self::new(line, 1, line, 1)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub text: String,
    #[serde(default)]
    pub range: SourceRange,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Docstring {
    pub text: String,
    #[serde(default)]
    pub range: SourceRange,
    #[serde(default)]
    pub leading_annotations: Vec<AnnotationSource>,
    #[serde(default)]
    pub side_annotations: Vec<AnnotationSource>,
}

/// An annotation comment as handed over by the source parser: either the raw
/// `# cml ...` text or an already split record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnnotationSource {
    Text {
        line: usize,
        #[serde(default = "default_column")]
        column: usize,
        text: String,
    },
    Record {
        line: usize,
        #[serde(default = "default_column")]
        column: usize,
        code: String,
        #[serde(default = "default_version")]
        version: u32,
        #[serde(default)]
        properties: BTreeMap<String, String>,
    },
}

fn default_column() -> usize {
    1
}

fn default_version() -> u32 {
    1
}

impl AnnotationSource {
    pub fn position(&self) -> (usize, usize) {
        match self {
            Self::Text { line, column, .. } | Self::Record { line, column, .. } => {
                (*line, *column)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fragment {
    pub kind: FragmentKind,
    #[serde(default)]
    pub range: SourceRange,
    /// Display text: the code of a block, a condition, a declaration, a
    /// returned value or a decorator.
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub suite: Vec<Fragment>,
    #[serde(default)]
    pub leading_comment: Option<Comment>,
    #[serde(default)]
    pub side_comment: Option<Comment>,
    #[serde(default)]
    pub docstring: Option<Docstring>,
    #[serde(default)]
    pub decorators: Vec<Fragment>,
    /// `if`/`elif` parts of an `if`, optionally closed by an `else` part.
    #[serde(default)]
    pub parts: Vec<Fragment>,
    #[serde(default)]
    pub except_parts: Vec<Fragment>,
    #[serde(default)]
    pub else_part: Option<Box<Fragment>>,
    #[serde(default)]
    pub finally_part: Option<Box<Fragment>>,
    /// Annotation comments above the fragment. A standalone annotation
    /// fragment keeps its own records here.
    #[serde(default, alias = "annotations")]
    pub leading_annotations: Vec<AnnotationSource>,
    #[serde(default)]
    pub side_annotations: Vec<AnnotationSource>,
}

impl Fragment {
    pub fn new(kind: FragmentKind) -> Self {
        Self {
            kind,
            range: SourceRange::default(),
            text: String::new(),
            suite: Vec::new(),
            leading_comment: None,
            side_comment: None,
            docstring: None,
            decorators: Vec::new(),
            parts: Vec::new(),
            except_parts: Vec::new(),
            else_part: None,
            finally_part: None,
            leading_annotations: Vec::new(),
            side_annotations: Vec::new(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.kind.is_terminal()
    }

    /// Annotation comments that may carry group markers for this item. An
    /// `if` takes them from its first part and a decorated definition from
    /// its first decorator.
    pub fn group_annotations(&self) -> &[AnnotationSource] {
        match self.kind {
            FragmentKind::If => self
                .parts
                .first()
                .map(|part| part.leading_annotations.as_slice())
                .unwrap_or(&[]),
            FragmentKind::Function | FragmentKind::Class if !self.decorators.is_empty() => {
                &self.decorators[0].leading_annotations
            }
            _ => &self.leading_annotations,
        }
    }

    /// Every nested suite in source order, including the suites of parts.
    pub fn child_suites(&self) -> Vec<&[Fragment]> {
        let mut suites: Vec<&[Fragment]> = Vec::new();
        match self.kind {
            FragmentKind::If => {
                for part in &self.parts {
                    suites.push(&part.suite);
                }
            }
            _ => {
                if self.kind.is_scope() || !self.suite.is_empty() {
                    suites.push(&self.suite);
                }
                for part in &self.except_parts {
                    suites.push(&part.suite);
                }
                if let Some(part) = &self.else_part {
                    suites.push(&part.suite);
                }
                if let Some(part) = &self.finally_part {
                    suites.push(&part.suite);
                }
            }
        }
        suites
    }

    /// Number of source lines between the fragment start and its side
    /// comment start.
    pub fn side_comment_offset(&self) -> usize {
        self.side_comment
            .as_ref()
            .map(|comment| comment.range.begin_line.saturating_sub(self.range.begin_line))
            .unwrap_or(0)
    }
}

use fontdb::{Database, Family, Query, Stretch, Style, Weight};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::sync::Mutex;
use ttf_parser::Face;

use crate::config::LayoutConfig;

static TEXT_MEASURER: Lazy<Mutex<TextMeasurer>> =
    Lazy::new(|| Mutex::new(TextMeasurer::default()));

const MONO_ADVANCE: f32 = 0.6;
const TAB_WIDTH: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontRole {
    /// Code, comments and headers.
    Text,
    /// Keyword badges and minimized comments.
    Badge,
}

pub trait TextMetrics {
    fn line_width(&self, line: &str, role: FontRole) -> f32;

    fn line_height(&self, role: FontRole) -> f32;

    /// Width and height of multi-line text; an empty string still takes one
    /// line.
    fn bounding_rect(&self, text: &str, role: FontRole) -> (f32, f32) {
        let mut width = 0.0f32;
        let mut lines = 0usize;
        for line in text.split('\n') {
            width = width.max(self.line_width(line, role));
            lines += 1;
        }
        (width, lines.max(1) as f32 * self.line_height(role))
    }
}

/// Character-cell arithmetic: every glyph advances `0.6 * size`.
#[derive(Debug, Clone, PartialEq)]
pub struct MonospaceMetrics {
    pub text_size: f32,
    pub badge_size: f32,
    pub line_height: f32,
}

impl MonospaceMetrics {
    pub fn from_config(config: &LayoutConfig) -> Self {
        Self {
            text_size: config.mono_font_size,
            badge_size: config.badge_font_size,
            line_height: config.line_height,
        }
    }

    fn size(&self, role: FontRole) -> f32 {
        match role {
            FontRole::Text => self.text_size,
            FontRole::Badge => self.badge_size,
        }
    }
}

impl TextMetrics for MonospaceMetrics {
    fn line_width(&self, line: &str, role: FontRole) -> f32 {
        let cells: usize = line
            .chars()
            .map(|ch| if ch == '\t' { TAB_WIDTH } else { 1 })
            .sum();
        cells as f32 * self.size(role) * MONO_ADVANCE
    }

    fn line_height(&self, role: FontRole) -> f32 {
        self.size(role) * self.line_height
    }
}

/// Measures with the installed system font matching the configured family.
/// Falls back to [`MonospaceMetrics`] when no face can be loaded.
#[derive(Debug, Clone)]
pub struct FontMetrics {
    text_family: String,
    badge_family: String,
    fallback: MonospaceMetrics,
}

impl FontMetrics {
    pub fn from_config(config: &LayoutConfig) -> Self {
        Self {
            text_family: config.mono_font_family.clone(),
            badge_family: config.badge_font_family.clone(),
            fallback: MonospaceMetrics::from_config(config),
        }
    }
}

impl TextMetrics for FontMetrics {
    fn line_width(&self, line: &str, role: FontRole) -> f32 {
        let family = match role {
            FontRole::Text => &self.text_family,
            FontRole::Badge => &self.badge_family,
        };
        measure_text_width(line, self.fallback.size(role), family)
            .unwrap_or_else(|| self.fallback.line_width(line, role))
    }

    fn line_height(&self, role: FontRole) -> f32 {
        self.fallback.line_height(role)
    }
}

pub fn for_config(config: &LayoutConfig) -> Box<dyn TextMetrics + Send + Sync> {
    if config.fast_text_metrics {
        Box::new(MonospaceMetrics::from_config(config))
    } else {
        Box::new(FontMetrics::from_config(config))
    }
}

/// Width of one line set in the first installed face of `font_family`, or
/// `None` when no face can be loaded.
pub fn measure_text_width(text: &str, font_size: f32, font_family: &str) -> Option<f32> {
    if text.is_empty() || font_size <= 0.0 {
        return Some(0.0);
    }
    let mut measurer = TEXT_MEASURER.lock().ok()?;
    let face = measurer.face(font_family)?;
    Some(face.line_width(&text.replace('\t', &" ".repeat(TAB_WIDTH)), font_size))
}

#[derive(Default)]
struct TextMeasurer {
    /// System fonts are only scanned on the first cache miss.
    db: Option<Database>,
    faces: HashMap<String, Option<LoadedFace>>,
}

impl TextMeasurer {
    fn face(&mut self, font_family: &str) -> Option<&LoadedFace> {
        let key = family_key(font_family);
        if !self.faces.contains_key(&key) {
            let face = LoadedFace::from_disk_cache(&key)
                .or_else(|| self.load_system_face(font_family, &key));
            if face.is_none() {
                tracing::debug!(family = %key, "no font face found, using monospace widths");
            }
            self.faces.insert(key.clone(), face);
        }
        self.faces.get(&key)?.as_ref()
    }

    fn load_system_face(&mut self, font_family: &str, key: &str) -> Option<LoadedFace> {
        let db = self.db.get_or_insert_with(|| {
            let mut db = Database::new();
            db.load_system_fonts();
            db
        });
        let mut families: Vec<Family<'_>> = font_family
            .split(',')
            .map(|name| name.trim().trim_matches(['"', '\'']))
            .filter(|name| !name.is_empty())
            .map(family_of)
            .collect();
        if families.is_empty() {
            families.push(Family::Monospace);
        }
        let id = db.query(&Query {
            families: &families,
            weight: Weight::NORMAL,
            stretch: Stretch::Normal,
            style: Style::Normal,
        })?;
        let (data, index) = db.with_face_data(id, |data, index| (data.to_vec(), index))?;
        let face = LoadedFace::new(data, index)?;
        face.store_in_disk_cache(key);
        Some(face)
    }
}

fn family_of(name: &str) -> Family<'_> {
    match name.to_ascii_lowercase().as_str() {
        "serif" => Family::Serif,
        "sans-serif" | "system-ui" | "ui-sans-serif" | "-apple-system" => Family::SansSerif,
        "monospace" | "ui-monospace" => Family::Monospace,
        "cursive" => Family::Cursive,
        "fantasy" => Family::Fantasy,
        _ => Family::Name(name),
    }
}

fn family_key(font_family: &str) -> String {
    match font_family.trim() {
        "" => "monospace".to_string(),
        trimmed => trimmed.to_string(),
    }
}

/// Font bytes plus precomputed ASCII advances. Non-ASCII text re-parses the
/// face, which only reads table offsets.
struct LoadedFace {
    data: Vec<u8>,
    index: u32,
    units_per_em: f32,
    ascii_advances: [Option<u16>; 128],
}

impl LoadedFace {
    fn new(data: Vec<u8>, index: u32) -> Option<Self> {
        let (units_per_em, ascii_advances) = {
            let face = Face::parse(&data, index).ok()?;
            let mut advances = [None; 128];
            for (byte, slot) in advances.iter_mut().enumerate() {
                *slot = face
                    .glyph_index(char::from(byte as u8))
                    .and_then(|glyph| face.glyph_hor_advance(glyph));
            }
            (f32::from(face.units_per_em().max(1)), advances)
        };
        Some(Self {
            data,
            index,
            units_per_em,
            ascii_advances,
        })
    }

    fn line_width(&self, line: &str, font_size: f32) -> f32 {
        let scale = font_size / self.units_per_em;
        let missing = font_size * MONO_ADVANCE;
        let width_of =
            |advance: Option<u16>| advance.map_or(missing, |units| f32::from(units) * scale);
        if line.is_ascii() {
            return line
                .bytes()
                .map(|byte| width_of(self.ascii_advances[usize::from(byte)]))
                .sum();
        }
        let Ok(face) = Face::parse(&self.data, self.index) else {
            return line.chars().count() as f32 * missing;
        };
        line.chars()
            .map(|ch| face.glyph_index(ch).and_then(|glyph| face.glyph_hor_advance(glyph)))
            .map(width_of)
            .sum()
    }

    /// Cache files hold the face index as four little-endian bytes followed
    /// by the font data.
    fn from_disk_cache(key: &str) -> Option<Self> {
        let bytes = fs::read(cache_path(key)?).ok()?;
        let index = u32::from_le_bytes(bytes.get(..4)?.try_into().ok()?);
        Self::new(bytes[4..].to_vec(), index)
    }

    fn store_in_disk_cache(&self, key: &str) {
        let Some(path) = cache_path(key) else {
            return;
        };
        if path.exists() {
            return;
        }
        if let Some(parent) = path.parent()
            && fs::create_dir_all(parent).is_err()
        {
            return;
        }
        let mut bytes = self.index.to_le_bytes().to_vec();
        bytes.extend_from_slice(&self.data);
        if let Err(err) = fs::write(&path, bytes) {
            tracing::debug!(path = %path.display(), error = %err, "font cache not written");
        }
    }
}

fn cache_path(key: &str) -> Option<PathBuf> {
    let base = std::env::var_os("XDG_CACHE_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".cache")))?;
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    key.hash(&mut hasher);
    Some(
        base.join("flowgrid")
            .join("fonts")
            .join(format!("{:x}.face", hasher.finish())),
    )
}

//! Font database construction and face selection for text layers.

use std::path::Path;
use std::sync::Arc;

use usvg::fontdb::{Database, Family, Query, Stretch, Style, Weight};

/// Font file extensions picked up from a font directory.
const FONT_EXTENSIONS: [&str; 4] = ["ttf", "otf", "ttc", "otc"];

/// Build the shared font database: optionally the system fonts, then every
/// font file directly inside `font_dir`.
pub fn build_font_database(system_fonts: bool, font_dir: Option<&Path>) -> Arc<Database> {
    let mut db = Database::new();
    if system_fonts {
        db.load_system_fonts();
    }
    if let Some(dir) = font_dir {
        load_fonts_from_dir(&mut db, dir);
    }
    tracing::debug!(faces = db.len(), "Font database ready");
    Arc::new(db)
}

fn load_fonts_from_dir(db: &mut Database, dir: &Path) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        tracing::warn!(dir = %dir.display(), "Font directory is not readable");
        return;
    };
    for path in entries.flatten().map(|e| e.path()) {
        let is_font = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| FONT_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
        if path.is_file() && is_font {
            if let Err(e) = db.load_font_file(&path) {
                tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable font");
            }
        }
    }
}

/// Face selection for `usvg`: the requested families first, then the
/// generic families, then any face at all, so text never silently vanishes
/// while the database holds at least one font.
pub fn font_resolver() -> usvg::FontResolver<'static> {
    usvg::FontResolver {
        select_font: Box::new(|font, db| {
            let mut families: Vec<Family<'_>> = font
                .families()
                .iter()
                .map(|family| match family {
                    usvg::FontFamily::Serif => Family::Serif,
                    usvg::FontFamily::SansSerif => Family::SansSerif,
                    usvg::FontFamily::Cursive => Family::Cursive,
                    usvg::FontFamily::Fantasy => Family::Fantasy,
                    usvg::FontFamily::Monospace => Family::Monospace,
                    usvg::FontFamily::Named(name) => Family::Name(name),
                })
                .collect();
            families.extend([Family::SansSerif, Family::Serif]);

            let style = match font.style() {
                usvg::FontStyle::Normal => Style::Normal,
                usvg::FontStyle::Italic => Style::Italic,
                usvg::FontStyle::Oblique => Style::Oblique,
            };
            let query = Query {
                families: &families,
                weight: Weight(font.weight()),
                stretch: Stretch::Normal,
                style,
            };
            db.query(&query).or_else(|| db.faces().next().map(|face| face.id))
        }),
        select_fallback: usvg::FontResolver::default_fallback_selector(),
    }
}

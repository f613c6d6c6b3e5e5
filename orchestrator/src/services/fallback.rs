//! Local fallback generator
//!
//! Produces a plain SVG placeholder card without touching any provider. The
//! card is intentionally simple: a background in the style's palette, the
//! title on one line and a footer with category and source.

use shared::ImageStyle;

use crate::error::FallbackError;
use crate::traits::FallbackGenerator;
use crate::types::{GenerationRequest, Payload};

pub const SVG_CONTENT_TYPE: &str = "image/svg+xml";

/// Default upper bound on a rendered card
pub const DEFAULT_FALLBACK_SIZE_LIMIT: usize = 64 * 1024;

const MAX_TITLE_CHARS: usize = 80;

struct Palette {
    background: &'static str,
    foreground: &'static str,
    accent: &'static str,
}

fn palette(style: ImageStyle) -> Palette {
    match style {
        ImageStyle::Default => Palette {
            background: "#1f2937",
            foreground: "#f9fafb",
            accent: "#60a5fa",
        },
        ImageStyle::Minimal => Palette {
            background: "#ffffff",
            foreground: "#111827",
            accent: "#6b7280",
        },
        ImageStyle::Vibrant => Palette {
            background: "#7c3aed",
            foreground: "#fef3c7",
            accent: "#f472b6",
        },
        ImageStyle::Dark => Palette {
            background: "#000000",
            foreground: "#e5e7eb",
            accent: "#9ca3af",
        },
        ImageStyle::Classic => Palette {
            background: "#f5f0e6",
            foreground: "#3b2f2f",
            accent: "#8b5e3c",
        },
    }
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    out
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

/// SVG placeholder renderer
#[derive(Debug, Clone)]
pub struct LocalFallbackGenerator {
    size_limit: usize,
}

impl LocalFallbackGenerator {
    pub fn new() -> Self {
        Self {
            size_limit: DEFAULT_FALLBACK_SIZE_LIMIT,
        }
    }

    pub fn with_size_limit(mut self, limit: usize) -> Self {
        self.size_limit = limit;
        self
    }

    fn render(&self, request: &GenerationRequest) -> String {
        let colors = palette(request.style);
        let payload = &request.payload;
        let (width, height) = (request.size.width, request.size.height);

        // a card with only a summary still gets a headline
        let headline = if payload.title.trim().is_empty() {
            &payload.summary
        } else {
            &payload.title
        };
        let headline = escape_xml(&truncate_chars(headline.trim(), MAX_TITLE_CHARS));

        let footer: Vec<&str> = [payload.category.as_str(), payload.source.as_str()]
            .into_iter()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        let footer = escape_xml(&footer.join(" · "));

        let title_size = (width / 18).max(12);
        let footer_size = (width / 36).max(10);
        let margin = width / 12;

        format!(
            concat!(
                r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
                r#"<rect width="100%" height="100%" fill="{bg}"/>"#,
                r#"<rect x="{m}" y="{bar_y}" width="{bar_w}" height="8" fill="{accent}"/>"#,
                r#"<text x="{m}" y="{title_y}" font-family="sans-serif" font-size="{ts}" fill="{fg}">{title}</text>"#,
                r#"<text x="{m}" y="{footer_y}" font-family="sans-serif" font-size="{fs}" fill="{accent}">{footer}</text>"#,
                "</svg>"
            ),
            w = width,
            h = height,
            bg = colors.background,
            fg = colors.foreground,
            accent = colors.accent,
            m = margin,
            bar_y = height / 3,
            bar_w = width / 6,
            title_y = height / 2,
            ts = title_size,
            footer_y = height.saturating_sub(margin),
            fs = footer_size,
            title = headline,
            footer = footer,
        )
    }
}

impl Default for LocalFallbackGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl FallbackGenerator for LocalFallbackGenerator {
    fn generate(&self, request: &GenerationRequest) -> Result<Payload, FallbackError> {
        let payload = &request.payload;
        if payload.title.trim().is_empty() && payload.summary.trim().is_empty() {
            return Err(FallbackError::EmptyContent {
                reason: format!("content {} has neither title nor summary", request.content_id),
            });
        }

        let svg = self.render(request);
        if svg.len() > self.size_limit {
            return Err(FallbackError::PayloadTooLarge {
                size: svg.len(),
                limit: self.size_limit,
            });
        }
        Ok(Payload::bytes(SVG_CONTENT_TYPE, svg.into_bytes()))
    }
}

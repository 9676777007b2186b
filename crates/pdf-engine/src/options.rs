/// Tunables for committing annotations to a page
#[derive(Debug, Clone, PartialEq)]
pub struct FlattenOptions {
    pub min_font_size: f64,
    pub max_font_size: f64,
    /// Baseline offset below the text box top, as a fraction of the font size
    pub cap_height_ratio: f64,
    pub line_height: f64,
    pub placeholder_caption: String,
    pub placeholder_stroke_width: f64,
    /// Captions at or below this size are left out
    pub min_caption_size: f64,
    pub max_caption_size: f64,
    pub compress: bool,
}

impl Default for FlattenOptions {
    fn default() -> Self {
        Self {
            min_font_size: 6.0,
            max_font_size: 72.0,
            cap_height_ratio: 0.87,
            line_height: 1.16,
            placeholder_caption: "SIGNATURE".to_owned(),
            placeholder_stroke_width: 1.0,
            min_caption_size: 6.0,
            max_caption_size: 18.0,
            compress: true,
        }
    }
}

impl FlattenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_font_bounds(mut self, min: f64, max: f64) -> Self {
        self.min_font_size = min.min(max);
        self.max_font_size = max.max(min);
        self
    }

    pub fn with_cap_height_ratio(mut self, ratio: f64) -> Self {
        self.cap_height_ratio = ratio;
        self
    }

    pub fn with_line_height(mut self, line_height: f64) -> Self {
        self.line_height = line_height;
        self
    }

    pub fn with_placeholder_caption(mut self, caption: impl Into<String>) -> Self {
        self.placeholder_caption = caption.into();
        self
    }

    pub fn with_placeholder_stroke_width(mut self, width: f64) -> Self {
        self.placeholder_stroke_width = width;
        self
    }

    pub fn with_compress(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    pub fn clamp_font_size(&self, size: f64) -> f64 {
        size.clamp(self.min_font_size, self.max_font_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let options = FlattenOptions::default();
        assert_eq!(options.clamp_font_size(100.0), 72.0);
        assert_eq!(options.clamp_font_size(1.0), 6.0);
        assert_eq!(options.placeholder_caption, "SIGNATURE");
        assert!(options.compress);
    }

    #[test]
    fn builder_orders_font_bounds() {
        let options = FlattenOptions::new()
            .with_font_bounds(40.0, 8.0)
            .with_compress(false)
            .with_line_height(1.5)
            .with_cap_height_ratio(0.7)
            .with_placeholder_caption("SIGN HERE")
            .with_placeholder_stroke_width(2.0);
        assert_eq!(options.min_font_size, 8.0);
        assert_eq!(options.max_font_size, 40.0);
        assert_eq!(options.line_height, 1.5);
        assert_eq!(options.cap_height_ratio, 0.7);
        assert_eq!(options.placeholder_caption, "SIGN HERE");
        assert_eq!(options.placeholder_stroke_width, 2.0);
        assert!(!options.compress);
    }
}

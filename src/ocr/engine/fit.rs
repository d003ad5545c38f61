use serde::Serialize;

use super::geom::WordGeometry;

/// Font metrics needed to fit a glyph run into a measured box.
pub trait TextMeasure {
    /// Font size at which the font's ascender-to-descender extent equals `height`.
    fn size_at_height(&self, height: f64) -> f64;
    /// Advance width of `text` at `size`, without any horizontal scaling.
    fn width_of_text(&self, text: &str, size: f64) -> f64;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FontFit {
    pub size: f64,
    /// Horizontal scaling in percent (`Tz`), 100 meaning unscaled.
    pub horizontal_scale: f64,
}

impl FontFit {
    /// Returns `None` when the trimmed text has no width, in which case the
    /// word cannot be stretched to its box and is not drawn.
    pub fn compute<M: TextMeasure + ?Sized>(
        measure: &M,
        text: &str,
        geometry: &WordGeometry,
    ) -> Option<Self> {
        let size = measure.size_at_height(geometry.height);
        // the box ends at the last glyph, not at the trailing space
        let natural = measure.width_of_text(text.trim_end(), size);
        if natural <= 0.0 || !natural.is_finite() {
            return None;
        }
        Some(Self {
            size,
            horizontal_scale: 100.0 * geometry.length / natural,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Every character advances `k` ems; ascender-to-descender is one em.
    pub(crate) struct MonospaceMeasure {
        pub(crate) k: f64,
    }

    impl TextMeasure for MonospaceMeasure {
        fn size_at_height(&self, height: f64) -> f64 {
            height
        }

        fn width_of_text(&self, text: &str, size: f64) -> f64 {
            size * text.chars().count() as f64 * self.k
        }
    }

    fn geometry(length: f64, height: f64) -> WordGeometry {
        WordGeometry {
            angle: 0.0,
            length,
            height,
        }
    }

    #[test]
    fn scaled_width_matches_measured_length() {
        let measure = MonospaceMeasure { k: 0.6 };
        for (text, length, height) in [
            ("Hello ", 120.0, 14.0),
            ("x", 3.5, 30.0),
            ("wide-ish\n", 400.25, 9.75),
        ] {
            let fit = FontFit::compute(&measure, text, &geometry(length, height)).unwrap();
            let natural = measure.width_of_text(text.trim_end(), fit.size);
            assert!((natural * fit.horizontal_scale / 100.0 - length).abs() < 1e-6);
            assert_eq!(fit.size, height);
        }
    }

    #[test]
    fn trailing_whitespace_is_not_measured() {
        let measure = MonospaceMeasure { k: 1.0 };
        let fit = FontFit::compute(&measure, "ab  \n", &geometry(20.0, 10.0)).unwrap();
        assert!((fit.horizontal_scale - 100.0).abs() < 1e-9);
    }

    #[test]
    fn blank_word_has_no_fit() {
        let measure = MonospaceMeasure { k: 0.5 };
        assert!(FontFit::compute(&measure, " \n", &geometry(10.0, 10.0)).is_none());
        assert!(FontFit::compute(&measure, "", &geometry(10.0, 10.0)).is_none());
    }
}

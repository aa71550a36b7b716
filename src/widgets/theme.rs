use std::{env, sync::OnceLock, time::Duration};

use ratatui::style::Color;

const LIGHT_LUMA: f32 = 0.6;
// early reads can be noisy, so the median of a few samples decides
const LUMA_SAMPLES: usize = 3;
const LUMA_SAMPLE_DELAY: Duration = Duration::from_millis(25);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Dark,
    Light,
}

impl Mode {
    /// `GRIDMATE_THEME=light|dark`; anything else defers to detection.
    fn from_override(value: Option<&str>) -> Option<Self> {
        let value = value?.trim();
        if value.eq_ignore_ascii_case("light") {
            Some(Mode::Light)
        } else if value.eq_ignore_ascii_case("dark") {
            Some(Mode::Dark)
        } else {
            None
        }
    }

    fn from_luma(luma: Option<f32>) -> Self {
        match luma {
            Some(luma) if luma > LIGHT_LUMA => Mode::Light,
            _ => Mode::Dark,
        }
    }
}

/// Colors of the grid viewer.
#[derive(Debug, Clone, Copy)]
pub struct Theme {
    bg: Color,
    stripe_bg: Color,
    text: Color,
    muted: Color,
    title: Color,
    header: Color,
    border: Color,
    selected_header_bg: Color,
    selected_header_fg: Color,
    success: Color,
    error: Color,
}

impl Theme {
    /// Theme for the running terminal, resolved once per process.
    pub fn detect() -> Self {
        static THEME: OnceLock<Theme> = OnceLock::new();
        *THEME.get_or_init(|| {
            let mode = Mode::from_override(env::var("GRIDMATE_THEME").ok().as_deref())
                .unwrap_or_else(|| Mode::from_luma(sample_luma()));
            tracing::debug!(?mode, "Resolved viewer theme");
            Self::for_mode(mode)
        })
    }

    pub fn for_mode(mode: Mode) -> Self {
        match mode {
            Mode::Dark => Self {
                bg: Color::Rgb(14, 17, 22),
                stripe_bg: Color::Rgb(24, 29, 37),
                text: Color::Rgb(226, 232, 240),
                muted: Color::Rgb(148, 158, 172),
                title: Color::Rgb(96, 200, 224),
                header: Color::Rgb(236, 180, 112),
                border: Color::Rgb(70, 80, 96),
                selected_header_bg: Color::Rgb(40, 54, 80),
                selected_header_fg: Color::Rgb(240, 244, 248),
                success: Color::Rgb(150, 204, 104),
                error: Color::Rgb(240, 120, 140),
            },
            Mode::Light => Self {
                bg: Color::Rgb(248, 248, 246),
                stripe_bg: Color::Rgb(236, 238, 241),
                text: Color::Rgb(30, 34, 40),
                muted: Color::Rgb(96, 102, 114),
                title: Color::Rgb(30, 112, 176),
                header: Color::Rgb(170, 80, 12),
                border: Color::Rgb(160, 166, 178),
                selected_header_bg: Color::Rgb(214, 230, 252),
                selected_header_fg: Color::Rgb(16, 24, 40),
                success: Color::Rgb(44, 150, 66),
                error: Color::Rgb(206, 70, 20),
            },
        }
    }

    pub fn bg(&self) -> Color {
        self.bg
    }

    /// Background of every second row.
    pub fn stripe_bg(&self) -> Color {
        self.stripe_bg
    }

    pub fn text(&self) -> Color {
        self.text
    }

    pub fn muted(&self) -> Color {
        self.muted
    }

    pub fn title(&self) -> Color {
        self.title
    }

    pub fn header(&self) -> Color {
        self.header
    }

    pub fn border(&self) -> Color {
        self.border
    }

    pub fn selected_header_bg(&self) -> Color {
        self.selected_header_bg
    }

    pub fn selected_header_fg(&self) -> Color {
        self.selected_header_fg
    }

    pub fn success(&self) -> Color {
        self.success
    }

    pub fn error(&self) -> Color {
        self.error
    }
}

/// Median background luma reported by the terminal, `None` when it never answers.
fn sample_luma() -> Option<f32> {
    let mut samples = Vec::with_capacity(LUMA_SAMPLES);
    for attempt in 0..LUMA_SAMPLES {
        match terminal_light::luma() {
            Ok(luma) if luma.is_finite() => samples.push(luma),
            Ok(_) => {}
            Err(err) => tracing::trace!(error = %err, attempt, "Terminal luma query failed"),
        }
        if attempt + 1 < LUMA_SAMPLES {
            std::thread::sleep(LUMA_SAMPLE_DELAY);
        }
    }
    median(&mut samples)
}

fn median(samples: &mut [f32]) -> Option<f32> {
    if samples.is_empty() {
        return None;
    }
    samples.sort_by(f32::total_cmp);
    let mid = samples.len() / 2;
    Some(if samples.len().is_multiple_of(2) {
        (samples[mid - 1] + samples[mid]) / 2.0
    } else {
        samples[mid]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_wins_when_recognised() {
        assert_eq!(Mode::from_override(Some(" Light ")), Some(Mode::Light));
        assert_eq!(Mode::from_override(Some("DARK")), Some(Mode::Dark));
        assert_eq!(Mode::from_override(Some("solarized")), None);
        assert_eq!(Mode::from_override(None), None);
    }

    #[test]
    fn bright_backgrounds_pick_the_light_palette() {
        assert_eq!(Mode::from_luma(Some(0.9)), Mode::Light);
        assert_eq!(Mode::from_luma(Some(0.6)), Mode::Dark);
        assert_eq!(Mode::from_luma(None), Mode::Dark);
    }

    #[test]
    fn median_of_samples() {
        assert_eq!(median(&mut []), None);
        assert_eq!(median(&mut [0.9, 0.1, 0.4]), Some(0.4));
        let even = median(&mut [0.2, 0.8, 0.4, 0.6]).unwrap();
        assert!((even - 0.5).abs() < 1e-6);
    }

    #[test]
    fn palettes_differ_by_mode() {
        assert_ne!(Theme::for_mode(Mode::Dark).bg(), Theme::for_mode(Mode::Light).bg());
    }
}

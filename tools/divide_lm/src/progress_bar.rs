use divide_lm_core::Progress;
use indicatif::{ProgressBar, ProgressStyle};

/// Draws one terminal progress bar per stage.
pub struct BarProgress {
    bar: Option<ProgressBar>,
    style: ProgressStyle,
}

impl BarProgress {
    pub fn new() -> Self {
        let style = ProgressStyle::with_template("{msg:>18} [{bar:40}] {pos}/{len} ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        Self { bar: None, style }
    }
}

impl Progress for BarProgress {
    fn start(&mut self, stage: &str, total: u64) {
        let bar = ProgressBar::new(total);
        bar.set_style(self.style.clone());
        bar.set_message(stage.to_string());
        self.bar = Some(bar);
    }

    fn advance(&mut self, delta: u64) {
        if let Some(bar) = &self.bar {
            bar.inc(delta);
        }
    }

    fn finish(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish();
        }
    }
}

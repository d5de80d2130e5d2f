use std::path::Path;

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use crate::error::Error;

pub struct Progress {
    bar: ProgressBar,
}

impl Progress {
    pub fn new(total: usize) -> Self {
        let bar = ProgressBar::new(total as u64);
        if let Ok(style) = ProgressStyle::with_template("{spinner} [{pos}/{len}] {msg}") {
            bar.set_style(style);
        }
        Self { bar }
    }

    pub fn start(&self, name: &str) {
        self.bar.set_message(format!("Routing {name}"));
    }

    pub fn done(&self, name: &str, path: &Path) {
        self.bar.println(format!(
            "{} {name} -> {}",
            "done".green().bold(),
            path.display()
        ));
        self.bar.inc(1);
    }

    pub fn failed(&self, name: &str, err: &Error) {
        self.bar
            .abandon_with_message(format!("{} {name}: {err}", "failed".red().bold()));
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

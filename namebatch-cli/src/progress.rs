use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use namebatch::report::{Phase, ProgressEvent};
use namebatch::{Action, Confirm};
use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use std::sync::mpsc::Receiver;

const BAR_TEMPLATE: &str = "[{elapsed_precise}] {prefix:.bold}▕{bar:30.blue}▏{pos}/{len} {wide_msg}";

/// Progress bars for one run, one per pipeline phase
#[derive(Clone)]
pub struct ProgressView {
    multi: MultiProgress,
}

impl ProgressView {
    pub fn new(visible: bool) -> Self {
        let multi = if visible {
            MultiProgress::new()
        } else {
            MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
        };
        Self { multi }
    }

    fn new_bar(&self, phase: Phase, total: usize) -> ProgressBar {
        let style = ProgressStyle::with_template(BAR_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓▒░  ");
        let bar = self.multi.add(ProgressBar::new(total as u64));
        bar.set_style(style);
        bar.set_prefix(phase.to_string());
        bar
    }

    /// Draws events until the pipeline drops its sender
    pub fn drive(&self, events: Receiver<ProgressEvent>) {
        let mut bars: HashMap<Phase, ProgressBar> = HashMap::new();

        for event in events {
            match event {
                ProgressEvent::Starting { queries } => {
                    bars.insert(Phase::Search, self.new_bar(Phase::Search, queries));
                }
                ProgressEvent::Progress {
                    phase, total, item, ..
                } => {
                    let bar = bars
                        .entry(phase)
                        .or_insert_with(|| self.new_bar(phase, total));
                    bar.set_length(total as u64);
                    bar.inc(1);
                    bar.set_message(item);
                }
                ProgressEvent::Found { total_found } => {
                    if let Some(bar) = bars.get(&Phase::Search) {
                        bar.finish_with_message(format!("{} files found", total_found));
                    }
                }
                ProgressEvent::Finished { .. } => {
                    for bar in bars.values() {
                        bar.finish_and_clear();
                    }
                }
            }
        }
    }

    /// Runs `f` with the bars hidden so prompts stay readable
    pub fn suspend<R>(&self, f: impl FnOnce() -> R) -> R {
        self.multi.suspend(f)
    }
}

/// Asks on the terminal before a move or delete runs
pub struct PromptConfirm {
    view: ProgressView,
}

impl PromptConfirm {
    pub fn new(view: ProgressView) -> Self {
        Self { view }
    }
}

impl Confirm for PromptConfirm {
    fn confirm(&self, action: Action, count: usize) -> bool {
        let prompt = format!("About to {} {} files. Continue?", action, count);
        self.view
            .suspend(|| prompt_confirm(&prompt, io::stdin().lock()))
            .unwrap_or(false)
    }
}

/// Reads a y/N answer. End of input counts as "no".
pub fn prompt_confirm(prompt: &str, mut input: impl BufRead) -> io::Result<bool> {
    let mut line = String::new();
    loop {
        eprint!("{} (y/N): ", prompt);
        io::stderr().flush()?;

        line.clear();
        if input.read_line(&mut line)? == 0 {
            return Ok(false);
        }
        match line.trim().to_lowercase().as_str() {
            "y" | "yes" => return Ok(true),
            "" | "n" | "no" => return Ok(false),
            _ => continue,
        }
    }
}

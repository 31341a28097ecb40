use anyhow::{Context, Result};
use console::{style, Term};
use std::process::Command;
use std::time::Instant;

/// Prints numbered `[n/total]` step lines with their duration.
pub struct TaskRunner {
    term: Term,
    total: u32,
    done: u32,
    current: Option<(String, Instant)>,
    verbose: bool,
}

impl TaskRunner {
    pub fn new(total: u32, verbose: bool) -> Self {
        Self {
            term: Term::stdout(),
            total,
            done: 0,
            current: None,
            verbose,
        }
    }

    fn step(&self) -> String {
        style(format!("[{}/{}]", self.done + 1, self.total))
            .force_styling(true)
            .to_string()
    }

    pub fn start_task(&mut self, descr: impl Into<String>) {
        if self.current.is_some() {
            self.finish(None, true);
        }
        let descr = descr.into();
        println!("{} {}", self.step(), descr);
        self.current = Some((descr, Instant::now()));
    }

    /// Prints the step outcome. With `clear` the start line is overwritten,
    /// otherwise output the step printed stays above it.
    fn finish(&mut self, elapsed: Option<u128>, clear: bool) {
        let Some((descr, _)) = self.current.take() else {
            return;
        };
        if clear && self.term.is_term() {
            self.term.clear_last_lines(1).ok();
        }
        let status = match elapsed {
            Some(ms) => style(format!("[{}ms]", ms)).green(),
            None => style("[SKIPPED]".to_string()).yellow(),
        };
        println!("{} {} {}", self.step(), descr, status);
        self.done += 1;
    }

    fn elapsed(&self) -> Option<u128> {
        self.current
            .as_ref()
            .map(|(_, start)| start.elapsed().as_millis())
    }

    pub fn end_task(&mut self) {
        let elapsed = self.elapsed();
        self.finish(elapsed, !self.verbose);
    }

    pub fn end_verbose_task(&mut self) {
        let elapsed = self.elapsed();
        self.finish(elapsed, false);
    }
}

pub fn run(command: &mut Command) -> Result<()> {
    fn format_error(command: &Command, status: Option<i32>) -> String {
        let status = if let Some(code) = status {
            format!(" exited with {code}")
        } else {
            Default::default()
        };
        format!("{} `{:?}`{}", style("[ERROR]").red(), command, status)
    }
    tracing::debug!("running {:?}", command);
    let status = command
        .status()
        .with_context(|| format_error(command, None))?;
    if !status.success() {
        anyhow::bail!("{}", format_error(command, status.code()));
    }
    Ok(())
}

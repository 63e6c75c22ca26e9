use owo_colors::OwoColorize;
use std::io::{self, BufRead, Write};

/// Small wrapper around stdout/stderr printing to provide consistent, colored
/// user-facing messages. Colors are enabled only when output is a TTY.
fn is_tty() -> bool {
    atty::is(atty::Stream::Stdout)
}

fn stderr_is_tty() -> bool {
    atty::is(atty::Stream::Stderr)
}

pub fn print_info(msg: &str) {
    if is_tty() {
        println!("{} {}", "info:".cyan().bold(), msg);
    } else {
        println!("info: {msg}");
    }
}

pub fn print_warn(msg: &str) {
    if stderr_is_tty() {
        eprintln!("{} {}", "warn:".yellow().bold(), msg);
    } else {
        eprintln!("warn: {msg}");
    }
}

pub fn print_error(msg: &str) {
    if stderr_is_tty() {
        eprintln!("{} {}", "error:".red().bold(), msg);
    } else {
        eprintln!("error: {msg}");
    }
}

pub fn print_success(msg: &str) {
    if is_tty() {
        println!("{} {}", "ok:".green().bold(), msg);
    } else {
        println!("ok: {msg}");
    }
}

/// Print a plain user-facing line (no prefix). Use this for primary outputs
/// such as plan previews which users may script against.
pub fn print_user(msg: &str) {
    println!("{msg}");
}

/// Redraw a one-line progress indicator on stderr. Silent when stderr is not a TTY.
pub fn print_progress(percent: u8, processed: usize, total: usize, name: &str) {
    if !stderr_is_tty() {
        return;
    }
    let mut err = io::stderr().lock();
    let _ = write!(err, "\r\x1b[2K{:>3}% [{processed}/{total}] {}", percent.bold(), name.dimmed());
    let _ = err.flush();
}

/// End the progress line so later output starts on a fresh line.
pub fn finish_progress() {
    if stderr_is_tty() {
        eprintln!();
    }
}

/// Whether stdin is interactive; prompts are only shown there.
pub fn can_prompt() -> bool {
    atty::is(atty::Stream::Stdin)
}

/// Ask a yes/no question on stdin. Anything but y/yes is a no.
pub fn confirm(question: &str) -> io::Result<bool> {
    if is_tty() {
        print!("{} {} [y/N] ", "?".magenta().bold(), question);
    } else {
        print!("{question} [y/N] ");
    }
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

// src/console.rs

//! Minimal interactive confirmation
//!
//! Commands that would delete or overwrite something ask first; the
//! global `--yes` flag auto-accepts every question.

use crate::error::Result;
use std::io::{self, BufRead, Write};

/// Ask a yes/no question, defaulting to no. `assume_yes` accepts
/// without prompting.
pub fn confirm(question: &str, assume_yes: bool) -> Result<bool> {
    if assume_yes {
        return Ok(true);
    }
    print!("{} [y/N] ", question);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(matches!(line.trim(), "y" | "Y" | "yes"))
}

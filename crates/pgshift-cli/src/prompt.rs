//! Terminal prompts over stdin.

use async_trait::async_trait;
use pgshift::{Prompter, ShiftError, ShiftResult};
use std::io::{BufRead, Write};

pub struct StdinPrompter;

/// One line from stdin, trimmed. EOF is a cancellation: the user walked
/// away or the stream was closed under us.
async fn read_line() -> ShiftResult<String> {
    tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        let n = std::io::stdin()
            .lock()
            .read_line(&mut line)
            .map_err(|e| ShiftError::Transient(format!("failed to read stdin: {e}")))?;
        if n == 0 {
            return Err(ShiftError::Cancelled);
        }
        Ok(line.trim().to_string())
    })
    .await
    .map_err(|e| ShiftError::Transient(format!("stdin task failed: {e}")))?
}

fn flush_prompt(text: &str) {
    print!("{text}");
    let _ = std::io::stdout().flush();
}

#[async_trait]
impl Prompter for StdinPrompter {
    async fn prompt_text(&self, title: &str) -> ShiftResult<String> {
        flush_prompt(&format!("{title}: "));
        read_line().await
    }

    async fn prompt_yes_no(&self, title: &str, default: bool) -> ShiftResult<bool> {
        let hint = if default { "[Y/n]" } else { "[y/N]" };
        loop {
            flush_prompt(&format!("{title} {hint} "));
            match read_line().await?.to_lowercase().as_str() {
                "" => return Ok(default),
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => continue,
            }
        }
    }

    async fn prompt_choice(&self, title: &str, items: &[&str]) -> ShiftResult<usize> {
        println!("{title}");
        for (i, item) in items.iter().enumerate() {
            println!("  {}. {item}", i + 1);
        }
        loop {
            flush_prompt(&format!("Choose [1-{}]: ", items.len()));
            if let Ok(n) = read_line().await?.parse::<usize>() {
                if (1..=items.len()).contains(&n) {
                    return Ok(n - 1);
                }
            }
        }
    }
}

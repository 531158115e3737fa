//! Rule-based critic used by path and batch analysis. No network involved.

use crate::services::classifier::extension_of;
use std::path::Path;

pub const DEFAULT_MAX_READ_BYTES: u64 = 1_000_000;
const LONG_FILE_LINES: usize = 500;
const LONG_LINE_CHARS: usize = 100;
const LONG_LINE_EXAMPLES: usize = 3;

/// Reads a file for analysis. Problems come back as the text to analyze.
pub async fn read_file_content(path: &Path, max_bytes: u64) -> String {
    let size = match tokio::fs::metadata(path).await {
        Ok(meta) => meta.len(),
        Err(e) => return format!("Error reading file: {e}"),
    };
    if size > max_bytes {
        return format!("File too large to analyze ({size} bytes)");
    }
    match tokio::fs::read(path).await {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => format!("Error reading file: {e}"),
    }
}

pub fn critique_file(path: &Path, content: &str) -> Vec<String> {
    let mut critiques = Vec::new();
    let lines: Vec<&str> = content.split('\n').collect();

    if lines.len() > LONG_FILE_LINES {
        critiques.push(format!(
            "Over {LONG_FILE_LINES} lines in one file. This is less a module and more a lifestyle."
        ));
    }

    let long_lines: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, line)| line.chars().count() > LONG_LINE_CHARS)
        .map(|(index, _)| index + 1)
        .collect();
    if !long_lines.is_empty() {
        let shown = long_lines
            .iter()
            .take(LONG_LINE_EXAMPLES)
            .map(usize::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        let more = if long_lines.len() > LONG_LINE_EXAMPLES { "..." } else { "" };
        critiques.push(format!(
            "Lines {shown}{more} run past {LONG_LINE_CHARS} characters. Reviewers should not need a second monitor to read one statement."
        ));
    }

    match extension_of(path).as_str() {
        ".py" => {
            if content.contains("import *") {
                critiques.push(
                    "Wildcard imports. Every name in that module is now your problem too."
                        .to_string(),
                );
            }
            if content.contains("except:") || content.contains("except Exception:") {
                critiques.push(
                    "A catch-all except clause. Errors don't go away, they just stop telling you about themselves."
                        .to_string(),
                );
            }
        }
        ".js" | ".jsx" | ".ts" | ".tsx" => {
            if content.contains("var ") {
                critiques.push(
                    "`var` is still here. `let` and `const` have been waiting patiently since 2015."
                        .to_string(),
                );
            }
            if content.contains("console.log") {
                critiques.push(
                    "Leftover console.log calls. Debug output belongs in your terminal, not in the commit."
                        .to_string(),
                );
            }
        }
        _ => {}
    }

    if content.contains("TODO") {
        critiques.push("TODOs spotted. Some of these look old enough to vote.".to_string());
    }
    if content.contains("FIXME") {
        critiques.push("FIXMEs left behind. Someone knew it was broken and shipped it anyway.".to_string());
    }

    if critiques.is_empty() {
        critiques.push(
            "This code is suspiciously adequate. Either it's genuinely fine or the problems are hiding well."
                .to_string(),
        );
    }

    critiques
}

//! Interactive yes/no confirmation on the terminal.

use std::io::{BufRead, Write};

use nodeprov_core::Confirm;

/// Asks on stderr and reads the answer from a line reader.
pub struct LineConfirm<R> {
    input: R,
}

impl LineConfirm<std::io::StdinLock<'static>> {
    pub fn stdin() -> Self {
        Self {
            input: std::io::stdin().lock(),
        }
    }
}

impl<R: BufRead> LineConfirm<R> {
    pub fn new(input: R) -> Self {
        Self { input }
    }
}

impl<R: BufRead> Confirm for LineConfirm<R> {
    fn confirm(&mut self, question: &str) -> bool {
        eprint!("{question} [y/N]: ");
        let _ = std::io::stderr().flush();

        let mut answer = String::new();
        if self.input.read_line(&mut answer).is_err() {
            return false;
        }
        is_yes(&answer)
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_answers() {
        for (input, expected) in [("y\n", true), ("YES\n", true), ("n\n", false), ("\n", false), ("", false)] {
            let mut confirm = LineConfirm::new(Cursor::new(input));
            assert_eq!(confirm.confirm("Proceed?"), expected, "{input:?}");
        }
    }
}

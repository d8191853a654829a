//! 実行前の確認プロンプト

use colored::Colorize;
use std::io::{self, BufRead, IsTerminal, Write};

/// 確認の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    Yes,
    No,
    /// 標準入力が端末ではないため確認できない
    NonInteractive,
}

/// 標準入力で確認する（`assume_yes` なら確認しない）
pub fn confirm(question: &str, assume_yes: bool) -> io::Result<Answer> {
    if assume_yes {
        return Ok(Answer::Yes);
    }
    let stdin = io::stdin();
    let interactive = stdin.is_terminal();
    confirm_with(question, interactive, stdin.lock())
}

/// 空入力は Yes 扱い
pub fn confirm_with<R: BufRead>(question: &str, interactive: bool, mut input: R) -> io::Result<Answer> {
    if !interactive {
        return Ok(Answer::NonInteractive);
    }

    print!("{} {} ", question.bold(), "[Y/n]:".dimmed());
    io::stdout().flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;
    let answer = line.trim();
    if answer.is_empty() || answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes") {
        Ok(Answer::Yes)
    } else {
        Ok(Answer::No)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_empty_input_means_yes() {
        assert_eq!(confirm_with("deploy?", true, Cursor::new("\n")).unwrap(), Answer::Yes);
        assert_eq!(confirm_with("deploy?", true, Cursor::new("")).unwrap(), Answer::Yes);
    }

    #[test]
    fn test_explicit_answers() {
        assert_eq!(confirm_with("deploy?", true, Cursor::new("Y\n")).unwrap(), Answer::Yes);
        assert_eq!(confirm_with("deploy?", true, Cursor::new("yes\n")).unwrap(), Answer::Yes);
        assert_eq!(confirm_with("deploy?", true, Cursor::new("n\n")).unwrap(), Answer::No);
        assert_eq!(confirm_with("deploy?", true, Cursor::new("nope\n")).unwrap(), Answer::No);
    }

    #[test]
    fn test_non_interactive_never_reads() {
        assert_eq!(
            confirm_with("deploy?", false, Cursor::new("y\n")).unwrap(),
            Answer::NonInteractive
        );
    }

    #[test]
    fn test_assume_yes() {
        assert_eq!(confirm("deploy?", true).unwrap(), Answer::Yes);
    }
}

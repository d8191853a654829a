//! オペレーター向けの表示

use chrono::Local;
use colored::Colorize;

/// タイムスタンプ付きの進捗メッセージ
pub fn message(text: &str) {
    let line = format!("# [{}] {}", Local::now().format("%H:%M:%S%.6f"), text);
    println!("{}", line.green());
}

/// 継続可能なエラー
pub fn error(text: &str) {
    eprintln!("{}", format!("# {}", text).red());
}

/// 実行するコマンド（--verbose 時）
pub fn command(text: &str) {
    println!("{}", text.bright_black());
}

/// ドライランで実行しないコマンド
pub fn dry_run(text: &str) {
    println!("{} {}", "[dry-run] $".yellow(), text);
}

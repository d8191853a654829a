mod prompt;

use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use prompt::Answer;
use shipflow_core::{VariableStore, find_config_file, parse_config_file};
use shipflow_deploy::{
    DeployError, ExecOptions, Executors, Pipeline, RsyncTransfer, ShellRunner, SshRemote, Step,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "ship")]
#[command(version)]
#[command(about = "ビルドして、固めて、送り届ける。docker-compose 環境のデプロイツール", long_about = None)]
struct Cli {
    /// デプロイ先サーバー名
    server: String,

    /// 実行するステージ（カンマまたは空白区切り: build-env, build, push, deploy, run, ユーザーコマンド）
    stages: Vec<String>,

    /// 設定ファイル（未指定なら SHIPFLOW_CONFIG、カレントから上位、ユーザー設定の順に探索）
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// 実行するコマンドを表示し、デバッグログを出力
    #[arg(short, long)]
    verbose: bool,

    /// ドライラン（コマンドを表示するだけで実行しない）
    #[arg(long)]
    dry: bool,

    /// コンテナのビルド・push・保存・ロードをスキップ
    #[arg(long)]
    skip_containers: bool,

    /// 有効な設定と変数を JSON で表示
    #[arg(long)]
    config: bool,

    /// 確認プロンプトに yes と答える
    #[arg(short, long)]
    yes: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let (message, code) = match e.downcast_ref::<DeployError>() {
                Some(deploy) => (deploy.user_message(), deploy.exit_code()),
                None => (format!("{:#}", e), 1),
            };
            eprintln!("{} {}", "エラー:".red().bold(), message);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

/// RUST_LOG があればそれを優先、なければ warn（--verbose なら debug）
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = find_config_file(cli.file.as_deref())?;
    tracing::debug!(config = %config_path.display(), "Using configuration file");

    let mut project = parse_config_file(&config_path)
        .with_context(|| format!("設定ファイルの読み込みに失敗しました: {}", config_path.display()))?;
    if cli.skip_containers {
        project = project.without_containers();
    }

    let server = project.server(&cli.server)?;
    let vars = VariableStore::for_server(&project, &cli.server)?;

    if cli.config {
        let effective = serde_json::json!({
            "config_file": config_path,
            "server": cli.server,
            "project": project,
            "variables": vars,
        });
        println!("{}", serde_json::to_string_pretty(&effective)?);
        return Ok(());
    }

    if let Some(motd) = &project.motd {
        println!("{}", vars.resolve_path(motd).cyan().bold());
    }

    let steps = if cli.stages.is_empty() {
        let question = format!(
            "v{} を [{}] へ build, push, deploy しますか？",
            server.version, cli.server
        );
        match prompt::confirm(&question, cli.yes)? {
            Answer::Yes => Step::DEFAULT.to_vec(),
            Answer::No => {
                println!("{}", "中止しました".yellow());
                return Ok(());
            }
            Answer::NonInteractive => {
                anyhow::bail!(
                    "標準入力が端末ではないため確認できません。\n\
                     --yes を指定するか、実行するステージを明示してください（例: ship {} build,push,deploy）",
                    cli.server
                );
            }
        }
    } else {
        Step::parse_list(&cli.stages, &project)?
    };

    let shell = ShellRunner::new(ExecOptions {
        verbose: cli.verbose,
        dry_run: cli.dry,
    });
    let remote = SshRemote::new(&shell);
    let transfer = RsyncTransfer::new(&shell);
    let exec = Executors {
        local: &shell,
        remote: &remote,
        transfer: &transfer,
    };

    Pipeline::new(&project, &cli.server, &vars, exec)?
        .dry_run(cli.dry)
        .run(&steps)?;

    println!();
    println!(
        "{}",
        format!(
            "✓ [{}] 完了: {}",
            cli.server,
            steps.iter().map(Step::name).collect::<Vec<_>>().join(", ")
        )
        .green()
        .bold()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_stages() {
        let cli = Cli::try_parse_from(["ship", "prod", "build,push", "deploy", "--dry"]).unwrap();
        assert_eq!(cli.server, "prod");
        assert_eq!(cli.stages, vec!["build,push", "deploy"]);
        assert!(cli.dry);
        assert!(!cli.yes);
    }

    #[test]
    fn test_server_is_required() {
        assert!(Cli::try_parse_from(["ship"]).is_err());
    }
}

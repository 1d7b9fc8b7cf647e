// workspace_client/src/main.rs

//! `workspace-import` 命令行入口。
//!
//! 加载配置、初始化日志，然后按子命令装配所需的服务：
//! 只涉及 REST 的命令 (`workspace`, `workspace --watch`, `clear-workspace`) 不建立套接字连接，
//! `convert` 完全在本地完成。

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use common_models::measurement::DeviceMeasurementPayload;
use common_models::ws_payloads::PantoneLiveCredentials;
use common_models::{ImportRequest, WorkspaceObjectType, WorkspaceSnapshot};
use log::{error, info, warn};
use serde::Serialize;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

use workspace_client::config::{default_config_path, load_app_config};
use workspace_client::{conversion, AppConfig, AppState, ImportEvent, WorkspaceService};

#[derive(Parser, Debug)]
#[command(name = "workspace-import", version, about = "工作区导入客户端")]
struct Cli {
    /// 配置文件路径，不存在时写出默认配置
    #[arg(long, env = "WORKSPACE_CLIENT_CONFIG")]
    config: Option<PathBuf>,

    /// 覆盖配置中的日志级别 (语法同 RUST_LOG)
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 显示当前工作区内容
    Workspace {
        /// 按配置的间隔持续轮询，内容变化时重新输出，直到收到中断信号
        #[arg(long)]
        watch: bool,
    },
    /// 把工作区对象导入永久存储
    Import(ImportArgs),
    /// 上传测量文件并解析
    Upload { file: PathBuf },
    /// 在本地转换一份设备测量载荷 (JSON 文件)
    Convert { file: PathBuf },
    /// 清空当前应用的工作区
    ClearWorkspace,
    /// PantoneLIVE 色板：登录、列出或选择
    Palettes(PaletteArgs),
}

#[derive(Args, Debug)]
struct ImportArgs {
    /// 导入工作区中的全部对象
    #[arg(long, conflicts_with_all = ["object_type", "ids"])]
    all: bool,

    /// 对象类别 (standards, substrates, assortments, recipes, trials, thicknessobjects)
    #[arg(long = "type", requires = "ids")]
    object_type: Option<WorkspaceObjectType>,

    /// 对象 ID，可重复
    #[arg(long = "id")]
    ids: Vec<String>,
}

#[derive(Args, Debug)]
struct PaletteArgs {
    #[arg(long, requires = "password")]
    username: Option<String>,

    #[arg(long, requires = "username")]
    password: Option<String>,

    /// 选择指定 ID 的色板
    #[arg(long)]
    select: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let config = load_app_config(&config_path).with_context(|| format!("加载配置失败: {}", config_path.display()))?;

    let log_level = cli.log_level.clone().unwrap_or_else(|| config.log_level.clone());
    if let Err(e) = env_logger::Builder::new().parse_filters(&log_level).try_init() {
        eprintln!("初始化 env_logger 失败: {}", e);
    }
    config.validate().context("配置校验失败")?;
    info!("[命令行] 使用配置文件: {}", config_path.display());

    match cli.command {
        Command::Workspace { watch: false } => {
            let snapshot = WorkspaceService::from_config(&config)?.get_workspace().await?;
            print_json(&snapshot)?;
        }
        Command::Workspace { watch: true } => watch_workspace(&config).await?,
        Command::ClearWorkspace => {
            WorkspaceService::from_config(&config)?.delete_workspace().await?;
            info!("[命令行] 工作区已清空。");
        }
        Command::Convert { file } => {
            let text = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("读取文件失败: {}", file.display()))?;
            let payload: DeviceMeasurementPayload =
                serde_json::from_str(&text).with_context(|| format!("解析测量载荷失败: {}", file.display()))?;
            print_json(&conversion::convert(&payload)?)?;
        }
        Command::Upload { file } => {
            let state = AppState::connect(config).await?;
            let result = state
                .upload(&file, |progress| info!("[命令行] 上传进度: {:.0}%", progress * 100.0))
                .await;
            state.shutdown().await;
            let outcome = result?;
            match outcome.measurement {
                Some(measurement) => print_json(&measurement)?,
                None => print_json(&outcome.data)?,
            }
        }
        Command::Import(args) => run_import(config, args).await?,
        Command::Palettes(args) => run_palettes(config, args).await?,
    }
    Ok(())
}

async fn run_import(config: AppConfig, args: ImportArgs) -> anyhow::Result<()> {
    let state = AppState::connect(config).await?;

    let request = if args.all {
        let snapshot = state.get_workspace().await?;
        let mut request = ImportRequest::new();
        for (object_type, entries) in &snapshot.entries {
            request.insert_ids(*object_type, entries.iter().map(|entry| entry.id.clone()));
        }
        request
    } else {
        match args.object_type {
            Some(object_type) => ImportRequest::new().with_ids(object_type, args.ids),
            None => bail!("请指定 --all，或同时指定 --type 与 --id"),
        }
    };
    if request.is_empty() {
        warn!("[命令行] 没有需要导入的对象。");
    }

    let cancel = CancellationToken::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("[命令行] 收到中断信号，正在取消导入...");
            ctrl_c_cancel.cancel();
        }
    });

    let mut events = state.orchestrator().subscribe_events();
    let reporter = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match &event {
                ImportEvent::ObjectRejected { object_type, object_id, reason } => {
                    error!("[命令行] {}/{} 导入失败: {}", object_type, object_id, reason)
                }
                ImportEvent::Progress { progress } => info!("[命令行] 导入进度: {:.0}%", progress * 100.0),
                ImportEvent::Finished { .. } => break,
                _ => {}
            }
        }
    });

    let result = state.import_workspace_objects(&request, cancel).await;
    let _ = reporter.await;
    state.shutdown().await;
    print_json(&result)?;
    Ok(())
}

async fn watch_workspace(config: &AppConfig) -> anyhow::Result<()> {
    let service = WorkspaceService::from_config(config)?;
    let interval = config.workspace_poll_interval();
    info!("[命令行] 每 {} 毫秒轮询一次工作区，按 Ctrl+C 结束。", interval.as_millis());

    let cancel = CancellationToken::new();
    let mut snapshots = service.poll_workspace(interval, cancel.clone());
    let mut last_printed: Option<WorkspaceSnapshot> = None;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("[命令行] 收到中断信号，停止轮询。");
                cancel.cancel();
                break;
            }
            changed = snapshots.changed() => {
                if changed.is_err() {
                    warn!("[命令行] 轮询任务已结束。");
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                if let Some(snapshot) = snapshot {
                    if last_printed.as_ref() != Some(&snapshot) {
                        print_json(&snapshot)?;
                        last_printed = Some(snapshot);
                    }
                }
            }
        }
    }
    Ok(())
}

async fn run_palettes(config: AppConfig, args: PaletteArgs) -> anyhow::Result<()> {
    let state = AppState::connect(config).await?;
    let result = async {
        if let (Some(username), Some(password)) = (args.username, args.password) {
            state
                .rpc()
                .set_pantone_live_credentials(&PantoneLiveCredentials { username, password })
                .await?;
            info!("[命令行] PantoneLIVE 凭据已设置。");
        }
        match args.select {
            Some(palette_id) => print_json(&state.rpc().select_palette(&palette_id).await?)?,
            None => print_json(&state.rpc().list_palettes().await?)?,
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;
    state.shutdown().await;
    result
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

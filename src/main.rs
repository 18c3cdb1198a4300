use clap::{Parser, Subcommand};
use echo_memory::config::{self, AppConfig, ENV_TRACING};
use echo_memory::error::{EchoError, Result};
use echo_memory::prelude::*;
use reqwest::Client;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// 与带长期记忆的对话模型聊天
#[derive(Parser)]
#[command(name = "echo-memory", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// 依次运行「记住姓名 → 询问姓名 → 记住爱好 → 询问爱好」四轮演示
    Demo {
        /// 记忆命名空间中的用户标识
        #[arg(long, env = "MEMORY_USER_ID")]
        user_id: Option<String>,
    },
    /// 交互式对话；输入 /memories 查看已记住的内容，/exit 退出
    Chat {
        #[arg(long, env = "MEMORY_USER_ID")]
        user_id: Option<String>,
    },
    /// 打印校验后的配置（API Key 已脱敏）
    Env,
}

const DEMO_INPUTS: [&str; 4] = [
    "你好，请记住我的名字是Barry",
    "我叫什么名字？",
    "请记住我喜欢编程",
    "你知道我的兴趣爱好吗？",
];

#[tokio::main]
async fn main() -> ExitCode {
    // 先加载 .env，clap 的 env 回退和日志级别都依赖它
    let env_file = config::load_env_file(Path::new("."));
    init_tracing();
    match env_file {
        Ok(Some(path)) => info!(path = %path.display(), "加载环境变量文件"),
        Ok(None) => info!("未找到 .env 文件，仅使用进程环境变量"),
        Err(e) => {
            eprintln!("错误: {e}");
            return ExitCode::FAILURE;
        }
    }

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("错误: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = AppConfig::from_env()?;

    match cli.command {
        Command::Demo { user_id } => {
            let user_id = user_id.unwrap_or_else(|| config.user_id.clone());
            run_demo(&build_agent(&config), &user_id).await
        }
        Command::Chat { user_id } => {
            let user_id = user_id.unwrap_or_else(|| config.user_id.clone());
            run_chat(&build_agent(&config), &user_id).await
        }
        Command::Env => {
            print_config(&config);
            Ok(())
        }
    }
}

/// `RUST_LOG` 优先；否则 `LANGCHAIN_TRACING_V2` 开启时输出 debug
fn init_tracing() {
    let tracing_enabled = std::env::var(ENV_TRACING)
        .map(|v| config::parse_bool(&v))
        .unwrap_or(false);
    let default_filter = if tracing_enabled {
        "echo_memory=debug"
    } else {
        "echo_memory=warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();
}

fn build_agent(config: &AppConfig) -> MemoryAgent {
    let client = Arc::new(Client::new());
    let model = OpenAiChatModel::from_config(client.clone(), config);

    let store = match OpenAiEmbeddings::from_config(client, config) {
        Some(embedder) => {
            info!(model = ?config.embedding_model, dims = config.embedding_dims, "使用向量检索");
            InMemoryStore::with_embedder(Arc::new(embedder))
        }
        None => {
            info!("未设置 EMBEDDING_NAME，使用关键词检索");
            InMemoryStore::new()
        }
    };

    MemoryAgent::new(AgentConfig::default(), Arc::new(model), Arc::new(store))
}

async fn run_demo(agent: &MemoryAgent, user_id: &str) -> Result<()> {
    println!("=== 长期记忆测试 ===\n");
    for input in DEMO_INPUTS {
        // 每轮都是新会话，只有长期记忆跨轮保留
        let mut conversation = Conversation::new(user_id);
        println!("User: {input}");
        println!("==================\n");
        let outcome = conversation.send(agent, input).await?;
        if let Some(stored) = &outcome.stored {
            println!("💾 已记住: {}", stored.fact);
        }
        println!("Assistant: {}\n", outcome.reply.content);
    }
    Ok(())
}

async fn run_chat(agent: &MemoryAgent, user_id: &str) -> Result<()> {
    let mut editor = DefaultEditor::new().map_err(readline_error)?;
    let mut conversation = Conversation::new(user_id);
    println!("用户: {user_id}（/memories 查看记忆，/exit 退出）");

    loop {
        let line = match editor.readline("You> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(readline_error(e)),
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        let _ = editor.add_history_entry(input);

        match input {
            "/exit" | "/quit" => break,
            "/memories" => {
                let items = agent.store().list(&agent.namespace(user_id)).await?;
                if items.is_empty() {
                    println!("（暂无记忆）");
                }
                for item in items {
                    println!("- {}", item.fact().unwrap_or("<non-text value>"));
                }
            }
            _ => {
                let outcome = conversation.send(agent, input).await?;
                if let Some(stored) = &outcome.stored {
                    println!("💾 已记住: {}", stored.fact);
                }
                println!("Assistant: {}", outcome.reply.content);
            }
        }
    }
    Ok(())
}

fn print_config(config: &AppConfig) {
    println!("=== 验证和转换后的环境变量 ===");
    println!("API Key:         {}", config.masked_api_key());
    println!("Base URL:        {}", config.base_url);
    println!("Model Name:      {}", config.model_name);
    println!(
        "Embedding Model: {}",
        config.embedding_model.as_deref().unwrap_or("未设置（关键词检索）")
    );
    println!("Embedding Dims:  {}", config.embedding_dims);
    println!("Temperature:     {}", config.temperature);
    println!("Max Tokens:      {}", config.max_tokens);
    println!("Tracing Enabled: {}", config.tracing_enabled);
    println!("User ID:         {}", config.user_id);
}

fn readline_error(e: ReadlineError) -> EchoError {
    EchoError::Other(format!("readline: {e}"))
}

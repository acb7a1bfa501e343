use anyhow::Result;
use clap::{Args as ClapArgs, Parser, Subcommand};
use onnx_classifier::{
    config::{Backend, Config, ExecutionMode, ResizeFilter, SessionStrategy},
    image::ImageSource,
    web::{serve, AppState},
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "onnx-classifier")]
#[command(about = "ONNX-powered image classification service")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    model: ModelArgs,

    /// Log level
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP service (default)
    Serve {
        /// Server bind address
        #[arg(long, default_value = "0.0.0.0:5005")]
        bind: String,

        /// Enable development mode
        #[arg(long)]
        dev: bool,
    },
    /// Classify one image (path, URL or data URI) and print the result as JSON
    Classify {
        /// Image source
        source: String,

        /// Number of predictions to return
        #[arg(long)]
        top_k: Option<usize>,
    },
}

#[derive(ClapArgs)]
struct ModelArgs {
    /// Model file path or http(s) URL
    #[arg(long, default_value = "models/resnet50v2.onnx", global = true)]
    model: String,

    /// Label vocabulary file (JSON array or one label per line)
    #[arg(long, default_value = "models/imagenet_labels.json", global = true)]
    labels: String,

    /// Model input tensor name
    #[arg(long, default_value = "data", global = true)]
    input_name: String,

    /// Model output tensor name
    #[arg(long, default_value = "resnetv24_dense0_fwd", global = true)]
    output_name: String,

    /// Default number of predictions
    #[arg(long, default_value_t = 3, global = true)]
    default_top_k: usize,

    /// Execution backend
    #[arg(long, value_enum, default_value = "cpu", global = true)]
    backend: Backend,

    /// Graph optimization level (0-3)
    #[arg(long, default_value_t = 3, global = true)]
    optimization_level: u8,

    /// Graph execution mode
    #[arg(long, value_enum, default_value = "sequential", global = true)]
    execution_mode: ExecutionMode,

    /// Intra-op thread count
    #[arg(long, global = true)]
    intra_threads: Option<usize>,

    /// Inter-op thread count (parallel mode)
    #[arg(long, global = true)]
    inter_threads: Option<usize>,

    /// Disable the CPU memory arena
    #[arg(long, global = true)]
    disable_memory_arena: bool,

    /// Disable memory pattern optimization
    #[arg(long, global = true)]
    disable_memory_pattern: bool,

    /// Build a new session per request, or reuse one
    #[arg(long, value_enum, default_value = "fresh", global = true)]
    session_strategy: SessionStrategy,

    /// Resize filter used during preprocessing
    #[arg(long, value_enum, default_value = "triangle", global = true)]
    resize_filter: ResizeFilter,
}

impl ModelArgs {
    fn into_config(self, bind: String, dev: bool) -> Result<Config> {
        let mut config = Config::new(bind, self.model, self.labels, self.output_name, dev)?;
        config.input_name = self.input_name;
        config.default_top_k = self.default_top_k;
        config.preprocess_config.filter = self.resize_filter;

        let onnx = &mut config.onnx_config;
        onnx.backend = self.backend;
        onnx.optimization_level = self.optimization_level;
        onnx.execution_mode = self.execution_mode;
        if let Some(threads) = self.intra_threads {
            onnx.intra_threads = threads;
        }
        if let Some(threads) = self.inter_threads {
            onnx.inter_threads = threads;
        }
        onnx.enable_memory_arena = !self.disable_memory_arena;
        onnx.enable_memory_pattern = !self.disable_memory_pattern;
        onnx.session_strategy = self.session_strategy;

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 初始化日志系统
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match args.command.unwrap_or(Command::Serve {
        bind: "0.0.0.0:5005".to_string(),
        dev: false,
    }) {
        Command::Serve { bind, dev } => {
            tracing::info!("Starting ONNX classification service...");
            tracing::info!("Bind address: {}", bind);
            tracing::info!("Model: {}", args.model.model);

            let config = args.model.into_config(bind, dev)?;
            serve(config).await?;
        }
        Command::Classify { source, top_k } => {
            let config = args.model.into_config(String::new(), false)?;
            let state = AppState::from_config(config)?;

            let result = state
                .pipeline
                .classify(ImageSource::parse(&source), top_k)
                .await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
    }

    Ok(())
}

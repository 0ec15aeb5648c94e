use clap::{Parser, Subcommand, ValueEnum};
use config::AwsArgs;
use sqsgate::consume::ConsumeMode;
use sqsgate::memory::InMemoryQueues;
use sqsgate::{Gateway, SqsQueues, DEFAULT_MAX_MESSAGES, DEFAULT_QUEUE_PREFIX};
use std::net::{IpAddr, SocketAddr};

mod config;
mod server;

#[tokio::main]
pub async fn main() {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&cli.log_level))
        .init();

    if let Err(e) = cli.run().await {
        eprintln!("{:#}", e);
        std::process::exit(1);
    }
}

#[derive(Debug, Parser)]
#[command(name = "sqsgate")]
#[command(about = "HTTP gateway and CLI for AWS SQS queues", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    aws: AwsArgs,

    /// Prefix added to queues created through the gateway and used to filter listings
    #[arg(long, global = true, env = "SQSGATE_QUEUE_PREFIX", default_value = DEFAULT_QUEUE_PREFIX)]
    queue_prefix: String,

    /// Messages requested per receive (1-10)
    #[arg(long, global = true, env = "SQSGATE_MAX_MESSAGES", default_value_t = DEFAULT_MAX_MESSAGES)]
    max_messages: i32,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Serve the HTTP API
    Serve {
        #[arg(long, env = "SQSGATE_HOST", default_value = "0.0.0.0")]
        host: IpAddr,

        #[arg(long, env = "SQSGATE_PORT", default_value_t = 8080)]
        port: u16,

        /// Keep queues in process memory instead of talking to SQS
        #[arg(long)]
        memory: bool,
    },
    /// List queue URLs carrying the queue prefix
    List,
    /// Receive one batch from a queue and print each body as a JSON line
    Poll {
        url: String,

        #[arg(long, value_enum, default_value_t = PollMode::FetchOnly)]
        mode: PollMode,
    },
    /// Send a single message
    Send { url: String, body: String },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PollMode {
    FetchOnly,
    FetchAndDelete,
    VisibilityHold,
    LongPollAndDelete,
}

impl From<PollMode> for ConsumeMode {
    fn from(mode: PollMode) -> Self {
        match mode {
            PollMode::FetchOnly => ConsumeMode::FetchOnly,
            PollMode::FetchAndDelete => ConsumeMode::FetchAndDelete,
            PollMode::VisibilityHold => ConsumeMode::FetchWithVisibilityHold,
            PollMode::LongPollAndDelete => ConsumeMode::FetchWithLongPollAndDelete,
        }
    }
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        if let Commands::Serve {
            host,
            port,
            memory: true,
        } = self.command
        {
            log::warn!("serving in-memory queues; nothing is persisted");
            let gateway = Gateway::new(InMemoryQueues::new(), self.queue_prefix);
            return server::serve(gateway, SocketAddr::new(host, port)).await;
        }

        let config = self.aws.load().await;
        let gateway = Gateway::new(
            SqsQueues::from_config(config).with_max_messages(self.max_messages),
            self.queue_prefix,
        );

        match self.command {
            Commands::Serve { host, port, .. } => {
                server::serve(gateway, SocketAddr::new(host, port)).await?
            }
            Commands::List => {
                for url in gateway.list().await? {
                    println!("{}", url);
                }
            }
            Commands::Poll { url, mode } => {
                let consumed = gateway.consume(&url, mode.into()).await?;
                for body in &consumed.bodies {
                    println!("{}", serde_json::json!({ "body": body }));
                }
                for failure in &consumed.failures {
                    eprintln!(
                        "{:?} failed for {}: {}",
                        failure.action, failure.receipt_handle, failure.error
                    );
                }
            }
            Commands::Send { url, body } => {
                let id = gateway.send_message(&url, &body).await?;
                println!("{}", id.unwrap_or_default());
            }
        }

        Ok(())
    }
}

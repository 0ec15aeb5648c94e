use crate::{QueueAdmin, SqsQueues};
use aws_sdk_sqs::config::Credentials;
use testcontainers::ContainerAsync;
use testcontainers_modules::{
    localstack::LocalStack,
    testcontainers::{runners::AsyncRunner, ImageExt, TestcontainersError},
};
use tokio::sync::OnceCell;

pub fn local_config(endpoint_url: &str, region: Option<&'static str>) -> aws_config::ConfigLoader {
    aws_config::defaults(aws_config::BehaviorVersion::latest())
        .endpoint_url(endpoint_url)
        .region(region.unwrap_or("us-east-1"))
        .credentials_provider(Credentials::new("test", "test", None, None, "static"))
}

pub async fn localstack() -> Result<(String, ContainerAsync<LocalStack>), TestcontainersError> {
    let request = LocalStack::default()
        .with_tag("latest")
        .with_env_var("SERVICES", "sqs")
        .with_env_var("SKIP_SSL_CERT_DOWNLOAD", "1");
    let container = request.start().await?;

    let host_ip = container.get_host().await?;
    let host_port = container.get_host_port_ipv4(4566).await?;
    let endpoint_url = format!("http://{host_ip}:{host_port}");

    Ok((endpoint_url, container))
}

// One LocalStack container shared by every test in the process; testcontainers
// removes it when the process exits.
static SHARED_CONTAINER: OnceCell<(String, ContainerAsync<LocalStack>)> = OnceCell::const_new();

pub async fn get_shared_localstack() -> String {
    let (endpoint_url, _) = SHARED_CONTAINER
        .get_or_init(|| async { localstack().await.unwrap() })
        .await;
    endpoint_url.clone()
}

/// Generate a unique queue name for testing, using a UUID suffix.
pub fn unique_queue_name(prefix: &str) -> String {
    format!("{}-{}", prefix, uuid::Uuid::new_v4().simple())
}

/// Creates a fresh queue in the shared LocalStack and returns a client for it.
pub async fn setup(name: &str) -> (SqsQueues, String) {
    let endpoint_url = get_shared_localstack().await;
    let config = local_config(&endpoint_url, None).load().await;
    let queues = SqsQueues::from_config(config);

    let queue_url = queues
        .create_queue(&unique_queue_name(name))
        .await
        .unwrap();

    (queues, queue_url)
}

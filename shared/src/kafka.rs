//! Kafka plumbing for the classification triggers: topic names, topic
//! provisioning and the consumer used by the runner.

use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::ClientConfig;
use tracing::{debug, info, warn};

/// Upload collaborator → runner: a freshly queued document.
pub const TOPIC_DOCUMENT_UPLOADED: &str = "document-uploaded";
/// Retry collaborator → runner: requeue a failed document and run it again.
pub const TOPIC_CLASSIFICATION_RETRY: &str = "classification-retry";

/// Trigger topics the runner consumes.
pub const TRIGGER_TOPICS: [&str; 2] = [TOPIC_DOCUMENT_UPLOADED, TOPIC_CLASSIFICATION_RETRY];

/// Provisions the trigger topics (one partition, replication 1) and returns
/// the ones this call created. Topics that already exist are left alone; a
/// topic that cannot be created is logged and skipped.
pub async fn ensure_topics(broker: &str, topics: &[&str]) -> Result<Vec<String>, KafkaError> {
    let admin: AdminClient<_> = ClientConfig::new()
        .set("bootstrap.servers", broker)
        .create()?;
    let requested: Vec<NewTopic> = topics
        .iter()
        .map(|t| NewTopic::new(t, 1, TopicReplication::Fixed(1)))
        .collect();
    let mut created = Vec::new();
    for outcome in admin
        .create_topics(requested.iter(), &AdminOptions::new())
        .await?
    {
        match outcome {
            Ok(name) => {
                info!(topic = %name, "created trigger topic");
                created.push(name);
            }
            Err((name, RDKafkaErrorCode::TopicAlreadyExists)) => {
                debug!(topic = %name, "trigger topic present")
            }
            Err((name, err)) => warn!(topic = %name, %err, "could not create trigger topic"),
        }
    }
    Ok(created)
}

/// Consumer with manual commits, subscribed to `topics`.
pub fn subscribe(broker: &str, group: &str, topics: &[&str]) -> Result<StreamConsumer, KafkaError> {
    let consumer: StreamConsumer = ClientConfig::new()
        .set("group.id", group)
        .set("bootstrap.servers", broker)
        .set("enable.auto.commit", "false")
        .create()?;
    consumer.subscribe(topics)?;
    info!(?topics, group, "kafka consumer subscribed");
    Ok(consumer)
}

use std::sync::Arc;

use futures_lite::StreamExt;
use lapin::options::{BasicAckOptions, BasicNackOptions};

use forum_shared::clients::rabbitmq::RabbitMQClient;
use forum_shared::types::event::{payloads, routing_keys, Event};

use crate::models::{Notification, NotificationKind};
use crate::AppState;

const QUEUE_NAME: &str = "forum-notification.events";

/// Which notification kind each upstream routing key produces.
const KIND_BY_ROUTING_KEY: [(&str, NotificationKind); 15] = [
    (routing_keys::NOTIFY_INVITECODE_USED, NotificationKind::InvitecodeUsed),
    (routing_keys::NOTIFY_FOLLOWING_USER, NotificationKind::FollowingUser),
    (routing_keys::NOTIFY_POINT_CHARGE, NotificationKind::PointCharge),
    (routing_keys::NOTIFY_ABUSE_POINT_DEDUCT, NotificationKind::AbusePointDeduct),
    (routing_keys::NOTIFY_POINT_EXCHANGE, NotificationKind::PointExchange),
    (routing_keys::NOTIFY_POINT_TRANSFER, NotificationKind::PointTransfer),
    (routing_keys::NOTIFY_POINT_ARTICLE_REWARD, NotificationKind::PointArticleReward),
    (routing_keys::NOTIFY_POINT_ARTICLE_THANK, NotificationKind::PointArticleThank),
    (routing_keys::NOTIFY_POINT_COMMENT_THANK, NotificationKind::PointCommentThank),
    (routing_keys::NOTIFY_BROADCAST, NotificationKind::Broadcast),
    (routing_keys::NOTIFY_ARTICLE, NotificationKind::Article),
    (routing_keys::NOTIFY_COMMENT, NotificationKind::Comment),
    (routing_keys::NOTIFY_AT, NotificationKind::At),
    (routing_keys::NOTIFY_COMMENTED, NotificationKind::Commented),
    (routing_keys::NOTIFY_REPLY, NotificationKind::Reply),
];

pub fn kind_for_routing_key(routing_key: &str) -> Option<NotificationKind> {
    KIND_BY_ROUTING_KEY
        .iter()
        .find(|(key, _)| *key == routing_key)
        .map(|(_, kind)| *kind)
}

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("no notification kind bound to routing key {0}")]
    UnknownRoutingKey(String),

    #[error("malformed event payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error(transparent)]
    Notification(#[from] crate::error::NotificationError),
}

impl DeliveryError {
    /// Only a failed store write can succeed on redelivery. Unknown keys,
    /// bad payloads and invalid targets would fail the same way again.
    pub fn should_requeue(&self) -> bool {
        matches!(
            self,
            DeliveryError::Notification(crate::error::NotificationError::Write { .. })
        )
    }
}

/// Turn one delivery into a notification.
pub fn handle_delivery(
    state: &AppState,
    routing_key: &str,
    data: &[u8],
) -> Result<Notification, DeliveryError> {
    let kind = kind_for_routing_key(routing_key)
        .ok_or_else(|| DeliveryError::UnknownRoutingKey(routing_key.to_string()))?;

    let event = serde_json::from_slice::<Event<payloads::NotificationTarget>>(data)?;
    let target = &event.data;

    tracing::info!(
        event_id = %event.id,
        source = %event.source,
        correlation_id = ?event.correlation_id,
        actor = ?event.user_id,
        user_id = %target.user_id,
        kind = %kind,
        "received notification event"
    );

    Ok(state
        .service
        .create_notification(&target.user_id, &target.data_id, kind)?)
}

/// Listen for every notification-producing forum event.
pub async fn listen_notification_events(
    state: Arc<AppState>,
    rabbitmq: RabbitMQClient,
) -> anyhow::Result<()> {
    let bindings: Vec<&str> = KIND_BY_ROUTING_KEY.iter().map(|(key, _)| *key).collect();
    let mut consumer = rabbitmq.subscribe(QUEUE_NAME, &bindings).await?;

    tracing::info!("listening for notification events");

    while let Some(delivery) = consumer.next().await {
        match delivery {
            Ok(delivery) => {
                let routing_key = delivery.routing_key.to_string();

                let settled = match handle_delivery(&state, &routing_key, &delivery.data) {
                    Ok(_) => delivery.ack(BasicAckOptions::default()).await,
                    Err(e) if e.should_requeue() => {
                        tracing::warn!(
                            error = %e,
                            routing_key = %routing_key,
                            "notification not stored, requeueing event"
                        );
                        delivery
                            .nack(BasicNackOptions {
                                requeue: true,
                                ..Default::default()
                            })
                            .await
                    }
                    Err(e) => {
                        tracing::error!(
                            error = %e,
                            routing_key = %routing_key,
                            "dropping notification event"
                        );
                        delivery.ack(BasicAckOptions::default()).await
                    }
                };

                if let Err(e) = settled {
                    tracing::error!(error = %e, routing_key = %routing_key, "failed to settle delivery");
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "notification consumer error");
            }
        }
    }

    Ok(())
}

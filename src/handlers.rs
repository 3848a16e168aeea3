// handlers.rs

use crate::{
    commands::{self, Origin, PowerRequest, SchedulerCommand},
    models::AppState,
};
use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

pub async fn handle_switch_ws_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    info!("Switch connection attempt");
    ws.on_upgrade(|socket| handle_switch(socket, state))
}

/// One connected switch client. Registration and deregistration go through
/// the scheduler's command channel: the scheduler reads the power snapshot
/// and inserts the observer on its own task, so the snapshot cannot race a
/// concurrent power change. Outbound updates and inbound commands run as
/// separate tasks joined by `select!`.
async fn handle_switch(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let observer_id = Uuid::new_v4();
    let (tx, mut rx) = mpsc::unbounded_channel();
    if state
        .requests
        .send(SchedulerCommand::Register {
            id: observer_id,
            sender: tx,
        })
        .await
        .is_err()
    {
        // scheduler is gone, nothing left to observe
        return;
    }

    let send_task = tokio::spawn(async move {
        while let Some(update) = rx.recv().await {
            let Ok(text) = serde_json::to_string(&update) else {
                break;
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let recv_task = tokio::spawn({
        let state = Arc::clone(&state);
        async move {
            while let Some(Ok(msg)) = receiver.next().await {
                let Ok(text) = msg.to_text() else { continue };
                match commands::parse_switch_message(text) {
                    Some(power) => {
                        info!(%observer_id, ?power, "switch message received");
                        let req = PowerRequest {
                            power,
                            origin: Origin::Observer(observer_id),
                        };
                        if state
                            .requests
                            .send(SchedulerCommand::SetPower(req))
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                    None => warn!(%observer_id, %text, "unusable message from switch"),
                }
            }
        }
    });

    tokio::pin!(send_task, recv_task);
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    };

    let _ = state
        .requests
        .send(SchedulerCommand::Deregister { id: observer_id })
        .await;
}

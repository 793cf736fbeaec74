//! Built-in message handlers and the default dispatch table.

use crate::dispatcher::{Dispatcher, Handler, HandlerContext};
use crate::error::SessionError;
use crate::message::{Message, MessageType};
use crate::response::Response;
use crate::room::{Room, RoomStatus};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

const ROOM_KEY: &str = "room";

/// Dispatcher with every built-in handler registered.
pub fn default_dispatcher() -> Dispatcher {
    let mut dispatcher = Dispatcher::new();
    let mut results = vec![
        dispatcher.register(MessageType::CREATE_GAME, CreateGameHandler),
        dispatcher.register(MessageType::JOIN_GAME, JoinGameHandler),
        dispatcher.register(MessageType::LEAVE_GAME, LeaveGameHandler),
        dispatcher.register(
            MessageType::START_GAME,
            StatusHandler::new(RoomStatus::Started, "Started game"),
        ),
        dispatcher.register(
            MessageType::END_GAME,
            StatusHandler::new(RoomStatus::Completed, "Completed game"),
        ),
    ];
    for (kind, reply) in [
        (MessageType::TRANSFER_MASTER, "Transferred master"),
        (MessageType::CONFIGURE_PROMPT_COUNT, "Configured prompt count"),
        (MessageType::USE_SAVED_PROMPT, "Used saved prompt"),
        (MessageType::WRITE_PROMPT, "Wrote prompt"),
        (MessageType::RECEIVE_PROMPT, "Received prompt"),
        (MessageType::PERFORM_PROMPT, "Performed prompt"),
        (MessageType::DRINK_FOR_PROMPT, "Drank for prompt"),
        (MessageType::CHANGE_PLAYER_NAME, "Changed player name"),
    ] {
        results.push(dispatcher.register(kind, AcknowledgeHandler(reply)));
    }

    for e in results.into_iter().filter_map(Result::err) {
        tracing::error!(error = %e, "failed to register built-in handler");
    }
    dispatcher
}

/// `create_game`: opens a room with the sender as first member.
pub struct CreateGameHandler;

#[async_trait]
impl Handler for CreateGameHandler {
    async fn handle(
        &self,
        ctx: &HandlerContext,
        _message: &Message,
    ) -> Result<Response, SessionError> {
        let (room, user_id) = ctx.registry.create_room(&ctx.connection).await?;
        Ok(
            Response::success(format!("Created game {}", room.id()))
                .with_content(json!({ "room": room.id(), "userId": user_id })),
        )
    }
}

/// `join_game`: content `{room}`. Other members are told who arrived.
pub struct JoinGameHandler;

#[async_trait]
impl Handler for JoinGameHandler {
    async fn handle(
        &self,
        ctx: &HandlerContext,
        message: &Message,
    ) -> Result<Response, SessionError> {
        let room_id = message.content_str(ROOM_KEY)?;
        let (room, user_id) = ctx.registry.join_room(&ctx.connection, room_id).await?;

        let content = json!({ "room": room.id(), "userId": &user_id });
        let notice = Response::success(format!("Client {} joined game {}", user_id, room.id()))
            .with_content(content.clone());
        room.broadcast_except(&notice, ctx.connection.id()).await;

        Ok(Response::success(format!("Joined game {}", room.id())).with_content(content))
    }
}

/// `leave_game`: content `{room}`. Remaining members are told who left.
pub struct LeaveGameHandler;

#[async_trait]
impl Handler for LeaveGameHandler {
    async fn handle(
        &self,
        ctx: &HandlerContext,
        message: &Message,
    ) -> Result<Response, SessionError> {
        let room_id = message.content_str(ROOM_KEY)?;
        let binding = ctx
            .registry
            .leave_room(ctx.connection.id(), room_id)
            .await?;

        let content = json!({ "room": room_id, "userId": &binding.user_id });
        if let Some(room) = ctx.registry.room(room_id).await {
            let notice = Response::success(format!(
                "Client {} left game {}",
                binding.user_id, room_id
            ))
            .with_content(content.clone());
            room.broadcast(&notice).await;
        }

        Ok(Response::success(format!("Left game {}", room_id)).with_content(content))
    }
}

/// Moves the sender's room to a target status and tells the whole room.
pub struct StatusHandler {
    target: RoomStatus,
    verb: &'static str,
}

impl StatusHandler {
    pub fn new(target: RoomStatus, verb: &'static str) -> Self {
        StatusHandler { target, verb }
    }
}

#[async_trait]
impl Handler for StatusHandler {
    async fn handle(
        &self,
        ctx: &HandlerContext,
        message: &Message,
    ) -> Result<Response, SessionError> {
        let room = member_room(ctx, message).await?;
        room.set_status(self.target).await?;

        let response = Response::success(format!("{} {}", self.verb, room.id()))
            .with_content(json!({ "room": room.id(), "status": self.target }));
        room.broadcast_except(&response, ctx.connection.id()).await;
        Ok(response)
    }
}

/// Replies `Success` without touching any state. Stands in for game rules
/// that live outside the session layer.
pub struct AcknowledgeHandler(pub &'static str);

#[async_trait]
impl Handler for AcknowledgeHandler {
    async fn handle(
        &self,
        _ctx: &HandlerContext,
        message: &Message,
    ) -> Result<Response, SessionError> {
        tracing::debug!(kind = %message.kind, "acknowledged message");
        Ok(Response::success(self.0))
    }
}

/// The room named in the message, provided the sender is bound to it.
async fn member_room(ctx: &HandlerContext, message: &Message) -> Result<Arc<Room>, SessionError> {
    let room_id = message.content_str(ROOM_KEY)?;
    let room = ctx
        .registry
        .room(room_id)
        .await
        .ok_or_else(|| SessionError::RoomNotFound(room_id.to_string()))?;
    if !room.contains(ctx.connection.id()).await {
        return Err(SessionError::ClientNotFound(room_id.to_string()));
    }
    Ok(room)
}

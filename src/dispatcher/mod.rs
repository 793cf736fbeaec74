
use crate::connection::ConnectionHandle;
use crate::error::SessionError;
use crate::message::{Message, MessageType};
use crate::registry::SessionRegistry;
use crate::response::Response;
use async_trait::async_trait;
use futures::FutureExt;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// What a handler gets to work with besides the message itself.
#[derive(Clone)]
pub struct HandlerContext {
    pub registry: Arc<SessionRegistry>,
    pub connection: ConnectionHandle,
}

impl HandlerContext {
    pub fn new(registry: Arc<SessionRegistry>, connection: ConnectionHandle) -> Self {
        HandlerContext {
            registry,
            connection,
        }
    }
}

/// Game logic for one message type.
///
/// Handlers validate their own content; the dispatcher only routes.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(
        &self,
        ctx: &HandlerContext,
        message: &Message,
    ) -> Result<Response, SessionError>;
}

/// Routing table from message type to handler.
#[derive(Default, Clone)]
pub struct Dispatcher {
    handlers: HashMap<MessageType, Arc<dyn Handler>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a handler. A second registration for the same type is an error;
    /// use [`Dispatcher::replace`] to override on purpose.
    pub fn register<H>(&mut self, kind: MessageType, handler: H) -> Result<(), SessionError>
    where
        H: Handler + 'static,
    {
        if self.handlers.contains_key(&kind) {
            return Err(SessionError::DuplicateHandler(kind.to_string()));
        }
        self.handlers.insert(kind, Arc::new(handler));
        Ok(())
    }

    /// Installs `handler` for `kind`, returning whatever it displaced.
    pub fn replace<H>(&mut self, kind: MessageType, handler: H) -> Option<Arc<dyn Handler>>
    where
        H: Handler + 'static,
    {
        self.handlers.insert(kind, Arc::new(handler))
    }

    pub fn contains(&self, kind: &MessageType) -> bool {
        self.handlers.contains_key(kind)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Routes `message` to its handler.
    ///
    /// Unknown types produce an `UnknownMessageType` response rather than an
    /// error. A panicking handler produces an `Error` response.
    pub async fn dispatch(
        &self,
        message: &Message,
        ctx: &HandlerContext,
    ) -> Result<Response, SessionError> {
        let Some(handler) = self.handlers.get(&message.kind) else {
            tracing::debug!(kind = %message.kind, "no handler registered");
            return Ok(Response::unknown_message_type(message.kind.as_str()));
        };

        match AssertUnwindSafe(handler.handle(ctx, message))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::error!(kind = %message.kind, connection = %ctx.connection.id(), reason = %reason, "handler panicked");
                Ok(Response::server_error(format!(
                    "Failed to handle {}",
                    message.kind
                )))
            }
        }
    }
}

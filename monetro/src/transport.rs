//! The [`Transport`] trait.
//!
//! Byte level framing, socket lifecycle and authentication live behind this
//! trait. The engine only sends command text and receives raw reply text.
use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, PoisonError},
};
use tokio::sync::Notify;

use crate::{Result, common::verbose, connection::Config, error::ConnectionError};

/// A connection that can exchange MAPI command and reply text.
///
/// Futures must be [`Send`], each request runs on its own task.
pub trait Transport: Send + Sized + 'static {
    /// Open and authenticate a new connection.
    ///
    /// Implementor should pass [`Config::reply_size`] to the server.
    fn connect(config: &Config) -> impl Future<Output = Result<Self>> + Send;

    /// Send one command and read the complete reply.
    fn execute(&mut self, command: &str) -> impl Future<Output = Result<String>> + Send;

    /// Request `count` rows of result `query_id` starting from `offset`.
    fn fetch_more(
        &mut self,
        query_id: i64,
        offset: i64,
        count: i64,
    ) -> impl Future<Output = Result<String>> + Send;

    /// Toggle whether the server sends the column size header.
    fn set_size_header(&mut self, with_size_header: bool) -> impl Future<Output = Result<()>> + Send;

    /// Close the connection.
    fn disconnect(&mut self) -> impl Future<Output = Result<()>> + Send;
}

/// One request sent to a [`Transport`].
#[derive(Debug, Clone)]
pub(crate) enum Request {
    Execute(String),
    FetchMore { query_id: i64, offset: i64, count: i64 },
}

impl Request {
    pub(crate) async fn send<T: Transport>(self, io: &mut T) -> Result<String> {
        match self {
            Request::Execute(command) => io.execute(&command).await,
            Request::FetchMore { query_id, offset, count } => {
                io.fetch_more(query_id, offset, count).await
            },
        }
    }
}

/// In memory [`Transport`] that replays a prepared script.
///
/// Every command received is recorded, readable from a [`Commands`] handle.
/// Replies are returned in order, an exhausted script fails with
/// [`ConnectionError::Unavailable`].
///
/// ```
/// use monetro::transport::Scripted;
///
/// let mut io = Scripted::new();
/// io.reply("&2 1 -1\n");
/// let commands = io.commands();
/// assert!(commands.take().is_empty());
/// ```
#[derive(Debug, Default)]
pub struct Scripted {
    replies: VecDeque<Reply>,
    commands: Commands,
}

#[derive(Debug)]
struct Reply {
    text: String,
    hold: Option<Arc<Notify>>,
}

impl Scripted {
    pub fn new() -> Scripted {
        Scripted::default()
    }

    /// Queue a reply.
    pub fn reply(&mut self, text: impl Into<String>) -> &mut Self {
        self.replies.push_back(Reply { text: text.into(), hold: None });
        self
    }

    /// Queue a reply that is only released after [`Notify::notify_one`].
    ///
    /// The command is recorded as soon as it arrives.
    pub fn reply_held(&mut self, text: impl Into<String>) -> Arc<Notify> {
        let hold = Arc::new(Notify::new());
        self.replies.push_back(Reply { text: text.into(), hold: Some(hold.clone()) });
        hold
    }

    /// Returns a handle to the recorded commands.
    pub fn commands(&self) -> Commands {
        self.commands.clone()
    }

    fn next_reply(&mut self) -> Result<Reply> {
        match self.replies.pop_front() {
            Some(reply) => Ok(reply),
            None => Err(ConnectionError::Unavailable("script exhausted".into()).into()),
        }
    }

    async fn respond(&mut self, command: String) -> Result<String> {
        verbose!(%command, "scripted request");
        self.commands.push(command);
        let reply = self.next_reply()?;
        if let Some(hold) = reply.hold {
            hold.notified().await;
        }
        Ok(reply.text)
    }
}

impl Transport for Scripted {
    async fn connect(_: &Config) -> Result<Self> {
        Err(ConnectionError::Unavailable("scripted transport has no server".into()).into())
    }

    async fn execute(&mut self, command: &str) -> Result<String> {
        self.respond(command.to_owned()).await
    }

    async fn fetch_more(&mut self, query_id: i64, offset: i64, count: i64) -> Result<String> {
        self.respond(format!("Xexport {query_id} {offset} {count}")).await
    }

    async fn set_size_header(&mut self, with_size_header: bool) -> Result<()> {
        self.commands.push(format!("Xsizeheader {}", with_size_header as u8));
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.commands.push("disconnect".into());
        Ok(())
    }
}

/// Shared log of commands received by [`Scripted`].
#[derive(Debug, Clone, Default)]
pub struct Commands(Arc<Mutex<Vec<String>>>);

impl Commands {
    fn push(&self, command: String) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).push(command);
    }

    /// Take all recorded commands.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Returns the number of recorded commands.
    pub fn len(&self) -> usize {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

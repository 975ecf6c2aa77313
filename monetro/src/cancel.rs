//! Cancellable request execution.
//!
//! The transport has no cancel operation. Each request runs on its own task
//! which holds the transport lock until the reply is fully read, the caller
//! may stop waiting at any time. An abandoned reply is still consumed by the
//! task, so the next request finds the transport in a clean state.
use std::{future::pending, sync::Arc, time::Duration};
use tokio::sync::{Mutex, oneshot};
use tokio_util::sync::CancellationToken;

use crate::{
    Result,
    common::verbose,
    error::{Cancelled, ConnectionError},
    transport::{Request, Transport},
};

/// Shared transport handle, [`None`] once the connection is closed.
pub(crate) type Shared<T> = Arc<Mutex<Option<T>>>;

/// Signals that abandon a request.
#[derive(Debug, Clone, Default)]
pub(crate) struct Cancel {
    pub(crate) token: Option<CancellationToken>,
    pub(crate) timeout: Option<Duration>,
}

impl Cancel {
    pub(crate) fn new(timeout: Option<Duration>) -> Self {
        Self { token: None, timeout }
    }

    fn check(&self) -> Result<(), Cancelled> {
        match &self.token {
            Some(token) if token.is_cancelled() => Err(Cancelled::Token),
            _ => Ok(()),
        }
    }
}

/// Run `request` on its own task, resolving to the reply or to the first
/// cancellation signal.
pub(crate) async fn request<T: Transport>(
    io: Shared<T>,
    request: Request,
    cancel: Cancel,
) -> Result<String> {
    cancel.check()?;

    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let mut io = io.lock().await;
        let result = match io.as_mut() {
            Some(io) => request.send(io).await,
            None => Err(ConnectionError::Closed.into()),
        };
        if tx.send(result).is_err() {
            verbose!("reply of abandoned request discarded");
        }
    });

    let token = async {
        match &cancel.token {
            Some(token) => token.cancelled().await,
            None => pending().await,
        }
    };

    let deadline = async {
        match cancel.timeout {
            Some(timeout) => {
                tokio::time::sleep(timeout).await;
                timeout
            },
            None => pending().await,
        }
    };

    tokio::select! {
        biased;
        reply = rx => match reply {
            Ok(reply) => reply,
            Err(_) => Err(ConnectionError::TaskAborted.into()),
        },
        _ = token => {
            verbose!("request cancelled by token");
            Err(Cancelled::Token.into())
        },
        timeout = deadline => {
            verbose!(?timeout, "request deadline elapsed");
            Err(Cancelled::Deadline(timeout).into())
        },
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{ErrorKind, transport::Scripted};

    fn shared(io: Scripted) -> Shared<Scripted> {
        Arc::new(Mutex::new(Some(io)))
    }

    fn execute(sql: &str) -> Request {
        Request::Execute(sql.into())
    }

    #[tokio::test]
    async fn reply_wins() {
        let mut io = Scripted::new();
        io.reply("&2 1 -1\n");
        let io = shared(io);

        let reply = request(io, execute("DELETE FROM t"), Cancel::new(Some(Duration::from_secs(5))))
            .await
            .unwrap();
        assert_eq!(reply, "&2 1 -1\n");
    }

    #[tokio::test]
    async fn token_abandons_without_poisoning() {
        let mut script = Scripted::new();
        let hold = script.reply_held("&2 1 -1\n");
        script.reply("&2 2 -1\n");
        let commands = script.commands();
        let io = shared(script);

        let token = CancellationToken::new();
        let cancel = Cancel { token: Some(token.clone()), timeout: None };

        let pending = tokio::spawn(request(io.clone(), execute("first"), cancel));
        while commands.is_empty() {
            tokio::task::yield_now().await;
        }
        token.cancel();

        let err = pending.await.unwrap().unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Cancelled(Cancelled::Token)));

        hold.notify_one();
        let reply = request(io, execute("second"), Cancel::default()).await.unwrap();
        assert_eq!(reply, "&2 2 -1\n");
        assert_eq!(commands.take(), ["first", "second"]);
    }

    #[tokio::test]
    async fn deadline_elapses() {
        let mut script = Scripted::new();
        let hold = script.reply_held("&2 1 -1\n");
        script.reply("&2 2 -1\n");
        let io = shared(script);

        let timeout = Duration::from_millis(20);
        let err = request(io.clone(), execute("slow"), Cancel::new(Some(timeout)))
            .await
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Cancelled(Cancelled::Deadline(d)) if *d == timeout));

        hold.notify_one();
        let reply = request(io, execute("next"), Cancel::default()).await.unwrap();
        assert_eq!(reply, "&2 2 -1\n");
    }

    #[tokio::test]
    async fn cancelled_token_sends_nothing() {
        let script = Scripted::new();
        let commands = script.commands();
        let token = CancellationToken::new();
        token.cancel();

        let err = request(shared(script), execute("never"), Cancel { token: Some(token), timeout: None })
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert!(commands.is_empty());
    }

    #[tokio::test]
    async fn closed_transport() {
        let io: Shared<Scripted> = Arc::new(Mutex::new(None));
        let err = request(io, execute("SELECT 1"), Cancel::default()).await.unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Connection(ConnectionError::Closed)));
    }
}

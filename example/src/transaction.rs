use std::time::Duration;
use tokio_util::sync::CancellationToken;

use monetro::{Config, Connection, ErrorKind, IsolationLevel, Result, query, transport::Scripted};

pub async fn main() -> Result<()> {
    let mut io = Scripted::new();
    io.reply("&4 t\n")
        .reply("&2 1 3\n")
        .reply("&4 f\n")
        .reply("&4 t\n")
        .reply("!25001!START TRANSACTION: cannot start a transaction within a transaction\n");
    let held = io.reply_held("&2 0 -1\n");
    io.reply("&4 f\n");
    let conn = Connection::from_transport(io, Config::default());

    let mut tx = conn.begin().await?;
    query::<_, ()>("INSERT INTO post(title) VALUES (:title)", &mut tx)
        .bind_named("title", "inside")
        .await?;
    tx.commit().await?;

    if let Err(err) = conn.begin_with(false, IsolationLevel::Snapshot).await {
        tracing::info!("{err}");
    }

    let mut tx = conn.begin_with(false, IsolationLevel::RepeatableRead).await?;
    match conn.begin().await {
        Err(err) if matches!(err.kind(), ErrorKind::Database(_)) => tracing::info!("{err}"),
        other => tracing::warn!("unexpected {other:?}"),
    }

    let token = CancellationToken::new();
    let cancel = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
    });

    let err = query::<_, ()>("DELETE FROM post", &tx)
        .cancel_on(token)
        .execute()
        .await
        .unwrap_err();
    tracing::info!(cancelled = err.is_cancelled(), "{err}");
    held.notify_one();

    tx.rollback().await?;
    conn.close().await?;

    Ok(())
}

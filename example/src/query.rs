use futures::TryStreamExt;
use monetro::{Config, Connection, FromRow, Param, Result, query, transport::Scripted};

#[derive(Debug, FromRow)]
#[allow(unused)]
struct Post {
    id: i32,
    title: String,
    created: Option<time::OffsetDateTime>,
}

const POSTS: &str = "\
&1 1 3 3 2
% sys.post,\tsys.post,\tsys.post # table_name
% id,\ttitle,\tcreated # name
% int,\tvarchar,\ttimestamptz # type
% 1,\t5,\t32 # length
[ 1,\t\"hello\",\t2025-04-01 10:00:00.000000+02:00\t]
[ 2,\t\"world\",\tNULL\t]
";

const POSTS_PAGE: &str = "\
&6 1 3 1 2
[ 3,\t\"again\",\t2025-04-02 08:30:00.000000+00:00\t]
";

pub async fn main() -> Result<()> {
    let mut io = Scripted::new();
    io.reply("&3 0 0\n")
        .reply("&5 7 1 6 1\n")
        .reply("&2 1 1\n")
        .reply("&2 1 2\n")
        .reply("&3 0 0\n")
        .reply(POSTS)
        .reply(POSTS_PAGE)
        .reply(POSTS)
        .reply(POSTS_PAGE);
    let commands = io.commands();

    let config = Config::default()
        .with_reply_size(2)
        .with_time_zone(time::macros::offset!(+7));
    let conn = Connection::connect_with(io, config).await?;

    let mut stmt = conn.prepare("INSERT INTO post(title) VALUES (?)").await?;
    for title in ["hello", "world"] {
        let res = stmt.execute(&[Param::new(title)]).await?;
        tracing::info!(last_insert_id = res.last_insert_id, "inserted");
    }
    stmt.close().await?;

    let rows = conn.query("SELECT id, title, created FROM post", &[]).await?;
    for column in rows.columns() {
        tracing::info!(
            name = column.name(),
            kind = column.database_type_name(),
            "column {:?}",
            column.scan_type()
        );
    }
    let rows: Vec<_> = rows.try_collect().await?;
    tracing::info!("{} rows", rows.len());

    let posts = query::<_, Post>("SELECT id, title, created FROM post WHERE title <> :title", &conn)
        .bind_named("title", "it's")
        .fetch_all()
        .await?;
    for post in posts {
        tracing::info!("{post:?}");
    }

    conn.close().await?;

    for command in commands.take() {
        tracing::info!(%command, "sent");
    }

    Ok(())
}

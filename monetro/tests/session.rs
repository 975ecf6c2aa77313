use std::time::Duration;

use monetro::{
    Config, Connection, ErrorKind, IsolationLevel, Param, Value,
    mapi::ScanType,
    transport::{Commands, Scripted},
};

#[derive(Debug, PartialEq, monetro::FromRow)]
struct Post {
    id: i32,
    #[monetro(rename = "title")]
    name: String,
    score: Option<f64>,
}

#[derive(Debug, PartialEq, monetro::Decode)]
struct PostId(i64);

const POSTS: &str = "\
&1 5 3 3 2
% sys.post,\tsys.post,\tsys.post # table_name
% id,\ttitle,\tscore # name
% int,\tvarchar,\tdecimal # type
% 1,\t16,\t7 # length
% 32 0,\t16 0,\t64 2 # typesizes
[ 1,\t\"first\",\t12.50\t]
[ 2,\t\"it\\'s\",\tNULL\t]
";

const POSTS_PAGE: &str = "\
&6 5 3 1 2
[ 3,\t\"third\",\t0.25\t]
";

fn session() -> (Scripted, Commands) {
    let io = Scripted::new();
    let commands = io.commands();
    (io, commands)
}

#[tokio::test]
async fn paginated_query() {
    let config = Config::default().with_reply_size(2);
    let (mut io, commands) = session();
    io.reply(POSTS).reply(POSTS_PAGE);

    let conn = Connection::connect_with(io, config).await.unwrap();
    let mut rows = conn.query("SELECT id, title, score FROM post", &[]).await.unwrap();

    assert_eq!(rows.row_count(), 3);
    assert_eq!(rows.column_names(), ["id", "title", "score"]);

    let score = rows.column(2).unwrap();
    assert_eq!(score.database_type_name(), "DECIMAL");
    assert_eq!(score.precision_scale(), Some((64, 2)));
    assert_eq!(score.scan_type(), ScanType::Float64);
    assert_eq!(rows.column(1).unwrap().length(), Some(16));

    let mut posts = vec![];
    while let Some(post) = rows.next_as::<Post>().await {
        posts.push(post.unwrap());
    }
    assert!(rows.is_done());
    assert!(rows.next().await.is_none());

    assert_eq!(
        posts,
        [
            Post { id: 1, name: "first".into(), score: Some(12.5) },
            Post { id: 2, name: "it's".into(), score: None },
            Post { id: 3, name: "third".into(), score: Some(0.25) },
        ]
    );
    assert_eq!(
        commands.take(),
        ["Xsizeheader 1", "SELECT id, title, score FROM post", "Xexport 5 2 1"]
    );
}

#[tokio::test]
async fn query_builder_with_derive() {
    let (mut io, commands) = session();
    io.reply("&5 2 1 1 1\n% .prepare # table_name\n% type # name\n% varchar # type\n% 6 # length\n")
        .reply("&1 0 1 1 1\n% sys.post # table_name\n% id # name\n% bigint # type\n% 2 # length\n[ 42\t]\n")
        .reply("&3 0 0\n");
    let conn = Connection::from_transport(io, Config::default());

    let id = monetro::query::<_, (PostId,)>("SELECT id FROM post WHERE title = ?", &conn)
        .prepared()
        .bind("first")
        .fetch_one()
        .await
        .unwrap();
    assert_eq!(id.0, PostId(42));

    assert_eq!(
        commands.take(),
        [
            "PREPARE SELECT id FROM post WHERE title = ?",
            "EXEC 2 ('first')",
            "DEALLOCATE 2",
        ]
    );
}

#[tokio::test]
async fn transaction_scope() {
    let (mut io, commands) = session();
    io.reply("&4 t\n")
        .reply("&2 1 17\n")
        .reply("!M0M29!INSERT INTO: PRIMARY KEY constraint 'post.post_pkey' violated\n")
        .reply("&4 f\n");
    let conn = Connection::from_transport(io, Config::default());

    let mut tx = conn.begin_with(false, IsolationLevel::Serializable).await.unwrap();

    let res = monetro::query::<_, ()>("INSERT INTO post(title) VALUES (:title)", &mut tx)
        .bind_named("title", "new")
        .await
        .unwrap();
    assert_eq!(res.last_insert_id, 17);

    let err = tx
        .execute("INSERT INTO post(id) VALUES (:id)", &[Param::named("id", 1)])
        .await
        .unwrap_err();
    let ErrorKind::Database(db) = err.kind() else {
        panic!("expected server error, got {err}");
    };
    assert_eq!(db.message(), "M0M29!INSERT INTO: PRIMARY KEY constraint 'post.post_pkey' violated");
    assert_eq!(db.code(), Some("M0M29"));

    tx.rollback().await.unwrap();
    assert!(!tx.is_active());
    drop(tx);

    assert_eq!(
        commands.take(),
        [
            "START TRANSACTION ISOLATION LEVEL SERIALIZABLE",
            "INSERT INTO post(title) VALUES ('new')",
            "INSERT INTO post(id) VALUES (1)",
            "ROLLBACK",
        ]
    );
}

#[tokio::test]
async fn abandoned_request_keeps_connection_usable() {
    let (mut io, commands) = session();
    let hold = io.reply_held("&1 1 1 1 1\n% x # name\n% int # type\n[ 1\t]\n");
    io.reply("&1 2 1 1 1\n% y # name\n% int # type\n[ 2\t]\n");
    let conn = Connection::from_transport(io, Config::default());

    let err = conn
        .statement("SELECT slow()")
        .timeout(Duration::from_millis(20))
        .query(&[])
        .await
        .unwrap_err();
    assert!(err.is_cancelled());

    hold.notify_one();

    let mut rows = conn.query("SELECT 2 AS y", &[]).await.unwrap();
    let row = rows.next().await.unwrap().unwrap();
    assert_eq!(row.get("y"), Some(&Value::Int32(2)));
    assert_eq!(commands.take(), ["SELECT slow()", "SELECT 2 AS y"]);
}

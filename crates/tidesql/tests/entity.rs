mod common;

use common::MockConnector;
use std::sync::Arc;
use tidesql::{ConnectionConfig, Entity, FromRow, Record, Router, Row, Session, Value};

#[derive(Debug, Clone, Default, PartialEq, FromRow, Entity)]
#[orm(table = "user")]
struct User {
    #[orm(id)]
    id: u64,
    username: String,
    status: i32,
}

/// No `#[orm(id)]`: the key comes from the table schema.
#[derive(Debug, Clone, Default, PartialEq, FromRow, Entity)]
struct BlogPost {
    post_id: i64,
    #[orm(column = "post_title")]
    title: String,
}

fn session(driver: &MockConnector) -> Session<MockConnector> {
    let config = ConnectionConfig::new("primary").charset("");
    Session::new(Arc::new(Router::new(driver.clone(), config)))
}

fn user_row(id: i64, username: &str, status: i64) -> Row {
    Row::from_pairs([
        ("id", Value::Int(id)),
        ("username", Value::from(username)),
        ("status", Value::Int(status)),
    ])
}

#[test]
fn derive_describes_the_table() {
    let descriptor = User::descriptor();
    assert_eq!(descriptor.table, "user");
    assert_eq!(descriptor.primary_key, Some("id"));
    assert_eq!(descriptor.columns, &["id", "username", "status"]);

    assert_eq!(BlogPost::TABLE, "blog_post");
    assert_eq!(BlogPost::PRIMARY_KEY, None);
    assert_eq!(BlogPost::COLUMNS, &["post_id", "post_title"]);
}

#[test]
fn derive_values_and_set_value() {
    let mut user = User {
        id: 0,
        username: "a".into(),
        status: 3,
    };
    assert_eq!(
        user.values(),
        vec![
            ("id", Value::UInt(0)),
            ("username", Value::from("a")),
            ("status", Value::Int(3)),
        ]
    );

    user.set_value("id", Value::UInt(9)).unwrap();
    assert_eq!(user.id, 9);
    assert!(user.set_value("nope", Value::Null).unwrap_err().is_configuration());
    assert!(user.set_value("status", Value::from("x")).is_err());
}

#[test]
fn derive_from_row_uses_column_names() {
    let row = Row::from_pairs([
        ("post_id", Value::Int(4)),
        ("post_title", Value::from("hello")),
    ]);
    let post = BlogPost::from_row(&row).unwrap();
    assert_eq!(post.post_id, 4);
    assert_eq!(post.title, "hello");
}

#[tokio::test]
async fn save_new_record_inserts_and_assigns_id() {
    let driver = MockConnector::new();
    driver.set_next_insert_id(17);
    let session = session(&driver);

    let mut user = Record::new(User {
        id: 0,
        username: "a".into(),
        status: 0,
    });
    assert!(session.is_new(&user));

    session.save(&mut user).await.unwrap();
    assert_eq!(user.id, 17);
    assert!(!session.is_new(&user));

    let queries = driver.queries();
    assert_eq!(queries.len(), 1);
    assert_eq!(
        queries[0],
        "INSERT INTO `user` (`username`, `status`) VALUES (?, ?)"
    );
}

#[tokio::test]
async fn second_save_updates_by_captured_id() {
    let driver = MockConnector::new();
    driver.set_next_insert_id(17);
    let session = session(&driver);

    let mut user = Record::new(User {
        id: 0,
        username: "a".into(),
        status: 0,
    });
    session.save(&mut user).await.unwrap();

    user.id = 99;
    user.status = 1;
    session.save(&mut user).await.unwrap();

    let last = driver.last_query().unwrap();
    assert_eq!(
        last.sql,
        "UPDATE `user` SET `id` = ?, `username` = ?, `status` = ? WHERE `id` = ?"
    );
    assert_eq!(
        last.params.positional_values(),
        &[
            Value::UInt(99),
            Value::from("a"),
            Value::Int(1),
            Value::UInt(17)
        ]
    );

    // the new values are now the persisted ones
    let snapshot = session.tracker().snapshot_of(&user).unwrap();
    assert_eq!(snapshot.value("id"), Some(&Value::UInt(99)));
}

#[tokio::test]
async fn update_must_affect_exactly_one_row() {
    let driver = MockConnector::new();
    driver.push_rows(vec![user_row(3, "a", 0)]);
    let session = session(&driver);

    let mut user = session
        .find::<User>()
        .unwrap()
        .where_eq([("id", 3_i64)])
        .unwrap()
        .one()
        .await
        .unwrap()
        .unwrap();

    driver.push_affected(0);
    let err = session.save(&mut user).await.unwrap_err();
    assert!(err.is_save_conflict());

    driver.push_affected(2);
    assert!(session.save(&mut user).await.unwrap_err().is_save_conflict());
}

#[tokio::test]
async fn loaded_record_with_zero_id_is_not_new() {
    let driver = MockConnector::new();
    driver.push_rows(vec![user_row(0, "zero", 0)]);
    let session = session(&driver);

    let mut users = session.find::<User>().unwrap().all().await.unwrap();
    let mut user = users.remove(0);
    assert!(!session.is_new(&user));

    session.save(&mut user).await.unwrap();
    assert!(driver.last_query().unwrap().sql.starts_with("UPDATE"));
}

#[tokio::test]
async fn prefilled_id_on_new_record_is_inserted() {
    let driver = MockConnector::new();
    let session = session(&driver);

    let mut user = Record::new(User {
        id: 500,
        username: "b".into(),
        status: 1,
    });
    assert!(session.is_new(&user));
    session.save(&mut user).await.unwrap();

    assert_eq!(user.id, 500);
    assert_eq!(
        driver.last_query().unwrap().sql,
        "INSERT INTO `user` (`id`, `username`, `status`) VALUES (?, ?, ?)"
    );
}

#[tokio::test]
async fn registration_is_per_identity() {
    let driver = MockConnector::new();
    driver.push_rows(vec![user_row(1, "same", 0)]);
    let session = session(&driver);

    let loaded = session.find::<User>().unwrap().one().await.unwrap().unwrap();
    let twin = Record::new((*loaded).clone());
    let copy = loaded.clone();

    assert!(!session.is_new(&loaded));
    assert!(session.is_new(&twin));
    assert!(session.is_new(&copy));
}

#[tokio::test]
async fn entity_query_renders_like_builder() {
    let driver = MockConnector::new();
    let session = session(&driver);

    session
        .find::<User>()
        .unwrap()
        .where_eq([("status", 1_i64)])
        .unwrap()
        .order_by("id", tidesql::Direction::Asc)
        .unwrap()
        .limit(5)
        .lock(true)
        .all()
        .await
        .unwrap();
    assert_eq!(
        driver.last_query().unwrap().sql,
        "SELECT * FROM `user` WHERE `status` = ? ORDER BY `id` ASC LIMIT 5 FOR UPDATE"
    );
}

#[tokio::test]
async fn schema_decides_key_without_id_attribute() {
    let driver = MockConnector::new();
    driver.set_schema("`blog_post`", &[("post_id", "auto_increment"), ("post_title", "")]);
    driver.set_next_insert_id(8);
    let session = session(&driver);

    let mut post = Record::new(BlogPost {
        post_id: 0,
        title: "t".into(),
    });
    session.save(&mut post).await.unwrap();
    assert_eq!(post.post_id, 8);

    post.title = "t2".into();
    session.save(&mut post).await.unwrap();

    let queries = driver.queries();
    assert_eq!(
        queries,
        vec![
            "SHOW FULL FIELDS FROM `blog_post`",
            "INSERT INTO `blog_post` (`post_title`) VALUES (?)",
            "UPDATE `blog_post` SET `post_id` = ?, `post_title` = ? WHERE `post_id` = ?",
        ]
    );
}

#[tokio::test]
async fn update_without_any_key_is_a_configuration_error() {
    let driver = MockConnector::new();
    driver.set_schema("`blog_post`", &[("post_id", ""), ("post_title", "")]);
    let session = session(&driver);

    let mut post = Record::new(BlogPost::default());
    session.attach(&post);
    let err = session.save(&mut post).await.unwrap_err();
    assert!(err.is_configuration());
}

#[tokio::test]
async fn delete_forgets_record() {
    let driver = MockConnector::new();
    driver.push_rows(vec![user_row(4, "gone", 0)]);
    let session = session(&driver);

    let user = session.find::<User>().unwrap().one().await.unwrap().unwrap();
    session.delete(&user).await.unwrap();

    assert!(session.is_new(&user));
    let last = driver.last_query().unwrap();
    assert_eq!(last.sql, "DELETE FROM `user` WHERE `id` = ?");
    assert_eq!(last.params.positional_values(), &[Value::UInt(4)]);

    let fresh = Record::new(User::default());
    assert!(session.delete(&fresh).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn zero_row_insert_is_a_save_conflict() {
    let driver = MockConnector::new();
    driver.push_affected(0);
    let session = session(&driver);

    let mut user = Record::new(User::default());
    let err = session.save(&mut user).await.unwrap_err();
    assert!(err.is_save_conflict());
    assert!(session.is_new(&user));
}

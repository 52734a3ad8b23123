use futures_util::StreamExt;
use posthread_posts::{publish_post, register_user};
use posthread_server::{app, AppState};
use std::time::Duration;
use tokio::net::TcpListener;
use uuid::Uuid;

async fn serve(state: AppState) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = app(state);
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn wait_for_subscribers(state: &AppState, post_id: Uuid, expected: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while state.comments.bus().subscriber_count(post_id) != expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("subscriber count should settle");
}

#[tokio::test]
async fn new_comments_are_streamed_to_subscribers() {
    let state = AppState::in_memory(10);
    let author = register_user(state.users.as_ref(), "alice", "alice@example.com").unwrap();
    let post = publish_post(
        state.posts.as_ref(),
        state.users.as_ref(),
        author.id,
        "Live",
        "Post with a live comment feed",
    )
    .unwrap();
    let base = serve(state.clone()).await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/api/posts/{}/comments/events", base, post.id))
        .send()
        .await
        .expect("failed to connect to comment stream");
    assert!(response.status().is_success());
    let mut stream = response.bytes_stream();
    wait_for_subscribers(&state, post.id, 1).await;

    let body = serde_json::json!({ "author_id": author.id, "content": "Streaming hello" });
    let created = client
        .post(format!("{}/api/posts/{}/comments", base, post.id))
        .header("content-type", "application/json")
        .body(serde_json::to_vec(&body).unwrap())
        .send()
        .await
        .unwrap();
    assert_eq!(created.status(), reqwest::StatusCode::CREATED);
    let created: serde_json::Value = serde_json::from_slice(&created.bytes().await.unwrap()).unwrap();
    let comment_id = created["id"].as_str().unwrap().to_string();

    let received = tokio::time::timeout(Duration::from_secs(5), async {
        let mut buffer = String::new();
        while let Some(chunk) = stream.next().await {
            buffer.push_str(&String::from_utf8_lossy(&chunk.unwrap()));
            if buffer.contains(&comment_id) && buffer.ends_with("\n\n") {
                break;
            }
        }
        buffer
    })
    .await
    .expect("comment event should arrive");

    assert!(received.contains("event: comment_created"), "{received}");
    assert!(received.contains("Streaming hello"), "{received}");
    assert_eq!(state.comments.bus().delivered_events(), 1);
}

#[tokio::test]
async fn unknown_post_has_no_stream() {
    let state = AppState::in_memory(10);
    let base = serve(state.clone()).await;

    let response = reqwest::get(format!(
        "{}/api/posts/{}/comments/events",
        base,
        Uuid::new_v4()
    ))
    .await
    .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
    assert_eq!(state.comments.bus().active_posts(), 0);
}

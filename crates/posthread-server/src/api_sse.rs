//! SSE stream of live comment events for one post.

use crate::api::{run_blocking, ApiError, ApiPath};
use crate::AppState;
use axum::{
    extract::Extension,
    response::sse::{Event, KeepAlive, KeepAliveStream, Sse},
};
use posthread_comments::{CommentEvent, Subscription};
use posthread_posts::DirectoryError;
use std::{convert::Infallible, sync::Arc};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

/// Events waiting to be written to one client.
const STREAM_BUFFER: usize = 16;

type EventSink = mpsc::Sender<Result<Event, Infallible>>;

/// Handler for `GET /api/posts/{postId}/comments/events`.
///
/// Streams a `comment_created` event for every comment added to the post
/// while the client stays connected.
pub async fn comment_stream_handler(
    Extension(state): Extension<Arc<AppState>>,
    ApiPath(post_id): ApiPath<Uuid>,
) -> Result<Sse<KeepAliveStream<ReceiverStream<Result<Event, Infallible>>>>, ApiError> {
    let posts = state.posts.clone();
    run_blocking(move || -> Result<(), DirectoryError> {
        posts
            .get_post(post_id)?
            .map(|_| ())
            .ok_or(DirectoryError::PostNotFound(post_id))
    })
    .await?;

    let subscription = state.comments.subscribe(post_id);
    let (tx, rx) = mpsc::channel(STREAM_BUFFER);
    tokio::spawn(forward_events(subscription, tx));

    Ok(Sse::new(ReceiverStream::new(rx)).keep_alive(KeepAlive::default()))
}

fn to_sse_event(event: &CommentEvent) -> Option<Event> {
    match serde_json::to_string(event) {
        Ok(data) => Some(
            Event::default()
                .event(event.kind.as_str())
                .id(event.comment.id.to_string())
                .data(data),
        ),
        Err(e) => {
            tracing::error!(comment_id = %event.comment.id, "failed to serialize comment event: {}", e);
            None
        }
    }
}

/// Moves events from a bus subscription to an SSE client until either side
/// goes away. The subscription is released on return.
pub(crate) async fn forward_events(mut subscription: Subscription, sink: EventSink) {
    let post_id = subscription.post_id();
    tracing::debug!(%post_id, "comment stream opened");

    loop {
        tokio::select! {
            () = sink.closed() => break,
            next = subscription.recv() => {
                let Some(event) = next else { break };
                let Some(sse) = to_sse_event(&event) else { continue };
                if sink.send(Ok(sse)).await.is_err() {
                    break;
                }
            }
        }
    }

    drop(subscription);
    tracing::debug!(%post_id, "comment stream closed");
}

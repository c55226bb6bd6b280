//! Forum service over the SQLite adapter.

mod common;

use chrono::Duration;
use common::{ana, harness, sam};
use solace_core::{AppError, VoteDirection};
use solace_services::{CommunityFeed, ForumEvent, PostDraft, SortOrder};

fn draft(title: &str, category: &str) -> PostDraft {
    PostDraft {
        title: title.to_string(),
        content: format!("{title} body"),
        category: category.to_string(),
        ..PostDraft::default()
    }
}

#[tokio::test]
async fn test_votes_toggle_and_exclude() {
    let h = harness().await;
    let forum = &h.state.forum;
    let post = forum.create_post(&ana(), draft("Hello", "General")).await.unwrap();

    let up = forum.toggle_post_vote(&sam(), post.id, VoteDirection::Up).await.unwrap();
    assert_eq!(up.votes.score(), 1);

    let cleared = forum.toggle_post_vote(&sam(), post.id, VoteDirection::Up).await.unwrap();
    assert_eq!(cleared.votes.score(), 0);
    assert!(cleared.votes.upvotes.is_empty());

    let down = forum.toggle_post_vote(&sam(), post.id, VoteDirection::Down).await.unwrap();
    assert_eq!(down.votes.score(), -1);

    let switched = forum.toggle_post_vote(&sam(), post.id, VoteDirection::Up).await.unwrap();
    assert_eq!(switched.votes.score(), 1);
    assert!(switched.votes.downvotes.is_empty());
    assert!(switched.votes.upvotes.contains("sam"));
}

#[tokio::test]
async fn test_concurrent_presses_by_one_user_serialize() {
    let h = harness().await;
    let forum = &h.state.forum;
    let post = forum.create_post(&ana(), draft("Race", "General")).await.unwrap();
    let comment = forum.add_comment(&ana(), post.id, "me too").await.unwrap();
    let voter = sam();

    for round in 0..20 {
        let (a, b) = tokio::join!(
            forum.toggle_post_vote(&voter, post.id, VoteDirection::Up),
            forum.toggle_post_vote(&voter, post.id, VoteDirection::Up),
        );
        a.unwrap();
        b.unwrap();
        let (c, d) = tokio::join!(
            forum.toggle_comment_vote(&voter, post.id, comment.id, VoteDirection::Down),
            forum.toggle_comment_vote(&voter, post.id, comment.id, VoteDirection::Down),
        );
        c.unwrap();
        d.unwrap();

        // Two presses of the same button always cancel out.
        let stored = forum.get_post(post.id).await.unwrap();
        assert_eq!(stored.votes.vote_of("sam"), None, "round {round}");
        assert_eq!(stored.comments[0].votes.vote_of("sam"), None, "round {round}");
    }
}

#[tokio::test]
async fn test_comments_follow_authorship() {
    let h = harness().await;
    let forum = &h.state.forum;
    let post = forum.create_post(&ana(), draft("Rough day", "Anxiety")).await.unwrap();

    h.clock.advance(Duration::minutes(3));
    let comment = forum.add_comment(&sam(), post.id, "  You've got this  ").await.unwrap();
    assert_eq!(comment.text, "You've got this");
    assert_eq!(comment.author_name, "Sam Okafor");

    let err = forum
        .edit_comment(&ana(), post.id, comment.id, "hijacked")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let voted = forum
        .toggle_comment_vote(&ana(), post.id, comment.id, VoteDirection::Up)
        .await
        .unwrap();
    assert_eq!(voted.comment(comment.id).unwrap().votes.score(), 1);

    let edited = forum
        .edit_comment(&sam(), post.id, comment.id, "You've really got this")
        .await
        .unwrap();
    let stored = edited.comment(comment.id).unwrap();
    assert_eq!(stored.text, "You've really got this");
    assert!(stored.edited_at.is_some());

    let after = forum.delete_comment(&sam(), post.id, comment.id).await.unwrap();
    assert!(after.comments.is_empty());
}

#[tokio::test]
async fn test_only_author_can_delete_post() {
    let h = harness().await;
    let forum = &h.state.forum;
    let post = forum.create_post(&ana(), draft("Mine", "Self-Care")).await.unwrap();
    forum.add_comment(&sam(), post.id, "nice").await.unwrap();

    assert!(matches!(
        forum.delete_post(&sam(), post.id).await,
        Err(AppError::Forbidden(_))
    ));
    forum.delete_post(&ana(), post.id).await.unwrap();
    assert!(matches!(
        forum.get_post(post.id).await,
        Err(AppError::NotFound(..))
    ));
}

#[tokio::test]
async fn test_unknown_category_is_rejected() {
    let h = harness().await;
    let err = h
        .state
        .forum
        .create_post(&ana(), draft("Where", "Gardening"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ValidationError(_)));
}

#[tokio::test]
async fn test_feed_mirror_tracks_events_and_pages() {
    let h = harness().await;
    let forum = &h.state.forum;
    let mut rx = forum.subscribe();
    let mut feed = CommunityFeed::new(forum.list_posts().await.unwrap());

    let mut ids = Vec::new();
    for i in 0..7 {
        h.clock.advance(Duration::minutes(1));
        let category = if i % 2 == 0 { "Mindfulness" } else { "General" };
        let post = forum.create_post(&ana(), draft(&format!("Post {i}"), category)).await.unwrap();
        ids.push(post.id);
    }
    forum.toggle_post_vote(&sam(), ids[0], VoteDirection::Up).await.unwrap();
    forum.delete_post(&ana(), ids[6]).await.unwrap();

    assert!(feed.drain(&mut rx));
    assert_eq!(feed.posts().len(), 6);

    let first = feed.render();
    assert_eq!(first.total_items, 6);
    assert_eq!(first.total_pages, 2);
    assert_eq!(first.posts[0].title, "Post 5");

    // The oldest post sits on page 2 of the newest-first view.
    assert!(feed.focus(ids[0]));
    let focused = feed.render();
    assert_eq!(focused.page, 2);
    assert_eq!(focused.focused_post_id, Some(ids[0]));
    assert_eq!(feed.render().focused_post_id, None);

    feed.state_mut().set_sort(SortOrder::Popular);
    assert_eq!(feed.state().page(), 1);
    assert_eq!(feed.render().posts[0].id, ids[0]);

    feed.state_mut().set_category("Mindfulness");
    let mindful = feed.render();
    assert_eq!(mindful.total_items, 3);
    assert!(mindful.posts.iter().all(|p| p.category == "Mindfulness"));

    feed.state_mut().set_search("post 3");
    assert_eq!(feed.render().total_items, 0);
}

#[tokio::test]
async fn test_feed_mirror_ignores_late_snapshots() {
    let h = harness().await;
    let forum = &h.state.forum;
    let keep = forum.create_post(&ana(), draft("Keep", "General")).await.unwrap();
    let doomed = forum.create_post(&ana(), draft("Doomed", "General")).await.unwrap();
    let mut feed = CommunityFeed::new(forum.list_posts().await.unwrap());
    let mut rx = forum.subscribe();

    let first = forum.toggle_post_vote(&sam(), keep.id, VoteDirection::Up).await.unwrap();
    let second = forum.add_comment(&sam(), keep.id, "same here").await.unwrap();
    forum.toggle_post_vote(&sam(), doomed.id, VoteDirection::Up).await.unwrap();
    forum.delete_post(&ana(), doomed.id).await.unwrap();

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    assert_eq!(events.len(), 4);

    // Deliver everything newest first.
    for event in events.iter().rev() {
        feed.apply(event);
    }
    assert_eq!(feed.posts().len(), 1);
    let mirrored = &feed.posts()[0];
    assert_eq!(mirrored.id, keep.id);
    assert!(mirrored.version > first.version);
    assert_eq!(mirrored.comments[0].id, second.id);
    assert!(matches!(&events[3], ForumEvent::PostDeleted(id) if *id == doomed.id));
}

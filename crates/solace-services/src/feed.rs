//! # Community feed
//!
//! Client-side view over the post collection: category filter, search,
//! sort and fixed-size pagination, plus a mirror that follows `ForumEvent`s.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use solace_core::{Post, ALL_CATEGORIES};
use tokio::sync::broadcast::{self, error::TryRecvError};
use uuid::Uuid;

use crate::forum::ForumEvent;

/// Posts shown per feed page.
pub const PAGE_SIZE: usize = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Newest,
    Oldest,
    /// Net vote count, highest first
    Popular,
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "newest" => Ok(SortOrder::Newest),
            "oldest" => Ok(SortOrder::Oldest),
            "popular" => Ok(SortOrder::Popular),
            other => Err(format!("unknown sort order '{other}'")),
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SortOrder::Newest => "newest",
            SortOrder::Oldest => "oldest",
            SortOrder::Popular => "popular",
        };
        f.write_str(name)
    }
}

/// Filter/sort/page selection of one viewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedState {
    category: String,
    search: String,
    sort: SortOrder,
    page: usize,
}

impl Default for FeedState {
    fn default() -> Self {
        Self {
            category: ALL_CATEGORIES.to_string(),
            search: String::new(),
            sort: SortOrder::default(),
            page: 1,
        }
    }
}

impl FeedState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn sort(&self) -> SortOrder {
        self.sort
    }

    /// 1-based; may exceed the page count until the next render clamps it.
    pub fn page(&self) -> usize {
        self.page
    }

    pub fn set_category(&mut self, category: impl Into<String>) {
        let category = category.into();
        if category != self.category {
            self.category = category;
            self.page = 1;
        }
    }

    pub fn set_search(&mut self, search: impl Into<String>) {
        let search = search.into();
        if search != self.search {
            self.search = search;
            self.page = 1;
        }
    }

    pub fn set_sort(&mut self, sort: SortOrder) {
        if sort != self.sort {
            self.sort = sort;
            self.page = 1;
        }
    }

    pub fn set_page(&mut self, page: usize) {
        self.page = page.max(1);
    }
}

/// One rendered page of the feed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedPage {
    pub posts: Vec<Post>,
    pub page: usize,
    pub total_pages: usize,
    pub total_items: usize,
    /// Set when this page was produced to reveal a deep-linked post
    pub focused_post_id: Option<Uuid>,
}

fn matches_search(post: &Post, needle: &str) -> bool {
    post.title.to_lowercase().contains(needle)
        || post.content.to_lowercase().contains(needle)
        || post.author_name.to_lowercase().contains(needle)
}

/// Category filter then search, in the input order.
pub fn filter_posts<'a>(posts: &'a [Post], category: &str, search: &str) -> Vec<&'a Post> {
    let needle = search.to_lowercase();
    posts
        .iter()
        .filter(|p| category == ALL_CATEGORIES || p.category == category)
        .filter(|p| needle.is_empty() || matches_search(p, &needle))
        .collect()
}

/// Stable sort: equal keys keep their input order.
pub fn sort_posts(posts: &mut [&Post], order: SortOrder) {
    match order {
        SortOrder::Newest => posts.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        SortOrder::Oldest => posts.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
        SortOrder::Popular => posts.sort_by(|a, b| b.votes.score().cmp(&a.votes.score())),
    }
}

/// Everything the viewer's selection lets through, in display order.
pub fn visible_posts<'a>(posts: &'a [Post], state: &FeedState) -> Vec<&'a Post> {
    let mut visible = filter_posts(posts, &state.category, &state.search);
    sort_posts(&mut visible, state.sort);
    visible
}

/// Number of pages for `total_items`; an empty feed still has one page.
pub fn total_pages(total_items: usize) -> usize {
    total_items.div_ceil(PAGE_SIZE).max(1)
}

/// Slice of `items` shown on 1-based `page`. Out-of-range pages are empty.
pub fn paginate<T>(items: &[T], page: usize) -> &[T] {
    let start = page.saturating_sub(1).saturating_mul(PAGE_SIZE);
    if start >= items.len() {
        return &[];
    }
    let end = (start + PAGE_SIZE).min(items.len());
    &items[start..end]
}

/// Page of the current view that contains `post_id`.
pub fn locate_post(posts: &[Post], state: &FeedState, post_id: Uuid) -> Option<usize> {
    visible_posts(posts, state)
        .iter()
        .position(|p| p.id == post_id)
        .map(|index| index / PAGE_SIZE + 1)
}

/// Renders the viewer's page, clamping a stale page number to the last page.
pub fn render_page(posts: &[Post], state: &FeedState) -> FeedPage {
    let visible = visible_posts(posts, state);
    let total_pages = total_pages(visible.len());
    let page = state.page.clamp(1, total_pages);

    FeedPage {
        posts: paginate(&visible, page).iter().map(|p| (*p).clone()).collect(),
        page,
        total_pages,
        total_items: visible.len(),
        focused_post_id: None,
    }
}

/// Local mirror of the post collection with one viewer's feed selection.
#[derive(Debug, Clone, Default)]
pub struct CommunityFeed {
    /// Insertion (creation) order
    posts: Vec<Post>,
    /// IDs are never reused, so a deleted post must never come back.
    deleted: HashSet<Uuid>,
    state: FeedState,
    pending_focus: Option<Uuid>,
}

impl CommunityFeed {
    pub fn new(snapshot: Vec<Post>) -> Self {
        Self {
            posts: snapshot,
            ..Self::default()
        }
    }

    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    pub fn state(&self) -> &FeedState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut FeedState {
        &mut self.state
    }

    /// Replaces the mirror after a resync, keeping the viewer's selection.
    pub fn reset(&mut self, mut snapshot: Vec<Post>) {
        snapshot.retain(|p| !self.deleted.contains(&p.id));
        self.posts = snapshot;
    }

    /// Folds one event into the mirror.
    ///
    /// Events may arrive out of order: a snapshot only replaces a mirrored
    /// post with a lower `version`, and only `PostCreated` may add a post.
    pub fn apply(&mut self, event: &ForumEvent) {
        match event {
            ForumEvent::PostCreated(post) => self.merge(post, true),
            ForumEvent::PostUpdated(post) => self.merge(post, false),
            ForumEvent::PostDeleted(id) => {
                self.posts.retain(|p| p.id != *id);
                self.deleted.insert(*id);
            }
        }
    }

    fn merge(&mut self, post: &Post, may_insert: bool) {
        if self.deleted.contains(&post.id) {
            return;
        }
        match self.posts.iter_mut().find(|p| p.id == post.id) {
            Some(existing) if post.version > existing.version => *existing = post.clone(),
            Some(_) => {}
            None if may_insert => self.posts.push(post.clone()),
            None => {}
        }
    }

    /// Applies every event already queued on `rx`.
    ///
    /// Returns false if the receiver lagged and events were dropped; the
    /// caller must `reset` from a fresh listing.
    pub fn drain(&mut self, rx: &mut broadcast::Receiver<ForumEvent>) -> bool {
        loop {
            match rx.try_recv() {
                Ok(event) => self.apply(&event),
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return true,
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "community feed lagged behind forum events");
                    return false;
                }
            }
        }
    }

    /// Moves to the page holding `post_id`. Returns false if it is not in view.
    pub fn focus(&mut self, post_id: Uuid) -> bool {
        match locate_post(&self.posts, &self.state, post_id) {
            Some(page) => {
                self.state.page = page;
                self.pending_focus = Some(post_id);
                true
            }
            None => false,
        }
    }

    /// Renders the current page; a pending focus is reported once and cleared.
    pub fn render(&mut self) -> FeedPage {
        let mut page = render_page(&self.posts, &self.state);
        self.state.page = page.page;
        page.focused_post_id = self.pending_focus.take();
        page
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use solace_core::{VoteDirection, Votes};

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()
    }

    fn post(n: i64, category: &str, title: &str) -> Post {
        Post {
            id: Uuid::now_v7(),
            title: title.to_string(),
            content: format!("content {n}"),
            image_url: None,
            video_url: None,
            category: category.to_string(),
            author_id: format!("author-{n}"),
            author_name: format!("Author {n}"),
            created_at: base_time() + Duration::minutes(n),
            edited_at: None,
            votes: Votes::default(),
            comments: vec![],
            version: 1,
        }
    }

    fn with_score(mut p: Post, up: usize, down: usize) -> Post {
        for i in 0..up {
            p.votes.set(&format!("up-{i}"), Some(VoteDirection::Up));
        }
        for i in 0..down {
            p.votes.set(&format!("down-{i}"), Some(VoteDirection::Down));
        }
        p
    }

    fn twelve() -> Vec<Post> {
        (1..=12).map(|n| post(n, "General", &format!("Post {n}"))).collect()
    }

    #[test]
    fn test_all_category_is_identity() {
        let posts = vec![post(1, "General", "a"), post(2, "Anxiety", "b")];
        assert_eq!(filter_posts(&posts, ALL_CATEGORIES, "").len(), 2);
    }

    #[test]
    fn test_category_filter_is_exact_match() {
        let posts = vec![
            post(1, "General", "a"),
            post(2, "Anxiety", "b"),
            post(3, "anxiety", "c"),
        ];
        let filtered = filter_posts(&posts, "Anxiety", "");
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].title, "b");
    }

    #[test]
    fn test_search_is_case_insensitive_across_fields() {
        let mut by_content = post(2, "General", "nothing");
        by_content.content = "Breathing EXERCISES helped".to_string();
        let mut by_author = post(3, "General", "nothing");
        by_author.author_name = "Exercise Buddy".to_string();
        let posts = vec![
            post(1, "General", "My exercise routine"),
            by_content,
            by_author,
            post(4, "General", "unrelated"),
        ];

        let found = filter_posts(&posts, ALL_CATEGORIES, "ExErCiSe");
        let titles: Vec<_> = found.iter().map(|p| p.author_id.as_str()).collect();
        assert_eq!(titles, vec!["author-1", "author-2", "author-3"]);
    }

    #[test]
    fn test_sort_newest_and_oldest() {
        let posts = vec![post(2, "General", "b"), post(1, "General", "a"), post(3, "General", "c")];

        let mut newest = filter_posts(&posts, ALL_CATEGORIES, "");
        sort_posts(&mut newest, SortOrder::Newest);
        assert_eq!(newest.iter().map(|p| p.title.as_str()).collect::<Vec<_>>(), ["c", "b", "a"]);

        let mut oldest = filter_posts(&posts, ALL_CATEGORIES, "");
        sort_posts(&mut oldest, SortOrder::Oldest);
        assert_eq!(oldest.iter().map(|p| p.title.as_str()).collect::<Vec<_>>(), ["a", "b", "c"]);
    }

    #[test]
    fn test_sort_popular_by_net_votes_with_stable_ties() {
        let posts = vec![
            with_score(post(1, "General", "tie-first"), 1, 0),
            with_score(post(2, "General", "top"), 3, 1),
            with_score(post(3, "General", "negative"), 0, 2),
            with_score(post(4, "General", "tie-second"), 2, 1),
        ];
        let mut sorted = filter_posts(&posts, ALL_CATEGORIES, "");
        sort_posts(&mut sorted, SortOrder::Popular);
        assert_eq!(
            sorted.iter().map(|p| p.title.as_str()).collect::<Vec<_>>(),
            ["top", "tie-first", "tie-second", "negative"]
        );
    }

    #[test]
    fn test_pagination_of_twelve_posts() {
        let posts = twelve();
        let mut state = FeedState::new();
        state.set_sort(SortOrder::Oldest);

        let first = render_page(&posts, &state);
        assert_eq!(first.total_pages, 3);
        assert_eq!(first.total_items, 12);
        assert_eq!(
            first.posts.iter().map(|p| p.title.as_str()).collect::<Vec<_>>(),
            ["Post 1", "Post 2", "Post 3", "Post 4", "Post 5"]
        );

        state.set_page(3);
        let third = render_page(&posts, &state);
        assert_eq!(
            third.posts.iter().map(|p| p.title.as_str()).collect::<Vec<_>>(),
            ["Post 11", "Post 12"]
        );
    }

    #[test]
    fn test_paginate_out_of_range_is_empty() {
        let items = [1, 2, 3];
        assert_eq!(paginate(&items, 2), &[] as &[i32]);
        assert_eq!(paginate(&items, 1), &[1, 2, 3]);
        assert_eq!(total_pages(0), 1);
        assert_eq!(total_pages(5), 1);
        assert_eq!(total_pages(6), 2);
    }

    #[test]
    fn test_selection_changes_reset_page() {
        let mut state = FeedState::new();

        state.set_page(3);
        state.set_category("Anxiety");
        assert_eq!(state.page(), 1);

        state.set_page(3);
        state.set_search("sleep");
        assert_eq!(state.page(), 1);

        state.set_page(3);
        state.set_sort(SortOrder::Popular);
        assert_eq!(state.page(), 1);

        state.set_page(3);
        state.set_sort(SortOrder::Popular);
        assert_eq!(state.page(), 3, "re-selecting the same sort is not a change");
    }

    #[test]
    fn test_render_clamps_page_when_view_shrinks() {
        let mut feed = CommunityFeed::new(twelve());
        feed.state_mut().set_page(3);
        assert_eq!(feed.render().page, 3);

        let doomed: Vec<Uuid> = feed.posts().iter().take(8).map(|p| p.id).collect();
        for id in doomed {
            feed.apply(&ForumEvent::PostDeleted(id));
        }
        let page = feed.render();
        assert_eq!(page.total_pages, 1);
        assert_eq!(page.page, 1);
        assert_eq!(feed.state().page(), 1);
    }

    #[test]
    fn test_mirror_applies_events() {
        let mut feed = CommunityFeed::new(vec![post(1, "General", "a")]);
        let mut created = post(2, "General", "b");
        feed.apply(&ForumEvent::PostCreated(created.clone()));
        assert_eq!(feed.posts().len(), 2);

        created.title = "b (edited)".to_string();
        created.version = 2;
        feed.apply(&ForumEvent::PostUpdated(created.clone()));
        assert_eq!(feed.posts()[1].title, "b (edited)");

        feed.apply(&ForumEvent::PostDeleted(created.id));
        assert_eq!(feed.posts().len(), 1);
    }

    #[test]
    fn test_late_update_does_not_resurrect_deleted_post() {
        let mut p = post(1, "General", "doomed");
        let mut feed = CommunityFeed::new(vec![p.clone()]);

        // A vote echo read before the delete, delivered after it.
        p.version = 2;
        p.votes.set("voter", Some(VoteDirection::Up));
        feed.apply(&ForumEvent::PostDeleted(p.id));
        feed.apply(&ForumEvent::PostUpdated(p.clone()));
        feed.apply(&ForumEvent::PostCreated(p.clone()));
        assert!(feed.posts().is_empty());

        feed.reset(vec![p]);
        assert!(feed.posts().is_empty());
    }

    #[test]
    fn test_update_for_unknown_post_is_ignored() {
        let mut feed = CommunityFeed::new(vec![post(1, "General", "a")]);
        let mut stranger = post(2, "General", "never created here");
        stranger.version = 3;
        feed.apply(&ForumEvent::PostUpdated(stranger));
        assert_eq!(feed.posts().len(), 1);
    }

    #[test]
    fn test_stale_snapshot_does_not_overwrite_newer_one() {
        let original = post(1, "General", "thread");
        let mut feed = CommunityFeed::new(vec![original.clone()]);

        let mut older = original.clone();
        older.version = 2;
        older.votes.set("a", Some(VoteDirection::Up));
        let mut newer = older.clone();
        newer.version = 3;
        newer.votes.set("b", Some(VoteDirection::Up));

        feed.apply(&ForumEvent::PostUpdated(newer.clone()));
        feed.apply(&ForumEvent::PostUpdated(older));
        assert_eq!(feed.posts()[0], newer);

        // A duplicate creation event is not newer either.
        feed.apply(&ForumEvent::PostCreated(original));
        assert_eq!(feed.posts()[0].votes.score(), 2);
    }

    #[test]
    fn test_focus_moves_to_page_and_is_reported_once() {
        let posts = twelve();
        let target = posts[0].id; // oldest, so last page under Newest
        let mut feed = CommunityFeed::new(posts);

        assert!(feed.focus(target));
        let page = feed.render();
        assert_eq!(page.page, 3);
        assert_eq!(page.focused_post_id, Some(target));
        assert!(page.posts.iter().any(|p| p.id == target));

        assert_eq!(feed.render().focused_post_id, None);
    }

    #[test]
    fn test_focus_on_filtered_out_post_is_noop() {
        let posts = vec![post(1, "General", "a"), post(2, "Anxiety", "b")];
        let hidden = posts[0].id;
        let mut feed = CommunityFeed::new(posts);
        feed.state_mut().set_category("Anxiety");
        assert!(!feed.focus(hidden));
        assert_eq!(feed.render().focused_post_id, None);
    }

    #[test]
    fn test_drain_applies_queued_events_and_reports_lag() {
        let (tx, mut rx) = broadcast::channel(2);
        let mut feed = CommunityFeed::default();

        tx.send(ForumEvent::PostCreated(post(1, "General", "a"))).unwrap();
        assert!(feed.drain(&mut rx));
        assert_eq!(feed.posts().len(), 1);

        for n in 2..=5 {
            tx.send(ForumEvent::PostCreated(post(n, "General", "x"))).unwrap();
        }
        assert!(!feed.drain(&mut rx));
    }

    #[test]
    fn test_sort_order_parses() {
        assert_eq!("Popular".parse::<SortOrder>(), Ok(SortOrder::Popular));
        assert!("random".parse::<SortOrder>().is_err());
        assert_eq!(SortOrder::Oldest.to_string(), "oldest");
    }
}

//! Seeds demo profiles plus a few welcome posts, and prints a bearer token per profile.
//!
//! Uses the same settings as the server (`solace.toml`, `SOLACE__*`).

use std::sync::Arc;

use anyhow::Context;
use secrecy::ExposeSecret;
use solace_auth_simple::SimpleAuthProvider;
use solace_configs::Settings;
use solace_core::{AuthProvider, Clock, PostRepo, UserProfile, UserRepo};
use solace_db_sqlite::SqliteStore;
use solace_services::{ForumService, PostDraft, SystemClock};

fn demo_profiles() -> Vec<UserProfile> {
    [
        ("demo-ana", "Ana", "Rivera"),
        ("demo-sam", "Sam", "Okafor"),
        ("demo-lee", "Lee", ""),
    ]
    .into_iter()
    .map(|(id, first, last)| UserProfile {
        id: id.to_string(),
        first_name: first.to_string(),
        last_name: last.to_string(),
        photo_url: None,
    })
    .collect()
}

fn welcome_posts() -> Vec<PostDraft> {
    vec![
        PostDraft {
            title: "Welcome to the community".to_string(),
            content: "Introduce yourself and tell us what brings you here.".to_string(),
            category: "General".to_string(),
            ..PostDraft::default()
        },
        PostDraft {
            title: "A two-minute breathing exercise".to_string(),
            content: "Breathe in for four, hold for four, out for six. Repeat ten times.".to_string(),
            category: "Mindfulness".to_string(),
            ..PostDraft::default()
        },
        PostDraft {
            title: "Small wins this week".to_string(),
            content: "I went for a walk every day. Share yours below!".to_string(),
            category: "Success Stories".to_string(),
            ..PostDraft::default()
        },
    ]
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let settings = Settings::load().context("loading settings")?;
    if let Some(path) = &settings.env_file {
        tracing::debug!(path = %path.display(), "loaded .env");
    }
    let store = Arc::new(
        SqliteStore::connect(&settings.database.url, settings.database.max_connections)
            .await
            .context("opening database")?,
    );
    let auth = SimpleAuthProvider::new(settings.auth.secret.expose_secret())?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new(settings.locale.utc_offset_minutes));

    let profiles = demo_profiles();
    for profile in &profiles {
        store.upsert_profile(profile).await?;
    }

    if store.list_posts().await?.is_empty() {
        let forum = ForumService::new(store.clone(), clock);
        for (author, draft) in profiles.iter().cycle().zip(welcome_posts()) {
            let post = forum.create_post(author, draft).await?;
            tracing::info!(post_id = %post.id, title = %post.title, "seeded post");
        }
    } else {
        tracing::info!("posts already present, skipping welcome posts");
    }

    for profile in &profiles {
        println!("{:<10} {}", profile.id, auth.issue_token(&profile.id));
    }
    Ok(())
}

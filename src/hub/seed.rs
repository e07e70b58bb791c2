//! Demo data for the explore marketplace.

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::info;

use super::auth;
use super::db::{HubDb, NewProfile};
use super::models::{ProfileFields, ProfileKind};

pub const SEED_EMAIL: &str = "seed@example.com";
pub const SEED_NAME: &str = "Seed User";

const SEED_PROFILES: &str = include_str!("seed_profiles.json");

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SeedProfile {
    #[serde(flatten)]
    fields: ProfileFields,
    #[serde(default)]
    view_count: i64,
}

/// Result of a seeding attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeedOutcome {
    AlreadySeeded { count: i64 },
    Created { names: Vec<String> },
}

fn seed_profiles() -> Result<Vec<SeedProfile>> {
    serde_json::from_str(SEED_PROFILES).context("Failed to parse bundled seed profiles")
}

/// Insert the bundled startup profiles under the seed user.
///
/// Skips when the seed user already owns at least as many profiles as the
/// bundled set. Every third profile is featured.
pub fn seed_explore(db: &HubDb) -> Result<SeedOutcome> {
    let profiles = seed_profiles()?;
    let owner = db.ensure_user(
        SEED_EMAIL,
        SEED_NAME,
        &auth::hash_password(&auth::new_session_token()),
    )?;

    let existing = db.count_profiles_by_owner(owner.id)?;
    if existing >= profiles.len() as i64 {
        info!(count = existing, "explore profiles already seeded");
        return Ok(SeedOutcome::AlreadySeeded { count: existing });
    }

    let mut names = Vec::with_capacity(profiles.len());
    for (i, seed) in profiles.into_iter().enumerate() {
        let mut profile = NewProfile::published(ProfileKind::Startup, seed.fields.normalized());
        profile.is_featured = i % 3 == 0;
        profile.view_count = seed.view_count;
        let created = db.create_profile(owner.id, &profile)?;
        names.push(created.fields.name);
    }
    info!(count = names.len(), "seeded explore profiles");
    Ok(SeedOutcome::Created { names })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_profiles_parse() {
        let profiles = seed_profiles().unwrap();
        assert_eq!(profiles.len(), 26);
        assert_eq!(profiles[0].fields.name, "TechFlow");
        assert_eq!(profiles[0].view_count, 1240);
        assert!(!profiles[0].fields.founders.is_empty());
        assert!(profiles.iter().all(|p| !p.fields.name.is_empty()));
    }

    #[test]
    fn test_seed_then_already_seeded() -> Result<()> {
        let db = HubDb::new_in_memory()?;
        let SeedOutcome::Created { names } = seed_explore(&db)? else {
            panic!("first seed should create profiles");
        };
        assert_eq!(names.len(), 26);

        let listed = db.list_profiles(Some(ProfileKind::Startup), None, None)?;
        assert_eq!(listed.len(), 26);
        let featured = db.list_profiles(None, Some(true), None)?;
        assert_eq!(featured.len(), 9);

        assert_eq!(seed_explore(&db)?, SeedOutcome::AlreadySeeded { count: 26 });
        Ok(())
    }

    #[test]
    fn test_seed_user_cannot_sign_in_with_blank_password() -> Result<()> {
        let db = HubDb::new_in_memory()?;
        seed_explore(&db)?;
        let (user, hash) = db.get_credentials(SEED_EMAIL)?.unwrap();
        assert_eq!(user.name, SEED_NAME);
        assert!(!auth::verify_password("", &hash));
        Ok(())
    }
}

// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Profile management use cases: list, create, edit and soft-delete
//! standards profiles on behalf of one owner.

use crate::domain::profile::{Industry, ProfileDraft, ProfileId, StandardsProfile, Strictness, TaskType};
use crate::domain::repository::{ProfileRepository, RepositoryError};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// Profiles visible to an owner plus the vocabularies a client can pick from.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileListing {
    pub profiles: Vec<StandardsProfile>,
    pub available_industries: Vec<Industry>,
    pub available_task_types: Vec<TaskType>,
    pub available_strictness_levels: Vec<Strictness>,
}

pub struct ProfileService {
    repository: Arc<dyn ProfileRepository>,
}

impl ProfileService {
    pub fn new(repository: Arc<dyn ProfileRepository>) -> Self {
        Self { repository }
    }

    pub async fn list(&self, owner_id: &str) -> Result<ProfileListing, RepositoryError> {
        Ok(ProfileListing {
            profiles: self.repository.list_for_owner(owner_id).await?,
            available_industries: vec![
                Industry::Food,
                Industry::Retail,
                Industry::Logistics,
                Industry::Construction,
                Industry::Healthcare,
                Industry::General,
            ],
            available_task_types: vec![
                TaskType::Receiving,
                TaskType::Storage,
                TaskType::Cleaning,
                TaskType::Delivery,
                TaskType::Inspection,
                TaskType::General,
            ],
            available_strictness_levels: vec![Strictness::Low, Strictness::Medium, Strictness::High],
        })
    }

    pub async fn create(&self, owner_id: &str, draft: ProfileDraft) -> Result<StandardsProfile, RepositoryError> {
        let profile = draft.into_profile(owner_id).map_err(RepositoryError::Invalid)?;
        self.repository.save(&profile).await?;
        info!(profile_id = %profile.id, owner_id, "Created standards profile");
        Ok(profile)
    }

    pub async fn update(
        &self,
        id: &ProfileId,
        owner_id: &str,
        draft: ProfileDraft,
    ) -> Result<StandardsProfile, RepositoryError> {
        let errors = draft.validate();
        if !errors.is_empty() {
            return Err(RepositoryError::Invalid(errors));
        }
        let profile = self.repository.update(id, owner_id, draft).await?;
        info!(profile_id = %profile.id, owner_id, "Updated standards profile");
        Ok(profile)
    }

    pub async fn deactivate(&self, id: &ProfileId, owner_id: &str) -> Result<(), RepositoryError> {
        self.repository.deactivate(id, owner_id).await?;
        info!(profile_id = %id, owner_id, "Deactivated standards profile");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::repositories::InMemoryProfileRepository;

    fn service() -> ProfileService {
        ProfileService::new(Arc::new(InMemoryProfileRepository::with_system_profiles()))
    }

    fn draft(name: &str) -> ProfileDraft {
        ProfileDraft {
            profile_name: name.to_string(),
            industry: Some("food".to_string()),
            task_type: Some("receiving".to_string()),
            plain_language_rules: vec!["Check delivery temperatures".to_string()],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_then_list_puts_system_first() {
        let service = service();
        let created = service.create("user-1", draft("Dock checks")).await.unwrap();

        let listing = service.list("user-1").await.unwrap();
        assert!(listing.profiles.first().unwrap().is_system());
        assert_eq!(listing.profiles.last().unwrap().id, created.id);
        assert_eq!(listing.available_strictness_levels.len(), 3);
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_draft() {
        let err = service().create("user-1", draft("")).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Invalid(_)));
    }

    #[tokio::test]
    async fn test_other_owner_cannot_edit_or_delete() {
        let service = service();
        let created = service.create("user-1", draft("Dock checks")).await.unwrap();

        let err = service
            .update(&created.id, "user-2", draft("Hijacked"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Forbidden(_)));
        assert!(matches!(
            service.deactivate(&created.id, "user-2").await,
            Err(RepositoryError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_system_profiles_are_read_only() {
        let service = service();
        let err = service
            .update(&ProfileId::new("system-food-general"), "user-1", draft("Mine now"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_deactivated_profile_leaves_listing() {
        let service = service();
        let created = service.create("user-1", draft("Dock checks")).await.unwrap();
        service.deactivate(&created.id, "user-1").await.unwrap();

        let listing = service.list("user-1").await.unwrap();
        assert!(listing.profiles.iter().all(|p| p.id != created.id));
    }
}

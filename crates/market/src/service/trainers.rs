use std::sync::Arc;

use chain::{RegistryClient, Settlement};
use eyre::eyre;
use futures::{stream, StreamExt as _};
use ipfs::ContentStore;
use log::{info, warn};
use model::{
    address::Address,
    errors::MarketError,
    metadata::{ContentAddress, TrainerMetadata},
    user::TrainerProfile,
};

use super::{await_confirmation, resolver::Resolver, users::Users};
use crate::config::MarketConfig;

/// Profile fields a trainer fills in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileDraft {
    pub name: String,
    pub bio: String,
    pub avatar: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileEdit {
    pub name: Option<String>,
    pub bio: Option<String>,
    pub avatar: Option<String>,
}

#[derive(Clone)]
pub struct Trainers {
    chain: Arc<dyn Settlement>,
    content: Arc<dyn ContentStore>,
    resolver: Resolver,
    registry: RegistryClient,
    users: Users,
    config: Arc<MarketConfig>,
}

impl Trainers {
    pub(crate) fn new(
        chain: Arc<dyn Settlement>,
        content: Arc<dyn ContentStore>,
        resolver: Resolver,
        registry: RegistryClient,
        users: Users,
        config: Arc<MarketConfig>,
    ) -> Self {
        Trainers {
            chain,
            content,
            resolver,
            registry,
            users,
            config,
        }
    }

    async fn pin_profile(
        &self,
        address: Address,
        draft: &ProfileDraft,
    ) -> Result<ContentAddress, MarketError> {
        let document = serde_json::to_value(TrainerMetadata {
            name: draft.name.clone(),
            bio: draft.bio.clone(),
            avatar: draft.avatar.clone(),
            address,
        })
        .map_err(|err| eyre!(err))?;
        Ok(self.content.pin(&document).await?)
    }

    pub async fn is_trainer(&self, who: Address) -> Result<bool, MarketError> {
        Ok(self.registry.is_trainer(who).await?)
    }

    /// Registering again is harmless: the registry keeps one entry and the
    /// local profile points at the newly pinned version.
    pub async fn register(
        &self,
        draft: ProfileDraft,
        secret: &str,
    ) -> Result<TrainerProfile, MarketError> {
        let trainer = self.users.require_identity()?;
        if draft.name.trim().is_empty() {
            return Err(eyre!("trainer name is empty").into());
        }
        let profile_uri = self.pin_profile(trainer, &draft).await?;
        let tx = self.registry.register_as_trainer(secret).await?;
        await_confirmation(
            self.chain.as_ref(),
            tx,
            "register trainer",
            self.config.confirm_notice,
            |_| {},
        )
        .await?;

        let profile = self
            .users
            .update(trainer, |state| {
                let courses = state
                    .trainer
                    .take()
                    .map(|profile| profile.courses)
                    .unwrap_or_default();
                let profile = TrainerProfile {
                    name: draft.name,
                    bio: draft.bio,
                    avatar: draft.avatar,
                    profile_uri,
                    courses,
                };
                state.trainer = Some(profile.clone());
                profile
            })
            .await
            .ok_or(MarketError::NotConnected)?;
        info!("{} registered as trainer", trainer);
        Ok(profile)
    }

    /// Pins a new profile version and swaps the local content address.
    pub async fn update_profile(&self, edit: ProfileEdit) -> Result<TrainerProfile, MarketError> {
        let trainer = self.users.require_identity()?;
        let current = self
            .users
            .snapshot()
            .and_then(|state| state.trainer)
            .ok_or_else(|| MarketError::Unauthorized("not a registered trainer".to_owned()))?;
        let draft = ProfileDraft {
            name: edit.name.unwrap_or(current.name),
            bio: edit.bio.unwrap_or(current.bio),
            avatar: edit.avatar.unwrap_or(current.avatar),
        };
        let profile_uri = self.pin_profile(trainer, &draft).await?;
        self.users
            .update(trainer, |state| {
                let profile = state.trainer.as_mut()?;
                profile.name = draft.name;
                profile.bio = draft.bio;
                profile.avatar = draft.avatar;
                profile.profile_uri = profile_uri;
                Some(profile.clone())
            })
            .await
            .flatten()
            .ok_or(MarketError::NotConnected)
    }

    /// Registered courses whose contract is owned by `trainer`. Courses that
    /// cannot be read are skipped.
    pub async fn courses_of(&self, trainer: Address) -> Result<Vec<Address>, MarketError> {
        let ids = self.registry.list().await?;
        let owners: Vec<_> = stream::iter(ids)
            .map(|id| async move { (id, self.resolver.item(id).owner().await) })
            .buffered(self.config.catalog_concurrency.max(1))
            .collect()
            .await;
        Ok(owners
            .into_iter()
            .filter_map(|(id, owner)| match owner {
                Ok(owner) => (owner == trainer).then_some(id),
                Err(err) => {
                    warn!("Skipping course {}: {}", id, err);
                    None
                }
            })
            .collect())
    }
}

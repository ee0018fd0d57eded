use std::sync::Arc;

use chain::{deploy_item, settlement::Receipt, ItemInit, RegistryClient, Settlement, TxHandle};
use eyre::eyre;
use ipfs::ContentStore;
use log::{error, info};
use model::{
    address::Address,
    course::{Course, CourseDraft, OnChainCourse, COURSE_TOKEN_ID},
    errors::MarketError,
    metadata::{ContentAddress, CourseEdit, CourseMetadata},
};

use super::{await_confirmation, resolver::Resolver, users::Users};
use crate::config::MarketConfig;

pub const ITEM_NAME: &str = "CourseItem";
pub const ITEM_SYMBOL: &str = "CITEM";

/// Course lifecycle on the trainer side: create, edit, delete.
#[derive(Clone)]
pub struct Courses {
    chain: Arc<dyn Settlement>,
    content: Arc<dyn ContentStore>,
    resolver: Resolver,
    registry: RegistryClient,
    users: Users,
    config: Arc<MarketConfig>,
}

impl Courses {
    pub(crate) fn new(
        chain: Arc<dyn Settlement>,
        content: Arc<dyn ContentStore>,
        resolver: Resolver,
        registry: RegistryClient,
        users: Users,
        config: Arc<MarketConfig>,
    ) -> Self {
        Courses {
            chain,
            content,
            resolver,
            registry,
            users,
            config,
        }
    }

    async fn settle(&self, tx: TxHandle, what: &str) -> Result<Receipt, MarketError> {
        await_confirmation(self.chain.as_ref(), tx, what, self.config.confirm_notice, |_| {}).await
    }

    async fn pin(&self, meta: &CourseMetadata) -> Result<ContentAddress, MarketError> {
        let document = serde_json::to_value(meta).map_err(|err| eyre!(err))?;
        Ok(self.content.pin(&document).await?)
    }

    async fn owned(&self, course: Address) -> Result<(Address, OnChainCourse), MarketError> {
        let caller = self.users.require_identity()?;
        let chain = self.resolver.on_chain(course).await?;
        if chain.owner != caller {
            return Err(MarketError::Unauthorized(
                "only the course owner can change it".to_owned(),
            ));
        }
        Ok((caller, chain))
    }

    pub async fn create(&self, draft: CourseDraft, secret: &str) -> Result<Course, MarketError> {
        let trainer = self.users.require_identity()?;
        if !self.registry.is_trainer(trainer).await? {
            return Err(MarketError::Unauthorized(
                "not a registered trainer".to_owned(),
            ));
        }
        validate(&draft)?;

        let uri = self.pin(&draft.metadata(trainer)).await?;
        let tx = deploy_item(
            &self.chain,
            ItemInit {
                name: ITEM_NAME.to_owned(),
                symbol: ITEM_SYMBOL.to_owned(),
                token_id: COURSE_TOKEN_ID,
                price: draft.price,
                capacity: draft.capacity,
                title: draft.title.clone(),
                description: draft.description.clone(),
                token_uri: Some(uri),
            },
        )
        .await?;
        let receipt = self.settle(tx, "deploy course").await?;
        let course = receipt
            .contract
            .ok_or_else(|| eyre!("deploy receipt carries no contract address"))?;
        info!("Course {} deployed by {}", course, trainer);

        let tx = self.registry.register(course, secret).await?;
        if let Err(err) = self.settle(tx, "register course").await {
            error!("Course {} deployed but not registered: {}", course, err);
            return Err(err);
        }
        self.users
            .update(trainer, |state| state.add_trainer_course(course))
            .await;
        self.resolver.course(course).await
    }

    /// Pins the edited document as a new version and points the contract at
    /// it. The on-chain capacity is fixed at deploy time; a capacity edit only
    /// changes the document.
    pub async fn edit(&self, course: Address, edit: CourseEdit) -> Result<Course, MarketError> {
        let (owner, chain) = self.owned(course).await?;
        if edit.is_empty() {
            return self.resolver.course(course).await;
        }
        let current = match &chain.metadata_uri {
            Some(uri) => self.resolver.metadata(uri).await?,
            None => CourseMetadata {
                name: chain.title.clone(),
                description: chain.description.clone(),
                ..CourseMetadata::default()
            },
        };
        let price = edit.price.unwrap_or(chain.price);
        let next = edit
            .apply(&current)
            .with_attributes(Some(price.to_string()), Some(owner.to_string()));
        let uri = self.pin(&next).await?;

        let tx = self
            .resolver
            .item(course)
            .set_metadata(next.name.clone(), next.description.clone(), uri)
            .await?;
        self.settle(tx, "set metadata").await?;

        if price != chain.price {
            let tx = self.resolver.item(course).change_price(price).await?;
            self.settle(tx, "change price").await?;
        }
        self.resolver.course(course).await
    }

    /// Burns the course token and removes it from the registry. Fails with
    /// `HasActiveRenters` while anyone holds live access.
    pub async fn delete(&self, course: Address) -> Result<(), MarketError> {
        let (owner, _) = self.owned(course).await?;
        let tx = self.resolver.item(course).burn().await?;
        self.settle(tx, "burn course").await?;

        // The course owner needs no secret to unlist its own course.
        let tx = self.registry.remove(course, "").await?;
        self.settle(tx, "unregister course").await?;
        self.users
            .update(owner, |state| state.remove_trainer_course(course))
            .await;
        info!("Course {} deleted", course);
        Ok(())
    }
}

fn validate(draft: &CourseDraft) -> Result<(), MarketError> {
    if draft.title.trim().is_empty() {
        return Err(eyre!("course title is empty").into());
    }
    if draft.capacity == 0 {
        return Err(eyre!("capacity must be at least 1").into());
    }
    if let (Some(start), Some(end)) = (draft.schedule.start_at, draft.schedule.end_at) {
        if end <= start {
            return Err(eyre!("course must end after it starts").into());
        }
    }
    Ok(())
}

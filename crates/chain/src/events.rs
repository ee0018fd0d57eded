use model::{address::Address, amount::Amount, metadata::ContentAddress};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Deployed {
        course: Address,
        owner: Address,
    },
    Rented {
        course: Address,
        renter: Address,
        expiry: u64,
    },
    Unrented {
        course: Address,
        renter: Address,
    },
    MetadataUpdated {
        course: Address,
        uri: ContentAddress,
    },
    PriceChanged {
        course: Address,
        price: Amount,
    },
    Burned {
        course: Address,
    },
    CourseRegistered {
        registry: Address,
        course: Address,
    },
    CourseRemoved {
        registry: Address,
        course: Address,
    },
    TrainerRegistered {
        registry: Address,
        trainer: Address,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::Deployed { .. } => "deployed",
            Event::Rented { .. } => "rented",
            Event::Unrented { .. } => "unrented",
            Event::MetadataUpdated { .. } => "metadata_updated",
            Event::PriceChanged { .. } => "price_changed",
            Event::Burned { .. } => "burned",
            Event::CourseRegistered { .. } => "course_registered",
            Event::CourseRemoved { .. } => "course_removed",
            Event::TrainerRegistered { .. } => "trainer_registered",
        }
    }
}

use std::collections::{BTreeMap, BTreeSet};

use model::{address::Address, amount::Amount, metadata::ContentAddress};

use super::Exec;
use crate::{events::Event, revert::Revert, settlement::ItemInfo, settlement::ItemInit};

/// Rentable course token: one token, many time-boxed renters up to `capacity`.
///
/// A renter occupies a slot from `rent` until `unrent`. Expiry alone does not
/// free the slot, so `active_renter_count` can include renters whose
/// `is_active_renter` is already false.
#[derive(Debug, Clone)]
pub struct ItemNft {
    pub address: Address,
    pub name: String,
    pub symbol: String,
    pub token_id: u64,
    pub owner: Address,
    pub price: Amount,
    pub capacity: u32,
    pub title: String,
    pub description: String,
    pub token_uri: Option<ContentAddress>,
    pub created_at: u64,
    pub burned: bool,
    expiries: BTreeMap<Address, u64>,
    slots: BTreeSet<Address>,
}

impl ItemNft {
    pub fn new(
        address: Address,
        owner: Address,
        init: ItemInit,
        now: u64,
    ) -> Result<ItemNft, Revert> {
        if init.capacity == 0 {
            return Err(Revert::InvalidCapacity);
        }
        Ok(ItemNft {
            address,
            name: init.name,
            symbol: init.symbol,
            token_id: init.token_id,
            owner,
            price: init.price,
            capacity: init.capacity,
            title: init.title,
            description: init.description,
            token_uri: init.token_uri,
            created_at: now,
            burned: false,
            expiries: BTreeMap::new(),
            slots: BTreeSet::new(),
        })
    }

    pub fn info(&self) -> ItemInfo {
        ItemInfo {
            owner: self.owner,
            token_id: self.token_id,
            title: self.title.clone(),
            description: self.description.clone(),
            price: self.price,
            capacity: self.capacity,
            active_renters: self.active_renter_count(),
            token_uri: self.token_uri.clone(),
            created_at: self.created_at,
            burned: self.burned,
        }
    }

    pub fn active_renter_count(&self) -> u32 {
        self.slots.len() as u32
    }

    pub fn is_active_renter(&self, renter: Address, now: u64) -> bool {
        self.renter_expires(renter) > now
    }

    pub fn renter_expires(&self, renter: Address) -> u64 {
        self.expiries.get(&renter).copied().unwrap_or(0)
    }

    fn has_live_renters(&self, now: u64) -> bool {
        self.slots.iter().any(|r| self.is_active_renter(*r, now))
    }

    fn ensure_owner(&self, exec: &Exec) -> Result<(), Revert> {
        if exec.caller != self.owner {
            return Err(Revert::Unauthorized);
        }
        Ok(())
    }

    fn ensure_live(&self) -> Result<(), Revert> {
        if self.burned {
            return Err(Revert::TokenBurned);
        }
        Ok(())
    }

    /// Records `renter` until `expiry`. A renter that already holds a slot
    /// renews in place and does not take a second one. Payment is settled by
    /// the caller of this method.
    pub fn rent(&mut self, exec: &mut Exec, renter: Address, expiry: u64) -> Result<(), Revert> {
        if expiry <= exec.now {
            return Err(Revert::InvalidExpiry);
        }
        self.ensure_live()?;
        let renews = self.slots.contains(&renter);
        if !renews && self.active_renter_count() >= self.capacity {
            return Err(Revert::CapacityExceeded);
        }
        if exec.value < self.price {
            return Err(Revert::InsufficientPayment);
        }

        self.expiries.insert(renter, expiry);
        self.slots.insert(renter);
        exec.emit(Event::Rented {
            course: self.address,
            renter,
            expiry,
        });
        Ok(())
    }

    /// Releases the slot held by `renter`. Callable by the renter or the owner.
    pub fn unrent(&mut self, exec: &mut Exec, renter: Address) -> Result<(), Revert> {
        if exec.caller != renter && exec.caller != self.owner {
            return Err(Revert::Unauthorized);
        }
        if !self.slots.remove(&renter) {
            return Err(Revert::NotActiveRenter);
        }
        self.expiries.insert(renter, 0);
        exec.emit(Event::Unrented {
            course: self.address,
            renter,
        });
        Ok(())
    }

    pub fn burn(&mut self, exec: &mut Exec) -> Result<(), Revert> {
        self.ensure_owner(exec)?;
        self.ensure_live()?;
        if self.has_live_renters(exec.now) {
            return Err(Revert::HasActiveRenters);
        }
        self.burned = true;
        exec.emit(Event::Burned {
            course: self.address,
        });
        Ok(())
    }

    pub fn set_metadata(
        &mut self,
        exec: &mut Exec,
        title: String,
        description: String,
        uri: ContentAddress,
    ) -> Result<(), Revert> {
        self.ensure_owner(exec)?;
        self.ensure_live()?;
        self.title = title;
        self.description = description;
        self.token_uri = Some(uri.clone());
        exec.emit(Event::MetadataUpdated {
            course: self.address,
            uri,
        });
        Ok(())
    }

    pub fn change_price(&mut self, exec: &mut Exec, price: Amount) -> Result<(), Revert> {
        self.ensure_owner(exec)?;
        self.ensure_live()?;
        self.price = price;
        exec.emit(Event::PriceChanged {
            course: self.address,
            price,
        });
        Ok(())
    }
}

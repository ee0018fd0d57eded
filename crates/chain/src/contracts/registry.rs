use std::collections::BTreeSet;

use model::address::Address;
use sha2::{Digest, Sha256};

use super::Exec;
use crate::{events::Event, revert::Revert};

pub fn secret_hash(secret: &str) -> [u8; 32] {
    Sha256::digest(secret.as_bytes()).into()
}

/// Public list of course contracts plus the set of registered trainers.
///
/// Mutations need either the registry owner or the shared secret.
#[derive(Debug, Clone)]
pub struct NftCounter {
    pub address: Address,
    pub owner: Address,
    secret_hash: [u8; 32],
    courses: Vec<Address>,
    trainers: BTreeSet<Address>,
}

impl NftCounter {
    pub fn new(address: Address, owner: Address, secret: &str) -> NftCounter {
        NftCounter {
            address,
            owner,
            secret_hash: secret_hash(secret),
            courses: Vec::new(),
            trainers: BTreeSet::new(),
        }
    }

    fn authorized(&self, exec: &Exec, secret: &str) -> bool {
        exec.caller == self.owner || secret_hash(secret) == self.secret_hash
    }

    pub fn list(&self) -> Vec<Address> {
        self.courses.clone()
    }

    pub fn is_registered(&self, course: Address) -> bool {
        self.courses.contains(&course)
    }

    pub fn is_trainer(&self, who: Address) -> bool {
        self.trainers.contains(&who)
    }

    /// Appends `course` keeping insertion order. Registering twice is a no-op.
    pub fn register(
        &mut self,
        exec: &mut Exec,
        course: Address,
        secret: &str,
    ) -> Result<(), Revert> {
        if !self.authorized(exec, secret) {
            return Err(Revert::Unauthorized);
        }
        if self.is_registered(course) {
            return Ok(());
        }
        self.courses.push(course);
        exec.emit(Event::CourseRegistered {
            registry: self.address,
            course,
        });
        Ok(())
    }

    /// `course_owner` is the owner of the course contract as seen by the caller
    /// of this method. The course owner may always remove its own course.
    pub fn remove(
        &mut self,
        exec: &mut Exec,
        course: Address,
        course_owner: Option<Address>,
        secret: &str,
    ) -> Result<(), Revert> {
        if !self.authorized(exec, secret) && course_owner != Some(exec.caller) {
            return Err(Revert::Unauthorized);
        }
        let Some(pos) = self.courses.iter().position(|c| *c == course) else {
            return Err(Revert::NotRegistered);
        };
        self.courses.remove(pos);
        exec.emit(Event::CourseRemoved {
            registry: self.address,
            course,
        });
        Ok(())
    }

    pub fn register_as_trainer(&mut self, exec: &mut Exec, secret: &str) -> Result<(), Revert> {
        if !self.authorized(exec, secret) {
            return Err(Revert::Unauthorized);
        }
        if self.trainers.insert(exec.caller) {
            exec.emit(Event::TrainerRegistered {
                registry: self.address,
                trainer: exec.caller,
            });
        }
        Ok(())
    }
}

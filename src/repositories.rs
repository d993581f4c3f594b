pub mod applications;
pub mod clicks;
pub mod events;
pub mod giftcards;
pub mod leads;
pub mod partners;
pub mod profiles;
pub mod redemptions;

#[cfg(test)]
pub mod memory;

#[cfg(test)]
pub mod fixtures;

//! End-to-end workflow tests over the fully composed `garmentd` router.
//!
//! Every request goes through real authentication: the harness logs in as
//! `root` and department users are created and granted roles over HTTP.

#[cfg(test)]
mod harness;

#[cfg(test)]
mod access_control;
#[cfg(test)]
mod order_to_delivery;
#[cfg(test)]
mod shortage_to_credit;

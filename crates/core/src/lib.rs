// SPDX-License-Identifier: MIT

//! Core types of the uniledger mining core
//!
//! Transactions, validations, elected pool descriptors and the geo-patch
//! grid, together with their canonical encodings, hashing, signing and
//! integrity checks. Everything here is synchronous and side-effect free.

pub mod bincode;
pub mod elected;
pub mod geo_patch;
pub mod hash;
pub mod keys;
pub mod projection;
pub mod shared_keys;
pub mod signed;
pub mod timestamp;
pub mod transaction;
pub mod validation;

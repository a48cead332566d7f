// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Types and constants from the variable-services and boot-manager portions
//! of the UEFI specification.
//!
//! This crate is limited to wire-format definitions: attribute bitmasks,
//! device-path discriminators and fixed-size node bodies, and the identifiers
//! of the globally defined variables. Parsing lives in `efivar_types`, storage
//! in `efivar_storage`.

pub mod boot;
pub mod nvram;

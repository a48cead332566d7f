// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Codecs for the composite structures stored in firmware variables: the
//! recursive device-path list and the load option that wraps one.
//!
//! Parsing works over plain byte slices; all offsets in errors are absolute
//! positions within the buffer handed to the outermost parser.

use thiserror::Error;

pub mod device_path;
pub mod load_option;
pub mod reader;

pub use device_path::DevicePathList;
pub use device_path::DevicePathNode;
pub use load_option::LoadOption;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("device path header truncated at offset {0}")]
    Header(usize),
    #[error("device path node at offset {0} declares a length shorter than its header")]
    BadHeader(usize),
    #[error("device path node body truncated at offset {0}")]
    Body(usize),
    #[error("field #{index} truncated at offset {offset}")]
    Field { index: usize, offset: usize },
    #[error("string not null-terminated")]
    NullTerminated,
    #[error("invalid UCS-2 string")]
    InvalidUcs2(#[source] ucs2::Ucs2Error),
    #[error("load option description")]
    Description(#[source] ucs2::Ucs2Error),
    #[error("file path list declares {declared} bytes, parser consumed {consumed}")]
    PathListLength { declared: usize, consumed: usize },
    #[error("unexpected trailing bytes in device path node body")]
    TrailingData,
}

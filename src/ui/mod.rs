//! Discord presentation of command replies.

pub mod embeds;

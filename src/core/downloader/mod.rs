pub mod client;

pub use client::{sha1_hex, Downloader, StagedArtifact};

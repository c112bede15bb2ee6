// ─── Updater Core ───
// Keeps a Fabric server installation in sync with its declared mod set.
//
// Architecture:
//   core/
//     config/     — TOML document model, loader, validation
//     registry/   — Fabric meta + Modrinth queries behind VersionSource
//     resolver/   — Platform target, dependency BFS, version selection
//     inventory/  — Classification of the live mods directory
//     downloader/ — Streaming downloads with SHA-1 validation
//     staging/    — Per-run scratch area for verified artifacts
//     loaders/    — Headless Fabric server installer
//     server/     — Console channel, lifecycle, backup restore
//     state/      — [state] persistence inside the config document
//     apply/      — Transactional apply with rollback

pub mod apply;
pub mod config;
pub mod downloader;
pub mod error;
pub mod http;
pub mod inventory;
pub mod loaders;
pub mod registry;
pub mod resolver;
pub mod server;
pub mod staging;
pub mod state;

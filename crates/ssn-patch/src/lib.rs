//! # ssn-patch
//!
//! Downloads and installs incremental patches for clients distributed
//! through the Solid State Networks patch CDN.
//!
//! ## Architecture Overview
//!
//! 1. **Release paths** ([`release::resolve`]): works out the chain of hops
//!    between two releases from the CDN's publishing pattern
//! 2. **Fetching** ([`Fetcher`], [`HttpFetcher`]): `.solidpkg` and directory
//!    `.zip` files in memory, disk images into a local cache
//! 3. **Installing** ([`Installer`]): the external helper
//!    ([`ProcessInstaller`]) or in-process extraction of new files
//!    ([`InlineInstaller`])
//! 4. **Orchestration** ([`Patcher`]): validates each hop and applies its
//!    entries with bounded concurrency
//!
//! ## Usage
//!
//! ```rust,no_run
//! use ssn_patch::{PatchConfig, Patcher, Product};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let patcher = Patcher::from_config(PatchConfig::from_env()?)?;
//!
//!     // Fresh install of release 5, through -1to0 and 0to5
//!     let report = patcher
//!         .install_path(Product::AssetsMain, -1, 5, None, Path::new("/games/swtor"))
//!         .await?;
//!     println!("{} files extracted", report.extracted);
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! ```bash
//! export SSN_PATCH_HOST="cdn-patch.swtor.com"
//! export SSN_PATCH_CACHE_DIR="/var/cache/ssn-patch"
//! export SSN_PATCH_FETCH_CONCURRENCY="2"
//! export SSN_PATCH_INSTALL_CONCURRENCY="3"
//! export SSN_PATCH_INSTALLER="/usr/local/bin/ssn-installer"
//! export SSN_PATCH_CLEANUP="true"
//! ```
//!
//! ## Error Handling
//!
//! Format, validation and download problems abort the operation with a
//! [`PatchError`]. Failures of single files do not: they are collected in
//! the [`PatchReport`], and [`PatchReport::into_result`] turns them into
//! [`PatchError::FileFailures`] naming every failed file.

pub mod config;
pub mod error;
pub mod fetch;
pub mod install;
pub mod orchestrator;
pub mod product;
pub mod release;
pub mod scheduler;
pub mod validate;

pub use config::PatchConfig;
pub use error::{FileFailure, PatchError, Result};
pub use fetch::{Fetcher, HttpFetcher};
pub use install::{InlineInstaller, InstallRequest, Installer, ProcessInstaller};
pub use orchestrator::{Action, PatchReport, PatchRequest, Patcher};
pub use product::Product;
pub use release::{ReleaseEdge, resolve};
pub use scheduler::{CancellationToken, run_bounded};

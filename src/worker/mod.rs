// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Worker Module
 * Background execution of scan runs
 *
 * © 2026 Bountyy Oy
 */

pub mod scan_worker;

pub use scan_worker::{JobFailure, ScanWorker};

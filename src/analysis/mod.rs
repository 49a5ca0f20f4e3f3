// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Analysis Module
 * Technology fingerprinting and security header scoring
 * © 2026 Bountyy Oy
 */

pub mod tech_detection;

pub use tech_detection::{
    security_score, DetectedTechnology, FingerprintResult, TechCategory, TechnologyFingerprinter,
    SECURITY_HEADERS,
};

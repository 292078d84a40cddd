// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

pub mod core;
pub mod groups;

pub use self::core::{DedupMode, EngineConfig, EngineSettings};
pub use self::groups::{GroupType, IdGroup};
